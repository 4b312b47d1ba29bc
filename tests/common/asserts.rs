#![allow(dead_code)]

use skein::event_bus::Event;
use skein::run::RunStatus;

/// Statuses of the run-phase events in `events`, in emission order.
pub fn phase_statuses(events: &[Event]) -> Vec<RunStatus> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Run(run) => Some(run.status),
            _ => None,
        })
        .collect()
}

/// Assert some node event resolved `node_id` with `outcome`
/// (`"success"` or `"error"`).
pub fn assert_node_resolved(events: &[Event], node_id: &str, outcome: &str) {
    let found = events.iter().any(
        |event| matches!(event, Event::Node(node) if node.node_id == node_id && node.outcome == outcome),
    );
    assert!(
        found,
        "expected a {outcome} resolution for {node_id}, got: {events:?}"
    );
}

/// Assert a diagnostic event under `scope` whose message contains `needle`.
pub fn assert_diagnostic(events: &[Event], scope: &str, needle: &str) {
    let found = events.iter().any(|event| {
        matches!(event, Event::Diagnostic(diag) if diag.scope() == scope && diag.message().contains(needle))
    });
    assert!(
        found,
        "expected a {scope} diagnostic containing '{needle}', got: {events:?}"
    );
}
