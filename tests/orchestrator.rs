mod common;
use common::*;

use std::sync::Arc;
use std::time::Duration;

use skein::client::{InMemoryExecutionService, PollStep};
use skein::run::{
    NodeResult, OrchestratorError, RunButtonKind, RunStatus, SubmitOptions,
};
use skein::types::PipelineUid;

#[tokio::test]
async fn full_session_launches_polls_and_finishes() {
    let service = Arc::new(InMemoryExecutionService::new());
    service.enqueue(PollStep::Deliver(delivery(&[(
        "mc_1",
        NodeResult::success("motion corrected"),
    )])));
    service.enqueue(PollStep::Deliver(delivery(&[
        ("roi_1", NodeResult::success("rois found")),
        ("pca_1", NodeResult::error("matrix diverged")),
    ])));

    let orchestrator = orchestrator_with(service.clone());
    seed_branching_graph(&orchestrator);

    let run_id = orchestrator
        .start_run(SubmitOptions::named("spont_activity_01"))
        .await
        .expect("launch accepted");

    wait_for_status(&orchestrator, RunStatus::Finished).await;
    assert_eq!(orchestrator.run_id(), Some(run_id));
    assert!(service.polls_served() >= 2);

    let results = orchestrator.results().expect("finished run has results");
    assert!(results.is_settled());
    assert_eq!(results.len(), 3);
    assert!(results.get("roi_1").expect("roi_1 reported").is_success());
    // A node-level error resolves the node without failing the run.
    assert!(results.get("pca_1").expect("pca_1 reported").is_error());

    settle_events().await;
    let events = orchestrator.memory_events().expect("memory sink wired").snapshot();
    assert_eq!(
        phase_statuses(&events),
        vec![RunStatus::Pending, RunStatus::Success, RunStatus::Finished]
    );
    assert_node_resolved(&events, "mc_1", "success");
    assert_node_resolved(&events, "roi_1", "success");
    assert_node_resolved(&events, "pca_1", "error");
}

#[tokio::test]
async fn a_poll_fault_aborts_the_run_and_keeps_the_seed() {
    let service = Arc::new(InMemoryExecutionService::new());
    service.enqueue(PollStep::Fault("gateway timeout".into()));

    let orchestrator = orchestrator_with(service.clone());
    seed_branching_graph(&orchestrator);

    orchestrator
        .start_run(SubmitOptions::named("doomed mid-flight"))
        .await
        .expect("launch accepted");

    wait_for_status(&orchestrator, RunStatus::Aborted).await;
    assert!(orchestrator.run_id().is_some());

    // Nothing resolved before the fault, so the map is still the seed.
    let results = orchestrator.results().expect("partials are retained");
    assert_eq!(results.len(), 3);
    assert_eq!(results.pending_count(), 3);
    assert!(!results.is_settled());

    // Aborted is terminal for the poll series.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(service.polls_served(), 1);

    assert!(!orchestrator.button_mode().submission_locked);
    assert_eq!(orchestrator.button_mode().kind, RunButtonKind::RunExisting);

    settle_events().await;
    let events = orchestrator.memory_events().expect("memory sink wired").snapshot();
    assert_eq!(
        phase_statuses(&events),
        vec![RunStatus::Pending, RunStatus::Success, RunStatus::Aborted]
    );
}

#[tokio::test]
async fn submitted_request_carries_the_graph_and_options() {
    let service = Arc::new(InMemoryExecutionService::new());
    let orchestrator = orchestrator_with(service.clone());
    seed_two_node_graph(&orchestrator);

    orchestrator
        .start_run(
            SubmitOptions::named("tagged")
                .with_tool_param("nwb", serde_json::json!({"session": "spontaneous"}))
                .with_force_rerun(["pca_1"]),
        )
        .await
        .expect("launch accepted");

    let launched = service.launched_requests();
    assert_eq!(launched.len(), 1);
    let request = &launched[0];
    assert_eq!(request.name, "tagged");
    assert_eq!(request.nodes.len(), 2);
    assert_eq!(request.edges.len(), 1);
    assert_eq!(request.force_rerun, vec!["pca_1".to_string()]);
    assert!(request.tool_params.contains_key("nwb"));
    assert_eq!(request.pending_seed(), vec!["pca_1".to_string()]);

    orchestrator.cancel();
}

#[tokio::test]
async fn inputs_only_graph_finishes_without_polling() {
    let service = Arc::new(InMemoryExecutionService::new());
    let orchestrator = orchestrator_with(service.clone());
    orchestrator.insert_node(skein::graph::PipelineNode::csv(
        "csv_1",
        "behavior table",
        skein::graph::CsvParams::default(),
    ));

    orchestrator
        .start_run(SubmitOptions::named("inputs-only"))
        .await
        .expect("launch accepted");

    assert_eq!(orchestrator.status(), RunStatus::Finished);
    assert!(orchestrator.pending_nodes().is_empty());

    // No pending seed, so no poll task was ever armed.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(service.polls_served(), 0);
}

#[tokio::test]
async fn rejected_launch_surfaces_the_message_and_allows_retry() {
    let service = Arc::new(InMemoryExecutionService::new());
    service.reject_next_launch("workspace quota exceeded");

    let orchestrator = orchestrator_with(service.clone());
    seed_two_node_graph(&orchestrator);

    let err = orchestrator
        .start_run(SubmitOptions::named("doomed"))
        .await
        .expect_err("launch must be rejected");
    match err {
        OrchestratorError::Launch { message } => {
            assert!(message.contains("workspace quota exceeded"), "{message}");
        }
        other => panic!("expected a launch error, got {other:?}"),
    }
    assert_eq!(orchestrator.status(), RunStatus::Error);
    assert!(orchestrator.run_id().is_none());

    // Error is terminal for that submission, not for the session.
    orchestrator
        .start_run(SubmitOptions::named("retry"))
        .await
        .expect("retry accepted");
    assert!(orchestrator.status().is_polling());
    orchestrator.cancel();
}

#[tokio::test]
async fn empty_graph_and_blank_name_are_rejected_before_the_client() {
    let service = Arc::new(InMemoryExecutionService::new());
    let orchestrator = orchestrator_with(service.clone());

    let err = orchestrator
        .start_run(SubmitOptions::named("no nodes"))
        .await
        .expect_err("empty graph");
    assert!(matches!(err, OrchestratorError::Request(_)));

    seed_two_node_graph(&orchestrator);
    let err = orchestrator
        .start_run(SubmitOptions::named("   "))
        .await
        .expect_err("blank name");
    assert!(matches!(err, OrchestratorError::Request(_)));

    assert_eq!(orchestrator.status(), RunStatus::Uninitialized);
    assert!(service.launched_requests().is_empty());
}

#[tokio::test]
async fn second_submission_is_rejected_while_a_run_polls() {
    let service = Arc::new(InMemoryExecutionService::new());
    let orchestrator = orchestrator_with(service);
    seed_two_node_graph(&orchestrator);

    orchestrator
        .start_run(SubmitOptions::named("first"))
        .await
        .expect("launch accepted");
    assert_eq!(orchestrator.status(), RunStatus::Success);

    let err = orchestrator
        .start_run(SubmitOptions::named("second"))
        .await
        .expect_err("must reject while polling");
    assert!(matches!(err, OrchestratorError::RunInProgress));

    orchestrator.cancel();
    assert_eq!(orchestrator.status(), RunStatus::Canceled);
}

#[tokio::test]
async fn rerun_without_binding_is_rejected() {
    let service = Arc::new(InMemoryExecutionService::new());
    let orchestrator = orchestrator_with(service);
    seed_two_node_graph(&orchestrator);

    let err = orchestrator
        .rerun_current(SubmitOptions::named("nothing to continue"))
        .await
        .expect_err("no binding yet");
    assert!(matches!(err, OrchestratorError::NoBoundExperiment));
}

#[tokio::test]
async fn rerun_continues_under_the_canceled_runs_identifier() {
    let service = Arc::new(InMemoryExecutionService::new());
    let orchestrator = orchestrator_with(service.clone());
    seed_two_node_graph(&orchestrator);

    let first = orchestrator
        .start_run(SubmitOptions::named("first"))
        .await
        .expect("launch accepted");
    orchestrator.cancel();
    assert_eq!(orchestrator.status(), RunStatus::Canceled);

    let second = orchestrator
        .rerun_current(SubmitOptions::named("again"))
        .await
        .expect("relaunch accepted");
    assert_eq!(second, first);
    assert!(orchestrator.status().is_polling());
    assert_eq!(service.launched_requests().len(), 2);

    orchestrator.cancel();
}

#[tokio::test]
async fn uploads_during_a_run_land_in_the_next_submission_only() {
    let service = Arc::new(InMemoryExecutionService::new());
    let orchestrator = orchestrator_with(service.clone());
    seed_two_node_graph(&orchestrator);

    orchestrator
        .start_run(SubmitOptions::named("pinned"))
        .await
        .expect("launch accepted");

    // Workspace edits are accepted mid-run.
    orchestrator
        .upload_completed("csv_1", "data/behavior.csv")
        .expect("upload lands");

    let launched = service.launched_requests();
    let submitted_csv = launched[0].nodes.get("csv_1").expect("csv node submitted");
    assert!(submitted_csv.data().resolved_paths().is_empty());

    let live_csv = orchestrator.node("csv_1").expect("csv node in store");
    assert_eq!(live_csv.data().resolved_paths(), vec!["data/behavior.csv"]);

    orchestrator.cancel();
    orchestrator
        .rerun_current(SubmitOptions::named("with data"))
        .await
        .expect("relaunch accepted");
    let launched = service.launched_requests();
    let resubmitted_csv = launched[1].nodes.get("csv_1").expect("csv node resubmitted");
    assert_eq!(resubmitted_csv.data().resolved_paths(), vec!["data/behavior.csv"]);

    orchestrator.cancel();
}

#[tokio::test]
async fn button_mode_tracks_binding_and_run_identity() {
    let service = Arc::new(InMemoryExecutionService::new());
    let orchestrator = orchestrator_with(service);
    seed_two_node_graph(&orchestrator);

    assert_eq!(orchestrator.button_mode().kind, RunButtonKind::RunNew);
    assert!(!orchestrator.button_mode().submission_locked);

    orchestrator
        .start_run(SubmitOptions::named("live"))
        .await
        .expect("launch accepted");
    assert_eq!(orchestrator.button_mode().kind, RunButtonKind::RunExisting);

    orchestrator.cancel();
    // Canceled keeps the identifier, so a re-run is still offered.
    assert_eq!(orchestrator.button_mode().kind, RunButtonKind::RunExisting);
}

#[tokio::test]
async fn subscription_streams_the_completion_feed() {
    let service = Arc::new(InMemoryExecutionService::new());
    service.enqueue(PollStep::Deliver(delivery(&[(
        "pca_1",
        NodeResult::success("done"),
    )])));

    let orchestrator = orchestrator_with(service);
    seed_two_node_graph(&orchestrator);
    let mut stream = orchestrator.subscribe();

    orchestrator
        .start_run(SubmitOptions::named("streamed"))
        .await
        .expect("launch accepted");

    let mut saw_node_resolution = false;
    let mut saw_finished_phase = false;
    while let Some(event) = stream.next_timeout(Duration::from_secs(2)).await {
        match &event {
            skein::event_bus::Event::Node(node) if node.node_id == "pca_1" => {
                saw_node_resolution = true;
            }
            skein::event_bus::Event::Run(run) if run.status == RunStatus::Finished => {
                saw_finished_phase = true;
                break;
            }
            _ => {}
        }
    }
    assert!(saw_node_resolution, "expected the pca_1 resolution on the stream");
    assert!(saw_finished_phase, "expected the finished phase on the stream");
    assert_eq!(stream.missed(), 0);
}

#[tokio::test]
async fn binding_is_cleared_by_a_new_run() {
    let service = Arc::new(InMemoryExecutionService::new());
    service.insert_experiment(stored_record_settled("exp42"));

    let orchestrator = orchestrator_with(service);
    orchestrator
        .fetch_experiment("exp42")
        .await
        .expect("import succeeds");
    assert_eq!(orchestrator.binding(), PipelineUid::stored("exp42"));

    orchestrator
        .start_run(SubmitOptions::named("fresh"))
        .await
        .expect("launch accepted");
    // A brand-new run never continues the imported experiment.
    assert_eq!(orchestrator.binding(), PipelineUid::Default);

    orchestrator.cancel();
}
