//! Orchestrator configuration: poll cadence and event-bus wiring.
//!
//! Configuration is plain data with builder-style combinators. Environment
//! variables (loaded through `dotenvy`, so a local `.env` works) can override
//! the poll cadence without touching code:
//!
//! - `SKEIN_POLL_INITIAL_MS` — delay before the first poll and the backoff base
//! - `SKEIN_POLL_MAX_MS` — upper bound the backoff never exceeds

use std::time::Duration;

use rand::Rng;

/// Cadence of the result poller: bounded growth with a little jitter.
///
/// The delay for attempt `n` is `initial * multiplier^n`, capped at `max`,
/// then scaled by a ±10% jitter so many sessions polling the same service
/// do not phase-lock. Delays are always strictly positive, so the poller
/// makes forward progress and never busy-loops.
#[derive(Clone, Debug, PartialEq)]
pub struct PollPolicy {
    /// Delay before the first poll and the base of the backoff curve.
    pub initial: Duration,
    /// Hard ceiling on the delay between polls.
    pub max: Duration,
    /// Growth factor applied per completed poll; clamped to at least 1.0.
    pub multiplier: f64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(1_000),
            max: Duration::from_millis(10_000),
            multiplier: 1.5,
        }
    }
}

impl PollPolicy {
    /// Smallest delay ever produced, jitter included.
    pub const FLOOR: Duration = Duration::from_millis(50);

    /// Fixed-interval policy (no growth), still jittered.
    #[must_use]
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial: interval,
            max: interval,
            multiplier: 1.0,
        }
    }

    /// Resolve a policy from the environment, falling back to defaults.
    ///
    /// Mirrors the rest of the crate's configuration: explicit values win,
    /// then `.env`/process environment, then [`Default`].
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        let initial = read_millis("SKEIN_POLL_INITIAL_MS").unwrap_or(defaults.initial);
        let max = read_millis("SKEIN_POLL_MAX_MS").unwrap_or(defaults.max);
        Self {
            initial,
            max: max.max(initial),
            multiplier: defaults.multiplier,
        }
    }

    #[must_use]
    pub fn with_initial(mut self, initial: Duration) -> Self {
        self.initial = initial;
        self
    }

    #[must_use]
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Delay to sleep before poll attempt `attempt` (zero-based).
    ///
    /// Jittered, so two calls with the same attempt number may differ; the
    /// result is always within `[FLOOR, max * 1.1]`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = self.multiplier.max(1.0);
        // powi saturates quickly; past ~24 doublings the cap has long won.
        let grown = self.initial.as_millis() as f64 * multiplier.powi(attempt.min(24) as i32);
        let capped = grown.min(self.max.as_millis() as f64);
        let jittered = capped * rand::rng().random_range(0.9..=1.1);
        let floored = jittered.max(Self::FLOOR.as_millis() as f64);
        Duration::from_millis(floored as u64)
    }
}

fn read_millis(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

/// Which sinks the orchestrator's event bus writes to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkConfig {
    StdOut,
    Memory,
}

/// Default broadcast buffer for live event subscribers.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// Event-bus wiring for an orchestrator instance.
#[derive(Clone, Debug)]
pub struct EventBusConfig {
    pub sinks: Vec<SinkConfig>,
    /// Broadcast buffer shared by live subscribers. A subscriber that falls
    /// more than this many events behind loses the oldest ones.
    pub buffer_capacity: usize,
}

impl EventBusConfig {
    #[must_use]
    pub fn with_stdout_only() -> Self {
        Self {
            sinks: vec![SinkConfig::StdOut],
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    #[must_use]
    pub fn with_memory_sink() -> Self {
        Self {
            sinks: vec![SinkConfig::StdOut, SinkConfig::Memory],
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    #[must_use]
    pub fn add_sink(mut self, sink: SinkConfig) -> Self {
        if !self.sinks.contains(&sink) {
            self.sinks.push(sink);
        }
        self
    }

    #[must_use]
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.max(1);
        self
    }

    pub fn sinks(&self) -> &[SinkConfig] {
        &self.sinks
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self::with_stdout_only()
    }
}

/// Top-level configuration handed to `RunOrchestrator::new`.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use skein::config::{OrchestratorConfig, PollPolicy};
///
/// let config = OrchestratorConfig::default()
///     .with_poll_policy(PollPolicy::fixed(Duration::from_millis(250)))
///     .with_memory_event_bus();
/// assert_eq!(config.poll.multiplier, 1.0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct OrchestratorConfig {
    pub poll: PollPolicy,
    pub event_bus: EventBusConfig,
}

impl OrchestratorConfig {
    /// Configuration with the poll cadence resolved from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            poll: PollPolicy::from_env(),
            event_bus: EventBusConfig::default(),
        }
    }

    #[must_use]
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    #[must_use]
    pub fn with_event_bus(mut self, event_bus: EventBusConfig) -> Self {
        self.event_bus = event_bus;
        self
    }

    #[must_use]
    pub fn with_stdout_event_bus(self) -> Self {
        self.with_event_bus(EventBusConfig::with_stdout_only())
    }

    #[must_use]
    pub fn with_memory_event_bus(self) -> Self {
        self.with_event_bus(EventBusConfig::with_memory_sink())
    }
}
