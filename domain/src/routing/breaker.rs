//! Per-model circuit breaker.
//!
//! Guards one upstream provider endpoint with the classic three-state
//! machine:
//!
//! ```text
//! Closed --(threshold failures within window)--> Open
//! Open   --(cooldown elapsed)-----------------> HalfOpen
//! HalfOpen --(probe success)--> Closed    (failure count resets here, and
//! HalfOpen --(probe failure)--> Open       only here)
//! ```
//!
//! The breaker is a pure state machine: callers pass the current
//! `Instant` into every method, so transitions are deterministic under
//! test and the router can mutate it under its own lock discipline.
//! A success recorded while Closed does NOT clear a partial failure
//! count; only the HalfOpen→Closed transition resets it, which keeps a
//! provider flapping between "barely alive" and "dead" from looking
//! healthy.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Health state of one upstream model endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Requests pass through; failures are counted.
    Closed,
    /// Requests are short-circuited without a network call.
    Open,
    /// A bounded number of probe requests are admitted.
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tunable constants for the breaker state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures within `failure_window` that open the circuit.
    pub failure_threshold: u32,
    /// Window within which failures accumulate; older failures age out.
    pub failure_window: Duration,
    /// How long the circuit stays open before admitting probes.
    pub cooldown: Duration,
    /// Concurrent probe cap while half-open.
    pub half_open_max_probes: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
            half_open_max_probes: 1,
        }
    }
}

/// A state change, reported so the router can emit telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerTransition {
    pub from: BreakerState,
    pub to: BreakerState,
}

/// Result of an admission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireOutcome {
    /// Whether the caller may attempt the upstream call.
    pub admitted: bool,
    /// State change triggered by the admission check (Open → HalfOpen).
    pub transition: Option<BreakerTransition>,
}

/// Circuit breaker for a single model endpoint.
///
/// Created once per configured model at router construction; the router
/// is the only mutator and holds it behind a lock.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: BreakerState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    opened_at: Option<Instant>,
    probes_in_flight: u32,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: BreakerState::Closed,
            failure_count: 0,
            last_failure_at: None,
            opened_at: None,
            probes_in_flight: 0,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Ask to send one request through this breaker.
    ///
    /// In `Open`, the cooldown is checked first: once it has elapsed the
    /// breaker moves to `HalfOpen` and the request is admitted as a probe.
    /// In `HalfOpen`, admission is capped at `half_open_max_probes`
    /// concurrent probes so parallel callers cannot corrupt the count.
    pub fn try_acquire(&mut self, now: Instant) -> AcquireOutcome {
        match self.state {
            BreakerState::Closed => AcquireOutcome {
                admitted: true,
                transition: None,
            },
            BreakerState::Open => {
                let cooled_down = self
                    .opened_at
                    .map(|t| now.duration_since(t) >= self.config.cooldown)
                    .unwrap_or(true);
                if !cooled_down {
                    return AcquireOutcome {
                        admitted: false,
                        transition: None,
                    };
                }
                let transition = self.transition_to(BreakerState::HalfOpen);
                self.probes_in_flight = 1;
                AcquireOutcome {
                    admitted: true,
                    transition,
                }
            }
            BreakerState::HalfOpen => {
                if self.probes_in_flight < self.config.half_open_max_probes {
                    self.probes_in_flight += 1;
                    AcquireOutcome {
                        admitted: true,
                        transition: None,
                    }
                } else {
                    AcquireOutcome {
                        admitted: false,
                        transition: None,
                    }
                }
            }
        }
    }

    /// Record a successful upstream call.
    pub fn record_success(&mut self, _now: Instant) -> Option<BreakerTransition> {
        match self.state {
            // A single success while Closed does not zero a partial count.
            BreakerState::Closed => None,
            BreakerState::HalfOpen => {
                self.probes_in_flight = self.probes_in_flight.saturating_sub(1);
                self.failure_count = 0;
                self.last_failure_at = None;
                self.opened_at = None;
                self.transition_to(BreakerState::Closed)
            }
            // A success landing after the circuit opened changes nothing.
            BreakerState::Open => None,
        }
    }

    /// Record a failed upstream call.
    pub fn record_failure(&mut self, now: Instant) -> Option<BreakerTransition> {
        match self.state {
            BreakerState::Closed => {
                let within_window = self
                    .last_failure_at
                    .map(|t| now.duration_since(t) <= self.config.failure_window)
                    .unwrap_or(false);
                self.failure_count = if within_window {
                    self.failure_count + 1
                } else {
                    1
                };
                self.last_failure_at = Some(now);

                if self.failure_count >= self.config.failure_threshold {
                    self.opened_at = Some(now);
                    self.transition_to(BreakerState::Open)
                } else {
                    None
                }
            }
            BreakerState::HalfOpen => {
                self.probes_in_flight = self.probes_in_flight.saturating_sub(1);
                self.last_failure_at = Some(now);
                // Failed probe: back to Open with a fresh cooldown.
                self.opened_at = Some(now);
                self.transition_to(BreakerState::Open)
            }
            // Late failures from calls admitted before the circuit opened
            // must not extend the cooldown.
            BreakerState::Open => None,
        }
    }

    fn transition_to(&mut self, to: BreakerState) -> Option<BreakerTransition> {
        if self.state == to {
            return None;
        }
        let transition = BreakerTransition {
            from: self.state,
            to,
        };
        self.state = to;
        Some(transition)
    }
}
