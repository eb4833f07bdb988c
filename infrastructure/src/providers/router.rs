//! Resilient model router.
//!
//! Selects among the configured models by priority, guarding each with
//! its own [`CircuitBreaker`]. All resilience decisions are centralized
//! here so every caller — planning, ad hoc completions, future surfaces —
//! gets identical semantics:
//!
//! - An Open breaker short-circuits the model with no network call.
//! - A failed call records on that model's breaker and falls through to
//!   the next priority, bounded by `max_fallback_attempts`.
//! - A success records usage and cost; failure counts reset only through
//!   the breaker's own HalfOpen→Closed transition.
//!
//! Breaker state is mutated strictly under the per-model mutex, so
//! concurrent callers observe consistent transitions.

use super::ProviderAdapter;
use async_trait::async_trait;
use relay_application::ports::model_gateway::{ModelGateway, RouterError};
use relay_application::ports::telemetry::{NoTelemetry, TelemetryEvent, TelemetrySink};
use relay_domain::routing::breaker::{BreakerConfig, BreakerState, BreakerTransition, CircuitBreaker};
use relay_domain::routing::model_config::ModelConfig;
use relay_domain::routing::value_objects::{CompletionRequest, ModelResponse};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, warn};

struct ModelSlot {
    config: ModelConfig,
    adapter: Arc<dyn ProviderAdapter>,
    breaker: Mutex<CircuitBreaker>,
}

/// Priority-ordered, breaker-guarded model selection.
pub struct ModelRouter {
    slots: Vec<ModelSlot>,
    breaker_config: BreakerConfig,
    max_fallback_attempts: Option<usize>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl ModelRouter {
    pub fn new(breaker_config: BreakerConfig) -> Self {
        Self {
            slots: Vec::new(),
            breaker_config,
            max_fallback_attempts: None,
            telemetry: Arc::new(NoTelemetry),
        }
    }

    /// Register a model. Slots are kept sorted by priority, highest
    /// first; registration order breaks ties.
    pub fn register(mut self, config: ModelConfig, adapter: Arc<dyn ProviderAdapter>) -> Self {
        let breaker = Mutex::new(CircuitBreaker::new(self.breaker_config.clone()));
        self.slots.push(ModelSlot {
            config,
            adapter,
            breaker,
        });
        self.slots
            .sort_by_key(|slot| std::cmp::Reverse(slot.config.priority));
        self
    }

    /// Cap how many models one completion may actually attempt.
    /// Defaults to every configured model.
    pub fn with_max_fallback_attempts(mut self, attempts: usize) -> Self {
        self.max_fallback_attempts = Some(attempts.max(1));
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Current breaker state for a model; for diagnostics and tests.
    pub fn breaker_state(&self, model: &str) -> Option<BreakerState> {
        self.slots
            .iter()
            .find(|slot| slot.config.name == model)
            .map(|slot| slot.breaker.lock().expect("breaker lock poisoned").state())
    }

    fn emit_transition(&self, model: &str, transition: Option<BreakerTransition>) {
        if let Some(transition) = transition {
            debug!(model, from = %transition.from, to = %transition.to, "circuit breaker transition");
            self.telemetry.record(TelemetryEvent::BreakerTransition {
                model: model.to_string(),
                from: transition.from,
                to: transition.to,
            });
        }
    }

    async fn route(&self, request: CompletionRequest) -> Result<ModelResponse, RouterError> {
        let max_attempts = self.max_fallback_attempts.unwrap_or(self.slots.len());
        let mut attempts = 0usize;
        let mut failures: Vec<String> = Vec::new();

        for slot in &self.slots {
            if attempts >= max_attempts {
                break;
            }
            let model = slot.config.name.as_str();

            let admitted = {
                let mut breaker = slot.breaker.lock().expect("breaker lock poisoned");
                let outcome = breaker.try_acquire(Instant::now());
                drop(breaker);
                self.emit_transition(model, outcome.transition);
                outcome.admitted
            };
            if !admitted {
                debug!(model, "circuit open, skipping model");
                failures.push(format!("{}: circuit open", model));
                continue;
            }

            attempts += 1;
            match slot.adapter.complete(model, &request).await {
                Ok(mut response) => {
                    let transition = slot
                        .breaker
                        .lock()
                        .expect("breaker lock poisoned")
                        .record_success(Instant::now());
                    self.emit_transition(model, transition);

                    response.cost =
                        f64::from(response.usage.total()) * slot.config.cost_per_token;
                    self.telemetry.record(TelemetryEvent::CompletionServed {
                        model: model.to_string(),
                        total_tokens: response.usage.total(),
                        cost: response.cost,
                    });
                    return Ok(response);
                }
                Err(error) => {
                    warn!(model, %error, "model call failed, trying next priority");
                    let transition = slot
                        .breaker
                        .lock()
                        .expect("breaker lock poisoned")
                        .record_failure(Instant::now());
                    self.emit_transition(model, transition);

                    self.telemetry.record(TelemetryEvent::ModelAttemptFailed {
                        model: model.to_string(),
                        error: error.to_string(),
                    });
                    failures.push(format!("{}: {}", model, error));
                }
            }
        }

        let detail = if failures.is_empty() {
            "no models configured".to_string()
        } else {
            failures.join("; ")
        };
        if attempts == 0 && !self.slots.is_empty() {
            // Every candidate was short-circuited; nothing touched the network.
            Err(RouterError::CircuitOpen(detail))
        } else {
            Err(RouterError::AllModelsUnavailable { attempts, detail })
        }
    }
}

#[async_trait]
impl ModelGateway for ModelRouter {
    async fn complete(&self, request: CompletionRequest) -> Result<ModelResponse, RouterError> {
        self.route(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderKind;
    use relay_application::ports::model_gateway::GatewayError;
    use relay_domain::routing::value_objects::TokenUsage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // -- Mock ProviderAdapter --------------------------------------------------

    /// Adapter stub whose first `fail_until` calls fail, then succeed.
    struct MockProvider {
        kind: ProviderKind,
        fail_until: usize,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn healthy() -> Arc<Self> {
            Self::failing_first(0)
        }

        fn failing() -> Arc<Self> {
            Self::failing_first(usize::MAX)
        }

        fn failing_first(fail_until: usize) -> Arc<Self> {
            Arc::new(Self {
                kind: ProviderKind::OpenAiCompat,
                fail_until,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProviderAdapter for MockProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn complete(
            &self,
            model: &str,
            _request: &CompletionRequest,
        ) -> Result<ModelResponse, GatewayError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_until {
                Err(GatewayError::RequestFailed("503".to_string()))
            } else {
                Ok(ModelResponse::new(model, "hello").with_usage(TokenUsage {
                    prompt_tokens: 100,
                    completion_tokens: 50,
                }))
            }
        }
    }

    fn tight_breaker() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 2,
            failure_window: Duration::from_secs(60),
            cooldown: Duration::from_millis(50),
            half_open_max_probes: 1,
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new("hi")
    }

    #[tokio::test]
    async fn test_highest_priority_model_serves() {
        let primary = MockProvider::healthy();
        let secondary = MockProvider::healthy();
        let router = ModelRouter::new(BreakerConfig::default())
            .register(
                ModelConfig::new("primary", "openai").with_priority(10),
                Arc::clone(&primary) as Arc<dyn ProviderAdapter>,
            )
            .register(
                ModelConfig::new("secondary", "openai").with_priority(5),
                Arc::clone(&secondary) as Arc<dyn ProviderAdapter>,
            );

        let response = router.complete(request()).await.unwrap();
        assert_eq!(response.model, "primary");
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn test_fallback_to_next_priority_on_failure() {
        let primary = MockProvider::failing();
        let secondary = MockProvider::healthy();
        let router = ModelRouter::new(BreakerConfig::default())
            .register(
                ModelConfig::new("primary", "openai").with_priority(10),
                Arc::clone(&primary) as Arc<dyn ProviderAdapter>,
            )
            .register(
                ModelConfig::new("secondary", "openai").with_priority(5),
                Arc::clone(&secondary) as Arc<dyn ProviderAdapter>,
            );

        let response = router.complete(request()).await.unwrap();
        assert_eq!(response.model, "secondary");
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_models_failing_is_exhaustion() {
        let router = ModelRouter::new(BreakerConfig::default())
            .register(
                ModelConfig::new("a", "openai").with_priority(2),
                MockProvider::failing() as Arc<dyn ProviderAdapter>,
            )
            .register(
                ModelConfig::new("b", "openai").with_priority(1),
                MockProvider::failing() as Arc<dyn ProviderAdapter>,
            );

        let err = router.complete(request()).await.unwrap_err();
        match err {
            RouterError::AllModelsUnavailable { attempts, detail } => {
                assert_eq!(attempts, 2);
                assert!(detail.contains("a:"));
                assert!(detail.contains("b:"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_open_breaker_short_circuits_without_network_call() {
        let failing = MockProvider::failing();
        let router = ModelRouter::new(tight_breaker()).register(
            ModelConfig::new("only", "openai"),
            Arc::clone(&failing) as Arc<dyn ProviderAdapter>,
        );

        // Two failures trip the breaker.
        for _ in 0..2 {
            let _ = router.complete(request()).await;
        }
        assert_eq!(router.breaker_state("only"), Some(BreakerState::Open));
        assert_eq!(failing.calls(), 2);

        // Within the cooldown: short-circuited, adapter untouched.
        let err = router.complete(request()).await.unwrap_err();
        assert!(matches!(err, RouterError::CircuitOpen(_)));
        assert_eq!(failing.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_probe_reopens_breaker() {
        let flaky = MockProvider::failing();
        let router = ModelRouter::new(tight_breaker()).register(
            ModelConfig::new("only", "openai"),
            Arc::clone(&flaky) as Arc<dyn ProviderAdapter>,
        );

        for _ in 0..2 {
            let _ = router.complete(request()).await;
        }
        assert_eq!(router.breaker_state("only"), Some(BreakerState::Open));

        // Cooldown elapses; the probe is admitted but still fails → Open again.
        tokio::time::sleep(Duration::from_millis(60)).await;
        let _ = router.complete(request()).await;
        assert_eq!(router.breaker_state("only"), Some(BreakerState::Open));
        assert_eq!(flaky.calls(), 3);
    }

    #[tokio::test]
    async fn test_successful_probe_closes_breaker() {
        // Fails twice (tripping the breaker), then the endpoint recovers.
        let recovering = MockProvider::failing_first(2);
        let router = ModelRouter::new(tight_breaker()).register(
            ModelConfig::new("only", "openai"),
            Arc::clone(&recovering) as Arc<dyn ProviderAdapter>,
        );

        for _ in 0..2 {
            let _ = router.complete(request()).await;
        }
        assert_eq!(router.breaker_state("only"), Some(BreakerState::Open));

        // Probe after cooldown succeeds and the circuit closes again.
        tokio::time::sleep(Duration::from_millis(60)).await;
        let response = router.complete(request()).await.unwrap();
        assert_eq!(response.model, "only");
        assert_eq!(router.breaker_state("only"), Some(BreakerState::Closed));

        // Normal traffic flows afterwards.
        assert!(router.complete(request()).await.is_ok());
    }

    #[tokio::test]
    async fn test_max_fallback_attempts_bounds_attempts() {
        let third = MockProvider::healthy();
        let router = ModelRouter::new(BreakerConfig::default())
            .register(
                ModelConfig::new("a", "openai").with_priority(3),
                MockProvider::failing() as Arc<dyn ProviderAdapter>,
            )
            .register(
                ModelConfig::new("b", "openai").with_priority(2),
                MockProvider::failing() as Arc<dyn ProviderAdapter>,
            )
            .register(
                ModelConfig::new("c", "openai").with_priority(1),
                Arc::clone(&third) as Arc<dyn ProviderAdapter>,
            )
            .with_max_fallback_attempts(2);

        let err = router.complete(request()).await.unwrap_err();
        assert!(matches!(
            err,
            RouterError::AllModelsUnavailable { attempts: 2, .. }
        ));
        assert_eq!(third.calls(), 0, "third model is beyond the attempt cap");
    }

    #[tokio::test]
    async fn test_success_records_cost_from_usage() {
        let router = ModelRouter::new(BreakerConfig::default()).register(
            ModelConfig::new("only", "openai").with_cost_per_token(0.001),
            MockProvider::healthy() as Arc<dyn ProviderAdapter>,
        );

        let response = router.complete(request()).await.unwrap();
        // 150 tokens at 0.001 each
        assert!((response.cost - 0.15).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_router_reports_no_models() {
        let router = ModelRouter::new(BreakerConfig::default());
        let err = router.complete(request()).await.unwrap_err();
        assert!(matches!(
            err,
            RouterError::AllModelsUnavailable { attempts: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_breaker_transitions_are_reported() {
        struct CollectingSink(Mutex<Vec<TelemetryEvent>>);
        impl TelemetrySink for CollectingSink {
            fn record(&self, event: TelemetryEvent) {
                self.0.lock().unwrap().push(event);
            }
        }

        let sink = Arc::new(CollectingSink(Mutex::new(Vec::new())));
        let router = ModelRouter::new(tight_breaker())
            .register(
                ModelConfig::new("only", "openai"),
                MockProvider::failing() as Arc<dyn ProviderAdapter>,
            )
            .with_telemetry(Arc::clone(&sink) as Arc<dyn TelemetrySink>);

        for _ in 0..2 {
            let _ = router.complete(request()).await;
        }

        let events = sink.0.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            TelemetryEvent::BreakerTransition {
                from: BreakerState::Closed,
                to: BreakerState::Open,
                ..
            }
        )));
    }
}
