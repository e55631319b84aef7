//! Provider orchestration
//!
//! Primary provider first, then the ordered fallback list. Each
//! provider gets its own retry schedule; only transient failures are
//! retried, terminal ones advance to the next provider immediately.
//! Backoff sleeps the calling task, so parallel callers run
//! independent schedules.

use crate::errors::{ArbitrationError, ProviderError, ProviderFailure};
use crate::parse::parse_decision;
use crate::prompt::build_prompt;
use crate::provider::ReasoningProvider;
use selheal_core_types::{ElementCandidate, FailureContext, HealDecision, UiSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-provider retry schedule.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Hard bound on one call, regardless of transport behaviour.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            call_timeout: Duration::from_secs(30),
        }
    }
}

struct ProviderSlot {
    provider: Arc<dyn ReasoningProvider>,
    policy: RetryPolicy,
}

/// Successful arbitration with accounting.
#[derive(Debug, Clone)]
pub struct Arbitration {
    pub decision: HealDecision,
    pub provider: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Orchestrates the reasoning-provider chain for one episode.
#[derive(Default)]
pub struct ExternalArbitrator {
    providers: Vec<ProviderSlot>,
}

impl ExternalArbitrator {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    pub fn push_provider(
        mut self,
        provider: Arc<dyn ReasoningProvider>,
        policy: RetryPolicy,
    ) -> Self {
        self.providers.push(ProviderSlot { provider, policy });
        self
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Run the chain until one provider yields a parseable decision.
    pub async fn arbitrate(
        &self,
        ctx: &FailureContext,
        snapshot: &UiSnapshot,
        candidates: &[ElementCandidate],
    ) -> Result<Arbitration, ArbitrationError> {
        if self.providers.is_empty() {
            return Err(ArbitrationError::NoProviders);
        }

        let prompt = build_prompt(ctx, snapshot, candidates);
        let mut failures = Vec::new();

        for slot in &self.providers {
            match self.try_provider(slot, &prompt, candidates.len()).await {
                Ok(arbitration) => {
                    info!(
                        provider = %arbitration.provider,
                        can_heal = arbitration.decision.can_heal,
                        confidence = arbitration.decision.confidence,
                        "arbitration complete"
                    );
                    return Ok(arbitration);
                }
                Err(failure) => {
                    warn!(%failure, "provider failed, advancing to fallback");
                    failures.push(failure);
                }
            }
        }

        Err(ArbitrationError::Exhausted { failures })
    }

    async fn try_provider(
        &self,
        slot: &ProviderSlot,
        prompt: &str,
        candidate_count: usize,
    ) -> Result<Arbitration, ProviderFailure> {
        let name = slot.provider.name().to_string();
        let mut attempts = 0_u32;

        loop {
            attempts += 1;
            let call = slot.provider.complete(prompt);
            let outcome = match tokio::time::timeout(slot.policy.call_timeout, call).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ProviderError::Timeout(
                    slot.policy.call_timeout.as_millis() as u64,
                )),
            };

            match outcome {
                Ok(response) => {
                    return match parse_decision(&response.text, candidate_count) {
                        Ok(decision) => Ok(Arbitration {
                            decision,
                            provider: name,
                            prompt_tokens: response.prompt_tokens,
                            completion_tokens: response.completion_tokens,
                        }),
                        Err(error) => Err(ProviderFailure::Unparseable { name, error }),
                    };
                }
                Err(err) if err.is_retryable() && attempts <= slot.policy.max_retries => {
                    let delay = backoff_delay(&slot.policy, attempts);
                    debug!(
                        provider = %name,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    return Err(ProviderFailure::CallFailed {
                        name,
                        attempts,
                        last: err,
                    });
                }
            }
        }
    }
}

/// Exponential backoff with jitter: `initial * 2^(attempt-1)`, capped,
/// then +/- 20% derived from the clock so parallel callers desynchronize.
fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exp = policy
        .initial_backoff
        .saturating_mul(1_u32 << (attempt - 1).min(16));
    let capped = exp.min(policy.max_backoff);

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let jitter_pct = (nanos % 41) as i64 - 20; // -20..=20
    let adjusted = capped.as_millis() as i64 * (100 + jitter_pct) / 100;
    Duration::from_millis(adjusted.max(1) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ScriptedProvider;
    use selheal_core_types::{ActionType, LocatorInfo};

    const DECISION: &str = r#"{
        "can_heal": true,
        "confidence": 0.9,
        "selected_element_index": 0,
        "reasoning": "same control",
        "alternative_indices": [],
        "warnings": [],
        "refusal_reason": null
    }"#;

    fn episode() -> (FailureContext, UiSnapshot, Vec<ElementCandidate>) {
        let ctx = FailureContext::new(
            LocatorInfo::id("login-btn"),
            ActionType::Click,
            "click login button",
        );
        let snapshot = UiSnapshot::new("https://example.com/login", "Login");
        let candidates = vec![ElementCandidate::new(
            LocatorInfo::css("button.radius"),
            0.8,
            "lone submit button",
        )];
        (ctx, snapshot, candidates)
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
            call_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn two_timeouts_then_success_records_three_calls() {
        let provider = Arc::new(
            ScriptedProvider::new("primary")
                .push_err(ProviderError::Timeout(100))
                .push_err(ProviderError::Timeout(100))
                .push_ok(DECISION),
        );
        let arbitrator =
            ExternalArbitrator::new().push_provider(provider.clone(), fast_policy());

        let (ctx, snapshot, candidates) = episode();
        let arbitration = arbitrator
            .arbitrate(&ctx, &snapshot, &candidates)
            .await
            .expect("third attempt succeeds");

        assert!(arbitration.decision.can_heal);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_failure_advances_without_retry() {
        let primary = Arc::new(
            ScriptedProvider::new("primary").push_err(ProviderError::Auth("bad key".into())),
        );
        let fallback = Arc::new(ScriptedProvider::new("fallback").push_ok(DECISION));
        let arbitrator = ExternalArbitrator::new()
            .push_provider(primary.clone(), fast_policy())
            .push_provider(fallback.clone(), fast_policy());

        let (ctx, snapshot, candidates) = episode();
        let arbitration = arbitrator
            .arbitrate(&ctx, &snapshot, &candidates)
            .await
            .expect("fallback succeeds");

        assert_eq!(primary.calls(), 1, "no retry on terminal failure");
        assert_eq!(fallback.calls(), 1);
        assert_eq!(arbitration.provider, "fallback");
    }

    #[tokio::test(start_paused = true)]
    async fn all_providers_exhausted_is_aggregate_failure() {
        let primary = Arc::new(
            ScriptedProvider::new("primary")
                .push_err(ProviderError::ServerError(503))
                .push_err(ProviderError::ServerError(503))
                .push_err(ProviderError::ServerError(503)),
        );
        let fallback = Arc::new(
            ScriptedProvider::new("fallback").push_err(ProviderError::Auth("expired".into())),
        );
        let arbitrator = ExternalArbitrator::new()
            .push_provider(primary, fast_policy())
            .push_provider(fallback, fast_policy());

        let (ctx, snapshot, candidates) = episode();
        let err = arbitrator
            .arbitrate(&ctx, &snapshot, &candidates)
            .await
            .unwrap_err();

        match err {
            ArbitrationError::Exhausted { failures } => assert_eq!(failures.len(), 2),
            other => panic!("expected exhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unparseable_response_escalates_to_fallback() {
        let primary =
            Arc::new(ScriptedProvider::new("primary").push_ok("I cannot answer in JSON"));
        let fallback = Arc::new(ScriptedProvider::new("fallback").push_ok(DECISION));
        let arbitrator = ExternalArbitrator::new()
            .push_provider(primary.clone(), fast_policy())
            .push_provider(fallback, fast_policy());

        let (ctx, snapshot, candidates) = episode();
        let arbitration = arbitrator
            .arbitrate(&ctx, &snapshot, &candidates)
            .await
            .expect("fallback succeeds");

        assert_eq!(primary.calls(), 1, "parse failure is not retried");
        assert_eq!(arbitration.provider, "fallback");
    }

    #[tokio::test(start_paused = true)]
    async fn no_providers_is_an_error() {
        let arbitrator = ExternalArbitrator::new();
        let (ctx, snapshot, candidates) = episode();
        let err = arbitrator
            .arbitrate(&ctx, &snapshot, &candidates)
            .await
            .unwrap_err();
        assert!(matches!(err, ArbitrationError::NoProviders));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = fast_policy();
        let first = backoff_delay(&policy, 1);
        let third = backoff_delay(&policy, 3);
        assert!(first.as_millis() >= 8); // 10ms -20% jitter
        assert!(third.as_millis() <= 48); // capped at 40ms +20% jitter
    }
}
