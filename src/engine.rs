//! The healing pipeline.
//!
//! One engine instance serves a whole test run: cache, breaker,
//! learner and metrics are shared across sessions, and every decision
//! flows through [`HealingEngine::heal`].

use crate::config::{HealConfig, HealMode};
use crate::events::{EventLog, HealEvent};
use chrono::Utc;
use selheal_arbiter::{ExternalArbitrator, HttpProvider};
use selheal_cache::{CacheConfig, CacheEntry, CacheKey, CacheStore};
use selheal_candidates::{CandidateGenerator, ControlFamily, GeneratorConfig};
use selheal_core_types::{
    ActionType, DecisionSource, ElementCandidate, EpisodeId, FailureContext, FeedbackKind,
    HealDecision, HealOutcome, LocatorInfo, UiSnapshot,
};
use selheal_guard::{BreakerConfig, CircuitBreaker, CircuitState, GuardrailConfig, GuardrailPolicy, Verdict};
use selheal_learner::{LearnerConfig, PatternLearner};
use selheal_metrics::MetricsCollector;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Candidates forwarded to arbitration per episode.
const MAX_POOL: usize = 5;

/// Caller feedback on a past healing decision.
#[derive(Debug, Clone)]
pub struct Feedback {
    pub kind: FeedbackKind,
    pub original: LocatorInfo,
    /// The selector the pipeline chose, when it chose one.
    pub healed: Option<LocatorInfo>,
    /// Caller-supplied truth (CORRECTION) or suggestion (FALSE_NEGATIVE).
    pub correct: Option<LocatorInfo>,
    pub reason: Option<String>,
}

pub struct HealingEngine {
    config: HealConfig,
    generator: CandidateGenerator,
    learner: PatternLearner,
    cache: CacheStore,
    breaker: CircuitBreaker,
    guard: GuardrailPolicy,
    metrics: Arc<MetricsCollector>,
    arbitrator: ExternalArbitrator,
    events: EventLog,
    heals_used: AtomicU32,
}

impl HealingEngine {
    /// Build an engine with HTTP providers taken from the config.
    pub fn new(config: HealConfig) -> Self {
        let mut arbitrator = ExternalArbitrator::new();
        for settings in &config.providers {
            arbitrator = arbitrator.push_provider(
                Arc::new(HttpProvider::new(settings.provider_config())),
                settings.retry_policy(),
            );
        }
        Self::with_arbitrator(config, arbitrator)
    }

    /// Build an engine around a caller-supplied provider chain.
    pub fn with_arbitrator(config: HealConfig, arbitrator: ExternalArbitrator) -> Self {
        let cache = CacheStore::new(CacheConfig {
            ttl: Duration::from_secs(config.cache.ttl_secs),
            capacity: config.cache.capacity,
        });
        let breaker = CircuitBreaker::new(BreakerConfig {
            failure_threshold: config.breaker.failure_threshold,
            open_duration: Duration::from_secs(config.breaker.open_secs),
            half_open_max_attempts: config.breaker.half_open_max_attempts,
            success_threshold_to_close: config.breaker.success_threshold_to_close,
        });
        let guard = GuardrailPolicy::new(GuardrailConfig {
            min_confidence: config.min_confidence,
            allow_destructive: config.allow_destructive,
        });

        Self {
            generator: CandidateGenerator::new(GeneratorConfig::default()),
            learner: PatternLearner::new(LearnerConfig::default()),
            cache,
            breaker,
            guard,
            metrics: Arc::new(MetricsCollector::new()),
            arbitrator,
            events: EventLog::new(),
            heals_used: AtomicU32::new(0),
            config,
        }
    }

    /// Run the full healing pipeline for one failed lookup.
    pub async fn heal(&self, ctx: &FailureContext, snapshot: &UiSnapshot) -> HealOutcome {
        if self.config.mode == HealMode::Off {
            return HealOutcome::Disabled;
        }

        let started = std::time::Instant::now();
        self.metrics.record_attempt();

        let outcome = self.heal_inner(ctx, snapshot).await;

        let latency_ms = started.elapsed().as_millis() as u64;
        self.metrics.record_latency_ms(latency_ms);
        match &outcome {
            HealOutcome::Healed { locator, confidence, .. } => {
                self.metrics.record_success();
                info!(original = %ctx.original, healed = %locator, confidence = *confidence, "heal succeeded");
            }
            HealOutcome::Refused { reason } => {
                self.metrics.record_refusal();
                info!(original = %ctx.original, reason, "heal refused");
            }
            HealOutcome::Failed { reason } => {
                self.metrics.record_failure(&ctx.exception_kind);
                warn!(original = %ctx.original, reason, "heal failed");
            }
            HealOutcome::Disabled => {}
        }

        self.events.record(HealEvent {
            episode: EpisodeId::new(),
            at: Utc::now(),
            scenario: ctx.scenario_id.clone(),
            page_url: snapshot.url.clone(),
            original: ctx.original.clone(),
            outcome: outcome.clone(),
            latency_ms,
        });

        outcome
    }

    /// Budget accounting around the pipeline. A slot is reserved up
    /// front via compare-and-swap, so concurrent callers cannot
    /// overshoot `max_heals_per_run`; any outcome short of a heal
    /// hands its slot back.
    async fn heal_inner(&self, ctx: &FailureContext, snapshot: &UiSnapshot) -> HealOutcome {
        let budget = self.config.max_heals_per_run;
        let reserved = self
            .heals_used
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |used| {
                (used < budget).then_some(used + 1)
            });
        if reserved.is_err() {
            return HealOutcome::Refused {
                reason: "healing budget exhausted for this run".to_string(),
            };
        }

        let outcome = self.run_pipeline(ctx, snapshot).await;
        if !outcome.is_healed() {
            self.heals_used.fetch_sub(1, AtomicOrdering::SeqCst);
        }
        outcome
    }

    async fn run_pipeline(&self, ctx: &FailureContext, snapshot: &UiSnapshot) -> HealOutcome {
        let key = CacheKey::derive(&snapshot.url, &ctx.original, ctx.action, ctx.intent());
        if let Some(entry) = self.cache.get(&key) {
            self.metrics.record_cache_hit();
            debug!(original = %ctx.original, healed = %entry.locator, "cache hit");
            return HealOutcome::Healed {
                locator: entry.locator,
                confidence: entry.confidence,
                source: DecisionSource::Cache,
                reasoning: "cached decision for this page pattern".to_string(),
            };
        }

        let pool = self.assemble_candidates(ctx, snapshot);
        if pool.is_empty() {
            return HealOutcome::Failed {
                reason: "no viable candidates on the current page".to_string(),
            };
        }
        let candidates: Vec<ElementCandidate> = pool.iter().map(|(c, _)| c.clone()).collect();

        let (decision, source) = self.decide(ctx, snapshot, &candidates, &pool).await;

        if !decision.can_heal {
            return HealOutcome::Refused {
                reason: decision
                    .refusal_reason
                    .unwrap_or_else(|| "arbitrator declined to heal".to_string()),
            };
        }
        let Some(index) = decision.selected_index else {
            return HealOutcome::Failed {
                reason: "decision carried no selection".to_string(),
            };
        };
        let (candidate, learned) = &pool[index];
        let source = if *learned && source == DecisionSource::Heuristic {
            DecisionSource::Learned
        } else {
            source
        };

        match self
            .guard
            .evaluate(ctx.action, &ctx.original, &candidate.selector, decision.confidence)
        {
            Verdict::Refused { reason } => HealOutcome::Refused { reason },
            Verdict::Approved => {
                self.cache
                    .put(key, CacheEntry::new(candidate.selector.clone(), decision.confidence));
                HealOutcome::Healed {
                    locator: candidate.selector.clone(),
                    confidence: decision.confidence,
                    source,
                    reasoning: decision.reasoning,
                }
            }
        }
    }

    /// Generated candidates plus learned suggestions, deduplicated by
    /// selector, vetoed pairs removed, best first. The bool marks
    /// learner-sourced entries.
    fn assemble_candidates(
        &self,
        ctx: &FailureContext,
        snapshot: &UiSnapshot,
    ) -> Vec<(ElementCandidate, bool)> {
        let family = ControlFamily::infer(ctx.action, ctx.intent());
        let mut pool: Vec<(ElementCandidate, bool)> = self
            .generator
            .generate(snapshot, ctx.intent(), family)
            .into_iter()
            .map(|c| (c, false))
            .collect();

        for suggestion in self.learner.suggestions(&ctx.original) {
            let explanation = if suggestion.via_transformation {
                "learned transformation of the failed selector"
            } else {
                "learned association from past corrections"
            };
            pool.push((
                ElementCandidate::new(suggestion.locator, suggestion.confidence, explanation),
                true,
            ));
        }

        pool.retain(|(c, _)| !self.learner.is_vetoed(&ctx.original, &c.selector));
        pool.sort_by(|a, b| {
            b.0.confidence
                .partial_cmp(&a.0.confidence)
                .unwrap_or(Ordering::Equal)
        });
        let mut seen = HashSet::new();
        pool.retain(|(c, _)| seen.insert(c.selector.key()));
        pool.truncate(MAX_POOL);
        pool
    }

    /// Arbitrate when the breaker permits and providers exist;
    /// otherwise fall back to the top local candidate.
    async fn decide(
        &self,
        ctx: &FailureContext,
        snapshot: &UiSnapshot,
        candidates: &[ElementCandidate],
        pool: &[(ElementCandidate, bool)],
    ) -> (HealDecision, DecisionSource) {
        if self.arbitrator.provider_count() == 0 {
            return self.heuristic_decision(pool);
        }
        if !self.breaker.is_healing_allowed() {
            debug!("circuit open, skipping arbitration");
            return self.heuristic_decision(pool);
        }

        match self.arbitrator.arbitrate(ctx, snapshot, candidates).await {
            Ok(arbitration) => {
                self.breaker.record_success();
                self.metrics
                    .record_tokens(arbitration.prompt_tokens, arbitration.completion_tokens);
                if let Some(settings) = self
                    .config
                    .providers
                    .iter()
                    .find(|p| p.name == arbitration.provider)
                {
                    self.metrics.record_cost_micros(
                        settings.cost_micros(arbitration.prompt_tokens, arbitration.completion_tokens),
                    );
                }
                (arbitration.decision, DecisionSource::Arbitrator)
            }
            Err(error) => {
                warn!(%error, "arbitration failed, degrading to heuristic decision");
                self.breaker.record_failure();
                self.heuristic_decision(pool)
            }
        }
    }

    fn heuristic_decision(
        &self,
        pool: &[(ElementCandidate, bool)],
    ) -> (HealDecision, DecisionSource) {
        let top = &pool[0].0;
        let decision = if top.confidence >= self.guard.effective_min_confidence() {
            HealDecision::heal(0, top.confidence, top.explanation.clone())
        } else {
            HealDecision::refuse("no arbitration available and local confidence is too low")
        };
        (decision, DecisionSource::Heuristic)
    }

    /// A cached selector failed at use time: evict it so the next
    /// attempt runs the full pipeline. Deliberately breaker-neutral,
    /// staleness is a property of the page, not of the providers.
    pub fn report_stale_hit(&self, ctx: &FailureContext, page_url: &str) {
        let key = CacheKey::derive(page_url, &ctx.original, ctx.action, ctx.intent());
        if self.cache.invalidate(&key) {
            debug!(original = %ctx.original, "evicted stale cache entry");
        }
    }

    /// Route caller feedback into the learner, trust level, blacklist
    /// and metrics.
    pub fn submit_feedback(&self, feedback: Feedback) {
        self.learner.record_feedback(
            feedback.kind,
            &feedback.original,
            feedback.healed.as_ref(),
            feedback.correct.as_ref(),
        );

        match feedback.kind {
            FeedbackKind::Correction | FeedbackKind::Negative => {
                self.metrics.record_false_heal();
                self.guard.record_trust_negative();
                if let Some(healed) = feedback.healed {
                    self.cache.invalidate_locator(&healed);
                    self.guard
                        .blacklist_pair(feedback.original, healed, feedback.reason);
                }
            }
            FeedbackKind::Positive => {
                self.guard.record_trust_positive();
            }
            FeedbackKind::FalseNegative => {}
        }
    }

    /// Whether the current mode applies heals for the given action.
    pub fn should_apply(&self, action: ActionType) -> bool {
        self.config.mode.applies(action.is_destructive())
    }

    pub fn mode(&self) -> HealMode {
        self.config.mode
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn breaker_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn heals_used(&self) -> u32 {
        self.heals_used.load(AtomicOrdering::SeqCst)
    }

    pub(crate) fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub(crate) fn guard(&self) -> &GuardrailPolicy {
        &self.guard
    }

    pub(crate) fn learner(&self) -> &PatternLearner {
        &self.learner
    }
}
