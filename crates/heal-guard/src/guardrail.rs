//! Guardrail policy
//!
//! Applied after arbitration (or the heuristic-only fallback) to every
//! proposed heal. Rejection is a refusal value with a reason, distinct
//! from arbitration failure.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use selheal_core_types::{ActionType, LocatorInfo, TrustLevel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Guardrail configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Base minimum confidence for accepting a heal.
    pub min_confidence: f64,

    /// Whether destructive actions (submit, delete) may be healed.
    pub allow_destructive: bool,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.7,
            allow_destructive: false,
        }
    }
}

/// Guardrail verdict for one proposed heal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Verdict {
    Approved,
    Refused { reason: String },
}

impl Verdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, Verdict::Approved)
    }

    fn refused(reason: impl Into<String>) -> Self {
        Verdict::Refused {
            reason: reason.into(),
        }
    }
}

/// One blacklisted (original, healed) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub original: LocatorInfo,
    pub healed: LocatorInfo,
    pub reason: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Safety checks gating every proposed heal.
pub struct GuardrailPolicy {
    config: GuardrailConfig,
    blacklist: RwLock<HashMap<(String, String), BlacklistEntry>>,
    trust: RwLock<TrustLevel>,
}

impl GuardrailPolicy {
    pub fn new(config: GuardrailConfig) -> Self {
        Self {
            config,
            blacklist: RwLock::new(HashMap::new()),
            trust: RwLock::new(TrustLevel::new()),
        }
    }

    /// Evaluate a proposed heal. Checks run cheapest-first; the first
    /// violated guardrail wins.
    pub fn evaluate(
        &self,
        action: ActionType,
        original: &LocatorInfo,
        proposed: &LocatorInfo,
        confidence: f64,
    ) -> Verdict {
        if self.is_blacklisted(original, proposed) {
            debug!(%original, %proposed, "heal refused: blacklisted pair");
            return Verdict::refused(format!(
                "pair {} -> {} is blacklisted",
                original, proposed
            ));
        }

        if action.is_destructive() && !self.config.allow_destructive {
            return Verdict::refused(format!(
                "action '{}' is destructive and destructive heals are not allowed",
                action.name()
            ));
        }

        let required = self.effective_min_confidence();
        if confidence < required {
            return Verdict::refused(format!(
                "confidence {:.2} below required minimum {:.2}",
                confidence, required
            ));
        }

        Verdict::Approved
    }

    /// Minimum confidence after trust-level tightening, capped at 1.0.
    pub fn effective_min_confidence(&self) -> f64 {
        (self.config.min_confidence + self.trust.read().confidence_penalty()).min(1.0)
    }

    pub fn blacklist_pair(
        &self,
        original: LocatorInfo,
        healed: LocatorInfo,
        reason: Option<String>,
    ) {
        let key = (original.key(), healed.key());
        self.blacklist.write().insert(
            key,
            BlacklistEntry {
                original,
                healed,
                reason,
                added_at: Utc::now(),
            },
        );
    }

    pub fn is_blacklisted(&self, original: &LocatorInfo, healed: &LocatorInfo) -> bool {
        self.blacklist
            .read()
            .contains_key(&(original.key(), healed.key()))
    }

    pub fn record_trust_positive(&self) {
        self.trust.write().record_positive();
    }

    pub fn record_trust_negative(&self) {
        self.trust.write().record_negative();
    }

    pub fn trust(&self) -> TrustLevel {
        *self.trust.read()
    }

    /// Export the blacklist for the persistence boundary.
    pub fn export_blacklist(&self) -> Vec<BlacklistEntry> {
        let mut entries: Vec<BlacklistEntry> =
            self.blacklist.read().values().cloned().collect();
        entries.sort_by_key(|e| e.added_at);
        entries
    }

    /// Import previously exported entries, merging with current ones.
    pub fn import_blacklist(&self, entries: Vec<BlacklistEntry>) {
        let mut blacklist = self.blacklist.write();
        for entry in entries {
            blacklist.insert((entry.original.key(), entry.healed.key()), entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(min_confidence: f64) -> GuardrailPolicy {
        GuardrailPolicy::new(GuardrailConfig {
            min_confidence,
            allow_destructive: false,
        })
    }

    #[test]
    fn rejects_below_minimum_for_any_threshold() {
        for min in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let policy = policy(min);
            let original = LocatorInfo::id("old");
            let proposed = LocatorInfo::css(".new");

            let below = (min - 0.01).max(-0.0);
            if below < min {
                let verdict =
                    policy.evaluate(ActionType::Click, &original, &proposed, below);
                assert!(!verdict.is_approved(), "min={min}");
            }
            let verdict = policy.evaluate(ActionType::Click, &original, &proposed, min);
            assert!(verdict.is_approved(), "min={min}");
        }
    }

    #[test]
    fn destructive_actions_need_explicit_allowance() {
        let policy = policy(0.5);
        let original = LocatorInfo::id("old");
        let proposed = LocatorInfo::css(".new");

        let verdict = policy.evaluate(ActionType::Submit, &original, &proposed, 0.99);
        assert!(matches!(verdict, Verdict::Refused { .. }));

        let permissive = GuardrailPolicy::new(GuardrailConfig {
            min_confidence: 0.5,
            allow_destructive: true,
        });
        let verdict = permissive.evaluate(ActionType::Submit, &original, &proposed, 0.99);
        assert!(verdict.is_approved());
    }

    #[test]
    fn blacklisted_pairs_are_refused() {
        let policy = policy(0.5);
        let original = LocatorInfo::id("old");
        let proposed = LocatorInfo::css(".new");

        policy.blacklist_pair(original.clone(), proposed.clone(), Some("flaky".into()));
        let verdict = policy.evaluate(ActionType::Click, &original, &proposed, 0.99);
        assert!(matches!(verdict, Verdict::Refused { .. }));

        // A different proposal for the same original is unaffected.
        let other = LocatorInfo::css(".other");
        let verdict = policy.evaluate(ActionType::Click, &original, &other, 0.99);
        assert!(verdict.is_approved());
    }

    #[test]
    fn low_trust_tightens_minimum() {
        let policy = policy(0.7);
        let original = LocatorInfo::id("old");
        let proposed = LocatorInfo::css(".new");

        assert!(policy
            .evaluate(ActionType::Click, &original, &proposed, 0.75)
            .is_approved());

        for _ in 0..3 {
            policy.record_trust_negative();
        }
        // 0.7 + 3 * 0.05 = 0.85 now required.
        assert!(!policy
            .evaluate(ActionType::Click, &original, &proposed, 0.75)
            .is_approved());
        assert!(policy
            .evaluate(ActionType::Click, &original, &proposed, 0.90)
            .is_approved());
    }

    #[test]
    fn blacklist_round_trips_through_export() {
        let policy = policy(0.5);
        policy.blacklist_pair(LocatorInfo::id("a"), LocatorInfo::css(".b"), None);
        let exported = policy.export_blacklist();
        assert_eq!(exported.len(), 1);

        let restored = GuardrailPolicy::new(GuardrailConfig::default());
        restored.import_blacklist(exported);
        assert!(restored.is_blacklisted(&LocatorInfo::id("a"), &LocatorInfo::css(".b")));
    }
}
