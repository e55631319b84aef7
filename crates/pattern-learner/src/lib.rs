//! Adaptive pattern learning from corrective feedback
//!
//! The learner keeps two stores: learned original -> replacement
//! associations with decayed confidence, and failure patterns that
//! suppress repeat mistakes. Both are safe under concurrent callers
//! and export as serializable bundles.

mod patterns;

pub use patterns::{mine_transformation, FailurePattern, LocatorPattern, Transformation};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use selheal_core_types::{FeedbackKind, LocatorInfo};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Learner tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerConfig {
    /// Fixed confidence increment on confirmation.
    pub confidence_step: f64,
    /// Confidence never decays below this floor.
    pub confidence_floor: f64,
    /// Confidence never grows above this cap.
    pub confidence_cap: f64,
    /// Failure count at which a pair is vetoed outright.
    pub veto_threshold: u32,
    /// Initial confidence for a fresh association.
    pub initial_confidence: f64,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            confidence_step: 0.1,
            confidence_floor: 0.2,
            confidence_cap: 0.99,
            veto_threshold: 2,
            initial_confidence: 0.6,
        }
    }
}

/// A ranked suggestion surfaced from learned patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedSuggestion {
    pub locator: LocatorInfo,
    pub confidence: f64,
    /// True when produced by a mined transformation rather than a
    /// direct association.
    pub via_transformation: bool,
}

/// Serializable learner state for the persistence boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerBundle {
    pub exported_at: DateTime<Utc>,
    pub patterns: Vec<LocatorPattern>,
    pub failures: Vec<FailurePattern>,
}

/// Maintains learned transformation/association patterns.
pub struct PatternLearner {
    config: LearnerConfig,
    patterns: RwLock<HashMap<(String, String), LocatorPattern>>,
    failures: RwLock<HashMap<(String, String), FailurePattern>>,
}

impl PatternLearner {
    pub fn new(config: LearnerConfig) -> Self {
        Self {
            config,
            patterns: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
        }
    }

    /// Feed one piece of feedback into the learning loop.
    ///
    /// `healed` is the selector the pipeline chose (when it chose one);
    /// `correct` is the caller-supplied truth for CORRECTION and the
    /// suggestion for FALSE_NEGATIVE.
    pub fn record_feedback(
        &self,
        kind: FeedbackKind,
        original: &LocatorInfo,
        healed: Option<&LocatorInfo>,
        correct: Option<&LocatorInfo>,
    ) {
        match kind {
            FeedbackKind::Correction => {
                if let Some(healed) = healed {
                    self.record_failure_pattern(original, healed);
                }
                if let Some(correct) = correct {
                    self.confirm_association(original, correct, true);
                }
            }
            FeedbackKind::Negative => {
                if let Some(healed) = healed {
                    self.record_failure_pattern(original, healed);
                    self.decay_association(original, healed);
                }
            }
            FeedbackKind::Positive => {
                if let Some(healed) = healed {
                    self.confirm_association(original, healed, false);
                }
            }
            FeedbackKind::FalseNegative => {
                if let Some(suggestion) = correct {
                    self.confirm_association(original, suggestion, true);
                }
            }
        }
    }

    /// Learned suggestions for a failed selector, best first.
    ///
    /// Direct associations come back at their stored confidence;
    /// mined transformations apply at a discount. Anything below the
    /// floor, or matching a veto-level failure pattern, is dropped.
    pub fn suggestions(&self, original: &LocatorInfo) -> Vec<LearnedSuggestion> {
        let patterns = self.patterns.read();
        let mut out: Vec<LearnedSuggestion> = Vec::new();

        for pattern in patterns.values() {
            if pattern.source == *original && pattern.confidence >= self.config.confidence_floor {
                out.push(LearnedSuggestion {
                    locator: pattern.target.clone(),
                    confidence: pattern.confidence,
                    via_transformation: false,
                });
            }
        }

        // Transformations mined from other corrections may still fit.
        for pattern in patterns.values() {
            if pattern.source == *original {
                continue;
            }
            let Some(rule) = &pattern.transformation else {
                continue;
            };
            if let Some(candidate) = rule.apply(original) {
                let confidence = pattern.confidence * 0.8;
                if confidence >= self.config.confidence_floor {
                    out.push(LearnedSuggestion {
                        locator: candidate,
                        confidence,
                        via_transformation: true,
                    });
                }
            }
        }
        drop(patterns);

        out.retain(|s| !self.is_vetoed(original, &s.locator));
        out.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        out.dedup_by(|a, b| a.locator == b.locator);
        out
    }

    /// Whether this pair has failed often enough to be vetoed outright.
    pub fn is_vetoed(&self, original: &LocatorInfo, candidate: &LocatorInfo) -> bool {
        self.failures
            .read()
            .get(&(original.key(), candidate.key()))
            .map(|p| p.failures >= self.config.veto_threshold)
            .unwrap_or(false)
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.read().len()
    }

    pub fn export(&self) -> LearnerBundle {
        let mut patterns: Vec<LocatorPattern> =
            self.patterns.read().values().cloned().collect();
        patterns.sort_by_key(|p| p.updated_at);
        let mut failures: Vec<FailurePattern> =
            self.failures.read().values().cloned().collect();
        failures.sort_by_key(|p| p.updated_at);
        LearnerBundle {
            exported_at: Utc::now(),
            patterns,
            failures,
        }
    }

    /// Merge a previously exported bundle. Existing entries win on
    /// conflict when they are fresher.
    pub fn import(&self, bundle: LearnerBundle) {
        let mut patterns = self.patterns.write();
        for pattern in bundle.patterns {
            let key = (pattern.source.key(), pattern.target.key());
            match patterns.get(&key) {
                Some(existing) if existing.updated_at >= pattern.updated_at => {}
                _ => {
                    patterns.insert(key, pattern);
                }
            }
        }
        drop(patterns);

        let mut failures = self.failures.write();
        for failure in bundle.failures {
            let key = (failure.original.key(), failure.rejected.key());
            match failures.get_mut(&key) {
                Some(existing) => existing.failures = existing.failures.max(failure.failures),
                None => {
                    failures.insert(key, failure);
                }
            }
        }
    }

    fn confirm_association(&self, source: &LocatorInfo, target: &LocatorInfo, mine: bool) {
        let mut patterns = self.patterns.write();
        let key = (source.key(), target.key());
        let entry = patterns.entry(key).or_insert_with(|| LocatorPattern {
            source: source.clone(),
            target: target.clone(),
            confidence: self.config.initial_confidence - self.config.confidence_step,
            success_count: 0,
            failure_count: 0,
            transformation: None,
            updated_at: Utc::now(),
        });
        entry.confidence =
            (entry.confidence + self.config.confidence_step).min(self.config.confidence_cap);
        entry.success_count += 1;
        entry.updated_at = Utc::now();
        if mine && entry.transformation.is_none() {
            entry.transformation = mine_transformation(source, target);
            if entry.transformation.is_some() {
                info!(%source, %target, "mined transformation rule from correction");
            }
        }
        debug!(
            %source,
            %target,
            confidence = entry.confidence,
            "association confirmed"
        );
    }

    fn decay_association(&self, source: &LocatorInfo, target: &LocatorInfo) {
        let mut patterns = self.patterns.write();
        if let Some(entry) = patterns.get_mut(&(source.key(), target.key())) {
            entry.confidence =
                (entry.confidence - self.config.confidence_step).max(self.config.confidence_floor);
            entry.failure_count += 1;
            entry.updated_at = Utc::now();
        }
    }

    fn record_failure_pattern(&self, original: &LocatorInfo, rejected: &LocatorInfo) {
        let mut failures = self.failures.write();
        let entry = failures
            .entry((original.key(), rejected.key()))
            .or_insert_with(|| FailurePattern {
                original: original.clone(),
                rejected: rejected.clone(),
                failures: 0,
                updated_at: Utc::now(),
            });
        entry.failures += 1;
        entry.updated_at = Utc::now();
    }
}

impl Default for PatternLearner {
    fn default() -> Self {
        Self::new(LearnerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn learner() -> PatternLearner {
        PatternLearner::default()
    }

    #[test]
    fn repeated_correction_converges_on_one_entry_with_rising_confidence() {
        let learner = learner();
        let old = LocatorInfo::id("old-id");
        let new = LocatorInfo::id("new-id");

        learner.record_feedback(FeedbackKind::Correction, &old, None, Some(&new));
        let first = learner.suggestions(&old);
        assert_eq!(first.len(), 1);
        let c1 = first[0].confidence;

        learner.record_feedback(FeedbackKind::Correction, &old, None, Some(&new));
        let second = learner.suggestions(&old);
        assert_eq!(second.len(), 1, "no duplicate pattern entries");
        assert!(second[0].confidence > c1);
        assert_eq!(learner.pattern_count(), 1);
    }

    #[test]
    fn confidence_caps_at_099() {
        let learner = learner();
        let old = LocatorInfo::id("old");
        let new = LocatorInfo::id("new-old");

        for _ in 0..20 {
            learner.record_feedback(FeedbackKind::Correction, &old, None, Some(&new));
        }
        let suggestions = learner.suggestions(&old);
        assert!(suggestions[0].confidence <= 0.99);
    }

    #[test]
    fn negative_feedback_decays_but_not_below_floor() {
        let learner = learner();
        let old = LocatorInfo::id("old");
        let healed = LocatorInfo::css(".healed");

        learner.record_feedback(FeedbackKind::Positive, &old, Some(&healed), None);
        for _ in 0..20 {
            learner.record_feedback(FeedbackKind::Negative, &old, Some(&healed), None);
        }

        let patterns = learner.patterns.read();
        let entry = patterns
            .get(&(old.key(), healed.key()))
            .expect("pattern retained");
        assert!((entry.confidence - 0.2).abs() < 1e-9, "clamped at floor");
    }

    #[test]
    fn repeated_failures_veto_the_pair() {
        let learner = learner();
        let old = LocatorInfo::id("old");
        let bad = LocatorInfo::css(".bad");

        learner.record_feedback(FeedbackKind::Negative, &old, Some(&bad), None);
        assert!(!learner.is_vetoed(&old, &bad));
        learner.record_feedback(FeedbackKind::Negative, &old, Some(&bad), None);
        assert!(learner.is_vetoed(&old, &bad));
    }

    #[test]
    fn vetoed_pairs_never_surface_as_suggestions() {
        let learner = learner();
        let old = LocatorInfo::id("old");
        let bad = LocatorInfo::css(".bad");

        // Learn it positively first, then fail it twice.
        learner.record_feedback(FeedbackKind::Positive, &old, Some(&bad), None);
        learner.record_feedback(FeedbackKind::Positive, &old, Some(&bad), None);
        learner.record_feedback(FeedbackKind::Negative, &old, Some(&bad), None);
        learner.record_feedback(FeedbackKind::Negative, &old, Some(&bad), None);

        assert!(learner.suggestions(&old).is_empty());
    }

    #[test]
    fn transformation_generalizes_to_sibling_selectors() {
        let learner = learner();
        let old = LocatorInfo::id("login-btn-v1");
        let new = LocatorInfo::id("login-btn-v2");
        learner.record_feedback(FeedbackKind::Correction, &old, None, Some(&new));

        let sibling = LocatorInfo::id("signup-btn-v1");
        let suggestions = learner.suggestions(&sibling);
        assert!(!suggestions.is_empty());
        assert!(suggestions[0].via_transformation);
        assert_eq!(suggestions[0].locator, LocatorInfo::id("signup-btn-v2"));
    }

    #[test]
    fn bundle_round_trip_preserves_patterns_and_vetoes() {
        let learner = learner();
        let old = LocatorInfo::id("old");
        let new = LocatorInfo::id("new-old");
        let bad = LocatorInfo::css(".bad");
        learner.record_feedback(FeedbackKind::Correction, &old, Some(&bad), Some(&new));
        learner.record_feedback(FeedbackKind::Negative, &old, Some(&bad), None);

        let json = serde_json::to_string(&learner.export()).expect("serialize");
        let bundle: LearnerBundle = serde_json::from_str(&json).expect("deserialize");

        let restored = PatternLearner::default();
        restored.import(bundle);
        assert_eq!(restored.pattern_count(), 1);
        assert!(restored.is_vetoed(&old, &bad));
    }

    #[test]
    fn false_negative_records_suggested_mapping() {
        let learner = learner();
        let old = LocatorInfo::id("old");
        let suggested = LocatorInfo::css(".suggested");
        learner.record_feedback(FeedbackKind::FalseNegative, &old, None, Some(&suggested));

        let suggestions = learner.suggestions(&old);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].locator, suggested);
    }
}
