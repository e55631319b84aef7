//! Candidate and decision types
//!
//! `HealDecision` is the pre-guardrail arbitration output;
//! `HealOutcome` is what the pipeline ultimately returns to callers.
//! Domain outcomes are values, never errors.

use crate::LocatorInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A proposed replacement element with scoring information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementCandidate {
    pub selector: LocatorInfo,

    /// Confidence score in [0, 1].
    pub confidence: f64,

    /// Short human-readable justification.
    pub explanation: String,

    /// Tag of the underlying element
    pub tag: String,

    /// Attributes worth showing to the arbitrator
    pub attributes: BTreeMap<String, String>,
}

impl ElementCandidate {
    pub fn new(selector: LocatorInfo, confidence: f64, explanation: impl Into<String>) -> Self {
        Self {
            selector,
            confidence: confidence.clamp(0.0, 1.0),
            explanation: explanation.into(),
            tag: String::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Check if this is a high-confidence match (>= 0.8)
    pub fn is_high_confidence(&self) -> bool {
        self.confidence >= 0.8
    }
}

/// Invalid decision shapes rejected at construction.
#[derive(Debug, Error, PartialEq)]
pub enum DecisionError {
    #[error("refusal must not carry a selected candidate")]
    RefusalWithSelection,
    #[error("selected index {index} out of range for {len} candidates")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),
}

/// Arbitration output, before guardrails are applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealDecision {
    pub can_heal: bool,
    pub confidence: f64,
    pub selected_index: Option<usize>,
    pub reasoning: String,
    pub alternative_indices: Vec<usize>,
    pub warnings: Vec<String>,
    pub refusal_reason: Option<String>,
}

impl HealDecision {
    /// Positive decision selecting `index` among the offered candidates.
    pub fn heal(index: usize, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            can_heal: true,
            confidence,
            selected_index: Some(index),
            reasoning: reasoning.into(),
            alternative_indices: Vec::new(),
            warnings: Vec::new(),
            refusal_reason: None,
        }
    }

    /// Refusal with a reason; carries no selection by construction.
    pub fn refuse(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            can_heal: false,
            confidence: 0.0,
            selected_index: None,
            reasoning: reason.clone(),
            alternative_indices: Vec::new(),
            warnings: Vec::new(),
            refusal_reason: Some(reason),
        }
    }

    /// Enforce the structural invariants against a candidate list.
    pub fn validate(&self, candidate_count: usize) -> Result<(), DecisionError> {
        if !self.can_heal && self.selected_index.is_some() {
            return Err(DecisionError::RefusalWithSelection);
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(DecisionError::ConfidenceOutOfRange(self.confidence));
        }
        if let Some(index) = self.selected_index {
            if index >= candidate_count {
                return Err(DecisionError::IndexOutOfRange {
                    index,
                    len: candidate_count,
                });
            }
        }
        Ok(())
    }
}

/// Where a chosen locator came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Cache,
    Arbitrator,
    Heuristic,
    Learned,
}

impl DecisionSource {
    pub fn name(&self) -> &'static str {
        match self {
            DecisionSource::Cache => "cache",
            DecisionSource::Arbitrator => "arbitrator",
            DecisionSource::Heuristic => "heuristic",
            DecisionSource::Learned => "learned",
        }
    }
}

/// Final pipeline outcome, after guardrails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HealOutcome {
    /// Successfully healed with a replacement locator.
    Healed {
        locator: LocatorInfo,
        confidence: f64,
        source: DecisionSource,
        reasoning: String,
    },

    /// A guardrail or the arbitrator declined; healing is possible in
    /// principle but was not taken.
    Refused { reason: String },

    /// No usable candidate existed or all collaborators failed.
    Failed { reason: String },

    /// Healing is switched off for this run.
    Disabled,
}

impl HealOutcome {
    pub fn is_healed(&self) -> bool {
        matches!(self, HealOutcome::Healed { .. })
    }

    pub fn healed_locator(&self) -> Option<&LocatorInfo> {
        match self {
            HealOutcome::Healed { locator, .. } => Some(locator),
            _ => None,
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        match self {
            HealOutcome::Healed { confidence, .. } => Some(*confidence),
            _ => None,
        }
    }
}

/// Adaptive trust score gating guardrail strictness.
///
/// Starts neutral; confirmed heals raise it, wrong heals lower it.
/// The numeric score is clamped so a burst of bad feedback cannot
/// drive the gate to an unrecoverable extreme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustLevel {
    score: i32,
}

impl TrustLevel {
    pub const MIN: i32 = -5;
    pub const MAX: i32 = 5;

    pub fn new() -> Self {
        Self { score: 0 }
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn record_positive(&mut self) {
        self.score = (self.score + 1).min(Self::MAX);
    }

    pub fn record_negative(&mut self) {
        self.score = (self.score - 1).max(Self::MIN);
    }

    /// Additional confidence demanded on top of the configured minimum.
    /// Zero or negative trust tightens; high trust never loosens below
    /// the configured floor.
    pub fn confidence_penalty(&self) -> f64 {
        if self.score >= 0 {
            0.0
        } else {
            f64::from(-self.score) * 0.05
        }
    }
}

impl Default for TrustLevel {
    fn default() -> Self {
        Self::new()
    }
}
