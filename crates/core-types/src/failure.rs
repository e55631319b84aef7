//! Failure episode context
//!
//! Read-only once created: the pipeline treats the context as the
//! ground truth of what the test step was trying to do.

use crate::{ActionType, LocatorInfo};
use serde::{Deserialize, Serialize};

/// Context describing one failed element lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    pub feature_id: Option<String>,
    pub scenario_id: Option<String>,
    pub step_id: Option<String>,

    /// Exception class reported by the driver, e.g. "NoSuchElement".
    pub exception_kind: String,
    pub exception_message: String,

    /// The selector that failed.
    pub original: LocatorInfo,

    /// Human-readable step text; doubles as intent for scoring.
    pub step_text: String,

    /// "file:line" when the runner knows it.
    pub source_location: Option<String>,

    pub action: ActionType,
}

impl FailureContext {
    pub fn new(
        original: LocatorInfo,
        action: ActionType,
        step_text: impl Into<String>,
    ) -> Self {
        Self {
            feature_id: None,
            scenario_id: None,
            step_id: None,
            exception_kind: "NoSuchElement".to_string(),
            exception_message: String::new(),
            original,
            step_text: step_text.into(),
            source_location: None,
            action,
        }
    }

    pub fn with_exception(
        mut self,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.exception_kind = kind.into();
        self.exception_message = message.into();
        self
    }

    pub fn with_scenario(
        mut self,
        feature: impl Into<String>,
        scenario: impl Into<String>,
        step: impl Into<String>,
    ) -> Self {
        self.feature_id = Some(feature.into());
        self.scenario_id = Some(scenario.into());
        self.step_id = Some(step.into());
        self
    }

    /// Declared intent of the step ("click login button").
    pub fn intent(&self) -> &str {
        &self.step_text
    }
}

/// Feedback kinds accepted by the learning loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    /// Heal was wrong; the true selector is supplied.
    Correction,
    /// Heal was wrong; no correction available.
    Negative,
    /// Heal confirmed correct.
    Positive,
    /// Healing was wrongly refused; a suggestion is supplied.
    FalseNegative,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_context() {
        let ctx = FailureContext::new(
            LocatorInfo::css("#login-btn"),
            ActionType::Click,
            "click login button",
        )
        .with_exception("NoSuchElement", "no element matches #login-btn")
        .with_scenario("auth", "login", "step-3");

        assert_eq!(ctx.intent(), "click login button");
        assert_eq!(ctx.scenario_id.as_deref(), Some("login"));
        assert_eq!(ctx.exception_kind, "NoSuchElement");
    }
}
