//! Response parsing and repair
//!
//! Providers are asked for bare JSON but routinely wrap it in fences
//! or prose. Parsing strips the wrapping; a missing required field is
//! a parse failure, not a silent default; one repair attempt (outer
//! brace trim) runs before declaring failure.

use crate::errors::ParseError;
use selheal_core_types::HealDecision;
use serde::Deserialize;
use tracing::debug;

/// Wire shape of the arbitrator response. `can_heal`, `confidence` and
/// `reasoning` are required; everything else has a sensible absent
/// state that is distinct from a missing required field.
#[derive(Debug, Deserialize)]
struct WireDecision {
    can_heal: bool,
    confidence: f64,
    reasoning: String,
    #[serde(default)]
    selected_element_index: Option<usize>,
    #[serde(default)]
    alternative_indices: Vec<usize>,
    #[serde(default)]
    warnings: Vec<String>,
    #[serde(default)]
    refusal_reason: Option<String>,
}

/// Parse the provider response into a [`HealDecision`].
pub fn parse_decision(raw: &str, candidate_count: usize) -> Result<HealDecision, ParseError> {
    let stripped = strip_wrapping(raw);

    let wire: WireDecision = match serde_json::from_str(&stripped) {
        Ok(wire) => wire,
        Err(first_err) => {
            // One repair attempt: trim to the outermost brace pair.
            let repaired = outer_brace_trim(&stripped).ok_or(ParseError::NoJson)?;
            debug!("initial parse failed ({first_err}), retrying on brace-trimmed body");
            serde_json::from_str(&repaired).map_err(|err| classify_serde_error(&err))?
        }
    };

    let decision = HealDecision {
        can_heal: wire.can_heal,
        confidence: wire.confidence.clamp(0.0, 1.0),
        selected_index: wire.selected_element_index,
        reasoning: wire.reasoning,
        alternative_indices: wire.alternative_indices,
        warnings: wire.warnings,
        refusal_reason: wire.refusal_reason,
    };

    decision
        .validate(candidate_count)
        .map_err(|err| ParseError::InvalidDecision(err.to_string()))?;
    Ok(decision)
}

fn classify_serde_error(err: &serde_json::Error) -> ParseError {
    let message = err.to_string();
    if let Some(rest) = message.strip_prefix("missing field `") {
        if let Some(field) = rest.split('`').next() {
            return ParseError::MissingField(field.to_string());
        }
    }
    ParseError::InvalidJson(message)
}

/// Remove markdown fences and any prose before/after the JSON body.
fn strip_wrapping(raw: &str) -> String {
    let trimmed = raw.trim();

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        // Skip an optional language tag on the fence line.
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(end) = body.find("```") {
            return body[..end].trim().to_string();
        }
    }

    trimmed.to_string()
}

/// Cut to the outermost `{ ... }` pair, if any.
fn outer_brace_trim(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(raw[start..=end].to_string())
}
