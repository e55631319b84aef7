//! Per-element scoring
//!
//! A weighted sum of independent signals, clamped to [0, 1]. Signal
//! weights favour human-facing text (labels, visible text) over
//! machine-facing attributes, since intent text is human language.

use crate::family::ControlFamily;
use selheal_core_types::{ElementSnapshot, UiSnapshot};
use thiserror::Error;

const WEIGHT_LABEL: f64 = 0.35;
const WEIGHT_TEXT: f64 = 0.35;
const WEIGHT_ARIA_LABEL: f64 = 0.30;
const WEIGHT_ID_NAME: f64 = 0.30;
const WEIGHT_PLACEHOLDER: f64 = 0.25;
const WEIGHT_CLASS_ATTR: f64 = 0.20;
const BONUS_EXACT_CONTROL: f64 = 0.50;
const BONUS_PARTIAL_CONTROL: f64 = 0.35;
const BONUS_INTERACTIVE: f64 = 0.15;
const BONUS_SOLE_CANDIDATE: f64 = 0.15;

/// Scoring failures on a single node; callers skip the node.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("element has no tag name")]
    MissingTag,
}

/// Words carrying no element-selection signal.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "be", "by", "for", "from", "i", "in", "into", "is", "it", "of",
    "on", "or", "should", "that", "the", "then", "this", "to", "user", "when", "with",
];

/// Extract lowercase keywords from intent text, stop words removed.
pub fn extract_keywords(intent: &str) -> Vec<String> {
    intent
        .split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 1 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Fraction of keywords found in `text`, in [0, 1].
fn overlap(keywords: &[String], text: &str) -> f64 {
    if keywords.is_empty() || text.is_empty() {
        return 0.0;
    }
    let text = text.to_lowercase();
    let matched = keywords.iter().filter(|k| text.contains(k.as_str())).count();
    matched as f64 / keywords.len() as f64
}

/// Label discovery for an element, first success wins:
/// explicit `label[for]` in the snapshot, then the labels the capture
/// recorded around the element (wrapping ancestor first, then
/// preceding sibling), then `aria-labelledby` resolution.
pub fn discover_label<'a>(element: &'a ElementSnapshot, snapshot: &'a UiSnapshot) -> Option<String> {
    if let Some(id) = &element.id {
        let explicit = snapshot.elements.iter().find(|e| {
            e.tag == "label" && e.attributes.get("for").map(String::as_str) == Some(id.as_str())
        });
        if let Some(label) = explicit.and_then(|e| e.text.clone()) {
            return Some(label);
        }
    }

    if let Some(nearby) = element.nearby_labels.first() {
        return Some(nearby.clone());
    }

    if let Some(labelled_by) = element.aria.get("labelledby") {
        let referenced = snapshot
            .elements
            .iter()
            .find(|e| e.id.as_deref() == Some(labelled_by.as_str()));
        if let Some(text) = referenced.and_then(|e| e.text.clone()) {
            return Some(text);
        }
    }

    None
}

/// Score one element against the intent keywords.
pub fn score_element(
    element: &ElementSnapshot,
    snapshot: &UiSnapshot,
    keywords: &[String],
    family: ControlFamily,
    sole_family_candidate: bool,
) -> Result<f64, ScoreError> {
    if element.tag.is_empty() {
        return Err(ScoreError::MissingTag);
    }

    let mut score = 0.0;

    if let Some(label) = discover_label(element, snapshot) {
        score += overlap(keywords, &label) * WEIGHT_LABEL;
    }
    if let Some(aria_label) = element.aria.get("label") {
        score += overlap(keywords, aria_label) * WEIGHT_ARIA_LABEL;
    }
    if let Some(placeholder) = &element.placeholder {
        score += overlap(keywords, placeholder) * WEIGHT_PLACEHOLDER;
    }
    if let Some(text) = &element.text {
        score += overlap(keywords, text) * WEIGHT_TEXT;
    }

    let id_name = [element.id.as_deref(), element.name.as_deref()]
        .iter()
        .flatten()
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    score += overlap(keywords, &id_name) * WEIGHT_ID_NAME;

    let class_attr = element.classes.join(" ");
    score += overlap(keywords, &class_attr) * WEIGHT_CLASS_ATTR;

    if family.is_exact_match(element) {
        score += BONUS_EXACT_CONTROL;
    } else if family.is_relevant(element) && family != ControlFamily::Generic {
        score += BONUS_PARTIAL_CONTROL;
    }

    if element.visible && element.enabled {
        score += BONUS_INTERACTIVE;
    }

    if sole_family_candidate && family.is_exact_match(element) {
        score += BONUS_SOLE_CANDIDATE;
    }

    Ok(score.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_drop_stop_words() {
        let keywords = extract_keywords("Click the Login button on this page");
        assert_eq!(keywords, vec!["click", "login", "button", "page"]);
    }

    #[test]
    fn overlap_is_fractional() {
        let keywords = extract_keywords("click login button");
        assert!((overlap(&keywords, "Login") - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(overlap(&keywords, ""), 0.0);
        assert_eq!(overlap(&[], "Login"), 0.0);
    }

    #[test]
    fn explicit_label_wins_over_nearby() {
        let mut input = ElementSnapshot::with_tag("input");
        input.id = Some("user".into());
        input.nearby_labels.push("Nearby".into());

        let mut label = ElementSnapshot::with_tag("label");
        label.attributes.insert("for".into(), "user".into());
        label.text = Some("Username".into());

        let mut snapshot = UiSnapshot::new("https://example.com", "Login");
        snapshot.push_element(label);
        snapshot.push_element(input.clone());

        assert_eq!(
            discover_label(&input, &snapshot).as_deref(),
            Some("Username")
        );
    }

    #[test]
    fn aria_labelledby_is_last_resort() {
        let mut input = ElementSnapshot::with_tag("input");
        input.aria.insert("labelledby".into(), "hdr".into());

        let mut header = ElementSnapshot::with_tag("h2");
        header.id = Some("hdr".into());
        header.text = Some("Shipping address".into());

        let mut snapshot = UiSnapshot::new("https://example.com", "Checkout");
        snapshot.push_element(header);
        snapshot.push_element(input.clone());

        assert_eq!(
            discover_label(&input, &snapshot).as_deref(),
            Some("Shipping address")
        );
    }

    #[test]
    fn missing_tag_is_a_score_error() {
        let element = ElementSnapshot::default();
        let snapshot = UiSnapshot::new("https://example.com", "t");
        let err = score_element(&element, &snapshot, &[], ControlFamily::Generic, false);
        assert!(err.is_err());
    }
}
