//! Heuristic candidate generation
//!
//! Given a snapshot and the declared intent of the failed step,
//! produce ranked replacement-element candidates. A scoring error on
//! one node is logged and skipped, never fatal to the episode.

mod family;
mod score;
mod selector;

pub use family::{is_custom_dropdown, ControlFamily};
pub use score::{discover_label, extract_keywords, ScoreError};
pub use selector::synthesize;

use selheal_core_types::{ElementCandidate, UiSnapshot};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Generator limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Candidates scoring below this are dropped.
    pub min_score: f64,
    /// At most this many candidates are returned.
    pub max_candidates: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            min_score: 0.3,
            max_candidates: 5,
        }
    }
}

/// Produces ranked replacement candidates from a snapshot.
#[derive(Debug, Default)]
pub struct CandidateGenerator {
    config: GeneratorConfig,
}

impl CandidateGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Generate candidates for the given intent and control family,
    /// best first, capped at `max_candidates`.
    pub fn generate(
        &self,
        snapshot: &UiSnapshot,
        intent: &str,
        family: ControlFamily,
    ) -> Vec<ElementCandidate> {
        let keywords = extract_keywords(intent);
        let exact_matches = snapshot
            .elements
            .iter()
            .filter(|e| family.is_exact_match(e))
            .count();
        let sole_candidate = exact_matches == 1;

        let mut candidates: Vec<ElementCandidate> = Vec::new();
        for element in &snapshot.elements {
            if !family.is_relevant(element) {
                continue;
            }
            let score = match score::score_element(
                element,
                snapshot,
                &keywords,
                family,
                sole_candidate,
            ) {
                Ok(score) => score,
                Err(err) => {
                    warn!(tag = %element.tag, %err, "skipping unscorable element");
                    continue;
                }
            };
            if score < self.config.min_score {
                continue;
            }

            let locator = synthesize(element, snapshot);
            let explanation = explain(element, &keywords, score);
            let mut candidate = ElementCandidate::new(locator, score, explanation)
                .with_tag(element.tag.clone());
            candidate.attributes = element.attributes.clone();
            if let Some(id) = &element.id {
                candidate.attributes.insert("id".into(), id.clone());
            }
            if !element.classes.is_empty() {
                candidate
                    .attributes
                    .insert("class".into(), element.classes.join(" "));
            }
            candidates.push(candidate);
        }

        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(self.config.max_candidates);
        debug!(
            count = candidates.len(),
            family = ?family,
            "generated heuristic candidates"
        );
        candidates
    }
}

fn explain(
    element: &selheal_core_types::ElementSnapshot,
    keywords: &[String],
    score: f64,
) -> String {
    let mut parts = vec![format!("<{}>", element.tag)];
    if let Some(text) = &element.text {
        if keywords.iter().any(|k| text.to_lowercase().contains(k.as_str())) {
            parts.push(format!("text '{}' matches intent", text.trim()));
        }
    }
    if let Some(label) = element.accessible_label() {
        parts.push(format!("labelled '{}'", label));
    }
    if element.visible && element.enabled {
        parts.push("visible and enabled".to_string());
    }
    parts.push(format!("score {:.2}", score));
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use selheal_core_types::ElementSnapshot;

    fn login_page() -> UiSnapshot {
        let mut snapshot = UiSnapshot::new("https://the-internet.example/login", "Login Page");

        let mut heading = ElementSnapshot::with_tag("h2");
        heading.text = Some("Login Page".into());
        snapshot.push_element(heading);

        let mut button = ElementSnapshot::with_tag("button");
        button.classes = vec!["radius".into()];
        button.input_type = Some("submit".into());
        snapshot.push_element(button);

        snapshot
    }

    #[test]
    fn lone_submit_button_scores_high_for_click_intent() {
        let generator = CandidateGenerator::default();
        let candidates = generator.generate(
            &login_page(),
            "click login button",
            ControlFamily::Button,
        );

        assert!(!candidates.is_empty());
        let best = &candidates[0];
        assert_eq!(best.selector.value, "button.radius");
        assert!(
            best.confidence >= 0.75,
            "expected >= 0.75, got {}",
            best.confidence
        );
    }

    #[test]
    fn irrelevant_elements_are_dropped() {
        let generator = CandidateGenerator::default();
        let candidates = generator.generate(
            &login_page(),
            "click login button",
            ControlFamily::Button,
        );
        assert!(candidates.iter().all(|c| c.tag != "h2"));
    }

    #[test]
    fn results_are_ranked_and_capped() {
        let mut snapshot = UiSnapshot::new("https://example.com/form", "Form");
        for i in 0..10 {
            let mut button = ElementSnapshot::with_tag("button");
            button.id = Some(format!("btn-{i}"));
            if i == 3 {
                button.text = Some("Save changes".into());
            }
            snapshot.push_element(button);
        }

        let generator = CandidateGenerator::default();
        let candidates =
            generator.generate(&snapshot, "click save changes", ControlFamily::Button);

        assert!(candidates.len() <= 5);
        assert_eq!(candidates[0].selector.value, "#btn-3");
        for pair in candidates.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn unscorable_elements_are_skipped_not_fatal() {
        let mut snapshot = login_page();
        snapshot.push_element(ElementSnapshot::default()); // no tag

        let generator = CandidateGenerator::default();
        let candidates = generator.generate(
            &snapshot,
            "click login button",
            ControlFamily::Generic,
        );
        // The malformed element is skipped; others still score.
        assert!(candidates.iter().all(|c| !c.tag.is_empty()));
    }

    #[test]
    fn labelled_input_beats_unlabelled_for_text_intent() {
        let mut snapshot = UiSnapshot::new("https://example.com/login", "Login");

        let mut label = ElementSnapshot::with_tag("label");
        label.attributes.insert("for".into(), "username".into());
        label.text = Some("Username".into());
        snapshot.push_element(label);

        let mut username = ElementSnapshot::with_tag("input");
        username.id = Some("username".into());
        snapshot.push_element(username);

        let mut other = ElementSnapshot::with_tag("input");
        other.id = Some("captcha".into());
        snapshot.push_element(other);

        let generator = CandidateGenerator::default();
        let candidates = generator.generate(
            &snapshot,
            "type username into username field",
            ControlFamily::TextInput,
        );

        assert!(!candidates.is_empty());
        assert_eq!(candidates[0].selector.value, "#username");
    }
}
