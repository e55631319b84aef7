//! Structured prompt construction
//!
//! Everything rendered into the prompt is bounded: candidate count,
//! per-field length, and page-state element count, so a pathological
//! page cannot blow up request size or cost.

use selheal_core_types::{ElementCandidate, FailureContext, UiSnapshot};

const MAX_PROMPT_CANDIDATES: usize = 5;
const MAX_FIELD_LEN: usize = 120;
const MAX_PAGE_ELEMENTS: usize = 20;

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{cut}…")
}

/// Render the arbitration prompt for one failure episode.
pub fn build_prompt(
    ctx: &FailureContext,
    snapshot: &UiSnapshot,
    candidates: &[ElementCandidate],
) -> String {
    let mut out = String::with_capacity(2048);

    out.push_str("You are arbitrating a failed UI element lookup in an automated browser test.\n");
    out.push_str("Pick the replacement element that serves the same purpose, or refuse.\n\n");

    out.push_str("## Context\n");
    if let Some(feature) = &ctx.feature_id {
        out.push_str(&format!("Feature: {}\n", truncate(feature, MAX_FIELD_LEN)));
    }
    if let Some(scenario) = &ctx.scenario_id {
        out.push_str(&format!("Scenario: {}\n", truncate(scenario, MAX_FIELD_LEN)));
    }
    out.push_str(&format!("Step: {}\n", truncate(&ctx.step_text, MAX_FIELD_LEN)));
    out.push_str(&format!("Action: {}\n\n", ctx.action.name()));

    out.push_str("## Failure\n");
    out.push_str(&format!("Original selector: {}\n", ctx.original));
    out.push_str(&format!(
        "Exception: {}: {}\n\n",
        truncate(&ctx.exception_kind, MAX_FIELD_LEN),
        truncate(&ctx.exception_message, MAX_FIELD_LEN)
    ));

    out.push_str("## Page state\n");
    out.push_str(&format!("URL: {}\n", truncate(&snapshot.url, MAX_FIELD_LEN)));
    out.push_str(&format!(
        "Title: {}\n",
        truncate(&snapshot.title, MAX_FIELD_LEN)
    ));
    if let Some(language) = &snapshot.language {
        out.push_str(&format!("Language: {language}\n"));
    }
    for element in snapshot.elements.iter().take(MAX_PAGE_ELEMENTS) {
        let text = element.text.as_deref().unwrap_or_default();
        out.push_str(&format!(
            "- <{}> id={} classes=[{}] text=\"{}\"\n",
            element.tag,
            element.id.as_deref().unwrap_or("-"),
            truncate(&element.classes.join(" "), MAX_FIELD_LEN),
            truncate(text, MAX_FIELD_LEN),
        ));
    }
    if snapshot.elements.len() > MAX_PAGE_ELEMENTS {
        out.push_str(&format!(
            "… {} more elements omitted\n",
            snapshot.elements.len() - MAX_PAGE_ELEMENTS
        ));
    }
    out.push('\n');

    out.push_str("## Candidates\n");
    for (index, candidate) in candidates.iter().take(MAX_PROMPT_CANDIDATES).enumerate() {
        out.push_str(&format!(
            "{index}. {} (heuristic {:.2}) — {}\n",
            candidate.selector,
            candidate.confidence,
            truncate(&candidate.explanation, MAX_FIELD_LEN),
        ));
    }
    out.push('\n');

    out.push_str("## Response\n");
    out.push_str("Respond with a single JSON object, no prose, with exactly these fields:\n");
    out.push_str("{\n");
    out.push_str("  \"can_heal\": bool,\n");
    out.push_str("  \"confidence\": number in [0,1],\n");
    out.push_str("  \"selected_element_index\": int | null,\n");
    out.push_str("  \"reasoning\": string,\n");
    out.push_str("  \"alternative_indices\": [int],\n");
    out.push_str("  \"warnings\": [string],\n");
    out.push_str("  \"refusal_reason\": string | null\n");
    out.push_str("}\n");

    out
}
