//! Control families
//!
//! Scoring is specialized per control family: the family decides which
//! tags/roles are relevant and what counts as an exact control match.

use selheal_core_types::{ActionType, ElementSnapshot};
use serde::{Deserialize, Serialize};

/// Broad category of the control the failed step was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlFamily {
    Button,
    TextInput,
    Select,
    Checkbox,
    Link,
    Generic,
}

impl ControlFamily {
    /// Infer the family from the attempted action and intent text.
    pub fn infer(action: ActionType, intent: &str) -> Self {
        let intent = intent.to_lowercase();
        match action {
            ActionType::TypeText => ControlFamily::TextInput,
            ActionType::Select => ControlFamily::Select,
            ActionType::Check => ControlFamily::Checkbox,
            ActionType::Click | ActionType::Submit => {
                if intent.contains("link") {
                    ControlFamily::Link
                } else if intent.contains("checkbox") {
                    ControlFamily::Checkbox
                } else if intent.contains("dropdown") || intent.contains("select") {
                    ControlFamily::Select
                } else {
                    ControlFamily::Button
                }
            }
            _ => ControlFamily::Generic,
        }
    }

    /// Whether the element could possibly serve this family at all.
    pub fn is_relevant(&self, element: &ElementSnapshot) -> bool {
        match self {
            ControlFamily::Button => matches!(
                element.tag.as_str(),
                "button" | "input" | "a" | "div" | "span"
            ),
            ControlFamily::TextInput => {
                matches!(element.tag.as_str(), "input" | "textarea" | "div")
            }
            ControlFamily::Select => {
                element.tag == "select" || is_custom_dropdown(element) || element.tag == "input"
            }
            ControlFamily::Checkbox => matches!(element.tag.as_str(), "input" | "div" | "span"),
            ControlFamily::Link => matches!(element.tag.as_str(), "a" | "button" | "span"),
            ControlFamily::Generic => true,
        }
    }

    /// Whether the element is exactly the kind of control this family
    /// describes, as opposed to merely plausible.
    pub fn is_exact_match(&self, element: &ElementSnapshot) -> bool {
        let input_type = element.input_type.as_deref().unwrap_or_default();
        let role = element.role.as_deref().unwrap_or_default();
        match self {
            ControlFamily::Button => {
                element.tag == "button"
                    || (element.tag == "input" && matches!(input_type, "button" | "submit"))
                    || role == "button"
            }
            ControlFamily::TextInput => {
                element.tag == "textarea"
                    || (element.tag == "input"
                        && matches!(
                            input_type,
                            "" | "text" | "email" | "password" | "search" | "tel" | "url" | "number"
                        ))
                    || role == "textbox"
            }
            ControlFamily::Select => element.tag == "select" || is_custom_dropdown(element),
            ControlFamily::Checkbox => {
                (element.tag == "input" && matches!(input_type, "checkbox" | "radio"))
                    || matches!(role, "checkbox" | "radio" | "switch")
            }
            ControlFamily::Link => element.tag == "a" || role == "link",
            ControlFamily::Generic => false,
        }
    }
}

/// Custom dropdown detection: role attributes, or class/data-attribute
/// names following common widget-library patterns.
pub fn is_custom_dropdown(element: &ElementSnapshot) -> bool {
    if matches!(
        element.role.as_deref(),
        Some("combobox") | Some("listbox") | Some("menu")
    ) {
        return true;
    }
    let name_pattern =
        |s: &str| s.contains("dropdown") || s.contains("select") || s.contains("picker");
    if element.classes.iter().any(|c| name_pattern(&c.to_lowercase())) {
        return true;
    }
    element
        .attributes
        .keys()
        .any(|k| k.starts_with("data-") && name_pattern(&k.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_family_from_action() {
        assert_eq!(
            ControlFamily::infer(ActionType::TypeText, "enter username"),
            ControlFamily::TextInput
        );
        assert_eq!(
            ControlFamily::infer(ActionType::Click, "click login button"),
            ControlFamily::Button
        );
        assert_eq!(
            ControlFamily::infer(ActionType::Click, "open country dropdown"),
            ControlFamily::Select
        );
        assert_eq!(
            ControlFamily::infer(ActionType::Click, "follow terms link"),
            ControlFamily::Link
        );
    }

    #[test]
    fn detects_custom_dropdowns() {
        let mut el = ElementSnapshot::with_tag("div");
        assert!(!is_custom_dropdown(&el));

        el.role = Some("combobox".into());
        assert!(is_custom_dropdown(&el));

        let mut el = ElementSnapshot::with_tag("div");
        el.classes.push("ui-Dropdown-trigger".into());
        assert!(is_custom_dropdown(&el));

        let mut el = ElementSnapshot::with_tag("div");
        el.attributes
            .insert("data-select-id".into(), "country".into());
        assert!(is_custom_dropdown(&el));
    }

    #[test]
    fn button_family_exact_match() {
        let mut button = ElementSnapshot::with_tag("button");
        button.input_type = Some("submit".into());
        assert!(ControlFamily::Button.is_exact_match(&button));

        let div = ElementSnapshot::with_tag("div");
        assert!(!ControlFamily::Button.is_exact_match(&div));
        assert!(ControlFamily::Button.is_relevant(&div));
    }
}
