//! CSS selector synthesis for snapshot elements.

use selheal_core_types::{ElementSnapshot, LocatorInfo, UiSnapshot};

/// Build the most stable selector available for an element:
/// id, then name, then a class combination unique in the snapshot,
/// then tag with positional disambiguation.
pub fn synthesize(element: &ElementSnapshot, snapshot: &UiSnapshot) -> LocatorInfo {
    if let Some(id) = &element.id {
        if !id.is_empty() {
            return LocatorInfo::css(format!("#{}", css_escape(id)));
        }
    }

    if let Some(name) = &element.name {
        if !name.is_empty() {
            return LocatorInfo::css(format!("{}[name=\"{}\"]", element.tag, name));
        }
    }

    if !element.classes.is_empty() {
        let selector = format!("{}.{}", element.tag, element.classes.join("."));
        if count_matching_classes(snapshot, element) == 1 {
            return LocatorInfo::css(selector);
        }
    }

    let position = snapshot
        .elements
        .iter()
        .filter(|e| e.tag == element.tag)
        .position(|e| std::ptr::eq(e, element))
        .unwrap_or(0);
    LocatorInfo::css(format!("{}:nth-of-type({})", element.tag, position + 1))
}

fn count_matching_classes(snapshot: &UiSnapshot, element: &ElementSnapshot) -> usize {
    snapshot
        .elements
        .iter()
        .filter(|e| e.tag == element.tag && e.classes == element.classes)
        .count()
}

/// Escape characters CSS treats specially in identifiers.
fn css_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_id_then_name_then_classes() {
        let mut snapshot = UiSnapshot::new("https://example.com", "t");

        let mut by_id = ElementSnapshot::with_tag("button");
        by_id.id = Some("save".into());
        snapshot.push_element(by_id.clone());
        assert_eq!(synthesize(&by_id, &snapshot).value, "#save");

        let mut by_name = ElementSnapshot::with_tag("input");
        by_name.name = Some("email".into());
        snapshot.push_element(by_name.clone());
        assert_eq!(
            synthesize(&by_name, &snapshot).value,
            "input[name=\"email\"]"
        );

        let mut by_class = ElementSnapshot::with_tag("button");
        by_class.classes = vec!["radius".into()];
        snapshot.push_element(by_class.clone());
        assert_eq!(synthesize(&by_class, &snapshot).value, "button.radius");
    }

    #[test]
    fn ambiguous_classes_fall_back_to_position() {
        let mut snapshot = UiSnapshot::new("https://example.com", "t");
        let mut first = ElementSnapshot::with_tag("button");
        first.classes = vec!["cta".into()];
        let second = first.clone();
        snapshot.push_element(first);
        snapshot.push_element(second);

        let selector = synthesize(&snapshot.elements[1], &snapshot);
        assert_eq!(selector.value, "button:nth-of-type(2)");
    }

    #[test]
    fn ids_are_escaped() {
        let mut snapshot = UiSnapshot::new("https://example.com", "t");
        let mut el = ElementSnapshot::with_tag("div");
        el.id = Some("a:b".into());
        snapshot.push_element(el.clone());
        assert_eq!(synthesize(&el, &snapshot).value, "#a\\:b");
    }
}
