//! Learned pattern model and transformation mining.

use chrono::{DateTime, Utc};
use selheal_core_types::{LocatorInfo, LocatorStrategy};
use serde::{Deserialize, Serialize};

/// A mined transformation rule generalizing one correction to other
/// selectors with the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Transformation {
    /// Replace a fragment inside an id-style value. `lead`/`trail`
    /// pin the fragment to the neighbourhood it was mined in: the
    /// character before it (None means start of value) and the
    /// character after it (None means end of value).
    IdFragment {
        from: String,
        to: String,
        #[serde(default)]
        lead: Option<char>,
        #[serde(default)]
        trail: Option<char>,
    },
    /// Replace one class name with another inside a CSS selector.
    ClassSubstitution { from: String, to: String },
}

impl Transformation {
    /// Apply the rule to another locator, if it matches.
    pub fn apply(&self, locator: &LocatorInfo) -> Option<LocatorInfo> {
        match self {
            Transformation::IdFragment {
                from,
                to,
                lead,
                trail,
            } => {
                if from.is_empty() {
                    return None;
                }
                let value = &locator.value;
                for (start, _) in value.match_indices(from.as_str()) {
                    let end = start + from.len();
                    let lead_ok = match lead {
                        Some(c) => value[..start].chars().next_back() == Some(*c),
                        None => start == 0,
                    };
                    let trail_ok = match trail {
                        Some(c) => value[end..].chars().next() == Some(*c),
                        None => end == value.len(),
                    };
                    if lead_ok && trail_ok {
                        let healed = format!("{}{}{}", &value[..start], to, &value[end..]);
                        return Some(LocatorInfo::new(locator.strategy, healed));
                    }
                }
                None
            }
            Transformation::ClassSubstitution { from, to } => {
                if !matches!(
                    locator.strategy,
                    LocatorStrategy::Css | LocatorStrategy::Class
                ) {
                    return None;
                }
                if from.is_empty() || !locator.value.contains(from.as_str()) {
                    return None;
                }
                let value = locator.value.replace(from.as_str(), to);
                Some(LocatorInfo::new(locator.strategy, value))
            }
        }
    }
}

/// Mine a transformation rule out of one (failed, correct) pair.
///
/// Works when both sides share the same strategy and a non-trivial
/// common prefix or suffix, e.g. `#login-btn-v1` -> `#login-btn-v2`
/// yields an id-fragment rule `v1 -> v2`.
pub fn mine_transformation(source: &LocatorInfo, target: &LocatorInfo) -> Option<Transformation> {
    if source.strategy != target.strategy || source.value == target.value {
        return None;
    }

    let (from, to, lead, trail) = differing_fragments(&source.value, &target.value)?;
    match source.strategy {
        LocatorStrategy::Id | LocatorStrategy::Name => Some(Transformation::IdFragment {
            from,
            to,
            lead,
            trail,
        }),
        LocatorStrategy::Class => Some(Transformation::ClassSubstitution { from, to }),
        LocatorStrategy::Css => {
            // Only mine class-ish substitutions for CSS selectors; a
            // rewrite of the whole selector generalizes to nothing.
            if source.value.starts_with('.') || source.value.starts_with('#') {
                Some(Transformation::ClassSubstitution { from, to })
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Strip the longest common prefix and suffix and return the middles
/// plus their anchoring neighbours (last prefix char, first suffix
/// char). Returns None when there is no shared affix to anchor the
/// rule on.
fn differing_fragments(a: &str, b: &str) -> Option<(String, String, Option<char>, Option<char>)> {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    let prefix = a_bytes
        .iter()
        .zip(b_bytes.iter())
        .take_while(|(x, y)| x == y)
        .count();

    let max_suffix = a_bytes.len().min(b_bytes.len()) - prefix;
    let suffix = a_bytes
        .iter()
        .rev()
        .zip(b_bytes.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
        .min(max_suffix);

    // A tiny shared affix anchors nothing worth generalizing.
    if prefix + suffix < 3 {
        return None;
    }

    let from = a.get(prefix..a.len() - suffix)?.to_string();
    let to = b.get(prefix..b.len() - suffix)?.to_string();
    // An empty `from` cannot anchor a replacement.
    if from.is_empty() {
        return None;
    }
    let lead = a.get(..prefix)?.chars().next_back();
    let trail = a.get(a.len() - suffix..)?.chars().next();
    Some((from, to, lead, trail))
}

/// A learned original -> replacement association.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorPattern {
    pub source: LocatorInfo,
    pub target: LocatorInfo,

    /// Decayed confidence in [floor, 0.99].
    pub confidence: f64,

    pub success_count: u32,
    pub failure_count: u32,

    pub transformation: Option<Transformation>,
    pub updated_at: DateTime<Utc>,
}

/// A rejected heal we must never propose again unchanged. Grows only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailurePattern {
    pub original: LocatorInfo,
    pub rejected: LocatorInfo,
    pub failures: u32,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mines_id_fragment_rule() {
        let rule = mine_transformation(
            &LocatorInfo::id("login-btn-v1"),
            &LocatorInfo::id("login-btn-v2"),
        )
        .expect("rule mined");
        assert_eq!(
            rule,
            Transformation::IdFragment {
                from: "1".into(),
                to: "2".into(),
                lead: Some('v'),
                trail: None,
            }
        );

        let healed = rule.apply(&LocatorInfo::id("signup-btn-v1")).unwrap();
        assert_eq!(healed, LocatorInfo::id("signup-btn-v2"));
    }

    #[test]
    fn fragment_rule_ignores_unanchored_occurrences() {
        let rule = mine_transformation(
            &LocatorInfo::id("login-btn-v1"),
            &LocatorInfo::id("login-btn-v2"),
        )
        .expect("rule mined");

        // "1" also appears mid-value; only the anchored trailing "v1"
        // may be rewritten.
        let healed = rule.apply(&LocatorInfo::id("p1-signup-v1")).unwrap();
        assert_eq!(healed, LocatorInfo::id("p1-signup-v2"));

        // No anchored occurrence at all: the rule does not fire.
        assert!(rule.apply(&LocatorInfo::id("p1-signup")).is_none());
    }

    #[test]
    fn mines_class_substitution_for_css() {
        let rule = mine_transformation(
            &LocatorInfo::css(".btn-primary"),
            &LocatorInfo::css(".btn-main"),
        )
        .expect("rule mined");
        let healed = rule.apply(&LocatorInfo::css("form .btn-primary")).unwrap();
        assert_eq!(healed.value, "form .btn-main");
    }

    #[test]
    fn no_rule_without_shared_affix() {
        assert!(mine_transformation(
            &LocatorInfo::id("alpha"),
            &LocatorInfo::id("zulu-omega")
        )
        .is_none());
    }

    #[test]
    fn no_rule_across_strategies() {
        assert!(mine_transformation(
            &LocatorInfo::id("login-btn"),
            &LocatorInfo::css("#login-btn")
        )
        .is_none());
    }

    #[test]
    fn class_rule_skips_non_css_locators() {
        let rule = Transformation::ClassSubstitution {
            from: "old".into(),
            to: "new".into(),
        };
        assert!(rule.apply(&LocatorInfo::xpath("//div[@class='old']")).is_none());
    }
}
