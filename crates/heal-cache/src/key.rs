//! Cache key derivation
//!
//! Key = sha256 over a canonical JSON rendering of (normalized page
//! pattern, original locator, action, intent hint). Canonical JSON
//! keeps the hash stable across field reordering.

use once_cell::sync::Lazy;
use regex::Regex;
use selheal_core_types::{ActionType, LocatorInfo};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use url::Url;

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("uuid segment regex")
});
static HEX_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{16,}$").expect("hex segment regex"));

/// Normalize a URL into a page pattern shared by all instances of the
/// same page template.
///
/// Numeric ids, UUIDs and long hex tokens in the path collapse to `*`;
/// query string and fragment are dropped entirely. Unparseable input
/// falls back to the trimmed raw string so keying still works.
pub fn normalize_page_pattern(raw_url: &str) -> String {
    let parsed = match Url::parse(raw_url.trim()) {
        Ok(url) => url,
        Err(_) => return raw_url.trim().to_string(),
    };

    let host = parsed.host_str().unwrap_or_default();
    let mut pattern = String::from(host);
    if let Some(segments) = parsed.path_segments() {
        for segment in segments.filter(|s| !s.is_empty()) {
            pattern.push('/');
            if is_volatile_segment(segment) {
                pattern.push('*');
            } else {
                pattern.push_str(segment);
            }
        }
    }
    pattern
}

fn is_volatile_segment(segment: &str) -> bool {
    segment.chars().all(|c| c.is_ascii_digit())
        || UUID_SEGMENT.is_match(segment)
        || HEX_SEGMENT.is_match(segment)
}

/// Hash key for one (page, locator, action, intent) combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(pub String);

impl CacheKey {
    pub fn derive(
        page_url: &str,
        original: &LocatorInfo,
        action: ActionType,
        intent_hint: &str,
    ) -> Self {
        let canonical = json!({
            "page": normalize_page_pattern(page_url),
            "locator": original.key(),
            "action": action.name(),
            "intent": intent_hint.trim().to_lowercase(),
        });
        let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_uuid_segments_collapse() {
        assert_eq!(
            normalize_page_pattern("https://shop.example.com/orders/12345/edit?tab=2#top"),
            "shop.example.com/orders/*/edit"
        );
        assert_eq!(
            normalize_page_pattern(
                "https://app.example.com/user/0b8a9cde-1234-4f5a-9b2c-aabbccddeeff"
            ),
            "app.example.com/user/*"
        );
    }

    #[test]
    fn pages_sharing_a_pattern_share_keys() {
        let locator = LocatorInfo::id("login-btn");
        let a = CacheKey::derive(
            "https://example.com/orders/111",
            &locator,
            ActionType::Click,
            "click login",
        );
        let b = CacheKey::derive(
            "https://example.com/orders/999",
            &locator,
            ActionType::Click,
            "click login",
        );
        assert_eq!(a, b);
    }

    #[test]
    fn key_differs_by_action_and_intent() {
        let locator = LocatorInfo::id("login-btn");
        let url = "https://example.com/login";
        let click = CacheKey::derive(url, &locator, ActionType::Click, "click login");
        let typed = CacheKey::derive(url, &locator, ActionType::TypeText, "click login");
        let other = CacheKey::derive(url, &locator, ActionType::Click, "open settings");
        assert_ne!(click, typed);
        assert_ne!(click, other);
    }

    #[test]
    fn unparseable_url_falls_back_to_raw() {
        assert_eq!(normalize_page_pattern("  not a url "), "not a url");
    }
}
