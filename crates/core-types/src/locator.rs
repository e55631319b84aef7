//! Locator model
//!
//! A locator is a (strategy, value) pair identifying a DOM element.
//! Equality and hashing are by the pair, so two locators with the same
//! strategy and value are interchangeable in caches and pattern maps.

use serde::{Deserialize, Serialize};

/// Locator strategy enumeration
///
/// Mirrors the strategies ordinary WebDriver-style suites declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorStrategy {
    Id,
    Name,
    Class,
    Css,
    XPath,
    LinkText,
    PartialLinkText,
    Tag,
}

impl LocatorStrategy {
    /// Get strategy name as string
    pub fn name(&self) -> &'static str {
        match self {
            LocatorStrategy::Id => "id",
            LocatorStrategy::Name => "name",
            LocatorStrategy::Class => "class",
            LocatorStrategy::Css => "css",
            LocatorStrategy::XPath => "xpath",
            LocatorStrategy::LinkText => "link-text",
            LocatorStrategy::PartialLinkText => "partial-link-text",
            LocatorStrategy::Tag => "tag",
        }
    }
}

/// A (strategy, value) pair identifying a DOM element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocatorInfo {
    pub strategy: LocatorStrategy,
    pub value: String,
}

impl LocatorInfo {
    pub fn new(strategy: LocatorStrategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    /// CSS selector locator
    pub fn css(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::Css, value)
    }

    /// Element id locator
    pub fn id(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::Id, value)
    }

    /// XPath locator
    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::XPath, value)
    }

    /// Stable key used by caches and pattern maps.
    pub fn key(&self) -> String {
        format!("{}:{}", self.strategy.name(), self.value)
    }
}

impl std::fmt::Display for LocatorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.strategy.name(), self.value)
    }
}

/// Action the failed test step was attempting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Click,
    TypeText,
    Select,
    Hover,
    Check,
    Submit,
    Delete,
    Navigate,
    Read,
}

impl ActionType {
    /// Actions that mutate remote state and must not be healed
    /// automatically unless explicitly allowed.
    pub fn is_destructive(&self) -> bool {
        matches!(self, ActionType::Submit | ActionType::Delete)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActionType::Click => "click",
            ActionType::TypeText => "type_text",
            ActionType::Select => "select",
            ActionType::Hover => "hover",
            ActionType::Check => "check",
            ActionType::Submit => "submit",
            ActionType::Delete => "delete",
            ActionType::Navigate => "navigate",
            ActionType::Read => "read",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn locator_equality_is_by_strategy_and_value() {
        let a = LocatorInfo::css("#login");
        let b = LocatorInfo::new(LocatorStrategy::Css, "#login");
        let c = LocatorInfo::id("#login");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn destructive_actions() {
        assert!(ActionType::Submit.is_destructive());
        assert!(ActionType::Delete.is_destructive());
        assert!(!ActionType::Click.is_destructive());
        assert!(!ActionType::TypeText.is_destructive());
    }

    #[test]
    fn locator_key_format() {
        assert_eq!(LocatorInfo::css(".btn").key(), "css:.btn");
        assert_eq!(LocatorInfo::id("main").key(), "id:main");
    }
}
