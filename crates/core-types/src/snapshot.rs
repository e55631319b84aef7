//! Page state captured at failure time
//!
//! Snapshots are immutable per capture: the pipeline never mutates
//! them, it only reads and scores.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bounding rectangle of an element in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One DOM element as captured at failure time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementSnapshot {
    /// Lowercase tag name
    pub tag: String,

    pub id: Option<String>,
    pub name: Option<String>,
    pub classes: Vec<String>,

    /// Trimmed visible text
    pub text: Option<String>,

    /// aria-* attributes keyed without the prefix ("label", "labelledby", ...)
    pub aria: BTreeMap<String, String>,

    /// `role` attribute when present
    pub role: Option<String>,

    pub placeholder: Option<String>,

    /// `type` attribute for inputs/buttons
    pub input_type: Option<String>,

    /// Other attributes worth matching on (data-*, href, value)
    pub attributes: BTreeMap<String, String>,

    pub rect: Option<BoundingRect>,
    pub visible: bool,
    pub enabled: bool,

    /// Label texts discovered near this element, in discovery order.
    pub nearby_labels: Vec<String>,

    /// Ancestor chain, outermost first, e.g. ["form#login", "div.row"].
    pub container_path: Vec<String>,
}

impl ElementSnapshot {
    /// Convenience constructor for the common tag-only case.
    pub fn with_tag(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            visible: true,
            enabled: true,
            ..Default::default()
        }
    }

    /// Accessible label, preferring aria-label over discovered labels.
    pub fn accessible_label(&self) -> Option<&str> {
        self.aria
            .get("label")
            .map(String::as_str)
            .or_else(|| self.nearby_labels.first().map(String::as_str))
    }
}

/// Page state for one failure episode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiSnapshot {
    pub url: String,
    pub title: String,

    /// Detected page language, BCP 47 tag when known.
    pub language: Option<String>,

    /// Elements in document order.
    pub elements: Vec<ElementSnapshot>,

    /// Optional screenshot, base64-encoded PNG.
    pub screenshot_b64: Option<String>,
}

impl UiSnapshot {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn push_element(&mut self, element: ElementSnapshot) {
        self.elements.push(element);
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
