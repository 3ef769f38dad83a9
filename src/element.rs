//! Host element model, trackable selectors and label resolution
//!
//! The host page describes an interaction target as a chain of elements,
//! starting at the element that received the signal and walking outwards
//! through its ancestors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label used for clicked elements without any usable label
pub const CLICK_FALLBACK_LABEL: &str = "unlabeled_element";

/// Label used for hovered elements without any usable label
pub const HOVER_FALLBACK_LABEL: &str = "visual_asset";

/// A host element as seen by the tracker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Tag name (`button`, `img`, ...)
    #[serde(default)]
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Accessible label (`aria-label`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    /// Rendered text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_aria_label(mut self, label: &str) -> Self {
        self.aria_label = Some(label.to_string());
        self
    }

    pub fn with_alt(mut self, alt: &str) -> Self {
        self.alt = Some(alt.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    /// Lower-cased tag name
    pub fn tag_name(&self) -> String {
        self.tag.trim().to_ascii_lowercase()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// Minimal CSS-like selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// `button`
    Tag(&'static str),
    /// `.product-glow`
    Class(&'static str),
    /// `[data-track]`
    Attribute(&'static str),
}

impl Selector {
    pub fn matches(&self, element: &Element) -> bool {
        match self {
            Selector::Tag(tag) => element.tag.trim().eq_ignore_ascii_case(tag),
            Selector::Class(class) => element.has_class(class),
            Selector::Attribute(name) => element.attributes.contains_key(*name),
        }
    }
}

/// Elements whose clicks are tracked
pub const CLICK_SELECTORS: &[Selector] = &[
    Selector::Tag("button"),
    Selector::Tag("a"),
    Selector::Tag("img"),
    Selector::Attribute("data-track"),
    Selector::Class("product-glow"),
];

/// Elements whose sustained hover is tracked
pub const HOVER_SELECTORS: &[Selector] = &[
    Selector::Tag("img"),
    Selector::Tag("h1"),
    Selector::Tag("h2"),
    Selector::Tag("h3"),
    Selector::Tag("a"),
    Selector::Class("serif"),
    Selector::Class("product-glow"),
    Selector::Attribute("data-track"),
];

/// Nearest element in the chain (target first) matching any selector
pub fn closest<'a>(chain: &'a [Element], selectors: &[Selector]) -> Option<&'a Element> {
    chain
        .iter()
        .find(|element| selectors.iter().any(|s| s.matches(element)))
}

/// Resolve a human-readable label for an element.
///
/// The first non-empty of id, accessible label, alt text and trimmed text
/// (truncated to `max_chars` characters) wins; otherwise `fallback`.
pub fn resolve_label(element: &Element, max_chars: usize, fallback: &str) -> String {
    let non_empty = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    non_empty(&element.id)
        .or_else(|| non_empty(&element.aria_label))
        .or_else(|| non_empty(&element.alt))
        .or_else(|| non_empty(&element.text).map(|t| t.chars().take(max_chars).collect::<String>()))
        .map(|label| label.trim_end().to_string())
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}
