//! Markup parsing capability.
//!
//! Link discovery only needs a flat view of the document: every element as a
//! tag name plus its attributes, in document order. [`MarkupParser`] captures
//! that so tests can hand in records directly instead of HTML.

use scraper::{ElementRef, Html};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One element of a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    /// Lowercase tag name (`a`, `div`, ...).
    pub tag: String,
    /// Attributes in source order.
    pub attributes: Vec<(String, String)>,
}

impl TagRecord {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
        }
    }

    /// Builder-style attribute append (used by tests and fake parsers).
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Value of the first attribute called `name`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Turns raw markup into a sequence of element records.
pub trait MarkupParser: Send + Sync {
    fn parse(&self, markup: &str) -> Vec<TagRecord>;
}

// ---------------------------------------------------------------------------
// scraper-backed implementation
// ---------------------------------------------------------------------------

/// HTML5 parser backed by `scraper` (html5ever). Tolerates broken markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlParser;

impl MarkupParser for HtmlParser {
    fn parse(&self, markup: &str) -> Vec<TagRecord> {
        let doc = Html::parse_document(markup);

        doc.root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .map(|el| {
                let value = el.value();
                TagRecord {
                    tag: value.name().to_string(),
                    attributes: value
                        .attrs()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                }
            })
            .collect()
    }
}
