use std::fmt;

use serde::Deserialize;

/// Opaque reference to an element rendered in the host page.
///
/// Handles are only valid until the host UI re-renders the element; callers
/// re-resolve them instead of holding on to them across navigation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub title: String,
    pub handle: ElementHandle,
}

impl Conversation {
    pub fn new(title: impl Into<String>, handle: ElementHandle) -> Self {
        Self {
            title: title.into(),
            handle,
        }
    }

    /// Titles are compared after trimming; the host list pads some entries.
    pub fn matches(&self, title: &str) -> bool {
        self.title.trim() == title.trim()
    }

    /// File-system friendly version of the title used for output paths.
    pub fn sanitized_title(title: &str) -> String {
        let cleaned: String = title
            .trim()
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();

        let cleaned = cleaned.trim_matches('.').trim();
        if cleaned.is_empty() {
            "untitled".to_string()
        } else {
            cleaned.to_string()
        }
    }
}
