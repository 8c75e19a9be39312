//! Record classification
//!
//! A classifier maps a piece of text to a category name or to nothing.
//! [`KeywordClassifier`] is the stock implementation: an ordered list of
//! literal substrings where the first one found wins. It is a plain
//! substring test, so a keyword inside a string literal, comment or
//! identifier matches exactly like a real statement keyword.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Operation keywords recognised by default, in priority order
pub const DEFAULT_KEYWORDS: [&str; 3] = ["SELECT", "INSERT", "UPDATE"];

/// Which text of a trace record is inspected for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClassifyTarget {
    /// The request text column
    #[default]
    Request,
    /// The parameters map serialized to JSON
    Parameters,
}

impl std::fmt::Display for ClassifyTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request => write!(f, "request"),
            Self::Parameters => write!(f, "parameters"),
        }
    }
}

/// Maps text to a category, or `None` when the text should be discarded
pub trait Classifier: Send + Sync {
    fn classify(&self, text: &str) -> Option<String>;
}

/// Ordered substring rules
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS)
    }
}

impl KeywordClassifier {
    /// Create a classifier; earlier keywords take priority over later ones
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(Into::into)
                .filter(|k: &String| !k.is_empty())
                .collect(),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Option<String> {
        self.keywords
            .iter()
            .find(|k| text.contains(k.as_str()))
            .cloned()
    }
}
