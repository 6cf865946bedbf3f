//! Elements, recipe keys, and recipe outcomes.
//!
//! A recipe is addressed by an unordered pair of element names. [`RecipeKey`]
//! canonicalizes the pair so `(a, b)` and `(b, a)` always land on the same
//! table entry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Separator placed between the two sorted names of a [`RecipeKey`].
pub const KEY_SEPARATOR: char = '_';

/// A named concept with a display glyph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    pub glyph: String,
}

impl Element {
    pub fn new(name: impl Into<String>, glyph: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            glyph: glyph.into(),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.glyph, self.name)
    }
}

/// Order-independent key for a pair of element names.
///
/// The names are sorted by byte order and joined with [`KEY_SEPARATOR`].
/// This is the exact format persisted in save documents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeKey(String);

impl RecipeKey {
    pub fn new(a: &str, b: &str) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{lo}{KEY_SEPARATOR}{hi}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a recipe produces.
///
/// Older saves spell the glyph field `emoji`; both are accepted on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeOutcome {
    pub result: String,
    #[serde(alias = "emoji")]
    pub glyph: String,
}

impl RecipeOutcome {
    pub fn new(result: impl Into<String>, glyph: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            glyph: glyph.into(),
        }
    }
}

/// Whether `name` can take part in a [`RecipeKey`] without colliding.
///
/// A name containing [`KEY_SEPARATOR`] would make `("A_B", "C")` and
/// `("A", "B_C")` share one key.
pub fn is_valid_name(name: &str) -> bool {
    !name.trim().is_empty() && !name.contains(KEY_SEPARATOR)
}

/// Trim an element name and reject blank ones or ones containing the key separator.
pub fn normalize_name(name: &str) -> Result<&str, EngineError> {
    let trimmed = name.trim();
    if !is_valid_name(trimmed) {
        return Err(EngineError::InvalidElement {
            name: name.to_string(),
        });
    }
    Ok(trimmed)
}
