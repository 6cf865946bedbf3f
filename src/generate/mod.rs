//! Recipe generation for pairs the recipe table does not know yet.
//!
//! Two sources, tried in order:
//! - a [`Generator`] (the generative text collaborator, e.g. [`OllamaGenerator`])
//! - [`FallbackRules`], deterministic keyword rules that always produce a recipe
//!
//! A generator failure is never surfaced to the player; it only selects the
//! fallback path.

pub mod fallback;
pub mod ollama;

pub use fallback::{FallbackRule, FallbackRules};
pub use ollama::{LlmError, OllamaConfig, OllamaGenerator};

use serde::Deserialize;

use crate::element::{KEY_SEPARATOR, RecipeOutcome};

/// Maximum length, in characters, of a generated element name.
pub const MAX_RESULT_CHARS: usize = 48;

/// Maximum length, in characters, of a generated glyph.
pub const MAX_GLYPH_CHARS: usize = 8;

/// System instruction sent with every generation request.
pub const SYSTEM_PROMPT: &str = "You are the combination oracle of an element crafting game. \
    Given two elements, invent the single element created by combining them. \
    Reply with only a JSON object of the form {\"result\": \"<element name>\", \"glyph\": \"<one emoji>\"}. \
    The name is one to three words, capitalized. No other text.";

/// The generative text collaborator.
pub trait Generator: Send + Sync {
    /// Propose the outcome of combining `first` with `second` (order as given).
    fn propose(&self, first: &str, second: &str) -> Result<RecipeOutcome, LlmError>;

    /// Short name for diagnostics.
    fn name(&self) -> String;
}

/// User prompt for one pair.
pub fn pair_prompt(first: &str, second: &str) -> String {
    format!("Combine \"{first}\" + \"{second}\".")
}

#[derive(Debug, Deserialize)]
struct ProposalJson {
    result: String,
    #[serde(alias = "emoji")]
    glyph: String,
}

/// Parse a model reply into a recipe outcome.
///
/// Accepts a bare JSON object or one wrapped in surrounding prose. The result
/// is trimmed; both fields must be non-empty and short.
pub fn parse_proposal(reply: &str) -> Result<RecipeOutcome, LlmError> {
    let trimmed = reply.trim();
    let json_str = if trimmed.starts_with('{') {
        trimmed
    } else {
        let start = trimmed.find('{');
        let end = trimmed.rfind('}');
        match (start, end) {
            (Some(s), Some(e)) if e > s => &trimmed[s..=e],
            _ => {
                return Err(LlmError::ParseError {
                    message: "no JSON object found in response".into(),
                });
            }
        }
    };

    let parsed: ProposalJson = serde_json::from_str(json_str).map_err(|e| LlmError::ParseError {
        message: format!("JSON parse error: {e}"),
    })?;

    let result = parsed.result.trim();
    let glyph = parsed.glyph.trim();
    let result_len = result.chars().count();
    let glyph_len = glyph.chars().count();

    if result_len == 0 || result_len > MAX_RESULT_CHARS {
        return Err(LlmError::ParseError {
            message: format!("result must be 1-{MAX_RESULT_CHARS} characters, got {result_len}"),
        });
    }
    if result.contains(KEY_SEPARATOR) {
        return Err(LlmError::ParseError {
            message: format!("result {result:?} contains the key separator {KEY_SEPARATOR:?}"),
        });
    }
    if glyph_len == 0 || glyph_len > MAX_GLYPH_CHARS {
        return Err(LlmError::ParseError {
            message: format!("glyph must be 1-{MAX_GLYPH_CHARS} characters, got {glyph_len}"),
        });
    }

    Ok(RecipeOutcome::new(result, glyph))
}
