//! Deterministic keyword rules used when generation is unavailable or fails.
//!
//! Rules are checked in order against both input names (case-insensitive
//! substring match). The first match names the result `"<first> <suffix>"`;
//! when nothing matches the result is `"<first> essence"`.

use serde::{Deserialize, Serialize};

use crate::element::RecipeOutcome;
use crate::state::GENERIC_GLYPH;

/// Suffix used when no rule matches.
pub const GENERIC_SUFFIX: &str = "essence";

/// One keyword → suffix/glyph rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackRule {
    pub keyword: String,
    pub suffix: String,
    pub glyph: String,
}

impl FallbackRule {
    pub fn new(keyword: &str, suffix: &str, glyph: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            suffix: suffix.to_string(),
            glyph: glyph.to_string(),
        }
    }

    fn matches(&self, name: &str) -> bool {
        !self.keyword.is_empty() && name.to_lowercase().contains(&self.keyword.to_lowercase())
    }
}

/// Ordered rule list. The first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackRules {
    rules: Vec<FallbackRule>,
}

impl Default for FallbackRules {
    fn default() -> Self {
        Self::new(vec![
            FallbackRule::new("water", "juice", "💧"),
            FallbackRule::new("fire", "ember", "🔥"),
            FallbackRule::new("earth", "clay", "🪨"),
            FallbackRule::new("air", "breeze", "💨"),
            FallbackRule::new("energy", "spark", "⚡"),
            FallbackRule::new("life", "sprout", "🌱"),
            FallbackRule::new("stone", "pebble", "🪨"),
            FallbackRule::new("ice", "shard", "🧊"),
        ])
    }
}

impl FallbackRules {
    pub fn new(rules: Vec<FallbackRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[FallbackRule] {
        &self.rules
    }

    /// Synthesize an outcome for `first` + `second`. Never fails.
    pub fn synthesize(&self, first: &str, second: &str) -> RecipeOutcome {
        match self
            .rules
            .iter()
            .find(|rule| rule.matches(first) || rule.matches(second))
        {
            Some(rule) => RecipeOutcome::new(format!("{first} {}", rule.suffix), rule.glyph.clone()),
            None => RecipeOutcome::new(format!("{first} {GENERIC_SUFFIX}"), GENERIC_GLYPH),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_in_either_input_matches() {
        let rules = FallbackRules::default();
        assert_eq!(
            rules.synthesize("Cat", "Water"),
            RecipeOutcome::new("Cat juice", "💧")
        );
        assert_eq!(
            rules.synthesize("Fire", "Unobtainium"),
            RecipeOutcome::new("Fire ember", "🔥")
        );
    }

    #[test]
    fn first_rule_in_order_wins() {
        let rules = FallbackRules::default();
        // "Fire" and "Water" both match; water comes first in the list.
        assert_eq!(rules.synthesize("Fire", "Water").result, "Fire juice");
    }

    #[test]
    fn match_is_case_insensitive_substring() {
        let rules = FallbackRules::default();
        assert_eq!(rules.synthesize("Saltwater", "Cat").result, "Saltwater juice");
        assert_eq!(rules.synthesize("WILDFIRE", "Cat").glyph, "🔥");
    }

    #[test]
    fn no_match_yields_essence() {
        let rules = FallbackRules::default();
        assert_eq!(
            rules.synthesize("Unobtainium", "Cat"),
            RecipeOutcome::new("Unobtainium essence", GENERIC_GLYPH)
        );
        let empty = FallbackRules::new(Vec::new());
        assert_eq!(empty.synthesize("Fire", "Water").result, "Fire essence");
    }

    #[test]
    fn empty_keyword_never_matches() {
        let rules = FallbackRules::new(vec![FallbackRule::new("", "void", "🕳️")]);
        assert_eq!(rules.synthesize("Fire", "Water").result, "Fire essence");
    }
}
