//! In-memory engine state: element catalog, recipe table, discovery set.
//!
//! Ordered maps keep snapshots deterministic, so an export of the same state
//! always serializes to the same document.

use std::collections::{BTreeMap, BTreeSet};

use crate::element::{Element, RecipeKey, RecipeOutcome};

/// Glyph used for elements whose glyph is unknown.
pub const GENERIC_GLYPH: &str = "✨";

/// The three maps owned by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CraftState {
    pub elements: BTreeMap<String, String>,
    pub recipes: BTreeMap<RecipeKey, RecipeOutcome>,
    pub discovered: BTreeSet<String>,
}

impl CraftState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update an element's glyph.
    pub fn set_element(&mut self, name: &str, glyph: &str) {
        self.elements.insert(name.to_string(), glyph.to_string());
    }

    /// Insert an element only if the catalog does not have it yet.
    /// Returns whether it was added.
    pub fn add_element_if_absent(&mut self, name: &str, glyph: &str) -> bool {
        if self.elements.contains_key(name) {
            return false;
        }
        self.set_element(name, glyph);
        true
    }

    /// Insert a recipe only if the pair has none yet. Returns whether it was added.
    pub fn add_recipe_if_absent(&mut self, key: RecipeKey, outcome: RecipeOutcome) -> bool {
        if self.recipes.contains_key(&key) {
            return false;
        }
        self.recipes.insert(key, outcome);
        true
    }

    pub fn recipe(&self, key: &RecipeKey) -> Option<&RecipeOutcome> {
        self.recipes.get(key)
    }

    /// Mark an element discovered, adding it to the catalog if needed.
    /// Returns `true` when the element was not discovered before.
    pub fn discover(&mut self, name: &str, glyph: &str) -> bool {
        self.add_element_if_absent(name, glyph);
        self.discovered.insert(name.to_string())
    }

    pub fn is_discovered(&self, name: &str) -> bool {
        self.discovered.contains(name)
    }

    pub fn element(&self, name: &str) -> Option<Element> {
        self.elements
            .get(name)
            .map(|glyph| Element::new(name, glyph.clone()))
    }

    /// Restore the invariant that every discovered name is in the catalog.
    /// Returns how many catalog entries were added.
    pub fn repair_catalog(&mut self) -> usize {
        let missing: Vec<String> = self
            .discovered
            .iter()
            .filter(|name| !self.elements.contains_key(*name))
            .cloned()
            .collect();
        for name in &missing {
            tracing::debug!(element = %name, "adding discovered element missing from catalog");
            self.set_element(name, GENERIC_GLYPH);
        }
        missing.len()
    }
}
