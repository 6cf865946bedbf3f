//! Seed packs: the baseline catalog every session starts from.
//!
//! A seed pack is a TOML-defined bundle of elements and recipes. The
//! `elements` pack is bundled into the binary; extra packs can be loaded from
//! disk. Applying a pack is additive: an element or recipe that already exists
//! is left alone, so a restored save keeps its own version of a seed recipe.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

use crate::element::{RecipeKey, RecipeOutcome, is_valid_name};
use crate::state::CraftState;

// ── Errors ──────────────────────────────────────────────────────────────

#[derive(Debug, Error, Diagnostic)]
pub enum SeedError {
    #[error("failed to parse seed pack \"{id}\": {message}")]
    #[diagnostic(
        code(craft::seed::parse),
        help("Check the seed.toml syntax against data/seeds/elements/seed.toml.")
    )]
    Parse { id: String, message: String },

    #[error("failed to read seed file: {path}")]
    #[diagnostic(code(craft::seed::io), help("Ensure the file exists and is readable."))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("seed pack \"{id}\" has an invalid entry: {message}")]
    #[diagnostic(
        code(craft::seed::invalid),
        help("Element names, results and glyphs must be non-empty.")
    )]
    Invalid { id: String, message: String },
}

pub type SeedResult<T> = std::result::Result<T, SeedError>;

// ── Seed pack data model ────────────────────────────────────────────────

/// A seed pack: TOML-defined bundle of elements and recipes.
#[derive(Debug, Clone)]
pub struct SeedPack {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub elements: Vec<SeedElement>,
    pub recipes: Vec<SeedRecipe>,
    pub source: SeedSource,
}

/// Where a seed pack came from.
#[derive(Debug, Clone)]
pub enum SeedSource {
    /// Bundled into the binary via `include_str!`.
    Bundled,
    /// Loaded from an external file.
    External(PathBuf),
}

/// A catalog entry in a seed pack.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedElement {
    pub name: String,
    pub glyph: String,
    /// Starter elements are discovered from the first moment of play.
    #[serde(default)]
    pub starter: bool,
}

/// A recipe in a seed pack.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedRecipe {
    pub inputs: [String; 2],
    pub result: String,
    pub glyph: String,
}

impl SeedRecipe {
    pub fn key(&self) -> RecipeKey {
        RecipeKey::new(&self.inputs[0], &self.inputs[1])
    }

    pub fn outcome(&self) -> RecipeOutcome {
        RecipeOutcome::new(self.result.clone(), self.glyph.clone())
    }
}

/// Report after applying a seed pack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub id: String,
    pub elements_added: usize,
    pub recipes_added: usize,
    /// Recipes skipped because the state already defines the pair.
    pub recipes_kept: usize,
    pub starters_discovered: usize,
}

// ── TOML deserialization helpers ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SeedToml {
    seed: SeedMeta,
    #[serde(default)]
    elements: Vec<SeedElement>,
    #[serde(default)]
    recipes: Vec<SeedRecipe>,
}

#[derive(Debug, Deserialize)]
struct SeedMeta {
    id: String,
    name: String,
    version: String,
    #[serde(default)]
    description: String,
}

const ELEMENTS_TOML: &str = include_str!("../../data/seeds/elements/seed.toml");

fn parse_seed_toml(toml_str: &str, source: SeedSource) -> SeedResult<SeedPack> {
    let parsed: SeedToml = toml::from_str(toml_str).map_err(|e| SeedError::Parse {
        id: "(unknown)".into(),
        message: e.to_string(),
    })?;
    let pack = SeedPack {
        id: parsed.seed.id,
        name: parsed.seed.name,
        version: parsed.seed.version,
        description: parsed.seed.description,
        elements: parsed.elements,
        recipes: parsed.recipes,
        source,
    };
    pack.validate()?;
    Ok(pack)
}

impl SeedPack {
    /// The pack compiled into the crate.
    pub fn bundled() -> SeedResult<Self> {
        parse_seed_toml(ELEMENTS_TOML, SeedSource::Bundled)
    }

    /// Load a pack from a TOML file on disk.
    pub fn load(path: &Path) -> SeedResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SeedError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        parse_seed_toml(&content, SeedSource::External(path.to_path_buf())).map_err(|e| match e {
            SeedError::Parse { message, .. } => SeedError::Parse {
                id: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    fn validate(&self) -> SeedResult<()> {
        let invalid = |message: String| SeedError::Invalid {
            id: self.id.clone(),
            message,
        };
        for el in &self.elements {
            if !is_valid_name(&el.name) || el.glyph.is_empty() {
                return Err(invalid(format!("element {:?}", el.name)));
            }
        }
        for r in &self.recipes {
            if r.inputs.iter().any(|i| !is_valid_name(i))
                || !is_valid_name(&r.result)
                || r.glyph.is_empty()
            {
                return Err(invalid(format!(
                    "recipe {} + {} -> {:?}",
                    r.inputs[0], r.inputs[1], r.result
                )));
            }
        }
        Ok(())
    }

    /// Apply this pack to `state` without overwriting anything already there.
    ///
    /// Idempotent: a second application adds nothing.
    pub fn apply(&self, state: &mut CraftState) -> SeedReport {
        let mut report = SeedReport {
            id: self.id.clone(),
            ..Default::default()
        };

        for el in &self.elements {
            if state.add_element_if_absent(&el.name, &el.glyph) {
                report.elements_added += 1;
            }
            if el.starter && state.discovered.insert(el.name.clone()) {
                report.starters_discovered += 1;
            }
        }

        for r in &self.recipes {
            if state.add_recipe_if_absent(r.key(), r.outcome()) {
                report.recipes_added += 1;
            } else {
                report.recipes_kept += 1;
            }
        }

        tracing::debug!(
            seed = %self.id,
            elements = report.elements_added,
            recipes = report.recipes_added,
            kept = report.recipes_kept,
            "applied seed pack"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_pack_parses() {
        let pack = SeedPack::bundled().unwrap();
        assert_eq!(pack.id, "elements");
        assert_eq!(pack.elements.iter().filter(|e| e.starter).count(), 4);
        // The catalog is a strict superset of the starting discoveries.
        assert_eq!(pack.elements.len(), 100);
        assert!(pack.recipes.len() > 50);
    }

    #[test]
    fn bundled_pack_has_one_recipe_per_pair() {
        let pack = SeedPack::bundled().unwrap();
        let mut keys: Vec<RecipeKey> = pack.recipes.iter().map(SeedRecipe::key).collect();
        let total = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), total);
    }

    #[test]
    fn water_and_earth_make_plant() {
        let pack = SeedPack::bundled().unwrap();
        let plant = pack
            .recipes
            .iter()
            .find(|r| r.key() == RecipeKey::new("Earth", "Water"))
            .unwrap();
        assert_eq!(plant.outcome(), RecipeOutcome::new("Plant", "🌱"));
    }

    #[test]
    fn apply_is_idempotent() {
        let pack = SeedPack::bundled().unwrap();
        let mut state = CraftState::new();

        let first = pack.apply(&mut state);
        assert_eq!(first.elements_added, pack.elements.len());
        assert_eq!(first.starters_discovered, 4);
        assert_eq!(first.recipes_added, pack.recipes.len());

        let snapshot = state.clone();
        let second = pack.apply(&mut state);
        assert_eq!(second.elements_added, 0);
        assert_eq!(second.recipes_added, 0);
        assert_eq!(second.recipes_kept, pack.recipes.len());
        assert_eq!(state, snapshot);
    }

    #[test]
    fn apply_preserves_overridden_recipe() {
        let pack = SeedPack::bundled().unwrap();
        let mut state = CraftState::new();
        let key = RecipeKey::new("Water", "Fire");
        state.recipes.insert(key.clone(), RecipeOutcome::new("Boiling", "🫧"));

        pack.apply(&mut state);
        assert_eq!(state.recipe(&key).unwrap().result, "Boiling");
    }

    #[test]
    fn external_pack_loads_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("myth.toml");
        std::fs::write(
            &path,
            r#"
[seed]
id = "myth"
name = "Mythology"
version = "1"

[[recipes]]
inputs = ["Horse", "Bird"]
result = "Pegasus"
glyph = "🦄"
"#,
        )
        .unwrap();

        let pack = SeedPack::load(&path).unwrap();
        assert_eq!(pack.id, "myth");
        assert!(matches!(pack.source, SeedSource::External(_)));
        assert_eq!(pack.recipes[0].key(), RecipeKey::new("Bird", "Horse"));
    }

    #[test]
    fn blank_result_is_rejected() {
        let toml = r#"
[seed]
id = "broken"
name = "Broken"
version = "1"

[[recipes]]
inputs = ["A", "B"]
result = " "
glyph = "x"
"#;
        let err = parse_seed_toml(toml, SeedSource::Bundled).unwrap_err();
        assert!(matches!(err, SeedError::Invalid { .. }));
    }

    #[test]
    fn separator_in_result_is_rejected() {
        let toml = r#"
[seed]
id = "broken"
name = "Broken"
version = "1"

[[recipes]]
inputs = ["Water", "Earth"]
result = "Hot_Spring"
glyph = "♨️"
"#;
        let err = parse_seed_toml(toml, SeedSource::Bundled).unwrap_err();
        assert!(matches!(err, SeedError::Invalid { .. }));
    }

    #[test]
    fn bundled_names_are_valid_key_parts() {
        let pack = SeedPack::bundled().unwrap();
        assert!(pack.elements.iter().all(|e| is_valid_name(&e.name)));
        assert!(pack.recipes.iter().all(|r| is_valid_name(&r.result)));
    }
}
