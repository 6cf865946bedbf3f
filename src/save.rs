//! Saved-state documents, versioning, and migration.
//!
//! The persisted format is a JSON document:
//!
//! ```json
//! { "version": "2",
//!   "elements":   [["Water", "💧"], ...],
//!   "recipes":    [["Fire_Water", {"result": "Steam", "glyph": "♨️"}], ...],
//!   "discovered": ["Water", ...] }
//! ```
//!
//! Version history:
//! - `1`: unversioned documents; recipe outcomes spell the glyph `emoji`.
//! - `2`: explicit `version` tag, `glyph` field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::element::{RecipeKey, RecipeOutcome};
use crate::error::{ImportError, SaveError, StoreError};
use crate::state::CraftState;

/// Version tag written by this build.
pub const CURRENT_VERSION: &str = "2";

/// Version assumed for documents that carry no tag.
pub const LEGACY_VERSION: &str = "1";

/// Primary key holding the live snapshot.
pub const STATE_KEY: &str = "craft.state";

/// Rolling backup of the snapshot the last save replaced.
pub const BACKUP_KEY: &str = "craft.state.backup";

/// Prefix for archived unparseable payloads; suffixed with unix millis.
pub const CORRUPT_PREFIX: &str = "craft.corrupt.";

/// Fields every import document must carry.
pub const REQUIRED_FIELDS: [&str; 4] = ["version", "elements", "recipes", "discovered"];

/// Current (v2) save document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveDocument {
    pub version: String,
    pub elements: Vec<(String, String)>,
    pub recipes: Vec<(RecipeKey, RecipeOutcome)>,
    pub discovered: Vec<String>,
}

impl SaveDocument {
    pub fn from_state(state: &CraftState) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            elements: state
                .elements
                .iter()
                .map(|(n, g)| (n.clone(), g.clone()))
                .collect(),
            recipes: state
                .recipes
                .iter()
                .map(|(k, o)| (k.clone(), o.clone()))
                .collect(),
            discovered: state.discovered.iter().cloned().collect(),
        }
    }

    /// Adopt the document's maps wholesale. Duplicate keys: last write wins.
    pub fn into_state(self) -> CraftState {
        CraftState {
            elements: self.elements.into_iter().collect(),
            recipes: self.recipes.into_iter().collect(),
            discovered: self.discovered.into_iter().collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string(self).map_err(|e| StoreError::Serialization {
            message: format!("failed to serialize save document: {e}"),
        })
    }
}

/// Tolerant view over any version of the save document.
///
/// Every field is optional so older or partial documents still decode; the
/// field types are shared with v2 (v1's `emoji` is accepted by `RecipeOutcome`).
#[derive(Debug, Default, Deserialize)]
struct LooseDocument {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    elements: Option<Vec<(String, String)>>,
    #[serde(default)]
    recipes: Option<Vec<(RecipeKey, RecipeOutcome)>>,
    #[serde(default)]
    discovered: Option<Vec<String>>,
}

/// Result of decoding a stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedState {
    /// Current version with every field present; adopted as-is.
    Current(CraftState),
    /// Older, newer, or partial document; fields present were carried over.
    Migrated { from: String, state: CraftState },
}

impl LoadedState {
    pub fn into_state(self) -> CraftState {
        match self {
            LoadedState::Current(state) | LoadedState::Migrated { state, .. } => state,
        }
    }
}

/// Decode a stored snapshot, migrating it when the version tag differs.
pub fn decode(raw: &str) -> Result<LoadedState, SaveError> {
    let doc: LooseDocument = serde_json::from_str(raw).map_err(|e| SaveError::Parse {
        message: e.to_string(),
    })?;

    match doc {
        LooseDocument {
            version: Some(version),
            elements: Some(elements),
            recipes: Some(recipes),
            discovered: Some(discovered),
        } if version == CURRENT_VERSION => Ok(LoadedState::Current(
            SaveDocument {
                version,
                elements,
                recipes,
                discovered,
            }
            .into_state(),
        )),
        doc => {
            let from = doc
                .version
                .clone()
                .unwrap_or_else(|| LEGACY_VERSION.to_string());
            let state = migrate(&from, doc);
            tracing::info!(from = %from, to = CURRENT_VERSION, "migrated saved state");
            Ok(LoadedState::Migrated { from, state })
        }
    }
}

fn migrate(from: &str, doc: LooseDocument) -> CraftState {
    match from {
        LEGACY_VERSION => migrate_v1(doc),
        other => {
            tracing::warn!(version = %other, "unknown save version, carrying over present fields");
            merge_present(doc)
        }
    }
}

/// v1 → v2: field names other than `emoji` are unchanged.
fn migrate_v1(doc: LooseDocument) -> CraftState {
    merge_present(doc)
}

fn merge_present(doc: LooseDocument) -> CraftState {
    let mut state = CraftState::new();
    if let Some(elements) = doc.elements {
        state.elements.extend(elements);
    }
    if let Some(recipes) = doc.recipes {
        state.recipes.extend(recipes);
    }
    if let Some(discovered) = doc.discovered {
        state.discovered.extend(discovered);
    }
    state
}

/// Portable export: the save document plus a human-facing timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    #[serde(flatten)]
    pub save: SaveDocument,
    pub exported_at: DateTime<Utc>,
}

impl ExportDocument {
    pub fn new(state: &CraftState) -> Self {
        Self {
            save: SaveDocument::from_state(state),
            exported_at: Utc::now(),
        }
    }
}

/// Validate and decode a user-supplied import document.
///
/// All four required fields must be present; the version tag is recorded but
/// the maps are adopted as they are.
pub fn parse_import(text: &str) -> Result<SaveDocument, ImportError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ImportError::Malformed {
            message: e.to_string(),
        })?;

    let object = value.as_object().ok_or_else(|| ImportError::Malformed {
        message: "top-level value is not an object".into(),
    })?;

    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|f| !object.contains_key(**f))
        .map(|f| f.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingFields { fields: missing });
    }

    serde_json::from_value(value).map_err(|e| ImportError::Malformed {
        message: e.to_string(),
    })
}

/// The rolling backup: the payload a save replaced, and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    pub taken_at: DateTime<Utc>,
    pub payload: String,
}

/// Key under which a corrupted payload seen at `at` is archived.
pub fn corrupt_key(at: DateTime<Utc>) -> String {
    format!("{CORRUPT_PREFIX}{}", at.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> CraftState {
        let mut state = CraftState::new();
        state.discover("Water", "💧");
        state.discover("Fire", "🔥");
        state.discover("Steam", "♨️");
        state.recipes.insert(
            RecipeKey::new("Water", "Fire"),
            RecipeOutcome::new("Steam", "♨️"),
        );
        state
    }

    #[test]
    fn current_document_is_adopted() {
        let state = sample_state();
        let json = SaveDocument::from_state(&state).to_json().unwrap();
        assert_eq!(decode(&json).unwrap(), LoadedState::Current(state));
    }

    #[test]
    fn unversioned_document_migrates_from_v1() {
        let raw = r#"{
            "elements": [["Water", "💧"], ["Steam", "♨️"]],
            "recipes": [["Fire_Water", {"result": "Steam", "emoji": "♨️"}]],
            "discovered": ["Water", "Steam"]
        }"#;
        match decode(raw).unwrap() {
            LoadedState::Migrated { from, state } => {
                assert_eq!(from, LEGACY_VERSION);
                assert_eq!(
                    state.recipe(&RecipeKey::new("Fire", "Water")),
                    Some(&RecipeOutcome::new("Steam", "♨️"))
                );
                assert!(state.is_discovered("Steam"));
            }
            other => panic!("expected migration, got {other:?}"),
        }
    }

    #[test]
    fn partial_document_keeps_present_fields() {
        let raw = r#"{"version": "2", "discovered": ["Water"]}"#;
        match decode(raw).unwrap() {
            LoadedState::Migrated { from, state } => {
                assert_eq!(from, "2");
                assert!(state.elements.is_empty());
                assert!(state.is_discovered("Water"));
            }
            other => panic!("expected migration, got {other:?}"),
        }
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(decode("{not json"), Err(SaveError::Parse { .. })));
        assert!(matches!(decode("[1, 2]"), Err(SaveError::Parse { .. })));
        assert!(matches!(
            decode(r#"{"elements": "oops"}"#),
            Err(SaveError::Parse { .. })
        ));
    }

    #[test]
    fn import_reports_every_missing_field() {
        let err = parse_import(r#"{"version": "2", "elements": []}"#).unwrap_err();
        match err {
            ImportError::MissingFields { fields } => {
                assert_eq!(fields, vec!["recipes".to_string(), "discovered".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn import_accepts_export_documents() {
        let export = ExportDocument::new(&sample_state());
        let json = serde_json::to_string_pretty(&export).unwrap();
        assert!(json.contains("exported_at"));
        let doc = parse_import(&json).unwrap();
        assert_eq!(doc, export.save);
    }

    #[test]
    fn import_rejects_non_objects() {
        assert!(matches!(
            parse_import("42"),
            Err(ImportError::Malformed { .. })
        ));
    }

    #[test]
    fn corrupt_keys_share_prefix() {
        let key = corrupt_key(Utc::now());
        assert!(key.starts_with(CORRUPT_PREFIX));
        assert!(key[CORRUPT_PREFIX.len()..].parse::<i64>().is_ok());
    }
}
