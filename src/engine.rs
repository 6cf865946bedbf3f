//! Engine facade: the combination engine and its public API.
//!
//! `CraftEngine` owns the element catalog, recipe table, discovery set and
//! pending-generation cache, and persists them through a [`KvStore`].
//! Every method takes `&self`; state lives behind one mutex, and a combine
//! only leaves that mutex while it waits on the generator.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::element::{Element, RecipeKey, RecipeOutcome, is_valid_name, normalize_name};
use crate::error::{CraftResult, EngineError, SaveError, StoreError};
use crate::event::{EngineEvent, EventSink};
use crate::generate::{FallbackRules, Generator, OllamaConfig, OllamaGenerator};
use crate::save::{
    self, BACKUP_KEY, BackupRecord, CORRUPT_PREFIX, ExportDocument, LoadedState, STATE_KEY,
    SaveDocument,
};
use crate::seeds::SeedPack;
use crate::state::{CraftState, GENERIC_GLYPH};
use crate::store::{DurableStore, KvStore, MemStore};

/// Configuration for the crafting engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Data directory for the redb store. `None` for memory-only mode.
    pub data_dir: Option<PathBuf>,
    /// Ollama settings. `None` disables external generation.
    pub generator: Option<OllamaConfig>,
    /// Rules used when generation is disabled or fails.
    pub fallback_rules: FallbackRules,
    /// Extra seed pack files applied after the bundled pack.
    pub seed_packs: Vec<PathBuf>,
}

impl EngineConfig {
    fn validate(&self) -> CraftResult<()> {
        for rule in self.fallback_rules.rules() {
            if rule.keyword.trim().is_empty()
                || !is_valid_name(&rule.suffix)
                || rule.glyph.is_empty()
            {
                return Err(EngineError::InvalidConfig {
                    message: format!(
                        "fallback rule {:?} needs a keyword, a suffix without `_` and a glyph",
                        rule.keyword
                    ),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Where a combination's recipe came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeSource {
    /// Already in the recipe table (seeded or learned earlier).
    Known,
    /// Proposed by the generator just now.
    Generated,
    /// Synthesized by the fallback rules just now.
    Fallback,
}

impl fmt::Display for RecipeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecipeSource::Known => "known",
            RecipeSource::Generated => "generated",
            RecipeSource::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// A successful combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combination {
    pub result: String,
    pub glyph: String,
    pub is_new: bool,
    pub source: RecipeSource,
}

/// How the engine's state was obtained when it was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOrigin {
    /// Nothing stored; started from seeds.
    Fresh,
    /// Current-version snapshot adopted as-is.
    Restored,
    /// Older or partial snapshot migrated.
    Migrated { from: String },
    /// Snapshot unparseable; archived under `archive_key` and started fresh.
    Recovered { archive_key: String },
}

/// Counts after an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub version: String,
    pub elements: usize,
    pub recipes: usize,
    pub discovered: usize,
    /// Discovered names that had to be added to the catalog.
    pub repaired: usize,
}

type Generated = (RecipeOutcome, RecipeSource);

/// The combination engine.
pub struct CraftEngine {
    config: EngineConfig,
    store: Arc<dyn KvStore>,
    generator: Option<Arc<dyn Generator>>,
    sink: Arc<dyn EventSink>,
    seeds: Vec<SeedPack>,
    state: Mutex<CraftState>,
    /// Request-coalescing cache: one slot per pair currently being generated.
    pending: DashMap<RecipeKey, Arc<OnceLock<Generated>>>,
    origin: LoadOrigin,
}

impl CraftEngine {
    /// Create an engine from configuration alone.
    ///
    /// Opens a redb store under `data_dir` (or an in-memory store) and, when
    /// configured, checks that Ollama answers. An unreachable Ollama leaves
    /// the engine on fallback rules.
    pub fn new(config: EngineConfig, sink: Arc<dyn EventSink>) -> CraftResult<Self> {
        let store: Arc<dyn KvStore> = match config.data_dir {
            Some(ref dir) => {
                std::fs::create_dir_all(dir).map_err(|_| EngineError::DataDir {
                    path: dir.display().to_string(),
                })?;
                Arc::new(DurableStore::open(dir)?)
            }
            None => Arc::new(MemStore::new()),
        };

        let generator: Option<Arc<dyn Generator>> = match config.generator {
            Some(ref cfg) => {
                let ollama = OllamaGenerator::new(cfg.clone());
                if ollama.check_available() {
                    if !ollama.has_model() {
                        tracing::warn!(model = %ollama.model(), "model not pulled; requests may fail");
                    }
                    Some(Arc::new(ollama))
                } else {
                    tracing::warn!(
                        url = %cfg.base_url,
                        "Ollama unavailable, using fallback rules only"
                    );
                    None
                }
            }
            None => None,
        };

        Self::open(config, store, generator, sink)
    }

    /// Open an engine over explicit collaborators.
    ///
    /// Loads the stored snapshot (adopting, migrating, or archiving it),
    /// applies the seed packs additively, and persists once.
    pub fn open(
        config: EngineConfig,
        store: Arc<dyn KvStore>,
        generator: Option<Arc<dyn Generator>>,
        sink: Arc<dyn EventSink>,
    ) -> CraftResult<Self> {
        config.validate()?;

        let mut seeds = vec![SeedPack::bundled()?];
        for path in &config.seed_packs {
            seeds.push(SeedPack::load(path)?);
        }

        let (mut state, origin) = match store.get(STATE_KEY)? {
            None => (CraftState::new(), LoadOrigin::Fresh),
            Some(raw) => match save::decode(&raw) {
                Ok(LoadedState::Current(state)) => (state, LoadOrigin::Restored),
                Ok(LoadedState::Migrated { from, state }) => {
                    (state, LoadOrigin::Migrated { from })
                }
                Err(e) => {
                    let archive_key = save::corrupt_key(Utc::now());
                    tracing::warn!(
                        archive = %archive_key,
                        error = %e,
                        "saved state is corrupt, archiving it and starting fresh"
                    );
                    store.set(&archive_key, &raw)?;
                    (CraftState::new(), LoadOrigin::Recovered { archive_key })
                }
            },
        };

        state.repair_catalog();
        for pack in &seeds {
            pack.apply(&mut state);
        }

        let generator_name = generator.as_ref().map(|g| g.name());
        tracing::info!(
            store = store.kind(),
            origin = ?origin,
            elements = state.elements.len(),
            recipes = state.recipes.len(),
            discovered = state.discovered.len(),
            generator = generator_name.as_deref().unwrap_or("none"),
            "opened craft engine"
        );

        let engine = Self {
            config,
            store,
            generator,
            sink,
            seeds,
            state: Mutex::new(state),
            pending: DashMap::new(),
            origin,
        };

        {
            let state = engine.lock_state();
            engine.persist(&state)?;
        }

        Ok(engine)
    }

    fn lock_state(&self) -> MutexGuard<'_, CraftState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write `state` as the primary snapshot, rolling the previous one into
    /// the backup key. Unchanged snapshots are not rewritten, and an
    /// unreadable previous snapshot never replaces the backup.
    fn persist(&self, state: &CraftState) -> CraftResult<()> {
        let json = SaveDocument::from_state(state).to_json()?;
        let previous = self.store.get(STATE_KEY)?;
        if previous.as_deref() == Some(json.as_str()) {
            return Ok(());
        }
        if let Some(payload) = previous {
            if let Err(e) = save::decode(&payload) {
                tracing::debug!(error = %e, "previous snapshot unreadable, keeping backup");
                self.store.set(STATE_KEY, &json)?;
                return Ok(());
            }
            let record = BackupRecord {
                taken_at: Utc::now(),
                payload,
            };
            let backup = serde_json::to_string(&record).map_err(|e| StoreError::Serialization {
                message: format!("failed to serialize backup record: {e}"),
            })?;
            self.store.set(BACKUP_KEY, &backup)?;
        }
        self.store.set(STATE_KEY, &json)?;
        Ok(())
    }

    /// Compute the canonical key for a pair of names.
    pub fn recipe_key(a: &str, b: &str) -> RecipeKey {
        RecipeKey::new(a, b)
    }

    /// Combine two elements.
    ///
    /// Known pairs resolve from the recipe table. Unknown pairs go through the
    /// generator and, if that fails, the fallback rules, so every valid pair
    /// yields a result. Only blank names fail.
    pub fn combine(&self, a: &str, b: &str) -> CraftResult<Combination> {
        let (first, second) = match (normalize_name(a), normalize_name(b)) {
            (Ok(first), Ok(second)) => (first, second),
            (Err(e), _) | (_, Err(e)) => {
                self.sink.emit(&EngineEvent::CombineFailed {
                    message: e.to_string(),
                });
                return Err(e.into());
            }
        };

        let key = RecipeKey::new(first, second);
        let known = self.lock_state().recipe(&key).cloned();
        let (outcome, source) = match known {
            Some(outcome) => {
                tracing::debug!(key = %key, result = %outcome.result, "recipe hit");
                (outcome, RecipeSource::Known)
            }
            None => self.generate(&key, first, second),
        };

        let is_new = {
            let mut state = self.lock_state();
            state.set_element(&outcome.result, &outcome.glyph);
            let is_new = state.discovered.insert(outcome.result.clone());
            if let Err(e) = self.persist(&state) {
                tracing::warn!(error = %e, "failed to persist after combine");
            }
            is_new
        };

        if is_new {
            self.sink.emit(&EngineEvent::ElementDiscovered {
                name: outcome.result.clone(),
                glyph: outcome.glyph.clone(),
            });
        }
        self.sink.emit(&EngineEvent::CombineSucceeded {
            result: outcome.result.clone(),
            glyph: outcome.glyph.clone(),
            is_new,
        });

        Ok(Combination {
            result: outcome.result,
            glyph: outcome.glyph,
            is_new,
            source,
        })
    }

    /// Miss path: coalesce on the pending slot, produce once, record the recipe.
    fn generate(&self, key: &RecipeKey, first: &str, second: &str) -> Generated {
        let slot = Arc::clone(
            self.pending
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceLock::new()))
                .value(),
        );

        let generated = slot
            .get_or_init(|| {
                if let Some(outcome) = self.lock_state().recipe(key).cloned() {
                    return (outcome, RecipeSource::Known);
                }
                let (outcome, source) = self.produce(first, second);
                self.lock_state()
                    .recipes
                    .insert(key.clone(), outcome.clone());
                tracing::info!(key = %key, result = %outcome.result, source = %source, "learned recipe");
                (outcome, source)
            })
            .clone();

        // The recipe table holds the pair now; later lookups hit it directly.
        self.pending.remove(key);
        generated
    }

    fn produce(&self, first: &str, second: &str) -> Generated {
        if let Some(generator) = &self.generator {
            self.sink.emit(&EngineEvent::GenerationStarted {
                first: first.to_string(),
                second: second.to_string(),
            });
            match generator.propose(first, second) {
                Ok(outcome) => return (outcome, RecipeSource::Generated),
                Err(e) => {
                    tracing::warn!(
                        generator = %generator.name(),
                        error = %e,
                        "generation failed, using fallback rules"
                    );
                }
            }
        }
        (
            self.config.fallback_rules.synthesize(first, second),
            RecipeSource::Fallback,
        )
    }

    /// Replace the whole state, then reseed and persist.
    ///
    /// The snapshot being replaced ends up in the backup key.
    fn replace_state(&self, mut next: CraftState) -> CraftResult<usize> {
        let repaired = next.repair_catalog();
        {
            let mut state = self.lock_state();
            self.persist(&state)?;
            *state = next;
            self.pending.clear();
            for pack in &self.seeds {
                pack.apply(&mut state);
            }
            self.persist(&state)?;
        }
        self.sink.emit(&EngineEvent::StateRefreshed);
        Ok(repaired)
    }

    /// Forget every discovery and learned recipe, back to the seed packs.
    pub fn reset_to_default(&self) -> CraftResult<()> {
        self.replace_state(CraftState::new())?;
        tracing::info!("reset to default state");
        Ok(())
    }

    /// Snapshot the current state as a portable export document.
    pub fn export(&self) -> ExportDocument {
        ExportDocument::new(&self.lock_state())
    }

    /// [`export`](Self::export) rendered as pretty JSON.
    pub fn export_json(&self) -> CraftResult<String> {
        serde_json::to_string_pretty(&self.export()).map_err(|e| {
            StoreError::Serialization {
                message: format!("failed to serialize export: {e}"),
            }
            .into()
        })
    }

    /// Replace the state with a user-supplied export document.
    ///
    /// The document must carry `version`, `elements`, `recipes` and
    /// `discovered`; otherwise nothing changes. Seeds are reapplied additively.
    pub fn import_json(&self, text: &str) -> CraftResult<ImportReport> {
        let doc = save::parse_import(text)?;
        let version = doc.version.clone();
        let repaired = self.replace_state(doc.into_state())?;

        let state = self.lock_state();
        let report = ImportReport {
            version,
            elements: state.elements.len(),
            recipes: state.recipes.len(),
            discovered: state.discovered.len(),
            repaired,
        };
        tracing::info!(?report, "imported save document");
        Ok(report)
    }

    /// Swap the live state with the rolling backup. Returns when the backup was taken.
    pub fn restore_backup(&self) -> CraftResult<DateTime<Utc>> {
        let raw = self.store.get(BACKUP_KEY)?.ok_or(SaveError::NoBackup)?;
        let record: BackupRecord = serde_json::from_str(&raw).map_err(|e| SaveError::Parse {
            message: format!("backup record: {e}"),
        })?;
        let restored = save::decode(&record.payload)?.into_state();
        self.replace_state(restored)?;
        tracing::info!(taken_at = %record.taken_at, "restored backup");
        Ok(record.taken_at)
    }

    /// Persist the current state now.
    pub fn save(&self) -> CraftResult<()> {
        let state = self.lock_state();
        self.persist(&state)
    }

    /// Keys of archived corrupt snapshots, oldest first.
    pub fn corruption_archives(&self) -> CraftResult<Vec<String>> {
        Ok(self.store.keys_with_prefix(CORRUPT_PREFIX)?)
    }

    /// Discovered elements, sorted by name.
    pub fn discovered_elements(&self) -> Vec<Element> {
        let state = self.lock_state();
        state
            .discovered
            .iter()
            .map(|name| {
                state
                    .element(name)
                    .unwrap_or_else(|| Element::new(name.clone(), GENERIC_GLYPH))
            })
            .collect()
    }

    /// Every catalog element, sorted by name.
    pub fn elements(&self) -> Vec<Element> {
        self.lock_state()
            .elements
            .iter()
            .map(|(name, glyph)| Element::new(name.clone(), glyph.clone()))
            .collect()
    }

    /// Look up the recipe for a pair without combining.
    pub fn recipe(&self, a: &str, b: &str) -> Option<RecipeOutcome> {
        self.lock_state().recipe(&RecipeKey::new(a, b)).cloned()
    }

    pub fn is_discovered(&self, name: &str) -> bool {
        self.lock_state().is_discovered(name)
    }

    /// A copy of the full in-memory state.
    pub fn snapshot(&self) -> CraftState {
        self.lock_state().clone()
    }

    /// Number of pairs with a generation in flight.
    pub fn pending_generations(&self) -> usize {
        self.pending.len()
    }

    /// How the state was obtained at open time.
    pub fn origin(&self) -> &LoadOrigin {
        &self.origin
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Summary counts.
    pub fn info(&self) -> EngineInfo {
        let state = self.lock_state();
        EngineInfo {
            elements: state.elements.len(),
            discovered: state.discovered.len(),
            recipes: state.recipes.len(),
            pending: self.pending.len(),
            store: self.store.kind(),
            persistent: self.store.is_persistent(),
            generator: self.generator.as_ref().map(|g| g.name()),
        }
    }
}

/// Summary information about the engine state.
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub elements: usize,
    pub discovered: usize,
    pub recipes: usize,
    pub pending: usize,
    pub store: &'static str,
    pub persistent: bool,
    pub generator: Option<String>,
}

impl fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Discovered {}/{}", self.discovered, self.elements)?;
        writeln!(f, "  recipes:      {}", self.recipes)?;
        writeln!(f, "  pending:      {}", self.pending)?;
        writeln!(f, "  store:        {}", self.store)?;
        writeln!(f, "  persistent:   {}", self.persistent)?;
        writeln!(
            f,
            "  generator:    {}",
            self.generator.as_deref().unwrap_or("fallback rules only")
        )?;
        Ok(())
    }
}

impl fmt::Debug for CraftEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CraftEngine")
            .field("config", &self.config)
            .field("store", &self.store.kind())
            .field("origin", &self.origin)
            .field("pending", &self.pending.len())
            .finish()
    }
}
