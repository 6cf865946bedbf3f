// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # craft-engine
//!
//! The combination engine behind an element-crafting game: players combine
//! two known elements and get a third, possibly never seen before.
//!
//! ## Architecture
//!
//! - **Elements and keys** (`element`): names, glyphs, order-independent recipe keys
//! - **State** (`state`): element catalog, recipe table, discovery set
//! - **Seeds** (`seeds`): bundled TOML starter elements and recipes, applied additively
//! - **Generation** (`generate`): Ollama proposals with deterministic keyword fallback
//! - **Persistence** (`save`, `store`): versioned JSON snapshots in redb or memory,
//!   with migration, corruption archiving and a rolling backup
//! - **Events** (`event`): what the UI should show, through an `EventSink`
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use craft_engine::engine::{CraftEngine, EngineConfig};
//! use craft_engine::event::NullSink;
//!
//! let engine = CraftEngine::new(EngineConfig::default(), Arc::new(NullSink)).unwrap();
//! let plant = engine.combine("Earth", "Water").unwrap();
//! assert_eq!(plant.result, "Plant");
//! assert!(plant.is_new);
//! ```

pub mod autosave;
pub mod config;
pub mod element;
pub mod engine;
pub mod error;
pub mod event;
pub mod generate;
pub mod paths;
pub mod save;
pub mod seeds;
pub mod state;
pub mod store;
