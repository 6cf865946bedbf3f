//! Rich diagnostic error types for the crafting engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::generate::LlmError;
use crate::paths::PathError;
use crate::seeds::SeedError;

/// Top-level error type for the crafting engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum CraftError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Save(#[from] SaveError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Seed(#[from] SeedError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(craft::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(craft::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             Another `craft` process may hold the database open, or the file is damaged. \
             Try running with a fresh data directory."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(craft::store::serde),
        help("Failed to serialize the engine state. This is a bug; please report it.")
    )]
    Serialization { message: String },
}

// ---------------------------------------------------------------------------
// Save errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SaveError {
    #[error("saved state could not be parsed: {message}")]
    #[diagnostic(
        code(craft::save::parse),
        help(
            "The stored snapshot is not a valid save document. \
             The engine archives such payloads under `craft.corrupt.*` and starts fresh."
        )
    )]
    Parse { message: String },

    #[error("no backup snapshot is available")]
    #[diagnostic(
        code(craft::save::no_backup),
        help("A backup is written before each save overwrites the previous one. Play a little first.")
    )]
    NoBackup,
}

// ---------------------------------------------------------------------------
// Import errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ImportError {
    #[error("import document is malformed: {message}")]
    #[diagnostic(
        code(craft::import::malformed),
        help("The file must be a JSON document produced by `craft export`.")
    )]
    Malformed { message: String },

    #[error("import document is missing required fields: {}", fields.join(", "))]
    #[diagnostic(
        code(craft::import::missing_fields),
        help("A save document needs `version`, `elements`, `recipes` and `discovered`.")
    )]
    MissingFields { fields: Vec<String> },
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("invalid element name: {name:?}")]
    #[diagnostic(
        code(craft::engine::invalid_element),
        help("Element names must contain at least one non-whitespace character and no `_`.")
    )]
    InvalidElement { name: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(craft::engine::invalid_config),
        help("Check the EngineConfig fields. {message}")
    )]
    InvalidConfig { message: String },

    #[error("data directory error: {path}")]
    #[diagnostic(
        code(craft::engine::data_dir),
        help(
            "The data directory could not be accessed. \
             Ensure the path exists and has read/write permissions."
        )
    )]
    DataDir { path: String },
}

/// Convenience alias for functions returning crafting engine results.
pub type CraftResult<T> = std::result::Result<T, CraftError>;
