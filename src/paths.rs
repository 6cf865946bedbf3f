//! XDG-compliant path resolution for craft-engine.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(craft::paths::no_home),
        help("Set the HOME environment variable or ensure a valid user profile exists.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(craft::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

const APP_DIR: &str = "craft-engine";

/// Global directories for craft-engine.
#[derive(Debug, Clone)]
pub struct CraftPaths {
    /// `$XDG_CONFIG_HOME/craft-engine/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/craft-engine/`
    pub data_dir: PathBuf,
}

impl CraftPaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> PathResult<Self> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| PathError::NoHome)?;

        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".config"))
            .join(APP_DIR);

        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".local/share"))
            .join(APP_DIR);

        Ok(Self {
            config_dir,
            data_dir,
        })
    }

    /// Create both directories. Idempotent.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Path to the config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_paths_end_in_app_dir() {
        // Reads the real environment; edition 2024 makes set_var unsafe.
        if std::env::var("HOME").is_err() {
            return;
        }
        let paths = CraftPaths::resolve().unwrap();
        assert!(paths.config_dir.ends_with(APP_DIR));
        assert!(paths.data_dir.ends_with(APP_DIR));
    }

    #[test]
    fn config_file_lives_in_config_dir() {
        let paths = CraftPaths {
            config_dir: PathBuf::from("/cfg/craft-engine"),
            data_dir: PathBuf::from("/data/craft-engine"),
        };
        assert_eq!(
            paths.config_file(),
            PathBuf::from("/cfg/craft-engine/config.toml")
        );
    }

    #[test]
    fn ensure_dirs_creates_both() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = CraftPaths {
            config_dir: tmp.path().join("cfg"),
            data_dir: tmp.path().join("data"),
        };
        paths.ensure_dirs().unwrap();
        paths.ensure_dirs().unwrap();
        assert!(paths.config_dir.is_dir());
        assert!(paths.data_dir.is_dir());
    }
}
