//! Shader source store.
//!
//! The simulation consumes shader source text keyed by logical alias and is
//! agnostic to where the text came from: the bundled defaults, a directory
//! on disk, or anything the host inserts by hand.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Aliases the simulation pipeline requires, in pass order.
pub const REQUIRED_ALIASES: [&str; 6] = [
    "physics.vert",
    "physics.frag",
    "copy.vert",
    "copy.frag",
    "render.vert",
    "render.frag",
];

/// Errors raised while loading or resolving shader sources.
#[derive(Error, Debug)]
pub enum AssetError {
    /// No source registered under the alias.
    #[error("Shader source not found: {alias}")]
    Missing {
        /// The missing alias.
        alias: String,
    },

    /// A source was registered but contains no text.
    #[error("Shader source is empty: {alias}")]
    Empty {
        /// The offending alias.
        alias: String,
    },

    /// Reading a source file from disk failed.
    #[error("Failed to read shader source {path}: {source}")]
    Io {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Named shader source strings keyed by logical alias.
#[derive(Debug, Clone, Default)]
pub struct ShaderSources {
    sources: HashMap<String, String>,
}

impl ShaderSources {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shader sources bundled with the crate.
    pub fn builtin() -> Self {
        let mut sources = Self::new();
        sources.insert("physics.vert", include_str!("../shaders/physics.vert.wgsl"));
        sources.insert("physics.frag", include_str!("../shaders/physics.frag.wgsl"));
        sources.insert("copy.vert", include_str!("../shaders/copy.vert.wgsl"));
        sources.insert("copy.frag", include_str!("../shaders/copy.frag.wgsl"));
        sources.insert("render.vert", include_str!("../shaders/render.vert.wgsl"));
        sources.insert("render.frag", include_str!("../shaders/render.frag.wgsl"));
        sources
    }

    /// Load every required alias from `<dir>/<alias>.wgsl`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, AssetError> {
        let dir = dir.as_ref();
        let mut sources = Self::new();
        for alias in REQUIRED_ALIASES {
            let path = dir.join(format!("{alias}.wgsl"));
            let text = std::fs::read_to_string(&path).map_err(|source| AssetError::Io {
                path: path.clone(),
                source,
            })?;
            sources.insert(alias, text);
        }
        sources.validate()?;
        Ok(sources)
    }

    /// Register a source under an alias, replacing any previous text.
    pub fn insert(&mut self, alias: impl Into<String>, text: impl Into<String>) {
        self.sources.insert(alias.into(), text.into());
    }

    /// Resolve an alias, failing fast on missing or empty text.
    pub fn get(&self, alias: &str) -> Result<&str, AssetError> {
        let text = self.sources.get(alias).ok_or_else(|| AssetError::Missing {
            alias: alias.to_string(),
        })?;
        if text.trim().is_empty() {
            return Err(AssetError::Empty {
                alias: alias.to_string(),
            });
        }
        Ok(text)
    }

    /// Check that every required alias resolves.
    pub fn validate(&self) -> Result<(), AssetError> {
        for alias in REQUIRED_ALIASES {
            self.get(alias)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_sources_complete() {
        let sources = ShaderSources::builtin();
        assert!(sources.validate().is_ok());
    }

    #[test]
    fn test_missing_alias() {
        let sources = ShaderSources::new();
        assert!(matches!(
            sources.get("physics.frag"),
            Err(AssetError::Missing { .. })
        ));
    }

    #[test]
    fn test_empty_source_rejected() {
        let mut sources = ShaderSources::builtin();
        sources.insert("copy.frag", "  \n");
        assert!(matches!(
            sources.validate(),
            Err(AssetError::Empty { alias }) if alias == "copy.frag"
        ));
    }

    #[test]
    fn test_insert_replaces() {
        let mut sources = ShaderSources::new();
        sources.insert("render.vert", "a");
        sources.insert("render.vert", "b");
        assert_eq!(sources.get("render.vert").unwrap(), "b");
    }
}
