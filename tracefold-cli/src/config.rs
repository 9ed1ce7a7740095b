//! On-disk defaults for CLI flags, loaded from an optional TOML file.

use std::fs;
use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Defaults {
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default)]
    pub balanced: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            balanced: false,
        }
    }
}

fn default_threads() -> usize {
    4
}

impl Config {
    /// Read `path`; a missing file yields defaults silently, a present
    /// but malformed file is an error the caller should surface.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}
