//! Tracker configuration.
//!
//! Runtime knobs follow 12-factor style: environment variables with
//! sensible defaults, optionally via a `.env` file (`dotenvy`). The source
//! list lives in a YAML file whose `defaults` block is merged under every
//! entry before deserialization.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::TrackerError;
use crate::sources::SourceConfig;

/// Top-level tracker configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// SQLite database file path.
    pub database_path: PathBuf,
    /// Path to the YAML source list.
    pub sources_file: PathBuf,
    /// User agent sent with every outgoing request and matched against
    /// robots.txt groups.
    pub user_agent: String,
}

impl TrackerConfig {
    /// Loads configuration from environment variables, falling back to
    /// defaults when unset. Calls `dotenvy::dotenv().ok()` first so a
    /// local `.env` file can supply values.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            database_path: PathBuf::from(parse_env("DATABASE_PATH", "data/events.db")),
            sources_file: PathBuf::from(parse_env("SOURCES_FILE", "config/sources.yaml")),
            user_agent: parse_env("USER_AGENT", "promo-radar/0.1"),
        }
    }
}

fn parse_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Raw shape of the sources file.
#[derive(Debug, Deserialize)]
struct SourcesFile {
    #[serde(default)]
    defaults: Option<serde_yaml::Mapping>,
    #[serde(default)]
    sources: Vec<serde_yaml::Mapping>,
}

/// Reads and parses the YAML source list.
///
/// # Errors
///
/// Returns [`TrackerError::Config`] if the file cannot be read or parsed.
pub fn load_sources(path: &Path) -> Result<Vec<SourceConfig>, TrackerError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        TrackerError::Config(format!("cannot read {}: {e}", path.display()))
    })?;
    parse_sources(&text)
}

/// Parses the YAML source list, merging the `defaults` block under each
/// entry (entry values win).
///
/// # Errors
///
/// Returns [`TrackerError::Config`] on invalid YAML or an entry that is
/// missing required fields.
pub fn parse_sources(text: &str) -> Result<Vec<SourceConfig>, TrackerError> {
    let file: SourcesFile = serde_yaml::from_str(text)
        .map_err(|e| TrackerError::Config(format!("invalid sources file: {e}")))?;

    let defaults = file.defaults.unwrap_or_default();
    let mut configs = Vec::with_capacity(file.sources.len());
    for entry in file.sources {
        let mut merged = defaults.clone();
        for (key, value) in entry {
            merged.insert(key, value);
        }
        let config: SourceConfig =
            serde_yaml::from_value(serde_yaml::Value::Mapping(merged))
                .map_err(|e| TrackerError::Config(format!("invalid source entry: {e}")))?;
        configs.push(config);
    }
    Ok(configs)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
defaults:
  timeout_seconds: 30
  region: global
sources:
  - provider: openai
    kind: openai
    url: https://openai.com/pricing
  - provider: gemini
    kind: gemini
    url: https://gemini.google.com/advanced
    timeout_seconds: 10
    enabled: false
";

    #[test]
    fn defaults_merge_under_each_entry() {
        let Ok(configs) = parse_sources(SAMPLE) else {
            panic!("parse failed");
        };
        assert_eq!(configs.len(), 2);
        let Some(openai) = configs.first() else {
            panic!("missing entry");
        };
        assert_eq!(openai.timeout_seconds, 30);
        assert_eq!(openai.region, "global");
        assert!(openai.enabled);
    }

    #[test]
    fn entry_values_override_defaults() {
        let Ok(configs) = parse_sources(SAMPLE) else {
            panic!("parse failed");
        };
        let Some(gemini) = configs.get(1) else {
            panic!("missing entry");
        };
        assert_eq!(gemini.timeout_seconds, 10);
        assert!(!gemini.enabled);
    }

    #[test]
    fn missing_required_field_is_a_config_error() {
        let result = parse_sources("sources:\n  - provider: openai\n    kind: openai\n");
        assert!(matches!(result, Err(TrackerError::Config(_))));
    }

    #[test]
    fn empty_file_yields_no_sources() {
        let Ok(configs) = parse_sources("sources: []\n") else {
            panic!("parse failed");
        };
        assert!(configs.is_empty());
    }
}
