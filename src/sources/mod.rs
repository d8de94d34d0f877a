//! Source adapters: per-provider scraping behind one contract.
//!
//! Every adapter receives a [`SourceConfig`] and returns a (possibly empty)
//! ordered sequence of finalized [`PromotionEvent`]s. Dispatch across
//! provider kinds goes through the [`ProviderKind`] tag, one variant per
//! adapter. The [`SourceRegistry`] is built once at startup from
//! configuration and passed into the orchestration call; there is no
//! global adapter state.

pub mod fetcher;
pub mod gemini;
pub mod openai;

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::domain::PromotionEvent;
use crate::error::SourceError;
pub use fetcher::HttpFetcher;

/// Scheduler interval used when no source declares one.
const DEFAULT_POLL_INTERVAL_MINUTES: u64 = 120;

/// Configuration of one scraping source, from `sources.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Provider name recorded on every event (e.g. `"openai"`).
    pub provider: String,
    /// Adapter kind string, resolved to a [`ProviderKind`].
    pub kind: String,
    /// Page to scrape.
    pub url: String,
    /// Region the source covers.
    #[serde(default = "default_region")]
    pub region: String,
    /// Disabled sources are skipped entirely.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Retries after the initial attempt.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// How often this source wants to be polled.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_minutes: u64,
}

fn default_region() -> String {
    "global".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_timeout() -> u64 {
    20
}

const fn default_retries() -> u32 {
    2
}

const fn default_poll_interval() -> u64 {
    720
}

/// Explicit tag selecting the adapter implementation for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// OpenAI pricing-page adapter.
    OpenAi,
    /// Gemini promotion-page adapter.
    Gemini,
}

impl ProviderKind {
    /// Resolves a config `kind` string. Unknown kinds yield `None` and are
    /// skipped by the registry with a warning.
    #[must_use]
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "openai" => Some(Self::OpenAi),
            "gemini" => Some(Self::Gemini),
            _ => None,
        }
    }

    /// Runs the adapter for this kind.
    ///
    /// Returned events are finalized with identity key and fingerprint. A
    /// robots.txt denial yields `Ok(vec![])`, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the fetch fails after all retries.
    pub async fn scrape(
        &self,
        fetcher: &HttpFetcher,
        config: &SourceConfig,
    ) -> Result<Vec<PromotionEvent>, SourceError> {
        match self {
            Self::OpenAi => openai::scrape(fetcher, config).await,
            Self::Gemini => gemini::scrape(fetcher, config).await,
        }
    }
}

/// One enabled source with its resolved adapter kind.
#[derive(Debug, Clone)]
pub struct RegisteredSource {
    /// Adapter selected for this source.
    pub kind: ProviderKind,
    /// Source configuration.
    pub config: SourceConfig,
}

/// Explicit adapter registry, constructed once at startup.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<RegisteredSource>,
}

impl SourceRegistry {
    /// Builds the registry from configuration, keeping only enabled sources
    /// with a known kind.
    #[must_use]
    pub fn from_configs(configs: Vec<SourceConfig>) -> Self {
        let mut sources = Vec::with_capacity(configs.len());
        for config in configs {
            if !config.enabled {
                continue;
            }
            match ProviderKind::parse(&config.kind) {
                Some(kind) => sources.push(RegisteredSource { kind, config }),
                None => {
                    warn!(
                        provider = %config.provider,
                        kind = %config.kind,
                        "unknown source kind, skipping"
                    );
                }
            }
        }
        Self { sources }
    }

    /// All registered (enabled, known-kind) sources in config order.
    #[must_use]
    pub fn sources(&self) -> &[RegisteredSource] {
        &self.sources
    }

    /// Scheduler interval: the minimum poll interval across sources.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        let minutes = self
            .sources
            .iter()
            .map(|s| s.config.poll_interval_minutes)
            .min()
            .unwrap_or(DEFAULT_POLL_INTERVAL_MINUTES)
            .max(1);
        Duration::from_secs(minutes * 60)
    }

    /// Number of registered sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns `true` when no source is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Strips HTML tags and collapses whitespace, leaving a flat text body for
/// the keyword and regex heuristics.
pub(crate) fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn config(provider: &str, kind: &str, enabled: bool, poll: u64) -> SourceConfig {
        SourceConfig {
            provider: provider.to_string(),
            kind: kind.to_string(),
            url: format!("https://{provider}.example/pricing"),
            region: "global".to_string(),
            enabled,
            timeout_seconds: 20,
            max_retries: 2,
            poll_interval_minutes: poll,
        }
    }

    #[test]
    fn registry_skips_disabled_and_unknown_kinds() {
        let registry = SourceRegistry::from_configs(vec![
            config("openai", "openai", true, 720),
            config("gemini", "gemini", false, 720),
            config("mystery", "mystery", true, 720),
        ]);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.sources().first().map(|s| s.kind),
            Some(ProviderKind::OpenAi)
        );
    }

    #[test]
    fn poll_interval_is_minimum_across_sources() {
        let registry = SourceRegistry::from_configs(vec![
            config("openai", "openai", true, 720),
            config("gemini", "gemini", true, 120),
        ]);
        assert_eq!(registry.poll_interval(), Duration::from_secs(120 * 60));
    }

    #[test]
    fn empty_registry_falls_back_to_default_interval() {
        let registry = SourceRegistry::from_configs(vec![]);
        assert!(registry.is_empty());
        assert_eq!(registry.poll_interval(), Duration::from_secs(120 * 60));
    }

    #[test]
    fn strip_tags_flattens_markup() {
        let html = "<html><body><h1>Pricing</h1>\n<p>Get  3 months   free!</p></body></html>";
        assert_eq!(strip_tags(html), "Pricing Get 3 months free!");
    }

    #[test]
    fn config_defaults_apply_when_fields_are_missing() {
        let yaml = "provider: openai\nkind: openai\nurl: https://openai.com/pricing\n";
        let Ok(config) = serde_yaml::from_str::<SourceConfig>(yaml) else {
            panic!("yaml parse failed");
        };
        assert_eq!(config.region, "global");
        assert!(config.enabled);
        assert_eq!(config.timeout_seconds, 20);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.poll_interval_minutes, 720);
    }
}
