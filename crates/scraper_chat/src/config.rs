//! Chat configuration.
//!
//! Settings live in `<data_dir>/settings.json`. Every field has a default,
//! so a partial file only overrides what it names.

use std::path::Path;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::DEFAULT_TITLE_MAX_CHARS;

/// Settings file name inside the data directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Timing of the simulated source pipeline and the turn around it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineTiming {
    /// Base delay before each source completes
    pub source_delay_ms: u64,
    /// Upper bound of random jitter added to each source delay
    pub source_jitter_ms: u64,
    /// Pause between sourcing and producing the reply
    pub thinking_delay_ms: u64,
    /// How long finished sources stay visible
    pub cleanup_window_ms: u64,
}

impl Default for PipelineTiming {
    fn default() -> Self {
        Self {
            source_delay_ms: 1500,
            source_jitter_ms: 1000,
            thinking_delay_ms: 1000,
            cleanup_window_ms: 30_000,
        }
    }
}

impl PipelineTiming {
    /// Timing with every delay set to zero
    pub fn immediate() -> Self {
        Self {
            source_delay_ms: 0,
            source_jitter_ms: 0,
            thinking_delay_ms: 0,
            cleanup_window_ms: 0,
        }
    }

    /// Draw one per-source delay in `[base, base + jitter]`
    pub fn source_delay(&self, rng: &mut impl Rng) -> Duration {
        let jitter = if self.source_jitter_ms == 0 {
            0
        } else {
            rng.gen_range(0..=self.source_jitter_ms)
        };
        Duration::from_millis(self.source_delay_ms.saturating_add(jitter))
    }

    pub fn thinking_delay(&self) -> Duration {
        Duration::from_millis(self.thinking_delay_ms)
    }

    pub fn cleanup_window(&self) -> Duration {
        Duration::from_millis(self.cleanup_window_ms)
    }
}

/// Template for one source produced by a data-retrieval request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTemplate {
    pub url: String,
    pub title: String,
    pub favicon: String,
}

impl SourceTemplate {
    pub fn new(url: impl Into<String>, title: impl Into<String>, favicon: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            favicon: favicon.into(),
        }
    }
}

/// Which reply source answers the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReplyProviderKind {
    /// Deterministic canned replies
    #[default]
    Mock,
    /// Gemini generative AI
    Gemini,
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatConfig {
    pub timing: PipelineTiming,
    pub title_max_chars: usize,
    /// Keywords that route a request to the sourced reply path
    pub keywords: Vec<String>,
    /// Sources produced for a sourced request, in display order
    pub source_templates: Vec<SourceTemplate>,
    pub provider: ReplyProviderKind,
    pub model: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            timing: PipelineTiming::default(),
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
            keywords: ["price", "scrape", "amazon", "flipkart"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            source_templates: vec![
                SourceTemplate::new(
                    "https://www.amazon.com/products/search",
                    "Amazon Product Search Results",
                    "https://www.amazon.com/favicon.ico",
                ),
                SourceTemplate::new(
                    "https://www.flipkart.com/search",
                    "Flipkart Product Listings",
                    "https://www.flipkart.com/favicon.ico",
                ),
            ],
            provider: ReplyProviderKind::Mock,
            model: crate::llm::DEFAULT_GEMINI_MODEL.to_string(),
        }
    }
}

impl ChatConfig {
    /// Load settings from a data directory, falling back to defaults.
    ///
    /// `SCRAPER_LLM_MODEL` overrides the configured model.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(SETTINGS_FILE);
        let mut config = if path.exists() {
            match std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|content| serde_json::from_str::<ChatConfig>(&content).map_err(|e| e.to_string()))
            {
                Ok(config) => config,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring unreadable settings");
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        if let Ok(model) = std::env::var("SCRAPER_LLM_MODEL") {
            if !model.is_empty() {
                config.model = model;
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;

    #[test]
    fn test_source_delay_stays_in_bounds() {
        let timing = PipelineTiming::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let delay = timing.source_delay(&mut rng);
            assert!(delay >= Duration::from_millis(1500));
            assert!(delay <= Duration::from_millis(2500));
        }
    }

    #[test]
    fn test_zero_jitter_is_exact() {
        let timing = PipelineTiming {
            source_delay_ms: 10,
            source_jitter_ms: 0,
            ..PipelineTiming::immediate()
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(timing.source_delay(&mut rng), Duration::from_millis(10));
    }

    #[test]
    fn test_huge_delays_saturate() {
        let timing = PipelineTiming {
            source_delay_ms: u64::MAX,
            source_jitter_ms: 10,
            ..PipelineTiming::immediate()
        };
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(timing.source_delay(&mut rng), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_partial_settings_keep_defaults() {
        let temp = tempdir().unwrap();
        std::fs::write(
            temp.path().join(SETTINGS_FILE),
            r#"{ "timing": { "cleanupWindowMs": 5000 }, "keywords": ["ebay"] }"#,
        )
        .unwrap();

        let config = ChatConfig::load(temp.path());
        assert_eq!(config.timing.cleanup_window_ms, 5000);
        assert_eq!(config.timing.source_delay_ms, 1500);
        assert_eq!(config.keywords, vec!["ebay".to_string()]);
        assert_eq!(config.source_templates.len(), 2);
        assert_eq!(config.provider, ReplyProviderKind::Mock);
    }

    #[test]
    fn test_malformed_settings_fall_back_to_defaults() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join(SETTINGS_FILE), "not json").unwrap();

        let config = ChatConfig::load(temp.path());
        assert_eq!(config.keywords, ChatConfig::default().keywords);
    }
}
