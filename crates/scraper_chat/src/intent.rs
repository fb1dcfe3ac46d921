//! Intent classification.
//!
//! Decides whether a user request takes the sourced reply path (data
//! retrieval with a source batch) or the plain reply path.

use crate::config::{ChatConfig, SourceTemplate};
use crate::types::ScrapedSource;

/// Outcome of classifying one user request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Intent {
    /// Keywords that matched, in vocabulary order
    pub matched: Vec<String>,
    /// Sources to retrieve; empty selects the plain path
    pub templates: Vec<SourceTemplate>,
}

impl Intent {
    pub fn has_sources(&self) -> bool {
        !self.templates.is_empty()
    }

    /// Fresh `idle` sources for this request, one per template
    pub fn materialize(&self) -> Vec<ScrapedSource> {
        self.templates
            .iter()
            .map(|t| ScrapedSource::new(&t.url, &t.title, &t.favicon))
            .collect()
    }
}

/// Maps user text to an intent
pub trait IntentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Intent;
}

/// Case-insensitive keyword match against a fixed vocabulary
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
    sources: Vec<SourceTemplate>,
}

impl KeywordClassifier {
    pub fn new(keywords: impl IntoIterator<Item = impl Into<String>>, sources: Vec<SourceTemplate>) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.into().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            sources,
        }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(config.keywords.iter().cloned(), config.source_templates.clone())
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::from_config(&ChatConfig::default())
    }
}

impl IntentClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Intent {
        let lower = text.to_lowercase();
        let matched: Vec<String> = self
            .keywords
            .iter()
            .filter(|k| lower.contains(k.as_str()))
            .cloned()
            .collect();

        if matched.is_empty() {
            return Intent::default();
        }

        Intent {
            matched,
            templates: self.sources.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceStatus;

    #[test]
    fn test_price_request_selects_sources() {
        let classifier = KeywordClassifier::default();
        let intent = classifier.classify("Get the price of MacBook from Amazon and Flipkart");

        assert!(intent.has_sources());
        assert_eq!(intent.matched, vec!["price", "amazon", "flipkart"]);
        assert_eq!(intent.templates.len(), 2);
        assert_eq!(intent.templates[0].title, "Amazon Product Search Results");
        assert_eq!(intent.templates[1].title, "Flipkart Product Listings");
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let classifier = KeywordClassifier::default();
        assert!(classifier.classify("SCRAPE this page").has_sources());
    }

    #[test]
    fn test_plain_request_has_no_sources() {
        let classifier = KeywordClassifier::default();
        let intent = classifier.classify("hello there");
        assert!(!intent.has_sources());
        assert!(intent.matched.is_empty());
    }

    #[test]
    fn test_materialize_creates_idle_sources_with_unique_ids() {
        let intent = KeywordClassifier::default().classify("price check");
        let sources = intent.materialize();
        assert_eq!(sources.len(), 2);
        assert!(sources.iter().all(|s| s.status == SourceStatus::Idle));
        assert_ne!(sources[0].id, sources[1].id);
    }

    #[test]
    fn test_custom_vocabulary() {
        let classifier = KeywordClassifier::new(
            ["eBay"],
            vec![SourceTemplate::new("https://www.ebay.com", "eBay", "")],
        );
        assert_eq!(classifier.keywords(), &["ebay".to_string()]);
        assert!(classifier.classify("compare on ebay").has_sources());
        assert!(!classifier.classify("price on amazon").has_sources());
    }
}
