//! Reply sources.
//!
//! A reply source turns the user's text (plus the sources gathered for it,
//! if any) into the assistant's answer. Failures must come back as
//! `ChatError::ReplyProduction`, never as malformed text.

use async_trait::async_trait;

use crate::error::ChatResult;
use crate::types::ScrapedSource;

/// Input to a reply source
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyRequest {
    pub user_text: String,
    /// Finalized sources of this turn; empty on the plain path
    pub sources: Vec<ScrapedSource>,
}

impl ReplyRequest {
    pub fn new(user_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            sources: Vec::new(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<ScrapedSource>) -> Self {
        self.sources = sources;
        self
    }
}

/// Produced reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
}

impl Reply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Produces assistant replies
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReplySource: Send + Sync {
    async fn produce_reply(&self, request: &ReplyRequest) -> ChatResult<Reply>;
}

/// Notice shown in place of the assistant reply when production fails
pub const REPLY_FAILURE_NOTICE: &str =
    "Sorry, I couldn't get a response right now. Please try again in a moment.";

/// Deterministic replies that need no network
#[derive(Debug, Default, Clone)]
pub struct CannedReplySource;

impl CannedReplySource {
    fn sourced_reply(sources: &[ScrapedSource]) -> String {
        let names = sources
            .iter()
            .map(|s| format!("• **{}**: {}", s.title, s.url))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "I've collected pricing information from multiple e-commerce platforms. \
Here's what the sources returned:\n\n\
**Product Pricing Analysis:**\n\n\
{}\n\n\
The retrieval accessed {} sources to gather the data. \
Would you like me to monitor these prices for changes or check additional platforms?",
            names,
            sources.len()
        )
    }

    fn plain_reply(user_text: &str) -> String {
        format!(
            "I understand you're asking about \"{}\".\n\n\
As WebScraper AI, I can help you extract and analyze data from websites. I specialize in:\n\n\
• **Price Monitoring**: Track product prices across e-commerce platforms\n\
• **Data Extraction**: Gather structured information from websites\n\
• **Content Scraping**: Extract articles, reviews, and social media content\n\
• **Market Analysis**: Compare data across multiple sources\n\n\
Try asking me something like \"Get the price of MacBook from Amazon and Flipkart\" to see the sources in action!",
            user_text
        )
    }
}

#[async_trait]
impl ReplySource for CannedReplySource {
    async fn produce_reply(&self, request: &ReplyRequest) -> ChatResult<Reply> {
        let text = if request.sources.is_empty() {
            Self::plain_reply(&request.user_text)
        } else {
            Self::sourced_reply(&request.sources)
        };
        Ok(Reply::new(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plain_reply_echoes_request() {
        let reply = CannedReplySource
            .produce_reply(&ReplyRequest::new("what can you do?"))
            .await
            .unwrap();
        assert!(reply.text.contains("\"what can you do?\""));
    }

    #[tokio::test]
    async fn test_sourced_reply_counts_sources() {
        let sources = vec![
            ScrapedSource::new("https://www.amazon.com/products/search", "Amazon Product Search Results", ""),
            ScrapedSource::new("https://www.flipkart.com/search", "Flipkart Product Listings", ""),
        ];
        let reply = CannedReplySource
            .produce_reply(&ReplyRequest::new("price").with_sources(sources))
            .await
            .unwrap();
        assert!(reply.text.contains("accessed 2 sources"));
        assert!(reply.text.contains("Flipkart Product Listings"));
    }
}
