//! # scraper_chat - Chat store and source feed for WebScraper AI
//!
//! This crate provides the stateful core of the WebScraper AI assistant:
//! - Persistent chat sessions with create/switch/delete/search
//! - A simulated multi-source retrieval status feed for sourced replies
//! - A conversation controller tying input, classification, sources and
//!   replies into one turn
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────────┐     ┌─────────────────┐
//! │   User input    │────▶│ ConversationController│────▶│  ReplySource    │
//! └─────────────────┘     └──────────┬───────────┘     └─────────────────┘
//!                                    │
//!         ┌──────────────────────────┼─────────────────────────┐
//!         ▼                          ▼                         ▼
//! ┌───────────────┐       ┌────────────────────┐      ┌───────────────┐
//! │ IntentClassif.│       │SourceStatusPipeline│─────▶│  SourceFeed   │
//! └───────────────┘       └────────────────────┘      └───────────────┘
//!                                    │
//!                                    ▼
//!                       ┌────────────────────────┐
//!                       │  ChatStorageManager    │
//!                       │  + PersistentStore     │
//!                       └────────────────────────┘
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod feed;
pub mod input;
pub mod intent;
pub mod llm;
pub mod persistence;
pub mod pipeline;
pub mod reply;
pub mod scheduler;
pub mod storage;
pub mod types;

pub use config::*;
pub use controller::*;
pub use error::*;
pub use feed::*;
pub use input::*;
pub use intent::*;
pub use llm::*;
pub use persistence::*;
pub use pipeline::*;
pub use reply::*;
pub use scheduler::*;
pub use storage::*;
pub use types::*;
