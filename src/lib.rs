//! Pantry Pup
//!
//! A household chat bot that keeps shared lists for a group:
//! - Shopping cart, notes and meal ideas
//! - An index of shared files searchable by description
//! - Slash commands and @mention text commands over one router
//! - Flat-file, SQLite or Supabase storage

pub mod channel;
pub mod command;
pub mod config;
pub mod error;
pub mod reply;
pub mod server;
pub mod store;

// Re-exports for convenience
pub use command::{Command, CommandRouter, Invocation, MentionResponder};
pub use config::{BackendConfig, BotConfig};
pub use error::{BotError, BotResult};
pub use reply::{Reply, ReplyChannel, ReplyController};
pub use store::{Collection, FileRecord, Storage};
