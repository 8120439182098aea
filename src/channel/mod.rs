//! Chat platform adapters

pub mod telegram;

pub use telegram::TelegramReplyChannel;
