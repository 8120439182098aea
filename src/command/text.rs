//! Text-Command Parser
//!
//! Secondary entry point for plain messages that mention the bot, e.g.
//! `@pantry_pup /shop heavy cream`. Messages without a known keyword get a
//! passive "woof".

use regex::Regex;
use std::sync::Arc;

use super::router::GENERIC_FAILURE;
use super::{Command, CommandKind, CommandRouter, DispatchReport, Invocation, InvocationStyle, Origin, Outcome};
use crate::error::{BotError, BotResult};
use crate::reply::{Reply, ReplyChannel, ReplyController};

pub const PASSIVE_ACK: &str = "woof";

/// Keyword found at the start of a mention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKeyword {
    Help,
    Command(CommandKind),
}

impl TextKeyword {
    pub fn lookup(word: &str) -> Option<Self> {
        let word = word.to_lowercase();
        if word == "help" {
            return Some(TextKeyword::Help);
        }

        let kind = match word.as_str() {
            "list" | "cart" => CommandKind::ListCart,
            "notes" => CommandKind::ListNotes,
            "meals" => CommandKind::ListMeals,
            "find" => CommandKind::FindFile,
            "save" => CommandKind::SaveFile,
            other => CommandKind::from_name(other)?,
        };
        Some(TextKeyword::Command(kind))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMention {
    pub keyword: Option<TextKeyword>,
    pub args: String,
}

/// Split mention text (bot mention already stripped) into keyword and arguments
pub fn parse_mention_command(text: &str) -> ParsedMention {
    let mut t = text.trim();
    if t.is_empty() {
        return ParsedMention { keyword: None, args: String::new() };
    }

    if let Some(stripped) = t.strip_prefix('/') {
        t = stripped.trim_start();
    }

    let (first, rest) = match t.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim()),
        None => (t, ""),
    };

    ParsedMention {
        keyword: TextKeyword::lookup(first),
        args: rest.to_string(),
    }
}

/// Matches the bot's own mention tokens
#[derive(Debug, Clone)]
pub struct MentionPattern {
    regex: Regex,
}

impl MentionPattern {
    /// `<@id>` and `<@!id>` always match; `@username` too when given
    pub fn new(bot_id: &str, username: Option<&str>) -> BotResult<Self> {
        let mut pattern = format!("(?i)<@!?{}>", regex::escape(bot_id));
        if let Some(username) = username.filter(|u| !u.is_empty()) {
            pattern.push_str(&format!(r"|@{}\b", regex::escape(username.trim_start_matches('@'))));
        }

        let regex = Regex::new(&pattern).map_err(|e| BotError::Config(format!("Invalid mention pattern: {}", e)))?;
        Ok(Self { regex })
    }

    pub fn is_mentioned(&self, content: &str) -> bool {
        self.regex.is_match(content)
    }

    /// Remove every mention token and trim
    pub fn strip(&self, content: &str) -> String {
        self.regex.replace_all(content, "").trim().to_string()
    }
}

/// Usage text listing every command
pub fn help_text() -> String {
    let mut text = String::from("Usage:");
    for kind in CommandKind::ALL {
        text.push_str(&format!("\n`@me {}`: {}", kind.usage(), kind.description()));
    }
    text
}

/// Answers mention messages through the shared router
#[derive(Clone)]
pub struct MentionResponder {
    router: Arc<CommandRouter>,
    pattern: MentionPattern,
}

impl MentionResponder {
    pub fn new(router: Arc<CommandRouter>, pattern: MentionPattern) -> Self {
        Self { router, pattern }
    }

    pub fn pattern(&self) -> &MentionPattern {
        &self.pattern
    }

    pub async fn respond<C: ReplyChannel>(&self, content: &str, origin: Origin, channel: C) -> DispatchReport {
        let text = self.pattern.strip(content);
        let parsed = parse_mention_command(&text);
        let mut ctl = ReplyController::new(channel);

        let outcome = match parsed.keyword {
            None => {
                ctl.deliver(Reply::public(PASSIVE_ACK)).await;
                Outcome::NoCommand
            }
            Some(TextKeyword::Help) => {
                ctl.deliver(Reply::public(help_text())).await;
                Outcome::Success
            }
            Some(TextKeyword::Command(kind)) => {
                let invocation = Invocation::from_text(kind.name(), &parsed.args, origin);
                match Command::build(kind, &invocation, InvocationStyle::Mention) {
                    Ok(command) => self.router.run(command, &mut ctl).await,
                    Err(e) => self.router.reject(e, &mut ctl).await,
                }
            }
        };

        let ack = ctl.ensure_finalized(Reply::ephemeral(GENERIC_FAILURE)).await;
        DispatchReport { outcome, ack }
    }
}
