//! Telegram Bridge
//!
//! Long-polls Telegram and feeds each message to the router (for
//! `/command` messages) or the mention responder (for messages addressed
//! to the bot). Deferral is a placeholder message that is edited in place.

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::MessageId;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::command::{CommandRouter, Invocation, MentionPattern, MentionResponder, Origin};
use crate::error::{BotError, BotResult};
use crate::reply::{Reply, ReplyChannel};

const PLACEHOLDER: &str = "⏳ Working on it…";

/// Reply channel bound to one chat
pub struct TelegramReplyChannel {
    bot: Bot,
    chat_id: ChatId,
    placeholder: Mutex<Option<MessageId>>,
}

impl TelegramReplyChannel {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self {
            bot,
            chat_id,
            placeholder: Mutex::new(None),
        }
    }

    async fn send(&self, content: &str) -> BotResult<Message> {
        self.bot
            .send_message(self.chat_id, content.to_string())
            .await
            .map_err(|e| BotError::Platform(e.to_string()))
    }
}

#[async_trait]
impl ReplyChannel for TelegramReplyChannel {
    // Telegram has no ephemeral messages; the flag is ignored
    async fn reply(&self, reply: &Reply) -> BotResult<()> {
        self.send(&reply.content).await.map(|_| ())
    }

    async fn defer(&self) -> BotResult<()> {
        let sent = self.send(PLACEHOLDER).await?;
        *self.placeholder.lock().await = Some(sent.id);
        Ok(())
    }

    async fn edit(&self, reply: &Reply) -> BotResult<()> {
        let message_id = self
            .placeholder
            .lock()
            .await
            .ok_or_else(|| BotError::Platform("no deferred placeholder to edit".to_string()))?;

        self.bot
            .edit_message_text(self.chat_id, message_id, reply.content.clone())
            .await
            .map(|_| ())
            .map_err(|e| BotError::Platform(e.to_string()))
    }

    async fn follow_up(&self, reply: &Reply) -> BotResult<()> {
        self.send(&reply.content).await.map(|_| ())
    }
}

/// A `/name[@bot] args` message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashText {
    pub name: String,
    pub args: String,
}

/// Parse a slash message; `None` if it is not one or targets another bot
pub fn parse_slash(text: &str, bot_username: Option<&str>) -> Option<SlashText> {
    let rest = text.trim_start().strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest.trim_end(), ""),
    };

    let (name, target) = match head.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (head, None),
    };

    if let (Some(target), Some(me)) = (target, bot_username) {
        if !target.eq_ignore_ascii_case(me) {
            return None;
        }
    }
    if name.is_empty() {
        return None;
    }

    Some(SlashText {
        name: name.to_lowercase(),
        args: args.to_string(),
    })
}

/// Shared by every message handler
struct BotState {
    router: Arc<CommandRouter>,
    responder: MentionResponder,
    username: Option<String>,
}

async fn handle_message(bot: Bot, msg: Message, state: Arc<BotState>) -> anyhow::Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let origin = Origin::new(msg.chat.id.0.to_string(), msg.id.0.to_string());
    let channel = TelegramReplyChannel::new(bot, msg.chat.id);

    let report = match parse_slash(text, state.username.as_deref()) {
        // Telegram's built-in commands go to the usage text
        Some(slash) if matches!(slash.name.as_str(), "start" | "help") => {
            state.responder.respond("help", origin, channel).await
        }
        Some(slash) => {
            let invocation = Invocation::from_text(slash.name, &slash.args, origin);
            state.router.dispatch(invocation, channel).await
        }
        None if msg.chat.is_private() || state.responder.pattern().is_mentioned(text) => {
            state.responder.respond(text, origin, channel).await
        }
        None => return Ok(()),
    };

    debug!("Chat {} message {} -> {:?}", msg.chat.id, msg.id.0, report);
    Ok(())
}

/// Run the bot until the process is stopped
pub async fn run(bot: Bot, router: Arc<CommandRouter>) -> anyhow::Result<()> {
    let me = bot.get_me().await?;
    let username = me.user.username.clone();
    let pattern = MentionPattern::new(&me.user.id.0.to_string(), username.as_deref())?;

    info!("✅ Logged in as @{}", username.as_deref().unwrap_or("unknown"));

    let state = Arc::new(BotState {
        responder: MentionResponder::new(router.clone(), pattern),
        router,
        username,
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
