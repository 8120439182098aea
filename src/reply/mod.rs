//! Reply-State Controller
//!
//! Every inbound command must be acknowledged exactly once, either with an
//! immediate reply or with a deferred placeholder that is later filled in.
//! `ReplyController` tracks that state for one invocation and rejects any
//! transition the platform would refuse.

pub mod recording;

pub use recording::RecordingChannel;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::error::{BotError, BotResult};

/// User-visible response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    /// Only visible to the invoking user (where the platform supports it)
    pub ephemeral: bool,
}

impl Reply {
    pub fn public(content: impl Into<String>) -> Self {
        Self { content: content.into(), ephemeral: false }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self { content: content.into(), ephemeral: true }
    }
}

/// Platform-side acknowledgment primitives for one interaction
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    /// Acknowledge and answer in one step
    async fn reply(&self, reply: &Reply) -> BotResult<()>;

    /// Acknowledge now, answer later
    async fn defer(&self) -> BotResult<()>;

    /// Fill in a previously deferred acknowledgment
    async fn edit(&self, reply: &Reply) -> BotResult<()>;

    /// Send an extra message without touching the acknowledgment
    async fn follow_up(&self, reply: &Reply) -> BotResult<()>;
}

/// How a finalized interaction was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckPath {
    /// `reply` from Fresh
    Replied,
    /// `defer` then `finalize`
    Edited,
    /// Primary channel failed; answered through `follow_up`
    FollowUp,
    /// Nothing could be delivered (logged only)
    Undelivered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    /// Nothing sent yet
    Fresh,
    /// Placeholder acknowledged, body pending
    Deferred,
    /// Complete response delivered (or given up on)
    Finalized(AckPath),
}

impl InteractionState {
    pub fn is_finalized(&self) -> bool {
        matches!(self, InteractionState::Finalized(_))
    }
}

impl std::fmt::Display for InteractionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InteractionState::Fresh => write!(f, "Fresh"),
            InteractionState::Deferred => write!(f, "Deferred"),
            InteractionState::Finalized(path) => write!(f, "Finalized({:?})", path),
        }
    }
}

/// Drives one interaction from Fresh to Finalized
pub struct ReplyController<C: ReplyChannel> {
    channel: C,
    state: InteractionState,
}

impl<C: ReplyChannel> ReplyController<C> {
    pub fn new(channel: C) -> Self {
        Self { channel, state: InteractionState::Fresh }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    fn illegal(&self, op: &'static str) -> BotError {
        BotError::IllegalTransition { op, state: self.state.to_string() }
    }

    /// Fresh -> Finalized(Replied)
    pub async fn reply(&mut self, reply: Reply) -> BotResult<()> {
        if self.state != InteractionState::Fresh {
            return Err(self.illegal("reply"));
        }
        self.channel.reply(&reply).await?;
        self.state = InteractionState::Finalized(AckPath::Replied);
        Ok(())
    }

    /// Fresh -> Deferred
    pub async fn defer(&mut self) -> BotResult<()> {
        if self.state != InteractionState::Fresh {
            return Err(self.illegal("defer"));
        }
        self.channel.defer().await?;
        debug!("Interaction deferred");
        self.state = InteractionState::Deferred;
        Ok(())
    }

    /// Deferred -> Finalized(Edited)
    pub async fn finalize(&mut self, reply: Reply) -> BotResult<()> {
        if self.state != InteractionState::Deferred {
            return Err(self.illegal("finalize"));
        }
        self.channel.edit(&reply).await?;
        self.state = InteractionState::Finalized(AckPath::Edited);
        Ok(())
    }

    /// Answer through whichever primary path the current state allows
    pub async fn respond(&mut self, reply: Reply) -> BotResult<()> {
        match self.state {
            InteractionState::Fresh => self.reply(reply).await,
            InteractionState::Deferred => self.finalize(reply).await,
            InteractionState::Finalized(_) => Err(self.illegal("respond")),
        }
    }

    /// Deliver a message no matter what state the interaction is in.
    ///
    /// Uses the primary path when it is still open and falls back to a
    /// single follow-up message. Always leaves the interaction Finalized.
    pub async fn deliver(&mut self, message: Reply) -> AckPath {
        let primary = match self.state {
            InteractionState::Fresh => self.reply(message.clone()).await,
            InteractionState::Deferred => self.finalize(message.clone()).await,
            InteractionState::Finalized(_) => Err(BotError::ReplyChannelExhausted(
                "interaction already finalized".to_string(),
            )),
        };

        match primary {
            Ok(()) => return self.ack_path(),
            Err(e) => warn!("Primary reply path unavailable ({}), sending follow-up", e),
        }

        let path = match self.channel.follow_up(&message).await {
            Ok(()) => AckPath::FollowUp,
            Err(e) => {
                error!("{}", BotError::ReplyChannelExhausted(format!("follow-up failed: {}", e)));
                AckPath::Undelivered
            }
        };

        // An interaction that was already finalized keeps its original path
        if !self.state.is_finalized() {
            self.state = InteractionState::Finalized(path);
        }
        path
    }

    /// Finalize with `notice` unless a response was already delivered
    pub async fn ensure_finalized(&mut self, notice: Reply) -> AckPath {
        if self.state.is_finalized() {
            return self.ack_path();
        }
        warn!("Handler finished in state {}, finalizing", self.state);
        self.deliver(notice).await
    }

    fn ack_path(&self) -> AckPath {
        match self.state {
            InteractionState::Finalized(path) => path,
            _ => AckPath::Undelivered,
        }
    }

    /// Consume the controller, returning the terminal state
    pub fn into_state(mut self) -> InteractionState {
        let state = self.state;
        // Consumed deliberately; skip the drop check
        self.state = InteractionState::Finalized(self.ack_path());
        state
    }
}

impl<C: ReplyChannel> Drop for ReplyController<C> {
    fn drop(&mut self) {
        if !self.state.is_finalized() {
            warn!("Interaction dropped in state {} without a final response", self.state);
        }
    }
}
