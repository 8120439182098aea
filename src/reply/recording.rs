//! Recording reply channel
//!
//! An in-memory `ReplyChannel` that records every call. Clones share the
//! same log, so a caller can keep one handle while the controller owns another.
//! Public so the integration tests under `tests/` can drive the router
//! without a chat platform; the bot itself never constructs one.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::{Reply, ReplyChannel};
use crate::error::{BotError, BotResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCall {
    Reply(Reply),
    Defer,
    Edit(Reply),
    FollowUp(Reply),
}

#[derive(Default)]
struct Failures {
    reply: bool,
    defer: bool,
    edit: bool,
    follow_up: bool,
}

#[derive(Clone, Default)]
pub struct RecordingChannel {
    calls: Arc<Mutex<Vec<ChannelCall>>>,
    failures: Arc<Failures>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_failures(self, f: impl FnOnce(&mut Failures)) -> Self {
        let mut failures = Failures {
            reply: self.failures.reply,
            defer: self.failures.defer,
            edit: self.failures.edit,
            follow_up: self.failures.follow_up,
        };
        f(&mut failures);
        Self { calls: self.calls, failures: Arc::new(failures) }
    }

    pub fn failing_reply(self) -> Self {
        self.with_failures(|f| f.reply = true)
    }

    pub fn failing_defer(self) -> Self {
        self.with_failures(|f| f.defer = true)
    }

    pub fn failing_edit(self) -> Self {
        self.with_failures(|f| f.edit = true)
    }

    pub fn failing_follow_up(self) -> Self {
        self.with_failures(|f| f.follow_up = true)
    }

    /// Successful calls, in order
    pub fn calls(&self) -> Vec<ChannelCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Content of the last delivered message, if any
    pub fn last_content(&self) -> Option<String> {
        self.calls().into_iter().rev().find_map(|call| match call {
            ChannelCall::Reply(r) | ChannelCall::Edit(r) | ChannelCall::FollowUp(r) => Some(r.content),
            ChannelCall::Defer => None,
        })
    }

    fn record(&self, fail: bool, op: &str, call: ChannelCall) -> BotResult<()> {
        if fail {
            return Err(BotError::Platform(format!("{} rejected", op)));
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        Ok(())
    }
}

#[async_trait]
impl ReplyChannel for RecordingChannel {
    async fn reply(&self, reply: &Reply) -> BotResult<()> {
        self.record(self.failures.reply, "reply", ChannelCall::Reply(reply.clone()))
    }

    async fn defer(&self) -> BotResult<()> {
        self.record(self.failures.defer, "defer", ChannelCall::Defer)
    }

    async fn edit(&self, reply: &Reply) -> BotResult<()> {
        self.record(self.failures.edit, "edit", ChannelCall::Edit(reply.clone()))
    }

    async fn follow_up(&self, reply: &Reply) -> BotResult<()> {
        self.record(self.failures.follow_up, "follow_up", ChannelCall::FollowUp(reply.clone()))
    }
}
