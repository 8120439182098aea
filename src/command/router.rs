//! Command Router
//!
//! Resolves an invocation to a `Command`, runs it against the injected
//! storage and drives the reply controller to a final response.

use tracing::{error, info, warn};

use super::{Command, DeferPolicy, Invocation, InvocationStyle};
use crate::error::{BotError, BotResult};
use crate::reply::{AckPath, Reply, ReplyChannel, ReplyController};
use crate::store::{Collection, FileRecord, RemoveTarget, Storage};

pub const GENERIC_FAILURE: &str = "Something went wrong…";
pub const UNKNOWN_COMMAND: &str = "Unknown command";

/// How a single invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Valid command, nothing to show (empty list, no matches)
    EmptyResult,
    ValidationError,
    BackendError,
    UnrecognizedCommand,
    /// Text message without a command keyword
    NoCommand,
}

/// Result of dispatching one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub outcome: Outcome,
    pub ack: AckPath,
}

/// Text produced by a successful command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub content: String,
    pub empty: bool,
}

impl CommandOutput {
    fn done(content: impl Into<String>) -> Self {
        Self { content: content.into(), empty: false }
    }

    fn nothing(content: impl Into<String>) -> Self {
        Self { content: content.into(), empty: true }
    }
}

/// Routes commands to storage; holds no per-invocation state
#[derive(Clone)]
pub struct CommandRouter {
    storage: Storage,
    defer_policy: DeferPolicy,
}

impl CommandRouter {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            defer_policy: DeferPolicy::default(),
        }
    }

    pub fn with_defer_policy(mut self, policy: DeferPolicy) -> Self {
        self.defer_policy = policy;
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Handle one slash-command invocation from start to final response
    pub async fn dispatch<C: ReplyChannel>(&self, invocation: Invocation, channel: C) -> DispatchReport {
        let mut ctl = ReplyController::new(channel);

        let outcome = match Command::from_invocation(&invocation, InvocationStyle::Slash) {
            Ok(command) => self.run(command, &mut ctl).await,
            Err(e) => self.reject(e, &mut ctl).await,
        };

        let ack = ctl.ensure_finalized(Reply::ephemeral(GENERIC_FAILURE)).await;
        DispatchReport { outcome, ack }
    }

    /// Execute a validated command and answer through `ctl`
    pub async fn run<C: ReplyChannel>(&self, command: Command, ctl: &mut ReplyController<C>) -> Outcome {
        let kind = command.kind();
        info!("⚙️  Running {}", kind);

        if self.defer_policy.should_defer(&command) {
            // A failed defer leaves the interaction Fresh; the answer then goes out as a plain reply
            if let Err(e) = ctl.defer().await {
                warn!("Could not defer {}: {}", kind, e);
            }
        }

        match self.execute(command).await {
            Ok(output) => {
                let outcome = if output.empty { Outcome::EmptyResult } else { Outcome::Success };
                ctl.deliver(Reply::public(output.content)).await;
                outcome
            }
            Err(e) => {
                error!("❌ {} failed: {}", kind, e);
                ctl.deliver(Reply::ephemeral(GENERIC_FAILURE)).await;
                Outcome::BackendError
            }
        }
    }

    /// Answer an invocation that never became a command
    pub async fn reject<C: ReplyChannel>(&self, err: BotError, ctl: &mut ReplyController<C>) -> Outcome {
        match err {
            BotError::Validation(hint) => {
                ctl.deliver(Reply::ephemeral(hint)).await;
                Outcome::ValidationError
            }
            BotError::UnrecognizedCommand(name) => {
                warn!("Unknown command '{}'", name);
                ctl.deliver(Reply::ephemeral(UNKNOWN_COMMAND)).await;
                Outcome::UnrecognizedCommand
            }
            other => {
                error!("Invocation rejected: {}", other);
                ctl.deliver(Reply::ephemeral(GENERIC_FAILURE)).await;
                Outcome::BackendError
            }
        }
    }

    /// Perform the storage work for a command and render its response text
    pub async fn execute(&self, command: Command) -> BotResult<CommandOutput> {
        match command {
            Command::AddCartItem { item } => self.add_entry(Collection::Cart, &item).await,
            Command::ListCart => self.list_entries(Collection::Cart).await,
            Command::RemoveCartItem { item } => self.remove_entry(Collection::Cart, &item).await,
            Command::AddNote { note } => self.add_entry(Collection::Notes, &note).await,
            Command::ListNotes => self.list_entries(Collection::Notes).await,
            Command::DeleteNote { note } => self.remove_entry(Collection::Notes, &note).await,
            Command::AddMeal { meal } => self.add_entry(Collection::Meals, &meal).await,
            Command::ListMeals => self.list_entries(Collection::Meals).await,
            Command::DeleteMeal { meal } => self.remove_entry(Collection::Meals, &meal).await,
            Command::SaveFile { url, description, origin } => {
                let record = FileRecord::new(url, description.clone(), origin.channel_id, origin.interaction_id);
                self.storage.files.save(record).await?;
                Ok(CommandOutput::done(format!("Saved file \"{}\" 📎", description)))
            }
            Command::FindFile { keyword } => {
                let keyword = keyword.unwrap_or_default();
                let found = self.storage.files.find(&keyword).await?;
                Ok(render_files(&keyword, &found))
            }
        }
    }

    async fn add_entry(&self, collection: Collection, entry: &str) -> BotResult<CommandOutput> {
        self.storage.lists.add(collection, entry).await?;
        Ok(CommandOutput::done(wording(collection).added(entry)))
    }

    async fn list_entries(&self, collection: Collection) -> BotResult<CommandOutput> {
        let entries = self.storage.lists.list(collection).await?;
        let words = wording(collection);
        if entries.is_empty() {
            return Ok(CommandOutput::nothing(words.empty));
        }
        Ok(CommandOutput::done(format!("{}\n{}", words.heading, numbered(&entries))))
    }

    async fn remove_entry(&self, collection: Collection, entry: &str) -> BotResult<CommandOutput> {
        self.storage.lists.remove(collection, entry).await?;
        let words = wording(collection);
        let content = match RemoveTarget::parse(entry) {
            RemoveTarget::All => words.cleared.to_string(),
            RemoveTarget::Exact(text) => words.removed(text),
        };
        Ok(CommandOutput::done(content))
    }
}

/// User-facing phrasing for one collection
struct Wording {
    heading: &'static str,
    empty: &'static str,
    cleared: &'static str,
    /// Name of the list in "added to the ..." sentences
    target: &'static str,
    emoji: &'static str,
}

impl Wording {
    fn added(&self, entry: &str) -> String {
        format!("Added \"{}\" to the {} {}", entry, self.target, self.emoji)
    }

    fn removed(&self, entry: &str) -> String {
        format!("Removed \"{}\" from the {} {}", entry, self.target, self.emoji)
    }
}

fn wording(collection: Collection) -> Wording {
    match collection {
        Collection::Cart => Wording {
            heading: "🛒 **Shopping Cart:**",
            empty: "🛒 Shopping cart is empty",
            cleared: "Cleared the shopping list 🛒",
            target: "shopping list",
            emoji: "🛒",
        },
        Collection::Notes => Wording {
            heading: "📝 **Notes:**",
            empty: "📝 No notes yet",
            cleared: "Cleared all notes 📝",
            target: "notes",
            emoji: "📝",
        },
        Collection::Meals => Wording {
            heading: "🍽️ **Meal Plan:**",
            empty: "🍽️ Meal plan is empty",
            cleared: "Cleared the meal plan 🍽️",
            target: "meal plan",
            emoji: "🍽️",
        },
    }
}

fn numbered(entries: &[String]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| format!("{}. {}", idx + 1, entry))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_files(keyword: &str, found: &[FileRecord]) -> CommandOutput {
    if found.is_empty() {
        return if keyword.is_empty() {
            CommandOutput::nothing("📎 No files saved yet")
        } else {
            CommandOutput::nothing(format!("📎 No files matching \"{}\"", keyword))
        };
    }

    let heading = if keyword.is_empty() {
        "📎 **Saved files:**".to_string()
    } else {
        format!("📎 **Files matching \"{}\":**", keyword)
    };
    let lines = found
        .iter()
        .enumerate()
        .map(|(idx, r)| format!("{}. {}: {}", idx + 1, r.description, r.url))
        .collect::<Vec<_>>()
        .join("\n");
    CommandOutput::done(format!("{}\n{}", heading, lines))
}
