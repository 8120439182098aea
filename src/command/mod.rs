//! Command Module
//!
//! The closed set of chat commands, how inbound invocations are turned
//! into them, and the router that executes them against storage.

pub mod router;
pub mod text;

pub use router::{CommandRouter, DispatchReport, Outcome};
pub use text::{parse_mention_command, MentionPattern, MentionResponder, ParsedMention, TextKeyword};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{BotError, BotResult};

/// Where an invocation came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub channel_id: String,
    pub interaction_id: String,
}

impl Origin {
    pub fn new(channel_id: impl Into<String>, interaction_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            interaction_id: interaction_id.into(),
        }
    }
}

/// A named option of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub name: &'static str,
    pub required: bool,
    /// Noun phrase used in validation hints ("an item")
    pub phrase: &'static str,
}

const fn required(name: &'static str, phrase: &'static str) -> OptionSpec {
    OptionSpec { name, required: true, phrase }
}

const ITEM: &[OptionSpec] = &[required("item", "an item")];
const NOTE: &[OptionSpec] = &[required("note", "a note")];
const MEAL: &[OptionSpec] = &[required("meal", "a meal")];
const FILE: &[OptionSpec] = &[required("url", "a file url"), required("description", "a description")];
const KEYWORD: &[OptionSpec] = &[OptionSpec { name: "keyword", required: false, phrase: "a keyword" }];

/// Identifier of every command the bot understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandKind {
    AddCartItem,
    ListCart,
    RemoveCartItem,
    AddNote,
    ListNotes,
    DeleteNote,
    SaveFile,
    FindFile,
    AddMeal,
    ListMeals,
    DeleteMeal,
}

impl CommandKind {
    pub const ALL: [CommandKind; 11] = [
        CommandKind::AddCartItem,
        CommandKind::ListCart,
        CommandKind::RemoveCartItem,
        CommandKind::AddNote,
        CommandKind::ListNotes,
        CommandKind::DeleteNote,
        CommandKind::SaveFile,
        CommandKind::FindFile,
        CommandKind::AddMeal,
        CommandKind::ListMeals,
        CommandKind::DeleteMeal,
    ];

    /// Slash-command name
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::AddCartItem => "shop",
            CommandKind::ListCart => "list-cart",
            CommandKind::RemoveCartItem => "shopped",
            CommandKind::AddNote => "note",
            CommandKind::ListNotes => "list-notes",
            CommandKind::DeleteNote => "delete-note",
            CommandKind::SaveFile => "save-file",
            CommandKind::FindFile => "find-file",
            CommandKind::AddMeal => "meal",
            CommandKind::ListMeals => "list-meals",
            CommandKind::DeleteMeal => "delete-meal",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().trim_start_matches('/').to_lowercase();
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            CommandKind::AddCartItem => "Add an item to the shopping list",
            CommandKind::ListCart => "Show all items in the shopping cart",
            CommandKind::RemoveCartItem => "Remove an item from the shopping list (\"all\" clears it)",
            CommandKind::AddNote => "Save a note",
            CommandKind::ListNotes => "Show all notes",
            CommandKind::DeleteNote => "Delete a note (\"all\" clears them)",
            CommandKind::SaveFile => "Save a file link with a description",
            CommandKind::FindFile => "Search saved files by description",
            CommandKind::AddMeal => "Add a meal to the meal plan",
            CommandKind::ListMeals => "Show the meal plan",
            CommandKind::DeleteMeal => "Remove a meal from the plan (\"all\" clears it)",
        }
    }

    pub fn options(&self) -> &'static [OptionSpec] {
        match self {
            CommandKind::AddCartItem | CommandKind::RemoveCartItem => ITEM,
            CommandKind::AddNote | CommandKind::DeleteNote => NOTE,
            CommandKind::AddMeal | CommandKind::DeleteMeal => MEAL,
            CommandKind::SaveFile => FILE,
            CommandKind::FindFile => KEYWORD,
            CommandKind::ListCart | CommandKind::ListNotes | CommandKind::ListMeals => &[],
        }
    }

    /// e.g. `/shop <item>` or `/find-file [keyword]`
    pub fn usage(&self) -> String {
        let mut usage = format!("/{}", self.name());
        for opt in self.options() {
            if opt.required {
                usage.push_str(&format!(" <{}>", opt.name));
            } else {
                usage.push_str(&format!(" [{}]", opt.name));
            }
        }
        usage
    }

    pub fn example(&self) -> &'static str {
        match self {
            CommandKind::AddCartItem => "/shop heavy cream",
            CommandKind::ListCart => "/list-cart",
            CommandKind::RemoveCartItem => "/shopped heavy cream",
            CommandKind::AddNote => "/note call the plumber",
            CommandKind::ListNotes => "/list-notes",
            CommandKind::DeleteNote => "/delete-note call the plumber",
            CommandKind::SaveFile => "/save-file https://example.com/receipt.pdf tax receipt",
            CommandKind::FindFile => "/find-file receipt",
            CommandKind::AddMeal => "/meal lasagne on friday",
            CommandKind::ListMeals => "/list-meals",
            CommandKind::DeleteMeal => "/delete-meal lasagne on friday",
        }
    }

    /// Map a free-text argument string onto named options.
    ///
    /// Every option but the last takes one whitespace-separated word; the
    /// last one takes the remainder.
    pub fn options_from_text(&self, args: &str) -> HashMap<String, String> {
        let mut options = HashMap::new();
        let mut rest = args.trim();

        let specs = self.options();
        for (idx, spec) in specs.iter().enumerate() {
            if rest.is_empty() {
                break;
            }
            let value = if idx + 1 == specs.len() {
                std::mem::take(&mut rest)
            } else {
                match rest.split_once(char::is_whitespace) {
                    Some((word, tail)) => {
                        rest = tail.trim_start();
                        word
                    }
                    None => std::mem::take(&mut rest),
                }
            };
            options.insert(spec.name.to_string(), value.to_string());
        }
        options
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.name())
    }
}

/// How the user invoked the command; only affects validation hints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationStyle {
    /// Platform slash command
    Slash,
    /// Plain text addressed to the bot
    Mention,
}

/// Raw inbound command as delivered by a platform adapter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub name: String,
    pub options: HashMap<String, String>,
    pub origin: Origin,
}

impl Invocation {
    pub fn new(name: impl Into<String>, origin: Origin) -> Self {
        Self {
            name: name.into(),
            options: HashMap::new(),
            origin,
        }
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    /// Build from a command name and positional argument text
    pub fn from_text(name: impl Into<String>, args: &str, origin: Origin) -> Self {
        let name = name.into();
        let options = CommandKind::from_name(&name)
            .map(|kind| kind.options_from_text(args))
            .unwrap_or_default();
        Self { name, options, origin }
    }

    /// Option value, if present and not blank
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
    }
}

/// A fully validated command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AddCartItem { item: String },
    ListCart,
    RemoveCartItem { item: String },
    AddNote { note: String },
    ListNotes,
    DeleteNote { note: String },
    SaveFile { url: String, description: String, origin: Origin },
    FindFile { keyword: Option<String> },
    AddMeal { meal: String },
    ListMeals,
    DeleteMeal { meal: String },
}

impl Command {
    /// Resolve and validate an invocation
    pub fn from_invocation(invocation: &Invocation, style: InvocationStyle) -> BotResult<Self> {
        let kind = CommandKind::from_name(&invocation.name)
            .ok_or_else(|| BotError::UnrecognizedCommand(invocation.name.clone()))?;
        Self::build(kind, invocation, style)
    }

    pub fn build(kind: CommandKind, invocation: &Invocation, style: InvocationStyle) -> BotResult<Self> {
        let get = |name: &str| -> BotResult<String> {
            match invocation.option(name) {
                Some(value) => Ok(value.to_string()),
                None => Err(missing_option(kind, name, style)),
            }
        };

        let command = match kind {
            CommandKind::AddCartItem => Command::AddCartItem { item: get("item")? },
            CommandKind::ListCart => Command::ListCart,
            CommandKind::RemoveCartItem => Command::RemoveCartItem { item: get("item")? },
            CommandKind::AddNote => Command::AddNote { note: get("note")? },
            CommandKind::ListNotes => Command::ListNotes,
            CommandKind::DeleteNote => Command::DeleteNote { note: get("note")? },
            CommandKind::SaveFile => Command::SaveFile {
                url: get("url")?,
                description: get("description")?,
                origin: invocation.origin.clone(),
            },
            CommandKind::FindFile => Command::FindFile {
                keyword: invocation.option("keyword").map(str::to_string),
            },
            CommandKind::AddMeal => Command::AddMeal { meal: get("meal")? },
            CommandKind::ListMeals => Command::ListMeals,
            CommandKind::DeleteMeal => Command::DeleteMeal { meal: get("meal")? },
        };
        Ok(command)
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::AddCartItem { .. } => CommandKind::AddCartItem,
            Command::ListCart => CommandKind::ListCart,
            Command::RemoveCartItem { .. } => CommandKind::RemoveCartItem,
            Command::AddNote { .. } => CommandKind::AddNote,
            Command::ListNotes => CommandKind::ListNotes,
            Command::DeleteNote { .. } => CommandKind::DeleteNote,
            Command::SaveFile { .. } => CommandKind::SaveFile,
            Command::FindFile { .. } => CommandKind::FindFile,
            Command::AddMeal { .. } => CommandKind::AddMeal,
            Command::ListMeals => CommandKind::ListMeals,
            Command::DeleteMeal { .. } => CommandKind::DeleteMeal,
        }
    }

    pub fn touches_file_index(&self) -> bool {
        matches!(self, Command::SaveFile { .. } | Command::FindFile { .. })
    }
}

fn missing_option(kind: CommandKind, name: &str, style: InvocationStyle) -> BotError {
    let phrase = kind
        .options()
        .iter()
        .find(|spec| spec.name == name)
        .map(|spec| spec.phrase)
        .unwrap_or("a value");

    let example = match style {
        InvocationStyle::Slash => kind.example().to_string(),
        InvocationStyle::Mention => format!("@me {}", kind.example()),
    };
    BotError::Validation(format!("Please provide {}, e.g., `{}`", phrase, example))
}

/// When to send a deferred acknowledgment before touching storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeferPolicy {
    /// Only for File Index operations
    #[default]
    FileIndexOnly,
    /// Before every storage call (slow remote backends)
    Always,
}

impl DeferPolicy {
    pub fn should_defer(&self, command: &Command) -> bool {
        match self {
            DeferPolicy::Always => true,
            DeferPolicy::FileIndexOnly => command.touches_file_index(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_round_trips_by_name() {
        for kind in CommandKind::ALL {
            assert_eq!(CommandKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(CommandKind::from_name("/SHOP"), Some(CommandKind::AddCartItem));
        assert_eq!(CommandKind::from_name("dance"), None);
    }

    #[test]
    fn test_usage_strings() {
        assert_eq!(CommandKind::AddCartItem.usage(), "/shop <item>");
        assert_eq!(CommandKind::SaveFile.usage(), "/save-file <url> <description>");
        assert_eq!(CommandKind::FindFile.usage(), "/find-file [keyword]");
        assert_eq!(CommandKind::ListMeals.usage(), "/list-meals");
    }

    #[test]
    fn test_options_from_text() {
        let opts = CommandKind::AddCartItem.options_from_text("  heavy   cream ");
        assert_eq!(opts.get("item").map(String::as_str), Some("heavy   cream"));

        let opts = CommandKind::SaveFile.options_from_text("https://x.io/a.pdf  Tax Receipt 2024");
        assert_eq!(opts.get("url").map(String::as_str), Some("https://x.io/a.pdf"));
        assert_eq!(opts.get("description").map(String::as_str), Some("Tax Receipt 2024"));

        let opts = CommandKind::SaveFile.options_from_text("https://x.io/a.pdf");
        assert_eq!(opts.len(), 1);

        assert!(CommandKind::ListCart.options_from_text("ignored").is_empty());
    }

    #[test]
    fn test_unknown_command_is_unrecognized() {
        let inv = Invocation::new("dance", Origin::default());
        let err = Command::from_invocation(&inv, InvocationStyle::Slash).unwrap_err();
        assert!(matches!(err, BotError::UnrecognizedCommand(name) if name == "dance"));
    }

    #[test]
    fn test_blank_required_option_fails_validation() {
        let inv = Invocation::new("shop", Origin::default()).with_option("item", "   ");
        let err = Command::from_invocation(&inv, InvocationStyle::Mention).unwrap_err();
        assert_eq!(err.to_string(), "Please provide an item, e.g., `@me /shop heavy cream`");

        let inv = Invocation::from_text("save-file", "https://x.io/a.pdf", Origin::default());
        let err = Command::from_invocation(&inv, InvocationStyle::Slash).unwrap_err();
        assert!(err.to_string().starts_with("Please provide a description"));
    }

    #[test]
    fn test_build_trims_values_and_keeps_origin() {
        let origin = Origin::new("chat-1", "msg-9");
        let inv = Invocation::from_text("save-file", "https://x.io/a.pdf invoice", origin.clone());
        let cmd = Command::from_invocation(&inv, InvocationStyle::Slash).unwrap();
        assert_eq!(
            cmd,
            Command::SaveFile {
                url: "https://x.io/a.pdf".to_string(),
                description: "invoice".to_string(),
                origin,
            }
        );
        assert!(cmd.touches_file_index());
    }

    #[test]
    fn test_find_file_keyword_is_optional() {
        let inv = Invocation::new("find-file", Origin::default());
        assert_eq!(
            Command::from_invocation(&inv, InvocationStyle::Slash).unwrap(),
            Command::FindFile { keyword: None }
        );
    }

    #[test]
    fn test_defer_policy() {
        let list = Command::ListCart;
        let find = Command::FindFile { keyword: None };
        assert!(!DeferPolicy::FileIndexOnly.should_defer(&list));
        assert!(DeferPolicy::FileIndexOnly.should_defer(&find));
        assert!(DeferPolicy::Always.should_defer(&list));
    }
}
