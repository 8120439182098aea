use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::{tempdir, TempDir};

use pantry_pup::command::{DeferPolicy, MentionPattern, Origin, Outcome};
use pantry_pup::reply::recording::{ChannelCall, RecordingChannel};
use pantry_pup::reply::AckPath;
use pantry_pup::store::{FileIndex, JsonFileStore, ListStore};
use pantry_pup::{BotError, BotResult, Collection, CommandRouter, FileRecord, Invocation, MentionResponder, Reply, Storage};

const BOT_ID: &str = "4242";

/// Backend that is always down
struct DownStore;

#[async_trait]
impl ListStore for DownStore {
    async fn add(&self, _collection: Collection, _entry: &str) -> BotResult<()> {
        Err(BotError::BackendUnavailable("connection refused".into()))
    }

    async fn list(&self, _collection: Collection) -> BotResult<Vec<String>> {
        Err(BotError::BackendUnavailable("connection refused".into()))
    }

    async fn remove(&self, _collection: Collection, _entry: &str) -> BotResult<()> {
        Err(BotError::BackendUnavailable("connection refused".into()))
    }
}

#[async_trait]
impl FileIndex for DownStore {
    async fn save(&self, _record: FileRecord) -> BotResult<()> {
        Err(BotError::BackendUnavailable("connection refused".into()))
    }

    async fn find(&self, _keyword: &str) -> BotResult<Vec<FileRecord>> {
        Err(BotError::BackendUnavailable("connection refused".into()))
    }
}

fn origin() -> Origin {
    Origin::new("chan-1", "msg-1")
}

fn json_router() -> Result<(TempDir, Arc<CommandRouter>)> {
    let dir = tempdir()?;
    let storage = Storage::from_store(JsonFileStore::new(dir.path()), "json");
    Ok((dir, Arc::new(CommandRouter::new(storage))))
}

fn responder(router: Arc<CommandRouter>) -> Result<MentionResponder> {
    Ok(MentionResponder::new(router, MentionPattern::new(BOT_ID, Some("pantry_pup"))?))
}

/// Number of messages that carried a response body
fn deliveries(channel: &RecordingChannel) -> usize {
    channel.calls().iter().filter(|c| !matches!(c, ChannelCall::Defer)).count()
}

#[tokio::test]
async fn test_shopping_cart_round_trip() -> Result<()> {
    let (_dir, router) = json_router()?;

    let channel = RecordingChannel::new();
    let report = router
        .dispatch(Invocation::new("shop", origin()).with_option("item", "milk"), channel.clone())
        .await;
    assert_eq!(report.outcome, Outcome::Success);
    assert_eq!(report.ack, AckPath::Replied);
    assert_eq!(channel.last_content().as_deref(), Some("Added \"milk\" to the shopping list 🛒"));

    let channel = RecordingChannel::new();
    router.dispatch(Invocation::new("list-cart", origin()), channel.clone()).await;
    assert_eq!(channel.last_content().as_deref(), Some("🛒 **Shopping Cart:**\n1. milk"));

    let channel = RecordingChannel::new();
    router
        .dispatch(Invocation::new("shopped", origin()).with_option("item", "milk"), channel.clone())
        .await;
    assert_eq!(channel.last_content().as_deref(), Some("Removed \"milk\" from the shopping list 🛒"));

    let channel = RecordingChannel::new();
    let report = router.dispatch(Invocation::new("list-cart", origin()), channel.clone()).await;
    assert_eq!(report.outcome, Outcome::EmptyResult);
    assert_eq!(channel.last_content().as_deref(), Some("🛒 Shopping cart is empty"));
    Ok(())
}

#[tokio::test]
async fn test_clear_all_empties_only_that_list() -> Result<()> {
    let (_dir, router) = json_router()?;
    router.storage().lists.add(Collection::Meals, "tacos").await?;
    router.storage().lists.add(Collection::Meals, "curry").await?;
    router.storage().lists.add(Collection::Notes, "water plants").await?;

    let channel = RecordingChannel::new();
    router
        .dispatch(Invocation::new("delete-meal", origin()).with_option("meal", "all"), channel.clone())
        .await;
    assert_eq!(channel.last_content().as_deref(), Some("Cleared the meal plan 🍽️"));

    assert!(router.storage().lists.list(Collection::Meals).await?.is_empty());
    assert_eq!(router.storage().lists.list(Collection::Notes).await?, vec!["water plants"]);
    Ok(())
}

#[tokio::test]
async fn test_invoice_saved_and_found_through_deferral() -> Result<()> {
    let (_dir, router) = json_router()?;

    let channel = RecordingChannel::new();
    let report = router
        .dispatch(
            Invocation::from_text("save-file", "https://files.example/inv-7.pdf March invoice", Origin::new("chan-9", "msg-3")),
            channel.clone(),
        )
        .await;
    assert_eq!(report.ack, AckPath::Edited);
    assert_eq!(
        channel.calls(),
        vec![ChannelCall::Defer, ChannelCall::Edit(Reply::public("Saved file \"March invoice\" 📎"))]
    );

    let saved = router.storage().files.find("").await?;
    assert_eq!(saved[0].origin_channel, "chan-9");
    assert_eq!(saved[0].origin_interaction, "msg-3");

    let channel = RecordingChannel::new();
    let report = router
        .dispatch(Invocation::new("find-file", origin()).with_option("keyword", "INVOICE"), channel.clone())
        .await;
    assert_eq!(report.outcome, Outcome::Success);
    let content = channel.last_content().unwrap_or_default();
    assert!(content.contains("1. March invoice: https://files.example/inv-7.pdf"), "{}", content);

    let channel = RecordingChannel::new();
    let report = router
        .dispatch(Invocation::new("find-file", origin()).with_option("keyword", "payslip"), channel.clone())
        .await;
    assert_eq!(report.outcome, Outcome::EmptyResult);
    assert_eq!(channel.last_content().as_deref(), Some("📎 No files matching \"payslip\""));
    Ok(())
}

#[tokio::test]
async fn test_mention_commands_share_the_router() -> Result<()> {
    let (_dir, router) = json_router()?;
    let responder = responder(router.clone())?;

    let channel = RecordingChannel::new();
    let report = responder.respond("<@4242> /shop heavy cream", origin(), channel.clone()).await;
    assert_eq!(report.outcome, Outcome::Success);
    assert_eq!(channel.last_content().as_deref(), Some("Added \"heavy cream\" to the shopping list 🛒"));

    let channel = RecordingChannel::new();
    responder.respond("@pantry_pup list", origin(), channel.clone()).await;
    assert_eq!(channel.last_content().as_deref(), Some("🛒 **Shopping Cart:**\n1. heavy cream"));

    assert_eq!(router.storage().lists.list(Collection::Cart).await?, vec!["heavy cream"]);
    Ok(())
}

#[tokio::test]
async fn test_mention_without_keyword_gets_woof() -> Result<()> {
    let (_dir, router) = json_router()?;
    let responder = responder(router)?;

    let channel = RecordingChannel::new();
    let report = responder.respond("<@!4242> who's a good boy?", origin(), channel.clone()).await;
    assert_eq!(report.outcome, Outcome::NoCommand);
    assert_eq!(channel.calls(), vec![ChannelCall::Reply(Reply::public("woof"))]);
    Ok(())
}

#[tokio::test]
async fn test_mention_help_and_missing_argument() -> Result<()> {
    let (_dir, router) = json_router()?;
    let responder = responder(router)?;

    let channel = RecordingChannel::new();
    responder.respond("<@4242> help", origin(), channel.clone()).await;
    let help = channel.last_content().unwrap_or_default();
    assert!(help.starts_with("Usage:"));
    assert!(help.contains("/shopped <item>"));

    let channel = RecordingChannel::new();
    let report = responder.respond("<@4242> shop", origin(), channel.clone()).await;
    assert_eq!(report.outcome, Outcome::ValidationError);
    assert_eq!(
        channel.calls(),
        vec![ChannelCall::Reply(Reply::ephemeral("Please provide an item, e.g., `@me /shop heavy cream`"))]
    );
    Ok(())
}

#[tokio::test]
async fn test_slash_validation_and_unknown_command() -> Result<()> {
    let (_dir, router) = json_router()?;

    let channel = RecordingChannel::new();
    let report = router
        .dispatch(Invocation::new("note", origin()).with_option("note", "   "), channel.clone())
        .await;
    assert_eq!(report.outcome, Outcome::ValidationError);
    assert_eq!(
        channel.calls(),
        vec![ChannelCall::Reply(Reply::ephemeral("Please provide a note, e.g., `/note call the plumber`"))]
    );

    let channel = RecordingChannel::new();
    let report = router.dispatch(Invocation::new("dance", origin()), channel.clone()).await;
    assert_eq!(report.outcome, Outcome::UnrecognizedCommand);
    assert_eq!(channel.calls(), vec![ChannelCall::Reply(Reply::ephemeral("Unknown command"))]);
    Ok(())
}

#[tokio::test]
async fn test_backend_outage_gets_generic_failure() -> Result<()> {
    let router = CommandRouter::new(Storage::from_store(DownStore, "down"));

    let channel = RecordingChannel::new();
    let report = router
        .dispatch(Invocation::new("shop", origin()).with_option("item", "milk"), channel.clone())
        .await;
    assert_eq!(report.outcome, Outcome::BackendError);
    assert_eq!(channel.calls(), vec![ChannelCall::Reply(Reply::ephemeral("Something went wrong…"))]);

    // Deferred commands finish the placeholder with the same notice
    let channel = RecordingChannel::new();
    let report = router
        .dispatch(Invocation::new("find-file", origin()).with_option("keyword", "tax"), channel.clone())
        .await;
    assert_eq!(report.outcome, Outcome::BackendError);
    assert_eq!(report.ack, AckPath::Edited);
    assert_eq!(
        channel.calls(),
        vec![ChannelCall::Defer, ChannelCall::Edit(Reply::ephemeral("Something went wrong…"))]
    );
    Ok(())
}

#[tokio::test]
async fn test_every_invocation_is_answered_exactly_once() -> Result<()> {
    let (_dir, router) = json_router()?;
    let router = Arc::new((*router).clone().with_defer_policy(DeferPolicy::Always));

    let invocations = vec![
        Invocation::new("shop", origin()).with_option("item", "bread"),
        Invocation::new("list-cart", origin()),
        Invocation::new("shopped", origin()).with_option("item", "all"),
        Invocation::new("note", origin()),
        Invocation::new("meal", origin()).with_option("meal", "soup"),
        Invocation::new("find-file", origin()),
        Invocation::new("nope", origin()),
    ];

    for invocation in invocations {
        let name = invocation.name.clone();
        let channel = RecordingChannel::new();
        let report = router.dispatch(invocation, channel.clone()).await;
        assert_eq!(deliveries(&channel), 1, "{} answered {:?}", name, channel.calls());
        assert_ne!(report.ack, AckPath::Undelivered, "{}", name);
    }
    Ok(())
}

#[tokio::test]
async fn test_broken_reply_path_falls_back_to_follow_up() -> Result<()> {
    let (_dir, router) = json_router()?;

    let channel = RecordingChannel::new().failing_reply();
    let report = router.dispatch(Invocation::new("list-notes", origin()), channel.clone()).await;
    assert_eq!(report.ack, AckPath::FollowUp);
    assert_eq!(channel.calls(), vec![ChannelCall::FollowUp(Reply::public("📝 No notes yet"))]);

    // Placeholder could not be edited
    let channel = RecordingChannel::new().failing_edit();
    let report = router.dispatch(Invocation::new("find-file", origin()), channel.clone()).await;
    assert_eq!(report.ack, AckPath::FollowUp);
    assert_eq!(deliveries(&channel), 1);

    let channel = RecordingChannel::new().failing_reply().failing_follow_up();
    let report = router.dispatch(Invocation::new("list-notes", origin()), channel.clone()).await;
    assert_eq!(report.ack, AckPath::Undelivered);
    assert!(channel.calls().is_empty());
    Ok(())
}
