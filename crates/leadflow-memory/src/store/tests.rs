use super::Store;
use leadflow_core::contact::{ContactHints, ProfileFields};
use leadflow_core::flow::FlowStep;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

/// Create an in-memory store for testing.
async fn test_store() -> Store {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .unwrap();
    Store::run_migrations(&pool).await.unwrap();
    Store { pool }
}

fn named(name: &str) -> ContactHints {
    ContactHints {
        name: Some(name.to_string()),
        avatar_url: None,
    }
}

#[tokio::test]
async fn test_resolve_creates_contact_with_defaults() {
    let store = test_store().await;
    let contact = store
        .resolve_contact("5511999990000", &named("Ana"), false)
        .await
        .unwrap();

    assert_eq!(contact.phone, "5511999990000");
    assert_eq!(contact.name.as_deref(), Some("Ana"));
    assert_eq!(contact.flow_step, FlowStep::New.as_str());
    assert!(!contact.is_bot_paused);
}

#[tokio::test]
async fn test_resolve_is_idempotent() {
    let store = test_store().await;
    let first = store
        .resolve_contact("5511999990000", &named("Ana"), false)
        .await
        .unwrap();
    let second = store
        .resolve_contact("5511999990000", &named("Ana"), false)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(store.list_contacts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_resolve_yields_one_contact() {
    let store = test_store().await;
    let ana = named("Ana");
    let default_hints = ContactHints::default();
    let (a, b) = tokio::join!(
        store.resolve_contact("5511999990000", &ana, false),
        store.resolve_contact("5511999990000", &default_hints, false),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.id, b.id);
    assert_eq!(store.list_contacts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_hint_merge_upgrades_name() {
    let store = test_store().await;
    store
        .resolve_contact("5511999990000", &ContactHints::default(), false)
        .await
        .unwrap();

    let updated = store
        .resolve_contact("5511999990000", &named("Ana Souza"), false)
        .await
        .unwrap();
    assert_eq!(updated.name.as_deref(), Some("Ana Souza"));
}

#[tokio::test]
async fn test_unknown_placeholder_never_overwrites_name() {
    let store = test_store().await;
    store
        .resolve_contact("5511999990000", &named("Ana"), false)
        .await
        .unwrap();

    let after = store
        .resolve_contact("5511999990000", &named("Unknown"), false)
        .await
        .unwrap();
    assert_eq!(after.name.as_deref(), Some("Ana"));
}

#[tokio::test]
async fn test_bot_originated_message_does_not_merge_hints() {
    let store = test_store().await;
    store
        .resolve_contact("5511999990000", &named("Ana"), false)
        .await
        .unwrap();

    let after = store
        .resolve_contact("5511999990000", &named("Bot Display"), true)
        .await
        .unwrap();
    assert_eq!(after.name.as_deref(), Some("Ana"));
}

#[tokio::test]
async fn test_append_and_history_chronological() {
    let store = test_store().await;
    let contact = store
        .resolve_contact("5511999990000", &named("Ana"), false)
        .await
        .unwrap();

    store.append_message(&contact.id, "oi", false).await.unwrap();
    store
        .append_message(&contact.id, "Olá! Como posso ajudar?", true)
        .await
        .unwrap();
    store
        .append_message(&contact.id, "quero um site", false)
        .await
        .unwrap();

    // Full history, oldest first.
    let all = store.recent_history(&contact.id, 10).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].body, "oi");
    assert!(!all[0].from_me);
    assert_eq!(all[1].body, "Olá! Como posso ajudar?");
    assert!(all[1].from_me);
    assert_eq!(all[2].body, "quero um site");

    // The limit trims the old end, not the recent one.
    let last_two = store.recent_history(&contact.id, 2).await.unwrap();
    assert_eq!(last_two.len(), 2);
    assert_eq!(last_two[0].body, "Olá! Como posso ajudar?");
    assert_eq!(last_two[1].body, "quero um site");
}

#[tokio::test]
async fn test_messages_for_ascending() {
    let store = test_store().await;
    let contact = store
        .resolve_contact("5511999990000", &named("Ana"), false)
        .await
        .unwrap();

    store.append_message(&contact.id, "um", false).await.unwrap();
    store.append_message(&contact.id, "dois", true).await.unwrap();

    let messages = store.messages_for(&contact.id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].body, "um");
    assert_eq!(messages[1].body, "dois");
    assert!(messages[1].from_me);
}

#[tokio::test]
async fn test_profile_upsert_merges_and_accumulates_score() {
    let store = test_store().await;
    let contact = store
        .resolve_contact("5511999990000", &named("Ana"), false)
        .await
        .unwrap();

    store
        .upsert_profile(
            &contact.id,
            &ProfileFields {
                interest: Some("site".into()),
                score_delta: 10,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    store
        .upsert_profile(
            &contact.id,
            &ProfileFields {
                has_site: Some("sim".into()),
                score_delta: 10,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let profile = store.get_profile(&contact.id).await.unwrap().unwrap();
    assert_eq!(profile.interest.as_deref(), Some("site"));
    assert_eq!(profile.has_site.as_deref(), Some("sim"));
    assert_eq!(profile.sells_online, None);
    assert_eq!(profile.score, 20);
}

#[tokio::test]
async fn test_reset_flow_blanks_profile_and_step() {
    let store = test_store().await;
    let contact = store
        .resolve_contact("5511999990000", &named("Ana"), false)
        .await
        .unwrap();

    store
        .set_flow_step(&contact.id, FlowStep::Offer)
        .await
        .unwrap();
    store
        .upsert_profile(
            &contact.id,
            &ProfileFields {
                interest: Some("site".into()),
                score_delta: 10,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    store.reset_flow(&contact.id).await.unwrap();

    let contact = store.get_contact("5511999990000").await.unwrap().unwrap();
    assert_eq!(contact.flow_step, FlowStep::New.as_str());

    let profile = store.get_profile(&contact.id).await.unwrap().unwrap();
    assert_eq!(profile.interest, None);
    assert_eq!(profile.score, 0);
}

#[tokio::test]
async fn test_set_paused() {
    let store = test_store().await;
    store
        .resolve_contact("5511999990000", &named("Ana"), false)
        .await
        .unwrap();

    let paused = store
        .set_paused("5511999990000", true)
        .await
        .unwrap()
        .unwrap();
    assert!(paused.is_bot_paused);

    let missing = store.set_paused("0000", true).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_settings_round_trip() {
    let store = test_store().await;
    assert_eq!(store.get_setting("greeting").await.unwrap(), None);

    store.set_setting("greeting", "Olá!").await.unwrap();
    store.set_setting("greeting", "Oi!").await.unwrap();

    assert_eq!(
        store.get_setting("greeting").await.unwrap().as_deref(),
        Some("Oi!")
    );
}
