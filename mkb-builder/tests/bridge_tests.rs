//! WordPress bridge tests against an in-process admin-ajax.php

mod helpers;

use std::sync::Arc;

use helpers::{quiet_config, FakeWordPress};
use mkb_builder::bridge::{PersistenceBridge, WordPressBridge};
use mkb_builder::state::Mutation;
use mkb_builder::{spawn_session, ComponentRegistry, Error, StateManager};
use mkb_common::config::WordPressConfig;
use mkb_common::ids::ComponentId;
use mkb_common::model::{MediaKitState, SectionType};
use serde_json::json;

fn sample_state() -> MediaKitState {
    let mut m = StateManager::new(10);
    m.init_component("hero-1".into(), "hero", json!({"title": "Dr. Jane Smith"}))
        .unwrap();
    m.init_component("bio-1".into(), "biography", json!({"biography": "Writes about Rust."}))
        .unwrap();
    m.init_component("topics-1".into(), "topics", json!({"topics": ["Ownership", "Async"]}))
        .unwrap();
    let section = m.add_section(SectionType::TwoColumn).unwrap();
    m.assign_to_section(&"bio-1".into(), &section, 1).unwrap();
    m.assign_to_section(&"topics-1".into(), &section, 2).unwrap();
    let settings = json!({"theme": "professional"});
    m.update_global_settings(settings.as_object().unwrap()).unwrap();
    (*m.get_state()).clone()
}

#[tokio::test]
async fn test_save_then_load_round_trips() {
    let (wp, url) = FakeWordPress::start().await;
    let bridge = WordPressBridge::new(&FakeWordPress::config(&url, 42)).unwrap();
    let state = sample_state();

    let receipt = bridge.save(&state).await.unwrap();
    assert!(receipt.success);
    assert_eq!(receipt.components_count, 3);
    assert_eq!(receipt.sections_count, 1);
    assert_eq!(receipt.timestamp.timestamp(), 1_700_000_000);
    assert_eq!(wp.save_count(), 1);

    let loaded = bridge.load(42).await.unwrap();
    assert_eq!(loaded, state);
}

#[tokio::test]
async fn test_bad_nonce_is_rejected_without_retry() {
    let (wp, url) = FakeWordPress::start().await;
    let config = WordPressConfig {
        nonce: "stale".to_string(),
        ..FakeWordPress::config(&url, 42)
    };
    let bridge = WordPressBridge::new(&config).unwrap();

    let err = bridge.save(&sample_state()).await.unwrap_err();
    assert!(matches!(err, Error::Rejected(ref message) if message == "Invalid nonce"));
    assert!(!err.is_retryable());
    assert_eq!(wp.save_count(), 0);
}

#[tokio::test]
async fn test_server_outage_is_retryable() {
    let (wp, url) = FakeWordPress::start().await;
    let bridge = WordPressBridge::new(&FakeWordPress::config(&url, 42)).unwrap();
    wp.fail_next_requests(1);

    let err = bridge.save(&sample_state()).await.unwrap_err();
    assert!(matches!(err, Error::Bridge(ref message) if message.contains("HTTP 503")));
    assert!(err.is_retryable());

    bridge.save(&sample_state()).await.unwrap();
    assert_eq!(wp.save_count(), 1);
}

#[tokio::test]
async fn test_unknown_endpoint_is_rejected() {
    let (_wp, url) = FakeWordPress::start().await;
    let config = FakeWordPress::config(&url.replace("admin-ajax.php", "nothing-here.php"), 42);
    let bridge = WordPressBridge::new(&config).unwrap();

    let err = bridge.load(42).await.unwrap_err();
    assert!(matches!(err, Error::Rejected(ref message) if message.contains("HTTP 404")));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_missing_post_id_is_rejected() {
    let (_wp, url) = FakeWordPress::start().await;
    let bridge = WordPressBridge::new(&FakeWordPress::config(&url, 0)).unwrap();

    let err = bridge.save(&MediaKitState::default()).await.unwrap_err();
    assert!(matches!(err, Error::Rejected(ref message) if message == "No post ID provided"));
}

#[tokio::test]
async fn test_unsaved_post_loads_empty() {
    let (_wp, url) = FakeWordPress::start().await;
    let bridge = WordPressBridge::new(&FakeWordPress::config(&url, 42)).unwrap();

    assert!(bridge.load(42).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_legacy_saved_components_are_upgraded() {
    let (wp, url) = FakeWordPress::start().await;
    wp.put(
        7,
        json!({
            "saved_components": [
                {"id": "hero-1", "type": "hero", "props": {"title": "Legacy"}},
                {"id": "contact-1", "type": "contact", "props": {"email": "jane@example.com"}}
            ],
            "global_settings": {"theme": "minimal"}
        }),
    );
    let bridge = WordPressBridge::new(&FakeWordPress::config(&url, 42)).unwrap();

    let state = bridge.load(7).await.unwrap();
    assert_eq!(
        state.layout,
        vec![ComponentId::from("hero-1"), ComponentId::from("contact-1")]
    );
    assert_eq!(
        state.component(&"hero-1".into()).unwrap().props.to_data()["title"],
        json!("Legacy")
    );
    assert!(state.violations().is_empty());
}

#[tokio::test]
async fn test_session_save_reaches_wordpress() {
    let (wp, url) = FakeWordPress::start().await;
    let mut config = quiet_config();
    config.wordpress = FakeWordPress::config(&url, 42);
    let bridge = Arc::new(WordPressBridge::new(&config.wordpress).unwrap());
    let (handle, _task) = spawn_session(
        &config,
        ComponentRegistry::with_builtin(),
        bridge,
        MediaKitState::default(),
    );

    handle
        .apply(Mutation::InitComponent {
            id: "hero-1".into(),
            component_type: "hero".into(),
            data: json!({"title": "Pushed"}),
        })
        .await
        .unwrap();
    let receipt = handle.save().await.unwrap();

    assert_eq!(receipt.components_count, 1);
    let stored = wp.get(42).unwrap();
    assert_eq!(stored["layout"], json!(["hero-1"]));

    // Loading brings back exactly what was stored
    handle.load(42).await.unwrap();
    let state = handle.get_state().await.unwrap();
    assert_eq!(state.layout, vec![ComponentId::from("hero-1")]);
}
