//! Session actor tests
//!
//! All timing runs on tokio's paused clock, so debounce windows and autosave
//! deadlines are exact.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::{drain, quiet_config, render_completes};
use mkb_builder::bridge::{MemoryBridge, PersistenceBridge};
use mkb_builder::state::Mutation;
use mkb_builder::{spawn_session, ComponentRegistry, Error};
use mkb_common::config::BuilderConfig;
use mkb_common::events::{BuilderEvent, ControlAction, NotificationLevel};
use mkb_common::ids::ComponentId;
use mkb_common::model::MediaKitState;
use serde_json::json;
use tokio::time::sleep;

fn init(id: &str, component_type: &str) -> Mutation {
    Mutation::InitComponent {
        id: id.into(),
        component_type: component_type.into(),
        data: json!({}),
    }
}

#[tokio::test(start_paused = true)]
async fn test_batch_renders_once_after_debounce() {
    let bridge = Arc::new(MemoryBridge::new(1));
    let (handle, _task) = spawn_session(
        &quiet_config(),
        ComponentRegistry::with_builtin(),
        bridge,
        MediaKitState::default(),
    );
    handle.flush().await.unwrap();
    let mut rx = handle.subscribe();

    handle
        .apply(Mutation::Batch {
            mutations: vec![init("a", "hero"), init("b", "biography"), init("c", "topics")],
        })
        .await
        .unwrap();
    // Nothing renders inside the coalescing window
    assert_eq!(render_completes(&drain(&mut rx)), 0);

    sleep(Duration::from_millis(200)).await;

    let events = drain(&mut rx);
    assert_eq!(render_completes(&events), 1);
    let html = handle.html().await.unwrap();
    for id in ["a", "b", "c"] {
        assert!(html.contains(&format!("data-component-id=\"{}\"", id)), "{}", html);
    }
}

#[tokio::test(start_paused = true)]
async fn test_rapid_mutations_coalesce() {
    let bridge = Arc::new(MemoryBridge::new(1));
    let (handle, _task) = spawn_session(
        &quiet_config(),
        ComponentRegistry::with_builtin(),
        bridge,
        MediaKitState::default(),
    );
    handle.flush().await.unwrap();
    let mut rx = handle.subscribe();

    for i in 0..10 {
        handle.apply(init(&format!("t{}", i), "topics")).await.unwrap();
    }
    sleep(Duration::from_millis(200)).await;

    let events = drain(&mut rx);
    let state_changes = events
        .iter()
        .filter(|e| matches!(e, BuilderEvent::StateChanged { .. }))
        .count();
    assert_eq!(state_changes, 10);
    assert_eq!(render_completes(&events), 1);
}

#[tokio::test(start_paused = true)]
async fn test_delete_click_removes_component_and_node() {
    let bridge = Arc::new(MemoryBridge::new(1));
    let (handle, _task) = spawn_session(
        &quiet_config(),
        ComponentRegistry::with_builtin(),
        bridge,
        MediaKitState::default(),
    );
    handle.apply(init("a", "hero")).await.unwrap();
    handle.apply(init("b", "contact")).await.unwrap();
    handle.flush().await.unwrap();

    handle.click("a".into(), ControlAction::Delete).await.unwrap();
    handle.flush().await.unwrap();

    assert_eq!(handle.count_nodes("a".into()).await.unwrap(), 0);
    assert_eq!(handle.count_nodes("b".into()).await.unwrap(), 1);
    let state = handle.get_state().await.unwrap();
    assert_eq!(state.layout, vec![ComponentId::from("b")]);
}

#[tokio::test(start_paused = true)]
async fn test_edit_click_selects() {
    let bridge = Arc::new(MemoryBridge::new(1));
    let (handle, _task) = spawn_session(
        &quiet_config(),
        ComponentRegistry::with_builtin(),
        bridge,
        MediaKitState::default(),
    );
    handle.apply(init("a", "hero")).await.unwrap();
    handle.flush().await.unwrap();

    handle.click("a".into(), ControlAction::Edit).await.unwrap();
    assert_eq!(handle.selected().await.unwrap(), Some(ComponentId::from("a")));
}

#[tokio::test(start_paused = true)]
async fn test_click_on_unrendered_component_fails() {
    let bridge = Arc::new(MemoryBridge::new(1));
    let (handle, _task) = spawn_session(
        &quiet_config(),
        ComponentRegistry::with_builtin(),
        bridge,
        MediaKitState::default(),
    );
    let result = handle.click("ghost".into(), ControlAction::Delete).await;
    assert!(matches!(result, Err(Error::ComponentNotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn test_clicks_survive_a_flooded_event_bus() {
    let mut config = quiet_config();
    config.event_bus_capacity = 2;
    let bridge = Arc::new(MemoryBridge::new(1));
    let (handle, _task) = spawn_session(
        &config,
        ComponentRegistry::with_builtin(),
        bridge,
        MediaKitState::default(),
    );
    let ids: Vec<String> = (0..12).map(|i| format!("c{}", i)).collect();
    for id in &ids {
        handle.apply(init(id, "topics")).await.unwrap();
    }
    // Twelve renders plus state changes overrun a two-slot bus many times
    handle.flush().await.unwrap();

    handle.click("c0".into(), ControlAction::Delete).await.unwrap();
    handle.flush().await.unwrap();
    handle.click("c5".into(), ControlAction::MoveUp).await.unwrap();
    handle.flush().await.unwrap();
    handle.click("c11".into(), ControlAction::Edit).await.unwrap();

    let state = handle.get_state().await.unwrap();
    assert_eq!(state.layout.len(), 11);
    assert_eq!(state.layout[3], ComponentId::from("c5"));
    assert_eq!(handle.selected().await.unwrap(), Some(ComponentId::from("c11")));
}

#[tokio::test(start_paused = true)]
async fn test_control_without_preview() {
    let bridge = Arc::new(MemoryBridge::new(1));
    let (handle, _task) = spawn_session(
        &quiet_config(),
        ComponentRegistry::with_builtin(),
        bridge,
        MediaKitState::default(),
    );
    handle.apply(init("a", "hero")).await.unwrap();

    // Not rendered yet, but the request needs only the state
    handle.control("a".into(), ControlAction::Duplicate).await.unwrap();
    assert_eq!(handle.get_state().await.unwrap().layout.len(), 2);

    let result = handle.control("ghost".into(), ControlAction::Delete).await;
    assert!(matches!(result, Err(Error::ComponentNotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn test_failed_mutation_sends_toast() {
    let bridge = Arc::new(MemoryBridge::new(1));
    let (handle, _task) = spawn_session(
        &quiet_config(),
        ComponentRegistry::with_builtin(),
        bridge,
        MediaKitState::default(),
    );
    let mut rx = handle.subscribe();

    let result = handle.apply(Mutation::RemoveComponent { id: "ghost".into() }).await;
    assert!(matches!(result, Err(Error::ComponentNotFound(_))));

    let toast = drain(&mut rx).into_iter().find_map(|e| match e {
        BuilderEvent::Notification { level, message } => Some((level, message)),
        _ => None,
    });
    assert_eq!(
        toast,
        Some((NotificationLevel::Error, "That component no longer exists.".to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn test_second_save_is_rejected_while_first_in_flight() {
    let bridge = Arc::new(MemoryBridge::new(1).with_delay(Duration::from_millis(500)));
    let (handle, _task) = spawn_session(
        &quiet_config(),
        ComponentRegistry::with_builtin(),
        Arc::clone(&bridge) as Arc<dyn PersistenceBridge>,
        MediaKitState::default(),
    );
    handle.apply(init("a", "hero")).await.unwrap();
    let mut rx = handle.subscribe();

    let first = tokio::spawn({
        let handle = handle.clone();
        async move { handle.save().await }
    });
    loop {
        if let Ok(BuilderEvent::SaveStarted { .. }) = rx.recv().await {
            break;
        }
    }

    let second = handle.save().await;
    assert!(matches!(second, Err(Error::AlreadySaving)));

    let receipt = first.await.unwrap().unwrap();
    assert_eq!(receipt.components_count, 1);
    assert_eq!(bridge.save_count(), 1);

    // The guard is released once the first save completes
    handle.save().await.unwrap();
    assert_eq!(bridge.save_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_autosave_after_quiet_period() {
    let bridge = Arc::new(MemoryBridge::new(9));
    let (handle, _task) = spawn_session(
        &BuilderConfig::default(),
        ComponentRegistry::with_builtin(),
        Arc::clone(&bridge) as Arc<dyn PersistenceBridge>,
        MediaKitState::default(),
    );
    let mut rx = handle.subscribe();

    handle.apply(init("a", "hero")).await.unwrap();
    sleep(Duration::from_millis(500)).await;
    assert_eq!(bridge.save_count(), 0);

    sleep(Duration::from_millis(1000)).await;
    assert_eq!(bridge.save_count(), 1);
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, BuilderEvent::SaveCompleted { revision: 1, .. })));

    // Nothing new to save
    sleep(Duration::from_secs(30)).await;
    assert_eq!(bridge.save_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_autosave_retries_then_recovers() {
    let bridge = Arc::new(MemoryBridge::new(9));
    bridge.fail_next_saves(3);
    let (handle, _task) = spawn_session(
        &BuilderConfig::default(),
        ComponentRegistry::with_builtin(),
        Arc::clone(&bridge) as Arc<dyn PersistenceBridge>,
        MediaKitState::default(),
    );
    let mut rx = handle.subscribe();

    handle.apply(init("a", "hero")).await.unwrap();
    // 1s quiet period, then attempts at +0s, +2s, +4s all fail
    sleep(Duration::from_millis(7_500)).await;
    assert_eq!(bridge.save_count(), 0);
    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, BuilderEvent::SaveFailed { retryable: true, .. })));

    // Still dirty, so the next quiet period saves again
    sleep(Duration::from_millis(2_000)).await;
    assert_eq!(bridge.save_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_save_is_not_retried() {
    let bridge = Arc::new(MemoryBridge::new(9));
    bridge.reject_next_saves(1);
    let (handle, _task) = spawn_session(
        &BuilderConfig::default(),
        ComponentRegistry::with_builtin(),
        Arc::clone(&bridge) as Arc<dyn PersistenceBridge>,
        MediaKitState::default(),
    );
    let mut rx = handle.subscribe();

    handle.apply(init("a", "hero")).await.unwrap();
    sleep(Duration::from_millis(1_500)).await;
    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, BuilderEvent::SaveFailed { retryable: false, .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        BuilderEvent::Notification { level: NotificationLevel::Warning, message }
            if message.starts_with("WordPress refused")
    )));

    // Neither retried nor rescheduled
    sleep(Duration::from_secs(30)).await;
    assert_eq!(bridge.save_count(), 0);

    // The next edit saves normally
    handle.apply(init("b", "hero")).await.unwrap();
    sleep(Duration::from_millis(1_500)).await;
    assert_eq!(bridge.save_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_load_drops_pending_autosave() {
    let bridge = Arc::new(MemoryBridge::new(9));
    bridge.insert_raw(
        4,
        json!({
            "components": {"hero-1": {"type": "hero", "data": {"title": "Other kit"}}},
            "layout": ["hero-1"],
            "sections": [],
            "globalSettings": {},
            "version": "2.2.0"
        })
        .to_string(),
    );
    let (handle, _task) = spawn_session(
        &BuilderConfig::default(),
        ComponentRegistry::with_builtin(),
        Arc::clone(&bridge) as Arc<dyn PersistenceBridge>,
        MediaKitState::default(),
    );

    handle.apply(init("a", "hero")).await.unwrap();
    sleep(Duration::from_millis(200)).await;
    handle.load(4).await.unwrap();

    // The edit belonged to the replaced state, so nothing is written back
    sleep(Duration::from_secs(10)).await;
    assert_eq!(bridge.save_count(), 0);
    assert!(bridge.raw(9).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_load_replaces_state() {
    let bridge = Arc::new(MemoryBridge::new(4));
    bridge.insert_raw(
        4,
        json!({
            "components": {"hero-1": {"type": "hero", "data": {"title": "Loaded"}}},
            "layout": ["hero-1"],
            "sections": [],
            "globalSettings": {"theme": "minimal"},
            "version": "2.2.0"
        })
        .to_string(),
    );
    let (handle, _task) = spawn_session(
        &quiet_config(),
        ComponentRegistry::with_builtin(),
        Arc::clone(&bridge) as Arc<dyn PersistenceBridge>,
        MediaKitState::default(),
    );

    handle.load(4).await.unwrap();
    handle.flush().await.unwrap();

    let state = handle.get_state().await.unwrap();
    assert_eq!(state.global_settings["theme"], json!("minimal"));
    assert!(handle.html().await.unwrap().contains("Loaded"));
    // A load is not an edit, so undo has nothing to revert
    assert!(!handle.undo().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_undo_redo_through_handle() {
    let bridge = Arc::new(MemoryBridge::new(1));
    let (handle, _task) = spawn_session(
        &quiet_config(),
        ComponentRegistry::with_builtin(),
        bridge,
        MediaKitState::default(),
    );
    handle.apply(init("a", "hero")).await.unwrap();
    handle.apply(init("b", "hero")).await.unwrap();

    assert!(handle.undo().await.unwrap());
    assert_eq!(handle.get_state().await.unwrap().layout.len(), 1);
    assert!(handle.redo().await.unwrap());
    assert_eq!(handle.get_state().await.unwrap().layout.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_closed_session_reports_error() {
    let bridge = Arc::new(MemoryBridge::new(1));
    let (handle, task) = spawn_session(
        &quiet_config(),
        ComponentRegistry::with_builtin(),
        bridge,
        MediaKitState::default(),
    );
    task.abort();
    let _ = task.await;

    assert!(matches!(handle.flush().await, Err(Error::SessionClosed)));
}
