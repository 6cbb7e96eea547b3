//! Test helpers for mkb-builder integration tests
//!
//! - Fixtures: builders, payloads and event collection
//! - FakeWordPress: in-process admin-ajax.php endpoint

#![allow(dead_code)]

pub mod fake_wordpress;

pub use fake_wordpress::FakeWordPress;

use mkb_builder::{Builder, ComponentRegistry};
use mkb_common::config::BuilderConfig;
use mkb_common::events::BuilderEvent;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

/// Builder with the built-in registry and default config
pub fn builder() -> Builder {
    Builder::new(&BuilderConfig::default(), ComponentRegistry::with_builtin())
}

/// Config with autosave off, for tests that count saves themselves
pub fn quiet_config() -> BuilderConfig {
    let mut config = BuilderConfig::default();
    config.autosave.enabled = false;
    config
}

/// JSON object literal as a patch map
pub fn patch(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}

/// Everything currently buffered on a bus receiver
pub fn drain(rx: &mut broadcast::Receiver<BuilderEvent>) -> Vec<BuilderEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn render_completes(events: &[BuilderEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, BuilderEvent::RenderComplete { .. }))
        .count()
}
