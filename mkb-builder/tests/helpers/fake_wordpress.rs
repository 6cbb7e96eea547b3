//! Fake `admin-ajax.php`
//!
//! Speaks the same envelope as WordPress (`{"success": bool, "data": ...}`)
//! for the two media kit actions, stores post meta in memory, and checks the
//! nonce like the real handlers do.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Form, Json, Router};
use mkb_common::config::WordPressConfig;
use serde_json::{json, Value};

pub const NONCE: &str = "test-nonce";

#[derive(Default)]
pub struct FakeWordPress {
    posts: Mutex<HashMap<u64, Value>>,
    saves: AtomicUsize,
    /// Requests still to be answered with 503
    outages: AtomicUsize,
}

impl FakeWordPress {
    /// Serve on an ephemeral port; returns the store and the ajax URL
    pub async fn start() -> (Arc<Self>, String) {
        let wp = Arc::new(Self::default());
        let app = Router::new()
            .route("/wp-admin/admin-ajax.php", post(admin_ajax))
            .with_state(Arc::clone(&wp));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (wp, format!("http://{}/wp-admin/admin-ajax.php", addr))
    }

    pub fn config(ajax_url: &str, post_id: u64) -> WordPressConfig {
        WordPressConfig {
            ajax_url: ajax_url.to_string(),
            nonce: NONCE.to_string(),
            post_id,
            timeout_ms: 5_000,
        }
    }

    /// Seed post meta directly
    pub fn put(&self, post_id: u64, state: Value) {
        self.posts.lock().unwrap().insert(post_id, state);
    }

    pub fn get(&self, post_id: u64) -> Option<Value> {
        self.posts.lock().unwrap().get(&post_id).cloned()
    }

    /// Answer the next `count` requests with 503 Service Unavailable
    pub fn fail_next_requests(&self, count: usize) {
        self.outages.store(count, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

fn failure(message: &str) -> Response {
    Json(json!({"success": false, "data": message})).into_response()
}

async fn admin_ajax(State(wp): State<Arc<FakeWordPress>>, Form(form): Form<HashMap<String, String>>) -> Response {
    let down = wp
        .outages
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if down {
        return (StatusCode::SERVICE_UNAVAILABLE, "<h1>Service Unavailable</h1>").into_response();
    }
    let action = form.get("action").map(String::as_str).unwrap_or_default();
    if action != "gmkb_save_media_kit" && action != "gmkb_load_media_kit" {
        // What WordPress answers for an action nobody registered
        return (StatusCode::BAD_REQUEST, "0").into_response();
    }
    if form.get("nonce").map(String::as_str) != Some(NONCE) {
        return failure("Invalid nonce");
    }
    let post_id: u64 = form.get("post_id").and_then(|p| p.parse().ok()).unwrap_or(0);
    if post_id == 0 {
        return failure("No post ID provided");
    }

    if action == "gmkb_load_media_kit" {
        return match wp.get(post_id) {
            Some(state) => Json(json!({
                "success": true,
                "data": {"state": state, "message": "Loaded"}
            }))
            .into_response(),
            None => Json(json!({
                "success": true,
                "data": {"state": null, "message": "No saved state found"}
            }))
            .into_response(),
        };
    }

    let Some(raw) = form.get("state") else {
        return failure("No state data provided");
    };
    let Ok(state) = serde_json::from_str::<Value>(raw) else {
        return failure("Invalid JSON data");
    };
    let components_count = state["components"].as_object().map_or(0, |c| c.len());
    let sections_count = state["sections"].as_array().map_or(0, |s| s.len());
    wp.put(post_id, state);
    wp.saves.fetch_add(1, Ordering::SeqCst);

    Json(json!({
        "success": true,
        "data": {
            "message": "Media kit saved successfully",
            "timestamp": 1_700_000_000,
            "post_id": post_id,
            "components_count": components_count,
            "sections_count": sections_count
        }
    }))
    .into_response()
}
