//! admin-ajax.php client
//!
//! Both actions are form POSTs authenticated with the editor nonce. WordPress
//! wraps every answer as `{"success": bool, "data": ...}`; on failure `data`
//! is usually a bare message string.
//!
//! Failures split two ways. Transport errors, 5xx answers and garbled bodies
//! are [`Error::Bridge`] and worth retrying. Anything WordPress deliberately
//! refused (4xx, `success: false`, the bare `0`/`-1` replies) is
//! [`Error::Rejected`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use mkb_common::config::WordPressConfig;
use mkb_common::model::{decode_wordpress_state, MediaKitState};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{PersistenceBridge, SaveReceipt};
use crate::error::{Error, Result};

pub const SAVE_ACTION: &str = "gmkb_save_media_kit";
pub const LOAD_ACTION: &str = "gmkb_load_media_kit";

const USER_AGENT: &str = concat!("mkb-builder/", env!("CARGO_PKG_VERSION"));
/// Longest response excerpt quoted in an error
const EXCERPT_LEN: usize = 200;

#[derive(Debug, Deserialize)]
struct AjaxEnvelope {
    success: bool,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SaveData {
    message: Option<String>,
    timestamp: Option<i64>,
    components_count: Option<usize>,
    sections_count: Option<usize>,
}

/// WordPress admin-ajax bridge
pub struct WordPressBridge {
    http_client: reqwest::Client,
    ajax_url: String,
    nonce: String,
    post_id: u64,
}

impl WordPressBridge {
    pub fn new(config: &WordPressConfig) -> Result<Self> {
        if config.ajax_url.is_empty() {
            return Err(Error::Common(mkb_common::Error::Config(
                "wordpress.ajax_url is not configured".into(),
            )));
        }
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout().max(Duration::from_millis(1)))
            .build()?;

        Ok(Self {
            http_client,
            ajax_url: config.ajax_url.clone(),
            nonce: config.nonce.clone(),
            post_id: config.post_id,
        })
    }

    pub fn post_id(&self) -> u64 {
        self.post_id
    }

    async fn call(&self, action: &str, post_id: u64, extra: &[(&str, &str)]) -> Result<Value> {
        let post_id_param = post_id.to_string();
        let mut params = vec![
            ("action", action),
            ("nonce", self.nonce.as_str()),
            ("post_id", post_id_param.as_str()),
        ];
        params.extend_from_slice(extra);

        debug!(action = action, post_id = post_id, "Calling admin-ajax");
        let response = self.http_client.post(&self.ajax_url).form(&params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = format!("{} returned HTTP {}: {}", action, status, excerpt(&body));
            warn!("{}", message);
            return Err(if status.is_client_error() {
                Error::Rejected(message)
            } else {
                Error::Bridge(message)
            });
        }

        // admin-ajax answers "0" or "-1" when the action is unknown or the nonce fails
        if is_refusal(&body) {
            warn!("{} refused by admin-ajax ({})", action, body.trim());
            return Err(Error::Rejected(format!("{} refused by admin-ajax", action)));
        }
        let envelope: AjaxEnvelope = serde_json::from_str(&body)
            .map_err(|_| Error::Bridge(format!("{} returned an unexpected response: {}", action, excerpt(&body))))?;

        if envelope.success {
            Ok(envelope.data)
        } else {
            let message = failure_message(&envelope.data);
            warn!("{} rejected: {}", action, message);
            Err(Error::Rejected(message))
        }
    }
}

#[async_trait]
impl PersistenceBridge for WordPressBridge {
    async fn save(&self, state: &MediaKitState) -> Result<SaveReceipt> {
        let payload = serde_json::to_string(state)?;
        let data = self.call(SAVE_ACTION, self.post_id, &[("state", payload.as_str())]).await?;
        let data: SaveData = serde_json::from_value(data).unwrap_or_default();

        let receipt = SaveReceipt {
            success: true,
            message: data.message.unwrap_or_else(|| "Media kit saved".to_string()),
            timestamp: data
                .timestamp
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                .unwrap_or_else(mkb_common::time::now),
            components_count: data.components_count.unwrap_or(state.components.len()),
            sections_count: data.sections_count.unwrap_or(state.sections.len()),
        };
        info!(
            "Saved post {}: {} components, {} sections",
            self.post_id, receipt.components_count, receipt.sections_count
        );
        Ok(receipt)
    }

    async fn load(&self, post_id: u64) -> Result<MediaKitState> {
        let mut data = self.call(LOAD_ACTION, post_id, &[]).await?;

        let state = match data.get_mut("state").map(Value::take) {
            Some(raw) => decode_wordpress_state(raw)?,
            None => None,
        };
        match state {
            Some((state, repaired)) => {
                if !repaired.is_empty() {
                    warn!("Post {} state needed {} repairs on load", post_id, repaired.len());
                }
                info!("Loaded post {}: {} components", post_id, state.components.len());
                Ok(state)
            }
            None => {
                info!("Post {} has no saved media kit", post_id);
                Ok(MediaKitState::default())
            }
        }
    }
}

fn failure_message(data: &Value) -> String {
    match data {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| data.to_string()),
        Value::Null => "request failed".to_string(),
        other => other.to_string(),
    }
}

fn is_refusal(body: &str) -> bool {
    matches!(body.trim(), "0" | "-1")
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= EXCERPT_LEN {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(EXCERPT_LEN).collect();
        format!("{}...", cut)
    }
}
