//! Decoding of state payloads as WordPress hands them back
//!
//! Post meta may hold the current shape, or the older layout that stored a
//! flat `saved_components` array with an `id` on each entry.

use serde_json::{Map, Value};

use super::component::{ComponentProps, ComponentRecord};
use super::state::{MediaKitState, Violation, STATE_VERSION};
use crate::ids::ComponentId;
use crate::{Error, Result};

/// Decode whatever WordPress returned for a post into a normalized state.
///
/// Returns `Ok(None)` when the post has no saved state yet. Repairs applied
/// during normalization are returned alongside so callers can surface them.
pub fn decode_wordpress_state(value: Value) -> Result<Option<(MediaKitState, Vec<Violation>)>> {
    let object = match value {
        Value::Null => return Ok(None),
        Value::String(s) if s.is_empty() => return Ok(None),
        // Some handlers double-encode the meta value
        Value::String(s) => return decode_wordpress_state(serde_json::from_str(&s)?),
        Value::Object(map) => map,
        other => {
            return Err(Error::InvalidState(format!(
                "expected a state object, got {}",
                other
            )))
        }
    };

    let mut state = if !object.contains_key("components") && object.contains_key("saved_components") {
        from_saved_components(object)?
    } else {
        serde_json::from_value::<MediaKitState>(Value::Object(object))?
    };

    let repaired = state.normalize();
    Ok(Some((state, repaired)))
}

fn from_saved_components(mut object: Map<String, Value>) -> Result<MediaKitState> {
    let list = match object.remove("saved_components") {
        Some(Value::Array(list)) => list,
        _ => return Err(Error::InvalidState("saved_components must be an array".into())),
    };

    let mut state = MediaKitState::default();
    for entry in list {
        let Value::Object(mut entry) = entry else { continue };
        let Some(id) = entry.remove("id").and_then(|v| v.as_str().map(ComponentId::new)) else {
            tracing::warn!("Skipping legacy component without an id");
            continue;
        };
        let component_type = entry
            .remove("type")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        let data = match entry.remove("data").or_else(|| entry.remove("props")) {
            Some(data) => data,
            None => Value::Object(entry),
        };

        let props = ComponentProps::from_parts_lenient(&component_type, data);
        state.layout.push(id.clone());
        state.components.insert(id.clone(), ComponentRecord::new(id, props));
    }

    if let Some(sections) = object.remove("sections") {
        state.sections = serde_json::from_value(sections)?;
    }
    if let Some(Value::Object(settings)) = object
        .remove("globalSettings")
        .or_else(|| object.remove("global_settings"))
    {
        state.global_settings = settings;
    }
    state.version = object
        .remove("version")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| STATE_VERSION.to_string());

    Ok(state)
}
