//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time as unix milliseconds (used in generated IDs)
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
