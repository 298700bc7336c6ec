//! ID and timestamp utilities for Ralph
//!
//! Provides session identifiers for work-unit invocations.

use chrono::{DateTime, Utc};
use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current wall-clock time
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Generate a unique session ID for one work-unit invocation
///
/// Format: `session-{timestamp_ms}-{random_hex}`
/// Example: `session-1738300800123-a1b2`
pub fn generate_session_id() -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    format!("session-{}-{:04x}", timestamp, random)
}
