// Logging module - HTTP traffic audit trail
pub mod audit_recorder;

pub use audit_recorder::{AuditRecorder, HeaderEntry, HttpExchangeRecord, DEFAULT_AUDIT_LOG};

/// Safely truncate a string to a maximum number of characters
pub fn safe_truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        // Reserve space for "..." suffix
        let trunc_chars = max_chars.saturating_sub(3);
        format!("{}...", s.chars().take(trunc_chars).collect::<String>())
    }
}
