use uuid::Uuid;

/// Generate a prefixed document id such as `wrk_0190f6c1...`.
///
/// UUID v7 keeps ids roughly sortable by creation time.
pub fn generate_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::now_v7().simple())
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
