use chrono::Utc;

pub fn now_i64() -> i64 {
    Utc::now().timestamp()
}

/// Compact UTC timestamp used in generated file names
pub fn file_timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}
