use chrono::DateTime;

pub fn format_timestamp(seconds: i64) -> String {
    if seconds == 0 {
        return "-".to_string();
    }
    DateTime::from_timestamp(seconds, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}
