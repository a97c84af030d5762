use chrono::{DateTime, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Countdown rendering: `HH:MM:SS`.
pub fn format_clock(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Compact time-spent rendering: `45s`, `2m 5s`, `3m`, `1h 4m`.
pub fn format_time_spent(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        let minutes = seconds / 60;
        let rest = seconds % 60;
        if rest > 0 {
            format!("{}m {}s", minutes, rest)
        } else {
            format!("{}m", minutes)
        }
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}

/// Test duration as shown on the instructions page: `3h 0m`.
pub fn format_duration_minutes(minutes: u32) -> String {
    format!("{}h {}m", minutes / 60, minutes % 60)
}
