//! Display formatting for progress values, sizes, timestamps and statuses.
//!
//! Everything here is pure; presentation layers call into it when building panels.

use crate::model::TaskStatus;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// URLs longer than this are truncated in history cards.
pub const URL_DISPLAY_MAX: usize = 50;

/// Clamp a percentage into `[0, 100]`. NaN counts as zero.
pub fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() {
        return 0.0;
    }
    percent.clamp(0.0, 100.0)
}

pub fn format_percent(percent: f64) -> String {
    format!("{:.1}%", clamp_percent(percent))
}

/// Format a byte rate as MB/s (at least 1 MiB/s) or KB/s.
pub fn format_speed(bytes_per_second: Option<f64>) -> String {
    let bps = match bytes_per_second {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => return "0 MB/s".to_string(),
    };
    let mbps = bps / MIB;
    if mbps >= 1.0 {
        format!("{:.2} MB/s", mbps)
    } else {
        format!("{:.2} KB/s", bps / KIB)
    }
}

/// Format seconds remaining as `MM:SS`, or `H:MM:SS` from one hour up.
pub fn format_eta(seconds: Option<f64>) -> String {
    let secs = match seconds {
        Some(v) if v.is_finite() && v > 0.0 => v.floor() as u64,
        _ => return "--:--".to_string(),
    };
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let rest = secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{rest:02}")
    } else {
        format!("{minutes:02}:{rest:02}")
    }
}

pub fn format_filesize(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / MIB)
}

/// Human label for a status; unknown statuses are shown raw.
pub fn status_label(status: &TaskStatus) -> &str {
    match status {
        TaskStatus::Pending => "Pending",
        TaskStatus::Downloading => "Downloading",
        TaskStatus::Processing => "Processing",
        TaskStatus::Finished => "Finished",
        TaskStatus::Error => "Failed",
        TaskStatus::Other(raw) => raw,
    }
}

/// Cut URLs longer than [`URL_DISPLAY_MAX`] characters to 47 characters plus `...`.
pub fn truncate_url(url: &str) -> String {
    if url.chars().count() <= URL_DISPLAY_MAX {
        return url.to_string();
    }
    let head: String = url.chars().take(URL_DISPLAY_MAX - 3).collect();
    format!("{head}...")
}

/// Current time as RFC 3339 (UTC), the format history entries are stored in.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "now".into())
}

/// Render an RFC 3339 timestamp in the local offset, falling back to UTC when
/// the offset cannot be determined. Unparsable input is returned unchanged.
pub fn format_local_timestamp(rfc3339: &str) -> String {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    format_timestamp_at(rfc3339, offset)
}

fn format_timestamp_at(rfc3339: &str, offset: UtcOffset) -> String {
    let Ok(parsed) = OffsetDateTime::parse(rfc3339, &Rfc3339) else {
        return rfc3339.to_string();
    };
    parsed
        .to_offset(offset)
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .unwrap_or_else(|_| rfc3339.to_string())
}
