use crate::CaptureError;
use std::time::Duration;
use url::Url;

/// Reduces a URL to a filename-safe stem: scheme stripped, anything
/// outside `[a-zA-Z0-9.-]` replaced with `_`, truncated to 50 chars.
pub fn sanitize_url_for_name(url: &str) -> String {
    let stripped = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);

    stripped
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' => c,
            _ => '_',
        })
        .take(50)
        .collect()
}

/// Archive entry name for one batch item. The 1-based index is global
/// across the batch and guarantees uniqueness within it.
pub fn archive_entry_name(url: &str, index: usize, extension: &str) -> String {
    let stem = sanitize_url_for_name(url);
    let timestamp = chrono::Utc::now().timestamp_millis();
    format!("screenshot_{index}_{stem}_{timestamp}.{extension}")
}

/// Accepts only well-formed http(s) URLs; anything else is rejected
/// before it reaches the pipeline.
pub fn validate_url(url: &str) -> Result<Url, CaptureError> {
    let parsed =
        Url::parse(url).map_err(|e| CaptureError::InvalidUrl(format!("{url}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(CaptureError::InvalidUrl(format!(
            "{url}: unsupported scheme '{other}'"
        ))),
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    let millis = duration.subsec_millis();

    if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else if seconds > 0 {
        format!("{}.{}s", seconds, millis / 100)
    } else {
        format!("{millis}ms")
    }
}

pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
