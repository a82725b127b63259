use percent_encoding::percent_decode_str;
use std::time::Duration;
use url::Url;

use crate::error::DownloadError;

/// Name used when the resolved URL has no usable last path segment.
pub const PLACEHOLDER_FILENAME: &str = "downloaded_file";

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// Coerces bare hosts to `https://` and parses the result.
///
/// Input that already names a scheme keeps it; anything but http(s) is rejected.
pub fn normalize_url(raw: &str) -> Result<Url, DownloadError> {
    let trimmed = raw.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed.trim_start_matches('/'))
    };

    let url = Url::parse(&candidate).map_err(|e| DownloadError::Scheme {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some_and(|h| !h.is_empty()) => Ok(url),
        _ => Err(DownloadError::Scheme {
            url: raw.to_string(),
            reason: "expected an http(s) URL with a host".to_string(),
        }),
    }
}

pub fn get_filename_from_url(url: &Url) -> String {
    if let Some(segments) = url.path_segments() {
        if let Some(filename) = segments.last() {
            let decoded = percent_decode_str(filename).decode_utf8_lossy();
            let sanitized = sanitize_filename(&decoded);
            if !matches!(sanitized.trim(), "" | "." | "..") {
                return sanitized;
            }
        }
    }

    PLACEHOLDER_FILENAME.to_string()
}

/// Replaces path separators, control characters and characters reserved on
/// common filesystems with `_`.
pub fn sanitize_filename(filename: &str) -> String {
    filename.replace(
        |c: char| c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'),
        "_",
    )
}

/// Splits `[0, total_size)` into `count` inclusive ranges of `total_size / count`
/// bytes; the last range takes the remainder.
///
/// `count` is clamped to `1..=total_size` so no range is ever empty.
pub fn partition_ranges(total_size: u64, count: usize) -> Vec<(u64, u64)> {
    if total_size == 0 {
        return Vec::new();
    }

    let count = (count.max(1) as u64).min(total_size);
    let part_size = total_size / count;

    (0..count)
        .map(|i| {
            let start_byte = i * part_size;
            let end_byte = if i == count - 1 {
                total_size - 1
            } else {
                (i + 1) * part_size - 1
            };
            (start_byte, end_byte)
        })
        .collect()
}

/// Renders a throughput value as `"X.XX MB/s"` from 1 MiB/s up, `"X.XX KB/s"` below.
pub fn format_speed(bytes_per_sec: f64) -> String {
    let mb = bytes_per_sec / MIB;
    if mb >= 1.0 {
        format!("{:.2} MB/s", mb)
    } else {
        format!("{:.2} KB/s", bytes_per_sec / KIB)
    }
}

pub fn speed_label(bytes: u64, elapsed: Duration) -> Option<String> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    Some(format_speed(bytes as f64 / secs))
}

pub fn percent(downloaded: u64, total_size: u64) -> f64 {
    if total_size == 0 {
        return 0.0;
    }
    (downloaded as f64 / total_size as f64 * 100.0).min(100.0)
}
