//! Display text of the playing station

use std::time::Duration;

/// Display text while the stream is opening
pub const BUFFERING_TEXT: &str = "\u{25B6} Buffering...";

/// Human readable byte count: `GB` from 1 GiB, `MB` from 1 MiB, `KB` below.
///
/// The value is shifted down to the next smaller unit first, then divided by
/// 1024 with two decimals (`512` → `"0.50 KB"`).
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 0x4000_0000 {
        format!("{:.2} GB", (bytes >> 20) as f64 / 1024.0)
    } else if bytes >= 0x10_0000 {
        format!("{:.2} MB", (bytes >> 10) as f64 / 1024.0)
    } else {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    }
}

/// `HH:MM:SS`, hours wrapping at 24 like a time of day.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60
    )
}

/// `"▶ HH:MM:SS / <bytes>"`
pub fn progress_text(elapsed: Duration, downloaded: u64) -> String {
    format!(
        "\u{25B6} {} / {}",
        format_elapsed(elapsed),
        format_bytes(downloaded)
    )
}
