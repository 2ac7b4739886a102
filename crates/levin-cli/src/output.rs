//! Human-readable formatting for status and list output.

/// Render a byte count as `B`, `KB`, `MB`, or `GB` with one decimal.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let value = bytes as f64;
    if value >= GB {
        format!("{:.1} GB", value / GB)
    } else if value >= MB {
        format!("{:.1} MB", value / MB)
    } else if value >= KB {
        format!("{:.1} KB", value / KB)
    } else {
        format!("{bytes} B")
    }
}

/// Render a transfer rate.
#[must_use]
pub fn format_rate(bytes_per_sec: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec))
}

/// Insert thousands separators into a decimal string: `13194` → `13,194`.
#[must_use]
pub fn format_count(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (len - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Fetch a reply field, defaulting to the empty string.
#[must_use]
pub fn field<'a>(reply: &'a levin_ipc::Message, key: &str) -> &'a str {
    reply.get(key).map_or("", String::as_str)
}

/// Parse a reply field as an integer, defaulting to zero.
#[must_use]
pub fn numeric_field(reply: &levin_ipc::Message, key: &str) -> u64 {
    field(reply, key).parse().unwrap_or(0)
}
