use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

pub fn truncate_unicode(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width > max_width.saturating_sub(1) {
            result.push('\u{2026}');
            break;
        }
        result.push(ch);
        width += ch_width;
    }
    result
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.0} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Totals arrive in KB.
pub fn format_kb(kb: u64) -> String {
    format_bytes(kb.saturating_mul(1024))
}

pub fn format_percent(value: f64) -> String {
    format!("{value:.1}%")
}

pub fn format_speed(kbps: f64) -> String {
    format!("{kbps:.1}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate_unicode("CPU: 1.0%", 20), "CPU: 1.0%");
    }

    #[test]
    fn truncate_adds_ellipsis_on_wide_text() {
        let out = truncate_unicode("Network: ↓10.0 KB/s ↑2.0 KB/s", 12);
        assert!(out.ends_with('\u{2026}'));
        assert!(out.width() <= 12);
    }

    #[test]
    fn byte_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2 KB");
        assert_eq!(format_kb(1536), "1.5 MB");
        assert_eq!(format_kb(3 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn one_decimal_place() {
        assert_eq!(format_percent(12.54), "12.5%");
        assert_eq!(format_speed(9.953125), "10.0");
        assert_eq!(format_speed(0.0), "0.0");
    }
}
