pub fn format_ms(ms: impl Into<i128>) -> String {
    let ms = ms.into();
    if ms < 0 {
        return String::from("0s");
    }
    let seconds = ms / 1000;
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let remaining = seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {remaining}s")
    } else if minutes > 0 {
        format!("{minutes}m {remaining}s")
    } else {
        format!("{remaining}s")
    }
}

pub fn format_duration(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let mut parts = Vec::with_capacity(3);
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{seconds}s"));
    }
    parts.join(" ")
}

pub fn format_minutes(ms: f64) -> String {
    if !ms.is_finite() || ms <= 0.0 {
        return String::from("0.0 min");
    }
    format!("{:.1} min", ms / 60_000.0)
}

pub fn format_number(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ms_formatting_picks_largest_unit() {
        assert_eq!(format_ms(9_252_000_u64), "2h 34m 12s");
        assert_eq!(format_ms(330_000_u64), "5m 30s");
        assert_eq!(format_ms(999_u64), "0s");
        assert_eq!(format_ms(3_600_000_u64), "1h 0m 0s");
        assert_eq!(format_ms(-5_i64), "0s");
    }

    #[test]
    fn duration_formatting_omits_zero_parts() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(10_805_000), "3h 5s");
        assert_eq!(format_duration(120_000), "2m");
    }

    #[test]
    fn minutes_have_one_decimal() {
        assert_eq!(format_minutes(210_000.0), "3.5 min");
        assert_eq!(format_minutes(f64::NAN), "0.0 min");
    }

    #[test]
    fn numbers_get_thousands_separators() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
