use chrono::TimeZone;
use std::fmt::Display;

const UNIT: u64 = 1024;
const SCALED_SUFFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];
const SECONDS_PER_DAY: u64 = 86_400;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Scales a byte count to the largest power-of-1024 unit that keeps the value >= 1.
pub fn format_bytes(n: u64) -> String {
    if n < UNIT {
        return format!("{n}B");
    }

    let mut div = UNIT;
    let mut exp = 0_usize;
    let mut rest = n / UNIT;
    while rest >= UNIT {
        div *= UNIT;
        exp += 1;
        rest /= UNIT;
    }

    format!("{:.2}{}", n as f64 / div as f64, SCALED_SUFFIXES[exp])
}

/// Whole days once a day has passed, `HH:MM:SS` before that.
pub fn format_uptime(seconds: u64) -> String {
    if seconds >= SECONDS_PER_DAY {
        let days = seconds / SECONDS_PER_DAY;
        return if days == 1 {
            "1 day".to_string()
        } else {
            format!("{days} days")
        };
    }

    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

pub fn format_timestamp<Tz>(unix_secs: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    tz.timestamp_opt(unix_secs, 0)
        .single()
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// `round(used * 10000 / total) / 100`, or 0 for an empty total.
pub fn usage_percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    clamp_percent((used as f64 * 10_000.0 / total as f64).round() / 100.0)
}

pub fn round_percent(raw: f64) -> f64 {
    clamp_percent((raw * 100.0).round() / 100.0)
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn bytes_below_one_kib_have_no_decimals() {
        assert_eq!(format_bytes(0), "0B");
        assert_eq!(format_bytes(1), "1B");
        assert_eq!(format_bytes(1023), "1023B");
    }

    #[test]
    fn bytes_pick_largest_unit() {
        assert_eq!(format_bytes(1024), "1.00K");
        assert_eq!(format_bytes(1536), "1.50K");
        assert_eq!(format_bytes(512 * 1024 * 1024), "512.00M");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00G");
        assert_eq!(format_bytes(1 << 40), "1.00T");
        assert_eq!(format_bytes(1 << 50), "1.00P");
        assert_eq!(format_bytes(1 << 60), "1.00E");
    }

    #[test]
    fn bytes_do_not_overflow_at_top_unit() {
        assert_eq!(format_bytes(u64::MAX), "16.00E");
    }

    #[test]
    fn uptime_below_a_day_is_clock_style() {
        assert_eq!(format_uptime(0), "00:00:00");
        assert_eq!(format_uptime(59), "00:00:59");
        assert_eq!(format_uptime(3661), "01:01:01");
        assert_eq!(format_uptime(86_399), "23:59:59");
    }

    #[test]
    fn uptime_of_a_day_or_more_is_whole_days() {
        assert_eq!(format_uptime(86_400), "1 day");
        assert_eq!(format_uptime(86_400 * 2 - 1), "1 day");
        assert_eq!(format_uptime(86_400 * 3 + 5), "3 days");
    }

    #[test]
    fn timestamp_formats_in_given_zone() {
        assert_eq!(format_timestamp(0, &Utc), "1970-01-01 00:00:00");
        assert_eq!(format_timestamp(1_700_000_000, &Utc), "2023-11-14 22:13:20");
    }

    #[test]
    fn timestamp_out_of_range_is_unknown() {
        assert_eq!(format_timestamp(i64::MAX, &Utc), "unknown");
    }

    #[test]
    fn usage_percent_rounds_to_two_decimals() {
        assert_eq!(usage_percent(1, 3), 33.33);
        assert_eq!(usage_percent(2, 3), 66.67);
        assert_eq!(usage_percent(512, 2048), 25.0);
    }

    #[test]
    fn usage_percent_handles_empty_total() {
        assert_eq!(usage_percent(0, 0), 0.0);
        assert_eq!(usage_percent(10, 0), 0.0);
    }

    #[test]
    fn usage_percent_is_clamped() {
        assert_eq!(usage_percent(300, 100), 100.0);
    }

    #[test]
    fn round_percent_clamps_and_rounds() {
        assert_eq!(round_percent(12.345_678), 12.35);
        assert_eq!(round_percent(-3.0), 0.0);
        assert_eq!(round_percent(f64::NAN), 0.0);
    }
}
