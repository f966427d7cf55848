use chrono::{DateTime, Duration, Utc};

/// Parses expiry inputs: RFC3339 timestamps or relative durations.
pub struct TimeParser;

impl TimeParser {
    /// 解析时间字符串，支持多种格式：
    /// - RFC3339 格式：2025-10-01T12:00:00Z
    /// - 相对时间：30s, 15m, 1h, 7d, 2w, 3mo, 1y
    /// - 组合格式：1d2h30m
    pub fn parse_expire_time(input: &str) -> Result<DateTime<Utc>, String> {
        let input = input.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
            return Ok(dt.with_timezone(&Utc));
        }

        let duration = Self::parse_duration(input)?;
        Utc::now()
            .checked_add_signed(duration)
            .ok_or_else(|| "Expiry time is out of range".to_string())
    }

    /// Parse a relative duration such as `1d2h30m`.
    pub fn parse_duration(input: &str) -> Result<Duration, String> {
        let mut total = Duration::zero();
        let mut rest = input.trim();

        if rest.is_empty() {
            return Err("Empty duration".to_string());
        }

        while !rest.is_empty() {
            let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
            if digits == 0 {
                return Err(format!("Invalid time format: '{}'", input));
            }
            let num: i64 = rest[..digits]
                .parse()
                .map_err(|_| format!("Invalid number in '{}'", input))?;
            rest = &rest[digits..];

            let unit_len = rest.chars().take_while(|c| c.is_ascii_alphabetic()).count();
            if unit_len == 0 {
                return Err(format!("Missing time unit after '{}'", num));
            }
            let unit = &rest[..unit_len];
            rest = &rest[unit_len..];

            total += match unit.to_lowercase().as_str() {
                "s" | "sec" | "second" | "seconds" => Duration::seconds(num),
                "m" | "min" | "minute" | "minutes" => Duration::minutes(num),
                "h" | "hour" | "hours" => Duration::hours(num),
                "d" | "day" | "days" => Duration::days(num),
                "w" | "week" | "weeks" => Duration::weeks(num),
                "mo" | "month" | "months" => Duration::days(num * 30),
                "y" | "year" | "years" => Duration::days(num * 365),
                _ => return Err(format!("Unsupported time unit: '{}'", unit)),
            };
        }

        if total == Duration::zero() {
            return Err("Duration must be greater than zero".to_string());
        }

        Ok(total)
    }

    /// Compact human form of an elapsed interval, e.g. `2d 3h` or `45s`.
    pub fn format_elapsed(from: DateTime<Utc>, to: DateTime<Utc>) -> String {
        let secs = to.signed_duration_since(from).num_seconds().max(0);
        let days = secs / 86400;
        let hours = (secs % 86400) / 3600;
        let minutes = (secs % 3600) / 60;

        match (days, hours, minutes) {
            (0, 0, 0) => format!("{}s", secs),
            (0, 0, m) => format!("{}m", m),
            (0, h, 0) => format!("{}h", h),
            (0, h, m) => format!("{}h {}m", h, m),
            (d, 0, _) => format!("{}d", d),
            (d, h, _) => format!("{}d {}h", d, h),
        }
    }
}
