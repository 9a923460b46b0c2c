//! Human readable durations for configuration files
//!
//! Durations are written as a sequence of `<number><unit>` groups where the
//! unit is one of `h`, `m`, `s` or `ms`, for example `"500ms"`, `"20s"` or
//! `"1h30m"`. A bare number is read as seconds.
//!
//! Use with `#[serde(with = "common::duration")]`.

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_duration(*duration))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

/// Parse a duration string like "1h", "30m", "1h30m" or "250ms"
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim().to_lowercase();
    let mut total = Duration::ZERO;
    let mut chars = s.chars().peekable();

    while chars.peek().is_some() {
        let mut number = String::new();
        while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
            number.push(c);
            chars.next();
        }
        if number.is_empty() {
            return Err(format!("Invalid duration format: {}", s));
        }
        let value: u64 = number
            .parse()
            .map_err(|_| format!("Invalid number in duration: {}", number))?;

        let mut unit = String::new();
        while let Some(c) = chars.peek().copied().filter(char::is_ascii_alphabetic) {
            unit.push(c);
            chars.next();
        }

        total += match unit.as_str() {
            "h" => Duration::from_secs(value * 3600),
            "m" => Duration::from_secs(value * 60),
            "s" | "" => Duration::from_secs(value),
            "ms" => Duration::from_millis(value),
            other => return Err(format!("Invalid duration unit: {}", other)),
        };
    }

    if total.is_zero() {
        return Err("Duration must be greater than 0".to_string());
    }

    Ok(total)
}

/// Format a duration the way [`parse_duration`] reads it
pub fn format_duration(d: Duration) -> String {
    let millis = d.subsec_millis();
    let secs = d.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    let mut result = String::new();
    if hours > 0 {
        result.push_str(&format!("{}h", hours));
    }
    if mins > 0 {
        result.push_str(&format!("{}m", mins));
    }
    if secs > 0 {
        result.push_str(&format!("{}s", secs));
    }
    if millis > 0 || result.is_empty() {
        result.push_str(&format!("{}ms", millis));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Wrapper {
        #[serde(with = "crate::duration")]
        timeout: Duration,
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_duration("20s").unwrap(), Duration::from_secs(20));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("1s250ms").unwrap(), Duration::from_millis(1250));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("0s").is_err());
    }

    #[test]
    fn test_format() {
        assert_eq!(format_duration(Duration::from_secs(60)), "1m");
        assert_eq!(format_duration(Duration::from_millis(25)), "25ms");
        assert_eq!(format_duration(Duration::from_millis(3_723_500)), "1h2m3s500ms");
    }

    #[test]
    fn test_serde_with_toml() {
        let parsed: Wrapper = toml::from_str("timeout = \"20s\"").unwrap();
        assert_eq!(parsed.timeout, Duration::from_secs(20));

        let text = toml::to_string(&parsed).unwrap();
        assert!(text.contains("\"20s\""));
    }
}
