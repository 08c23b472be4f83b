//! Human duration strings used by moderation commands (`10m`, `1h30m`,
//! `2d`).

use std::time::Duration;

use crate::error::DurationError;

/// Parse a sequence of `<number><unit>` pairs.
///
/// Units: `w`, `d`, `h`, `m`, `s`, `ms`. A bare number is seconds. Values
/// are summed, so `1h30m` is ninety minutes.
///
/// # Errors
///
/// `DurationError` on empty input, an unknown unit, a missing number or an
/// overflow.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let fail = || DurationError(input.to_string());
    let text = input.trim();
    if text.is_empty() {
        return Err(fail());
    }
    if let Ok(secs) = text.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = text;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(fail());
        }
        let value: u64 = rest[..digits].parse().map_err(|_| fail())?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit_secs: u64 = match &rest[..unit_len] {
            "ms" => {
                total = total.checked_add(Duration::from_millis(value)).ok_or_else(fail)?;
                rest = &rest[unit_len..];
                continue;
            },
            "s" => 1,
            "m" => 60,
            "h" => 3600,
            "d" => 86_400,
            "w" => 604_800,
            _ => return Err(fail()),
        };
        let secs = value.checked_mul(unit_secs).ok_or_else(fail)?;
        total = total.checked_add(Duration::from_secs(secs)).ok_or_else(fail)?;
        rest = &rest[unit_len..];
    }

    Ok(total)
}

/// Compact rendering such as `1h30m` or `45s`, inverse of [`parse_duration`]
/// at second granularity.
pub fn format_duration(duration: Duration) -> String {
    let mut secs = duration.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }
    let mut out = String::new();
    for (unit, size) in [("d", 86_400), ("h", 3600), ("m", 60), ("s", 1)] {
        if secs >= size {
            out.push_str(&format!("{}{unit}", secs / size));
            secs %= size;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_forms() {
        assert_eq!(parse_duration("10m"), Ok(Duration::from_secs(600)));
        assert_eq!(parse_duration("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("2d"), Ok(Duration::from_secs(172_800)));
        assert_eq!(parse_duration("90"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("1s500ms"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_duration("0s"), Ok(Duration::ZERO));
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "m", "10x", "1h-5m", "abc", "99999999999999999999w"] {
            assert!(parse_duration(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn formats_compactly() {
        assert_eq!(format_duration(Duration::from_secs(5400)), "1h30m");
        assert_eq!(format_duration(Duration::from_secs(86_400)), "1d");
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }
}
