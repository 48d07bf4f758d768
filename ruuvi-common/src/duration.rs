//! Human-readable durations (`500ms`, `5s`, `1m30s`, `2h`).
//!
//! The notation is the one used by Go's `time.ParseDuration`: a sequence of
//! decimal numbers each followed by a unit (`ns`, `us`/`µs`, `ms`, `s`, `m`,
//! `h`). A bare `0` is accepted; any other number needs a unit.
//!
//! The module doubles as a serde adapter:
//!
//! ```ignore
//! #[derive(Deserialize, Serialize)]
//! struct Settings {
//!     #[serde(with = "ruuvi_common::duration")]
//!     interval: Duration,
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

use crate::error::{Error, Result};

const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Parse a duration such as `5s`, `1m30s` or `250ms`.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use ruuvi_common::duration::parse_duration;
///
/// assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
/// assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
/// ```
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return Err(invalid(input, "empty duration"));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut rest = s;
    let mut total: u128 = 0;

    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_end);
        if number.is_empty() || number == "." {
            return Err(invalid(input, "expected a number"));
        }

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);
        let unit_nanos = unit_to_nanos(unit).ok_or_else(|| {
            if unit.is_empty() {
                invalid(input, "missing unit")
            } else {
                invalid(input, &format!("unknown unit '{}'", unit))
            }
        })?;

        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if frac_part.contains('.') {
            return Err(invalid(input, "malformed number"));
        }

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| invalid(input, "number out of range"))?
        };
        let mut nanos = whole
            .checked_mul(unit_nanos)
            .ok_or_else(|| invalid(input, "overflow"))?;

        // Digits past nanosecond resolution carry no information.
        let frac = &frac_part[..frac_part.len().min(18)];
        if !frac.is_empty() {
            let digits: u128 = frac
                .parse()
                .map_err(|_| invalid(input, "malformed fraction"))?;
            nanos += digits * unit_nanos / 10u128.pow(frac.len() as u32);
        }

        total = total
            .checked_add(nanos)
            .ok_or_else(|| invalid(input, "overflow"))?;
        rest = next;
    }

    let nanos = u64::try_from(total).map_err(|_| invalid(input, "overflow"))?;
    Ok(Duration::from_nanos(nanos))
}

/// Format a duration in the notation accepted by [`parse_duration`].
///
/// # Example
/// ```
/// use std::time::Duration;
/// use ruuvi_common::duration::format_duration;
///
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1s500ms");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }

    let secs = nanos / NANOS_PER_SEC;
    let sub = nanos % NANOS_PER_SEC;
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    if seconds > 0 {
        out.push_str(&format!("{}s", seconds));
    }
    if sub > 0 {
        if sub % NANOS_PER_MILLI == 0 {
            out.push_str(&format!("{}ms", sub / NANOS_PER_MILLI));
        } else {
            out.push_str(&format!("{}ns", sub));
        }
    }
    out
}

/// Serde serializer for `#[serde(with = "ruuvi_common::duration")]`.
pub fn serialize<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_duration(*duration))
}

/// Serde deserializer for `#[serde(with = "ruuvi_common::duration")]`.
pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Duration, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

fn unit_to_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" => Some(1_000),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3600 * NANOS_PER_SEC),
        _ => None,
    }
}

fn invalid(input: &str, reason: &str) -> Error {
    Error::Duration {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}
