//! ISO-8601 durations in the `PnDTnHnMn.nS` form.
//!
//! Only days, hours, minutes and (fractional) seconds are accepted, each
//! optionally signed, with an optional leading sign on the whole value.
//! Years, months and weeks are rejected since they have no fixed length.

use std::sync::OnceLock;

use chrono::Duration;
use regex::Regex;

use crate::error::{Cdoc2Error, Cdoc2Result};

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^([-+]?)P(?:([-+]?[0-9]+)D)?(T(?:([-+]?[0-9]+)H)?(?:([-+]?[0-9]+)M)?(?:([-+]?[0-9]+)(?:[.,]([0-9]{0,9}))?S)?)?$",
        )
        .unwrap_or_else(|e| unreachable!("duration pattern is valid: {e}"))
    })
}

/// Parse an ISO-8601 duration such as `P1095D`, `PT24H` or `-PT1.5S`.
pub fn parse_duration(text: &str) -> Cdoc2Result<Duration> {
    let invalid = || Cdoc2Error::Config(format!("invalid ISO-8601 duration: '{text}'"));

    let caps = pattern().captures(text.trim()).ok_or_else(invalid)?;

    let days = caps.get(2);
    let time = caps.get(3);
    let hours = caps.get(4);
    let minutes = caps.get(5);
    let seconds = caps.get(6);
    let fraction = caps.get(7);

    // "P" and "PT" alone are not durations
    if days.is_none() && time.is_none() {
        return Err(invalid());
    }
    if time.is_some() && hours.is_none() && minutes.is_none() && seconds.is_none() {
        return Err(invalid());
    }

    let number = |m: Option<regex::Match<'_>>| -> Cdoc2Result<i64> {
        match m {
            Some(m) => m.as_str().parse::<i64>().map_err(|_| invalid()),
            None => Ok(0),
        }
    };

    let secs = number(seconds)?;
    let nanos = match fraction {
        Some(f) if !f.as_str().is_empty() => {
            let digits = f.as_str();
            let padded = format!("{digits:0<9}");
            let n = padded.parse::<i64>().map_err(|_| invalid())?;
            if seconds.is_some_and(|s| s.as_str().starts_with('-')) {
                -n
            } else {
                n
            }
        }
        _ => 0,
    };

    let (days, hours, minutes) = (number(days)?, number(hours)?, number(minutes)?);

    let total = Duration::try_days(days)
        .and_then(|d| d.checked_add(&Duration::try_hours(hours)?))
        .and_then(|d| d.checked_add(&Duration::try_minutes(minutes)?))
        .and_then(|d| d.checked_add(&Duration::try_seconds(secs)?))
        .and_then(|d| d.checked_add(&Duration::nanoseconds(nanos)))
        .ok_or_else(|| Cdoc2Error::Config(format!("duration out of range: '{text}'")))?;

    if caps.get(1).is_some_and(|s| s.as_str() == "-") {
        Ok(-total)
    } else {
        Ok(total)
    }
}
