//! Deciding when an organization's daily agenda is due
//!
//! Organizations store their timezone either as a UTC offset or as an IANA
//! region name. Region names are looked up in the `chrono-tz` database, so the
//! offset follows daylight-saving changes. Anything unparsable resolves to the
//! configured fallback offset.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Timelike, Utc};
use chrono_tz::Tz;
use log::warn;

/// Parses `UTC`, `Z`, `GMT`, `±HH:MM`, `±HHMM`, `±HH` and `UTC±H[:MM]` / `GMT±H[:MM]`.
pub fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let s = raw.trim();
    let upper = s.to_ascii_uppercase();
    if matches!(upper.as_str(), "UTC" | "Z" | "GMT") {
        return FixedOffset::east_opt(0);
    }
    let rest = upper
        .strip_prefix("UTC")
        .or_else(|| upper.strip_prefix("GMT"))
        .unwrap_or(&upper);

    let (sign, digits) = match rest.chars().next()? {
        '+' => (1, &rest[1..]),
        '-' => (-1, &rest[1..]),
        _ => return None,
    };

    if !digits.is_ascii() {
        return None;
    }
    let (hours, minutes) = if let Some((h, m)) = digits.split_once(':') {
        (h, m)
    } else if digits.len() == 4 {
        digits.split_at(2)
    } else {
        (digits, "0")
    };
    if hours.is_empty() || hours.len() > 2 || minutes.is_empty() || minutes.len() > 2 {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Offset in effect for an organization at `now_utc`.
///
/// Fixed offsets win over region names; the fallback is used when the
/// timezone is missing or neither form parses.
pub fn resolve_offset(timezone: Option<&str>, now_utc: DateTime<Utc>, fallback: FixedOffset) -> FixedOffset {
    let Some(tz) = timezone.map(str::trim).filter(|tz| !tz.is_empty()) else {
        return fallback;
    };
    if let Some(offset) = parse_offset(tz) {
        return offset;
    }
    match tz.parse::<Tz>() {
        Ok(zone) => now_utc.with_timezone(&zone).offset().fix(),
        Err(_) => {
            warn!("unrecognized timezone {:?}; using fallback offset {}", tz, fallback);
            fallback
        }
    }
}

/// Whether the local hour at `now_utc` equals `configured_hour`.
pub fn should_trigger(
    now_utc: DateTime<Utc>,
    timezone: Option<&str>,
    configured_hour: u32,
    fallback: FixedOffset,
) -> bool {
    let offset = resolve_offset(timezone, now_utc, fallback);
    now_utc.with_timezone(&offset).hour() == configured_hour
}

/// Local calendar date at `now_utc`, shifted by `day_offset` days.
pub fn local_date(now_utc: DateTime<Utc>, offset: FixedOffset, day_offset: i64) -> NaiveDate {
    let today = now_utc.with_timezone(&offset).date_naive();
    today
        .checked_add_signed(Duration::days(day_offset))
        .unwrap_or(today)
}
