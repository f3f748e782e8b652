//! Duration parsing and exact-budget rescaling.
//!
//! Collaborators report durations as integers, floats or free text
//! ("45 sec", "2 min", "1.5 hours"). Everything is converted to whole
//! seconds here; a value that cannot be read yields `None` and the caller
//! substitutes its own default.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("valid regex"));

/// Parse an untrusted duration value into seconds.
///
/// Numbers are floored at zero and truncated. Strings use the first decimal
/// number found; "hour"/"hr" multiplies by 3600, "min" by 60, anything else
/// is taken as seconds.
pub fn parse_duration(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_f64().map(seconds_from_f64),
        Value::String(s) => parse_duration_str(s),
        _ => None,
    }
}

/// String form of [`parse_duration`]
pub fn parse_duration_str(text: &str) -> Option<u32> {
    let lowered = text.trim().to_lowercase();
    let amount: f64 = NUMBER.captures(&lowered)?.get(1)?.as_str().parse().ok()?;

    let seconds = if lowered.contains("hour") || lowered.contains("hr") {
        amount * 3600.0
    } else if lowered.contains("min") {
        amount * 60.0
    } else {
        amount
    };
    Some(seconds_from_f64(seconds.round()))
}

fn seconds_from_f64(value: f64) -> u32 {
    // `as` saturates, so absurd values clamp to u32::MAX
    value.max(0.0) as u32
}

/// First field in `keys` holding a positive duration.
///
/// Zero is treated like an unparseable value.
pub fn first_duration(raw: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    keys.iter()
        .filter_map(|k| raw.get(*k))
        .filter_map(parse_duration)
        .find(|secs| *secs > 0)
}

/// Like [`first_duration`] for a field expressed in minutes.
///
/// Bare numbers are minutes; text carrying its own unit keeps that unit.
pub fn minutes_field(raw: &Map<String, Value>, key: &str) -> Option<u32> {
    let secs = match raw.get(key)? {
        Value::Number(n) => n.as_f64().map(|m| seconds_from_f64((m * 60.0).round())),
        Value::String(s) => {
            let lowered = s.to_lowercase();
            let has_unit = ["hour", "hr", "min", "sec"].iter().any(|u| lowered.contains(u));
            let parsed = parse_duration_str(s)?;
            Some(if has_unit { parsed } else { parsed.saturating_mul(60) })
        }
        _ => None,
    }?;
    (secs > 0).then_some(secs)
}

/// Scale `value` by `scale`, flooring to whole seconds, never below `floor`
pub(crate) fn scale_floor(value: u32, scale: f64, floor: u32) -> u32 {
    seconds_from_f64((value as f64 * scale).floor()).max(floor)
}

/// One-second-at-a-time drift correction.
///
/// Visits items cyclically, at most `max_visits` times, nudging each by one
/// second toward `target` without going below `floor`. Returns the achieved
/// sum, which equals `target` whenever the visit budget allows.
pub(crate) fn correct_drift<T>(
    items: &mut [T],
    target: u32,
    floor: u32,
    max_visits: usize,
    mut seconds: impl FnMut(&mut T) -> &mut u32,
) -> u32 {
    let mut total: i64 = items.iter_mut().map(|i| *seconds(i) as i64).sum();
    if items.is_empty() {
        return 0;
    }

    let mut difference = target as i64 - total;
    let mut visits = 0;
    while difference != 0 && visits < max_visits {
        let slot = seconds(&mut items[visits % items.len()]);
        if difference > 0 {
            *slot += 1;
            total += 1;
            difference -= 1;
        } else if *slot > floor {
            *slot -= 1;
            total -= 1;
            difference += 1;
        }
        visits += 1;
    }

    if difference != 0 {
        tracing::debug!(target, achieved = total, "drift correction stopped short of target");
    }
    total as u32
}

/// [`correct_drift`] with a visit budget large enough to reach `target`
/// whenever the floors leave room for it.
pub(crate) fn fit_to_target<T>(
    items: &mut [T],
    target: u32,
    floor: u32,
    mut seconds: impl FnMut(&mut T) -> &mut u32,
) -> u32 {
    let current: i64 = items.iter_mut().map(|i| *seconds(i) as i64).sum();
    let passes = (target as i64 - current).unsigned_abs() as usize + 2;
    correct_drift(items, target, floor, passes * items.len(), seconds)
}
