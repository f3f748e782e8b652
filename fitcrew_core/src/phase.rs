//! Warmup and cooldown normalization.

use serde_json::{Map, Value};

use crate::duration::{first_duration, fit_to_target, minutes_field, scale_floor};
use crate::fields::{equipment_text, first_string_list, first_text};
use crate::types::NormalizedPhaseItem;

/// No warmup or cooldown item is rescaled below this
pub const MIN_PHASE_ITEM_SECONDS: u32 = 20;

/// Canonicalize raw phase items and fit their durations to `target_total`.
///
/// Non-object entries are skipped. Durations come from `duration_seconds`,
/// then `duration_minutes`, then `duration`; when none parses the item gets
/// `default_duration`. Returns the items and their achieved total.
pub fn normalize_phase(
    raw_items: &[Value],
    default_duration: u32,
    target_total: Option<u32>,
) -> (Vec<NormalizedPhaseItem>, u32) {
    let mut items: Vec<NormalizedPhaseItem> = raw_items
        .iter()
        .filter_map(Value::as_object)
        .map(|raw| normalize_item(raw, default_duration))
        .collect();

    let raw_total: u64 = items.iter().map(|i| i.duration_seconds as u64).sum();
    let achieved = match target_total {
        Some(target) if raw_total > 0 => {
            let scale = target as f64 / raw_total as f64;
            for item in items.iter_mut() {
                item.duration_seconds =
                    scale_floor(item.duration_seconds, scale, MIN_PHASE_ITEM_SECONDS);
            }
            fit_to_target(&mut items, target, MIN_PHASE_ITEM_SECONDS, |i| {
                &mut i.duration_seconds
            })
        }
        _ => raw_total.min(u32::MAX as u64) as u32,
    };

    tracing::debug!(
        items = items.len(),
        raw_total,
        achieved,
        target = ?target_total,
        "normalized phase"
    );
    (items, achieved)
}

fn normalize_item(raw: &Map<String, Value>, default_duration: u32) -> NormalizedPhaseItem {
    let duration_seconds = first_duration(raw, &["duration_seconds"])
        .or_else(|| minutes_field(raw, "duration_minutes"))
        .or_else(|| first_duration(raw, &["duration"]))
        .unwrap_or(default_duration);

    NormalizedPhaseItem {
        name: first_text(raw, &["name", "title"]).unwrap_or_else(|| "Exercise".into()),
        duration_seconds,
        description: first_text(raw, &["instructions", "description", "notes"])
            .unwrap_or_default(),
        focus: first_text(raw, &["focus", "target_area"]),
        intensity: first_text(raw, &["intensity"]),
        equipment: equipment_text(raw, &["equipment", "equipment_needed"]),
        coaching_cues: first_string_list(raw, &["coaching_cues", "cues"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(value: Value) -> Vec<Value> {
        value.as_array().cloned().unwrap()
    }

    #[test]
    fn test_fields_and_defaults() {
        let raw = items(json!([
            {"title": "Arm Circles", "duration": "1 min", "cues": "Relax", "target_area": "shoulders"},
            {"duration_seconds": 0, "description": "Anything"},
            "not an object",
            {"name": "Cat-Cow", "duration_minutes": 2, "equipment": ["mat"], "coaching_cues": ["Slow"]}
        ]));
        let (normalized, achieved) = normalize_phase(&raw, 45, None);

        assert_eq!(normalized.len(), 3);
        assert_eq!(normalized[0].name, "Arm Circles");
        assert_eq!(normalized[0].duration_seconds, 60);
        assert_eq!(normalized[0].coaching_cues, vec!["Relax"]);
        assert_eq!(normalized[0].focus.as_deref(), Some("shoulders"));

        assert_eq!(normalized[1].name, "Exercise");
        assert_eq!(normalized[1].duration_seconds, 45);
        assert_eq!(normalized[1].description, "Anything");

        assert_eq!(normalized[2].duration_seconds, 120);
        assert_eq!(normalized[2].equipment.as_deref(), Some("mat"));
        assert_eq!(achieved, 225);
    }

    #[test]
    fn test_seconds_field_wins_over_minutes() {
        let raw = items(json!([{"duration_seconds": 30, "duration_minutes": 5, "duration": 600}]));
        let (normalized, _) = normalize_phase(&raw, 45, None);
        assert_eq!(normalized[0].duration_seconds, 30);
    }

    #[test]
    fn test_rescale_hits_target_exactly() {
        let raw = items(json!([
            {"name": "A", "duration_seconds": 100},
            {"name": "B", "duration_seconds": 100},
            {"name": "C", "duration_seconds": 100}
        ]));
        let (normalized, achieved) = normalize_phase(&raw, 45, Some(324));
        assert_eq!(achieved, 324);
        assert_eq!(normalized.iter().map(|i| i.duration_seconds).sum::<u32>(), 324);
    }

    #[test]
    fn test_rescale_respects_floor() {
        let raw = items(json!([
            {"name": "Long", "duration_seconds": 1000},
            {"name": "Short", "duration_seconds": 5}
        ]));
        let (normalized, achieved) = normalize_phase(&raw, 45, Some(300));
        assert!(normalized.iter().all(|i| i.duration_seconds >= MIN_PHASE_ITEM_SECONDS));
        assert_eq!(achieved, 300);
    }

    #[test]
    fn test_floor_applies_when_sum_already_matches() {
        let raw = items(json!([
            {"name": "Jog", "duration_seconds": 319},
            {"name": "Arm Swings", "duration_seconds": 5}
        ]));
        let (normalized, achieved) = normalize_phase(&raw, 60, Some(324));
        assert_eq!(achieved, 324);
        assert_eq!(normalized[0].duration_seconds, 304);
        assert_eq!(normalized[1].duration_seconds, MIN_PHASE_ITEM_SECONDS);
    }

    #[test]
    fn test_empty_phase() {
        let (normalized, achieved) = normalize_phase(&[], 45, Some(300));
        assert!(normalized.is_empty());
        assert_eq!(achieved, 0);
    }
}
