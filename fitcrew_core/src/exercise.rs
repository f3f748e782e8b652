//! Main-phase exercise normalization and rebalancing.
//!
//! Every exercise is either repetition-based or time-based, never both.
//! Block durations are what the main-phase budget is measured in.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::duration::{first_duration, fit_to_target, scale_floor};
use crate::fields::{
    equipment_text, first_string_list, first_text, leading_integer, positive_count,
};
use crate::types::{Difficulty, Modification, NormalizedMainExercise, SetTarget};

/// No exercise block is rescaled below this
pub const MIN_BLOCK_SECONDS: u32 = 60;

/// Shortest rest between sets
pub const MIN_REST_SECONDS: u32 = 15;

/// Shortest timed work interval after rescaling
const MIN_WORK_SECONDS: u32 = 15;

/// Work interval when a timed exercise gives none
const DEFAULT_WORK_SECONDS: u32 = 45;

/// Seconds per repetition when only reps are known
const SECONDS_PER_REP: u32 = 4;

/// Bounds on the scale factor applied by [`rebalance_main`]
const REBALANCE_MIN_SCALE: f64 = 0.75;
const REBALANCE_MAX_SCALE: f64 = 1.25;

const WORK_KEYS: &[&str] = &[
    "work_seconds",
    "work_interval_seconds",
    "duration",
    "duration_seconds_per_set",
    "duration_seconds",
];

/// Canonicalize raw main exercises and fit their blocks to `target_total`.
///
/// Returns the exercises and their achieved total block duration.
pub fn normalize_main(
    raw_exercises: &[Value],
    difficulty: Difficulty,
    target_total: Option<u32>,
) -> (Vec<NormalizedMainExercise>, u32) {
    let mut exercises: Vec<NormalizedMainExercise> = raw_exercises
        .iter()
        .filter_map(Value::as_object)
        .map(|raw| normalize_exercise(raw, difficulty))
        .collect();

    let raw_total = block_total(&exercises);
    let achieved = match target_total {
        Some(target) if raw_total > 0 => {
            let scale = target as f64 / raw_total as f64;
            rescale(&mut exercises, target, scale)
        }
        _ => raw_total.min(u32::MAX as u64) as u32,
    };

    tracing::debug!(
        exercises = exercises.len(),
        raw_total,
        achieved,
        target = ?target_total,
        "normalized main phase"
    );
    (exercises, achieved)
}

/// Pull an already-normalized list toward a new target.
///
/// The proportional step is clamped to [0.75, 1.25]; drift correction then
/// closes the remaining gap one second at a time.
pub fn rebalance_main(exercises: &mut [NormalizedMainExercise], target: u32) -> u32 {
    let current = block_total(exercises);
    if exercises.is_empty() || current == target as u64 {
        return current.min(u32::MAX as u64) as u32;
    }

    let scale = if current == 0 {
        REBALANCE_MAX_SCALE
    } else {
        (target as f64 / current as f64).clamp(REBALANCE_MIN_SCALE, REBALANCE_MAX_SCALE)
    };
    tracing::debug!(current, target, scale, "rebalancing main phase");
    rescale(exercises, target, scale)
}

fn block_total(exercises: &[NormalizedMainExercise]) -> u64 {
    exercises
        .iter()
        .map(|e| e.block_duration_seconds as u64)
        .sum()
}

fn rescale(exercises: &mut [NormalizedMainExercise], target: u32, scale: f64) -> u32 {
    for exercise in exercises.iter_mut() {
        exercise.block_duration_seconds =
            scale_floor(exercise.block_duration_seconds, scale, MIN_BLOCK_SECONDS);
        if let SetTarget::WorkSeconds(work) = exercise.target {
            let work = scale_floor(work, scale, MIN_WORK_SECONDS);
            exercise.target = SetTarget::WorkSeconds(work);
            exercise.set_duration_seconds = work;
        }
    }
    fit_to_target(exercises, target, MIN_BLOCK_SECONDS, |e| {
        &mut e.block_duration_seconds
    })
}

fn normalize_exercise(raw: &Map<String, Value>, difficulty: Difficulty) -> NormalizedMainExercise {
    let sets = ["sets", "rounds"]
        .iter()
        .find_map(|k| raw.get(*k).and_then(positive_count))
        .unwrap_or(1);
    let reps = ["reps", "rep_range", "rep_count"]
        .iter()
        .find_map(|k| raw.get(*k).and_then(leading_integer));
    let work = first_duration(raw, WORK_KEYS);

    let (target, set_duration_seconds) = match reps {
        None => {
            let work = work.unwrap_or(DEFAULT_WORK_SECONDS);
            (SetTarget::WorkSeconds(work), work)
        }
        Some(reps) => (
            SetTarget::Reps(reps),
            work.unwrap_or_else(|| reps.saturating_mul(SECONDS_PER_REP)),
        ),
    };

    let rest_seconds = first_duration(raw, &["rest_seconds", "rest_interval_seconds", "rest"])
        .unwrap_or_else(|| difficulty.default_rest_seconds())
        .max(MIN_REST_SECONDS);

    let block_duration_seconds = first_duration(raw, &["block_duration_seconds"])
        .unwrap_or_else(|| {
            sets.saturating_mul(set_duration_seconds)
                .saturating_add(rest_seconds.saturating_mul(sets - 1))
        });

    NormalizedMainExercise {
        name: first_text(raw, &["name", "title", "exercise"]).unwrap_or_else(|| "Exercise".into()),
        sets,
        target,
        set_duration_seconds,
        rest_seconds,
        equipment: equipment_text(raw, &["equipment", "equipment_needed"])
            .unwrap_or_else(|| "bodyweight".into()),
        target_muscles: first_string_list(raw, &["target_muscles", "muscles", "muscle_groups"]),
        instructions: first_text(raw, &["instructions", "description", "notes"])
            .unwrap_or_default(),
        coaching_cues: first_string_list(raw, &["coaching_cues", "cues"]),
        impact_level: first_text(raw, &["impact_level", "impact"]).and_then(|i| i.parse().ok()),
        intensity: first_text(raw, &["intensity", "intensity_focus"]),
        tempo: first_text(raw, &["tempo"]),
        block_duration_seconds,
    }
}

/// Canonicalize a raw modifications mapping.
///
/// An object becomes one record, a list keeps its entries, and a scalar
/// becomes a record holding only a description. Entries without any
/// description are dropped.
pub fn normalize_modifications(raw: Option<&Value>) -> BTreeMap<String, Vec<Modification>> {
    let mut normalized = BTreeMap::new();
    let Some(Value::Object(entries)) = raw else {
        return normalized;
    };

    for (name, value) in entries {
        let records: Vec<Modification> = match value {
            Value::Array(items) => items.iter().filter_map(modification_record).collect(),
            other => modification_record(other).into_iter().collect(),
        };
        let name = name.trim();
        if !name.is_empty() && !records.is_empty() {
            normalized
                .entry(name.to_string())
                .or_insert_with(Vec::new)
                .extend(records);
        }
    }
    normalized
}

fn modification_record(value: &Value) -> Option<Modification> {
    match value {
        Value::Object(map) => Some(Modification {
            description: first_text(
                map,
                &["description", "modification", "alternative", "notes"],
            )?,
            equipment: equipment_text(map, &["equipment"]),
            impact: first_text(map, &["impact", "impact_level"]),
        }),
        Value::String(s) if !s.trim().is_empty() => Some(Modification {
            description: s.trim().to_string(),
            equipment: None,
            impact: None,
        }),
        Value::Number(n) => Some(Modification {
            description: n.to_string(),
            equipment: None,
            impact: None,
        }),
        _ => None,
    }
}
