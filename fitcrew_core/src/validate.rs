//! Final validation: normalize every phase, enforce the budget, and build
//! the finished workout.

use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::error::{GenerationError, Stage};
use crate::exercise::{normalize_main, normalize_modifications, rebalance_main, MIN_BLOCK_SECONDS};
use crate::phase::{normalize_phase, MIN_PHASE_ITEM_SECONDS};
use crate::synthesis::DraftPayload;
use crate::types::*;

/// Duration given to a warmup/cooldown item that states none
const DEFAULT_PHASE_ITEM_SECONDS: u32 = 60;

fn empty_phase(phase: &str) -> GenerationError {
    GenerationError::Structural {
        stage: Stage::Validation,
        message: format!("{} phase is empty after normalization", phase),
    }
}

/// Object entries of a raw phase, keeping only as many as `budget` can hold
/// at `floor` seconds each
fn fitting_entries(raw: &[Value], budget: u32, floor: u32, phase: &str) -> Vec<Value> {
    let limit = (budget / floor).max(1) as usize;
    let mut entries: Vec<Value> = raw.iter().filter(|e| e.is_object()).cloned().collect();
    if entries.len() > limit {
        tracing::warn!(
            phase,
            budget,
            dropped = entries.len() - limit,
            "too many entries for the phase budget"
        );
        entries.truncate(limit);
    }
    entries
}

/// Turn a draft into a duration-exact workout.
///
/// Fails with a validation error when a phase is empty or when the phase
/// floors leave the session off its planned total.
pub fn finalize(
    request: &GenerationRequest,
    plan: &MacroPlan,
    draft: DraftPayload,
    contributions: &[AgentContribution],
) -> Result<FinalWorkout, GenerationError> {
    let budget = plan.phase_allocation;

    let warmup_entries =
        fitting_entries(&draft.warmup, budget.warmup, MIN_PHASE_ITEM_SECONDS, "warmup");
    let (warmup, warmup_seconds) =
        normalize_phase(&warmup_entries, DEFAULT_PHASE_ITEM_SECONDS, Some(budget.warmup));
    if warmup.is_empty() {
        return Err(empty_phase("warmup"));
    }

    let main_entries = fitting_entries(&draft.main, budget.main, MIN_BLOCK_SECONDS, "main");
    let (mut main, mut main_seconds) =
        normalize_main(&main_entries, request.difficulty, Some(budget.main));
    if main.is_empty() {
        return Err(empty_phase("main"));
    }
    if main_seconds != budget.main {
        main_seconds = rebalance_main(&mut main, budget.main);
    }

    let cooldown_entries =
        fitting_entries(&draft.cooldown, budget.cooldown, MIN_PHASE_ITEM_SECONDS, "cooldown");
    let (cooldown, cooldown_seconds) =
        normalize_phase(&cooldown_entries, DEFAULT_PHASE_ITEM_SECONDS, Some(budget.cooldown));
    if cooldown.is_empty() {
        return Err(empty_phase("cooldown"));
    }

    let breakdown = PhaseBreakdown {
        warmup: warmup_seconds,
        main: main_seconds,
        cooldown: cooldown_seconds,
    };
    let total = breakdown.total();
    if total != budget.total() {
        return Err(GenerationError::Structural {
            stage: Stage::Validation,
            message: format!(
                "session totals {}s but the plan allocates {}s",
                total,
                budget.total()
            ),
        });
    }

    let reported_minutes = (total as f64 / 60.0).round() as u32;
    let equipment_needed = owned_equipment(request, &draft, &warmup, &main, &cooldown);
    let modifications = normalize_modifications(Some(&Value::Object(draft.modifications)));
    let agent_attribution: BTreeMap<String, ContributionType> = contributions
        .iter()
        .map(|c| (c.source.clone(), c.contribution_type))
        .collect();

    tracing::info!(
        warmup = warmup.len(),
        main = main.len(),
        cooldown = cooldown.len(),
        total_seconds = total,
        "Finalized workout"
    );

    Ok(FinalWorkout {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        name: format!(
            "{}-Minute {} Workout",
            request.duration_minutes,
            request.workout_type.title()
        ),
        summary: draft.summary.unwrap_or_else(|| default_summary(request)),
        workout_type: request.workout_type,
        difficulty: request.difficulty,
        duration_minutes: request.duration_minutes.max(reported_minutes),
        warmup,
        main,
        cooldown,
        equipment_needed,
        safety_notes: draft.safety_notes,
        modifications,
        total_estimated_duration_seconds: total,
        phase_duration_breakdown: breakdown,
        estimated_calories: request
            .duration_minutes
            .saturating_mul(request.difficulty.calorie_rate()),
        agent_attribution,
    })
}

fn default_summary(request: &GenerationRequest) -> String {
    format!(
        "A {}-minute {} {} session focused on {}.",
        request.duration_minutes,
        request.difficulty,
        request.workout_type,
        request.focus_areas_or_default().join(", ").replace('_', " ")
    )
}

/// Equipment mentioned anywhere in the session, kept only when the user owns it.
///
/// Owned items use the user's own spelling; the set is never empty.
fn owned_equipment(
    request: &GenerationRequest,
    draft: &DraftPayload,
    warmup: &[NormalizedPhaseItem],
    main: &[NormalizedMainExercise],
    cooldown: &[NormalizedPhaseItem],
) -> BTreeSet<String> {
    let user = &request.user_context;
    let mentioned = draft
        .equipment
        .iter()
        .map(String::as_str)
        .chain(main.iter().map(|e| e.equipment.as_str()))
        .chain(
            warmup
                .iter()
                .chain(cooldown.iter())
                .filter_map(|i| i.equipment.as_deref()),
        )
        .flat_map(|text| text.split(','))
        .map(str::trim)
        .filter(|item| !item.is_empty());

    let mut owned = BTreeSet::new();
    for item in mentioned {
        let tag = canonical_tag(item);
        if tag == "bodyweight" {
            owned.insert("bodyweight".to_string());
        } else if let Some(spelling) = user
            .available_equipment
            .iter()
            .find(|e| canonical_tag(e) == tag)
        {
            owned.insert(spelling.trim().to_string());
        } else {
            tracing::debug!(item, "dropping equipment the user does not own");
        }
    }

    if owned.is_empty() {
        owned.insert("bodyweight".to_string());
    }
    owned
}
