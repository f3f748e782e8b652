//! Macro planning: split the session into phase budgets and main blocks.
//!
//! The heuristic plan is pure and always available. When a planning
//! collaborator is registered its answer is coerced into the same shape;
//! anything unusable falls back to the heuristic plan.

use serde_json::{Map, Value};

use crate::briefs;
use crate::collaborator::{CollaboratorKind, CollaboratorSet};
use crate::config::GenerationConfig;
use crate::duration::{fit_to_target, parse_duration, scale_floor};
use crate::fields::{first_text, positive_count, string_list};
use crate::types::*;

/// Phase floors applied when coercing an external allocation
const MIN_EDGE_PHASE_SECONDS: u32 = 60;
const MIN_MAIN_PHASE_SECONDS: u32 = 120;

/// Smallest block the coercion will produce when the budget allows it
const MIN_BLOCK_SECONDS: u32 = 60;

const MAX_BLOCKS: usize = 4;

/// Deterministic plan derived from the request alone
pub fn heuristic_plan(request: &GenerationRequest) -> MacroPlan {
    let total = request.total_seconds();
    let phase_allocation = heuristic_allocation(total);

    let focus = request.focus_areas_or_default();
    let block_count = focus.len().clamp(2, 3) as u32;
    let base = phase_allocation.main / block_count;
    let remainder = phase_allocation.main % block_count;
    let modalities = modality_cycle(request.workout_type);

    let main_blocks = (0..block_count)
        .map(|i| {
            let area = &focus[i as usize % focus.len()];
            let modality = modalities[i as usize % modalities.len()];
            let duration_seconds = base + u32::from(i < remainder);
            heuristic_block(request, area, modality, duration_seconds)
        })
        .collect();

    MacroPlan {
        phase_allocation,
        warmup_focus: vec!["mobility".into(), "activation".into()],
        main_blocks,
        cooldown_focus: vec!["breathing".into(), "flexibility".into()],
        notes: vec![format!(
            "Heuristic {}-minute {} plan",
            request.duration_minutes, request.workout_type
        )],
        source: PlanSource::Heuristic,
    }
}

fn heuristic_allocation(total: u32) -> PhaseAllocation {
    let share = total * 12 / 100;
    let mut warmup = share.clamp(240, 480);
    let mut cooldown = share.clamp(240, 540);
    if total.saturating_sub(warmup + cooldown) < MIN_MAIN_PHASE_SECONDS {
        warmup = total / 10;
        cooldown = total / 10;
    }
    PhaseAllocation {
        warmup,
        main: total - warmup - cooldown,
        cooldown,
    }
}

fn modality_cycle(workout_type: WorkoutType) -> &'static [Modality] {
    match workout_type {
        WorkoutType::Strength => &[Modality::Strength],
        WorkoutType::Cardio => &[Modality::Cardio],
        WorkoutType::Mixed | WorkoutType::Hiit => &[Modality::Strength, Modality::Cardio],
        WorkoutType::Flexibility => &[Modality::Mobility],
    }
}

fn heuristic_block(
    request: &GenerationRequest,
    area: &str,
    modality: Modality,
    duration_seconds: u32,
) -> MainBlock {
    MainBlock {
        name: format!("{} {} Block", title_case(area), title_case(modality.as_str())),
        focus_areas: vec![area.to_string()],
        modality,
        duration_seconds,
        sets: Some(3),
        rep_scheme: (modality == Modality::Strength).then(|| "8-12".to_string()),
        interval_style: matches!(modality, Modality::Cardio | Modality::Mixed)
            .then(|| "45s work / 15s rest".to_string()),
        target_intensity: "moderate-hard".into(),
        rest_seconds: 45,
        impact_level: request.default_impact(),
        equipment_bias: request.default_equipment_bias().into(),
        coaching_priority: "Maintain form, control tempo".into(),
    }
}

fn title_case(tag: &str) -> String {
    tag.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Force a planning collaborator's answer into an exact plan.
///
/// Returns `None` when the answer has no usable main blocks. Feeding a
/// coerced plan back in yields the same plan.
pub fn coerce_plan(raw: &Map<String, Value>, request: &GenerationRequest) -> Option<MacroPlan> {
    let raw_blocks: Vec<&Map<String, Value>> = raw
        .get("main_blocks")
        .and_then(Value::as_array)?
        .iter()
        .filter_map(Value::as_object)
        .take(MAX_BLOCKS)
        .collect();
    if raw_blocks.is_empty() {
        return None;
    }

    let phase_allocation = coerce_allocation(raw.get("phase_allocation"), request.total_seconds());
    let fallback_duration = (phase_allocation.main / raw_blocks.len() as u32).max(300);
    let mut main_blocks: Vec<MainBlock> = raw_blocks
        .iter()
        .enumerate()
        .map(|(i, block)| coerce_block(block, i, request, fallback_duration))
        .collect();
    fit_blocks(&mut main_blocks, phase_allocation.main);

    Some(MacroPlan {
        phase_allocation,
        warmup_focus: string_list(raw.get("warmup_focus"))
            .unwrap_or_else(|| vec!["mobility".into(), "activation".into()]),
        main_blocks,
        cooldown_focus: string_list(raw.get("cooldown_focus"))
            .unwrap_or_else(|| vec!["breathing".into(), "flexibility".into()]),
        notes: string_list(raw.get("notes")).unwrap_or_default(),
        source: PlanSource::Collaborator,
    })
}

/// Rescale an allocation so it sums to `total` with every phase above its floor.
///
/// The uniform scale's rounding remainder lands on cooldown; if that leaves
/// cooldown under its floor the shortfall is taken from main, then warmup.
fn coerce_allocation(raw: Option<&Value>, total: u32) -> PhaseAllocation {
    let field = |key: &str| {
        raw.and_then(|v| v.get(key))
            .and_then(parse_duration)
            .filter(|secs| *secs > 0)
    };
    let warmup = field("warmup").unwrap_or(total * 12 / 100);
    let main = field("main").unwrap_or(total * 76 / 100);
    let cooldown = field("cooldown").unwrap_or(total * 12 / 100);

    let sum = warmup as u64 + main as u64 + cooldown as u64;
    if sum == total as u64
        && warmup >= MIN_EDGE_PHASE_SECONDS
        && main >= MIN_MAIN_PHASE_SECONDS
        && cooldown >= MIN_EDGE_PHASE_SECONDS
    {
        return PhaseAllocation {
            warmup,
            main,
            cooldown,
        };
    }

    let scale = total as f64 / sum as f64;
    let mut warmup = ((warmup as f64 * scale).round() as i64).max(MIN_EDGE_PHASE_SECONDS as i64);
    let mut main = ((main as f64 * scale).round() as i64).max(MIN_MAIN_PHASE_SECONDS as i64);
    let mut cooldown = total as i64 - warmup - main;

    if cooldown < MIN_EDGE_PHASE_SECONDS as i64 {
        let mut shortfall = MIN_EDGE_PHASE_SECONDS as i64 - cooldown;
        let from_main = shortfall.min(main - MIN_MAIN_PHASE_SECONDS as i64);
        main -= from_main;
        shortfall -= from_main;
        warmup -= shortfall.min(warmup - MIN_EDGE_PHASE_SECONDS as i64);
        cooldown = total as i64 - warmup - main;
    }

    tracing::debug!(warmup, main, cooldown, total, "coerced phase allocation");
    PhaseAllocation {
        warmup: warmup as u32,
        main: main as u32,
        cooldown: cooldown as u32,
    }
}

fn coerce_block(
    raw: &Map<String, Value>,
    index: usize,
    request: &GenerationRequest,
    fallback_duration: u32,
) -> MainBlock {
    let default_modality = request
        .workout_type
        .as_str()
        .parse()
        .unwrap_or(Modality::Mixed);
    let modality = first_text(raw, &["modality"])
        .and_then(|m| m.parse().ok())
        .unwrap_or(default_modality);

    MainBlock {
        name: first_text(raw, &["name"]).unwrap_or_else(|| format!("Block {}", index + 1)),
        focus_areas: string_list(raw.get("focus_areas"))
            .unwrap_or_else(|| request.focus_areas_or_default()),
        modality,
        duration_seconds: raw
            .get("duration_seconds")
            .and_then(parse_duration)
            .filter(|secs| *secs > 0)
            .unwrap_or(fallback_duration),
        sets: raw.get("sets").and_then(positive_count),
        rep_scheme: first_text(raw, &["rep_scheme"]),
        interval_style: first_text(raw, &["interval_style"]),
        target_intensity: first_text(raw, &["target_intensity"])
            .unwrap_or_else(|| "moderate".into()),
        rest_seconds: raw
            .get("rest_seconds")
            .and_then(parse_duration)
            .unwrap_or(45),
        impact_level: first_text(raw, &["impact_level"])
            .and_then(|i| i.parse().ok())
            .unwrap_or_else(|| request.default_impact()),
        equipment_bias: first_text(raw, &["equipment_bias"])
            .unwrap_or_else(|| request.default_equipment_bias().into()),
        coaching_priority: first_text(raw, &["coaching_priority"])
            .unwrap_or_else(|| "Maintain impeccable form and breathing".into()),
    }
}

/// Make block durations sum exactly to `main`
fn fit_blocks(blocks: &mut [MainBlock], main: u32) {
    let floor = MIN_BLOCK_SECONDS.min(main / blocks.len() as u32);
    let current: u64 = blocks.iter().map(|b| b.duration_seconds as u64).sum();
    if current == main as u64 && blocks.iter().all(|b| b.duration_seconds >= floor) {
        return;
    }

    let scale = main as f64 / current as f64;
    for block in blocks.iter_mut() {
        block.duration_seconds = scale_floor(block.duration_seconds, scale, floor);
    }

    fit_to_target(blocks, main, floor, |b| &mut b.duration_seconds);
}

/// Produce the macro plan for a request.
///
/// Consults the planning collaborator when one is registered. Its failure
/// is logged as a lost contribution and the heuristic plan is used instead.
pub async fn plan(
    request: &GenerationRequest,
    collaborators: &CollaboratorSet,
    settings: &GenerationConfig,
) -> (MacroPlan, Option<AgentContribution>) {
    let kind = CollaboratorKind::ProgramDirector;
    if !collaborators.contains(kind) {
        tracing::debug!("No planning collaborator registered; using heuristic plan");
        return (heuristic_plan(request), None);
    }

    let brief = briefs::planning_brief(request);
    let outcome = match collaborators
        .call(&brief, settings.collaborator_timeout(), settings.collaborator_retries)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!("Lost {} contribution: {}; using heuristic plan", kind, e);
            return (heuristic_plan(request), None);
        }
    };

    let coerced = outcome
        .content
        .as_structured()
        .and_then(|raw| coerce_plan(raw, request));
    match coerced {
        Some(plan) => {
            let content = serde_json::to_value(&plan)
                .ok()
                .and_then(|v| v.as_object().cloned())
                .unwrap_or_default();
            let contribution = AgentContribution::from_collaborator(
                kind,
                ContributionContent::Structured(content),
                outcome.elapsed.as_millis() as u64,
            );
            tracing::info!(
                "Using {} plan with {} main blocks",
                kind,
                plan.main_blocks.len()
            );
            (plan, Some(contribution))
        }
        None => {
            tracing::warn!("{} returned no usable main blocks; using heuristic plan", kind);
            (heuristic_plan(request), None)
        }
    }
}
