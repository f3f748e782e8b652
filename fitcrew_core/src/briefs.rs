//! Briefs sent to collaborators.
//!
//! A brief is a short instruction plus a JSON context. The context always
//! carries the request parameters; specialists additionally receive the
//! macro plan slice relevant to their modality.

use serde_json::{json, Value};

use crate::collaborator::{Brief, CollaboratorKind};
use crate::types::{AgentContribution, GenerationRequest, MacroPlan, Modality};

const JSON_RULES: &str = "Return strictly valid JSON matching the schema. \
No markdown, no commentary outside the JSON. Use arrays even for a single \
element, null for unknown numbers, snake_case keys, and express every timing \
value in seconds.";

const PHASE_ITEM_SCHEMA: &str =
    r#"{"name": string, "duration_seconds": int, "instructions": string, "coaching_cues": [string], "focus": string, "intensity": "light"|"moderate", "equipment": string|null}"#;

const EXERCISE_SCHEMA: &str = r#"{"name": string, "sets": int, "reps": int|null, "work_seconds": int|null, "rest_seconds": int, "equipment": string|null, "target_muscles": [string], "instructions": string, "coaching_cues": [string], "impact_level": "low"|"moderate"|"high"}"#;

const MODIFICATIONS_SCHEMA: &str =
    r#"{"exercise_name": [{"description": string, "equipment": string|null, "impact": "low"|"moderate"|"high"|null}]}"#;

fn request_context(request: &GenerationRequest) -> Value {
    json!({
        "workout_type": request.workout_type,
        "duration_minutes": request.duration_minutes,
        "total_seconds": request.total_seconds(),
        "difficulty": request.difficulty,
        "focus_areas": request.focus_areas_or_default(),
        "special_requirements": request.special_requirements,
        "available_equipment": request.user_context.available_equipment,
        "space_constraints": request.user_context.space_constraints,
        "experience_level": request.user_context.experience_level,
        "goals": request.user_context.goals,
    })
}

fn plan_slice(plan: &MacroPlan, modalities: &[Modality]) -> Value {
    json!({
        "phase_allocation": plan.phase_allocation,
        "target_blocks": plan.blocks_for(modalities),
        "warmup_focus": plan.warmup_focus,
        "cooldown_focus": plan.cooldown_focus,
    })
}

/// Brief for the planning collaborator
pub fn planning_brief(request: &GenerationRequest) -> Brief {
    let text = format!(
        "Allocate exact seconds to warmup, main and cooldown for a {}-minute {} session \
         ({} seconds total; the three values must sum exactly to it). Divide the main phase \
         into 2-4 blocks whose durations sum exactly to the main seconds. For each block give \
         name, focus_areas, modality (strength|cardio|mobility|core|balance|mixed), \
         duration_seconds, sets, rep_scheme, interval_style, target_intensity, rest_seconds, \
         impact_level (low|moderate|high), equipment_bias and coaching_priority. Mark \
         impact_level low for low-impact requests and use equipment_bias \"bodyweight\" when \
         no equipment is available. Include warmup_focus, cooldown_focus and notes. {}",
        request.duration_minutes,
        request.workout_type,
        request.total_seconds(),
        JSON_RULES
    );
    Brief {
        kind: CollaboratorKind::ProgramDirector,
        text,
        context: json!({ "request": request_context(request) }),
    }
}

/// Brief for a specialist, informed by the macro plan
pub fn specialist_brief(
    kind: CollaboratorKind,
    request: &GenerationRequest,
    plan: &MacroPlan,
) -> Brief {
    let (text, plan_context) = match kind {
        CollaboratorKind::StrengthCoach => (
            format!(
                "Design the strength components of this session: 4-6 warmup drills, 6-8 main \
                 exercises with sets and either reps or timed work, and 3-5 cooldown stretches. \
                 Default to bodyweight when equipment is not listed. Schema: {{\"warmup\": [{}], \
                 \"exercises\": [{}], \"cooldown\": [{}], \"safety_notes\": [string], \
                 \"modifications\": {}}}. {}",
                PHASE_ITEM_SCHEMA, EXERCISE_SCHEMA, PHASE_ITEM_SCHEMA, MODIFICATIONS_SCHEMA, JSON_RULES
            ),
            plan_slice(plan, &[Modality::Strength, Modality::Core, Modality::Mixed]),
        ),
        CollaboratorKind::CardioCoach => (
            format!(
                "Design the cardio components of this session: 4-5 quiet warmup drills, 5-6 \
                 cardio pieces or intervals with timing, rest and impact level, and 3-4 \
                 cooldown segments. Schema: {{\"warmup\": [{}], \"cardio_exercises\": [{}], \
                 \"intervals\": [{{\"name\": string, \"work_interval_seconds\": int, \
                 \"rest_interval_seconds\": int, \"rounds\": int, \"intensity_focus\": string, \
                 \"instructions\": string, \"coaching_cues\": [string]}}], \"cooldown\": [{}], \
                 \"safety_notes\": [string], \"modifications\": {}}}. {}",
                PHASE_ITEM_SCHEMA, EXERCISE_SCHEMA, PHASE_ITEM_SCHEMA, MODIFICATIONS_SCHEMA, JSON_RULES
            ),
            plan_slice(plan, &[Modality::Cardio, Modality::Mixed]),
        ),
        CollaboratorKind::EquipmentAdvisor => (
            format!(
                "Optimize equipment use for this session given what the user owns and their \
                 space. Schema: {{\"recommended_equipment\": [string], \"alternatives\": \
                 [{{\"equipment\": string, \"alternative\": string, \"notes\": string|null}}], \
                 \"modifications\": {}, \"safety_notes\": [string]}}. {}",
                MODIFICATIONS_SCHEMA, JSON_RULES
            ),
            json!({
                "phase_allocation": plan.phase_allocation,
                "main_blocks": plan.main_blocks,
            }),
        ),
        CollaboratorKind::RecoverySpecialist => (
            format!(
                "Recommend recovery work for this session: cooldown segments sized to the \
                 cooldown budget and recovery protocols for the following days. Schema: \
                 {{\"cooldown\": [{}], \"recovery_protocols\": [string], \"safety_notes\": \
                 [string], \"modifications\": {}}}. {}",
                PHASE_ITEM_SCHEMA, MODIFICATIONS_SCHEMA, JSON_RULES
            ),
            plan_slice(plan, &[Modality::Mobility, Modality::Balance]),
        ),
        CollaboratorKind::PreferencesManager => (
            format!(
                "Summarize the user's preferences that should shape this session and flag \
                 anything to avoid. Schema: {{\"preferences\": object, \"safety_notes\": \
                 [string], \"modifications\": {}}}. {}",
                MODIFICATIONS_SCHEMA, JSON_RULES
            ),
            json!({ "phase_allocation": plan.phase_allocation }),
        ),
        CollaboratorKind::Nutritionist => (
            format!(
                "Give short pre- and post-session nutrition guidance aligned with the user's \
                 goals. Schema: {{\"nutrition_guidance\": [string], \"safety_notes\": \
                 [string]}}. {}",
                JSON_RULES
            ),
            json!({ "phase_allocation": plan.phase_allocation }),
        ),
        CollaboratorKind::MotivationCoach => (
            format!(
                "Suggest motivation strategies and short coaching cues for a beginner. \
                 Schema: {{\"motivation_strategies\": [string], \"coaching_cues\": [string]}}. {}",
                JSON_RULES
            ),
            json!({ "phase_allocation": plan.phase_allocation }),
        ),
        CollaboratorKind::AnalyticsExpert => (
            format!(
                "Analyse the user's recent history and point out what this session should \
                 emphasise or avoid. Schema: {{\"performance_insights\": [string], \
                 \"safety_notes\": [string]}}. {}",
                JSON_RULES
            ),
            json!({
                "phase_allocation": plan.phase_allocation,
                "recent_history": request.user_context.recent_history,
            }),
        ),
        CollaboratorKind::ProgramDirector | CollaboratorKind::GeneralCoach => {
            return planning_or_integration_misuse(kind, request);
        }
    };

    Brief {
        kind,
        text,
        context: json!({
            "request": request_context(request),
            "macro_plan": plan_context,
        }),
    }
}

fn planning_or_integration_misuse(kind: CollaboratorKind, request: &GenerationRequest) -> Brief {
    tracing::warn!("{} is not a specialist; sending the planning brief", kind);
    let mut brief = planning_brief(request);
    brief.kind = kind;
    brief
}

/// Brief for the integration collaborator
pub fn integration_brief(
    request: &GenerationRequest,
    plan: &MacroPlan,
    contributions: &[&AgentContribution],
) -> Brief {
    let text = format!(
        "Assemble the final session from the macro plan and the specialist contributions. \
         Warmup durations must sum to {} seconds, cooldown to {} seconds and main \
         block_duration_seconds to {} seconds. Each main exercise carries either reps or \
         work_seconds, never both. Merge and de-duplicate safety notes and modifications. \
         Schema: {{\"warmup\": [{}], \"main_workout\": [{}], \"cooldown\": [{}], \
         \"safety_notes\": [string], \"modifications\": {}, \"equipment_needed\": [string], \
         \"coaching_overview\": {{\"summary\": string}}}}. {}",
        plan.phase_allocation.warmup,
        plan.phase_allocation.cooldown,
        plan.phase_allocation.main,
        PHASE_ITEM_SCHEMA,
        EXERCISE_SCHEMA,
        PHASE_ITEM_SCHEMA,
        MODIFICATIONS_SCHEMA,
        JSON_RULES
    );

    let specialists: serde_json::Map<String, Value> = contributions
        .iter()
        .map(|c| {
            let content = serde_json::to_value(&c.content).unwrap_or(Value::Null);
            (c.source.clone(), content)
        })
        .collect();

    Brief {
        kind: CollaboratorKind::GeneralCoach,
        text,
        context: json!({
            "request": request_context(request),
            "macro_plan": plan,
            "specialist_contributions": specialists,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::heuristic_plan;
    use crate::types::{Difficulty, UserContext, WorkoutType};

    fn request() -> GenerationRequest {
        GenerationRequest {
            workout_type: WorkoutType::Mixed,
            duration_minutes: 45,
            difficulty: Difficulty::Beginner,
            focus_areas: vec!["legs".into(), "core".into()],
            special_requirements: ["low_impact".to_string()].into_iter().collect(),
            user_context: UserContext::default(),
        }
    }

    #[test]
    fn test_planning_brief_states_total() {
        let brief = planning_brief(&request());
        assert_eq!(brief.kind, CollaboratorKind::ProgramDirector);
        assert!(brief.text.contains("2700 seconds"));
        assert_eq!(brief.context["request"]["total_seconds"], 2700);
    }

    #[test]
    fn test_specialists_receive_their_blocks() {
        let req = request();
        let plan = heuristic_plan(&req);

        let strength = specialist_brief(CollaboratorKind::StrengthCoach, &req, &plan);
        let blocks = strength.context["macro_plan"]["target_blocks"].as_array().unwrap();
        assert!(blocks.iter().all(|b| b["modality"] == "strength"));
        assert!(!blocks.is_empty());

        let cardio = specialist_brief(CollaboratorKind::CardioCoach, &req, &plan);
        let blocks = cardio.context["macro_plan"]["target_blocks"].as_array().unwrap();
        assert!(blocks.iter().all(|b| b["modality"] == "cardio"));
    }

    #[test]
    fn test_integration_brief_states_budgets() {
        let req = request();
        let plan = heuristic_plan(&req);
        let brief = integration_brief(&req, &plan, &[]);
        assert_eq!(brief.kind, CollaboratorKind::GeneralCoach);
        assert!(brief.text.contains(&format!("{} seconds", plan.phase_allocation.main)));
    }
}
