//! Session synthesis: integration collaborator first, deterministic merge second.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::briefs;
use crate::catalog::{self, PhaseGaps};
use crate::collaborator::{CollaboratorKind, CollaboratorSet};
use crate::config::GenerationConfig;
use crate::fields::{first_text, string_list};
use crate::types::{AgentContribution, GenerationRequest, MacroPlan};

/// Unnormalized session assembled from contributions
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DraftPayload {
    pub warmup: Vec<Value>,
    pub main: Vec<Value>,
    pub cooldown: Vec<Value>,
    pub safety_notes: Vec<String>,
    pub modifications: Map<String, Value>,
    pub equipment: BTreeSet<String>,
    pub summary: Option<String>,
}

impl DraftPayload {
    /// Phases without a single record to normalize
    pub fn gaps(&self) -> PhaseGaps {
        let empty = |items: &[Value]| !items.iter().any(Value::is_object);
        PhaseGaps {
            warmup: empty(&self.warmup),
            main: empty(&self.main),
            cooldown: empty(&self.cooldown),
        }
    }

    fn add_safety_notes(&mut self, notes: Option<&Value>) {
        for note in string_list(notes).unwrap_or_default() {
            if !self.safety_notes.contains(&note) {
                self.safety_notes.push(note);
            }
        }
    }

    /// Merge a raw modifications map key by key.
    ///
    /// List values extend an existing list; anything else replaces it.
    fn add_modifications(&mut self, raw: Option<&Value>) {
        let Some(Value::Object(entries)) = raw else {
            return;
        };
        for (name, value) in entries {
            match (self.modifications.get_mut(name), value) {
                (Some(Value::Array(existing)), Value::Array(more)) => {
                    existing.extend(more.iter().cloned());
                }
                _ => {
                    self.modifications.insert(name.clone(), value.clone());
                }
            }
        }
    }

    fn add_equipment(&mut self, raw: Option<&Value>) {
        self.equipment.extend(string_list(raw).unwrap_or_default());
    }

    /// Fold one specialist's structured content into the draft
    fn absorb(&mut self, content: &Map<String, Value>) {
        let array = |keys: &[&str]| -> Vec<Value> {
            keys.iter()
                .filter_map(|k| content.get(*k))
                .filter_map(Value::as_array)
                .flatten()
                .cloned()
                .collect()
        };

        self.warmup.extend(array(&["warmup"]));
        self.cooldown.extend(array(&["cooldown"]));
        self.main.extend(array(&["exercises", "cardio_exercises"]));
        self.main
            .extend(array(&["intervals"]).iter().filter_map(interval_as_exercise));

        self.add_equipment(content.get("recommended_equipment"));
        self.add_safety_notes(content.get("safety_notes"));
        self.add_modifications(content.get("modifications"));
    }
}

/// Translate an interval block into an exercise record
fn interval_as_exercise(raw: &Value) -> Option<Value> {
    let interval = raw.as_object()?;
    let mut exercise = Map::new();
    let renames = [
        ("name", "name"),
        ("rounds", "sets"),
        ("work_interval_seconds", "work_seconds"),
        ("rest_interval_seconds", "rest_seconds"),
        ("intensity_focus", "intensity"),
        ("instructions", "instructions"),
        ("coaching_cues", "coaching_cues"),
        ("equipment", "equipment"),
        ("impact_level", "impact_level"),
    ];
    for (from, to) in renames {
        if let Some(value) = interval.get(from) {
            exercise.insert(to.to_string(), value.clone());
        }
    }
    if !exercise.contains_key("name") {
        exercise.insert("name".into(), Value::String("Interval Block".into()));
    }
    Some(Value::Object(exercise))
}

/// Deterministic structural merge of specialist contributions.
///
/// Always yields a payload; empty phases are left for validation to report.
pub fn merge_contributions<'a>(
    contributions: impl IntoIterator<Item = &'a AgentContribution>,
) -> DraftPayload {
    let mut draft = DraftPayload::default();
    for contribution in contributions {
        if !contribution.contribution_type.is_synthesis_input() {
            continue;
        }
        if let Some(content) = contribution.content.as_structured() {
            draft.absorb(content);
        }
    }
    draft
}

/// Read an integration answer; `None` when any phase is missing or empty
fn draft_from_integration(content: &Map<String, Value>) -> Option<DraftPayload> {
    let phase = |key: &str| -> Option<Vec<Value>> {
        let items: Vec<Value> = content
            .get(key)?
            .as_array()?
            .iter()
            .filter(|v| v.is_object())
            .cloned()
            .collect();
        (!items.is_empty()).then_some(items)
    };

    let mut draft = DraftPayload {
        warmup: phase("warmup")?,
        main: phase("main_workout")?,
        cooldown: phase("cooldown")?,
        ..Default::default()
    };
    draft.add_safety_notes(content.get("safety_notes"));
    draft.add_modifications(content.get("modifications"));
    draft.add_equipment(content.get("equipment_needed"));
    draft.summary = match content.get("coaching_overview") {
        Some(Value::Object(overview)) => first_text(overview, &["summary", "overview"]),
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    };
    Some(draft)
}

/// Assemble a draft session.
///
/// Returns the draft and any contributions made during synthesis (the
/// integration answer or the built-in library fill).
pub async fn synthesize(
    request: &GenerationRequest,
    plan: &MacroPlan,
    contributions: &[AgentContribution],
    collaborators: &CollaboratorSet,
    settings: &GenerationConfig,
) -> (DraftPayload, Vec<AgentContribution>) {
    let inputs: Vec<&AgentContribution> = contributions
        .iter()
        .filter(|c| c.contribution_type.is_synthesis_input())
        .collect();

    let kind = CollaboratorKind::GeneralCoach;
    if collaborators.contains(kind) {
        let brief = briefs::integration_brief(request, plan, &inputs);
        match collaborators
            .call(&brief, settings.collaborator_timeout(), settings.collaborator_retries)
            .await
        {
            Ok(outcome) => {
                let integrated = outcome
                    .content
                    .as_structured()
                    .and_then(draft_from_integration);
                if let Some(draft) = integrated {
                    tracing::info!("Using {} integration", kind);
                    let contribution = AgentContribution::from_collaborator(
                        kind,
                        outcome.content,
                        outcome.elapsed.as_millis() as u64,
                    );
                    return (draft, vec![contribution]);
                }
                tracing::warn!(
                    "{} returned an incomplete session; merging deterministically",
                    kind
                );
            }
            Err(e) => {
                tracing::warn!("Lost {} contribution: {}; merging deterministically", kind, e);
            }
        }
    }

    let mut draft = merge_contributions(inputs);
    let mut added = Vec::new();

    let gaps = draft.gaps();
    if gaps.any() {
        if settings.use_builtin_library {
            if let Some(library) = catalog::library_contribution(request, plan, gaps) {
                if let Some(content) = library.content.as_structured() {
                    draft.absorb(content);
                }
                added.push(library);
            }
        } else {
            tracing::warn!(?gaps, "Phases left empty and the built-in library is disabled");
        }
    }

    (draft, added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::mock::StaticCollaborator;
    use crate::planner::heuristic_plan;
    use crate::types::{
        ContributionContent, ContributionType, Difficulty, UserContext, WorkoutType,
    };
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn request() -> GenerationRequest {
        GenerationRequest {
            workout_type: WorkoutType::Mixed,
            duration_minutes: 30,
            difficulty: Difficulty::Intermediate,
            focus_areas: vec![],
            special_requirements: BTreeSet::new(),
            user_context: UserContext::default(),
        }
    }

    fn contribution(kind: CollaboratorKind, value: Value) -> AgentContribution {
        AgentContribution::from_collaborator(
            kind,
            ContributionContent::Structured(value.as_object().cloned().unwrap()),
            10,
        )
    }

    fn specialists() -> Vec<AgentContribution> {
        vec![
            contribution(
                CollaboratorKind::StrengthCoach,
                json!({
                    "warmup": [{"name": "Arm Circles", "duration_seconds": 60}],
                    "exercises": [{"name": "Squat", "reps": 10}],
                    "safety_notes": ["Warm up first", "Stay hydrated"],
                    "modifications": {"Squat": [{"description": "Box squat"}], "Lunge": "Split squat"}
                }),
            ),
            contribution(
                CollaboratorKind::CardioCoach,
                json!({
                    "warmup": [{"name": "March", "duration_seconds": 60}],
                    "cardio_exercises": [{"name": "Step Jacks", "work_seconds": 40}],
                    "intervals": [{
                        "name": "Sprints",
                        "rounds": 4,
                        "work_interval_seconds": 20,
                        "rest_interval_seconds": 40
                    }],
                    "cooldown": [{"name": "Walk", "duration_seconds": 120}],
                    "safety_notes": ["Stay hydrated"],
                    "modifications": {"Squat": [{"description": "Chair squat"}], "Lunge": "Step back"}
                }),
            ),
            contribution(
                CollaboratorKind::EquipmentAdvisor,
                json!({"recommended_equipment": ["mat", "bands"]}),
            ),
        ]
    }

    #[test]
    fn test_merge_concatenates_and_dedups() {
        let contributions = specialists();
        let draft = merge_contributions(&contributions);

        assert_eq!(draft.warmup.len(), 2);
        assert_eq!(draft.main.len(), 3);
        assert_eq!(draft.cooldown.len(), 1);
        assert_eq!(draft.safety_notes, vec!["Warm up first", "Stay hydrated"]);
        assert_eq!(draft.modifications["Squat"].as_array().unwrap().len(), 2);
        assert_eq!(draft.modifications["Lunge"], json!("Step back"));
        assert!(draft.equipment.contains("mat"));

        let sprints = &draft.main[2];
        assert_eq!(sprints["sets"], 4);
        assert_eq!(sprints["work_seconds"], 20);
        assert_eq!(sprints["rest_seconds"], 40);
    }

    #[test]
    fn test_merge_skips_plan_output() {
        let plan = contribution(
            CollaboratorKind::ProgramDirector,
            json!({"main_blocks": [], "warmup": [{"name": "Should not appear"}]}),
        );
        let draft = merge_contributions([&plan]);
        assert!(draft.warmup.is_empty());
        assert!(draft.gaps().any());
    }

    #[tokio::test]
    async fn test_library_fills_gaps() {
        let req = request();
        let plan = heuristic_plan(&req);
        let only_strength = vec![contribution(
            CollaboratorKind::StrengthCoach,
            json!({"exercises": [{"name": "Squat", "reps": 10}]}),
        )];

        let (draft, added) = synthesize(
            &req,
            &plan,
            &only_strength,
            &CollaboratorSet::new(),
            &GenerationConfig::default(),
        )
        .await;

        assert_eq!(added.len(), 1);
        assert_eq!(added[0].contribution_type, ContributionType::HeuristicDefaults);
        assert!(!draft.gaps().any());
        // Main already had content, so the library left it alone
        assert_eq!(draft.main.len(), 1);
    }

    #[tokio::test]
    async fn test_library_disabled_leaves_gaps() {
        let req = request();
        let plan = heuristic_plan(&req);
        let settings = GenerationConfig {
            use_builtin_library: false,
            ..Default::default()
        };
        let (draft, added) =
            synthesize(&req, &plan, &[], &CollaboratorSet::new(), &settings).await;
        assert!(added.is_empty());
        assert!(draft.gaps().warmup && draft.gaps().main && draft.gaps().cooldown);
    }

    #[tokio::test]
    async fn test_integration_answer_is_used() {
        let req = request();
        let plan = heuristic_plan(&req);
        let set = CollaboratorSet::new().with(
            CollaboratorKind::GeneralCoach,
            Arc::new(StaticCollaborator::structured(json!({
                "warmup": [{"name": "Jog", "duration_seconds": 120}],
                "main_workout": [{"name": "Burpee", "reps": 8}],
                "cooldown": [{"name": "Stretch", "duration_seconds": 120}],
                "safety_notes": ["Land softly"],
                "coaching_overview": {"summary": "Short and sharp"}
            }))),
        );

        let (draft, added) =
            synthesize(&req, &plan, &specialists(), &set, &GenerationConfig::default()).await;
        assert_eq!(draft.main.len(), 1);
        assert_eq!(draft.summary.as_deref(), Some("Short and sharp"));
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].contribution_type, ContributionType::Integration);
    }

    #[tokio::test]
    async fn test_incomplete_integration_falls_back_to_merge() {
        let req = request();
        let plan = heuristic_plan(&req);
        let set = CollaboratorSet::new().with(
            CollaboratorKind::GeneralCoach,
            Arc::new(StaticCollaborator::structured(json!({
                "warmup": [{"name": "Jog"}],
                "main_workout": [],
                "cooldown": [{"name": "Stretch"}]
            }))),
        );

        let (draft, added) =
            synthesize(&req, &plan, &specialists(), &set, &GenerationConfig::default()).await;
        assert_eq!(draft.main.len(), 3);
        assert!(added.is_empty());
    }
}
