//! End-to-end generation: plan, gather, synthesize, validate.
//!
//! The whole run sits under one timeout. Each stage records itself before
//! starting so a timeout can say where it happened.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;
use uuid::Uuid;

use crate::collaborator::CollaboratorSet;
use crate::config::GenerationConfig;
use crate::error::{GenerationError, Stage};
use crate::types::{AgentContribution, ContributionType, FinalWorkout, GenerationRequest, MacroPlan};
use crate::{gather, planner, synthesis, validate};

/// Everything one generation produced, for callers that want more than the workout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationReport {
    pub request_id: Uuid,
    pub workout: FinalWorkout,
    pub macro_plan: MacroPlan,
    pub contributions: Vec<AgentContribution>,
    pub elapsed_ms: u64,
}

const STAGES: [Stage; 5] = [
    Stage::Request,
    Stage::Planning,
    Stage::Gathering,
    Stage::Synthesis,
    Stage::Validation,
];

/// Stage currently in progress
#[derive(Debug, Default)]
struct StageTracker(AtomicU8);

impl StageTracker {
    fn enter(&self, stage: Stage) {
        self.0.store(stage as u8, Ordering::SeqCst);
        tracing::info!("Entering {} stage", stage);
    }

    fn current(&self) -> Stage {
        STAGES
            .get(self.0.load(Ordering::SeqCst) as usize)
            .copied()
            .unwrap_or(Stage::Request)
    }
}

/// Runs the generation pipeline against a set of collaborators
#[derive(Clone, Debug)]
pub struct Orchestrator {
    collaborators: CollaboratorSet,
    settings: GenerationConfig,
}

impl Orchestrator {
    pub fn new(collaborators: CollaboratorSet, settings: GenerationConfig) -> Self {
        Self {
            collaborators,
            settings,
        }
    }

    pub fn settings(&self) -> &GenerationConfig {
        &self.settings
    }

    pub fn collaborators(&self) -> &CollaboratorSet {
        &self.collaborators
    }

    /// Generate a duration-exact workout or a stage-identified failure
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<FinalWorkout, GenerationError> {
        self.generate_with_report(request)
            .await
            .map(|report| report.workout)
    }

    /// Like [`generate`](Self::generate), also returning the plan and contributions
    pub async fn generate_with_report(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationReport, GenerationError> {
        let start = Instant::now();
        let request_id = Uuid::new_v4();
        tracing::info!(
            request_id = %request_id,
            "Generating {}-minute {} workout",
            request.duration_minutes,
            request.workout_type
        );

        request.validate()?;

        let tracker = StageTracker::default();
        let budget = self.settings.total_timeout();
        let outcome = tokio::time::timeout(budget, self.run(request, &tracker)).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok((workout, macro_plan, contributions))) => {
                tracing::info!(
                    request_id = %request_id,
                    elapsed_ms,
                    "Generated workout {}",
                    workout.id
                );
                Ok(GenerationReport {
                    request_id,
                    workout,
                    macro_plan,
                    contributions,
                    elapsed_ms,
                })
            }
            Ok(Err(e)) => {
                tracing::warn!(request_id = %request_id, "Generation failed: {}", e);
                Err(e)
            }
            Err(_) => {
                let stage = tracker.current();
                tracing::warn!(
                    request_id = %request_id,
                    "Generation timed out during {} stage",
                    stage
                );
                Err(GenerationError::Timeout {
                    stage,
                    budget_ms: self.settings.total_timeout_ms,
                })
            }
        }
    }

    async fn run(
        &self,
        request: &GenerationRequest,
        tracker: &StageTracker,
    ) -> Result<(FinalWorkout, MacroPlan, Vec<AgentContribution>), GenerationError> {
        tracker.enter(Stage::Planning);
        let (plan, plan_contribution) =
            planner::plan(request, &self.collaborators, &self.settings).await;

        tracker.enter(Stage::Gathering);
        let mut contributions: Vec<AgentContribution> = plan_contribution.into_iter().collect();
        contributions
            .extend(gather::gather(request, &plan, &self.collaborators, &self.settings).await);

        tracker.enter(Stage::Synthesis);
        let (draft, added) = synthesis::synthesize(
            request,
            &plan,
            &contributions,
            &self.collaborators,
            &self.settings,
        )
        .await;
        contributions.extend(added);

        tracker.enter(Stage::Validation);
        let workout = validate::finalize(request, &plan, draft, &contributions)?;
        Ok((workout, plan, contributions))
    }
}

/// Aggregate figures for one collaborator across several reports
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CollaboratorStats {
    pub contributions: usize,
    pub mean_execution_ms: f64,
    pub mean_confidence: f32,
    pub contribution_types: BTreeSet<ContributionType>,
}

/// Per-collaborator statistics over the given reports
pub fn collaborator_stats<'a>(
    reports: impl IntoIterator<Item = &'a GenerationReport>,
) -> BTreeMap<String, CollaboratorStats> {
    let mut totals: BTreeMap<String, (CollaboratorStats, u64, f32)> = BTreeMap::new();
    for contribution in reports.into_iter().flat_map(|r| r.contributions.iter()) {
        let (stats, execution_ms, confidence) =
            totals.entry(contribution.source.clone()).or_default();
        stats.contributions += 1;
        stats.contribution_types.insert(contribution.contribution_type);
        *execution_ms += contribution.execution_ms;
        *confidence += contribution.confidence;
    }

    totals
        .into_iter()
        .map(|(source, (mut stats, execution_ms, confidence))| {
            let count = stats.contributions.max(1);
            stats.mean_execution_ms = execution_ms as f64 / count as f64;
            stats.mean_confidence = confidence / count as f32;
            (source, stats)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LIBRARY_SOURCE;
    use crate::collaborator::mock::StaticCollaborator;
    use crate::collaborator::CollaboratorKind;
    use crate::logging::init_test;
    use crate::types::{Difficulty, UserContext, WorkoutType};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn request(workout_type: WorkoutType, minutes: u32) -> GenerationRequest {
        GenerationRequest {
            workout_type,
            duration_minutes: minutes,
            difficulty: Difficulty::Intermediate,
            focus_areas: vec![],
            special_requirements: Default::default(),
            user_context: UserContext::default(),
        }
    }

    fn all_failing() -> CollaboratorSet {
        let mut set = CollaboratorSet::new();
        for kind in CollaboratorKind::ALL {
            set.register(kind, Arc::new(StaticCollaborator::failing("service unavailable")));
        }
        set
    }

    fn assert_exact(workout: &FinalWorkout) {
        let breakdown = workout.phase_duration_breakdown;
        assert_eq!(breakdown.total(), workout.total_estimated_duration_seconds);
        assert_eq!(
            workout.warmup.iter().map(|i| i.duration_seconds).sum::<u32>(),
            breakdown.warmup
        );
        assert_eq!(
            workout.main.iter().map(|e| e.block_duration_seconds).sum::<u32>(),
            breakdown.main
        );
        assert_eq!(
            workout.cooldown.iter().map(|i| i.duration_seconds).sum::<u32>(),
            breakdown.cooldown
        );
    }

    #[tokio::test]
    async fn test_all_collaborators_failing_strength_45() {
        init_test();
        let req = request(WorkoutType::Strength, 45);
        let orchestrator = Orchestrator::new(all_failing(), GenerationConfig::default());

        let report = orchestrator.generate_with_report(&req).await.unwrap();
        let workout = &report.workout;

        assert_exact(workout);
        assert_eq!(workout.total_estimated_duration_seconds, 2700);
        assert_eq!(workout.phase_duration_breakdown.main, 2052);
        assert_eq!(report.macro_plan.phase_allocation.main, 2052);
        assert_eq!(
            workout.equipment_needed,
            ["bodyweight".to_string()].into_iter().collect()
        );
        assert!(workout.warmup.iter().all(|i| i.equipment.as_deref() == Some("bodyweight")));
        assert_eq!(
            workout.agent_attribution.keys().collect::<Vec<_>>(),
            vec![LIBRARY_SOURCE]
        );
    }

    #[tokio::test]
    async fn test_fallback_completeness_across_requests() {
        let orchestrator = Orchestrator::new(all_failing(), GenerationConfig::default());
        for workout_type in [
            WorkoutType::Strength,
            WorkoutType::Cardio,
            WorkoutType::Mixed,
            WorkoutType::Flexibility,
            WorkoutType::Hiit,
        ] {
            for minutes in [5, 13, 30, 47, 90, 120] {
                let req = request(workout_type, minutes);
                let workout = orchestrator.generate(&req).await.unwrap();
                assert_exact(&workout);
                assert_eq!(
                    workout.total_estimated_duration_seconds,
                    req.total_seconds()
                );
                for exercise in &workout.main {
                    assert!(exercise.reps().is_some() != exercise.work_seconds().is_some());
                }
            }
        }
    }

    #[tokio::test]
    async fn test_no_content_without_library_is_structural() {
        let settings = GenerationConfig {
            use_builtin_library: false,
            ..Default::default()
        };
        let orchestrator = Orchestrator::new(all_failing(), settings);
        let err = orchestrator
            .generate(&request(WorkoutType::Cardio, 30))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Structural { .. }));
        assert_eq!(err.stage(), Stage::Validation);
    }

    #[tokio::test]
    async fn test_invalid_request_rejected_first() {
        let orchestrator = Orchestrator::new(all_failing(), GenerationConfig::default());
        let err = orchestrator
            .generate(&request(WorkoutType::Cardio, 121))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Request);
    }

    #[tokio::test]
    async fn test_timeout_reports_stage() {
        let set = CollaboratorSet::new().with(
            CollaboratorKind::StrengthCoach,
            Arc::new(
                StaticCollaborator::structured(json!({"exercises": []}))
                    .delayed(Duration::from_secs(5)),
            ),
        );
        let settings = GenerationConfig {
            total_timeout_ms: 100,
            collaborator_timeout_ms: 10_000,
            ..Default::default()
        };
        let orchestrator = Orchestrator::new(set, settings);

        let err = orchestrator
            .generate(&request(WorkoutType::Strength, 30))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GenerationError::Timeout {
                stage: Stage::Gathering,
                budget_ms: 100
            }
        );
    }

    #[tokio::test]
    async fn test_specialist_content_is_used() {
        let set = CollaboratorSet::new()
            .with(
                CollaboratorKind::StrengthCoach,
                Arc::new(StaticCollaborator::structured(json!({
                    "warmup": [{"name": "Arm Circles", "duration_seconds": 90}],
                    "exercises": [
                        {"name": "Goblet Squat", "sets": 3, "reps": "12", "equipment": "kettlebell"},
                        {"name": "Plank", "sets": 3, "work_seconds": 40}
                    ],
                    "cooldown": [{"name": "Hamstring Stretch", "duration_minutes": 2}],
                    "safety_notes": ["Keep a neutral spine"]
                }))),
            )
            .with(
                CollaboratorKind::MotivationCoach,
                Arc::new(StaticCollaborator::text("Every rep counts.")),
            );
        let orchestrator = Orchestrator::new(set, GenerationConfig::default());

        let mut req = request(WorkoutType::Strength, 30);
        req.user_context.available_equipment = vec!["kettlebell".into()];
        req.user_context.experience_level = Difficulty::Beginner;
        let report = orchestrator.generate_with_report(&req).await.unwrap();
        let workout = &report.workout;

        assert_exact(workout);
        assert_eq!(workout.main.len(), 2);
        assert_eq!(workout.main[0].reps(), Some(12));
        assert!(workout.equipment_needed.contains("kettlebell"));
        assert_eq!(workout.safety_notes, vec!["Keep a neutral spine"]);
        assert!(workout.agent_attribution.contains_key("strength_coach"));
        assert!(workout.agent_attribution.contains_key("motivation_coach"));
        assert!(!workout.agent_attribution.contains_key(LIBRARY_SOURCE));
    }

    #[tokio::test]
    async fn test_short_session_with_crowded_specialist_draft() {
        let set = CollaboratorSet::new().with(
            CollaboratorKind::StrengthCoach,
            Arc::new(StaticCollaborator::structured(json!({
                "warmup": [
                    {"name": "Arm Circles", "duration_seconds": 60},
                    {"name": "Leg Swings", "duration_seconds": 60}
                ],
                "exercises": [
                    {"name": "Squat", "sets": 3, "reps": 12},
                    {"name": "Push-up", "sets": 3, "reps": 10},
                    {"name": "Lunge", "sets": 3, "reps": 10},
                    {"name": "Row", "sets": 3, "reps": 10},
                    {"name": "Plank", "sets": 3, "work_seconds": 40}
                ],
                "cooldown": [
                    {"name": "Quad Stretch", "duration_seconds": 60},
                    {"name": "Child's Pose", "duration_seconds": 60}
                ]
            }))),
        );
        let orchestrator = Orchestrator::new(set, GenerationConfig::default());

        let req = request(WorkoutType::Strength, 5);
        let report = orchestrator.generate_with_report(&req).await.unwrap();
        let workout = &report.workout;
        let budget = report.macro_plan.phase_allocation;

        assert_exact(workout);
        assert_eq!(workout.total_estimated_duration_seconds, 300);
        assert_eq!(workout.duration_minutes, 5);
        assert!(!workout.main.is_empty());
        assert!(workout.main.len() as u32 <= budget.main / 60);
        assert!(workout.main.iter().all(|e| e.block_duration_seconds >= 60));
        assert!(workout.agent_attribution.contains_key("strength_coach"));
    }

    #[tokio::test]
    async fn test_collaborator_stats() {
        let orchestrator = Orchestrator::new(all_failing(), GenerationConfig::default());
        let mut reports = Vec::new();
        for minutes in [20, 40] {
            reports.push(
                orchestrator
                    .generate_with_report(&request(WorkoutType::Mixed, minutes))
                    .await
                    .unwrap(),
            );
        }

        let stats = collaborator_stats(&reports);
        let library = &stats[LIBRARY_SOURCE];
        assert_eq!(library.contributions, 2);
        assert!(library
            .contribution_types
            .contains(&ContributionType::HeuristicDefaults));
        assert!((library.mean_confidence - 0.6).abs() < 1e-6);
        assert_eq!(stats.len(), 1);
    }
}
