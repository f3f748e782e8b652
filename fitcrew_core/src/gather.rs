//! Specialist selection and concurrent contribution gathering.

use futures::future::join_all;

use crate::briefs;
use crate::collaborator::{CollaboratorError, CollaboratorKind, CollaboratorSet};
use crate::config::GenerationConfig;
use crate::types::{AgentContribution, Difficulty, GenerationRequest, MacroPlan, WorkoutType};

/// Sessions longer than this also consult the recovery specialist
const RECOVERY_MINUTES_THRESHOLD: u32 = 45;

/// Specialists relevant to `request`, in consultation order
pub fn select_collaborators(request: &GenerationRequest) -> Vec<CollaboratorKind> {
    let user = &request.user_context;
    let mut selected = vec![CollaboratorKind::PreferencesManager];

    if matches!(request.workout_type, WorkoutType::Strength | WorkoutType::Mixed) {
        selected.push(CollaboratorKind::StrengthCoach);
    }
    if matches!(
        request.workout_type,
        WorkoutType::Cardio | WorkoutType::Hiit | WorkoutType::Mixed
    ) {
        selected.push(CollaboratorKind::CardioCoach);
    }
    selected.push(CollaboratorKind::EquipmentAdvisor);

    if request.duration_minutes > RECOVERY_MINUTES_THRESHOLD
        || user.experience_level == Difficulty::Advanced
    {
        selected.push(CollaboratorKind::RecoverySpecialist);
    }
    if user.has_goal("weight_loss") || user.has_goal("muscle_building") {
        selected.push(CollaboratorKind::Nutritionist);
    }
    if user.experience_level == Difficulty::Beginner {
        selected.push(CollaboratorKind::MotivationCoach);
    }
    if !user.recent_history.is_empty() {
        selected.push(CollaboratorKind::AnalyticsExpert);
    }

    selected
}

/// Consult every selected specialist concurrently.
///
/// Each call has its own timeout. A failed call is logged and simply
/// missing from the result; it never cancels the others.
pub async fn gather(
    request: &GenerationRequest,
    plan: &MacroPlan,
    collaborators: &CollaboratorSet,
    settings: &GenerationConfig,
) -> Vec<AgentContribution> {
    let selected = select_collaborators(request);
    tracing::info!(
        "Consulting {} specialists: {}",
        selected.len(),
        selected
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let calls = selected.into_iter().map(|kind| async move {
        let brief = briefs::specialist_brief(kind, request, plan);
        let result = collaborators
            .call(&brief, settings.collaborator_timeout(), settings.collaborator_retries)
            .await;
        (kind, result)
    });

    let mut contributions = Vec::new();
    for (kind, result) in join_all(calls).await {
        match result {
            Ok(outcome) => {
                tracing::debug!(
                    collaborator = %kind,
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "contribution received"
                );
                contributions.push(AgentContribution::from_collaborator(
                    kind,
                    outcome.content,
                    outcome.elapsed.as_millis() as u64,
                ));
            }
            Err(CollaboratorError::Unavailable(_)) => {
                tracing::debug!(collaborator = %kind, "not configured; skipping");
            }
            Err(e) => {
                tracing::warn!("Lost {} contribution: {}", kind, e);
            }
        }
    }

    tracing::info!("Gathered {} contributions", contributions.len());
    contributions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::mock::StaticCollaborator;
    use crate::planner::heuristic_plan;
    use crate::types::{ContributionType, HistoryEntry, UserContext};
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::time::Duration;

    fn request(workout_type: WorkoutType, minutes: u32) -> GenerationRequest {
        GenerationRequest {
            workout_type,
            duration_minutes: minutes,
            difficulty: Difficulty::Intermediate,
            focus_areas: vec![],
            special_requirements: BTreeSet::new(),
            user_context: UserContext::default(),
        }
    }

    #[test]
    fn test_strength_selection() {
        let selected = select_collaborators(&request(WorkoutType::Strength, 30));
        assert_eq!(
            selected,
            vec![
                CollaboratorKind::PreferencesManager,
                CollaboratorKind::StrengthCoach,
                CollaboratorKind::EquipmentAdvisor,
            ]
        );
    }

    #[test]
    fn test_mixed_selects_both_coaches() {
        let selected = select_collaborators(&request(WorkoutType::Mixed, 30));
        assert!(selected.contains(&CollaboratorKind::StrengthCoach));
        assert!(selected.contains(&CollaboratorKind::CardioCoach));

        let hiit = select_collaborators(&request(WorkoutType::Hiit, 30));
        assert!(!hiit.contains(&CollaboratorKind::StrengthCoach));
        assert!(hiit.contains(&CollaboratorKind::CardioCoach));
    }

    #[test]
    fn test_conditional_specialists() {
        let mut req = request(WorkoutType::Flexibility, 46);
        req.user_context = UserContext {
            experience_level: Difficulty::Beginner,
            goals: vec!["Weight-Loss".into()],
            recent_history: vec![HistoryEntry::default()],
            ..Default::default()
        };
        let selected = select_collaborators(&req);
        for kind in [
            CollaboratorKind::RecoverySpecialist,
            CollaboratorKind::Nutritionist,
            CollaboratorKind::MotivationCoach,
            CollaboratorKind::AnalyticsExpert,
        ] {
            assert!(selected.contains(&kind), "missing {}", kind);
        }

        let exactly_45 = select_collaborators(&request(WorkoutType::Flexibility, 45));
        assert!(!exactly_45.contains(&CollaboratorKind::RecoverySpecialist));
    }

    #[tokio::test]
    async fn test_failures_do_not_cancel_others() {
        let req = request(WorkoutType::Mixed, 30);
        let plan = heuristic_plan(&req);
        let set = CollaboratorSet::new()
            .with(
                CollaboratorKind::StrengthCoach,
                Arc::new(StaticCollaborator::structured(json!({
                    "exercises": [{"name": "Squat", "reps": 10}]
                }))),
            )
            .with(
                CollaboratorKind::CardioCoach,
                Arc::new(StaticCollaborator::failing("rate limited")),
            )
            .with(
                CollaboratorKind::EquipmentAdvisor,
                Arc::new(
                    StaticCollaborator::structured(json!({"recommended_equipment": ["mat"]}))
                        .delayed(Duration::from_secs(5)),
                ),
            );
        let settings = GenerationConfig {
            collaborator_timeout_ms: 50,
            ..Default::default()
        };

        let contributions = gather(&req, &plan, &set, &settings).await;
        assert_eq!(contributions.len(), 1);
        assert_eq!(contributions[0].source, "strength_coach");
        assert_eq!(
            contributions[0].contribution_type,
            ContributionType::ExerciseSelection
        );
        assert!((contributions[0].confidence - 0.8).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_no_collaborators_no_contributions() {
        let req = request(WorkoutType::Cardio, 20);
        let plan = heuristic_plan(&req);
        let contributions =
            gather(&req, &plan, &CollaboratorSet::new(), &GenerationConfig::default()).await;
        assert!(contributions.is_empty());
    }
}
