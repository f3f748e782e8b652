//! Per-collaborator response adapters.
//!
//! Each collaborator kind declares exactly which top-level fields it may
//! contribute. Anything else is dropped, and a response that carries none
//! of the declared fields is rejected instead of being searched further.

use serde_json::{Map, Value};

use crate::collaborator::{CollaboratorError, CollaboratorKind, CollaboratorOutput};
use crate::types::ContributionContent;

/// Fields a collaborator kind is allowed to contribute
pub fn extracted_fields(kind: CollaboratorKind) -> &'static [&'static str] {
    match kind {
        CollaboratorKind::StrengthCoach => &[
            "warmup",
            "exercises",
            "cooldown",
            "safety_notes",
            "modifications",
        ],
        CollaboratorKind::CardioCoach => &[
            "warmup",
            "cardio_exercises",
            "intervals",
            "cooldown",
            "safety_notes",
            "modifications",
        ],
        CollaboratorKind::EquipmentAdvisor => &[
            "recommended_equipment",
            "alternatives",
            "modifications",
            "safety_notes",
        ],
        CollaboratorKind::RecoverySpecialist => &[
            "cooldown",
            "recovery_protocols",
            "safety_notes",
            "modifications",
        ],
        CollaboratorKind::PreferencesManager => &["preferences", "safety_notes", "modifications"],
        CollaboratorKind::Nutritionist => &["nutrition_guidance", "safety_notes"],
        CollaboratorKind::MotivationCoach => &["motivation_strategies", "coaching_cues"],
        CollaboratorKind::AnalyticsExpert => &["performance_insights", "safety_notes"],
        CollaboratorKind::ProgramDirector => &[
            "phase_allocation",
            "warmup_focus",
            "main_blocks",
            "cooldown_focus",
            "notes",
        ],
        CollaboratorKind::GeneralCoach => &[
            "warmup",
            "main_workout",
            "cooldown",
            "safety_notes",
            "modifications",
            "equipment_needed",
            "coaching_overview",
        ],
    }
}

/// Advisory collaborators may answer in prose
pub fn accepts_free_text(kind: CollaboratorKind) -> bool {
    matches!(
        kind,
        CollaboratorKind::PreferencesManager
            | CollaboratorKind::RecoverySpecialist
            | CollaboratorKind::Nutritionist
            | CollaboratorKind::MotivationCoach
            | CollaboratorKind::AnalyticsExpert
    )
}

/// Turn raw collaborator output into a trusted-shape contribution payload
pub fn adapt(
    kind: CollaboratorKind,
    output: CollaboratorOutput,
) -> Result<ContributionContent, CollaboratorError> {
    let structured = match output {
        CollaboratorOutput::Structured(map) => map,
        CollaboratorOutput::FreeText(text) => match extract_json(&text) {
            Some(map) => map,
            None if accepts_free_text(kind) && !text.trim().is_empty() => {
                return Ok(ContributionContent::FreeText(text.trim().to_string()));
            }
            None => {
                return Err(CollaboratorError::InvalidResponse(format!(
                    "{} answered without a JSON object",
                    kind
                )));
            }
        },
    };

    if let Some(error) = structured.get("error").filter(|e| !e.is_null()) {
        return Err(CollaboratorError::Rejected(match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }));
    }

    let fields = extracted_fields(kind);
    let kept: Map<String, Value> = structured
        .into_iter()
        .filter(|(key, _)| fields.contains(&key.as_str()))
        .collect();

    if kept.is_empty() {
        return Err(CollaboratorError::InvalidResponse(format!(
            "{} returned none of its expected fields",
            kind
        )));
    }
    Ok(ContributionContent::Structured(kept))
}

/// Find a JSON object in free text.
///
/// Tries the whole text, then the outermost `{...}`. Anything that is not
/// an object is ignored.
pub fn extract_json(text: &str) -> Option<Map<String, Value>> {
    let stripped = text.trim();
    let mut candidates = vec![stripped];

    if let (Some(start), Some(end)) = (stripped.find('{'), stripped.rfind('}')) {
        if end > start {
            candidates.push(&stripped[start..=end]);
        }
    }

    candidates
        .into_iter()
        .filter(|c| !c.is_empty())
        .find_map(|candidate| match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
}
