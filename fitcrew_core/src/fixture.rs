//! Replay collaborators backed by a JSON fixture file.
//!
//! The file maps collaborator names to canned answers:
//!
//! ```json
//! {
//!   "strength_coach": { "exercises": [ ... ] },
//!   "motivation_coach": "You've got this.",
//!   "program_director": { "error": "planner offline" }
//! }
//! ```
//!
//! Objects replay as structured output, strings as free text, and an object
//! with an `error` key as a rejection. Unknown names are ignored with a
//! warning.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::collaborator::{
    Brief, Collaborator, CollaboratorError, CollaboratorKind, CollaboratorOutput, CollaboratorSet,
};
use crate::{Error, Result};

/// A collaborator that always answers with the same recorded response
pub struct FixtureCollaborator {
    response: Value,
}

impl FixtureCollaborator {
    pub fn new(response: Value) -> Self {
        Self { response }
    }
}

#[async_trait]
impl Collaborator for FixtureCollaborator {
    async fn invoke(&self, brief: &Brief) -> std::result::Result<CollaboratorOutput, CollaboratorError> {
        tracing::debug!(collaborator = %brief.kind, "replaying fixture response");
        match &self.response {
            Value::Object(map) => {
                if let Some(Value::String(message)) = map.get("error") {
                    return Err(CollaboratorError::Rejected(message.clone()));
                }
                Ok(CollaboratorOutput::Structured(map.clone()))
            }
            Value::String(text) => Ok(CollaboratorOutput::FreeText(text.clone())),
            other => Err(CollaboratorError::InvalidResponse(format!(
                "fixture for {} is neither an object nor text: {}",
                brief.kind, other
            ))),
        }
    }
}

/// Build a collaborator set from a fixture document
pub fn collaborators_from_value(document: &Value) -> Result<CollaboratorSet> {
    let entries = document
        .as_object()
        .ok_or_else(|| Error::Config("fixture file must contain a JSON object".into()))?;

    let mut set = CollaboratorSet::new();
    for (name, response) in entries {
        match name.parse::<CollaboratorKind>() {
            Ok(kind) => {
                set.register(kind, Arc::new(FixtureCollaborator::new(response.clone())));
            }
            Err(e) => tracing::warn!("Ignoring fixture entry: {}", e),
        }
    }

    tracing::info!("Loaded {} fixture collaborators", set.len());
    Ok(set)
}

/// Load a collaborator set from a fixture file
pub fn load_fixture_collaborators(path: &Path) -> Result<CollaboratorSet> {
    let contents = std::fs::read_to_string(path)?;
    let document: Value = serde_json::from_str(&contents)?;
    collaborators_from_value(&document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn brief(kind: CollaboratorKind) -> Brief {
        Brief {
            kind,
            text: String::new(),
            context: json!({}),
        }
    }

    #[tokio::test]
    async fn test_fixture_kinds() {
        let set = collaborators_from_value(&json!({
            "strength_coach": {"exercises": [{"name": "Push-up", "reps": 10}]},
            "motivation_coach": "Small wins add up.",
            "program_director": {"error": "planner offline"},
            "astrologer": {"stars": "aligned"}
        }))
        .unwrap();

        assert_eq!(set.len(), 3);
        let timeout = Duration::from_secs(1);

        let strength = set
            .call(&brief(CollaboratorKind::StrengthCoach), timeout, 0)
            .await
            .unwrap();
        assert!(strength.content.as_structured().is_some());

        let motivation = set
            .call(&brief(CollaboratorKind::MotivationCoach), timeout, 0)
            .await
            .unwrap();
        assert!(motivation.content.as_structured().is_none());

        let planner = set
            .call(&brief(CollaboratorKind::ProgramDirector), timeout, 0)
            .await;
        assert!(matches!(planner, Err(CollaboratorError::Rejected(_))));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("fixtures.json");
        std::fs::write(&path, r#"{"cardio_coach": {"intervals": []}}"#).unwrap();

        let set = load_fixture_collaborators(&path).unwrap();
        assert!(set.contains(CollaboratorKind::CardioCoach));
    }

    #[test]
    fn test_rejects_non_object_document() {
        assert!(collaborators_from_value(&json!(["strength_coach"])).is_err());
    }
}
