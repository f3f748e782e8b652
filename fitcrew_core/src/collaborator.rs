//! External text-generation collaborators.
//!
//! Every collaborator has the same shape: it takes a natural-language brief
//! plus structured context and returns either a structured record or free
//! text. The planning and integration collaborators are distinguished only
//! by the brief they receive.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::adapter;
use crate::types::{ContributionContent, ContributionType};

/// Known collaborators
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorKind {
    PreferencesManager,
    StrengthCoach,
    CardioCoach,
    EquipmentAdvisor,
    RecoverySpecialist,
    Nutritionist,
    MotivationCoach,
    AnalyticsExpert,
    ProgramDirector,
    GeneralCoach,
}

impl CollaboratorKind {
    pub const ALL: [CollaboratorKind; 10] = [
        CollaboratorKind::PreferencesManager,
        CollaboratorKind::StrengthCoach,
        CollaboratorKind::CardioCoach,
        CollaboratorKind::EquipmentAdvisor,
        CollaboratorKind::RecoverySpecialist,
        CollaboratorKind::Nutritionist,
        CollaboratorKind::MotivationCoach,
        CollaboratorKind::AnalyticsExpert,
        CollaboratorKind::ProgramDirector,
        CollaboratorKind::GeneralCoach,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollaboratorKind::PreferencesManager => "preferences_manager",
            CollaboratorKind::StrengthCoach => "strength_coach",
            CollaboratorKind::CardioCoach => "cardio_coach",
            CollaboratorKind::EquipmentAdvisor => "equipment_advisor",
            CollaboratorKind::RecoverySpecialist => "recovery_specialist",
            CollaboratorKind::Nutritionist => "nutritionist",
            CollaboratorKind::MotivationCoach => "motivation_coach",
            CollaboratorKind::AnalyticsExpert => "analytics_expert",
            CollaboratorKind::ProgramDirector => "program_director",
            CollaboratorKind::GeneralCoach => "general_coach",
        }
    }

    pub fn contribution_type(&self) -> ContributionType {
        match self {
            CollaboratorKind::PreferencesManager => ContributionType::Personalization,
            CollaboratorKind::StrengthCoach => ContributionType::ExerciseSelection,
            CollaboratorKind::CardioCoach => ContributionType::CardioProgramming,
            CollaboratorKind::EquipmentAdvisor => ContributionType::EquipmentOptimization,
            CollaboratorKind::RecoverySpecialist => ContributionType::RecoveryProtocols,
            CollaboratorKind::Nutritionist => ContributionType::NutritionGuidance,
            CollaboratorKind::MotivationCoach => ContributionType::MotivationStrategies,
            CollaboratorKind::AnalyticsExpert => ContributionType::PerformanceInsights,
            CollaboratorKind::ProgramDirector => ContributionType::MacroPlan,
            CollaboratorKind::GeneralCoach => ContributionType::Integration,
        }
    }

    /// Fixed confidence attached to this collaborator's contributions
    pub fn confidence(&self) -> f32 {
        match self {
            CollaboratorKind::ProgramDirector => 0.85,
            CollaboratorKind::GeneralCoach => 0.9,
            _ => 0.8,
        }
    }

    /// Specialists are consulted during gathering; the others plan or integrate
    pub fn is_specialist(&self) -> bool {
        !matches!(
            self,
            CollaboratorKind::ProgramDirector | CollaboratorKind::GeneralCoach
        )
    }
}

impl FromStr for CollaboratorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CollaboratorKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| format!("unknown collaborator: {}", s))
    }
}

impl fmt::Display for CollaboratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A brief handed to a collaborator
#[derive(Clone, Debug)]
pub struct Brief {
    pub kind: CollaboratorKind,
    pub text: String,
    pub context: Value,
}

/// Raw collaborator output before adaptation
#[derive(Clone, Debug, PartialEq)]
pub enum CollaboratorOutput {
    Structured(Map<String, Value>),
    FreeText(String),
}

/// Errors that can occur while calling a collaborator
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("collaborator {0} is not configured")]
    Unavailable(CollaboratorKind),

    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("collaborator rejected the brief: {0}")]
    Rejected(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CollaboratorError {
    /// Only timeouts are worth repeating; calls have no side effects
    pub fn is_retryable(&self) -> bool {
        matches!(self, CollaboratorError::Timeout(_))
    }
}

/// An external recommendation capability
#[async_trait]
pub trait Collaborator: Send + Sync {
    async fn invoke(&self, brief: &Brief) -> Result<CollaboratorOutput, CollaboratorError>;
}

/// Adapted collaborator output plus how long the call took
#[derive(Clone, Debug)]
pub struct CallOutcome {
    pub content: ContributionContent,
    pub elapsed: Duration,
}

/// Registry of collaborators keyed by kind
#[derive(Clone, Default)]
pub struct CollaboratorSet {
    members: HashMap<CollaboratorKind, Arc<dyn Collaborator>>,
}

impl CollaboratorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: CollaboratorKind, collaborator: Arc<dyn Collaborator>) -> Self {
        self.register(kind, collaborator);
        self
    }

    pub fn register(&mut self, kind: CollaboratorKind, collaborator: Arc<dyn Collaborator>) {
        self.members.insert(kind, collaborator);
    }

    pub fn contains(&self, kind: CollaboratorKind) -> bool {
        self.members.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Invoke `brief.kind` with a per-call timeout and bounded retries,
    /// then pass the output through that kind's adapter.
    pub async fn call(
        &self,
        brief: &Brief,
        timeout: Duration,
        retries: u32,
    ) -> Result<CallOutcome, CollaboratorError> {
        let collaborator = self
            .members
            .get(&brief.kind)
            .ok_or(CollaboratorError::Unavailable(brief.kind))?;

        let start = Instant::now();
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(timeout, collaborator.invoke(brief)).await {
                Ok(result) => result,
                Err(_) => Err(CollaboratorError::Timeout(timeout)),
            };

            match result {
                Ok(output) => {
                    let content = adapter::adapt(brief.kind, output)?;
                    return Ok(CallOutcome {
                        content,
                        elapsed: start.elapsed(),
                    });
                }
                Err(e) if e.is_retryable() && attempt < retries => {
                    attempt += 1;
                    tracing::debug!(
                        collaborator = %brief.kind,
                        attempt,
                        "retrying collaborator after {}",
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl fmt::Debug for CollaboratorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.members.keys().collect();
        kinds.sort();
        f.debug_struct("CollaboratorSet").field("members", &kinds).finish()
    }
}
