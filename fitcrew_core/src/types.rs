//! Core domain types for the workout generation pipeline.
//!
//! This module defines the records that flow between pipeline stages:
//! - The immutable generation request and user context
//! - The macro plan (phase time budget and main blocks)
//! - Specialist contributions
//! - Normalized phase items, main exercises and the final workout

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::collaborator::CollaboratorKind;
use crate::error::GenerationError;

/// Shortest session a caller may request, in minutes
pub const MIN_DURATION_MINUTES: u32 = 5;

/// Longest session a caller may request, in minutes
pub const MAX_DURATION_MINUTES: u32 = 120;

// ============================================================================
// Request Types
// ============================================================================

/// Kind of session requested
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutType {
    Strength,
    Cardio,
    Mixed,
    Flexibility,
    Hiit,
}

impl WorkoutType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkoutType::Strength => "strength",
            WorkoutType::Cardio => "cardio",
            WorkoutType::Mixed => "mixed",
            WorkoutType::Flexibility => "flexibility",
            WorkoutType::Hiit => "hiit",
        }
    }

    /// Display title ("Strength", "Hiit")
    pub fn title(&self) -> String {
        let s = self.as_str();
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    }
}

impl FromStr for WorkoutType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strength" => Ok(WorkoutType::Strength),
            "cardio" => Ok(WorkoutType::Cardio),
            "mixed" => Ok(WorkoutType::Mixed),
            "flexibility" => Ok(WorkoutType::Flexibility),
            "hiit" => Ok(WorkoutType::Hiit),
            other => Err(format!("unknown workout type: {}", other)),
        }
    }
}

impl fmt::Display for WorkoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Difficulty of the session, also used for the user's experience level
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }

    /// Rest between sets when a collaborator does not specify one
    pub fn default_rest_seconds(&self) -> u32 {
        match self {
            Difficulty::Beginner => 45,
            Difficulty::Intermediate => 60,
            Difficulty::Advanced => 75,
        }
    }

    /// Calories burned per minute, used for the session estimate
    pub fn calorie_rate(&self) -> u32 {
        match self {
            Difficulty::Beginner => 6,
            Difficulty::Intermediate => 8,
            Difficulty::Advanced => 10,
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(format!("unknown difficulty: {}", other)),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the user's recent training history
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct HistoryEntry {
    #[serde(default)]
    pub workout_type: Option<WorkoutType>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// What the pipeline knows about the user
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct UserContext {
    #[serde(default)]
    pub available_equipment: Vec<String>,
    #[serde(default)]
    pub space_constraints: Vec<String>,
    #[serde(default)]
    pub experience_level: Difficulty,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub recent_history: Vec<HistoryEntry>,
}

impl UserContext {
    pub fn has_equipment(&self) -> bool {
        self.available_equipment.iter().any(|e| !e.trim().is_empty())
    }

    /// True when a goal matches `goal` ignoring case and `-`/space separators
    pub fn has_goal(&self, goal: &str) -> bool {
        self.goals.iter().any(|g| canonical_tag(g) == goal)
    }

    /// Whether the user owns `item` (bodyweight is always owned)
    pub fn owns(&self, item: &str) -> bool {
        let wanted = canonical_tag(item);
        wanted == "bodyweight"
            || self
                .available_equipment
                .iter()
                .any(|e| canonical_tag(e) == wanted)
    }
}

/// Immutable input to one generation call
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    pub workout_type: WorkoutType,
    pub duration_minutes: u32,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub focus_areas: Vec<String>,
    #[serde(default)]
    pub special_requirements: BTreeSet<String>,
    #[serde(default)]
    pub user_context: UserContext,
}

impl GenerationRequest {
    /// Reject requests outside the supported duration range
    pub fn validate(&self) -> Result<(), GenerationError> {
        if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&self.duration_minutes) {
            return Err(GenerationError::InvalidRequest(format!(
                "duration_minutes must be between {} and {}, got {}",
                MIN_DURATION_MINUTES, MAX_DURATION_MINUTES, self.duration_minutes
            )));
        }
        Ok(())
    }

    /// Session length in seconds, never shorter than ten minutes
    pub fn total_seconds(&self) -> u32 {
        self.duration_minutes.saturating_mul(60).max(600)
    }

    /// Distinct focus areas in request order, `full_body` when none were given
    pub fn focus_areas_or_default(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let focus: Vec<String> = self
            .focus_areas
            .iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty() && seen.insert(f.to_lowercase()))
            .collect();
        if focus.is_empty() {
            vec!["full_body".to_string()]
        } else {
            focus
        }
    }

    pub fn is_low_impact(&self) -> bool {
        self.special_requirements
            .iter()
            .any(|r| canonical_tag(r) == "low_impact")
    }

    pub fn default_impact(&self) -> ImpactLevel {
        if self.is_low_impact() {
            ImpactLevel::Low
        } else {
            ImpactLevel::Moderate
        }
    }

    pub fn default_equipment_bias(&self) -> &'static str {
        if self.user_context.has_equipment() {
            "minimal_equipment"
        } else {
            "bodyweight"
        }
    }
}

/// Lowercase a free-form tag and unify `-`/space separators to `_`
pub fn canonical_tag(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

// ============================================================================
// Macro Plan Types
// ============================================================================

/// Training modality of a main block
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Strength,
    Cardio,
    Mobility,
    Core,
    Balance,
    Mixed,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Strength => "strength",
            Modality::Cardio => "cardio",
            Modality::Mobility => "mobility",
            Modality::Core => "core",
            Modality::Balance => "balance",
            Modality::Mixed => "mixed",
        }
    }
}

impl FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match canonical_tag(s).as_str() {
            "strength" => Ok(Modality::Strength),
            "cardio" | "hiit" => Ok(Modality::Cardio),
            "mobility" | "flexibility" => Ok(Modality::Mobility),
            "core" => Ok(Modality::Core),
            "balance" => Ok(Modality::Balance),
            "mixed" => Ok(Modality::Mixed),
            other => Err(format!("unknown modality: {}", other)),
        }
    }
}

/// Impact level of a block or exercise
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    Low,
    Moderate,
    High,
}

impl FromStr for ImpactLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match canonical_tag(s).as_str() {
            "low" | "low_impact" => Ok(ImpactLevel::Low),
            "moderate" | "medium" => Ok(ImpactLevel::Moderate),
            "high" | "high_impact" => Ok(ImpactLevel::High),
            other => Err(format!("unknown impact level: {}", other)),
        }
    }
}

/// Seconds allotted to each phase; the three values sum to the session total
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseAllocation {
    pub warmup: u32,
    pub main: u32,
    pub cooldown: u32,
}

impl PhaseAllocation {
    pub fn total(&self) -> u32 {
        self.warmup + self.main + self.cooldown
    }
}

/// One focus block of the main phase
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MainBlock {
    pub name: String,
    pub focus_areas: Vec<String>,
    pub modality: Modality,
    pub duration_seconds: u32,
    pub sets: Option<u32>,
    pub rep_scheme: Option<String>,
    pub interval_style: Option<String>,
    pub target_intensity: String,
    pub rest_seconds: u32,
    pub impact_level: ImpactLevel,
    pub equipment_bias: String,
    pub coaching_priority: String,
}

/// Where a macro plan came from
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    /// Deterministic plan, no collaborator involved
    Heuristic,
    /// Planning collaborator output after coercion
    Collaborator,
}

/// Time budget and block outline for a session
///
/// Invariant: `main_blocks` durations sum to `phase_allocation.main`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MacroPlan {
    pub phase_allocation: PhaseAllocation,
    pub warmup_focus: Vec<String>,
    pub main_blocks: Vec<MainBlock>,
    pub cooldown_focus: Vec<String>,
    pub notes: Vec<String>,
    pub source: PlanSource,
}

impl MacroPlan {
    pub fn block_total(&self) -> u32 {
        self.main_blocks.iter().map(|b| b.duration_seconds).sum()
    }

    /// Blocks whose modality is one of `modalities`
    pub fn blocks_for(&self, modalities: &[Modality]) -> Vec<&MainBlock> {
        self.main_blocks
            .iter()
            .filter(|b| modalities.contains(&b.modality))
            .collect()
    }
}

// ============================================================================
// Contribution Types
// ============================================================================

/// What kind of help a contribution provides
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ContributionType {
    Personalization,
    ExerciseSelection,
    CardioProgramming,
    EquipmentOptimization,
    RecoveryProtocols,
    NutritionGuidance,
    MotivationStrategies,
    PerformanceInsights,
    MacroPlan,
    Integration,
    HeuristicDefaults,
}

impl ContributionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionType::Personalization => "personalization",
            ContributionType::ExerciseSelection => "exercise_selection",
            ContributionType::CardioProgramming => "cardio_programming",
            ContributionType::EquipmentOptimization => "equipment_optimization",
            ContributionType::RecoveryProtocols => "recovery_protocols",
            ContributionType::NutritionGuidance => "nutrition_guidance",
            ContributionType::MotivationStrategies => "motivation_strategies",
            ContributionType::PerformanceInsights => "performance_insights",
            ContributionType::MacroPlan => "macro_plan",
            ContributionType::Integration => "integration",
            ContributionType::HeuristicDefaults => "heuristic_defaults",
        }
    }

    /// Plan and integration outputs are inputs to synthesis, not material for it
    pub fn is_synthesis_input(&self) -> bool {
        !matches!(
            self,
            ContributionType::MacroPlan | ContributionType::Integration
        )
    }
}

/// Untrusted payload returned by a collaborator
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ContributionContent {
    Structured(Map<String, Value>),
    FreeText(String),
}

impl ContributionContent {
    pub fn as_structured(&self) -> Option<&Map<String, Value>> {
        match self {
            ContributionContent::Structured(map) => Some(map),
            ContributionContent::FreeText(_) => None,
        }
    }
}

/// One successful collaborator invocation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AgentContribution {
    /// Collaborator name (`strength_coach`, `builtin_library`, ...)
    pub source: String,
    pub contribution_type: ContributionType,
    pub content: ContributionContent,
    pub confidence: f32,
    pub execution_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl AgentContribution {
    pub fn from_collaborator(
        kind: CollaboratorKind,
        content: ContributionContent,
        execution_ms: u64,
    ) -> Self {
        Self {
            source: kind.as_str().to_string(),
            contribution_type: kind.contribution_type(),
            content,
            confidence: kind.confidence(),
            execution_ms,
            timestamp: Utc::now(),
        }
    }
}

// ============================================================================
// Normalized Session Types
// ============================================================================

/// A warmup or cooldown entry after normalization
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NormalizedPhaseItem {
    pub name: String,
    pub duration_seconds: u32,
    pub description: String,
    pub focus: Option<String>,
    pub intensity: Option<String>,
    pub equipment: Option<String>,
    pub coaching_cues: Vec<String>,
}

/// Per-set target of a main exercise
///
/// Repetition-based and time-based work are mutually exclusive, so the
/// serialized exercise carries exactly one of `reps` or `work_seconds`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SetTarget {
    Reps(u32),
    WorkSeconds(u32),
}

/// A main-phase exercise after normalization
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NormalizedMainExercise {
    pub name: String,
    pub sets: u32,
    #[serde(flatten)]
    pub target: SetTarget,
    /// Seconds one set takes
    pub set_duration_seconds: u32,
    pub rest_seconds: u32,
    pub equipment: String,
    pub target_muscles: Vec<String>,
    pub instructions: String,
    pub coaching_cues: Vec<String>,
    pub impact_level: Option<ImpactLevel>,
    pub intensity: Option<String>,
    pub tempo: Option<String>,
    pub block_duration_seconds: u32,
}

impl NormalizedMainExercise {
    pub fn reps(&self) -> Option<u32> {
        match self.target {
            SetTarget::Reps(reps) => Some(reps),
            SetTarget::WorkSeconds(_) => None,
        }
    }

    pub fn work_seconds(&self) -> Option<u32> {
        match self.target {
            SetTarget::WorkSeconds(secs) => Some(secs),
            SetTarget::Reps(_) => None,
        }
    }

    pub fn is_time_based(&self) -> bool {
        matches!(self.target, SetTarget::WorkSeconds(_))
    }
}

/// One way to adapt an exercise
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Modification {
    pub description: String,
    pub equipment: Option<String>,
    pub impact: Option<String>,
}

/// Exact seconds per phase in the final session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseBreakdown {
    pub warmup: u32,
    pub main: u32,
    pub cooldown: u32,
}

impl PhaseBreakdown {
    pub fn total(&self) -> u32 {
        self.warmup + self.main + self.cooldown
    }
}

/// The finished session document
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FinalWorkout {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub summary: String,
    pub workout_type: WorkoutType,
    pub difficulty: Difficulty,
    pub duration_minutes: u32,
    pub warmup: Vec<NormalizedPhaseItem>,
    pub main: Vec<NormalizedMainExercise>,
    pub cooldown: Vec<NormalizedPhaseItem>,
    pub equipment_needed: BTreeSet<String>,
    pub safety_notes: Vec<String>,
    pub modifications: BTreeMap<String, Vec<Modification>>,
    pub total_estimated_duration_seconds: u32,
    pub phase_duration_breakdown: PhaseBreakdown,
    pub estimated_calories: u32,
    pub agent_attribution: BTreeMap<String, ContributionType>,
}
