//! Built-in bodyweight exercise library.
//!
//! Supplies heuristic defaults for phases that no collaborator filled. The
//! library contribution is shaped like a specialist's answer so it travels
//! through the same normalizers as everything else.

use chrono::Utc;
use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};

use crate::types::*;

/// Source name used when attributing library content
pub const LIBRARY_SOURCE: &str = "builtin_library";

const LIBRARY_CONFIDENCE: f32 = 0.6;

/// Seconds of phase budget per warmup/cooldown item
const SECONDS_PER_DRILL: u32 = 60;
const MAX_DRILLS: u32 = 5;

/// Seconds of main budget per exercise
const SECONDS_PER_EXERCISE: u32 = 240;
const MAX_EXERCISES: u32 = 8;

/// A warmup or cooldown drill
#[derive(Clone, Debug)]
pub struct Drill {
    pub name: &'static str,
    pub focus: &'static str,
    pub instructions: &'static str,
    pub cues: &'static [&'static str],
}

/// A main-phase exercise
#[derive(Clone, Debug)]
pub struct LibraryExercise {
    pub name: &'static str,
    pub modality: Modality,
    pub impact: ImpactLevel,
    pub target: SetTarget,
    pub target_muscles: &'static [&'static str],
    pub instructions: &'static str,
    pub cues: &'static [&'static str],
}

/// All built-in content
#[derive(Clone, Debug)]
pub struct Library {
    pub warmup: Vec<Drill>,
    pub main: Vec<LibraryExercise>,
    pub cooldown: Vec<Drill>,
}

/// Cached library - built once and reused across all generations
static BUILTIN_LIBRARY: Lazy<Library> = Lazy::new(build_library);

/// Get a reference to the cached built-in library
pub fn builtin_library() -> &'static Library {
    &BUILTIN_LIBRARY
}

fn build_library() -> Library {
    // ========================================================================
    // Warmup
    // ========================================================================

    let warmup = vec![
        Drill {
            name: "March in Place",
            focus: "activation",
            instructions: "March with tall posture, driving the knees to hip height.",
            cues: &["Swing the arms", "Breathe steadily"],
        },
        Drill {
            name: "Arm Circles",
            focus: "mobility",
            instructions: "Circle the arms forward then backward, growing the circles.",
            cues: &["Keep ribs down", "Move from the shoulder"],
        },
        Drill {
            name: "Hip Circles",
            focus: "mobility",
            instructions: "Hands on hips, draw slow circles in both directions.",
            cues: &["Keep knees soft"],
        },
        Drill {
            name: "Bodyweight Good Morning",
            focus: "activation",
            instructions: "Hinge at the hips with a flat back, then stand tall.",
            cues: &["Push hips back", "Squeeze glutes at the top"],
        },
        Drill {
            name: "World's Greatest Stretch",
            focus: "mobility",
            instructions: "Step into a lunge, drop the inside elbow, then rotate open.",
            cues: &["Follow the hand with your eyes"],
        },
        Drill {
            name: "Inchworm",
            focus: "activation",
            instructions: "Walk the hands out to a plank and back to standing.",
            cues: &["Brace the core", "Soft knees are fine"],
        },
    ];

    // ========================================================================
    // Main
    // ========================================================================

    let main = vec![
        LibraryExercise {
            name: "Bodyweight Squat",
            modality: Modality::Strength,
            impact: ImpactLevel::Low,
            target: SetTarget::Reps(12),
            target_muscles: &["quadriceps", "glutes"],
            instructions: "Sit the hips back and down, then drive up through the whole foot.",
            cues: &["Chest proud", "Knees track over toes"],
        },
        LibraryExercise {
            name: "Push-up",
            modality: Modality::Strength,
            impact: ImpactLevel::Low,
            target: SetTarget::Reps(10),
            target_muscles: &["chest", "triceps", "shoulders"],
            instructions: "Lower the chest to just above the floor and press back up.",
            cues: &["Body in one line", "Elbows at 45 degrees"],
        },
        LibraryExercise {
            name: "Reverse Lunge",
            modality: Modality::Strength,
            impact: ImpactLevel::Low,
            target: SetTarget::Reps(10),
            target_muscles: &["quadriceps", "glutes", "hamstrings"],
            instructions: "Step back, lower the rear knee, and return to standing.",
            cues: &["Front heel stays down"],
        },
        LibraryExercise {
            name: "Glute Bridge",
            modality: Modality::Strength,
            impact: ImpactLevel::Low,
            target: SetTarget::Reps(15),
            target_muscles: &["glutes", "hamstrings"],
            instructions: "Lying on your back, drive the hips up and pause at the top.",
            cues: &["Ribs down", "Squeeze at the top"],
        },
        LibraryExercise {
            name: "Forearm Plank",
            modality: Modality::Core,
            impact: ImpactLevel::Low,
            target: SetTarget::WorkSeconds(40),
            target_muscles: &["core", "shoulders"],
            instructions: "Hold a straight line from head to heels on the forearms.",
            cues: &["Tuck the pelvis", "Breathe through the brace"],
        },
        LibraryExercise {
            name: "Dead Bug",
            modality: Modality::Core,
            impact: ImpactLevel::Low,
            target: SetTarget::Reps(12),
            target_muscles: &["core"],
            instructions: "Extend opposite arm and leg while the low back stays down.",
            cues: &["Move slowly", "Exhale as you reach"],
        },
        LibraryExercise {
            name: "Pike Push-up",
            modality: Modality::Strength,
            impact: ImpactLevel::Low,
            target: SetTarget::Reps(8),
            target_muscles: &["shoulders", "triceps"],
            instructions: "From a pike position, bend the elbows to bring the head toward the floor.",
            cues: &["Hips high"],
        },
        LibraryExercise {
            name: "Step Jacks",
            modality: Modality::Cardio,
            impact: ImpactLevel::Low,
            target: SetTarget::WorkSeconds(40),
            target_muscles: &["full_body"],
            instructions: "Step one foot out while raising the arms, alternating sides.",
            cues: &["Stay light", "Keep a steady rhythm"],
        },
        LibraryExercise {
            name: "Skater Steps",
            modality: Modality::Cardio,
            impact: ImpactLevel::Low,
            target: SetTarget::WorkSeconds(40),
            target_muscles: &["glutes", "legs"],
            instructions: "Step laterally into a small curtsy, alternating sides.",
            cues: &["Sink into the hips"],
        },
        LibraryExercise {
            name: "Shadow Boxing",
            modality: Modality::Cardio,
            impact: ImpactLevel::Low,
            target: SetTarget::WorkSeconds(45),
            target_muscles: &["shoulders", "core"],
            instructions: "Throw controlled punch combinations with light footwork.",
            cues: &["Rotate through the hips", "Guard up"],
        },
        LibraryExercise {
            name: "Mountain Climbers",
            modality: Modality::Cardio,
            impact: ImpactLevel::Moderate,
            target: SetTarget::WorkSeconds(30),
            target_muscles: &["core", "hip_flexors"],
            instructions: "From a high plank, drive the knees toward the chest alternately.",
            cues: &["Shoulders over wrists"],
        },
        LibraryExercise {
            name: "Jumping Jacks",
            modality: Modality::Cardio,
            impact: ImpactLevel::Moderate,
            target: SetTarget::WorkSeconds(40),
            target_muscles: &["full_body"],
            instructions: "Jump the feet out while raising the arms overhead, then return.",
            cues: &["Land softly"],
        },
        LibraryExercise {
            name: "Burpee",
            modality: Modality::Cardio,
            impact: ImpactLevel::High,
            target: SetTarget::Reps(8),
            target_muscles: &["full_body"],
            instructions: "Squat, kick back to a plank, return, and jump.",
            cues: &["Land softly", "Keep the core tight"],
        },
        LibraryExercise {
            name: "Deep Squat Hold",
            modality: Modality::Mobility,
            impact: ImpactLevel::Low,
            target: SetTarget::WorkSeconds(45),
            target_muscles: &["hips", "ankles"],
            instructions: "Sit in a deep squat, using the elbows to open the knees.",
            cues: &["Heels down", "Long spine"],
        },
        LibraryExercise {
            name: "Thoracic Rotations",
            modality: Modality::Mobility,
            impact: ImpactLevel::Low,
            target: SetTarget::Reps(10),
            target_muscles: &["upper_back"],
            instructions: "On all fours, place a hand behind the head and rotate the elbow up.",
            cues: &["Follow the elbow with your eyes"],
        },
        LibraryExercise {
            name: "90/90 Hip Switches",
            modality: Modality::Mobility,
            impact: ImpactLevel::Low,
            target: SetTarget::Reps(10),
            target_muscles: &["hips"],
            instructions: "Seated with both knees bent at 90 degrees, rotate the knees side to side.",
            cues: &["Sit tall"],
        },
        LibraryExercise {
            name: "Single-Leg Balance Reach",
            modality: Modality::Balance,
            impact: ImpactLevel::Low,
            target: SetTarget::Reps(8),
            target_muscles: &["ankles", "glutes"],
            instructions: "Balance on one leg and reach the free foot forward, sideways and back.",
            cues: &["Stance knee soft", "Hips level"],
        },
    ];

    // ========================================================================
    // Cooldown
    // ========================================================================

    let cooldown = vec![
        Drill {
            name: "Child's Pose",
            focus: "flexibility",
            instructions: "Sit back on the heels and reach the arms long.",
            cues: &["Breathe into the back"],
        },
        Drill {
            name: "Standing Hamstring Stretch",
            focus: "flexibility",
            instructions: "Hinge over a straight front leg until you feel a stretch.",
            cues: &["Flat back"],
        },
        Drill {
            name: "Figure-Four Stretch",
            focus: "flexibility",
            instructions: "Lying down, cross one ankle over the opposite knee and pull gently.",
            cues: &["Relax the shoulders"],
        },
        Drill {
            name: "Doorway Chest Opener",
            focus: "flexibility",
            instructions: "Forearm on a wall or doorframe, turn gently away.",
            cues: &["Keep the shoulder down"],
        },
        Drill {
            name: "Box Breathing",
            focus: "breathing",
            instructions: "Inhale, hold, exhale and hold for four counts each.",
            cues: &["Slow and even"],
        },
        Drill {
            name: "Supine Twist",
            focus: "flexibility",
            instructions: "Lying on your back, drop both knees to one side, then switch.",
            cues: &["Shoulders stay grounded"],
        },
    ];

    Library {
        warmup,
        main,
        cooldown,
    }
}

/// Which phases still need content
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhaseGaps {
    pub warmup: bool,
    pub main: bool,
    pub cooldown: bool,
}

impl PhaseGaps {
    pub fn any(&self) -> bool {
        self.warmup || self.main || self.cooldown
    }
}

/// Library content sized to the plan, only for the phases in `gaps`
pub fn library_contribution(
    request: &GenerationRequest,
    plan: &MacroPlan,
    gaps: PhaseGaps,
) -> Option<AgentContribution> {
    if !gaps.any() {
        return None;
    }

    let library = builtin_library();
    let mut content = Map::new();
    if gaps.warmup {
        content.insert(
            "warmup".into(),
            drill_items(&library.warmup, plan.phase_allocation.warmup, "light"),
        );
    }
    if gaps.main {
        content.insert("exercises".into(), main_items(library, request, plan));
    }
    if gaps.cooldown {
        content.insert(
            "cooldown".into(),
            drill_items(&library.cooldown, plan.phase_allocation.cooldown, "light"),
        );
    }
    content.insert(
        "safety_notes".into(),
        json!(["Stop any movement that causes sharp pain"]),
    );

    tracing::info!(
        warmup = gaps.warmup,
        main = gaps.main,
        cooldown = gaps.cooldown,
        "Filling phases from the built-in library"
    );

    Some(AgentContribution {
        source: LIBRARY_SOURCE.to_string(),
        contribution_type: ContributionType::HeuristicDefaults,
        content: ContributionContent::Structured(content),
        confidence: LIBRARY_CONFIDENCE,
        execution_ms: 0,
        timestamp: Utc::now(),
    })
}

/// Split `total` into `count` parts, remainder on the first parts
fn even_split(total: u32, count: u32) -> impl Iterator<Item = u32> {
    let base = total / count;
    let remainder = total % count;
    (0..count).map(move |i| base + u32::from(i < remainder))
}

fn drill_items(drills: &[Drill], seconds: u32, intensity: &str) -> Value {
    let count = (seconds / SECONDS_PER_DRILL).clamp(1, MAX_DRILLS.min(drills.len() as u32));
    let items: Vec<Value> = drills
        .iter()
        .zip(even_split(seconds, count))
        .map(|(drill, duration)| {
            json!({
                "name": drill.name,
                "duration_seconds": duration,
                "instructions": drill.instructions,
                "coaching_cues": drill.cues,
                "focus": drill.focus,
                "intensity": intensity,
                "equipment": "bodyweight",
            })
        })
        .collect();
    Value::Array(items)
}

fn pool_matches(exercise: &LibraryExercise, modality: Modality, low_impact: bool) -> bool {
    if low_impact && exercise.impact != ImpactLevel::Low {
        return false;
    }
    match modality {
        Modality::Strength | Modality::Core => {
            matches!(exercise.modality, Modality::Strength | Modality::Core)
        }
        Modality::Cardio => exercise.modality == Modality::Cardio,
        Modality::Mobility | Modality::Balance => {
            matches!(exercise.modality, Modality::Mobility | Modality::Balance)
        }
        Modality::Mixed => true,
    }
}

fn main_items(library: &Library, request: &GenerationRequest, plan: &MacroPlan) -> Value {
    let seconds = plan.phase_allocation.main;
    let count = (seconds / SECONDS_PER_EXERCISE).clamp(1, MAX_EXERCISES);
    let low_impact = request.is_low_impact();

    let mut used: Vec<&str> = Vec::new();
    let mut items = Vec::new();
    for (i, block_seconds) in even_split(seconds, count).enumerate() {
        let block = plan.main_blocks.get(i % plan.main_blocks.len().max(1));
        let modality = block.map(|b| b.modality).unwrap_or(Modality::Mixed);

        let pool: Vec<&LibraryExercise> = library
            .main
            .iter()
            .filter(|e| pool_matches(e, modality, low_impact))
            .collect();
        let pick = pool
            .iter()
            .find(|e| !used.contains(&e.name))
            .or_else(|| pool.get(i % pool.len().max(1)))
            .copied();
        let Some(exercise) = pick else {
            continue;
        };
        used.push(exercise.name);

        let sets = block.and_then(|b| b.sets).unwrap_or(3);
        let rest = block
            .map(|b| b.rest_seconds)
            .unwrap_or_else(|| request.difficulty.default_rest_seconds());
        let mut item = json!({
            "name": exercise.name,
            "sets": sets,
            "rest_seconds": rest,
            "equipment": "bodyweight",
            "target_muscles": exercise.target_muscles,
            "instructions": exercise.instructions,
            "coaching_cues": exercise.cues,
            "impact_level": exercise.impact,
            "intensity": block.map(|b| b.target_intensity.as_str()).unwrap_or("moderate"),
            "block_duration_seconds": block_seconds,
        });
        if let Value::Object(map) = &mut item {
            match exercise.target {
                SetTarget::Reps(reps) => map.insert("reps".into(), json!(reps)),
                SetTarget::WorkSeconds(secs) => map.insert("work_seconds".into(), json!(secs)),
            };
        }
        items.push(item);
    }
    Value::Array(items)
}
