//! Saved workouts, one JSON document per line.
//!
//! Appends take an exclusive file lock so concurrent CLI runs never
//! interleave lines.

use crate::{FinalWorkout, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Destination for finished workouts
pub trait WorkoutSink {
    fn append(&mut self, workout: &FinalWorkout) -> Result<()>;
}

/// JSONL file sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl WorkoutSink for JsonlSink {
    fn append(&mut self, workout: &FinalWorkout) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let line = serde_json::to_string(workout)?;
        let mut writer = std::io::BufWriter::new(&file);
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;
        tracing::debug!("Saved workout {} to {:?}", workout.id, self.path);
        Ok(())
    }
}

/// Read every saved workout, skipping lines that no longer parse
pub fn read_workouts(path: &Path) -> Result<Vec<FinalWorkout>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let mut workouts = Vec::new();
    for (line_num, line) in BufReader::new(&file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<FinalWorkout>(&line) {
            Ok(workout) => workouts.push(workout),
            Err(e) => {
                tracing::warn!("Skipping unreadable workout at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    Ok(workouts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::heuristic_plan;
    use crate::types::*;
    use chrono::Utc;
    use std::collections::{BTreeMap, BTreeSet};
    use uuid::Uuid;

    fn workout() -> FinalWorkout {
        let request = GenerationRequest {
            workout_type: WorkoutType::Cardio,
            duration_minutes: 20,
            difficulty: Difficulty::Beginner,
            focus_areas: vec![],
            special_requirements: BTreeSet::new(),
            user_context: UserContext::default(),
        };
        let plan = heuristic_plan(&request);
        let allocation = plan.phase_allocation;
        FinalWorkout {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            name: "20-Minute Cardio Workout".into(),
            summary: "Easy intervals".into(),
            workout_type: request.workout_type,
            difficulty: request.difficulty,
            duration_minutes: 20,
            warmup: vec![NormalizedPhaseItem {
                name: "March".into(),
                duration_seconds: allocation.warmup,
                description: String::new(),
                focus: None,
                intensity: None,
                equipment: None,
                coaching_cues: vec![],
            }],
            main: vec![],
            cooldown: vec![],
            equipment_needed: ["bodyweight".to_string()].into_iter().collect(),
            safety_notes: vec![],
            modifications: BTreeMap::new(),
            total_estimated_duration_seconds: allocation.total(),
            phase_duration_breakdown: PhaseBreakdown {
                warmup: allocation.warmup,
                main: allocation.main,
                cooldown: allocation.cooldown,
            },
            estimated_calories: 120,
            agent_attribution: BTreeMap::new(),
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("workouts.jsonl");

        let mut sink = JsonlSink::new(&path);
        let first = workout();
        sink.append(&first).unwrap();
        sink.append(&workout()).unwrap();

        let saved = read_workouts(&path).unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].id, first.id);
        assert_eq!(saved[0].total_estimated_duration_seconds, 1200);
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("workouts.jsonl");

        let mut sink = JsonlSink::new(&path);
        sink.append(&workout()).unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(file, "{{\"truncated\": ").unwrap();
        }
        sink.append(&workout()).unwrap();

        assert_eq!(read_workouts(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let saved = read_workouts(&temp_dir.path().join("none.jsonl")).unwrap();
        assert!(saved.is_empty());
    }
}
