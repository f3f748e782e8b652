//! Job tracking for callers that run generations in the background.
//!
//! A job moves through a small state machine:
//! started -> in_progress -> completed | failed | cancelled.
//! A job can also fail or be cancelled before it starts running.
//! Terminal states accept no further transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, GenerationError, Result};
use crate::orchestrator::Orchestrator;
use crate::types::{FinalWorkout, GenerationRequest};

/// Lifecycle state of a generation job
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Started,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Started => "started",
            JobState::InProgress => "in_progress",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Started, InProgress | Failed | Cancelled)
                | (InProgress, Completed | Failed | Cancelled)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One tracked generation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub id: Uuid,
    pub state: JobState,
    pub request: GenerationRequest,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub workout: Option<FinalWorkout>,
    pub error: Option<String>,
}

/// Storage for job records, keyed by request id
pub trait JobStore: Send + Sync {
    fn create(&self, request: GenerationRequest) -> Result<JobRecord>;

    fn get(&self, id: Uuid) -> Result<Option<JobRecord>>;

    /// Move a job to `next`, rejecting transitions the state machine forbids
    fn transition(&self, id: Uuid, next: JobState) -> Result<JobRecord>;

    /// Store a generation outcome as completed or failed
    fn record_result(
        &self,
        id: Uuid,
        result: std::result::Result<FinalWorkout, GenerationError>,
    ) -> Result<JobRecord>;

    /// All jobs, oldest first
    fn list(&self) -> Result<Vec<JobRecord>>;

    /// Forget one job, returning its last record
    fn remove(&self, id: Uuid) -> Result<Option<JobRecord>>;

    /// Forget every job in a terminal state; returns how many were dropped
    fn prune_terminal(&self) -> Result<usize>;
}

/// Process-local job store
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, id: Uuid, next: JobState, apply: F) -> Result<JobRecord>
    where
        F: FnOnce(&mut JobRecord),
    {
        let mut jobs = self.jobs.write().map_err(|_| poisoned())?;
        let record = jobs
            .get_mut(&id)
            .ok_or_else(|| Error::Job(format!("unknown job {}", id)))?;

        if !record.state.can_transition_to(next) {
            return Err(Error::Job(format!(
                "job {} cannot move from {} to {}",
                id, record.state, next
            )));
        }

        record.state = next;
        record.updated_at = Utc::now();
        apply(record);
        tracing::debug!("Job {} is now {}", id, next);
        Ok(record.clone())
    }
}

fn poisoned() -> Error {
    Error::Job("job store lock poisoned".into())
}

impl JobStore for InMemoryJobStore {
    fn create(&self, request: GenerationRequest) -> Result<JobRecord> {
        let now = Utc::now();
        let record = JobRecord {
            id: Uuid::new_v4(),
            state: JobState::Started,
            request,
            created_at: now,
            updated_at: now,
            workout: None,
            error: None,
        };
        self.jobs
            .write()
            .map_err(|_| poisoned())?
            .insert(record.id, record.clone());
        tracing::debug!("Created job {}", record.id);
        Ok(record)
    }

    fn get(&self, id: Uuid) -> Result<Option<JobRecord>> {
        Ok(self.jobs.read().map_err(|_| poisoned())?.get(&id).cloned())
    }

    fn transition(&self, id: Uuid, next: JobState) -> Result<JobRecord> {
        self.update(id, next, |_| {})
    }

    fn record_result(
        &self,
        id: Uuid,
        result: std::result::Result<FinalWorkout, GenerationError>,
    ) -> Result<JobRecord> {
        match result {
            Ok(workout) => self.update(id, JobState::Completed, |record| {
                record.workout = Some(workout);
            }),
            Err(e) => self.update(id, JobState::Failed, |record| {
                record.error = Some(e.to_string());
            }),
        }
    }

    fn list(&self) -> Result<Vec<JobRecord>> {
        let mut records: Vec<JobRecord> = self
            .jobs
            .read()
            .map_err(|_| poisoned())?
            .values()
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    fn remove(&self, id: Uuid) -> Result<Option<JobRecord>> {
        let removed = self.jobs.write().map_err(|_| poisoned())?.remove(&id);
        if removed.is_some() {
            tracing::debug!("Removed job {}", id);
        }
        Ok(removed)
    }

    fn prune_terminal(&self) -> Result<usize> {
        let mut jobs = self.jobs.write().map_err(|_| poisoned())?;
        let before = jobs.len();
        jobs.retain(|_, record| !record.state.is_terminal());
        let pruned = before - jobs.len();
        tracing::debug!(pruned, remaining = jobs.len(), "Pruned finished jobs");
        Ok(pruned)
    }
}

/// Create a job for `request` and run it to a terminal state
pub async fn run_job<S>(
    store: &S,
    orchestrator: &Orchestrator,
    request: GenerationRequest,
) -> Result<JobRecord>
where
    S: JobStore + ?Sized,
{
    let id = store.create(request)?.id;
    drive_job(store, orchestrator, id).await
}

/// Drive an existing job through generation.
///
/// A job cancelled while generation runs keeps its cancelled state; the
/// late result is discarded.
pub async fn drive_job<S>(store: &S, orchestrator: &Orchestrator, id: Uuid) -> Result<JobRecord>
where
    S: JobStore + ?Sized,
{
    let record = match store.transition(id, JobState::InProgress) {
        Ok(record) => record,
        Err(e) => return settled_or(store, id, e),
    };

    let result = orchestrator.generate(&record.request).await;
    match store.record_result(id, result) {
        Ok(record) => Ok(record),
        Err(e) => settled_or(store, id, e),
    }
}

/// The stored record if the job was cancelled, otherwise the error
fn settled_or<S>(store: &S, id: Uuid, error: Error) -> Result<JobRecord>
where
    S: JobStore + ?Sized,
{
    match store.get(id)? {
        Some(record) if record.state == JobState::Cancelled => {
            tracing::info!("Job {} was cancelled, discarding its result", id);
            Ok(record)
        }
        _ => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::mock::StaticCollaborator;
    use crate::collaborator::{CollaboratorKind, CollaboratorSet};
    use crate::config::GenerationConfig;
    use crate::types::{Difficulty, UserContext, WorkoutType};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn request(minutes: u32) -> GenerationRequest {
        GenerationRequest {
            workout_type: WorkoutType::Hiit,
            duration_minutes: minutes,
            difficulty: Difficulty::Beginner,
            focus_areas: vec![],
            special_requirements: Default::default(),
            user_context: UserContext::default(),
        }
    }

    #[test]
    fn test_state_machine() {
        use JobState::*;
        assert!(Started.can_transition_to(InProgress));
        assert!(Started.can_transition_to(Cancelled));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Failed));
        assert!(!Started.can_transition_to(Completed));
        assert!(!InProgress.can_transition_to(Started));
        for terminal in [Completed, Failed, Cancelled] {
            assert!(terminal.is_terminal());
            for next in [Started, InProgress, Completed, Failed, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_illegal_transition_is_job_error() {
        let store = InMemoryJobStore::new();
        let job = store.create(request(20)).unwrap();

        assert!(matches!(
            store.transition(job.id, JobState::Completed),
            Err(Error::Job(_))
        ));
        store.transition(job.id, JobState::Cancelled).unwrap();
        assert!(store.transition(job.id, JobState::InProgress).is_err());
        assert!(matches!(
            store.transition(Uuid::new_v4(), JobState::InProgress),
            Err(Error::Job(_))
        ));
    }

    #[test]
    fn test_finished_jobs_can_be_evicted() {
        let store = InMemoryJobStore::new();
        let done = store.create(request(20)).unwrap().id;
        let running = store.create(request(20)).unwrap().id;
        let cancelled = store.create(request(20)).unwrap().id;
        let queued = store.create(request(20)).unwrap().id;

        store.transition(done, JobState::InProgress).unwrap();
        store.transition(done, JobState::Failed).unwrap();
        store.transition(running, JobState::InProgress).unwrap();
        store.transition(cancelled, JobState::Cancelled).unwrap();

        assert_eq!(store.prune_terminal().unwrap(), 2);
        assert!(store.get(done).unwrap().is_none());
        assert!(store.get(cancelled).unwrap().is_none());
        assert_eq!(store.list().unwrap().len(), 2);

        let removed = store.remove(queued).unwrap().unwrap();
        assert_eq!(removed.state, JobState::Started);
        assert!(store.remove(queued).unwrap().is_none());
        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.prune_terminal().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_job_completes() {
        let store = InMemoryJobStore::new();
        let orchestrator = Orchestrator::new(CollaboratorSet::new(), GenerationConfig::default());
        let record = run_job(&store, &orchestrator, request(20)).await.unwrap();
        assert_eq!(record.state, JobState::Completed);
        assert_eq!(
            record.workout.map(|w| w.total_estimated_duration_seconds),
            Some(1200)
        );
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_job_records_failure() {
        let store = InMemoryJobStore::new();
        let settings = GenerationConfig {
            use_builtin_library: false,
            ..Default::default()
        };
        let orchestrator = Orchestrator::new(CollaboratorSet::new(), settings);
        let record = run_job(&store, &orchestrator, request(20)).await.unwrap();
        assert_eq!(record.state, JobState::Failed);
        assert!(record.error.unwrap().contains("validation"));
    }

    #[tokio::test]
    async fn test_cancel_while_running_wins() {
        let store = Arc::new(InMemoryJobStore::new());
        let slow = CollaboratorSet::new().with(
            CollaboratorKind::CardioCoach,
            Arc::new(
                StaticCollaborator::structured(json!({"intervals": []}))
                    .delayed(Duration::from_millis(300)),
            ),
        );
        let orchestrator = Orchestrator::new(slow, GenerationConfig::default());
        let id = store.create(request(20)).unwrap().id;

        let handle = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { drive_job(store.as_ref(), &orchestrator, id).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        store.transition(id, JobState::Cancelled).unwrap();

        let record = handle.await.unwrap().unwrap();
        assert_eq!(record.state, JobState::Cancelled);
        assert!(record.workout.is_none());
    }
}
