#![forbid(unsafe_code)]

//! Core domain model and generation pipeline for fitcrew.
//!
//! This crate provides:
//! - Domain types (requests, macro plans, contributions, final workouts)
//! - The collaborator contract, output adapters and JSON fixtures
//! - Planning, gathering, synthesis and validation stages
//! - A built-in bodyweight exercise library used as a fallback
//! - The orchestrator tying the stages together under one timeout
//! - A job store and a JSONL sink for generated workouts

pub mod types;
pub mod error;
pub mod duration;
mod fields;
pub mod collaborator;
pub mod adapter;
pub mod fixture;
pub mod briefs;
pub mod config;
pub mod logging;
pub mod catalog;
pub mod planner;
pub mod gather;
pub mod phase;
pub mod exercise;
pub mod synthesis;
pub mod validate;
pub mod orchestrator;
pub mod jobs;
pub mod sink;

// Re-export commonly used types
pub use error::{Error, GenerationError, Result, Stage};
pub use types::*;
pub use collaborator::{Collaborator, CollaboratorError, CollaboratorKind, CollaboratorSet};
pub use fixture::load_fixture_collaborators;
pub use catalog::builtin_library;
pub use config::Config;
pub use orchestrator::{collaborator_stats, CollaboratorStats, GenerationReport, Orchestrator};
pub use jobs::{drive_job, run_job, InMemoryJobStore, JobRecord, JobState, JobStore};
pub use sink::{read_workouts, JsonlSink, WorkoutSink};
