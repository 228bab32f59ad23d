//! Pipeline orchestration
//!
//! This module sequences the pipeline phases:
//! - Discovery across all sources, merged into one persisted frontier
//! - Extraction of every frontier item into a dated snapshot
//! - Quality reporting and completeness gates
//!
//! Each phase resumes from its own checkpoint when one is unfinished.

mod coordinator;
mod discovery;
mod extraction;

pub use coordinator::{
    run_pipeline, Coordinator, RunMode, RunOptions, RunOutcome, RUN_ID_FORMAT,
};
pub use discovery::{run_discovery, DiscoveryRun, PREVIOUS_FRONTIER_SOURCE};
pub use extraction::{run_extraction_phase, ExtractionPhase};

use crate::storage::{load_checkpoint_state, Checkpoint, CheckpointState};
use crate::ScoutError;
use std::path::Path;

/// Loads a checkpoint that a new run may continue from
///
/// Finished checkpoints and absent files yield `None`. A checkpoint whose
/// primary and backup are both unusable aborts the run when `strict` is set
/// and is otherwise ignored.
pub(crate) fn load_resumable<T: Checkpoint>(
    path: &Path,
    strict: bool,
) -> Result<Option<T>, ScoutError> {
    match load_checkpoint_state::<T>(path) {
        CheckpointState::Loaded(checkpoint) if checkpoint.is_finished() => {
            tracing::info!(
                "Checkpoint {} belongs to a finished run, starting fresh",
                path.display()
            );
            Ok(None)
        }
        CheckpointState::Loaded(checkpoint) => Ok(Some(checkpoint)),
        CheckpointState::Absent => Ok(None),
        CheckpointState::Unrecoverable if strict => {
            Err(ScoutError::CheckpointCorrupt(path.display().to_string()))
        }
        CheckpointState::Unrecoverable => {
            tracing::warn!(
                "Ignoring unusable checkpoint {}, starting fresh",
                path.display()
            );
            Ok(None)
        }
    }
}
