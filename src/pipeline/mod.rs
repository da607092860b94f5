//! Polling pipeline.
//!
//! - `detect_changes`: compare a listing with the stored watermark
//! - `Notifier::run_cycle`: one fetch → diff → enrich → persist → emit pass
//! - `run_poll`: run a cycle for every topic concurrently

pub mod cycle;
pub mod detect;
pub mod poll;

pub use cycle::{AbortReason, CycleOutcome, CycleReport, CycleState, InspectReport, Notifier};
pub use detect::{ChangePlan, detect_changes};
pub use poll::{PollSummary, TopicFailure, run_poll};
