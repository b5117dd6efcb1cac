//! Alarm rule evaluation and occurrence lifecycle engine.
//!
//! A poll cycle fetches one telemetry snapshot, evaluates every alarm
//! configuration's threshold rules against it, and drives the per-config
//! occurrence state machine (open, update-in-place, close) through the
//! [`fabmon_storage::AlarmStore`]. Acknowledgment and snooze run
//! independently of the poll loop. See [`engine::AlarmEngine`].

pub mod engine;
pub mod error;
pub mod eval;
pub mod lifecycle;
pub mod snapshot;
