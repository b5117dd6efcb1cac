//! Shared domain types for the fabmon alarm engine.
//!
//! Alarm catalog types ([`types::AlarmType`], [`types::AlarmConfig`]),
//! engine-owned documents ([`types::AlarmEvent`], [`types::AlarmOccurrence`])
//! and the sequential occurrence identifier allocator ([`ident`]).

pub mod ident;
pub mod types;
