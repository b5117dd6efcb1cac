//! HTTP surface for the alarm engine: poll trigger, acknowledgment and
//! snooze operations, event inspection, and seed-file loading.

pub mod api;
pub mod app;
pub mod config;
pub mod logging;
pub mod seed;
pub mod state;
