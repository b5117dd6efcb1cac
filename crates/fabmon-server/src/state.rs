use crate::config::ServerConfig;
use chrono::{DateTime, Utc};
use fabmon_alarm::engine::AlarmEngine;
use fabmon_storage::store::SqliteAlarmStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AlarmEngine>,
    pub store: Arc<SqliteAlarmStore>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}
