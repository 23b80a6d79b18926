//! Event types for debate coordination
//!
//! Every state transition of the orchestrator and the health monitor is
//! announced with one of these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::debate::RunKind;
use crate::health::HealthStatus;

/// All debate coordination events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DebateEvent {
    /// An orchestration task began (any predecessor was cancelled first)
    RunStarted {
        run_id: u64,
        kind: RunKind,
        timestamp: DateTime<Utc>,
    },

    /// Both personas answered and the round was appended
    RoundCommitted {
        run_id: u64,
        round_id: Uuid,
        round_index: usize,
        model: String,
        timestamp: DateTime<Utc>,
    },

    /// The task failed; nothing was appended
    RunFailed {
        run_id: u64,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// The task was superseded or stopped; nothing was appended
    RunCancelled {
        run_id: u64,
        timestamp: DateTime<Utc>,
    },

    /// Round history was cleared
    HistoryReset { timestamp: DateTime<Utc> },

    /// Backend reachability changed
    HealthChanged {
        from: HealthStatus,
        to: HealthStatus,
        timestamp: DateTime<Utc>,
    },
}

impl DebateEvent {
    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DebateEvent::RunStarted { timestamp, .. } => *timestamp,
            DebateEvent::RoundCommitted { timestamp, .. } => *timestamp,
            DebateEvent::RunFailed { timestamp, .. } => *timestamp,
            DebateEvent::RunCancelled { timestamp, .. } => *timestamp,
            DebateEvent::HistoryReset { timestamp } => *timestamp,
            DebateEvent::HealthChanged { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            DebateEvent::RunStarted { .. } => "run_started",
            DebateEvent::RoundCommitted { .. } => "round_committed",
            DebateEvent::RunFailed { .. } => "run_failed",
            DebateEvent::RunCancelled { .. } => "run_cancelled",
            DebateEvent::HistoryReset { .. } => "history_reset",
            DebateEvent::HealthChanged { .. } => "health_changed",
        }
    }
}
