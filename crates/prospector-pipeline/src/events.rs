//! Run event system for observability.
//!
//! Emits [`PipelineEvent`]s via a [`tokio::sync::broadcast`] channel so that
//! external observers (loggers, progress displays, etc.) can follow a run
//! without coupling to the controller internals.

use serde::{Deserialize, Serialize};

use prospector_types::Progress;

/// Why a profile produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    OpenFailed,
    ProfileTextMissing,
    TenureMissing,
    TenureIneligible,
    NoMatch,
    JudgeError,
    ContactUnresolved,
    IterationError,
}

/// Events emitted during a harvest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    RunStarted {
        profile_count: usize,
    },
    ProfileStarted {
        ordinal: u64,
        url: String,
    },
    ProfileSkipped {
        ordinal: u64,
        url: String,
        reason: SkipReason,
        progress: Progress,
    },
    RecordAppended {
        ordinal: u64,
        url: String,
        progress: Progress,
    },
    SnapshotSaved {
        rows_written: usize,
        progress: Progress,
    },
    RunCompleted {
        progress: Progress,
        duration_ms: u64,
    },
    RunFailed {
        error: String,
        progress: Progress,
    },
}

/// Event emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct EventEmitter {
    sender: tokio::sync::broadcast::Sender<PipelineEvent>,
}

impl EventEmitter {
    /// Create a new emitter with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    ///
    /// If there are no active receivers the event is silently dropped.
    pub fn emit(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}
