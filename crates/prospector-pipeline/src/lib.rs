//! Harvest pipeline: enumeration, tenure gating, match judging, contact
//! resolution, and csv persistence, driven sequentially by
//! [`PipelineController`] with cooperative pause points between stages.

pub mod engine;
pub mod events;
pub mod pause;
pub mod resolver;
pub mod source;
pub mod store;

pub use engine::{PipelineController, RunConfig, RunSummary};
pub use events::{EventEmitter, PipelineEvent, SkipReason};
pub use pause::{GateState, PauseGate};
pub use resolver::{normalize_display_name, ContactResolver, Resolution};
pub use source::{
    FieldRole, ProfileContext, ProfileHandle, ProfileSource, ScriptedProfile, ScriptedSource,
};
pub use store::{ResultStore, SnapshotReport, SINK_HEADERS};
