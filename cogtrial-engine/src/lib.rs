pub mod classify;
pub mod config;
pub mod day;
pub mod events;
pub mod generator;
pub mod recorder;
pub mod state;
pub mod trial;
pub use classify::{Classification, IgnoreReason, ResponseState, SlotState, classify};
pub use config::{DayConfig, DayTable, PlacementConfig, Timing};
pub use day::DayScheduler;
pub use events::{EngineEvent, TrialTimer};
pub use generator::{
    NonOverlappingPlacementGenerator, Placement, UniqueSequenceGenerator, partial_shuffle,
};
pub use recorder::{MemoryRecorder, SessionRecorder};
pub use state::{Settlement, TrialStateMachine};
pub use trial::{Trial, TrialSpec, TrialTimestamps};
