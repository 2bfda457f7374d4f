//! Trial engine for sequence-recall and spatial-search cognitive tasks.
//!
//! Re-exports the workspace crates: `data` (trial model), `timing` (clocks
//! and the cooperative scheduler) and `engine` (generators, trial state
//! machine, day scheduler).

pub use cogtrial_core as data;
pub use cogtrial_engine as engine;
pub use cogtrial_timing as timing;

pub use cogtrial_core::{EngineError, Result, SessionRecord, Stimulus, TaskKind, TrialResult};
pub use cogtrial_engine::{DayScheduler, DayTable, EngineEvent, MemoryRecorder, SessionRecorder};
pub use cogtrial_timing::{CooperativeScheduler, HighPrecisionTimer, ManualClock, Timer};
