pub mod error;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use error::{EngineError, Result};
pub use phase::TrialPhase;
pub use stimulus::{Point, Rect, SlotLayout, Stimulus, TargetId, TaskKind};
pub use trial::{
    Outcome, OutcomeCounts, SelectionEvent, SelectionRecord, SessionRecord, SlotPosition,
    TrialResult,
};
