use cogtrial_core::{EngineError, Outcome, TargetId, TrialResult};

/// Suspension points of a trial, delivered back through the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialTimer {
    /// End of the lit interval for recall item `position`
    HideItem { position: usize },
    /// End of the gap before recall item `position`
    ShowItem { position: usize },
    /// Gap after the last item elapsed
    OpenInput,
    /// Transient search reveal is over
    CloseReveal { slot: TargetId },
    /// Failure feedback elapsed, run the same stimulus again
    Replay,
}

/// Output of the engine, drained by the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    DayStarted { day: u8, trials_per_day: usize },
    TrialStarted { trial_index: usize, replay: u32 },
    ItemShown { label: TargetId, position: usize },
    ItemHidden { label: TargetId, position: usize },
    InputOpened { trial_index: usize },
    SlotRevealed { slot: TargetId, target: bool },
    SlotClosed { slot: TargetId },
    OutcomeRecorded { outcome: Outcome, target: TargetId },
    TrialSucceeded(Box<TrialResult>),
    TrialFailed { trial_index: usize },
    /// Waiting for the UI to call `start_next_trial`
    TrialReady { next_index: usize },
    PlacementDegraded { trial_index: usize, passes: u32 },
    /// The recorder rejected a record or could not close the day
    RecorderFailed { day: u8, error: EngineError },
    DayComplete { day: u8 },
}

impl EngineEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EngineEvent::TrialSucceeded(_) | EngineEvent::TrialFailed { .. }
        )
    }
}
