/// Result alias used across the engine crates
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the trial engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// No entry in the day table for this day number
    #[error("no configuration for day {0}")]
    MissingDay(u8),

    /// Day table or layout settings failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The sampling rectangle left after padding and item footprint is empty
    #[error("placement infeasible: sampling area is {width}x{height} after padding")]
    PlacementInfeasible { width: f32, height: f32 },

    /// A trial operation was requested before `start_day`
    #[error("no day has been started")]
    NoActiveDay,

    /// The session recorder rejected a record
    #[error("recorder error: {0}")]
    Recorder(String),
}

impl EngineError {
    /// Errors that stem from bad configuration and abort a day start
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EngineError::MissingDay(_)
                | EngineError::InvalidConfig(_)
                | EngineError::PlacementInfeasible { .. }
        )
    }
}
