pub mod scheduler;
pub mod timer;

pub use scheduler::{CooperativeScheduler, Fired, OwnerId, Scheduler, TimerHandle, TimerQueue};
pub use timer::{HighPrecisionTimer, ManualClock, Timer};
