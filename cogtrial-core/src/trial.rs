use serde::{Deserialize, Serialize};

use crate::stimulus::{Stimulus, TargetId, TaskKind};

/// Classification of a single selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    NewCorrect,
    NewIncorrect,
    /// Between-error: an already revealed empty slot picked again
    RepeatEmpty,
    /// Within-error: an already revealed target slot picked again
    RepeatTarget,
    SequenceBreak,
}

impl Outcome {
    pub const ALL: [Outcome; 5] = [
        Outcome::NewCorrect,
        Outcome::NewIncorrect,
        Outcome::RepeatEmpty,
        Outcome::RepeatTarget,
        Outcome::SequenceBreak,
    ];

    /// Whether this outcome counts toward `wrong_attempts`.
    /// Opening an empty slot for the first time is ordinary search, not a mistake.
    pub fn is_error(&self, task: TaskKind) -> bool {
        match self {
            Outcome::NewCorrect => false,
            Outcome::NewIncorrect => task == TaskKind::SequenceRecall,
            Outcome::RepeatEmpty | Outcome::RepeatTarget | Outcome::SequenceBreak => true,
        }
    }

    /// Telemetry vocabulary used in selection logs
    pub fn tag(&self, task: TaskKind) -> &'static str {
        match (task, self) {
            (TaskKind::SpatialSearch, Outcome::NewCorrect) => "treasure",
            (TaskKind::SpatialSearch, Outcome::NewIncorrect) => "empty",
            (TaskKind::SequenceRecall, Outcome::NewCorrect) => "correct",
            (TaskKind::SequenceRecall, Outcome::NewIncorrect) => "wrong_order",
            (_, Outcome::RepeatEmpty) => "between_error",
            (_, Outcome::RepeatTarget) => "within_error",
            (_, Outcome::SequenceBreak) => "sequence_break",
        }
    }
}

/// Per-kind tallies for one trial
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub new_correct: u32,
    pub new_incorrect: u32,
    pub repeat_empty: u32,
    pub repeat_target: u32,
    pub sequence_break: u32,
}

impl OutcomeCounts {
    pub fn add(&mut self, outcome: Outcome) {
        *self.slot_mut(outcome) += 1;
    }

    pub fn get(&self, outcome: Outcome) -> u32 {
        match outcome {
            Outcome::NewCorrect => self.new_correct,
            Outcome::NewIncorrect => self.new_incorrect,
            Outcome::RepeatEmpty => self.repeat_empty,
            Outcome::RepeatTarget => self.repeat_target,
            Outcome::SequenceBreak => self.sequence_break,
        }
    }

    pub fn total(&self) -> u32 {
        Outcome::ALL.iter().map(|o| self.get(*o)).sum()
    }

    pub fn errors(&self, task: TaskKind) -> u32 {
        Outcome::ALL
            .iter()
            .filter(|o| o.is_error(task))
            .map(|o| self.get(*o))
            .sum()
    }

    fn slot_mut(&mut self, outcome: Outcome) -> &mut u32 {
        match outcome {
            Outcome::NewCorrect => &mut self.new_correct,
            Outcome::NewIncorrect => &mut self.new_incorrect,
            Outcome::RepeatEmpty => &mut self.repeat_empty,
            Outcome::RepeatTarget => &mut self.repeat_target,
            Outcome::SequenceBreak => &mut self.sequence_break,
        }
    }
}

/// Raw user selection delivered by the input layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionEvent {
    pub target: TargetId,
    pub at_ms: u64,
}

impl SelectionEvent {
    pub fn new(target: TargetId, at_ms: u64) -> Self {
        Self { target, at_ms }
    }
}

/// One classified selection, timestamped relative to the attempt start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRecord {
    pub target_id: TargetId,
    pub outcome: Outcome,
    pub tag: String,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotPosition {
    pub box_id: TargetId,
    pub x: f32,
    pub y: f32,
}

/// Recorded result per completed trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial_id: String,
    pub task: TaskKind,
    pub day: u8,
    /// 0-based within the day
    pub trial_index: usize,
    pub stimulus: Stimulus,
    pub success: bool,
    pub outcome_counts: OutcomeCounts,
    pub between_errors: u32,
    pub within_errors: u32,
    /// Errors over every attempt at this stimulus, replays included
    pub wrong_attempts: u32,
    pub total_selections: u32,
    pub completion_time_ms: u64,
    pub first_input_latency_ms: Option<u64>,
    pub replays: u32,
    pub started_at_ms: u64,
    pub completed_at_ms: u64,
    pub selection_log: Vec<SelectionRecord>,
}

impl TrialResult {
    pub fn trial_id_for(task: TaskKind, day: u8, trial_index: usize) -> String {
        format!("{}_day{}_trial{}", task.task_id(), day, trial_index + 1)
    }

    pub fn box_positions(&self) -> Vec<SlotPosition> {
        self.stimulus
            .layout()
            .map(|layout| {
                layout
                    .positions
                    .iter()
                    .enumerate()
                    .map(|(id, p)| SlotPosition {
                        box_id: id as TargetId,
                        x: p.x,
                        y: p.y,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Normalized record handed to the session recorder
    pub fn to_session_record(&self, timestamp_iso: String) -> SessionRecord {
        SessionRecord {
            task_id: self.task.task_id().to_string(),
            day: self.day,
            trial_index: self.trial_index + 1,
            difficulty: self.stimulus.difficulty(),
            target_set: self.stimulus.target_set().to_vec(),
            wrong_attempts: self.wrong_attempts,
            completion_time_ms: self.completion_time_ms,
            timestamp_iso,
        }
    }
}

/// Persisted per-trial entry, identical for every task variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub task_id: String,
    pub day: u8,
    /// 1-based
    pub trial_index: usize,
    pub difficulty: usize,
    pub target_set: Vec<TargetId>,
    pub wrong_attempts: u32,
    pub completion_time_ms: u64,
    pub timestamp_iso: String,
}
