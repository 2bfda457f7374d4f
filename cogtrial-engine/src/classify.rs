use cogtrial_core::{Outcome, Stimulus, TargetId};
use serde::{Deserialize, Serialize};

/// Persistent state of a search slot. The visual reveal is transient, this is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotState {
    Hidden,
    Target,
    Empty,
}

/// What the participant has done so far in the current attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseState {
    Recall { selected: Vec<TargetId> },
    Search { slots: Vec<SlotState> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    UnknownTarget,
    /// Same label as the immediately preceding selection
    RepeatOfLast,
    SequenceFull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Accepted(Outcome),
    Ignored(IgnoreReason),
}

impl ResponseState {
    pub fn for_stimulus(stimulus: &Stimulus) -> Self {
        match stimulus {
            Stimulus::Sequence { labels, .. } => ResponseState::Recall {
                selected: Vec::with_capacity(labels.len()),
            },
            Stimulus::Search { slot_count, .. } => ResponseState::Search {
                slots: vec![SlotState::Hidden; *slot_count as usize],
            },
        }
    }

    /// Records an accepted selection
    pub fn apply(&mut self, stimulus: &Stimulus, target: TargetId) {
        match self {
            ResponseState::Recall { selected } => selected.push(target),
            ResponseState::Search { slots } => {
                if let Some(slot) = slots.get_mut(target as usize) {
                    if *slot == SlotState::Hidden {
                        *slot = if stimulus.is_target(target) {
                            SlotState::Target
                        } else {
                            SlotState::Empty
                        };
                    }
                }
            }
        }
    }

    /// The required number of selections has been reached
    pub fn is_finished(&self, stimulus: &Stimulus) -> bool {
        match self {
            ResponseState::Recall { selected } => selected.len() >= stimulus.difficulty(),
            ResponseState::Search { slots } => {
                slots.iter().filter(|s| **s == SlotState::Target).count() >= stimulus.difficulty()
            }
        }
    }

    /// Only meaningful for recall; search always ends in success
    pub fn matches(&self, stimulus: &Stimulus) -> bool {
        match self {
            ResponseState::Recall { selected } => selected.as_slice() == stimulus.target_set(),
            ResponseState::Search { .. } => self.is_finished(stimulus),
        }
    }

    pub fn slot(&self, id: TargetId) -> Option<SlotState> {
        match self {
            ResponseState::Search { slots } => slots.get(id as usize).copied(),
            ResponseState::Recall { .. } => None,
        }
    }
}

/// Classifies one selection against the attempt so far. Does not mutate anything.
pub fn classify(state: &ResponseState, stimulus: &Stimulus, target: TargetId) -> Classification {
    if !stimulus.accepts_id(target) {
        return Classification::Ignored(IgnoreReason::UnknownTarget);
    }
    match state {
        ResponseState::Recall { selected } => {
            let expected = stimulus.target_set();
            if selected.last() == Some(&target) {
                return Classification::Ignored(IgnoreReason::RepeatOfLast);
            }
            let Some(&want) = expected.get(selected.len()) else {
                return Classification::Ignored(IgnoreReason::SequenceFull);
            };
            Classification::Accepted(if want == target {
                Outcome::NewCorrect
            } else if expected.contains(&target) {
                Outcome::NewIncorrect
            } else {
                Outcome::SequenceBreak
            })
        }
        ResponseState::Search { slots } => {
            let outcome = match slots.get(target as usize) {
                Some(SlotState::Target) => Outcome::RepeatTarget,
                Some(SlotState::Empty) => Outcome::RepeatEmpty,
                _ if stimulus.is_target(target) => Outcome::NewCorrect,
                _ => Outcome::NewIncorrect,
            };
            Classification::Accepted(outcome)
        }
    }
}
