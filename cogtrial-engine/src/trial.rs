use cogtrial_core::{
    OutcomeCounts, SelectionRecord, Stimulus, TargetId, TrialPhase, TrialResult,
};
use cogtrial_timing::OwnerId;

use crate::classify::ResponseState;
use crate::config::Timing;

/// Everything needed to start one attempt
#[derive(Debug, Clone)]
pub struct TrialSpec {
    pub day: u8,
    pub index: usize,
    pub stimulus: Stimulus,
    pub timing: Timing,
    /// Failed attempts already made at this stimulus
    pub replays: u32,
    /// Errors made during those failed attempts
    pub carried_errors: u32,
}

/// The live trial, owned by the state machine
#[derive(Debug, Clone)]
pub struct Trial {
    pub day: u8,
    pub index: usize,
    /// Timer owner of this attempt; a replay gets a fresh one
    pub owner: OwnerId,
    pub stimulus: Stimulus,
    pub timing: Timing,
    pub status: TrialPhase,
    pub response: ResponseState,
    pub counts: OutcomeCounts,
    pub log: Vec<SelectionRecord>,
    pub timestamps: TrialTimestamps,
    pub replays: u32,
    pub carried_errors: u32,
    /// Slot whose transient reveal is still showing
    pub revealing: Option<TargetId>,
    settled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TrialTimestamps {
    pub started_at: u64,
    pub input_opened_at: Option<u64>,
    pub first_input_at: Option<u64>,
    pub completed_at: Option<u64>,
}

impl Trial {
    pub fn new(spec: TrialSpec, owner: OwnerId, now_ms: u64) -> Self {
        let response = ResponseState::for_stimulus(&spec.stimulus);
        Self {
            day: spec.day,
            index: spec.index,
            owner,
            stimulus: spec.stimulus,
            timing: spec.timing,
            status: TrialPhase::Presenting,
            response,
            counts: OutcomeCounts::default(),
            log: Vec::new(),
            timestamps: TrialTimestamps {
                started_at: now_ms,
                ..TrialTimestamps::default()
            },
            replays: spec.replays,
            carried_errors: spec.carried_errors,
            revealing: None,
            settled: false,
        }
    }

    /// Sets the settled flag; true only for the first call
    pub(crate) fn settle(&mut self) -> bool {
        !std::mem::replace(&mut self.settled, true)
    }

    pub fn errors(&self) -> u32 {
        self.counts.errors(self.stimulus.task())
    }

    /// Spec for running the same stimulus again after this attempt failed
    pub fn replay_spec(&self) -> TrialSpec {
        TrialSpec {
            day: self.day,
            index: self.index,
            stimulus: self.stimulus.clone(),
            timing: self.timing,
            replays: self.replays + 1,
            carried_errors: self.carried_errors + self.errors(),
        }
    }

    pub fn result(&self) -> TrialResult {
        let task = self.stimulus.task();
        let ts = &self.timestamps;
        let completed_at = ts.completed_at.unwrap_or(ts.started_at);
        TrialResult {
            trial_id: TrialResult::trial_id_for(task, self.day, self.index),
            task,
            day: self.day,
            trial_index: self.index,
            stimulus: self.stimulus.clone(),
            success: matches!(self.status, TrialPhase::Complete { success: true }),
            outcome_counts: self.counts,
            between_errors: self.counts.repeat_empty,
            within_errors: self.counts.repeat_target,
            wrong_attempts: self.carried_errors + self.errors(),
            total_selections: self.counts.total(),
            completion_time_ms: completed_at.saturating_sub(ts.started_at),
            first_input_latency_ms: ts
                .first_input_at
                .map(|first| first.saturating_sub(ts.input_opened_at.unwrap_or(ts.started_at))),
            replays: self.replays,
            started_at_ms: ts.started_at,
            completed_at_ms: completed_at,
            selection_log: self.log.clone(),
        }
    }
}
