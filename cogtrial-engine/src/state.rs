use cogtrial_core::{
    SelectionEvent, SelectionRecord, Stimulus, TargetId, TaskKind, TrialPhase, TrialResult,
};
use cogtrial_timing::{Fired, OwnerId, Scheduler};
use tracing::{debug, error, info, warn};

use crate::classify::{Classification, IgnoreReason, classify};
use crate::events::{EngineEvent, TrialTimer};
use crate::trial::{Trial, TrialSpec};

/// Terminal verdict of one attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Succeeded(TrialResult),
    Failed { trial_index: usize },
}

/// Runs the single live trial: presentation, input gating, classification, completion.
///
/// The scheduler is borrowed per call so the owner of both (the day scheduler)
/// decides when timers are polled. Output events are appended to `out`.
#[derive(Debug, Default)]
pub struct TrialStateMachine {
    live: Option<Trial>,
    last_owner: OwnerId,
}

impl TrialStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live(&self) -> Option<&Trial> {
        self.live.as_ref()
    }

    pub fn phase(&self) -> Option<TrialPhase> {
        self.live.as_ref().map(|t| t.status)
    }

    /// Input window open and no transient reveal running
    pub fn accepts_input(&self) -> bool {
        self.live
            .as_ref()
            .is_some_and(|t| t.status.allows_input() && t.revealing.is_none())
    }

    /// Drops the live trial after cancelling every timer it owns
    pub fn abandon<S: Scheduler<TrialTimer>>(&mut self, sched: &mut S) -> Option<Trial> {
        let trial = self.live.take()?;
        let cancelled = sched.cancel_owner(trial.owner);
        debug!(trial = trial.index, owner = trial.owner, cancelled, "trial superseded");
        Some(trial)
    }

    /// Starts a new attempt, superseding whatever was live
    pub fn begin<S: Scheduler<TrialTimer>>(
        &mut self,
        spec: TrialSpec,
        sched: &mut S,
        out: &mut Vec<EngineEvent>,
    ) {
        self.abandon(sched);
        self.last_owner += 1;
        let trial = Trial::new(spec, self.last_owner, sched.now_ms());
        info!(
            day = trial.day,
            trial = trial.index,
            replay = trial.replays,
            stimulus = %trial.stimulus.describe(),
            "trial started"
        );
        out.push(EngineEvent::TrialStarted {
            trial_index: trial.index,
            replay: trial.replays,
        });
        let presents = trial.stimulus.task().has_presentation();
        let started = trial.timestamps.started_at;
        self.live = Some(trial);
        if presents {
            self.show_item(0, started, sched, out);
        } else {
            self.open_input(started, out);
        }
    }

    pub fn on_timer<S: Scheduler<TrialTimer>>(
        &mut self,
        fired: Fired<TrialTimer>,
        sched: &mut S,
        out: &mut Vec<EngineEvent>,
    ) {
        let Some(trial) = self.live.as_mut() else {
            error!(owner = fired.owner, event = ?fired.event, "timer fired with no live trial");
            debug_assert!(false, "stale timer fired");
            return;
        };
        if fired.owner != trial.owner {
            error!(
                owner = fired.owner,
                live = trial.owner,
                event = ?fired.event,
                "timer of a superseded trial fired"
            );
            debug_assert!(false, "stale timer fired");
            return;
        }

        match fired.event {
            TrialTimer::HideItem { position } => {
                if let Some(label) = item_at(&trial.stimulus, position) {
                    out.push(EngineEvent::ItemHidden { label, position });
                }
                let next = if item_at(&trial.stimulus, position + 1).is_some() {
                    TrialTimer::ShowItem {
                        position: position + 1,
                    }
                } else {
                    TrialTimer::OpenInput
                };
                sched.schedule_at(fired.due_ms + trial.timing.gap_ms, trial.owner, next);
            }
            TrialTimer::ShowItem { position } => {
                self.show_item(position, fired.due_ms, sched, out)
            }
            TrialTimer::OpenInput => self.open_input(fired.due_ms, out),
            TrialTimer::CloseReveal { slot } => {
                if trial.revealing == Some(slot) {
                    trial.revealing = None;
                }
                out.push(EngineEvent::SlotClosed { slot });
            }
            TrialTimer::Replay => {
                let spec = trial.replay_spec();
                self.begin(spec, sched, out);
            }
        }
    }

    pub fn on_select<S: Scheduler<TrialTimer>>(
        &mut self,
        event: SelectionEvent,
        sched: &mut S,
        out: &mut Vec<EngineEvent>,
    ) -> Option<Settlement> {
        let target = event.target;
        let Some(trial) = self.live.as_mut() else {
            debug!(target, "selection ignored: no live trial");
            return None;
        };
        if !trial.status.allows_input() {
            debug!(target, phase = ?trial.status, "selection ignored: input closed");
            return None;
        }
        if let Some(slot) = trial.revealing {
            debug!(target, revealing = slot, "selection ignored: reveal in progress");
            return None;
        }

        let outcome = match classify(&trial.response, &trial.stimulus, target) {
            Classification::Accepted(outcome) => outcome,
            Classification::Ignored(IgnoreReason::UnknownTarget) => {
                warn!(target, trial = trial.index, "selection ignored: unknown target");
                return None;
            }
            Classification::Ignored(reason) => {
                debug!(target, ?reason, "selection ignored");
                return None;
            }
        };

        let task = trial.stimulus.task();
        let started = trial.timestamps.started_at;
        let at = event.at_ms.max(started);
        trial.timestamps.first_input_at.get_or_insert(at);
        trial.counts.add(outcome);
        trial.log.push(SelectionRecord {
            target_id: target,
            outcome,
            tag: outcome.tag(task).to_string(),
            timestamp_ms: at - started,
        });
        trial.response.apply(&trial.stimulus, target);
        debug!(trial = trial.index, target, ?outcome, "selection classified");
        out.push(EngineEvent::OutcomeRecorded { outcome, target });

        if task == TaskKind::SpatialSearch {
            out.push(EngineEvent::SlotRevealed {
                slot: target,
                target: trial.stimulus.is_target(target),
            });
            if trial.timing.reveal_ms > 0 {
                trial.revealing = Some(target);
                sched.schedule(
                    trial.timing.reveal_ms,
                    trial.owner,
                    TrialTimer::CloseReveal { slot: target },
                );
            }
        }

        if !trial.response.is_finished(&trial.stimulus) {
            return None;
        }
        trial.status = TrialPhase::Evaluating;
        let success = trial.response.matches(&trial.stimulus);
        self.complete(success, at, sched)
    }

    /// Settles the live trial. Only the first call has any effect; later calls
    /// (overlapping triggers) return `None`.
    pub fn complete<S: Scheduler<TrialTimer>>(
        &mut self,
        success: bool,
        at_ms: u64,
        sched: &mut S,
    ) -> Option<Settlement> {
        let trial = self.live.as_mut()?;
        if !trial.settle() {
            debug!(trial = trial.index, "duplicate completion suppressed");
            return None;
        }
        trial.status = TrialPhase::Complete { success };
        trial.timestamps.completed_at = Some(at_ms.max(trial.timestamps.started_at));

        if success {
            let result = trial.result();
            info!(
                trial = trial.index,
                selections = result.total_selections,
                wrong_attempts = result.wrong_attempts,
                completion_ms = result.completion_time_ms,
                "trial succeeded"
            );
            Some(Settlement::Succeeded(result))
        } else {
            info!(
                trial = trial.index,
                errors = trial.errors(),
                feedback_ms = trial.timing.feedback_ms,
                "trial failed, replay scheduled"
            );
            sched.schedule(trial.timing.feedback_ms, trial.owner, TrialTimer::Replay);
            Some(Settlement::Failed {
                trial_index: trial.index,
            })
        }
    }

    fn show_item<S: Scheduler<TrialTimer>>(
        &mut self,
        position: usize,
        at_ms: u64,
        sched: &mut S,
        out: &mut Vec<EngineEvent>,
    ) {
        let Some(trial) = self.live.as_mut() else {
            return;
        };
        match item_at(&trial.stimulus, position) {
            Some(label) => {
                out.push(EngineEvent::ItemShown { label, position });
                sched.schedule_at(
                    at_ms + trial.timing.present_ms,
                    trial.owner,
                    TrialTimer::HideItem { position },
                );
            }
            None => self.open_input(at_ms, out),
        }
    }

    fn open_input(&mut self, now_ms: u64, out: &mut Vec<EngineEvent>) {
        let Some(trial) = self.live.as_mut() else {
            return;
        };
        debug_assert!(trial.status.can_enter(TrialPhase::AwaitingInput));
        trial.status = TrialPhase::AwaitingInput;
        trial.timestamps.input_opened_at = Some(now_ms);
        debug!(trial = trial.index, "input opened");
        out.push(EngineEvent::InputOpened {
            trial_index: trial.index,
        });
    }
}

fn item_at(stimulus: &Stimulus, position: usize) -> Option<TargetId> {
    match stimulus {
        Stimulus::Sequence { labels, .. } => labels.get(position).copied(),
        Stimulus::Search { .. } => None,
    }
}
