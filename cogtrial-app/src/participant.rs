use std::collections::BTreeSet;

use cogtrial_core::{Stimulus, TargetId, TaskKind};
use cogtrial_engine::EngineEvent;
use rand::Rng;
use rand::seq::IndexedRandom;

/// Scripted stand-in for a human player.
///
/// Learns only from engine output: recall labels from `ItemShown`, opened
/// slots from `SlotRevealed`. Errors are injected at the configured rates.
pub struct SimulatedParticipant<R: Rng> {
    rng: R,
    error_rate: f64,
    reopen_rate: f64,
    seen: Vec<TargetId>,
    answered: usize,
    opened: BTreeSet<TargetId>,
}

impl<R: Rng> SimulatedParticipant<R> {
    pub fn new(rng: R, error_rate: f64, reopen_rate: f64) -> Self {
        Self {
            rng,
            error_rate: error_rate.clamp(0.0, 1.0),
            reopen_rate: reopen_rate.clamp(0.0, 1.0),
            seen: Vec::new(),
            answered: 0,
            opened: BTreeSet::new(),
        }
    }

    pub fn observe(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::TrialStarted { .. } => {
                self.seen.clear();
                self.answered = 0;
                self.opened.clear();
            }
            EngineEvent::ItemShown { label, .. } => self.seen.push(*label),
            EngineEvent::OutcomeRecorded { .. } => self.answered += 1,
            EngineEvent::SlotRevealed { slot, .. } => {
                self.opened.insert(*slot);
            }
            _ => {}
        }
    }

    /// Picks the next selection, or `None` when there is nothing sensible left
    pub fn choose(&mut self, stimulus: &Stimulus) -> Option<TargetId> {
        let choices = stimulus.choice_count();
        match stimulus.task() {
            TaskKind::SequenceRecall => self.recall(choices),
            TaskKind::SpatialSearch => self.search(choices),
        }
    }

    /// Milliseconds spent before the next selection
    pub fn think_ms(&mut self) -> u64 {
        self.rng.random_range(250..900)
    }

    fn recall(&mut self, label_count: u32) -> Option<TargetId> {
        let remembered = self.seen.get(self.answered).copied();
        if remembered.is_none() || self.rng.random_bool(self.error_rate) {
            return Some(self.rng.random_range(1..=label_count.max(1)));
        }
        remembered
    }

    fn search(&mut self, slot_count: u32) -> Option<TargetId> {
        if !self.opened.is_empty() && self.rng.random_bool(self.reopen_rate) {
            let opened: Vec<TargetId> = self.opened.iter().copied().collect();
            return opened.choose(&mut self.rng).copied();
        }
        let closed: Vec<TargetId> = (0..slot_count)
            .filter(|slot| !self.opened.contains(slot))
            .collect();
        closed.choose(&mut self.rng).copied()
    }
}
