use chrono::{SecondsFormat, Utc};
use cogtrial_core::{
    EngineError, Result, SelectionEvent, Stimulus, TargetId, TaskKind, TrialPhase, TrialResult,
};
use cogtrial_timing::Scheduler;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::{DayConfig, DayTable};
use crate::events::{EngineEvent, TrialTimer};
use crate::generator::{NonOverlappingPlacementGenerator, UniqueSequenceGenerator, partial_shuffle};
use crate::recorder::SessionRecorder;
use crate::state::{Settlement, TrialStateMachine};
use crate::trial::{Trial, TrialSpec};

/// Drives the trial loop of one protocol day.
///
/// Owns the RNG, the timer scheduler and the recorder; the live trial itself
/// belongs to the `TrialStateMachine` and is only observed from here.
pub struct DayScheduler<R, S, W>
where
    R: Rng,
    S: Scheduler<TrialTimer>,
    W: SessionRecorder,
{
    table: DayTable,
    rng: R,
    scheduler: S,
    recorder: W,
    machine: TrialStateMachine,
    placement: NonOverlappingPlacementGenerator,
    day: Option<DayConfig>,
    trial_index: usize,
    outbox: Vec<EngineEvent>,
}

impl<R, S, W> DayScheduler<R, S, W>
where
    R: Rng,
    S: Scheduler<TrialTimer>,
    W: SessionRecorder,
{
    pub fn new(table: DayTable, rng: R, scheduler: S, recorder: W) -> Result<Self> {
        table.validate()?;
        let placement = NonOverlappingPlacementGenerator::from_config(&table.placement);
        Ok(Self {
            table,
            rng,
            scheduler,
            recorder,
            machine: TrialStateMachine::new(),
            placement,
            day: None,
            trial_index: 0,
            outbox: Vec::new(),
        })
    }

    /// Resets progress and starts the first trial. On error nothing changes.
    pub fn start_day(&mut self, day: u8) -> Result<()> {
        let config = self.table.day(day)?;
        let (stimulus, degraded) = self.next_stimulus(&config)?;

        self.machine.abandon(&mut self.scheduler);
        info!(
            task = self.table.task.task_id(),
            day = config.day,
            trials = config.trials_per_day,
            difficulty = config.difficulty,
            choices = config.choices,
            "day started"
        );
        self.outbox.push(EngineEvent::DayStarted {
            day: config.day,
            trials_per_day: config.trials_per_day,
        });
        self.trial_index = 0;
        self.launch(&config, stimulus, degraded);
        self.day = Some(config);
        Ok(())
    }

    /// Starts the trial at the current index with a fresh stimulus, superseding
    /// any live trial. Returns false once the day is complete.
    pub fn start_next_trial(&mut self) -> Result<bool> {
        let config = self.day.clone().ok_or(EngineError::NoActiveDay)?;
        if self.trial_index >= config.trials_per_day {
            debug!(day = config.day, "day already complete, no trial started");
            return Ok(false);
        }
        let (stimulus, degraded) = self.next_stimulus(&config)?;
        self.launch(&config, stimulus, degraded);
        Ok(true)
    }

    /// Abandons the unfinished live trial and restarts its index with a new stimulus
    pub fn reset_trial(&mut self) -> Result<bool> {
        match self.machine.phase() {
            None | Some(TrialPhase::Complete { success: true }) => Ok(false),
            Some(_) => {
                info!(trial = self.trial_index, "trial reset");
                self.start_next_trial()
            }
        }
    }

    /// Ends the day early or after completion; cancels everything still pending
    pub fn end_day(&mut self) {
        self.machine.abandon(&mut self.scheduler);
        if let Some(config) = self.day.take() {
            debug!(day = config.day, done = self.trial_index, "day closed");
        }
    }

    pub fn on_select(&mut self, target: TargetId, at_ms: u64) {
        let event = SelectionEvent::new(target, at_ms);
        if let Some(settlement) = self
            .machine
            .on_select(event, &mut self.scheduler, &mut self.outbox)
        {
            self.settle(settlement);
        }
    }

    /// Dispatches every timer that is due. Returns how many fired.
    pub fn tick(&mut self) -> usize {
        let mut fired = 0;
        while let Some(timer) = self.scheduler.poll_due() {
            fired += 1;
            self.machine
                .on_timer(timer, &mut self.scheduler, &mut self.outbox);
        }
        fired
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// `(completed, trials_per_day)` for the current day
    pub fn progress(&self) -> (usize, usize) {
        self.day
            .as_ref()
            .map_or((0, 0), |cfg| (self.trial_index, cfg.trials_per_day))
    }

    pub fn is_day_complete(&self) -> bool {
        self.day
            .as_ref()
            .is_some_and(|cfg| self.trial_index >= cfg.trials_per_day)
    }

    pub fn current_day(&self) -> Option<&DayConfig> {
        self.day.as_ref()
    }

    pub fn trial_index(&self) -> usize {
        self.trial_index
    }

    pub fn task(&self) -> TaskKind {
        self.table.task
    }

    pub fn live_trial(&self) -> Option<&Trial> {
        self.machine.live()
    }

    pub fn live_phase(&self) -> Option<TrialPhase> {
        self.machine.phase()
    }

    pub fn accepts_input(&self) -> bool {
        self.machine.accepts_input()
    }

    pub fn now_ms(&self) -> u64 {
        self.scheduler.now_ms()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn recorder(&self) -> &W {
        &self.recorder
    }

    /// `degraded` carries the passes spent when the layout ignored spacing
    fn launch(&mut self, config: &DayConfig, stimulus: Stimulus, degraded: Option<u32>) {
        let spec = TrialSpec {
            day: config.day,
            index: self.trial_index,
            stimulus,
            timing: config.timing,
            replays: 0,
            carried_errors: 0,
        };
        self.machine
            .begin(spec, &mut self.scheduler, &mut self.outbox);
        if let Some(passes) = degraded {
            self.outbox.push(EngineEvent::PlacementDegraded {
                trial_index: self.trial_index,
                passes,
            });
        }
    }

    fn next_stimulus(&mut self, config: &DayConfig) -> Result<(Stimulus, Option<u32>)> {
        match self.table.task {
            TaskKind::SequenceRecall => {
                let stimulus = Stimulus::Sequence {
                    labels: UniqueSequenceGenerator::new(config.choices)
                        .generate(config.difficulty, &mut self.rng),
                    label_count: config.choices,
                };
                Ok((stimulus, None))
            }
            TaskKind::SpatialSearch => {
                let slots = config.choices as usize;
                let mut targets: Vec<TargetId> =
                    partial_shuffle(slots, config.difficulty, &mut self.rng)
                        .into_iter()
                        .map(|i| i as TargetId)
                        .collect();
                targets.sort_unstable();
                let placement = self.placement.place(slots, &mut self.rng)?;
                let degraded = placement.degraded.then_some(placement.passes);
                let stimulus = Stimulus::Search {
                    slot_count: config.choices,
                    targets,
                    layout: cogtrial_core::SlotLayout {
                        positions: placement.points,
                        degraded: placement.degraded,
                    },
                };
                Ok((stimulus, degraded))
            }
        }
    }

    fn settle(&mut self, settlement: Settlement) {
        match settlement {
            Settlement::Failed { trial_index } => {
                self.outbox.push(EngineEvent::TrialFailed { trial_index });
            }
            Settlement::Succeeded(result) => self.on_trial_complete(result),
        }
    }

    fn on_trial_complete(&mut self, result: TrialResult) {
        let Some((day, total)) = self.day.as_ref().map(|c| (c.day, c.trials_per_day)) else {
            return;
        };
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let record = result.to_session_record(stamp);
        if let Err(error) = self.recorder.record(&record, &result) {
            warn!(%error, trial = result.trial_index, "recorder rejected trial");
            self.outbox.push(EngineEvent::RecorderFailed { day, error });
        }

        self.trial_index = (self.trial_index + 1).min(total);
        self.outbox.push(EngineEvent::TrialSucceeded(Box::new(result)));

        if self.trial_index == total {
            info!(day, trials = total, "day complete");
            if let Err(error) = self.recorder.finish_day(day) {
                warn!(%error, day, "recorder failed to close the day");
                self.outbox.push(EngineEvent::RecorderFailed { day, error });
            }
            self.outbox.push(EngineEvent::DayComplete { day });
        } else {
            self.outbox.push(EngineEvent::TrialReady {
                next_index: self.trial_index,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timing;
    use crate::recorder::MemoryRecorder;
    use cogtrial_core::Rect;
    use cogtrial_timing::{CooperativeScheduler, ManualClock, Timer};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    type Day = DayScheduler<StdRng, CooperativeScheduler<ManualClock, TrialTimer>, MemoryRecorder>;

    fn day_with(table: DayTable) -> (ManualClock, Day) {
        let clock = ManualClock::new();
        let day = DayScheduler::new(
            table,
            StdRng::seed_from_u64(11),
            CooperativeScheduler::new(clock.clone()),
            MemoryRecorder::new(),
        )
        .unwrap();
        (clock, day)
    }

    fn search_table(trials: usize) -> DayTable {
        let mut table = DayTable::spatial_search();
        table.days = vec![DayConfig {
            day: 1,
            trials_per_day: trials,
            difficulty: 1,
            choices: 3,
            timing: Timing {
                reveal_ms: 0,
                ..Timing::default()
            },
        }];
        table
    }

    fn solve_search(day: &mut Day, clock: &ManualClock) {
        let targets = day.live_trial().unwrap().stimulus.target_set().to_vec();
        for t in targets {
            day.on_select(t, clock.now_ms());
        }
    }

    #[test]
    fn operations_before_start_day_fail() {
        let (_, mut day) = day_with(search_table(2));
        assert_eq!(day.start_next_trial(), Err(EngineError::NoActiveDay));
        assert_eq!(day.progress(), (0, 0));
        day.on_select(0, 0);
        assert!(day.drain_events().is_empty());
    }

    #[test]
    fn missing_day_leaves_no_state() {
        let (_, mut day) = day_with(search_table(2));
        let err = day.start_day(5).unwrap_err();
        assert_eq!(err, EngineError::MissingDay(5));
        assert!(day.current_day().is_none());
        assert!(day.live_trial().is_none());
        assert!(day.drain_events().is_empty());
    }

    #[test]
    fn progress_is_monotonic_and_day_completes_exactly_at_total() {
        let (clock, mut day) = day_with(search_table(3));
        day.start_day(1).unwrap();
        let mut last = 0;
        let mut completions = 0;
        loop {
            solve_search(&mut day, &clock);
            let (done, total) = day.progress();
            assert!(done >= last && done <= total);
            last = done;
            let events = day.drain_events();
            let complete = events.iter().any(|e| matches!(e, EngineEvent::DayComplete { .. }));
            completions += complete as usize;
            assert_eq!(complete, done == total);
            if complete {
                break;
            }
            assert!(events.contains(&EngineEvent::TrialReady { next_index: done }));
            assert!(day.start_next_trial().unwrap());
        }
        assert_eq!(completions, 1);
        assert!(day.is_day_complete());
        assert!(!day.start_next_trial().unwrap());
        assert_eq!(day.recorder().records.len(), 3);
        assert_eq!(day.recorder().finished_days, vec![1]);
        let indices: Vec<usize> = day.recorder().records.iter().map(|r| r.trial_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn reset_restarts_the_same_index() {
        let (_, mut day) = day_with(search_table(2));
        day.start_day(1).unwrap();
        day.drain_events();
        assert!(day.reset_trial().unwrap());
        assert_eq!(day.trial_index(), 0);
        assert_eq!(
            day.drain_events()[0],
            EngineEvent::TrialStarted {
                trial_index: 0,
                replay: 0
            }
        );
    }

    #[test]
    fn recall_failure_auto_replays_without_advancing() {
        let mut table = DayTable::sequence_recall();
        table.days = vec![DayConfig {
            day: 2,
            trials_per_day: 2,
            difficulty: 2,
            choices: 9,
            timing: Timing {
                present_ms: 10,
                gap_ms: 10,
                feedback_ms: 100,
                reveal_ms: 0,
            },
        }];
        let (clock, mut day) = day_with(table);
        day.start_day(2).unwrap();
        clock.advance(40);
        day.tick();
        assert!(day.accepts_input());

        let labels = day.live_trial().unwrap().stimulus.target_set().to_vec();
        day.on_select(labels[1], clock.now_ms());
        day.on_select(labels[0], clock.now_ms());
        let events = day.drain_events();
        assert!(events.contains(&EngineEvent::TrialFailed { trial_index: 0 }));
        assert_eq!(day.progress(), (0, 2));

        clock.advance(100);
        day.tick();
        assert!(day.drain_events().contains(&EngineEvent::TrialStarted {
            trial_index: 0,
            replay: 1
        }));
        assert_eq!(day.live_trial().unwrap().stimulus.target_set(), labels.as_slice());
        assert!(day.recorder().records.is_empty());
    }

    #[test]
    fn degenerate_area_rejected_at_construction() {
        let mut table = search_table(1);
        table.placement.area = Rect::centered(100.0, 100.0);
        let result = DayScheduler::new(
            table,
            StdRng::seed_from_u64(1),
            CooperativeScheduler::<_, TrialTimer>::new(ManualClock::new()),
            MemoryRecorder::new(),
        );
        assert!(matches!(result, Err(EngineError::PlacementInfeasible { .. })));
    }

    #[test]
    fn degraded_layout_is_reported_after_the_trial_starts() {
        let mut table = search_table(2);
        table.placement.area = Rect::centered(200.0, 200.0);
        table.placement.max_passes = 2;
        table.placement.max_attempts = 4;
        table.days[0].choices = 6;
        let (clock, mut day) = day_with(table);
        day.start_day(1).unwrap();
        let events = day.drain_events();
        assert!(matches!(events[0], EngineEvent::DayStarted { .. }));
        assert!(matches!(events[1], EngineEvent::TrialStarted { trial_index: 0, .. }));
        assert!(matches!(events[2], EngineEvent::InputOpened { .. }));
        assert_eq!(
            events[3],
            EngineEvent::PlacementDegraded {
                trial_index: 0,
                passes: 2
            }
        );

        solve_search(&mut day, &clock);
        day.drain_events();
        day.start_next_trial().unwrap();
        let events = day.drain_events();
        assert!(matches!(events[0], EngineEvent::TrialStarted { trial_index: 1, .. }));
        assert_eq!(
            events.last(),
            Some(&EngineEvent::PlacementDegraded {
                trial_index: 1,
                passes: 2
            })
        );
    }

    struct ReadOnlyRecorder;

    impl SessionRecorder for ReadOnlyRecorder {
        fn record(&mut self, _: &cogtrial_core::SessionRecord, _: &TrialResult) -> Result<()> {
            Ok(())
        }

        fn finish_day(&mut self, day: u8) -> Result<()> {
            Err(EngineError::Recorder(format!("day {day} is read-only")))
        }
    }

    #[test]
    fn recorder_failure_is_reported_before_day_complete() {
        let clock = ManualClock::new();
        let mut day = DayScheduler::new(
            search_table(1),
            StdRng::seed_from_u64(4),
            CooperativeScheduler::new(clock.clone()),
            ReadOnlyRecorder,
        )
        .unwrap();
        day.start_day(1).unwrap();
        let targets = day.live_trial().unwrap().stimulus.target_set().to_vec();
        for t in targets {
            day.on_select(t, clock.now_ms());
        }
        let events = day.drain_events();
        let n = events.len();
        assert_eq!(
            events[n - 2],
            EngineEvent::RecorderFailed {
                day: 1,
                error: EngineError::Recorder("day 1 is read-only".into())
            }
        );
        assert_eq!(events[n - 1], EngineEvent::DayComplete { day: 1 });
    }

    #[test]
    fn end_day_cancels_pending_timers() {
        let mut table = DayTable::sequence_recall();
        table.days.truncate(1);
        let (_, mut day) = day_with(table);
        day.start_day(1).unwrap();
        assert_eq!(day.scheduler().len(), 1);
        day.end_day();
        assert!(day.scheduler().is_empty());
        assert!(day.current_day().is_none());
        assert_eq!(day.start_next_trial(), Err(EngineError::NoActiveDay));
    }
}
