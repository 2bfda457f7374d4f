use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use cogtrial_core::TaskKind;
use cogtrial_engine::{DayScheduler, DayTable, EngineEvent, TrialTimer};
use cogtrial_timing::{CooperativeScheduler, HighPrecisionTimer, ManualClock, Scheduler, Timer};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::participant::SimulatedParticipant;
use crate::recorder::JsonDayRecorder;

/// Everything the command line decides
#[derive(Debug, Clone)]
pub struct Settings {
    pub task: TaskKind,
    pub day: u8,
    pub seed: u64,
    pub out: PathBuf,
    pub participant: String,
    pub table: Option<PathBuf>,
    pub realtime: bool,
    pub error_rate: f64,
    pub reopen_rate: f64,
    /// Failed attempts allowed on one recall trial before giving up
    pub max_replays: u32,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DaySummary {
    pub day: u8,
    pub trials: usize,
    pub failed_attempts: usize,
    pub wrong_attempts: u32,
    /// Re-opened slots, empty or holding a target
    pub repeat_errors: u32,
    pub degraded_layouts: usize,
    pub total_time_ms: u64,
    pub saved: Vec<PathBuf>,
}

type Engine<T> = DayScheduler<StdRng, CooperativeScheduler<T, TrialTimer>, JsonDayRecorder>;

pub struct App {
    settings: Settings,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn run(&self) -> Result<DaySummary> {
        if self.settings.realtime {
            self.drive(HighPrecisionTimer::new())
        } else {
            self.drive(ManualClock::new())
        }
    }

    fn table(&self) -> Result<DayTable> {
        let table = match &self.settings.table {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("reading day table {}", path.display()))?;
                DayTable::from_json(&json)
                    .with_context(|| format!("loading day table {}", path.display()))?
            }
            None => match self.settings.task {
                TaskKind::SequenceRecall => DayTable::sequence_recall(),
                TaskKind::SpatialSearch => DayTable::spatial_search(),
            },
        };
        if table.task != self.settings.task {
            warn!(
                requested = self.settings.task.task_id(),
                table = table.task.task_id(),
                "day table task overrides --task"
            );
        }
        Ok(table)
    }

    fn drive<T: Timer>(&self, timer: T) -> Result<DaySummary> {
        let s = &self.settings;
        let table = self.table()?;
        let recorder = JsonDayRecorder::new(&s.out, table.task, &s.participant);
        let mut engine: Engine<T> = DayScheduler::new(
            table,
            StdRng::seed_from_u64(s.seed),
            CooperativeScheduler::new(timer),
            recorder,
        )?;
        let mut participant = SimulatedParticipant::new(
            StdRng::seed_from_u64(s.seed.wrapping_add(1)),
            s.error_rate,
            s.reopen_rate,
        );

        engine.start_day(s.day)?;
        let started = engine.now_ms();
        let mut summary = DaySummary::default();

        let mut failures_in_a_row = 0;

        loop {
            let events = engine.drain_events();
            if !events.is_empty() {
                for event in events {
                    participant.observe(&event);
                    if event.is_terminal() {
                        debug!(event = ?event, "attempt settled");
                    }
                    match event {
                        EngineEvent::DayStarted { day, .. } => summary.day = day,
                        EngineEvent::TrialSucceeded(result) => {
                            failures_in_a_row = 0;
                            summary.trials += 1;
                            summary.wrong_attempts += result.wrong_attempts;
                            summary.repeat_errors += result.between_errors + result.within_errors;
                            info!(
                                trial = %result.trial_id,
                                wrong_attempts = result.wrong_attempts,
                                replays = result.replays,
                                completion_ms = result.completion_time_ms,
                                "trial recorded"
                            );
                        }
                        EngineEvent::TrialFailed { trial_index } => {
                            summary.failed_attempts += 1;
                            failures_in_a_row += 1;
                            if failures_in_a_row > s.max_replays {
                                bail!(
                                    "trial {} failed {} times in a row, giving up",
                                    trial_index + 1,
                                    failures_in_a_row
                                );
                            }
                        }
                        EngineEvent::PlacementDegraded { .. } => summary.degraded_layouts += 1,
                        EngineEvent::RecorderFailed { day, error } => {
                            return Err(error).with_context(|| format!("saving day {day}"));
                        }
                        EngineEvent::TrialReady { .. } => {
                            engine.start_next_trial()?;
                        }
                        EngineEvent::DayComplete { .. } => {
                            summary.total_time_ms = engine.now_ms().saturating_sub(started);
                            summary.saved = engine.recorder().written().to_vec();
                            engine.end_day();
                            return Ok(summary);
                        }
                        other => debug!(event = ?other, "engine event"),
                    }
                }
                // a trial started above has events of its own to observe first
                continue;
            }

            if engine.accepts_input() {
                let Some(stimulus) = engine.live_trial().map(|t| t.stimulus.clone()) else {
                    bail!("input window open without a live trial");
                };
                let Some(target) = participant.choose(&stimulus) else {
                    bail!("participant has nothing left to select");
                };
                let think = participant.think_ms();
                engine.scheduler().timer().sleep(Duration::from_millis(think));
                let now = engine.now_ms();
                engine.on_select(target, now);
                continue;
            }

            if !engine.scheduler().wait_for_next() {
                bail!(
                    "engine stalled at trial {} with phase {:?}",
                    engine.trial_index(),
                    engine.live_phase()
                );
            }
            engine.tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(task: TaskKind, out: PathBuf) -> Settings {
        Settings {
            task,
            day: 2,
            seed: 17,
            out,
            participant: "sim".into(),
            table: None,
            realtime: false,
            error_rate: 0.2,
            reopen_rate: 0.2,
            max_replays: 50,
        }
    }

    fn preset(task: TaskKind) -> DayTable {
        match task {
            TaskKind::SequenceRecall => DayTable::sequence_recall(),
            TaskKind::SpatialSearch => DayTable::spatial_search(),
        }
    }

    #[test]
    fn virtual_recall_day_runs_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let summary = App::new(settings(TaskKind::SequenceRecall, dir.path().into()))
            .run()
            .unwrap();
        assert_eq!(summary.day, 2);
        assert_eq!(summary.trials, 7);
        assert_eq!(summary.saved, vec![dir.path().join("constellation/sim/day_02.json")]);
        assert!(summary.total_time_ms > 0);
    }

    #[test]
    fn virtual_search_day_writes_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let summary = App::new(settings(TaskKind::SpatialSearch, dir.path().into()))
            .run()
            .unwrap();
        assert_eq!(summary.trials, 5);
        assert_eq!(summary.failed_attempts, 0);
        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&summary.saved[0]).unwrap()).unwrap();
        assert_eq!(saved["items"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn every_search_day_completes_across_seeds() {
        let dir = tempfile::tempdir().unwrap();
        let table = preset(TaskKind::SpatialSearch);
        for day in 1..=7u8 {
            for seed in 0..8 {
                let summary = App::new(Settings {
                    day,
                    seed,
                    error_rate: 0.0,
                    reopen_rate: 0.0,
                    ..settings(TaskKind::SpatialSearch, dir.path().into())
                })
                .run()
                .unwrap_or_else(|e| panic!("day {day} seed {seed}: {e:#}"));
                assert_eq!(summary.trials, table.day(day).unwrap().trials_per_day);
                assert_eq!(summary.failed_attempts, 0);
                assert_eq!(summary.repeat_errors, 0);
                assert_eq!(summary.saved.len(), 1);
            }
        }
    }

    #[test]
    fn every_recall_day_completes_across_seeds() {
        let dir = tempfile::tempdir().unwrap();
        let mut failed = 0;
        for day in 1..=7u8 {
            for seed in 0..4 {
                let summary = App::new(Settings {
                    day,
                    seed,
                    error_rate: 0.15,
                    ..settings(TaskKind::SequenceRecall, dir.path().into())
                })
                .run()
                .unwrap_or_else(|e| panic!("day {day} seed {seed}: {e:#}"));
                assert_eq!(summary.trials, 7);
                failed += summary.failed_attempts;
            }
        }
        assert!(failed > 0);
    }

    #[test]
    fn reopening_slots_produces_repeat_errors() {
        let dir = tempfile::tempdir().unwrap();
        for seed in 0..3 {
            let summary = App::new(Settings {
                day: 7,
                seed,
                reopen_rate: 0.5,
                ..settings(TaskKind::SpatialSearch, dir.path().into())
            })
            .run()
            .unwrap();
            assert_eq!(summary.trials, 8);
            assert!(summary.repeat_errors > 0);
            assert!(summary.wrong_attempts >= summary.repeat_errors);
        }
    }

    #[test]
    fn unwritable_output_fails_the_run() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = App::new(settings(TaskKind::SequenceRecall, file.path().into()))
            .run()
            .unwrap_err();
        assert!(format!("{err:#}").contains("saving day 2"));
    }

    #[test]
    fn endless_failures_hit_the_replay_cap() {
        let dir = tempfile::tempdir().unwrap();
        let err = App::new(Settings {
            day: 7,
            error_rate: 1.0,
            max_replays: 3,
            ..settings(TaskKind::SequenceRecall, dir.path().into())
        })
        .run()
        .unwrap_err();
        assert!(err.to_string().contains("giving up"));
    }
}
