use std::fs;
use std::path::{Path, PathBuf};

use cogtrial_core::{EngineError, Result, SessionRecord, TaskKind, TrialResult};
use cogtrial_engine::SessionRecorder;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Serialize)]
struct DayFile<'a> {
    items: &'a [SessionRecord],
}

/// Buffers a day's records and writes them as one JSON file when the day ends:
/// `<root>/<task>/<participant>/day_NN.json`
pub struct JsonDayRecorder {
    dir: PathBuf,
    items: Vec<SessionRecord>,
    written: Vec<PathBuf>,
}

impl JsonDayRecorder {
    pub fn new(root: &Path, task: TaskKind, participant: &str) -> Self {
        Self {
            dir: root.join(task.task_id()).join(participant),
            items: Vec::new(),
            written: Vec::new(),
        }
    }

    pub fn pending(&self) -> &[SessionRecord] {
        &self.items
    }

    /// Files written so far, in order
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn day_path(&self, day: u8) -> PathBuf {
        self.dir.join(format!("day_{day:02}.json"))
    }
}

impl SessionRecorder for JsonDayRecorder {
    fn record(&mut self, record: &SessionRecord, result: &TrialResult) -> Result<()> {
        debug!(trial = %result.trial_id, replays = result.replays, "record buffered");
        self.items.push(record.clone());
        Ok(())
    }

    fn finish_day(&mut self, day: u8) -> Result<()> {
        let path = self.day_path(day);
        let json = serde_json::to_string_pretty(&DayFile { items: &self.items })
            .map_err(|e| EngineError::Recorder(format!("encode day {day}: {e}")))?;
        fs::create_dir_all(&self.dir)
            .map_err(|e| EngineError::Recorder(format!("{}: {e}", self.dir.display())))?;
        fs::write(&path, json)
            .map_err(|e| EngineError::Recorder(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), records = self.items.len(), "day saved");
        self.items.clear();
        self.written.push(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogtrial_core::{OutcomeCounts, Stimulus};

    fn result(index: usize) -> TrialResult {
        let stimulus = Stimulus::Sequence {
            labels: vec![1, 2],
            label_count: 9,
        };
        TrialResult {
            trial_id: TrialResult::trial_id_for(TaskKind::SequenceRecall, 3, index),
            task: TaskKind::SequenceRecall,
            day: 3,
            trial_index: index,
            stimulus,
            success: true,
            outcome_counts: OutcomeCounts::default(),
            between_errors: 0,
            within_errors: 0,
            wrong_attempts: 1,
            total_selections: 2,
            completion_time_ms: 1200,
            first_input_latency_ms: Some(300),
            replays: 0,
            started_at_ms: 0,
            completed_at_ms: 1200,
            selection_log: Vec::new(),
        }
    }

    #[test]
    fn finish_day_writes_items_and_clears_buffer() {
        let root = tempfile::tempdir().unwrap();
        let mut recorder = JsonDayRecorder::new(root.path(), TaskKind::SequenceRecall, "p01");
        for i in 0..2 {
            let r = result(i);
            recorder
                .record(&r.to_session_record("2026-01-01T00:00:00.000Z".into()), &r)
                .unwrap();
        }
        recorder.finish_day(3).unwrap();
        assert!(recorder.pending().is_empty());

        let path = root.path().join("constellation/p01/day_03.json");
        assert_eq!(recorder.written(), &[path.clone()]);
        let saved: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        let items = saved["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["trial_index"], 2);
        assert_eq!(items[0]["task_id"], "constellation");
    }
}
