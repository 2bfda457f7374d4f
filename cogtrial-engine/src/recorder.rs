use cogtrial_core::{Result, SessionRecord, TrialResult};

/// Receives one record per successfully completed trial
pub trait SessionRecorder {
    fn record(&mut self, record: &SessionRecord, result: &TrialResult) -> Result<()>;

    /// Called once when the last trial of a day has been recorded
    fn finish_day(&mut self, _day: u8) -> Result<()> {
        Ok(())
    }
}

impl<W: SessionRecorder + ?Sized> SessionRecorder for Box<W> {
    fn record(&mut self, record: &SessionRecord, result: &TrialResult) -> Result<()> {
        (**self).record(record, result)
    }

    fn finish_day(&mut self, day: u8) -> Result<()> {
        (**self).finish_day(day)
    }
}

/// Keeps everything in memory
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    pub records: Vec<SessionRecord>,
    pub results: Vec<TrialResult>,
    pub finished_days: Vec<u8>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionRecorder for MemoryRecorder {
    fn record(&mut self, record: &SessionRecord, result: &TrialResult) -> Result<()> {
        self.records.push(record.clone());
        self.results.push(result.clone());
        Ok(())
    }

    fn finish_day(&mut self, day: u8) -> Result<()> {
        self.finished_days.push(day);
        Ok(())
    }
}
