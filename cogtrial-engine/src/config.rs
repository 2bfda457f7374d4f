use cogtrial_core::{EngineError, Rect, Result, TaskKind};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const MIN_DAY: u8 = 1;
pub const MAX_DAY: u8 = 7;

/// Search tasks always offer between 3 and 12 slots
pub const MIN_SLOTS: u32 = 3;
pub const MAX_SLOTS: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    /// How long each recall item stays lit
    pub present_ms: u64,
    /// Dark interval after each recall item
    pub gap_ms: u64,
    /// Pause after a failed recall attempt before the replay starts
    pub feedback_ms: u64,
    /// Transient re-open of a search slot; input is gated meanwhile. 0 disables the gate.
    pub reveal_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            present_ms: 1000,
            gap_ms: 250,
            feedback_ms: 1500,
            reveal_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayConfig {
    pub day: u8,
    pub trials_per_day: usize,
    /// Sequence length (recall) or target count (search)
    pub difficulty: usize,
    /// Size of the selectable set: label count (recall) or slot count (search)
    pub choices: u32,
    #[serde(default)]
    pub timing: Timing,
}

impl DayConfig {
    /// Task-specific clamping of `choices` and `difficulty`
    pub fn clamped(&self, task: TaskKind) -> DayConfig {
        let choices = match task {
            TaskKind::SequenceRecall => self.choices.max(1),
            TaskKind::SpatialSearch => self.choices.clamp(MIN_SLOTS, MAX_SLOTS),
        };
        let difficulty = self.difficulty.clamp(1, choices as usize);
        if choices != self.choices || difficulty != self.difficulty {
            warn!(
                day = self.day,
                choices,
                difficulty,
                requested_choices = self.choices,
                requested_difficulty = self.difficulty,
                "day configuration clamped"
            );
        }
        DayConfig {
            choices,
            difficulty,
            ..self.clone()
        }
    }
}

/// Layout constraints for spatial-search slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementConfig {
    pub area: Rect,
    /// Keep-out margin along every edge of `area`
    pub padding: f32,
    pub item_width: f32,
    pub item_height: f32,
    /// Extra clearance between two items
    pub min_gap: f32,
    pub max_passes: u32,
    pub max_attempts: u32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            area: Rect::centered(1000.0, 600.0),
            padding: 30.0,
            item_width: 120.0,
            item_height: 120.0,
            min_gap: 20.0,
            max_passes: 32,
            max_attempts: 250,
        }
    }
}

impl PlacementConfig {
    pub fn min_pair_distance(&self) -> f32 {
        self.item_width.max(self.item_height) + self.min_gap
    }

    /// Region item centres may be drawn from
    pub fn sampling_rect(&self) -> Rect {
        self.area.inset(
            self.padding + self.item_width * 0.5,
            self.padding + self.item_height * 0.5,
        )
    }
}

/// Fixed day table for one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayTable {
    pub task: TaskKind,
    pub days: Vec<DayConfig>,
    #[serde(default)]
    pub placement: PlacementConfig,
}

impl DayTable {
    /// Seven-day recall protocol over nine labels
    pub fn sequence_recall() -> Self {
        let spans = [3, 3, 4, 4, 5, 5, 6];
        let days = spans
            .iter()
            .zip(MIN_DAY..=MAX_DAY)
            .map(|(&span, day)| DayConfig {
                day,
                trials_per_day: 7,
                difficulty: span,
                choices: 9,
                timing: Timing::default(),
            })
            .collect();
        Self {
            task: TaskKind::SequenceRecall,
            days,
            placement: PlacementConfig::default(),
        }
    }

    /// Seven-day search protocol, boxes/treasures/trials per day
    pub fn spatial_search() -> Self {
        let rows: [(u32, usize, usize); 7] = [
            (3, 2, 5),
            (4, 2, 5),
            (4, 3, 6),
            (6, 3, 6),
            (6, 4, 7),
            (6, 4, 7),
            (8, 4, 8),
        ];
        let timing = Timing {
            present_ms: 0,
            gap_ms: 0,
            feedback_ms: 0,
            reveal_ms: 600,
        };
        let days = rows
            .iter()
            .zip(MIN_DAY..=MAX_DAY)
            .map(|(&(boxes, treasures, trials), day)| DayConfig {
                day,
                trials_per_day: trials,
                difficulty: treasures,
                choices: boxes,
                timing,
            })
            .collect();
        Self {
            task: TaskKind::SpatialSearch,
            days,
            placement: PlacementConfig::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let table: DayTable = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidConfig(format!("day table: {e}")))?;
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<()> {
        if self.days.is_empty() {
            return Err(EngineError::InvalidConfig("day table is empty".into()));
        }
        for (i, cfg) in self.days.iter().enumerate() {
            if !(MIN_DAY..=MAX_DAY).contains(&cfg.day) {
                return Err(EngineError::InvalidConfig(format!(
                    "day {} outside {}..={}",
                    cfg.day, MIN_DAY, MAX_DAY
                )));
            }
            if self.days[..i].iter().any(|other| other.day == cfg.day) {
                return Err(EngineError::InvalidConfig(format!(
                    "day {} configured twice",
                    cfg.day
                )));
            }
            if cfg.trials_per_day == 0 {
                return Err(EngineError::InvalidConfig(format!(
                    "day {} has no trials",
                    cfg.day
                )));
            }
            if cfg.choices == 0 {
                return Err(EngineError::InvalidConfig(format!(
                    "day {} has an empty choice set",
                    cfg.day
                )));
            }
        }
        if self.task == TaskKind::SpatialSearch {
            let p = &self.placement;
            if p.max_passes == 0 || p.max_attempts == 0 {
                return Err(EngineError::InvalidConfig(
                    "placement needs at least one pass and one attempt".into(),
                ));
            }
            let rect = p.sampling_rect();
            if rect.is_degenerate() {
                return Err(EngineError::PlacementInfeasible {
                    width: rect.width(),
                    height: rect.height(),
                });
            }
        }
        Ok(())
    }

    pub fn clamp_day(day: u8) -> u8 {
        day.clamp(MIN_DAY, MAX_DAY)
    }

    /// Looks up a day (clamped to the protocol range) and applies task clamping
    pub fn day(&self, day: u8) -> Result<DayConfig> {
        let wanted = Self::clamp_day(day);
        if wanted != day {
            warn!(requested = day, using = wanted, "day number clamped");
        }
        self.days
            .iter()
            .find(|cfg| cfg.day == wanted)
            .map(|cfg| cfg.clamped(self.task))
            .ok_or(EngineError::MissingDay(wanted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate_and_cover_every_day() {
        for table in [DayTable::sequence_recall(), DayTable::spatial_search()] {
            table.validate().unwrap();
            for day in MIN_DAY..=MAX_DAY {
                assert_eq!(table.day(day).unwrap().day, day);
            }
        }
    }

    #[test]
    fn search_preset_matches_protocol_rows() {
        let table = DayTable::spatial_search();
        let day4 = table.day(4).unwrap();
        assert_eq!(
            (day4.choices, day4.difficulty, day4.trials_per_day),
            (6, 3, 6)
        );
        let day7 = table.day(7).unwrap();
        assert_eq!((day7.choices, day7.difficulty, day7.trials_per_day), (8, 4, 8));
    }

    #[test]
    fn day_number_is_clamped_before_lookup() {
        let table = DayTable::spatial_search();
        assert_eq!(table.day(0).unwrap().day, 1);
        assert_eq!(table.day(42).unwrap().day, 7);
    }

    #[test]
    fn absent_day_is_a_configuration_error() {
        let mut table = DayTable::sequence_recall();
        table.days.retain(|d| d.day != 3);
        let err = table.day(3).unwrap_err();
        assert_eq!(err, EngineError::MissingDay(3));
        assert!(err.is_configuration());
    }

    #[test]
    fn search_days_clamp_slots_and_targets() {
        let cfg = DayConfig {
            day: 1,
            trials_per_day: 1,
            difficulty: 30,
            choices: 40,
            timing: Timing::default(),
        };
        let clamped = cfg.clamped(TaskKind::SpatialSearch);
        assert_eq!(clamped.choices, MAX_SLOTS);
        assert_eq!(clamped.difficulty, MAX_SLOTS as usize);

        let recall = DayConfig {
            difficulty: 0,
            choices: 9,
            ..cfg
        }
        .clamped(TaskKind::SequenceRecall);
        assert_eq!(recall.difficulty, 1);
    }

    #[test]
    fn duplicate_days_are_rejected() {
        let mut table = DayTable::sequence_recall();
        let dup = table.days[0].clone();
        table.days.push(dup);
        assert!(matches!(table.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn tiny_play_area_is_infeasible() {
        let mut table = DayTable::spatial_search();
        table.placement.area = Rect::centered(150.0, 150.0);
        let err = table.validate().unwrap_err();
        assert!(matches!(err, EngineError::PlacementInfeasible { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn table_loads_from_json_with_default_timing() {
        let json = r#"{
            "task": "sequence_recall",
            "days": [{ "day": 1, "trials_per_day": 2, "difficulty": 3, "choices": 9 }]
        }"#;
        let table = DayTable::from_json(json).unwrap();
        assert_eq!(table.days[0].timing, Timing::default());
        assert!(matches!(
            DayTable::from_json("{}"),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
