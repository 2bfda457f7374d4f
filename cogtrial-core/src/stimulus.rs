use serde::{Deserialize, Serialize};

/// Identifier carried by a selection: a label (1-based) for recall, a slot id (0-based) for search
pub type TargetId = u32;

/// The two task shapes driven by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    SequenceRecall,
    SpatialSearch,
}

impl TaskKind {
    /// Stable identifier written into session records
    pub fn task_id(&self) -> &'static str {
        match self {
            TaskKind::SequenceRecall => "constellation",
            TaskKind::SpatialSearch => "treasure_hunt",
        }
    }

    pub fn has_presentation(&self) -> bool {
        matches!(self, TaskKind::SequenceRecall)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_sq(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn distance(&self, other: &Point) -> f32 {
        self.distance_sq(other).sqrt()
    }
}

/// Axis-aligned rectangle in layout units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Rect {
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Rectangle of the given size centred on the origin
    pub fn centered(width: f32, height: f32) -> Self {
        Self::new(-width / 2.0, -height / 2.0, width / 2.0, height / 2.0)
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    /// True when either axis has no room left (`min >= max`)
    pub fn is_degenerate(&self) -> bool {
        !(self.min_x < self.max_x && self.min_y < self.max_y)
    }

    /// Shrinks every edge inward
    pub fn inset(&self, dx: f32, dy: f32) -> Self {
        Self::new(
            self.min_x + dx,
            self.min_y + dy,
            self.max_x - dx,
            self.max_y - dy,
        )
    }

    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }
}

/// Slot centres of a spatial-search trial, indexed by slot id
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SlotLayout {
    pub positions: Vec<Point>,
    /// Spacing was not honoured; the layout came from the fallback path
    pub degraded: bool,
}

/// Task-specific trial payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stimulus {
    /// Ordered distinct labels drawn from `1..=label_count`
    Sequence { labels: Vec<TargetId>, label_count: u32 },
    /// `targets` (sorted) out of `slot_count` slots
    Search {
        slot_count: u32,
        targets: Vec<TargetId>,
        layout: SlotLayout,
    },
}

impl Stimulus {
    pub fn task(&self) -> TaskKind {
        match self {
            Stimulus::Sequence { .. } => TaskKind::SequenceRecall,
            Stimulus::Search { .. } => TaskKind::SpatialSearch,
        }
    }

    /// Span for recall, target count for search
    pub fn difficulty(&self) -> usize {
        match self {
            Stimulus::Sequence { labels, .. } => labels.len(),
            Stimulus::Search { targets, .. } => targets.len(),
        }
    }

    /// Expected labels in order, or target slot ids ascending
    pub fn target_set(&self) -> &[TargetId] {
        match self {
            Stimulus::Sequence { labels, .. } => labels,
            Stimulus::Search { targets, .. } => targets,
        }
    }

    /// Whether a selection may name this id at all
    pub fn accepts_id(&self, id: TargetId) -> bool {
        match self {
            Stimulus::Sequence { label_count, .. } => (1..=*label_count).contains(&id),
            Stimulus::Search { slot_count, .. } => id < *slot_count,
        }
    }

    /// Number of selectable ids
    pub fn choice_count(&self) -> u32 {
        match self {
            Stimulus::Sequence { label_count, .. } => *label_count,
            Stimulus::Search { slot_count, .. } => *slot_count,
        }
    }

    pub fn is_target(&self, id: TargetId) -> bool {
        self.target_set().contains(&id)
    }

    pub fn layout(&self) -> Option<&SlotLayout> {
        match self {
            Stimulus::Search { layout, .. } => Some(layout),
            Stimulus::Sequence { .. } => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Stimulus::Sequence {
                labels,
                label_count,
            } => format!("sequence {:?} of {}", labels, label_count),
            Stimulus::Search {
                slot_count,
                targets,
                layout,
            } => format!(
                "search {:?} in {} slots{}",
                targets,
                slot_count,
                if layout.degraded { " (degraded layout)" } else { "" }
            ),
        }
    }
}
