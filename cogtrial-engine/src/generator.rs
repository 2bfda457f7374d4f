//! Constrained random stimulus generation.
//!
//! Both generators take the RNG by `&mut` so a seeded engine replays identically.

use cogtrial_core::{EngineError, Point, Rect, Result, TargetId};
use rand::Rng;
use tracing::{debug, warn};

use crate::config::PlacementConfig;

/// Partial Fisher–Yates over `0..n`: a uniform `k`-subset in uniform order.
/// `k` larger than `n` is clamped to `n`.
pub fn partial_shuffle<R: Rng + ?Sized>(n: usize, k: usize, rng: &mut R) -> Vec<usize> {
    let k = k.min(n);
    let mut pool: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.random_range(i..n);
        pool.swap(i, j);
    }
    pool.truncate(k);
    pool
}

/// Ordered distinct labels from `1..=label_count`
#[derive(Debug, Clone, Copy)]
pub struct UniqueSequenceGenerator {
    pub label_count: u32,
}

impl UniqueSequenceGenerator {
    pub fn new(label_count: u32) -> Self {
        Self { label_count }
    }

    pub fn generate<R: Rng + ?Sized>(&self, span: usize, rng: &mut R) -> Vec<TargetId> {
        let n = self.label_count as usize;
        if span > n {
            warn!(span, labels = n, "sequence span clamped to label count");
        }
        partial_shuffle(n, span, rng)
            .into_iter()
            .map(|i| i as TargetId + 1)
            .collect()
    }
}

/// Result of a placement run
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub points: Vec<Point>,
    /// Spacing could not be satisfied; points may overlap
    pub degraded: bool,
    /// Layout passes consumed
    pub passes: u32,
}

/// Rejection-sampled layout with a minimum pairwise distance.
///
/// A pass places points one at a time, redrawing a rejected point up to
/// `max_attempts` times. If any point runs out of attempts the whole pass is
/// discarded and the next one starts from empty. When every pass fails the
/// generator returns unconstrained points flagged `degraded`.
#[derive(Debug, Clone)]
pub struct NonOverlappingPlacementGenerator {
    bounds: Rect,
    min_pair_distance: f32,
    max_passes: u32,
    max_attempts: u32,
}

impl NonOverlappingPlacementGenerator {
    pub fn new(bounds: Rect, min_pair_distance: f32, max_passes: u32, max_attempts: u32) -> Self {
        Self {
            bounds,
            min_pair_distance,
            max_passes: max_passes.max(1),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Samples inside the padded area shrunk by half the item footprint
    pub fn from_config(config: &PlacementConfig) -> Self {
        Self::new(
            config.sampling_rect(),
            config.min_pair_distance(),
            config.max_passes,
            config.max_attempts,
        )
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn min_pair_distance(&self) -> f32 {
        self.min_pair_distance
    }

    pub fn place<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Result<Placement> {
        if self.bounds.is_degenerate() {
            return Err(EngineError::PlacementInfeasible {
                width: self.bounds.width(),
                height: self.bounds.height(),
            });
        }

        let min_sq = self.min_pair_distance * self.min_pair_distance;
        for pass in 1..=self.max_passes {
            if let Some(points) = self.try_pass(count, min_sq, rng) {
                debug!(count, pass, "placement succeeded");
                return Ok(Placement {
                    points,
                    degraded: false,
                    passes: pass,
                });
            }
        }

        warn!(
            count,
            passes = self.max_passes,
            min_distance = self.min_pair_distance,
            "placement degraded, spacing not satisfiable"
        );
        let points = (0..count).map(|_| self.sample(rng)).collect();
        Ok(Placement {
            points,
            degraded: true,
            passes: self.max_passes,
        })
    }

    fn try_pass<R: Rng + ?Sized>(&self, count: usize, min_sq: f32, rng: &mut R) -> Option<Vec<Point>> {
        let mut points: Vec<Point> = Vec::with_capacity(count);
        'point: for _ in 0..count {
            for _ in 0..self.max_attempts {
                let p = self.sample(rng);
                if points.iter().all(|q| p.distance_sq(q) >= min_sq) {
                    points.push(p);
                    continue 'point;
                }
            }
            return None;
        }
        Some(points)
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Point {
        Point::new(
            rng.random_range(self.bounds.min_x..self.bounds.max_x),
            rng.random_range(self.bounds.min_y..self.bounds.max_y),
        )
    }
}
