use crate::error::{ProcessingError, Result};
use crate::grid::{Field, GridIndex, LandMask};
use ndarray::Array2;
use rstar::primitives::GeomWithData;
use rstar::RTree;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

/// One metric value placed on the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSample {
    pub index: GridIndex,
    pub value: f64,
}

impl GridSample {
    pub fn new(index: GridIndex, value: f64) -> Self {
        Self { index, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InterpolationStrategy {
    /// Every cell takes the value of the closest sample in index space.
    #[default]
    Nearest,
    /// Weighted by `1 / distance^power` over all samples.
    InverseDistance { power: f64 },
}

impl FromStr for InterpolationStrategy {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "nearest" => Ok(InterpolationStrategy::Nearest),
            "idw" | "inverse_distance" => Ok(InterpolationStrategy::InverseDistance { power: 2.0 }),
            other => Err(ProcessingError::Config(format!(
                "Unsupported interpolation strategy: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for InterpolationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpolationStrategy::Nearest => write!(f, "nearest"),
            InterpolationStrategy::InverseDistance { power } => write!(f, "idw(p={})", power),
        }
    }
}

type IndexedValue = GeomWithData<[f64; 2], f64>;

/// Turns scattered grid samples into a dense, masked field.
pub struct ScatteredFieldInterpolator {
    height: usize,
    width: usize,
    strategy: InterpolationStrategy,
    mask: Arc<LandMask>,
}

impl ScatteredFieldInterpolator {
    pub fn new(mask: Arc<LandMask>) -> Self {
        let (height, width) = mask.shape();
        Self {
            height,
            width,
            strategy: InterpolationStrategy::Nearest,
            mask,
        }
    }

    pub fn with_strategy(mut self, strategy: InterpolationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> InterpolationStrategy {
        self.strategy
    }

    /// Interpolate and mask. Fails with `Interpolation` when no usable sample remains.
    pub fn try_interpolate(&self, samples: &[GridSample]) -> Result<Field> {
        let merged = merge_collisions(samples);
        if merged.is_empty() {
            return Err(ProcessingError::Interpolation(format!(
                "{} needs at least one finite sample",
                self.strategy
            )));
        }

        let mut field = match self.strategy {
            InterpolationStrategy::Nearest => self.nearest(&merged),
            InterpolationStrategy::InverseDistance { power } => {
                self.inverse_distance(&merged, power)
            }
        };

        self.mask.apply(&mut field)?;
        Ok(field)
    }

    /// Like `try_interpolate`, but a channel without samples comes back
    /// entirely empty instead of failing.
    pub fn interpolate(&self, samples: &[GridSample]) -> Result<Field> {
        match self.try_interpolate(samples) {
            Err(ProcessingError::Interpolation(reason)) => {
                warn!("Emitting empty channel: {}", reason);
                Ok(Array2::from_elem((self.height, self.width), None))
            }
            other => other,
        }
    }

    fn nearest(&self, samples: &[GridSample]) -> Field {
        let tree = RTree::bulk_load(
            samples
                .iter()
                .map(|s| IndexedValue::new([s.index.row as f64, s.index.col as f64], s.value))
                .collect(),
        );

        Array2::from_shape_fn((self.height, self.width), |(row, col)| {
            let query = [row as f64, col as f64];
            let mut neighbours = tree.nearest_neighbor_iter_with_distance_2(&query);
            let (mut best, best_distance) = neighbours.next()?;

            // Equidistant samples resolve to the lowest (row, col)
            for (candidate, distance) in neighbours {
                if distance > best_distance {
                    break;
                }
                if candidate.geom() < best.geom() {
                    best = candidate;
                }
            }

            Some(best.data)
        })
    }

    fn inverse_distance(&self, samples: &[GridSample], power: f64) -> Field {
        Array2::from_shape_fn((self.height, self.width), |(row, col)| {
            let mut weighted = 0.0;
            let mut total_weight = 0.0;

            for sample in samples {
                let dr = sample.index.row as f64 - row as f64;
                let dc = sample.index.col as f64 - col as f64;
                let distance = (dr * dr + dc * dc).sqrt();
                if distance == 0.0 {
                    return Some(sample.value);
                }
                let weight = distance.powf(-power);
                weighted += weight * sample.value;
                total_weight += weight;
            }

            Some(weighted / total_weight)
        })
    }
}

/// Drop non-finite values and average samples that share a cell.
///
/// Colliding values are summed in input order, so callers that need
/// bit-stable output should pass samples in a stable order.
pub fn merge_collisions(samples: &[GridSample]) -> Vec<GridSample> {
    let mut cells: BTreeMap<GridIndex, (f64, usize)> = BTreeMap::new();

    for sample in samples.iter().filter(|s| s.value.is_finite()) {
        let entry = cells.entry(sample.index).or_insert((0.0, 0));
        entry.0 += sample.value;
        entry.1 += 1;
    }

    cells
        .into_iter()
        .map(|(index, (sum, count))| GridSample::new(index, sum / count as f64))
        .collect()
}
