use crate::models::WindSample;

/// Mean wind as a unit direction and the length of the mean vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindAverage {
    /// `None` when the samples cancel out exactly.
    pub direction: Option<(f64, f64)>,
    pub magnitude: f64,
}

impl WindAverage {
    pub fn unit_x(&self) -> Option<f64> {
        self.direction.map(|(x, _)| x)
    }

    pub fn unit_y(&self) -> Option<f64> {
        self.direction.map(|(_, y)| y)
    }
}

/// Vector mean of compass wind readings.
///
/// A reading with bearing `b` and speed `s` is the vector
/// `(-s * sin b, s * cos b)`. Vectors are summed and divided by the number
/// of valid readings, so bearings either side of north average correctly.
#[derive(Debug, Default, Clone, Copy)]
pub struct CircularWindAverager;

impl CircularWindAverager {
    /// Returns `None` when no sample has a finite bearing and speed.
    /// When the readings cancel out exactly, the magnitude is `0.0` and the
    /// direction is `None`.
    pub fn average(samples: &[WindSample]) -> Option<WindAverage> {
        let (sum_x, sum_y, count) = samples
            .iter()
            .filter(|s| s.is_valid())
            .fold((0.0, 0.0, 0usize), |(x, y, n), s| {
                let (sin, cos) = s.bearing.to_radians().sin_cos();
                (x - s.speed * sin, y + s.speed * cos, n + 1)
            });

        if count == 0 {
            return None;
        }

        let mean_x = sum_x / count as f64;
        let mean_y = sum_y / count as f64;
        let magnitude = mean_x.hypot(mean_y);

        let direction = if magnitude > 0.0 {
            Some((mean_x / magnitude, mean_y / magnitude))
        } else {
            None
        };

        Some(WindAverage {
            direction,
            magnitude,
        })
    }
}
