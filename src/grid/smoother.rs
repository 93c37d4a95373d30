use crate::error::{ProcessingError, Result};
use crate::grid::Field;
use ndarray::{Array2, Axis};

/// Kernels are truncated at this many standard deviations.
const TRUNCATE: f64 = 4.0;

/// Gaussian smoothing for fields with missing cells.
///
/// Intensity is only moved between present cells: the share a cell would
/// have sent to missing neighbours (or past the grid border) is handed back
/// to it, and cells that were missing stay missing.
#[derive(Debug, Clone, Copy)]
pub struct NanConservingSmoother {
    sigma: f64,
}

impl NanConservingSmoother {
    pub fn new(sigma: f64) -> Result<Self> {
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(ProcessingError::Config(format!(
                "Smoothing sigma must be a non-negative number, got {}",
                sigma
            )));
        }
        Ok(Self { sigma })
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn smooth(&self, field: &Field) -> Field {
        let missing = field.mapv(|v| if v.is_none() { 1.0 } else { 0.0 });
        let signal = field.mapv(|v| v.unwrap_or(0.0));

        let loss = gaussian_filter(&missing, self.sigma, 1.0);
        let gauss = gaussian_filter(&signal, self.sigma, 0.0);

        let mut out = field.clone();
        ndarray::Zip::from(&mut out)
            .and(&gauss)
            .and(&loss)
            .for_each(|value, g, l| {
                if let Some(v) = *value {
                    *value = Some(g + l * v);
                }
            });
        out
    }
}

/// Normalized 1-D Gaussian weights over `[-radius, radius]`.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE * sigma + 0.5) as i64;
    let denom = 2.0 * sigma * sigma;

    let weights: Vec<f64> = (-radius..=radius)
        .map(|x| (-((x * x) as f64) / denom).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Separable Gaussian blur, rows then columns, treating every cell beyond
/// the border as `outside`.
fn gaussian_filter(input: &Array2<f64>, sigma: f64, outside: f64) -> Array2<f64> {
    if sigma <= f64::EPSILON {
        return input.clone();
    }

    let kernel = gaussian_kernel(sigma);
    let blurred = filter_along(input, Axis(0), &kernel, outside);
    filter_along(&blurred, Axis(1), &kernel, outside)
}

fn filter_along(input: &Array2<f64>, axis: Axis, kernel: &[f64], outside: f64) -> Array2<f64> {
    let radius = (kernel.len() / 2) as i64;
    let mut output = Array2::zeros(input.dim());

    for (lane_in, mut lane_out) in input
        .lanes(axis)
        .into_iter()
        .zip(output.lanes_mut(axis).into_iter())
    {
        let n = lane_in.len() as i64;
        for i in 0..n {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let j = i + k as i64 - radius;
                let v = if (0..n).contains(&j) {
                    lane_in[j as usize]
                } else {
                    outside
                };
                acc += w * v;
            }
            lane_out[i as usize] = acc;
        }
    }

    output
}
