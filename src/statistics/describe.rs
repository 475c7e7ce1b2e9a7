//! Descriptive statistics over a flat series of samples

use serde::Serialize;
use std::fmt;

/// count / mean / std / min / quartiles / max of the finite samples
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (ddof = 1); NaN with fewer than two samples
    pub std: f64,
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: f64,
}

/// Summarise `values`, ignoring NaN and infinities
pub fn describe(values: &[f32]) -> Summary {
    let mut sorted: Vec<f64> = values
        .iter()
        .filter(|v| v.is_finite())
        .map(|&v| f64::from(v))
        .collect();
    sorted.sort_by(f64::total_cmp);

    let count = sorted.len();
    if count == 0 {
        return Summary {
            count,
            mean: f64::NAN,
            std: f64::NAN,
            min: f64::NAN,
            p25: f64::NAN,
            p50: f64::NAN,
            p75: f64::NAN,
            max: f64::NAN,
        };
    }

    #[allow(clippy::cast_precision_loss)]
    let n = count as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let std = if count > 1 {
        (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        f64::NAN
    };

    Summary {
        count,
        mean,
        std,
        min: sorted[0],
        p25: quantile(&sorted, 0.25),
        p50: quantile(&sorted, 0.5),
        p75: quantile(&sorted, 0.75),
        max: sorted[count - 1],
    }
}

/// Linear-interpolated quantile of an already sorted, non-empty slice
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "   count: {}", self.count)?;
        writeln!(f, "   mean:  {:.2}", self.mean)?;
        writeln!(f, "   std:   {:.2}", self.std)?;
        writeln!(f, "   min:   {:.2}", self.min)?;
        writeln!(f, "   25%:   {:.2}", self.p25)?;
        writeln!(f, "   50%:   {:.2}", self.p50)?;
        writeln!(f, "   75%:   {:.2}", self.p75)?;
        write!(f, "   max:   {:.2}", self.max)
    }
}
