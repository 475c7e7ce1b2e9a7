//! Parallel computation implementations for statistical operations
//!
//! Each output cell reduces one lane of the input along the chosen axis. Lanes
//! are distributed over the rayon pool; accumulation happens in `f64` and
//! non-finite samples are skipped. A lane with no finite samples yields NaN.

use ndarray::{ArrayD, ArrayView1, Axis, Zip};

fn par_reduce_lanes<F>(data: &ArrayD<f32>, axis: usize, reduce: F) -> ArrayD<f32>
where
    F: Fn(ArrayView1<'_, f32>) -> f32 + Sync + Send,
{
    Zip::from(data.lanes(Axis(axis))).par_map_collect(|lane| reduce(lane))
}

/// Running count / mean / M2 over the finite values of a lane (Welford)
fn moments(lane: ArrayView1<'_, f32>) -> (u64, f64, f64) {
    lane.iter()
        .filter(|v| v.is_finite())
        .fold((0_u64, 0.0_f64, 0.0_f64), |(n, mean, m2), &v| {
            let x = f64::from(v);
            let n = n + 1;
            #[allow(clippy::cast_precision_loss)]
            let delta = (x - mean) / n as f64;
            let mean = mean + delta;
            (n, mean, m2 + (x - mean) * (x - (mean - delta)))
        })
}

/// Computes mean along an axis using parallel processing
#[allow(clippy::cast_possible_truncation)]
pub fn parallel_mean_axis(data: &ArrayD<f32>, axis: usize) -> ArrayD<f32> {
    par_reduce_lanes(data, axis, |lane| match moments(lane) {
        (0, _, _) => f32::NAN,
        (_, mean, _) => mean as f32,
    })
}

/// Computes the population standard deviation along an axis
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn parallel_std_axis(data: &ArrayD<f32>, axis: usize) -> ArrayD<f32> {
    par_reduce_lanes(data, axis, |lane| match moments(lane) {
        (0, _, _) => f32::NAN,
        (n, _, m2) => (m2 / n as f64).sqrt() as f32,
    })
}

/// Computes minimum along an axis using parallel processing
pub fn parallel_min_axis(data: &ArrayD<f32>, axis: usize) -> ArrayD<f32> {
    par_reduce_lanes(data, axis, |lane| {
        lane.iter()
            .copied()
            .filter(|v| v.is_finite())
            .reduce(f32::min)
            .unwrap_or(f32::NAN)
    })
}

/// Computes maximum along an axis using parallel processing
pub fn parallel_max_axis(data: &ArrayD<f32>, axis: usize) -> ArrayD<f32> {
    par_reduce_lanes(data, axis, |lane| {
        lane.iter()
            .copied()
            .filter(|v| v.is_finite())
            .reduce(f32::max)
            .unwrap_or(f32::NAN)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn cube() -> ArrayD<f32> {
        // time=4, lat=3, lon=2 filled with 1..=24
        Array3::from_shape_vec((4, 3, 2), (1..=24).map(|i| i as f32).collect())
            .unwrap()
            .into_dyn()
    }

    #[test]
    fn mean_over_time() {
        let mean = parallel_mean_axis(&cube(), 0);
        assert_eq!(mean.shape(), &[3, 2]);
        // (1 + 7 + 13 + 19) / 4
        assert_eq!(mean[[0, 0]], 10.0);
        assert_eq!(mean[[0, 1]], 11.0);
    }

    #[test]
    fn std_over_time_uses_population_convention() {
        let std = parallel_std_axis(&cube(), 0);
        // values 1, 7, 13, 19: deviations ±3, ±9 -> var = (9+81+81+9)/4 = 45
        assert!((std[[0, 0]] - 45.0_f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn nan_values_are_skipped() {
        let mut data = cube();
        data[[0, 0, 0]] = f32::NAN;
        let mean = parallel_mean_axis(&data, 0);
        assert_eq!(mean[[0, 0]], (7.0 + 13.0 + 19.0) / 3.0);
        assert_eq!(parallel_min_axis(&data, 0)[[0, 0]], 7.0);
        assert_eq!(parallel_max_axis(&data, 0)[[0, 0]], 19.0);
    }

    #[test]
    fn all_nan_lane_is_nan() {
        let data = ArrayD::from_elem(vec![3, 2], f32::NAN);
        assert!(parallel_mean_axis(&data, 0).iter().all(|v| v.is_nan()));
        assert!(parallel_std_axis(&data, 0).iter().all(|v| v.is_nan()));
        assert!(parallel_min_axis(&data, 0).iter().all(|v| v.is_nan()));
    }
}
