//! Linear unit conversions applied to dataset fields

use serde::{Deserialize, Serialize};

/// A linear map `value * scale / divisor + offset`
///
/// `divisor` is applied as a true division, so `divide_by(100.0)` gives
/// exactly `p / 100`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearTransform {
    pub scale: f64,
    #[serde(default = "unit_divisor")]
    pub divisor: f64,
    pub offset: f64,
}

fn unit_divisor() -> f64 {
    1.0
}

impl LinearTransform {
    /// Create a new transform
    #[must_use]
    pub const fn new(scale: f64, offset: f64) -> Self {
        Self {
            scale,
            divisor: 1.0,
            offset,
        }
    }

    /// `value / divisor`
    #[must_use]
    pub const fn divide_by(divisor: f64) -> Self {
        Self {
            scale: 1.0,
            divisor,
            offset: 0.0,
        }
    }

    /// Transform that leaves values unchanged
    #[must_use]
    pub const fn identity() -> Self {
        Self::new(1.0, 0.0)
    }

    /// Apply the transform to a single value
    #[must_use]
    pub fn apply(&self, value: f64) -> f64 {
        value * self.scale / self.divisor + self.offset
    }

    /// Apply to an `f32` sample, computing in `f64`
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn apply_f32(&self, value: f32) -> f32 {
        self.apply(f64::from(value)) as f32
    }

    /// The transform that undoes this one. A zero scale or divisor has no inverse.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        if self.scale == 0.0 || self.divisor == 0.0 {
            return None;
        }
        Some(Self {
            scale: self.divisor,
            divisor: self.scale,
            offset: -self.offset * self.divisor / self.scale,
        })
    }

    /// Compose: apply `self` first, then `next`
    #[must_use]
    pub fn then(&self, next: &Self) -> Self {
        Self {
            scale: self.scale * next.scale,
            divisor: self.divisor * next.divisor,
            offset: self.offset * next.scale / next.divisor + next.offset,
        }
    }
}

impl Default for LinearTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Pa -> hPa
pub const PASCAL_TO_HECTOPASCAL: LinearTransform = LinearTransform::divide_by(100.0);

/// K -> °C
pub const KELVIN_TO_CELSIUS: LinearTransform = LinearTransform::new(1.0, -273.15);

/// Unit label written after [`PASCAL_TO_HECTOPASCAL`]
pub const HECTOPASCAL: &str = "hPa";

/// Unit label written after [`KELVIN_TO_CELSIUS`]
pub const CELSIUS: &str = "C";

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * a.abs().max(1.0)
    }

    #[test]
    fn pressure_is_divided_by_one_hundred() {
        for p in [101_325.0, 98_000.5, 0.0, 103_000.0, 7.0, 100_123.37, 99_999.99] {
            assert_eq!(PASCAL_TO_HECTOPASCAL.apply(p), p / 100.0);
        }
        for p in [101_325.0_f32, 98_765.43, 100_400.0] {
            assert_eq!(PASCAL_TO_HECTOPASCAL.apply_f32(p), (f64::from(p) / 100.0) as f32);
        }
    }

    #[test]
    fn kelvin_offset() {
        for t in [273.15, 300.0, 250.5, 310.25] {
            assert_eq!(KELVIN_TO_CELSIUS.apply(t), t - 273.15);
        }
        assert!(close(KELVIN_TO_CELSIUS.apply(300.0), 26.85));
    }

    #[test]
    fn divisor_defaults_to_one_when_deserialized() {
        let t: LinearTransform = serde_json::from_str(r#"{"scale": 1.8, "offset": 32.0}"#).unwrap();
        assert_eq!(t, LinearTransform::new(1.8, 32.0));
        let p: LinearTransform =
            serde_json::from_str(r#"{"scale": 1.0, "divisor": 100.0, "offset": 0.0}"#).unwrap();
        assert_eq!(p, PASCAL_TO_HECTOPASCAL);
    }

    #[test]
    fn inverse_round_trips() {
        for t in [PASCAL_TO_HECTOPASCAL, KELVIN_TO_CELSIUS, LinearTransform::new(2.5, -4.0)] {
            let inv = t.inverse().unwrap();
            for v in [-40.0, 0.0, 15.5, 101_325.0] {
                assert!(close(inv.apply(t.apply(v)), v));
            }
        }
        assert!(LinearTransform::new(0.0, 1.0).inverse().is_none());
    }

    #[test]
    fn composition_matches_sequential_application() {
        let both = KELVIN_TO_CELSIUS.then(&LinearTransform::new(1.8, 32.0));
        assert!(close(both.apply(273.15), 32.0));
        assert!(close(both.apply(373.15), 212.0));
    }
}
