// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scale calibration.
//
// Two picked points plus a known real-world distance give the physical length
// one document pixel represents.  The result is always expressed in mm/pixel;
// display units are applied only when formatting.

use serde::{Deserialize, Serialize};
use tilewerk_core::error::{Result, TilewerkError};
use tilewerk_core::types::{PointPx, Units};
use tracing::debug;

/// Millimetres represented by one document pixel. Always finite and > 0.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ScaleFactor(f64);

impl ScaleFactor {
    pub fn new(mm_per_px: f64) -> Result<Self> {
        if mm_per_px.is_finite() && mm_per_px > 0.0 {
            Ok(Self(mm_per_px))
        } else {
            Err(TilewerkError::InvalidCalibration(format!(
                "scale factor must be positive (got {mm_per_px})"
            )))
        }
    }

    pub fn mm_per_px(&self) -> f64 {
        self.0
    }

    pub fn px_per_mm(&self) -> f64 {
        1.0 / self.0
    }

    /// Physical length to document pixels.
    pub fn mm_to_px(&self, mm: f64) -> f64 {
        mm / self.0
    }

    pub fn px_to_mm(&self, px: f64) -> f64 {
        px * self.0
    }

    /// Human-readable scale, e.g. `"1:10.0 (pixel = 0.100 mm)"`.
    pub fn describe(&self, units: Units) -> String {
        let scale = units.from_mm(self.0);
        let label = units.label();
        if scale >= 1.0 {
            format!("{scale:.3} {label}/pixel")
        } else {
            let ratio = 1.0 / scale;
            format!("1:{ratio:.1} (pixel = {scale:.3} {label})")
        }
    }
}

impl TryFrom<f64> for ScaleFactor {
    type Error = TilewerkError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ScaleFactor> for f64 {
    fn from(value: ScaleFactor) -> Self {
        value.0
    }
}

/// A user calibration: two document points a known distance apart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleCalibration {
    pub p1: PointPx,
    pub p2: PointPx,
    /// Real-world distance between the points, in `units`.
    pub real_distance: f64,
    pub units: Units,
}

impl ScaleCalibration {
    pub fn new(p1: PointPx, p2: PointPx, real_distance: f64, units: Units) -> Self {
        Self {
            p1,
            p2,
            real_distance,
            units,
        }
    }

    pub fn pixel_distance(&self) -> f64 {
        self.p1.distance_to(&self.p2)
    }

    /// Label drawn beside the calibration line, e.g. `"1000 mm"`.
    pub fn measurement_label(&self) -> String {
        format!("{} {}", self.real_distance, self.units.label())
    }
}

/// Resolves calibrations into scale factors.
pub struct ScaleResolver;

impl ScaleResolver {
    /// Compute mm/pixel from a calibration.
    ///
    /// Fails when either the pixel distance or the real distance is not
    /// strictly positive.  The result does not depend on point order.
    pub fn resolve(calibration: &ScaleCalibration) -> Result<ScaleFactor> {
        let pixel_distance = calibration.pixel_distance();
        if !(pixel_distance > 0.0) {
            return Err(TilewerkError::InvalidCalibration(
                "the two calibration points are identical".into(),
            ));
        }
        if !(calibration.real_distance.is_finite() && calibration.real_distance > 0.0) {
            return Err(TilewerkError::InvalidCalibration(format!(
                "real distance must be positive (got {})",
                calibration.real_distance
            )));
        }

        let real_mm = calibration.units.to_mm(calibration.real_distance);
        let scale = ScaleFactor::new(real_mm / pixel_distance)?;
        debug!(
            pixel_distance,
            real_mm,
            mm_per_px = scale.mm_per_px(),
            "calibration resolved"
        );
        Ok(scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cal(p1: (f64, f64), p2: (f64, f64), distance: f64, units: Units) -> ScaleCalibration {
        ScaleCalibration::new(
            PointPx::new(p1.0, p1.1),
            PointPx::new(p2.0, p2.1),
            distance,
            units,
        )
    }

    #[test]
    fn hundred_pixels_for_a_metre() {
        let scale = ScaleResolver::resolve(&cal((100.0, 100.0), (200.0, 100.0), 1000.0, Units::Mm))
            .expect("valid calibration");
        assert!((scale.mm_per_px() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn point_order_does_not_matter() {
        let cases = [
            ((0.0, 0.0), (300.0, 400.0), 50.0),
            ((12.5, 7.0), (3.0, 99.0), 2.75),
            ((-40.0, 10.0), (60.0, -90.0), 1234.0),
        ];
        for (a, b, d) in cases {
            let forward = ScaleResolver::resolve(&cal(a, b, d, Units::Inches)).expect("forward");
            let backward = ScaleResolver::resolve(&cal(b, a, d, Units::Inches)).expect("backward");
            assert_eq!(forward, backward);
        }
    }

    #[test]
    fn inches_are_converted_to_mm() {
        let scale = ScaleResolver::resolve(&cal((0.0, 0.0), (0.0, 254.0), 10.0, Units::Inches))
            .expect("valid calibration");
        assert!((scale.mm_per_px() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn identical_points_are_rejected() {
        let err = ScaleResolver::resolve(&cal((5.0, 5.0), (5.0, 5.0), 10.0, Units::Mm));
        assert!(matches!(err, Err(TilewerkError::InvalidCalibration(_))));
    }

    #[test]
    fn non_positive_distance_is_rejected() {
        for d in [0.0, -3.0, f64::NAN] {
            let err = ScaleResolver::resolve(&cal((0.0, 0.0), (10.0, 0.0), d, Units::Mm));
            assert!(err.is_err(), "distance {d} should be rejected");
        }
    }

    #[test]
    fn describe_switches_to_ratio_below_one() {
        let coarse = ScaleFactor::new(2.5).expect("scale");
        assert_eq!(coarse.describe(Units::Mm), "2.500 mm/pixel");

        let fine = ScaleFactor::new(0.1).expect("scale");
        assert_eq!(fine.describe(Units::Mm), "1:10.0 (pixel = 0.100 mm)");
    }

    #[test]
    fn measurement_label_uses_unit_name() {
        let c = cal((0.0, 0.0), (1.0, 0.0), 1000.0, Units::Mm);
        assert_eq!(c.measurement_label(), "1000 mm");
    }

    #[test]
    fn deserializing_zero_scale_fails() {
        assert!(serde_json::from_str::<ScaleFactor>("0.0").is_err());
        let ok: ScaleFactor = serde_json::from_str("0.25").expect("parse");
        assert_eq!(ok.mm_per_px(), 0.25);
    }
}
