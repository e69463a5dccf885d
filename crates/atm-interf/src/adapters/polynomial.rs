//! Polynomial refractivity with cotangent-ratio bending
//!
//! Refractivity is a low-order polynomial in height (optionally of its
//! logarithm), evaluated at the antenna and at the reflecting surface and
//! combined by logarithmic mean. Bending is
//!
//! ```text
//! de = a·cot(e + b/(e + c))
//! ```
//!
//! with its rate d(de)/de computed analytically.

use crate::broadcast::{broadcast, common_len};
use crate::engine::{compute_delay_and_height, AtmInput, InterfSolution};
use crate::meteo::logavg;
use crate::options::InterfOptions;
use crate::trig::{cotd, csc2d};
use crate::{AtmError, AtmosphericState, Result};
use ndarray::{Array1, Zip};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

/// Surface refractivity of the default log-linear profile
const DEFAULT_N0: f64 = 3.15e-4;

/// Refractivity scale height of the default profile (m)
const DEFAULT_SCALE_HEIGHT_M: f64 = 7_000.0;

/// Refractivity as a function of height above the ellipsoid (m)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "coeffs", rename_all = "snake_case")]
pub enum RefractivityModel {
    /// N(h) = Σ cᵢ·hⁱ
    Polynomial(Vec<f64>),
    /// ln N(h) = Σ cᵢ·hⁱ
    LogPolynomial(Vec<f64>),
}

impl RefractivityModel {
    fn coeffs(&self) -> &[f64] {
        match self {
            Self::Polynomial(c) | Self::LogPolynomial(c) => c,
        }
    }

    /// Two or three finite coefficients, lowest order first.
    pub fn validate(&self) -> Result<()> {
        let c = self.coeffs();
        if !(2..=3).contains(&c.len()) {
            return Err(AtmError::InvalidCoefficients(format!(
                "refractivity polynomial needs 2 or 3 terms, got {}",
                c.len()
            )));
        }
        if c.iter().any(|x| !x.is_finite()) {
            return Err(AtmError::InvalidCoefficients(format!(
                "non-finite refractivity coefficient in {:?}",
                c
            )));
        }
        Ok(())
    }

    pub fn evaluate(&self, height_m: f64) -> f64 {
        // Horner
        let poly = self.coeffs().iter().rev().fold(0.0, |acc, &c| acc * height_m + c);
        match self {
            Self::Polynomial(_) => poly,
            Self::LogPolynomial(_) => poly.exp(),
        }
    }

    /// Logarithmic mean of N over the layer between antenna and surface.
    pub fn layer_mean(&self, antenna_height_m: f64, reflector_height_m: f64) -> f64 {
        logavg(
            self.evaluate(antenna_height_m),
            self.evaluate(antenna_height_m - reflector_height_m),
        )
    }
}

impl Default for RefractivityModel {
    fn default() -> Self {
        Self::LogPolynomial(vec![DEFAULT_N0.ln(), -1.0 / DEFAULT_SCALE_HEIGHT_M])
    }
}

/// Coefficients of `de = a·cot(e + b/(e + c))`, elevations in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BendingCoeffs {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Default for BendingCoeffs {
    fn default() -> Self {
        Self {
            a: 1.0 / 60.0,
            b: 7.31,
            c: 4.4,
        }
    }
}

impl BendingCoeffs {
    /// Bending `de` (deg) and `der = d(de)/de` at elevation `e` (deg).
    ///
    /// The cotangent argument is clamped at 90° so the bending never turns
    /// negative near zenith.
    pub fn evaluate(&self, e: f64) -> (f64, f64) {
        let shift = self.b / (e + self.c);
        let raw = e + shift;
        let (arg, darg) = if raw > 90.0 {
            (90.0, 0.0)
        } else {
            (raw, 1.0 - shift / (e + self.c))
        };
        let de = self.a * cotd(arg);
        let der = -self.a * csc2d(arg) * (PI / 180.0) * darg;
        (de, der)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolynomialOptions {
    pub refractivity: RefractivityModel,
    pub bending: BendingCoeffs,
}

/// Atmospheric state from the polynomial model.
///
/// `e` (deg) and `h` (reflector height, m) broadcast against each other;
/// `antenna_height_m` is the antenna height above the ellipsoid.
pub fn polynomial_state(
    e: &Array1<f64>,
    h: &Array1<f64>,
    antenna_height_m: f64,
    options: &PolynomialOptions,
) -> Result<AtmosphericState> {
    options.refractivity.validate()?;
    let len = common_len(&[("e", e.len()), ("H", h.len())])?;
    let e = broadcast("e", e, len)?;
    let h = broadcast("H", h, len)?;

    let n = h.mapv(|h| options.refractivity.layer_mean(antenna_height_m, h));

    let mut de = Array1::<f64>::zeros(len);
    let mut der = Array1::<f64>::zeros(len);
    Zip::from(&mut de)
        .and(&mut der)
        .and(&e)
        .for_each(|de, der, &e| {
            (*de, *der) = options.bending.evaluate(e);
        });

    debug!(
        "Polynomial state for {} samples, antenna at {:.1} m",
        len, antenna_height_m
    );
    Ok(AtmosphericState {
        n,
        de,
        der: Some(der),
    })
}

/// Delays and heights with the polynomial atmosphere.
pub fn polynomial_adapter(
    e: &Array1<f64>,
    h: &Array1<f64>,
    antenna_height_m: f64,
    options: &PolynomialOptions,
    interf: &InterfOptions,
) -> Result<InterfSolution> {
    let state = polynomial_state(e, h, antenna_height_m, options)?;
    compute_delay_and_height(&AtmInput::from_state(e.clone(), h.clone(), state), interf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient::gradient_all;
    use ndarray::array;

    #[test]
    fn test_default_profile() {
        let model = RefractivityModel::default();
        assert!((model.evaluate(0.0) - 3.15e-4).abs() < 1e-17);
        // One scale height up
        assert!((model.evaluate(7_000.0) - 3.15e-4 / std::f64::consts::E).abs() < 1e-15);
    }

    #[test]
    fn test_linear_polynomial() {
        let model = RefractivityModel::Polynomial(vec![3.0e-4, -3.0e-8, 0.0]);
        assert!((model.evaluate(1_000.0) - 2.7e-4).abs() < 1e-18);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_term_count() {
        let err = RefractivityModel::Polynomial(vec![3.0e-4]).validate().unwrap_err();
        assert!(matches!(err, AtmError::InvalidCoefficients(_)));
        assert!(RefractivityModel::LogPolynomial(vec![1.0, 2.0, 3.0, 4.0]).validate().is_err());
        assert!(RefractivityModel::Polynomial(vec![f64::NAN, 0.0]).validate().is_err());
    }

    #[test]
    fn test_layer_mean_of_log_linear_is_midpoint_value() {
        // For an exponential profile the log mean is exact at the layer midpoint
        let model = RefractivityModel::default();
        let mean = model.layer_mean(500.0, 100.0);
        assert!((mean - model.evaluate(450.0)).abs() < 1e-17);
    }

    #[test]
    fn test_bending_known_values() {
        let coeffs = BendingCoeffs::default();
        let (de, der) = coeffs.evaluate(45.0);
        // cot(45.148) / 60 ≈ 0.01658 deg
        assert!((de - 0.016_58).abs() < 1e-5, "de = {}", de);
        assert!(der < 0.0);

        let (de_zenith, der_zenith) = coeffs.evaluate(89.99);
        assert_eq!(de_zenith, 0.0);
        assert_eq!(der_zenith, 0.0);
    }

    #[test]
    fn test_bending_rate_matches_finite_difference() {
        let coeffs = BendingCoeffs::default();
        for e in [2.0, 5.0, 15.0, 40.0, 70.0] {
            let step = 1e-5;
            let (de_hi, _) = coeffs.evaluate(e + step);
            let (de_lo, _) = coeffs.evaluate(e - step);
            let (_, der) = coeffs.evaluate(e);
            let fd = (de_hi - de_lo) / (2.0 * step);
            assert!((der - fd).abs() < 1e-6 * fd.abs().max(1.0), "e = {}: {} vs {}", e, der, fd);
        }
    }

    #[test]
    fn test_polynomial_state_broadcasts() {
        let e = Array1::linspace(5.0, 60.0, 12);
        let state = polynomial_state(&e, &array![20.0], 25.0, &PolynomialOptions::default()).unwrap();
        assert_eq!(state.n.len(), 12);
        assert!(state.n.iter().all(|&n| n == state.n[0]));
        assert!(state.n[0] > 3.0e-4 && state.n[0] < 3.15e-4);
        assert!(state.der.is_some());
    }

    #[test]
    fn test_polynomial_adapter_analytic_der_close_to_numeric() {
        let e = Array1::linspace(5.0, 60.0, 221);
        let h = array![10.0];
        let options = PolynomialOptions::default();
        let state = polynomial_state(&e, &h, 10.0, &options).unwrap();
        let der = state.der.clone().unwrap();
        let numeric = gradient_all(&state.de, None) / gradient_all(&e, None);
        for i in 1..220 {
            assert!((der[i] - numeric[i]).abs() < 2e-3 * der[i].abs(), "i = {}", i);
        }

        let sol = polynomial_adapter(&e, &h, 10.0, &options, &InterfOptions::default()).unwrap();
        assert_eq!(sol.der, der);
        assert!(sol.delays.da.iter().all(|&d| d > 0.0));
        assert!(sol.heights.ht.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_options_from_partial_json() {
        let opts: PolynomialOptions = serde_json::from_str(
            r#"{"refractivity": {"kind": "polynomial", "coeffs": [3.0e-4, -3.0e-8]}}"#,
        )
        .unwrap();
        assert_eq!(opts.refractivity, RefractivityModel::Polynomial(vec![3.0e-4, -3.0e-8]));
        assert_eq!(opts.bending, BendingCoeffs::default());
    }
}
