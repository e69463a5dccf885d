//! Elevation bending from Bennet's refraction formula
//!
//! Bennet's empirical formula gives refraction (arc-minutes) as a function of
//! the *apparent* elevation:
//!
//! ```text
//! R = cot(h + 7.31/(h + 4.4))
//! ```
//!
//! Our input is the unrefracted (geometric) elevation `e`, so the bending
//! `de` solves the fixed point `de = R(e + de)/60`. The first step from
//! `de = 0` is plain substitution; later steps are Newton steps using the
//! analytic derivative of `de` with respect to its argument elevation
//! (secant steps for the bowditch form, which has none).
//!
//! With in-situ pressure/temperature the standard refraction is scaled by
//! one of two published corrections:
//! - `bennet`: `(P − 80)/930 / (1 + 8e-5·(R + 39)·(T − 10))`, P in mbar, T in °C
//! - `bowditch`: `(P/29.83)·(510/(460 + T))`, P in inHg, T in °F (no analytic rate)

use crate::broadcast::{broadcast, common_len};
use crate::constants::{CELSIUS_ZERO_K, PA_PER_INHG, PA_PER_MBAR};
use crate::trig::{cotd, csc2d};
use crate::{AtmError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Bennet reference pressure (Pa) at which the pressure factor is unity
const REFERENCE_PRESSURE_PA: f64 = 101_000.0;

/// Bennet reference temperature (K) at which the temperature factor is unity
const REFERENCE_TEMPERATURE_K: f64 = 283.15;

/// Default cap on fixed-point iterations
pub const DEFAULT_MAX_ITERATIONS: usize = 50;

/// Step size (in units of `spacing(de)`) accepted as converged
const CONVERGED_ULPS: f64 = 4.0;

/// Largest step (in units of `spacing(de)`) treated as rounding noise once
/// steps stop shrinking
const NOISE_ULPS: f64 = 64.0;

/// Pressure/temperature correction form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BendingForm {
    /// Bennet (1982), newer form with analytic derivative
    #[default]
    Bennet,
    /// Bowditch / nautical almanac form, no analytic derivative
    Bowditch,
}

impl fmt::Display for BendingForm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Bennet => f.write_str("bennet"),
            Self::Bowditch => f.write_str("bowditch"),
        }
    }
}

impl FromStr for BendingForm {
    type Err = AtmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bennet" | "new" => Ok(Self::Bennet),
            "bowditch" | "old" => Ok(Self::Bowditch),
            _ => Err(AtmError::UnknownModel(s.to_string())),
        }
    }
}

/// Bending model configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BendingOptions {
    pub form: BendingForm,
    /// Convergence tolerance in degrees. `None` uses the floating-point
    /// spacing at the scale of `e`; `f64::INFINITY` forces a single evaluation.
    pub tolerance: Option<f64>,
    pub max_iterations: usize,
}

impl Default for BendingOptions {
    fn default() -> Self {
        Self {
            form: BendingForm::Bennet,
            tolerance: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Result of the fixed-point iteration for one elevation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BendingSolution {
    /// Bending in degrees
    pub de: f64,
    /// d(de)/d(argument elevation), NaN for the bowditch form
    pub der: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Distance from `|x|` to the next larger representable f64.
pub fn spacing(x: f64) -> f64 {
    let ax = x.abs();
    if !ax.is_finite() {
        return f64::NAN;
    }
    f64::from_bits(ax.to_bits() + 1) - ax
}

/// Standard-atmosphere refraction (arc-minutes) and its derivative
/// (arc-minutes per degree) at apparent elevation `h` (degrees).
fn standard_refraction(h: f64) -> (f64, f64) {
    let shift = 7.31 / (h + 4.4);
    let raw = h + shift;
    // Clamp near zenith so the refraction never turns negative
    let (arg, darg) = if raw > 90.0 {
        (90.0, 0.0)
    } else {
        (raw, 1.0 - shift / (h + 4.4))
    };
    let rm = cotd(arg);
    let drm = -csc2d(arg) * (PI / 180.0) * darg;
    (rm, drm)
}

/// One evaluation of the bending formula at argument elevation `h` (degrees).
///
/// `meteo` is `(pressure_pa, temperature_k)`; `None` means standard conditions.
/// Returns `(de, der)` in degrees and degrees per degree.
pub fn evaluate_bending(h: f64, meteo: Option<(f64, f64)>, form: BendingForm) -> (f64, f64) {
    let (rm, drm) = standard_refraction(h);
    let Some((pressure_pa, temperature_k)) = meteo else {
        return (rm / 60.0, drm / 60.0);
    };

    match form {
        BendingForm::Bennet => {
            let p_mbar = pressure_pa / PA_PER_MBAR;
            let t_c = temperature_k - CELSIUS_ZERO_K;
            let a = (p_mbar - 80.0) / 930.0;
            let denom = 1.0 + 8e-5 * (rm + 39.0) * (t_c - 10.0);
            let k = a / denom;
            let dk = -a * 8e-5 * (t_c - 10.0) * drm / (denom * denom);
            let r = k * rm;
            let dr = k * drm + rm * dk;
            (r / 60.0, dr / 60.0)
        }
        BendingForm::Bowditch => {
            let p_inhg = pressure_pa / PA_PER_INHG;
            let t_f = (temperature_k - CELSIUS_ZERO_K) * 9.0 / 5.0 + 32.0;
            let r = rm * (p_inhg / 29.83) * (510.0 / (460.0 + t_f));
            (r / 60.0, f64::NAN)
        }
    }
}

/// Solve the bending fixed point for one unrefracted elevation `e` (degrees).
///
/// Non-convergence within `max_iterations` yields NaN outputs with
/// `converged == false`; it never panics or loops unbounded.
pub fn solve_bending(
    e: f64,
    pressure_pa: Option<f64>,
    temperature_k: Option<f64>,
    options: &BendingOptions,
) -> BendingSolution {
    let meteo = match (pressure_pa, temperature_k) {
        (None, None) => None,
        (p, t) => Some((
            p.unwrap_or(REFERENCE_PRESSURE_PA),
            t.unwrap_or(REFERENCE_TEMPERATURE_K),
        )),
    };
    let tol = options.tolerance.unwrap_or_else(|| spacing(e));

    let mut de = 0.0;
    let mut previous: Option<(f64, f64)> = None;
    let mut last_change = f64::INFINITY;
    for iteration in 1..=options.max_iterations.max(1) {
        let (f, der) = evaluate_bending(e + de, meteo, options.form);
        let residual = f - de;
        let de_new = match previous {
            Some((de_prev, residual_prev)) => {
                next_estimate(de, residual, f, der, de_prev, residual_prev)
            }
            None => f,
        };
        previous = Some((de, residual));
        let change = (de_new - de).abs();
        de = de_new;

        if change <= tol.max(CONVERGED_ULPS * spacing(de)) {
            return BendingSolution {
                de,
                der,
                iterations: iteration,
                converged: true,
            };
        }
        // Steps stopped shrinking at rounding-noise level
        if change >= last_change && change <= NOISE_ULPS * spacing(de) {
            return BendingSolution {
                de,
                der,
                iterations: iteration,
                converged: true,
            };
        }
        if change.is_nan() {
            return BendingSolution {
                de: f64::NAN,
                der: f64::NAN,
                iterations: iteration,
                converged: false,
            };
        }
        last_change = change;
    }

    BendingSolution {
        de: f64::NAN,
        der: f64::NAN,
        iterations: options.max_iterations.max(1),
        converged: false,
    }
}

/// Newton step on `de − f(e + de)` using the analytic rate, or a secant
/// step when the form has none. Falls back to plain substitution `f`.
fn next_estimate(de: f64, residual: f64, f: f64, der: f64, de_prev: f64, residual_prev: f64) -> f64 {
    let slope = if der.is_finite() {
        der - 1.0
    } else {
        (residual - residual_prev) / (de - de_prev)
    };
    let step = -residual / slope;
    if step.is_finite() {
        de + step
    } else {
        f
    }
}

/// Bending `de` (degrees) and bending rate `der` for a vector of unrefracted elevations.
///
/// `pressure_pa` and `temperature_k` are optional in-situ conditions, each
/// broadcastable against `e`. Samples that fail to converge are NaN.
pub fn get_bending_bennet(
    e: &Array1<f64>,
    pressure_pa: Option<&Array1<f64>>,
    temperature_k: Option<&Array1<f64>>,
    options: &BendingOptions,
) -> Result<(Array1<f64>, Array1<f64>)> {
    let mut lens = vec![("e", e.len())];
    if let Some(p) = pressure_pa {
        lens.push(("P", p.len()));
    }
    if let Some(t) = temperature_k {
        lens.push(("T", t.len()));
    }
    let n = common_len(&lens)?;

    let e = broadcast("e", e, n)?;
    let p = pressure_pa.map(|p| broadcast("P", p, n)).transpose()?;
    let t = temperature_k.map(|t| broadcast("T", t, n)).transpose()?;

    let mut de = Array1::zeros(n);
    let mut der = Array1::zeros(n);
    let mut failed = 0usize;
    let mut max_iterations = 0usize;

    for i in 0..n {
        let sol = solve_bending(
            e[i],
            p.as_ref().map(|p| p[i]),
            t.as_ref().map(|t| t[i]),
            options,
        );
        if !sol.converged {
            failed += 1;
        }
        max_iterations = max_iterations.max(sol.iterations);
        de[i] = sol.de;
        der[i] = sol.der;
    }

    if failed > 0 {
        warn!(
            "Bending iteration did not converge for {} of {} elevations; set to NaN",
            failed, n
        );
    }
    debug!(
        "Bending ({}) solved for {} elevations, max {} iterations",
        options.form, n, max_iterations
    );

    Ok((de, der))
}
