//! Interferometric Atmospheric Delay Library
//!
//! Closed-form atmospheric propagation delays and the matching altimetry
//! corrections for ground/airborne GNSS-reflectometry (GNSS-R) altimetry.
//!
//! The generic engine ([`engine`]) turns satellite elevation `e`, reflector
//! height `H` and an atmospheric state `(N, de, der)` into the six outputs
//!
//! ```text
//! da = 2·H·N / sin(e+de)            along-path delay
//! dg = 2·H·(sin(e+de) − sin(e))     geometric delay
//! dt = da + dg                      total delay
//! Ha, Hg, Ht = Ha + Hg              height corrections
//! ```
//!
//! The atmospheric state comes from one of the adapters in [`adapters`]:
//! a polynomial model, in-situ meteorology, a gridded climatology queried
//! through [`climatology::MeteoLookup`], or an external ray tracer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod adapters;
pub mod bending;
pub mod broadcast;
pub mod climatology;
pub mod constants;
pub mod engine;
pub mod gradient;
pub mod meteo;
pub mod options;
mod trig;

pub use bending::{get_bending_bennet, BendingForm, BendingOptions, BendingSolution};
pub use engine::{compute_delay, compute_delay_and_height, AtmInput, Delays, Heights, InterfSolution};
pub use gradient::{gradient_all, gradient_all_noend};
pub use meteo::{calculate_refractivity, logavg, Refractivity, RefractivityCoeffs};
pub use options::InterfOptions;

#[derive(Error, Debug)]
pub enum AtmError {
    #[error("Input `{name}` has length {len}, expected 1 or {expected}")]
    ShapeMismatch {
        name: &'static str,
        len: usize,
        expected: usize,
    },
    #[error("Input `{0}` is empty")]
    EmptyInput(&'static str),
    #[error("Unknown model selector: {0:?}")]
    UnknownModel(String),
    #[error("Missing external data file {file}; download it from {origin}")]
    MissingExternalData { file: String, origin: String },
    #[error("Invalid coefficients: {0}")]
    InvalidCoefficients(String),
}

pub type Result<T> = std::result::Result<T, AtmError>;

/// Atmospheric state handed from an adapter to the engine.
///
/// `n` is refractivity (n − 1), `de` elevation bending in degrees and
/// `der` the bending rate d(de)/de. `der` is `None` when the producer has
/// no analytic rate; the engine then differentiates `de` numerically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtmosphericState {
    pub n: ndarray::Array1<f64>,
    pub de: ndarray::Array1<f64>,
    pub der: Option<ndarray::Array1<f64>>,
}

/// Geodetic position of an antenna or reflecting surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeodeticPosition {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Height above the ellipsoid in meters
    pub height_m: f64,
}

impl GeodeticPosition {
    pub fn new(latitude: f64, longitude: f64, height_m: f64) -> Self {
        Self {
            latitude,
            longitude,
            height_m,
        }
    }

    /// Same horizontal position, shifted vertically by `dh` meters.
    pub fn shifted(&self, dh: f64) -> Self {
        Self {
            height_m: self.height_m + dh,
            ..*self
        }
    }
}
