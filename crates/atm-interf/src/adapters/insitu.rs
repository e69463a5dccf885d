//! In-situ meteorological adapter
//!
//! Refractivity from pressure, temperature and specific humidity measured at
//! the antenna. Conditions are reduced down to the reflecting surface along a
//! lapse rate and the two refractivities are log-averaged; with `thin_layer`
//! the antenna value is used as is. Bending comes from the Bennet model.

use crate::bending::{get_bending_bennet, BendingForm, BendingOptions};
use crate::broadcast::{broadcast, common_len};
use crate::constants::STANDARD_LAPSE_RATE_K_PER_M;
use crate::engine::{compute_delay_and_height, AtmInput, InterfSolution};
use crate::meteo::{calculate_refractivity, logavg, reduce_pressure, RefractivityCoeffs};
use crate::options::InterfOptions;
use crate::{AtmosphericState, Result};
use ndarray::{Array1, Zip};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InSituOptions {
    /// Use antenna conditions for the whole layer
    pub thin_layer: bool,
    pub coefficients: RefractivityCoeffs,
    /// K/m, positive when temperature falls with height
    pub lapse_rate: f64,
    pub bending: BendingOptions,
    /// Feed antenna pressure/temperature to the bending correction
    pub bending_uses_meteo: bool,
}

impl Default for InSituOptions {
    fn default() -> Self {
        Self {
            thin_layer: false,
            coefficients: RefractivityCoeffs::default(),
            lapse_rate: STANDARD_LAPSE_RATE_K_PER_M,
            bending: BendingOptions::default(),
            bending_uses_meteo: true,
        }
    }
}

impl InSituOptions {
    pub fn thin_layer(mut self, on: bool) -> Self {
        self.thin_layer = on;
        self
    }
}

/// Antenna meteorology; each vector is length 1 or the observation count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InSituMeteo {
    pub pressure_pa: Array1<f64>,
    pub temperature_k: Array1<f64>,
    /// kg/kg
    pub specific_humidity: Array1<f64>,
}

impl InSituMeteo {
    pub fn new(pressure_pa: Array1<f64>, temperature_k: Array1<f64>, specific_humidity: Array1<f64>) -> Self {
        Self {
            pressure_pa,
            temperature_k,
            specific_humidity,
        }
    }

    /// Constant conditions for every observation.
    pub fn uniform(pressure_pa: f64, temperature_k: f64, specific_humidity: f64) -> Self {
        Self::new(
            Array1::from_elem(1, pressure_pa),
            Array1::from_elem(1, temperature_k),
            Array1::from_elem(1, specific_humidity),
        )
    }
}

/// Atmospheric state from antenna meteorology.
///
/// `der` is `None` for the bowditch bending form, which has no analytic
/// rate, so the engine differentiates `de` instead.
pub fn insitu_state(
    e: &Array1<f64>,
    h: &Array1<f64>,
    meteo: &InSituMeteo,
    options: &InSituOptions,
) -> Result<AtmosphericState> {
    let len = common_len(&[
        ("e", e.len()),
        ("H", h.len()),
        ("P", meteo.pressure_pa.len()),
        ("T", meteo.temperature_k.len()),
        ("q", meteo.specific_humidity.len()),
    ])?;
    let e = broadcast("e", e, len)?;
    let h = broadcast("H", h, len)?;
    let p = broadcast("P", &meteo.pressure_pa, len)?;
    let t = broadcast("T", &meteo.temperature_k, len)?;
    let q = broadcast("q", &meteo.specific_humidity, len)?;

    let mut n = Array1::<f64>::zeros(len);
    Zip::from(&mut n)
        .and(&h)
        .and(&p)
        .and(&t)
        .and(&q)
        .for_each(|n, &h, &p, &t, &q| {
            let n_antenna = calculate_refractivity(p, t, q, options.coefficients).total;
            *n = if options.thin_layer {
                n_antenna
            } else {
                // Humidity is carried down unchanged
                let (p_sfc, t_sfc) = reduce_pressure(p, t, -h, options.lapse_rate);
                logavg(n_antenna, calculate_refractivity(p_sfc, t_sfc, q, options.coefficients).total)
            };
        });

    let (de, der) = if options.bending_uses_meteo {
        get_bending_bennet(&e, Some(&p), Some(&t), &options.bending)?
    } else {
        get_bending_bennet(&e, None, None, &options.bending)?
    };
    // The bowditch correction has no analytic rate
    let der = match options.bending.form {
        BendingForm::Bowditch if options.bending_uses_meteo => None,
        _ => Some(der),
    };

    debug!(
        "In-situ state for {} samples ({}, thin layer: {})",
        len, options.coefficients, options.thin_layer
    );
    Ok(AtmosphericState { n, de, der })
}

/// Delays and heights from antenna meteorology.
pub fn insitu_adapter(
    e: &Array1<f64>,
    h: &Array1<f64>,
    meteo: &InSituMeteo,
    options: &InSituOptions,
    interf: &InterfOptions,
) -> Result<InterfSolution> {
    let state = insitu_state(e, h, meteo, options)?;
    compute_delay_and_height(&AtmInput::from_state(e.clone(), h.clone(), state), interf)
}
