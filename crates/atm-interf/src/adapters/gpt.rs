//! Climatology (GPT) adapter
//!
//! Queries a [`MeteoLookup`] at the antenna and at the reflecting surface,
//! averages the two samples and runs the in-situ adapter on the result as a
//! thin layer.

use super::insitu::{insitu_adapter, InSituMeteo, InSituOptions};
use crate::climatology::{ClimatologyVersion, MeteoLookup, MeteoSample};
use crate::engine::InterfSolution;
use crate::meteo::logavg;
use crate::options::InterfOptions;
use crate::{GeodeticPosition, Result};
use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Climatology query for one antenna
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GptQuery {
    pub antenna: GeodeticPosition,
    pub epoch: DateTime<Utc>,
    pub version: ClimatologyVersion,
}

impl GptQuery {
    pub fn new(antenna: GeodeticPosition, epoch: DateTime<Utc>, version: ClimatologyVersion) -> Self {
        Self {
            antenna,
            epoch,
            version,
        }
    }
}

/// Layer-mean meteorology between the antenna and a surface `h` meters below.
///
/// Pressure is log-averaged; temperature and humidity are averaged linearly.
pub fn gpt_meteo<M: MeteoLookup + ?Sized>(lookup: &M, query: &GptQuery, h: f64) -> Result<MeteoSample> {
    let antenna = lookup.lookup(&query.antenna, query.epoch, query.version)?;
    let surface = lookup.lookup(&query.antenna.shifted(-h), query.epoch, query.version)?;

    Ok(MeteoSample {
        pressure_pa: logavg(antenna.pressure_pa, surface.pressure_pa),
        temperature_k: (antenna.temperature_k + surface.temperature_k) / 2.0,
        specific_humidity: (antenna.specific_humidity + surface.specific_humidity) / 2.0,
    })
}

/// Delays and heights from climatology for a single reflector height `h` (m).
///
/// `options.thin_layer` is forced on since the averaging already spans the layer.
pub fn gpt_adapter<M: MeteoLookup + ?Sized>(
    lookup: &M,
    query: &GptQuery,
    e: &Array1<f64>,
    h: f64,
    options: &InSituOptions,
    interf: &InterfOptions,
) -> Result<InterfSolution> {
    let mean = gpt_meteo(lookup, query, h)?;
    debug!(
        "GPT{} layer mean: P = {:.1} Pa, T = {:.2} K, q = {:.5}",
        query.version, mean.pressure_pa, mean.temperature_k, mean.specific_humidity
    );

    let meteo = InSituMeteo::uniform(mean.pressure_pa, mean.temperature_k, mean.specific_humidity);
    let options = options.clone().thin_layer(true);
    insitu_adapter(e, &Array1::from_elem(1, h), &meteo, &options, interf)
}
