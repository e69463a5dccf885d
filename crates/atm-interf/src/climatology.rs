//! Climatology lookup contract
//!
//! Gridded empirical climatologies (GPT, GPT2, GPT2w) answer a
//! `(position, date, version)` query with pressure, temperature and specific
//! humidity. The grid interpolation itself lives outside this crate; here we
//! define the [`MeteoLookup`] contract, locate the grid files a backend
//! needs, and provide [`StandardAtmosphere`] as a self-contained lookup.

use crate::constants::{STANDARD_LAPSE_RATE_K_PER_M, STANDARD_PRESSURE_PA, STANDARD_TEMPERATURE_K};
use crate::meteo::reduce_pressure;
use crate::{AtmError, GeodeticPosition, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use tracing::debug;

/// Where the GPT grid files are published
pub const GRID_ORIGIN: &str = "https://vmf.geo.tuwien.ac.at/codes/";

/// MJD of the Unix epoch (1970-01-01T00:00Z)
const MJD_UNIX_EPOCH: f64 = 40_587.0;

/// MJD of 1980-01-01
const MJD_1980: f64 = 44_239.0;

const DAYS_PER_YEAR: f64 = 365.25;

/// Tropopause height of the ICAO standard atmosphere (m)
const TROPOPAUSE_M: f64 = 11_000.0;

/// Named empirical climatology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClimatologyVersion {
    Gpt1,
    #[default]
    Gpt2,
    Gpt2w,
}

impl ClimatologyVersion {
    /// Grid file the backend reads, `None` when the model is coefficient-only.
    pub fn grid_file(&self) -> Option<&'static str> {
        match self {
            Self::Gpt1 => None,
            Self::Gpt2 => Some("gpt2_5.grd"),
            Self::Gpt2w => Some("gpt2_1wA.grd"),
        }
    }
}

impl fmt::Display for ClimatologyVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Gpt1 => "1",
            Self::Gpt2 => "2",
            Self::Gpt2w => "2w",
        })
    }
}

impl FromStr for ClimatologyVersion {
    type Err = AtmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "gpt1" => Ok(Self::Gpt1),
            "2" | "gpt2" => Ok(Self::Gpt2),
            "2w" | "gpt2w" => Ok(Self::Gpt2w),
            _ => Err(AtmError::UnknownModel(s.to_string())),
        }
    }
}

/// Meteorological conditions at one position and epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeteoSample {
    pub pressure_pa: f64,
    pub temperature_k: f64,
    /// kg/kg
    pub specific_humidity: f64,
}

/// Source of pressure, temperature and humidity for a position and date.
pub trait MeteoLookup: Send + Sync {
    fn lookup(
        &self,
        position: &GeodeticPosition,
        epoch: DateTime<Utc>,
        version: ClimatologyVersion,
    ) -> Result<MeteoSample>;
}

/// Modified Julian date of `epoch`, with fractional day.
pub fn modified_julian_date(epoch: DateTime<Utc>) -> f64 {
    epoch.timestamp_millis() as f64 / 86_400_000.0 + MJD_UNIX_EPOCH
}

/// Day count in the climatologies' convention: zero on 1980-01-28, so the
/// annual phase is zero every January 28.
pub fn climatology_day_of_year(epoch: DateTime<Utc>) -> f64 {
    modified_julian_date(epoch) - MJD_1980 + 1.0 - 28.0
}

/// Locates climatology grid files in a directory.
///
/// For [`MeteoLookup`] backends that read the grids, and for callers that
/// want a missing file reported before any computation starts.
/// Successful lookups are cached per version. A missing file is re-checked
/// on every call so a file fetched later is picked up.
#[derive(Debug)]
pub struct GridFiles {
    directory: PathBuf,
    found: Mutex<HashMap<ClimatologyVersion, PathBuf>>,
}

impl GridFiles {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            found: Mutex::new(HashMap::new()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the grid file `version` needs.
    ///
    /// Returns `Ok(None)` for versions without a grid file and
    /// [`AtmError::MissingExternalData`] when the file is absent.
    pub fn locate(&self, version: ClimatologyVersion) -> Result<Option<PathBuf>> {
        let Some(file) = version.grid_file() else {
            return Ok(None);
        };

        let mut found = self.found.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(path) = found.get(&version) {
            return Ok(Some(path.clone()));
        }

        let path = self.directory.join(file);
        if !path.is_file() {
            return Err(AtmError::MissingExternalData {
                file: path.display().to_string(),
                origin: GRID_ORIGIN.to_string(),
            });
        }

        debug!("Found GPT{} grid at {}", version, path.display());
        found.insert(version, path.clone());
        Ok(Some(path))
    }
}

/// ICAO standard troposphere with an optional annual temperature cycle.
///
/// Temperature falls at `lapse_rate` up to 11 km and is constant above.
/// Humidity decays exponentially with `humidity_scale_height_m`. The annual
/// term is coldest at the start of the climatology year in the northern
/// hemisphere and mirrored in the southern one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardAtmosphere {
    pub sea_level_pressure_pa: f64,
    pub sea_level_temperature_k: f64,
    pub lapse_rate: f64,
    pub sea_level_specific_humidity: f64,
    pub humidity_scale_height_m: f64,
    /// Half peak-to-peak of the annual temperature cycle (K)
    pub annual_amplitude_k: f64,
}

impl StandardAtmosphere {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_annual_amplitude(mut self, amplitude_k: f64) -> Self {
        self.annual_amplitude_k = amplitude_k;
        self
    }

    /// Conditions at `position` on `epoch`.
    pub fn sample(&self, position: &GeodeticPosition, epoch: DateTime<Utc>) -> MeteoSample {
        let hemisphere = if position.latitude >= 0.0 { 1.0 } else { -1.0 };
        let doy = climatology_day_of_year(epoch);
        let t0 = self.sea_level_temperature_k
            - hemisphere * self.annual_amplitude_k * (2.0 * PI * doy / DAYS_PER_YEAR).cos();

        let h = position.height_m;
        let (pressure_pa, temperature_k) = if h <= TROPOPAUSE_M {
            reduce_pressure(self.sea_level_pressure_pa, t0, h, self.lapse_rate)
        } else {
            let (p_trop, t_trop) =
                reduce_pressure(self.sea_level_pressure_pa, t0, TROPOPAUSE_M, self.lapse_rate);
            reduce_pressure(p_trop, t_trop, h - TROPOPAUSE_M, 0.0)
        };

        MeteoSample {
            pressure_pa,
            temperature_k,
            specific_humidity: self.sea_level_specific_humidity
                * (-h.max(0.0) / self.humidity_scale_height_m).exp(),
        }
    }
}

impl Default for StandardAtmosphere {
    fn default() -> Self {
        Self {
            sea_level_pressure_pa: STANDARD_PRESSURE_PA,
            sea_level_temperature_k: STANDARD_TEMPERATURE_K,
            lapse_rate: STANDARD_LAPSE_RATE_K_PER_M,
            sea_level_specific_humidity: 0.006,
            humidity_scale_height_m: 2_000.0,
            annual_amplitude_k: 0.0,
        }
    }
}

impl MeteoLookup for StandardAtmosphere {
    fn lookup(
        &self,
        position: &GeodeticPosition,
        epoch: DateTime<Utc>,
        version: ClimatologyVersion,
    ) -> Result<MeteoSample> {
        debug!(
            "Standard atmosphere stands in for GPT{} at ({:.3}, {:.3}, {:.1} m)",
            version, position.latitude, position.longitude, position.height_m
        );
        Ok(self.sample(position, epoch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn epoch(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_versions() {
        assert_eq!("1".parse::<ClimatologyVersion>().unwrap(), ClimatologyVersion::Gpt1);
        assert_eq!("2".parse::<ClimatologyVersion>().unwrap(), ClimatologyVersion::Gpt2);
        assert_eq!("2w".parse::<ClimatologyVersion>().unwrap(), ClimatologyVersion::Gpt2w);
        assert_eq!("GPT2W".parse::<ClimatologyVersion>().unwrap(), ClimatologyVersion::Gpt2w);
        for v in [ClimatologyVersion::Gpt1, ClimatologyVersion::Gpt2, ClimatologyVersion::Gpt2w] {
            assert_eq!(v.to_string().parse::<ClimatologyVersion>().unwrap(), v);
        }
    }

    #[test]
    fn test_unknown_version_names_value() {
        let err = "3".parse::<ClimatologyVersion>().unwrap_err();
        assert!(matches!(err, AtmError::UnknownModel(ref s) if s == "3"));
        assert!(err.to_string().contains("\"3\""));
    }

    #[test]
    fn test_modified_julian_date() {
        let j2000 = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert!((modified_julian_date(j2000) - 51_544.5).abs() < 1e-9);
        assert!((modified_julian_date(epoch(1970, 1, 1)) - 40_587.0).abs() < 1e-12);
    }

    #[test]
    fn test_climatology_day_of_year_reference() {
        assert!(climatology_day_of_year(epoch(1980, 1, 28)).abs() < 1e-9);
        assert!((climatology_day_of_year(epoch(1980, 2, 28)) - 31.0).abs() < 1e-9);
    }

    #[test]
    fn test_grid_files_missing() {
        let dir = tempfile::tempdir().unwrap();
        let grids = GridFiles::new(dir.path());

        let err = grids.locate(ClimatologyVersion::Gpt2w).unwrap_err();
        match err {
            AtmError::MissingExternalData { file, origin } => {
                assert!(file.ends_with("gpt2_1wA.grd"));
                assert_eq!(origin, GRID_ORIGIN);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_grid_files_found_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpt2_5.grd");
        std::fs::write(&path, "% grid\n").unwrap();

        let grids = GridFiles::new(dir.path());
        assert_eq!(grids.locate(ClimatologyVersion::Gpt2).unwrap(), Some(path.clone()));

        // Cached even once the file is gone
        std::fs::remove_file(&path).unwrap();
        assert_eq!(grids.locate(ClimatologyVersion::Gpt2).unwrap(), Some(path));
    }

    #[test]
    fn test_grid_files_picks_up_late_download() {
        let dir = tempfile::tempdir().unwrap();
        let grids = GridFiles::new(dir.path());
        assert!(grids.locate(ClimatologyVersion::Gpt2).is_err());

        std::fs::write(dir.path().join("gpt2_5.grd"), "").unwrap();
        assert!(grids.locate(ClimatologyVersion::Gpt2).unwrap().is_some());
    }

    #[test]
    fn test_gpt1_needs_no_grid() {
        let grids = GridFiles::new("/nonexistent");
        assert_eq!(grids.locate(ClimatologyVersion::Gpt1).unwrap(), None);
    }

    #[test]
    fn test_standard_atmosphere_sea_level() {
        let atm = StandardAtmosphere::default();
        let s = atm
            .lookup(&GeodeticPosition::new(45.0, 7.0, 0.0), epoch(2020, 6, 1), ClimatologyVersion::Gpt2)
            .unwrap();
        assert_eq!(s.pressure_pa, STANDARD_PRESSURE_PA);
        assert_eq!(s.temperature_k, STANDARD_TEMPERATURE_K);
        assert_eq!(s.specific_humidity, 0.006);
    }

    #[test]
    fn test_standard_atmosphere_decreases_with_height() {
        let atm = StandardAtmosphere::default();
        let t = epoch(2020, 6, 1);
        let low = atm.sample(&GeodeticPosition::new(0.0, 0.0, 100.0), t);
        let high = atm.sample(&GeodeticPosition::new(0.0, 0.0, 5_000.0), t);
        let strat = atm.sample(&GeodeticPosition::new(0.0, 0.0, 15_000.0), t);

        assert!(high.pressure_pa < low.pressure_pa);
        assert!(high.temperature_k < low.temperature_k);
        assert!(high.specific_humidity < low.specific_humidity);
        // Isothermal above the tropopause
        assert!((strat.temperature_k - (STANDARD_TEMPERATURE_K - 0.0065 * 11_000.0)).abs() < 1e-9);
        assert!(strat.pressure_pa < high.pressure_pa);
    }

    #[test]
    fn test_standard_atmosphere_annual_cycle() {
        let atm = StandardAtmosphere::default().with_annual_amplitude(10.0);
        let north = GeodeticPosition::new(50.0, 10.0, 0.0);
        let south = GeodeticPosition::new(-35.0, 150.0, 0.0);

        let winter = atm.sample(&north, epoch(2021, 1, 28));
        let summer = atm.sample(&north, epoch(2021, 7, 28));
        assert!(winter.temperature_k < summer.temperature_k);

        let south_jan = atm.sample(&south, epoch(2021, 1, 28));
        assert!(south_jan.temperature_k > winter.temperature_k);
    }

    #[test]
    fn test_standard_atmosphere_serde_overlay() {
        let atm: StandardAtmosphere = serde_json::from_str(r#"{"annual_amplitude_k": 4.0}"#).unwrap();
        assert_eq!(atm.annual_amplitude_k, 4.0);
        assert_eq!(atm.sea_level_pressure_pa, STANDARD_PRESSURE_PA);
    }
}
