//! Meteorological primitives
//!
//! Refractivity from pressure, temperature and specific humidity, mixed-gas
//! density, lapse-rate reduction of pressure/temperature, and the
//! logarithmic mean used to average exponentially decaying quantities.
//!
//! Units: pressure in Pa, temperature in K, specific humidity in kg/kg.
//! Refractivity is returned as N = n − 1 (not in N-units of 1e-6).

use crate::constants::{
    EPSILON_MW, G_ACCEL_MPS2, PA_PER_MBAR, R_DRY, R_VAPOR, STANDARD_LAPSE_RATE_K_PER_M,
};
use crate::{AtmError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Relative tolerance for the dry/wet vs hydrostatic/non-hydrostatic cross-check
const DECOMPOSITION_RTOL: f64 = 1e-12;

/// Published refractivity coefficient sets (k1, k2, k3 in K/hPa, K/hPa, K²/hPa)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefractivityCoeffs {
    #[default]
    Thayer1974,
    SmithWeintraub1953,
    Bevis1994,
    Rueger2002,
}

impl RefractivityCoeffs {
    pub fn k(&self) -> (f64, f64, f64) {
        match self {
            Self::Thayer1974 => (77.604, 64.79, 3.776e5),
            Self::SmithWeintraub1953 => (77.6, 72.0, 3.75e5),
            Self::Bevis1994 => (77.60, 70.4, 3.739e5),
            Self::Rueger2002 => (77.689, 71.2952, 3.75463e5),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Thayer1974 => "thayer1974",
            Self::SmithWeintraub1953 => "smith_weintraub1953",
            Self::Bevis1994 => "bevis1994",
            Self::Rueger2002 => "rueger2002",
        }
    }
}

impl fmt::Display for RefractivityCoeffs {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RefractivityCoeffs {
    type Err = AtmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "thayer" | "thayer1974" => Ok(Self::Thayer1974),
            "smith_weintraub" | "smith_weintraub1953" => Ok(Self::SmithWeintraub1953),
            "bevis" | "bevis1994" => Ok(Self::Bevis1994),
            "rueger" | "rueger2002" => Ok(Self::Rueger2002),
            _ => Err(AtmError::UnknownModel(s.to_string())),
        }
    }
}

/// Refractivity together with both of its decompositions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Refractivity {
    pub total: f64,
    pub dry: f64,
    pub wet: f64,
    pub hydrostatic: f64,
    pub non_hydrostatic: f64,
}

impl Refractivity {
    /// Whether dry + wet equals hydrostatic + non-hydrostatic to numeric precision.
    pub fn is_consistent(&self) -> bool {
        let a = self.dry + self.wet;
        let b = self.hydrostatic + self.non_hydrostatic;
        (a - b).abs() <= DECOMPOSITION_RTOL * a.abs().max(b.abs()).max(f64::MIN_POSITIVE)
    }
}

/// Water vapor partial pressure (Pa) from total pressure (Pa) and specific humidity (kg/kg).
pub fn vapor_pressure_from_specific_humidity(pressure_pa: f64, specific_humidity: f64) -> f64 {
    specific_humidity * pressure_pa / (EPSILON_MW + (1.0 - EPSILON_MW) * specific_humidity)
}

/// Density (kg/m³) of a dry-air + water-vapor mixture.
///
/// Returns `(total, dry, vapor)` partial densities.
pub fn mixed_gas_density(pressure_pa: f64, temperature_k: f64, vapor_pressure_pa: f64) -> (f64, f64, f64) {
    let rho_dry = (pressure_pa - vapor_pressure_pa) / (R_DRY * temperature_k);
    let rho_vapor = vapor_pressure_pa / (R_VAPOR * temperature_k);
    (rho_dry + rho_vapor, rho_dry, rho_vapor)
}

/// Refractivity N = n − 1 of moist air.
///
/// Dry/wet split uses the partial pressures; the hydrostatic term is taken
/// from the total mixed-gas density and the non-hydrostatic term uses
/// k2' = k2 − k1·Rd/Rv. Both splits describe the same total.
pub fn calculate_refractivity(
    pressure_pa: f64,
    temperature_k: f64,
    specific_humidity: f64,
    coeffs: RefractivityCoeffs,
) -> Refractivity {
    let (k1, k2, k3) = coeffs.k();
    let e_pa = vapor_pressure_from_specific_humidity(pressure_pa, specific_humidity);

    let p_dry_hpa = (pressure_pa - e_pa) / PA_PER_MBAR;
    let e_hpa = e_pa / PA_PER_MBAR;
    let t = temperature_k;

    let dry = 1e-6 * k1 * p_dry_hpa / t;
    let wet = 1e-6 * (k2 * e_hpa / t + k3 * e_hpa / (t * t));

    // k1·Rd·ρ, with ρ in kg/m³ and Rd·ρ·T in Pa
    let (rho, _, _) = mixed_gas_density(pressure_pa, t, e_pa);
    let hydrostatic = 1e-6 * k1 * R_DRY * rho / PA_PER_MBAR;
    let k2_prime = k2 - k1 * R_DRY / R_VAPOR;
    let non_hydrostatic = 1e-6 * (k2_prime * e_hpa / t + k3 * e_hpa / (t * t));

    let refractivity = Refractivity {
        total: dry + wet,
        dry,
        wet,
        hydrostatic,
        non_hydrostatic,
    };
    debug_assert!(
        !refractivity.total.is_finite() || refractivity.is_consistent(),
        "refractivity decompositions disagree: {:?}",
        refractivity
    );
    refractivity
}

/// Reduce pressure and temperature over a height difference along a constant lapse rate.
///
/// `dh` is the target height minus the reference height (m); `lapse_rate`
/// is the temperature decrease per meter of ascent (K/m). Returns `(P, T)`.
pub fn reduce_pressure(pressure_pa: f64, temperature_k: f64, dh: f64, lapse_rate: f64) -> (f64, f64) {
    let temperature = temperature_k - lapse_rate * dh;
    let pressure = if lapse_rate.abs() < 1e-10 {
        // Isothermal layer
        pressure_pa * (-G_ACCEL_MPS2 * dh / (R_DRY * temperature_k)).exp()
    } else {
        pressure_pa * (temperature / temperature_k).powf(G_ACCEL_MPS2 / (R_DRY * lapse_rate))
    };
    (pressure, temperature)
}

/// [`reduce_pressure`] with the standard tropospheric lapse rate.
pub fn reduce_pressure_standard(pressure_pa: f64, temperature_k: f64, dh: f64) -> (f64, f64) {
    reduce_pressure(pressure_pa, temperature_k, dh, STANDARD_LAPSE_RATE_K_PER_M)
}

/// Logarithmic mean exp((ln a + ln b)/2) of two positive values.
///
/// This is the layer average of a quantity decaying exponentially with
/// height, evaluated at the layer's center of mass rather than its midpoint.
#[inline]
pub fn logavg(a: f64, b: f64) -> f64 {
    ((a.ln() + b.ln()) / 2.0).exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{STANDARD_PRESSURE_PA, STANDARD_TEMPERATURE_K};

    #[test]
    fn test_dry_sea_level_refractivity() {
        let n = calculate_refractivity(STANDARD_PRESSURE_PA, STANDARD_TEMPERATURE_K, 0.0, RefractivityCoeffs::Thayer1974);
        // ~273 N-units for dry standard air
        assert!((n.total * 1e6 - 272.9).abs() < 0.5, "N = {}", n.total * 1e6);
        assert_eq!(n.wet, 0.0);
        assert!(n.is_consistent());
    }

    #[test]
    fn test_humidity_increases_refractivity() {
        let dry = calculate_refractivity(101_325.0, 293.15, 0.0, RefractivityCoeffs::default());
        let humid = calculate_refractivity(101_325.0, 293.15, 0.012, RefractivityCoeffs::default());
        assert!(humid.total > dry.total);
        assert!(humid.wet > 0.0);
        assert!(humid.is_consistent(), "{:?}", humid);
    }

    #[test]
    fn test_all_coefficient_sets_consistent() {
        for coeffs in [
            RefractivityCoeffs::Thayer1974,
            RefractivityCoeffs::SmithWeintraub1953,
            RefractivityCoeffs::Bevis1994,
            RefractivityCoeffs::Rueger2002,
        ] {
            let n = calculate_refractivity(85_000.0, 270.0, 0.004, coeffs);
            assert!(n.is_consistent(), "{}: {:?}", coeffs, n);
            assert_eq!(coeffs.name().parse::<RefractivityCoeffs>().unwrap(), coeffs);
        }
    }

    #[test]
    fn test_unknown_coefficient_set() {
        let err = "essen".parse::<RefractivityCoeffs>().unwrap_err();
        assert!(err.to_string().contains("essen"));
    }

    #[test]
    fn test_vapor_pressure_from_specific_humidity() {
        assert_eq!(vapor_pressure_from_specific_humidity(100_000.0, 0.0), 0.0);
        // q = 0.01 kg/kg at 1000 hPa → e ≈ 16 hPa
        let e = vapor_pressure_from_specific_humidity(100_000.0, 0.01);
        assert!((e - 1600.0).abs() < 20.0, "e = {}", e);
    }

    #[test]
    fn test_mixed_gas_density() {
        let (rho, rho_d, rho_v) = mixed_gas_density(101_325.0, 288.15, 0.0);
        assert!((rho - 1.225).abs() < 0.001);
        assert_eq!(rho, rho_d);
        assert_eq!(rho_v, 0.0);

        let (rho_moist, _, _) = mixed_gas_density(101_325.0, 288.15, 1500.0);
        assert!(rho_moist < rho, "Moist air is lighter than dry air");
    }

    #[test]
    fn test_reduce_pressure() {
        let (p, t) = reduce_pressure_standard(101_325.0, 288.15, 1000.0);
        assert!((t - 281.65).abs() < 1e-9);
        assert!((p - 89_875.0).abs() < 50.0, "p = {}", p);

        // Descending recovers the starting point
        let (p0, t0) = reduce_pressure_standard(p, t, -1000.0);
        assert!((p0 - 101_325.0).abs() < 1e-4);
        assert!((t0 - 288.15).abs() < 1e-9);

        let (p_iso, t_iso) = reduce_pressure(101_325.0, 288.15, 1000.0, 0.0);
        assert_eq!(t_iso, 288.15);
        assert!(p_iso < 101_325.0);
    }

    #[test]
    fn test_logavg() {
        assert!((logavg(2.0, 8.0) - 4.0).abs() < 1e-12);
        assert!((logavg(3.0, 3.0) - 3.0).abs() < 1e-15);
        let m = logavg(1e-4, 3e-4);
        assert!(m > 1e-4 && m < 2e-4);
    }
}
