//! Physical and meteorological constants

/// Standard gravitational acceleration in m/s²
pub const G_ACCEL_MPS2: f64 = 9.80665;

/// Universal gas constant in J/(mol·K)
pub const R_UNIVERSAL: f64 = 8.314462618;

/// Molar mass of dry air in kg/mol
pub const M_DRY: f64 = 28.9644e-3;

/// Molar mass of water vapor in kg/mol
pub const M_VAPOR: f64 = 18.01528e-3;

/// Specific gas constant for dry air in J/(kg·K)
pub const R_DRY: f64 = R_UNIVERSAL / M_DRY;

/// Specific gas constant for water vapor in J/(kg·K)
pub const R_VAPOR: f64 = R_UNIVERSAL / M_VAPOR;

/// Ratio R_dry / R_vapor (≈ 0.622)
pub const EPSILON_MW: f64 = M_VAPOR / M_DRY;

/// Zero Celsius in Kelvin
pub const CELSIUS_ZERO_K: f64 = 273.15;

/// Standard atmosphere sea-level pressure in Pa
pub const STANDARD_PRESSURE_PA: f64 = 101_325.0;

/// Standard atmosphere sea-level temperature in K
pub const STANDARD_TEMPERATURE_K: f64 = 288.15;

/// Standard tropospheric temperature lapse rate in K/m (temperature decreases upward)
pub const STANDARD_LAPSE_RATE_K_PER_M: f64 = 0.0065;

/// Pascals per millibar (hPa)
pub const PA_PER_MBAR: f64 = 100.0;

/// Pascals per inch of mercury
pub const PA_PER_INHG: f64 = 3386.389;
