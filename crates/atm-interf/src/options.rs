//! Engine options
//!
//! Every field has an explicit default and `#[serde(default)]`, so a partial
//! record (for example `{"h_approximate": true}`) overlays the defaults.

use serde::{Deserialize, Serialize};

/// Options selecting the height-correction path of the generic engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfOptions {
    /// Use the small-bending linearized height formula
    pub h_approximate: bool,
    /// Invert each delay numerically over elevation instead of the analytic heights
    pub h_hybrid: bool,
    /// Differentiate `de` numerically even if an analytic `der` was supplied
    pub der_numerical: bool,
    /// Mark first/last sample NaN in every numerically differentiated series
    pub numerical_noend: bool,
}

impl Default for InterfOptions {
    fn default() -> Self {
        Self {
            h_approximate: false,
            h_hybrid: false,
            der_numerical: false,
            numerical_noend: true,
        }
    }
}

impl InterfOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn approximate(mut self, on: bool) -> Self {
        self.h_approximate = on;
        self
    }

    pub fn hybrid(mut self, on: bool) -> Self {
        self.h_hybrid = on;
        self
    }

    pub fn der_numerical(mut self, on: bool) -> Self {
        self.der_numerical = on;
        self
    }

    pub fn noend(mut self, on: bool) -> Self {
        self.numerical_noend = on;
        self
    }
}
