//! Atmospheric adapters
//!
//! Each adapter produces an [`AtmosphericState`](crate::AtmosphericState)
//! `(N, de, der)` and hands it to the engine. They differ only in where
//! refractivity and bending come from.

pub mod gpt;
pub mod insitu;
pub mod polynomial;
pub mod raytrace;

pub use gpt::{gpt_adapter, gpt_meteo, GptQuery};
pub use insitu::{insitu_adapter, insitu_state, InSituMeteo, InSituOptions};
pub use polynomial::{polynomial_adapter, polynomial_state, BendingCoeffs, PolynomialOptions, RefractivityModel};
pub use raytrace::{ray_trace_adapter, RayTracer};
