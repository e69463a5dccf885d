//! Ray-trace adapter
//!
//! An external ray tracer integrates the refractive path through a full
//! atmospheric profile; this crate only consumes its `(N, de, der)` output.

use crate::engine::{compute_delay_and_height, AtmInput, InterfSolution};
use crate::options::InterfOptions;
use crate::{AtmError, AtmosphericState, Result};
use ndarray::Array1;

/// Numerical ray tracer for a set of elevations `e` (deg) and reflector heights `h` (m).
pub trait RayTracer {
    fn trace(&self, e: &Array1<f64>, h: &Array1<f64>) -> Result<AtmosphericState>;
}

impl<F> RayTracer for F
where
    F: Fn(&Array1<f64>, &Array1<f64>) -> Result<AtmosphericState>,
{
    fn trace(&self, e: &Array1<f64>, h: &Array1<f64>) -> Result<AtmosphericState> {
        self(e, h)
    }
}

/// Delays and heights from a ray-traced atmosphere.
pub fn ray_trace_adapter<R: RayTracer + ?Sized>(
    tracer: &R,
    e: &Array1<f64>,
    h: &Array1<f64>,
    interf: &InterfOptions,
) -> Result<InterfSolution> {
    let state = tracer.trace(e, h)?;
    if state.n.is_empty() {
        return Err(AtmError::EmptyInput("N"));
    }
    compute_delay_and_height(&AtmInput::from_state(e.clone(), h.clone(), state), interf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::polynomial::{polynomial_state, PolynomialOptions};
    use ndarray::array;

    /// Tracer returning a fixed state regardless of geometry
    struct FixedTracer(AtmosphericState);

    impl RayTracer for FixedTracer {
        fn trace(&self, _e: &Array1<f64>, _h: &Array1<f64>) -> Result<AtmosphericState> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_fixed_state_reaches_engine() {
        let tracer = FixedTracer(AtmosphericState {
            n: array![2.5e-4],
            de: array![0.0],
            der: Some(array![0.0]),
        });
        let sol = ray_trace_adapter(&tracer, &array![90.0], &array![10.0], &InterfOptions::default()).unwrap();
        assert!((sol.delays.da[0] - 0.005).abs() < 1e-15);
        assert_eq!(sol.delays.dg[0], 0.0);
    }

    #[test]
    fn test_closure_tracer_same_as_polynomial() {
        let options = PolynomialOptions::default();
        let tracer = |e: &Array1<f64>, h: &Array1<f64>| polynomial_state(e, h, 10.0, &options);
        let e = Array1::linspace(5.0, 30.0, 6);
        let h = array![10.0];

        let sol = ray_trace_adapter(&tracer, &e, &h, &InterfOptions::default()).unwrap();
        let direct = crate::adapters::polynomial::polynomial_adapter(&e, &h, 10.0, &options, &InterfOptions::default()).unwrap();
        assert_eq!(sol, direct);
    }

    #[test]
    fn test_tracer_error_propagates() {
        let tracer = |_: &Array1<f64>, _: &Array1<f64>| -> Result<AtmosphericState> {
            Err(AtmError::InvalidCoefficients("profile has no levels".into()))
        };
        let err = ray_trace_adapter(&tracer, &array![10.0], &array![1.0], &InterfOptions::default()).unwrap_err();
        assert!(matches!(err, AtmError::InvalidCoefficients(_)));
    }

    #[test]
    fn test_tracer_without_rate_uses_numerical_rate() {
        let tracer = FixedTracer(AtmosphericState {
            n: array![2.5e-4],
            de: array![0.20, 0.10, 0.06, 0.04],
            der: None,
        });
        let sol = ray_trace_adapter(&tracer, &array![2.0, 4.0, 6.0, 8.0], &array![5.0], &InterfOptions::default()).unwrap();
        assert!(sol.der[0].is_nan() && sol.der[3].is_nan());
        assert!((sol.der[1] - (-0.035)).abs() < 1e-12);
    }
}
