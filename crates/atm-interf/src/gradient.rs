//! Numerical gradient along one axis
//!
//! Unit-spacing finite differences: centered in the interior, one-sided at
//! the two boundaries. The `noend` variant overwrites both boundary samples
//! with NaN because the one-sided differences there are materially less
//! accurate than the interior ones.

use ndarray::{Array, ArrayBase, Axis, Data, Dimension, RemoveAxis, Zip};

/// First axis with length greater than one, or axis 0 when every axis is singleton.
pub fn first_non_singleton(shape: &[usize]) -> Axis {
    Axis(shape.iter().position(|&len| len > 1).unwrap_or(0))
}

/// Gradient of `x` along `axis` (default: first non-singleton axis).
///
/// Series of length 1 along the axis have a zero gradient.
pub fn gradient_all<S, D>(x: &ArrayBase<S, D>, axis: Option<Axis>) -> Array<f64, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let axis = axis.unwrap_or_else(|| first_non_singleton(x.shape()));
    let mut out = Array::<f64, D>::zeros(x.raw_dim());
    let n = x.len_of(axis);
    if n < 2 {
        return out;
    }

    Zip::from(x.lanes(axis))
        .and(out.lanes_mut(axis))
        .for_each(|src, mut dst| {
            dst[0] = src[1] - src[0];
            dst[n - 1] = src[n - 1] - src[n - 2];
            for i in 1..n - 1 {
                dst[i] = (src[i + 1] - src[i - 1]) / 2.0;
            }
        });

    out
}

/// Same as [`gradient_all`], with the first and last sample along the axis set to NaN.
pub fn gradient_all_noend<S, D>(x: &ArrayBase<S, D>, axis: Option<Axis>) -> Array<f64, D>
where
    S: Data<Elem = f64>,
    D: RemoveAxis,
{
    let axis = axis.unwrap_or_else(|| first_non_singleton(x.shape()));
    let mut out = gradient_all(x, Some(axis));
    let n = out.len_of(axis);
    if n == 0 {
        return out;
    }

    out.index_axis_mut(axis, 0).fill(f64::NAN);
    out.index_axis_mut(axis, n - 1).fill(f64::NAN);
    out
}

/// Dispatch on the `noend` flag.
pub(crate) fn gradient<S, D>(x: &ArrayBase<S, D>, noend: bool) -> Array<f64, D>
where
    S: Data<Elem = f64>,
    D: RemoveAxis,
{
    if noend {
        gradient_all_noend(x, None)
    } else {
        gradient_all(x, None)
    }
}
