//! Scalar broadcasting of observation vectors
//!
//! All vectors passed to one call share a common length `n`; any vector of
//! length 1 stands for a scalar and is repeated to length `n`.

use crate::{AtmError, Result};
use ndarray::Array1;

/// Common length of the named inputs: the largest length, provided every
/// input has either that length or length 1.
pub fn common_len(inputs: &[(&'static str, usize)]) -> Result<usize> {
    let n = inputs.iter().map(|&(_, len)| len).max().unwrap_or(0);
    for &(name, len) in inputs {
        if len == 0 {
            return Err(AtmError::EmptyInput(name));
        }
        if len != 1 && len != n {
            return Err(AtmError::ShapeMismatch {
                name,
                len,
                expected: n,
            });
        }
    }
    Ok(n)
}

/// Broadcast `x` to length `n`.
pub fn broadcast(name: &'static str, x: &Array1<f64>, n: usize) -> Result<Array1<f64>> {
    match x.len() {
        len if len == n => Ok(x.clone()),
        1 => Ok(Array1::from_elem(n, x[0])),
        0 => Err(AtmError::EmptyInput(name)),
        len => Err(AtmError::ShapeMismatch {
            name,
            len,
            expected: n,
        }),
    }
}
