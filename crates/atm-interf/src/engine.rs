//! Generic interferometric delay / height engine
//!
//! Consumes elevation `e` (deg), reflector height `H` (m) and an
//! atmospheric state `(N, de, der)` and produces
//!
//! ```text
//! da = 2·H·N / sin(e+de)
//! dg = 2·H·(sin(e+de) − sin(e))
//! dt = da + dg
//! ```
//!
//! Height corrections are the negative height shift implied by each delay,
//! `H_x = −½·∂d_x/∂(sin e)`. They are evaluated with the exact closed form,
//! the small-bending linearization, or numerically ("hybrid") from the
//! delays themselves. The delay-only entry point [`compute_delay`] never
//! touches the height branch.

use crate::broadcast::{broadcast, common_len};
use crate::gradient::{gradient, gradient_all};
use crate::options::InterfOptions;
use crate::trig::{cosd, csc2d, sind, tand};
use crate::{AtmosphericState, Result};
use ndarray::{Array1, Zip};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Engine input; every vector is either length 1 or the common length.
#[derive(Debug, Clone, PartialEq)]
pub struct AtmInput {
    /// Unrefracted elevation angle (deg)
    pub e: Array1<f64>,
    /// Reflector height (m), positive with the antenna above the surface
    pub h: Array1<f64>,
    /// Refractivity n − 1
    pub n: Array1<f64>,
    /// Elevation bending (deg)
    pub de: Array1<f64>,
    /// Bending rate d(de)/de; derived numerically when absent
    pub der: Option<Array1<f64>>,
}

impl AtmInput {
    pub fn new(e: Array1<f64>, h: Array1<f64>, n: Array1<f64>, de: Array1<f64>) -> Self {
        Self {
            e,
            h,
            n,
            de,
            der: None,
        }
    }

    pub fn with_der(mut self, der: Array1<f64>) -> Self {
        self.der = Some(der);
        self
    }

    pub fn from_state(e: Array1<f64>, h: Array1<f64>, state: AtmosphericState) -> Self {
        Self {
            e,
            h,
            n: state.n,
            de: state.de,
            der: state.der,
        }
    }
}

/// Delay components (m)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delays {
    pub dt: Array1<f64>,
    pub da: Array1<f64>,
    pub dg: Array1<f64>,
}

/// Height corrections (m)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heights {
    pub ht: Array1<f64>,
    pub ha: Array1<f64>,
    pub hg: Array1<f64>,
}

/// Full engine output: delays, heights and the atmospheric intermediates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfSolution {
    pub delays: Delays,
    pub heights: Heights,
    pub n: Array1<f64>,
    pub de: Array1<f64>,
    /// Bending rate actually used; NaN in hybrid mode
    pub der: Array1<f64>,
}

/// Input after broadcasting to the common length
struct Prepared {
    e: Array1<f64>,
    h: Array1<f64>,
    n: Array1<f64>,
    de: Array1<f64>,
    der: Option<Array1<f64>>,
}

fn prepare(input: &AtmInput) -> Result<Prepared> {
    let mut lens = vec![
        ("e", input.e.len()),
        ("H", input.h.len()),
        ("N", input.n.len()),
        ("de", input.de.len()),
    ];
    if let Some(der) = &input.der {
        lens.push(("der", der.len()));
    }
    let len = common_len(&lens)?;

    Ok(Prepared {
        e: broadcast("e", &input.e, len)?,
        h: broadcast("H", &input.h, len)?,
        n: broadcast("N", &input.n, len)?,
        de: broadcast("de", &input.de, len)?,
        der: input
            .der
            .as_ref()
            .map(|der| broadcast("der", der, len))
            .transpose()?,
    })
}

fn delays_of(p: &Prepared) -> Delays {
    let sin_e = p.e.mapv(sind);
    let sin_ed = (&p.e + &p.de).mapv(sind);

    let da = 2.0 * &p.h * &p.n / &sin_ed;
    let dg = 2.0 * &p.h * (&sin_ed - &sin_e);
    let dt = &da + &dg;

    Delays { dt, da, dg }
}

/// Delay components only.
pub fn compute_delay(input: &AtmInput) -> Result<Delays> {
    let p = prepare(input)?;
    Ok(delays_of(&p))
}

/// Delay components plus height corrections.
pub fn compute_delay_and_height(input: &AtmInput, options: &InterfOptions) -> Result<InterfSolution> {
    let p = prepare(input)?;
    let delays = delays_of(&p);

    let (heights, der) = if options.h_hybrid {
        debug!("Height corrections by numerical delay inversion ({} samples)", p.e.len());
        let heights = hybrid_heights(&p.e, &delays, options.numerical_noend);
        (heights, Array1::from_elem(p.e.len(), f64::NAN))
    } else {
        let der = resolve_der(&p, options);
        let heights = if options.h_approximate {
            debug!("Height corrections by small-bending approximation");
            approximate_heights(&p, &der)
        } else {
            debug!("Height corrections by exact closed form");
            exact_heights(&p, &der)
        };
        (heights, der)
    };

    Ok(InterfSolution {
        delays,
        heights,
        n: p.n,
        de: p.de,
        der,
    })
}

/// Bending rate: the supplied one, or d(de)/de by finite differences.
///
/// Numerically derived rates that are unavailable (single sample, or no
/// change in elevation) or exactly zero are replaced by NaN with a warning.
fn resolve_der(p: &Prepared, options: &InterfOptions) -> Array1<f64> {
    if let Some(der) = &p.der {
        if !options.der_numerical {
            return der.clone();
        }
    }

    let len = p.e.len();
    if len < 2 {
        warn!("Bending rate cannot be differentiated from a single observation; heights set to NaN");
        return Array1::from_elem(len, f64::NAN);
    }

    let de_step = gradient(&p.de, options.numerical_noend);
    let e_step = gradient_all(&p.e, None);
    let mut repeated = 0usize;
    let mut degenerate = 0usize;
    let der = Zip::from(&de_step).and(&e_step).map_collect(|&d_de, &d_e| {
        if d_e == 0.0 {
            repeated += 1;
            return f64::NAN;
        }
        let v = d_de / d_e;
        if v == 0.0 {
            degenerate += 1;
            f64::NAN
        } else {
            v
        }
    });
    if repeated > 0 {
        warn!(
            "Elevation does not change at {} of {} samples; bending rate set to NaN",
            repeated, len
        );
    }
    if degenerate > 0 {
        warn!(
            "Numerical bending rate is exactly zero for {} of {} samples; heights set to NaN",
            degenerate, len
        );
    }
    der
}

fn exact_heights(p: &Prepared, der: &Array1<f64>) -> Heights {
    let len = p.e.len();
    let mut ha = Array1::<f64>::zeros(len);
    let mut hg = Array1::<f64>::zeros(len);

    Zip::from(&mut ha)
        .and(&p.e)
        .and(&p.h)
        .and(&p.n)
        .and(&p.de)
        .and(der)
        .for_each(|ha, &e, &h, &n, &de, &der| {
            let ed = e + de;
            *ha = h * n * csc2d(ed) * cosd(ed) / cosd(e) * (1.0 + der);
        });
    Zip::from(&mut hg)
        .and(&p.e)
        .and(&p.h)
        .and(&p.de)
        .and(der)
        .for_each(|hg, &e, &h, &de, &der| {
            *hg = -h * der + h * (sind(de) * tand(e) + 1.0 - cosd(de)) * (1.0 + der);
        });

    let ht = &ha + &hg;
    Heights { ht, ha, hg }
}

fn approximate_heights(p: &Prepared, der: &Array1<f64>) -> Heights {
    let len = p.e.len();
    let mut ha = Array1::<f64>::zeros(len);
    let mut hg = Array1::<f64>::zeros(len);

    Zip::from(&mut ha)
        .and(&p.e)
        .and(&p.h)
        .and(&p.n)
        .and(&p.de)
        .and(der)
        .for_each(|ha, &e, &h, &n, &de, &der| {
            let tmp = de.to_radians() * tand(e);
            *ha = h * n * csc2d(e + de) * (1.0 - tmp) * (1.0 + der);
        });
    Zip::from(&mut hg)
        .and(&p.e)
        .and(&p.h)
        .and(&p.de)
        .and(der)
        .for_each(|hg, &e, &h, &de, &der| {
            *hg = -h * der + h * de.to_radians() * tand(e);
        });

    let ht = &ha + &hg;
    Heights { ht, ha, hg }
}

/// H_x = −½·∂d_x/∂(sin e), differentiated along the observation axis.
fn hybrid_heights(e: &Array1<f64>, delays: &Delays, noend: bool) -> Heights {
    if e.len() < 2 {
        warn!("Hybrid heights need at least two observations; heights set to NaN");
    }
    let mut dsin = gradient_all(&e.mapv(sind), None);
    let mut repeated = 0usize;
    dsin.mapv_inplace(|v| {
        if v == 0.0 {
            repeated += 1;
            f64::NAN
        } else {
            v
        }
    });
    if repeated > 0 {
        warn!(
            "sin(e) does not change at {} of {} samples; hybrid heights set to NaN",
            repeated,
            e.len()
        );
    }
    let invert = |d: &Array1<f64>| -0.5 * gradient(d, noend) / &dsin;

    Heights {
        ht: invert(&delays.dt),
        ha: invert(&delays.da),
        hg: invert(&delays.dg),
    }
}
