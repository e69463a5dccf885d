//! Degree-based trigonometry
//!
//! Exact zeros at multiples of 180° (sine) and odd multiples of 90° (cosine),
//! so singular geometry shows up as ±inf/NaN rather than huge finite values.

#[inline]
pub fn sind(x: f64) -> f64 {
    if x % 180.0 == 0.0 {
        return 0.0;
    }
    x.to_radians().sin()
}

#[inline]
pub fn cosd(x: f64) -> f64 {
    if (x - 90.0) % 180.0 == 0.0 {
        return 0.0;
    }
    x.to_radians().cos()
}

#[inline]
pub fn tand(x: f64) -> f64 {
    sind(x) / cosd(x)
}

#[inline]
pub fn cotd(x: f64) -> f64 {
    cosd(x) / sind(x)
}

/// csc²(x) for x in degrees
#[inline]
pub fn csc2d(x: f64) -> f64 {
    let s = sind(x);
    1.0 / (s * s)
}
