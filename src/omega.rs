//! Fast approximations of the Wright Omega function.
//!
//! `ω(x)` solves `ω + ln(ω) = x`. The diode roots evaluate it once per
//! sample, so every stage here is a fixed straight-line computation:
//!
//! ```text
//! ω1(x) = max(x, 0)
//! ω2(x) = cubic fit on [x1, x2], clamped outside
//! ω3(x) = cubic fit, then x - ln(x) above x2
//! ω4(x) = ω3(x) refined by one analytic Newton step
//! ```
//!
//! The `log`/`exp` used inside read and write IEEE-754 exponent bits and fit
//! the remaining mantissa with cubic polynomials.
//!
//! Reference: S. D'Angelo, L. Gabrielli, L. Turchet, "Fast Approximation of
//! the Lambert W Function for Virtual Analog Modelling", DAFx 2019.

use num_traits::{One, Zero};

use crate::sample::ScalarFloat;

#[inline(always)]
fn c<S: ScalarFloat>(x: f64) -> S {
    S::from_f64(x)
}

// ---------------------------------------------------------------------------
// log / exp
// ---------------------------------------------------------------------------

/// Cubic fit of `log2(x)` for `x` in `[1, 2)`.
#[inline(always)]
pub fn log2_approx<S: ScalarFloat>(x: S) -> S {
    let alpha = c::<S>(0.1640425613334452);
    let beta = c::<S>(-1.098865286222744);
    let gamma = c::<S>(3.148297929334117);
    let zeta = c::<S>(-2.213475204444817);

    zeta + x * (gamma + x * (beta + x * alpha))
}

/// Natural log for positive `x`: exponent bits plus [`log2_approx`] of the
/// mantissa.
#[inline(always)]
pub fn log_approx<S: ScalarFloat>(x: S) -> S {
    let (e, mantissa) = x.split_exponent();
    c::<S>(std::f64::consts::LN_2) * (e + log2_approx(mantissa))
}

/// Cubic fit of `2^x` for `x` in `[0, 1)`.
#[inline(always)]
pub fn pow2_approx<S: ScalarFloat>(x: S) -> S {
    let alpha = c::<S>(0.07944154167983575);
    let beta = c::<S>(0.2274112777602189);
    let gamma = c::<S>(0.6931471805599453);
    let zeta = S::one();

    zeta + x * (gamma + x * (beta + x * alpha))
}

/// `e^x`: integer part of `x·log2(e)` written into the exponent field, the
/// fractional part through [`pow2_approx`].
#[inline(always)]
pub fn exp_approx<S: ScalarFloat>(x: S) -> S {
    let x = (c::<S>(std::f64::consts::LOG2_E) * x)
        .max(S::EXP2_MIN)
        .min(S::EXP2_MAX);
    let l = x.floor();
    let f = x - l;
    S::exp2_int(l) * pow2_approx(f)
}

// ---------------------------------------------------------------------------
// Wright Omega
// ---------------------------------------------------------------------------

/// First-order approximation: `max(x, 0)`.
#[inline(always)]
pub fn omega1<S: ScalarFloat>(x: S) -> S {
    x.max(S::zero())
}

/// Second-order approximation.
#[inline(always)]
pub fn omega2<S: ScalarFloat>(x: S) -> S {
    let x1 = c::<S>(-3.684303659906469);
    let x2 = c::<S>(1.972967391708859);
    let a = c::<S>(9.451797158780131e-3);
    let b = c::<S>(1.126446405111627e-1);
    let cc = c::<S>(4.451353886588814e-1);
    let d = c::<S>(5.836596684310648e-1);

    if x < x1 {
        S::zero()
    } else if x > x2 {
        x
    } else {
        d + x * (cc + x * (b + x * a))
    }
}

/// Third-order approximation.
#[inline(always)]
pub fn omega3<S: ScalarFloat>(x: S) -> S {
    let x1 = c::<S>(-3.341459552768620);
    let x2 = c::<S>(8.0);
    let a = c::<S>(-1.314293149877800e-3);
    let b = c::<S>(4.775931364975583e-2);
    let cc = c::<S>(3.631952663804445e-1);
    let d = c::<S>(6.313183464296682e-1);

    if x < x1 {
        S::zero()
    } else if x < x2 {
        d + x * (cc + x * (b + x * a))
    } else {
        x - log_approx(x)
    }
}

/// Fourth-order approximation: [`omega3`] plus one Newton correction.
#[inline(always)]
pub fn omega4<S: ScalarFloat>(x: S) -> S {
    let y = omega3(x);
    y - (y - exp_approx(x - y)) / (y + S::one())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference ω via Newton iteration on `ω + ln ω = x`.
    fn omega_reference(x: f64) -> f64 {
        let mut w = if x > 1.0 { x - x.ln() } else { x.exp() };
        for _ in 0..50 {
            let f = w + w.ln() - x;
            w -= f / (1.0 + 1.0 / w);
            w = w.max(1e-300);
        }
        w
    }

    #[test]
    fn log_approx_tracks_ln() {
        for &x in &[0.01_f64, 0.5, 1.0, 2.0, 8.0, 10.0, 123.4, 1e6] {
            let err = (log_approx(x) - x.ln()).abs();
            assert!(err < 5e-3, "log_approx({x}) error {err:.6}");
        }
    }

    #[test]
    fn log_approx_f32_matches_f64() {
        for &x in &[0.25_f32, 3.0, 8.5, 1000.0] {
            let diff = (log_approx(x) as f64 - log_approx(x as f64)).abs();
            assert!(diff < 1e-5, "f32/f64 log_approx mismatch at {x}: {diff}");
        }
    }

    #[test]
    fn exp_approx_tracks_exp() {
        for &x in &[-10.0_f64, -1.0, 0.0, 0.3, 1.0, 5.0, 20.0] {
            let rel = (exp_approx(x) - x.exp()).abs() / x.exp();
            assert!(rel < 1e-3, "exp_approx({x}) rel error {rel:.6}");
        }
    }

    #[test]
    fn exp_approx_clamps_far_below_domain() {
        let y = exp_approx(-1.0e6_f32);
        assert!(y.is_finite() && y >= 0.0 && y < 1e-37);
        let y = exp_approx(-1.0e6_f64);
        assert!(y.is_finite() && y >= 0.0);
    }

    #[test]
    fn omega1_is_ramp() {
        assert_eq!(omega1(-3.0_f64), 0.0);
        assert_eq!(omega1(2.5_f64), 2.5);
    }

    #[test]
    fn omega2_clamps_outside_fit() {
        assert_eq!(omega2(-10.0_f64), 0.0);
        assert_eq!(omega2(5.0_f64), 5.0);
    }

    #[test]
    fn omega3_is_zero_below_domain() {
        assert_eq!(omega3(-4.0_f64), 0.0);
        assert!(omega3(-3.0_f64) > 0.0);
    }

    #[test]
    fn omega4_accuracy() {
        let mut x = -6.0_f64;
        while x < 30.0 {
            let w = omega_reference(x);
            let err = (omega4(x) - w).abs();
            assert!(err < 0.05 * w.max(0.1), "omega4({x:.2}) = {} vs {w:.5}", omega4(x));
            x += 0.25;
        }
    }

    #[test]
    fn omega4_large_inputs_converge_to_identity() {
        for &x in &[50.0_f64, 200.0, 1000.0] {
            let w = omega_reference(x);
            assert!((omega4(x) - w).abs() / w < 1e-3);
        }
    }

    #[test]
    fn omega4_never_nan_for_finite_input() {
        for &x in &[-1e30_f32, -100.0, -3.5, 0.0, 7.99, 8.0, 1e6, 1e30] {
            assert!(omega4(x).is_finite(), "omega4({x}) not finite");
        }
    }
}
