//! Numeric types the engine is generic over.
//!
//! - [`ScalarFloat`]: `f32` / `f64`, with the bit-level hooks used by the
//!   fast `log`/`exp` approximations in [`crate::omega`]
//! - [`WdfSample`]: the per-sample wave type, either a scalar or a SIMD vector of
//!   lanes processed in lockstep (`wide::f32x8`, `wide::f64x4`)
//!
//! Lane types evaluate every transcendental lane-by-lane through the scalar
//! path, so a SIMD circuit reproduces the scalar circuit exactly on each lane.

use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

use num_traits::{Float, One, Zero};
use wide::{f32x8, f64x4};

/// Magnitude below which reactive state is flushed to zero.
pub const SNAP_THRESHOLD: f64 = 1.0e-8;

// ---------------------------------------------------------------------------
// Scalar floats
// ---------------------------------------------------------------------------

/// Scalar floating-point type (`f32` or `f64`).
pub trait ScalarFloat: Float + Debug + Default + Send + Sync + 'static {
    /// Lower clamp (in log2 domain) applied by `exp_approx`.
    const EXP2_MIN: Self;
    /// Upper clamp (in log2 domain) applied by `exp_approx`.
    const EXP2_MAX: Self;

    /// Lossy conversion from an `f64` constant.
    fn from_f64(x: f64) -> Self;

    /// Widening conversion for diagnostics and tests.
    fn to_f64_lossless(self) -> f64;

    /// Split a positive float into `(exponent, mantissa)` with the mantissa
    /// in `[1, 2)`, by reading the IEEE-754 bit fields directly.
    fn split_exponent(self) -> (Self, Self);

    /// Build `2^e` for an integer-valued `e` by writing the exponent field.
    fn exp2_int(e: Self) -> Self;
}

impl ScalarFloat for f32 {
    const EXP2_MIN: Self = -126.0;
    const EXP2_MAX: Self = 127.0;

    #[inline(always)]
    fn from_f64(x: f64) -> Self {
        x as f32
    }

    #[inline(always)]
    fn to_f64_lossless(self) -> f64 {
        self as f64
    }

    #[inline(always)]
    fn split_exponent(self) -> (Self, Self) {
        let bits = self.to_bits();
        let ex = bits & 0x7f80_0000;
        let e = (ex >> 23) as i32 - 127;
        let mantissa = f32::from_bits((bits - ex) | 0x3f80_0000);
        (e as f32, mantissa)
    }

    #[inline(always)]
    fn exp2_int(e: Self) -> Self {
        f32::from_bits(((e as i32 + 127) as u32) << 23)
    }
}

impl ScalarFloat for f64 {
    const EXP2_MIN: Self = -1022.0;
    const EXP2_MAX: Self = 1023.0;

    #[inline(always)]
    fn from_f64(x: f64) -> Self {
        x
    }

    #[inline(always)]
    fn to_f64_lossless(self) -> f64 {
        self
    }

    #[inline(always)]
    fn split_exponent(self) -> (Self, Self) {
        let bits = self.to_bits();
        let ex = bits & 0x7ff0_0000_0000_0000;
        let e = (ex >> 52) as i64 - 1023;
        let mantissa = f64::from_bits((bits - ex) | 0x3ff0_0000_0000_0000);
        (e as f64, mantissa)
    }

    #[inline(always)]
    fn exp2_int(e: Self) -> Self {
        f64::from_bits(((e as i64 + 1023) as u64) << 52)
    }
}

/// Sign function returning `0` at `0` (unlike [`f64::signum`]).
#[inline(always)]
pub fn signum<S: ScalarFloat>(x: S) -> S {
    if x > S::zero() {
        S::one()
    } else if x < S::zero() {
        -S::one()
    } else {
        S::zero()
    }
}

// ---------------------------------------------------------------------------
// Wave sample type
// ---------------------------------------------------------------------------

/// Sample type flowing through the wave-variable graph.
pub trait WdfSample:
    Copy
    + Debug
    + Default
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    /// Element type of each lane.
    type Scalar: ScalarFloat;

    /// Number of lanes processed in lockstep.
    const LANES: usize;

    /// Broadcast a scalar to all lanes.
    fn splat(x: Self::Scalar) -> Self;

    /// Read lane `index`.
    fn lane(self, index: usize) -> Self::Scalar;

    /// Apply `f` to every lane.
    fn map(self, f: impl Fn(Self::Scalar) -> Self::Scalar) -> Self;

    /// `true` when every lane compares equal.
    fn all_eq(self, other: Self) -> bool;

    /// `true` when every lane is strictly positive and finite.
    #[inline(always)]
    fn all_positive(self) -> bool {
        (0..Self::LANES).all(|i| {
            let x = self.lane(i);
            x > Self::Scalar::zero() && x.is_finite()
        })
    }

    #[inline(always)]
    fn from_f64(x: f64) -> Self {
        Self::splat(Self::Scalar::from_f64(x))
    }

    #[inline(always)]
    fn zero() -> Self {
        Self::splat(Self::Scalar::zero())
    }

    #[inline(always)]
    fn one() -> Self {
        Self::splat(Self::Scalar::one())
    }

    #[inline(always)]
    fn recip(self) -> Self {
        Self::one() / self
    }

    #[inline(always)]
    fn abs(self) -> Self {
        self.map(Float::abs)
    }

    #[inline(always)]
    fn exp(self) -> Self {
        self.map(Float::exp)
    }

    #[inline(always)]
    fn ln(self) -> Self {
        self.map(Float::ln)
    }

    #[inline(always)]
    fn tanh(self) -> Self {
        self.map(Float::tanh)
    }

    /// Lane-wise sign, `0` at `0`.
    #[inline(always)]
    fn signum(self) -> Self {
        self.map(signum)
    }

    /// Lane-wise 4th-order Wright Omega approximation.
    #[inline(always)]
    fn omega4(self) -> Self {
        self.map(crate::omega::omega4)
    }

    /// Flush lanes whose magnitude is below [`SNAP_THRESHOLD`] to zero.
    #[inline(always)]
    fn snap_to_zero(self) -> Self {
        let threshold = Self::Scalar::from_f64(SNAP_THRESHOLD);
        self.map(|x| if x.abs() < threshold { Self::Scalar::zero() } else { x })
    }
}

macro_rules! impl_scalar_sample {
    ($($t:ty),*) => {
        $(impl WdfSample for $t {
            type Scalar = $t;
            const LANES: usize = 1;

            #[inline(always)]
            fn splat(x: $t) -> Self {
                x
            }

            #[inline(always)]
            fn lane(self, index: usize) -> $t {
                debug_assert_eq!(index, 0, "scalar sample has a single lane");
                self
            }

            #[inline(always)]
            fn map(self, f: impl Fn($t) -> $t) -> Self {
                f(self)
            }

            #[inline(always)]
            fn all_eq(self, other: Self) -> bool {
                self == other
            }
        })*
    };
}

impl_scalar_sample!(f32, f64);

macro_rules! impl_lane_sample {
    ($($t:ty => $s:ty, $n:expr);*) => {
        $(impl WdfSample for $t {
            type Scalar = $s;
            const LANES: usize = $n;

            #[inline(always)]
            fn splat(x: $s) -> Self {
                <$t>::splat(x)
            }

            #[inline(always)]
            fn lane(self, index: usize) -> $s {
                self.to_array()[index]
            }

            #[inline(always)]
            fn map(self, f: impl Fn($s) -> $s) -> Self {
                <$t>::new(self.to_array().map(|x| f(x)))
            }

            #[inline(always)]
            fn all_eq(self, other: Self) -> bool {
                self.to_array() == other.to_array()
            }
        })*
    };
}

impl_lane_sample!(f32x8 => f32, 8; f64x4 => f64, 4);
