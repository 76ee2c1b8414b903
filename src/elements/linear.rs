//! Linear one-port elements: Resistor, Capacitor, Inductor and their
//! alpha-transform variants.

use super::{Port, WdfElement};
use crate::sample::WdfSample;

/// Sample rate used until `prepare` is called.
pub const DEFAULT_SAMPLE_RATE: f64 = 48_000.0;

// ---------------------------------------------------------------------------
// Resistor
// ---------------------------------------------------------------------------

/// Ideal resistor, absorbs everything, reflects nothing.
///
/// `b = 0`, `Rp = R`
#[derive(Debug, Clone, Copy)]
pub struct Resistor<T> {
    port: Port<T>,
    resistance: T,
}

impl<T: WdfSample> Resistor<T> {
    pub fn new(resistance: T) -> Self {
        let mut r = Self {
            port: Port::default(),
            resistance,
        };
        r.calc_impedance();
        r
    }

    pub fn resistance(&self) -> T {
        self.resistance
    }

    /// Returns `true` if the value changed (and the port resistance with it).
    pub fn set_resistance_value(&mut self, resistance: T) -> bool {
        if resistance.all_eq(self.resistance) {
            return false;
        }
        self.resistance = resistance;
        self.calc_impedance();
        true
    }
}

impl<T: WdfSample> WdfElement<T> for Resistor<T> {
    #[inline]
    fn port(&self) -> &Port<T> {
        &self.port
    }

    fn calc_impedance(&mut self) {
        self.port.set_resistance(self.resistance);
    }

    #[inline]
    fn incident(&mut self, x: T) {
        self.port.a = x;
    }

    #[inline]
    fn reflected(&mut self) -> T {
        self.port.b = T::zero();
        self.port.b
    }
}

// ---------------------------------------------------------------------------
// Capacitor
// ---------------------------------------------------------------------------

/// Capacitor discretized with the bilinear transform.
///
/// `b[n] = a[n-1]`, `Rp = 1 / (2 * fs * C)`
#[derive(Debug, Clone, Copy)]
pub struct Capacitor<T> {
    port: Port<T>,
    capacitance: T,
    sample_rate: T,
    z: T,
}

impl<T: WdfSample> Capacitor<T> {
    pub fn new(capacitance: T) -> Self {
        Self::with_sample_rate(capacitance, T::from_f64(DEFAULT_SAMPLE_RATE))
    }

    pub fn with_sample_rate(capacitance: T, sample_rate: T) -> Self {
        let mut c = Self {
            port: Port::default(),
            capacitance,
            sample_rate,
            z: T::zero(),
        };
        c.calc_impedance();
        c
    }

    pub fn capacitance(&self) -> T {
        self.capacitance
    }

    /// Set the sample rate, recompute the port resistance and clear state.
    pub fn prepare(&mut self, sample_rate: T) -> bool {
        self.sample_rate = sample_rate;
        self.calc_impedance();
        self.reset();
        true
    }

    pub fn set_capacitance_value(&mut self, capacitance: T) -> bool {
        if capacitance.all_eq(self.capacitance) {
            return false;
        }
        self.capacitance = capacitance;
        self.calc_impedance();
        true
    }
}

impl<T: WdfSample> WdfElement<T> for Capacitor<T> {
    #[inline]
    fn port(&self) -> &Port<T> {
        &self.port
    }

    fn calc_impedance(&mut self) {
        self.port
            .set_resistance((T::from_f64(2.0) * self.sample_rate * self.capacitance).recip());
    }

    #[inline]
    fn incident(&mut self, x: T) {
        self.port.a = x;
        self.z = x;
    }

    #[inline]
    fn reflected(&mut self) -> T {
        self.port.b = self.z;
        self.port.b
    }

    fn reset(&mut self) {
        self.z = T::zero();
    }

    fn snap_to_zero(&mut self) {
        self.z = self.z.snap_to_zero();
    }
}

// ---------------------------------------------------------------------------
// Capacitor (alpha transform)
// ---------------------------------------------------------------------------

/// `(b_coef, a_coef)` for the alpha transform: `((1 - α) / 2, (1 + α) / 2)`.
#[inline]
pub(crate) fn alpha_coefficients<T: WdfSample>(alpha: T) -> (T, T) {
    let half = T::from_f64(0.5);
    ((T::one() - alpha) * half, (T::one() + alpha) * half)
}

/// Capacitor discretized with the alpha transform.
///
/// `α = 1` is the bilinear transform, `α = 0` backward Euler.
///
/// `b[n] = b_coef * b[n-1] + a_coef * a[n-1]`, `Rp = 1 / ((1 + α) * fs * C)`
#[derive(Debug, Clone, Copy)]
pub struct CapacitorAlpha<T> {
    port: Port<T>,
    capacitance: T,
    sample_rate: T,
    alpha: T,
    b_coef: T,
    a_coef: T,
    z: T,
}

impl<T: WdfSample> CapacitorAlpha<T> {
    pub fn new(capacitance: T, alpha: T) -> Self {
        Self::with_sample_rate(capacitance, T::from_f64(DEFAULT_SAMPLE_RATE), alpha)
    }

    pub fn with_sample_rate(capacitance: T, sample_rate: T, alpha: T) -> Self {
        let (b_coef, a_coef) = alpha_coefficients(alpha);
        let mut c = Self {
            port: Port::default(),
            capacitance,
            sample_rate,
            alpha,
            b_coef,
            a_coef,
            z: T::zero(),
        };
        c.calc_impedance();
        c
    }

    pub fn capacitance(&self) -> T {
        self.capacitance
    }

    pub fn alpha(&self) -> T {
        self.alpha
    }

    pub fn prepare(&mut self, sample_rate: T) -> bool {
        self.sample_rate = sample_rate;
        self.calc_impedance();
        self.reset();
        true
    }

    pub fn set_capacitance_value(&mut self, capacitance: T) -> bool {
        if capacitance.all_eq(self.capacitance) {
            return false;
        }
        self.capacitance = capacitance;
        self.calc_impedance();
        true
    }

    /// Change α; both the recursion coefficients and `Rp` depend on it.
    pub fn set_alpha(&mut self, alpha: T) -> bool {
        if alpha.all_eq(self.alpha) {
            return false;
        }
        self.alpha = alpha;
        (self.b_coef, self.a_coef) = alpha_coefficients(alpha);
        self.calc_impedance();
        true
    }
}

impl<T: WdfSample> WdfElement<T> for CapacitorAlpha<T> {
    #[inline]
    fn port(&self) -> &Port<T> {
        &self.port
    }

    fn calc_impedance(&mut self) {
        self.port.set_resistance(
            ((T::one() + self.alpha) * self.sample_rate * self.capacitance).recip(),
        );
    }

    #[inline]
    fn incident(&mut self, x: T) {
        self.port.a = x;
        self.z = x;
    }

    #[inline]
    fn reflected(&mut self) -> T {
        self.port.b = self.b_coef * self.port.b + self.a_coef * self.z;
        self.port.b
    }

    fn reset(&mut self) {
        self.z = T::zero();
        self.port.b = T::zero();
    }

    fn snap_to_zero(&mut self) {
        self.z = self.z.snap_to_zero();
        self.port.b = self.port.b.snap_to_zero();
    }
}

// ---------------------------------------------------------------------------
// Inductor
// ---------------------------------------------------------------------------

/// Inductor discretized with the bilinear transform.
///
/// `b[n] = -a[n-1]`, `Rp = 2 * fs * L`
#[derive(Debug, Clone, Copy)]
pub struct Inductor<T> {
    port: Port<T>,
    inductance: T,
    sample_rate: T,
    z: T,
}

impl<T: WdfSample> Inductor<T> {
    pub fn new(inductance: T) -> Self {
        Self::with_sample_rate(inductance, T::from_f64(DEFAULT_SAMPLE_RATE))
    }

    pub fn with_sample_rate(inductance: T, sample_rate: T) -> Self {
        let mut l = Self {
            port: Port::default(),
            inductance,
            sample_rate,
            z: T::zero(),
        };
        l.calc_impedance();
        l
    }

    pub fn inductance(&self) -> T {
        self.inductance
    }

    pub fn prepare(&mut self, sample_rate: T) -> bool {
        self.sample_rate = sample_rate;
        self.calc_impedance();
        self.reset();
        true
    }

    pub fn set_inductance_value(&mut self, inductance: T) -> bool {
        if inductance.all_eq(self.inductance) {
            return false;
        }
        self.inductance = inductance;
        self.calc_impedance();
        true
    }
}

impl<T: WdfSample> WdfElement<T> for Inductor<T> {
    #[inline]
    fn port(&self) -> &Port<T> {
        &self.port
    }

    fn calc_impedance(&mut self) {
        self.port
            .set_resistance(T::from_f64(2.0) * self.sample_rate * self.inductance);
    }

    #[inline]
    fn incident(&mut self, x: T) {
        self.port.a = x;
        self.z = x;
    }

    #[inline]
    fn reflected(&mut self) -> T {
        self.port.b = -self.z;
        self.port.b
    }

    fn reset(&mut self) {
        self.z = T::zero();
    }

    fn snap_to_zero(&mut self) {
        self.z = self.z.snap_to_zero();
    }
}

// ---------------------------------------------------------------------------
// Inductor (alpha transform)
// ---------------------------------------------------------------------------

/// Inductor discretized with the alpha transform.
///
/// `b[n] = b_coef * b[n-1] - a_coef * a[n-1]`, `Rp = (1 + α) * fs * L`
#[derive(Debug, Clone, Copy)]
pub struct InductorAlpha<T> {
    port: Port<T>,
    inductance: T,
    sample_rate: T,
    alpha: T,
    b_coef: T,
    a_coef: T,
    z: T,
}

impl<T: WdfSample> InductorAlpha<T> {
    pub fn new(inductance: T, alpha: T) -> Self {
        Self::with_sample_rate(inductance, T::from_f64(DEFAULT_SAMPLE_RATE), alpha)
    }

    pub fn with_sample_rate(inductance: T, sample_rate: T, alpha: T) -> Self {
        let (b_coef, a_coef) = alpha_coefficients(alpha);
        let mut l = Self {
            port: Port::default(),
            inductance,
            sample_rate,
            alpha,
            b_coef,
            a_coef,
            z: T::zero(),
        };
        l.calc_impedance();
        l
    }

    pub fn inductance(&self) -> T {
        self.inductance
    }

    pub fn alpha(&self) -> T {
        self.alpha
    }

    pub fn prepare(&mut self, sample_rate: T) -> bool {
        self.sample_rate = sample_rate;
        self.calc_impedance();
        self.reset();
        true
    }

    pub fn set_inductance_value(&mut self, inductance: T) -> bool {
        if inductance.all_eq(self.inductance) {
            return false;
        }
        self.inductance = inductance;
        self.calc_impedance();
        true
    }

    pub fn set_alpha(&mut self, alpha: T) -> bool {
        if alpha.all_eq(self.alpha) {
            return false;
        }
        self.alpha = alpha;
        (self.b_coef, self.a_coef) = alpha_coefficients(alpha);
        self.calc_impedance();
        true
    }
}

impl<T: WdfSample> WdfElement<T> for InductorAlpha<T> {
    #[inline]
    fn port(&self) -> &Port<T> {
        &self.port
    }

    fn calc_impedance(&mut self) {
        self.port
            .set_resistance((T::one() + self.alpha) * self.sample_rate * self.inductance);
    }

    #[inline]
    fn incident(&mut self, x: T) {
        self.port.a = x;
        self.z = x;
    }

    #[inline]
    fn reflected(&mut self) -> T {
        self.port.b = self.b_coef * self.port.b - self.a_coef * self.z;
        self.port.b
    }

    fn reset(&mut self) {
        self.z = T::zero();
        self.port.b = T::zero();
    }

    fn snap_to_zero(&mut self) {
        self.z = self.z.snap_to_zero();
        self.port.b = self.port.b.snap_to_zero();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
