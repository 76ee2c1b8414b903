//! Voltage and current sources.
//!
//! Resistive sources are adaptable leaves; ideal sources have no internal
//! resistance and must sit at the root of a tree.

use super::{Port, WdfElement, WdfRoot};
use crate::sample::WdfSample;

/// Series resistance of a [`ResistiveVoltageSource`] built with `new`.
pub const DEFAULT_VOLTAGE_SOURCE_RESISTANCE: f64 = 1.0e-9;

/// Parallel resistance of a [`ResistiveCurrentSource`] built with `new`.
pub const DEFAULT_CURRENT_SOURCE_RESISTANCE: f64 = 1.0e9;

// ---------------------------------------------------------------------------
// Resistive voltage source
// ---------------------------------------------------------------------------

/// Voltage source with series resistance.
///
/// `b = Vs`, `Rp = R`
#[derive(Debug, Clone, Copy)]
pub struct ResistiveVoltageSource<T> {
    port: Port<T>,
    resistance: T,
    vs: T,
}

impl<T: WdfSample> ResistiveVoltageSource<T> {
    pub fn new() -> Self {
        Self::with_resistance(T::from_f64(DEFAULT_VOLTAGE_SOURCE_RESISTANCE))
    }

    pub fn with_resistance(resistance: T) -> Self {
        let mut s = Self {
            port: Port::default(),
            resistance,
            vs: T::zero(),
        };
        s.calc_impedance();
        s
    }

    pub fn resistance(&self) -> T {
        self.resistance
    }

    pub fn set_resistance_value(&mut self, resistance: T) -> bool {
        if resistance.all_eq(self.resistance) {
            return false;
        }
        self.resistance = resistance;
        self.calc_impedance();
        true
    }

    pub fn source_voltage(&self) -> T {
        self.vs
    }

    #[inline]
    pub fn set_voltage(&mut self, vs: T) {
        self.vs = vs;
    }
}

impl<T: WdfSample> Default for ResistiveVoltageSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: WdfSample> WdfElement<T> for ResistiveVoltageSource<T> {
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
        self.port.b = self.vs;
        self.port.b
    }
}

// ---------------------------------------------------------------------------
// Resistive current source
// ---------------------------------------------------------------------------

/// Current source with parallel resistance (Norton equivalent).
///
/// `b = R * Is`, `Rp = R`
#[derive(Debug, Clone, Copy)]
pub struct ResistiveCurrentSource<T> {
    port: Port<T>,
    resistance: T,
    is: T,
}

impl<T: WdfSample> ResistiveCurrentSource<T> {
    pub fn new() -> Self {
        Self::with_resistance(T::from_f64(DEFAULT_CURRENT_SOURCE_RESISTANCE))
    }

    pub fn with_resistance(resistance: T) -> Self {
        let mut s = Self {
            port: Port::default(),
            resistance,
            is: T::zero(),
        };
        s.calc_impedance();
        s
    }

    pub fn resistance(&self) -> T {
        self.resistance
    }

    pub fn set_resistance_value(&mut self, resistance: T) -> bool {
        if resistance.all_eq(self.resistance) {
            return false;
        }
        self.resistance = resistance;
        self.calc_impedance();
        true
    }

    pub fn source_current(&self) -> T {
        self.is
    }

    #[inline]
    pub fn set_current(&mut self, is: T) {
        self.is = is;
    }
}

impl<T: WdfSample> Default for ResistiveCurrentSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: WdfSample> WdfElement<T> for ResistiveCurrentSource<T> {
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
        self.port.b = self.port.r * self.is;
        self.port.b
    }
}

// ---------------------------------------------------------------------------
// Ideal voltage source (root)
// ---------------------------------------------------------------------------

/// Ideal voltage source terminating a tree.
///
/// `b = 2 * Vs - a`
#[derive(Debug, Clone, Copy)]
pub struct IdealVoltageSource<T, N> {
    port: Port<T>,
    next: N,
    vs: T,
}

impl<T: WdfSample, N: WdfElement<T>> IdealVoltageSource<T, N> {
    pub fn new(next: N) -> Self {
        let mut s = Self {
            port: Port::default(),
            next,
            vs: T::zero(),
        };
        s.calc_impedance();
        s
    }

    pub fn source_voltage(&self) -> T {
        self.vs
    }

    #[inline]
    pub fn set_voltage(&mut self, vs: T) {
        self.vs = vs;
    }
}

impl<T: WdfSample, N: WdfElement<T>> WdfRoot<T> for IdealVoltageSource<T, N> {
    type Next = N;

    #[inline]
    fn port(&self) -> &Port<T> {
        &self.port
    }

    #[inline]
    fn next(&self) -> &N {
        &self.next
    }

    #[inline]
    fn update_next(&mut self, f: impl FnOnce(&mut N) -> bool) -> bool {
        if f(&mut self.next) {
            self.calc_impedance();
            true
        } else {
            false
        }
    }

    fn calc_impedance(&mut self) {}

    #[inline]
    fn incident(&mut self, x: T) {
        self.port.a = x;
    }

    #[inline]
    fn reflected(&mut self) -> T {
        self.port.b = -self.port.a + T::from_f64(2.0) * self.vs;
        self.port.b
    }
}

// ---------------------------------------------------------------------------
// Ideal current source (root)
// ---------------------------------------------------------------------------

/// Ideal current source terminating a tree.
///
/// `b = 2 * R_next * Is + a`
#[derive(Debug, Clone, Copy)]
pub struct IdealCurrentSource<T, N> {
    port: Port<T>,
    next: N,
    is: T,
    two_r: T,
    two_r_is: T,
}

impl<T: WdfSample, N: WdfElement<T>> IdealCurrentSource<T, N> {
    pub fn new(next: N) -> Self {
        let mut s = Self {
            port: Port::default(),
            next,
            is: T::zero(),
            two_r: T::zero(),
            two_r_is: T::zero(),
        };
        s.calc_impedance();
        s
    }

    pub fn source_current(&self) -> T {
        self.is
    }

    #[inline]
    pub fn set_current(&mut self, is: T) {
        self.is = is;
        self.two_r_is = self.two_r * is;
    }
}

impl<T: WdfSample, N: WdfElement<T>> WdfRoot<T> for IdealCurrentSource<T, N> {
    type Next = N;

    #[inline]
    fn port(&self) -> &Port<T> {
        &self.port
    }

    #[inline]
    fn next(&self) -> &N {
        &self.next
    }

    #[inline]
    fn update_next(&mut self, f: impl FnOnce(&mut N) -> bool) -> bool {
        if f(&mut self.next) {
            self.calc_impedance();
            true
        } else {
            false
        }
    }

    fn calc_impedance(&mut self) {
        self.two_r = T::from_f64(2.0) * self.next.port_resistance();
        self.two_r_is = self.two_r * self.is;
    }

    #[inline]
    fn incident(&mut self, x: T) {
        self.port.a = x;
    }

    #[inline]
    fn reflected(&mut self) -> T {
        self.port.b = self.two_r_is + self.port.a;
        self.port.b
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
