//! Switch, open circuit and short circuit.

use super::{Port, WdfElement, WdfRoot};
use crate::sample::WdfSample;

/// Port resistance standing in for an open circuit.
pub const OPEN_RESISTANCE: f64 = 1.0e15;

/// Port resistance standing in for a short circuit.
pub const SHORT_RESISTANCE: f64 = 1.0e-15;

// ---------------------------------------------------------------------------
// Switch (root)
// ---------------------------------------------------------------------------

/// Ideal switch terminating a tree.
///
/// Closed: `b = -a` (short). Open: `b = a`. Starts closed.
#[derive(Debug, Clone, Copy)]
pub struct Switch<T, N> {
    port: Port<T>,
    next: N,
    closed: bool,
}

impl<T: WdfSample, N: WdfElement<T>> Switch<T, N> {
    pub fn new(next: N) -> Self {
        Self {
            port: Port::default(),
            next,
            closed: true,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[inline]
    pub fn set_closed(&mut self, closed: bool) {
        self.closed = closed;
    }
}

impl<T: WdfSample, N: WdfElement<T>> WdfRoot<T> for Switch<T, N> {
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
        self.port.b = if self.closed { -self.port.a } else { self.port.a };
        self.port.b
    }
}

// ---------------------------------------------------------------------------
// Open / Short
// ---------------------------------------------------------------------------

/// Open circuit: `b = a`, `Rp ≈ 1e15`.
#[derive(Debug, Clone, Copy)]
pub struct Open<T> {
    port: Port<T>,
}

impl<T: WdfSample> Open<T> {
    pub fn new() -> Self {
        let mut o = Self {
            port: Port::default(),
        };
        o.calc_impedance();
        o
    }
}

impl<T: WdfSample> Default for Open<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: WdfSample> WdfElement<T> for Open<T> {
    #[inline]
    fn port(&self) -> &Port<T> {
        &self.port
    }

    fn calc_impedance(&mut self) {
        self.port.set_resistance(T::from_f64(OPEN_RESISTANCE));
    }

    #[inline]
    fn incident(&mut self, x: T) {
        self.port.a = x;
    }

    #[inline]
    fn reflected(&mut self) -> T {
        self.port.b = self.port.a;
        self.port.b
    }
}

/// Short circuit: `b = -a`, `Rp ≈ 1e-15`.
#[derive(Debug, Clone, Copy)]
pub struct Short<T> {
    port: Port<T>,
}

impl<T: WdfSample> Short<T> {
    pub fn new() -> Self {
        let mut s = Self {
            port: Port::default(),
        };
        s.calc_impedance();
        s
    }
}

impl<T: WdfSample> Default for Short<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: WdfSample> WdfElement<T> for Short<T> {
    #[inline]
    fn port(&self) -> &Port<T> {
        &self.port
    }

    fn calc_impedance(&mut self) {
        self.port.set_resistance(T::from_f64(SHORT_RESISTANCE));
    }

    #[inline]
    fn incident(&mut self, x: T) {
        self.port.a = x;
    }

    #[inline]
    fn reflected(&mut self) -> T {
        self.port.b = -self.port.a;
        self.port.b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::ResistiveVoltageSource;

    #[test]
    fn switch_defaults_closed() {
        let sw = Switch::new(Open::<f64>::new());
        assert!(sw.is_closed());
    }

    #[test]
    fn closed_switch_shorts_the_source() {
        let mut vs = ResistiveVoltageSource::with_resistance(10.0_f64);
        vs.set_voltage(1.0);
        let mut sw = Switch::new(vs);
        sw.process();
        assert!(sw.voltage().abs() < 1e-12);
        assert!((sw.next().current() + 0.1).abs() < 1e-12);

        sw.set_closed(false);
        sw.process();
        assert!((sw.voltage() - 1.0).abs() < 1e-12);
        assert!(sw.next().current().abs() < 1e-12);
    }

    #[test]
    fn open_and_short_reflections() {
        let mut o = Open::<f32>::new();
        o.incident(0.3);
        assert_eq!(o.reflected(), 0.3);
        assert_eq!(o.port_resistance(), 1.0e15);

        let mut s = Short::<f32>::new();
        s.incident(0.3);
        assert_eq!(s.reflected(), -0.3);
    }
}
