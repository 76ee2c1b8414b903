//! WDF circuit elements: capability traits and one-port implementations.
//!
//! - [`WdfElement`]: adaptable one-port, covering leaves (R, C, L, resistive sources)
//!   and the adaptors in [`crate::tree`] / [`crate::rtype`]
//! - [`WdfRoot`]: non-adaptable element terminating a tree (ideal sources,
//!   switch, diodes); owns the subtree below it
//!
//! Both the compile-time graph (elements nested by value) and the runtime
//! graph in [`crate::circuit`] expose the same capability set.

mod diode;
mod linear;
mod sources;
mod switches;

pub use diode::*;
pub use linear::*;
pub use sources::*;
pub use switches::*;

use crate::sample::WdfSample;

/// Port resistance given to roots and fresh elements before their first
/// impedance computation.
pub const DEFAULT_PORT_RESISTANCE: f64 = 1.0e-9;

// ---------------------------------------------------------------------------
// Wave port
// ---------------------------------------------------------------------------

/// Wave variables and reference resistance at an element's upward port.
///
/// `v = (a + b) / 2`, `i = (a - b) / (2R)`
#[derive(Debug, Clone, Copy)]
pub struct Port<T> {
    /// Port resistance (Ω).
    pub r: T,
    /// Port conductance, `1 / r`.
    pub g: T,
    /// Incident wave.
    pub a: T,
    /// Reflected wave.
    pub b: T,
}

impl<T: WdfSample> Default for Port<T> {
    fn default() -> Self {
        Self::with_resistance(T::from_f64(DEFAULT_PORT_RESISTANCE))
    }
}

impl<T: WdfSample> Port<T> {
    pub fn with_resistance(r: T) -> Self {
        let mut port = Self {
            r,
            g: T::one(),
            a: T::zero(),
            b: T::zero(),
        };
        port.set_resistance(r);
        port
    }

    /// Set `R` and keep `G` consistent.
    #[inline]
    pub fn set_resistance(&mut self, r: T) {
        debug_assert!(r.all_positive(), "port resistance must be positive: {r:?}");
        self.r = r;
        self.g = r.recip();
    }

    /// Set `G` and keep `R` consistent.
    #[inline]
    pub fn set_conductance(&mut self, g: T) {
        debug_assert!(g.all_positive(), "port conductance must be positive: {g:?}");
        self.g = g;
        self.r = g.recip();
    }

    #[inline]
    pub fn voltage(&self) -> T {
        (self.a + self.b) * T::from_f64(0.5)
    }

    #[inline]
    pub fn current(&self) -> T {
        (self.a - self.b) * (T::from_f64(0.5) * self.g)
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Adaptable WDF one-port.
///
/// Per sample the parent calls [`reflected`](Self::reflected) on the way up
/// and [`incident`](Self::incident) on the way down. `reflected` never depends
/// on the incident wave of the same sample (reflection-free port).
pub trait WdfElement<T: WdfSample> {
    /// Wave variables and port resistance.
    fn port(&self) -> &Port<T>;

    /// Recompute the port resistance from component values and children.
    fn calc_impedance(&mut self);

    /// Accept the incident wave from the parent.
    fn incident(&mut self, x: T);

    /// Produce the reflected wave for the parent.
    fn reflected(&mut self) -> T;

    /// Clear reactive state.
    fn reset(&mut self) {}

    /// Flush denormal-range reactive state to zero.
    fn snap_to_zero(&mut self) {}

    #[inline]
    fn port_resistance(&self) -> T {
        self.port().r
    }

    #[inline]
    fn port_conductance(&self) -> T {
        self.port().g
    }

    /// Voltage across the element, `(a + b) / 2`.
    #[inline]
    fn voltage(&self) -> T {
        self.port().voltage()
    }

    /// Current through the element, `(a - b) / (2R)`.
    #[inline]
    fn current(&self) -> T {
        self.port().current()
    }
}

/// Non-adaptable element terminating a WDF tree.
///
/// Roots own the subtree below them. Component changes inside the subtree go
/// through [`update_next`](Self::update_next) so the root can re-read the
/// subtree's port resistance.
pub trait WdfRoot<T: WdfSample> {
    type Next: WdfElement<T>;

    fn port(&self) -> &Port<T>;

    fn next(&self) -> &Self::Next;

    /// Mutate the subtree. When `f` reports an impedance change, the root
    /// recomputes its own precomputed terms and returns `true`.
    fn update_next(&mut self, f: impl FnOnce(&mut Self::Next) -> bool) -> bool;

    /// Re-read `next`'s port resistance.
    fn calc_impedance(&mut self);

    fn incident(&mut self, x: T);

    fn reflected(&mut self) -> T;

    /// Run one sample: waves up from the subtree, then back down.
    #[inline]
    fn process(&mut self) {
        let mut up = T::zero();
        self.update_next(|next| {
            up = next.reflected();
            false
        });
        self.incident(up);
        let down = self.reflected();
        self.update_next(|next| {
            next.incident(down);
            false
        });
    }

    fn reset(&mut self) {
        self.update_next(|next| {
            next.reset();
            false
        });
    }

    fn snap_to_zero(&mut self) {
        self.update_next(|next| {
            next.snap_to_zero();
            false
        });
    }

    #[inline]
    fn voltage(&self) -> T {
        self.port().voltage()
    }

    /// Current through the root, referenced to `next`'s port resistance.
    #[inline]
    fn current(&self) -> T {
        let port = self.port();
        (port.a - port.b) * (T::from_f64(0.5) * self.next().port_conductance())
    }
}

/// Probe the voltage across any adaptable element.
#[inline]
pub fn voltage<T: WdfSample, E: WdfElement<T> + ?Sized>(element: &E) -> T {
    element.voltage()
}

/// Probe the current through any adaptable element.
#[inline]
pub fn current<T: WdfSample, E: WdfElement<T> + ?Sized>(element: &E) -> T {
    element.current()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
