//! WDF tree: binary adaptors.
//!
//! Each adaptor joins child one-ports into a single parent one-port whose
//! parent-facing port is reflection-free. Per sample the tree runs in two
//! phases:
//! 1. **reflected**, bottom-up: leaves produce `b`, adaptors combine them.
//! 2. **incident**, top-down: adaptors split the parent's wave between
//!    their children; reactive leaves latch it as next sample's state.
//!
//! The scattering kernels are free functions so the runtime graph in
//! [`crate::circuit`] evaluates exactly the same arithmetic.

use crate::elements::{Port, WdfElement};
use crate::sample::WdfSample;

// ---------------------------------------------------------------------------
// Scattering kernels
// ---------------------------------------------------------------------------

/// Series junction: returns `(Rp, ρ1)` with `Rp = R1 + R2`, `ρ1 = R1 / Rp`.
#[inline]
pub(crate) fn series_impedance<T: WdfSample>(r1: T, r2: T) -> (T, T) {
    let r = r1 + r2;
    (r, r1 / r)
}

/// Series junction, parent side: `b = -(b1 + b2)`.
#[inline]
pub(crate) fn series_reflect<T: WdfSample>(b1: T, b2: T) -> T {
    -(b1 + b2)
}

/// Series junction, child side. Returns the incident waves `(a1, a2)`.
///
/// `a1 = b1 - ρ1 (x + b1 + b2)`, `a2 = -(x + a1)`
#[inline]
pub(crate) fn series_scatter<T: WdfSample>(x: T, b1: T, b2: T, rho1: T) -> (T, T) {
    let a1 = b1 - rho1 * (x + b1 + b2);
    (a1, -(x + a1))
}

/// Parallel junction: returns `(Gp, ρ1)` with `Gp = G1 + G2`, `ρ1 = G1 / Gp`.
#[inline]
pub(crate) fn parallel_admittance<T: WdfSample>(g1: T, g2: T) -> (T, T) {
    let g = g1 + g2;
    (g, g1 / g)
}

/// Parallel junction, parent side. Returns `(b, b_diff, b_temp)`; the last
/// two are cached for [`parallel_scatter`].
#[inline]
pub(crate) fn parallel_reflect<T: WdfSample>(b1: T, b2: T, rho1: T) -> (T, T, T) {
    let b_diff = b2 - b1;
    let b_temp = -(rho1 * b_diff);
    (b2 + b_temp, b_diff, b_temp)
}

/// Parallel junction, child side. Returns `(a1, a2)`.
#[inline]
pub(crate) fn parallel_scatter<T: WdfSample>(x: T, b_diff: T, b_temp: T) -> (T, T) {
    let a2 = x + b_temp;
    (b_diff + a2, a2)
}

/// Affine map of a y-parameter two-port with port 1 terminated by `R1`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct YParameterCoefficients<T> {
    pub(crate) a: T,
    pub(crate) b: T,
    pub(crate) c: T,
}

impl<T: WdfSample> YParameterCoefficients<T> {
    /// Returns the parent port resistance and the `A`, `B`, `C` terms.
    ///
    /// ```text
    /// d  = y22 + R1 y11 y22 - R1 y12 y21
    /// Rp = (R1 y11 + 1) / d
    /// A  = (y22 - y22 R1² y11² + y12 y21 R1² y11) / (d (R1 y11 + 1))
    /// B  = -R1 y12 / (R1 y11 + 1)
    /// C  = -y21 / d
    /// ```
    pub(crate) fn new(y: [[T; 2]; 2], r1: T) -> (T, Self) {
        let denominator = y[1][1] + r1 * y[0][0] * y[1][1] - r1 * y[0][1] * y[1][0];
        let r1_y11_plus_one = r1 * y[0][0] + T::one();
        let r = r1_y11_plus_one / denominator;

        let r_sq = r1 * r1;
        let num1 = -y[1][1] * r_sq * y[0][0] * y[0][0];
        let num2 = y[0][1] * y[1][0] * r_sq * y[0][0];

        let coefs = Self {
            a: (num1 + num2 + y[1][1]) / (denominator * r1_y11_plus_one),
            b: -r1 * y[0][1] / r1_y11_plus_one,
            c: -y[1][0] / denominator,
        };
        (r, coefs)
    }
}

// ---------------------------------------------------------------------------
// Series adaptor
// ---------------------------------------------------------------------------

/// Series adaptor joining two sub-trees.
///
/// Port resistance: `Rp = R1 + R2`
///
/// 3-port series junction (parent port reflection-free):
///   reflected: `b = -(b1 + b2)`
///   incident:  `a1 = b1 - ρ1 (x + b1 + b2)`, `a2 = -(x + a1)`
#[derive(Debug, Clone, Copy)]
pub struct Series<T, P1, P2> {
    port: Port<T>,
    port1: P1,
    port2: P2,
    port1_reflect: T,
}

impl<T: WdfSample, P1: WdfElement<T>, P2: WdfElement<T>> Series<T, P1, P2> {
    pub fn new(port1: P1, port2: P2) -> Self {
        let mut s = Self {
            port: Port::default(),
            port1,
            port2,
            port1_reflect: T::one(),
        };
        s.calc_impedance();
        s
    }

    pub fn port1(&self) -> &P1 {
        &self.port1
    }

    pub fn port2(&self) -> &P2 {
        &self.port2
    }

    /// Mutate the first child; recompute `Rp` if `f` reports a change.
    pub fn update_port1(&mut self, f: impl FnOnce(&mut P1) -> bool) -> bool {
        if f(&mut self.port1) {
            self.calc_impedance();
            true
        } else {
            false
        }
    }

    /// Mutate the second child; recompute `Rp` if `f` reports a change.
    pub fn update_port2(&mut self, f: impl FnOnce(&mut P2) -> bool) -> bool {
        if f(&mut self.port2) {
            self.calc_impedance();
            true
        } else {
            false
        }
    }
}

impl<T: WdfSample, P1: WdfElement<T>, P2: WdfElement<T>> WdfElement<T> for Series<T, P1, P2> {
    #[inline]
    fn port(&self) -> &Port<T> {
        &self.port
    }

    fn calc_impedance(&mut self) {
        let (r, rho1) =
            series_impedance(self.port1.port_resistance(), self.port2.port_resistance());
        self.port.set_resistance(r);
        self.port1_reflect = rho1;
    }

    #[inline]
    fn incident(&mut self, x: T) {
        let (a1, a2) = series_scatter(
            x,
            self.port1.port().b,
            self.port2.port().b,
            self.port1_reflect,
        );
        self.port1.incident(a1);
        self.port2.incident(a2);
        self.port.a = x;
    }

    #[inline]
    fn reflected(&mut self) -> T {
        let b1 = self.port1.reflected();
        let b2 = self.port2.reflected();
        self.port.b = series_reflect(b1, b2);
        self.port.b
    }

    fn reset(&mut self) {
        self.port1.reset();
        self.port2.reset();
    }

    fn snap_to_zero(&mut self) {
        self.port1.snap_to_zero();
        self.port2.snap_to_zero();
    }
}

// ---------------------------------------------------------------------------
// Parallel adaptor
// ---------------------------------------------------------------------------

/// Parallel adaptor joining two sub-trees.
///
/// Port conductance: `Gp = G1 + G2`
///
/// 3-port parallel junction (parent port reflection-free):
///   reflected: `b = b2 - ρ1 (b2 - b1)`
///   incident:  `a2 = x - ρ1 (b2 - b1)`, `a1 = a2 + (b2 - b1)`
#[derive(Debug, Clone, Copy)]
pub struct Parallel<T, P1, P2> {
    port: Port<T>,
    port1: P1,
    port2: P2,
    port1_reflect: T,
    b_temp: T,
    b_diff: T,
}

impl<T: WdfSample, P1: WdfElement<T>, P2: WdfElement<T>> Parallel<T, P1, P2> {
    pub fn new(port1: P1, port2: P2) -> Self {
        let mut p = Self {
            port: Port::default(),
            port1,
            port2,
            port1_reflect: T::one(),
            b_temp: T::zero(),
            b_diff: T::zero(),
        };
        p.calc_impedance();
        p
    }

    pub fn port1(&self) -> &P1 {
        &self.port1
    }

    pub fn port2(&self) -> &P2 {
        &self.port2
    }

    pub fn update_port1(&mut self, f: impl FnOnce(&mut P1) -> bool) -> bool {
        if f(&mut self.port1) {
            self.calc_impedance();
            true
        } else {
            false
        }
    }

    pub fn update_port2(&mut self, f: impl FnOnce(&mut P2) -> bool) -> bool {
        if f(&mut self.port2) {
            self.calc_impedance();
            true
        } else {
            false
        }
    }
}

impl<T: WdfSample, P1: WdfElement<T>, P2: WdfElement<T>> WdfElement<T>
    for Parallel<T, P1, P2>
{
    #[inline]
    fn port(&self) -> &Port<T> {
        &self.port
    }

    fn calc_impedance(&mut self) {
        let (g, rho1) =
            parallel_admittance(self.port1.port_conductance(), self.port2.port_conductance());
        self.port.set_conductance(g);
        self.port1_reflect = rho1;
    }

    #[inline]
    fn incident(&mut self, x: T) {
        let (a1, a2) = parallel_scatter(x, self.b_diff, self.b_temp);
        self.port1.incident(a1);
        self.port2.incident(a2);
        self.port.a = x;
    }

    #[inline]
    fn reflected(&mut self) -> T {
        let b1 = self.port1.reflected();
        let b2 = self.port2.reflected();
        let (b, b_diff, b_temp) = parallel_reflect(b1, b2, self.port1_reflect);
        self.b_diff = b_diff;
        self.b_temp = b_temp;
        self.port.b = b;
        b
    }

    fn reset(&mut self) {
        self.port1.reset();
        self.port2.reset();
        self.b_temp = T::zero();
        self.b_diff = T::zero();
    }

    fn snap_to_zero(&mut self) {
        self.port1.snap_to_zero();
        self.port2.snap_to_zero();
    }
}

// ---------------------------------------------------------------------------
// Polarity inverter
// ---------------------------------------------------------------------------

/// Flips the voltage polarity of its child. `Rp = R1`.
#[derive(Debug, Clone, Copy)]
pub struct PolarityInverter<T, P1> {
    port: Port<T>,
    port1: P1,
}

impl<T: WdfSample, P1: WdfElement<T>> PolarityInverter<T, P1> {
    pub fn new(port1: P1) -> Self {
        let mut p = Self {
            port: Port::default(),
            port1,
        };
        p.calc_impedance();
        p
    }

    pub fn port1(&self) -> &P1 {
        &self.port1
    }

    pub fn update_port1(&mut self, f: impl FnOnce(&mut P1) -> bool) -> bool {
        if f(&mut self.port1) {
            self.calc_impedance();
            true
        } else {
            false
        }
    }
}

impl<T: WdfSample, P1: WdfElement<T>> WdfElement<T> for PolarityInverter<T, P1> {
    #[inline]
    fn port(&self) -> &Port<T> {
        &self.port
    }

    fn calc_impedance(&mut self) {
        self.port.set_resistance(self.port1.port_resistance());
    }

    #[inline]
    fn incident(&mut self, x: T) {
        self.port.a = x;
        self.port1.incident(-x);
    }

    #[inline]
    fn reflected(&mut self) -> T {
        self.port.b = -self.port1.reflected();
        self.port.b
    }

    fn reset(&mut self) {
        self.port1.reset();
    }

    fn snap_to_zero(&mut self) {
        self.port1.snap_to_zero();
    }
}

// ---------------------------------------------------------------------------
// Y-parameter two-port
// ---------------------------------------------------------------------------

/// Two-port described by its short-circuit admittance matrix, with port 1
/// terminated by the child element.
///
/// ```text
/// i1 = y11 v1 + y12 v2
/// i2 = y21 v1 + y22 v2
/// ```
#[derive(Debug, Clone, Copy)]
pub struct YParameter<T, P1> {
    port: Port<T>,
    port1: P1,
    y: [[T; 2]; 2],
    coefs: YParameterCoefficients<T>,
}

impl<T: WdfSample, P1: WdfElement<T>> YParameter<T, P1> {
    pub fn new(port1: P1, y11: T, y12: T, y21: T, y22: T) -> Self {
        let mut p = Self {
            port: Port::default(),
            port1,
            y: [[y11, y12], [y21, y22]],
            coefs: YParameterCoefficients {
                a: T::one(),
                b: T::one(),
                c: T::one(),
            },
        };
        p.calc_impedance();
        p
    }

    pub fn port1(&self) -> &P1 {
        &self.port1
    }

    pub fn y_parameters(&self) -> [[T; 2]; 2] {
        self.y
    }

    pub fn set_y_parameters(&mut self, y11: T, y12: T, y21: T, y22: T) -> bool {
        let y = [[y11, y12], [y21, y22]];
        if y.iter()
            .flatten()
            .zip(self.y.iter().flatten())
            .all(|(new, old)| new.all_eq(*old))
        {
            return false;
        }
        self.y = y;
        self.calc_impedance();
        true
    }

    pub fn update_port1(&mut self, f: impl FnOnce(&mut P1) -> bool) -> bool {
        if f(&mut self.port1) {
            self.calc_impedance();
            true
        } else {
            false
        }
    }
}

impl<T: WdfSample, P1: WdfElement<T>> WdfElement<T> for YParameter<T, P1> {
    #[inline]
    fn port(&self) -> &Port<T> {
        &self.port
    }

    fn calc_impedance(&mut self) {
        let (r, coefs) = YParameterCoefficients::new(self.y, self.port1.port_resistance());
        self.port.set_resistance(r);
        self.coefs = coefs;
    }

    #[inline]
    fn incident(&mut self, x: T) {
        self.port.a = x;
        let b1 = self.port1.port().b;
        self.port1.incident(self.coefs.a * b1 + self.coefs.b * x);
    }

    #[inline]
    fn reflected(&mut self) -> T {
        self.port.b = self.coefs.c * self.port1.reflected();
        self.port.b
    }

    fn reset(&mut self) {
        self.port1.reset();
    }

    fn snap_to_zero(&mut self) {
        self.port1.snap_to_zero();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
