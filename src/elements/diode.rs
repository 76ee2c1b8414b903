//! Diode WDF root elements solved in closed form with the Wright Omega
//! function.
//!
//! Includes single diode and anti-parallel diode pair configurations.
//!
//! References: K. J. Werner et al., "An Improved and Generalized Diode Clipper
//! Model for Wave Digital Filters" (single diode, eqn 10), and R. C. D. Paiva
//! et al. / S. D'Angelo et al. for the diode pair (eqns 18 and 39).

use super::{Port, WdfElement, WdfRoot};
use crate::sample::WdfSample;

/// Thermal voltage at room temperature (V).
pub const THERMAL_VOLTAGE: f64 = 25.85e-3;

// ---------------------------------------------------------------------------
// Diode Models
// ---------------------------------------------------------------------------

/// Diode model parameters derived from the Shockley equation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiodeModel {
    /// Saturation current (A).
    pub is: f64,
    /// Thermal voltage * ideality factor (V).
    pub n_vt: f64,
}

impl DiodeModel {
    /// Generic silicon diode, 1N914/1N4148 family.
    pub fn silicon() -> Self {
        // 1N4148 datasheet fit: Is ≈ 2.52nA, n ≈ 1.752
        Self {
            is: 2.52e-9,
            n_vt: 1.752 * THERMAL_VOLTAGE,
        }
    }

    /// 1N914, fast switching silicon diode.
    pub fn _1n914() -> Self {
        Self {
            is: 3.44e-9,
            n_vt: 1.80 * THERMAL_VOLTAGE,
        }
    }

    /// 1N4001, rectifier with a softer knee than signal diodes.
    pub fn _1n4001() -> Self {
        Self {
            is: 14.11e-9,
            n_vt: 1.984 * THERMAL_VOLTAGE,
        }
    }

    /// Generic germanium diode, lower forward voltage, earlier clipping.
    pub fn germanium() -> Self {
        Self {
            is: 1e-6,
            n_vt: 1.3 * THERMAL_VOLTAGE,
        }
    }

    /// 1N34A, germanium point-contact diode.
    pub fn _1n34a() -> Self {
        Self {
            is: 2.0e-6,
            n_vt: 1.25 * THERMAL_VOLTAGE,
        }
    }

    /// Red LED, Vf ≈ 1.7V at 10mA.
    pub fn led() -> Self {
        Self {
            is: 4.5e-17,
            n_vt: 2.0 * THERMAL_VOLTAGE,
        }
    }
}

impl Default for DiodeModel {
    fn default() -> Self {
        Self::silicon()
    }
}

/// Accuracy/cost tradeoff for [`DiodePair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiodeQuality {
    /// One ω4 evaluation per sample; assumes one diode is fully off.
    Good,
    /// Two ω4 evaluations per sample; models both diodes.
    #[default]
    Best,
}

// ---------------------------------------------------------------------------
// Closed-form solver
// ---------------------------------------------------------------------------

/// Precomputed diode terms plus the closed-form reflection.
///
/// Used by both the compile-time roots below and the runtime graph.
#[derive(Debug, Clone, Copy)]
pub struct DiodeSolver<T> {
    is: T,
    vt: T,
    two_vt: T,
    one_over_vt: T,
    r_is: T,
    two_r_is: T,
    r_is_over_vt: T,
    log_r_is_over_vt: T,
}

impl<T: WdfSample> DiodeSolver<T> {
    /// `vt` is the per-diode thermal voltage; `n_diodes` series diodes scale it.
    pub fn new(is: T, vt: T, n_diodes: T) -> Self {
        let mut s = Self {
            is,
            vt,
            two_vt: T::zero(),
            one_over_vt: T::zero(),
            r_is: T::zero(),
            two_r_is: T::zero(),
            r_is_over_vt: T::zero(),
            log_r_is_over_vt: T::zero(),
        };
        s.set_parameters(is, vt, n_diodes);
        s
    }

    pub fn saturation_current(&self) -> T {
        self.is
    }

    /// Effective thermal voltage (`n_diodes * Vt`).
    pub fn thermal_voltage(&self) -> T {
        self.vt
    }

    /// Set `Is`, `Vt` and the number of series diodes. Call
    /// [`prepare`](Self::prepare) afterwards with the port resistance.
    pub fn set_parameters(&mut self, is: T, vt: T, n_diodes: T) {
        debug_assert!(is.all_positive(), "saturation current must be positive");
        debug_assert!(vt.all_positive(), "thermal voltage must be positive");
        self.is = is;
        self.vt = n_diodes * vt;
        self.two_vt = T::from_f64(2.0) * self.vt;
        self.one_over_vt = self.vt.recip();
    }

    /// Recompute the impedance-dependent terms for port resistance `r`.
    pub fn prepare(&mut self, r: T) {
        self.r_is = r * self.is;
        self.two_r_is = T::from_f64(2.0) * self.r_is;
        self.r_is_over_vt = self.r_is * self.one_over_vt;
        self.log_r_is_over_vt = self.r_is_over_vt.ln();
    }

    /// Single diode, `b = a + 2·R·Is − 2·Vt·ω4(ln(R·Is/Vt) + a/Vt + R·Is/Vt)`.
    #[inline]
    pub fn diode(&self, a: T) -> T {
        a + self.two_r_is
            - self.two_vt
                * (self.log_r_is_over_vt + a * self.one_over_vt + self.r_is_over_vt).omega4()
    }

    /// Anti-parallel pair, folding the bipolar case with `λ = sign(a)`.
    #[inline]
    pub fn diode_pair(&self, a: T, quality: DiodeQuality) -> T {
        let lambda = a.signum();
        match quality {
            DiodeQuality::Good => {
                a + T::from_f64(2.0)
                    * lambda
                    * (self.r_is
                        - self.vt
                            * (self.log_r_is_over_vt
                                + lambda * a * self.one_over_vt
                                + self.r_is_over_vt)
                                .omega4())
            }
            DiodeQuality::Best => {
                let lambda_a_over_vt = lambda * a * self.one_over_vt;
                a - self.two_vt
                    * lambda
                    * ((self.log_r_is_over_vt + lambda_a_over_vt).omega4()
                        - (self.log_r_is_over_vt - lambda_a_over_vt).omega4())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Diode (root)
// ---------------------------------------------------------------------------

/// Single diode terminating a tree.
#[derive(Debug, Clone, Copy)]
pub struct Diode<T, N> {
    port: Port<T>,
    next: N,
    solver: DiodeSolver<T>,
}

impl<T: WdfSample, N: WdfElement<T>> Diode<T, N> {
    /// Diode with saturation current `is` at room-temperature `Vt`.
    pub fn new(next: N, is: T) -> Self {
        Self::with_parameters(next, is, T::from_f64(THERMAL_VOLTAGE), T::one())
    }

    pub fn with_parameters(next: N, is: T, vt: T, n_diodes: T) -> Self {
        let mut d = Self {
            port: Port::default(),
            next,
            solver: DiodeSolver::new(is, vt, n_diodes),
        };
        d.calc_impedance();
        d
    }

    pub fn from_model(next: N, model: DiodeModel) -> Self {
        Self::with_parameters(next, T::from_f64(model.is), T::from_f64(model.n_vt), T::one())
    }

    pub fn solver(&self) -> &DiodeSolver<T> {
        &self.solver
    }

    pub fn set_diode_parameters(&mut self, is: T, vt: T, n_diodes: T) {
        self.solver.set_parameters(is, vt, n_diodes);
        self.calc_impedance();
    }
}

impl<T: WdfSample, N: WdfElement<T>> WdfRoot<T> for Diode<T, N> {
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
        self.solver.prepare(self.next.port_resistance());
    }

    #[inline]
    fn incident(&mut self, x: T) {
        self.port.a = x;
    }

    #[inline]
    fn reflected(&mut self) -> T {
        self.port.b = self.solver.diode(self.port.a);
        self.port.b
    }
}

// ---------------------------------------------------------------------------
// Diode pair (root)
// ---------------------------------------------------------------------------

/// Anti-parallel diode pair terminating a tree.
#[derive(Debug, Clone, Copy)]
pub struct DiodePair<T, N> {
    port: Port<T>,
    next: N,
    solver: DiodeSolver<T>,
    quality: DiodeQuality,
}

impl<T: WdfSample, N: WdfElement<T>> DiodePair<T, N> {
    pub fn new(next: N, is: T) -> Self {
        Self::with_parameters(next, is, T::from_f64(THERMAL_VOLTAGE), T::one())
    }

    pub fn with_parameters(next: N, is: T, vt: T, n_diodes: T) -> Self {
        let mut d = Self {
            port: Port::default(),
            next,
            solver: DiodeSolver::new(is, vt, n_diodes),
            quality: DiodeQuality::default(),
        };
        d.calc_impedance();
        d
    }

    pub fn from_model(next: N, model: DiodeModel) -> Self {
        Self::with_parameters(next, T::from_f64(model.is), T::from_f64(model.n_vt), T::one())
    }

    pub fn with_quality(mut self, quality: DiodeQuality) -> Self {
        self.quality = quality;
        self
    }

    pub fn quality(&self) -> DiodeQuality {
        self.quality
    }

    pub fn set_quality(&mut self, quality: DiodeQuality) {
        self.quality = quality;
    }

    pub fn solver(&self) -> &DiodeSolver<T> {
        &self.solver
    }

    pub fn set_diode_parameters(&mut self, is: T, vt: T, n_diodes: T) {
        self.solver.set_parameters(is, vt, n_diodes);
        self.calc_impedance();
    }
}

impl<T: WdfSample, N: WdfElement<T>> WdfRoot<T> for DiodePair<T, N> {
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
        self.solver.prepare(self.next.port_resistance());
    }

    #[inline]
    fn incident(&mut self, x: T) {
        self.port.a = x;
    }

    #[inline]
    fn reflected(&mut self) -> T {
        self.port.b = self.solver.diode_pair(self.port.a, self.quality);
        self.port.b
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
