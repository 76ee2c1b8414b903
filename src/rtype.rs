//! R-type N-port adaptor driven by a caller-supplied scattering matrix.
//!
//! Covers junctions that do not decompose into series/parallel pairs
//! (bridges, multi-diode networks). Two variants:
//!
//! - [`RtypeAdaptor`]: adaptable, with one upward port at `up_port_index`
//!   whose resistance comes from an impedance calculator
//! - [`RootRtypeAdaptor`]: terminates a tree; every port faces a child
//!
//! Matrix indices count the upward port; child `i` sits at matrix index
//! `i` below the upward port and `i + 1` above it. The matrix is not checked
//! for passivity.

use std::fmt;

use crate::elements::{Port, WdfElement};
use crate::sample::WdfSample;

/// Largest child tuple accepted by [`PortSet`].
pub const MAX_TUPLE_PORTS: usize = 8;

// ---------------------------------------------------------------------------
// Kernels shared with the runtime graph
// ---------------------------------------------------------------------------

/// One row of `b = S·a`, accumulated left to right.
#[inline]
pub(crate) fn scatter_row<T: WdfSample>(row: &[T], a: &[T]) -> T {
    row.iter()
        .zip(a)
        .fold(T::zero(), |acc, (&s, &x)| acc + s * x)
}

/// Row `up` of `b = S·a`, skipping the column of the upward port itself.
#[inline]
pub(crate) fn scatter_up_row<T: WdfSample>(row: &[T], a: &[T], up: usize) -> T {
    row.iter()
        .zip(a)
        .enumerate()
        .filter(|(j, _)| *j != up)
        .fold(T::zero(), |acc, (_, (&s, &x))| acc + s * x)
}

/// Matrix index of child port `i` when the upward port sits at `up`.
#[inline(always)]
pub(crate) fn matrix_index(i: usize, up: usize) -> usize {
    if i < up {
        i
    } else {
        i + 1
    }
}

// ---------------------------------------------------------------------------
// Child port sets
// ---------------------------------------------------------------------------

/// Fixed set of child one-ports owned by an R-type adaptor.
///
/// Implemented for tuples `(P0,)` through `(P0, .., P7)`. Children are
/// addressed in tuple order.
pub trait PortSet<T: WdfSample> {
    const COUNT: usize;

    /// Write each child's port resistance into `out[..COUNT]`.
    fn impedances(&self, out: &mut [T]);

    /// Collect each child's reflected wave into `out[..COUNT]`.
    fn reflected(&mut self, out: &mut [T]);

    /// Hand `waves[i]` to child `i`.
    fn incident(&mut self, waves: &[T]);

    fn reset(&mut self);

    fn snap_to_zero(&mut self);
}

macro_rules! impl_port_set {
    ($count:expr; $($p:ident $idx:tt),+) => {
        impl<T: WdfSample, $($p: WdfElement<T>),+> PortSet<T> for ($($p,)+) {
            const COUNT: usize = $count;

            #[inline]
            fn impedances(&self, out: &mut [T]) {
                $(out[$idx] = self.$idx.port_resistance();)+
            }

            #[inline]
            fn reflected(&mut self, out: &mut [T]) {
                $(out[$idx] = self.$idx.reflected();)+
            }

            #[inline]
            fn incident(&mut self, waves: &[T]) {
                $(self.$idx.incident(waves[$idx]);)+
            }

            fn reset(&mut self) {
                $(self.$idx.reset();)+
            }

            fn snap_to_zero(&mut self) {
                $(self.$idx.snap_to_zero();)+
            }
        }
    };
}

impl_port_set!(1; P0 0);
impl_port_set!(2; P0 0, P1 1);
impl_port_set!(3; P0 0, P1 1, P2 2);
impl_port_set!(4; P0 0, P1 1, P2 2, P3 3);
impl_port_set!(5; P0 0, P1 1, P2 2, P3 3, P4 4);
impl_port_set!(6; P0 0, P1 1, P2 2, P3 3, P4 4, P5 5);
impl_port_set!(7; P0 0, P1 1, P2 2, P3 3, P4 4, P5 5, P6 6);
impl_port_set!(8; P0 0, P1 1, P2 2, P3 3, P4 4, P5 5, P6 6, P7 7);

/// Derives the upward port resistance from the child port resistances,
/// optionally rewriting the scattering matrix to stay adapted.
pub type ImpedanceCalculator<T, const N: usize> =
    Box<dyn FnMut(&[T], &mut [[T; N]; N]) -> T + Send>;

/// Rewrites a root adaptor's scattering matrix from the child resistances.
pub type MatrixCalculator<T, const N: usize> = Box<dyn FnMut(&[T], &mut [[T; N]; N]) + Send>;

// ---------------------------------------------------------------------------
// Adaptable R-type
// ---------------------------------------------------------------------------

/// R-type adaptor with one upward-facing, reflection-free port.
///
/// `N` is the full matrix size, children plus the upward port. The entry
/// `S[up][up]` must be zero for the upward port to be reflection-free.
pub struct RtypeAdaptor<T, C, const N: usize> {
    port: Port<T>,
    ports: C,
    up_port_index: usize,
    s: [[T; N]; N],
    a: [T; N],
    b: [T; N],
    down: [T; N],
    calculator: ImpedanceCalculator<T, N>,
}

impl<T: WdfSample, C: PortSet<T>, const N: usize> RtypeAdaptor<T, C, N> {
    /// Build the adaptor and run `calculator` once to fix the upward port.
    pub fn new(
        ports: C,
        up_port_index: usize,
        calculator: impl FnMut(&[T], &mut [[T; N]; N]) -> T + Send + 'static,
    ) -> Self {
        debug_assert_eq!(C::COUNT + 1, N, "matrix size must be child count + 1");
        debug_assert!(up_port_index < N, "up port index {up_port_index} out of range");
        let mut adaptor = Self {
            port: Port::default(),
            ports,
            up_port_index,
            s: [[T::zero(); N]; N],
            a: [T::zero(); N],
            b: [T::zero(); N],
            down: [T::zero(); N],
            calculator: Box::new(calculator),
        };
        adaptor.calc_impedance();
        adaptor
    }

    pub fn ports(&self) -> &C {
        &self.ports
    }

    pub fn up_port_index(&self) -> usize {
        self.up_port_index
    }

    pub fn s_matrix(&self) -> &[[T; N]; N] {
        &self.s
    }

    /// Replace the scattering matrix. The upward resistance is unchanged.
    pub fn set_s_matrix_data(&mut self, s: [[T; N]; N]) {
        self.s = s;
    }

    /// Mutate the children; re-run the impedance calculator if `f` reports
    /// a change.
    pub fn update_ports(&mut self, f: impl FnOnce(&mut C) -> bool) -> bool {
        if f(&mut self.ports) {
            self.calc_impedance();
            true
        } else {
            false
        }
    }
}

impl<T: WdfSample, C: PortSet<T>, const N: usize> WdfElement<T> for RtypeAdaptor<T, C, N> {
    #[inline]
    fn port(&self) -> &Port<T> {
        &self.port
    }

    fn calc_impedance(&mut self) {
        self.ports.impedances(&mut self.down[..C::COUNT]);
        let r = (self.calculator)(&self.down[..C::COUNT], &mut self.s);
        self.port.set_resistance(r);
    }

    #[inline]
    fn incident(&mut self, x: T) {
        let up = self.up_port_index;
        self.port.a = x;
        self.a[up] = x;
        for (b, row) in self.b.iter_mut().zip(&self.s) {
            *b = scatter_row(row, &self.a);
        }
        for i in 0..C::COUNT {
            self.down[i] = self.b[matrix_index(i, up)];
        }
        self.ports.incident(&self.down[..C::COUNT]);
    }

    #[inline]
    fn reflected(&mut self) -> T {
        let up = self.up_port_index;
        self.ports.reflected(&mut self.down[..C::COUNT]);
        for i in 0..C::COUNT {
            self.a[matrix_index(i, up)] = self.down[i];
        }
        self.port.b = scatter_up_row(&self.s[up], &self.a, up);
        self.port.b
    }

    fn reset(&mut self) {
        self.ports.reset();
        self.a = [T::zero(); N];
        self.b = [T::zero(); N];
    }

    fn snap_to_zero(&mut self) {
        self.ports.snap_to_zero();
    }
}

impl<T: fmt::Debug, C: fmt::Debug, const N: usize> fmt::Debug for RtypeAdaptor<T, C, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtypeAdaptor")
            .field("port", &self.port)
            .field("ports", &self.ports)
            .field("up_port_index", &self.up_port_index)
            .field("s", &self.s)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Root R-type
// ---------------------------------------------------------------------------

/// R-type adaptor terminating a tree: all `N` ports face children.
pub struct RootRtypeAdaptor<T, C, const N: usize> {
    ports: C,
    s: [[T; N]; N],
    a: [T; N],
    b: [T; N],
    calculator: Option<MatrixCalculator<T, N>>,
}

impl<T: WdfSample, C: PortSet<T>, const N: usize> RootRtypeAdaptor<T, C, N> {
    pub fn new(ports: C, s: [[T; N]; N]) -> Self {
        debug_assert_eq!(C::COUNT, N, "matrix size must equal child count");
        Self {
            ports,
            s,
            a: [T::zero(); N],
            b: [T::zero(); N],
            calculator: None,
        }
    }

    /// Root whose matrix is re-derived whenever a child resistance changes.
    pub fn with_matrix_calculator(
        ports: C,
        calculator: impl FnMut(&[T], &mut [[T; N]; N]) + Send + 'static,
    ) -> Self {
        let mut root = Self::new(ports, [[T::zero(); N]; N]);
        root.calculator = Some(Box::new(calculator));
        root.calc_impedance();
        root
    }

    pub fn ports(&self) -> &C {
        &self.ports
    }

    pub fn s_matrix(&self) -> &[[T; N]; N] {
        &self.s
    }

    pub fn set_s_matrix_data(&mut self, s: [[T; N]; N]) {
        self.s = s;
    }

    pub fn update_ports(&mut self, f: impl FnOnce(&mut C) -> bool) -> bool {
        if f(&mut self.ports) {
            self.calc_impedance();
            true
        } else {
            false
        }
    }

    /// Re-run the matrix calculator, if any, against the current children.
    pub fn calc_impedance(&mut self) {
        if let Some(calculator) = self.calculator.as_mut() {
            self.ports.impedances(&mut self.a);
            calculator(&self.a, &mut self.s);
        }
    }

    /// Run one sample: gather child reflections, scatter, hand the result
    /// back down.
    #[inline]
    pub fn compute(&mut self) {
        self.ports.reflected(&mut self.a);
        for (b, row) in self.b.iter_mut().zip(&self.s) {
            *b = scatter_row(row, &self.a);
        }
        self.ports.incident(&self.b);
    }

    pub fn reset(&mut self) {
        self.ports.reset();
        self.a = [T::zero(); N];
        self.b = [T::zero(); N];
    }

    pub fn snap_to_zero(&mut self) {
        self.ports.snap_to_zero();
    }
}

impl<T: fmt::Debug, C: fmt::Debug, const N: usize> fmt::Debug for RootRtypeAdaptor<T, C, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootRtypeAdaptor")
            .field("ports", &self.ports)
            .field("s", &self.s)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
