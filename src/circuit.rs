//! Runtime WDF graph for topologies assembled at setup time.
//!
//! [`Circuit`] owns every element in an arena and wires them by [`NodeId`].
//! Each node records the id of its parent; a value change walks those ids
//! up to the root, recomputing port resistances on the way. Per-sample
//! arithmetic goes through the same kernels as the compile-time adaptors in
//! [`crate::tree`] and [`crate::rtype`], so a runtime graph and the
//! equivalent nested graph produce the same output.
//!
//! ```
//! use wavekernel::circuit::Circuit;
//!
//! let mut c = Circuit::<f64>::new();
//! let r1 = c.add_resistor(10_000.0).unwrap();
//! let r2 = c.add_resistor(10_000.0).unwrap();
//! let s = c.add_series(r1, r2).unwrap();
//! let inv = c.add_inverter(s).unwrap();
//! let vs = c.add_ideal_voltage_source(inv).unwrap();
//!
//! c.set_voltage(vs, 10.0).unwrap();
//! c.process(vs).unwrap();
//! assert_eq!(c.voltage(r2).unwrap(), 5.0);
//! ```

use std::fmt;

use tracing::{debug, trace};

use crate::elements::{
    Capacitor, CapacitorAlpha, DiodeQuality, DiodeSolver, Inductor, InductorAlpha, Open, Port,
    ResistiveCurrentSource, ResistiveVoltageSource, Resistor, Short, WdfElement,
};
use crate::error::{Result, WdfError};
use crate::rtype::{matrix_index, scatter_row, scatter_up_row};
use crate::sample::{ScalarFloat, WdfSample};
use crate::tree::{
    parallel_admittance, parallel_reflect, parallel_scatter, series_impedance, series_reflect,
    series_scatter, YParameterCoefficients,
};

/// Index of a node inside its [`Circuit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Runtime R-type calculator: child resistances in, row-major `S` to
/// rewrite, upward port resistance out.
pub type RtypeCalculator<T> = Box<dyn FnMut(&[T], &mut [T]) -> T + Send>;

/// Runtime root R-type calculator: child resistances in, row-major `S` to
/// rewrite.
pub type RootRtypeCalculator<T> = Box<dyn FnMut(&[T], &mut [T]) + Send>;

// ═══════════════════════════════════════════════════════════════════════════
// Node storage
// ═══════════════════════════════════════════════════════════════════════════

/// A node in the arena. Leaves embed the compile-time element; adaptors and
/// roots refer to their children by id.
enum NodeKind<T> {
    Resistor(Resistor<T>),
    Capacitor(Capacitor<T>),
    CapacitorAlpha(CapacitorAlpha<T>),
    Inductor(Inductor<T>),
    InductorAlpha(InductorAlpha<T>),
    ResistiveVoltageSource(ResistiveVoltageSource<T>),
    ResistiveCurrentSource(ResistiveCurrentSource<T>),
    Open(Open<T>),
    Short(Short<T>),
    Series {
        port: Port<T>,
        p1: NodeId,
        p2: NodeId,
        rho1: T,
    },
    Parallel {
        port: Port<T>,
        p1: NodeId,
        p2: NodeId,
        rho1: T,
        b_diff: T,
        b_temp: T,
    },
    Inverter {
        port: Port<T>,
        p1: NodeId,
    },
    YParameter {
        port: Port<T>,
        p1: NodeId,
        y: [[T; 2]; 2],
        coefs: YParameterCoefficients<T>,
    },
    Rtype {
        port: Port<T>,
        ports: Vec<NodeId>,
        up: usize,
        /// Row-major `n × n`, `n = ports.len() + 1`.
        s: Vec<T>,
        a: Vec<T>,
        b: Vec<T>,
        r: Vec<T>,
        calculator: RtypeCalculator<T>,
    },
    IdealVoltageSource {
        port: Port<T>,
        next: NodeId,
        vs: T,
    },
    IdealCurrentSource {
        port: Port<T>,
        next: NodeId,
        is: T,
        two_r: T,
        two_r_is: T,
    },
    Switch {
        port: Port<T>,
        next: NodeId,
        closed: bool,
    },
    Diode {
        port: Port<T>,
        next: NodeId,
        solver: DiodeSolver<T>,
    },
    DiodePair {
        port: Port<T>,
        next: NodeId,
        solver: DiodeSolver<T>,
        quality: DiodeQuality,
    },
    RootRtype {
        port: Port<T>,
        ports: Vec<NodeId>,
        s: Vec<T>,
        a: Vec<T>,
        b: Vec<T>,
        r: Vec<T>,
        calculator: Option<RootRtypeCalculator<T>>,
    },
    /// Placeholder while a node is lifted out of the arena during traversal.
    Detached(Port<T>),
}

impl<T: WdfSample> NodeKind<T> {
    fn name(&self) -> &'static str {
        match self {
            Self::Resistor(_) => "resistor",
            Self::Capacitor(_) => "capacitor",
            Self::CapacitorAlpha(_) => "capacitor_alpha",
            Self::Inductor(_) => "inductor",
            Self::InductorAlpha(_) => "inductor_alpha",
            Self::ResistiveVoltageSource(_) => "resistive_voltage_source",
            Self::ResistiveCurrentSource(_) => "resistive_current_source",
            Self::Open(_) => "open",
            Self::Short(_) => "short",
            Self::Series { .. } => "series",
            Self::Parallel { .. } => "parallel",
            Self::Inverter { .. } => "inverter",
            Self::YParameter { .. } => "y_parameter",
            Self::Rtype { .. } => "rtype",
            Self::IdealVoltageSource { .. } => "ideal_voltage_source",
            Self::IdealCurrentSource { .. } => "ideal_current_source",
            Self::Switch { .. } => "switch",
            Self::Diode { .. } => "diode",
            Self::DiodePair { .. } => "diode_pair",
            Self::RootRtype { .. } => "root_rtype",
            Self::Detached(_) => "detached",
        }
    }

    fn is_root(&self) -> bool {
        matches!(
            self,
            Self::IdealVoltageSource { .. }
                | Self::IdealCurrentSource { .. }
                | Self::Switch { .. }
                | Self::Diode { .. }
                | Self::DiodePair { .. }
                | Self::RootRtype { .. }
        )
    }

    /// Child of a single-port root.
    fn next(&self) -> Option<NodeId> {
        match self {
            Self::IdealVoltageSource { next, .. }
            | Self::IdealCurrentSource { next, .. }
            | Self::Switch { next, .. }
            | Self::Diode { next, .. }
            | Self::DiodePair { next, .. } => Some(*next),
            _ => None,
        }
    }

    fn as_leaf_mut(&mut self) -> Option<&mut dyn WdfElement<T>> {
        let leaf: &mut dyn WdfElement<T> = match self {
            Self::Resistor(e) => e,
            Self::Capacitor(e) => e,
            Self::CapacitorAlpha(e) => e,
            Self::Inductor(e) => e,
            Self::InductorAlpha(e) => e,
            Self::ResistiveVoltageSource(e) => e,
            Self::ResistiveCurrentSource(e) => e,
            Self::Open(e) => e,
            Self::Short(e) => e,
            _ => return None,
        };
        Some(leaf)
    }

    fn port(&self) -> &Port<T> {
        match self {
            Self::Resistor(e) => e.port(),
            Self::Capacitor(e) => e.port(),
            Self::CapacitorAlpha(e) => e.port(),
            Self::Inductor(e) => e.port(),
            Self::InductorAlpha(e) => e.port(),
            Self::ResistiveVoltageSource(e) => e.port(),
            Self::ResistiveCurrentSource(e) => e.port(),
            Self::Open(e) => e.port(),
            Self::Short(e) => e.port(),
            Self::Series { port, .. }
            | Self::Parallel { port, .. }
            | Self::Inverter { port, .. }
            | Self::YParameter { port, .. }
            | Self::Rtype { port, .. }
            | Self::IdealVoltageSource { port, .. }
            | Self::IdealCurrentSource { port, .. }
            | Self::Switch { port, .. }
            | Self::Diode { port, .. }
            | Self::DiodePair { port, .. }
            | Self::RootRtype { port, .. }
            | Self::Detached(port) => port,
        }
    }

    /// Clear this node's own state (children are separate nodes).
    fn reset(&mut self) {
        if let Some(leaf) = self.as_leaf_mut() {
            leaf.reset();
            return;
        }
        match self {
            Self::Parallel { b_diff, b_temp, .. } => {
                *b_diff = T::zero();
                *b_temp = T::zero();
            }
            Self::Rtype { a, b, .. } | Self::RootRtype { a, b, .. } => {
                a.fill(T::zero());
                b.fill(T::zero());
            }
            _ => {}
        }
    }
}

struct Node<T> {
    kind: NodeKind<T>,
    parent: Option<NodeId>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Circuit
// ═══════════════════════════════════════════════════════════════════════════

/// Arena-backed WDF graph.
///
/// Children are added before the adaptor that joins them, so node ids are
/// always in bottom-up order.
pub struct Circuit<T> {
    nodes: Vec<Node<T>>,
}

impl<T: WdfSample> Default for Circuit<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Circuit<T>
where
    T: WdfSample,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for (i, node) in self.nodes.iter().enumerate() {
            list.entry(&format_args!(
                "#{i} {} parent={:?} R={:?}",
                node.kind.name(),
                node.parent.map(NodeId::index),
                node.kind.port().r
            ));
        }
        list.finish()
    }
}

fn ensure_positive<T: WdfSample>(name: &'static str, value: T) -> Result<()> {
    match (0..T::LANES)
        .map(|i| value.lane(i))
        .find(|&x| !T::splat(x).all_positive())
    {
        None => Ok(()),
        Some(bad) => Err(WdfError::InvalidValue {
            name,
            value: bad.to_f64_lossless(),
        }),
    }
}

fn ensure_unit_interval<T: WdfSample>(name: &'static str, value: T) -> Result<()> {
    match (0..T::LANES).map(|i| value.lane(i)).find(|&x| {
        let x = x.to_f64_lossless();
        !(0.0..=1.0).contains(&x)
    }) {
        None => Ok(()),
        Some(bad) => Err(WdfError::InvalidValue {
            name,
            value: bad.to_f64_lossless(),
        }),
    }
}

impl<T: WdfSample> Circuit<T> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn get(&self, id: NodeId) -> Result<&Node<T>> {
        self.nodes.get(id.0).ok_or(WdfError::UnknownNode(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node<T>> {
        self.nodes.get_mut(id.0).ok_or(WdfError::UnknownNode(id))
    }

    /// Kind name for diagnostics, e.g. `"series"` or `"diode_pair"`.
    pub fn kind(&self, id: NodeId) -> Result<&'static str> {
        Ok(self.get(id)?.kind.name())
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.get(id)?.parent)
    }

    /// Borrow a node as a [`WdfElement`].
    pub fn node(&mut self, id: NodeId) -> Result<NodeHandle<'_, T>> {
        let kind = &self.get(id)?.kind;
        if matches!(kind, NodeKind::RootRtype { .. }) {
            return Err(WdfError::Unsupported {
                node: id,
                kind: kind.name(),
                operation: "node handle",
            });
        }
        Ok(NodeHandle { circuit: self, id })
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    fn push(&mut self, kind: NodeKind<T>) -> NodeId {
        let id = NodeId(self.nodes.len());
        debug!(node = %id, kind = kind.name(), "added node");
        self.nodes.push(Node { kind, parent: None });
        id
    }

    /// Reject unknown ids, roots, already-owned children and repeats.
    fn check_children(&self, children: &[NodeId]) -> Result<()> {
        let parent = NodeId(self.nodes.len());
        for (i, &child) in children.iter().enumerate() {
            let node = self.get(child)?;
            if node.kind.is_root() {
                return Err(WdfError::RootAsChild(child));
            }
            if let Some(parent) = node.parent {
                return Err(WdfError::AlreadyConnected { child, parent });
            }
            if children[..i].contains(&child) {
                return Err(WdfError::AlreadyConnected { child, parent });
            }
        }
        Ok(())
    }

    /// Push an adaptor or root, connect its children, compute its impedance.
    fn push_parent(&mut self, kind: NodeKind<T>, children: &[NodeId]) -> Result<NodeId> {
        self.check_children(children)?;
        let id = self.push(kind);
        for &child in children {
            self.nodes[child.0].parent = Some(id);
        }
        self.calc_impedance_node(id);
        Ok(id)
    }

    pub fn add_resistor(&mut self, resistance: T) -> Result<NodeId> {
        ensure_positive("resistance", resistance)?;
        Ok(self.push(NodeKind::Resistor(Resistor::new(resistance))))
    }

    pub fn add_capacitor(&mut self, capacitance: T, sample_rate: T) -> Result<NodeId> {
        ensure_positive("capacitance", capacitance)?;
        ensure_positive("sample rate", sample_rate)?;
        Ok(self.push(NodeKind::Capacitor(Capacitor::with_sample_rate(
            capacitance,
            sample_rate,
        ))))
    }

    pub fn add_capacitor_alpha(&mut self, capacitance: T, sample_rate: T, alpha: T) -> Result<NodeId> {
        ensure_positive("capacitance", capacitance)?;
        ensure_positive("sample rate", sample_rate)?;
        ensure_unit_interval("alpha", alpha)?;
        Ok(self.push(NodeKind::CapacitorAlpha(CapacitorAlpha::with_sample_rate(
            capacitance,
            sample_rate,
            alpha,
        ))))
    }

    pub fn add_inductor(&mut self, inductance: T, sample_rate: T) -> Result<NodeId> {
        ensure_positive("inductance", inductance)?;
        ensure_positive("sample rate", sample_rate)?;
        Ok(self.push(NodeKind::Inductor(Inductor::with_sample_rate(
            inductance,
            sample_rate,
        ))))
    }

    pub fn add_inductor_alpha(&mut self, inductance: T, sample_rate: T, alpha: T) -> Result<NodeId> {
        ensure_positive("inductance", inductance)?;
        ensure_positive("sample rate", sample_rate)?;
        ensure_unit_interval("alpha", alpha)?;
        Ok(self.push(NodeKind::InductorAlpha(InductorAlpha::with_sample_rate(
            inductance,
            sample_rate,
            alpha,
        ))))
    }

    pub fn add_resistive_voltage_source(&mut self, resistance: T) -> Result<NodeId> {
        ensure_positive("resistance", resistance)?;
        Ok(self.push(NodeKind::ResistiveVoltageSource(
            ResistiveVoltageSource::with_resistance(resistance),
        )))
    }

    pub fn add_resistive_current_source(&mut self, resistance: T) -> Result<NodeId> {
        ensure_positive("resistance", resistance)?;
        Ok(self.push(NodeKind::ResistiveCurrentSource(
            ResistiveCurrentSource::with_resistance(resistance),
        )))
    }

    pub fn add_open(&mut self) -> NodeId {
        self.push(NodeKind::Open(Open::new()))
    }

    pub fn add_short(&mut self) -> NodeId {
        self.push(NodeKind::Short(Short::new()))
    }

    pub fn add_series(&mut self, p1: NodeId, p2: NodeId) -> Result<NodeId> {
        let kind = NodeKind::Series {
            port: Port::default(),
            p1,
            p2,
            rho1: T::one(),
        };
        self.push_parent(kind, &[p1, p2])
    }

    pub fn add_parallel(&mut self, p1: NodeId, p2: NodeId) -> Result<NodeId> {
        let kind = NodeKind::Parallel {
            port: Port::default(),
            p1,
            p2,
            rho1: T::one(),
            b_diff: T::zero(),
            b_temp: T::zero(),
        };
        self.push_parent(kind, &[p1, p2])
    }

    pub fn add_inverter(&mut self, p1: NodeId) -> Result<NodeId> {
        let kind = NodeKind::Inverter {
            port: Port::default(),
            p1,
        };
        self.push_parent(kind, &[p1])
    }

    pub fn add_y_parameter(&mut self, p1: NodeId, y11: T, y12: T, y21: T, y22: T) -> Result<NodeId> {
        let kind = NodeKind::YParameter {
            port: Port::default(),
            p1,
            y: [[y11, y12], [y21, y22]],
            coefs: YParameterCoefficients {
                a: T::one(),
                b: T::one(),
                c: T::one(),
            },
        };
        self.push_parent(kind, &[p1])
    }

    /// Adaptable R-type over `ports`, with the upward port at matrix index
    /// `up_port_index`. `calculator` receives the child resistances in
    /// `ports` order and the row-major matrix; it returns the upward port
    /// resistance.
    pub fn add_rtype(
        &mut self,
        ports: &[NodeId],
        up_port_index: usize,
        calculator: impl FnMut(&[T], &mut [T]) -> T + Send + 'static,
    ) -> Result<NodeId> {
        if ports.is_empty() {
            return Err(WdfError::NoPorts);
        }
        let n = ports.len() + 1;
        if up_port_index >= n {
            return Err(WdfError::UpPortOutOfRange {
                index: up_port_index,
                ports: n,
            });
        }
        let kind = NodeKind::Rtype {
            port: Port::default(),
            ports: ports.to_vec(),
            up: up_port_index,
            s: vec![T::zero(); n * n],
            a: vec![T::zero(); n],
            b: vec![T::zero(); n],
            r: vec![T::zero(); ports.len()],
            calculator: Box::new(calculator),
        };
        self.push_parent(kind, ports)
    }

    pub fn add_ideal_voltage_source(&mut self, next: NodeId) -> Result<NodeId> {
        let kind = NodeKind::IdealVoltageSource {
            port: Port::default(),
            next,
            vs: T::zero(),
        };
        self.push_parent(kind, &[next])
    }

    pub fn add_ideal_current_source(&mut self, next: NodeId) -> Result<NodeId> {
        let kind = NodeKind::IdealCurrentSource {
            port: Port::default(),
            next,
            is: T::zero(),
            two_r: T::zero(),
            two_r_is: T::zero(),
        };
        self.push_parent(kind, &[next])
    }

    /// Switch root, initially closed.
    pub fn add_switch(&mut self, next: NodeId) -> Result<NodeId> {
        let kind = NodeKind::Switch {
            port: Port::default(),
            next,
            closed: true,
        };
        self.push_parent(kind, &[next])
    }

    pub fn add_diode(&mut self, next: NodeId, is: T, vt: T, n_diodes: T) -> Result<NodeId> {
        ensure_positive("saturation current", is)?;
        ensure_positive("thermal voltage", vt)?;
        ensure_positive("diode count", n_diodes)?;
        let kind = NodeKind::Diode {
            port: Port::default(),
            next,
            solver: DiodeSolver::new(is, vt, n_diodes),
        };
        self.push_parent(kind, &[next])
    }

    pub fn add_diode_pair(
        &mut self,
        next: NodeId,
        is: T,
        vt: T,
        n_diodes: T,
        quality: DiodeQuality,
    ) -> Result<NodeId> {
        ensure_positive("saturation current", is)?;
        ensure_positive("thermal voltage", vt)?;
        ensure_positive("diode count", n_diodes)?;
        let kind = NodeKind::DiodePair {
            port: Port::default(),
            next,
            solver: DiodeSolver::new(is, vt, n_diodes),
            quality,
        };
        self.push_parent(kind, &[next])
    }

    /// Root R-type with a fixed row-major scattering matrix.
    pub fn add_root_rtype(&mut self, ports: &[NodeId], s: &[T]) -> Result<NodeId> {
        if ports.is_empty() {
            return Err(WdfError::NoPorts);
        }
        let n = ports.len();
        if s.len() != n * n {
            return Err(WdfError::MatrixSize {
                expected: n * n,
                got: s.len(),
            });
        }
        let kind = NodeKind::RootRtype {
            port: Port::default(),
            ports: ports.to_vec(),
            s: s.to_vec(),
            a: vec![T::zero(); n],
            b: vec![T::zero(); n],
            r: vec![T::zero(); n],
            calculator: None,
        };
        self.push_parent(kind, ports)
    }

    /// Root R-type whose matrix is re-derived whenever a child resistance
    /// changes.
    pub fn add_root_rtype_with_calculator(
        &mut self,
        ports: &[NodeId],
        calculator: impl FnMut(&[T], &mut [T]) + Send + 'static,
    ) -> Result<NodeId> {
        if ports.is_empty() {
            return Err(WdfError::NoPorts);
        }
        let n = ports.len();
        let kind = NodeKind::RootRtype {
            port: Port::default(),
            ports: ports.to_vec(),
            s: vec![T::zero(); n * n],
            a: vec![T::zero(); n],
            b: vec![T::zero(); n],
            r: vec![T::zero(); n],
            calculator: Some(Box::new(calculator)),
        };
        self.push_parent(kind, ports)
    }

    // -----------------------------------------------------------------------
    // Traversal
    // -----------------------------------------------------------------------

    /// Lift a node out of the arena. The placeholder keeps a copy of the
    /// node's port so voltage and current reads stay valid while it is out.
    fn detach(&mut self, id: NodeId) -> NodeKind<T> {
        let slot = &mut self.nodes[id.0].kind;
        let port = *slot.port();
        std::mem::replace(slot, NodeKind::Detached(port))
    }

    fn attach(&mut self, id: NodeId, kind: NodeKind<T>) {
        self.nodes[id.0].kind = kind;
    }

    #[inline]
    fn port_of(&self, id: NodeId) -> &Port<T> {
        self.nodes[id.0].kind.port()
    }

    fn calc_impedance_node(&mut self, id: NodeId) {
        if let Some(leaf) = self.nodes[id.0].kind.as_leaf_mut() {
            leaf.calc_impedance();
            return;
        }
        let mut kind = self.detach(id);
        match &mut kind {
            NodeKind::Series { port, p1, p2, rho1 } => {
                let (r, rho) = series_impedance(self.port_of(*p1).r, self.port_of(*p2).r);
                port.set_resistance(r);
                *rho1 = rho;
            }
            NodeKind::Parallel {
                port, p1, p2, rho1, ..
            } => {
                let (g, rho) = parallel_admittance(self.port_of(*p1).g, self.port_of(*p2).g);
                port.set_conductance(g);
                *rho1 = rho;
            }
            NodeKind::Inverter { port, p1 } => port.set_resistance(self.port_of(*p1).r),
            NodeKind::YParameter { port, p1, y, coefs } => {
                let (r, c) = YParameterCoefficients::new(*y, self.port_of(*p1).r);
                port.set_resistance(r);
                *coefs = c;
            }
            NodeKind::Rtype {
                port,
                ports,
                s,
                r,
                calculator,
                ..
            } => {
                for (slot, &child) in r.iter_mut().zip(ports.iter()) {
                    *slot = self.port_of(child).r;
                }
                let up_r = (*calculator)(&r[..], &mut s[..]);
                port.set_resistance(up_r);
            }
            NodeKind::IdealCurrentSource {
                next,
                is,
                two_r,
                two_r_is,
                ..
            } => {
                *two_r = T::from_f64(2.0) * self.port_of(*next).r;
                *two_r_is = *two_r * *is;
            }
            NodeKind::Diode { next, solver, .. } | NodeKind::DiodePair { next, solver, .. } => {
                solver.prepare(self.port_of(*next).r);
            }
            NodeKind::RootRtype {
                ports,
                s,
                r,
                calculator: Some(calculator),
                ..
            } => {
                for (slot, &child) in r.iter_mut().zip(ports.iter()) {
                    *slot = self.port_of(child).r;
                }
                (*calculator)(&r[..], &mut s[..]);
            }
            _ => {}
        }
        self.attach(id, kind);
    }

    /// Recompute `from` and every ancestor up to the root.
    fn propagate(&mut self, from: NodeId) {
        let mut cursor = Some(from);
        let mut depth = 0usize;
        while let Some(id) = cursor {
            self.calc_impedance_node(id);
            cursor = self.nodes[id.0].parent;
            depth += 1;
        }
        trace!(from = %from, depth, "propagated impedance change");
    }

    fn reflect_node(&mut self, id: NodeId) -> T {
        if let Some(leaf) = self.nodes[id.0].kind.as_leaf_mut() {
            return leaf.reflected();
        }
        let mut kind = self.detach(id);
        let b = match &mut kind {
            NodeKind::Series { port, p1, p2, .. } => {
                let b1 = self.reflect_node(*p1);
                let b2 = self.reflect_node(*p2);
                port.b = series_reflect(b1, b2);
                port.b
            }
            NodeKind::Parallel {
                port,
                p1,
                p2,
                rho1,
                b_diff,
                b_temp,
            } => {
                let b1 = self.reflect_node(*p1);
                let b2 = self.reflect_node(*p2);
                let (b, diff, temp) = parallel_reflect(b1, b2, *rho1);
                *b_diff = diff;
                *b_temp = temp;
                port.b = b;
                b
            }
            NodeKind::Inverter { port, p1 } => {
                port.b = -self.reflect_node(*p1);
                port.b
            }
            NodeKind::YParameter { port, p1, coefs, .. } => {
                port.b = coefs.c * self.reflect_node(*p1);
                port.b
            }
            NodeKind::Rtype {
                port, ports, up, s, a, ..
            } => {
                let n = a.len();
                for (i, &child) in ports.iter().enumerate() {
                    a[matrix_index(i, *up)] = self.reflect_node(child);
                }
                port.b = scatter_up_row(&s[*up * n..(*up + 1) * n], &a[..], *up);
                port.b
            }
            NodeKind::IdealVoltageSource { port, vs, .. } => {
                port.b = -port.a + T::from_f64(2.0) * *vs;
                port.b
            }
            NodeKind::IdealCurrentSource { port, two_r_is, .. } => {
                port.b = *two_r_is + port.a;
                port.b
            }
            NodeKind::Switch { port, closed, .. } => {
                port.b = if *closed { -port.a } else { port.a };
                port.b
            }
            NodeKind::Diode { port, solver, .. } => {
                port.b = solver.diode(port.a);
                port.b
            }
            NodeKind::DiodePair {
                port,
                solver,
                quality,
                ..
            } => {
                port.b = solver.diode_pair(port.a, *quality);
                port.b
            }
            NodeKind::RootRtype { port, .. } | NodeKind::Detached(port) => port.b,
            _ => T::zero(),
        };
        self.attach(id, kind);
        b
    }

    fn incident_node(&mut self, id: NodeId, x: T) {
        if let Some(leaf) = self.nodes[id.0].kind.as_leaf_mut() {
            leaf.incident(x);
            return;
        }
        let mut kind = self.detach(id);
        match &mut kind {
            NodeKind::Series { port, p1, p2, rho1 } => {
                let b1 = self.port_of(*p1).b;
                let b2 = self.port_of(*p2).b;
                let (a1, a2) = series_scatter(x, b1, b2, *rho1);
                self.incident_node(*p1, a1);
                self.incident_node(*p2, a2);
                port.a = x;
            }
            NodeKind::Parallel {
                port,
                p1,
                p2,
                b_diff,
                b_temp,
                ..
            } => {
                let (a1, a2) = parallel_scatter(x, *b_diff, *b_temp);
                self.incident_node(*p1, a1);
                self.incident_node(*p2, a2);
                port.a = x;
            }
            NodeKind::Inverter { port, p1 } => {
                port.a = x;
                self.incident_node(*p1, -x);
            }
            NodeKind::YParameter { port, p1, coefs, .. } => {
                port.a = x;
                let b1 = self.port_of(*p1).b;
                self.incident_node(*p1, coefs.a * b1 + coefs.b * x);
            }
            NodeKind::Rtype {
                port,
                ports,
                up,
                s,
                a,
                b,
                ..
            } => {
                port.a = x;
                a[*up] = x;
                let n = a.len();
                for (k, bk) in b.iter_mut().enumerate() {
                    *bk = scatter_row(&s[k * n..(k + 1) * n], &a[..]);
                }
                for (i, &child) in ports.iter().enumerate() {
                    self.incident_node(child, b[matrix_index(i, *up)]);
                }
            }
            NodeKind::IdealVoltageSource { port, .. }
            | NodeKind::IdealCurrentSource { port, .. }
            | NodeKind::Switch { port, .. }
            | NodeKind::Diode { port, .. }
            | NodeKind::DiodePair { port, .. } => port.a = x,
            _ => {}
        }
        self.attach(id, kind);
    }

    fn compute_root_rtype(&mut self, id: NodeId) {
        let mut kind = self.detach(id);
        if let NodeKind::RootRtype {
            ports, s, a, b, ..
        } = &mut kind
        {
            let n = a.len();
            for (slot, &child) in a.iter_mut().zip(ports.iter()) {
                *slot = self.reflect_node(child);
            }
            for (k, bk) in b.iter_mut().enumerate() {
                *bk = scatter_row(&s[k * n..(k + 1) * n], &a[..]);
            }
            for (&child, &wave) in ports.iter().zip(b.iter()) {
                self.incident_node(child, wave);
            }
        }
        self.attach(id, kind);
    }

    // -----------------------------------------------------------------------
    // Per-sample API
    // -----------------------------------------------------------------------

    /// Hand an incident wave to `id` (and, for adaptors, down its subtree).
    pub fn incident(&mut self, id: NodeId, x: T) -> Result<()> {
        self.get(id)?;
        self.incident_node(id, x);
        Ok(())
    }

    /// Reflected wave of `id`, pulling up its subtree first.
    pub fn reflected(&mut self, id: NodeId) -> Result<T> {
        self.get(id)?;
        Ok(self.reflect_node(id))
    }

    /// Run one sample from `root`: waves up from the subtree, then back
    /// down. Root R-types gather, scatter and dispatch in the same sample.
    pub fn process(&mut self, root: NodeId) -> Result<()> {
        let kind = &self.get(root)?.kind;
        if matches!(kind, NodeKind::RootRtype { .. }) {
            self.compute_root_rtype(root);
            return Ok(());
        }
        let next = kind.next().ok_or_else(|| WdfError::Unsupported {
            node: root,
            kind: kind.name(),
            operation: "process",
        })?;
        let up = self.reflect_node(next);
        self.incident_node(root, up);
        let down = self.reflect_node(root);
        self.incident_node(next, down);
        Ok(())
    }

    pub fn voltage(&self, id: NodeId) -> Result<T> {
        let kind = &self.get(id)?.kind;
        if matches!(kind, NodeKind::RootRtype { .. }) {
            return Err(WdfError::Unsupported {
                node: id,
                kind: kind.name(),
                operation: "voltage",
            });
        }
        Ok(kind.port().voltage())
    }

    /// Current through `id`. Roots reference their child's port resistance.
    pub fn current(&self, id: NodeId) -> Result<T> {
        let kind = &self.get(id)?.kind;
        if matches!(kind, NodeKind::RootRtype { .. }) {
            return Err(WdfError::Unsupported {
                node: id,
                kind: kind.name(),
                operation: "current",
            });
        }
        Ok(self.current_of(id))
    }

    fn current_of(&self, id: NodeId) -> T {
        let kind = &self.nodes[id.0].kind;
        let port = kind.port();
        match kind.next() {
            Some(next) => (port.a - port.b) * (T::from_f64(0.5) * self.port_of(next).g),
            None => port.current(),
        }
    }

    pub fn port_resistance(&self, id: NodeId) -> Result<T> {
        Ok(self.get(id)?.kind.port().r)
    }

    // -----------------------------------------------------------------------
    // Setters
    // -----------------------------------------------------------------------

    /// Apply `f` to the node; `None` means the node has no such value,
    /// `Some(true)` means its impedance changed and must propagate.
    fn update(
        &mut self,
        id: NodeId,
        operation: &'static str,
        f: impl FnOnce(&mut NodeKind<T>) -> Option<bool>,
    ) -> Result<()> {
        let node = self.get_mut(id)?;
        let kind = node.kind.name();
        match f(&mut node.kind) {
            None => Err(WdfError::Unsupported {
                node: id,
                kind,
                operation,
            }),
            Some(true) => {
                self.propagate(id);
                Ok(())
            }
            Some(false) => Ok(()),
        }
    }

    pub fn set_resistance_value(&mut self, id: NodeId, resistance: T) -> Result<()> {
        ensure_positive("resistance", resistance)?;
        self.update(id, "set_resistance_value", |kind| match kind {
            NodeKind::Resistor(e) => Some(e.set_resistance_value(resistance)),
            NodeKind::ResistiveVoltageSource(e) => Some(e.set_resistance_value(resistance)),
            NodeKind::ResistiveCurrentSource(e) => Some(e.set_resistance_value(resistance)),
            _ => None,
        })
    }

    pub fn set_capacitance_value(&mut self, id: NodeId, capacitance: T) -> Result<()> {
        ensure_positive("capacitance", capacitance)?;
        self.update(id, "set_capacitance_value", |kind| match kind {
            NodeKind::Capacitor(e) => Some(e.set_capacitance_value(capacitance)),
            NodeKind::CapacitorAlpha(e) => Some(e.set_capacitance_value(capacitance)),
            _ => None,
        })
    }

    pub fn set_inductance_value(&mut self, id: NodeId, inductance: T) -> Result<()> {
        ensure_positive("inductance", inductance)?;
        self.update(id, "set_inductance_value", |kind| match kind {
            NodeKind::Inductor(e) => Some(e.set_inductance_value(inductance)),
            NodeKind::InductorAlpha(e) => Some(e.set_inductance_value(inductance)),
            _ => None,
        })
    }

    pub fn set_alpha(&mut self, id: NodeId, alpha: T) -> Result<()> {
        ensure_unit_interval("alpha", alpha)?;
        self.update(id, "set_alpha", |kind| match kind {
            NodeKind::CapacitorAlpha(e) => Some(e.set_alpha(alpha)),
            NodeKind::InductorAlpha(e) => Some(e.set_alpha(alpha)),
            _ => None,
        })
    }

    pub fn set_voltage(&mut self, id: NodeId, voltage: T) -> Result<()> {
        self.update(id, "set_voltage", |kind| match kind {
            NodeKind::ResistiveVoltageSource(e) => {
                e.set_voltage(voltage);
                Some(false)
            }
            NodeKind::IdealVoltageSource { vs, .. } => {
                *vs = voltage;
                Some(false)
            }
            _ => None,
        })
    }

    pub fn set_current(&mut self, id: NodeId, current: T) -> Result<()> {
        self.update(id, "set_current", |kind| match kind {
            NodeKind::ResistiveCurrentSource(e) => {
                e.set_current(current);
                Some(false)
            }
            NodeKind::IdealCurrentSource {
                is, two_r, two_r_is, ..
            } => {
                *is = current;
                *two_r_is = *two_r * current;
                Some(false)
            }
            _ => None,
        })
    }

    pub fn set_closed(&mut self, id: NodeId, closed: bool) -> Result<()> {
        self.update(id, "set_closed", |kind| match kind {
            NodeKind::Switch { closed: c, .. } => {
                *c = closed;
                Some(false)
            }
            _ => None,
        })
    }

    pub fn set_diode_parameters(&mut self, id: NodeId, is: T, vt: T, n_diodes: T) -> Result<()> {
        ensure_positive("saturation current", is)?;
        ensure_positive("thermal voltage", vt)?;
        ensure_positive("diode count", n_diodes)?;
        self.update(id, "set_diode_parameters", |kind| match kind {
            NodeKind::Diode { solver, .. } | NodeKind::DiodePair { solver, .. } => {
                solver.set_parameters(is, vt, n_diodes);
                Some(true)
            }
            _ => None,
        })
    }

    pub fn set_diode_quality(&mut self, id: NodeId, quality: DiodeQuality) -> Result<()> {
        self.update(id, "set_diode_quality", |kind| match kind {
            NodeKind::DiodePair { quality: q, .. } => {
                *q = quality;
                Some(false)
            }
            _ => None,
        })
    }

    pub fn set_y_parameters(&mut self, id: NodeId, y11: T, y12: T, y21: T, y22: T) -> Result<()> {
        self.update(id, "set_y_parameters", |kind| match kind {
            NodeKind::YParameter { y, .. } => {
                let new = [[y11, y12], [y21, y22]];
                if new
                    .iter()
                    .flatten()
                    .zip(y.iter().flatten())
                    .all(|(n, o)| n.all_eq(*o))
                {
                    return Some(false);
                }
                *y = new;
                Some(true)
            }
            _ => None,
        })
    }

    /// Replace an R-type's row-major scattering matrix. An adaptable R-type
    /// keeps its upward resistance.
    pub fn set_s_matrix_data(&mut self, id: NodeId, data: &[T]) -> Result<()> {
        let node = self.get_mut(id)?;
        let name = node.kind.name();
        match &mut node.kind {
            NodeKind::Rtype { s, .. } | NodeKind::RootRtype { s, .. } => {
                if data.len() != s.len() {
                    return Err(WdfError::MatrixSize {
                        expected: s.len(),
                        got: data.len(),
                    });
                }
                s.copy_from_slice(data);
                Ok(())
            }
            _ => Err(WdfError::Unsupported {
                node: id,
                kind: name,
                operation: "set_s_matrix_data",
            }),
        }
    }

    /// Set the sample rate of every reactive element and recompute all port
    /// resistances. Clears reactive state.
    pub fn prepare(&mut self, sample_rate: T) -> Result<()> {
        ensure_positive("sample rate", sample_rate)?;
        for node in &mut self.nodes {
            match &mut node.kind {
                NodeKind::Capacitor(e) => {
                    e.prepare(sample_rate);
                }
                NodeKind::CapacitorAlpha(e) => {
                    e.prepare(sample_rate);
                }
                NodeKind::Inductor(e) => {
                    e.prepare(sample_rate);
                }
                NodeKind::InductorAlpha(e) => {
                    e.prepare(sample_rate);
                }
                _ => {}
            }
        }
        // Ids are bottom-up, so one ascending pass sees children first.
        for i in 0..self.nodes.len() {
            self.calc_impedance_node(NodeId(i));
        }
        debug!(
            nodes = self.nodes.len(),
            sample_rate = ?sample_rate,
            "prepared circuit"
        );
        Ok(())
    }

    /// Clear reactive and cached wave state across the whole circuit.
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.kind.reset();
        }
    }

    /// Flush denormal-range reactive state to zero across the whole circuit.
    pub fn snap_to_zero(&mut self) {
        for node in &mut self.nodes {
            if let Some(leaf) = node.kind.as_leaf_mut() {
                leaf.snap_to_zero();
            }
        }
    }

    fn in_subtree(&self, node: NodeId, root: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            if id == root {
                return true;
            }
            cursor = self.nodes[id.0].parent;
        }
        false
    }

    fn for_each_in_subtree(&mut self, root: NodeId, f: impl Fn(&mut NodeKind<T>)) {
        for i in 0..self.nodes.len() {
            if self.in_subtree(NodeId(i), root) {
                f(&mut self.nodes[i].kind);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Node handle
// ═══════════════════════════════════════════════════════════════════════════

/// Mutable view of one node through the [`WdfElement`] capability set.
///
/// `calc_impedance` propagates from the node to the root. `reset` and
/// `snap_to_zero` cover the node's whole subtree.
pub struct NodeHandle<'c, T> {
    circuit: &'c mut Circuit<T>,
    id: NodeId,
}

impl<T: WdfSample> NodeHandle<'_, T> {
    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl<T: WdfSample> WdfElement<T> for NodeHandle<'_, T> {
    #[inline]
    fn port(&self) -> &Port<T> {
        self.circuit.port_of(self.id)
    }

    /// Roots reference their child's port resistance.
    fn current(&self) -> T {
        self.circuit.current_of(self.id)
    }

    fn calc_impedance(&mut self) {
        self.circuit.propagate(self.id);
    }

    #[inline]
    fn incident(&mut self, x: T) {
        self.circuit.incident_node(self.id, x);
    }

    #[inline]
    fn reflected(&mut self) -> T {
        self.circuit.reflect_node(self.id)
    }

    fn reset(&mut self) {
        self.circuit.for_each_in_subtree(self.id, NodeKind::reset);
    }

    fn snap_to_zero(&mut self) {
        self.circuit.for_each_in_subtree(self.id, |kind| {
            if let Some(leaf) = kind.as_leaf_mut() {
                leaf.snap_to_zero();
            }
        });
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{DiodePair, IdealVoltageSource, WdfRoot};
    use crate::tree::{Parallel, PolarityInverter, Series, YParameter};
    use approx::assert_relative_eq;

    #[test]
    fn voltage_divider() {
        let mut c = Circuit::<f64>::new();
        let r1 = c.add_resistor(10_000.0).unwrap();
        let r2 = c.add_resistor(10_000.0).unwrap();
        let s1 = c.add_series(r1, r2).unwrap();
        let i1 = c.add_inverter(s1).unwrap();
        let vs = c.add_ideal_voltage_source(i1).unwrap();

        c.set_voltage(vs, 10.0).unwrap();
        c.process(vs).unwrap();
        assert_eq!(c.voltage(r2).unwrap(), 5.0);
    }

    #[test]
    fn current_divider() {
        let mut c = Circuit::<f64>::new();
        let r1 = c.add_resistor(10_000.0).unwrap();
        let r2 = c.add_resistor(10_000.0).unwrap();
        let p1 = c.add_parallel(r1, r2).unwrap();
        let is = c.add_ideal_current_source(p1).unwrap();

        c.set_current(is, 1.0).unwrap();
        c.process(is).unwrap();
        assert_relative_eq!(c.current(r2).unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn current_switch() {
        let mut c = Circuit::<f64>::new();
        let r1 = c.add_resistor(10_000.0).unwrap();
        let is = c.add_resistive_current_source(1.0e9).unwrap();
        let s1 = c.add_series(r1, is).unwrap();
        let sw = c.add_switch(s1).unwrap();
        c.set_current(is, 1.0).unwrap();

        c.set_closed(sw, true).unwrap();
        c.process(sw).unwrap();
        assert!((c.current(r1).unwrap() + 1.0).abs() < 1e-3);

        c.set_closed(sw, false).unwrap();
        c.process(sw).unwrap();
        assert_eq!(c.current(r1).unwrap(), 0.0);
    }

    #[test]
    fn resistance_change_reaches_root() {
        let mut c = Circuit::<f64>::new();
        let r1 = c.add_resistor(1000.0).unwrap();
        let r2 = c.add_resistor(5000.0).unwrap();
        let s1 = c.add_series(r1, r2).unwrap();
        let is = c.add_ideal_current_source(s1).unwrap();
        c.set_current(is, 1.0).unwrap();

        assert_eq!(c.reflected(is).unwrap(), 2.0 * 6000.0);
        c.set_resistance_value(r1, 2000.0).unwrap();
        assert_eq!(c.port_resistance(s1).unwrap(), 7000.0);
        assert_eq!(c.reflected(is).unwrap(), 2.0 * 7000.0);
    }

    #[test]
    fn matches_static_graph_bit_for_bit() {
        let fs = 48_000.0_f64;
        let mut c = Circuit::<f64>::new();
        let vs = c.add_resistive_voltage_source(4700.0).unwrap();
        let cap = c.add_capacitor(47.0e-9, fs).unwrap();
        let p1 = c.add_parallel(vs, cap).unwrap();
        let inv = c.add_inverter(p1).unwrap();
        let dp = c
            .add_diode_pair(inv, 2.52e-9, 25.85e-3, 1.0, DiodeQuality::Best)
            .unwrap();

        let mut source = ResistiveVoltageSource::with_resistance(4700.0);
        source.set_voltage(0.0);
        let tree = PolarityInverter::new(Parallel::new(
            source,
            Capacitor::with_sample_rate(47.0e-9, fs),
        ));
        let mut st = DiodePair::new(tree, 2.52e-9);

        for n in 0..256 {
            let x = (n as f64 * 0.05).sin() * 2.0;
            c.set_voltage(vs, x).unwrap();
            st.update_next(|inv| {
                inv.update_port1(|p| {
                    p.update_port1(|s| {
                        s.set_voltage(x);
                        false
                    })
                })
            });
            c.process(dp).unwrap();
            st.process();
            assert_eq!(c.voltage(cap).unwrap(), st.next().port1().port2().voltage());
        }
    }

    #[test]
    fn static_and_runtime_series_agree_under_ideal_source() {
        let mut c = Circuit::<f32>::new();
        let r = c.add_resistor(1000.0).unwrap();
        let cap = c.add_capacitor(1.0e-6, 44_100.0).unwrap();
        let s = c.add_series(r, cap).unwrap();
        let inv = c.add_inverter(s).unwrap();
        let root = c.add_ideal_voltage_source(inv).unwrap();

        let mut st = IdealVoltageSource::new(PolarityInverter::new(Series::new(
            Resistor::new(1000.0_f32),
            Capacitor::with_sample_rate(1.0e-6, 44_100.0),
        )));

        for n in 0..64 {
            let x = if n < 32 { 1.0 } else { -0.5 };
            c.set_voltage(root, x).unwrap();
            st.set_voltage(x);
            c.process(root).unwrap();
            st.process();
            assert_eq!(c.voltage(cap).unwrap(), st.next().port1().port2().voltage());
        }
    }

    #[test]
    fn wiring_errors() {
        let mut c = Circuit::<f64>::new();
        let r1 = c.add_resistor(100.0).unwrap();
        let r2 = c.add_resistor(100.0).unwrap();
        let s = c.add_series(r1, r2).unwrap();

        assert_eq!(
            c.add_inverter(r1).unwrap_err(),
            WdfError::AlreadyConnected {
                child: r1,
                parent: s
            }
        );

        let r3 = c.add_resistor(100.0).unwrap();
        assert!(matches!(
            c.add_series(r3, r3),
            Err(WdfError::AlreadyConnected { child, .. }) if child == r3
        ));

        let vs = c.add_ideal_voltage_source(s).unwrap();
        assert_eq!(c.add_inverter(vs).unwrap_err(), WdfError::RootAsChild(vs));

        let mut big = Circuit::<f64>::new();
        for _ in 0..10 {
            big.add_open();
        }
        let foreign = big.add_short();
        assert_eq!(c.add_inverter(foreign).unwrap_err(), WdfError::UnknownNode(foreign));

        assert_eq!(
            c.add_rtype(&[r3], 2, |_, _| 1.0).unwrap_err(),
            WdfError::UpPortOutOfRange { index: 2, ports: 2 }
        );
        assert_eq!(c.add_rtype(&[], 0, |_, _| 1.0).unwrap_err(), WdfError::NoPorts);
        assert_eq!(
            c.add_root_rtype(&[r3], &[1.0, 0.0]).unwrap_err(),
            WdfError::MatrixSize {
                expected: 1,
                got: 2
            }
        );
        // Failed builders leave the child free.
        assert!(c.add_inverter(r3).is_ok());
    }

    #[test]
    fn invalid_values_rejected() {
        let mut c = Circuit::<f64>::new();
        assert_eq!(
            c.add_resistor(-1.0).unwrap_err(),
            WdfError::InvalidValue {
                name: "resistance",
                value: -1.0
            }
        );
        let cap = c.add_capacitor_alpha(1.0e-6, 48_000.0, 0.5).unwrap();
        assert!(c.set_alpha(cap, 1.5).is_err());
        assert!(c.set_capacitance_value(cap, 0.0).is_err());
    }

    #[test]
    fn unsupported_setter_names_the_node_kind() {
        let mut c = Circuit::<f64>::new();
        let r = c.add_resistor(100.0).unwrap();
        assert_eq!(
            c.set_capacitance_value(r, 1.0e-6).unwrap_err(),
            WdfError::Unsupported {
                node: r,
                kind: "resistor",
                operation: "set_capacitance_value"
            }
        );
        assert!(c.process(r).is_err());
    }

    #[test]
    fn kind_and_parent_lookup() {
        let mut c = Circuit::<f64>::new();
        let r = c.add_resistor(100.0).unwrap();
        let l = c.add_inductor(0.1, 48_000.0).unwrap();
        let p = c.add_parallel(r, l).unwrap();
        assert_eq!(c.kind(r).unwrap(), "resistor");
        assert_eq!(c.kind(p).unwrap(), "parallel");
        assert_eq!(c.parent(l).unwrap(), Some(p));
        assert_eq!(c.parent(p).unwrap(), None);
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn root_rtype_millman() {
        let mut c = Circuit::<f64>::new();
        let rs = [1000.0, 2200.0, 4700.0];
        let vs = [1.0, -0.5, 2.0];
        let ids: Vec<NodeId> = rs
            .iter()
            .map(|&r| c.add_resistive_voltage_source(r).unwrap())
            .collect();
        for (&id, &v) in ids.iter().zip(&vs) {
            c.set_voltage(id, v).unwrap();
        }
        let root = c
            .add_root_rtype_with_calculator(&ids, |r, s| {
                let n = r.len();
                let g_sum: f64 = r.iter().map(|r| 1.0 / r).sum();
                for k in 0..n {
                    for j in 0..n {
                        let delta = if k == j { 1.0 } else { 0.0 };
                        s[k * n + j] = 2.0 / r[j] / g_sum - delta;
                    }
                }
            })
            .unwrap();
        c.process(root).unwrap();

        let g: Vec<f64> = rs.iter().map(|r| 1.0 / r).collect();
        let node = g.iter().zip(&vs).map(|(g, v)| g * v).sum::<f64>() / g.iter().sum::<f64>();
        for &id in &ids {
            assert_relative_eq!(c.voltage(id).unwrap(), node, epsilon = 1e-12);
        }
        assert!(c.voltage(root).is_err());
    }

    #[test]
    fn node_handle_is_a_wdf_element() {
        let mut c = Circuit::<f64>::new();
        let r1 = c.add_resistor(1000.0).unwrap();
        let r2 = c.add_resistor(2000.0).unwrap();
        let s = c.add_series(r1, r2).unwrap();
        let handle = c.node(s).unwrap();
        assert_eq!(handle.port_resistance(), 3000.0);
        assert_eq!(handle.id(), s);
    }

    #[test]
    fn prepare_recomputes_reactive_impedances() {
        let mut c = Circuit::<f64>::new();
        let r = c.add_resistor(1000.0).unwrap();
        let cap = c.add_capacitor(1.0e-6, 48_000.0).unwrap();
        let s = c.add_series(r, cap).unwrap();
        c.prepare(96_000.0).unwrap();
        let expected = 1000.0 + 1.0 / (2.0 * 96_000.0 * 1.0e-6);
        assert_relative_eq!(c.port_resistance(s).unwrap(), expected, epsilon = 1e-9);
    }

    // -----------------------------------------------------------------------
    // R-type and y-parameter nodes
    // -----------------------------------------------------------------------

    /// Row-major 3-port series junction, upward port last.
    fn series_matrix(r: &[f64], s: &mut [f64]) -> f64 {
        let up = r[0] + r[1];
        let rs = [r[0], r[1], up];
        for k in 0..3 {
            for j in 0..3 {
                let delta = if k == j { 1.0 } else { 0.0 };
                s[k * 3 + j] = delta - rs[k] / up;
            }
        }
        up
    }

    /// Row-major 3-port parallel junction, upward port last.
    fn parallel_matrix(r: &[f64], s: &mut [f64]) -> f64 {
        let g_up = 1.0 / r[0] + 1.0 / r[1];
        let gs = [1.0 / r[0], 1.0 / r[1], g_up];
        for k in 0..3 {
            for j in 0..3 {
                let delta = if k == j { 1.0 } else { 0.0 };
                s[k * 3 + j] = gs[j] / g_up - delta;
            }
        }
        1.0 / g_up
    }

    fn source(r: f64, v: f64) -> ResistiveVoltageSource<f64> {
        let mut vs = ResistiveVoltageSource::with_resistance(r);
        vs.set_voltage(v);
        vs
    }

    /// Two resistive sources under an R-type; returns `(circuit, v1, v2, rtype)`.
    fn rtype_circuit(
        calculator: fn(&[f64], &mut [f64]) -> f64,
        v1: f64,
        v2: f64,
    ) -> (Circuit<f64>, NodeId, NodeId, NodeId) {
        let mut c = Circuit::<f64>::new();
        let s1 = c.add_resistive_voltage_source(1000.0).unwrap();
        let s2 = c.add_resistive_voltage_source(3300.0).unwrap();
        c.set_voltage(s1, v1).unwrap();
        c.set_voltage(s2, v2).unwrap();
        let rt = c.add_rtype(&[s1, s2], 2, calculator).unwrap();
        (c, s1, s2, rt)
    }

    #[test]
    fn rtype_series_matrix_matches_series_adaptor() {
        let (mut c, s1, s2, rt) = rtype_circuit(series_matrix, 0.7, -0.2);
        let mut series = Series::new(source(1000.0, 0.7), source(3300.0, -0.2));

        assert_relative_eq!(c.port_resistance(rt).unwrap(), series.port_resistance());
        for x in [0.3, -1.0, 2.5, 0.0] {
            assert_relative_eq!(c.reflected(rt).unwrap(), series.reflected(), epsilon = 1e-12);
            c.incident(rt, x).unwrap();
            series.incident(x);
            assert_relative_eq!(c.voltage(s1).unwrap(), series.port1().voltage(), epsilon = 1e-12);
            assert_relative_eq!(c.current(s2).unwrap(), series.port2().current(), epsilon = 1e-12);
        }
    }

    #[test]
    fn rtype_parallel_matrix_matches_parallel_adaptor() {
        let (mut c, s1, s2, rt) = rtype_circuit(parallel_matrix, 1.2, 0.4);
        let mut parallel = Parallel::new(source(1000.0, 1.2), source(3300.0, 0.4));

        assert_relative_eq!(c.port_resistance(rt).unwrap(), parallel.port_resistance());
        for x in [0.5, -0.8, 0.0] {
            assert_relative_eq!(c.reflected(rt).unwrap(), parallel.reflected(), epsilon = 1e-12);
            c.incident(rt, x).unwrap();
            parallel.incident(x);
            assert_relative_eq!(
                c.voltage(s1).unwrap(),
                parallel.port1().voltage(),
                epsilon = 1e-12
            );
            assert_relative_eq!(
                c.current(s2).unwrap(),
                parallel.port2().current(),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn resistance_change_propagates_through_rtype() {
        let (mut c, s1, _, rt) = rtype_circuit(series_matrix, 0.0, 0.0);
        let is = c.add_ideal_current_source(rt).unwrap();
        c.set_current(is, 1.0).unwrap();
        assert_relative_eq!(c.port_resistance(rt).unwrap(), 4300.0);

        c.set_resistance_value(s1, 2000.0).unwrap();
        assert_relative_eq!(c.port_resistance(rt).unwrap(), 5300.0);
        assert_relative_eq!(c.reflected(is).unwrap(), 2.0 * 5300.0, max_relative = 1e-12);
    }

    #[test]
    fn node_handle_drives_subtree_like_circuit_api() {
        let (mut by_id, _, s2, rt) = rtype_circuit(series_matrix, 0.7, -0.2);
        let (mut by_handle, ..) = rtype_circuit(series_matrix, 0.7, -0.2);

        for x in [0.3, -1.0, 2.5] {
            let expected = by_id.reflected(rt).unwrap();
            by_id.incident(rt, x).unwrap();

            let mut handle = by_handle.node(rt).unwrap();
            assert_eq!(handle.reflected(), expected);
            handle.incident(x);
            assert_eq!(by_handle.voltage(s2).unwrap(), by_id.voltage(s2).unwrap());
        }

        by_handle.node(rt).unwrap().reset();
        assert_eq!(by_handle.port_resistance(rt).unwrap(), 4300.0);
    }

    #[test]
    fn fixed_root_rtype_and_matrix_replacement() {
        let mut c = Circuit::<f64>::new();
        let rs = [1000.0, 2200.0, 4700.0];
        let vs = [1.0, -0.5, 2.0];
        let ids: Vec<NodeId> = rs
            .iter()
            .map(|&r| c.add_resistive_voltage_source(r).unwrap())
            .collect();
        for (&id, &v) in ids.iter().zip(&vs) {
            c.set_voltage(id, v).unwrap();
        }

        let g: Vec<f64> = rs.iter().map(|r| 1.0 / r).collect();
        let g_sum: f64 = g.iter().sum();
        let mut s = [0.0; 9];
        for k in 0..3 {
            for j in 0..3 {
                let delta = if k == j { 1.0 } else { 0.0 };
                s[k * 3 + j] = 2.0 * g[j] / g_sum - delta;
            }
        }
        let root = c.add_root_rtype(&ids, &s).unwrap();
        c.process(root).unwrap();

        let node = g.iter().zip(&vs).map(|(g, v)| g * v).sum::<f64>() / g_sum;
        for &id in &ids {
            assert_relative_eq!(c.voltage(id).unwrap(), node, epsilon = 1e-12);
        }

        // Identity scattering reflects every source back onto itself.
        let mut identity = [0.0; 9];
        for k in 0..3 {
            identity[k * 3 + k] = 1.0;
        }
        c.set_s_matrix_data(root, &identity).unwrap();
        c.process(root).unwrap();
        for (&id, &v) in ids.iter().zip(&vs) {
            assert_eq!(c.voltage(id).unwrap(), v);
        }

        assert_eq!(
            c.set_s_matrix_data(root, &[1.0; 4]).unwrap_err(),
            WdfError::MatrixSize {
                expected: 9,
                got: 4
            }
        );
        assert!(c.set_s_matrix_data(ids[0], &[1.0]).is_err());
    }

    #[test]
    fn rtype_matrix_replacement_keeps_up_resistance() {
        let (mut c, _, _, rt) = rtype_circuit(series_matrix, 0.7, -0.2);
        c.set_s_matrix_data(rt, &[0.0; 9]).unwrap();
        assert_relative_eq!(c.port_resistance(rt).unwrap(), 4300.0);
        assert_eq!(c.reflected(rt).unwrap(), 0.0);
    }

    #[test]
    fn y_parameter_matches_static_graph() {
        let (y11, y12, y21, y22) = (0.11, -0.02, -0.03, 0.44);
        let mut c = Circuit::<f64>::new();
        let r = c.add_resistor(10_000.0).unwrap();
        let y = c.add_y_parameter(r, y11, y12, y21, y22).unwrap();
        let vs = c.add_ideal_voltage_source(y).unwrap();

        let mut st = IdealVoltageSource::new(YParameter::new(
            Resistor::new(10_000.0),
            y11,
            y12,
            y21,
            y22,
        ));

        for v in [2.0, -1.0, 0.5] {
            c.set_voltage(vs, v).unwrap();
            st.set_voltage(v);
            c.process(vs).unwrap();
            st.process();

            assert_eq!(c.voltage(r).unwrap(), st.next().port1().voltage());
            assert_eq!(c.current(y).unwrap(), st.next().current());
            assert_eq!(c.current(vs).unwrap(), st.current());

            let v1 = c.voltage(r).unwrap();
            let i1 = -c.current(r).unwrap();
            assert!((i1 - (y11 * v1 + y12 * v)).abs() < 1e-12, "i1 = {i1}");
        }

        c.set_y_parameters(y, 0.2, y12, y21, y22).unwrap();
        st.update_next(|p| p.set_y_parameters(0.2, y12, y21, y22));
        assert_eq!(c.port_resistance(y).unwrap(), st.next().port_resistance());
    }

    #[test]
    fn unchanged_y_parameters_skip_recompute() {
        let mut c = Circuit::<f64>::new();
        let r = c.add_resistor(10_000.0).unwrap();
        let y = c.add_y_parameter(r, 0.11, -0.02, -0.03, 0.44).unwrap();
        let adapted = c.port_resistance(y).unwrap();

        // Overwrite the cached resistance; only a recompute would restore it.
        if let NodeKind::YParameter { port, .. } = &mut c.nodes[y.0].kind {
            port.set_resistance(1.0);
        }
        c.set_y_parameters(y, 0.11, -0.02, -0.03, 0.44).unwrap();
        assert_eq!(c.port_resistance(y).unwrap(), 1.0);

        c.set_y_parameters(y, 0.11, -0.02, -0.03, 0.5).unwrap();
        let changed = c.port_resistance(y).unwrap();
        assert!(changed != 1.0 && changed != adapted);
        assert!(c.set_y_parameters(r, 0.1, 0.0, 0.0, 0.1).is_err());
    }

    // -----------------------------------------------------------------------
    // State and measurements
    // -----------------------------------------------------------------------

    /// RC divider under an ideal source; returns `(circuit, cap, series, root)`.
    fn rc_circuit() -> (Circuit<f64>, NodeId, NodeId, NodeId) {
        let mut c = Circuit::<f64>::new();
        let r = c.add_resistor(1000.0).unwrap();
        let cap = c.add_capacitor(1.0e-6, 48_000.0).unwrap();
        let s = c.add_series(r, cap).unwrap();
        let inv = c.add_inverter(s).unwrap();
        let root = c.add_ideal_voltage_source(inv).unwrap();
        (c, cap, s, root)
    }

    fn drive(c: &mut Circuit<f64>, root: NodeId, v: f64, samples: usize) {
        c.set_voltage(root, v).unwrap();
        for _ in 0..samples {
            c.process(root).unwrap();
        }
    }

    #[test]
    fn snap_to_zero_flushes_tiny_capacitor_state() {
        let (mut c, cap, s, root) = rc_circuit();

        drive(&mut c, root, 1.0, 16);
        let held = c.reflected(cap).unwrap();
        c.snap_to_zero();
        assert_eq!(c.reflected(cap).unwrap(), held);

        c.reset();
        drive(&mut c, root, 1.0e-10, 16);
        assert!(c.reflected(cap).unwrap() != 0.0);
        c.snap_to_zero();
        assert_eq!(c.reflected(cap).unwrap(), 0.0);

        drive(&mut c, root, 1.0e-10, 16);
        c.node(s).unwrap().snap_to_zero();
        assert_eq!(c.reflected(cap).unwrap(), 0.0);
    }

    #[test]
    fn node_handle_root_current_uses_child_resistance() {
        let mut c = Circuit::<f64>::new();
        let r1 = c.add_resistor(10_000.0).unwrap();
        let r2 = c.add_resistor(10_000.0).unwrap();
        let s = c.add_series(r1, r2).unwrap();
        let inv = c.add_inverter(s).unwrap();
        let vs = c.add_ideal_voltage_source(inv).unwrap();
        c.set_voltage(vs, 10.0).unwrap();
        c.process(vs).unwrap();

        let expected = c.current(vs).unwrap();
        assert_relative_eq!(expected.abs(), 10.0 / 20_000.0, max_relative = 1e-12);
        assert_eq!(c.node(vs).unwrap().current(), expected);
    }

    #[test]
    fn detached_node_keeps_its_port() {
        let mut c = Circuit::<f64>::new();
        let r1 = c.add_resistor(1000.0).unwrap();
        let r2 = c.add_resistor(2000.0).unwrap();
        let s = c.add_series(r1, r2).unwrap();

        let kind = c.detach(s);
        assert_eq!(c.kind(s).unwrap(), "detached");
        assert_eq!(c.port_resistance(s).unwrap(), 3000.0);
        c.attach(s, kind);
        assert_eq!(c.kind(s).unwrap(), "series");
    }
}
