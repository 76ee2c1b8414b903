//! Prebuilt circuits on the compile-time graph.
//!
//! Each maps physical parameters onto a fixed WDF tree and exposes the
//! [`CircuitProcessor`] trait so hosts can drive it sample by sample.

use std::f64::consts::PI;

use crate::elements::{
    Capacitor, DiodeModel, DiodePair, DiodeQuality, IdealVoltageSource, ResistiveVoltageSource,
    Resistor, WdfElement, WdfRoot,
};
use crate::sample::WdfSample;
use crate::tree::{Parallel, PolarityInverter, Series};
use crate::CircuitProcessor;

// ---------------------------------------------------------------------------
// Diode clipper
// ---------------------------------------------------------------------------

type ClipperTree<T> = PolarityInverter<
    T,
    Parallel<T, Series<T, ResistiveVoltageSource<T>, Resistor<T>>, Capacitor<T>>,
>;

/// First-order diode clipper.
///
/// ```text
///  in ── R ──┬──────┬── out
///            C     D1 ▲▼ D2
///  gnd ──────┴──────┘
/// ```
///
/// The input drives a voltage source in series with `R`; the capacitor and
/// an anti-parallel diode pair sit across the output.
#[derive(Debug, Clone, Copy)]
pub struct DiodeClipper<T: WdfSample> {
    root: DiodePair<T, ClipperTree<T>>,
}

impl<T: WdfSample> DiodeClipper<T> {
    pub fn new(resistance: T, capacitance: T, model: DiodeModel, sample_rate: T) -> Self {
        let tree = PolarityInverter::new(Parallel::new(
            Series::new(ResistiveVoltageSource::new(), Resistor::new(resistance)),
            Capacitor::with_sample_rate(capacitance, sample_rate),
        ));
        Self {
            root: DiodePair::from_model(tree, model),
        }
    }

    pub fn set_resistance(&mut self, resistance: T) {
        self.root.update_next(|inv| {
            inv.update_port1(|p| {
                p.update_port1(|s| s.update_port2(|r| r.set_resistance_value(resistance)))
            })
        });
    }

    pub fn set_capacitance(&mut self, capacitance: T) {
        self.root.update_next(|inv| {
            inv.update_port1(|p| p.update_port2(|c| c.set_capacitance_value(capacitance)))
        });
    }

    pub fn set_diode_model(&mut self, model: DiodeModel) {
        self.root
            .set_diode_parameters(T::from_f64(model.is), T::from_f64(model.n_vt), T::one());
    }

    pub fn set_quality(&mut self, quality: DiodeQuality) {
        self.root.set_quality(quality);
    }

    pub fn quality(&self) -> DiodeQuality {
        self.root.quality()
    }

    /// Output voltage, in phase with the input. The series junction flips
    /// the source polarity, so the capacitor sits at `-out`.
    fn output(&self) -> T {
        -self.root.next().port1().port2().voltage()
    }
}

impl<T: WdfSample> CircuitProcessor<T> for DiodeClipper<T> {
    #[inline]
    fn process(&mut self, input: T) -> T {
        self.root.update_next(|inv| {
            inv.update_port1(|p| {
                p.update_port1(|s| {
                    s.update_port1(|vs| {
                        vs.set_voltage(input);
                        false
                    })
                })
            })
        });
        self.root.process();
        self.output()
    }

    fn set_sample_rate(&mut self, rate: T) {
        self.root
            .update_next(|inv| inv.update_port1(|p| p.update_port2(|c| c.prepare(rate))));
    }

    fn reset(&mut self) {
        self.root.reset();
    }
}

// ---------------------------------------------------------------------------
// RC lowpass
// ---------------------------------------------------------------------------

type LowpassTree<T> = PolarityInverter<T, Series<T, Resistor<T>, Capacitor<T>>>;

/// First-order RC lowpass, output across the capacitor.
///
/// `R = 1 / (2π·fc·C)`
#[derive(Debug, Clone, Copy)]
pub struct RcLowpass<T: WdfSample> {
    root: IdealVoltageSource<T, LowpassTree<T>>,
    cutoff: T,
    capacitance: T,
}

impl<T: WdfSample> RcLowpass<T> {
    pub fn new(cutoff: T, capacitance: T, sample_rate: T) -> Self {
        let resistance = Self::resistance_for(cutoff, capacitance);
        let tree = PolarityInverter::new(Series::new(
            Resistor::new(resistance),
            Capacitor::with_sample_rate(capacitance, sample_rate),
        ));
        Self {
            root: IdealVoltageSource::new(tree),
            cutoff,
            capacitance,
        }
    }

    fn resistance_for(cutoff: T, capacitance: T) -> T {
        (T::from_f64(2.0 * PI) * cutoff * capacitance).recip()
    }

    pub fn cutoff(&self) -> T {
        self.cutoff
    }

    pub fn set_cutoff(&mut self, cutoff: T) {
        self.cutoff = cutoff;
        let resistance = Self::resistance_for(cutoff, self.capacitance);
        self.root.update_next(|inv| {
            inv.update_port1(|s| s.update_port1(|r| r.set_resistance_value(resistance)))
        });
    }

    pub fn resistance(&self) -> T {
        self.root.next().port1().port1().resistance()
    }
}

impl<T: WdfSample> CircuitProcessor<T> for RcLowpass<T> {
    #[inline]
    fn process(&mut self, input: T) -> T {
        self.root.set_voltage(input);
        self.root.process();
        self.root.next().port1().port2().voltage()
    }

    fn set_sample_rate(&mut self, rate: T) {
        self.root
            .update_next(|inv| inv.update_port1(|s| s.update_port2(|c| c.prepare(rate))));
    }

    fn reset(&mut self) {
        self.root.reset();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
