//! WaveKernel: Wave Digital Filter circuit engine for real-time audio.
//!
//! Circuits are trees of one-port elements joined by scattering adaptors and
//! terminated by a single non-adaptable root. Every sample, waves travel up
//! from the leaves to the root and back down; component changes re-derive
//! port resistances toward the root.
//!
//! # Modules
//!
//! - [`sample`]: generic sample type: `f32`, `f64`, or SIMD lanes
//!   (`wide::f32x8`, `wide::f64x4`)
//! - [`omega`]: fast `log`/`exp` and the Wright Omega approximations
//! - [`elements`]: wave ports, capability traits, linear leaves, sources,
//!   switches and the diode roots
//! - [`tree`]: series, parallel, polarity-inverter and y-parameter adaptors
//! - [`rtype`]: R-type N-port adaptors driven by a scattering matrix
//! - [`circuit`]: runtime graph assembled from node ids at setup time
//! - [`circuits`]: ready-to-use processors (diode clipper, RC lowpass)
//! - [`config`]: parameter records for the prebuilt processors
//! - [`error`]: wiring and configuration errors
//!
//! # Example
//!
//! ```
//! use wavekernel::elements::{Capacitor, IdealVoltageSource, Resistor, WdfElement, WdfRoot};
//! use wavekernel::tree::{PolarityInverter, Series};
//!
//! let rc = Series::new(Resistor::new(1000.0_f64), Capacitor::with_sample_rate(1.0e-6, 48_000.0));
//! let mut vs = IdealVoltageSource::new(PolarityInverter::new(rc));
//!
//! vs.set_voltage(1.0);
//! for _ in 0..480 {
//!     vs.process();
//! }
//! let v_out = vs.next().port1().port2().voltage();
//! assert!((v_out - 1.0).abs() < 1e-3);
//! ```

pub mod circuit;
pub mod circuits;
pub mod config;
pub mod elements;
pub mod error;
pub mod omega;
pub mod rtype;
pub mod sample;
pub mod tree;

pub use circuit::{Circuit, NodeId};
pub use error::WdfError;
pub use sample::{ScalarFloat, WdfSample};

/// Sample-by-sample audio processor built on a WDF circuit.
pub trait CircuitProcessor<T> {
    /// Process a single sample.
    fn process(&mut self, input: T) -> T;

    /// Set sample rate (call before processing).
    fn set_sample_rate(&mut self, rate: T);

    /// Reset all internal state.
    fn reset(&mut self);
}
