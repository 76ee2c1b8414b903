//! Construction-time parameter records for the prebuilt circuits.
//!
//! Records hold plain `f64` values so hosts can keep them in their own
//! preset storage (enable the `serde` feature to derive
//! `Serialize`/`Deserialize`). [`validate`](DiodeClipperConfig::validate)
//! rejects non-physical values before [`build`](DiodeClipperConfig::build)
//! turns a record into a processor for a chosen sample type.

use tracing::debug;

use crate::circuits::{DiodeClipper, RcLowpass};
use crate::elements::{DiodeModel, DiodeQuality};
use crate::error::{Result, WdfError};
use crate::sample::WdfSample;

fn positive(name: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(WdfError::InvalidValue { name, value })
    }
}

/// Parameters for a [`DiodeClipper`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DiodeClipperConfig {
    /// Series resistance (Ω).
    pub resistance: f64,
    /// Shunt capacitance (F).
    pub capacitance: f64,
    pub diode: DiodeModel,
    pub quality: DiodeQuality,
    /// Sample rate (Hz).
    pub sample_rate: f64,
}

impl Default for DiodeClipperConfig {
    fn default() -> Self {
        Self {
            resistance: 4700.0,
            capacitance: 47.0e-9,
            diode: DiodeModel::silicon(),
            quality: DiodeQuality::Best,
            sample_rate: 48_000.0,
        }
    }
}

impl DiodeClipperConfig {
    pub fn validate(&self) -> Result<()> {
        positive("resistance", self.resistance)?;
        positive("capacitance", self.capacitance)?;
        positive("saturation current", self.diode.is)?;
        positive("thermal voltage", self.diode.n_vt)?;
        positive("sample rate", self.sample_rate)
    }

    pub fn build<T: WdfSample>(&self) -> Result<DiodeClipper<T>> {
        self.validate()?;
        debug!(config = ?self, "building diode clipper");
        let mut clipper = DiodeClipper::new(
            T::from_f64(self.resistance),
            T::from_f64(self.capacitance),
            self.diode,
            T::from_f64(self.sample_rate),
        );
        clipper.set_quality(self.quality);
        Ok(clipper)
    }
}

/// Parameters for an [`RcLowpass`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RcLowpassConfig {
    /// -3 dB frequency (Hz).
    pub cutoff: f64,
    /// Capacitance (F); the resistor is derived from it and `cutoff`.
    pub capacitance: f64,
    /// Sample rate (Hz).
    pub sample_rate: f64,
}

impl Default for RcLowpassConfig {
    fn default() -> Self {
        Self {
            cutoff: 1000.0,
            capacitance: 1.0e-6,
            sample_rate: 48_000.0,
        }
    }
}

impl RcLowpassConfig {
    pub fn validate(&self) -> Result<()> {
        positive("cutoff", self.cutoff)?;
        positive("capacitance", self.capacitance)?;
        positive("sample rate", self.sample_rate)?;
        if self.cutoff >= self.sample_rate / 2.0 {
            return Err(WdfError::InvalidValue {
                name: "cutoff above Nyquist",
                value: self.cutoff,
            });
        }
        Ok(())
    }

    pub fn build<T: WdfSample>(&self) -> Result<RcLowpass<T>> {
        self.validate()?;
        debug!(config = ?self, "building RC lowpass");
        Ok(RcLowpass::new(
            T::from_f64(self.cutoff),
            T::from_f64(self.capacitance),
            T::from_f64(self.sample_rate),
        ))
    }
}
