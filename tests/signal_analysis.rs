//! Shared signal utilities for integration tests.
//!
//! Sine and step generators, level measurements and a few helpers for
//! driving processors over a buffer. Pure Rust math, no FFT.

#![allow(dead_code)]

use wavekernel::CircuitProcessor;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const SAMPLE_RATE: f64 = 48_000.0;

/// Samples dropped before measuring steady-state levels.
pub const WARMUP: usize = 1000;

// ---------------------------------------------------------------------------
// Signal generators
// ---------------------------------------------------------------------------

/// Generate a sine wave at a given amplitude.
pub fn sine_at(freq_hz: f64, amplitude: f64, duration_secs: f64, sample_rate: f64) -> Vec<f64> {
    let n = (duration_secs * sample_rate) as usize;
    (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate;
            amplitude * (2.0 * std::f64::consts::PI * freq_hz * t).sin()
        })
        .collect()
}

/// Unit-amplitude sine.
pub fn sine(freq_hz: f64, duration_secs: f64, sample_rate: f64) -> Vec<f64> {
    sine_at(freq_hz, 1.0, duration_secs, sample_rate)
}

/// Constant `level` for `n` samples.
pub fn step(level: f64, n: usize) -> Vec<f64> {
    vec![level; n]
}

// ---------------------------------------------------------------------------
// Measurements
// ---------------------------------------------------------------------------

pub fn rms(buf: &[f64]) -> f64 {
    if buf.is_empty() {
        return 0.0;
    }
    (buf.iter().map(|x| x * x).sum::<f64>() / buf.len() as f64).sqrt()
}

/// Peak absolute amplitude.
pub fn peak(buf: &[f64]) -> f64 {
    buf.iter().fold(0.0f64, |m, x| m.max(x.abs()))
}

pub fn to_db(ratio: f64) -> f64 {
    20.0 * ratio.log10()
}

/// Steady-state gain of `output` relative to `input`, in dB.
pub fn gain_db(input: &[f64], output: &[f64], skip: usize) -> f64 {
    to_db(rms(&output[skip..]) / rms(&input[skip..]))
}

// ---------------------------------------------------------------------------
// Processing
// ---------------------------------------------------------------------------

/// Run `input` through a processor one sample at a time.
pub fn process_buffer<P: CircuitProcessor<f64> + ?Sized>(proc: &mut P, input: &[f64]) -> Vec<f64> {
    input.iter().map(|&x| proc.process(x)).collect()
}

/// Run `input` through a per-sample closure.
pub fn process_with(input: &[f64], mut f: impl FnMut(f64) -> f64) -> Vec<f64> {
    input.iter().map(|&x| f(x)).collect()
}

// ---------------------------------------------------------------------------
// Assertions
// ---------------------------------------------------------------------------

/// Assert that all samples are finite and bounded.
pub fn assert_healthy(buf: &[f64], name: &str, max_peak: f64) {
    assert!(
        buf.iter().all(|x| x.is_finite()),
        "{name}: output contains NaN/inf"
    );
    let p = peak(buf);
    assert!(
        p < max_peak,
        "{name}: output too loud (peak={p:.4}, max={max_peak})"
    );
}

/// Assert `actual` lies within `tol` of `expected`.
pub fn assert_near(actual: f64, expected: f64, tol: f64, msg: &str) {
    assert!(
        (actual - expected).abs() <= tol,
        "{msg}: expected {expected:.6} ± {tol}, got {actual:.6}"
    );
}
