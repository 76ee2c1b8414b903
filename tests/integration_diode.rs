//! Closed-form diode roots against a Newton-Raphson solve of the same
//! resistor-diode loop.
//!
//! With a resistive source driving the diode directly, the loop equation is
//! `Vs = R·Id(v) + v`; the Wright Omega closed form must land on the same
//! operating point to within the ω4 approximation error.

use wavekernel::elements::{
    Diode, DiodePair, DiodeQuality, ResistiveVoltageSource, WdfRoot,
};
use wavekernel::Circuit;

const IS: f64 = 2.52e-9;
const VT: f64 = 0.02585;
const R: f64 = 1000.0;
const TOLERANCE: f64 = 2.0e-3;

const SWEEP: [f64; 11] = [-2.0, -1.0, -0.5, -0.1, 0.0, 0.1, 0.3, 0.5, 1.0, 2.0, 5.0];

/// Solve `v + R·Is·(exp(v/Vt) - 1) = vs`.
fn newton_diode(vs: f64) -> f64 {
    let mut v = 0.3_f64.min(vs);
    for _ in 0..200 {
        let e = (v / VT).exp();
        let f = v + R * IS * (e - 1.0) - vs;
        let df = 1.0 + R * IS / VT * e;
        v -= f / df;
    }
    v
}

/// Solve `v + 2·R·Is·sinh(v/Vt) = vs`.
fn newton_pair(vs: f64) -> f64 {
    let mut v = 0.0_f64;
    for _ in 0..200 {
        let f = v + 2.0 * R * IS * (v / VT).sinh() - vs;
        let df = 1.0 + 2.0 * R * IS / VT * (v / VT).cosh();
        v -= f / df;
    }
    v
}

#[test]
fn single_diode_tracks_newton() {
    let mut d = Diode::with_parameters(ResistiveVoltageSource::with_resistance(R), IS, VT, 1.0);
    for vs in SWEEP {
        d.update_next(|src| {
            src.set_voltage(vs);
            false
        });
        d.process();
        let v = d.voltage();
        let expected = newton_diode(vs);
        assert!(
            (v - expected).abs() < TOLERANCE,
            "Vs={vs}: closed form {v:.6}, newton {expected:.6}"
        );
    }
}

#[test]
fn diode_pair_tracks_newton_for_both_qualities() {
    for quality in [DiodeQuality::Good, DiodeQuality::Best] {
        let mut d = DiodePair::with_parameters(
            ResistiveVoltageSource::with_resistance(R),
            IS,
            VT,
            1.0,
        )
        .with_quality(quality);
        for vs in SWEEP {
            d.update_next(|src| {
                src.set_voltage(vs);
                false
            });
            d.process();
            let v = d.voltage();
            let expected = newton_pair(vs);
            assert!(
                (v - expected).abs() < TOLERANCE,
                "{quality:?} Vs={vs}: closed form {v:.6}, newton {expected:.6}"
            );
        }
    }
}

#[test]
fn diode_pair_is_odd_symmetric() {
    let mut d = DiodePair::with_parameters(ResistiveVoltageSource::with_resistance(R), IS, VT, 1.0);
    for vs in [0.2, 0.6, 1.5] {
        d.update_next(|src| {
            src.set_voltage(vs);
            false
        });
        d.process();
        let pos = d.voltage();
        d.update_next(|src| {
            src.set_voltage(-vs);
            false
        });
        d.process();
        let neg = d.voltage();
        assert!((pos + neg).abs() < 1e-12, "Vs={vs}: {pos} vs {neg}");
    }
}

#[test]
fn series_diodes_raise_forward_voltage() {
    let forward = |n: f64| {
        let mut d =
            Diode::with_parameters(ResistiveVoltageSource::with_resistance(R), IS, VT, n);
        d.update_next(|src| {
            src.set_voltage(5.0);
            false
        });
        d.process();
        d.voltage()
    };
    let one = forward(1.0);
    let two = forward(2.0);
    assert!(two > 1.8 * one, "two diodes {two} vs one {one}");
}

#[test]
fn runtime_diode_tracks_newton() {
    let mut ckt = Circuit::<f64>::new();
    let src = ckt.add_resistive_voltage_source(R).unwrap();
    let root = ckt.add_diode(src, IS, VT, 1.0).unwrap();
    for vs in SWEEP {
        ckt.set_voltage(src, vs).unwrap();
        ckt.process(root).unwrap();
        let v = ckt.voltage(root).unwrap();
        assert!((v - newton_diode(vs)).abs() < TOLERANCE, "Vs={vs}: {v}");
        assert!((ckt.voltage(src).unwrap() - v).abs() < 1e-12);
    }
}

#[test]
fn runtime_diode_parameter_change_reprepares() {
    let mut ckt = Circuit::<f64>::new();
    let src = ckt.add_resistive_voltage_source(R).unwrap();
    let root = ckt.add_diode(src, IS, VT, 1.0).unwrap();
    ckt.set_voltage(src, 5.0).unwrap();
    ckt.process(root).unwrap();
    let before = ckt.voltage(root).unwrap();

    ckt.set_diode_parameters(root, IS * 100.0, VT, 1.0).unwrap();
    ckt.process(root).unwrap();
    let after = ckt.voltage(root).unwrap();
    assert!(after < before - 0.05, "larger Is should lower Vf: {before} -> {after}");
    assert!(ckt.set_diode_parameters(root, -1.0, VT, 1.0).is_err());
}

// ---------------------------------------------------------------------------
// Static I-V curve
// ---------------------------------------------------------------------------

const IV_IS: f64 = 1.0e-9;

/// Drive a diode pair through a 1k source over a -5..5 V ramp and return
/// `(drive, relative current error)` against `2·Is·sinh(v/Vt)`.
fn pair_iv_errors(quality: DiodeQuality) -> Vec<(f64, f64)> {
    let mut d = DiodePair::with_parameters(
        ResistiveVoltageSource::with_resistance(R),
        IV_IS,
        VT,
        1.0,
    )
    .with_quality(quality);

    (0..=1000)
        .map(|k| -5.0 + 0.01 * k as f64)
        .filter(|vs| *vs != 0.0)
        .map(|vs| {
            d.update_next(|src| {
                src.set_voltage(vs);
                false
            });
            d.process();
            let v = d.voltage();
            let i = d.current();
            let expected = 2.0 * IV_IS * (v / VT).sinh();
            (vs, ((i - expected) / expected).abs())
        })
        .collect()
}

fn worst(errors: &[(f64, f64)], min_drive: f64) -> (f64, f64) {
    errors
        .iter()
        .copied()
        .filter(|(vs, _)| vs.abs() >= min_drive)
        .fold((0.0, 0.0), |w, e| if e.1 > w.1 { e } else { w })
}

#[test]
fn diode_pair_iv_within_one_percent_when_conducting() {
    for quality in [DiodeQuality::Good, DiodeQuality::Best] {
        let (vs, err) = worst(&pair_iv_errors(quality), 0.999);
        assert!(err < 0.01, "{quality:?}: {:.3}% at Vs={vs}", err * 100.0);
    }
}

#[test]
fn diode_pair_iv_bounded_through_the_knee() {
    // Around the knee a millivolt of ω4 error is a few percent of current.
    let (vs, err) = worst(&pair_iv_errors(DiodeQuality::Best), 0.0);
    assert!(err < 0.06, "Best: {:.3}% at Vs={vs}", err * 100.0);

    let (vs, err) = worst(&pair_iv_errors(DiodeQuality::Good), 0.1);
    assert!(err < 0.06, "Good: {:.3}% at Vs={vs}", err * 100.0);
}
