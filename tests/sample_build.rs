// tests/sample_build.rs
use lightcurve_dataset::sample::median;
use lightcurve_dataset::{build, EmptySeriesError, RawSample};

fn valid(ts: f64, flux: f64) -> RawSample {
    RawSample::new(ts, flux, true)
}

#[test]
fn every_flux_is_divided_by_the_median() {
    let fluxes = [812.0, 790.5, 805.25, 799.0, 801.75];
    let raw: Vec<RawSample> = fluxes
        .iter()
        .enumerate()
        .map(|(i, &f)| valid(i as f64 * 0.02, f))
        .collect();

    let s = build(&raw, 500).unwrap();
    let m = median(&fluxes).unwrap();
    assert_eq!(m, 801.75);
    for (p, f) in s.points.iter().zip(fluxes) {
        assert!((p.flux - f / m).abs() < 1e-12);
    }

    // Odd count: exactly one normalized value sits on the median.
    let norm: Vec<f64> = s.points.iter().map(|p| p.flux).collect();
    assert!((median(&norm).unwrap() - 1.0).abs() < 1e-12);
}

#[test]
fn cap_three_of_five_returns_first_three_in_order() {
    let raw: Vec<RawSample> = vec![
        valid(1.0, 4.0),
        valid(2.0, 2.0),
        valid(3.0, 8.0),
        valid(4.0, 6.0),
        valid(5.0, 10.0),
    ];
    let s = build(&raw, 3).unwrap();
    assert_eq!(s.len(), 3);
    // Median over all five filtered samples is 6.
    let expected = [(4.0 / 6.0, 1.0), (2.0 / 6.0, 2.0), (8.0 / 6.0, 3.0)];
    for (p, (f, t)) in s.points.iter().zip(expected) {
        assert!((p.flux - f).abs() < 1e-12);
        assert_eq!(p.timestamp, t);
    }
}

#[test]
fn invalid_samples_never_appear_or_count() {
    let raw = vec![
        valid(1.0, 10.0),
        RawSample::new(2.0, f64::NAN, false),
        valid(3.0, 30.0),
    ];
    let s = build(&raw, 500).unwrap();
    let rows: Vec<(f64, f64)> = s.points.iter().map(|p| (p.flux, p.timestamp)).collect();
    assert_eq!(rows, vec![(0.5, 1.0), (1.5, 3.0)]);
}

#[test]
fn invalid_samples_do_not_consume_the_cap() {
    let raw = vec![
        RawSample::new(1.0, 5.0, false),
        valid(2.0, 5.0),
        RawSample::new(3.0, 5.0, false),
        valid(4.0, 5.0),
        valid(5.0, 5.0),
    ];
    let s = build(&raw, 2).unwrap();
    let ts: Vec<f64> = s.points.iter().map(|p| p.timestamp).collect();
    assert_eq!(ts, vec![2.0, 4.0]);
}

#[test]
fn zero_valid_samples_is_an_error_not_nan() {
    let raw = vec![
        RawSample::new(1.0, f64::NAN, false),
        RawSample::new(2.0, f64::NAN, false),
    ];
    match build(&raw, 500) {
        Err(EmptySeriesError::NoValidSamples { dropped }) => assert_eq!(dropped, 2),
        other => panic!("expected NoValidSamples, got {other:?}"),
    }
}

#[test]
fn overflowing_normalized_flux_is_an_empty_series_error() {
    let raw = vec![valid(1.0, 1e-300), valid(2.0, 1e-300), valid(3.0, 1e300)];
    assert_eq!(
        build(&raw, 500).unwrap_err(),
        EmptySeriesError::NonFinite { index: 2 }
    );
}

#[test]
fn overflow_past_the_cap_is_not_written_and_not_an_error() {
    let raw = vec![valid(1.0, 1e-300), valid(2.0, 1e-300), valid(3.0, 1e300)];
    let s = build(&raw, 2).unwrap();
    assert_eq!(s.len(), 2);
    assert!(s.points.iter().all(|p| p.flux == 1.0));
}

#[test]
fn nan_flux_flagged_valid_is_rejected_before_the_median() {
    let raw = vec![
        valid(1.0, 10.0),
        RawSample::new(2.0, f64::NAN, true),
        valid(3.0, 30.0),
    ];
    assert_eq!(
        build(&raw, 500).unwrap_err(),
        EmptySeriesError::NonFinite { index: 1 }
    );
}

#[test]
fn non_finite_timestamp_is_rejected() {
    let raw = vec![valid(1.0, 10.0), valid(f64::INFINITY, 10.0)];
    assert_eq!(
        build(&raw, 500).unwrap_err(),
        EmptySeriesError::NonFinite { index: 1 }
    );
}

#[test]
fn non_finite_invalid_samples_are_simply_dropped() {
    let raw = vec![
        RawSample::new(0.0, f64::INFINITY, false),
        valid(1.0, 4.0),
        RawSample::new(f64::NAN, f64::NAN, false),
    ];
    let s = build(&raw, 500).unwrap();
    assert_eq!(s.median_flux, 4.0);
    assert_eq!(s.len(), 1);
}

#[test]
fn median_of_two_huge_values_does_not_overflow() {
    assert_eq!(median(&[1.5e308, 1.5e308]), Some(1.5e308));
    let raw = vec![valid(1.0, 1.5e308), valid(2.0, 1.5e308)];
    let s = build(&raw, 500).unwrap();
    assert_eq!(s.median_flux, 1.5e308);
    assert!(s.points.iter().all(|p| p.flux == 1.0));
}
