//! Property tests for the curve model: any valid control-point sequence
//! yields an interpolant that pins both endpoints and never decreases.

use mousestick::curve::{validate_points, ControlPoint, MonotoneCurve};
use proptest::prelude::*;

prop_compose! {
    /// Arbitrary valid profile: segment gaps guarantee the minimum x
    /// spacing, interior ys are sorted so the data is non-decreasing.
    fn arb_points()(
        gaps in prop::collection::vec(0.1f32..1.0, 1..8),
        raw_ys in prop::collection::vec(0.0f32..1.0, 7),
    ) -> Vec<ControlPoint> {
        let segments = gaps.len();
        let total: f32 = gaps.iter().sum();

        let mut interior_ys: Vec<f32> = raw_ys[..segments - 1].to_vec();
        interior_ys.sort_by(|a, b| a.partial_cmp(b).expect("finite"));

        let mut points = vec![ControlPoint::new(0.0, 0.0)];
        let mut acc = 0.0f32;
        for (gap, y) in gaps[..segments - 1].iter().zip(&interior_ys) {
            acc += gap;
            points.push(ControlPoint::new(acc / total, *y));
        }
        points.push(ControlPoint::new(1.0, 1.0));
        points
    }
}

proptest! {
    #[test]
    fn interpolant_pins_endpoints_and_never_decreases(points in arb_points()) {
        prop_assert!(validate_points(&points).is_ok());
        let curve = MonotoneCurve::new(&points).expect("validated points");

        prop_assert!(curve.eval(0.0).abs() < 1e-6);
        prop_assert!((curve.eval(1.0) - 1.0).abs() < 1e-6);

        let mut prev = 0.0f32;
        for i in 0..=400 {
            let y = curve.eval(i as f32 / 400.0);
            prop_assert!(y >= prev - 1e-5, "decrease at sample {}: {} < {}", i, y, prev);
            prop_assert!((0.0..=1.0).contains(&y));
            prev = y;
        }
    }

    #[test]
    fn lut_is_monotone_and_bounded(points in arb_points()) {
        let lut = MonotoneCurve::new(&points).expect("validated points").to_lut();
        let mut prev = 0.0f32;
        for i in 0..=1000 {
            let y = lut.lookup(i as f32 / 1000.0);
            prop_assert!(y >= prev - 1e-5);
            prop_assert!((0.0..=1.0).contains(&y));
            prev = y;
        }
    }
}
