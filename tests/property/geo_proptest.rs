//! Property-based tests for haversine distance and the movement filter
//!
//! Uses proptest to generate random inputs and verify properties

use fieldsync::shared::{haversine_km, MovementFilter, Position};
use proptest::prelude::*;

fn latitude() -> impl Strategy<Value = f64> {
    -89.9f64..89.9
}

fn longitude() -> impl Strategy<Value = f64> {
    -179.9f64..179.9
}

proptest! {
    #[test]
    fn test_distance_is_symmetric(
        lat1 in latitude(), lng1 in longitude(),
        lat2 in latitude(), lng2 in longitude(),
    ) {
        let there = haversine_km(lat1, lng1, lat2, lng2);
        let back = haversine_km(lat2, lng2, lat1, lng1);
        prop_assert!((there - back).abs() < 1e-9);
    }

    #[test]
    fn test_distance_is_bounded(
        lat1 in latitude(), lng1 in longitude(),
        lat2 in latitude(), lng2 in longitude(),
    ) {
        let d = haversine_km(lat1, lng1, lat2, lng2);
        // Half the circumference is the farthest two points can be.
        prop_assert!(d >= 0.0);
        prop_assert!(d <= std::f64::consts::PI * 6371.0 + 1e-6);
    }

    #[test]
    fn test_same_point_is_zero(lat in latitude(), lng in longitude()) {
        prop_assert!(haversine_km(lat, lng, lat, lng).abs() < 1e-9);
    }

    #[test]
    fn test_filter_agrees_with_distance(
        lat in latitude(), lng in longitude(),
        d_lat in -0.001f64..0.001, d_lng in -0.001f64..0.001,
        threshold_m in 1.0f64..100.0,
    ) {
        let last = Position::new(lat, lng);
        let next = Position::new(lat + d_lat, lng + d_lng);
        let filter = MovementFilter::new(threshold_m);

        let expected = last.distance_km(&next) >= threshold_m / 1000.0;
        prop_assert_eq!(filter.is_significant(Some(&last), &next), expected);
        prop_assert!(filter.is_significant(None, &next));
    }
}
