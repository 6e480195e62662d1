// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Great-circle distance between two coordinates.

use crate::types::GeoPoint;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters between `a` and `b`.
pub fn haversine(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let d_phi = (b.lat - a.lat).to_radians();
    let d_lambda = (b.lon - a.lon).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    EARTH_RADIUS_M * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn same_point_is_zero() {
        let origin = GeoPoint::new(0.0, 0.0);
        assert_eq!(haversine(origin, origin), 0.0);
    }

    #[test]
    fn one_degree_of_longitude_at_equator() {
        let d = haversine(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0));
        assert!((d - 111_195.0).abs() < 111_195.0 * 0.01, "got {d}");
    }

    #[test]
    fn campus_scale_distance() {
        // Roughly 111 m per 0.001 degree of latitude.
        let gate = GeoPoint::new(6.0653, 37.5601);
        let dorm = GeoPoint::new(6.0663, 37.5601);
        let d = haversine(gate, dorm);
        assert!(d > 100.0 && d < 120.0, "got {d}");
    }

    proptest! {
        #[test]
        fn symmetric_and_non_negative(
            lat1 in -89.0f64..89.0, lon1 in -179.0f64..179.0,
            lat2 in -89.0f64..89.0, lon2 in -179.0f64..179.0,
        ) {
            let a = GeoPoint::new(lat1, lon1);
            let b = GeoPoint::new(lat2, lon2);
            let ab = haversine(a, b);
            let ba = haversine(b, a);
            prop_assert!(ab >= 0.0);
            prop_assert!((ab - ba).abs() < 1e-6);
        }
    }
}
