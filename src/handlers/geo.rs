use crate::models::all_models::Location;
use geoutils::Location as GeoPoint;

/// Haversine distance in meters between two stored locations.
pub fn distance_meters(a: &Location, b: &Location) -> f64 {
    let from = GeoPoint::new(a.lat, a.lng);
    let to = GeoPoint::new(b.lat, b.lng);
    from.haversine_distance_to(&to).meters()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(lat: f64, lng: f64) -> Location {
        Location {
            lat,
            lng,
            address: String::new(),
        }
    }

    #[test]
    fn same_point_is_zero_distance() {
        let p = loc(12.9716, 77.5946);
        assert!(distance_meters(&p, &p).abs() < 1e-6);
    }

    #[test]
    fn bangalore_to_mysore_is_roughly_130km() {
        let blr = loc(12.9716, 77.5946);
        let mys = loc(12.2958, 76.6394);
        let d = distance_meters(&blr, &mys);
        assert!(d > 120_000.0 && d < 150_000.0, "got {}", d);
    }
}
