use crate::algorithm::{Algorithm, Degrees, MEAN_EARTH_RADIUS};
use crate::position::Coords;
use crate::utils::Distance;

pub(crate) struct Spherical {}

impl Algorithm for Spherical {
    fn distance_to(&self, from: &Coords, to: &Coords) -> Distance {
        let φ1 = from.lat.to_radians();
        let φ2 = to.lat.to_radians();
        let δφ = φ2 - φ1;
        let δλ = (to.lon - from.lon).to_radians();

        let a = (δφ / 2.0).sin().powi(2) + φ1.cos() * φ2.cos() * (δλ / 2.0).sin().powi(2);
        let δ = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        MEAN_EARTH_RADIUS * δ
    }

    fn heading_to(&self, from: &Coords, to: &Coords) -> f64 {
        let φ1 = from.lat.to_radians();
        let φ2 = to.lat.to_radians();
        let δλ = (to.lon - from.lon).to_radians();

        let y = δλ.sin() * φ2.cos();
        let x = φ1.cos() * φ2.sin() - φ1.sin() * φ2.cos() * δλ.cos();
        let θ = y.atan2(x);

        θ.to_degrees().wrap360()
    }

    fn distance_and_heading_to(&self, from: &Coords, to: &Coords) -> (Distance, f64) {
        (self.distance_to(from, to), self.heading_to(from, to))
    }

    fn destination(&self, from: &Coords, heading: f64, distance: &Distance) -> Coords {
        let φ1 = from.lat.to_radians();
        let λ1 = from.lon.to_radians();
        let θ = heading.to_radians();

        let δ = distance.m() / MEAN_EARTH_RADIUS.m();

        let φ2 = (φ1.sin() * δ.cos() + φ1.cos() * δ.sin() * θ.cos()).asin();
        let λ2 = λ1
            + (θ.sin() * δ.sin() * φ1.cos()).atan2(δ.cos() - φ1.sin() * φ2.sin());

        Coords {
            lat: φ2.to_degrees(),
            lon: λ2.to_degrees().resolve180(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equator_degree() {
        let a = Coords { lat: 0.0, lon: 0.0 };
        let b = Coords { lat: 0.0, lon: 1.0 };
        let (d, h) = Spherical {}.distance_and_heading_to(&a, &b);
        assert!((d.nm() - 60.0).abs() < 0.11);
        assert!((h - 90.0).abs() < 1e-9);
    }

    #[test]
    fn destination_round_trip() {
        let from = Coords { lat: 47.0, lon: -3.0 };
        let to = Spherical {}.destination(&from, 225.0, &Distance::from_nm(120.0));
        let (d, h) = Spherical {}.distance_and_heading_to(&from, &to);
        assert!((d.nm() - 120.0).abs() < 1e-6);
        assert!((h - 225.0).abs() < 1e-6);
    }

    #[test]
    fn destination_resolves_antimeridian() {
        let from = Coords { lat: 0.0, lon: 179.5 };
        let to = Spherical {}.destination(&from, 90.0, &Distance::from_nm(60.0));
        assert!(to.lon < -179.0);
    }

    #[test]
    fn heading_shortest_way_across() {
        let a = Coords { lat: 0.0, lon: 179.0 };
        let b = Coords { lat: 0.0, lon: -179.0 };
        /* shortest way is eastward across the antimeridian */
        assert!((Spherical {}.heading_to(&a, &b) - 90.0).abs() < 1e-9);
    }
}
