use crate::position::Coords;
use crate::utils::{Distance, DistanceUnit};

pub(crate) mod spherical;

const MEAN_EARTH_RADIUS: Distance = Distance {
    value: 6371008.8,
    unit: DistanceUnit::Meters,
};

pub(crate) trait Algorithm {
    fn distance_to(&self, from: &Coords, to: &Coords) -> Distance;

    fn heading_to(&self, from: &Coords, to: &Coords) -> f64;

    fn distance_and_heading_to(&self, from: &Coords, to: &Coords) -> (Distance, f64);

    fn destination(&self, from: &Coords, heading: f64, distance: &Distance) -> Coords;
}

pub(crate) trait Degrees {
    fn wrap360(self) -> Self;

    fn resolve180(self) -> Self;
}

impl Degrees for f64 {
    fn wrap360(self) -> Self {
        if 0.0 <= self && self < 360.0 {
            return self;
        }
        let d1 = self + 360.0;
        let d2 = d1 - ((d1 / 360.0) as i64 * 360) as f64;
        d2
    }

    fn resolve180(self) -> Self {
        let mut d = self;
        while d <= -180.0 {
            d += 360.0
        }
        while d > 180.0 {
            d -= 360.0
        }
        d
    }
}

/* midpoint of two longitudes along the shorter arc */
pub(crate) fn average_longitude(lon1: f64, lon2: f64) -> f64 {
    (lon1 + (lon2 - lon1).resolve180() / 2.0).resolve180()
}

/* apparent wind felt aboard from boat speed, true wind angle off the bow
   (radians) and true wind speed; returns magnitude and angle off the bow */
pub(crate) fn apparent_wind(vb: f64, w: f64, vw: f64) -> (f64, f64) {
    let va = (vw * vw + vb * vb + 2.0 * vw * vb * w.cos()).sqrt();
    let a = (vw * w.sin()).atan2(vb + vw * w.cos());
    (va, a)
}

const EPS: f64 = 2e-10;
const EPS2: f64 = 2e-5;

/// Outcome of the planar segment intersection test.
///
/// `RightToLeft` and `LeftToRight` are proper crossings, named for the way
/// the second segment traverses the first. The four `*Touches` variants
/// report an endpoint lying on the other segment within tolerance, which
/// callers must resolve before retrying.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SegmentCross {
    Apart,
    RightToLeft,
    LeftToRight,
    FirstStartTouches,
    FirstEndTouches,
    SecondStartTouches,
    SecondEndTouches,
}

impl SegmentCross {
    pub(crate) fn crossing_direction(&self) -> i32 {
        match self {
            SegmentCross::RightToLeft => 1,
            SegmentCross::LeftToRight => -1,
            _ => 0,
        }
    }
}

/* find the intersection of two line segments in the plane, with two
   absolute tolerances: EPS for parallelism, EPS2 for an endpoint lying
   on the other segment. Overlapping collinear segments deterministically
   blame an endpoint of the second segment. */
pub(crate) fn test_intersection_xy(
    x1: f64, y1: f64, x2: f64, y2: f64,
    x3: f64, y3: f64, x4: f64, y4: f64,
) -> SegmentCross {
    let ax = x2 - x1;
    let ay = y2 - y1;
    let bx = x3 - x4;
    let by = y3 - y4;
    let cx = x1 - x3;
    let cy = y1 - y3;

    let denom = ay * bx - ax * by;

    if denom.abs() < EPS {
        /* parallel or really close to parallel */
        if ((y1 * ax - ay * x1) * bx - (y3 * bx - by * x3) * ax).abs() > EPS2 {
            return SegmentCross::Apart; /* different intercepts */
        }

        if ax == 0.0 && ay == 0.0 {
            /* first segment is a zero segment */
            return SegmentCross::FirstStartTouches;
        }

        /* overlapping parallel segments; invalidate a point of the second */
        let dx = x2 - x3;
        let dy = y2 - y3;
        let da = ax * ax + bx * bx;
        let db = cx * cx + cy * cy;
        let dc = dx * dx + dy * dy;
        if db <= da && dc <= da {
            /* point 3 is between 1 and 2 */
            return SegmentCross::SecondStartTouches;
        }
        return SegmentCross::SecondEndTouches;
    }

    let recip = 1.0 / denom;
    let na = (by * cx - bx * cy) * recip;
    if na < -EPS2 || na > 1.0 + EPS2 {
        return SegmentCross::Apart;
    }

    let nb = (ax * cy - ay * cx) * recip;
    if nb < -EPS2 || nb > 1.0 + EPS2 {
        return SegmentCross::Apart;
    }

    /* too close to call.. floating point loses bits with arithmetic so
       in this case we must avoid potential false guesses */
    if na < EPS2 {
        return SegmentCross::FirstStartTouches;
    }
    if na > 1.0 - EPS2 {
        return SegmentCross::FirstEndTouches;
    }
    if nb < EPS2 {
        return SegmentCross::SecondStartTouches;
    }
    if nb > 1.0 - EPS2 {
        return SegmentCross::SecondEndTouches;
    }

    if denom < 0.0 {
        SegmentCross::LeftToRight
    } else {
        SegmentCross::RightToLeft
    }
}

pub(crate) fn test_direction(x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) -> f64 {
    let ax = x2 - x1;
    let ay = y2 - y1;
    let bx = x2 - x3;
    let by = y2 - y3;
    ay * bx - ax * by
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping() {
        assert_eq!(370.0.wrap360(), 10.0);
        assert_eq!((-10.0).wrap360(), 350.0);
        assert_eq!(190.0.resolve180(), -170.0);
        assert_eq!((-190.0).resolve180(), 170.0);
        assert_eq!(180.0.resolve180(), 180.0);
    }

    #[test]
    fn longitude_average_shortest_arc() {
        assert!((average_longitude(10.0, 30.0) - 20.0).abs() < 1e-12);
        assert!((average_longitude(170.0, -170.0).abs() - 180.0).abs() < 1e-12);
    }

    #[test]
    fn apparent_wind_beam() {
        let (va, a) = apparent_wind(5.0, std::f64::consts::FRAC_PI_2, 5.0);
        assert!((va - 50.0_f64.sqrt()).abs() < 1e-12);
        assert!((a - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
    }

    #[test]
    fn apparent_wind_head_on() {
        let (va, a) = apparent_wind(4.0, 0.0, 6.0);
        assert!((va - 10.0).abs() < 1e-12);
        assert_eq!(a, 0.0);
    }

    #[test]
    fn proper_crossings() {
        assert_eq!(
            test_intersection_xy(0.0, 0.0, 2.0, 0.0, 1.0, -1.0, 1.0, 1.0),
            SegmentCross::RightToLeft
        );
        assert_eq!(
            test_intersection_xy(0.0, 0.0, 2.0, 0.0, 1.0, 1.0, 1.0, -1.0),
            SegmentCross::LeftToRight
        );
    }

    #[test]
    fn disjoint_segments() {
        assert_eq!(
            test_intersection_xy(0.0, 0.0, 1.0, 0.0, 2.0, -1.0, 2.0, 1.0),
            SegmentCross::Apart
        );
        /* parallel, different intercepts */
        assert_eq!(
            test_intersection_xy(0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0),
            SegmentCross::Apart
        );
    }

    #[test]
    fn endpoint_on_segment() {
        assert_eq!(
            test_intersection_xy(0.0, 0.0, 2.0, 0.0, 1.0, 0.0, 1.0, 1.0),
            SegmentCross::SecondStartTouches
        );
        assert_eq!(
            test_intersection_xy(0.0, 0.0, 2.0, 0.0, 1.0, 1.0, 1.0, 0.0),
            SegmentCross::SecondEndTouches
        );
        assert_eq!(
            test_intersection_xy(1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 2.0, 0.0),
            SegmentCross::FirstStartTouches
        );
        assert_eq!(
            test_intersection_xy(1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 2.0, 0.0),
            SegmentCross::FirstEndTouches
        );
    }

    #[test]
    fn turn_sign_flips_with_the_third_point() {
        let left = test_direction(0.0, 0.0, 1.0, 0.0, 2.0, 1.0);
        let right = test_direction(0.0, 0.0, 1.0, 0.0, 2.0, -1.0);
        assert!(left * right < 0.0);
    }

    #[test]
    fn crossing_direction_signs() {
        assert_eq!(SegmentCross::RightToLeft.crossing_direction(), 1);
        assert_eq!(SegmentCross::LeftToRight.crossing_direction(), -1);
        assert_eq!(SegmentCross::Apart.crossing_direction(), 0);
    }
}
