use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::Speed;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Wind {
    /// direction the wind blows from, degrees true
    pub direction: f64,
    pub speed: Speed,
}

impl Display for Wind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}° {}kts", self.direction, self.speed.kts())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Current {
    /// direction the water flows towards, degrees true
    pub direction: f64,
    pub speed: Speed,
}

/// Eight-octant climatology wind rose at one place and time.
#[derive(Clone, Debug, Default)]
pub struct WindAtlas {
    /// wind direction each octant blows from, degrees true
    pub w: [f64; 8],
    /// wind speed per octant, knots
    pub vw: [f64; 8],
    /// probability of each octant
    pub directions: [f64; 8],
    pub storm: f64,
    pub calm: f64,
}

/// A gridded forecast snapshot, valid for the step it was handed to the
/// engine with. A miss (position outside the grid, or the record absent)
/// returns `None` and the caller falls back to climatology or to the
/// position's ancestry.
pub trait WeatherGrid: Send + Sync {
    fn wind(&self, lat: f64, lon: f64) -> Option<Wind>;

    fn current(&self, lat: f64, lon: f64) -> Option<Current>;

    fn swell(&self, lat: f64, lon: f64) -> Option<f64>;

    /// whether the snapshot carries wind records at all
    fn has_wind(&self) -> bool {
        true
    }
}

/// Long-term statistics keyed by time of year.
pub trait Climatology: Send + Sync {
    fn wind(&self, m: &DateTime<Utc>, lat: f64, lon: f64) -> Option<Wind>;

    fn current(&self, m: &DateTime<Utc>, lat: f64, lon: f64) -> Option<Current>;

    fn wind_atlas(&self, m: &DateTime<Utc>, lat: f64, lon: f64) -> Option<WindAtlas>;

    /// number of historical cyclone tracks crossing the segment around this
    /// time of year; `None` when no cyclone data is loaded
    fn cyclone_crossings(
        &self,
        lat1: f64,
        lon1: f64,
        lat2: f64,
        lon2: f64,
        m: &DateTime<Utc>,
        days: i32,
        wind_speed: f64,
        since_year: i32,
    ) -> Option<u32> {
        let _ = (lat1, lon1, lat2, lon2, m, days, wind_speed, since_year);
        None
    }
}

pub trait LandsProvider: Send + Sync {
    fn is_land(&self, lat: f64, lon: f64) -> bool;

    fn crosses_land(&self, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> bool {
        const STEP: i8 = 10;

        for i in 0..(STEP + 1) {
            let lat = lat1 + (i as f64) * (lat2 - lat1) / (STEP as f64);
            let lon = lon1 + (i as f64) * (lon2 - lon1) / (STEP as f64);
            if self.is_land(lat, lon) {
                return true;
            }
        }

        false
    }
}

pub fn vector_to_degrees(u: f64, v: f64) -> f64 {
    let velocity_dir = libm::atan2(u, v);
    velocity_dir.to_degrees() + 180.0
}

/* Sometimes localized currents can be strong enough to create a breeze
   which can be sailed off even if there is no wind. The wind data is
   calculated from the ground not the sea, it is then converted to speed
   over water which the boat can feel.

   C   - sea current direction over ground
   VC  - velocity of current
   WG  - wind direction over ground
   VWG - velocity of wind over ground */
pub(crate) fn over_water(wg: f64, vwg: f64, c: f64, vc: f64) -> (f64, f64) {
    if vc == 0.0 {
        /* short-cut if no currents */
        return (wg, vwg);
    }

    let cx = vc * c.to_radians().cos();
    let cy = vc * c.to_radians().sin();
    let wx = vwg * wg.to_radians().cos() - cx;
    let wy = vwg * wg.to_radians().sin() - cy;
    (wy.atan2(wx).to_degrees(), (wx * wx + wy * wy).sqrt())
}

/* provisions to compute boat movement over ground

   BG  - boat direction over ground
   VBG - boat speed over ground (gps velocity) */
pub(crate) fn over_ground(b: f64, vb: f64, c: f64, vc: f64) -> (f64, f64) {
    if vc == 0.0 {
        /* short-cut if no currents */
        return (b, vb);
    }

    let cx = vc * c.to_radians().cos();
    let cy = vc * c.to_radians().sin();
    let bgx = vb * b.to_radians().cos() + cx;
    let bgy = vb * b.to_radians().sin() + cy;
    (bgy.atan2(bgx).to_degrees(), (bgx * bgx + bgy * bgy).sqrt())
}
