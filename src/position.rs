use std::fmt;
use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Default, Debug, Serialize, Deserialize, PartialEq)]
pub struct Coords {
    pub lat: f64,
    pub lon: f64,
}

impl From<(f64, f64)> for Coords {
    fn from(latlon: (f64, f64)) -> Self {
        Coords {
            lat: latlon.0,
            lon: latlon.1,
        }
    }
}

impl From<[f64; 2]> for Coords {
    fn from(latlon: [f64; 2]) -> Self {
        Coords {
            lat: latlon[0],
            lon: latlon[1],
        }
    }
}

impl Display for Coords {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lon)
    }
}
