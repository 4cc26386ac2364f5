use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::ops;
use chrono::Duration;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde::de::Visitor;

#[derive(Clone, Copy, Debug, Default)]
pub struct Speed {
    pub(crate) value: f64,
    pub(crate) unit: SpeedUnit,
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum SpeedUnit {
    Knot,
    MeterPerSecond,
}

impl Default for SpeedUnit {
    fn default() -> Self {
        SpeedUnit::Knot
    }
}

impl Speed {
    pub fn from_kts(value: f64) -> Self {
        Self {
            value,
            unit: SpeedUnit::Knot,
        }
    }

    pub fn from_m_s(value: f64) -> Self {
        Self {
            value,
            unit: SpeedUnit::MeterPerSecond,
        }
    }

    pub fn kts(&self) -> f64 {
        match &self.unit {
            SpeedUnit::Knot => self.value,
            SpeedUnit::MeterPerSecond => self.value * 3.6 / 1.852,
        }
    }

    pub fn m_s(&self) -> f64 {
        match &self.unit {
            SpeedUnit::Knot => self.value * 1.852 / 3.6,
            SpeedUnit::MeterPerSecond => self.value,
        }
    }
}

impl Display for Speed {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}kt", self.kts())
    }
}

impl PartialEq<Self> for Speed {
    fn eq(&self, other: &Self) -> bool {
        self.kts().eq(&other.kts())
    }
}

impl PartialOrd<Self> for Speed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.kts().partial_cmp(&other.kts())
    }
}

impl ops::Mul<f64> for Speed {
    type Output = Speed;

    fn mul(self, rhs: f64) -> Self::Output {
        Speed {
            value: self.value * rhs,
            unit: self.unit,
        }
    }
}

impl ops::Mul<Duration> for Speed {
    type Output = Distance;

    fn mul(self, rhs: Duration) -> Self::Output {
        Distance {
            value: self.m_s() * rhs.num_seconds() as f64,
            unit: DistanceUnit::Meters,
        }
    }
}

impl Serialize for Speed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(self.kts())
    }
}

struct SpeedVisitor;

impl<'de> Visitor<'de> for SpeedVisitor {
    type Value = Speed;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a speed in knots")
    }

    fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Speed::from_kts(value))
    }

    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Speed::from_kts(value as f64))
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Speed::from_kts(value as f64))
    }
}

impl<'de> Deserialize<'de> for Speed {
    fn deserialize<D>(deserializer: D) -> Result<Speed, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_f64(SpeedVisitor)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Distance {
    pub(crate) value: f64,
    pub(crate) unit: DistanceUnit,
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum DistanceUnit {
    Meters,
    NauticalMiles,
}

impl Distance {
    pub fn zero() -> Self {
        Distance {
            value: 0.0,
            unit: DistanceUnit::Meters,
        }
    }

    pub fn from_m(value: f64) -> Self {
        Distance {
            value,
            unit: DistanceUnit::Meters,
        }
    }

    pub fn from_nm(value: f64) -> Self {
        Distance {
            value,
            unit: DistanceUnit::NauticalMiles,
        }
    }

    pub fn m(&self) -> f64 {
        match &self.unit {
            DistanceUnit::Meters => self.value,
            DistanceUnit::NauticalMiles => self.value * 1852.0,
        }
    }

    pub fn nm(&self) -> f64 {
        match &self.unit {
            DistanceUnit::Meters => self.value / 1852.0,
            DistanceUnit::NauticalMiles => self.value,
        }
    }

    fn val(&self, unit: &DistanceUnit) -> f64 {
        match unit {
            DistanceUnit::Meters => self.m(),
            DistanceUnit::NauticalMiles => self.nm(),
        }
    }
}

impl Display for Distance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.unit {
            DistanceUnit::Meters => write!(f, "{}m", self.value),
            DistanceUnit::NauticalMiles => write!(f, "{}nm", self.value),
        }
    }
}

impl PartialEq<Self> for Distance {
    fn eq(&self, other: &Self) -> bool {
        self.m().eq(&other.m())
    }
}

impl Eq for Distance {}

impl PartialOrd<Self> for Distance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Distance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.m().total_cmp(&other.m())
    }
}

impl ops::Mul<f64> for Distance {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Distance {
            value: self.value * rhs,
            unit: self.unit,
        }
    }
}

impl ops::Add<Distance> for Distance {
    type Output = Self;

    fn add(self, rhs: Distance) -> Self {
        Distance {
            value: self.value + rhs.val(&self.unit),
            unit: self.unit,
        }
    }
}

impl ops::Sub<Distance> for Distance {
    type Output = Self;

    fn sub(self, rhs: Distance) -> Self {
        Distance {
            value: self.value - rhs.val(&self.unit),
            unit: self.unit,
        }
    }
}

impl ops::Div<f64> for Distance {
    type Output = Self;

    fn div(self, rhs: f64) -> Self {
        Distance {
            value: self.value / rhs,
            unit: self.unit,
        }
    }
}

impl ops::Div<Speed> for Distance {
    type Output = Duration;

    fn div(self, rhs: Speed) -> Duration {
        if rhs.m_s() == 0.0 {
            Duration::max_value()
        } else {
            Duration::seconds((self.m() / rhs.m_s()) as i64)
        }
    }
}

impl Serialize for Distance {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(self.nm())
    }
}

struct DistanceVisitor;

impl<'de> Visitor<'de> for DistanceVisitor {
    type Value = Distance;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a distance in nautical miles")
    }

    fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Distance::from_nm(value))
    }

    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Distance::from_nm(value as f64))
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Distance::from_nm(value as f64))
    }
}

impl<'de> Deserialize<'de> for Distance {
    fn deserialize<D>(deserializer: D) -> Result<Distance, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_f64(DistanceVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_units() {
        let s = Speed::from_m_s(1.852 / 3.6);
        assert!((s.kts() - 1.0).abs() < 1e-12);
        assert_eq!(Speed::from_kts(2.0), Speed::from_kts(2.0));
    }

    #[test]
    fn distance_over_speed() {
        let d = Distance::from_nm(10.0);
        let s = Speed::from_kts(5.0);
        assert_eq!((d / s).num_seconds(), 7200);
    }

    #[test]
    fn speed_times_duration() {
        let d = Speed::from_kts(5.0) * Duration::hours(2);
        assert!((d.nm() - 10.0).abs() < 1e-9);
    }
}
