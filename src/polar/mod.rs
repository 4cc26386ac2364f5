use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use anyhow::{bail, Result};
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::environment::WindAtlas;
use crate::utils::Speed;

pub type Polars = Arc<RwLock<HashMap<String, Arc<Polar>>>>;

pub trait PolarsSpec {
    fn new() -> Self;

    fn add(&self, name: String, polar: Polar);

    fn get(&self, name: &str) -> Result<Arc<Polar>>;
}

impl PolarsSpec for Polars {
    fn new() -> Self {
        Arc::new(RwLock::new(HashMap::new()))
    }

    fn add(&self, name: String, polar: Polar) {
        let mut polars = self.write().unwrap();
        polars.insert(name, Arc::new(polar));
    }

    fn get(&self, name: &str) -> Result<Arc<Polar>> {
        let polars = self.read().unwrap();
        match polars.get(name) {
            Some(polar) => Ok(polar.clone()),
            None => bail!("Polar {name} not found"),
        }
    }
}

/// Boat speed model: one speed table per sail plan, indexed by true wind
/// angle and true wind speed. Angles fold onto [0, 180] since the tables
/// are symmetric about the wind axis.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Polar {
    pub label: String,
    pub tws: Vec<f64>,
    pub twa: Vec<f64>,
    pub plans: Vec<SailPlan>,
    /// widening of a plan's wind envelope before a switch is forced
    #[serde(default = "default_hysteresis")]
    pub switch_hysteresis: f64,
}

fn default_hysteresis() -> f64 {
    1.1
}

impl Default for Polar {
    fn default() -> Self {
        Polar {
            label: String::new(),
            tws: vec![0.0],
            twa: vec![0.0],
            plans: Vec::new(),
            switch_hysteresis: default_hysteresis(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SailPlan {
    pub name: String,
    /// boat speed in knots, speed[twa index][tws index]
    pub speed: Vec<Vec<f64>>,
    #[serde(default)]
    pub wind_min: f64,
    #[serde(default = "default_wind_max")]
    pub wind_max: f64,
    #[serde(default = "default_swell_max")]
    pub swell_max: f64,
    /// some light sails are only flown in daylight
    #[serde(default)]
    pub day_only: bool,
}

fn default_wind_max() -> f64 {
    200.0
}

fn default_swell_max() -> f64 {
    100.0
}

/// The four headings maximizing the velocity component along the wind
/// axis, as true wind angles in degrees. Port angles are negative.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vmgs {
    pub port_up: f64,
    pub stbd_up: f64,
    pub port_down: f64,
    pub stbd_down: f64,
}

impl Polar {
    fn interpolation_index(values: &[f64], value: f64) -> (usize, usize, f64) {
        let mut i = 0;
        while values[i] < value {
            i += 1;
            if i == values.len() {
                return (i - 1, i - 1, 0.0);
            }
        }

        if i > 0 {
            return (i - 1, i, (values[i] - value) / (values[i] - values[i - 1]));
        }

        (0, 0, 0.0)
    }

    fn fold_twa(twa: f64) -> f64 {
        let mut twa = twa % 360.0;
        if twa < 0.0 {
            twa = -twa
        }
        if twa > 180.0 {
            twa = 360.0 - twa
        }
        twa
    }

    /// Boat speed for a sail plan at a true wind angle (any range, degrees)
    /// and true wind speed (knots).
    pub fn speed(&self, plan: usize, twa: f64, tws: f64) -> f64 {
        let plan = match self.plans.get(plan) {
            Some(plan) => plan,
            None => return f64::NAN,
        };

        let twa = Self::fold_twa(twa);
        let (si0, si1, sf) = Self::interpolation_index(&self.tws, tws);
        let (ai0, ai1, af) = Self::interpolation_index(&self.twa, twa);

        let ti0 = &plan.speed[ai0];
        let ti1 = &plan.speed[ai1];

        (ti0[si0] * sf + ti0[si1] * (1.0 - sf)) * af
            + (ti1[si0] * sf + ti1[si1] * (1.0 - sf)) * (1.0 - af)
    }

    /// Expected speed under a climatology wind rose: the probability
    /// weighted speed over the eight octants, the heading held fixed.
    pub(crate) fn cumulative_speed(
        &self,
        plan: usize,
        h: f64,
        w: f64,
        atlas: &WindAtlas,
        minus_calms: bool,
    ) -> f64 {
        let mut vb = 0.0;
        for i in 0..8 {
            let vbc = self.speed(plan, h - w + atlas.w[i], atlas.vw[i]);
            vb += atlas.directions[i] * vbc;
        }

        if minus_calms {
            vb *= 1.0 - atlas.calm
        }

        vb
    }

    /// Best up/downwind working angles at this wind speed.
    pub fn vmg(&self, plan: usize, tws: f64) -> Vmgs {
        let mut up = (0.0, 0.0);
        let mut down = (180.0, 0.0);

        for twa in 0..1801 {
            let twa = twa as f64 / 10.0;
            let vmg = self.speed(plan, twa, tws) * twa.to_radians().cos();

            if vmg > up.1 {
                up = (twa, vmg);
            }
            if vmg < down.1 {
                down = (twa, vmg);
            }
        }

        Vmgs {
            port_up: -up.0,
            stbd_up: up.0,
            port_down: -down.0,
            stbd_down: down.0,
        }
    }

    fn plan_admits(&self, plan: &SailPlan, vw: f64, swell: f64, daytime: bool, slack: f64) -> bool {
        vw >= plan.wind_min / slack
            && vw <= plan.wind_max * slack
            && swell <= plan.swell_max * slack
            && (!plan.day_only || daytime)
    }

    /// Pick the sail plan for the conditions. The current plan is kept as
    /// long as conditions stay inside its widened envelope and no other
    /// admissible plan beats it by more than the hysteresis margin.
    pub fn try_switch_plan(
        &self,
        current: usize,
        vw: f64,
        h: f64,
        swell: f64,
        m: &DateTime<Utc>,
        lat: f64,
        lon: f64,
        daytime: Option<bool>,
    ) -> usize {
        let daytime = daytime.unwrap_or_else(|| Self::daytime(m, lat, lon));

        let mut best = current;
        let mut best_speed = f64::NEG_INFINITY;
        for (i, plan) in self.plans.iter().enumerate() {
            if !self.plan_admits(plan, vw, swell, daytime, 1.0) {
                continue;
            }
            let speed = self.speed(i, h, vw);
            if speed > best_speed {
                best_speed = speed;
                best = i;
            }
        }

        if let Some(plan) = self.plans.get(current) {
            if self.plan_admits(plan, vw, swell, daytime, self.switch_hysteresis)
                && self.speed(current, h, vw) * self.switch_hysteresis >= best_speed
            {
                return current;
            }
        }

        best
    }

    /* crude solar day test from local apparent time */
    fn daytime(m: &DateTime<Utc>, _lat: f64, lon: f64) -> bool {
        let local = m.hour() as f64 + m.minute() as f64 / 60.0 + lon / 15.0;
        let local = ((local % 24.0) + 24.0) % 24.0;
        (6.0..18.0).contains(&local)
    }

    pub fn best_speed(&self, twa: f64, tws: f64) -> (usize, Speed) {
        let mut best = (0, f64::NEG_INFINITY);
        for i in 0..self.plans.len() {
            let s = self.speed(i, twa, tws);
            if s > best.1 {
                best = (i, s);
            }
        }
        (best.0, Speed::from_kts(best.1))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /* 5kn everywhere above 60° off the wind, dead zone inside 60° */
    pub(crate) fn flat_polar() -> Polar {
        Polar {
            label: "test".into(),
            tws: vec![0.0, 10.0, 20.0, 30.0],
            twa: vec![0.0, 60.0, 90.0, 120.0, 180.0],
            plans: vec![SailPlan {
                name: "main".into(),
                speed: vec![
                    vec![0.0, 0.0, 0.0, 0.0],
                    vec![0.0, 5.0, 5.0, 5.0],
                    vec![0.0, 5.0, 5.0, 5.0],
                    vec![0.0, 5.0, 5.0, 5.0],
                    vec![0.0, 5.0, 5.0, 5.0],
                ],
                wind_min: 0.0,
                wind_max: 200.0,
                swell_max: 100.0,
                day_only: false,
            }],
            switch_hysteresis: 1.1,
        }
    }

    pub(crate) fn two_plan_polar() -> Polar {
        Polar {
            label: "two".into(),
            tws: vec![0.0, 10.0, 20.0],
            twa: vec![0.0, 90.0, 180.0],
            plans: vec![
                SailPlan {
                    name: "working".into(),
                    speed: vec![vec![0.0; 3], vec![4.0, 4.0, 4.0], vec![3.0, 3.0, 3.0]],
                    wind_min: 0.0,
                    wind_max: 200.0,
                    swell_max: 100.0,
                    day_only: false,
                },
                SailPlan {
                    name: "light".into(),
                    speed: vec![vec![0.0; 3], vec![6.0, 6.0, 6.0], vec![5.0, 5.0, 5.0]],
                    wind_min: 0.0,
                    wind_max: 12.0,
                    swell_max: 2.0,
                    day_only: false,
                },
            ],
            switch_hysteresis: 1.1,
        }
    }

    #[test]
    fn interpolates_between_grid_lines() {
        let p = flat_polar();
        assert!((p.speed(0, 90.0, 10.0) - 5.0).abs() < 1e-12);
        assert!((p.speed(0, 30.0, 10.0) - 2.5).abs() < 1e-12);
        assert!((p.speed(0, -90.0, 10.0) - 5.0).abs() < 1e-12);
        assert!((p.speed(0, 270.0, 10.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn clamps_above_recorded_wind() {
        let p = flat_polar();
        assert!((p.speed(0, 90.0, 50.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn missing_plan_is_nan() {
        assert!(flat_polar().speed(7, 90.0, 10.0).is_nan());
    }

    #[test]
    fn vmg_angles() {
        let p = flat_polar();
        let vmgs = p.vmg(0, 10.0);
        /* speed ramps to 60°, so d/dt(t·cos t) = 0 puts the optimum near 49.3° */
        assert!((vmgs.stbd_up - 49.3).abs() < 0.2);
        assert_eq!(vmgs.port_up, -vmgs.stbd_up);
        /* flat speed downwind: straight down the axis */
        assert!((vmgs.stbd_down - 180.0).abs() < 0.2);
    }

    #[test]
    fn switch_respects_hysteresis() {
        let p = two_plan_polar();
        let m = Utc::now();

        /* light sail holds within its widened envelope */
        assert_eq!(p.try_switch_plan(1, 13.0, 90.0, 0.0, &m, 0.0, 0.0, Some(true)), 1);
        /* and gives way beyond it */
        assert_eq!(p.try_switch_plan(1, 14.0, 90.0, 0.0, &m, 0.0, 0.0, Some(true)), 0);
        /* light sail is faster when it fits */
        assert_eq!(p.try_switch_plan(0, 8.0, 90.0, 0.0, &m, 0.0, 0.0, Some(true)), 1);
        /* but not in heavy swell */
        assert_eq!(p.try_switch_plan(0, 8.0, 90.0, 4.0, &m, 0.0, 0.0, Some(true)), 0);
    }

    #[test]
    fn day_only_plan_rejected_at_night() {
        let mut p = two_plan_polar();
        p.plans[1].day_only = true;
        let noon = "2024-06-01T12:00:00Z".parse().unwrap();
        let midnight = "2024-06-01T00:00:00Z".parse().unwrap();
        assert_eq!(p.try_switch_plan(0, 8.0, 90.0, 0.0, &noon, 0.0, 0.0, None), 1);
        assert_eq!(p.try_switch_plan(0, 8.0, 90.0, 0.0, &midnight, 0.0, 0.0, None), 0);
    }

    #[test]
    fn cumulative_rose_weighs_octants() {
        let p = flat_polar();
        let mut atlas = WindAtlas::default();
        atlas.directions = [0.5, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        atlas.w = [0.0, 300.0, 90.0, 135.0, 180.0, 225.0, 270.0, 315.0];
        atlas.vw = [10.0; 8];
        /* heading abeam for octant 0, halfway into the dead zone for octant 1 */
        let vb = p.cumulative_speed(0, 90.0, 0.0, &atlas, false);
        assert!((vb - (0.5 * 5.0 + 0.5 * 2.5)).abs() < 1e-9);

        atlas.calm = 0.2;
        let vb = p.cumulative_speed(0, 90.0, 0.0, &atlas, true);
        assert!((vb - 0.8 * (0.5 * 5.0 + 0.5 * 2.5)).abs() < 1e-9);
    }

    #[test]
    fn registry_by_name() {
        let polars = <Polars as PolarsSpec>::new();
        polars.add("imoca".into(), flat_polar());
        assert!(polars.get("imoca").is_ok());
        assert!(polars.get("figaro").is_err());
    }

    #[test]
    fn polar_from_json() {
        let p: Polar = serde_json::from_str(
            r#"{
                "label": "imoca",
                "tws": [0, 10, 20],
                "twa": [0, 90, 180],
                "plans": [{"name": "main", "speed": [[0,0,0],[3,7,9],[2,5,8]]}]
            }"#,
        )
        .unwrap();
        assert_eq!(p.plans.len(), 1);
        assert!((p.speed(0, 90.0, 10.0) - 7.0).abs() < 1e-12);
        assert!((p.speed(0, 135.0, 10.0) - 6.0).abs() < 1e-12);
    }
}
