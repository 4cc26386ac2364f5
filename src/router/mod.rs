use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::algorithm::{average_longitude, Algorithm, Degrees};
use crate::algorithm::spherical::Spherical;
use crate::environment::{over_water, Climatology, LandsProvider, WeatherGrid};
use crate::isochron::graph::{Graph, NodeId};
use crate::isochron::normalize::reduce_list;
use crate::isochron::propagate::{read_wind_and_currents, swell, Probe};
use crate::isochron::route::IsoRoute;
use crate::isochron::IsoChron;
use crate::polar::Polar;
use crate::position::Coords;
use crate::utils::Distance;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClimatologyType {
    Disabled,
    Current,
    Average,
    CumulativeMap,
    CumulativeMinusCalms,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegratorType {
    Newton,
    RungeKutta,
}

/// The environment sources one step works against.
pub(crate) struct StepEnv {
    pub(crate) grib: Option<Arc<dyn WeatherGrid>>,
    pub(crate) climatology: Option<Arc<dyn Climatology>>,
    pub(crate) lands: Option<Arc<dyn LandsProvider>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteMapPosition {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

static POSITIONS: Lazy<RwLock<Vec<RouteMapPosition>>> = Lazy::new(|| RwLock::new(Vec::new()));

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMapConfiguration {
    /// named start position, resolved by `update`; empty to use the
    /// explicit coordinates
    pub start: String,
    pub end: String,
    pub start_lat: f64,
    pub start_lon: f64,
    pub end_lat: f64,
    pub end_lon: f64,
    pub start_time: DateTime<Utc>,

    /// seconds between isochrons
    pub dt: f64,
    /// heading offsets from the true wind sampled each propagation
    pub degree_steps: Vec<f64>,

    pub max_diverted_course: f64,
    pub max_search_angle: f64,
    pub max_wind_knots: f64,
    pub max_swell_meters: f64,
    pub max_latitude: f64,
    /// negative disables the limit
    pub max_tacks: i32,
    pub max_upwind_percentage: f64,
    /// seconds lost to a tack
    pub tacking_time: f64,

    pub use_grib: bool,
    pub climatology_type: ClimatologyType,
    pub allow_data_deficient: bool,

    pub detect_land: bool,
    pub avoid_cyclone_tracks: bool,
    pub currents: bool,
    pub inverted_regions: bool,
    pub anchoring: bool,

    pub cyclone_months: i32,
    pub cyclone_days: i32,
    pub cyclone_wind_speed: f64,
    pub cyclone_climatology_start_year: i32,

    pub integrator: IntegratorType,

    pub boat: Polar,

    #[serde(skip)]
    pub(crate) start_end_bearing: f64,
    #[serde(skip)]
    pub(crate) positive_longitudes: bool,
}

impl Default for RouteMapConfiguration {
    fn default() -> Self {
        RouteMapConfiguration {
            start: String::new(),
            end: String::new(),
            start_lat: 0.0,
            start_lon: 0.0,
            end_lat: 0.0,
            end_lon: 0.0,
            start_time: Utc::now(),
            dt: 3600.0,
            degree_steps: (0..72).map(|i| i as f64 * 5.0).collect(),
            max_diverted_course: 180.0,
            max_search_angle: 180.0,
            max_wind_knots: 100.0,
            max_swell_meters: 20.0,
            max_latitude: 90.0,
            max_tacks: -1,
            max_upwind_percentage: 100.0,
            tacking_time: 0.0,
            use_grib: true,
            climatology_type: ClimatologyType::Disabled,
            allow_data_deficient: false,
            detect_land: false,
            avoid_cyclone_tracks: false,
            currents: false,
            inverted_regions: true,
            anchoring: false,
            cyclone_months: 1,
            cyclone_days: 0,
            cyclone_wind_speed: 0.0,
            cyclone_climatology_start_year: 1985,
            integrator: IntegratorType::Newton,
            boat: Polar::default(),
            start_end_bearing: 0.0,
            positive_longitudes: false,
        }
    }
}

impl RouteMapConfiguration {
    /// Resolve named endpoints against the shared position registry and
    /// derive the frame for the computation. Routes straddling the
    /// antimeridian are computed with longitudes in [0, 360).
    pub fn update(&mut self) -> bool {
        if !self.start.is_empty() {
            match RouteMap::position_lat_lon(&self.start) {
                Some((lat, lon)) => {
                    self.start_lat = lat;
                    self.start_lon = lon;
                }
                None => return false,
            }
        }
        if !self.end.is_empty() {
            match RouteMap::position_lat_lon(&self.end) {
                Some((lat, lon)) => {
                    self.end_lat = lat;
                    self.end_lon = lon;
                }
                None => return false,
            }
        }

        self.positive_longitudes =
            average_longitude(self.start_lon, self.end_lon).abs() > 90.0;
        if self.positive_longitudes {
            self.start_lon = self.start_lon.wrap360();
            self.end_lon = self.end_lon.wrap360();
        }

        self.start_end_bearing = Spherical {}.heading_to(
            &Coords {
                lat: self.start_lat,
                lon: self.start_lon,
            },
            &Coords {
                lat: self.end_lat,
                lon: self.end_lon,
            },
        );
        true
    }
}

/// Everything known about one leg of a recovered track.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotData {
    pub time: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub vbg: f64,
    pub bg: f64,
    pub vb: f64,
    pub b: f64,
    pub vw: f64,
    pub w: f64,
    pub vwg: f64,
    pub wg: f64,
    pub vc: f64,
    pub c: f64,
    pub wvht: f64,
}

#[derive(Clone, Debug)]
pub struct ResolvedPosition {
    pub chron: usize,
    pub(crate) node: NodeId,
    pub lat: f64,
    pub lon: f64,
    pub time: DateTime<Utc>,
    pub distance: Distance,
}

#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct RouteMapStatistics {
    pub isochrons: usize,
    pub routes: usize,
    pub inverted_routes: usize,
    pub skip_positions: usize,
    pub positions: usize,
}

struct Shared {
    origin: Vec<Arc<IsoChron>>,
    configuration: RouteMapConfiguration,
    valid: bool,
    new_grib: Option<Arc<dyn WeatherGrid>>,
    new_time: DateTime<Utc>,
    needs_grib: bool,
    finished: bool,
    reached_destination: bool,
    grib_failed: bool,
    climatology_failed: bool,
    no_data: bool,
}

/// The routing engine. One call to `propagate` advances the frontier by
/// one isochron; a worker thread calls it in a loop while other threads
/// poll status, install weather snapshots and pull results. The lock is
/// held only to snapshot inputs and publish the finished isochron, never
/// across the geometry.
pub struct RouteMap {
    state: Mutex<Shared>,
    climatology: Option<Arc<dyn Climatology>>,
    lands: Option<Arc<dyn LandsProvider>>,
    abort: AtomicBool,
}

macro_rules! locking_accessor {
    ($name:ident, $flag:ident) => {
        pub fn $name(&self) -> bool {
            self.state.lock().unwrap().$flag
        }
    };
}

impl RouteMap {
    pub fn new(
        climatology: Option<Arc<dyn Climatology>>,
        lands: Option<Arc<dyn LandsProvider>>,
    ) -> Self {
        debug!("create new route map");
        RouteMap {
            state: Mutex::new(Shared {
                origin: Vec::new(),
                configuration: RouteMapConfiguration::default(),
                valid: false,
                new_grib: None,
                new_time: Utc::now(),
                needs_grib: false,
                finished: false,
                reached_destination: false,
                grib_failed: false,
                climatology_failed: false,
                no_data: false,
            }),
            climatology,
            lands,
            abort: AtomicBool::new(false),
        }
    }

    pub fn add_position(name: impl Into<String>, lat: f64, lon: f64) {
        let mut positions = POSITIONS.write().unwrap();
        let name = name.into();
        positions.retain(|p| p.name != name);
        positions.push(RouteMapPosition { name, lat, lon });
    }

    pub fn position_lat_lon(name: &str) -> Option<(f64, f64)> {
        POSITIONS
            .read()
            .unwrap()
            .iter()
            .find(|p| p.name == name)
            .map(|p| (p.lat, p.lon))
    }

    locking_accessor!(finished, finished);
    locking_accessor!(reached_destination, reached_destination);
    locking_accessor!(grib_failed, grib_failed);
    locking_accessor!(climatology_failed, climatology_failed);
    locking_accessor!(no_data, no_data);
    locking_accessor!(needs_grib, needs_grib);
    locking_accessor!(valid, valid);

    pub fn empty(&self) -> bool {
        self.state.lock().unwrap().origin.is_empty()
    }

    pub fn set_configuration(&self, mut configuration: RouteMapConfiguration) -> bool {
        let valid = configuration.update();
        let mut shared = self.state.lock().unwrap();
        shared.configuration = configuration;
        shared.valid = valid;
        valid
    }

    pub fn get_configuration(&self) -> RouteMapConfiguration {
        self.state.lock().unwrap().configuration.clone()
    }

    pub fn set_new_grib(&self, grib: Option<Arc<dyn WeatherGrid>>) {
        let mut shared = self.state.lock().unwrap();
        shared.needs_grib = grib.is_none();
        shared.new_grib = grib;
    }

    pub fn new_grib_time(&self) -> DateTime<Utc> {
        self.state.lock().unwrap().new_time
    }

    /// Drop all isochrons and re-arm the engine at the configured start.
    pub fn reset(&self) {
        info!("reset route map");
        let mut shared = self.state.lock().unwrap();
        shared.origin.clear();
        shared.new_grib = None;
        shared.new_time = shared.configuration.start_time;
        shared.needs_grib = shared.configuration.use_grib;
        shared.finished = false;
        shared.reached_destination = false;
        shared.grib_failed = false;
        shared.climatology_failed = false;
        shared.no_data = false;
    }

    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    pub fn clear_abort(&self) {
        self.abort.store(false, Ordering::Relaxed);
    }

    /// Advance the map by one isochron. Returns false when nothing was
    /// done: not configured, finished, waiting on weather, data sources
    /// missing, or aborted. The isochron list is extended atomically at
    /// the end of the step.
    pub fn propagate(&self) -> bool {
        let (chrons, grib, time, configuration) = {
            let mut shared = self.state.lock().unwrap();
            if !shared.valid {
                shared.finished = true;
                return false;
            }

            if shared.finished || shared.needs_grib {
                return false;
            }

            let configuration = shared.configuration.clone();
            let grib_has_wind = shared
                .new_grib
                .as_ref()
                .map_or(false, |grib| grib.has_wind());

            if configuration.use_grib
                && !grib_has_wind
                && configuration.climatology_type == ClimatologyType::Disabled
                && !configuration.allow_data_deficient
            {
                shared.finished = true;
                shared.grib_failed = true;
                return false;
            }

            if !grib_has_wind
                && configuration.climatology_type != ClimatologyType::Disabled
                && !configuration.allow_data_deficient
            {
                let loaded = self.climatology.as_ref().map_or(false, |climatology| {
                    climatology.wind(&shared.new_time, 0.0, 0.0).is_some()
                        || climatology.wind_atlas(&shared.new_time, 0.0, 0.0).is_some()
                });
                if !loaded {
                    shared.finished = true;
                    shared.climatology_failed = true;
                    return false;
                }
            }

            /* test for cyclone data if needed */
            if configuration.avoid_cyclone_tracks {
                let available = self.climatology.as_ref().map_or(false, |climatology| {
                    climatology
                        .cyclone_crossings(0.0, 0.0, 0.0, 0.0, &shared.new_time, 0, 0.0, 0)
                        .is_some()
                });
                if !available {
                    shared.finished = true;
                    shared.climatology_failed = true;
                    return false;
                }
            }

            if !configuration.use_grib
                && configuration.climatology_type == ClimatologyType::Disabled
            {
                shared.finished = true;
                shared.no_data = true;
                return false;
            }

            (
                shared.origin.clone(),
                shared.new_grib.clone(),
                shared.new_time,
                configuration,
            )
        };

        let env = StepEnv {
            grib: grib.clone(),
            climatology: self.climatology.clone(),
            lands: self.lands.clone(),
        };

        let mut graph = Graph::new();
        let mut routelist = Vec::new();

        if chrons.is_empty() {
            let np = graph.add_position(
                configuration.start_lat,
                configuration.start_lon,
                None,
                0,
                0,
                0,
                0,
            );
            let entry = graph.build_skip_list(np);
            routelist.push(IsoRoute::new(entry, 1));
        } else {
            IsoChron::propagate_into(
                &chrons,
                chrons.len() - 1,
                &mut graph,
                &mut routelist,
                &env,
                &time,
                &configuration,
            );
        }

        {
            let mut shared = self.state.lock().unwrap();
            shared.new_grib = None;
            shared.new_time = time + Duration::seconds(configuration.dt as i64);
            shared.needs_grib = configuration.use_grib;
        }

        let update = if routelist.is_empty() {
            None
        } else {
            let abort = &self.abort;
            match reduce_list(
                &mut graph,
                routelist,
                configuration.inverted_regions,
                &|| abort.load(Ordering::Relaxed),
            ) {
                None => return false, /* aborted, nothing published */
                Some(merged) => Some(IsoChron::new(merged, graph, time, grib)),
            }
        };

        let mut shared = self.state.lock().unwrap();
        match update {
            Some(chron) => {
                debug!(
                    "isochron {} with {} routes at {}",
                    shared.origin.len(),
                    chron.routes.len(),
                    chron.time
                );
                let arrived = chron.contains(configuration.end_lat, configuration.end_lon);
                shared.origin.push(Arc::new(chron));
                if arrived {
                    shared.finished = true;
                    shared.reached_destination = true;
                }
            }
            None => shared.finished = true,
        }

        true
    }

    /// Closest position over every isochron; with `before_last` the most
    /// recent isochron is skipped so a route can be traced from the
    /// frontier's ancestors.
    pub fn closest_position(
        &self,
        lat: f64,
        lon: f64,
        before_last: bool,
    ) -> Option<ResolvedPosition> {
        let shared = self.state.lock().unwrap();
        if shared.origin.is_empty() {
            return None;
        }

        let last = if before_last {
            shared.origin.len() - 1
        } else {
            shared.origin.len()
        };

        let mut best: Option<ResolvedPosition> = None;
        for (i, chron) in shared.origin[..last].iter().enumerate() {
            if let Some((node, distance)) = chron.closest_position(lat, lon) {
                if !best
                    .as_ref()
                    .map_or(false, |best| best.distance <= distance)
                {
                    let pos = chron.graph.pos(node);
                    best = Some(ResolvedPosition {
                        chron: i,
                        node,
                        lat: pos.lat,
                        lon: pos.lon,
                        time: chron.time,
                        distance,
                    });
                }
            }
        }
        best
    }

    /// Recover the track that reached a position by following parent
    /// references back to the origin, replaying each leg against the
    /// weather snapshot its isochron was built with.
    pub fn ancestor_track(&self, position: &ResolvedPosition) -> Vec<PlotData> {
        let shared = self.state.lock().unwrap();
        let configuration = &shared.configuration;

        let mut track = Vec::new();
        let mut cursor = if position.chron < shared.origin.len() {
            Some((position.chron, position.node))
        } else {
            None
        };

        while let Some((chron_idx, node)) = cursor {
            let chron = &shared.origin[chron_idx];
            let pos = chron.graph.pos(node);

            let env = StepEnv {
                grib: chron.grib.clone(),
                climatology: self.climatology.clone(),
                lands: None,
            };

            let mut data = PlotData {
                time: chron.time,
                lat: pos.lat,
                lon: pos.lon,
                wvht: swell(&env, pos.lat, pos.lon),
                ..Default::default()
            };

            let probe = Probe {
                lat: pos.lat,
                lon: pos.lon,
                parent: pos.parent,
            };
            if let Some(weather) = read_wind_and_currents(
                &env,
                configuration,
                &chron.time,
                &shared.origin,
                &probe,
            ) {
                data.wg = weather.wg;
                data.vwg = weather.vwg;
                data.w = weather.w;
                data.vw = weather.vw;
                data.c = weather.c;
                data.vc = weather.vc;
            }

            cursor = None;
            if let Some(parent) = pos.parent {
                if parent.chron < shared.origin.len() {
                    let pp = shared.origin[parent.chron].graph.pos(parent.node);
                    let (dist, bg) =
                        Spherical {}.distance_and_heading_to(&pp.coords(), &pos.coords());
                    let dt = (chron.time - shared.origin[parent.chron].time).num_seconds();
                    data.bg = bg;
                    data.vbg = if dt == 0 {
                        0.0
                    } else {
                        dist.nm() * 3600.0 / dt as f64
                    };
                    let (b, vb) = over_water(data.bg, data.vbg, data.c, data.vc);
                    data.b = b;
                    data.vb = vb;

                    cursor = Some((parent.chron, parent.node));
                }
            }

            track.push(data);
        }

        track.reverse();
        track
    }

    /// Expected arrival, linearly extrapolated from the last two
    /// isochrons' distances to the destination.
    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        let shared = self.state.lock().unwrap();
        let n = shared.origin.len();
        if n < 2 {
            return None;
        }

        let end_lat = shared.configuration.end_lat;
        let end_lon = shared.configuration.end_lon;

        let (_, dista) = shared.origin[n - 1].closest_position(end_lat, end_lon)?;
        let timea = shared.origin[n - 1].time;
        let (_, distb) = shared.origin[n - 2].closest_position(end_lat, end_lon)?;
        let timeb = shared.origin[n - 2].time;

        let seconds = (timea - timeb).num_seconds() as f64;
        let denominator = dista.m() + distb.m();
        if denominator == 0.0 {
            return Some(timea);
        }
        Some(timeb + Duration::seconds((seconds * distb.m() / denominator) as i64))
    }

    pub fn statistics(&self) -> RouteMapStatistics {
        let shared = self.state.lock().unwrap();
        let mut statistics = RouteMapStatistics {
            isochrons: shared.origin.len(),
            ..Default::default()
        };
        for chron in shared.origin.iter() {
            for route in chron.routes.iter() {
                route.update_statistics(
                    &chron.graph,
                    &mut statistics.routes,
                    &mut statistics.inverted_routes,
                    &mut statistics.skip_positions,
                    &mut statistics.positions,
                );
            }
        }
        statistics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isochron::propagate::tests::{
        round_polar, test_config, PatchyGrid, StripLand, UniformGrid,
    };

    fn grid() -> Arc<dyn WeatherGrid> {
        Arc::new(UniformGrid {
            direction: 0.0,
            speed: 10.0,
            current: None,
        })
    }

    fn configured_map(
        configuration: RouteMapConfiguration,
        lands: Option<Arc<dyn LandsProvider>>,
    ) -> RouteMap {
        let map = RouteMap::new(None, lands);
        assert!(map.set_configuration(configuration));
        map.reset();
        map
    }

    fn run(map: &RouteMap, grib: &Arc<dyn WeatherGrid>, max_steps: usize) -> usize {
        for step in 0..max_steps {
            if map.finished() {
                return step;
            }
            map.set_new_grib(Some(grib.clone()));
            if !map.propagate() {
                return step;
            }
        }
        max_steps
    }

    #[test]
    fn reaches_destination_downrange() {
        let mut configuration = test_config(round_polar());
        configuration.end_lat = 0.0;
        configuration.end_lon = 1.0;
        let map = configured_map(configuration, None);
        let grib = grid();

        run(&map, &grib, 25);
        assert!(map.reached_destination());
        assert!(map.finished());

        let statistics = map.statistics();
        /* 60nm at 5kn: the seed, 12 expansions, and the arrival step */
        assert!(statistics.isochrons >= 12 && statistics.isochrons <= 16);
        assert!(statistics.positions > statistics.isochrons);

        /* isochrons are strictly ordered in time */
        let shared = map.state.lock().unwrap();
        for pair in shared.origin.windows(2) {
            assert!(pair[0].time < pair[1].time);
        }
    }

    #[test]
    fn first_ring_bounds_the_hour() {
        let mut configuration = test_config(round_polar());
        configuration.end_lat = 0.0;
        configuration.end_lon = 5.0;
        let map = configured_map(configuration, None);
        let grib = grid();

        run(&map, &grib, 2);

        let shared = map.state.lock().unwrap();
        assert_eq!(shared.origin.len(), 2);
        /* 5kn for an hour: 5nm; just inside is reachable, 12nm is not */
        assert!(shared.origin[1].contains(0.0, 0.06));
        assert!(shared.origin[1].contains(0.05, 0.02));
        assert!(!shared.origin[1].contains(0.0, 0.2));
    }

    #[test]
    fn route_recovered_through_ancestry() {
        let mut configuration = test_config(round_polar());
        configuration.end_lat = 0.0;
        configuration.end_lon = 1.0;
        let map = configured_map(configuration, None);
        let grib = grid();
        run(&map, &grib, 25);
        assert!(map.reached_destination());

        let closest = map.closest_position(0.0, 1.0, false).unwrap();
        assert!(closest.distance.nm() < 5.0);

        let track = map.ancestor_track(&closest);
        assert!(track.len() >= 12);
        /* starts at the origin, ends at the resolved position */
        assert!(track[0].lat.abs() < 1e-9 && track[0].lon.abs() < 1e-9);
        let last = track.last().unwrap();
        assert_eq!(last.lat, closest.lat);
        assert_eq!(last.lon, closest.lon);
        for pair in track.windows(2) {
            assert!(pair[0].time < pair[1].time);
            /* legs are sailed at the polar speed */
            assert!((pair[1].vbg - 5.0).abs() < 0.2);
        }
        for leg in &track[1..] {
            assert!((leg.vw - 10.0).abs() < 1e-6);
        }
    }

    #[test]
    fn land_forces_a_detour() {
        let mut configuration = test_config(round_polar());
        configuration.end_lat = 0.0;
        configuration.end_lon = 1.2;
        configuration.detect_land = true;
        let lands = Arc::new(StripLand {
            lat_min: -0.2,
            lat_max: 0.2,
            lon_min: 0.3,
            lon_max: 0.5,
        });
        let map = configured_map(configuration, Some(lands.clone()));
        let grib = grid();

        run(&map, &grib, 40);
        assert!(map.reached_destination());

        let closest = map.closest_position(0.0, 1.2, false).unwrap();
        let track = map.ancestor_track(&closest);
        assert!(track.len() > 2);
        for point in &track {
            assert!(!lands.is_land(point.lat, point.lon));
        }
        /* crossing the strip's longitudes means sailing above or below it */
        let mut detoured = false;
        for point in &track {
            if point.lon > 0.3 && point.lon < 0.5 {
                assert!(point.lat.abs() >= 0.2);
                detoured = true;
            }
        }
        assert!(detoured);
    }

    #[test]
    fn antimeridian_crossing_is_seamless() {
        let mut configuration = test_config(round_polar());
        configuration.start_lat = 0.0;
        configuration.start_lon = 179.5;
        configuration.end_lat = 0.0;
        configuration.end_lon = -179.7;
        let map = configured_map(configuration, None);
        assert!(map.get_configuration().positive_longitudes);
        assert!((map.get_configuration().end_lon - 180.3).abs() < 1e-9);

        let grib = grid();
        run(&map, &grib, 20);
        assert!(map.reached_destination());

        let shared = map.state.lock().unwrap();
        for pair in shared.origin.windows(2) {
            assert!(pair[0].time < pair[1].time);
        }
    }

    #[test]
    fn grib_missing_wind_fails_the_run() {
        struct EmptyGrid;
        impl WeatherGrid for EmptyGrid {
            fn wind(&self, _lat: f64, _lon: f64) -> Option<crate::environment::Wind> {
                None
            }
            fn current(&self, _lat: f64, _lon: f64) -> Option<crate::environment::Current> {
                None
            }
            fn swell(&self, _lat: f64, _lon: f64) -> Option<f64> {
                None
            }
            fn has_wind(&self) -> bool {
                false
            }
        }

        let configuration = test_config(round_polar());
        let map = configured_map(configuration, None);
        map.set_new_grib(Some(Arc::new(EmptyGrid)));
        assert!(!map.propagate());
        assert!(map.finished());
        assert!(map.grib_failed());
        assert!(!map.reached_destination());
    }

    #[test]
    fn no_sources_at_all_flags_no_data() {
        let mut configuration = test_config(round_polar());
        configuration.use_grib = false;
        let map = configured_map(configuration, None);
        assert!(!map.propagate());
        assert!(map.no_data());
        assert!(map.finished());
    }

    #[test]
    fn climatology_unloaded_is_reported() {
        let mut configuration = test_config(round_polar());
        configuration.use_grib = false;
        configuration.climatology_type = ClimatologyType::Average;
        /* no climatology injected at all */
        let map = configured_map(configuration, None);
        assert!(!map.propagate());
        assert!(map.climatology_failed());
    }

    #[test]
    fn waiting_on_weather_does_nothing() {
        let configuration = test_config(round_polar());
        let map = configured_map(configuration, None);
        assert!(map.needs_grib());
        assert!(!map.propagate());
        assert!(map.empty());
        assert!(!map.finished());
    }

    #[test]
    fn abort_leaves_origin_untouched() {
        let configuration = test_config(round_polar());
        let map = configured_map(configuration, None);
        let grib = grid();

        map.request_abort();
        map.set_new_grib(Some(grib.clone()));
        assert!(!map.propagate());
        assert!(map.empty());

        map.clear_abort();
        map.set_new_grib(Some(grib));
        assert!(map.propagate());
        assert!(!map.empty());
    }

    #[test]
    fn deficient_data_keeps_expanding() {
        let mut configuration = test_config(round_polar());
        configuration.end_lat = 0.0;
        configuration.end_lon = 3.0;
        configuration.allow_data_deficient = true;
        let map = configured_map(configuration, None);

        /* wind readable only right at the start */
        let grib: Arc<dyn WeatherGrid> = Arc::new(PatchyGrid {
            lat: 0.0,
            lon: 0.0,
            radius: 0.05,
            wind: (0.0, 10.0),
        });

        for _ in 0..4 {
            map.set_new_grib(Some(grib.clone()));
            assert!(map.propagate());
        }
        assert_eq!(map.statistics().isochrons, 4);
        assert!(!map.finished());
    }

    #[test]
    fn deficient_data_with_anchoring() {
        let mut configuration = test_config(round_polar());
        configuration.end_lat = 0.0;
        configuration.end_lon = 3.0;
        configuration.allow_data_deficient = true;
        configuration.anchoring = true;
        let map = configured_map(configuration, None);

        let grib: Arc<dyn WeatherGrid> = Arc::new(PatchyGrid {
            lat: 0.0,
            lon: 0.0,
            radius: 0.05,
            wind: (0.0, 10.0),
        });

        for _ in 0..3 {
            map.set_new_grib(Some(grib.clone()));
            assert!(map.propagate());
        }
        let statistics = map.statistics();
        assert_eq!(statistics.isochrons, 3);
        assert!(statistics.positions > 0);
    }

    #[test]
    fn arrival_extrapolates_between_isochrons() {
        let mut configuration = test_config(round_polar());
        configuration.end_lat = 0.0;
        configuration.end_lon = 1.0;
        let map = configured_map(configuration, None);
        let grib = grid();
        run(&map, &grib, 25);
        assert!(map.reached_destination());

        let eta = map.end_date().unwrap();
        let shared = map.state.lock().unwrap();
        let first = shared.origin.first().unwrap().time;
        let last = shared.origin.last().unwrap().time;
        assert!(eta > first);
        assert!(eta <= last);
    }

    #[test]
    fn named_positions_resolve_in_update() {
        RouteMap::add_position("fastnet-test-start", 51.0, -9.0);
        RouteMap::add_position("fastnet-test-end", 51.5, -9.6);

        let mut configuration = test_config(round_polar());
        configuration.start = "fastnet-test-start".into();
        configuration.end = "fastnet-test-end".into();
        assert!(configuration.update());
        assert_eq!(configuration.start_lat, 51.0);
        assert_eq!(configuration.end_lon, -9.6);
        assert_eq!(
            RouteMap::position_lat_lon("fastnet-test-start"),
            Some((51.0, -9.0))
        );

        configuration.end = "fastnet-test-missing".into();
        assert!(!configuration.update());
        let map = RouteMap::new(None, None);
        assert!(!map.set_configuration(configuration));
        assert!(!map.propagate());
        assert!(map.finished());
    }

    #[test]
    fn reset_clears_everything() {
        let mut configuration = test_config(round_polar());
        configuration.end_lat = 0.0;
        configuration.end_lon = 0.2;
        let map = configured_map(configuration, None);
        let grib = grid();
        run(&map, &grib, 10);
        assert!(map.reached_destination());

        map.reset();
        assert!(map.empty());
        assert!(!map.finished());
        assert!(!map.reached_destination());
        assert_eq!(map.statistics().isochrons, 0);
        assert_eq!(
            map.new_grib_time(),
            map.get_configuration().start_time
        );
    }
}
