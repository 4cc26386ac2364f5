use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::warn;

use crate::environment::WeatherGrid;
use crate::router::{RouteMapConfiguration, StepEnv};
use crate::utils::Distance;

pub(crate) mod graph;
pub(crate) mod normalize;
pub(crate) mod propagate;
pub(crate) mod route;

use graph::{Graph, NodeId};
use route::IsoRoute;

/// The set of points reachable in exactly the elapsed time, as disjoint
/// signed regions over a shared vertex arena. Immutable once built; the
/// weather snapshot it was built from stays with it for later replay of
/// a chosen track.
pub struct IsoChron {
    pub(crate) routes: Vec<IsoRoute>,
    pub(crate) graph: Graph,
    pub time: DateTime<Utc>,
    pub(crate) grib: Option<Arc<dyn WeatherGrid>>,
}

impl IsoChron {
    pub(crate) fn new(
        routes: Vec<IsoRoute>,
        graph: Graph,
        time: DateTime<Utc>,
        grib: Option<Arc<dyn WeatherGrid>>,
    ) -> Self {
        IsoChron {
            routes,
            graph,
            time,
            grib,
        }
    }

    /// Fan the whole frontier out into raw candidate routes for the next
    /// step. Every source route that moved anywhere is carried over as a
    /// marker of covered water; with anchoring the carried copy keeps its
    /// flags so a dead end can still stay put and move off later.
    pub(crate) fn propagate_into(
        chrons: &[Arc<IsoChron>],
        chron_idx: usize,
        out: &mut Graph,
        routelist: &mut Vec<IsoRoute>,
        env: &StepEnv,
        time: &DateTime<Utc>,
        cfg: &RouteMapConfiguration,
    ) {
        let this = &chrons[chron_idx];
        let carried_flags = if cfg.anchoring { None } else { Some(true) };

        for route in &this.routes {
            let mut propagated = false;

            if route.propagate(chrons, chron_idx, out, routelist, env, time, cfg) {
                propagated = true;
            }
            let mut x = route.copy(&this.graph, out, carried_flags);

            for child in &route.children {
                if child.propagate(chrons, chron_idx, out, routelist, env, time, cfg) {
                    let y = child.copy(&this.graph, out, carried_flags);
                    x.children.push(y);
                    propagated = true;
                }
            }

            /* a route whose every child stalled too is a dead end */
            if propagated {
                routelist.push(x);
            }
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        for route in &self.routes {
            match route.contains(&self.graph, lat, lon, true) {
                Some(true) => return true,
                Some(false) => continue,
                None => {
                    warn!("inconclusive containment at ({}, {})", lat, lon);
                    continue;
                }
            }
        }
        false
    }

    pub(crate) fn closest_position(&self, lat: f64, lon: f64) -> Option<(NodeId, Distance)> {
        let mut best: Option<(NodeId, Distance)> = None;
        for route in &self.routes {
            if let Some((pos, dist)) = route.closest_position(&self.graph, lat, lon) {
                if !best.as_ref().map_or(false, |(_, d)| *d <= dist) {
                    best = Some((pos, dist));
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isochron::propagate::tests::{
        env_with, seed_chron, test_config, round_polar, UniformGrid,
    };

    #[test]
    fn contains_after_one_fan() {
        let time = Utc::now();
        let chrons = vec![seed_chron(0.0, 0.0, time)];
        let cfg = test_config(round_polar());
        let env = env_with(Arc::new(UniformGrid {
            direction: 0.0,
            speed: 10.0,
            current: None,
        }));

        let mut out = Graph::new();
        let mut routelist = Vec::new();
        IsoChron::propagate_into(&chrons, 0, &mut out, &mut routelist, &env, &time, &cfg);

        /* fan route plus the carried over seed */
        assert_eq!(routelist.len(), 2);

        let chron = IsoChron::new(routelist, out, time, None);
        assert!(chron.contains(0.0, 0.06));
        assert!(chron.contains(0.05, 0.02));
        assert!(!chron.contains(0.0, 0.2));
    }

    #[test]
    fn closest_position_tracks_the_ring() {
        let time = Utc::now();
        let chrons = vec![seed_chron(0.0, 0.0, time)];
        let cfg = test_config(round_polar());
        let env = env_with(Arc::new(UniformGrid {
            direction: 0.0,
            speed: 10.0,
            current: None,
        }));

        let mut out = Graph::new();
        let mut routelist = Vec::new();
        IsoChron::propagate_into(&chrons, 0, &mut out, &mut routelist, &env, &time, &cfg);
        let chron = IsoChron::new(routelist, out, time, None);

        let (pos, dist) = chron.closest_position(0.0, 1.0).unwrap();
        /* the ring is 5nm out, the probe 60nm east */
        assert!(dist.nm() < 56.0);
        let p = chron.graph.pos(pos);
        assert!(p.lon > 0.0);
    }

    #[test]
    fn carried_routes_marked_interior_without_anchoring() {
        let time = Utc::now();
        let chrons = vec![seed_chron(0.0, 0.0, time)];
        let mut cfg = test_config(round_polar());
        let env = env_with(Arc::new(UniformGrid {
            direction: 0.0,
            speed: 10.0,
            current: None,
        }));

        let mut out = Graph::new();
        let mut routelist = Vec::new();
        IsoChron::propagate_into(&chrons, 0, &mut out, &mut routelist, &env, &time, &cfg);
        let carried = &routelist[1];
        let entry = carried.skippoints.unwrap();
        assert!(out.pos(out.skip(entry).point).propagated);
        assert!(out.pos(out.skip(entry).point).copied);

        /* anchoring instead keeps the seed able to move again */
        cfg.anchoring = true;
        let mut out = Graph::new();
        let mut routelist = Vec::new();
        IsoChron::propagate_into(&chrons, 0, &mut out, &mut routelist, &env, &time, &cfg);
        let carried = &routelist[1];
        let entry = carried.skippoints.unwrap();
        assert!(!out.pos(out.skip(entry).point).propagated);
    }

    #[test]
    fn becalmed_frontier_is_dropped() {
        let time = Utc::now();
        let chrons = vec![seed_chron(0.0, 0.0, time)];
        let cfg = test_config(round_polar());
        let env = env_with(Arc::new(UniformGrid {
            direction: 0.0,
            speed: 0.0,
            current: None,
        }));

        let mut out = Graph::new();
        let mut routelist = Vec::new();
        IsoChron::propagate_into(&chrons, 0, &mut out, &mut routelist, &env, &time, &cfg);
        assert!(routelist.is_empty());
    }
}
