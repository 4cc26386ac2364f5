use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::algorithm::{apparent_wind, Algorithm, Degrees};
use crate::algorithm::spherical::Spherical;
use crate::environment::{over_ground, over_water, WindAtlas};
use crate::isochron::graph::{Graph, NodeId, ParentRef};
use crate::isochron::route::IsoRoute;
use crate::isochron::IsoChron;
use crate::position::Coords;
use crate::router::{ClimatologyType, IntegratorType, RouteMapConfiguration, StepEnv};
use crate::utils::Distance;

/// A place to read weather for, with the ancestry to fall back on when
/// the grid is deficient there.
#[derive(Clone)]
pub(crate) struct Probe {
    pub(crate) lat: f64,
    pub(crate) lon: f64,
    pub(crate) parent: Option<ParentRef>,
}

pub(crate) fn swell(env: &StepEnv, lat: f64, lon: f64) -> f64 {
    env.grib
        .as_ref()
        .and_then(|grib| grib.swell(lat, lon))
        .unwrap_or(0.0)
}

/* wind over ground, walking the ancestry when the data is deficient */
fn wind(
    env: &StepEnv,
    cfg: &RouteMapConfiguration,
    time: &DateTime<Utc>,
    chrons: &[Arc<IsoChron>],
    probe: &Probe,
) -> Option<(f64, f64)> {
    let mut probe = probe.clone();
    loop {
        if let Some(grib) = &env.grib {
            if let Some(w) = grib.wind(probe.lat, probe.lon) {
                return Some((w.direction, w.speed.kts()));
            }
        }

        if cfg.climatology_type != ClimatologyType::Disabled {
            if let Some(climatology) = &env.climatology {
                if let Some(w) = climatology.wind(time, probe.lat, probe.lon) {
                    return Some((w.direction.resolve180(), w.speed.kts()));
                }
            }
        }

        if !cfg.allow_data_deficient {
            return None;
        }
        match probe.parent {
            Some(parent) if parent.chron < chrons.len() => {
                let node = chrons[parent.chron].graph.pos(parent.node);
                probe = Probe {
                    lat: node.lat,
                    lon: node.lon,
                    parent: node.parent,
                };
            }
            _ => return None,
        }
    }
}

fn current(
    env: &StepEnv,
    cfg: &RouteMapConfiguration,
    time: &DateTime<Utc>,
    lat: f64,
    lon: f64,
) -> Option<(f64, f64)> {
    if let Some(grib) = &env.grib {
        if let Some(c) = grib.current(lat, lon) {
            return Some((c.direction, c.speed.kts()));
        }
    }

    if cfg.climatology_type != ClimatologyType::Disabled {
        if let Some(climatology) = &env.climatology {
            if let Some(c) = climatology.current(time, lat, lon) {
                return Some((c.direction, c.speed.kts()));
            }
        }
    }

    None
}

pub(crate) struct WeatherData {
    pub(crate) wg: f64,
    pub(crate) vwg: f64,
    pub(crate) w: f64,
    pub(crate) vw: f64,
    pub(crate) c: f64,
    pub(crate) vc: f64,
    pub(crate) atlas: Option<WindAtlas>,
}

/// Resolve the full weather picture at a probe: current, then wind from
/// the grid (or average climatology), or a representative wind distilled
/// from the eight-octant atlas.
pub(crate) fn read_wind_and_currents(
    env: &StepEnv,
    cfg: &RouteMapConfiguration,
    time: &DateTime<Utc>,
    chrons: &[Arc<IsoChron>],
    probe: &Probe,
) -> Option<WeatherData> {
    let (c, vc) = if !cfg.currents {
        (0.0, 0.0)
    } else {
        current(env, cfg, time, probe.lat, probe.lon).unwrap_or((0.0, 0.0))
    };

    if env.grib.is_some() || cfg.climatology_type == ClimatologyType::Average {
        let (wg, vwg) = wind(env, cfg, time, chrons, probe)?;
        let (w, vw) = over_water(wg, vwg, c, vc);
        return Some(WeatherData {
            wg,
            vwg,
            w,
            vw,
            c,
            vc,
            atlas: None,
        });
    }

    if cfg.climatology_type == ClimatologyType::Disabled {
        return None;
    }

    let climatology = env.climatology.as_ref()?;
    let mut probe = probe.clone();
    let raw = loop {
        match climatology.wind_atlas(time, probe.lat, probe.lon) {
            Some(atlas) => break atlas,
            None => {
                if !cfg.allow_data_deficient {
                    return None;
                }
                match probe.parent {
                    Some(parent) if parent.chron < chrons.len() => {
                        let node = chrons[parent.chron].graph.pos(parent.node);
                        probe = Probe {
                            lat: node.lat,
                            lon: node.lon,
                            parent: node.parent,
                        };
                    }
                    _ => return None,
                }
            }
        }
    };

    /* compute wind speeds over water with the given current */
    let mut atlas = raw.clone();
    for i in 0..8 {
        let wg = i as f64 * 360.0 / 8.0;
        let vwg = raw.vw[i];
        let (w, vw) = over_water(wg, vwg, c, vc);
        atlas.w[i] = w;
        atlas.vw[i] = vw;
    }

    /* find most likely wind direction */
    let mut maxi = 0;
    let mut max_direction = 0.0;
    for i in 0..8 {
        if atlas.directions[i] > max_direction {
            max_direction = atlas.directions[i];
            maxi = i;
        }
    }

    /* interpolate with the most likely adjacent octant, weighing by
       probability, for the representative wind */
    let mut maxia = (maxi + 1) % 8;
    let maxib = (maxi + 7) % 8;
    if atlas.directions[maxia] < atlas.directions[maxib] {
        maxia = maxib;
    }

    let maxid = 1.0 / (atlas.directions[maxi] / atlas.directions[maxia] + 1.0);
    let mut angle1 = atlas.w[maxia];
    let mut angle2 = atlas.w[maxi];
    while angle1 - angle2 > 180.0 {
        angle1 -= 360.0
    }
    while angle2 - angle1 > 180.0 {
        angle2 -= 360.0
    }
    let w = (maxid * angle1 + (1.0 - maxid) * angle2).wrap360();
    let vw = maxid * atlas.vw[maxia] + (1.0 - maxid) * atlas.vw[maxi];

    let (wg, vwg) = over_ground(w, vw, c, vc);
    Some(WeatherData {
        wg,
        vwg,
        w,
        vw,
        c,
        vc,
        atlas: Some(atlas),
    })
}

pub(crate) struct Motion {
    pub(crate) b: f64,
    pub(crate) vb: f64,
    pub(crate) bg: f64,
    pub(crate) vbg: f64,
    pub(crate) dist: f64,
}

pub(crate) fn compute_boat_speed(
    cfg: &RouteMapConfiguration,
    timeseconds: f64,
    data: &WeatherData,
    h: f64,
    sailplan: usize,
) -> Option<Motion> {
    let vb = match (&cfg.climatology_type, &data.atlas) {
        (ClimatologyType::CumulativeMap, Some(atlas)) => {
            cfg.boat.cumulative_speed(sailplan, h, data.w, atlas, false)
        }
        (ClimatologyType::CumulativeMinusCalms, Some(atlas)) => {
            cfg.boat.cumulative_speed(sailplan, h, data.w, atlas, true)
        }
        _ => cfg.boat.speed(sailplan, h, data.vw),
    };

    /* failed to determine speed.. */
    if vb.is_nan() {
        return None;
    }

    let b = data.w + h; /* rotated relative to true wind */

    /* compound boatspeed with current */
    let (bg, vbg) = over_ground(b, vb, data.c, data.vc);

    if vbg == 0.0 {
        /* no speed */
        return None;
    }

    /* distance over ground */
    let dist = vbg * timeseconds / 3600.0;

    Some(Motion { b, vb, bg, vbg, dist })
}

fn rk_step(
    env: &StepEnv,
    cfg: &RouteMapConfiguration,
    time: &DateTime<Utc>,
    chrons: &[Arc<IsoChron>],
    origin: &Probe,
    timeseconds: f64,
    bg: f64,
    dist: f64,
    h: f64,
    sailplan: usize,
) -> Option<(f64, f64)> {
    let k1 = Spherical {}.destination(
        &Coords {
            lat: origin.lat,
            lon: origin.lon,
        },
        bg,
        &Distance::from_nm(dist),
    );

    /* carry the origin's parent so deficient data can still resolve */
    let probe = Probe {
        lat: k1.lat,
        lon: k1.lon,
        parent: origin.parent,
    };
    let data = read_wind_and_currents(env, cfg, time, chrons, &probe)?;

    let motion = compute_boat_speed(cfg, timeseconds, &data, h, sailplan)?;
    Some((motion.bg, motion.dist))
}

/// Fan out from one position of the isochron at `chron_idx`, integrating
/// boat motion for every configured heading offset and collecting the
/// survivors into a fresh closed route on the next isochron's arena.
pub(crate) fn propagate_position(
    chrons: &[Arc<IsoChron>],
    chron_idx: usize,
    node: NodeId,
    g: &mut Graph,
    routelist: &mut Vec<IsoRoute>,
    env: &StepEnv,
    time: &DateTime<Utc>,
    cfg: &RouteMapConfiguration,
) -> bool {
    let src_graph = &chrons[chron_idx].graph;
    let src = src_graph.pos(node).clone();

    /* already propagated from this position, don't need to again */
    if src.propagated {
        return false;
    }

    let (lat, lon) = (src.lat, src.lon);

    let s = swell(env, lat, lon);
    if s > cfg.max_swell_meters {
        return false;
    }

    if lat.abs() > cfg.max_latitude {
        return false;
    }

    let probe = Probe {
        lat,
        lon,
        parent: src.parent,
    };
    let data = match read_wind_and_currents(env, cfg, time, chrons, &probe) {
        Some(data) => data,
        None => return false,
    };

    if data.vw > cfg.max_wind_knots {
        return false;
    }

    let daytime = None; /* unknown */

    /* bearing from the parent, needed for tacking tests */
    let mut parentbearing = f64::NAN;
    if let Some(parent) = src.parent {
        if (cfg.tacking_time != 0.0 || cfg.max_tacks >= 0) && parent.chron < chrons.len() {
            let pp = chrons[parent.chron].graph.pos(parent.node);
            parentbearing = Spherical {}.heading_to(&pp.coords(), &src.coords());
        }
    }

    let mut points: Option<NodeId> = None;
    let mut count = 0;

    /* through all angles relative to wind */
    for &h in cfg.degree_steps.iter() {
        let mut timeseconds = cfg.dt;

        let newsailplan = cfg
            .boat
            .try_switch_plan(src.sailplan, data.vw, h, s, time, lat, lon, daytime);

        let motion = match compute_boat_speed(cfg, timeseconds, &data, h, newsailplan) {
            Some(motion) => motion,
            None => continue,
        };

        /* upwind percentage, against the apparent wind */
        let mut cur_upwind = 0;
        if cfg.max_upwind_percentage < 100.0 {
            let (_va, a) = apparent_wind(motion.vb, h.to_radians(), data.vw);
            if a.to_degrees().abs() < 90.0 {
                if 100.0 * (src.upwind + 1) as f64 / (src.propagations + 1) as f64
                    > cfg.max_upwind_percentage
                {
                    continue;
                }
                cur_upwind = 1;
            }
        }

        /* did we tack? apply penalty */
        let mut tacked = false;
        let mut dist = motion.dist;
        if !parentbearing.is_nan() {
            let hrpb = parentbearing.resolve180();
            let hrb = motion.b;
            if hrpb * hrb < 0.0 && (hrpb - hrb).abs() < 180.0 {
                if cfg.max_tacks >= 0 && src.tacks >= cfg.max_tacks {
                    continue;
                }
                tacked = true;
                timeseconds -= cfg.tacking_time;
                dist = motion.vbg * timeseconds / 3600.0;
            }
        }

        let candidate = match cfg.integrator {
            IntegratorType::Newton => Spherical {}.destination(
                &Coords { lat, lon },
                motion.bg,
                &Distance::from_nm(dist),
            ),
            IntegratorType::RungeKutta => {
                let rk_time_2 = *time + Duration::seconds((timeseconds / 2.0) as i64);
                let rk_time = *time + Duration::seconds(timeseconds as i64);

                let origin = Probe {
                    lat,
                    lon,
                    parent: src.parent,
                };

                let k2 = match rk_step(
                    env, cfg, &rk_time_2, chrons, &origin, timeseconds, motion.bg,
                    dist / 2.0, h, newsailplan,
                ) {
                    Some(k) => k,
                    None => continue,
                };
                let k3 = match rk_step(
                    env, cfg, &rk_time_2, chrons, &origin, timeseconds, motion.bg,
                    k2.1 / 2.0, h + k2.0 - motion.bg, newsailplan,
                ) {
                    Some(k) => k,
                    None => continue,
                };
                let k4 = match rk_step(
                    env, cfg, &rk_time, chrons, &origin, timeseconds, motion.bg,
                    k3.1, h + k3.0 - motion.bg, newsailplan,
                ) {
                    Some(k) => k,
                    None => continue,
                };

                Spherical {}.destination(
                    &Coords { lat, lon },
                    motion.bg,
                    &Distance::from_nm(dist / 6.0 + k2.1 / 3.0 + k3.1 / 3.0 + k4.1 / 6.0),
                )
            }
        };

        let (dlat, mut dlon) = (candidate.lat, candidate.lon);
        let nrdlon = dlon;
        if cfg.positive_longitudes && dlon < 0.0 {
            dlon += 360.0;
        }

        if cfg.max_search_angle < 180.0 {
            let bearing = Spherical {}.heading_to(
                &Coords {
                    lat: cfg.start_lat,
                    lon: cfg.start_lon,
                },
                &Coords {
                    lat: dlat,
                    lon: dlon,
                },
            );

            if (cfg.start_end_bearing - bearing).resolve180().abs() > cfg.max_search_angle {
                continue;
            }
        }

        if cfg.max_diverted_course < 180.0 {
            let (dist2, bearing) = Spherical {}.distance_and_heading_to(
                &Coords {
                    lat: dlat,
                    lon: dlon,
                },
                &Coords {
                    lat: cfg.end_lat,
                    lon: cfg.end_lon,
                },
            );
            let (dist1, bearing1) = Spherical {}.distance_and_heading_to(
                &Coords {
                    lat: cfg.start_lat,
                    lon: cfg.start_lon,
                },
                &Coords {
                    lat: dlat,
                    lon: dlon,
                },
            );

            /* stays 1 until the end, then grows fast */
            let term = ((dist1.nm() + dist2.nm()) / dist2.nm() / 16.0).powi(4) + 1.0;

            if (bearing1 - bearing).resolve180().abs() > cfg.max_diverted_course * term {
                continue;
            }
        }

        /* landfall test */
        if cfg.detect_land {
            if let Some(lands) = &env.lands {
                if lands.crosses_land(lat, lon, dlat, nrdlon) {
                    continue;
                }
            }
        }

        /* crosses cyclone track(s)? */
        if cfg.avoid_cyclone_tracks {
            if let Some(climatology) = &env.climatology {
                let crossings = climatology.cyclone_crossings(
                    lat,
                    lon,
                    dlat,
                    dlon,
                    time,
                    cfg.cyclone_months * 30 + cfg.cyclone_days,
                    cfg.cyclone_wind_speed,
                    cfg.cyclone_climatology_start_year,
                );
                if let Some(crossings) = crossings {
                    if crossings > 0 {
                        continue;
                    }
                }
            }
        }

        let rp = g.add_position(
            dlat,
            dlon,
            Some(ParentRef {
                chron: chron_idx,
                node,
            }),
            newsailplan,
            src.tacks + tacked as i32,
            src.upwind + cur_upwind,
            src.propagations + 1,
        );

        match points {
            Some(head) => g.ring_insert_before(head, rp),
            None => points = Some(rp),
        }
        count += 1;
    }

    /* remove interior carry-over strings */
    if let Some(head) = points.as_mut() {
        'reset: loop {
            let mut p = *head;
            while count >= 3 {
                let pn = g.pos(p).next;
                if g.pos(g.pos(p).prev).propagated
                    && g.pos(p).propagated
                    && g.pos(pn).propagated
                {
                    let prev = g.pos(p).prev;
                    g.pos_mut(prev).next = pn;
                    g.pos_mut(pn).prev = prev;
                    count -= 1;
                    if p == *head {
                        *head = pn;
                        continue 'reset;
                    }
                }
                p = pn;
                if p == *head {
                    break;
                }
            }
            break;
        }
    }

    if count < 3 {
        /* would get eliminated anyway, save the extra steps */
        return false;
    }

    let entry = g.build_skip_list(points.unwrap());
    routelist.push(IsoRoute::new(entry, 1));
    true
}

impl IsoRoute {
    /// Fan out every position of this route into the next generation.
    pub(crate) fn propagate(
        &self,
        chrons: &[Arc<IsoChron>],
        chron_idx: usize,
        g: &mut Graph,
        routelist: &mut Vec<IsoRoute>,
        env: &StepEnv,
        time: &DateTime<Utc>,
        cfg: &RouteMapConfiguration,
    ) -> bool {
        let entry = match self.skippoints {
            Some(entry) => entry,
            None => return false,
        };

        let src_graph = &chrons[chron_idx].graph;
        let start = src_graph.skip(entry).point;

        let mut ret = false;
        let mut p = start;
        loop {
            if propagate_position(chrons, chron_idx, p, g, routelist, env, time, cfg) {
                ret = true;
            }
            p = src_graph.pos(p).next;
            if p == start {
                break;
            }
        }
        ret
    }
}
