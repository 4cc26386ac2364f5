//! Planar sweep normalization of isochron regions.
//!
//! A freshly propagated polygon self-intersects wherever the frontier
//! folded over itself, and polygons from different source positions
//! overlap each other. `normalize` walks pairs of skip segments looking
//! for crossing edges and resolves each crossing by swapping the four
//! links so the loops separate; `merge` combines two routes into
//! disjoint, simple, correctly signed regions.
//!
//! The rejection cascade works on a 3x3 cell decomposition around each
//! probe segment's bounding box. A vertex's cell is its *state*; knowing
//! the quadrant a run of edges moves in, the state of the next vertex
//! follows from a couple of comparisons, and whole runs are dismissed
//! without touching the exact intersection test.

use std::collections::VecDeque;

use log::{debug, error, warn};

use crate::algorithm::{test_intersection_xy, SegmentCross};
use crate::isochron::graph::{quadrant_fast, Graph, NodeId, SkipId};
use crate::isochron::route::{IsoRoute, MAXLAT, MAXLON, MINLAT, MINLON};

pub(crate) struct Bounds {
    minx: f64,
    maxx: f64,
    miny: f64,
    maxy: f64,
}

/* bounding box of a segment a -> b whose edge quadrant is known;
   x is longitude, y latitude */
fn segment_bounds(quadrant: u8, ax: f64, ay: f64, bx: f64, by: f64) -> Bounds {
    match quadrant {
        1 => Bounds { minx: ax, maxx: bx, miny: by, maxy: ay },
        2 => Bounds { minx: bx, maxx: ax, miny: ay, maxy: by },
        3 => Bounds { minx: ax, maxx: bx, miny: ay, maxy: by },
        _ => Bounds { minx: bx, maxx: ax, miny: by, maxy: ay },
    }
}

/*  cells around the box:  0  4  8
                          12 16 20
                          24 28 32  */
fn compute_state(b: &Bounds, x: f64, y: f64) -> u8 {
    let mut state = 0;
    if x >= b.minx {
        state += 4;
    }
    if x > b.maxx {
        state += 4;
    }
    if y >= b.miny {
        state += 12;
    }
    if y > b.maxy {
        state += 12;
    }
    state
}

enum Advance {
    /* the segment ending at the probe vertex cannot intersect the box;
       carry this state forward */
    Skip(u8),
    /* possible intersection, the exact test must run */
    Test,
}

/* Transition for a probe vertex reached by moving in `quadrant` from a
   vertex whose cell was `state`. Monotone motion lets most transitions
   update a single axis of the cell; only motion towards the box falls
   through to the exact test. */
fn advance(state: u8, quadrant: u8, b: &Bounds, x: f64, y: f64) -> Advance {
    use Advance::*;

    let right = |x: f64| if x > b.maxx { 8 } else { 4 };
    let up = |y: f64| if y > b.maxy { 24 } else { 12 };

    match state + quadrant {
        0 => Skip(0),
        1 => Skip(if x >= b.minx { right(x) } else { 0 }),
        2 => Skip(if y >= b.miny { up(y) } else { 0 }),
        3 => {
            if x >= b.minx {
                if y >= b.miny {
                    Test
                } else {
                    Skip(right(x))
                }
            } else {
                Skip(if y >= b.miny { up(y) } else { 0 })
            }
        }

        4 => Skip(if x < b.minx { 0 } else { 4 }),
        5 => Skip(if x > b.maxx { 8 } else { 4 }),
        6 => {
            if y >= b.miny {
                Test
            } else {
                Skip(if x < b.minx { 0 } else { 4 })
            }
        }
        7 => {
            if y >= b.miny {
                Test
            } else {
                Skip(if x > b.maxx { 8 } else { 4 })
            }
        }

        8 => Skip(if x <= b.maxx { if x < b.minx { 0 } else { 4 } } else { 8 }),
        9 => Skip(8),
        10 => {
            if x <= b.maxx {
                if y >= b.miny {
                    Test
                } else {
                    Skip(if x < b.minx { 0 } else { 4 })
                }
            } else {
                Skip(if y >= b.miny { up(y) + 8 } else { 8 })
            }
        }
        11 => Skip(if y >= b.miny { up(y) + 8 } else { 8 }),

        12 => Skip(if y < b.miny { 0 } else { 12 }),
        13 => {
            if x >= b.minx {
                Test
            } else {
                Skip(if y < b.miny { 0 } else { 12 })
            }
        }
        14 => Skip(if y > b.maxy { 24 } else { 12 }),
        15 => {
            if x >= b.minx {
                Test
            } else {
                Skip(if y > b.maxy { 24 } else { 12 })
            }
        }

        /* inside the box: always test */
        16 | 17 | 18 | 19 => Test,

        20 => {
            if x <= b.maxx {
                Test
            } else {
                Skip(if y < b.miny { 8 } else { 20 })
            }
        }
        21 => Skip(if y < b.miny { 8 } else { 20 }),
        22 => {
            if x <= b.maxx {
                Test
            } else {
                Skip(if y > b.maxy { 32 } else { 20 })
            }
        }
        23 => Skip(if y > b.maxy { 32 } else { 20 }),

        24 => Skip(if y <= b.maxy { if y < b.miny { 0 } else { 12 } } else { 24 }),
        25 => {
            if x >= b.minx {
                if y <= b.maxy {
                    Test
                } else {
                    Skip(if x > b.maxx { 32 } else { 28 })
                }
            } else {
                Skip(if y <= b.maxy { if y < b.miny { 0 } else { 12 } } else { 24 })
            }
        }
        26 => Skip(24),
        27 => Skip(if x >= b.minx { if x > b.maxx { 32 } else { 28 } } else { 24 }),

        28 => {
            if y <= b.maxy {
                Test
            } else {
                Skip(if x < b.minx { 24 } else { 28 })
            }
        }
        29 => {
            if y <= b.maxy {
                Test
            } else {
                Skip(if x > b.maxx { 32 } else { 28 })
            }
        }
        30 => Skip(if x < b.minx { 24 } else { 28 }),
        31 => Skip(if x > b.maxx { 32 } else { 28 }),

        32 => {
            if x <= b.maxx {
                if y <= b.maxy {
                    Test
                } else {
                    Skip(if x < b.minx { 24 } else { 28 })
                }
            } else {
                Skip(if y <= b.maxy { if y < b.miny { 8 } else { 20 } } else { 32 })
            }
        }
        33 => Skip(if y <= b.maxy { if y < b.miny { 8 } else { 20 } } else { 32 }),
        34 => Skip(if x <= b.maxx { if x < b.minx { 24 } else { 28 } } else { 32 }),
        _ => Skip(32),
    }
}

fn swap_segments(g: &mut Graph, p: NodeId, q: NodeId, r: NodeId, s: NodeId) {
    g.pos_mut(p).next = s;
    g.pos_mut(s).prev = p;
    g.pos_mut(r).next = q;
    g.pos_mut(q).prev = r;
}

fn swap_skip_segments(g: &mut Graph, sp: SkipId, sq: SkipId, sr: SkipId, ss: SkipId) {
    g.skip_mut(sp).next = ss;
    g.skip_mut(ss).prev = sp;
    g.skip_mut(sr).next = sq;
    g.skip_mut(sq).prev = sr;
}

fn remove_ss(g: &mut Graph, sp: SkipId, ss: SkipId, spend: &mut SkipId, ssend: &mut SkipId) {
    if sp == ss {
        warn!("fix skip list would collapse onto itself");
    }
    if ss == *spend {
        *spend = g.skip(ss).next;
    }
    if ss == *ssend {
        *ssend = g.skip(ss).next;
    }
    g.remove_skip(ss);
}

/* After a splice made p -> s adjacent inside the run between sp and ss,
   add, shift or drop skip nodes so consecutive runs keep distinct
   quadrants. The sweep sentinels are forwarded rather than dropped. */
fn fix_skip_list(
    g: &mut Graph,
    sp: SkipId,
    ss: SkipId,
    p: NodeId,
    s: NodeId,
    rquadrant: u8,
    spend: &mut SkipId,
    ssend: &mut SkipId,
) {
    let mut ss = ss;
    let quadrant = quadrant_fast(g.pos(p).lat, g.pos(p).lon, g.pos(s).lat, g.pos(s).lon);

    if g.skip(sp).point == p {
        g.skip_mut(sp).quadrant = quadrant; /* reuse p with this quadrant */

        let sp_prev = g.skip(sp).prev;
        if quadrant == g.skip(sp_prev).quadrant && sp != ss {
            g.skip_mut(sp).point = g.skip(sp_prev).point;
            if sp_prev == *spend {
                *spend = sp;
            }
            if sp_prev == *ssend {
                *ssend = sp;
            }
            if ss == sp_prev {
                if *ssend == ss {
                    *ssend = sp;
                }
                ss = sp;
            }
            g.remove_skip(sp_prev);
        }

        if quadrant == rquadrant {
            if rquadrant == g.skip(ss).quadrant {
                remove_ss(g, sp, ss, spend, ssend);
            }
        } else if g.skip(ss).point == s {
            if quadrant == g.skip(ss).quadrant {
                remove_ss(g, sp, ss, spend, ssend);
            }
        } else if rquadrant == g.skip(ss).quadrant {
            g.skip_mut(ss).point = s; /* shift ss to s */
        } else {
            g.insert_skip_after(sp, ss, s, rquadrant);
        }
    } else if g.skip(sp).quadrant == quadrant {
        if quadrant == rquadrant {
            if rquadrant == g.skip(ss).quadrant {
                remove_ss(g, sp, ss, spend, ssend);
            }
        } else if g.skip(ss).point == s {
            if quadrant == g.skip(ss).quadrant {
                remove_ss(g, sp, ss, spend, ssend);
            }
        } else if rquadrant == g.skip(ss).quadrant {
            g.skip_mut(ss).point = s; /* shift ss to s */
        } else {
            g.insert_skip_after(sp, ss, s, rquadrant);
        }
    } else if quadrant == rquadrant {
        if rquadrant == g.skip(ss).quadrant {
            g.skip_mut(ss).point = p; /* shift ss to p */
        } else {
            g.insert_skip_after(sp, ss, p, quadrant);
        }
    } else if g.skip(ss).point == s {
        if quadrant == g.skip(ss).quadrant {
            g.skip_mut(ss).point = p; /* shift ss to p */
        } else {
            g.insert_skip_after(sp, ss, p, quadrant);
        }
    } else {
        g.insert_skip_after(sp, ss, p, quadrant);
        if rquadrant == g.skip(ss).quadrant {
            g.skip_mut(ss).point = s; /* shift ss to s */
        } else {
            let after = g.skip(sp).next;
            g.insert_skip_after(after, ss, s, rquadrant);
        }
    }
}

/* whether the sentinel ended up in the ring reachable from sr */
fn update_end(g: &Graph, end: SkipId, sr: SkipId) -> bool {
    let mut nsr = sr;
    loop {
        if nsr == end {
            return true;
        }
        nsr = g.skip(nsr).next;
        if nsr == sr {
            return false;
        }
    }
}

pub(crate) enum NormalizeOutcome {
    /// routes consumed; results pushed onto the output list
    Done,
    /// merge mode found no intersection: both routes handed back
    Untouched(IsoRoute, IsoRoute),
}

enum DetailExit {
    Done(NodeId),
    Reset,
    Restart,
}

/// Resolve self- and pairwise intersections. With `route2` absent the
/// route is normalized against itself; split-off loops become siblings,
/// children or are dropped depending on direction, size and containment.
/// With `route2` present the first crossing splices the two polygons into
/// one and the procedure continues as self-normalization.
pub(crate) fn normalize(
    rl: &mut Vec<IsoRoute>,
    g: &mut Graph,
    route1: IsoRoute,
    route2: Option<IsoRoute>,
    level: u32,
    inverted_regions: bool,
) -> NormalizeOutcome {
    let mut route1 = route1;
    let mut route2 = route2;

    'reset: loop {
        let spend_entry = match route1.skippoints {
            Some(entry) if g.skip(entry).prev != g.skip(entry).next => entry,
            _ => {
                /* less than 3 skip segments, drop it */
                if let Some(r2) = route2.take() {
                    rl.push(r2);
                }
                return NormalizeOutcome::Done;
            }
        };

        let mut normalizing = true;
        let mut ssend_entry = spend_entry;
        if let Some(r2) = &route2 {
            let entry = r2.skippoints;
            match entry {
                Some(entry) if g.skip(entry).prev != g.skip(entry).next => {
                    normalizing = false;
                    ssend_entry = entry;
                }
                _ => {
                    /* less than 3 skip segments, drop the second route */
                    rl.push(route1);
                    return NormalizeOutcome::Done;
                }
            }
        }

        let mut spend = spend_entry;
        let mut ssend = ssend_entry;
        let mut sp = spend;

        'startnormalizing: loop {
            let sq = g.skip(sp).next;
            let mut ss = if normalizing { sp } else { ssend };

            let p0 = g.skip(sp).point;
            let q0 = g.skip(sq).point;
            let bounds = segment_bounds(
                g.skip(sp).quadrant,
                g.pos(p0).lon,
                g.pos(p0).lat,
                g.pos(q0).lon,
                g.pos(q0).lat,
            );

            let s0 = g.skip(ss).point;
            let mut state = compute_state(&bounds, g.pos(s0).lon, g.pos(s0).lat);

            'ssloop: loop {
                let sr = ss;
                ss = g.skip(sr).next;
                let s_outer = g.skip(ss).point;

                match advance(
                    state,
                    g.skip(sr).quadrant,
                    &bounds,
                    g.pos(s_outer).lon,
                    g.pos(s_outer).lat,
                ) {
                    Advance::Skip(ns) => state = ns,
                    Advance::Test => {
                        let exit = sweep_pair(
                            rl,
                            g,
                            &mut route1,
                            &mut route2,
                            &mut normalizing,
                            level,
                            inverted_regions,
                            sp,
                            sq,
                            sr,
                            ss,
                            &mut spend,
                            &mut ssend,
                            &bounds,
                            state,
                        );
                        match exit {
                            DetailExit::Done(sfin) => {
                                state =
                                    compute_state(&bounds, g.pos(sfin).lon, g.pos(sfin).lat);
                            }
                            DetailExit::Reset => continue 'reset,
                            DetailExit::Restart => continue 'startnormalizing,
                        }
                    }
                }

                if ss == ssend {
                    break 'ssloop;
                }
            }

            sp = sq;
            if sp == spend {
                break 'startnormalizing;
            }
        }

        if normalizing {
            route1.skippoints = Some(spend);
            rl.push(route1);
            return NormalizeOutcome::Done;
        }
        return NormalizeOutcome::Untouched(route1, route2.unwrap());
    }
}

/* re-enter the routes at the sweep sentinels before surgery; in
   self-normalization both sentinels describe the same ring and the
   later one wins */
fn restore_entries(
    route1: &mut IsoRoute,
    route2: &mut Option<IsoRoute>,
    spend: SkipId,
    ssend: SkipId,
) {
    route1.skippoints = Some(spend);
    match route2.as_mut() {
        Some(r2) => r2.skippoints = Some(ssend),
        None => route1.skippoints = Some(ssend),
    }
}

/* Examine one pair of skip segments whose boxes may interact: refine to
   the position ranges that can touch, then run the exact intersection
   test over surviving edge pairs. */
fn sweep_pair(
    rl: &mut Vec<IsoRoute>,
    g: &mut Graph,
    route1: &mut IsoRoute,
    route2: &mut Option<IsoRoute>,
    normalizing: &mut bool,
    level: u32,
    inverted_regions: bool,
    sp: SkipId,
    sq: SkipId,
    sr: SkipId,
    ss: SkipId,
    spend: &mut SkipId,
    ssend: &mut SkipId,
    bounds: &Bounds,
    state: u8,
) -> DetailExit {
    let mut nr = 0u8;
    let pstart;
    let pend;
    let rstart;
    let mut rend;

    if *normalizing {
        if sp == sr {
            nr = 1; /* only occurs during normalizing (first round) */
        } else if sq == sr {
            nr = 2; /* second round */
        } else if ss == sp {
            nr = 3; /* last round */
        }
    }

    if nr == 1 {
        /* overlapping round, don't bother with smaller bounds */
        pstart = g.skip(sp).point;
        pend = g.skip(sq).point;
        rstart = g.skip(sr).point;
        rend = g.skip(ss).point;
    } else {
        /* refine both position ranges against the other segment's box */
        let r0 = g.skip(sr).point;
        let s0 = g.skip(ss).point;
        let rbounds = segment_bounds(
            g.skip(sr).quadrant,
            g.pos(r0).lon,
            g.pos(r0).lat,
            g.pos(s0).lon,
            g.pos(s0).lat,
        );

        let mut pstart_found: Option<NodeId> = None;
        let mut pend_found = g.skip(sq).point;
        let mut q = g.skip(sp).point;
        let mut pstate = compute_state(&rbounds, g.pos(q).lon, g.pos(q).lat);
        loop {
            let p = q;
            q = g.pos(q).next;
            match advance(
                pstate,
                g.skip(sp).quadrant,
                &rbounds,
                g.pos(q).lon,
                g.pos(q).lat,
            ) {
                Advance::Test => {
                    if pstart_found.is_none() {
                        pstart_found = Some(p);
                    }
                    pend_found = q;
                    pstate = compute_state(&rbounds, g.pos(q).lon, g.pos(q).lat);
                }
                Advance::Skip(ns) => {
                    pstate = ns;
                    if pstart_found.is_some() {
                        break; /* have start, must be done */
                    }
                }
            }
            if q == g.skip(sq).point {
                break;
            }
        }
        pstart = match pstart_found {
            Some(p) => p,
            None => return DetailExit::Done(g.skip(ss).point),
        };
        pend = pend_found;

        let mut rstart_found: Option<NodeId> = None;
        let mut rend_found = g.skip(ss).point;
        let mut cursor = g.skip(sr).point;
        let mut rstate = state; /* still valid from before */
        loop {
            let r = cursor;
            cursor = g.pos(cursor).next;
            match advance(
                rstate,
                g.skip(sr).quadrant,
                bounds,
                g.pos(cursor).lon,
                g.pos(cursor).lat,
            ) {
                Advance::Test => {
                    if rstart_found.is_none() {
                        rstart_found = Some(r);
                    }
                    rend_found = cursor;
                    rstate = compute_state(bounds, g.pos(cursor).lon, g.pos(cursor).lat);
                }
                Advance::Skip(ns) => {
                    rstate = ns;
                    if rstart_found.is_some() {
                        break;
                    }
                }
            }
            if cursor == g.skip(ss).point {
                break;
            }
        }
        rstart = match rstart_found {
            Some(r) => r,
            None => return DetailExit::Done(cursor),
        };
        rend = rend_found;
    }

    let mut p = pstart;
    'ploop: loop {
        let q = g.pos(p).next;

        let mut s = match nr {
            1 => {
                let t = q;
                if t == rend {
                    break 'ploop DetailExit::Done(t);
                }
                g.pos(t).next
            }
            2 => {
                let t = rstart;
                if t == q {
                    g.pos(t).next
                } else {
                    t
                }
            }
            3 => {
                if rend == p {
                    rend = g.pos(rend).prev;
                }
                rstart
            }
            _ => rstart,
        };

        if s == rend {
            break 'ploop DetailExit::Done(s);
        }

        let pq_bounds = segment_bounds(
            g.skip(sp).quadrant,
            g.pos(p).lon,
            g.pos(p).lat,
            g.pos(q).lon,
            g.pos(q).lat,
        );
        let mut st = compute_state(&pq_bounds, g.pos(s).lon, g.pos(s).lat);

        loop {
            let r = s;
            s = g.pos(r).next;

            match advance(
                st,
                g.skip(sr).quadrant,
                &pq_bounds,
                g.pos(s).lon,
                g.pos(s).lat,
            ) {
                Advance::Skip(ns) => st = ns,
                Advance::Test => {
                    let dir = test_intersection_xy(
                        g.pos(p).lon,
                        g.pos(p).lat,
                        g.pos(q).lon,
                        g.pos(q).lat,
                        g.pos(r).lon,
                        g.pos(r).lat,
                        g.pos(s).lon,
                        g.pos(s).lat,
                    );

                    match dir {
                        SegmentCross::FirstStartTouches => {
                            restore_entries(route1, route2, *spend, *ssend);
                            route1.remove_position(g, sp, p);
                            return DetailExit::Reset;
                        }
                        SegmentCross::FirstEndTouches => {
                            restore_entries(route1, route2, *spend, *ssend);
                            route1.remove_position(g, sq, q);
                            return DetailExit::Reset;
                        }
                        SegmentCross::SecondStartTouches => {
                            restore_entries(route1, route2, *spend, *ssend);
                            match route2.as_mut() {
                                Some(r2) => r2.remove_position(g, sr, r),
                                None => route1.remove_position(g, sr, r),
                            }
                            return DetailExit::Reset;
                        }
                        SegmentCross::SecondEndTouches => {
                            restore_entries(route1, route2, *spend, *ssend);
                            match route2.as_mut() {
                                Some(r2) => r2.remove_position(g, ss, s),
                                None => route1.remove_position(g, ss, s),
                            }
                            return DetailExit::Reset;
                        }
                        SegmentCross::RightToLeft | SegmentCross::LeftToRight => {
                            let dir = dir.crossing_direction();

                            let mut skipmerge = false;
                            if !*normalizing {
                                /* sanity check for merging: make sure we
                                   intersected at the correct side of the
                                   region, a segment can pass completely
                                   through */
                                let r2dir = route2.as_ref().map(|r| r.direction).unwrap_or(0);
                                if dir == -1 {
                                    if route1.direction != 1 || r2dir != -1 {
                                        skipmerge = true;
                                    }
                                } else if route1.direction == 1 && r2dir == -1 {
                                    skipmerge = true;
                                }
                            }

                            if !skipmerge {
                                swap_segments(g, p, q, r, s);
                                swap_skip_segments(g, sp, sq, sr, ss);

                                if g.skip(sp).quadrant != g.skip(sr).quadrant {
                                    let rquadrant = g.skip(sr).quadrant;
                                    let pquadrant = g.skip(sp).quadrant;
                                    fix_skip_list(g, sp, ss, p, s, rquadrant, spend, ssend);
                                    fix_skip_list(g, sr, sq, r, q, pquadrant, spend, ssend);
                                }

                                if *normalizing {
                                    /* did the end end up in the subroute?
                                       move it back out */
                                    if update_end(g, *spend, sr) {
                                        *spend = g.skip(sp).next;
                                    }
                                    if update_end(g, *ssend, sr) {
                                        *ssend = g.skip(sp).next;
                                    }

                                    let two_long = g.skip(g.skip(sr).next).next == sr;
                                    if level == 0 {
                                        if dir != route1.direction || two_long {
                                            /* slight numerical error, or outer inversion */
                                        } else {
                                            let x = IsoRoute::new(sr, dir);
                                            let mut sub = Vec::new();
                                            normalize(
                                                &mut sub,
                                                g,
                                                x,
                                                None,
                                                level + 1,
                                                inverted_regions,
                                            );
                                            if inverted_regions {
                                                for it in sub {
                                                    if !it.children.is_empty() {
                                                        warn!("grandchild detected");
                                                    } else if route1.direction == it.direction {
                                                        rl.push(it); /* sibling */
                                                    } else if it.count(g) < 16 {
                                                        debug!(
                                                            "too small to be a useful child: {}",
                                                            it.count(g)
                                                        );
                                                    } else {
                                                        route1.skippoints = Some(*spend);
                                                        if route1.completely_contained(g, &it) {
                                                            route1.children.push(it);
                                                        } else {
                                                            debug!(
                                                                "not correct to be child: {}",
                                                                it.count(g)
                                                            );
                                                        }
                                                    }
                                                }
                                            } else {
                                                for it in sub {
                                                    if route1.direction == it.direction {
                                                        rl.push(it); /* sibling */
                                                    }
                                                }
                                            }
                                        }
                                    } else {
                                        /* all subregions are siblings for inner levels */
                                        if !two_long {
                                            let x = IsoRoute::new(sr, dir);
                                            let mut sub = Vec::new();
                                            normalize(
                                                &mut sub,
                                                g,
                                                x,
                                                None,
                                                level + 1,
                                                inverted_regions,
                                            );
                                            rl.append(&mut sub);
                                        }
                                    }
                                } else {
                                    /* merging: absorb the other route and
                                       fall into self-normalization */
                                    let mut r2 = route2.take().unwrap();
                                    route1.children.append(&mut r2.children);
                                    *ssend = *spend;
                                    *spend = g.skip(sr).next;
                                    *normalizing = true;
                                }
                                return DetailExit::Restart;
                            }
                        }
                        SegmentCross::Apart => {}
                    }

                    st = compute_state(&pq_bounds, g.pos(s).lon, g.pos(s).lat);
                }
            }

            if s == rend {
                break;
            }
        }

        p = q;
        if p == pend {
            break 'ploop DetailExit::Done(s);
        }
    }
}

pub(crate) enum MergeOutcome {
    /// combined into a disjoint set
    Merged(Vec<IsoRoute>),
    /// no overlap; both routes handed back
    Separate(IsoRoute, IsoRoute),
}

/// Combine two possibly overlapping routes. Overlapping boundaries are
/// resolved by `normalize`; full containment folds the inner route away,
/// masking any children it covers.
pub(crate) fn merge(
    g: &mut Graph,
    route1: IsoRoute,
    route2: IsoRoute,
    level: u32,
    inverted_regions: bool,
) -> MergeOutcome {
    let mut route1 = route1;
    let mut route2 = route2;

    if route1.direction == -1 && route2.direction == -1 {
        error!("cannot merge two inverted routes");
        return MergeOutcome::Separate(route1, route2);
    }

    /* quick test to make sure we could possibly intersect with bounds */
    let bounds1 = route1.find_bounds(g);
    let bounds2 = route2.find_bounds(g);
    if bounds1[MINLAT] > bounds2[MAXLAT]
        || bounds1[MAXLAT] < bounds2[MINLAT]
        || bounds1[MINLON] > bounds2[MAXLON]
        || bounds1[MAXLON] < bounds2[MINLON]
    {
        return MergeOutcome::Separate(route1, route2);
    }

    /* make sure route1 is on the outside */
    let lat1 = route1
        .skippoints
        .map(|s| g.pos(g.skip(s).point).lat)
        .unwrap_or(f64::NEG_INFINITY);
    let lat2 = route2
        .skippoints
        .map(|s| g.pos(g.skip(s).point).lat)
        .unwrap_or(f64::NEG_INFINITY);
    if lat2 > lat1 {
        std::mem::swap(&mut route1, &mut route2);
    }

    let mut rl = Vec::new();
    match normalize(&mut rl, g, route1, Some(route2), level, inverted_regions) {
        NormalizeOutcome::Done => return MergeOutcome::Merged(rl),
        NormalizeOutcome::Untouched(r1, r2) => {
            route1 = r1;
            route2 = r2;
        }
    }

    /* no intersection found, test if the second route is completely
       inside the first */
    if !route1.contains_route(g, &route2) {
        /* close enough to pass the rectangle test but no actual overlap */
        return MergeOutcome::Separate(route1, route2);
    }

    if inverted_regions {
        match (route1.direction, route2.direction) {
            (1, 1) => {
                /* remove route2's children, route1 clears them */
                route2.children.clear();

                /* now determine if route2 affects any of route1's children;
                   where it does, it masks away that area. Once completely
                   merged the masks are dropped and the children remain */
                let mut children_mask: VecDeque<IsoRoute> = VecDeque::new();
                children_mask.push_back(route2);
                while let Some(mask) = children_mask.pop_front() {
                    let mut children: VecDeque<IsoRoute> =
                        std::mem::take(&mut route1.children).into();
                    let mut merged_children = Vec::new();
                    let mut mask = Some(mask);
                    while let Some(child) = children.pop_front() {
                        match merge(g, mask.take().unwrap(), child, 1, true) {
                            MergeOutcome::Merged(products) => {
                                for product in products {
                                    if product.direction == route1.direction {
                                        children_mask.push_back(product);
                                    } else {
                                        route1.children.push(product);
                                    }
                                }
                                break;
                            }
                            MergeOutcome::Separate(m, child) => {
                                mask = Some(m);
                                merged_children.push(child);
                            }
                        }
                    }
                    /* unvisited children carry over; a spent mask is dropped */
                    merged_children.extend(children);
                    route1.children.extend(merged_children);
                }
            }
            (-1, -1) => {
                /* keep smaller region if both inverted */
                route1 = route2;
            }
            (1, -1) => { /* hole covered by the outer region, drop it */ }
            _ => {
                debug!(
                    "contrived containment: {} {}",
                    route1.count(g),
                    route2.count(g)
                );
            }
        }
    }
    /* without inverted regions route2 covers a sub area, drop it */

    MergeOutcome::Merged(vec![route1])
}

/// Repeatedly merge pairs until no more merges occur. Returns `None`
/// when aborted, leaving no observable change to the caller's state.
pub(crate) fn reduce_list(
    g: &mut Graph,
    routelist: Vec<IsoRoute>,
    inverted_regions: bool,
    test_abort: &dyn Fn() -> bool,
) -> Option<Vec<IsoRoute>> {
    let mut routelist: VecDeque<IsoRoute> = routelist.into();
    let mut merged = Vec::new();

    loop {
        if test_abort() {
            return None;
        }

        let r1 = match routelist.pop_front() {
            Some(r1) => r1,
            None => break,
        };

        let mut unmerged = Vec::new();
        let mut r1 = Some(r1);
        while let Some(r2) = routelist.pop_front() {
            match merge(g, r1.take().unwrap(), r2, 0, inverted_regions) {
                MergeOutcome::Merged(products) => {
                    routelist.extend(products);
                    break;
                }
                MergeOutcome::Separate(a, b) => {
                    r1 = Some(a);
                    unmerged.push(b);
                }
            }
        }

        /* nothing left to merge with */
        if let Some(r1) = r1.take() {
            merged.push(r1);
        }

        /* put any unmerged back in the list to continue */
        routelist.extend(unmerged);
    }

    Some(merged)
}
