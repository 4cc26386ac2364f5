use log::warn;

use crate::algorithm::{test_intersection_xy, Algorithm, SegmentCross};
use crate::algorithm::spherical::Spherical;
use crate::isochron::graph::{quadrant_wrapped, Graph, NodeId, SkipId};
use crate::position::Coords;
use crate::utils::Distance;

pub(crate) const MINLON: usize = 0;
pub(crate) const MAXLON: usize = 1;
pub(crate) const MINLAT: usize = 2;
pub(crate) const MAXLAT: usize = 3;

/// One closed region of an isochron. `direction` is +1 for an ordinary
/// region and -1 for an inverted one (a hole); holes live in `children`
/// and are never nested further.
pub(crate) struct IsoRoute {
    pub(crate) skippoints: Option<SkipId>,
    pub(crate) direction: i32,
    pub(crate) children: Vec<IsoRoute>,
}

fn simple_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = lat1 - lat2;
    let mut dlon = (lon1 - lon2).abs();
    while dlon > 180.0 {
        dlon -= 360.0
    }
    dlat * dlat + dlon * dlon
}

impl IsoRoute {
    pub(crate) fn new(skippoints: SkipId, direction: i32) -> Self {
        IsoRoute {
            skippoints: Some(skippoints),
            direction,
            children: Vec::new(),
        }
    }

    /// Deep-copy the polygon and its skip list into another arena. The
    /// copies are flagged `copied`; children are not copied here.
    pub(crate) fn copy(
        &self,
        src: &Graph,
        dst: &mut Graph,
        propagated_override: Option<bool>,
    ) -> IsoRoute {
        let entry = match self.skippoints {
            Some(entry) => entry,
            None => {
                return IsoRoute {
                    skippoints: None,
                    direction: self.direction,
                    children: Vec::new(),
                }
            }
        };

        let mut fs: Option<SkipId> = None;
        let mut ns: Option<SkipId> = None;
        let mut fp: Option<NodeId> = None;
        let mut np: Option<NodeId> = None;

        let mut s = entry;
        loop {
            let send = src.skip(src.skip(s).next).point;
            let mut p = src.skip(s).point;
            let mut nsp: Option<NodeId> = None;
            loop {
                /* copy all positions between skip positions */
                let nnp = dst.copy_position(src.pos(p));
                if let Some(propagated) = propagated_override {
                    dst.pos_mut(nnp).propagated = propagated;
                }
                if nsp.is_none() {
                    nsp = Some(nnp);
                }
                match np {
                    Some(prev) => {
                        dst.pos_mut(prev).next = nnp;
                        dst.pos_mut(nnp).prev = prev;
                    }
                    None => fp = Some(nnp),
                }
                np = Some(nnp);
                p = src.pos(p).next;
                if p == send {
                    break;
                }
            }

            let nns = dst.add_skip(nsp.unwrap(), src.skip(s).quadrant);
            match ns {
                Some(prev) => {
                    dst.skip_mut(prev).next = nns;
                    dst.skip_mut(nns).prev = prev;
                }
                None => fs = Some(nns),
            }
            ns = Some(nns);

            s = src.skip(s).next;
            if s == entry {
                break;
            }
        }

        let (fs, ns) = (fs.unwrap(), ns.unwrap());
        dst.skip_mut(fs).prev = ns;
        dst.skip_mut(ns).next = fs;
        let (fp, np) = (fp.unwrap(), np.unwrap());
        dst.pos_mut(fp).prev = np;
        dst.pos_mut(np).next = fp;

        IsoRoute {
            skippoints: Some(fs),
            direction: self.direction,
            children: Vec::new(),
        }
    }

    /// How many times a ray cast due north from the point crosses this
    /// route; `None` when an edge passes too close to call.
    pub(crate) fn intersection_count(&self, g: &Graph, lat: f64, lon: f64) -> Option<u32> {
        let entry = self.skippoints?;
        let mut numintsct = 0u32;

        let mut s1 = entry;
        loop {
            let s2 = g.skip(s1).next;
            let s1p = g.pos(g.skip(s1).point);
            let s2p = g.pos(g.skip(s2).point);

            let state = (lon < s1p.lon) as u8 + (lon < s2p.lon) as u8;
            if state == 1 {
                let state = (lat < s1p.lat) as u8 + (lat < s2p.lat) as u8;
                match state {
                    1 => {
                        /* point falls in the skip segment box, so walk
                           every edge of the run */
                        let endpoint = g.skip(s2).point;
                        let mut hit = false;
                        let mut p1 = g.skip(s1).point;
                        loop {
                            let p2 = g.pos(p1).next;
                            let (p1lat, p1lon) = (g.pos(p1).lat, g.pos(p1).lon);
                            let (p2lat, p2lon) = (g.pos(p2).lat, g.pos(p2).lon);
                            let state = (lon < p1lon) as u8 + (lon < p2lon) as u8;
                            if state == 1 {
                                let state = (lat < p1lat) as u8 + (lat < p2lat) as u8;
                                match state {
                                    1 => {
                                        match test_intersection_xy(
                                            p1lon, p1lat, p2lon, p2lat, lon, lat, lon, 91.0,
                                        ) {
                                            SegmentCross::Apart => {}
                                            SegmentCross::RightToLeft
                                            | SegmentCross::LeftToRight => {
                                                hit = true;
                                                break;
                                            }
                                            _ => return None,
                                        }
                                    }
                                    2 => {
                                        /* must intersect, we are below */
                                        hit = true;
                                        break;
                                    }
                                    _ => {}
                                }
                            }
                            p1 = p2;
                            if p1 == endpoint {
                                break;
                            }
                        }
                        if hit {
                            numintsct += 1;
                        }
                    }
                    2 => {
                        /* must intersect, we are below the whole run */
                        numintsct += 1;
                    }
                    _ => {}
                }
            }

            s1 = s2;
            if s1 == entry {
                break;
            }
        }

        Some(numintsct)
    }

    /// Odd parity of the northward crossing count; with `test_children`
    /// each inverted child flips the parity once more.
    pub(crate) fn contains(
        &self,
        g: &Graph,
        lat: f64,
        lon: f64,
        test_children: bool,
    ) -> Option<bool> {
        let mut numintsct = self.intersection_count(g, lat, lon)?;

        if test_children {
            for child in &self.children {
                numintsct += child.contains(g, lat, lon, test_children)? as u32;
            }
        }

        Some(numintsct & 1 == 1)
    }

    pub(crate) fn completely_contained(&self, g: &Graph, r: &IsoRoute) -> bool {
        let entry = match r.skippoints {
            Some(entry) => entry,
            None => return false,
        };
        let mut pos = g.skip(entry).point;
        loop {
            if self.contains(g, g.pos(pos).lat, g.pos(pos).lon, false) != Some(true) {
                return false;
            }
            pos = g.pos(pos).next;
            if pos == g.skip(entry).point {
                break;
            }
        }
        true
    }

    /// Containment of another route, testing further points only when a
    /// point lands on the boundary.
    pub(crate) fn contains_route(&self, g: &Graph, r: &IsoRoute) -> bool {
        let entry = match r.skippoints {
            Some(entry) => entry,
            None => return false,
        };
        let mut pos = g.skip(entry).point;
        loop {
            match self.contains(g, g.pos(pos).lat, g.pos(pos).lon, false) {
                Some(false) => return false,
                Some(true) => return true,
                None => {}
            }
            pos = g.pos(pos).next;
            if pos == g.skip(entry).point {
                break;
            }
        }

        warn!("contains route inconclusive for every vertex");
        true /* probably good to say it is contained in this unlikely case */
    }

    /// Axis-aligned bounds; as a side effect the entry point moves to the
    /// highest-latitude skip node so merging keeps the outer shell outer.
    pub(crate) fn find_bounds(&mut self, g: &Graph) -> [f64; 4] {
        let entry = match self.skippoints {
            Some(entry) => entry,
            None => return [0.0; 4],
        };

        let p = g.pos(g.skip(entry).point);
        let mut bounds = [p.lon, p.lon, p.lat, p.lat];

        let mut maxlat = entry;
        let mut s = g.skip(entry).next;
        while s != entry {
            let p = g.pos(g.skip(s).point);
            bounds[MINLAT] = p.lat.min(bounds[MINLAT]);
            bounds[MAXLAT] = p.lat.max(bounds[MAXLAT]);
            bounds[MINLON] = p.lon.min(bounds[MINLON]);
            bounds[MAXLON] = p.lon.max(bounds[MAXLON]);

            if p.lat == bounds[MAXLAT] {
                maxlat = s;
            }
            s = g.skip(s).next;
        }
        self.skippoints = Some(maxlat);
        bounds
    }

    /// Unlink a position given the last skip node at or before it. When
    /// the position carries a skip node the skip list is rebuilt outright.
    pub(crate) fn remove_position(&mut self, g: &mut Graph, s: SkipId, p: NodeId) {
        if g.skip(s).next == s {
            self.skippoints = None;
            return;
        }

        let prev = g.pos(p).prev;
        let next = g.pos(p).next;
        g.pos_mut(next).prev = prev;
        g.pos_mut(prev).next = next;

        if g.skip(s).point == p {
            if let Some(entry) = self.skippoints {
                let mut points = g.skip(entry).point;
                if p == points {
                    points = g.pos(points).next;
                }
                self.skippoints = Some(g.build_skip_list(points));
            }
        }
    }

    /// Closest vertex to the point, descending into runs only when their
    /// quadrant admits a possible winner; children are consulted too.
    pub(crate) fn closest_position(
        &self,
        g: &Graph,
        lat: f64,
        lon: f64,
    ) -> Option<(NodeId, Distance)> {
        let entry = self.skippoints?;

        let mut mindist = f64::INFINITY;
        let mut minpos = g.skip(entry).point;
        let mut lq: i16 = -1;

        let mut s = entry;
        loop {
            let spt = g.skip(s).point;
            let q1 = quadrant_wrapped(lat, lon, g.pos(spt).lat, g.pos(spt).lon);

            let mut dotest = true;
            if q1 == g.skip(s).quadrant {
                dotest = false;
            } else if lq == g.skip(s).quadrant as i16
                && q1 != (lq as u8 ^ 3)
                && q1 == g.skip(g.skip(s).prev).quadrant
            {
                /* tangent run, nothing in it can win */
                dotest = false;
            }
            lq = q1 as i16;

            if dotest {
                let e = g.skip(g.skip(s).next).point;
                let mut p = spt;
                loop {
                    let dist = simple_distance(lat, lon, g.pos(p).lat, g.pos(p).lon);
                    if dist < mindist {
                        minpos = p;
                        mindist = dist;
                    }
                    p = g.pos(p).next;
                    if p == e {
                        break;
                    }
                }
            }

            s = g.skip(s).next;
            if s == entry {
                break;
            }
        }

        let probe = Coords { lat, lon };
        let mut mindist = Spherical {}.distance_to(&probe, &g.pos(minpos).coords());

        for child in &self.children {
            if let Some((pos, dist)) = child.closest_position(g, lat, lon) {
                if dist < mindist {
                    minpos = pos;
                    mindist = dist;
                }
            }
        }

        Some((minpos, mindist))
    }

    pub(crate) fn skip_count(&self, g: &Graph) -> usize {
        let entry = match self.skippoints {
            Some(entry) => entry,
            None => return 0,
        };
        let mut count = 0;
        let mut s = entry;
        loop {
            count += 1;
            s = g.skip(s).next;
            if s == entry {
                break;
            }
        }
        count
    }

    pub(crate) fn count(&self, g: &Graph) -> usize {
        let entry = match self.skippoints {
            Some(entry) => entry,
            None => return 0,
        };
        let mut count = 0;
        let mut p = g.skip(entry).point;
        loop {
            count += 1;
            p = g.pos(p).next;
            if p == g.skip(entry).point {
                break;
            }
        }
        count
    }

    pub(crate) fn update_statistics(
        &self,
        g: &Graph,
        routes: &mut usize,
        invroutes: &mut usize,
        skippositions: &mut usize,
        positions: &mut usize,
    ) {
        *invroutes += self.children.len();
        *routes += self.children.len() + 1;

        for child in &self.children {
            *skippositions += child.skip_count(g);
            *positions += child.count(g);
        }
        *skippositions += self.skip_count(g);
        *positions += self.count(g);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isochron::graph::tests::ring;

    fn route_over(g: &mut Graph, pts: &[(f64, f64)]) -> IsoRoute {
        let start = ring(g, pts);
        let entry = g.build_skip_list(start);
        IsoRoute::new(entry, 1)
    }

    fn diamond(g: &mut Graph, clat: f64, clon: f64, r: f64) -> IsoRoute {
        route_over(
            g,
            &[
                (clat + r, clon),
                (clat, clon + r),
                (clat - r, clon),
                (clat, clon - r),
            ],
        )
    }

    #[test]
    fn ray_parity_for_convex_region() {
        let mut g = Graph::new();
        let route = diamond(&mut g, 0.0, 0.0, 2.0);

        assert_eq!(route.contains(&g, 0.1, 0.1, false), Some(true));
        assert_eq!(route.contains(&g, 3.0, 0.1, false), Some(false));
        assert_eq!(route.contains(&g, -3.0, 0.1, false), Some(false));
        assert_eq!(route.contains(&g, 0.1, 3.0, false), Some(false));
    }

    #[test]
    fn count_matches_parity_after_reversal() {
        let mut g = Graph::new();
        let route = diamond(&mut g, 0.0, 0.0, 2.0);

        /* reverse the polygon in place */
        let entry = route.skippoints.unwrap();
        let start = g.skip(entry).point;
        let mut p = start;
        loop {
            let next = g.pos(p).next;
            let prev = g.pos(p).prev;
            g.pos_mut(p).next = prev;
            g.pos_mut(p).prev = next;
            p = next;
            if p == start {
                break;
            }
        }
        let entry = g.build_skip_list(start);
        let reversed = IsoRoute::new(entry, 1);

        assert_eq!(reversed.contains(&g, 0.1, 0.1, false), Some(true));
        assert_eq!(reversed.contains(&g, 3.0, 0.1, false), Some(false));
    }

    #[test]
    fn hole_flips_parity() {
        let mut g = Graph::new();
        let mut outer = diamond(&mut g, 0.0, 0.0, 5.0);
        let mut hole = diamond(&mut g, 0.0, 0.0, 1.0);
        hole.direction = -1;
        outer.children.push(hole);

        assert_eq!(outer.contains(&g, 0.1, 0.05, false), Some(true));
        assert_eq!(outer.contains(&g, 0.1, 0.05, true), Some(false));
        assert_eq!(outer.contains(&g, 3.0, 0.05, true), Some(true));
    }

    #[test]
    fn vertex_on_ray_is_inconclusive() {
        let mut g = Graph::new();
        let route = diamond(&mut g, 0.0, 0.0, 2.0);
        /* the top vertex sits exactly on the ray from the origin */
        assert_eq!(route.intersection_count(&g, 0.0, 0.0), None);
    }

    #[test]
    fn closest_vertex() {
        let mut g = Graph::new();
        let route = diamond(&mut g, 0.0, 0.0, 2.0);
        let (pos, _) = route.closest_position(&g, 2.5, 0.1).unwrap();
        assert_eq!(g.pos(pos).lat, 2.0);
        assert_eq!(g.pos(pos).lon, 0.0);
    }

    #[test]
    fn closest_may_come_from_a_child() {
        let mut g = Graph::new();
        let mut outer = diamond(&mut g, 0.0, 0.0, 10.0);
        let mut hole = diamond(&mut g, 0.0, 0.0, 1.0);
        hole.direction = -1;
        outer.children.push(hole);

        let (pos, _) = outer.closest_position(&g, 0.2, 0.0).unwrap();
        assert_eq!(g.pos(pos).lat, 1.0);
    }

    #[test]
    fn bounds_and_outer_entry() {
        let mut g = Graph::new();
        let mut route = diamond(&mut g, 10.0, 20.0, 2.0);
        let bounds = route.find_bounds(&g);
        assert_eq!(bounds, [18.0, 22.0, 8.0, 12.0]);
        let entry = route.skippoints.unwrap();
        assert_eq!(g.pos(g.skip(entry).point).lat, 12.0);
    }

    #[test]
    fn copy_preserves_shape_and_flags() {
        let mut g = Graph::new();
        let route = diamond(&mut g, 0.0, 0.0, 2.0);
        let mut dst = Graph::new();
        let copied = route.copy(&g, &mut dst, None);

        assert_eq!(copied.count(&dst), 4);
        assert_eq!(copied.skip_count(&dst), 4);
        let entry = copied.skippoints.unwrap();
        assert!(dst.pos(dst.skip(entry).point).copied);
        assert!(dst.check_skip_list(entry));
        assert_eq!(copied.contains(&dst, 0.1, 0.1, false), Some(true));

        let marked = route.copy(&g, &mut dst, Some(true));
        let entry = marked.skippoints.unwrap();
        assert!(dst.pos(dst.skip(entry).point).propagated);
    }

    #[test]
    fn remove_plain_position() {
        let mut g = Graph::new();
        let mut route = route_over(
            &mut g,
            &[(2.0, 0.0), (1.0, 1.0), (0.0, 2.0), (-2.0, 0.0), (0.0, -2.0)],
        );
        /* (1,1) is mid-run between (2,0) and (0,2) */
        let entry = route.skippoints.unwrap();
        let mut s = entry;
        let victim = loop {
            let within = g.pos(g.skip(s).point).next;
            if g.pos(within).lat == 1.0 && g.pos(within).lon == 1.0 {
                break (s, within);
            }
            s = g.skip(s).next;
            if s == entry {
                panic!("victim not found mid-run");
            }
        };

        route.remove_position(&mut g, victim.0, victim.1);
        assert_eq!(route.count(&g), 4);
        assert_eq!(route.contains(&g, 0.0, 0.1, false), Some(true));
    }

    #[test]
    fn statistics_include_children() {
        let mut g = Graph::new();
        let mut outer = diamond(&mut g, 0.0, 0.0, 5.0);
        let mut hole = diamond(&mut g, 0.0, 0.0, 1.0);
        hole.direction = -1;
        outer.children.push(hole);

        let (mut routes, mut invroutes, mut skips, mut positions) = (0, 0, 0, 0);
        outer.update_statistics(&g, &mut routes, &mut invroutes, &mut skips, &mut positions);
        assert_eq!((routes, invroutes, skips, positions), (2, 1, 8, 8));
    }
}
