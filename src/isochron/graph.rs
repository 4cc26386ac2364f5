//! Vertex arenas for isochron polygons.
//!
//! A polygon is a circular doubly linked list of `Position`s; a secondary
//! circular list of `SkipNode`s indexes maximal runs of edges sharing a
//! quadrant, so queries can leap over long monotone stretches. Links are
//! indices into per-generation arenas: every route produced while building
//! one isochron shares a single `Graph`, which makes the merge machinery's
//! splices O(1) and keeps ownership with the finished isochron. Unlinked
//! slots are simply abandoned; the arena lives only as long as its
//! isochron.

use crate::position::Coords;

/// positions are quantized to suppress degenerate slivers
pub(crate) const EPSILON: f64 = 2e-10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeId(pub(crate) u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SkipId(pub(crate) u32);

/// Non-owning reference to a position of an earlier isochron: the index of
/// the isochron in the engine's ordered list plus the node within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParentRef {
    pub chron: usize,
    pub node: NodeId,
}

#[derive(Clone, Debug)]
pub(crate) struct Position {
    pub(crate) lat: f64,
    pub(crate) lon: f64,
    /// index of the sail plan active when this position was produced
    pub(crate) sailplan: usize,
    /// heading sign changes along the ancestry
    pub(crate) tacks: i32,
    /// steps spent with the apparent wind forward of the beam
    pub(crate) upwind: i32,
    /// generation index
    pub(crate) propagations: i32,
    pub(crate) parent: Option<ParentRef>,
    pub(crate) prev: NodeId,
    pub(crate) next: NodeId,
    /// already used as a starting point, or known interior
    pub(crate) propagated: bool,
    /// clone made for the merge machinery
    pub(crate) copied: bool,
}

impl Position {
    pub(crate) fn coords(&self) -> Coords {
        Coords {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct SkipNode {
    pub(crate) point: NodeId,
    pub(crate) prev: SkipId,
    pub(crate) next: SkipId,
    pub(crate) quadrant: u8,
}

#[derive(Default)]
pub(crate) struct Graph {
    nodes: Vec<Position>,
    skips: Vec<SkipNode>,
}

/* quadrant of the edge p -> q from the signs of (dlat, dlon):
   SW=0 SE=1 NW=2 NE=3 */
pub(crate) fn quadrant_fast(plat: f64, plon: f64, qlat: f64, qlon: f64) -> u8 {
    let mut quadrant = if qlat < plat { 0 } else { 2 };
    if plon < qlon {
        quadrant += 1;
    }
    quadrant
}

/* same, but the longitude difference taken the short way around */
pub(crate) fn quadrant_wrapped(plat: f64, plon: f64, qlat: f64, qlon: f64) -> u8 {
    let mut quadrant = if qlat < plat { 0 } else { 2 };

    let mut diff = plon - qlon;
    while diff < -180.0 {
        diff += 360.0
    }
    while diff >= 180.0 {
        diff -= 360.0
    }

    if diff < 0.0 {
        quadrant += 1;
    }
    quadrant
}

impl Graph {
    pub(crate) fn new() -> Self {
        Default::default()
    }

    pub(crate) fn pos(&self, id: NodeId) -> &Position {
        &self.nodes[id.0 as usize]
    }

    pub(crate) fn pos_mut(&mut self, id: NodeId) -> &mut Position {
        &mut self.nodes[id.0 as usize]
    }

    pub(crate) fn skip(&self, id: SkipId) -> &SkipNode {
        &self.skips[id.0 as usize]
    }

    pub(crate) fn skip_mut(&mut self, id: SkipId) -> &mut SkipNode {
        &mut self.skips[id.0 as usize]
    }

    pub(crate) fn add_position(
        &mut self,
        lat: f64,
        lon: f64,
        parent: Option<ParentRef>,
        sailplan: usize,
        tacks: i32,
        upwind: i32,
        propagations: i32,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Position {
            lat: lat - lat % EPSILON,
            lon: lon - lon % EPSILON,
            sailplan,
            tacks,
            upwind,
            propagations,
            parent,
            prev: id,
            next: id,
            propagated: false,
            copied: false,
        });
        id
    }

    pub(crate) fn copy_position(&mut self, src: &Position) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Position {
            prev: id,
            next: id,
            copied: true,
            ..src.clone()
        });
        id
    }

    pub(crate) fn add_skip(&mut self, point: NodeId, quadrant: u8) -> SkipId {
        let id = SkipId(self.skips.len() as u32);
        self.skips.push(SkipNode {
            point,
            prev: id,
            next: id,
            quadrant,
        });
        id
    }

    /* insert node rp at the tail of the ring entered at head */
    pub(crate) fn ring_insert_before(&mut self, head: NodeId, rp: NodeId) {
        let tail = self.pos(head).prev;
        self.pos_mut(rp).prev = tail;
        self.pos_mut(rp).next = head;
        self.pos_mut(tail).next = rp;
        self.pos_mut(head).prev = rp;
    }

    pub(crate) fn skip_ring_insert_before(&mut self, head: SkipId, rs: SkipId) {
        let tail = self.skip(head).prev;
        self.skip_mut(rs).prev = tail;
        self.skip_mut(rs).next = head;
        self.skip_mut(tail).next = rs;
        self.skip_mut(head).prev = rs;
    }

    /* unlink a skip node from its ring; the slot is abandoned */
    pub(crate) fn remove_skip(&mut self, s: SkipId) {
        let prev = self.skip(s).prev;
        let next = self.skip(s).next;
        self.skip_mut(prev).next = next;
        self.skip_mut(next).prev = prev;
    }

    pub(crate) fn insert_skip_after(&mut self, sp: SkipId, sn: SkipId, p: NodeId, quadrant: u8) {
        let s = self.add_skip(p, quadrant);
        self.skip_mut(s).prev = sp;
        self.skip_mut(sp).next = s;
        self.skip_mut(s).next = sn;
        self.skip_mut(sn).prev = s;
    }

    /// Walk the polygon once, opening a skip node at every quadrant change;
    /// the first and last runs merge across the wrap when they agree.
    pub(crate) fn build_skip_list(&mut self, start: NodeId) -> SkipId {
        let mut skippoints: Option<SkipId> = None;
        let mut p = start;
        let mut firstquadrant = 0u8;
        let mut lastquadrant: i16 = -1;
        let mut quadrant = 0u8;
        loop {
            let q = self.pos(p).next;
            quadrant = quadrant_fast(
                self.pos(p).lat,
                self.pos(p).lon,
                self.pos(q).lat,
                self.pos(q).lon,
            );

            if lastquadrant == -1 {
                firstquadrant = quadrant;
                lastquadrant = quadrant as i16;
            } else if quadrant as i16 != lastquadrant {
                let rs = self.add_skip(p, quadrant);
                match skippoints {
                    Some(sk) => self.skip_ring_insert_before(sk, rs),
                    None => skippoints = Some(rs),
                }
                lastquadrant = quadrant as i16;
            }
            p = q;
            if p == start {
                break;
            }
        }

        match skippoints {
            None => self.add_skip(p, quadrant),
            Some(sk) => {
                if quadrant != firstquadrant {
                    let rs = self.add_skip(p, firstquadrant);
                    self.skip_ring_insert_before(sk, rs);
                    rs
                } else {
                    sk
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn check_skip_list(&self, entry: SkipId) -> bool {
        let mut s = entry;
        loop {
            let next = self.skip(s).next;
            if self.skip(s).quadrant == self.skip(next).quadrant && next != s {
                return false;
            }
            let mut p = self.skip(s).point;
            loop {
                let q = self.pos(p).next;
                let quadrant = quadrant_fast(
                    self.pos(p).lat,
                    self.pos(p).lon,
                    self.pos(q).lat,
                    self.pos(q).lon,
                );
                if quadrant != self.skip(s).quadrant {
                    return false;
                }
                p = q;
                if p == self.skip(next).point {
                    break;
                }
            }
            s = next;
            if s == entry {
                break;
            }
        }
        true
    }
}
