//! Undirected multigraphs of qubit sites and the bonds between them.
//!
//! A [`Topology`] fixes the connectivity a circuit's tensor network is laid
//! out over: sites are numbered `0..num_bits` and every link between two
//! sites is assigned a dense identifier in creation order. Each link shows
//! up once in the adjacency list of both of its endpoints, as a [`Neighbor`]
//! carrying the same link id.
//!
//! Besides adjacency lookups, the module provides the breadth-first
//! primitives cursor motion rests on: [`Topology::route`] plans the shortest
//! walk moving a two-site cursor from one edge onto another, and
//! [`Topology::is_connected`] gates wavefunction construction.

use std::collections::VecDeque;
use std::fmt::Write;
use rustc_hash::FxHashMap as HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TopologyError {
    /// Returned when a site identifier is at or beyond the number of sites.
    #[error("site index {site} out of bounds for {num_bits} sites")]
    SiteOutOfBounds { site: usize, num_bits: usize },

    /// Returned when attempting to link a site to itself.
    #[error("cannot link site {site} to itself")]
    SelfLink { site: usize },

    /// Returned when attempting to create a second link between two sites.
    #[error("link between sites {a} and {b} already exists")]
    DuplicateLink { a: usize, b: usize },

    /// Returned when two sites are expected to share a link but do not.
    #[error("no link between sites {a} and {b}")]
    NoSuchLink { a: usize, b: usize },

    /// Returned when no walk connects an origin edge to a destination edge.
    #[error("no route from edge ({}, {}) to edge ({}, {})", .from.0, .from.1, .to.0, .to.1)]
    Unreachable { from: (usize, usize), to: (usize, usize) },
}
use TopologyError::*;
pub type TopologyResult<T> = Result<T, TopologyError>;

/// One endpoint's view of an undirected link.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Neighbor {
    /// Site on the far end of the link.
    pub site: usize,
    /// Link (bond) identifier.
    pub link: usize,
}

/// An undirected graph of qubit sites with dense link identifiers.
///
/// The number of sites is fixed at construction; links are only ever added,
/// via [`Self::add_link`]. Self-loops and parallel links are rejected, so a
/// pair of sites identifies at most one link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topology {
    num_bits: usize,
    neighbors: Vec<Vec<Neighbor>>,
    links: Vec<(usize, usize)>,
    link_table: HashMap<(usize, usize), usize>,
}

impl Topology {
    /// Create a new topology over `num_bits` sites and no links.
    pub fn new(num_bits: usize) -> Self {
        Self {
            num_bits,
            neighbors: vec![Vec::new(); num_bits],
            links: Vec::new(),
            link_table: HashMap::default(),
        }
    }

    /// Return the number of sites.
    pub fn num_bits(&self) -> usize { self.num_bits }

    /// Return the number of links.
    pub fn num_links(&self) -> usize { self.links.len() }

    fn check_site(&self, site: usize) -> TopologyResult<()> {
        if site >= self.num_bits {
            Err(SiteOutOfBounds { site, num_bits: self.num_bits })
        } else {
            Ok(())
        }
    }

    fn table_key(a: usize, b: usize) -> (usize, usize) {
        (a.min(b), a.max(b))
    }

    /// Add a link between sites `a` and `b`, returning its identifier.
    ///
    /// Fails if either site is out of bounds, `a == b`, or the link already
    /// exists.
    pub fn add_link(&mut self, a: usize, b: usize) -> TopologyResult<usize> {
        self.check_site(a)?;
        self.check_site(b)?;
        if a == b { return Err(SelfLink { site: a }); }
        if self.has_link(a, b) { return Err(DuplicateLink { a, b }); }
        let link = self.links.len();
        self.neighbors[a].push(Neighbor { site: b, link });
        self.neighbors[b].push(Neighbor { site: a, link });
        self.links.push((a, b));
        self.link_table.insert(Self::table_key(a, b), link);
        Ok(link)
    }

    /// Return `true` if sites `a` and `b` share a link.
    pub fn has_link(&self, a: usize, b: usize) -> bool {
        self.link_table.contains_key(&Self::table_key(a, b))
    }

    /// Return the identifier of the link between sites `a` and `b`.
    ///
    /// Fails if no such link exists.
    pub fn link_id(&self, a: usize, b: usize) -> TopologyResult<usize> {
        self.link_table.get(&Self::table_key(a, b)).copied()
            .ok_or(NoSuchLink { a, b })
    }

    /// Return the two endpoints of a link, in creation order.
    ///
    /// # Panics
    /// Panics if `link` is not a valid link identifier.
    pub fn link_ends(&self, link: usize) -> (usize, usize) {
        self.links[link]
    }

    /// Return the adjacency list of a site.
    ///
    /// # Panics
    /// Panics if `site` is out of bounds.
    pub fn neighbors_of(&self, site: usize) -> &[Neighbor] {
        &self.neighbors[site]
    }

    /// Plan a walk moving a two-site cursor from the `origin` edge onto the
    /// `dest` edge.
    ///
    /// The search is a breadth-first expansion seeded with *both* endpoints
    /// of `origin` at once, each marked as reached from itself, and stops as
    /// soon as a frontier site coincides with either endpoint of `dest`.
    /// Ties between the two seeds resolve to whichever entered the queue
    /// first, so the result is deterministic.
    ///
    /// The returned sequence lists the sites to shift the cursor onto, one
    /// edge per hop: the intermediate hops, then the reached endpoint of
    /// `dest`, then the remaining endpoint. Origin endpoints are never
    /// included. If `origin` already covers `dest`, the sequence is empty.
    ///
    /// Fails if either pair is not an edge of the graph, or `dest` cannot be
    /// reached from `origin`.
    pub fn route(&self, origin: (usize, usize), dest: (usize, usize))
        -> TopologyResult<Vec<usize>>
    {
        self.link_id(origin.0, origin.1)?;
        self.link_id(dest.0, dest.1)?;
        if Self::table_key(origin.0, origin.1)
            == Self::table_key(dest.0, dest.1)
        {
            return Ok(Vec::new());
        }
        let other_end = |reached: usize| {
            if reached == dest.0 { dest.1 } else { dest.0 }
        };
        // seed-level coincidence: only the final hop remains
        for seed in [origin.0, origin.1] {
            if seed == dest.0 || seed == dest.1 {
                return Ok(vec![other_end(seed)]);
            }
        }
        let mut prev: Vec<Option<usize>> = vec![None; self.num_bits];
        prev[origin.0] = Some(origin.0);
        prev[origin.1] = Some(origin.1);
        let mut queue: VecDeque<usize> = VecDeque::new();
        queue.push_back(origin.0);
        queue.push_back(origin.1);
        while let Some(site) = queue.pop_front() {
            for nb in &self.neighbors[site] {
                if prev[nb.site].is_some() { continue; }
                prev[nb.site] = Some(site);
                if nb.site == dest.0 || nb.site == dest.1 {
                    let mut path = vec![nb.site];
                    let mut cur = site;
                    while cur != origin.0 && cur != origin.1 {
                        path.push(cur);
                        cur = prev[cur].unwrap();
                    }
                    path.reverse();
                    path.push(other_end(nb.site));
                    log::trace!(
                        "route ({}, {}) -> ({}, {}): {:?}",
                        origin.0, origin.1, dest.0, dest.1, path,
                    );
                    return Ok(path);
                }
                queue.push_back(nb.site);
            }
        }
        Err(Unreachable { from: origin, to: dest })
    }

    /// Return `true` if every site is reachable from site 0.
    ///
    /// Topologies with fewer than two sites are trivially connected.
    pub fn is_connected(&self) -> bool {
        if self.num_bits < 2 { return true; }
        let mut seen: Vec<bool> = vec![false; self.num_bits];
        seen[0] = true;
        let mut count = 1;
        let mut queue: VecDeque<usize> = VecDeque::new();
        queue.push_back(0);
        while let Some(site) = queue.pop_front() {
            for nb in &self.neighbors[site] {
                if !seen[nb.site] {
                    seen[nb.site] = true;
                    count += 1;
                    queue.push_back(nb.site);
                }
            }
        }
        count == self.num_bits
    }

    /// Render the topology as Graphviz DOT text with the default `neato`
    /// layout and `circle` node shape.
    pub fn to_dot(&self) -> String {
        self.to_dot_with("neato", "circle")
    }

    /// Render the topology as Graphviz DOT text.
    ///
    /// Each link is emitted once, in the canonical `u -- v` orientation with
    /// `u > v`.
    pub fn to_dot_with(&self, layout: &str, shape: &str) -> String {
        let mut out = String::new();
        writeln!(out, "graph {{").unwrap();
        writeln!(out, "    graph[layout={}]", layout).unwrap();
        writeln!(out, "    node[shape={}]", shape).unwrap();
        writeln!(out).unwrap();
        for (a, b) in &self.links {
            writeln!(out, "    {} -- {};", a.max(b), a.min(b)).unwrap();
        }
        writeln!(out, "}}").unwrap();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: usize, periodic: bool) -> Topology {
        let mut top = Topology::new(n);
        for i in 0..n - 1 { top.add_link(i, i + 1).unwrap(); }
        if periodic { top.add_link(n - 1, 0).unwrap(); }
        top
    }

    #[test]
    fn link_bookkeeping() {
        let mut top = Topology::new(4);
        let l0 = top.add_link(0, 1).unwrap();
        let l1 = top.add_link(2, 1).unwrap();
        assert_eq!((l0, l1), (0, 1));
        assert_eq!(top.num_links(), 2);
        assert!(top.has_link(1, 0));
        assert_eq!(top.link_id(1, 2).unwrap(), 1);
        assert_eq!(top.link_ends(1), (2, 1));
        assert!(matches!(top.link_id(0, 3), Err(NoSuchLink { .. })));
        assert_eq!(top.neighbors_of(1).len(), 2);
        assert_eq!(top.neighbors_of(1)[0], Neighbor { site: 0, link: 0 });
    }

    #[test]
    fn invalid_links_rejected() {
        let mut top = Topology::new(3);
        assert!(matches!(
            top.add_link(0, 3), Err(SiteOutOfBounds { .. })));
        assert!(matches!(top.add_link(1, 1), Err(SelfLink { .. })));
        top.add_link(0, 1).unwrap();
        assert!(matches!(top.add_link(1, 0), Err(DuplicateLink { .. })));
    }

    #[test]
    fn connected_graph() {
        let mut top = Topology::new(5);
        top.add_link(0, 1).unwrap();
        top.add_link(0, 2).unwrap();
        top.add_link(2, 3).unwrap();
        top.add_link(3, 4).unwrap();
        // 0 -+- 1
        //    +- 2 --- 3 --- 4
        assert!(top.is_connected());
    }

    #[test]
    fn not_connected_graph() {
        let mut top = Topology::new(5);
        top.add_link(0, 1).unwrap();
        top.add_link(0, 2).unwrap();
        top.add_link(3, 4).unwrap();
        // 0 -+- 1
        //    +- 2     3 --- 4
        assert!(!top.is_connected());
    }

    #[test]
    fn route_walks_a_chain() {
        let top = chain(7, false);
        let path = top.route((0, 1), (5, 6)).unwrap();
        assert_eq!(path, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn route_is_empty_when_covered() {
        let top = chain(4, false);
        assert!(top.route((1, 2), (1, 2)).unwrap().is_empty());
        assert!(top.route((2, 1), (1, 2)).unwrap().is_empty());
    }

    #[test]
    fn route_with_shared_endpoint() {
        let top = chain(4, false);
        assert_eq!(top.route((1, 2), (2, 3)).unwrap(), vec![3]);
        assert_eq!(top.route((1, 2), (0, 1)).unwrap(), vec![0]);
    }

    #[test]
    fn route_takes_the_short_way_around_a_loop() {
        let top = chain(8, true);
        // going backwards through the periodic link wins: 2 hops vs 4
        let path = top.route((0, 1), (5, 6)).unwrap();
        assert_eq!(path, vec![7, 6, 5]);
    }

    #[test]
    fn route_rejects_non_edges() {
        let top = chain(4, false);
        assert!(matches!(
            top.route((0, 2), (2, 3)), Err(NoSuchLink { .. })));
        assert!(matches!(
            top.route((0, 1), (0, 2)), Err(NoSuchLink { .. })));
    }

    #[test]
    fn dot_output() {
        let top = chain(3, false);
        let expected = "\
graph {
    graph[layout=neato]
    node[shape=circle]

    1 -- 0;
    2 -- 1;
}
";
        assert_eq!(top.to_dot(), expected);
    }
}
