//! Builders for commonly used circuit topologies.

use crate::topology::Topology;

/// Make a linear chain of `size` sites, optionally closed into a ring.
///
/// # Panics
/// Panics if `size` is less than 2.
pub fn make_chain(size: usize, periodic: bool) -> Topology {
    let mut topology = Topology::new(size);
    for i in 0..size - 1 {
        topology.add_link(i, i + 1).expect("chain links are valid");
    }
    if periodic {
        topology.add_link(size - 1, 0).expect("closing link is valid");
    }
    topology
}

/// Make a complete graph over `size` sites.
pub fn make_all_to_all(size: usize) -> Topology {
    let mut topology = Topology::new(size);
    for i in 0..size {
        for j in i + 1..size {
            topology.add_link(i, j).expect("complete-graph links are valid");
        }
    }
    topology
}

/// Make the 53-qubit IBM Q Rochester layout.
pub fn make_ibmq_topology() -> Topology {
    let links: [(usize, usize); 58] = [
        (0, 1), (1, 2), (2, 3), (3, 4),
        (0, 5), (4, 6), (5, 7), (6, 11),
        (7, 8), (8, 9), (9, 10), (10, 11),
        (7, 12), (11, 13), (12, 14), (13, 15), (14, 16), (15, 18),
        (9, 17),
        (16, 19), (18, 20), (19, 21), (20, 22), (21, 23), (22, 27),
        (17, 25),
        (23, 24), (24, 25), (25, 26), (26, 27),
        (23, 28), (27, 29), (28, 30), (29, 34),
        (30, 31), (31, 32), (32, 33), (33, 34),
        (30, 35), (34, 36), (35, 37), (36, 38), (37, 39), (38, 41),
        (32, 40),
        (39, 42), (41, 43), (42, 44), (43, 45), (44, 46), (45, 50),
        (40, 48),
        (46, 47), (47, 48), (48, 49), (49, 50),
        (46, 51), (50, 52),
    ];
    let mut topology = Topology::new(53);
    for (a, b) in links {
        topology.add_link(a, b).expect("ibmq links are valid");
    }
    topology
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_shapes() {
        let open = make_chain(5, false);
        assert_eq!(open.num_bits(), 5);
        assert_eq!(open.num_links(), 4);
        assert!(open.is_connected());
        assert_eq!(open.neighbors_of(0).len(), 1);
        let ring = make_chain(5, true);
        assert_eq!(ring.num_links(), 5);
        assert!(ring.has_link(4, 0));
        assert_eq!(ring.neighbors_of(0).len(), 2);
    }

    #[test]
    fn all_to_all_shape() {
        let top = make_all_to_all(6);
        assert_eq!(top.num_links(), 15);
        assert!(top.is_connected());
        for i in 0..6 { assert_eq!(top.neighbors_of(i).len(), 5); }
    }

    #[test]
    fn ibmq_shape() {
        let top = make_ibmq_topology();
        assert_eq!(top.num_bits(), 53);
        assert_eq!(top.num_links(), 58);
        assert!(top.is_connected());
        assert!(top.has_link(6, 11));
        assert!(top.has_link(10, 11));
        assert!(!top.has_link(0, 2));
    }
}
