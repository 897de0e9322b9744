//! Quantum-circuit wavefunctions factored as tensor networks over an
//! arbitrary connectivity graph.
//!
//! A [`QCircuit`] keeps one site tensor per qubit and one vector of singular
//! values per link of its [`Topology`], in a canonical form centered on a
//! movable two-site *cursor*. The contraction of the site tensor pair under
//! the cursor, the singular values of the cursor link, and the singular
//! values of every other link touching either cursor site forms the center
//! tensor `Psi`; gates are applied by contracting their operator tensors
//! into `Psi` after the cursor has been walked onto the target edge.
//!
//! Walking the cursor across an edge is a truncating singular value
//! decomposition of `Psi`: the factor on the trailing side becomes that
//! site's tensor again, the spectrum becomes the link's new singular values,
//! and the center is rebuilt one edge over. Because `Psi` absorbs the
//! singular values of every link on its boundary, each factor has those
//! weights divided back out before it is stored ("absorb, then peel"),
//! which keeps every non-center site tensor isometric toward the cursor.
//! Keeping all singular values explicit in this way is what lets inner
//! products and measurement probabilities be computed by a single sweep
//! over the network (see [`overlap`]).
//!
//! ```no_run
//! use circuit_net::{
//!     circuits::make_chain,
//!     gate::{ OneSiteGate, TwoSiteGate },
//!     qcircuit::QCircuit,
//! };
//!
//! let mut circuit = QCircuit::new(make_chain(4, false), &[]).unwrap();
//! circuit.set_cutoff(1e-8);
//! circuit.apply(OneSiteGate::H(0), OneSiteGate::Id(1)).unwrap();
//! circuit.apply_two(TwoSiteGate::CNot(0, 1)).unwrap();
//! let outcome = circuit.observe_qubit(0).unwrap();
//! // qubit 1 is now perfectly correlated with `outcome`
//! assert_eq!(circuit.observe_qubit(1).unwrap(), outcome);
//! ```

use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use rand::{ rngs::StdRng, Rng, SeedableRng };
use thiserror::Error;
use crate::{
    gate::{ Gate, OneSiteGate, TwoSiteGate },
    tensor::{ common_index, Index, Svd, SvdArgs, Tensor },
    topology::{ Topology, TopologyError },
};

#[derive(Debug, Error)]
pub enum CircuitError {
    /// Returned when attempting to create a circuit over fewer than two
    /// sites.
    #[error("error in circuit creation: at least two sites are required")]
    TooFewSites,

    /// Returned when attempting to create a circuit over a disconnected
    /// topology.
    #[error("error in circuit creation: topology is not connected")]
    DisconnectedTopology,

    /// Returned when the number of initial amplitude pairs does not match
    /// the number of sites.
    #[error("error in circuit creation: {got} initial amplitude pairs for {expected} sites")]
    WrongAmplitudeCount { got: usize, expected: usize },

    /// Returned when the number of externally supplied physical indices
    /// does not match the number of sites, or one of them does not have
    /// dimension 2.
    #[error("error in circuit creation: site indices must number one per site, each with dimension 2")]
    BadSiteIndices,

    /// Returned when a cursor shift names a destination that is not a
    /// neighbor of the endpoint being moved across.
    #[error("cursor at ({}, {}) cannot shift onto site {dest}", .cursor.0, .cursor.1)]
    InvalidShift { cursor: (usize, usize), dest: usize },

    /// A topology-level error (bad site index, missing link, unreachable
    /// destination).
    #[error(transparent)]
    Topology(#[from] TopologyError),
}
use CircuitError::*;
pub type CircuitResult<T> = Result<T, CircuitError>;

/// Singular values below this threshold are treated as zero when a
/// peripheral bond is divided back out of an SVD factor.
const SVAL_EPSILON: f64 = 1e-16;

/// Probabilities below this threshold count as zero for branch selection in
/// [`QCircuit::reset_qubit`].
const PROB_FLOOR: f64 = 1e-12;

/// How to interpret the destination of a single cursor shift.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShiftDirection {
    /// Infer the direction from adjacency, preferring the first cursor
    /// endpoint.
    Auto,
    /// The destination neighbors the first cursor endpoint; the new cursor
    /// is `(dest, c1)`.
    FirstAsHead,
    /// The destination neighbors the second cursor endpoint; the new cursor
    /// is `(c2, dest)`.
    SecondAsHead,
}

// per-link bookkeeping: each link carries two matching index copies, one
// attached to the site tensor at either endpoint, with the singular values
// sitting between them
#[derive(Clone, Debug)]
struct Bond {
    ends: (usize, usize),
    // attached to the site tensor of `ends.0`
    first: Index,
    // attached to the site tensor of `ends.1`
    second: Index,
    // kept normalized and descending after every decomposition
    svals: Vec<f64>,
}

impl Bond {
    fn new(ends: (usize, usize)) -> Self {
        Self {
            ends,
            first: Index::new(1, "Link"),
            second: Index::new(1, "Link"),
            svals: vec![1.0],
        }
    }

    fn copy_at(&self, site: usize) -> &Index {
        if site == self.ends.0 { &self.first } else { &self.second }
    }

    // the singular-value tensor of this link
    fn tensor(&self) -> Tensor<C64> {
        let vals: Vec<C64> =
            self.svals.iter().map(|s| C64::from(*s)).collect();
        Tensor::diag(self.first.clone(), self.second.clone(), &vals)
            .expect("bond index copies are distinct")
    }

    // diag(1/σ) mapping the far-side copy back onto the bare copy at
    // `near`; entries with σ below threshold are dropped to zero
    fn inverse_tensor(&self, near: usize) -> Tensor<C64> {
        let far = if near == self.ends.0 { self.ends.1 } else { self.ends.0 };
        let vals: Vec<C64> =
            self.svals.iter()
            .map(|s| {
                if *s >= SVAL_EPSILON {
                    C64::from(1.0 / s)
                } else {
                    C64::zero()
                }
            })
            .collect();
        Tensor::diag(
            self.copy_at(far).clone(),
            self.copy_at(near).clone(),
            &vals,
        )
        .expect("bond index copies are distinct")
    }
}

/// A pure-state wavefunction over the qubits of a [`Topology`], stored as a
/// tensor network in cursor-centered canonical form.
///
/// All mutating operations leave the represented state normalized (up to
/// the configured truncation) and the network in canonical form; recoverable
/// errors are reported before anything is modified.
#[derive(Clone, Debug)]
pub struct QCircuit {
    topology: Topology,
    // physical indices, dimension 2
    s: Vec<Index>,
    // site tensors; the tensor at site `i` carries `s[i]` plus this site's
    // copy of every incident link
    m: Vec<Tensor<C64>>,
    bonds: Vec<Bond>,
    // the contracted center tensor living on the cursor edge
    psi: Tensor<C64>,
    cursor: (usize, usize),
    rng: StdRng,
    args: SvdArgs,
}

impl QCircuit {
    /// Create a new circuit over `topology` with every qubit initialized to
    /// the product state `α|0⟩ + β|1⟩` given per site by `init`.
    ///
    /// An empty `init` slice means all qubits start in `|0⟩`. The
    /// measurement engine is seeded from system entropy; see
    /// [`Self::with_seed`] for reproducible sampling.
    ///
    /// Fails if the topology has fewer than two sites or is not connected,
    /// or `init` is non-empty with the wrong length.
    pub fn new(topology: Topology, init: &[(C64, C64)]) -> CircuitResult<Self> {
        Self::build(topology, init, None, StdRng::from_entropy())
    }

    /// Like [`Self::new`], but with the measurement engine seeded from
    /// `seed` for reproducible sampling.
    pub fn with_seed(topology: Topology, init: &[(C64, C64)], seed: u64)
        -> CircuitResult<Self>
    {
        Self::build(topology, init, None, StdRng::seed_from_u64(seed))
    }

    /// Like [`Self::new`], but carrying externally supplied physical
    /// indices instead of minting fresh ones.
    ///
    /// Sharing physical indices is what makes two "replica" circuits
    /// contractible against each other in [`overlap`].
    ///
    /// Fails additionally if `sites` does not hold exactly one index of
    /// dimension 2 per site.
    pub fn with_site_indices(
        topology: Topology,
        init: &[(C64, C64)],
        sites: Vec<Index>,
    ) -> CircuitResult<Self>
    {
        Self::build(topology, init, Some(sites), StdRng::from_entropy())
    }

    fn build(
        topology: Topology,
        init: &[(C64, C64)],
        sites: Option<Vec<Index>>,
        rng: StdRng,
    ) -> CircuitResult<Self>
    {
        let n = topology.num_bits();
        if n < 2 { return Err(TooFewSites); }
        if !topology.is_connected() { return Err(DisconnectedTopology); }
        let init: Vec<(C64, C64)> =
            if init.is_empty() {
                vec![(C64::one(), C64::zero()); n]
            } else if init.len() == n {
                init.to_vec()
            } else {
                return Err(WrongAmplitudeCount { got: init.len(), expected: n });
            };
        let s: Vec<Index> = match sites {
            Some(sites) => {
                if sites.len() != n || sites.iter().any(|idx| idx.dim() != 2) {
                    return Err(BadSiteIndices);
                }
                sites
            },
            None => (0..n).map(|_| Index::new(2, "Site")).collect(),
        };
        let bonds: Vec<Bond> =
            (0..topology.num_links())
            .map(|l| Bond::new(topology.link_ends(l)))
            .collect();
        let m: Vec<Tensor<C64>> =
            init.iter().enumerate()
            .map(|(i, (alpha, beta))| {
                let indices: Vec<Index> =
                    [s[i].clone()].into_iter()
                    .chain(
                        topology.neighbors_of(i).iter()
                            .map(|nb| bonds[nb.link].copy_at(i).clone())
                    )
                    .collect();
                let mut t = Tensor::zeros(indices.clone())
                    .expect("site and link indices are distinct");
                let mut coords: Vec<(Index, usize)> =
                    indices.into_iter().map(|idx| (idx, 0)).collect();
                t.set(&coords, *alpha)
                    .expect("coords match the tensor's own indices");
                coords[0].1 = 1;
                t.set(&coords, *beta)
                    .expect("coords match the tensor's own indices");
                t
            })
            .collect();
        let c2 =
            topology.neighbors_of(0).iter()
            .map(|nb| nb.site)
            .min()
            .expect("a connected topology leaves no site isolated");
        let mut new = Self {
            topology,
            s,
            m,
            bonds,
            psi: Tensor::new_scalar(C64::one()),
            cursor: (0, c2),
            rng,
            args: SvdArgs::default(),
        };
        new.psi = new.assemble_center();
        Ok(new)
    }

    /// Return the number of qubits.
    pub fn size(&self) -> usize { self.topology.num_bits() }

    /// Return a reference to the underlying topology.
    pub fn topology(&self) -> &Topology { &self.topology }

    /// Return the current cursor position.
    pub fn cursor(&self) -> (usize, usize) { self.cursor }

    /// Return the physical index of site `i`.
    ///
    /// # Panics
    /// Panics if `i` is out of bounds.
    pub fn site(&self, i: usize) -> &Index { &self.s[i] }

    /// Return all physical indices, in site order.
    pub fn sites(&self) -> &[Index] { &self.s }

    /// Return the site tensor of site `i`.
    ///
    /// # Panics
    /// Panics if `i` is out of bounds.
    pub fn m_ref(&self, i: usize) -> &Tensor<C64> { &self.m[i] }

    /// Return the center tensor.
    pub fn psi_ref(&self) -> &Tensor<C64> { &self.psi }

    /// Return the singular values of a link, normalized and descending.
    ///
    /// # Panics
    /// Panics if `link` is not a valid link identifier.
    pub fn singular_values(&self, link: usize) -> &[f64] {
        &self.bonds[link].svals
    }

    /// Return the truncation settings consumed by every decomposition.
    pub fn svd_args(&self) -> SvdArgs { self.args }

    /// Set the relative singular-value cutoff.
    pub fn set_cutoff(&mut self, cutoff: f64) -> &mut Self {
        self.args.cutoff = cutoff;
        self
    }

    /// Set the bond-dimension cap (`0` is unbounded).
    pub fn set_max_dim(&mut self, max_dim: usize) -> &mut Self {
        self.args.max_dim = max_dim;
        self
    }

    /// Return the operator tensor corresponding to `gate` over this
    /// circuit's physical indices.
    pub fn tensor_op<G>(&self, gate: G) -> Tensor<C64>
    where G: Into<Gate>
    {
        gate.into().op(&self.s)
    }

    // contract the center pattern: both cursor site tensors, the cursor
    // link's singular values, and the singular values of every other link
    // touching a cursor site
    fn assemble_center(&self) -> Tensor<C64> {
        let (c1, c2) = self.cursor;
        let lstar = self.topology.link_id(c1, c2)
            .expect("cursor endpoints share a link");
        let mut psi =
            self.m[c1].clone()
            * self.bonds[lstar].tensor()
            * self.m[c2].clone();
        for site in [c1, c2] {
            for nb in self.topology.neighbors_of(site) {
                if nb.link == lstar { continue; }
                psi = psi * self.bonds[nb.link].tensor();
            }
        }
        psi
    }

    // split the center across the cursor link and write the factors back
    // into the site tensors and the link's singular values; `psi` is left
    // unassembled
    fn decompose_core(&mut self) {
        let (c1, c2) = self.cursor;
        let lstar = self.topology.link_id(c1, c2)
            .expect("cursor endpoints share a link");
        // everything on c1's side of the split: its physical index plus the
        // free (far-side) copy of each of its peripheral links
        let rows: Vec<Index> =
            [self.s[c1].clone()].into_iter()
            .chain(
                self.topology.neighbors_of(c1).iter()
                    .filter(|nb| nb.link != lstar)
                    .map(|nb| self.bonds[nb.link].copy_at(nb.site).clone())
            )
            .collect();
        let psi = std::mem::replace(
            &mut self.psi, Tensor::new_scalar(C64::zero()));
        let Svd { mut u, s: smat, mut v, spectrum } =
            psi.svd(&rows, &self.args)
            .expect("center tensor splits across the cursor link");
        let norm: f64 =
            spectrum.iter().map(|sv| sv * sv).sum::<f64>().sqrt();
        let spectrum: Vec<f64> =
            spectrum.iter().map(|sv| sv / norm).collect();
        log::debug!(
            "decompose at ({}, {}): kept bond dimension {}",
            c1, c2, spectrum.len(),
        );
        // the factors came out in the environment-absorbed basis; divide
        // the peripheral singular values back out to restore the bare link
        // copies at each cursor site
        for nb in self.topology.neighbors_of(c1) {
            if nb.link == lstar { continue; }
            u = u * self.bonds[nb.link].inverse_tensor(c1);
        }
        for nb in self.topology.neighbors_of(c2) {
            if nb.link == lstar { continue; }
            v = v * self.bonds[nb.link].inverse_tensor(c2);
        }
        let ul = common_index(&u, &smat)
            .expect("svd joins u and s with a fresh link");
        let vl = common_index(&smat, &v)
            .expect("svd joins s and v with a fresh link");
        let bond = &mut self.bonds[lstar];
        if bond.ends.0 == c1 {
            bond.first = ul;
            bond.second = vl;
        } else {
            bond.first = vl;
            bond.second = ul;
        }
        bond.svals = spectrum;
        self.m[c1] = u;
        self.m[c2] = v;
    }

    /// Decompose and truncate the wavefunction at the cursor position,
    /// pushing the center tensor's content back into the site tensors and
    /// the cursor link's singular values, then rebuild the center.
    pub fn decompose_psi(&mut self) {
        self.decompose_core();
        self.psi = self.assemble_center();
    }

    /// Shift the cursor by one edge onto `dest`.
    ///
    /// With [`ShiftDirection::Auto`], the direction is inferred from
    /// adjacency, checking the first cursor endpoint before the second.
    /// The explicit directions name which endpoint `dest` extends:
    /// [`FirstAsHead`][ShiftDirection::FirstAsHead] yields the new cursor
    /// `(dest, c1)` and [`SecondAsHead`][ShiftDirection::SecondAsHead]
    /// yields `(c2, dest)`.
    ///
    /// Fails if `dest` is a cursor endpoint, or is not adjacent to the
    /// endpoint the requested direction keeps.
    pub fn shift_cursor_to(&mut self, dest: usize, direction: ShiftDirection)
        -> CircuitResult<()>
    {
        let (c1, c2) = self.cursor;
        if dest == c1 || dest == c2 {
            return Err(InvalidShift { cursor: self.cursor, dest });
        }
        let direction = match direction {
            ShiftDirection::Auto => {
                if self.topology.has_link(dest, c1) {
                    ShiftDirection::FirstAsHead
                } else if self.topology.has_link(dest, c2) {
                    ShiftDirection::SecondAsHead
                } else {
                    return Err(InvalidShift { cursor: self.cursor, dest });
                }
            },
            ShiftDirection::FirstAsHead => {
                if !self.topology.has_link(dest, c1) {
                    return Err(InvalidShift { cursor: self.cursor, dest });
                }
                direction
            },
            ShiftDirection::SecondAsHead => {
                if !self.topology.has_link(dest, c2) {
                    return Err(InvalidShift { cursor: self.cursor, dest });
                }
                direction
            },
        };
        self.decompose_core();
        self.cursor = match direction {
            ShiftDirection::FirstAsHead => (dest, c1),
            ShiftDirection::SecondAsHead => (c2, dest),
            ShiftDirection::Auto => unreachable!(),
        };
        self.psi = self.assemble_center();
        Ok(())
    }

    /// Walk the cursor onto the edge `(d1, d2)`.
    ///
    /// The walk follows the shortest path found by
    /// [`Topology::route`]; if the cursor already covers `{d1, d2}`, nothing
    /// happens.
    ///
    /// Fails if `(d1, d2)` is not an edge of the topology.
    pub fn move_cursor_to(&mut self, d1: usize, d2: usize)
        -> CircuitResult<()>
    {
        self.topology.link_id(d1, d2)?;
        if self.covers(d1, d2) { return Ok(()); }
        let path = self.topology.route(self.cursor, (d1, d2))?;
        log::debug!(
            "move cursor ({}, {}) -> ({}, {}): {} hops",
            self.cursor.0, self.cursor.1, d1, d2, path.len(),
        );
        for site in path {
            self.shift_cursor_to(site, ShiftDirection::Auto)?;
        }
        // the walk may leave one endpoint still to be aligned
        if !self.covers(d1, d2) {
            let (c1, c2) = self.cursor;
            if c1 == d1 || c1 == d2 {
                let other = if c1 == d1 { d2 } else { d1 };
                self.shift_cursor_to(other, ShiftDirection::FirstAsHead)?;
            } else if c2 == d1 || c2 == d2 {
                let other = if c2 == d1 { d2 } else { d1 };
                self.shift_cursor_to(other, ShiftDirection::SecondAsHead)?;
            } else {
                unreachable!("route ends adjacent to its destination edge");
            }
        }
        Ok(())
    }

    /// Shift the cursor through the given sites in order, inferring each
    /// hop's direction from adjacency.
    ///
    /// Fails if any site in the sequence does not neighbor the cursor at
    /// that point of the walk.
    pub fn move_cursor_along(&mut self, path: &[usize]) -> CircuitResult<()> {
        for site in path {
            self.shift_cursor_to(*site, ShiftDirection::Auto)?;
        }
        Ok(())
    }

    fn covers(&self, d1: usize, d2: usize) -> bool {
        let (c1, c2) = self.cursor;
        (c1 == d1 && c2 == d2) || (c1 == d2 && c2 == d1)
    }

    fn contract_at_cursor(&mut self, op: Tensor<C64>) {
        let (c1, c2) = self.cursor;
        let targets = [self.s[c1].clone(), self.s[c2].clone()];
        let psi = std::mem::replace(
            &mut self.psi, Tensor::new_scalar(C64::zero()));
        self.psi = op * psi.primed(targets.iter());
    }

    /// Apply an operator tensor at the current cursor position.
    ///
    /// # Panics
    /// Panics if the operator's indices are not exactly a subset of the
    /// cursor sites' physical indices and their primed copies.
    pub fn apply_at_cursor(&mut self, op: Tensor<C64>) {
        let (c1, c2) = self.cursor;
        let s1 = &self.s[c1];
        let s2 = &self.s[c2];
        assert!(
            op.indices().all(|idx| {
                *idx == *s1 || *idx == *s2
                    || *idx == s1.prime() || *idx == s2.prime()
            }),
            "operator indices must live on the cursor sites",
        );
        self.contract_at_cursor(op);
    }

    /// Apply a pair of one-site gates to two linked sites, walking the
    /// cursor onto their edge first.
    ///
    /// Fails if the two sites do not share a link.
    pub fn apply(&mut self, gate1: OneSiteGate, gate2: OneSiteGate)
        -> CircuitResult<()>
    {
        self.move_cursor_to(gate1.site(), gate2.site())?;
        let op = gate1.op(&self.s) * gate2.op(&self.s);
        self.apply_at_cursor(op);
        Ok(())
    }

    /// Apply a two-site gate, walking the cursor onto its edge first.
    ///
    /// Fails if the gate's sites do not share a link.
    pub fn apply_two(&mut self, gate: TwoSiteGate) -> CircuitResult<()> {
        self.move_cursor_to(gate.site1(), gate.site2())?;
        let op = gate.op(&self.s);
        self.apply_at_cursor(op);
        Ok(())
    }

    /// Apply a single one-site gate, pairing it with an identity on the
    /// site's first neighbor to reuse the two-site mechanism.
    ///
    /// Fails if the gate's site is out of bounds.
    pub fn apply_single(&mut self, gate: OneSiteGate) -> CircuitResult<()> {
        let site = gate.site();
        if site >= self.size() {
            return Err(TopologyError::SiteOutOfBounds {
                site, num_bits: self.size(),
            }
            .into());
        }
        let partner = self.topology.neighbors_of(site)[0].site;
        self.apply(gate, OneSiteGate::Id(partner))
    }

    /// Rescale the center tensor to unit norm.
    pub fn normalize(&mut self) {
        let norm = self.psi.norm();
        self.psi.scale(C64::from(norm.recip()));
    }

    /// Bump the prime level of every index in the network: physical, link,
    /// and everything carried by the tensors.
    pub fn prime_all(&mut self) {
        self.s.iter_mut().for_each(|idx| { *idx = idx.prime(); });
        for bond in self.bonds.iter_mut() {
            bond.first = bond.first.prime();
            bond.second = bond.second.prime();
        }
        for m in self.m.iter_mut() { m.prime_all(); }
        self.psi.prime_all();
    }

    /// Return the probability of measuring site `site` in basis state
    /// `outcome`.
    ///
    /// Fails if `site` is out of bounds.
    ///
    /// # Panics
    /// Panics if `outcome` is not 0 or 1.
    pub fn probability_of(&self, site: usize, outcome: usize)
        -> CircuitResult<f64>
    {
        if site >= self.size() {
            return Err(TopologyError::SiteOutOfBounds {
                site, num_bits: self.size(),
            }
            .into());
        }
        assert!(outcome < 2, "a qubit observation is 0 or 1");
        let proj = if outcome == 0 {
            OneSiteGate::Proj0(site)
        } else {
            OneSiteGate::Proj1(site)
        };
        let op: Vec<Tensor<C64>> =
            (0..self.size())
            .map(|i| {
                if i == site {
                    self.tensor_op(proj)
                } else {
                    self.tensor_op(OneSiteGate::Id(i))
                }
            })
            .collect();
        Ok(overlap(self.clone(), &op, self.clone()).re)
    }

    /// Return the probability of measuring site `site` in `|0⟩`.
    pub fn probability_of_zero(&self, site: usize) -> CircuitResult<f64> {
        self.probability_of(site, 0)
    }

    /// Perform a randomized projective measurement on site `site`,
    /// reporting the observed basis state.
    ///
    /// The wavefunction is projected onto the observed branch and
    /// renormalized.
    ///
    /// Fails if `site` is out of bounds.
    pub fn observe_qubit(&mut self, site: usize) -> CircuitResult<usize> {
        let p0 = self.probability_of_zero(site)?;
        let r: f64 = self.rng.gen();
        let outcome = usize::from(r >= p0);
        log::debug!(
            "observe qubit {}: p0 = {:.6}, outcome {}", site, p0, outcome);
        let partner = self.topology.neighbors_of(site)[0].site;
        let proj = if outcome == 0 {
            OneSiteGate::Proj0(site)
        } else {
            OneSiteGate::Proj1(site)
        };
        self.apply(proj, OneSiteGate::Id(partner))?;
        self.normalize();
        Ok(outcome)
    }

    /// Collapse site `site` to `|0⟩`: project onto the surviving branch
    /// and flip it if that branch was `|1⟩`.
    ///
    /// Fails if `site` is out of bounds.
    pub fn reset_qubit(&mut self, site: usize) -> CircuitResult<()> {
        let p0 = self.probability_of_zero(site)?;
        let partner = self.topology.neighbors_of(site)[0].site;
        if p0 > PROB_FLOOR {
            self.apply(OneSiteGate::Proj0(site), OneSiteGate::Id(partner))?;
        } else {
            self.apply(OneSiteGate::Proj1(site), OneSiteGate::Id(partner))?;
            self.apply(OneSiteGate::X(site), OneSiteGate::Id(partner))?;
        }
        self.normalize();
        Ok(())
    }
}

/// Compute `⟨ψ₁|Ô|ψ₂⟩` for two circuits sharing physical indices and a
/// site-local operator list.
///
/// Both circuits are consumed: the contraction canonicalizes them and primes
/// every index of `circuit2` so the two networks only connect through the
/// operator tensors. Pass clones to keep the originals.
///
/// # Panics
/// Panics if the operator list's length does not match both circuit sizes.
pub fn overlap(
    mut circuit1: QCircuit,
    op: &[Tensor<C64>],
    mut circuit2: QCircuit,
) -> C64 {
    assert_eq!(
        op.len(), circuit1.size(),
        "one operator per site is required",
    );
    assert_eq!(
        op.len(), circuit2.size(),
        "one operator per site is required",
    );
    circuit1.decompose_core();
    circuit2.decompose_core();
    circuit2.prime_all();
    let n = circuit1.size();
    let mut ret = Tensor::new_scalar(C64::one());
    for i in 0..n {
        ret =
            circuit1.m[i].conj()
            * op[i].clone()
            * ret
            * circuit2.m[i].clone();
        // each link joins the sweep at its smaller endpoint
        for nb in circuit1.topology.neighbors_of(i) {
            if nb.site > i {
                ret =
                    circuit1.bonds[nb.link].tensor().conj()
                    * ret
                    * circuit2.bonds[nb.link].tensor();
            }
        }
    }
    ret.into_scalar()
        .expect("the sweep contracts the networks down to a scalar")
}
