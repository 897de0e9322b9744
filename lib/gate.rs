//! Definitions of common one- and two-qubit gates, materialized as labelled
//! tensors over a circuit's physical indices.
//!
//! Gates are plain sum types carrying the site(s) they act on plus any
//! rotation angles. [`OneSiteGate::op`] and [`TwoSiteGate::op`] produce the
//! corresponding operator tensor: its free indices are exactly the physical
//! index of each target site together with a primed copy, with the unprimed
//! index addressing the output state and the primed copy the input. An
//! operator in this shape contracts directly against a wavefunction whose
//! physical indices have been primed at the target sites.
//!
//! The controlled family is assembled from projector algebra,
//! `P₀(c)⊗Id(t) + P₁(c)⊗G(t)`, rather than from hand-written 4×4 matrices.

use nalgebra as na;
use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use once_cell::sync::Lazy;
use crate::tensor::{ Index, Tensor };

/// Identity matrix.
pub static IDMAT: Lazy<na::Matrix2<C64>> = Lazy::new(|| {
    na::matrix![
        C64::one(),  C64::zero();
        C64::zero(), C64::one()
    ]
});

/// Pauli X matrix.
pub static XMAT: Lazy<na::Matrix2<C64>> = Lazy::new(|| {
    na::matrix![
        C64::zero(), C64::one();
        C64::one(),  C64::zero()
    ]
});

/// Pauli Y matrix.
pub static YMAT: Lazy<na::Matrix2<C64>> = Lazy::new(|| {
    na::matrix![
        C64::zero(),      -C64::i();
        C64::i(),     C64::zero()
    ]
});

/// Pauli Z matrix.
pub static ZMAT: Lazy<na::Matrix2<C64>> = Lazy::new(|| {
    na::matrix![
        C64::one(),   C64::zero();
        C64::zero(), -C64::one()
    ]
});

/// Hadamard matrix, with the convention `H|1⟩ = (|0⟩ − |1⟩)/√2`.
pub static HMAT: Lazy<na::Matrix2<C64>> = Lazy::new(|| {
    let h = C64::from(std::f64::consts::FRAC_1_SQRT_2);
    na::matrix![
        h,  h;
        h, -h
    ]
});

/// Projector onto `|0⟩`, i.e. `|0⟩⟨0|`.
pub static PROJ0MAT: Lazy<na::Matrix2<C64>> = Lazy::new(|| {
    na::matrix![
        C64::one(),  C64::zero();
        C64::zero(), C64::zero()
    ]
});

/// Projector onto `|1⟩`, i.e. `|1⟩⟨1|`.
pub static PROJ1MAT: Lazy<na::Matrix2<C64>> = Lazy::new(|| {
    na::matrix![
        C64::zero(), C64::zero();
        C64::zero(), C64::one()
    ]
});

/// Map from `|0⟩` to `|1⟩`, i.e. `|1⟩⟨0|`.
pub static PROJ0TO1MAT: Lazy<na::Matrix2<C64>> = Lazy::new(|| {
    na::matrix![
        C64::zero(), C64::zero();
        C64::one(),  C64::zero()
    ]
});

/// Map from `|1⟩` to `|0⟩`, i.e. `|0⟩⟨1|`.
pub static PROJ1TO0MAT: Lazy<na::Matrix2<C64>> = Lazy::new(|| {
    na::matrix![
        C64::zero(), C64::one();
        C64::zero(), C64::zero()
    ]
});

/// Make a phase gate matrix, `diag(1, e^{iθ})`.
pub fn make_p(theta: f64) -> na::Matrix2<C64> {
    na::matrix![
        C64::one(),  C64::zero();
        C64::zero(), C64::cis(theta)
    ]
}

/// Make the SU(2) element with Euler angles `(θ, φ, λ)`.
///
/// The matrix is
/// `[[α, β], [−β̄, ᾱ]]` with `α = e^{−i(φ+λ)/2} cos(θ/2)` and
/// `β = −e^{−i(φ−λ)/2} sin(θ/2)`.
pub fn make_u3(theta: f64, phi: f64, lambda: f64) -> na::Matrix2<C64> {
    let alpha = C64::cis(-(phi + lambda) / 2.0) * (theta / 2.0).cos();
    let beta = -C64::cis(-(phi - lambda) / 2.0) * (theta / 2.0).sin();
    na::matrix![
        alpha,        beta;
        -beta.conj(), alpha.conj()
    ]
}

// operator tensor with elements ⟨out|G|in⟩ at (s = out, s' = in)
fn one_site_op(s: &Index, mat: &na::Matrix2<C64>) -> Tensor<C64> {
    let sp = s.prime();
    let mut ret = Tensor::zeros([s.clone(), sp.clone()]).unwrap();
    for out in 0..2 {
        for inn in 0..2 {
            ret.set(&[(s.clone(), out), (sp.clone(), inn)], mat[(out, inn)])
                .unwrap();
        }
    }
    ret
}

/// A gate acting on a single site.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum OneSiteGate {
    /// Identity.
    Id(usize),
    /// Pauli X.
    X(usize),
    /// Pauli Y.
    Y(usize),
    /// Pauli Z.
    Z(usize),
    /// Hadamard.
    H(usize),
    /// Phase gate `diag(1, e^{iθ})`.
    P(usize, f64),
    /// General SU(2) rotation with Euler angles `(θ, φ, λ)`.
    U3(usize, f64, f64, f64),
    /// Projection onto `|0⟩`.
    Proj0(usize),
    /// Projection onto `|1⟩`.
    Proj1(usize),
    /// Map from `|0⟩` to `|1⟩`.
    Proj0To1(usize),
    /// Map from `|1⟩` to `|0⟩`.
    Proj1To0(usize),
}

impl OneSiteGate {
    /// Return the site the gate acts on.
    pub fn site(&self) -> usize {
        match *self {
            Self::Id(k) => k,
            Self::X(k) => k,
            Self::Y(k) => k,
            Self::Z(k) => k,
            Self::H(k) => k,
            Self::P(k, _) => k,
            Self::U3(k, ..) => k,
            Self::Proj0(k) => k,
            Self::Proj1(k) => k,
            Self::Proj0To1(k) => k,
            Self::Proj1To0(k) => k,
        }
    }

    /// Materialize the operator tensor over the given physical indices.
    ///
    /// # Panics
    /// Panics if the gate's site is out of bounds for `sites`.
    pub fn op(&self, sites: &[Index]) -> Tensor<C64> {
        let s = &sites[self.site()];
        match *self {
            Self::Id(_) => one_site_op(s, &IDMAT),
            Self::X(_) => one_site_op(s, &XMAT),
            Self::Y(_) => one_site_op(s, &YMAT),
            Self::Z(_) => one_site_op(s, &ZMAT),
            Self::H(_) => one_site_op(s, &HMAT),
            Self::P(_, theta) => one_site_op(s, &make_p(theta)),
            Self::U3(_, theta, phi, lambda) =>
                one_site_op(s, &make_u3(theta, phi, lambda)),
            Self::Proj0(_) => one_site_op(s, &PROJ0MAT),
            Self::Proj1(_) => one_site_op(s, &PROJ1MAT),
            Self::Proj0To1(_) => one_site_op(s, &PROJ0TO1MAT),
            Self::Proj1To0(_) => one_site_op(s, &PROJ1TO0MAT),
        }
    }
}

/// A gate acting on two sites.
///
/// For the controlled family, the first site is the control and the second
/// the target.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TwoSiteGate {
    /// Controlled NOT.
    CNot(usize, usize),
    /// Controlled Y.
    CY(usize, usize),
    /// Controlled Z.
    CZ(usize, usize),
    /// Controlled phase gate.
    CP(usize, usize, f64),
    /// Controlled SU(2) rotation.
    CU3(usize, usize, f64, f64, f64),
    /// Exchange of the two sites' basis states.
    Swap(usize, usize),
}

impl TwoSiteGate {
    /// Return the first site the gate acts on (the control, where that
    /// distinction applies).
    pub fn site1(&self) -> usize {
        match *self {
            Self::CNot(k, _) => k,
            Self::CY(k, _) => k,
            Self::CZ(k, _) => k,
            Self::CP(k, ..) => k,
            Self::CU3(k, ..) => k,
            Self::Swap(k, _) => k,
        }
    }

    /// Return the second site the gate acts on.
    pub fn site2(&self) -> usize {
        match *self {
            Self::CNot(_, k) => k,
            Self::CY(_, k) => k,
            Self::CZ(_, k) => k,
            Self::CP(_, k, _) => k,
            Self::CU3(_, k, ..) => k,
            Self::Swap(_, k) => k,
        }
    }

    /// Materialize the operator tensor over the given physical indices.
    ///
    /// # Panics
    /// Panics if either site is out of bounds for `sites`.
    pub fn op(&self, sites: &[Index]) -> Tensor<C64> {
        match *self {
            Self::CNot(c, t) => controlled(sites, c, t, &XMAT),
            Self::CY(c, t) => controlled(sites, c, t, &YMAT),
            Self::CZ(c, t) => controlled(sites, c, t, &ZMAT),
            Self::CP(c, t, theta) => controlled(sites, c, t, &make_p(theta)),
            Self::CU3(c, t, theta, phi, lambda) =>
                controlled(sites, c, t, &make_u3(theta, phi, lambda)),
            Self::Swap(a, b) => swap_op(sites, a, b),
        }
    }
}

// P₀(c)⊗Id(t) + P₁(c)⊗G(t)
fn controlled(sites: &[Index], c: usize, t: usize, g: &na::Matrix2<C64>)
    -> Tensor<C64>
{
    let lhs = one_site_op(&sites[c], &PROJ0MAT) * one_site_op(&sites[t], &IDMAT);
    let rhs = one_site_op(&sites[c], &PROJ1MAT) * one_site_op(&sites[t], g);
    lhs + rhs
}

fn swap_op(sites: &[Index], a: usize, b: usize) -> Tensor<C64> {
    let sa = sites[a].clone();
    let sb = sites[b].clone();
    let sap = sa.prime();
    let sbp = sb.prime();
    let mut ret =
        Tensor::zeros([sa.clone(), sb.clone(), sap.clone(), sbp.clone()])
        .unwrap();
    for va in 0..2 {
        for vb in 0..2 {
            ret.set(
                &[
                    (sa.clone(), vb),
                    (sb.clone(), va),
                    (sap.clone(), va),
                    (sbp.clone(), vb),
                ],
                C64::one(),
            )
            .unwrap();
        }
    }
    ret
}

/// Either kind of gate.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Gate {
    /// A one-site gate.
    One(OneSiteGate),
    /// A two-site gate.
    Two(TwoSiteGate),
}

impl From<OneSiteGate> for Gate {
    fn from(gate: OneSiteGate) -> Self { Self::One(gate) }
}

impl From<TwoSiteGate> for Gate {
    fn from(gate: TwoSiteGate) -> Self { Self::Two(gate) }
}

impl Gate {
    /// Materialize the operator tensor over the given physical indices.
    pub fn op(&self, sites: &[Index]) -> Tensor<C64> {
        match self {
            Self::One(gate) => gate.op(sites),
            Self::Two(gate) => gate.op(sites),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn sites(n: usize) -> Vec<Index> {
        (0..n).map(|_| Index::new(2, "Site")).collect()
    }

    fn entry1(op: &Tensor<C64>, s: &Index, out: usize, inn: usize) -> C64 {
        op.get(&[(s.clone(), out), (s.prime(), inn)]).unwrap()
    }

    fn entry2(
        op: &Tensor<C64>,
        s1: &Index,
        s2: &Index,
        out: (usize, usize),
        inn: (usize, usize),
    ) -> C64 {
        op.get(&[
            (s1.clone(), out.0),
            (s2.clone(), out.1),
            (s1.prime(), inn.0),
            (s2.prime(), inn.1),
        ])
        .unwrap()
    }

    #[test]
    fn hadamard_sign_convention() {
        let ss = sites(1);
        let h = OneSiteGate::H(0).op(&ss);
        let r = std::f64::consts::FRAC_1_SQRT_2;
        assert!((entry1(&h, &ss[0], 0, 0) - C64::from(r)).norm() < EPS);
        assert!((entry1(&h, &ss[0], 0, 1) - C64::from(r)).norm() < EPS);
        assert!((entry1(&h, &ss[0], 1, 0) - C64::from(r)).norm() < EPS);
        assert!((entry1(&h, &ss[0], 1, 1) + C64::from(r)).norm() < EPS);
    }

    #[test]
    fn pauli_entries() {
        let ss = sites(1);
        let x = OneSiteGate::X(0).op(&ss);
        assert!((entry1(&x, &ss[0], 0, 1) - C64::one()).norm() < EPS);
        assert!((entry1(&x, &ss[0], 1, 0) - C64::one()).norm() < EPS);
        assert!(entry1(&x, &ss[0], 0, 0).norm() < EPS);
        let y = OneSiteGate::Y(0).op(&ss);
        assert!((entry1(&y, &ss[0], 0, 1) + C64::i()).norm() < EPS);
        assert!((entry1(&y, &ss[0], 1, 0) - C64::i()).norm() < EPS);
        let z = OneSiteGate::Z(0).op(&ss);
        assert!((entry1(&z, &ss[0], 1, 1) + C64::one()).norm() < EPS);
    }

    #[test]
    fn phase_gate_is_z_at_pi() {
        let ss = sites(1);
        let p = OneSiteGate::P(0, std::f64::consts::PI).op(&ss);
        let z = OneSiteGate::Z(0).op(&ss);
        for out in 0..2 {
            for inn in 0..2 {
                let diff =
                    entry1(&p, &ss[0], out, inn)
                    - entry1(&z, &ss[0], out, inn);
                assert!(diff.norm() < EPS);
            }
        }
    }

    #[test]
    fn u3_is_unitary() {
        let u = make_u3(0.7, 1.1, -0.4);
        let prod = u.adjoint() * u;
        assert!((prod[(0, 0)] - C64::one()).norm() < EPS);
        assert!((prod[(1, 1)] - C64::one()).norm() < EPS);
        assert!(prod[(0, 1)].norm() < EPS);
        assert!(prod[(1, 0)].norm() < EPS);
        let id = make_u3(0.0, 0.0, 0.0);
        assert!((id[(0, 0)] - C64::one()).norm() < EPS);
        assert!((id[(1, 1)] - C64::one()).norm() < EPS);
    }

    #[test]
    fn cnot_flips_on_control() {
        let ss = sites(2);
        let cx = TwoSiteGate::CNot(0, 1).op(&ss);
        assert_eq!(cx.rank(), 4);
        // |00⟩ -> |00⟩, |10⟩ -> |11⟩
        let one = C64::one();
        assert!((entry2(&cx, &ss[0], &ss[1], (0, 0), (0, 0)) - one).norm() < EPS);
        assert!((entry2(&cx, &ss[0], &ss[1], (1, 1), (1, 0)) - one).norm() < EPS);
        assert!((entry2(&cx, &ss[0], &ss[1], (1, 0), (1, 1)) - one).norm() < EPS);
        assert!(entry2(&cx, &ss[0], &ss[1], (1, 0), (1, 0)).norm() < EPS);
    }

    #[test]
    fn cz_phases_on_both() {
        let ss = sites(2);
        let cz = TwoSiteGate::CZ(0, 1).op(&ss);
        let one = C64::one();
        assert!((entry2(&cz, &ss[0], &ss[1], (0, 1), (0, 1)) - one).norm() < EPS);
        assert!((entry2(&cz, &ss[0], &ss[1], (1, 1), (1, 1)) + one).norm() < EPS);
    }

    #[test]
    fn swap_exchanges_states() {
        let ss = sites(2);
        let sw = TwoSiteGate::Swap(0, 1).op(&ss);
        let one = C64::one();
        assert!((entry2(&sw, &ss[0], &ss[1], (1, 0), (0, 1)) - one).norm() < EPS);
        assert!((entry2(&sw, &ss[0], &ss[1], (0, 1), (1, 0)) - one).norm() < EPS);
        assert!((entry2(&sw, &ss[0], &ss[1], (0, 0), (0, 0)) - one).norm() < EPS);
        assert!(entry2(&sw, &ss[0], &ss[1], (0, 1), (0, 1)).norm() < EPS);
    }

    #[test]
    fn projectors_are_complementary() {
        let ss = sites(1);
        let p0 = OneSiteGate::Proj0(0).op(&ss);
        let p1 = OneSiteGate::Proj1(0).op(&ss);
        let id = OneSiteGate::Id(0).op(&ss);
        let sum = p0 + p1;
        for out in 0..2 {
            for inn in 0..2 {
                let diff =
                    entry1(&sum, &ss[0], out, inn)
                    - entry1(&id, &ss[0], out, inn);
                assert!(diff.norm() < EPS);
            }
        }
    }
}
