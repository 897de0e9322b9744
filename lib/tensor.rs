//! Tensors carrying named indices, with contraction driven by index matching.
//!
//! A [`Tensor`] is a multi-linear object whose axes are identified by
//! [`Index`] values rather than positions. The usual matrix-matrix,
//! matrix-vector, and vector-vector "dot" products generalize to the tensor
//! contraction over all indices shared by two tensors, where the result is
//! calculated by summing over the values of the shared indices and leaving
//! all others untouched; two tensors with no shared indices multiply into an
//! ordinary tensor product.
//!
//! Indices are distinguished by an opaque identifier and a *prime level*.
//! Priming an index produces a distinct copy that only matches other copies
//! at the same prime level, which is the mechanism used to keep a "bra"
//! network from collapsing onto its "ket" during inner products, and to
//! apply operators carrying `(s, s')` pairs of physical indices.
//!
//! The module also provides a truncating singular value decomposition over
//! an arbitrary bipartition of a tensor's indices ([`Tensor::svd`]), which
//! is the primitive that bond-dimension control in a tensor network state
//! rests on.
//!
//! ```
//! use circuit_net::tensor::{ Index, Tensor };
//! use num_complex::Complex64 as C64;
//!
//! let a = Index::new(3, "a");
//! let b = Index::new(4, "b");
//! let c = Index::new(5, "c");
//!
//! let t = Tensor::<C64>::new([a.clone(), b.clone()], |_| C64::from(1.0)).unwrap();
//! let u = Tensor::<C64>::new([b, c], |_| C64::from(2.0)).unwrap();
//!
//! let tu = t * u; // contracts over b; carries { a, c }
//! assert_eq!(tu.rank(), 2);
//! ```

use std::{ fmt, sync::atomic::{ AtomicU64, Ordering } };
use nalgebra as na;
use na::ComplexField;
use num_traits::Zero;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TensorError {
    /// Returned when attempting to create a new tensor with duplicate
    /// indices.
    #[error("error in tensor creation: duplicate indices")]
    DuplicateIndices,

    /// Returned when attempting to create a new tensor with at least one
    /// index that has zero dimension.
    #[error("error in tensor creation: encountered a zero-dimensional index")]
    ZeroDimIndex,

    /// Returned when attempting to create a new tensor from a pre-existing
    /// collection of elements and the provided indices have non-matching
    /// total dimension.
    #[error("error in tensor creation: non-matching indices and number of elements")]
    IncompatibleNumElems,

    /// Returned when a tensor add or sub is attempted between two tensors
    /// with incompatible indices.
    #[error("error in tensor add/sub: non-matching indices")]
    IncompatibleIndices,

    /// Returned when an element access names an index the tensor does not
    /// have, or fails to name one it does.
    #[error("error in element access: coordinates do not match indices")]
    IncompatibleCoords,

    /// Returned when an element access supplies an index value outside the
    /// index's dimension.
    #[error("error in element access: coordinate out of bounds")]
    CoordOutOfBounds,

    /// Returned when an SVD is requested over a row partition that is empty,
    /// exhaustive, or contains indices the tensor does not have.
    #[error("error in svd: row partition must be a nonempty proper subset of the indices")]
    InvalidSvdPartition,
}
use TensorError::*;
pub type TensorResult<T> = Result<T, TensorError>;

static INDEX_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A named tensor index.
///
/// Every call to [`Index::new`] mints a fresh identifier from a global
/// counter, so two separately created indices never match even if they share
/// a tag and dimension. Equality and hashing consider only the identifier
/// and the prime level; the tag exists for printing and the dimension is
/// carried for bookkeeping.
///
/// An `Index` is immutable once created; a bond whose dimension changes
/// (e.g. after a truncating SVD) is represented by a freshly minted index.
#[derive(Clone, Debug)]
pub struct Index {
    id: u64,
    dim: usize,
    tag: &'static str,
    prime: u32,
}

impl Index {
    /// Mint a new index with a fresh identifier at prime level zero.
    pub fn new(dim: usize, tag: &'static str) -> Self {
        let id = INDEX_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self { id, dim, tag, prime: 0 }
    }

    /// Return the number of values the index can take.
    pub fn dim(&self) -> usize { self.dim }

    /// Return the printing tag.
    pub fn tag(&self) -> &'static str { self.tag }

    /// Return the prime level.
    pub fn prime_level(&self) -> u32 { self.prime }

    /// Return a copy of `self` one prime level up.
    ///
    /// A primed index matches only other copies at the same prime level.
    pub fn prime(&self) -> Self {
        Self { prime: self.prime + 1, ..self.clone() }
    }

    /// Return a copy of `self` at prime level zero.
    pub fn noprime(&self) -> Self {
        Self { prime: 0, ..self.clone() }
    }

    /// Return an identifying label for printing purposes.
    pub fn label(&self) -> String { format!("{self}") }
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.prime == other.prime
    }
}

impl Eq for Index { }

impl std::hash::Hash for Index {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.prime.hash(state);
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.tag, self.id)?;
        for _ in 0..self.prime { write!(f, "'")?; }
        Ok(())
    }
}

/// Return the first index common to `a` and `b`, if any.
///
/// Indices match on identifier and prime level.
pub fn common_index<A>(a: &Tensor<A>, b: &Tensor<A>) -> Option<Index>
where A: ComplexField
{
    a.indices().find(|idx| b.has_index(idx)).cloned()
}

// strides for a first-index-fastest layout
fn strides(indices: &[Index]) -> Vec<usize> {
    let mut acc = 1;
    indices.iter()
        .map(|idx| { let s = acc; acc *= idx.dim(); s })
        .collect()
}

fn total_dim(indices: &[Index]) -> usize {
    indices.iter().map(|idx| idx.dim()).product()
}

fn is_unique(indices: &[Index]) -> bool {
    indices.iter().enumerate()
        .all(|(k, i0)| indices.iter().skip(k + 1).all(|i1| i0 != i1))
}

// increment a multi-index counter, first position fastest
fn ndinc(coords: &mut [usize], dims: &[usize]) {
    for (c, d) in coords.iter_mut().zip(dims) {
        *c += 1;
        if *c < *d { break; } else { *c = 0; }
    }
}

// rearrange `data` so that the output's j-th index is `indices[perm[j]]`
fn permute<A>(indices: &[Index], data: &na::DVector<A>, perm: &[usize])
    -> na::DVector<A>
where A: ComplexField
{
    let in_strides = strides(indices);
    let out_dims: Vec<usize> =
        perm.iter().map(|p| indices[*p].dim()).collect();
    let len = data.len();
    let mut coords = vec![0_usize; perm.len()];
    na::DVector::from_iterator(
        len,
        (0..len).map(|_| {
            let pos: usize =
                coords.iter().zip(perm)
                .map(|(c, p)| c * in_strides[*p])
                .sum();
            ndinc(&mut coords, &out_dims);
            data[pos].clone()
        }),
    )
}

#[derive(Clone, Debug)]
enum TensorData<A> {
    Scalar(A),
    Tensor(Vec<Index>, na::DVector<A>),
}

impl<A> TensorData<A>
where A: ComplexField
{
    fn contract(self, other: Self) -> Self {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => Self::Scalar(a * b),
            (Self::Scalar(a), Self::Tensor(idxs, mut b)) => {
                b.iter_mut().for_each(|bk| { *bk *= a.clone(); });
                Self::Tensor(idxs, b)
            },
            (Self::Tensor(idxs, mut a), Self::Scalar(b)) => {
                a.iter_mut().for_each(|ak| { *ak *= b.clone(); });
                Self::Tensor(idxs, a)
            },
            (Self::Tensor(idxs_a, a), Self::Tensor(idxs_b, b)) => {
                do_contract(idxs_a, a, idxs_b, b)
            },
        }
    }
}

// full contraction over all common indices; ordinary tensor product when
// there are none
fn do_contract<A>(
    idxs_a: Vec<Index>,
    a: na::DVector<A>,
    idxs_b: Vec<Index>,
    b: na::DVector<A>,
) -> TensorData<A>
where A: ComplexField
{
    let common_a: Vec<usize> =
        idxs_a.iter().enumerate()
        .filter_map(|(k, idx)| idxs_b.contains(idx).then_some(k))
        .collect();
    let free_a: Vec<usize> =
        (0..idxs_a.len()).filter(|k| !common_a.contains(k)).collect();
    // positions in b, in the same order as common_a
    let common_b: Vec<usize> =
        common_a.iter()
        .map(|k| {
            idxs_b.iter().position(|idx| *idx == idxs_a[*k]).unwrap()
        })
        .collect();
    let free_b: Vec<usize> =
        (0..idxs_b.len()).filter(|k| !common_b.contains(k)).collect();

    let m: usize = free_a.iter().map(|k| idxs_a[*k].dim()).product();
    let d: usize = common_a.iter().map(|k| idxs_a[*k].dim()).product();
    let n: usize = free_b.iter().map(|k| idxs_b[*k].dim()).product();

    let perm_a: Vec<usize> =
        free_a.iter().chain(common_a.iter()).copied().collect();
    let perm_b: Vec<usize> =
        common_b.iter().chain(free_b.iter()).copied().collect();
    let a = permute(&idxs_a, &a, &perm_a);
    let b = permute(&idxs_b, &b, &perm_b);
    let ma = na::DMatrix::from_column_slice(m, d, a.as_slice());
    let mb = na::DMatrix::from_column_slice(d, n, b.as_slice());
    let mc = ma * mb;

    let idxs_c: Vec<Index> =
        free_a.iter().map(|k| idxs_a[*k].clone())
        .chain(free_b.iter().map(|k| idxs_b[*k].clone()))
        .collect();
    if idxs_c.is_empty() {
        TensorData::Scalar(mc[(0, 0)].clone())
    } else {
        let data = na::DVector::from_column_slice(mc.as_slice());
        TensorData::Tensor(idxs_c, data)
    }
}

/// Truncation settings consumed by [`Tensor::svd`].
///
/// `cutoff` discards singular values below the given fraction of the
/// largest; `max_dim` caps the number of kept values, with `0` meaning
/// unbounded. The all-zero default performs no truncation beyond numerical
/// zero.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SvdArgs {
    /// Relative singular-value threshold.
    pub cutoff: f64,
    /// Bond-dimension cap; `0` is unbounded.
    pub max_dim: usize,
}

impl Default for SvdArgs {
    fn default() -> Self { Self { cutoff: 0.0, max_dim: 0 } }
}

/// The result of a truncating singular value decomposition.
///
/// The factored tensor satisfies `T ≈ u * s * v`, where `u` carries the
/// requested row indices plus a freshly minted bond index, `v` carries the
/// complementary indices plus a second fresh bond index, and `s` is diagonal
/// across the two bonds. `spectrum` holds the kept singular values in
/// descending order, unnormalized.
#[derive(Clone, Debug)]
pub struct Svd<A>
where A: ComplexField
{
    pub u: Tensor<A>,
    pub s: Tensor<A>,
    pub v: Tensor<A>,
    pub spectrum: Vec<A::RealField>,
}

/// Basic implementation of an abstract tensor object.
///
/// A `Tensor<A>` consists of some number of numerical quantities of type `A`
/// and a series of *unique* [`Index`] values. Rank-0 (scalar) quantities are
/// distinguished from rank > 0 (array) quantities for some small operational
/// benefits.
///
/// Multiplication greedily contracts over all matching indices, resorting to
/// an ordinary tensor product when two tensors have no matching indices.
/// Addition and subtraction are defined between tensors with equal index
/// *sets*; index order does not matter there.
#[derive(Clone, Debug)]
pub struct Tensor<A>(TensorData<A>);

impl<A> Tensor<A>
where A: ComplexField
{
    /// Create a new tensor using a function over index values.
    ///
    /// Fails if duplicate indices are provided or an index with zero
    /// dimension is encountered.
    pub fn new<I, F>(indices: I, mut elems: F) -> TensorResult<Self>
    where
        I: IntoIterator<Item = Index>,
        F: FnMut(&[usize]) -> A,
    {
        let indices: Vec<Index> = indices.into_iter().collect();
        if !is_unique(&indices) { return Err(DuplicateIndices); }
        if indices.is_empty() {
            return Ok(Self(TensorData::Scalar(elems(&[]))));
        }
        let len = total_dim(&indices);
        if len == 0 { return Err(ZeroDimIndex); }
        let dims: Vec<usize> = indices.iter().map(|idx| idx.dim()).collect();
        let mut coords = vec![0_usize; indices.len()];
        let data = na::DVector::from_iterator(
            len,
            (0..len).map(|_| {
                let elem = elems(&coords);
                ndinc(&mut coords, &dims);
                elem
            }),
        );
        Ok(Self(TensorData::Tensor(indices, data)))
    }

    /// Create a new tensor with all elements zero.
    pub fn zeros<I>(indices: I) -> TensorResult<Self>
    where I: IntoIterator<Item = Index>
    {
        Self::new(indices, |_| A::zero())
    }

    /// Create a new rank-0 (scalar) tensor.
    pub fn new_scalar(val: A) -> Self { Self(TensorData::Scalar(val)) }

    /// Create a new tensor from a pre-existing vector of elements, laid out
    /// with the first index varying fastest.
    ///
    /// Fails if duplicate indices are provided, the length of the vector
    /// does not match the total dimension of the indices, or an index with
    /// zero dimension is encountered.
    pub fn from_elems<I>(indices: I, elems: na::DVector<A>)
        -> TensorResult<Self>
    where I: IntoIterator<Item = Index>
    {
        let indices: Vec<Index> = indices.into_iter().collect();
        if !is_unique(&indices) { return Err(DuplicateIndices); }
        if indices.is_empty() {
            return Ok(Self(TensorData::Scalar(elems[0].clone())));
        }
        let len = total_dim(&indices);
        if len == 0 { return Err(ZeroDimIndex); }
        if len != elems.len() { return Err(IncompatibleNumElems); }
        Ok(Self(TensorData::Tensor(indices, elems)))
    }

    /// Create a rank-2 tensor with `vals` on its diagonal and zero
    /// elsewhere.
    ///
    /// Fails if `a` and `b` match each other, either has zero dimension, or
    /// `vals` is longer than the shorter of the two dimensions.
    pub fn diag(a: Index, b: Index, vals: &[A]) -> TensorResult<Self> {
        if vals.len() > a.dim().min(b.dim()) {
            return Err(IncompatibleNumElems);
        }
        Self::new([a, b], |coords| {
            if coords[0] == coords[1] {
                vals.get(coords[0]).cloned().unwrap_or_else(A::zero)
            } else {
                A::zero()
            }
        })
    }

    /// Return `true` if `self` has rank 0.
    pub fn is_scalar(&self) -> bool {
        matches!(self.0, TensorData::Scalar(_))
    }

    /// Return `true` if `self` has the given index.
    pub fn has_index(&self, index: &Index) -> bool {
        match &self.0 {
            TensorData::Scalar(_) => false,
            TensorData::Tensor(idxs, _) => idxs.contains(index),
        }
    }

    /// Return the rank (i.e. the number of indices) of `self`.
    pub fn rank(&self) -> usize {
        match &self.0 {
            TensorData::Scalar(_) => 0,
            TensorData::Tensor(idxs, _) => idxs.len(),
        }
    }

    /// Return an iterator over all indices.
    ///
    /// If `self` is a scalar, the iterator is empty.
    pub fn indices(&self) -> std::slice::Iter<'_, Index> {
        match &self.0 {
            TensorData::Scalar(_) => [].iter(),
            TensorData::Tensor(idxs, _) => idxs.iter(),
        }
    }

    /// Return the value of `self` if it has rank 0.
    pub fn scalar(&self) -> Option<A> {
        match &self.0 {
            TensorData::Scalar(a) => Some(a.clone()),
            TensorData::Tensor(..) => None,
        }
    }

    /// Consume `self`, returning its value if it has rank 0.
    pub fn into_scalar(self) -> Option<A> {
        match self.0 {
            TensorData::Scalar(a) => Some(a),
            TensorData::Tensor(..) => None,
        }
    }

    // resolve a full coordinate assignment into a flat position
    fn flat_pos(&self, coords: &[(Index, usize)]) -> TensorResult<usize> {
        let TensorData::Tensor(idxs, _) = &self.0 else {
            return Err(IncompatibleCoords);
        };
        if coords.len() != idxs.len() { return Err(IncompatibleCoords); }
        let strides = strides(idxs);
        let mut seen = vec![false; idxs.len()];
        let mut pos = 0;
        for (idx, c) in coords {
            let Some(k) = idxs.iter().position(|i| i == idx) else {
                return Err(IncompatibleCoords);
            };
            if seen[k] { return Err(IncompatibleCoords); }
            seen[k] = true;
            if *c >= idxs[k].dim() { return Err(CoordOutOfBounds); }
            pos += c * strides[k];
        }
        Ok(pos)
    }

    /// Assign a single element, identified by a full `(index, value)`
    /// coordinate list in any order.
    ///
    /// Fails if the coordinates do not name every index of `self` exactly
    /// once, or a coordinate exceeds its index's dimension.
    pub fn set(&mut self, coords: &[(Index, usize)], val: A)
        -> TensorResult<()>
    {
        let pos = self.flat_pos(coords)?;
        let TensorData::Tensor(_, data) = &mut self.0 else { unreachable!() };
        data[pos] = val;
        Ok(())
    }

    /// Read a single element, identified by a full `(index, value)`
    /// coordinate list in any order.
    ///
    /// Fails if the coordinates do not name every index of `self` exactly
    /// once, or a coordinate exceeds its index's dimension.
    pub fn get(&self, coords: &[(Index, usize)]) -> TensorResult<A> {
        let pos = self.flat_pos(coords)?;
        let TensorData::Tensor(_, data) = &self.0 else { unreachable!() };
        Ok(data[pos].clone())
    }

    /// Multiply `self` with `other`, consuming both. All common indices are
    /// contracted. If no common indices exist, this is equivalent to an
    /// ordinary tensor product.
    ///
    /// The result's indices comprise all non-common indices belonging to
    /// `self` followed by those from `other`.
    ///
    /// This operation is used by the `*` operator.
    pub fn multiply(self, other: Self) -> Self {
        Self(self.0.contract(other.0))
    }

    /// Compute the sum of `self` and `other`, consuming both.
    ///
    /// Fails if either tensor holds an index not held by the other.
    ///
    /// This operation is used by the `+` operator.
    pub fn add_checked(self, other: Self) -> TensorResult<Self> {
        self.combine(other, |a, b| a + b)
    }

    /// Compute the difference of `self` and `other`, consuming both.
    ///
    /// Fails if either tensor holds an index not held by the other.
    ///
    /// This operation is used by the `-` operator.
    pub fn sub_checked(self, other: Self) -> TensorResult<Self> {
        self.combine(other, |a, b| a - b)
    }

    fn combine<F>(self, other: Self, op: F) -> TensorResult<Self>
    where F: Fn(A, A) -> A
    {
        match (self.0, other.0) {
            (TensorData::Scalar(a), TensorData::Scalar(b)) => {
                Ok(Self(TensorData::Scalar(op(a, b))))
            },
            (TensorData::Tensor(idxs_a, a), TensorData::Tensor(idxs_b, b)) => {
                if idxs_a.len() != idxs_b.len()
                    || !idxs_a.iter().all(|idx| idxs_b.contains(idx))
                {
                    return Err(IncompatibleIndices);
                }
                // realign rhs to lhs index order
                let perm: Vec<usize> =
                    idxs_a.iter()
                    .map(|idx| {
                        idxs_b.iter().position(|i| i == idx).unwrap()
                    })
                    .collect();
                let b = permute(&idxs_b, &b, &perm);
                let data = na::DVector::from_iterator(
                    a.len(),
                    a.iter().zip(b.iter())
                        .map(|(ak, bk)| op(ak.clone(), bk.clone())),
                );
                Ok(Self(TensorData::Tensor(idxs_a, data)))
            },
            _ => Err(IncompatibleIndices),
        }
    }

    /// Return a new tensor containing the element-wise complex conjugation
    /// of `self`.
    pub fn conj(&self) -> Self {
        match &self.0 {
            TensorData::Scalar(a) =>
                Self(TensorData::Scalar(a.clone().conjugate())),
            TensorData::Tensor(idxs, a) =>
                Self(TensorData::Tensor(
                    idxs.clone(),
                    a.map(|ak| ak.conjugate()),
                )),
        }
    }

    /// Conjugate `self` element-wise in place.
    pub fn conj_mut(&mut self) {
        match &mut self.0 {
            TensorData::Scalar(a) => { *a = a.clone().conjugate(); },
            TensorData::Tensor(_, a) => {
                a.iter_mut().for_each(|ak| { *ak = ak.clone().conjugate(); });
            },
        }
    }

    /// Return the Frobenius norm of `self`.
    pub fn norm(&self) -> A::RealField {
        let sqsum = match &self.0 {
            TensorData::Scalar(a) => a.clone().modulus_squared(),
            TensorData::Tensor(_, a) =>
                a.iter()
                .map(|ak| ak.clone().modulus_squared())
                .fold(A::RealField::zero(), |acc, m| acc + m),
        };
        sqsum.sqrt()
    }

    /// Multiply every element of `self` by `factor` in place.
    pub fn scale(&mut self, factor: A) {
        match &mut self.0 {
            TensorData::Scalar(a) => { *a *= factor; },
            TensorData::Tensor(_, a) => {
                a.iter_mut().for_each(|ak| { *ak *= factor.clone(); });
            },
        }
    }

    /// Apply a mapping function to the elements of `self` in place.
    pub fn map_inplace<F>(&mut self, mut f: F)
    where F: FnMut(&A) -> A
    {
        match &mut self.0 {
            TensorData::Scalar(a) => { *a = f(a); },
            TensorData::Tensor(_, a) => {
                a.iter_mut().for_each(|ak| { *ak = f(ak); });
            },
        }
    }

    /// Bump the prime level of every index of `self` matching one of
    /// `targets`. Indices not present are ignored.
    pub fn primed<'a, I>(mut self, targets: I) -> Self
    where I: IntoIterator<Item = &'a Index>
    {
        if let TensorData::Tensor(idxs, _) = &mut self.0 {
            for target in targets {
                if let Some(idx) = idxs.iter_mut().find(|i| *i == target) {
                    *idx = idx.prime();
                }
            }
        }
        self
    }

    /// Bump the prime level of every index of `self`.
    pub fn prime_all(&mut self) {
        if let TensorData::Tensor(idxs, _) = &mut self.0 {
            idxs.iter_mut().for_each(|idx| { *idx = idx.prime(); });
        }
    }

    /// Compute a truncating singular value decomposition of `self` across
    /// the bipartition `(row_indices, rest)`.
    ///
    /// Singular values below `args.cutoff` relative to the largest are
    /// discarded, then at most `args.max_dim` values are kept (`0` meaning
    /// unbounded); at least one value is always kept. See [`Svd`] for the
    /// shape of the result.
    ///
    /// Fails if `row_indices` is not a nonempty proper subset of the indices
    /// of `self`.
    pub fn svd(self, row_indices: &[Index], args: &SvdArgs)
        -> TensorResult<Svd<A>>
    {
        let TensorData::Tensor(idxs, data) = self.0 else {
            return Err(InvalidSvdPartition);
        };
        if row_indices.is_empty()
            || !row_indices.iter().all(|idx| idxs.contains(idx))
        {
            return Err(InvalidSvdPartition);
        }
        let row_pos: Vec<usize> =
            idxs.iter().enumerate()
            .filter_map(|(k, idx)| row_indices.contains(idx).then_some(k))
            .collect();
        let col_pos: Vec<usize> =
            (0..idxs.len()).filter(|k| !row_pos.contains(k)).collect();
        if col_pos.is_empty() { return Err(InvalidSvdPartition); }

        let m: usize = row_pos.iter().map(|k| idxs[*k].dim()).product();
        let n: usize = col_pos.iter().map(|k| idxs[*k].dim()).product();
        let perm: Vec<usize> =
            row_pos.iter().chain(col_pos.iter()).copied().collect();
        let data = permute(&idxs, &data, &perm);
        let mat = na::DMatrix::from_column_slice(m, n, data.as_slice());

        // singular values come out in descending order
        let decomp = na::SVD::new(mat, true, true);
        let u = decomp.u.unwrap();
        let v_t = decomp.v_t.unwrap();
        let singular_values = decomp.singular_values;

        let cutoff = na::convert::<f64, A::RealField>(args.cutoff);
        let smax = singular_values[0].clone();
        let mut rank = singular_values.iter()
            .take_while(|s| {
                let sv = (*s).clone();
                sv > A::RealField::zero()
                    && sv >= cutoff.clone() * smax.clone()
            })
            .count()
            .max(1);
        if args.max_dim > 0 { rank = rank.min(args.max_dim); }
        let spectrum: Vec<A::RealField> =
            singular_values.iter().take(rank).cloned().collect();

        let ul = Index::new(rank, "Link");
        let vl = Index::new(rank, "Link");

        // u is column-major, so its first `rank` columns are contiguous and
        // already laid out rows-fastest
        let u_idxs: Vec<Index> =
            row_pos.iter().map(|k| idxs[*k].clone())
            .chain([ul.clone()])
            .collect();
        let u_data =
            na::DVector::from_column_slice(&u.as_slice()[..m * rank]);
        let u = Tensor(TensorData::Tensor(u_idxs, u_data));

        let svals: Vec<A> =
            spectrum.iter().map(|s| A::from_real(s.clone())).collect();
        let s = Self::diag(ul, vl.clone(), &svals)?;

        let v_idxs: Vec<Index> =
            [vl].into_iter()
            .chain(col_pos.iter().map(|k| idxs[*k].clone()))
            .collect();
        let v_mat = v_t.rows(0, rank).into_owned();
        let v_data = na::DVector::from_column_slice(v_mat.as_slice());
        let v = Tensor(TensorData::Tensor(v_idxs, v_data));

        Ok(Svd { u, s, v, spectrum })
    }
}

impl<A> PartialEq for Tensor<A>
where A: ComplexField
{
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (TensorData::Scalar(a), TensorData::Scalar(b)) => a == b,
            (TensorData::Tensor(idxs_a, a), TensorData::Tensor(idxs_b, b)) =>
                idxs_a == idxs_b && a == b,
            _ => false,
        }
    }
}

impl<A> std::ops::Mul<Tensor<A>> for Tensor<A>
where A: ComplexField
{
    type Output = Tensor<A>;

    fn mul(self, other: Tensor<A>) -> Self::Output {
        self.multiply(other)
    }
}

impl<A> std::ops::Add<Tensor<A>> for Tensor<A>
where A: ComplexField
{
    type Output = Tensor<A>;

    fn add(self, other: Tensor<A>) -> Self::Output {
        match self.add_checked(other) {
            Ok(res) => res,
            Err(err) => panic!("{}", err),
        }
    }
}

impl<A> std::ops::Sub<Tensor<A>> for Tensor<A>
where A: ComplexField
{
    type Output = Tensor<A>;

    fn sub(self, other: Tensor<A>) -> Self::Output {
        match self.sub_checked(other) {
            Ok(res) => res,
            Err(err) => panic!("{}", err),
        }
    }
}

impl<A> fmt::Display for Tensor<A>
where A: ComplexField + fmt::Display
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            TensorData::Scalar(a) => write!(f, "{{ }} {}", a),
            TensorData::Tensor(idxs, data) => {
                write!(f, "{{ ")?;
                let n_idxs = idxs.len();
                for (k, idx) in idxs.iter().enumerate() {
                    write!(f, "{}", idx)?;
                    if k < n_idxs - 1 { write!(f, ", ")?; }
                }
                write!(f, " }} [")?;
                let len = data.len();
                for (k, elem) in data.iter().enumerate() {
                    write!(f, "{}", elem)?;
                    if k < len - 1 { write!(f, ", ")?; }
                }
                write!(f, "]")
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64 as C64;

    const EPS: f64 = 1e-12;

    fn c(re: f64) -> C64 { C64::new(re, 0.0) }

    #[test]
    fn contract_matches_matrix_product() {
        let a = Index::new(3, "a");
        let b = Index::new(4, "b");
        let d = Index::new(5, "d");
        let t = Tensor::<C64>::new(
            [a.clone(), b.clone()], |co| c((co[0] + 2 * co[1]) as f64))
            .unwrap();
        let u = Tensor::<C64>::new(
            [b.clone(), d.clone()], |co| c((1 + co[0] * co[1]) as f64))
            .unwrap();
        let tu = t.clone() * u.clone();
        assert_eq!(tu.rank(), 2);
        assert!(tu.has_index(&a));
        assert!(tu.has_index(&d));
        for i in 0..3 {
            for k in 0..5 {
                let expected: f64 =
                    (0..4)
                    .map(|j| ((i + 2 * j) * (1 + j * k)) as f64)
                    .sum();
                let got =
                    tu.get(&[(a.clone(), i), (d.clone(), k)]).unwrap();
                assert!((got - c(expected)).norm() < EPS);
            }
        }
    }

    #[test]
    fn product_without_common_indices() {
        let a = Index::new(2, "a");
        let b = Index::new(3, "b");
        let t = Tensor::<C64>::new([a], |_| c(2.0)).unwrap();
        let u = Tensor::<C64>::new([b], |_| c(3.0)).unwrap();
        let tu = t * u;
        assert_eq!(tu.rank(), 2);
        assert!((tu.norm() - (6.0 * 6.0 * 6.0_f64).sqrt()).abs() < EPS);
    }

    #[test]
    fn contract_to_scalar() {
        let a = Index::new(4, "a");
        let t = Tensor::<C64>::new([a.clone()], |_| c(1.0)).unwrap();
        let u = Tensor::<C64>::new([a], |_| c(2.0)).unwrap();
        let s = (t * u).into_scalar().unwrap();
        assert!((s - c(8.0)).norm() < EPS);
    }

    #[test]
    fn primed_indices_do_not_match() {
        let a = Index::new(2, "a");
        let t = Tensor::<C64>::new([a.clone()], |_| c(1.0)).unwrap();
        let u = Tensor::<C64>::new([a.clone()], |_| c(1.0)).unwrap()
            .primed([&a]);
        let tu = t * u;
        // no contraction happened
        assert_eq!(tu.rank(), 2);
        assert!(tu.has_index(&a));
        assert!(tu.has_index(&a.prime()));
    }

    #[test]
    fn add_realigns_index_order() {
        let a = Index::new(2, "a");
        let b = Index::new(3, "b");
        let t = Tensor::<C64>::new(
            [a.clone(), b.clone()], |co| c((co[0] + 10 * co[1]) as f64))
            .unwrap();
        let u = Tensor::<C64>::new(
            [b.clone(), a.clone()], |co| c((co[1] + 10 * co[0]) as f64))
            .unwrap();
        let sum = t.add_checked(u).unwrap();
        for i in 0..2 {
            for j in 0..3 {
                let got = sum.get(&[(a.clone(), i), (b.clone(), j)]).unwrap();
                let expected = c(2.0 * (i + 10 * j) as f64);
                assert!((got - expected).norm() < EPS);
            }
        }
    }

    #[test]
    fn add_rejects_mismatched_indices() {
        let a = Index::new(2, "a");
        let b = Index::new(2, "b");
        let t = Tensor::<C64>::new([a.clone()], |_| c(1.0)).unwrap();
        let u = Tensor::<C64>::new([b], |_| c(1.0)).unwrap();
        assert!(t.add_checked(u).is_err());
        let t = Tensor::<C64>::new([a.clone()], |_| c(1.0)).unwrap();
        let v = Tensor::<C64>::new([a], |_| c(1.0)).unwrap();
        assert!(t.sub_checked(v).unwrap().norm() < EPS);
    }

    #[test]
    fn svd_reconstructs() {
        let a = Index::new(2, "a");
        let b = Index::new(3, "b");
        let d = Index::new(2, "d");
        let t = Tensor::<C64>::new(
            [a.clone(), b.clone(), d.clone()],
            |co| C64::new(
                (1 + co[0] + co[1]) as f64,
                (co[2] as f64) - 0.5 * (co[1] as f64),
            ))
            .unwrap();
        let Svd { u, s, v, spectrum } =
            t.clone().svd(&[a.clone(), d.clone()], &SvdArgs::default())
            .unwrap();
        // descending spectrum
        assert!(spectrum.windows(2).all(|w| w[0] >= w[1]));
        let re = u * s * v;
        let diff = re.sub_checked(t).unwrap();
        assert!(diff.norm() < 1e-10);
    }

    #[test]
    fn svd_truncates_product_state() {
        // rank-1 matrix: second singular value is exactly zero
        let a = Index::new(2, "a");
        let b = Index::new(2, "b");
        let t = Tensor::<C64>::new(
            [a.clone(), b], |co| c([0.6, 0.8][co[0]] * [0.8, 0.6][co[1]]))
            .unwrap();
        let Svd { spectrum, .. } =
            t.svd(&[a], &SvdArgs { cutoff: 1e-10, max_dim: 0 }).unwrap();
        assert_eq!(spectrum.len(), 1);
        assert!((spectrum[0] - 1.0).abs() < EPS);
    }

    #[test]
    fn svd_respects_max_dim() {
        let a = Index::new(4, "a");
        let b = Index::new(4, "b");
        let t = Tensor::<C64>::new(
            [a.clone(), b],
            |co| if co[0] == co[1] { c((4 - co[0]) as f64) } else { c(0.0) })
            .unwrap();
        let Svd { spectrum, u, .. } =
            t.svd(&[a], &SvdArgs { cutoff: 0.0, max_dim: 2 }).unwrap();
        assert_eq!(spectrum.len(), 2);
        assert!((spectrum[0] - 4.0).abs() < EPS);
        assert!((spectrum[1] - 3.0).abs() < EPS);
        let link = u.indices().find(|idx| idx.tag() == "Link").unwrap();
        assert_eq!(link.dim(), 2);
    }

    #[test]
    fn diag_contraction_rescales() {
        let a = Index::new(2, "a");
        let b = Index::new(2, "b");
        let t = Tensor::<C64>::new([a.clone()], |co| c((1 + co[0]) as f64))
            .unwrap();
        let d = Tensor::diag(a, b.clone(), &[c(2.0), c(3.0)]).unwrap();
        let td = t * d;
        assert!((td.get(&[(b.clone(), 0)]).unwrap() - c(2.0)).norm() < EPS);
        assert!((td.get(&[(b, 1)]).unwrap() - c(6.0)).norm() < EPS);
    }

    #[test]
    fn norm_and_conj() {
        let a = Index::new(2, "a");
        let mut t = Tensor::<C64>::new([a.clone()], |_| C64::new(0.0, 0.0))
            .unwrap();
        t.set(&[(a.clone(), 0)], C64::new(3.0, 0.0)).unwrap();
        t.set(&[(a.clone(), 1)], C64::new(0.0, 4.0)).unwrap();
        assert!((t.norm() - 5.0).abs() < EPS);
        let tc = t.conj();
        let got = tc.get(&[(a, 1)]).unwrap();
        assert!((got - C64::new(0.0, -4.0)).norm() < EPS);
    }

    #[test]
    fn duplicate_indices_rejected() {
        let a = Index::new(2, "a");
        assert!(Tensor::<C64>::new([a.clone(), a], |_| c(0.0)).is_err());
    }

    #[test]
    fn elementwise_helpers() {
        let a = Index::new(2, "a");
        let elems = na::dvector![C64::new(1.0, 1.0), C64::new(2.0, -1.0)];
        let mut t = Tensor::from_elems([a.clone()], elems).unwrap();
        assert!(!t.is_scalar());
        t.map_inplace(|x| x * c(2.0));
        assert!((t.get(&[(a.clone(), 0)]).unwrap() - C64::new(2.0, 2.0))
            .norm() < EPS);
        t.conj_mut();
        assert!((t.get(&[(a.clone(), 1)]).unwrap() - C64::new(4.0, 2.0))
            .norm() < EPS);
        let u = Tensor::<C64>::new([a.clone()], |_| c(1.0)).unwrap();
        assert_eq!(common_index(&t, &u), Some(a.clone()));
        assert_eq!(a.prime().noprime(), a);
        assert_eq!(a.prime().prime_level(), 1);
        let s = Tensor::<C64>::new_scalar(c(3.0));
        assert_eq!(s.scalar(), Some(c(3.0)));
    }
}
