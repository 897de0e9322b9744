//! Simulation of quantum circuits on arbitrary qubit connectivity graphs,
//! using tensor network states with a movable orthogonality center.
//!
//! The wavefunction of an *N*-qubit register is stored as one tensor per
//! qubit plus one vector of singular values per link of the connectivity
//! graph, rather than as a length-2<sup>*N*</sup> state vector. Gates act
//! locally on a two-site block (the *cursor*), which is walked around the
//! graph by successive truncated singular value decompositions; the cost of
//! a simulation is then governed by the entanglement the circuit actually
//! generates instead of by qubit count alone.
//!
//! - [`topology`] describes connectivity graphs and the breadth-first
//!   routing used to move the cursor.
//! - [`tensor`] implements the labelled-index tensor algebra everything
//!   else is written against.
//! - [`gate`] materializes standard one- and two-qubit gates as operator
//!   tensors.
//! - [`qcircuit`] holds the wavefunction itself: gate application, cursor
//!   motion, measurement, and inner products.
//! - [`circuits`] builds common topologies, including the 53-qubit IBM Q
//!   layout.
//!
//! # Example
//!
//! ```no_run
//! use circuit_net::{
//!     circuits::make_chain,
//!     gate::{ OneSiteGate, TwoSiteGate },
//!     qcircuit::QCircuit,
//! };
//!
//! // a Bell pair on an 8-site ring, truncating singular values below 1e-5
//! let mut circuit = QCircuit::new(make_chain(8, true), &[]).unwrap();
//! circuit.set_cutoff(1e-5);
//! circuit.apply(OneSiteGate::H(0), OneSiteGate::Id(1)).unwrap();
//! circuit.apply_two(TwoSiteGate::CNot(0, 1)).unwrap();
//!
//! assert!((circuit.probability_of_zero(0).unwrap() - 0.5).abs() < 1e-6);
//! ```

pub mod tensor;
pub mod topology;
pub mod gate;
pub mod qcircuit;
pub mod circuits;
