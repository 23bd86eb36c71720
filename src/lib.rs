//! Meta-League Evolution Engine
//!
//! A multi-objective evolutionary kernel over a population of agents whose
//! state is a complex-valued vector in a finite-dimensional inner-product
//! space. Individuals are ranked by Pareto dominance (NSGA-II), admitted to
//! the next generation only after passing a verification gate, and
//! reproduced by consensus-average crossover and local perturbation.
//!
//! The crate does no I/O: callers supply an [`evolution::Evaluator`] and
//! drive [`evolution::run`] themselves.
//!
//! # Layout
//!
//! - [`hilbert`] — complex-vector algebra (norm, inner product, consensus
//!   averaging, energy, stability probe).
//! - [`objectives`] — dominance semantics for a scored axis and threshold
//!   laws.
//! - [`nsga2`] — Pareto dominance, fast non-dominated sort, crowding
//!   distance, tournament selection.
//! - [`proof_gate`] — per-individual verification against a configurable
//!   gate.
//! - [`evolution`] — the generational driver tying everything together.
//! - [`agent`] — the individual data model.
//! - [`certificate`] — plain-text certificate rendering.
//! - [`rng`] — the threaded, seedable random generator.

#![forbid(unsafe_code)]

pub mod agent;
pub mod certificate;
pub mod evolution;
pub mod hilbert;
pub mod nsga2;
pub mod objectives;
pub mod proof_gate;
pub mod rng;

pub use agent::{Individual, Kind};
pub use evolution::{
    Cancellation, EvaluationOutcome, Evaluator, EvolutionConfig, EvolutionConfigBuilder, ReferenceEvaluator, RunResult,
};
pub use hilbert::{Complex, HilbertError, State};
pub use nsga2::{Genome, Nsga2Error};
pub use objectives::{Axis, Law, Sense};
pub use proof_gate::{ProofGateConfig, ProofGateConfigBuilder, ProofGateConfigError, VerificationRecord};
pub use rng::Rng;
