//! Symbolic covering-reachability engine for networks of timed automata.
//!
//! This crate implements the exploration core: difference-bound matrix and
//! offset-DBM kernels, zone abstraction and extrapolation, a layered
//! transition-system stack (discrete / zone-graph / asynchronous-zone-graph),
//! a pool-allocated subsumption graph, the covering-reachability algorithm,
//! and a family of partial-order reduction policies. Parsing a textual
//! system declaration is out of scope; [`model::Model`] is the normalized
//! form the engine consumes, loadable from JSON.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

/// Bound entries: the atomic values stored in a difference-bound matrix.
pub mod bound;
/// The stack machine for integer guards and statements.
pub mod bytecode;
/// CLI configuration parsing.
pub mod config;
/// Core difference-bound matrix kernel.
pub mod dbm;
/// The subsumption graph.
pub mod graph;
/// Accepting-label matching.
pub mod label;
/// The normalized model and its static-analysis maps.
pub mod model;
/// Offset-DBM kernel for asynchronous zones.
pub mod offset_dbm;
/// Slab allocator and background garbage collector.
pub mod pool;
/// Partial-order reduction policies.
pub mod por;
/// The covering-reachability algorithm.
pub mod reach;
/// Graph output sinks (`-f dot`, `-f raw`).
pub mod sink;
/// Transition-system layers (TA, ZG, AZG).
pub mod ts;
/// Zone values and extrapolation operators.
pub mod zone;
