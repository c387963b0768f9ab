//! Map-equation objective engine for flow-network community detection.
//!
//! Given a network whose nodes carry stationary flow and whose module
//! boundaries carry enter/exit flow, this crate maintains a hierarchical
//! partition and answers, incrementally and at high frequency:
//!
//! 1. What is the current description length (codelength) of the partition?
//! 2. What would the codelength become if one node moved to another module?
//! 3. Apply that move, keeping every internal sum consistent with a
//!    from-scratch recomputation.
//!
//! The four objective variants (the base map equation, the degree-normalized
//! integer variant, the memory variant for higher-order networks, and the
//! meta-data variant) share the [`objective::Objective`] surface. The crate is a
//! library for an external optimization driver: it does not parse networks,
//! compute flow, or decide which moves to try.

#![deny(missing_docs, trivial_numeric_casts, unused_extern_crates)]
#![warn(unused_import_braces)]

pub mod config;
pub mod entities;
pub mod error;
pub mod flow;
pub mod infomath;
pub mod meta;
pub mod network;
pub mod objective;

pub use crate::config::Config;
pub use crate::entities::{Module, NodeId, PhysNode};
pub use crate::error::{ObjectiveError, ObjectiveResult};
pub use crate::flow::{
    DeltaFlow, DeltaFlowInt, DeltaFlowMap, FlowData, FlowDataInt, MemDeltaFlow, ModuleDelta,
};
pub use crate::meta::MetaCollection;
pub use crate::network::{Network, Node, PhysData};
pub use crate::objective::{
    seed_module_tables, GrassbergerMapEquation, MapEquation, MemMapEquation, MetaMapEquation,
    Objective,
};
