//! Entity references used throughout the engine.
//!
//! Nodes, modules, and physical nodes are not implemented as Rust references
//! because the engine's tables are dense and re-indexed on every hierarchy
//! level. Instead, each reference is a struct wrapping a `u32` index into a
//! table, with a separate index type per entity so we don't lose type safety.
//! Compact structures use the `PackedOption<EntityRef>` representation from
//! `cranelift-entity`.

use cranelift_entity::entity_impl;

/// An opaque reference to a node in a [`Network`](crate::network::Network).
///
/// A node is either a leaf (a state node carrying stationary flow) or a
/// module node owning a list of children.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);
entity_impl!(NodeId, "node");

/// An opaque reference to a row in the driver's module table at the
/// currently-active hierarchy level.
///
/// Module references are only meaningful between `init_partition` and the
/// next re-partition; consolidation maps them back onto tree nodes.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Module(u32);
entity_impl!(Module, "mod");

/// An opaque reference to a physical node in a higher-order network.
///
/// Physical ids coming from the outside are arbitrary; the memory objective
/// re-indexes them densely to `PhysNode` values before an optimization pass.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysNode(u32);
entity_impl!(PhysNode, "phys");
