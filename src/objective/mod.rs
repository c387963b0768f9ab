//! The map-equation objectives.
//!
//! An objective answers three questions about a partition of a flow network,
//! incrementally and at high frequency: what is the current description
//! length, what would it become if one node moved to another module, and,
//! once the driver accepts a move, apply it and keep every internal sum
//! consistent with a from-scratch recomputation.
//!
//! Four variants share the surface defined by [`Objective`]:
//!
//! - [`MapEquation`]: the standard two-level map equation over continuous
//!   flow.
//! - [`GrassbergerMapEquation`]: integer degree flow, normalized by the total
//!   degree of the network.
//! - [`MemMapEquation`]: higher-order networks where several state nodes
//!   share a physical node; module codebooks encode physical visit rates.
//! - [`MetaMapEquation`]: adds a rate-weighted categorical entropy term over
//!   node meta data.
//!
//! # Driver protocol
//!
//! ```text
//! init(config)
//! init_network(net, root)            once per hierarchy level
//! init_partition(net, active)        active = flat list of current modules,
//!                                    each pre-assigned its own module index
//! loop {
//!     add_memory_contributions(...)  only if have_memory()
//!     delta_codelength(...)          any number of times, read-only
//!     update_codelength(...)         once per accepted move
//! }
//! consolidate_modules(net, modules)
//! init_super_network(net, root) / init_network(net, subroot)   next level
//! ```
//!
//! `delta_codelength` must not mutate engine state: the driver may query many
//! candidate moves for one node and then apply one or none. The variants
//! uphold this by taking `&self` there.
//!
//! The engine is single-threaded and not reentrant. A parallel driver may
//! snapshot the module tables and fan out `delta_codelength` queries, but all
//! `update_codelength` calls apply sequentially, in call order.

use crate::config::Config;
use crate::entities::{Module, NodeId};
use crate::error::ObjectiveResult;
use crate::flow::{DeltaFlowMap, ModuleDelta};
use crate::network::Network;
use cranelift_entity::packed_option::PackedOption;
use cranelift_entity::{PrimaryMap, SecondaryMap};

mod grassberger;
mod map;
mod mem;
mod meta;

pub use grassberger::GrassbergerMapEquation;
pub use map::MapEquation;
pub use mem::MemMapEquation;
pub use meta::MetaMapEquation;

/// Lifecycle phase of an objective.
///
/// `delta_codelength` and `update_codelength` are only legal between
/// `init_partition` and the next re-initialization; violations are programmer
/// errors and are caught by `debug_assert!` only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Phase {
    Uninitialized,
    NetworkInit,
    PartitionInit,
    Optimizing,
    Consolidated,
}

/// The operation surface shared by the four objective variants.
///
/// `Flow` is the per-node/per-module aggregate the variant maintains and
/// `Delta` the proposed-move record it consumes; drivers stay generic over
/// both.
pub trait Objective {
    /// Per-node and per-module flow aggregate.
    type Flow: Copy;
    /// Proposed-move record.
    type Delta: ModuleDelta;

    /// Wire configuration and reset all sums.
    fn init(&mut self, config: &Config) -> ObjectiveResult<()>;

    /// Pre-compute the constants of the leaf layer below `root` and the root
    /// boundary terms.
    fn init_network(
        &mut self,
        network: &mut Network<Self::Flow>,
        root: NodeId,
    ) -> ObjectiveResult<()>;

    /// Re-compute leaf constants when the children of `root` are themselves
    /// treated as the base nodes of a coarser level. At a super level the
    /// enter flow of a module plays the role of its visit probability.
    fn init_super_network(
        &mut self,
        network: &mut Network<Self::Flow>,
        root: NodeId,
    ) -> ObjectiveResult<()>;

    /// Reset the root boundary terms for the subtree rooted at `root`.
    fn init_sub_network(
        &mut self,
        network: &mut Network<Self::Flow>,
        root: NodeId,
    ) -> ObjectiveResult<()>;

    /// Compute the initial codelength of the partition given by `active`,
    /// the flat list of currently-active modules. Each active node must
    /// already be assigned its own module index, in list order (see
    /// [`Network::set_active_modules`]).
    fn init_partition(
        &mut self,
        network: &mut Network<Self::Flow>,
        active: &[NodeId],
    ) -> ObjectiveResult<()>;

    /// The codelength contribution of a single module node, leaf-module or
    /// module-of-modules.
    fn calc_codelength(&self, network: &Network<Self::Flow>, parent: NodeId) -> f64;

    /// Populate delta records with the per-physical-node overlap terms of
    /// moving `node`. No-op for objectives without memory.
    fn add_memory_contributions(
        &mut self,
        _network: &Network<Self::Flow>,
        _node: NodeId,
        _old_delta: &mut Self::Delta,
        _module_deltas: &mut DeltaFlowMap<Self::Delta>,
    ) {
    }

    /// The change in total codelength if `node` moved from
    /// `old_delta.module()` to `new_delta.module()`. Read-only.
    fn delta_codelength(
        &self,
        network: &Network<Self::Flow>,
        node: NodeId,
        old_delta: &Self::Delta,
        new_delta: &Self::Delta,
        module_flow: &PrimaryMap<Module, Self::Flow>,
        module_members: &SecondaryMap<Module, u32>,
    ) -> f64;

    /// Apply an accepted move: mutate every internal sum, the module flow
    /// table, and the member counts, so that the new codelength equals the
    /// old plus [`delta_codelength`](Self::delta_codelength) of the same
    /// move.
    fn update_codelength(
        &mut self,
        network: &Network<Self::Flow>,
        node: NodeId,
        old_delta: &mut Self::Delta,
        new_delta: &mut Self::Delta,
        module_flow: &mut PrimaryMap<Module, Self::Flow>,
        module_members: &mut SecondaryMap<Module, u32>,
    );

    /// Transfer per-module auxiliary state onto the consolidated module tree
    /// nodes. `modules` maps each module index to its new tree node, if any.
    fn consolidate_modules(
        &mut self,
        network: &mut Network<Self::Flow>,
        modules: &SecondaryMap<Module, PackedOption<NodeId>>,
    );

    /// Current total codelength in bits per step.
    fn codelength(&self) -> f64;

    /// Current index-codebook codelength.
    fn index_codelength(&self) -> f64;

    /// Current module-codebook codelength.
    fn module_codelength(&self) -> f64;

    /// Does this objective track per-physical-node state that the driver
    /// must feed through [`add_memory_contributions`](Self::add_memory_contributions)?
    fn have_memory(&self) -> bool {
        false
    }
}

/// Seed the driver-owned module tables for a fresh partition: one module per
/// active node carrying the node's aggregate, one member each.
pub fn seed_module_tables<F: Copy>(
    network: &Network<F>,
    active: &[NodeId],
) -> (PrimaryMap<Module, F>, SecondaryMap<Module, u32>) {
    let mut module_flow = PrimaryMap::with_capacity(active.len());
    let mut module_members = SecondaryMap::new();
    for &node in active {
        let module = module_flow.push(network[node].data);
        module_members[module] = 1;
    }
    (module_flow, module_members)
}
