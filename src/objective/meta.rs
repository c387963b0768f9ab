//! The meta-data-augmented map equation.
//!
//! On top of the base equation, every module pays a categorical entropy term
//! over the meta tags of its members, weighted by the configured meta-data
//! rate. The term is tracked separately in `meta_codelength`; totals are
//! reported as base plus meta.
//!
//! Delta queries evaluate "entropy of the module bag with the node's bag
//! added/removed" by a sorted merge over both bags, so they never touch the
//! stored collections, so the read-only contract of `delta_codelength` holds
//! by construction.

use crate::config::Config;
use crate::entities::{Module, NodeId};
use crate::error::{ObjectiveError, ObjectiveResult};
use crate::flow::{DeltaFlow, FlowData};
use crate::meta::MetaCollection;
use crate::network::Network;
use crate::objective::{MapEquation, Objective, Phase};
use cranelift_entity::packed_option::PackedOption;
use cranelift_entity::{PrimaryMap, SecondaryMap};
use rustc_hash::FxHashMap;

/// The meta map-equation objective.
#[derive(Clone, Debug, Default)]
pub struct MetaMapEquation {
    base: MapEquation,

    module_to_meta_collection: FxHashMap<Module, MetaCollection>,
    meta_codelength: f64,

    num_meta_data_dimensions: u32,
    meta_data_rate: f64,
    weight_by_flow: bool,
}

impl MetaMapEquation {
    /// An objective with no network attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// The rate-weighted categorical term of the current partition.
    pub fn meta_codelength(&self) -> f64 {
        self.meta_codelength
    }

    /// The tracked meta bag of `module`, if any.
    pub fn module_meta_collection(&self, module: Module) -> Option<&MetaCollection> {
        self.module_to_meta_collection.get(&module)
    }

    fn seed_weight(&self, data: &FlowData) -> f64 {
        if self.weight_by_flow { data.flow } else { 1.0 }
    }

    /// Seed each leaf's meta bag from its first-dimension tag. A leaf
    /// without meta data is a configuration error.
    fn init_meta_nodes(
        &self,
        network: &mut Network<FlowData>,
        root: NodeId,
    ) -> ObjectiveResult<()> {
        let leaves: Vec<NodeId> = network.leaf_nodes(root).collect();
        let not_initiated = leaves
            .first()
            .map_or(true, |&leaf| network[leaf].meta_collection.is_empty());
        if !not_initiated {
            return Ok(());
        }
        for &leaf in &leaves {
            let tag = match network[leaf].meta_data.first() {
                Some(&tag) => tag,
                None => return Err(ObjectiveError::MissingMetaData(leaf)),
            };
            let weight = self.seed_weight(&network[leaf].data);
            let node = &mut network[leaf];
            node.meta_collection = MetaCollection::new();
            node.meta_collection.add(tag, weight);
        }
        Ok(())
    }

    /// Copy each active node's bag into a fresh per-module entry.
    fn init_partition_of_meta_nodes(
        &mut self,
        network: &mut Network<FlowData>,
        active: &[NodeId],
    ) -> ObjectiveResult<()> {
        self.module_to_meta_collection.clear();
        for &id in active {
            if network[id].meta_collection.is_empty() {
                let tag = match network[id].meta_data.first() {
                    Some(&tag) => tag,
                    None => return Err(ObjectiveError::MissingMetaData(id)),
                };
                let weight = self.seed_weight(&network[id].data);
                network[id].meta_collection.add(tag, weight);
            }
            let module = network[id].module;
            self.module_to_meta_collection
                .insert(module, network[id].meta_collection.clone());
        }
        Ok(())
    }

    fn module_bag(&self, module: Module) -> &MetaCollection {
        match self.module_to_meta_collection.get(&module) {
            Some(bag) => bag,
            None => panic!("meta bookkeeping out of sync: no collection for {module}"),
        }
    }
}

impl Objective for MetaMapEquation {
    type Flow = FlowData;
    type Delta = DeltaFlow;

    fn init(&mut self, config: &Config) -> ObjectiveResult<()> {
        if !(config.meta_data_rate >= 0.0) || !config.meta_data_rate.is_finite() {
            return Err(ObjectiveError::InvalidMetaDataRate(config.meta_data_rate));
        }
        self.base.init(config)?;
        self.module_to_meta_collection.clear();
        self.meta_codelength = 0.0;
        self.num_meta_data_dimensions = config.num_meta_data_dimensions;
        self.meta_data_rate = config.meta_data_rate;
        self.weight_by_flow = config.weight_by_flow;
        Ok(())
    }

    fn init_network(
        &mut self,
        network: &mut Network<FlowData>,
        root: NodeId,
    ) -> ObjectiveResult<()> {
        self.base.init_network(network, root)?;
        self.init_meta_nodes(network, root)
    }

    fn init_super_network(
        &mut self,
        network: &mut Network<FlowData>,
        root: NodeId,
    ) -> ObjectiveResult<()> {
        self.base.init_super_network(network, root)
    }

    fn init_sub_network(
        &mut self,
        network: &mut Network<FlowData>,
        root: NodeId,
    ) -> ObjectiveResult<()> {
        self.base.init_sub_network(network, root)
    }

    fn init_partition(
        &mut self,
        network: &mut Network<FlowData>,
        active: &[NodeId],
    ) -> ObjectiveResult<()> {
        debug_assert!(self.base.phase >= Phase::NetworkInit, "partition before network init");
        self.init_partition_of_meta_nodes(network, active)?;
        self.base.calculate_codelength_terms(network, active);
        self.base.calculate_codelength_from_terms();

        self.meta_codelength = 0.0;
        for &id in active {
            self.meta_codelength += network[id].meta_collection.entropy();
        }
        self.meta_codelength *= self.meta_data_rate;

        self.base.phase = Phase::PartitionInit;
        log::debug!(
            "initialized partition over {} modules, codelength {:.9} (meta {:.9})",
            active.len(),
            self.codelength(),
            self.meta_codelength
        );
        Ok(())
    }

    fn calc_codelength(&self, network: &Network<FlowData>, parent: NodeId) -> f64 {
        let base = self.base.calc_codelength(network, parent);
        if network.is_leaf_module(parent) {
            base + self.meta_data_rate * network[parent].meta_collection.entropy()
        } else {
            base
        }
    }

    fn delta_codelength(
        &self,
        network: &Network<FlowData>,
        node: NodeId,
        old_delta: &DeltaFlow,
        new_delta: &DeltaFlow,
        module_flow: &PrimaryMap<Module, FlowData>,
        module_members: &SecondaryMap<Module, u32>,
    ) -> f64 {
        debug_assert!(self.base.phase >= Phase::PartitionInit, "move before partition init");
        let delta = self.base.delta_codelength(
            network,
            node,
            old_delta,
            new_delta,
            module_flow,
            module_members,
        );

        let node_bag = &network[node].meta_collection;
        let old_bag = self.module_bag(old_delta.module);
        let new_bag = self.module_bag(new_delta.module);
        let delta_meta = old_bag.entropy_without(node_bag) + new_bag.entropy_with(node_bag)
            - old_bag.entropy()
            - new_bag.entropy();

        delta + self.meta_data_rate * delta_meta
    }

    fn update_codelength(
        &mut self,
        network: &Network<FlowData>,
        node: NodeId,
        old_delta: &mut DeltaFlow,
        new_delta: &mut DeltaFlow,
        module_flow: &mut PrimaryMap<Module, FlowData>,
        module_members: &mut SecondaryMap<Module, u32>,
    ) {
        self.base.update_codelength(
            network,
            node,
            old_delta,
            new_delta,
            module_flow,
            module_members,
        );

        let node_bag = &network[node].meta_collection;
        let mut delta_meta =
            -self.module_bag(old_delta.module).entropy() - self.module_bag(new_delta.module).entropy();

        match self.module_to_meta_collection.get_mut(&old_delta.module) {
            Some(bag) => bag.remove_all(node_bag),
            None => panic!("meta bookkeeping out of sync: no collection for {}", old_delta.module),
        }
        self.module_to_meta_collection
            .entry(new_delta.module)
            .or_default()
            .add_all(node_bag);

        delta_meta +=
            self.module_bag(old_delta.module).entropy() + self.module_bag(new_delta.module).entropy();
        self.meta_codelength += self.meta_data_rate * delta_meta;
    }

    fn consolidate_modules(
        &mut self,
        network: &mut Network<FlowData>,
        modules: &SecondaryMap<Module, PackedOption<NodeId>>,
    ) {
        for (&module, bag) in &self.module_to_meta_collection {
            if let Some(target) = modules[module].expand() {
                network[target].meta_collection = bag.clone();
            }
        }
        self.base.phase = Phase::Consolidated;
    }

    fn codelength(&self) -> f64 {
        self.base.codelength + self.meta_codelength
    }

    fn index_codelength(&self) -> f64 {
        self.base.index_codelength
    }

    fn module_codelength(&self) -> f64 {
        self.base.module_codelength + self.meta_codelength
    }
}
