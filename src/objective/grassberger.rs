//! The integer-flow map equation, normalized by total degree.
//!
//! Flow here is raw degree counts from an undirected network, so enter and
//! exit collapse into one combined boundary degree and every entropy term
//! goes through [`plogp_n`] with the network's total degree as the
//! normalizer. Module aggregates are maintained in exact integer arithmetic;
//! floating point only enters at entropy evaluation, which keeps incremental
//! maintenance free of drift in the aggregates themselves.

use crate::config::Config;
use crate::entities::{Module, NodeId};
use crate::error::ObjectiveResult;
use crate::flow::{DeltaFlowInt, FlowDataInt};
use crate::infomath::{plogp, plogp_n};
use crate::network::Network;
use crate::objective::{Objective, Phase};
use cranelift_entity::packed_option::PackedOption;
use cranelift_entity::{PrimaryMap, SecondaryMap};

/// The degree-normalized map-equation objective.
#[derive(Clone, Debug)]
pub struct GrassbergerMapEquation {
    phase: Phase,

    /// Sum of leaf degrees, cached at `init_network`. The normalizer for
    /// every entropy term, unchanged when climbing to super levels.
    total_degree: u64,

    node_flow_log_node_flow: f64,
    flow_log_flow: f64,
    exit_log_exit: f64,
    enter_log_enter: f64,
    enter_flow: u64,
    enter_flow_log_enter_flow: f64,
    exit_network_flow: u64,
    exit_network_flow_log_exit_network_flow: f64,

    index_codelength: f64,
    module_codelength: f64,
    codelength: f64,
}

impl Default for GrassbergerMapEquation {
    fn default() -> Self {
        Self::new()
    }
}

impl GrassbergerMapEquation {
    /// An objective with no network attached.
    pub fn new() -> Self {
        Self {
            phase: Phase::Uninitialized,
            total_degree: 0,
            node_flow_log_node_flow: 0.0,
            flow_log_flow: 0.0,
            exit_log_exit: 0.0,
            enter_log_enter: 0.0,
            enter_flow: 0,
            enter_flow_log_enter_flow: 0.0,
            exit_network_flow: 0,
            exit_network_flow_log_exit_network_flow: 0.0,
            index_codelength: 0.0,
            module_codelength: 0.0,
            codelength: 0.0,
        }
    }

    /// The cached total degree of the leaf layer.
    pub fn total_degree(&self) -> u64 {
        self.total_degree
    }

    /// Degree-normalized `plogp` on a possibly signed intermediate sum.
    fn plogp_deg(&self, degree: i64) -> f64 {
        debug_assert!(degree >= 0, "negative degree sum {degree}");
        if degree > 0 {
            plogp_n(degree as u64, self.total_degree)
        } else {
            0.0
        }
    }

    fn calculate_codelength_terms(&mut self, network: &Network<FlowDataInt>, active: &[NodeId]) {
        self.enter_log_enter = 0.0;
        self.flow_log_flow = 0.0;
        self.exit_log_exit = 0.0;
        self.enter_flow = 0;

        for &id in active {
            let data = &network[id].data;
            self.flow_log_flow += self.plogp_deg((data.flow + data.enter_exit_flow) as i64);
            // One boundary degree serves both codebook roles.
            let boundary = self.plogp_deg(data.enter_exit_flow as i64);
            self.enter_log_enter += boundary;
            self.exit_log_exit += boundary;
            self.enter_flow += data.enter_exit_flow;
        }
        self.enter_flow += self.exit_network_flow;
        self.enter_flow_log_enter_flow = self.plogp_deg(self.enter_flow as i64);
    }

    fn calculate_codelength_from_terms(&mut self) {
        self.index_codelength = self.enter_flow_log_enter_flow
            - self.enter_log_enter
            - self.exit_network_flow_log_exit_network_flow;
        self.module_codelength =
            -self.exit_log_exit + self.flow_log_flow - self.node_flow_log_node_flow;
        self.codelength = self.index_codelength + self.module_codelength;
    }

    fn calc_codelength_on_module_of_leaf_nodes(
        &self,
        network: &Network<FlowDataInt>,
        parent: NodeId,
    ) -> f64 {
        let parent_data = &network[parent].data;
        let total = parent_data.flow + parent_data.enter_exit_flow;
        if total == 0 {
            return 0.0;
        }
        let total = total as f64;
        let mut index_length = 0.0;
        for &child in network.children(parent) {
            index_length -= plogp(network[child].data.flow as f64 / total);
        }
        index_length -= plogp(parent_data.enter_exit_flow as f64 / total);
        index_length * total / self.total_degree as f64
    }

    fn calc_codelength_on_module_of_modules(
        &self,
        network: &Network<FlowDataInt>,
        parent: NodeId,
    ) -> f64 {
        let parent_data = &network[parent].data;
        if parent_data.flow == 0 {
            return 0.0;
        }
        let mut sum_enter: u64 = 0;
        let mut sum_enter_log_enter = 0.0;
        for &child in network.children(parent) {
            let boundary = network[child].data.enter_exit_flow;
            sum_enter += boundary;
            sum_enter_log_enter += self.plogp_deg(boundary as i64);
        }
        let total_codeword_use = sum_enter + parent_data.enter_exit_flow;
        self.plogp_deg(total_codeword_use as i64)
            - sum_enter_log_enter
            - self.plogp_deg(parent_data.enter_exit_flow as i64)
    }
}

impl Objective for GrassbergerMapEquation {
    type Flow = FlowDataInt;
    type Delta = DeltaFlowInt;

    fn init(&mut self, _config: &Config) -> ObjectiveResult<()> {
        *self = Self::new();
        Ok(())
    }

    fn init_network(
        &mut self,
        network: &mut Network<FlowDataInt>,
        root: NodeId,
    ) -> ObjectiveResult<()> {
        self.total_degree = 0;
        for leaf in network.leaf_nodes(root) {
            self.total_degree += network[leaf].data.flow;
        }
        self.node_flow_log_node_flow = 0.0;
        for leaf in network.leaf_nodes(root) {
            self.node_flow_log_node_flow += self.plogp_deg(network[leaf].data.flow as i64);
        }
        log::debug!("total degree {}", self.total_degree);
        self.init_sub_network(network, root)
    }

    fn init_super_network(
        &mut self,
        network: &mut Network<FlowDataInt>,
        root: NodeId,
    ) -> ObjectiveResult<()> {
        self.node_flow_log_node_flow = 0.0;
        for &child in network.children(root) {
            self.node_flow_log_node_flow +=
                self.plogp_deg(network[child].data.enter_exit_flow as i64);
        }
        self.phase = Phase::NetworkInit;
        Ok(())
    }

    fn init_sub_network(
        &mut self,
        network: &mut Network<FlowDataInt>,
        root: NodeId,
    ) -> ObjectiveResult<()> {
        self.exit_network_flow = network[root].data.enter_exit_flow;
        self.exit_network_flow_log_exit_network_flow =
            self.plogp_deg(self.exit_network_flow as i64);
        self.phase = Phase::NetworkInit;
        Ok(())
    }

    fn init_partition(
        &mut self,
        network: &mut Network<FlowDataInt>,
        active: &[NodeId],
    ) -> ObjectiveResult<()> {
        debug_assert!(self.phase >= Phase::NetworkInit, "partition before network init");
        self.calculate_codelength_terms(network, active);
        self.calculate_codelength_from_terms();
        self.phase = Phase::PartitionInit;
        log::debug!(
            "initialized partition over {} modules, codelength {:.9}",
            active.len(),
            self.codelength
        );
        Ok(())
    }

    fn calc_codelength(&self, network: &Network<FlowDataInt>, parent: NodeId) -> f64 {
        if network.is_leaf_module(parent) {
            self.calc_codelength_on_module_of_leaf_nodes(network, parent)
        } else {
            self.calc_codelength_on_module_of_modules(network, parent)
        }
    }

    fn delta_codelength(
        &self,
        network: &Network<FlowDataInt>,
        node: NodeId,
        old_delta: &DeltaFlowInt,
        new_delta: &DeltaFlowInt,
        module_flow: &PrimaryMap<Module, FlowDataInt>,
        _module_members: &SecondaryMap<Module, u32>,
    ) -> f64 {
        debug_assert!(self.phase >= Phase::PartitionInit, "move before partition init");
        debug_assert_ne!(old_delta.module, new_delta.module, "move within the same module");
        let node_data = &network[node].data;
        let old = &module_flow[old_delta.module];
        let new = &module_flow[new_delta.module];
        let delta_old = old_delta.delta_enter_exit;
        let delta_new = new_delta.delta_enter_exit;

        let delta_enter = self.plogp_deg(self.enter_flow as i64 + delta_old - delta_new)
            - self.enter_flow_log_enter_flow;

        // Enter and exit share the combined boundary degree, so their two
        // adjustment terms coincide.
        let delta_boundary_log_boundary = -self.plogp_deg(old.enter_exit_flow as i64)
            - self.plogp_deg(new.enter_exit_flow as i64)
            + self.plogp_deg(
                old.enter_exit_flow as i64 - node_data.enter_exit_flow as i64 + delta_old,
            )
            + self.plogp_deg(
                new.enter_exit_flow as i64 + node_data.enter_exit_flow as i64 - delta_new,
            );

        let delta_flow_log_flow = -self.plogp_deg((old.enter_exit_flow + old.flow) as i64)
            - self.plogp_deg((new.enter_exit_flow + new.flow) as i64)
            + self.plogp_deg(
                (old.enter_exit_flow + old.flow) as i64
                    - (node_data.enter_exit_flow + node_data.flow) as i64
                    + delta_old,
            )
            + self.plogp_deg(
                (new.enter_exit_flow + new.flow) as i64
                    + (node_data.enter_exit_flow + node_data.flow) as i64
                    - delta_new,
            );

        delta_enter - 2.0 * delta_boundary_log_boundary + delta_flow_log_flow
    }

    fn update_codelength(
        &mut self,
        network: &Network<FlowDataInt>,
        node: NodeId,
        old_delta: &mut DeltaFlowInt,
        new_delta: &mut DeltaFlowInt,
        module_flow: &mut PrimaryMap<Module, FlowDataInt>,
        module_members: &mut SecondaryMap<Module, u32>,
    ) {
        debug_assert!(self.phase >= Phase::PartitionInit, "move before partition init");
        let old_module = old_delta.module;
        let new_module = new_delta.module;
        debug_assert_ne!(old_module, new_module, "move within the same module");
        let node_data = network[node].data;
        let delta_old = old_delta.delta_enter_exit;
        let delta_new = new_delta.delta_enter_exit;

        self.enter_flow -=
            module_flow[old_module].enter_exit_flow + module_flow[new_module].enter_exit_flow;
        let removed_boundary = self.plogp_deg(module_flow[old_module].enter_exit_flow as i64)
            + self.plogp_deg(module_flow[new_module].enter_exit_flow as i64);
        self.enter_log_enter -= removed_boundary;
        self.exit_log_exit -= removed_boundary;
        self.flow_log_flow -= self
            .plogp_deg((module_flow[old_module].enter_exit_flow + module_flow[old_module].flow) as i64)
            + self.plogp_deg(
                (module_flow[new_module].enter_exit_flow + module_flow[new_module].flow) as i64,
            );

        // Each boundary delta applies exactly once to the combined field.
        // The intermediate sums are signed: a node's boundary degree can
        // exceed the module's before the internalized edges are credited
        // back.
        let old_boundary = module_flow[old_module].enter_exit_flow as i64
            - node_data.enter_exit_flow as i64
            + delta_old;
        let new_boundary = module_flow[new_module].enter_exit_flow as i64
            + node_data.enter_exit_flow as i64
            - delta_new;
        debug_assert!(old_boundary >= 0 && new_boundary >= 0, "boundary degree underflow");
        module_flow[old_module].flow -= node_data.flow;
        module_flow[new_module].flow += node_data.flow;
        module_flow[old_module].enter_exit_flow = old_boundary as u64;
        module_flow[new_module].enter_exit_flow = new_boundary as u64;

        self.enter_flow +=
            module_flow[old_module].enter_exit_flow + module_flow[new_module].enter_exit_flow;
        let added_boundary = self.plogp_deg(module_flow[old_module].enter_exit_flow as i64)
            + self.plogp_deg(module_flow[new_module].enter_exit_flow as i64);
        self.enter_log_enter += added_boundary;
        self.exit_log_exit += added_boundary;
        self.flow_log_flow += self
            .plogp_deg((module_flow[old_module].enter_exit_flow + module_flow[old_module].flow) as i64)
            + self.plogp_deg(
                (module_flow[new_module].enter_exit_flow + module_flow[new_module].flow) as i64,
            );

        self.enter_flow_log_enter_flow = self.plogp_deg(self.enter_flow as i64);
        self.calculate_codelength_from_terms();

        module_members[old_module] -= 1;
        module_members[new_module] += 1;
        self.phase = Phase::Optimizing;
    }

    fn consolidate_modules(
        &mut self,
        _network: &mut Network<FlowDataInt>,
        _modules: &SecondaryMap<Module, PackedOption<NodeId>>,
    ) {
        self.phase = Phase::Consolidated;
    }

    fn codelength(&self) -> f64 {
        self.codelength
    }

    fn index_codelength(&self) -> f64 {
        self.index_codelength
    }

    fn module_codelength(&self) -> f64 {
        self.module_codelength
    }
}
