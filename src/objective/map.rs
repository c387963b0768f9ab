//! The standard two-level map equation over continuous flow.
//!
//! Six entropy-like sums are maintained incrementally across moves:
//!
//! ```text
//! node_flow_log_node_flow     sum plogp(n.flow) over leaves; constant per leaf set
//! flow_log_flow               sum plogp(m.flow + m.exit) over modules
//! exit_log_exit               sum plogp(m.exit) over modules
//! enter_log_enter             sum plogp(m.enter) over modules
//! enter_flow                  sum m.enter over modules, plus the root boundary
//! enter_flow_log_enter_flow   plogp of the line above
//! ```
//!
//! from which the codelengths derive:
//!
//! ```text
//! index_codelength  = enter_flow_log_enter_flow - enter_log_enter
//!                     - exit_network_flow_log_exit_network_flow
//! module_codelength = -exit_log_exit + flow_log_flow - node_flow_log_node_flow
//! codelength        = index_codelength + module_codelength
//! ```
//!
//! `delta_codelength` and `update_codelength` run the same four-term
//! expansion (subtract the two affected module contributions, re-add them
//! with the node's flow moved), so an applied move changes the stored
//! codelength by exactly the delta that was quoted for it, modulo float
//! summation order.

use crate::config::Config;
use crate::entities::{Module, NodeId};
use crate::error::ObjectiveResult;
use crate::flow::{DeltaFlow, FlowData};
use crate::infomath::plogp;
use crate::network::Network;
use crate::objective::{Objective, Phase};
use cranelift_entity::packed_option::PackedOption;
use cranelift_entity::{PrimaryMap, SecondaryMap};

/// Total module flow below this threshold counts as an empty module.
pub(crate) const MIN_MODULE_FLOW: f64 = 1e-16;

/// The base map-equation objective.
#[derive(Clone, Debug)]
pub struct MapEquation {
    pub(crate) phase: Phase,

    // Constant while the leaf network is the same.
    pub(crate) node_flow_log_node_flow: f64,
    // Module-indexed sums.
    pub(crate) flow_log_flow: f64,
    pub(crate) exit_log_exit: f64,
    pub(crate) enter_log_enter: f64,
    pub(crate) enter_flow: f64,
    pub(crate) enter_flow_log_enter_flow: f64,
    // Root boundary terms, for hierarchical networks.
    pub(crate) exit_network_flow: f64,
    pub(crate) exit_network_flow_log_exit_network_flow: f64,

    pub(crate) index_codelength: f64,
    pub(crate) module_codelength: f64,
    pub(crate) codelength: f64,
}

impl Default for MapEquation {
    fn default() -> Self {
        Self::new()
    }
}

impl MapEquation {
    /// An objective with no network attached.
    pub fn new() -> Self {
        Self {
            phase: Phase::Uninitialized,
            node_flow_log_node_flow: 0.0,
            flow_log_flow: 0.0,
            exit_log_exit: 0.0,
            enter_log_enter: 0.0,
            enter_flow: 0.0,
            enter_flow_log_enter_flow: 0.0,
            exit_network_flow: 0.0,
            exit_network_flow_log_exit_network_flow: 0.0,
            index_codelength: 0.0,
            module_codelength: 0.0,
            codelength: 0.0,
        }
    }

    /// Sum the module-indexed terms over the active modules and pick up the
    /// root boundary contribution.
    pub(crate) fn calculate_codelength_terms(
        &mut self,
        network: &Network<FlowData>,
        active: &[NodeId],
    ) {
        self.enter_log_enter = 0.0;
        self.flow_log_flow = 0.0;
        self.exit_log_exit = 0.0;
        self.enter_flow = 0.0;

        for &id in active {
            let data = &network[id].data;
            // Own module codebook.
            self.flow_log_flow += plogp(data.flow + data.exit_flow);
            // Use of the index codebook.
            self.enter_log_enter += plogp(data.enter_flow);
            self.exit_log_exit += plogp(data.exit_flow);
            self.enter_flow += data.enter_flow;
        }
        self.enter_flow += self.exit_network_flow;
        self.enter_flow_log_enter_flow = plogp(self.enter_flow);
    }

    /// Derive the three codelengths from the stored sums.
    pub(crate) fn calculate_codelength_from_terms(&mut self) {
        self.index_codelength = self.enter_flow_log_enter_flow
            - self.enter_log_enter
            - self.exit_network_flow_log_exit_network_flow;
        self.module_codelength =
            -self.exit_log_exit + self.flow_log_flow - self.node_flow_log_node_flow;
        self.codelength = self.index_codelength + self.module_codelength;
    }

    /// Within-module codebook entropy of a module of leaves.
    pub(crate) fn calc_codelength_on_module_of_leaf_nodes(
        &self,
        network: &Network<FlowData>,
        parent: NodeId,
    ) -> f64 {
        let parent_data = &network[parent].data;
        let total_flow = parent_data.flow + parent_data.exit_flow;
        if total_flow < MIN_MODULE_FLOW {
            return 0.0;
        }
        let mut index_length = 0.0;
        for &child in network.children(parent) {
            index_length -= plogp(network[child].data.flow / total_flow);
        }
        index_length -= plogp(parent_data.exit_flow / total_flow);
        index_length * total_flow
    }

    /// Codebook entropy of a module of modules, in expanded form to avoid a
    /// second pass for the normalization constant.
    ///
    /// With `q = parent exit` and `p_i = child enter`:
    /// `L = plogp(q + sum p_i) - sum plogp(p_i) - plogp(q)`.
    pub(crate) fn calc_codelength_on_module_of_modules(
        &self,
        network: &Network<FlowData>,
        parent: NodeId,
    ) -> f64 {
        let parent_data = &network[parent].data;
        if parent_data.flow < MIN_MODULE_FLOW {
            return 0.0;
        }
        let mut sum_enter = 0.0;
        let mut sum_enter_log_enter = 0.0;
        for &child in network.children(parent) {
            let enter = network[child].data.enter_flow;
            sum_enter += enter;
            sum_enter_log_enter += plogp(enter);
        }
        // The possibility of exiting the module adds to the codeword use.
        let total_codeword_use = sum_enter + parent_data.exit_flow;
        plogp(total_codeword_use) - sum_enter_log_enter - plogp(parent_data.exit_flow)
    }

    /// The four-term delta expansion shared with the memory objective.
    ///
    /// `delta_old`/`delta_new` are the combined boundary deltas
    /// `delta_enter + delta_exit` toward the old and new module.
    pub(crate) fn delta_codelength_terms(
        &self,
        node_data: &FlowData,
        old_module: Module,
        new_module: Module,
        delta_old: f64,
        delta_new: f64,
        module_flow: &PrimaryMap<Module, FlowData>,
    ) -> f64 {
        debug_assert_ne!(old_module, new_module, "move within the same module");
        let old = &module_flow[old_module];
        let new = &module_flow[new_module];

        let delta_enter = plogp(self.enter_flow + delta_old - delta_new)
            - self.enter_flow_log_enter_flow;

        let delta_enter_log_enter = -plogp(old.enter_flow) - plogp(new.enter_flow)
            + plogp(old.enter_flow - node_data.enter_flow + delta_old)
            + plogp(new.enter_flow + node_data.enter_flow - delta_new);

        let delta_exit_log_exit = -plogp(old.exit_flow) - plogp(new.exit_flow)
            + plogp(old.exit_flow - node_data.exit_flow + delta_old)
            + plogp(new.exit_flow + node_data.exit_flow - delta_new);

        let delta_flow_log_flow = -plogp(old.exit_flow + old.flow)
            - plogp(new.exit_flow + new.flow)
            + plogp(old.exit_flow + old.flow - node_data.exit_flow - node_data.flow + delta_old)
            + plogp(new.exit_flow + new.flow + node_data.exit_flow + node_data.flow - delta_new);

        delta_enter - delta_enter_log_enter - delta_exit_log_exit + delta_flow_log_flow
    }

    /// Apply a move to the stored sums and the module flow table: subtract
    /// the two affected module contributions, move the node's aggregate and
    /// the boundary deltas, re-add, and re-derive the codelengths.
    pub(crate) fn update_codelength_terms(
        &mut self,
        node_data: &FlowData,
        old_module: Module,
        new_module: Module,
        delta_old: f64,
        delta_new: f64,
        module_flow: &mut PrimaryMap<Module, FlowData>,
    ) {
        debug_assert_ne!(old_module, new_module, "move within the same module");

        self.enter_flow -=
            module_flow[old_module].enter_flow + module_flow[new_module].enter_flow;
        self.enter_log_enter -=
            plogp(module_flow[old_module].enter_flow) + plogp(module_flow[new_module].enter_flow);
        self.exit_log_exit -=
            plogp(module_flow[old_module].exit_flow) + plogp(module_flow[new_module].exit_flow);
        self.flow_log_flow -=
            plogp(module_flow[old_module].exit_flow + module_flow[old_module].flow)
                + plogp(module_flow[new_module].exit_flow + module_flow[new_module].flow);

        module_flow[old_module] -= *node_data;
        module_flow[new_module] += *node_data;

        module_flow[old_module].enter_flow += delta_old;
        module_flow[old_module].exit_flow += delta_old;
        module_flow[new_module].enter_flow -= delta_new;
        module_flow[new_module].exit_flow -= delta_new;

        self.enter_flow +=
            module_flow[old_module].enter_flow + module_flow[new_module].enter_flow;
        self.enter_log_enter +=
            plogp(module_flow[old_module].enter_flow) + plogp(module_flow[new_module].enter_flow);
        self.exit_log_exit +=
            plogp(module_flow[old_module].exit_flow) + plogp(module_flow[new_module].exit_flow);
        self.flow_log_flow +=
            plogp(module_flow[old_module].exit_flow + module_flow[old_module].flow)
                + plogp(module_flow[new_module].exit_flow + module_flow[new_module].flow);

        self.enter_flow_log_enter_flow = plogp(self.enter_flow);
        self.calculate_codelength_from_terms();
    }
}

impl Objective for MapEquation {
    type Flow = FlowData;
    type Delta = DeltaFlow;

    fn init(&mut self, _config: &Config) -> ObjectiveResult<()> {
        *self = Self::new();
        Ok(())
    }

    fn init_network(
        &mut self,
        network: &mut Network<FlowData>,
        root: NodeId,
    ) -> ObjectiveResult<()> {
        self.node_flow_log_node_flow = 0.0;
        for leaf in network.leaf_nodes(root) {
            self.node_flow_log_node_flow += plogp(network[leaf].data.flow);
        }
        self.init_sub_network(network, root)
    }

    fn init_super_network(
        &mut self,
        network: &mut Network<FlowData>,
        root: NodeId,
    ) -> ObjectiveResult<()> {
        self.node_flow_log_node_flow = 0.0;
        for &child in network.children(root) {
            self.node_flow_log_node_flow += plogp(network[child].data.enter_flow);
        }
        self.phase = Phase::NetworkInit;
        Ok(())
    }

    fn init_sub_network(
        &mut self,
        network: &mut Network<FlowData>,
        root: NodeId,
    ) -> ObjectiveResult<()> {
        self.exit_network_flow = network[root].data.exit_flow;
        self.exit_network_flow_log_exit_network_flow = plogp(self.exit_network_flow);
        self.phase = Phase::NetworkInit;
        Ok(())
    }

    fn init_partition(
        &mut self,
        network: &mut Network<FlowData>,
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

    fn calc_codelength(&self, network: &Network<FlowData>, parent: NodeId) -> f64 {
        if network.is_leaf_module(parent) {
            self.calc_codelength_on_module_of_leaf_nodes(network, parent)
        } else {
            self.calc_codelength_on_module_of_modules(network, parent)
        }
    }

    fn delta_codelength(
        &self,
        network: &Network<FlowData>,
        node: NodeId,
        old_delta: &DeltaFlow,
        new_delta: &DeltaFlow,
        module_flow: &PrimaryMap<Module, FlowData>,
        _module_members: &SecondaryMap<Module, u32>,
    ) -> f64 {
        debug_assert!(self.phase >= Phase::PartitionInit, "move before partition init");
        self.delta_codelength_terms(
            &network[node].data,
            old_delta.module,
            new_delta.module,
            old_delta.delta_enter + old_delta.delta_exit,
            new_delta.delta_enter + new_delta.delta_exit,
            module_flow,
        )
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
        debug_assert!(self.phase >= Phase::PartitionInit, "move before partition init");
        self.update_codelength_terms(
            &network[node].data,
            old_delta.module,
            new_delta.module,
            old_delta.delta_enter + old_delta.delta_exit,
            new_delta.delta_enter + new_delta.delta_exit,
            module_flow,
        );
        module_members[old_delta.module] -= 1;
        module_members[new_delta.module] += 1;
        self.phase = Phase::Optimizing;
    }

    fn consolidate_modules(
        &mut self,
        _network: &mut Network<FlowData>,
        _modules: &SecondaryMap<Module, PackedOption<NodeId>>,
    ) {
        // No auxiliary per-module state beyond the flow table the driver owns.
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
