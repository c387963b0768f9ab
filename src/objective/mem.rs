//! The memory (higher-order) map equation.
//!
//! In a higher-order network one physical node is represented by several
//! state nodes, and a module codebook encodes physical identities: the
//! within-module entropy runs over the module's physical contributions, not
//! its state nodes. The objective extends the base equation with one data
//! structure (per physical node, the modules it currently contributes to and
//! how much) and folds the resulting correction into the
//! `node_flow_log_node_flow` term on every move.
//!
//! The per-physical overlap scan is the expensive part of a move, so the
//! driver can amortize it: `add_memory_contributions` fills the overlap sums
//! into the delta records of every module the node shares physical nodes
//! with, before any `delta_codelength` query. If the driver skips that step,
//! `update_codelength` performs the same scan in place.

use crate::config::Config;
use crate::entities::{Module, NodeId, PhysNode};
use crate::error::ObjectiveResult;
use crate::flow::{DeltaFlowMap, FlowData, MemDeltaFlow, ModuleDelta};
use crate::infomath::plogp;
use crate::network::{Network, PhysData};
use crate::objective::{MapEquation, Objective, Phase};
use cranelift_entity::packed_option::PackedOption;
use cranelift_entity::{EntityRef, PrimaryMap, SecondaryMap};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::hash_map::Entry;

use super::map::MIN_MODULE_FLOW;

/// The state nodes of one physical node currently assigned to one module.
#[derive(Clone, Copy, Debug, PartialEq)]
struct MemNodeSet {
    /// Number of state nodes; the entry is erased when this reaches zero.
    num_mem_nodes: u32,
    /// Their summed flow contribution.
    sum_flow: f64,
}

/// The memory map-equation objective.
#[derive(Clone, Debug, Default)]
pub struct MemMapEquation {
    base: MapEquation,

    /// For each physical node, the modules it contributes to.
    phys_to_module_to_mem_nodes: Vec<FxHashMap<Module, MemNodeSet>>,
    num_physical_nodes: usize,
    /// Whether the driver amortized the overlap scan for the move being
    /// applied. Reset at every partition init.
    memory_contributions_added: bool,
}

impl MemMapEquation {
    /// An objective with no network attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct physical nodes after dense re-indexing.
    pub fn num_physical_nodes(&self) -> usize {
        self.num_physical_nodes
    }

    /// The tracked `(state-node count, summed flow)` of `phys` inside
    /// `module`, if any state node contributes.
    pub fn mem_node_set(&self, phys: PhysNode, module: Module) -> Option<(u32, f64)> {
        self.phys_to_module_to_mem_nodes
            .get(phys.index())?
            .get(&module)
            .map(|set| (set.num_mem_nodes, set.sum_flow))
    }

    /// Total tracked flow of `phys` across all modules.
    pub fn physical_flow_total(&self, phys: PhysNode) -> f64 {
        self.phys_to_module_to_mem_nodes
            .get(phys.index())
            .map_or(0.0, |map| map.values().map(|set| set.sum_flow).sum())
    }

    /// Seed or re-index the physical-contribution lists of the leaves below
    /// `root`.
    ///
    /// On first contact every leaf gets a single contribution to its own
    /// physical node, carrying the leaf's flow. On later levels the lists
    /// already exist (written by consolidation) and only need dense local
    /// ids.
    fn init_physical_nodes(&mut self, network: &mut Network<FlowData>, root: NodeId) {
        let leaves: Vec<NodeId> = network.leaf_nodes(root).collect();
        let not_initiated = leaves
            .first()
            .map_or(true, |&leaf| network[leaf].physical_nodes.is_empty());

        if not_initiated {
            let mut phys_ids: Vec<u32> = leaves.iter().map(|&l| network[l].phys_id).collect();
            phys_ids.sort_unstable();
            phys_ids.dedup();
            self.num_physical_nodes = phys_ids.len();

            for &leaf in &leaves {
                let dense = phys_ids.binary_search(&network[leaf].phys_id).unwrap();
                let flow = network[leaf].data.flow;
                let node = &mut network[leaf];
                node.physical_nodes.clear();
                node.physical_nodes.push(PhysData::new(PhysNode::new(dense), flow));
            }
        } else {
            let mut seen: Vec<u32> = leaves
                .iter()
                .flat_map(|&l| network[l].physical_nodes.iter().map(|pd| pd.phys.index() as u32))
                .collect();
            seen.sort_unstable();
            seen.dedup();
            self.num_physical_nodes = seen.len();

            for &leaf in &leaves {
                for pd in &mut network[leaf].physical_nodes {
                    let dense = seen.binary_search(&(pd.phys.index() as u32)).unwrap();
                    pd.phys = PhysNode::new(dense);
                }
            }
        }
        log::debug!("{} physical nodes over {} state nodes", self.num_physical_nodes, leaves.len());
    }

    /// Rebuild the physical-to-module tracking for a fresh partition, in
    /// which every active node occupies its own module. Two state nodes of
    /// one physical node can still share a module when the active nodes are
    /// consolidated modules, so entries merge.
    fn init_partition_of_physical_nodes(&mut self, network: &Network<FlowData>, active: &[NodeId]) {
        self.phys_to_module_to_mem_nodes.clear();
        self.phys_to_module_to_mem_nodes
            .resize(self.num_physical_nodes, FxHashMap::default());

        for &id in active {
            let module = network[id].module;
            for pd in &network[id].physical_nodes {
                self.phys_to_module_to_mem_nodes[pd.phys.index()]
                    .entry(module)
                    .and_modify(|set| {
                        set.num_mem_nodes += 1;
                        set.sum_flow += pd.sum_flow;
                    })
                    .or_insert(MemNodeSet {
                        num_mem_nodes: 1,
                        sum_flow: pd.sum_flow,
                    });
            }
        }
        self.memory_contributions_added = false;
    }

    /// `node_flow_log_node_flow` over physical contributions instead of
    /// state-node flows.
    fn calculate_node_flow_for_memory_network(&mut self) {
        let mut sum = 0.0;
        for module_map in &self.phys_to_module_to_mem_nodes {
            for set in module_map.values() {
                sum += plogp(set.sum_flow);
            }
        }
        self.base.node_flow_log_node_flow = sum;
    }

    /// Move `node`'s physical contributions from `old_module` to
    /// `new_module` in the tracking maps.
    fn update_physical_nodes(
        &mut self,
        network: &Network<FlowData>,
        node: NodeId,
        old_module: Module,
        new_module: Module,
    ) {
        for pd in &network[node].physical_nodes {
            let module_map = &mut self.phys_to_module_to_mem_nodes[pd.phys.index()];

            let emptied = match module_map.get_mut(&old_module) {
                Some(set) => {
                    set.sum_flow -= pd.sum_flow;
                    set.num_mem_nodes -= 1;
                    set.num_mem_nodes == 0
                }
                None => panic!(
                    "physical-node bookkeeping out of sync: {} has no entry for {old_module}",
                    pd.phys
                ),
            };
            if emptied {
                module_map.remove(&old_module);
            }

            module_map
                .entry(new_module)
                .and_modify(|set| {
                    set.num_mem_nodes += 1;
                    set.sum_flow += pd.sum_flow;
                })
                .or_insert(MemNodeSet {
                    num_mem_nodes: 1,
                    sum_flow: pd.sum_flow,
                });
        }
    }

    /// The in-place variant of the overlap scan, for drivers that skipped
    /// [`add_memory_contributions`](Objective::add_memory_contributions):
    /// accumulate the node-flow correction for the two involved modules
    /// directly into the delta records while applying the move to the maps.
    fn add_memory_contributions_and_update_physical_nodes(
        &mut self,
        network: &Network<FlowData>,
        node: NodeId,
        old_delta: &mut MemDeltaFlow,
        new_delta: &mut MemDeltaFlow,
    ) {
        let old_module = old_delta.module;
        let new_module = new_delta.module;

        for pd in &network[node].physical_nodes {
            let module_map = &mut self.phys_to_module_to_mem_nodes[pd.phys.index()];

            let emptied = match module_map.get_mut(&old_module) {
                Some(set) => {
                    let old_phys_flow = set.sum_flow;
                    let new_phys_flow = set.sum_flow - pd.sum_flow;
                    old_delta.sum_delta_plogp_phys_flow +=
                        plogp(new_phys_flow) - plogp(old_phys_flow);
                    old_delta.sum_plogp_phys_flow += plogp(pd.sum_flow);
                    set.sum_flow -= pd.sum_flow;
                    set.num_mem_nodes -= 1;
                    set.num_mem_nodes == 0
                }
                None => panic!(
                    "physical-node bookkeeping out of sync: {} has no entry for {old_module}",
                    pd.phys
                ),
            };
            if emptied {
                module_map.remove(&old_module);
            }

            match module_map.entry(new_module) {
                Entry::Occupied(mut entry) => {
                    let set = entry.get_mut();
                    let old_phys_flow = set.sum_flow;
                    let new_phys_flow = set.sum_flow + pd.sum_flow;
                    new_delta.sum_delta_plogp_phys_flow +=
                        plogp(new_phys_flow) - plogp(old_phys_flow);
                    new_delta.sum_plogp_phys_flow += plogp(pd.sum_flow);
                    set.num_mem_nodes += 1;
                    set.sum_flow += pd.sum_flow;
                }
                Entry::Vacant(entry) => {
                    new_delta.sum_delta_plogp_phys_flow += plogp(pd.sum_flow);
                    new_delta.sum_plogp_phys_flow += plogp(pd.sum_flow);
                    entry.insert(MemNodeSet {
                        num_mem_nodes: 1,
                        sum_flow: pd.sum_flow,
                    });
                }
            }
        }
    }

    fn calc_codelength_on_module_of_physical_nodes(
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
        for pd in &network[parent].physical_nodes {
            index_length -= plogp(pd.sum_flow / total_flow);
        }
        index_length -= plogp(parent_data.exit_flow / total_flow);
        index_length * total_flow
    }
}

impl Objective for MemMapEquation {
    type Flow = FlowData;
    type Delta = MemDeltaFlow;

    fn init(&mut self, config: &Config) -> ObjectiveResult<()> {
        self.base.init(config)?;
        self.phys_to_module_to_mem_nodes.clear();
        self.num_physical_nodes = 0;
        self.memory_contributions_added = false;
        Ok(())
    }

    fn init_network(
        &mut self,
        network: &mut Network<FlowData>,
        root: NodeId,
    ) -> ObjectiveResult<()> {
        self.base.init_network(network, root)?;
        self.init_physical_nodes(network, root);
        Ok(())
    }

    fn init_super_network(
        &mut self,
        network: &mut Network<FlowData>,
        root: NodeId,
    ) -> ObjectiveResult<()> {
        self.base.init_super_network(network, root)?;
        // Consolidation wrote physical contributions onto the new base
        // nodes; give them dense local ids. The partition pass then rebuilds
        // the node-flow term from the physical sums.
        self.init_physical_nodes(network, root);
        Ok(())
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
        self.init_partition_of_physical_nodes(network, active);
        self.base.calculate_codelength_terms(network, active);
        self.calculate_node_flow_for_memory_network();
        self.base.calculate_codelength_from_terms();
        self.base.phase = Phase::PartitionInit;
        log::debug!(
            "initialized partition over {} modules, codelength {:.9}",
            active.len(),
            self.base.codelength
        );
        Ok(())
    }

    fn calc_codelength(&self, network: &Network<FlowData>, parent: NodeId) -> f64 {
        if network.is_leaf_module(parent) {
            if network[parent].physical_nodes.is_empty() {
                self.base.calc_codelength_on_module_of_leaf_nodes(network, parent)
            } else {
                self.calc_codelength_on_module_of_physical_nodes(network, parent)
            }
        } else {
            self.base.calc_codelength_on_module_of_modules(network, parent)
        }
    }

    fn add_memory_contributions(
        &mut self,
        network: &Network<FlowData>,
        node: NodeId,
        old_delta: &mut MemDeltaFlow,
        module_deltas: &mut DeltaFlowMap<MemDeltaFlow>,
    ) {
        let current_module = network[node].module;
        for pd in &network[node].physical_nodes {
            for (&module, set) in &self.phys_to_module_to_mem_nodes[pd.phys.index()] {
                if module == current_module {
                    // The side the node leaves from.
                    let old_phys_flow = set.sum_flow;
                    let new_phys_flow = set.sum_flow - pd.sum_flow;
                    old_delta.sum_delta_plogp_phys_flow +=
                        plogp(new_phys_flow) - plogp(old_phys_flow);
                    old_delta.sum_plogp_phys_flow += plogp(pd.sum_flow);
                } else {
                    // Any module the node could join that already holds this
                    // physical node.
                    let old_phys_flow = set.sum_flow;
                    let new_phys_flow = set.sum_flow + pd.sum_flow;
                    let mut delta = MemDeltaFlow::new(module);
                    delta.sum_delta_plogp_phys_flow = plogp(new_phys_flow) - plogp(old_phys_flow);
                    delta.sum_plogp_phys_flow = plogp(pd.sum_flow);
                    module_deltas.add(delta);
                }
            }
        }
        self.memory_contributions_added = true;
    }

    fn delta_codelength(
        &self,
        network: &Network<FlowData>,
        node: NodeId,
        old_delta: &MemDeltaFlow,
        new_delta: &MemDeltaFlow,
        module_flow: &PrimaryMap<Module, FlowData>,
        _module_members: &SecondaryMap<Module, u32>,
    ) -> f64 {
        debug_assert!(self.base.phase >= Phase::PartitionInit, "move before partition init");
        let delta = self.base.delta_codelength_terms(
            &network[node].data,
            old_delta.module,
            new_delta.module,
            old_delta.delta_enter + old_delta.delta_exit,
            new_delta.delta_enter + new_delta.delta_exit,
            module_flow,
        );
        let delta_node_flow = old_delta.sum_delta_plogp_phys_flow
            + new_delta.sum_delta_plogp_phys_flow
            + old_delta.sum_plogp_phys_flow
            - new_delta.sum_plogp_phys_flow;
        delta - delta_node_flow
    }

    fn update_codelength(
        &mut self,
        network: &Network<FlowData>,
        node: NodeId,
        old_delta: &mut MemDeltaFlow,
        new_delta: &mut MemDeltaFlow,
        module_flow: &mut PrimaryMap<Module, FlowData>,
        module_members: &mut SecondaryMap<Module, u32>,
    ) {
        debug_assert!(self.base.phase >= Phase::PartitionInit, "move before partition init");
        self.base.update_codelength_terms(
            &network[node].data,
            old_delta.module,
            new_delta.module,
            old_delta.delta_enter + old_delta.delta_exit,
            new_delta.delta_enter + new_delta.delta_exit,
            module_flow,
        );

        if self.memory_contributions_added {
            self.update_physical_nodes(network, node, old_delta.module, new_delta.module);
        } else {
            self.add_memory_contributions_and_update_physical_nodes(
                network, node, old_delta, new_delta,
            );
        }

        let delta_node_flow = old_delta.sum_delta_plogp_phys_flow
            + new_delta.sum_delta_plogp_phys_flow
            + old_delta.sum_plogp_phys_flow
            - new_delta.sum_plogp_phys_flow;
        self.base.node_flow_log_node_flow += delta_node_flow;
        self.base.module_codelength -= delta_node_flow;
        self.base.codelength -= delta_node_flow;

        module_members[old_delta.module] -= 1;
        module_members[new_delta.module] += 1;
        self.base.phase = Phase::Optimizing;
    }

    fn consolidate_modules(
        &mut self,
        network: &mut Network<FlowData>,
        modules: &SecondaryMap<Module, PackedOption<NodeId>>,
    ) {
        let mut seen: FxHashSet<(Module, usize)> = FxHashSet::default();
        for (phys, module_map) in self.phys_to_module_to_mem_nodes.iter().enumerate() {
            for (&module, set) in module_map {
                if !seen.insert((module, phys)) {
                    panic!("duplicated physical node phys{phys} in {module} during consolidation");
                }
                match modules[module].expand() {
                    Some(target) => network[target]
                        .physical_nodes
                        .push(PhysData::new(PhysNode::new(phys), set.sum_flow)),
                    None => panic!("consolidating {module} which has no tree node"),
                }
            }
        }
        self.base.phase = Phase::Consolidated;
    }

    fn codelength(&self) -> f64 {
        self.base.codelength
    }

    fn index_codelength(&self) -> f64 {
        self.base.index_codelength
    }

    fn module_codelength(&self) -> f64 {
        self.base.module_codelength
    }

    fn have_memory(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infomath::is_approx_eq;
    use crate::objective::seed_module_tables;

    /// Two state nodes of physical node 7, flow 0.1 each, in separate
    /// modules, plus an ordinary node with its own physical id.
    fn overlap_network() -> (Network<FlowData>, Vec<NodeId>) {
        let mut net = Network::new(FlowData::with_boundary(1.0, 0.0, 0.0));
        let root = net.root();
        let s1 = net.add_state_node(root, FlowData::new(0.1), 7);
        let s2 = net.add_state_node(root, FlowData::new(0.1), 7);
        let u = net.add_state_node(root, FlowData::new(0.8), 3);
        (net, vec![s1, s2, u])
    }

    fn init_overlap() -> (MemMapEquation, Network<FlowData>, Vec<NodeId>) {
        let (mut net, active) = overlap_network();
        net.set_active_modules(&active);
        let mut eq = MemMapEquation::new();
        eq.init(&Config::default()).unwrap();
        let root = net.root();
        eq.init_network(&mut net, root).unwrap();
        eq.init_partition(&mut net, &active).unwrap();
        (eq, net, active)
    }

    #[test]
    fn physical_ids_reindex_densely() {
        let (eq, net, active) = init_overlap();
        assert_eq!(eq.num_physical_nodes(), 2);
        // Sorted external ids {3, 7} map to dense {0, 1}.
        assert_eq!(net[active[0]].physical_nodes[0].phys, PhysNode::new(1));
        assert_eq!(net[active[2]].physical_nodes[0].phys, PhysNode::new(0));
    }

    #[test]
    fn node_flow_term_counts_physical_contributions() {
        let (eq, _net, _active) = init_overlap();
        let expected = plogp(0.1) + plogp(0.1) + plogp(0.8);
        assert!(is_approx_eq(eq.base.node_flow_log_node_flow, expected, 1e-15));
    }

    /// Move s2 into s1's module via the amortized path and return the
    /// engine plus the delta the move quoted and its codelength before.
    fn merge_overlap_modules(
        eq: &mut MemMapEquation,
        net: &Network<FlowData>,
        active: &[NodeId],
    ) -> (f64, f64) {
        let (mut module_flow, mut members) = seed_module_tables(net, active);
        let s2 = active[1];

        let mut old_delta = MemDeltaFlow::new(Module::new(1));
        let mut module_deltas = DeltaFlowMap::new();
        module_deltas.start_round();
        eq.add_memory_contributions(net, s2, &mut old_delta, &mut module_deltas);

        let mut new_delta = *module_deltas.get(Module::new(0)).expect("overlap with module 0");
        let before = eq.codelength();
        let quoted = eq.delta_codelength(net, s2, &old_delta, &new_delta, &module_flow, &members);
        eq.update_codelength(
            net,
            s2,
            &mut old_delta,
            &mut new_delta,
            &mut module_flow,
            &mut members,
        );
        (before, quoted)
    }

    #[test]
    fn merging_overlapping_state_nodes() {
        let (mut eq, net, active) = init_overlap();
        let node_flow_before = eq.base.node_flow_log_node_flow;
        let (before, quoted) = merge_overlap_modules(&mut eq, &net, &active);

        // Physical node 7 (dense id 1) now has both state nodes in module 0.
        assert_eq!(eq.mem_node_set(PhysNode::new(1), Module::new(0)), Some((2, 0.2)));
        assert_eq!(eq.mem_node_set(PhysNode::new(1), Module::new(1)), None);

        let expected_delta = plogp(0.2) - 2.0 * plogp(0.1);
        assert!(is_approx_eq(
            eq.base.node_flow_log_node_flow - node_flow_before,
            expected_delta,
            1e-12
        ));
        assert!(is_approx_eq(eq.codelength() - before, quoted, 1e-10));
    }

    #[test]
    fn amortized_and_in_place_paths_agree() {
        let (mut amortized, net, active) = init_overlap();
        merge_overlap_modules(&mut amortized, &net, &active);

        let (mut in_place, net2, active2) = init_overlap();
        let (mut module_flow, mut members) = seed_module_tables(&net2, &active2);
        let s2 = active2[1];
        let mut old_delta = MemDeltaFlow::new(Module::new(1));
        let mut new_delta = MemDeltaFlow::new(Module::new(0));
        in_place.update_codelength(
            &net2,
            s2,
            &mut old_delta,
            &mut new_delta,
            &mut module_flow,
            &mut members,
        );

        assert!(is_approx_eq(amortized.codelength(), in_place.codelength(), 1e-12));
        assert_eq!(
            amortized.mem_node_set(PhysNode::new(1), Module::new(0)),
            in_place.mem_node_set(PhysNode::new(1), Module::new(0))
        );
    }

    #[test]
    fn physical_flow_is_conserved_across_moves() {
        let (mut eq, net, active) = init_overlap();
        let total_before = eq.physical_flow_total(PhysNode::new(1));
        merge_overlap_modules(&mut eq, &net, &active);
        assert!(is_approx_eq(eq.physical_flow_total(PhysNode::new(1)), total_before, 1e-12));
        assert!(is_approx_eq(eq.physical_flow_total(PhysNode::new(0)), 0.8, 1e-12));
    }

    #[test]
    fn delta_queries_leave_no_trace() {
        let (mut eq, net, active) = init_overlap();
        let (module_flow, members) = seed_module_tables(&net, &active);
        let s2 = active[1];

        let mut old_delta = MemDeltaFlow::new(Module::new(1));
        let mut module_deltas = DeltaFlowMap::new();
        module_deltas.start_round();
        eq.add_memory_contributions(&net, s2, &mut old_delta, &mut module_deltas);
        let new_delta = *module_deltas.get(Module::new(0)).unwrap();

        let codelength = eq.codelength();
        let first = eq.delta_codelength(&net, s2, &old_delta, &new_delta, &module_flow, &members);
        let second = eq.delta_codelength(&net, s2, &old_delta, &new_delta, &module_flow, &members);
        assert_eq!(first, second);
        assert_eq!(eq.codelength(), codelength);
        assert_eq!(eq.mem_node_set(PhysNode::new(1), Module::new(1)), Some((1, 0.1)));
    }

    #[test]
    fn consolidation_writes_physical_sums_onto_modules() {
        let (mut eq, mut net, active) = init_overlap();
        merge_overlap_modules(&mut eq, &mut net, &active);

        // Modules 0 and 2 survive; module 1 was emptied.
        let root = net.root();
        let m0 = net.add_node(root, FlowData::new(0.2));
        let m2 = net.add_node(root, FlowData::new(0.8));
        let mut modules: SecondaryMap<Module, PackedOption<NodeId>> = SecondaryMap::new();
        modules[Module::new(0)] = Some(m0).into();
        modules[Module::new(2)] = Some(m2).into();

        eq.consolidate_modules(&mut net, &modules);

        assert_eq!(net[m0].physical_nodes.len(), 1);
        assert_eq!(net[m0].physical_nodes[0], PhysData::new(PhysNode::new(1), 0.2));
        assert_eq!(net[m2].physical_nodes.len(), 1);
        assert_eq!(net[m2].physical_nodes[0], PhysData::new(PhysNode::new(0), 0.8));
    }

    #[test]
    fn leaf_module_codebook_runs_over_physical_contributions() {
        let mut net = Network::new(FlowData::with_boundary(1.0, 0.0, 0.0));
        let root = net.root();
        let module = net.add_node(root, FlowData::with_boundary(0.2, 0.0, 0.0));
        net.add_state_node(module, FlowData::new(0.1), 7);
        net.add_state_node(module, FlowData::new(0.1), 7);
        // One physical contribution of 0.2 replaces two state entries of 0.1.
        net[module].physical_nodes.push(PhysData::new(PhysNode::new(0), 0.2));

        let eq = MemMapEquation::new();
        let got = eq.calc_codelength(&net, module);
        // A single codeword for the whole codebook costs nothing.
        assert_eq!(got, -plogp(0.2 / 0.2) * 0.2);
        assert_eq!(got, 0.0);
    }
}
