//! Cross-variant consistency properties, driven the way an optimization loop
//! drives the objectives: random small networks, random legal move
//! sequences, and after every step the incremental state has to agree with
//! the delta that was quoted for the move and with a from-scratch
//! recomputation of the same partition.

use flowmap::{
    seed_module_tables, Config, DeltaFlow, DeltaFlowInt, DeltaFlowMap, FlowData, FlowDataInt,
    GrassbergerMapEquation, MapEquation, MemDeltaFlow, MemMapEquation, MetaCollection,
    MetaMapEquation, Module, Network, NodeId, Objective, PhysNode,
};
use proptest::prelude::*;

/// A random dense symmetric network plus a random move script. Each move
/// `(k, t)` sends node `k` into the module currently holding node `t`.
#[derive(Clone, Debug)]
struct Scenario {
    n: usize,
    weights: Vec<f64>,
    moves: Vec<(usize, usize)>,
}

fn scenario() -> impl Strategy<Value = Scenario> {
    (3usize..=6).prop_flat_map(|n| {
        let pairs = n * (n - 1) / 2;
        (
            proptest::collection::vec(0.05f64..1.0, pairs),
            proptest::collection::vec((0..n, 0..n), 1..12),
        )
            .prop_map(move |(weights, moves)| Scenario { n, weights, moves })
    })
}

/// Symmetric flow network: nodes `i` and `j` exchange `w[i][j]` flow in each
/// direction, normalized so the node flows sum to one. Tracks the current
/// module assignment and derives the boundary-delta records a driver would
/// build from the edge structure.
#[derive(Clone, Debug)]
struct FlowHarness {
    w: Vec<Vec<f64>>,
    assignment: Vec<usize>,
}

impl FlowHarness {
    fn new(n: usize, upper: &[f64]) -> Self {
        let mut w = vec![vec![0.0; n]; n];
        let mut values = upper.iter();
        for i in 0..n {
            for j in (i + 1)..n {
                let v = *values.next().unwrap();
                w[i][j] = v;
                w[j][i] = v;
            }
        }
        let total: f64 = w.iter().flatten().sum();
        for row in &mut w {
            for v in row {
                *v /= total;
            }
        }
        Self {
            assignment: (0..n).collect(),
            w,
        }
    }

    fn n(&self) -> usize {
        self.w.len()
    }

    fn node_data(&self, k: usize) -> FlowData {
        let flow: f64 = self.w[k].iter().sum();
        FlowData::with_boundary(flow, flow, flow)
    }

    fn link_to_module(&self, k: usize, module: usize) -> f64 {
        (0..self.n())
            .filter(|&j| j != k && self.assignment[j] == module)
            .map(|j| self.w[k][j])
            .sum()
    }

    fn records(&self, k: usize, target: usize) -> (DeltaFlow, DeltaFlow) {
        let old = self.assignment[k];
        let to_old = self.link_to_module(k, old);
        let to_new = self.link_to_module(k, target);
        (
            DeltaFlow::with_deltas(Module::from_u32(old as u32), to_old, to_old),
            DeltaFlow::with_deltas(Module::from_u32(target as u32), to_new, to_new),
        )
    }

    fn members(&self, module: usize) -> Vec<usize> {
        (0..self.n())
            .filter(|&k| self.assignment[k] == module)
            .collect()
    }

    fn module_aggregate(&self, module: usize) -> Option<FlowData> {
        let members = self.members(module);
        if members.is_empty() {
            return None;
        }
        let flow: f64 = members.iter().map(|&k| self.node_data(k).flow).sum();
        let boundary: f64 = members
            .iter()
            .map(|&k| {
                (0..self.n())
                    .filter(|&j| self.assignment[j] != module)
                    .map(|j| self.w[k][j])
                    .sum::<f64>()
            })
            .sum();
        Some(FlowData::with_boundary(flow, boundary, boundary))
    }
}

fn build_flow_network(h: &FlowHarness) -> (Network<FlowData>, Vec<NodeId>) {
    let mut net = Network::new(FlowData::with_boundary(1.0, 0.0, 0.0));
    let root = net.root();
    let active: Vec<NodeId> = (0..h.n()).map(|k| net.add_node(root, h.node_data(k))).collect();
    net.set_active_modules(&active);
    (net, active)
}

/// Codelength of the harness partition computed from scratch: the modules
/// become tree nodes over the same leaf layer and a fresh objective
/// re-derives everything.
fn recompute_codelength(h: &FlowHarness) -> f64 {
    let mut net = Network::new(FlowData::with_boundary(1.0, 0.0, 0.0));
    let root = net.root();
    let mut active = Vec::new();
    for module in 0..h.n() {
        if let Some(aggregate) = h.module_aggregate(module) {
            let node = net.add_node(root, aggregate);
            for k in h.members(module) {
                net.add_node(node, h.node_data(k));
            }
            active.push(node);
        }
    }
    net.set_active_modules(&active);

    let mut eq = MapEquation::new();
    eq.init(&Config::default()).unwrap();
    eq.init_network(&mut net, root).unwrap();
    eq.init_partition(&mut net, &active).unwrap();
    eq.codelength()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn base_delta_agrees_with_update_and_recomputation(s in scenario()) {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut h = FlowHarness::new(s.n, &s.weights);
        let (mut net, active) = build_flow_network(&h);
        let root = net.root();
        let mut eq = MapEquation::new();
        eq.init(&Config::default()).unwrap();
        eq.init_network(&mut net, root).unwrap();
        eq.init_partition(&mut net, &active).unwrap();
        let (mut module_flow, mut members) = seed_module_tables(&net, &active);

        for &(k, t) in &s.moves {
            let target = h.assignment[t];
            if h.assignment[k] == target {
                continue;
            }
            let (mut old_d, mut new_d) = h.records(k, target);
            let before = eq.codelength();
            let quoted = eq.delta_codelength(&net, active[k], &old_d, &new_d, &module_flow, &members);
            eq.update_codelength(&net, active[k], &mut old_d, &mut new_d, &mut module_flow, &mut members);
            h.assignment[k] = target;
            prop_assert!((eq.codelength() - before - quoted).abs() < 1e-10);
        }

        prop_assert!((eq.codelength() - recompute_codelength(&h)).abs() < 1e-9);
    }

    #[test]
    fn base_move_and_back_is_identity(s in scenario()) {
        let mut h = FlowHarness::new(s.n, &s.weights);
        let (mut net, active) = build_flow_network(&h);
        let root = net.root();
        let mut eq = MapEquation::new();
        eq.init(&Config::default()).unwrap();
        eq.init_network(&mut net, root).unwrap();
        eq.init_partition(&mut net, &active).unwrap();
        let (mut module_flow, mut members) = seed_module_tables(&net, &active);
        let initial = eq.codelength();

        if let Some(&(k, t)) = s.moves.iter().find(|&&(k, t)| h.assignment[k] != h.assignment[t]) {
            let home = h.assignment[k];
            let target = h.assignment[t];

            let (mut old_d, mut new_d) = h.records(k, target);
            eq.update_codelength(&net, active[k], &mut old_d, &mut new_d, &mut module_flow, &mut members);
            h.assignment[k] = target;

            let (mut back_old, mut back_new) = h.records(k, home);
            eq.update_codelength(&net, active[k], &mut back_old, &mut back_new, &mut module_flow, &mut members);
            h.assignment[k] = home;

            prop_assert!((eq.codelength() - initial).abs() < 1e-12);
        }
    }

    #[test]
    fn meta_delta_agrees_with_update_and_conserves_bags(s in scenario()) {
        let mut h = FlowHarness::new(s.n, &s.weights);
        let (mut net, active) = build_flow_network(&h);
        let root = net.root();
        for (k, &node) in active.iter().enumerate() {
            net.set_meta_data(node, &[(k % 3) as u32]);
        }

        let config = Config {
            num_meta_data_dimensions: 1,
            meta_data_rate: 0.3,
            weight_by_flow: true,
        };
        let mut eq = MetaMapEquation::new();
        eq.init(&config).unwrap();
        eq.init_network(&mut net, root).unwrap();
        eq.init_partition(&mut net, &active).unwrap();
        let (mut module_flow, mut members) = seed_module_tables(&net, &active);

        let mut total_bag = MetaCollection::new();
        for &node in &active {
            total_bag.add_all(&net[node].meta_collection);
        }

        for &(k, t) in &s.moves {
            let target = h.assignment[t];
            if h.assignment[k] == target {
                continue;
            }
            let (mut old_d, mut new_d) = h.records(k, target);
            let before = eq.codelength();
            let quoted = eq.delta_codelength(&net, active[k], &old_d, &new_d, &module_flow, &members);
            eq.update_codelength(&net, active[k], &mut old_d, &mut new_d, &mut module_flow, &mut members);
            h.assignment[k] = target;
            prop_assert!((eq.codelength() - before - quoted).abs() < 1e-10);

            // Bag-wise sum over modules always equals the total leaf bag.
            let mut sum = MetaCollection::new();
            for module in 0..h.n() {
                if let Some(bag) = eq.module_meta_collection(Module::from_u32(module as u32)) {
                    sum.add_all(bag);
                }
            }
            for (tag, weight) in total_bag.iter() {
                prop_assert!((sum.weight(tag) - weight).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn memory_delta_agrees_with_update_and_conserves_flow(s in scenario()) {
        let mut h = FlowHarness::new(s.n, &s.weights);
        let num_phys = (h.n() / 2).max(2);
        let mut net = Network::new(FlowData::with_boundary(1.0, 0.0, 0.0));
        let root = net.root();
        let active: Vec<NodeId> = (0..h.n())
            .map(|k| net.add_state_node(root, h.node_data(k), (k % num_phys) as u32))
            .collect();
        net.set_active_modules(&active);

        let mut eq = MemMapEquation::new();
        eq.init(&Config::default()).unwrap();
        eq.init_network(&mut net, root).unwrap();
        eq.init_partition(&mut net, &active).unwrap();
        let (mut module_flow, mut members) = seed_module_tables(&net, &active);

        let totals: Vec<f64> = (0..eq.num_physical_nodes())
            .map(|p| eq.physical_flow_total(PhysNode::from_u32(p as u32)))
            .collect();

        for &(k, t) in &s.moves {
            let target = h.assignment[t];
            if h.assignment[k] == target {
                continue;
            }
            let old_module = Module::from_u32(h.assignment[k] as u32);
            let new_module = Module::from_u32(target as u32);
            let to_old = h.link_to_module(k, h.assignment[k]);
            let to_new = h.link_to_module(k, target);

            let mut old_d = MemDeltaFlow::with_deltas(old_module, to_old, to_old);
            let mut module_deltas = DeltaFlowMap::new();
            module_deltas.start_round();
            module_deltas.add(MemDeltaFlow::with_deltas(new_module, to_new, to_new));
            eq.add_memory_contributions(&net, active[k], &mut old_d, &mut module_deltas);
            let mut new_d = *module_deltas.get(new_module).unwrap();

            let before = eq.codelength();
            let quoted = eq.delta_codelength(&net, active[k], &old_d, &new_d, &module_flow, &members);
            eq.update_codelength(&net, active[k], &mut old_d, &mut new_d, &mut module_flow, &mut members);
            h.assignment[k] = target;
            net[active[k]].module = new_module;
            prop_assert!((eq.codelength() - before - quoted).abs() < 1e-10);

            for (p, &total) in totals.iter().enumerate() {
                let tracked = eq.physical_flow_total(PhysNode::from_u32(p as u32));
                prop_assert!((tracked - total).abs() < 1e-12);
            }
        }
    }
}

/// Integer-degree analog of [`FlowHarness`]: `w[i][j]` is an edge
/// multiplicity and every boundary count is exact.
#[derive(Clone, Debug)]
struct DegreeHarness {
    w: Vec<Vec<u64>>,
    assignment: Vec<usize>,
}

impl DegreeHarness {
    fn new(n: usize, upper: &[u64]) -> Self {
        let mut w = vec![vec![0u64; n]; n];
        let mut values = upper.iter();
        for i in 0..n {
            for j in (i + 1)..n {
                let v = *values.next().unwrap();
                w[i][j] = v;
                w[j][i] = v;
            }
        }
        Self {
            assignment: (0..n).collect(),
            w,
        }
    }

    fn n(&self) -> usize {
        self.w.len()
    }

    fn node_data(&self, k: usize) -> FlowDataInt {
        let degree: u64 = self.w[k].iter().sum();
        FlowDataInt::new(degree, degree)
    }

    fn link_to_module(&self, k: usize, module: usize) -> u64 {
        (0..self.n())
            .filter(|&j| j != k && self.assignment[j] == module)
            .map(|j| self.w[k][j])
            .sum()
    }

    fn records(&self, k: usize, target: usize) -> (DeltaFlowInt, DeltaFlowInt) {
        let old = self.assignment[k];
        // An internalized edge removes both of its endpoints from the
        // combined boundary count.
        (
            DeltaFlowInt::with_delta(
                Module::from_u32(old as u32),
                2 * self.link_to_module(k, old) as i64,
            ),
            DeltaFlowInt::with_delta(
                Module::from_u32(target as u32),
                2 * self.link_to_module(k, target) as i64,
            ),
        )
    }

    fn module_aggregate(&self, module: usize) -> Option<FlowDataInt> {
        let members: Vec<usize> = (0..self.n())
            .filter(|&k| self.assignment[k] == module)
            .collect();
        if members.is_empty() {
            return None;
        }
        let degree: u64 = members.iter().map(|&k| self.node_data(k).flow).sum();
        let boundary: u64 = members
            .iter()
            .map(|&k| {
                (0..self.n())
                    .filter(|&j| self.assignment[j] != module)
                    .map(|j| self.w[k][j])
                    .sum::<u64>()
            })
            .sum();
        Some(FlowDataInt::new(degree, boundary))
    }
}

fn recompute_degree_codelength(h: &DegreeHarness) -> f64 {
    let total: u64 = (0..h.n()).map(|k| h.node_data(k).flow).sum();
    let mut net = Network::new(FlowDataInt::new(total, 0));
    let root = net.root();
    let mut active = Vec::new();
    for module in 0..h.n() {
        if let Some(aggregate) = h.module_aggregate(module) {
            let node = net.add_node(root, aggregate);
            for k in (0..h.n()).filter(|&k| h.assignment[k] == module) {
                net.add_node(node, h.node_data(k));
            }
            active.push(node);
        }
    }
    net.set_active_modules(&active);

    let mut eq = GrassbergerMapEquation::new();
    eq.init(&Config::default()).unwrap();
    eq.init_network(&mut net, root).unwrap();
    eq.init_partition(&mut net, &active).unwrap();
    eq.codelength()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn degree_delta_agrees_with_update_and_recomputation(
        (n, weights, moves) in (3usize..=6).prop_flat_map(|n| {
            let pairs = n * (n - 1) / 2;
            (
                Just(n),
                proptest::collection::vec(1u64..4, pairs),
                proptest::collection::vec((0..n, 0..n), 1..12),
            )
        })
    ) {
        let mut h = DegreeHarness::new(n, &weights);
        let total: u64 = (0..h.n()).map(|k| h.node_data(k).flow).sum();
        let mut net = Network::new(FlowDataInt::new(total, 0));
        let root = net.root();
        let active: Vec<NodeId> = (0..h.n()).map(|k| net.add_node(root, h.node_data(k))).collect();
        net.set_active_modules(&active);

        let mut eq = GrassbergerMapEquation::new();
        eq.init(&Config::default()).unwrap();
        eq.init_network(&mut net, root).unwrap();
        eq.init_partition(&mut net, &active).unwrap();
        let (mut module_flow, mut members) = seed_module_tables(&net, &active);

        for &(k, t) in &moves {
            let target = h.assignment[t];
            if h.assignment[k] == target {
                continue;
            }
            let (mut old_d, mut new_d) = h.records(k, target);
            let before = eq.codelength();
            let quoted = eq.delta_codelength(&net, active[k], &old_d, &new_d, &module_flow, &members);
            eq.update_codelength(&net, active[k], &mut old_d, &mut new_d, &mut module_flow, &mut members);
            h.assignment[k] = target;
            prop_assert!((eq.codelength() - before - quoted).abs() < 1e-10);

            // Integer aggregates stay exact.
            let expected = h.module_aggregate(target).unwrap();
            prop_assert_eq!(module_flow[Module::from_u32(target as u32)], expected);
        }

        prop_assert!((eq.codelength() - recompute_degree_codelength(&h)).abs() < 1e-9);
    }
}
