//! Flow aggregates and proposed-move records.
//!
//! [`FlowData`] and [`FlowDataInt`] are the additive per-node/per-module
//! aggregates the objectives maintain; [`DeltaFlow`] and friends describe the
//! boundary change a single candidate move would cause. The driver builds
//! delta records and the engine only reads them, except `update_codelength` on
//! the memory objective, which may fill in the physical-overlap sums when the
//! driver skipped the amortization step.

use crate::entities::Module;
use cranelift_entity::SecondaryMap;
use core::ops::{AddAssign, SubAssign};

/// Continuous flow aggregate: stationary visit rate plus boundary rates.
///
/// Forms an additive group under `+=`/`-=`: subtracting a previously-added
/// record performs the same float operations in reverse and restores the
/// original value exactly.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlowData {
    /// Stationary probability of visiting this node or module.
    pub flow: f64,
    /// Rate of flow entering the module boundary per step.
    pub enter_flow: f64,
    /// Rate of flow exiting the module boundary per step.
    pub exit_flow: f64,
}

impl FlowData {
    /// A record with the given visit rate and no boundary flow.
    pub fn new(flow: f64) -> Self {
        Self {
            flow,
            enter_flow: 0.0,
            exit_flow: 0.0,
        }
    }

    /// A record with visit rate and explicit boundary rates.
    pub fn with_boundary(flow: f64, enter_flow: f64, exit_flow: f64) -> Self {
        Self {
            flow,
            enter_flow,
            exit_flow,
        }
    }
}

impl AddAssign for FlowData {
    fn add_assign(&mut self, other: Self) {
        self.flow += other.flow;
        self.enter_flow += other.enter_flow;
        self.exit_flow += other.exit_flow;
    }
}

impl SubAssign for FlowData {
    fn sub_assign(&mut self, other: Self) {
        self.flow -= other.flow;
        self.enter_flow -= other.enter_flow;
        self.exit_flow -= other.exit_flow;
    }
}

/// Integer flow aggregate for the degree-normalized objective.
///
/// The underlying model is undirected, so a single `enter_exit_flow` plays
/// the role of both boundary rates. Kept in exact integer arithmetic; only
/// entropy evaluation converts to floating point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlowDataInt {
    /// Degree of this node, or total degree of this module.
    pub flow: u64,
    /// Combined boundary degree of this node's or module's edges.
    pub enter_exit_flow: u64,
}

impl FlowDataInt {
    /// A record with the given degree and boundary degree.
    pub fn new(flow: u64, enter_exit_flow: u64) -> Self {
        Self {
            flow,
            enter_exit_flow,
        }
    }
}

impl AddAssign for FlowDataInt {
    fn add_assign(&mut self, other: Self) {
        self.flow += other.flow;
        self.enter_exit_flow += other.enter_exit_flow;
    }
}

impl SubAssign for FlowDataInt {
    fn sub_assign(&mut self, other: Self) {
        debug_assert!(
            self.flow >= other.flow && self.enter_exit_flow >= other.enter_exit_flow,
            "integer flow aggregate would underflow"
        );
        self.flow -= other.flow;
        self.enter_exit_flow -= other.enter_exit_flow;
    }
}

/// A per-module record of a proposed move, built by the driver.
///
/// Implementations merge with `+=` inside a [`DeltaFlowMap`], so two records
/// for the same target module accumulate.
pub trait ModuleDelta: Copy + AddAssign {
    /// The module this record targets.
    fn module(&self) -> Module;

    /// A record for `module` with all deltas zero.
    fn new(module: Module) -> Self;
}

/// Proposed boundary change for one target module of the base objective.
///
/// `delta_enter`/`delta_exit` are the changes in the module's boundary flow
/// contributed by the moving node's edges to that module.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeltaFlow {
    /// Target module.
    pub module: Module,
    /// Change in the module's enter flow.
    pub delta_enter: f64,
    /// Change in the module's exit flow.
    pub delta_exit: f64,
}

impl DeltaFlow {
    /// A record with explicit boundary deltas.
    pub fn with_deltas(module: Module, delta_enter: f64, delta_exit: f64) -> Self {
        Self {
            module,
            delta_enter,
            delta_exit,
        }
    }
}

impl ModuleDelta for DeltaFlow {
    fn module(&self) -> Module {
        self.module
    }

    fn new(module: Module) -> Self {
        Self::with_deltas(module, 0.0, 0.0)
    }
}

impl AddAssign for DeltaFlow {
    fn add_assign(&mut self, other: Self) {
        debug_assert_eq!(self.module, other.module);
        self.delta_enter += other.delta_enter;
        self.delta_exit += other.delta_exit;
    }
}

/// Delta record of the memory objective: boundary deltas plus the two
/// physical-overlap sums accumulated by `add_memory_contributions`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MemDeltaFlow {
    /// Target module.
    pub module: Module,
    /// Change in the module's enter flow.
    pub delta_enter: f64,
    /// Change in the module's exit flow.
    pub delta_exit: f64,
    /// `sum plogp(sum_flow +- moved) - plogp(sum_flow)` over shared physical
    /// nodes in the target module.
    pub sum_delta_plogp_phys_flow: f64,
    /// `sum plogp(moved)` over the moving node's physical contributions that
    /// overlap the target module.
    pub sum_plogp_phys_flow: f64,
}

impl MemDeltaFlow {
    /// A record with explicit boundary deltas and zero overlap sums.
    pub fn with_deltas(module: Module, delta_enter: f64, delta_exit: f64) -> Self {
        Self {
            module,
            delta_enter,
            delta_exit,
            sum_delta_plogp_phys_flow: 0.0,
            sum_plogp_phys_flow: 0.0,
        }
    }
}

impl ModuleDelta for MemDeltaFlow {
    fn module(&self) -> Module {
        self.module
    }

    fn new(module: Module) -> Self {
        Self::with_deltas(module, 0.0, 0.0)
    }
}

impl AddAssign for MemDeltaFlow {
    fn add_assign(&mut self, other: Self) {
        debug_assert_eq!(self.module, other.module);
        self.delta_enter += other.delta_enter;
        self.delta_exit += other.delta_exit;
        self.sum_delta_plogp_phys_flow += other.sum_delta_plogp_phys_flow;
        self.sum_plogp_phys_flow += other.sum_plogp_phys_flow;
    }
}

/// Delta record of the degree-normalized objective. Signed, since a move can
/// shrink a module's boundary degree below the moving node's contribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeltaFlowInt {
    /// Target module.
    pub module: Module,
    /// Change in the module's combined boundary degree.
    pub delta_enter_exit: i64,
}

impl DeltaFlowInt {
    /// A record with an explicit boundary delta.
    pub fn with_delta(module: Module, delta_enter_exit: i64) -> Self {
        Self {
            module,
            delta_enter_exit,
        }
    }
}

impl ModuleDelta for DeltaFlowInt {
    fn module(&self) -> Module {
        self.module
    }

    fn new(module: Module) -> Self {
        Self::with_delta(module, 0)
    }
}

impl AddAssign for DeltaFlowInt {
    fn add_assign(&mut self, other: Self) {
        debug_assert_eq!(self.module, other.module);
        self.delta_enter_exit += other.delta_enter_exit;
    }
}

/// A dense accumulator of delta records keyed by target module.
///
/// Backing storage is a value vector plus a generation-tagged redirect table,
/// so `start_round` resets the map in `O(1)` no matter how many modules
/// exist. Records added twice for the same module merge with `+=`. The driver
/// fills one of these per candidate node; `add_memory_contributions` appends
/// overlap records for modules the node shares physical nodes with.
pub struct DeltaFlowMap<D> {
    values: Vec<D>,
    redirect: SecondaryMap<Module, u32>,
    offset: u32,
}

impl<D: ModuleDelta> DeltaFlowMap<D> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            redirect: SecondaryMap::new(),
            offset: 1,
        }
    }

    /// Forget all records from the previous round.
    ///
    /// Stale redirect entries are invalidated by advancing the generation
    /// offset; the table is only rewritten on the rare offset wraparound.
    /// The wraparound threshold leaves the current round headroom of a full
    /// `u32::MAX / 2` records before `add` could overflow a slot tag.
    pub fn start_round(&mut self) {
        self.offset += self.values.len() as u32;
        if self.offset > u32::MAX / 2 {
            self.redirect.clear();
            self.offset = 1;
        }
        self.values.clear();
    }

    fn slot(&self, module: Module) -> Option<usize> {
        let r = self.redirect[module];
        if r >= self.offset && ((r - self.offset) as usize) < self.values.len() {
            Some((r - self.offset) as usize)
        } else {
            None
        }
    }

    /// Add a record, merging with any record already present for the same
    /// module.
    pub fn add(&mut self, delta: D) {
        match self.slot(delta.module()) {
            Some(i) => self.values[i] += delta,
            None => {
                debug_assert!(self.values.len() < u32::MAX as usize);
                self.redirect[delta.module()] = self.offset + self.values.len() as u32;
                self.values.push(delta);
            }
        }
    }

    /// Does this round hold a record for `module`?
    pub fn contains(&self, module: Module) -> bool {
        self.slot(module).is_some()
    }

    /// The record for `module` in this round, if any.
    pub fn get(&self, module: Module) -> Option<&D> {
        self.slot(module).map(|i| &self.values[i])
    }

    /// All records of this round, in insertion order.
    pub fn values(&self) -> &[D] {
        &self.values
    }

    /// Number of records in this round.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Is this round empty?
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<D: ModuleDelta> Default for DeltaFlowMap<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cranelift_entity::EntityRef;

    #[test]
    fn flow_data_add_sub_round_trip() {
        let a = FlowData::with_boundary(0.6, 0.2, 0.2);
        let b = FlowData::with_boundary(0.4, 0.3, 0.3);
        let mut acc = a;
        acc += b;
        acc -= b;
        assert_eq!(acc, a);
    }

    #[test]
    fn flow_data_int_add_sub_round_trip() {
        let a = FlowDataInt::new(3, 2);
        let b = FlowDataInt::new(2, 1);
        let mut acc = a;
        acc += b;
        assert_eq!(acc, FlowDataInt::new(5, 3));
        acc -= b;
        assert_eq!(acc, a);
    }

    #[test]
    fn delta_map_merges_same_module() {
        let m0 = Module::new(0);
        let m1 = Module::new(1);
        let mut map = DeltaFlowMap::new();
        map.start_round();
        map.add(DeltaFlow::with_deltas(m0, 0.1, 0.2));
        map.add(DeltaFlow::with_deltas(m1, 0.3, 0.0));
        map.add(DeltaFlow::with_deltas(m0, 0.1, 0.1));
        assert_eq!(map.len(), 2);
        let d = map.get(m0).unwrap();
        assert_eq!(d.delta_enter, 0.2);
        assert!((d.delta_exit - 0.3).abs() < 1e-15);
    }

    #[test]
    fn delta_map_rounds_are_independent() {
        let m0 = Module::new(0);
        let mut map = DeltaFlowMap::new();
        map.start_round();
        map.add(DeltaFlow::with_deltas(m0, 1.0, 1.0));
        assert!(map.contains(m0));
        map.start_round();
        assert!(!map.contains(m0));
        assert!(map.is_empty());
        map.add(DeltaFlow::with_deltas(m0, 0.5, 0.0));
        assert_eq!(map.get(m0).unwrap().delta_enter, 0.5);
    }

    #[test]
    fn delta_map_many_rounds_no_leak() {
        let m = Module::new(7);
        let mut map = DeltaFlowMap::new();
        for round in 0..1000 {
            map.start_round();
            assert!(!map.contains(m));
            map.add(DeltaFlow::with_deltas(m, round as f64, 0.0));
            assert_eq!(map.len(), 1);
        }
    }
}
