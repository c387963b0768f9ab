//! The hierarchical node tree the objectives operate on.
//!
//! Nodes live in an arena owned by [`Network`]; tree edges are entity
//! references, with children owned by their parent's child list and a packed
//! non-owning back-reference to the parent. The engine holds no pointers into
//! the tree; every operation takes the network plus a [`NodeId`].
//!
//! The network is generic over the flow record so the continuous and the
//! integer objectives share one tree implementation.

use crate::entities::{Module, NodeId, PhysNode};
use crate::meta::MetaCollection;
use cranelift_entity::packed_option::PackedOption;
use cranelift_entity::{EntityRef, PrimaryMap};
use smallvec::SmallVec;
use core::ops::{Index, IndexMut};

/// One physical-node contribution of a state node or module: the physical
/// index and the flow this node feeds into it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysData {
    /// Densely re-indexed physical node.
    pub phys: PhysNode,
    /// Flow contributed to that physical node.
    pub sum_flow: f64,
}

impl PhysData {
    /// A contribution record.
    pub fn new(phys: PhysNode, sum_flow: f64) -> Self {
        Self { phys, sum_flow }
    }
}

/// A node of the hierarchical tree.
///
/// Carries the flow aggregate plus the optional auxiliary state the memory
/// and meta objectives use: a physical-contribution list (empty for
/// first-order networks until the memory objective seeds it) and a
/// categorical meta bag (empty unless the meta objective is active).
#[derive(Clone, Debug)]
pub struct Node<F> {
    /// The owning parent, none for the root.
    pub parent: PackedOption<NodeId>,
    /// Owned children, in insertion order.
    children: Vec<NodeId>,
    /// Module this node is currently assigned to among the active nodes.
    /// Meaningful only during an optimization pass.
    pub module: Module,
    /// Flow aggregate.
    pub data: F,
    /// External physical id of this state node.
    pub phys_id: u32,
    /// Physical contributions, maintained by the memory objective.
    pub physical_nodes: SmallVec<[PhysData; 2]>,
    /// Categorical tags, one per meta dimension.
    pub meta_data: SmallVec<[u32; 2]>,
    /// Meta bag, maintained by the meta objective.
    pub meta_collection: MetaCollection,
}

impl<F> Node<F> {
    fn new(parent: Option<NodeId>, data: F, phys_id: u32) -> Self {
        Self {
            parent: parent.into(),
            children: Vec::new(),
            module: Module::new(0),
            data,
            phys_id,
            physical_nodes: SmallVec::new(),
            meta_data: SmallVec::new(),
            meta_collection: MetaCollection::new(),
        }
    }

    /// The node's children, in insertion order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Does this node own no children?
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// An arena-owned hierarchical network.
pub struct Network<F> {
    nodes: PrimaryMap<NodeId, Node<F>>,
    root: NodeId,
}

impl<F> Network<F> {
    /// Create a network holding only a root with the given aggregate.
    pub fn new(root_data: F) -> Self {
        let mut nodes = PrimaryMap::new();
        let root = nodes.push(Node::new(None, root_data, 0));
        Self { nodes, root }
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Total number of nodes, root included.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Append a child under `parent`. The node's physical id defaults to its
    /// own index, which makes every leaf its own physical node in a
    /// first-order network.
    pub fn add_node(&mut self, parent: NodeId, data: F) -> NodeId {
        let id = self.nodes.next_key();
        self.add_state_node(parent, data, id.index() as u32)
    }

    /// Append a child under `parent` belonging to the physical node
    /// `phys_id`. Several state nodes may share one physical id.
    pub fn add_state_node(&mut self, parent: NodeId, data: F, phys_id: u32) -> NodeId {
        let id = self.nodes.push(Node::new(Some(parent), data, phys_id));
        self.nodes[parent].children.push(id);
        id
    }

    /// The children of `node`.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node].children
    }

    /// Is `node` a leaf?
    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.nodes[node].is_leaf()
    }

    /// Is `node` a module whose children are leaves?
    pub fn is_leaf_module(&self, node: NodeId) -> bool {
        match self.nodes[node].children.first() {
            Some(&first) => self.is_leaf(first),
            None => false,
        }
    }

    /// Iterate over the leaves of the subtree rooted at `below`, in
    /// depth-first order. `below` itself is yielded if it is a leaf.
    pub fn leaf_nodes(&self, below: NodeId) -> LeafNodes<'_, F> {
        LeafNodes {
            network: self,
            stack: vec![below],
        }
    }

    /// Assign each active node to its own module, in list order. This is the
    /// state `init_partition` expects: node `i` occupies module `i`.
    pub fn set_active_modules(&mut self, active: &[NodeId]) {
        for (i, &node) in active.iter().enumerate() {
            self.nodes[node].module = Module::new(i);
        }
    }

    /// Set the categorical tags of `node`, one per meta dimension.
    pub fn set_meta_data(&mut self, node: NodeId, tags: &[u32]) {
        self.nodes[node].meta_data = SmallVec::from_slice(tags);
    }
}

impl<F> Index<NodeId> for Network<F> {
    type Output = Node<F>;

    fn index(&self, id: NodeId) -> &Node<F> {
        &self.nodes[id]
    }
}

impl<F> IndexMut<NodeId> for Network<F> {
    fn index_mut(&mut self, id: NodeId) -> &mut Node<F> {
        &mut self.nodes[id]
    }
}

/// Depth-first iterator over the leaves of a subtree.
pub struct LeafNodes<'a, F> {
    network: &'a Network<F>,
    stack: Vec<NodeId>,
}

impl<'a, F> Iterator for LeafNodes<'a, F> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(id) = self.stack.pop() {
            let node = &self.network.nodes[id];
            if node.is_leaf() {
                return Some(id);
            }
            self.stack.extend(node.children.iter().rev());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowData;

    #[test]
    fn build_and_iterate_two_levels() {
        let mut net = Network::new(FlowData::new(1.0));
        let root = net.root();
        let m0 = net.add_node(root, FlowData::new(0.6));
        let m1 = net.add_node(root, FlowData::new(0.4));
        let a = net.add_node(m0, FlowData::new(0.35));
        let b = net.add_node(m0, FlowData::new(0.25));
        let c = net.add_node(m1, FlowData::new(0.4));

        assert_eq!(net.children(root), &[m0, m1]);
        assert!(net.is_leaf(a) && net.is_leaf(b) && net.is_leaf(c));
        assert!(net.is_leaf_module(m0));
        assert!(!net.is_leaf_module(root));
        assert_eq!(net[a].parent.expand(), Some(m0));

        let leaves: Vec<_> = net.leaf_nodes(root).collect();
        assert_eq!(leaves, vec![a, b, c]);
        let leaves_m1: Vec<_> = net.leaf_nodes(m1).collect();
        assert_eq!(leaves_m1, vec![c]);
    }

    #[test]
    fn root_without_children_is_its_own_leaf() {
        let net = Network::new(FlowData::new(1.0));
        let leaves: Vec<_> = net.leaf_nodes(net.root()).collect();
        assert_eq!(leaves, vec![net.root()]);
        assert!(!net.is_leaf_module(net.root()));
    }

    #[test]
    fn active_module_assignment() {
        let mut net = Network::new(FlowData::new(1.0));
        let root = net.root();
        let x = net.add_node(root, FlowData::new(0.6));
        let y = net.add_node(root, FlowData::new(0.4));
        net.set_active_modules(&[x, y]);
        assert_eq!(net[x].module, Module::new(0));
        assert_eq!(net[y].module, Module::new(1));
    }

    #[test]
    fn state_nodes_share_physical_ids() {
        let mut net = Network::new(FlowData::new(1.0));
        let root = net.root();
        let s1 = net.add_state_node(root, FlowData::new(0.5), 7);
        let s2 = net.add_state_node(root, FlowData::new(0.5), 7);
        assert_eq!(net[s1].phys_id, 7);
        assert_eq!(net[s2].phys_id, 7);
    }
}
