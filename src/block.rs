//! Hashed octree block store: the per-block wavelet tree and the
//! sparse block map keyed by block coordinate.
//!
//! A block is a complete octree of fixed height `H`; the map from
//! block-coordinate to block uses [`dashmap::DashMap`] so that existing
//! blocks can be read lock-free from multiple `rayon` tasks while new
//! blocks are inserted under a per-shard lock.

use dashmap::DashMap;

use crate::geometry::{Index3D, NUM_CHILDREN};

/// An internal wavelet-octree node: 7 detail coefficients owned by the
/// node itself, plus up to 8 children. A node exists only if at least
/// one descendant (or the node itself) differs from the wavelet
/// baseline; an absent child is implicitly the baseline (zero detail,
/// scale inherited from its ancestors).
#[derive(Clone, Debug, Default)]
pub struct OctreeNode {
    details: [f32; 7],
    children: [Option<Box<OctreeNode>>; NUM_CHILDREN],
}

impl OctreeNode {
    pub fn new(details: [f32; 7]) -> Self {
        Self {
            details,
            children: Default::default(),
        }
    }

    pub fn data(&self) -> [f32; 7] {
        self.details
    }

    pub fn set_data(&mut self, details: [f32; 7]) {
        self.details = details;
    }

    pub fn get_child(&self, relative_child_index: u8) -> Option<&OctreeNode> {
        self.children[relative_child_index as usize].as_deref()
    }

    pub fn get_child_mut(&mut self, relative_child_index: u8) -> Option<&mut OctreeNode> {
        self.children[relative_child_index as usize].as_deref_mut()
    }

    /// Direct access to a child slot, for callers (the integrator) that
    /// need to hand a `&mut Option<Box<OctreeNode>>` down a recursion
    /// rather than go through [`Self::allocate_child`] eagerly.
    pub fn child_slot_mut(&mut self, relative_child_index: u8) -> &mut Option<Box<OctreeNode>> {
        &mut self.children[relative_child_index as usize]
    }

    pub fn has_at_least_one_child(&self) -> bool {
        self.children.iter().any(Option::is_some)
    }

    /// Allocates (with zero detail) the child at `relative_child_index`
    /// if it does not already exist, and returns a mutable reference to
    /// it either way.
    pub fn allocate_child(&mut self, relative_child_index: u8) -> &mut OctreeNode {
        self.children[relative_child_index as usize]
            .get_or_insert_with(|| Box::new(OctreeNode::default()))
    }

    /// Drops any child subtree whose scale-reconstructed contribution is
    /// within `noise_threshold` of the baseline on every detail
    /// coefficient and which itself has no children left. Pruning is a
    /// maintenance sweep, not required for correctness; callers choose
    /// when to run it, typically once per integrated frame.
    pub fn prune(&mut self, noise_threshold: f32) {
        for slot in &mut self.children {
            if let Some(child) = slot {
                child.prune(noise_threshold);
                let is_baseline = !child.has_at_least_one_child()
                    && child.details.iter().all(|d| d.abs() <= noise_threshold);
                if is_baseline {
                    *slot = None;
                }
            }
        }
    }
}

/// A complete octree of fixed height `H`, the unit of sparsity and
/// parallelism. `root_scale` is the root's scaling coefficient;
/// `root_node` carries the 7 detail coefficients of the root node plus
/// its children (absent ⇒ the whole block is the free-space baseline at
/// `root_scale`).
#[derive(Clone, Debug)]
pub struct Block {
    root_scale: f32,
    root_node: Option<Box<OctreeNode>>,
}

impl Block {
    /// A freshly observed block: never-updated, baseline (`root_scale =
    /// 0`, "unknown") everywhere.
    pub fn new() -> Self {
        Self {
            root_scale: 0.0,
            root_node: None,
        }
    }

    pub fn root_scale(&self) -> f32 {
        self.root_scale
    }

    pub fn set_root_scale(&mut self, scale: f32) {
        self.root_scale = scale;
    }

    pub fn root_scale_mut(&mut self) -> &mut f32 {
        &mut self.root_scale
    }

    /// Direct access to the root node slot, for the same reason as
    /// [`OctreeNode::child_slot_mut`].
    pub fn root_node_slot_mut(&mut self) -> &mut Option<Box<OctreeNode>> {
        &mut self.root_node
    }

    pub fn root_node(&self) -> Option<&OctreeNode> {
        self.root_node.as_deref()
    }

    pub fn root_node_mut(&mut self) -> Option<&mut OctreeNode> {
        self.root_node.as_deref_mut()
    }

    /// Allocates the root node (with zero detail) if absent, returning a
    /// mutable reference either way.
    pub fn allocate_root_node(&mut self) -> &mut OctreeNode {
        self.root_node.get_or_insert_with(|| Box::new(OctreeNode::default()))
    }

    pub fn prune(&mut self, noise_threshold: f32) {
        if let Some(root) = &mut self.root_node {
            root.prune(noise_threshold);
        }
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

/// Sparse map from block-coordinate to block. Missing keys denote "never
/// observed."
pub type BlockMap = DashMap<Index3D, Block>;
