//! The tagged-variant model: the host may hold a value that is any of
//! `{HashedBlocks, Octree, WaveletOctree, HashedWaveletOctree}`. All
//! four share one capability trait; only [`HashedWaveletOctree`] is a
//! target for the integrator — the others exist for config-tag
//! completeness and are declined by the integrator with
//! [`MapError::TypeMismatch`].

use dashmap::DashMap;

use crate::block::{Block, BlockMap, OctreeNode};
use crate::config::VolumetricDataStructureConfig;
use crate::error::MapError;
use crate::geometry::{index_to_linear_index, linear_index_to_index, Index3D, OctreeIndex};
use crate::transform;

/// The capability set the ESDF generator and collision sampler depend
/// on, independent of which concrete variant backs the map.
pub trait OccupancyField: Send + Sync {
    fn get_cell_value(&self, index: Index3D) -> f32;
    fn min_cell_width(&self) -> f32;
    /// All block coordinates that are currently materialized.
    fn iterate_blocks(&self) -> Vec<Index3D>;
}

/// Number of cells along one side of a [`HashedBlocksMap`] block.
pub fn cells_per_side(tree_height: u8) -> usize {
    1usize << tree_height
}

pub fn cells_per_block(tree_height: u8) -> usize {
    let side = cells_per_side(tree_height);
    side * side * side
}

/// A block resolves a global cell index to a leaf [`OctreeIndex`] whose
/// height is 0, then descends from the tree root (height `H`) to that
/// leaf, reading back the reconstructed scale coefficient at each level
/// via [`transform::backward`].
fn block_coordinate_of(global_index: Index3D, tree_height: u8) -> Index3D {
    global_index.shift_right(tree_height as u32)
}

fn leaf_relative_index(global_index: Index3D, tree_height: u8) -> Index3D {
    let side = cells_per_side(tree_height) as i32;
    Index3D::new(
        global_index.x.rem_euclid(side),
        global_index.y.rem_euclid(side),
        global_index.z.rem_euclid(side),
    )
}

/// Reads the reconstructed scale coefficient at `leaf_relative_index`
/// within a block's octree, descending from `root_scale`/`root_node`.
pub fn read_leaf_scale(
    root_scale: f32,
    root_node: Option<&OctreeNode>,
    leaf_relative_index: Index3D,
    tree_height: u8,
) -> f32 {
    let mut scale = root_scale;
    let mut node = match root_node {
        Some(n) => n,
        None => return scale,
    };
    let mut height = tree_height;
    loop {
        height -= 1;
        let relative_child = relative_child_at_height(leaf_relative_index, height);
        let children = transform::backward(scale, node.data());
        scale = children[relative_child as usize];
        if height == 0 {
            return scale;
        }
        match node.get_child(relative_child) {
            Some(child) => node = child,
            None => return scale,
        }
    }
}

/// Relative-child bit pattern of `leaf_relative_index` at tree level
/// `height` (counting down from the block root), i.e. which octant of
/// the node at that height the leaf falls into.
fn relative_child_at_height(leaf_relative_index: Index3D, height: u8) -> u8 {
    let bit = |v: i32| -> u8 { ((v >> height) & 1) as u8 };
    bit(leaf_relative_index.x) | (bit(leaf_relative_index.y) << 1) | (bit(leaf_relative_index.z) << 2)
}

/// A single non-hashed, non-wavelet octree: one global root, leaves
/// store raw log-odds directly with no compression. Included for
/// config-tag completeness; no integrator targets it.
#[derive(Clone, Debug, Default)]
pub struct VolumetricOctree {
    config: VolumetricDataStructureConfig,
    root: OctreeLeafNode,
}

#[derive(Clone, Debug, Default)]
struct OctreeLeafNode {
    value: f32,
    children: [Option<Box<OctreeLeafNode>>; 8],
}

impl VolumetricOctree {
    pub fn new(config: VolumetricDataStructureConfig) -> Self {
        Self {
            config,
            root: OctreeLeafNode::default(),
        }
    }

    pub fn get(&self, index: Index3D) -> f32 {
        let relative = leaf_relative_index(index, self.config.tree_height);
        let mut node = &self.root;
        let mut height = self.config.tree_height;
        loop {
            if height == 0 {
                return node.value;
            }
            height -= 1;
            let child_idx = relative_child_at_height(relative, height);
            match &node.children[child_idx as usize] {
                Some(child) => node = child,
                None => return node.value,
            }
        }
    }

    pub fn set(&mut self, index: Index3D, value: f32) {
        let relative = leaf_relative_index(index, self.config.tree_height);
        let mut node = &mut self.root;
        let mut height = self.config.tree_height;
        loop {
            if height == 0 {
                node.value = value;
                return;
            }
            height -= 1;
            let child_idx = relative_child_at_height(relative, height) as usize;
            let parent_value = node.value;
            node = node.children[child_idx].get_or_insert_with(|| {
                Box::new(OctreeLeafNode {
                    value: parent_value,
                    children: Default::default(),
                })
            });
        }
    }
}

impl OccupancyField for VolumetricOctree {
    fn get_cell_value(&self, index: Index3D) -> f32 {
        self.get(index)
    }

    fn min_cell_width(&self) -> f32 {
        self.config.min_cell_width
    }

    fn iterate_blocks(&self) -> Vec<Index3D> {
        vec![Index3D::ZERO]
    }
}

/// A single non-hashed wavelet octree: reuses [`Block`]'s wavelet tree
/// type, but without an outer block-coordinate hash map.
#[derive(Clone, Debug)]
pub struct WaveletOctreeMap {
    config: VolumetricDataStructureConfig,
    block: Block,
}

impl WaveletOctreeMap {
    pub fn new(config: VolumetricDataStructureConfig) -> Self {
        Self {
            config,
            block: Block::new(),
        }
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn block_mut(&mut self) -> &mut Block {
        &mut self.block
    }
}

impl OccupancyField for WaveletOctreeMap {
    fn get_cell_value(&self, index: Index3D) -> f32 {
        let relative = leaf_relative_index(index, self.config.tree_height);
        read_leaf_scale(
            self.block.root_scale(),
            self.block.root_node(),
            relative,
            self.config.tree_height,
        )
    }

    fn min_cell_width(&self) -> f32 {
        self.config.min_cell_width
    }

    fn iterate_blocks(&self) -> Vec<Index3D> {
        vec![Index3D::ZERO]
    }
}

/// The map from block-coordinate to [`Block`], specialized to the
/// hashed wavelet octree variant. This is the only variant the
/// integrator targets.
#[derive(Clone, Debug)]
pub struct HashedWaveletOctree {
    config: VolumetricDataStructureConfig,
    blocks: BlockMap,
}

impl HashedWaveletOctree {
    pub fn new(config: VolumetricDataStructureConfig) -> Self {
        Self {
            config,
            blocks: DashMap::new(),
        }
    }

    pub fn config(&self) -> VolumetricDataStructureConfig {
        self.config
    }

    pub fn blocks(&self) -> &BlockMap {
        &self.blocks
    }

    pub fn has_block(&self, block_coordinate: Index3D) -> bool {
        self.blocks.contains_key(&block_coordinate)
    }

    pub fn block_root_scale(&self, block_coordinate: Index3D) -> Option<f32> {
        self.blocks.get(&block_coordinate).map(|b| b.root_scale())
    }

    /// The `OctreeIndex` of a top-level block's root, at height `H`.
    pub fn block_root_index(&self, block_coordinate: Index3D) -> OctreeIndex {
        OctreeIndex::new(self.config.tree_height, block_coordinate)
    }
}

impl OccupancyField for HashedWaveletOctree {
    fn get_cell_value(&self, index: Index3D) -> f32 {
        let block_coordinate = block_coordinate_of(index, self.config.tree_height);
        match self.blocks.get(&block_coordinate) {
            Some(block) => {
                let relative = leaf_relative_index(index, self.config.tree_height);
                read_leaf_scale(
                    block.root_scale(),
                    block.root_node(),
                    relative,
                    self.config.tree_height,
                )
            }
            None => 0.0,
        }
    }

    fn min_cell_width(&self) -> f32 {
        self.config.min_cell_width
    }

    fn iterate_blocks(&self) -> Vec<Index3D> {
        self.blocks.iter().map(|entry| *entry.key()).collect()
    }
}

/// Dense per-block ESDF/occupancy storage: a flat `f32` array of
/// `cells_per_side^3` cells per block, no wavelet compression. Used both
/// as the generic `HashedBlocks` config tag and, concretely, as the
/// ESDF's own representation.
#[derive(Clone, Debug)]
pub struct HashedBlocksMap {
    config: VolumetricDataStructureConfig,
    blocks: DashMap<Index3D, Vec<f32>>,
}

impl HashedBlocksMap {
    pub fn new(config: VolumetricDataStructureConfig) -> Self {
        Self {
            config,
            blocks: DashMap::new(),
        }
    }

    pub fn config(&self) -> VolumetricDataStructureConfig {
        self.config
    }

    pub fn cells_per_side(&self) -> usize {
        cells_per_side(self.config.tree_height)
    }

    pub fn cells_per_block(&self) -> usize {
        cells_per_block(self.config.tree_height)
    }

    pub fn blocks(&self) -> &DashMap<Index3D, Vec<f32>> {
        &self.blocks
    }

    fn locate(&self, index: Index3D) -> (Index3D, usize) {
        let side = self.cells_per_side() as i32;
        let block_coordinate = Index3D::new(
            index.x.div_euclid(side),
            index.y.div_euclid(side),
            index.z.div_euclid(side),
        );
        let relative = Index3D::new(
            index.x.rem_euclid(side),
            index.y.rem_euclid(side),
            index.z.rem_euclid(side),
        );
        (block_coordinate, index_to_linear_index(relative, side as usize))
    }

    pub fn get(&self, index: Index3D) -> f32 {
        let (block_coordinate, linear) = self.locate(index);
        self.blocks
            .get(&block_coordinate)
            .map(|cells| cells[linear])
            .unwrap_or(f32::INFINITY)
    }

    pub fn set(&self, index: Index3D, value: f32) {
        let (block_coordinate, linear) = self.locate(index);
        let mut cells = self
            .blocks
            .entry(block_coordinate)
            .or_insert_with(|| vec![f32::INFINITY; self.cells_per_block()]);
        cells[linear] = value;
    }

    pub fn compute_index_from_block_and_cell(&self, block_coordinate: Index3D, cell_index: Index3D) -> Index3D {
        block_coordinate
            .shift_left(self.config.tree_height as u32)
            .add(cell_index)
    }

    pub fn cell_index_from_linear(&self, linear: usize) -> Index3D {
        linear_index_to_index(linear, self.cells_per_side())
    }
}

impl OccupancyField for HashedBlocksMap {
    fn get_cell_value(&self, index: Index3D) -> f32 {
        self.get(index)
    }

    fn min_cell_width(&self) -> f32 {
        self.config.min_cell_width
    }

    fn iterate_blocks(&self) -> Vec<Index3D> {
        self.blocks.iter().map(|entry| *entry.key()).collect()
    }
}

/// Which concrete body a [`VolumetricDataStructure`] holds, surfaced to
/// the host as the config tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VolumetricDataStructureType {
    HashedBlocks,
    Octree,
    WaveletOctree,
    HashedWaveletOctree,
}

impl VolumetricDataStructureType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HashedBlocks => "HashedBlocks",
            Self::Octree => "Octree",
            Self::WaveletOctree => "WaveletOctree",
            Self::HashedWaveletOctree => "HashedWaveletOctree",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "HashedBlocks" => Some(Self::HashedBlocks),
            "Octree" => Some(Self::Octree),
            "WaveletOctree" => Some(Self::WaveletOctree),
            "HashedWaveletOctree" => Some(Self::HashedWaveletOctree),
            _ => None,
        }
    }
}

/// The host-facing tagged variant: any of the four data-structure
/// bodies, behind one capability trait.
#[derive(Clone, Debug)]
pub enum VolumetricDataStructure {
    HashedBlocks(HashedBlocksMap),
    Octree(VolumetricOctree),
    WaveletOctree(WaveletOctreeMap),
    HashedWaveletOctree(HashedWaveletOctree),
}

impl VolumetricDataStructure {
    pub fn type_tag(&self) -> VolumetricDataStructureType {
        match self {
            Self::HashedBlocks(_) => VolumetricDataStructureType::HashedBlocks,
            Self::Octree(_) => VolumetricDataStructureType::Octree,
            Self::WaveletOctree(_) => VolumetricDataStructureType::WaveletOctree,
            Self::HashedWaveletOctree(_) => VolumetricDataStructureType::HashedWaveletOctree,
        }
    }

    pub fn as_occupancy_field(&self) -> &dyn OccupancyField {
        match self {
            Self::HashedBlocks(m) => m,
            Self::Octree(m) => m,
            Self::WaveletOctree(m) => m,
            Self::HashedWaveletOctree(m) => m,
        }
    }

    /// Declines anything but the hashed wavelet octree variant: the
    /// integrator is specialized to it and refuses other inputs with
    /// [`MapError::TypeMismatch`].
    pub fn as_hashed_wavelet_octree(&self) -> Result<&HashedWaveletOctree, MapError> {
        match self {
            Self::HashedWaveletOctree(m) => Ok(m),
            other => Err(MapError::TypeMismatch {
                expected: "HashedWaveletOctree",
                found: other.type_tag().as_str(),
            }),
        }
    }

    pub fn as_hashed_blocks(&self) -> Result<&HashedBlocksMap, MapError> {
        match self {
            Self::HashedBlocks(m) => Ok(m),
            other => Err(MapError::TypeMismatch {
                expected: "HashedBlocks",
                found: other.type_tag().as_str(),
            }),
        }
    }
}
