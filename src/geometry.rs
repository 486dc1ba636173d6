//! Spatial primitives: octree indices, child enumeration, world/index
//! conversions, axis-aligned boxes, and the small amount of rigid-body
//! algebra the rest of the crate needs.
//!
//! Vector/point types are `nalgebra` newtypes, following the lidar/voxel
//! octree indexers in the wider pack (e.g. `lidarserv`, `shocovox`) rather
//! than hand-rolling a tuple type.

use nalgebra::{Matrix3, Point3, Vector3};

pub type Point3D = Point3<f32>;
pub type Vector3D = Vector3<f32>;

/// Number of children of every non-leaf octree node.
pub const NUM_CHILDREN: usize = 8;

/// Half the diagonal length of a unit cube, i.e. the bounding-sphere
/// radius of a cell of width 1.
pub const UNIT_CUBE_HALF_DIAGONAL: f32 = 0.866_025_4; // sqrt(3) / 2

/// Integer block/cell coordinate. Signed so blocks can extend in any
/// direction from the sensor origin.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Index3D {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Index3D {
    pub const ZERO: Index3D = Index3D { x: 0, y: 0, z: 0 };

    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn from_array(a: [i32; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }

    pub fn to_array(self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }

    fn map(self, f: impl Fn(i32) -> i32) -> Self {
        Self::new(f(self.x), f(self.y), f(self.z))
    }

    pub fn add(self, rhs: Index3D) -> Index3D {
        Index3D::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    /// Component-wise arithmetic shift right by `shift`, used to move a
    /// fine index up to a coarser ancestor's index.
    pub fn shift_right(self, shift: u32) -> Index3D {
        self.map(|v| v >> shift)
    }

    pub fn shift_left(self, shift: u32) -> Index3D {
        self.map(|v| v << shift)
    }
}

/// Octree index `(h, p)`: height `h` (0 = leaf) and integer position `p`.
/// The cell it denotes is `[p * 2^h * w, (p+1) * 2^h * w)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OctreeIndex {
    pub height: u8,
    pub position: Index3D,
}

impl OctreeIndex {
    pub fn new(height: u8, position: Index3D) -> Self {
        Self { height, position }
    }

    /// The 8 children of this node, in the fixed 3-bit lexicographic order
    /// used throughout the crate: bit 0 = x, bit 1 = y, bit 2 = z.
    pub fn compute_child_indices(self) -> [OctreeIndex; NUM_CHILDREN] {
        debug_assert!(self.height > 0);
        std::array::from_fn(|relative| self.compute_child_index(relative as u8))
    }

    pub fn compute_child_index(self, relative_child_index: u8) -> OctreeIndex {
        debug_assert!(self.height > 0);
        debug_assert!((relative_child_index as usize) < NUM_CHILDREN);
        let base = self.position.shift_left(1);
        let offset = Index3D::new(
            (relative_child_index & 0b001) as i32,
            ((relative_child_index >> 1) & 0b001) as i32,
            ((relative_child_index >> 2) & 0b001) as i32,
        );
        OctreeIndex::new(self.height - 1, base.add(offset))
    }

    /// The parent's relative-child index for this node, i.e. the inverse
    /// of [`Self::compute_child_index`].
    pub fn compute_relative_child_index(self) -> u8 {
        let x = (self.position.x & 1) as u8;
        let y = (self.position.y & 1) as u8;
        let z = (self.position.z & 1) as u8;
        x | (y << 1) | (z << 2)
    }

    pub fn parent(self) -> OctreeIndex {
        OctreeIndex::new(self.height + 1, self.position.shift_right(1))
    }
}

/// An axis-aligned bounding box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb<P = Point3D> {
    pub min: P,
    pub max: P,
}

impl Aabb<Point3D> {
    pub fn new(min: Point3D, max: Point3D) -> Self {
        Self { min, max }
    }

    pub fn width(&self, axis: usize) -> f32 {
        self.max[axis] - self.min[axis]
    }

    pub fn center(&self) -> Point3D {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn contains_point(&self, p: Point3D) -> bool {
        (0..3).all(|axis| self.min[axis] <= p[axis] && p[axis] < self.max[axis])
    }

    /// The 8 AABB corners, in the same bit order as octree children.
    pub fn corners(&self) -> [Point3D; 8] {
        std::array::from_fn(|i| {
            Point3D::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            )
        })
    }

    pub fn expand(&self, margin: f32) -> Aabb<Point3D> {
        let m = Vector3D::new(margin, margin, margin);
        Aabb::new(self.min - m, self.max + m)
    }
}

/// Rigid-body world-from-sensor pose. `Rᵀ` (world-to-sensor rotation) is
/// cached since it is reused once per frame for every queried cell.
#[derive(Clone, Debug)]
pub struct Pose {
    origin: Point3D,
    rotation: Matrix3<f32>,
    rotation_inverse: Matrix3<f32>,
}

impl Pose {
    /// `rotation` must be orthonormal (world-from-sensor). Its transpose
    /// (= inverse, for a rotation matrix) is cached immediately.
    pub fn new(origin: Point3D, rotation: Matrix3<f32>) -> Self {
        let rotation_inverse = rotation.transpose();
        Self {
            origin,
            rotation,
            rotation_inverse,
        }
    }

    pub fn origin(&self) -> Point3D {
        self.origin
    }

    pub fn rotation_matrix_inverse(&self) -> &Matrix3<f32> {
        &self.rotation_inverse
    }

    /// Transforms a world-frame point into the sensor frame: `Rᵀ(x - O)`.
    pub fn world_to_sensor(&self, world_point: Point3D) -> Point3D {
        Point3D::from(self.rotation_inverse * (world_point - self.origin))
    }

    /// Transforms a sensor-frame point into the world frame: `R·x + O`.
    pub fn sensor_to_world(&self, sensor_point: Point3D) -> Point3D {
        Point3D::from(self.rotation * sensor_point.coords + self.origin.coords)
    }

    /// The rigid-body inverse pose, i.e. the sensor-to-world transform
    /// expressed as a world-origin pose (so applying it to a world point
    /// gives the sensor-frame point, matching `getPoseInverse()` in the
    /// original source).
    pub fn inverse(&self) -> PoseInverse<'_> {
        PoseInverse { pose: self }
    }
}

/// A thin wrapper exposing `Pose::world_to_sensor` as `operator*` would
/// read in the original C++ (`posed_range_image_->getPoseInverse() *
/// W_node_center`).
pub struct PoseInverse<'a> {
    pose: &'a Pose,
}

impl PoseInverse<'_> {
    pub fn apply(&self, world_point: Point3D) -> Point3D {
        self.pose.world_to_sensor(world_point)
    }
}

/// World coordinate of the minimum corner of octree cell `node_index`,
/// for a world with minimum cell width `min_cell_width`.
pub fn node_index_to_aabb(node_index: OctreeIndex, min_cell_width: f32) -> Aabb<Point3D> {
    let width = (1_i64 << node_index.height) as f32 * min_cell_width;
    let min = Point3D::new(
        node_index.position.x as f32 * width,
        node_index.position.y as f32 * width,
        node_index.position.z as f32 * width,
    );
    let max = min + Vector3D::new(width, width, width);
    Aabb::new(min, max)
}

pub fn node_index_to_center_point(node_index: OctreeIndex, min_cell_width: f32) -> Point3D {
    let aabb = node_index_to_aabb(node_index, min_cell_width);
    aabb.center()
}

/// Rounds a world point down to the leaf index that contains it, at a
/// given `cells_per_unit = 1 / min_cell_width`.
pub fn point_to_nearest_index(point: Point3D, cells_per_unit: f32) -> Index3D {
    Index3D::new(
        (point.x * cells_per_unit).floor() as i32,
        (point.y * cells_per_unit).floor() as i32,
        (point.z * cells_per_unit).floor() as i32,
    )
}

/// World-space center of a leaf cell at global `index`, for a world with
/// minimum cell width `min_cell_width`.
pub fn index_to_center_point(index: Index3D, min_cell_width: f32) -> Point3D {
    Point3D::new(
        (index.x as f32 + 0.5) * min_cell_width,
        (index.y as f32 + 0.5) * min_cell_width,
        (index.z as f32 + 0.5) * min_cell_width,
    )
}

/// Decomposes a linear index in `[0, side^3)` into a 3-D index in
/// `[0, side)^3`, row-major (x fastest).
pub fn linear_index_to_index(linear_index: usize, side: usize) -> Index3D {
    let x = linear_index % side;
    let y = (linear_index / side) % side;
    let z = linear_index / (side * side);
    Index3D::new(x as i32, y as i32, z as i32)
}

/// Inverse of [`linear_index_to_index`].
pub fn index_to_linear_index(index: Index3D, side: usize) -> usize {
    index.x as usize + side * (index.y as usize + side * index.z as usize)
}
