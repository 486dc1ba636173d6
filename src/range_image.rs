//! Range-image intersector: classifies an AABB against a posed range
//! image, via a hierarchical min/max summary built once per frame.

use std::sync::Arc;

use crate::geometry::{Aabb, Index3D, Pose};
use crate::measurement::MeasurementModel;
use crate::projection::ProjectionModel;

/// Classification of a cell against the current frame's range image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UpdateType {
    /// The sensor could not have observed this region at all this frame.
    FullyUnobserved,
    /// Every measurement in the relevant image region is strictly
    /// beyond (or, with no valid readings at all, absent from) this
    /// region: it contributes only free-space evidence, or none.
    FreeOrUnknown,
    /// At least one measurement could plausibly terminate inside this
    /// region.
    PossiblyOccupied,
}

/// A 2-D image of distances plus the pose it was captured from.
pub struct PosedRangeImage {
    pose: Pose,
    num_rows: usize,
    num_columns: usize,
    /// Row-major ranges; `f32::INFINITY` marks "no return" (no obstacle
    /// within sensor range along that ray), never contributing evidence
    /// for either occupancy or free space beyond what its absence
    /// implies.
    ranges: Vec<f32>,
    projection_model: Arc<dyn ProjectionModel>,
}

impl PosedRangeImage {
    pub fn new(pose: Pose, ranges: Vec<f32>, projection_model: Arc<dyn ProjectionModel>) -> Self {
        let (num_rows, num_columns) = projection_model.image_dims();
        assert_eq!(
            ranges.len(),
            num_rows * num_columns,
            "range buffer size must match the projection model's image dimensions"
        );
        Self {
            pose,
            num_rows,
            num_columns,
            ranges,
            projection_model,
        }
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn origin(&self) -> crate::geometry::Point3D {
        self.pose.origin()
    }

    pub fn rotation_matrix_inverse(&self) -> &nalgebra::Matrix3<f32> {
        self.pose.rotation_matrix_inverse()
    }

    pub fn pose_inverse(&self) -> crate::geometry::PoseInverse<'_> {
        self.pose.inverse()
    }

    pub fn projection_model(&self) -> &dyn ProjectionModel {
        self.projection_model.as_ref()
    }

    pub fn range_at(&self, row: usize, col: usize) -> f32 {
        self.ranges[row * self.num_columns + col]
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }
}

/// Hierarchical min/max quad-pyramid over a range image, built once per
/// frame in O(N) pixels; each query then combines O(1) cells.
struct MinMaxPyramid {
    /// `levels[0]` is the full-resolution image (rows x cols); each
    /// subsequent level halves both dimensions (rounding up), storing
    /// per-cell `(min, max)` over the 2x2 block of finer cells below it.
    levels: Vec<Level>,
}

struct Level {
    rows: usize,
    cols: usize,
    cells: Vec<(f32, f32)>,
}

impl Level {
    fn at(&self, row: usize, col: usize) -> (f32, f32) {
        let row = row.min(self.rows - 1);
        let col = col.min(self.cols - 1);
        self.cells[row * self.cols + col]
    }
}

impl MinMaxPyramid {
    fn build(range_image: &PosedRangeImage) -> Self {
        let mut levels = Vec::new();
        let base_cells: Vec<(f32, f32)> = range_image
            .ranges
            .iter()
            .map(|&r| if r.is_finite() && r > 0.0 { (r, r) } else { (f32::INFINITY, f32::NEG_INFINITY) })
            .collect();
        levels.push(Level {
            rows: range_image.num_rows,
            cols: range_image.num_columns,
            cells: base_cells,
        });

        loop {
            let prev = levels.last().unwrap();
            if prev.rows <= 1 && prev.cols <= 1 {
                break;
            }
            let rows = prev.rows.div_ceil(2);
            let cols = prev.cols.div_ceil(2);
            let mut cells = Vec::with_capacity(rows * cols);
            for r in 0..rows {
                for c in 0..cols {
                    let mut lo = f32::INFINITY;
                    let mut hi = f32::NEG_INFINITY;
                    for dr in 0..2 {
                        for dc in 0..2 {
                            let (cmin, cmax) = prev.at(2 * r + dr, 2 * c + dc);
                            lo = lo.min(cmin);
                            hi = hi.max(cmax);
                        }
                    }
                    cells.push((lo, hi));
                }
            }
            levels.push(Level { rows, cols, cells });
        }
        Self { levels }
    }

    /// Returns `(r_min, r_max)` over the continuous rectangle
    /// `[u_min, u_max] x [v_min, v_max]` (image-space pixel coordinates).
    /// Picks the coarsest level at which the rectangle spans at most a
    /// small, bounded number of cells, so the query cost does not grow
    /// with image resolution.
    fn query(&self, u_min: f32, u_max: f32, v_min: f32, v_max: f32) -> (f32, f32) {
        let u_min = u_min.max(0.0);
        let v_min = v_min.max(0.0);
        let u_span = (u_max - u_min).max(1.0);
        let v_span = (v_max - v_min).max(1.0);
        let level_index = level_for_extent(u_span.max(v_span)).min(self.levels.len() - 1);
        let level = &self.levels[level_index];
        let scale = (1usize << level_index) as f32;
        let col_start = (u_min / scale).floor() as usize;
        let col_end = (u_max / scale).floor() as usize;
        let row_start = (v_min / scale).floor() as usize;
        let row_end = (v_max / scale).floor() as usize;
        let mut lo = f32::INFINITY;
        let mut hi = f32::NEG_INFINITY;
        for r in row_start..=row_end {
            for c in col_start..=col_end {
                let (cmin, cmax) = level.at(r, c);
                lo = lo.min(cmin);
                hi = hi.max(cmax);
            }
        }
        (lo, hi)
    }
}

fn level_for_extent(extent: f32) -> usize {
    if extent <= 1.0 {
        0
    } else {
        extent.log2().ceil() as usize
    }
}

/// Built once per frame: wraps a [`PosedRangeImage`] with its
/// hierarchical min/max summary and classifies AABBs against it.
pub struct RangeImageIntersector<'a> {
    range_image: &'a PosedRangeImage,
    pyramid: MinMaxPyramid,
    occupancy_band: f32,
}

impl<'a> RangeImageIntersector<'a> {
    pub fn new(range_image: &'a PosedRangeImage, measurement_model: &dyn MeasurementModel) -> Self {
        Self {
            range_image,
            pyramid: MinMaxPyramid::build(range_image),
            occupancy_band: measurement_model.occupancy_band(),
        }
    }

    pub fn determine_update_type(&self, aabb: Aabb) -> UpdateType {
        let pose = self.range_image.pose();
        let projection_model = self.range_image.projection_model();

        let mut u_min = f32::INFINITY;
        let mut u_max = f32::NEG_INFINITY;
        let mut v_min = f32::INFINITY;
        let mut v_max = f32::NEG_INFINITY;
        let mut d_min = f32::INFINITY;
        let mut d_max = f32::NEG_INFINITY;
        let mut any_visible = false;

        for corner in aabb.corners() {
            let sensor_point = pose.world_to_sensor(corner);
            let depth = projection_model.cartesian_to_sensor_z(sensor_point);
            if depth.is_finite() {
                d_min = d_min.min(depth);
                d_max = d_max.max(depth);
            }
            if let Some(coord) = projection_model.project(sensor_point) {
                any_visible = true;
                u_min = u_min.min(coord.u);
                u_max = u_max.max(coord.u);
                v_min = v_min.min(coord.v);
                v_max = v_max.max(coord.v);
            }
        }

        if !any_visible || !d_min.is_finite() || !d_max.is_finite() {
            return UpdateType::FullyUnobserved;
        }

        let (r_min, r_max) = self.pyramid.query(u_min, u_max, v_min, v_max);

        if d_min > r_max + self.occupancy_band {
            UpdateType::FullyUnobserved
        } else if d_max < r_min - self.occupancy_band {
            UpdateType::FreeOrUnknown
        } else {
            UpdateType::PossiblyOccupied
        }
    }
}

/// The world-space AABB of every block that could possibly be affected
/// by this frame: the sensor origin's bounding region expanded by the
/// sensor's maximum range, used as the synthetic root for block
/// discovery.
pub fn frame_bounding_aabb(range_image: &PosedRangeImage, max_range: f32) -> Aabb {
    let origin = range_image.origin();
    Aabb::new(origin, origin).expand(max_range)
}

/// Rounds a world-space AABB up to the smallest power-of-two-aligned
/// block grid region (in block coordinates) that contains it, for a
/// given block side length in world units.
pub fn aabb_to_block_range(aabb: Aabb, block_world_width: f32) -> (Index3D, Index3D) {
    let min = Index3D::new(
        (aabb.min.x / block_world_width).floor() as i32,
        (aabb.min.y / block_world_width).floor() as i32,
        (aabb.min.z / block_world_width).floor() as i32,
    );
    let max = Index3D::new(
        (aabb.max.x / block_world_width).ceil() as i32,
        (aabb.max.y / block_world_width).ceil() as i32,
        (aabb.max.z / block_world_width).ceil() as i32,
    );
    (min, max)
}
