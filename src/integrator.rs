//! Hashed wavelet integrator: fuses one posed range image into a
//! [`HashedWaveletOctree`], coarse to fine.
//!
//! Two recursions, one for job discovery and one for per-block
//! compression:
//!
//! - [`discover_blocks`]: descends a synthetic octree over block
//!   coordinates from a root covering the whole frame, pruning any
//!   subtree the range image could not have observed at all.
//! - `update_node_recursive`: within one block, a parent-owned
//!   recursion that reconstructs its 8 children's scale coefficients
//!   via the inverse wavelet transform, mutates the one it needs to
//!   refine into, and re-compresses on the way back up. Refinement
//!   stops — applying the update directly to the coarse scale
//!   coefficient, which (being the children's mean) shifts every
//!   descendant uniformly — once the measurement model's worst-case
//!   approximation error over the cell drops below
//!   [`crate::config::IntegratorConfig::termination_update_error`], or
//!   the configured termination height, or an actual leaf is reached.

use std::sync::Arc;

use rayon::prelude::*;

use crate::block::{Block, OctreeNode};
use crate::config::IntegratorConfig;
use crate::error::MapError;
use crate::geometry::{node_index_to_aabb, Aabb, Index3D, OctreeIndex, Point3D, UNIT_CUBE_HALF_DIAGONAL};
use crate::measurement::{self, MeasurementModel};
use crate::projection::ProjectionModel;
use crate::range_image::{aabb_to_block_range, frame_bounding_aabb, PosedRangeImage, RangeImageIntersector, UpdateType};
use crate::transform;
use crate::variant::{cells_per_side, HashedWaveletOctree, VolumetricDataStructure};

/// Fuses posed range images into a [`VolumetricDataStructure`] holding a
/// `HashedWaveletOctree` body; declines any other variant.
pub struct HashedWaveletIntegrator {
    config: IntegratorConfig,
    measurement_model: Arc<dyn MeasurementModel>,
}

impl HashedWaveletIntegrator {
    pub fn new(config: IntegratorConfig, measurement_model: Arc<dyn MeasurementModel>) -> Self {
        Self {
            config,
            measurement_model,
        }
    }

    pub fn config(&self) -> IntegratorConfig {
        self.config
    }

    /// Integrates one frame. `max_range` bounds the region of the map
    /// that could possibly be touched, used to size the job-discovery
    /// root.
    pub fn integrate_frame(
        &self,
        map: &VolumetricDataStructure,
        range_image: &PosedRangeImage,
        max_range: f32,
    ) -> Result<(), MapError> {
        let hashed = map.as_hashed_wavelet_octree()?;
        let config = hashed.config();
        let block_world_width = config.min_cell_width * cells_per_side(config.tree_height) as f32;
        let intersector = RangeImageIntersector::new(range_image, self.measurement_model.as_ref());
        let frame_aabb = frame_bounding_aabb(range_image, max_range);

        let jobs = discover_blocks(frame_aabb, block_world_width, &intersector, hashed, &self.config);
        log::debug!("frame touches {} candidate block(s)", jobs.len());

        let ctx = UpdateContext {
            min_cell_width: config.min_cell_width,
            integrator_config: self.config,
            intersector: &intersector,
            measurement_model: self.measurement_model.as_ref(),
            projection_model: range_image.projection_model(),
            range_image,
        };

        jobs.par_iter().for_each(|block_coordinate| {
            let mut block = hashed.blocks().entry(*block_coordinate).or_insert_with(Block::new);
            let block_root_index = OctreeIndex::new(config.tree_height, *block_coordinate);
            let mut scale = block.root_scale();
            update_node_recursive(&mut scale, block.root_node_slot_mut(), block_root_index, &ctx);
            block.set_root_scale(scale);
        });

        Ok(())
    }
}

struct UpdateContext<'a> {
    min_cell_width: f32,
    integrator_config: IntegratorConfig,
    intersector: &'a RangeImageIntersector<'a>,
    measurement_model: &'a dyn MeasurementModel,
    projection_model: &'a dyn ProjectionModel,
    range_image: &'a PosedRangeImage,
}

/// Finds every block a frame might have observed, at the block's own
/// (coarse) resolution; fine-grained reclassification happens again per
/// cell inside `update_node_recursive`, since a block-level "possibly
/// occupied" can still resolve to "fully unobserved" for an individual
/// child.
pub fn discover_blocks(
    frame_aabb: Aabb,
    block_world_width: f32,
    intersector: &RangeImageIntersector,
    occupancy: &HashedWaveletOctree,
    integrator_config: &IntegratorConfig,
) -> Vec<Index3D> {
    let (min_block, max_block) = aabb_to_block_range(frame_aabb, block_world_width);
    let extent = (max_block.x - min_block.x)
        .max(max_block.y - min_block.y)
        .max(max_block.z - min_block.z)
        .max(1);
    let root_height = (extent as f32).log2().ceil() as u8 + 1;
    let root_side = 1_i32 << root_height;
    let root_position = Index3D::new(
        min_block.x.div_euclid(root_side),
        min_block.y.div_euclid(root_side),
        min_block.z.div_euclid(root_side),
    );
    let root_index = OctreeIndex::new(root_height, root_position);

    let mut jobs = Vec::new();
    recursive_tester(root_index, block_world_width, intersector, occupancy, integrator_config, &mut jobs);
    jobs
}

/// Descends the block-address octree, pruning any subtree whose world
/// AABB the current frame could not have observed at all. At the block
/// leaf, a "free or unknown" classification is additionally pruned
/// unless the block already exists and is not yet saturated free — a
/// never-before-seen free region has nothing to gain from being
/// materialized.
fn recursive_tester(
    node_index: OctreeIndex,
    block_world_width: f32,
    intersector: &RangeImageIntersector,
    occupancy: &HashedWaveletOctree,
    integrator_config: &IntegratorConfig,
    jobs: &mut Vec<Index3D>,
) {
    let aabb = node_index_to_aabb(node_index, block_world_width);
    let update_type = intersector.determine_update_type(aabb);
    if update_type == UpdateType::FullyUnobserved {
        return;
    }
    if node_index.height == 0 {
        if update_type == UpdateType::FreeOrUnknown
            && !is_fresh_enough_to_revisit(occupancy, node_index.position, integrator_config)
        {
            return;
        }
        jobs.push(node_index.position);
        return;
    }
    for child in node_index.compute_child_indices() {
        recursive_tester(child, block_world_width, intersector, occupancy, integrator_config, jobs);
    }
}

/// A free-or-unknown block is worth visiting only if it already exists
/// and has not yet settled into the saturated-free band — matches the
/// shortcut `update_node_recursive` itself takes once a node settles
/// there.
fn is_fresh_enough_to_revisit(occupancy: &HashedWaveletOctree, block_coordinate: Index3D, cfg: &IntegratorConfig) -> bool {
    match occupancy.block_root_scale(block_coordinate) {
        Some(root_scale) => root_scale > cfg.min_log_odds + cfg.noise_threshold / 10.0,
        None => false,
    }
}

/// Owns `scale`, the reconstructed scale coefficient this node's parent
/// handed down, and `node_slot`, the storage for this node's own 7
/// detail coefficients and children.
fn update_node_recursive(
    scale: &mut f32,
    node_slot: &mut Option<Box<OctreeNode>>,
    node_index: OctreeIndex,
    ctx: &UpdateContext,
) {
    let aabb = node_index_to_aabb(node_index, ctx.min_cell_width);
    let update_type = ctx.intersector.determine_update_type(aabb);
    if update_type == UpdateType::FullyUnobserved {
        return;
    }

    let cfg = ctx.integrator_config;
    if update_type == UpdateType::FreeOrUnknown && *scale < cfg.min_log_odds + cfg.noise_threshold / 10.0 {
        // Already saturated free: another free-space update cannot move
        // the clamped value, so there is nothing to refine into.
        return;
    }

    let center = aabb.center();
    let sensor_point = ctx.range_image.pose().world_to_sensor(center);
    let rho = measurement::distance_to_sensor(sensor_point);
    let measured_range = sample_measured_range(ctx, sensor_point, rho, update_type);
    let update = ctx.measurement_model.compute_update(rho, measured_range);

    let width = aabb.width(0);
    let cell_radius = width * UNIT_CUBE_HALF_DIAGONAL;
    let error = ctx
        .measurement_model
        .worst_case_approximation_error(rho, cell_radius, measured_range);

    let terminate =
        node_index.height == 0 || node_index.height <= cfg.termination_height || error <= cfg.termination_update_error;

    if terminate {
        // A node with no children yet is a true leaf of what's been
        // built so far: clamp it the way a freshly-refined leaf would
        // be. A node that already has children from a prior frame
        // instead gets the update folded straight into its scale with
        // no clamp, so the shift is coherent with its existing
        // (unclamped) detail coefficients rather than distorting them.
        let is_leaf_or_unallocated = match node_slot.as_deref() {
            None => true,
            Some(node) => !node.has_at_least_one_child(),
        };
        let updated = *scale + update;
        *scale = if is_leaf_or_unallocated {
            updated.clamp(cfg.min_log_odds - cfg.noise_threshold, cfg.max_log_odds + cfg.noise_threshold)
        } else {
            updated
        };
        return;
    }

    let node = node_slot.get_or_insert_with(Box::default);
    let mut children = transform::backward(*scale, node.data());
    for relative in 0..8u8 {
        let child_index = node_index.compute_child_index(relative);
        update_node_recursive(
            &mut children[relative as usize],
            node.child_slot_mut(relative),
            child_index,
            ctx,
        );
    }
    let (new_scale, new_details) = transform::forward(children);
    node.set_data(new_details);
    *scale = new_scale;
}

/// Approximates the measured range at a cell center: projects it into
/// the range image and samples the nearest pixel; if the center itself
/// falls outside the field of view (even though the cell's AABB
/// partially intersected it), falls back to a value consistent with
/// the coarse classification already computed for this cell.
fn sample_measured_range(ctx: &UpdateContext, sensor_point: Point3D, rho: f32, update_type: UpdateType) -> f32 {
    if let Some(coord) = ctx.projection_model.project(sensor_point) {
        let row = (coord.v.round().max(0.0) as usize).min(ctx.range_image.num_rows().saturating_sub(1));
        let col = (coord.u.round().max(0.0) as usize).min(ctx.range_image.num_columns().saturating_sub(1));
        let r = ctx.range_image.range_at(row, col);
        if r.is_finite() && r > 0.0 {
            return r;
        }
    }
    match update_type {
        UpdateType::FreeOrUnknown => rho + 1.0e6,
        _ => rho,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VolumetricDataStructureConfig;
    use crate::geometry::Point3D;
    use crate::measurement::ContinuousBeamMeasurementModel;
    use crate::projection::SphericalProjectionModel;
    use crate::variant::{HashedWaveletOctree, OccupancyField};
    use nalgebra::Matrix3;

    fn identity_pose() -> crate::geometry::Pose {
        crate::geometry::Pose::new(Point3D::new(0.0, 0.0, 0.0), Matrix3::identity())
    }

    #[test]
    fn integrating_a_frame_marks_cells_in_front_of_surface_as_free() {
        let config = VolumetricDataStructureConfig {
            min_cell_width: 0.1,
            tree_height: 3,
        };
        let map = VolumetricDataStructure::HashedWaveletOctree(HashedWaveletOctree::new(config));

        let projection_model = Arc::new(SphericalProjectionModel::new(32, 64));
        let ranges = vec![2.0_f32; 32 * 64];
        let range_image = PosedRangeImage::new(identity_pose(), ranges, projection_model);

        let measurement_model: Arc<dyn MeasurementModel> = Arc::new(ContinuousBeamMeasurementModel::default());
        let integrator = HashedWaveletIntegrator::new(IntegratorConfig::default(), measurement_model);
        integrator.integrate_frame(&map, &range_image, 5.0).unwrap();

        let field = map.as_occupancy_field();
        let free_point = Point3D::new(1.0, 0.0, 0.0);
        let free_index = crate::geometry::point_to_nearest_index(free_point, 10.0);
        assert!(field.get_cell_value(free_index) < 0.0);
    }

    #[test]
    fn integrator_declines_non_hashed_wavelet_variants() {
        use crate::variant::VolumetricOctree;
        let config = VolumetricDataStructureConfig::default();
        let map = VolumetricDataStructure::Octree(VolumetricOctree::new(config));
        let projection_model = Arc::new(SphericalProjectionModel::new(8, 8));
        let ranges = vec![1.0_f32; 64];
        let range_image = PosedRangeImage::new(identity_pose(), ranges, projection_model);
        let measurement_model: Arc<dyn MeasurementModel> = Arc::new(ContinuousBeamMeasurementModel::default());
        let integrator = HashedWaveletIntegrator::new(IntegratorConfig::default(), measurement_model);
        let err = integrator.integrate_frame(&map, &range_image, 5.0).unwrap_err();
        assert!(matches!(err, MapError::TypeMismatch { .. }));
    }
}
