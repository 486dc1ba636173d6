//! Collision-free point sampler: rejection sampling against an
//! occupancy field, either within a caller-given region or over the
//! blocks currently materialized in the map.

use rand::Rng;

use crate::config::SamplerConfig;
use crate::geometry::{index_to_center_point, point_to_nearest_index, Aabb, Index3D, Point3D};
use crate::variant::{cells_per_side, OccupancyField};

/// Rejection-samples a 3-D position that is both unoccupied and at least
/// `robot_radius` away from the nearest obstacle, trying up to
/// `config.max_attempts` times. If `aabb` is given, candidates are drawn
/// uniformly from it; otherwise a candidate block is drawn uniformly
/// from whatever is currently materialized, then a cell within it.
/// Returns `None` once the attempt budget is exhausted, exactly as in
/// the original (no partial/best-effort result).
pub fn get_collision_free_position(
    occupancy: &dyn OccupancyField,
    esdf: &dyn OccupancyField,
    robot_radius: f32,
    tree_height: u8,
    aabb: Option<Aabb>,
    config: SamplerConfig,
    rng: &mut impl Rng,
) -> Option<Point3D> {
    for _ in 0..config.max_attempts {
        let candidate = match aabb {
            Some(aabb) => random_point_in_aabb(aabb, rng),
            None => random_materialized_point(occupancy, tree_height, rng)?,
        };
        if is_free(occupancy, esdf, robot_radius, candidate, config) {
            return Some(candidate);
        }
    }
    None
}

/// Rejection-samples a position free in a single fixed-`z` slice only.
///
/// This is a deliberate shortcut: only the cell at height `z` is
/// checked, so a returned point might still collide at a different
/// z if the obstacle only occupies part of the column — callers that
/// need true 3-D clearance should use [`get_collision_free_position`]
/// instead.
pub fn get_collision_free_2d_position(
    occupancy: &dyn OccupancyField,
    esdf: &dyn OccupancyField,
    robot_radius: f32,
    tree_height: u8,
    aabb: Option<Aabb>,
    z: f32,
    config: SamplerConfig,
    rng: &mut impl Rng,
) -> Option<Point3D> {
    for _ in 0..config.max_attempts {
        let candidate = match aabb {
            Some(aabb) => {
                let mut p = random_point_in_aabb(aabb, rng);
                p.z = z;
                p
            }
            None => {
                let mut p = random_materialized_point(occupancy, tree_height, rng)?;
                p.z = z;
                p
            }
        };
        if is_free(occupancy, esdf, robot_radius, candidate, config) {
            return Some(candidate);
        }
    }
    None
}

/// A candidate is accepted only if it reads as free in `occupancy` *and*
/// the ESDF reports at least `robot_radius` of clearance at that cell.
fn is_free(occupancy: &dyn OccupancyField, esdf: &dyn OccupancyField, robot_radius: f32, point: Point3D, config: SamplerConfig) -> bool {
    let cells_per_unit = 1.0 / occupancy.min_cell_width();
    let index = point_to_nearest_index(point, cells_per_unit);
    occupancy.get_cell_value(index) < config.free_threshold && esdf.get_cell_value(index) >= robot_radius
}

fn random_point_in_aabb(aabb: Aabb, rng: &mut impl Rng) -> Point3D {
    Point3D::new(
        rng.random_range(aabb.min.x..=aabb.max.x),
        rng.random_range(aabb.min.y..=aabb.max.y),
        rng.random_range(aabb.min.z..=aabb.max.z),
    )
}

fn random_materialized_point(occupancy: &dyn OccupancyField, tree_height: u8, rng: &mut impl Rng) -> Option<Point3D> {
    let blocks = occupancy.iterate_blocks();
    if blocks.is_empty() {
        return None;
    }
    let block_coordinate = blocks[rng.random_range(0..blocks.len())];
    let side = cells_per_side(tree_height) as i32;
    let cell = Index3D::new(
        rng.random_range(0..side),
        rng.random_range(0..side),
        rng.random_range(0..side),
    );
    let global = block_coordinate.shift_left(tree_height as u32).add(cell);
    Some(index_to_center_point(global, occupancy.min_cell_width()))
}
