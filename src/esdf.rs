//! Euclidean signed distance field generation: a bounded, Jacobi-style
//! wavefront propagation from a dense [`HashedBlocksMap`].
//!
//! This runs as a one-shot batch pass over a whole map rather than an
//! incremental per-frame update, so a simple bounded fixed-point sweep
//! is the right trade-off over a priority-queue wavefront (Dijkstra /
//! fast marching): it only ever runs a bounded number of times relative
//! to `max_distance / min_cell_width`.

use std::collections::{HashMap, HashSet};

use crate::config::{EsdfConfig, VolumetricDataStructureConfig};
use crate::geometry::{linear_index_to_index, Index3D};
use crate::variant::{cells_per_side, HashedBlocksMap, OccupancyField};

const NEIGHBOR_OFFSETS: [Index3D; 6] = [
    Index3D { x: 1, y: 0, z: 0 },
    Index3D { x: -1, y: 0, z: 0 },
    Index3D { x: 0, y: 1, z: 0 },
    Index3D { x: 0, y: -1, z: 0 },
    Index3D { x: 0, y: 0, z: 1 },
    Index3D { x: 0, y: 0, z: -1 },
];

/// Generates a dense ESDF over every cell materialized in `occupancy`
/// (the obstacle seeds) and the halo of free cells within
/// `esdf_config.max_distance` of them.
///
/// `tree_height` must be the block height `occupancy` itself was built
/// with — the only [`OccupancyField`] method that's cheap enough to
/// call once per cell is [`OccupancyField::get_cell_value`], so the
/// block geometry has to be supplied, not rediscovered.
pub fn generate_esdf(
    occupancy: &dyn OccupancyField,
    tree_height: u8,
    esdf_config: EsdfConfig,
) -> HashedBlocksMap {
    let cell_width = occupancy.min_cell_width();
    let side = cells_per_side(tree_height) as i32;

    let result_config = VolumetricDataStructureConfig {
        min_cell_width: cell_width,
        tree_height,
    };
    let block_coordinates = occupancy.iterate_blocks();
    if block_coordinates.is_empty() {
        log::debug!("esdf generation found no materialized blocks; returning an empty field");
        return HashedBlocksMap::new(result_config);
    }

    let mut distances: HashMap<Index3D, f32> = HashMap::new();
    let mut active: HashSet<Index3D> = HashSet::new();

    for &block_coordinate in &block_coordinates {
        for linear in 0..(side * side * side) as usize {
            let local = linear_index_to_index(linear, side as usize);
            let global = block_coordinate.shift_left(tree_height as u32).add(local);
            if occupancy.get_cell_value(global) > esdf_config.occupancy_threshold {
                distances.insert(global, 0.0);
                active.insert(global);
            }
        }
    }

    if !active.is_empty() {
        let max_sweeps = (esdf_config.max_distance / cell_width).ceil() as usize + 1;
        for _ in 0..max_sweeps {
            if active.is_empty() {
                break;
            }
            let mut candidates: Vec<(Index3D, f32)> = Vec::new();
            for &cell in &active {
                let d = distances[&cell];
                let candidate = d + cell_width;
                if candidate > esdf_config.max_distance {
                    continue;
                }
                for offset in NEIGHBOR_OFFSETS {
                    candidates.push((cell.add(offset), candidate));
                }
            }

            let mut next_active = HashSet::new();
            for (cell, candidate) in candidates {
                let current = *distances.get(&cell).unwrap_or(&f32::INFINITY);
                if candidate + esdf_config.convergence_tolerance < current {
                    distances.insert(cell, candidate);
                    next_active.insert(cell);
                }
            }
            active = next_active;
        }
    }

    // Every cell of every materialized block starts at `max_distance`;
    // only cells the wavefront actually reached get a smaller value.
    let result = HashedBlocksMap::new(result_config);
    for block_coordinate in block_coordinates.iter().copied() {
        for linear in 0..(side * side * side) as usize {
            let local = linear_index_to_index(linear, side as usize);
            let global = block_coordinate.shift_left(tree_height as u32).add(local);
            let distance = distances.get(&global).copied().unwrap_or(esdf_config.max_distance);
            result.set(global, distance.min(esdf_config.max_distance));
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a `HashedBlocksMap` (itself an `OccupancyField`) covering
    /// block `(0,0,0)` with every cell free except the one given, which
    /// is marked occupied — a minimal, exact-control obstacle map for
    /// exercising propagation.
    fn single_obstacle_field(config: VolumetricDataStructureConfig, obstacle: Index3D) -> HashedBlocksMap {
        let field = HashedBlocksMap::new(config);
        let side = cells_per_side(config.tree_height) as i32;
        for x in 0..side {
            for y in 0..side {
                for z in 0..side {
                    let cell = Index3D::new(x, y, z);
                    field.set(cell, if cell == obstacle { 5.0 } else { -1.0 });
                }
            }
        }
        field
    }

    #[test]
    fn single_obstacle_produces_growing_distance_field() {
        let config = VolumetricDataStructureConfig {
            min_cell_width: 1.0,
            tree_height: 2,
        };
        let occupancy = single_obstacle_field(config, Index3D::ZERO);

        let esdf_config = EsdfConfig {
            occupancy_threshold: 0.0,
            max_distance: 3.0,
            convergence_tolerance: 1e-3,
        };
        let esdf = generate_esdf(&occupancy, config.tree_height, esdf_config);

        assert_eq!(esdf.get(Index3D::ZERO), 0.0);
        let near = esdf.get(Index3D::new(1, 0, 0));
        let far = esdf.get(Index3D::new(2, 0, 0));
        assert!(near < far || far == esdf_config.max_distance);
    }

    #[test]
    fn unreached_cell_reads_max_distance_not_infinity() {
        let config = VolumetricDataStructureConfig {
            min_cell_width: 1.0,
            tree_height: 3,
        };
        let occupancy = single_obstacle_field(config, Index3D::ZERO);

        let esdf_config = EsdfConfig {
            occupancy_threshold: 0.0,
            max_distance: 2.0,
            convergence_tolerance: 1e-3,
        };
        let esdf = generate_esdf(&occupancy, config.tree_height, esdf_config);

        assert_eq!(esdf.get(Index3D::new(3, 0, 0)), 2.0);
    }

    #[test]
    fn empty_map_yields_empty_esdf() {
        let config = VolumetricDataStructureConfig::default();
        let occupancy = HashedBlocksMap::new(config);
        let esdf_config = EsdfConfig::default();
        let esdf = generate_esdf(&occupancy, config.tree_height, esdf_config);
        assert!(esdf.blocks().is_empty());
    }

    #[test]
    fn distances_are_clamped_to_max_distance() {
        let config = VolumetricDataStructureConfig {
            min_cell_width: 1.0,
            tree_height: 2,
        };
        let occupancy = single_obstacle_field(config, Index3D::ZERO);
        let esdf_config = EsdfConfig {
            occupancy_threshold: 0.0,
            max_distance: 1.5,
            convergence_tolerance: 1e-3,
        };
        let esdf = generate_esdf(&occupancy, config.tree_height, esdf_config);
        for entry in esdf.blocks().iter() {
            for &v in entry.value() {
                assert!(v <= esdf_config.max_distance + 1e-6);
            }
        }
    }
}
