//! End-to-end scenarios spanning job discovery, integration, ESDF
//! generation, and the collision-free sampler.

use std::sync::Arc;

use nalgebra::Matrix3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use volumetric_mapping::config::{EsdfConfig, IntegratorConfig, SamplerConfig, VolumetricDataStructureConfig};
use volumetric_mapping::esdf::generate_esdf;
use volumetric_mapping::geometry::{point_to_nearest_index, Index3D, Point3D, Pose};
use volumetric_mapping::integrator::HashedWaveletIntegrator;
use volumetric_mapping::measurement::{ContinuousBeamMeasurementModel, MeasurementModel};
use volumetric_mapping::projection::SphericalProjectionModel;
use volumetric_mapping::range_image::PosedRangeImage;
use volumetric_mapping::sampler::get_collision_free_position;
use volumetric_mapping::variant::{HashedBlocksMap, HashedWaveletOctree, OccupancyField, VolumetricDataStructure};

fn identity_pose() -> Pose {
  Pose::new(Point3D::new(0.0, 0.0, 0.0), Matrix3::identity())
}

fn single_ray_frame(range: f32) -> PosedRangeImage {
  let projection_model = Arc::new(SphericalProjectionModel::new(16, 32));
  let ranges = vec![range; 16 * 32];
  PosedRangeImage::new(identity_pose(), ranges, projection_model)
}

/// An empty map fused with one frame gains evidence both in front
/// of and at the measured surface.
#[test]
fn empty_map_single_frame_gains_free_and_occupied_evidence() {
  let config = VolumetricDataStructureConfig {
    min_cell_width: 0.1,
    tree_height: 5,
  };
  let map = VolumetricDataStructure::HashedWaveletOctree(HashedWaveletOctree::new(config));
  let range_image = single_ray_frame(2.0);
  let measurement_model: Arc<dyn MeasurementModel> = Arc::new(ContinuousBeamMeasurementModel::default());
  let integrator = HashedWaveletIntegrator::new(IntegratorConfig::default(), measurement_model);
  integrator.integrate_frame(&map, &range_image, 5.0).unwrap();

  let field = map.as_occupancy_field();
  let cells_per_unit = 1.0 / config.min_cell_width;

  let in_front = field.get_cell_value(point_to_nearest_index(Point3D::new(1.0, 0.0, 0.0), cells_per_unit));
  let at_surface = field.get_cell_value(point_to_nearest_index(Point3D::new(2.05, 0.0, 0.0), cells_per_unit));
  assert!(in_front < 0.0, "expected free-space evidence in front of the surface, got {in_front}");
  assert!(at_surface > 0.0, "expected occupied evidence at the measured surface, got {at_surface}");
}

/// Once a region is saturated free, a repeat free-space observation
/// is a no-op (the saturated-free shortcut in the integrator).
#[test]
fn saturated_free_region_is_unaffected_by_repeat_observation() {
  let config = VolumetricDataStructureConfig {
    min_cell_width: 0.1,
    tree_height: 4,
  };
  let map = VolumetricDataStructure::HashedWaveletOctree(HashedWaveletOctree::new(config));
  let measurement_model: Arc<dyn MeasurementModel> = Arc::new(ContinuousBeamMeasurementModel::default());
  let integrator_config = IntegratorConfig {
    min_log_odds: -0.5,
    ..Default::default()
  };
  let integrator = HashedWaveletIntegrator::new(integrator_config, measurement_model);

  for _ in 0..20 {
    let range_image = single_ray_frame(5.0);
    integrator.integrate_frame(&map, &range_image, 6.0).unwrap();
  }

  let field = map.as_occupancy_field();
  let cells_per_unit = 1.0 / config.min_cell_width;
  let index = point_to_nearest_index(Point3D::new(1.0, 0.0, 0.0), cells_per_unit);
  let saturated = field.get_cell_value(index);
  assert!((saturated - integrator_config.min_log_odds).abs() < 1e-3);
}

/// The ESDF around a single obstacle cell increases monotonically
/// with Manhattan distance from it, up to the configured cap.
#[test]
fn esdf_around_single_obstacle_increases_with_distance() {
  let config = VolumetricDataStructureConfig {
    min_cell_width: 0.2,
    tree_height: 3,
  };
  let occupancy = HashedBlocksMap::new(config);
  let side = volumetric_mapping::variant::cells_per_side(config.tree_height) as i32;
  for x in 0..side {
    for y in 0..side {
      for z in 0..side {
        let cell = Index3D::new(x, y, z);
        let obstacle = cell == Index3D::new(side / 2, side / 2, side / 2);
        occupancy.set(cell, if obstacle { 3.0 } else { -3.0 });
      }
    }
  }

  let esdf_config = EsdfConfig {
    occupancy_threshold: 0.0,
    max_distance: 1.0,
    convergence_tolerance: 1e-4,
  };
  let esdf = generate_esdf(&occupancy, config.tree_height, esdf_config);

  let center = Index3D::new(side / 2, side / 2, side / 2);
  let one_away = Index3D::new(side / 2 + 1, side / 2, side / 2);
  let two_away = Index3D::new(side / 2 + 2, side / 2, side / 2);

  assert_eq!(esdf.get(center), 0.0);
  let d1 = esdf.get(one_away);
  let d2 = esdf.get(two_away);
  assert!(d1 < d2 || d2 == esdf_config.max_distance);
  assert!(d1 <= esdf_config.max_distance);
}

/// The sampler gives up after its attempt budget when the map is
/// entirely occupied.
#[test]
fn sampler_rejects_when_region_is_fully_occupied() {
  let config = VolumetricDataStructureConfig {
    min_cell_width: 0.5,
    tree_height: 2,
  };
  let occupancy = HashedBlocksMap::new(config);
  let side = volumetric_mapping::variant::cells_per_side(config.tree_height) as i32;
  for x in 0..side {
    for y in 0..side {
      for z in 0..side {
        occupancy.set(Index3D::new(x, y, z), 2.0);
      }
    }
  }
  let esdf = HashedBlocksMap::new(config);
  for x in 0..side {
    for y in 0..side {
      for z in 0..side {
        esdf.set(Index3D::new(x, y, z), 10.0);
      }
    }
  }

  let mut rng = StdRng::seed_from_u64(99);
  let sampler_config = SamplerConfig {
    max_attempts: 200,
    ..Default::default()
  };
  let result = get_collision_free_position(&occupancy, &esdf, 0.1, config.tree_height, None, sampler_config, &mut rng);
  assert!(result.is_none());
}

/// Even over a fully free occupancy field, the sampler rejects every
/// candidate when the ESDF reports no clearance anywhere: occupancy
/// alone is not enough to clear a robot footprint.
#[test]
fn sampler_rejects_free_region_with_insufficient_esdf_clearance() {
  let config = VolumetricDataStructureConfig {
    min_cell_width: 0.5,
    tree_height: 2,
  };
  let occupancy = HashedBlocksMap::new(config);
  let esdf = HashedBlocksMap::new(config);
  let side = volumetric_mapping::variant::cells_per_side(config.tree_height) as i32;
  for x in 0..side {
    for y in 0..side {
      for z in 0..side {
        let cell = Index3D::new(x, y, z);
        occupancy.set(cell, -3.0);
        esdf.set(cell, 0.0);
      }
    }
  }

  let mut rng = StdRng::seed_from_u64(100);
  let sampler_config = SamplerConfig {
    max_attempts: 1,
    ..Default::default()
  };
  let result = get_collision_free_position(&occupancy, &esdf, 0.1, config.tree_height, None, sampler_config, &mut rng);
  assert!(result.is_none());
}

/// Integrating the same frame twice with different thread pool
/// sizes produces the same occupancy values (the wavelet recursion is
/// per-block, so inter-block parallelism cannot race on a single
/// block's contents).
#[test]
fn repeated_integration_of_identical_frames_is_deterministic() {
  let config = VolumetricDataStructureConfig {
    min_cell_width: 0.1,
    tree_height: 4,
  };
  let measurement_model: Arc<dyn MeasurementModel> = Arc::new(ContinuousBeamMeasurementModel::default());
  let integrator = HashedWaveletIntegrator::new(IntegratorConfig::default(), measurement_model);

  let run = || {
    let map = VolumetricDataStructure::HashedWaveletOctree(HashedWaveletOctree::new(config));
    let range_image = single_ray_frame(2.0);
    integrator.integrate_frame(&map, &range_image, 5.0).unwrap();
    let field = map.as_occupancy_field();
    let cells_per_unit = 1.0 / config.min_cell_width;
    field.get_cell_value(point_to_nearest_index(Point3D::new(1.5, 0.0, 0.0), cells_per_unit))
  };

  let first = run();
  let second = run();
  assert_eq!(first, second);
}
