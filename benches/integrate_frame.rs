use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::Matrix3;

use volumetric_mapping::config::{IntegratorConfig, VolumetricDataStructureConfig};
use volumetric_mapping::geometry::Point3D;
use volumetric_mapping::integrator::HashedWaveletIntegrator;
use volumetric_mapping::measurement::{ContinuousBeamMeasurementModel, MeasurementModel};
use volumetric_mapping::projection::SphericalProjectionModel;
use volumetric_mapping::range_image::PosedRangeImage;
use volumetric_mapping::variant::{HashedWaveletOctree, VolumetricDataStructure};

fn synthetic_range_image(num_rows: usize, num_columns: usize) -> PosedRangeImage {
  let projection_model = Arc::new(SphericalProjectionModel::new(num_rows, num_columns));
  let ranges: Vec<f32> = (0..num_rows * num_columns)
    .map(|i| 1.5 + 0.5 * ((i % 37) as f32 / 37.0))
    .collect();
  let pose = volumetric_mapping::geometry::Pose::new(Point3D::new(0.0, 0.0, 0.0), Matrix3::identity());
  PosedRangeImage::new(pose, ranges, projection_model)
}

fn bench_integrate_frame(c: &mut Criterion) {
  let mut binding = c.benchmark_group("IntegrateFrame");
  let group = binding.sample_size(10);

  group.bench_function("HashedWaveletIntegrator::integrate_frame", |b| {
    b.iter(|| {
      let config = VolumetricDataStructureConfig {
        min_cell_width: 0.1,
        tree_height: 6,
      };
      let map = VolumetricDataStructure::HashedWaveletOctree(HashedWaveletOctree::new(config));
      let range_image = synthetic_range_image(64, 128);
      let measurement_model: Arc<dyn MeasurementModel> = Arc::new(ContinuousBeamMeasurementModel::default());
      let integrator = HashedWaveletIntegrator::new(IntegratorConfig::default(), measurement_model);
      integrator.integrate_frame(&map, &range_image, 5.0).unwrap();
    })
  });
}

criterion_group!(benches, bench_integrate_frame);
criterion_main!(benches);
