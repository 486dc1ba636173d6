//! A hashed, wavelet-compressed octree for fusing posed range images
//! into a 3-D occupancy map, plus an ESDF generator and a
//! collision-free point sampler built on top of it.
//!
//! The core data structure ([`crate::variant`]) is one of four tagged
//! variants; the integrator ([`crate::integrator`]) is specialized to
//! the hashed wavelet octree body and declines the other three. A
//! frame is fused coarse to fine: [`crate::integrator::discover_blocks`]
//! prunes the parts of the map a range image could not have observed
//! at all, then each remaining block is refined from its root down,
//! stopping early wherever the measurement model's worst-case error
//! over a cell is already below tolerance.
//!
//! Persistence, configuration-file parsing, and the depth-sensor
//! projection math proper are host responsibilities; this crate
//! exposes the seams ([`crate::persistence::MapPersistence`],
//! [`crate::config::ParamMap`], [`crate::projection::ProjectionModel`])
//! rather than committing to one.

use rayon::ThreadPoolBuildError;

pub mod block;
pub mod config;
pub mod error;
pub mod esdf;
pub mod factory;
pub mod geometry;
pub mod integrator;
pub mod measurement;
pub mod persistence;
pub mod projection;
pub mod range_image;
pub mod sampler;
pub mod transform;
pub mod variant;

pub use error::{ConfigError, MapError};
pub use variant::{VolumetricDataStructure, VolumetricDataStructureType};

/// Init the number of threads used for block-parallel integration.
/// Must be called only once, before any integration happens!
/// If not called, the default number of threads is the number of physical cores.
/// See [rayon doc](https://docs.rs/rayon/latest/rayon/struct.ThreadPoolBuilder.html)
pub fn init_par(num_threads: usize) -> Result<(), ThreadPoolBuildError> {
  rayon::ThreadPoolBuilder::new()
    .num_threads(num_threads)
    .build_global()
}
