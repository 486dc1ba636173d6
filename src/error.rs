//! Error kinds surfaced to the host, per the core's error handling design.
//!
//! Per-frame numeric anomalies (NaN from a projection model, out-of-FOV
//! cells) are *not* represented here: they are silently treated as
//! [`crate::range_image::UpdateType::FullyUnobserved`] by the callers that
//! encounter them, never propagated as errors. Sampler exhaustion is
//! likewise not an error: [`crate::sampler::get_collision_free_position`]
//! returns `Ok(None)` and logs a warning.

use std::path::PathBuf;

use thiserror::Error;

/// Errors the core can surface to its host.
///
/// The core never recovers from any of these; it refuses to start (for
/// config errors) or fails the operation that hit them.
#[derive(Error, Debug)]
pub enum MapError {
    /// An unknown data-structure tag, a missing required parameter, or an
    /// out-of-range numeric option in a [`crate::config::ParamMap`].
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// [`crate::factory::VolumetricDataStructureType::from_param_map`]
    /// failed to resolve a type and no default was supplied.
    #[error("no data-structure type in parameter map and no default given")]
    NotFound,

    /// A loaded/handed-in map is not of the runtime variant an operation
    /// requires (e.g. the integrator only accepts `HashedWaveletOctree`).
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// File I/O failure surfaced from a [`crate::persistence::MapPersistence`]
    /// implementation.
    #[error("resource error reading/writing {path}: {source}")]
    Resource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration-validation failures, folded into [`MapError::Config`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown data-structure tag: {0:?}")]
    UnknownDataStructureTag(String),

    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("parameter {name} out of range: expected {expected}, got {got}")]
    OutOfRange {
        name: &'static str,
        expected: &'static str,
        got: String,
    },
}
