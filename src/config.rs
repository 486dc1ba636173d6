//! Configuration surface: a keyed parameter bag plus the strongly typed
//! config structs the core validates it into.
//!
//! Parsing an actual on-disk config file (yaml/json/toml) into a
//! [`ParamMap`] is left to the host; building the bag itself and
//! validating it into the structs below is in-crate.
//!
//! Values that would otherwise be hard-coded constants (the noise
//! threshold, the sampler's attempt budget, the free-occupancy
//! threshold) are instead configurable fields with documented defaults,
//! rather than magic numbers baked into the algorithms that use them.

use std::collections::HashMap;

use crate::error::ConfigError;

/// A value in a host-supplied keyed parameter bag.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

/// A keyed parameter bag, as handed to [`crate::factory`] by the host.
#[derive(Clone, Debug, Default)]
pub struct ParamMap(HashMap<String, ParamValue>);

impl ParamMap {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) -> &mut Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &'static str) -> Result<&str, ConfigError> {
        match self.0.get(key) {
            Some(ParamValue::Str(s)) => Ok(s.as_str()),
            Some(_) => Err(ConfigError::OutOfRange {
                name: key,
                expected: "string",
                got: "a non-string value".to_string(),
            }),
            None => Err(ConfigError::MissingParameter(key)),
        }
    }

    pub fn get_f32(&self, key: &'static str) -> Result<f32, ConfigError> {
        match self.0.get(key) {
            Some(ParamValue::Float(v)) => Ok(*v as f32),
            Some(ParamValue::Int(v)) => Ok(*v as f32),
            Some(_) => Err(ConfigError::OutOfRange {
                name: key,
                expected: "number",
                got: "a non-numeric value".to_string(),
            }),
            None => Err(ConfigError::MissingParameter(key)),
        }
    }

    pub fn get_u8(&self, key: &'static str) -> Result<u8, ConfigError> {
        match self.0.get(key) {
            Some(ParamValue::Int(v)) if (0..=u8::MAX as i64).contains(v) => Ok(*v as u8),
            Some(ParamValue::Int(v)) => Err(ConfigError::OutOfRange {
                name: key,
                expected: "0..=255",
                got: v.to_string(),
            }),
            Some(_) => Err(ConfigError::OutOfRange {
                name: key,
                expected: "integer",
                got: "a non-integer value".to_string(),
            }),
            None => Err(ConfigError::MissingParameter(key)),
        }
    }

    pub fn get_usize(&self, key: &'static str) -> Result<usize, ConfigError> {
        match self.0.get(key) {
            Some(ParamValue::Int(v)) if *v >= 0 => Ok(*v as usize),
            Some(ParamValue::Int(v)) => Err(ConfigError::OutOfRange {
                name: key,
                expected: ">= 0",
                got: v.to_string(),
            }),
            Some(_) => Err(ConfigError::OutOfRange {
                name: key,
                expected: "integer",
                got: "a non-integer value".to_string(),
            }),
            None => Err(ConfigError::MissingParameter(key)),
        }
    }
}

/// Config shared by every [`crate::variant::VolumetricDataStructure`]
/// body: the world's minimum cell width, and (for the hashed variants)
/// the fixed per-block octree height `H`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolumetricDataStructureConfig {
    /// World units per leaf cell.
    pub min_cell_width: f32,
    /// Fixed height `H` of one block's octree (typically 4-6).
    pub tree_height: u8,
}

impl VolumetricDataStructureConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_cell_width > 0.0) {
            return Err(ConfigError::OutOfRange {
                name: "min_cell_width",
                expected: "> 0",
                got: self.min_cell_width.to_string(),
            });
        }
        if self.tree_height == 0 {
            return Err(ConfigError::OutOfRange {
                name: "tree_height",
                expected: "> 0",
                got: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn from_param_map(params: &ParamMap) -> Result<Self, ConfigError> {
        let config = Self {
            min_cell_width: params.get_f32("min_cell_width")?,
            tree_height: params.get_u8("tree_height")?,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for VolumetricDataStructureConfig {
    fn default() -> Self {
        Self {
            min_cell_width: 0.1,
            tree_height: 6,
        }
    }
}

/// Config for the hashed wavelet integrator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntegratorConfig {
    /// Leaf level at which updates stop refining (0 = refine all the way
    /// to the block's finest leaf).
    pub termination_height: u8,
    /// Approximation-error gate: refinement stops once the measurement
    /// model's worst-case error for a cell drops below this.
    pub termination_update_error: f32,
    pub min_log_odds: f32,
    pub max_log_odds: f32,
    /// Slack band around the clamp bounds, and the threshold below
    /// which a node is considered saturated-free.
    pub noise_threshold: f32,
}

impl IntegratorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_log_odds >= self.max_log_odds {
            return Err(ConfigError::OutOfRange {
                name: "min_log_odds/max_log_odds",
                expected: "min_log_odds < max_log_odds",
                got: format!("{} >= {}", self.min_log_odds, self.max_log_odds),
            });
        }
        if self.termination_update_error <= 0.0 {
            return Err(ConfigError::OutOfRange {
                name: "termination_update_error",
                expected: "> 0",
                got: self.termination_update_error.to_string(),
            });
        }
        if self.noise_threshold < 0.0 {
            return Err(ConfigError::OutOfRange {
                name: "noise_threshold",
                expected: ">= 0",
                got: self.noise_threshold.to_string(),
            });
        }
        Ok(())
    }
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            termination_height: 0,
            termination_update_error: 0.1,
            min_log_odds: -2.0,
            max_log_odds: 2.0,
            noise_threshold: 1e-2,
        }
    }
}

/// Config for the ESDF generator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EsdfConfig {
    /// Cells with occupancy log-odds above this are ESDF obstacles.
    pub occupancy_threshold: f32,
    /// ESDF distance cap `D`.
    pub max_distance: f32,
    /// Wavefront fixed-point convergence tolerance.
    pub convergence_tolerance: f32,
}

impl EsdfConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_distance <= 0.0 {
            return Err(ConfigError::OutOfRange {
                name: "max_distance",
                expected: "> 0",
                got: self.max_distance.to_string(),
            });
        }
        if self.convergence_tolerance < 0.0 {
            return Err(ConfigError::OutOfRange {
                name: "convergence_tolerance",
                expected: ">= 0",
                got: self.convergence_tolerance.to_string(),
            });
        }
        Ok(())
    }
}

impl Default for EsdfConfig {
    fn default() -> Self {
        Self {
            occupancy_threshold: 0.0,
            max_distance: 2.0,
            convergence_tolerance: 1e-3,
        }
    }
}

/// Config for the collision-free sampler.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplerConfig {
    pub max_attempts: usize,
    /// Threshold below which occupancy log-odds is considered "free".
    pub free_threshold: f32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1000,
            free_threshold: -1e-3,
        }
    }
}
