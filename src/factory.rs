//! Factory: builds a [`VolumetricDataStructure`] from a host-supplied
//! [`ParamMap`], looking up a type tag and falling back to a
//! caller-given default when none is given.

use crate::config::{ParamMap, VolumetricDataStructureConfig};
use crate::error::{ConfigError, MapError};
use crate::variant::{
    HashedBlocksMap, HashedWaveletOctree, VolumetricDataStructure, VolumetricDataStructureType, WaveletOctreeMap,
};

impl VolumetricDataStructureType {
    /// Reads the `"type"` tag out of a parameter map, falling back to
    /// `default_type` (logging a warning) if the tag is absent *or*
    /// unrecognized, and reporting an error only when there is no
    /// default to fall back to.
    pub fn from_param_map(
        params: &ParamMap,
        default_type: Option<VolumetricDataStructureType>,
    ) -> Result<VolumetricDataStructureType, ConfigError> {
        match params.get_str("type") {
            Ok(tag) => match Self::parse(tag) {
                Some(parsed) => Ok(parsed),
                None => match default_type {
                    Some(default) => {
                        log::warn!(
                            "unrecognized data-structure type {tag:?}; falling back to the caller-provided default {}",
                            default.as_str()
                        );
                        Ok(default)
                    }
                    None => Err(ConfigError::UnknownDataStructureTag(tag.to_string())),
                },
            },
            Err(ConfigError::MissingParameter(_)) => match default_type {
                Some(default) => {
                    log::warn!(
                        "no data-structure \"type\" given; falling back to the caller-provided default {}",
                        default.as_str()
                    );
                    Ok(default)
                }
                None => Err(ConfigError::MissingParameter("type")),
            },
            Err(other) => Err(other),
        }
    }
}

/// Builds a [`VolumetricDataStructure`] from `params`, using
/// `default_type` if `params` does not specify one.
pub struct VolumetricDataStructureFactory;

impl VolumetricDataStructureFactory {
    pub fn create(
        params: &ParamMap,
        default_type: Option<VolumetricDataStructureType>,
    ) -> Result<VolumetricDataStructure, MapError> {
        let data_structure_type = VolumetricDataStructureType::from_param_map(params, default_type)?;
        let config = VolumetricDataStructureConfig::from_param_map(params)?;

        let instance = match data_structure_type {
            VolumetricDataStructureType::HashedBlocks => VolumetricDataStructure::HashedBlocks(HashedBlocksMap::new(config)),
            VolumetricDataStructureType::Octree => {
                VolumetricDataStructure::Octree(crate::variant::VolumetricOctree::new(config))
            }
            VolumetricDataStructureType::WaveletOctree => {
                VolumetricDataStructure::WaveletOctree(WaveletOctreeMap::new(config))
            }
            VolumetricDataStructureType::HashedWaveletOctree => {
                VolumetricDataStructure::HashedWaveletOctree(HashedWaveletOctree::new(config))
            }
        };

        log::info!(
            "created a {} volumetric data structure (min_cell_width={}, tree_height={})",
            data_structure_type.as_str(),
            config.min_cell_width,
            config.tree_height
        );
        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParamValue;

    fn valid_params(type_tag: &str) -> ParamMap {
        let mut params = ParamMap::new();
        params
            .insert("type", ParamValue::Str(type_tag.to_string()))
            .insert("min_cell_width", ParamValue::Float(0.1))
            .insert("tree_height", ParamValue::Int(6));
        params
    }

    #[test]
    fn creates_the_requested_type() {
        let params = valid_params("HashedWaveletOctree");
        let instance = VolumetricDataStructureFactory::create(&params, None).unwrap();
        assert_eq!(instance.type_tag(), VolumetricDataStructureType::HashedWaveletOctree);
    }

    #[test]
    fn falls_back_to_default_type_when_tag_missing() {
        let mut params = valid_params("HashedWaveletOctree");
        // Simulate an absent tag by building a fresh map without it.
        params = ParamMap::new();
        params
            .insert("min_cell_width", ParamValue::Float(0.1))
            .insert("tree_height", ParamValue::Int(6));
        let instance =
            VolumetricDataStructureFactory::create(&params, Some(VolumetricDataStructureType::HashedBlocks)).unwrap();
        assert_eq!(instance.type_tag(), VolumetricDataStructureType::HashedBlocks);
    }

    #[test]
    fn rejects_unknown_type_tag() {
        let params = valid_params("NotARealType");
        let err = VolumetricDataStructureFactory::create(&params, None).unwrap_err();
        assert!(matches!(
            err,
            MapError::Config(ConfigError::UnknownDataStructureTag(_))
        ));
    }

    #[test]
    fn falls_back_to_default_type_when_tag_unrecognized() {
        let params = valid_params("NotARealType");
        let instance =
            VolumetricDataStructureFactory::create(&params, Some(VolumetricDataStructureType::HashedBlocks)).unwrap();
        assert_eq!(instance.type_tag(), VolumetricDataStructureType::HashedBlocks);
    }

    #[test]
    fn errors_when_no_tag_and_no_default() {
        let mut params = ParamMap::new();
        params
            .insert("min_cell_width", ParamValue::Float(0.1))
            .insert("tree_height", ParamValue::Int(6));
        let err = VolumetricDataStructureFactory::create(&params, None).unwrap_err();
        assert!(matches!(
            err,
            MapError::Config(ConfigError::MissingParameter("type"))
        ));
    }
}
