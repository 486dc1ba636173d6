//! Persistence: the seam a host plugs a concrete on-disk codec into.
//! Serialization format and storage medium are a host concern, so only
//! the trait lives here.

use crate::error::MapError;
use crate::variant::VolumetricDataStructure;

/// A host-provided way to load and save a [`VolumetricDataStructure`],
/// to whatever medium and wire format it chooses.
pub trait MapPersistence {
    fn load(&self) -> Result<VolumetricDataStructure, MapError>;
    fn save(&self, map: &VolumetricDataStructure) -> Result<(), MapError>;
}
