//! Unified bed leveling: a rectangular mesh of measured bed heights and the
//! Z correction a motion planner adds at any XY position.

pub mod algorithms;
pub mod config;
pub mod errors;
pub mod geometry;
pub mod leveling;
pub mod motion;
pub mod probing;
pub mod serialization;
pub mod storage;

pub use config::{BoundingBox, Capabilities, LevelingConfig};
pub use errors::LevelingError;
pub use leveling::UnifiedBedLeveling;
pub use probing::BedProbe;
pub use storage::mesh::{Mesh, MeshBitmap, MeshPointType};
