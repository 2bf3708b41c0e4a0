//! Runtime configuration of the leveling subsystem.
//!
//! Everything the firmware selects with build-time switches (probe present,
//! segmented kinematics, off-mesh raise) is chosen here once at startup.

use std::path::Path;

use bitfield_struct::bitfield;
use serde::{Deserialize, Serialize};

use crate::errors::LevelingError;

/// Capability switches selected once at startup.
#[bitfield(u8)]
#[derive(Serialize, Deserialize, PartialEq, Eq)]
pub struct Capabilities
{
    /// A Z probe can measure the bed unattended.
    pub has_bed_probe: bool,
    /// Moves are cut into short fixed-length segments (delta/SCARA style)
    /// instead of being split at mesh-line crossings.
    pub segmented_motion: bool,
    #[bits(6)]
    _empty: u8,
}

impl Capabilities
{
    /// Cartesian printer with a bed probe.
    pub fn probed() -> Self
    {
        Self::new().with_has_bed_probe(true)
    }
}

/// Axis aligned rectangle in bed coordinates.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox
{
    pub lower: [f32; 2],
    pub upper: [f32; 2],
}

impl Default for BoundingBox
{
    #[inline]
    fn default() -> Self {
        Self { lower: [0.0; 2], upper: [defaults::BED_SIZE; 2] }
    }
}

impl BoundingBox
{
    #[inline]
    pub fn new(lower: [f32; 2], upper: [f32; 2]) -> Self
    {
        Self { lower, upper }
    }

    #[inline]
    pub fn width(&self, dim: usize) -> f32
    {
        self.upper[dim] - self.lower[dim]
    }

    /// Inclusive containment test.
    #[inline]
    pub fn contains(&self, point: [f32; 2]) -> bool
    {
        #[allow(clippy::needless_range_loop)]
        for d in 0..2
        {
            if self.lower[d] > point[d] || self.upper[d] < point[d]
            {
                return false;
            }
        }
        true
    }

    /// Overlap of two boxes, `None` when they do not intersect.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox>
    {
        let lower = [self.lower[0].max(other.lower[0]), self.lower[1].max(other.lower[1])];
        let upper = [self.upper[0].min(other.upper[0]), self.upper[1].min(other.upper[1])];
        if lower[0] > upper[0] || lower[1] > upper[1]
        {
            None
        }
        else
        {
            Some(BoundingBox { lower, upper })
        }
    }

    fn is_well_formed(&self) -> bool
    {
        self.lower.iter().chain(self.upper.iter()).all(|v| v.is_finite())
            && self.lower[0] <= self.upper[0]
            && self.lower[1] <= self.upper[1]
    }
}

/// Default value functions for serde deserialization.
pub mod defaults
{
    use super::{BoundingBox, Capabilities};

    pub(crate) const BED_SIZE: f32 = 220.0;
    const MESH_INSET: f32 = 10.0;

    pub fn mesh_min() -> [f32; 2] {
        [MESH_INSET; 2]
    }

    pub fn mesh_max() -> [f32; 2] {
        [BED_SIZE - MESH_INSET; 2]
    }

    pub fn probe_bounds() -> BoundingBox {
        BoundingBox::new([MESH_INSET; 2], [BED_SIZE - MESH_INSET; 2])
    }

    pub fn printable_bounds() -> BoundingBox {
        BoundingBox::new([0.0; 2], [BED_SIZE; 2])
    }

    pub fn three_point_positions() -> [[f32; 2]; 3] {
        [[39.0, 180.0], [39.0, 20.0], [180.0, 20.0]]
    }

    pub fn probe_grid_size() -> usize {
        3
    }

    pub fn segment_length() -> f32 {
        5.0
    }

    pub fn capabilities() -> Capabilities {
        Capabilities::probed()
    }
}

/// Leveling configuration, loadable from JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelingConfig
{
    /// Physical position of grid line 0 on each axis.
    #[serde(default = "defaults::mesh_min")]
    pub mesh_min: [f32; 2],

    /// Physical position of the last grid line on each axis.
    #[serde(default = "defaults::mesh_max")]
    pub mesh_max: [f32; 2],

    /// Area the probe can reach.
    #[serde(default = "defaults::probe_bounds")]
    pub probe_bounds: BoundingBox,

    /// Area the nozzle can reach.
    #[serde(default = "defaults::printable_bounds")]
    pub printable_bounds: BoundingBox,

    /// Probe positions used for the three-point tilt.
    #[serde(default = "defaults::three_point_positions")]
    pub three_point_positions: [[f32; 2]; 3],

    /// Points per axis of the grid probed for the least-squares tilt (2..=9).
    #[serde(default = "defaults::probe_grid_size")]
    pub probe_grid_size: usize,

    /// Correction returned for positions off the mesh. `None` extrapolates.
    #[serde(default)]
    pub z_raise_when_off_mesh: Option<f32>,

    /// Maximum XY length of one segment when `segmented_motion` is set.
    #[serde(default = "defaults::segment_length")]
    pub segment_length: f32,

    #[serde(default = "defaults::capabilities")]
    pub capabilities: Capabilities,
}

impl Default for LevelingConfig
{
    fn default() -> Self {
        Self {
            mesh_min: defaults::mesh_min(),
            mesh_max: defaults::mesh_max(),
            probe_bounds: defaults::probe_bounds(),
            printable_bounds: defaults::printable_bounds(),
            three_point_positions: defaults::three_point_positions(),
            probe_grid_size: defaults::probe_grid_size(),
            z_raise_when_off_mesh: None,
            segment_length: defaults::segment_length(),
            capabilities: defaults::capabilities(),
        }
    }
}

impl LevelingConfig
{
    /// Config whose mesh, probe and printable areas all equal `bounds`.
    pub fn with_mesh_bounds(bounds: BoundingBox) -> Self
    {
        Self {
            mesh_min: bounds.lower,
            mesh_max: bounds.upper,
            probe_bounds: bounds,
            printable_bounds: bounds,
            ..Self::default()
        }
    }

    pub fn mesh_bounds(&self) -> BoundingBox
    {
        BoundingBox::new(self.mesh_min, self.mesh_max)
    }

    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, LevelingError>
    {
        let contents = std::fs::read_to_string(path).map_err(|_| LevelingError::FileIOError)?;
        Self::from_json(&contents)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, LevelingError>
    {
        let config: Self = serde_json::from_str(json).map_err(|_| LevelingError::ConfigParseFailed)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LevelingError>
    {
        #[allow(clippy::needless_range_loop)]
        for d in 0..2
        {
            if !self.mesh_min[d].is_finite() || !self.mesh_max[d].is_finite() || self.mesh_min[d] >= self.mesh_max[d]
            {
                return Err(LevelingError::InvalidGeometry);
            }
        }
        if !self.probe_bounds.is_well_formed() || !self.printable_bounds.is_well_formed()
        {
            return Err(LevelingError::InvalidConfig);
        }
        if !(2..=9).contains(&self.probe_grid_size)
        {
            return Err(LevelingError::InvalidConfig);
        }
        if !(self.segment_length.is_finite() && self.segment_length > 0.0)
        {
            return Err(LevelingError::InvalidConfig);
        }
        if self.z_raise_when_off_mesh.is_some_and(|z| !z.is_finite())
        {
            return Err(LevelingError::InvalidConfig);
        }
        if self.three_point_positions.iter().flatten().any(|v| !v.is_finite())
        {
            return Err(LevelingError::InvalidConfig);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn default_config_is_valid()
    {
        let config = LevelingConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.capabilities.has_bed_probe());
        assert!(!config.capabilities.segmented_motion());
    }

    #[test]
    fn partial_json_falls_back_to_defaults()
    {
        let config = LevelingConfig::from_json(r#"{ "mesh_min": [0.0, 0.0], "mesh_max": [200.0, 180.0], "z_raise_when_off_mesh": 1.5 }"#).unwrap();
        assert_eq!(config.mesh_max, [200.0, 180.0]);
        assert_eq!(config.z_raise_when_off_mesh, Some(1.5));
        assert_eq!(config.probe_grid_size, 3);
        assert_eq!(config.capabilities, Capabilities::probed());
    }

    #[test]
    fn inverted_mesh_span_is_rejected()
    {
        let result = LevelingConfig::from_json(r#"{ "mesh_min": [100.0, 0.0], "mesh_max": [50.0, 200.0] }"#);
        assert_eq!(result, Err(LevelingError::InvalidGeometry));
        assert_eq!(LevelingConfig::from_json("not json"), Err(LevelingError::ConfigParseFailed));
    }

    #[test]
    fn probe_grid_size_range()
    {
        let mut config = LevelingConfig::default();
        config.probe_grid_size = 1;
        assert_eq!(config.validate(), Err(LevelingError::InvalidConfig));
        config.probe_grid_size = 9;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bounding_box_intersection()
    {
        let a = BoundingBox::new([0.0, 0.0], [100.0, 100.0]);
        let b = BoundingBox::new([50.0, -10.0], [150.0, 60.0]);
        assert_eq!(a.intersection(&b), Some(BoundingBox::new([50.0, 0.0], [100.0, 60.0])));
        assert!(a.contains([100.0, 0.0]));
        assert!(!a.contains([100.1, 0.0]));
        assert_eq!(a.intersection(&BoundingBox::new([200.0, 200.0], [300.0, 300.0])), None);
    }
}
