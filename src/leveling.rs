//! The leveling context: one mesh, its geometry and configuration, and the
//! state the planner consults.

use log::{info, warn};

use crate::algorithms::fill::{self, FillDirection};
use crate::algorithms::interpolation::InterpolationOperation;
use crate::algorithms::least_squares::Plane;
use crate::algorithms::query::{self, MeshIndexPair};
use crate::algorithms::tilt::{self, MeshStatistics};
use crate::config::LevelingConfig;
use crate::errors::LevelingError;
use crate::geometry::MeshGeometry;
use crate::storage::mesh::{Mesh, MeshBitmap, MeshPointType};
use crate::storage::slots::MeshSlots;

///
/// Unified bed leveling over an `NX` x `NY` mesh.
///
/// Writers take `&mut self`; corrections take `&self` and never mutate, so
/// a shared reference can be handed to any number of readers.
///
#[derive(Clone, Debug)]
pub struct UnifiedBedLeveling<const NX: usize, const NY: usize>
{
    pub(crate) config: LevelingConfig,
    pub(crate) geometry: MeshGeometry<NX, NY>,
    pub(crate) mesh: Mesh<NX, NY>,
    storage_slot: Option<u16>,
    pub(crate) active: bool,
}

impl<const NX: usize, const NY: usize> UnifiedBedLeveling<NX, NY>
{
    /// Validate `config` and build an inactive context with an undefined mesh.
    pub fn new(config: LevelingConfig) -> Result<Self, LevelingError>
    {
        config.validate()?;
        let geometry = MeshGeometry::new(config.mesh_bounds())?;
        Ok(Self { config, geometry, mesh: Mesh::new(), storage_slot: None, active: false })
    }

    pub fn config(&self) -> &LevelingConfig
    {
        &self.config
    }

    pub fn geometry(&self) -> &MeshGeometry<NX, NY>
    {
        &self.geometry
    }

    pub fn mesh(&self) -> &Mesh<NX, NY>
    {
        &self.mesh
    }

    pub fn mesh_mut(&mut self) -> &mut Mesh<NX, NY>
    {
        &mut self.mesh
    }

    #[inline]
    pub fn interpolation(&self) -> InterpolationOperation<'_, NX, NY>
    {
        InterpolationOperation::new(&self.geometry, &self.mesh, self.config.z_raise_when_off_mesh)
    }

    pub fn set_z(&mut self, xi: usize, yi: usize, z: f32) -> Result<(), LevelingError>
    {
        self.mesh.try_set_z(xi, yi, z)
    }

    pub fn z(&self, xi: usize, yi: usize) -> Option<f32>
    {
        self.mesh.get(xi, yi)
    }

    #[inline]
    pub fn z_correction(&self, x: f32, y: f32) -> f32
    {
        self.interpolation().z_correction(x, y)
    }

    #[inline]
    pub fn z_correction_on_horizontal_line(&self, x: f32, x_cell: isize, yi: isize) -> f32
    {
        self.interpolation().z_correction_on_horizontal_line(x, x_cell, yi)
    }

    #[inline]
    pub fn z_correction_on_vertical_line(&self, y: f32, xi: isize, y_cell: isize) -> f32
    {
        self.interpolation().z_correction_on_vertical_line(y, xi, y_cell)
    }

    #[cfg(feature = "rayon")]
    pub fn z_correction_batch(&self, points: &[[f32; 2]]) -> Vec<f32>
    {
        self.interpolation().z_correction_batch(points)
    }

    pub fn mesh_is_valid(&self) -> bool
    {
        self.mesh.is_valid()
    }

    pub fn invalidate(&mut self)
    {
        self.mesh.invalidate();
    }

    /// Undefined mesh, leveling off, no storage slot.
    pub fn reset(&mut self)
    {
        self.mesh.invalidate();
        self.active = false;
        self.storage_slot = None;
        info!("leveling reset");
    }

    /// Turn correction on. Requires every mesh point to be defined.
    pub fn enable(&mut self) -> Result<(), LevelingError>
    {
        if !self.mesh.is_valid()
        {
            warn!("cannot enable leveling: {} of {} points undefined", self.mesh.len() - self.mesh.defined_count(), self.mesh.len());
            return Err(LevelingError::MeshNotValid);
        }
        self.active = true;
        Ok(())
    }

    pub fn disable(&mut self)
    {
        self.active = false;
    }

    pub fn is_active(&self) -> bool
    {
        self.active
    }

    ///
    /// Run `f` with correction switched off, then put the previous state
    /// back. Probing runs this way so measured heights are raw bed heights.
    /// The state is only restored while the mesh is still fully defined.
    ///
    pub fn with_leveling_suspended<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R
    {
        let was_active = self.active;
        self.active = false;
        let result = f(self);
        self.active = was_active && self.mesh.is_valid();
        if was_active && !self.active
        {
            warn!("leveling left off: mesh no longer fully defined");
        }
        result
    }

    pub fn storage_slot(&self) -> Option<u16>
    {
        self.storage_slot
    }

    pub fn store_to_slot(&mut self, slots: &mut MeshSlots, slot: u16) -> Result<(), LevelingError>
    {
        slots.store(slot, &self.mesh)?;
        self.storage_slot = Some(slot);
        info!("mesh saved to slot {slot}");
        Ok(())
    }

    /// Replace the mesh with the one in `slot`. On error the current mesh is kept.
    pub fn load_from_slot(&mut self, slots: &MeshSlots, slot: u16) -> Result<(), LevelingError>
    {
        self.mesh = slots.load(slot)?;
        self.storage_slot = Some(slot);
        info!("mesh loaded from slot {slot}");
        Ok(())
    }

    pub fn set_all_points_to_value(&mut self, value: f32)
    {
        tilt::set_all_points_to_value(&mut self.mesh, value);
    }

    pub fn shift_mesh_height(&mut self, offset: f32)
    {
        tilt::shift_mesh_height(&mut self.mesh, offset);
    }

    pub fn mesh_statistics(&self) -> Option<MeshStatistics>
    {
        tilt::mesh_statistics(&self.mesh)
    }

    pub fn adjust_mesh_to_mean(&mut self, offset: f32) -> Option<MeshStatistics>
    {
        tilt::adjust_mesh_to_mean(&mut self.mesh, offset)
    }

    /// Tilt by the plane through heights measured at the configured three points.
    pub fn tilt_mesh_from_three_points(&mut self, measured: [f32; 3]) -> Result<Plane, LevelingError>
    {
        tilt::tilt_mesh_from_three_points(&self.geometry, &mut self.mesh, &self.config.three_point_positions, measured)
    }

    pub fn tilt_mesh_from_probed_grid(&mut self, samples: &[[f32; 3]]) -> Result<Plane, LevelingError>
    {
        tilt::tilt_mesh_from_probed_grid(&self.geometry, &mut self.mesh, samples)
    }

    pub fn smart_fill_one(&mut self, xi: usize, yi: usize, dir: FillDirection) -> bool
    {
        fill::smart_fill_one(&mut self.mesh, xi, yi, dir)
    }

    pub fn smart_fill_mesh(&mut self) -> usize
    {
        fill::smart_fill_mesh(&mut self.mesh)
    }

    pub fn smart_fill_wlsf(&mut self, weight_factor: f32) -> Result<usize, LevelingError>
    {
        fill::smart_fill_wlsf(&self.geometry, &mut self.mesh, weight_factor)
    }

    ///
    /// Closest point of `point_type` to `(x, y)` reachable by the probe
    /// (`use_probe_bounds`) or the nozzle.
    ///
    pub fn find_closest_of_type(&self, point_type: MeshPointType, x: f32, y: f32, use_probe_bounds: bool, exclude: Option<&MeshBitmap<NX, NY>>) -> Option<MeshIndexPair>
    {
        let reach = if use_probe_bounds { &self.config.probe_bounds } else { &self.config.printable_bounds };
        query::find_closest_of_type(&self.geometry, &self.mesh, point_type, x, y, reach, exclude)
    }

    pub fn find_furthest_invalid(&self) -> Result<Option<MeshIndexPair>, LevelingError>
    {
        query::find_furthest_invalid(&self.geometry, &self.mesh, &self.config.probe_bounds)
    }
}
