//! Probe-driven population of the mesh.

use log::{debug, info, warn};

use crate::algorithms::least_squares::Plane;
use crate::errors::LevelingError;
use crate::leveling::UnifiedBedLeveling;
use crate::storage::mesh::MeshPointType;

///
/// Blocking "move there, wait, measure" primitive. `None` means the
/// measurement failed. Any `FnMut(x, y) -> Option<f32>` is a probe.
///
pub trait BedProbe
{
    fn probe_at(&mut self, x: f32, y: f32) -> Option<f32>;
}

impl<F> BedProbe for F
where
    F: FnMut(f32, f32) -> Option<f32>,
{
    fn probe_at(&mut self, x: f32, y: f32) -> Option<f32> {
        self(x, y)
    }
}

fn measure<P: BedProbe + ?Sized>(probe: &mut P, x: f32, y: f32) -> Result<f32, LevelingError>
{
    match probe.probe_at(x, y)
    {
        Some(z) if z.is_finite() =>
        {
            debug!("probed ({x:.2}, {y:.2}) = {z:.4}");
            Ok(z)
        },
        _ =>
        {
            warn!("probe failed at ({x:.2}, {y:.2})");
            Err(LevelingError::ProbeFailed)
        }
    }
}

impl<const NX: usize, const NY: usize> UnifiedBedLeveling<NX, NY>
{
    fn require_probe(&self) -> Result<(), LevelingError>
    {
        if self.config.capabilities.has_bed_probe() { Ok(()) } else { Err(LevelingError::NoBedProbe) }
    }

    ///
    /// Probe undefined, reachable points one at a time, either nearest to
    /// `near` first or always the one furthest from existing data. Stops when
    /// no candidate is left or after `max_points`. A failed measurement
    /// returns `Err(ProbeFailed)`; points measured before it are kept.
    /// Correction is suspended while probing.
    ///
    pub fn probe_entire_mesh<P: BedProbe + ?Sized>(&mut self, probe: &mut P, near: [f32; 2], do_furthest: bool, max_points: Option<usize>) -> Result<usize, LevelingError>
    {
        self.require_probe()?;
        self.with_leveling_suspended(|ubl| ubl.probe_invalid_points(probe, near, do_furthest, max_points))
    }

    fn probe_invalid_points<P: BedProbe + ?Sized>(&mut self, probe: &mut P, near: [f32; 2], do_furthest: bool, max_points: Option<usize>) -> Result<usize, LevelingError>
    {
        let mut probed = 0;
        while max_points.map_or(true, |max| probed < max)
        {
            let next = if do_furthest
            {
                self.find_furthest_invalid()?
            }
            else
            {
                self.find_closest_of_type(MeshPointType::Invalid, near[0], near[1], true, None)
            };
            let Some(point) = next else { break };
            let [x, y] = self.geometry.point_position(point.x, point.y);
            let z = measure(probe, x, y)?;
            self.mesh.set_z(point.x, point.y, z);
            probed += 1;
        }
        info!("probed {probed} points, {} of {} defined", self.mesh.defined_count(), self.mesh.len());
        Ok(probed)
    }

    /// Probe the configured three points and tilt the mesh by their plane.
    pub fn probe_three_point_tilt<P: BedProbe + ?Sized>(&mut self, probe: &mut P) -> Result<Plane, LevelingError>
    {
        self.require_probe()?;
        self.with_leveling_suspended(|ubl| {
            let mut measured = [0.0; 3];
            for (z, &[x, y]) in measured.iter_mut().zip(ubl.config.three_point_positions.iter())
            {
                *z = measure(probe, x, y)?;
            }
            ubl.tilt_mesh_from_three_points(measured)
        })
    }

    ///
    /// Probe a `probe_grid_size` x `probe_grid_size` grid spanning the part
    /// of the mesh the probe can reach, serpentine so consecutive points stay
    /// adjacent, and tilt the mesh by the least-squares plane.
    ///
    pub fn probe_grid_tilt<P: BedProbe + ?Sized>(&mut self, probe: &mut P) -> Result<Plane, LevelingError>
    {
        self.require_probe()?;
        let area = self.config.mesh_bounds().intersection(&self.config.probe_bounds).ok_or(LevelingError::InvalidConfig)?;
        let n = self.config.probe_grid_size;
        let step = [area.width(0) / (n - 1) as f32, area.width(1) / (n - 1) as f32];

        self.with_leveling_suspended(|ubl| {
            let mut samples = Vec::with_capacity(n * n);
            for iy in 0..n
            {
                for k in 0..n
                {
                    let ix = if iy % 2 == 0 { k } else { n - 1 - k };
                    let x = area.lower[0] + ix as f32 * step[0];
                    let y = area.lower[1] + iy as f32 * step[1];
                    samples.push([x, y, measure(probe, x, y)?]);
                }
            }
            ubl.tilt_mesh_from_probed_grid(&samples)
        })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::config::{BoundingBox, Capabilities, LevelingConfig};

    fn context(capabilities: Capabilities) -> UnifiedBedLeveling<4, 4>
    {
        let mut config = LevelingConfig::with_mesh_bounds(BoundingBox::new([0.0, 0.0], [300.0, 300.0]));
        config.capabilities = capabilities;
        config.three_point_positions = [[0.0, 300.0], [0.0, 0.0], [300.0, 0.0]];
        UnifiedBedLeveling::new(config).unwrap()
    }

    fn bed(x: f32, y: f32) -> Option<f32>
    {
        Some(0.001 * x - 0.0005 * y)
    }

    #[test]
    fn probing_requires_a_probe()
    {
        let mut ubl = context(Capabilities::new());
        let mut probe = bed;
        assert_eq!(ubl.probe_entire_mesh(&mut probe, [0.0, 0.0], false, None), Err(LevelingError::NoBedProbe));
        assert_eq!(ubl.probe_three_point_tilt(&mut probe), Err(LevelingError::NoBedProbe));
        assert_eq!(ubl.probe_grid_tilt(&mut probe), Err(LevelingError::NoBedProbe));
    }

    #[test]
    fn probe_entire_mesh_nearest_first()
    {
        let mut ubl = context(Capabilities::probed());
        let mut visited = Vec::new();
        let mut probe = |x: f32, y: f32| {
            visited.push([x, y]);
            bed(x, y)
        };
        assert_eq!(ubl.probe_entire_mesh(&mut probe, [0.0, 0.0], false, Some(3)).unwrap(), 3);
        // (0, 1) and (1, 0) are equally close; the X line at xi = 0 is scanned first
        assert_eq!(visited, vec![[0.0, 0.0], [0.0, 100.0], [100.0, 0.0]]);
        assert_eq!(ubl.probe_entire_mesh(&mut bed, [0.0, 0.0], false, None).unwrap(), 13);
        assert!(ubl.mesh_is_valid());
        assert!((ubl.z_correction(150.0, 150.0) - 0.075).abs() < 1e-6);
    }

    #[test]
    fn probe_entire_mesh_furthest_first()
    {
        let mut ubl = context(Capabilities::probed());
        let mut visited = Vec::new();
        let mut probe = |x: f32, y: f32| {
            visited.push([x, y]);
            bed(x, y)
        };
        ubl.probe_entire_mesh(&mut probe, [0.0, 0.0], true, Some(2)).unwrap();
        // centre first, then the corner furthest from it
        assert_eq!(visited, vec![[200.0, 200.0], [0.0, 0.0]]);
    }

    #[test]
    fn failed_probe_keeps_earlier_points()
    {
        let mut ubl = context(Capabilities::probed());
        let mut remaining = 2;
        let mut probe = |_x: f32, _y: f32| {
            if remaining == 0 { return None; }
            remaining -= 1;
            Some(0.1)
        };
        assert_eq!(ubl.probe_entire_mesh(&mut probe, [0.0, 0.0], false, None), Err(LevelingError::ProbeFailed));
        assert_eq!(ubl.mesh().defined_count(), 2);
    }

    #[test]
    fn three_point_tilt()
    {
        let mut ubl = context(Capabilities::probed());
        ubl.set_all_points_to_value(0.0);
        let plane = ubl.probe_three_point_tilt(&mut bed).unwrap();
        assert!((plane.a - 0.001).abs() < 1e-7);
        assert!((plane.b + 0.0005).abs() < 1e-7);
        assert!((ubl.z(3, 0).unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn tilt_keeps_leveling_active()
    {
        let mut ubl = context(Capabilities::probed());
        ubl.set_all_points_to_value(0.0);
        ubl.enable().unwrap();
        ubl.probe_three_point_tilt(&mut bed).unwrap();
        assert!(ubl.is_active());
        let mut broken = |_x: f32, _y: f32| None;
        assert_eq!(ubl.probe_grid_tilt(&mut broken), Err(LevelingError::ProbeFailed));
        assert!(ubl.is_active());
    }

    #[test]
    fn grid_tilt_is_serpentine()
    {
        let mut ubl = context(Capabilities::probed());
        ubl.set_all_points_to_value(0.0);
        let mut visited = Vec::new();
        let mut probe = |x: f32, y: f32| {
            visited.push([x, y]);
            bed(x, y)
        };
        ubl.probe_grid_tilt(&mut probe).unwrap();
        assert_eq!(visited.len(), 9);
        assert_eq!(&visited[..4], &[[0.0, 0.0], [150.0, 0.0], [300.0, 0.0], [300.0, 150.0]]);
        assert!((ubl.z(0, 3).unwrap() + 0.15).abs() < 1e-5);
    }
}
