//! Splitting straight moves into Z-corrected waypoints.

use log::{trace, warn};

use crate::geometry::Axis;
use crate::leveling::UnifiedBedLeveling;

/// Point along a move, `t` in `(0, 1)`.
#[derive(Copy, Clone, Debug)]
struct Crossing
{
    t: f32,
    axis: Axis,
    line: usize,
}

/// Upper bound on the pieces of one segmented move.
pub const MAX_SEGMENTS: usize = 1 << 16;

#[inline]
fn point_at(start: &[f32; 3], end: &[f32; 3], t: f32) -> [f32; 3]
{
    std::array::from_fn(|d| start[d] + (end[d] - start[d]) * t)
}

impl<const NX: usize, const NY: usize> UnifiedBedLeveling<NX, NY>
{
    ///
    /// Waypoints for a straight move from `start` to `end`, each with the
    /// mesh correction added to Z. `start` itself is not included; the last
    /// waypoint is `end`. While leveling is inactive no correction is applied.
    ///
    /// With segmented motion the move is cut into equal pieces no longer than
    /// the configured segment length. Otherwise a waypoint is placed wherever
    /// the move crosses a mesh line, so the path follows the mesh exactly.
    ///
    pub fn plan_line(&self, start: [f32; 3], end: [f32; 3]) -> Vec<[f32; 3]>
    {
        let waypoints = if self.config.capabilities.segmented_motion()
        {
            self.plan_segmented(&start, &end)
        }
        else
        {
            self.plan_cartesian(&start, &end)
        };
        trace!("plan_line {start:?} -> {end:?}: {} waypoints", waypoints.len());
        waypoints
    }

    fn plan_segmented(&self, start: &[f32; 3], end: &[f32; 3]) -> Vec<[f32; 3]>
    {
        let length = (end[0] - start[0]).hypot(end[1] - start[1]);
        let pieces = (length / self.config.segment_length).ceil();
        let segments = if pieces.is_finite() { (pieces as usize).clamp(1, MAX_SEGMENTS) } else { 1 };
        if segments == MAX_SEGMENTS
        {
            warn!("move {start:?} -> {end:?} capped at {MAX_SEGMENTS} segments");
        }
        (1..=segments)
            .map(|k| {
                let mut p = if k == segments { *end } else { point_at(start, end, k as f32 / segments as f32) };
                p[2] += self.active_correction(p[0], p[1]);
                p
            })
            .collect()
    }

    fn plan_cartesian(&self, start: &[f32; 3], end: &[f32; 3]) -> Vec<[f32; 3]>
    {
        let mut tail = *end;
        tail[2] += self.active_correction(end[0], end[1]);
        if !self.active
        {
            return vec![tail];
        }

        let mut crossings = Vec::new();
        for (axis, lines) in [(Axis::X, NX), (Axis::Y, NY)]
        {
            let d = axis.dim();
            let delta = end[d] - start[d];
            if delta == 0.0
            {
                continue;
            }
            for line in 0..lines
            {
                let t = (self.geometry.index_to_position(axis, line) - start[d]) / delta;
                if t > 0.0 && t < 1.0
                {
                    crossings.push(Crossing { t, axis, line });
                }
            }
        }
        crossings.sort_by(|a, b| a.t.total_cmp(&b.t));
        // a move through a mesh point crosses both lines at once
        crossings.dedup_by(|a, b| a.t == b.t);

        let interpolation = self.interpolation();
        let mut waypoints: Vec<[f32; 3]> = crossings.iter()
            .map(|c| {
                let mut p = point_at(start, end, c.t);
                let correction = if !self.geometry.contains(p[0], p[1])
                {
                    interpolation.z_correction(p[0], p[1])
                }
                else
                {
                    let z = match c.axis
                    {
                        Axis::X =>
                        {
                            let y_cell = self.geometry.position_to_cell_index(Axis::Y, p[1]) as isize;
                            interpolation.z_correction_on_vertical_line(p[1], c.line as isize, y_cell)
                        },
                        Axis::Y =>
                        {
                            let x_cell = self.geometry.position_to_cell_index(Axis::X, p[0]) as isize;
                            interpolation.z_correction_on_horizontal_line(p[0], x_cell, c.line as isize)
                        },
                    };
                    if z.is_nan() { 0.0 } else { z }
                };
                p[2] += correction;
                p
            })
            .collect();
        waypoints.push(tail);
        waypoints
    }

    #[inline]
    fn active_correction(&self, x: f32, y: f32) -> f32
    {
        if self.active { self.z_correction(x, y) } else { 0.0 }
    }
}

#[cfg(test)]
mod tests
{
    use super::MAX_SEGMENTS;
    use crate::config::{BoundingBox, Capabilities, LevelingConfig};
    use crate::leveling::UnifiedBedLeveling;

    fn tilted(capabilities: Capabilities) -> UnifiedBedLeveling<3, 3>
    {
        let mut config = LevelingConfig::with_mesh_bounds(BoundingBox::new([0.0, 0.0], [200.0, 200.0]));
        config.capabilities = capabilities;
        config.segment_length = 30.0;
        let mut ubl = UnifiedBedLeveling::new(config).unwrap();
        for yi in 0..3
        {
            for xi in 0..3
            {
                ubl.set_z(xi, yi, 0.1 * xi as f32 + 0.2 * yi as f32).unwrap();
            }
        }
        ubl.enable().unwrap();
        ubl
    }

    fn expected(x: f32, y: f32, z: f32) -> f32
    {
        z + 0.001 * x + 0.002 * y
    }

    #[test]
    fn cartesian_splits_at_mesh_lines()
    {
        let ubl = tilted(Capabilities::probed());
        let path = ubl.plan_line([50.0, 20.0, 0.3], [250.0, 60.0, 0.3]);
        let xs: Vec<f32> = path.iter().map(|p| p[0]).collect();
        assert_eq!(xs.len(), 3);
        assert!((xs[0] - 100.0).abs() < 1e-4);
        assert!((xs[1] - 200.0).abs() < 1e-4);
        assert_eq!(path[2][..2], [250.0, 60.0]);
        for p in &path[..2]
        {
            let z_plan = p[2];
            assert!((z_plan - expected(p[0], p[1], 0.3)).abs() < 1e-5, "{p:?}");
        }
        // past the mesh edge the correction extrapolates the edge cell
        assert!((path[2][2] - expected(250.0, 60.0, 0.3)).abs() < 1e-5);
    }

    #[test]
    fn diagonal_through_mesh_point_is_not_doubled()
    {
        let ubl = tilted(Capabilities::probed());
        let path = ubl.plan_line([50.0, 50.0, 0.0], [150.0, 150.0, 1.0]);
        assert_eq!(path.len(), 2);
        assert!((path[0][0] - 100.0).abs() < 1e-4);
        assert!((path[0][2] - expected(100.0, 100.0, 0.5)).abs() < 1e-5);
    }

    #[test]
    fn move_inside_one_cell_is_a_single_waypoint()
    {
        let ubl = tilted(Capabilities::probed());
        let path = ubl.plan_line([10.0, 10.0, 0.2], [90.0, 40.0, 0.2]);
        assert_eq!(path.len(), 1);
        assert!((path[0][2] - expected(90.0, 40.0, 0.2)).abs() < 1e-5);
    }

    #[test]
    fn segmented_motion_uses_fixed_length_pieces()
    {
        let ubl = tilted(Capabilities::probed().with_segmented_motion(true));
        let path = ubl.plan_line([0.0, 0.0, 0.2], [100.0, 0.0, 0.2]);
        // ceil(100 / 30) pieces
        assert_eq!(path.len(), 4);
        assert!((path[0][0] - 25.0).abs() < 1e-5);
        assert_eq!(path[3][..2], [100.0, 0.0]);
        for p in &path
        {
            assert!((p[2] - expected(p[0], p[1], 0.2)).abs() < 1e-5);
        }
        let hop = ubl.plan_line([20.0, 20.0, 0.2], [20.0, 20.0, 5.0]);
        assert_eq!(hop.len(), 1);
    }

    #[test]
    fn segment_count_is_bounded()
    {
        let ubl = tilted(Capabilities::probed().with_segmented_motion(true));
        assert_eq!(ubl.plan_line([0.0, 0.0, 0.2], [1.0e30, 0.0, 0.2]).len(), MAX_SEGMENTS);
        let path = ubl.plan_line([0.0, 0.0, 0.2], [f32::INFINITY, 0.0, 0.2]);
        assert_eq!(path.len(), 1);
        assert_eq!(path[0][0], f32::INFINITY);
        assert_eq!(ubl.plan_line([0.0, 0.0, 0.2], [f32::NAN, 0.0, 0.2]).len(), 1);
    }

    #[test]
    fn inactive_leveling_passes_moves_through()
    {
        let mut ubl = tilted(Capabilities::probed());
        ubl.disable();
        assert_eq!(ubl.plan_line([0.0, 0.0, 0.2], [200.0, 200.0, 0.2]), vec![[200.0, 200.0, 0.2]]);
    }
}
