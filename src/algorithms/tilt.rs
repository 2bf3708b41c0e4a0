//! Whole-mesh adjustments: constant fills, offsets, statistics and tilting
//! by a measured plane.

use log::{debug, info};

use crate::errors::LevelingError;
use crate::geometry::MeshGeometry;
use crate::storage::mesh::Mesh;
use super::least_squares::{LeastSquaresFit, Plane};

/// Mean and spread of the defined mesh points.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MeshStatistics
{
    pub count: usize,
    pub mean: f32,
    pub std_dev: f32,
}

pub fn set_all_points_to_value<const NX: usize, const NY: usize>(mesh: &mut Mesh<NX, NY>, value: f32)
{
    mesh.set_all(value);
}

/// Add `offset` to every defined point. Undefined points stay undefined.
pub fn shift_mesh_height<const NX: usize, const NY: usize>(mesh: &mut Mesh<NX, NY>, offset: f32)
{
    for (_, _, z) in mesh.iter_mut()
    {
        if !z.is_nan()
        {
            *z += offset;
        }
    }
}

///
/// Mean and standard deviation of the defined points, `None` on an empty mesh.
/// The deviation divides by `count + 1`, which biases it slightly low for
/// small meshes.
///
pub fn mesh_statistics<const NX: usize, const NY: usize>(mesh: &Mesh<NX, NY>) -> Option<MeshStatistics>
{
    let (count, sum) = mesh.iter()
        .filter(|(_, _, z)| !z.is_nan())
        .fold((0usize, 0.0f64), |(n, s), (_, _, z)| (n + 1, s + z as f64));
    if count == 0
    {
        return None;
    }
    let mean = sum / count as f64;
    let sum_sq: f64 = mesh.iter()
        .filter(|(_, _, z)| !z.is_nan())
        .map(|(_, _, z)| (z as f64 - mean).powi(2))
        .sum();
    Some(MeshStatistics { count, mean: mean as f32, std_dev: (sum_sq / (count + 1) as f64).sqrt() as f32 })
}

///
/// Shift the defined points so their mean becomes `-offset`, i.e. subtract
/// `mean + offset` from each. Returns the statistics taken before the shift.
///
pub fn adjust_mesh_to_mean<const NX: usize, const NY: usize>(mesh: &mut Mesh<NX, NY>, offset: f32) -> Option<MeshStatistics>
{
    let stats = mesh_statistics(mesh)?;
    shift_mesh_height(mesh, -(stats.mean + offset));
    debug!("mesh adjusted to mean {:.5} (offset {offset})", stats.mean);
    Some(stats)
}

///
/// Add `plane` to every defined point and set undefined points to the plane
/// itself.
///
pub fn apply_plane<const NX: usize, const NY: usize>(geometry: &MeshGeometry<NX, NY>, mesh: &mut Mesh<NX, NY>, plane: &Plane)
{
    for (xi, yi, z) in mesh.iter_mut()
    {
        let [x, y] = geometry.point_position(xi, yi);
        let tilt = plane.z_at(x as f64, y as f64) as f32;
        *z = if z.is_nan() { tilt } else { *z + tilt };
    }
}

///
/// Tilt the mesh by the plane through three probed heights at `positions`.
/// Colinear positions give `Err(DegenerateFit)` and leave the mesh untouched.
///
pub fn tilt_mesh_from_three_points<const NX: usize, const NY: usize>(
    geometry: &MeshGeometry<NX, NY>,
    mesh: &mut Mesh<NX, NY>,
    positions: &[[f32; 2]; 3],
    measured: [f32; 3],
) -> Result<Plane, LevelingError>
{
    let points = std::array::from_fn(|i| [positions[i][0] as f64, positions[i][1] as f64, measured[i] as f64]);
    let plane = Plane::through_points(points)?;
    apply_plane(geometry, mesh, &plane);
    info!("three point tilt: a={:.6} b={:.6} d={:.5}", plane.a, plane.b, plane.c);
    Ok(plane)
}

///
/// Tilt the mesh by the least-squares plane through `samples` (`[x, y, z]`).
/// Fewer than three samples, or samples on one line, give
/// `Err(DegenerateFit)` and leave the mesh untouched.
///
pub fn tilt_mesh_from_probed_grid<const NX: usize, const NY: usize>(
    geometry: &MeshGeometry<NX, NY>,
    mesh: &mut Mesh<NX, NY>,
    samples: &[[f32; 3]],
) -> Result<Plane, LevelingError>
{
    let mut fit = LeastSquaresFit::new();
    for &[x, y, z] in samples
    {
        fit.add(x as f64, y as f64, z as f64);
    }
    let plane = fit.finish()?;
    apply_plane(geometry, mesh, &plane);
    info!("grid tilt from {} samples: a={:.6} b={:.6} d={:.5}", samples.len(), plane.a, plane.b, plane.c);
    Ok(plane)
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::config::BoundingBox;
    use crate::storage::mesh::UNDEFINED;

    const U: f32 = UNDEFINED;

    fn geometry() -> MeshGeometry<3, 3>
    {
        MeshGeometry::new(BoundingBox::new([0.0, 0.0], [200.0, 200.0])).unwrap()
    }

    #[test]
    fn offsets_skip_undefined_points()
    {
        let mut mesh = Mesh::<2, 2>::from_rows([[0.1, U], [0.3, -0.1]]);
        shift_mesh_height(&mut mesh, 0.5);
        assert!((mesh.z(0, 0) - 0.6).abs() < 1e-6);
        assert!(mesh.z(1, 0).is_nan());
        set_all_points_to_value(&mut mesh, 0.25);
        assert!(mesh.is_valid());
        assert!(mesh.iter().all(|(_, _, z)| z == 0.25));
    }

    #[test]
    fn statistics()
    {
        assert_eq!(mesh_statistics(&Mesh::<3, 3>::new()), None);
        let mesh = Mesh::<2, 2>::from_rows([[1.0, 2.0], [3.0, U]]);
        let stats = mesh_statistics(&mesh).unwrap();
        assert_eq!(stats.count, 3);
        assert!((stats.mean - 2.0).abs() < 1e-6);
        // (1 + 0 + 1) / (3 + 1)
        assert!((stats.std_dev - 0.5f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn adjust_to_mean()
    {
        let mut mesh = Mesh::<2, 2>::from_rows([[1.0, 2.0], [3.0, U]]);
        let before = adjust_mesh_to_mean(&mut mesh, 0.5).unwrap();
        assert!((before.mean - 2.0).abs() < 1e-6);
        let after = mesh_statistics(&mesh).unwrap();
        assert!((after.mean + 0.5).abs() < 1e-6);
        assert!(mesh.z(1, 1).is_nan());
        assert_eq!(adjust_mesh_to_mean(&mut Mesh::<2, 2>::new(), 0.0), None);
    }

    #[test]
    fn three_point_tilt_adds_plane()
    {
        let g = geometry();
        let mut mesh = Mesh::<3, 3>::new();
        mesh.set_z(1, 1, 0.05);
        let positions = [[0.0, 200.0], [0.0, 0.0], [200.0, 0.0]];
        // z = 0.001 * x + 0.0005 * y + 0.1
        let plane = tilt_mesh_from_three_points(&g, &mut mesh, &positions, [0.2, 0.1, 0.3]).unwrap();
        assert!((plane.a - 0.001).abs() < 1e-9);
        assert!((plane.b - 0.0005).abs() < 1e-9);
        assert!(mesh.is_valid());
        assert!((mesh.z(0, 0) - 0.1).abs() < 1e-6);
        assert!((mesh.z(2, 2) - 0.4).abs() < 1e-6);
        assert!((mesh.z(1, 1) - (0.05 + 0.25)).abs() < 1e-6);
    }

    #[test]
    fn degenerate_tilts_leave_mesh_alone()
    {
        let g = geometry();
        let mut mesh = Mesh::<3, 3>::new();
        mesh.set_z(0, 0, 0.1);
        let colinear = [[0.0, 0.0], [100.0, 100.0], [200.0, 200.0]];
        assert_eq!(tilt_mesh_from_three_points(&g, &mut mesh, &colinear, [0.0, 0.1, 0.2]), Err(LevelingError::DegenerateFit));
        assert_eq!(tilt_mesh_from_probed_grid(&g, &mut mesh, &[[0.0, 0.0, 0.1], [10.0, 0.0, 0.2]]), Err(LevelingError::DegenerateFit));
        assert_eq!(mesh.defined_count(), 1);
        assert_eq!(mesh.z(0, 0), 0.1);
    }

    #[test]
    fn grid_tilt_fits_samples()
    {
        let g = geometry();
        let mut mesh = Mesh::<3, 3>::new();
        set_all_points_to_value(&mut mesh, 0.0);
        let mut samples = Vec::new();
        for &y in &[20.0, 100.0, 180.0]
        {
            for &x in &[20.0, 100.0, 180.0]
            {
                samples.push([x, y, -0.002 * x + 0.001 * y]);
            }
        }
        tilt_mesh_from_probed_grid(&g, &mut mesh, &samples).unwrap();
        assert!((mesh.z(2, 0) + 0.4).abs() < 1e-5);
        assert!((mesh.z(0, 2) - 0.2).abs() < 1e-5);
    }
}
