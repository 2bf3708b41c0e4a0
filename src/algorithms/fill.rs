//! Filling undefined mesh points from their defined neighbours.

use log::{info, warn};

use crate::errors::LevelingError;
use crate::geometry::MeshGeometry;
use crate::storage::mesh::{Mesh, MeshBitmap};
use super::least_squares::LeastSquaresFit;

/// Cardinal search direction in index space.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FillDirection
{
    Left,
    Right,
    Down,
    Up,
}

impl FillDirection
{
    pub const ALL: [FillDirection; 4] = [FillDirection::Left, FillDirection::Right, FillDirection::Down, FillDirection::Up];

    #[inline]
    pub fn step(&self) -> (isize, isize)
    {
        match self
        {
            FillDirection::Left => (-1, 0),
            FillDirection::Right => (1, 0),
            FillDirection::Down => (0, -1),
            FillDirection::Up => (0, 1),
        }
    }

    pub fn opposite(&self) -> FillDirection
    {
        match self
        {
            FillDirection::Left => FillDirection::Right,
            FillDirection::Right => FillDirection::Left,
            FillDirection::Down => FillDirection::Up,
            FillDirection::Up => FillDirection::Down,
        }
    }
}

///
/// Walks from `(xi, yi)` in `dir` and returns up to two defined points as
/// `(steps, z)`. Points marked in `skip` are treated as undefined.
///
fn defined_along<const NX: usize, const NY: usize>(mesh: &Mesh<NX, NY>, xi: usize, yi: usize, dir: FillDirection, skip: Option<&MeshBitmap<NX, NY>>) -> [Option<(usize, f32)>; 2]
{
    let (dx, dy) = dir.step();
    let mut found = [None, None];
    let mut count = 0;
    let (mut x, mut y) = (xi as isize, yi as isize);
    let mut steps = 0;
    loop
    {
        x += dx;
        y += dy;
        steps += 1;
        if x < 0 || y < 0 || x >= NX as isize || y >= NY as isize
        {
            break;
        }
        let (ux, uy) = (x as usize, y as usize);
        if !mesh.is_defined(ux, uy) || skip.is_some_and(|s| s.is_marked(ux, uy))
        {
            continue;
        }
        found[count] = Some((steps, mesh.z(ux, uy)));
        count += 1;
        if count == 2
        {
            break;
        }
    }
    found
}

/// Value between the nearest defined points ahead along `dir` and behind it.
fn interpolated_value<const NX: usize, const NY: usize>(mesh: &Mesh<NX, NY>, xi: usize, yi: usize, dir: FillDirection, skip: Option<&MeshBitmap<NX, NY>>) -> Option<f32>
{
    if mesh.is_defined(xi, yi)
    {
        return None;
    }
    let [Some((d1, z1)), _] = defined_along(mesh, xi, yi, dir, skip) else { return None };
    let [Some((db, zb)), _] = defined_along(mesh, xi, yi, dir.opposite(), skip) else { return None };
    let t = db as f32 / (db + d1) as f32;
    Some(zb * (1.0 - t) + z1 * t)
}

///
/// Continues the line through the two nearest defined points ahead along
/// `dir`, but never below the nearest one.
///
fn extrapolated_value<const NX: usize, const NY: usize>(mesh: &Mesh<NX, NY>, xi: usize, yi: usize, dir: FillDirection, skip: Option<&MeshBitmap<NX, NY>>) -> Option<f32>
{
    if mesh.is_defined(xi, yi)
    {
        return None;
    }
    let [Some((d1, z1)), Some((d2, z2))] = defined_along(mesh, xi, yi, dir, skip) else { return None };
    let extrapolated = z1 + (z1 - z2) * d1 as f32 / (d2 - d1) as f32;
    Some(z1.max(extrapolated))
}

///
/// Fill one undefined point by looking along `dir` (and back the other way).
/// Returns false and leaves the point undefined when no usable neighbours
/// exist, or when the point is already defined.
///
pub fn smart_fill_one<const NX: usize, const NY: usize>(mesh: &mut Mesh<NX, NY>, xi: usize, yi: usize, dir: FillDirection) -> bool
{
    if xi >= NX || yi >= NY
    {
        return false;
    }
    let value = interpolated_value(mesh, xi, yi, dir, None).or_else(|| extrapolated_value(mesh, xi, yi, dir, None));
    match value
    {
        Some(z) =>
        {
            mesh.set_z(xi, yi, z);
            true
        },
        None => false,
    }
}

///
/// Fill every undefined point that has usable neighbours in one of the four
/// cardinal directions. Interpolation along either axis is preferred over
/// extrapolation. Runs passes until one fills nothing; points filled in a
/// pass only become sources in the next one. Returns the number filled.
///
pub fn smart_fill_mesh<const NX: usize, const NY: usize>(mesh: &mut Mesh<NX, NY>) -> usize
{
    let mut filled_this_pass = MeshBitmap::<NX, NY>::new();
    let mut total = 0;
    loop
    {
        filled_this_pass.clear();
        for xi in 0..NX
        {
            for yi in 0..NY
            {
                let skip = Some(&filled_this_pass);
                let value = FillDirection::ALL.iter()
                    .find_map(|&dir| interpolated_value(mesh, xi, yi, dir, skip))
                    .or_else(|| FillDirection::ALL.iter().find_map(|&dir| extrapolated_value(mesh, xi, yi, dir, skip)));
                if let Some(z) = value
                {
                    mesh.set_z(xi, yi, z);
                    filled_this_pass.mark(xi, yi);
                }
            }
        }
        let filled = filled_this_pass.count();
        if filled == 0
        {
            break;
        }
        total += filled;
    }
    info!("smart fill: {total} points filled, {} still undefined", mesh.len() - mesh.defined_count());
    total
}

///
/// Fill every undefined point from a plane fitted to all originally defined
/// points, each weighted by `1 + weight_factor * max(cell width) / distance`
/// so nearby points dominate. A degenerate source set leaves the mesh
/// untouched and returns `Err(DegenerateFit)`.
///
pub fn smart_fill_wlsf<const NX: usize, const NY: usize>(geometry: &MeshGeometry<NX, NY>, mesh: &mut Mesh<NX, NY>, weight_factor: f32) -> Result<usize, LevelingError>
{
    let sources = MeshBitmap::from_defined(mesh);
    let weight_scaled = weight_factor as f64 * geometry.x.dist().max(geometry.y.dist()) as f64;
    let mut fit = LeastSquaresFit::new();
    let mut fills = Vec::new();

    for (ix, iy, z) in mesh.iter()
    {
        if !z.is_nan()
        {
            continue;
        }
        let [px, py] = geometry.point_position(ix, iy);
        fit.reset();
        for (jx, jy, rz) in mesh.iter()
        {
            if !sources.is_marked(jx, jy)
            {
                continue;
            }
            let [rx, ry] = geometry.point_position(jx, jy);
            let distance = ((rx - px) as f64).hypot((ry - py) as f64);
            fit.add_weighted(rx as f64, ry as f64, rz as f64, 1.0 + weight_scaled / distance);
        }
        let plane = fit.finish().inspect_err(|_| warn!("weighted fill: insufficient data ({} defined points)", sources.count()))?;
        fills.push((ix, iy, plane.z_at(px as f64, py as f64) as f32));
    }

    for &(ix, iy, z) in &fills
    {
        mesh.set_z(ix, iy, z);
    }
    info!("weighted fill: {} points extrapolated", fills.len());
    Ok(fills.len())
}
