use log::{debug, trace};

use crate::geometry::MeshGeometry;
use crate::storage::mesh::Mesh;

///
/// Linear blend between `z0` (t = 0) and `z1` (t = 1).
/// Written as two products so both ends return the stored value exactly.
///
#[inline(always)]
pub(crate) fn lerp(z0: f32, z1: f32, t: f32) -> f32
{
    z0 * (1.0 - t) + z1 * t
}

///
/// Bilinear Z correction over a mesh. Borrows the geometry and heights, so it
/// is cheap to build per query and can be shared across threads.
///
#[derive(Copy, Clone)]
pub struct InterpolationOperation<'a, const NX: usize, const NY: usize>
{
    pub geometry: &'a MeshGeometry<NX, NY>,
    pub mesh: &'a Mesh<NX, NY>,
    /// Returned for positions off the mesh instead of extrapolating.
    pub z_raise_off_mesh: Option<f32>,
}

impl<'a, const NX: usize, const NY: usize> InterpolationOperation<'a, NX, NY>
{
    pub fn new(geometry: &'a MeshGeometry<NX, NY>, mesh: &'a Mesh<NX, NY>, z_raise_off_mesh: Option<f32>) -> Self
    {
        Self { geometry, mesh, z_raise_off_mesh }
    }

    ///
    /// Z correction anywhere on (or off) the mesh. Interpolates along the
    /// bottom and top X lines of the enclosing cell, then along Y between
    /// the two results. An undefined corner makes the whole correction `0.0`.
    ///
    #[inline]
    pub fn z_correction(&self, x: f32, y: f32) -> f32
    {
        if let Some(raise) = self.z_raise_off_mesh
        {
            if !self.geometry.contains(x, y)
            {
                return raise;
            }
        }

        let gx = &self.geometry.x;
        let gy = &self.geometry.y;
        let cx = gx.position_to_cell_index(x);
        let cy = gy.position_to_cell_index(y);
        let xratio = gx.cell_ratio(x, cx);
        let yratio = gy.cell_ratio(y, cy);

        let z_bottom = lerp(self.mesh.z(cx, cy), self.mesh.z(cx + 1, cy), xratio);
        let z_top = lerp(self.mesh.z(cx, cy + 1), self.mesh.z(cx + 1, cy + 1), xratio);
        let z = lerp(z_bottom, z_top, yratio);
        trace!("z_correction({x}, {y}) = {z:.6}");

        if z.is_nan()
        {
            // part of the cell is undefined
            debug!("undefined mesh point in z_correction({x}, {y}), using 0");
            return 0.0;
        }
        z
    }

    ///
    /// Correction at `x` along horizontal mesh line `yi`, interpolating from
    /// line `x_cell` towards the next one. Used for moves that only cross
    /// horizontal mesh lines. Out-of-range indices give the off-mesh raise or
    /// NaN; a NaN from an undefined point is passed through.
    ///
    #[inline]
    pub fn z_correction_on_horizontal_line(&self, x: f32, x_cell: isize, yi: isize) -> f32
    {
        if !within(x_cell, NX) || !within(yi, NY)
        {
            debug!(
                "{} out of bounds in z_correction_on_horizontal_line(x={x}, x_cell={x_cell}, yi={yi})",
                if within(x_cell, NX) { "yi" } else { "x_cell" }
            );
            return self.z_raise_off_mesh.unwrap_or(f32::NAN);
        }
        let (xi, yi) = (x_cell as usize, yi as usize);
        let ratio = self.geometry.x.cell_ratio(x, xi);
        // the last line has no neighbour, the correction stays flat there
        lerp(self.mesh.z(xi, yi), self.mesh.z(xi.min(NX - 2) + 1, yi), ratio)
    }

    ///
    /// Correction at `y` along vertical mesh line `xi`; see
    /// [`Self::z_correction_on_horizontal_line`].
    ///
    #[inline]
    pub fn z_correction_on_vertical_line(&self, y: f32, xi: isize, y_cell: isize) -> f32
    {
        if !within(xi, NX) || !within(y_cell, NY)
        {
            debug!(
                "{} out of bounds in z_correction_on_vertical_line(y={y}, xi={xi}, y_cell={y_cell})",
                if within(xi, NX) { "y_cell" } else { "xi" }
            );
            return self.z_raise_off_mesh.unwrap_or(f32::NAN);
        }
        let (xi, yi) = (xi as usize, y_cell as usize);
        let ratio = self.geometry.y.cell_ratio(y, yi);
        lerp(self.mesh.z(xi, yi), self.mesh.z(xi, yi.min(NY - 2) + 1), ratio)
    }

    #[cfg(feature = "rayon")]
    /// Corrections for many positions in parallel.
    pub fn z_correction_batch(&self, points: &[[f32; 2]]) -> Vec<f32>
    {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
        points.par_iter().map(|p| self.z_correction(p[0], p[1])).collect()
    }
}

#[inline(always)]
fn within(i: isize, n: usize) -> bool
{
    i >= 0 && (i as usize) < n
}
