use std::fmt::Display;

use crate::errors::LevelingError;

/// Value stored for a point that has not been measured or computed.
pub const UNDEFINED: f32 = f32::NAN;

///
/// Classification of a mesh point. `Invalid` and `Real` are derived from the
/// stored value on every call. `SetInBitmap` never describes a stored point;
/// as a query selector it picks points not yet marked in a caller's
/// [`MeshBitmap`].
///
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MeshPointType
{
    Invalid,
    Real,
    SetInBitmap,
}

///
/// Grid of Z offsets, `NX` points along X and `NY` along Y.
/// Stored as `z[xi][yi]`, so scan order walks each X line from front to back
/// before moving to the next.
///
#[derive(Clone, Debug)]
pub struct Mesh<const NX: usize, const NY: usize>
{
    z: [[f32; NY]; NX],
}

impl<const NX: usize, const NY: usize> Default for Mesh<NX, NY>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const NX: usize, const NY: usize> Mesh<NX, NY>
{
    /// A mesh with every point undefined.
    pub fn new() -> Self
    {
        Self { z: [[UNDEFINED; NY]; NX] }
    }

    /// Build from rows as they read on paper, `rows[yi][xi]`.
    pub fn from_rows(rows: [[f32; NX]; NY]) -> Self
    {
        Self { z: std::array::from_fn(|xi| std::array::from_fn(|yi| rows[yi][xi])) }
    }

    #[inline]
    pub const fn x_points(&self) -> usize
    {
        NX
    }

    #[inline]
    pub const fn y_points(&self) -> usize
    {
        NY
    }

    #[inline]
    pub const fn len(&self) -> usize
    {
        NX * NY
    }

    #[inline]
    pub const fn is_empty(&self) -> bool
    {
        NX * NY == 0
    }

    /// Stored height. Panics when the index is off the grid.
    #[inline]
    pub fn z(&self, xi: usize, yi: usize) -> f32
    {
        self.z[xi][yi]
    }

    /// Stored height, `None` when the index is off the grid.
    #[inline]
    pub fn get(&self, xi: usize, yi: usize) -> Option<f32>
    {
        self.z.get(xi).and_then(|line| line.get(yi)).copied()
    }

    #[inline]
    pub fn set_z(&mut self, xi: usize, yi: usize, z: f32)
    {
        self.z[xi][yi] = z;
    }

    /// Checked variant of [`Mesh::set_z`].
    pub fn try_set_z(&mut self, xi: usize, yi: usize, z: f32) -> Result<(), LevelingError>
    {
        let slot = self.z.get_mut(xi).and_then(|line| line.get_mut(yi)).ok_or(LevelingError::InvalidIndex)?;
        *slot = z;
        Ok(())
    }

    #[inline]
    pub fn is_defined(&self, xi: usize, yi: usize) -> bool
    {
        !self.z[xi][yi].is_nan()
    }

    #[inline]
    pub fn point_type(&self, xi: usize, yi: usize) -> MeshPointType
    {
        if self.is_defined(xi, yi) { MeshPointType::Real } else { MeshPointType::Invalid }
    }

    /// True when every point holds a number. Recomputed on each call.
    pub fn is_valid(&self) -> bool
    {
        self.z.iter().flatten().all(|z| !z.is_nan())
    }

    pub fn defined_count(&self) -> usize
    {
        self.z.iter().flatten().filter(|z| !z.is_nan()).count()
    }

    /// Mark every point undefined.
    pub fn invalidate(&mut self)
    {
        self.set_all(UNDEFINED);
    }

    pub fn set_all(&mut self, value: f32)
    {
        self.z.iter_mut().flatten().for_each(|z| *z = value);
    }

    /// Points in scan order (`xi` outer, `yi` inner) as `(xi, yi, z)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_
    {
        self.z.iter().enumerate().flat_map(|(xi, line)| line.iter().enumerate().map(move |(yi, &z)| (xi, yi, z)))
    }

    /// Mutable heights in scan order as `(xi, yi, &mut z)`.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, usize, &mut f32)> + '_
    {
        self.z.iter_mut().enumerate().flat_map(|(xi, line)| line.iter_mut().enumerate().map(move |(yi, z)| (xi, yi, z)))
    }
}

///
/// Height map in the firmware's report layout: top row is the far edge
/// (`yi = NY-1`), undefined points print as `.`.
///
impl<const NX: usize, const NY: usize> Display for Mesh<NX, NY>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for yi in (0..NY).rev()
        {
            write!(f, "{:>3} |", yi)?;
            for z in self.z.iter().map(|line| line[yi])
            {
                if z.is_nan()
                {
                    write!(f, " {:>7}", ".")?;
                }
                else
                {
                    write!(f, " {:>7.3}", z)?;
                }
            }
            writeln!(f)?;
        }
        write!(f, "    +")?;
        for xi in 0..NX
        {
            write!(f, " {:>7}", xi)?;
        }
        writeln!(f)
    }
}

///
/// Transient visited-set over the grid, used by population passes and
/// query exclusion. Never stored with the mesh.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeshBitmap<const NX: usize, const NY: usize>
{
    words: Vec<u64>,
}

impl<const NX: usize, const NY: usize> Default for MeshBitmap<NX, NY>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const NX: usize, const NY: usize> MeshBitmap<NX, NY>
{
    pub fn new() -> Self
    {
        Self { words: vec![0; (NX * NY).div_ceil(64)] }
    }

    /// Bitmap with every defined point of `mesh` marked.
    pub fn from_defined(mesh: &Mesh<NX, NY>) -> Self
    {
        let mut bitmap = Self::new();
        for (xi, yi, z) in mesh.iter()
        {
            if !z.is_nan()
            {
                bitmap.mark(xi, yi);
            }
        }
        bitmap
    }

    #[inline]
    fn bit(xi: usize, yi: usize) -> (usize, u64)
    {
        debug_assert!(xi < NX && yi < NY);
        let n = xi * NY + yi;
        (n / 64, 1u64 << (n % 64))
    }

    #[inline]
    pub fn mark(&mut self, xi: usize, yi: usize)
    {
        let (word, mask) = Self::bit(xi, yi);
        self.words[word] |= mask;
    }

    #[inline]
    pub fn unmark(&mut self, xi: usize, yi: usize)
    {
        let (word, mask) = Self::bit(xi, yi);
        self.words[word] &= !mask;
    }

    #[inline]
    pub fn is_marked(&self, xi: usize, yi: usize) -> bool
    {
        let (word, mask) = Self::bit(xi, yi);
        self.words[word] & mask != 0
    }

    pub fn count(&self) -> usize
    {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn clear(&mut self)
    {
        self.words.iter_mut().for_each(|w| *w = 0);
    }
}
