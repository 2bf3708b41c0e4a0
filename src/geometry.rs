//! Mapping between grid indices and bed coordinates.

use crate::config::BoundingBox;
use crate::errors::LevelingError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axis
{
    X,
    Y,
}

impl Axis
{
    #[inline]
    pub fn dim(&self) -> usize
    {
        match self
        {
            Axis::X => 0,
            Axis::Y => 1,
        }
    }
}

///
/// One axis of the mesh: `N` grid lines spread evenly over `[min, max]`.
///
#[derive(Clone, Debug)]
pub struct AxisGeometry<const N: usize>
{
    min: f32,
    max: f32,
    dist: f32,
    inv_dist: f32,
    positions: [f32; N],
}

impl<const N: usize> AxisGeometry<N>
{
    const AT_LEAST_TWO_LINES: () = assert!(N >= 2, "a mesh axis needs at least two grid lines");

    pub fn new(min: f32, max: f32) -> Result<Self, LevelingError>
    {
        #[allow(clippy::let_unit_value)]
        let () = Self::AT_LEAST_TWO_LINES;
        if !min.is_finite() || !max.is_finite() || min >= max
        {
            return Err(LevelingError::InvalidGeometry);
        }
        let dist = (max - min) / (N - 1) as f32;
        let mut positions = [0.0; N];
        for (i, p) in positions.iter_mut().enumerate()
        {
            *p = min + i as f32 * dist;
        }
        // pin the last line so queries at the far edge land exactly on it
        positions[N - 1] = max;
        Ok(Self { min, max, dist, inv_dist: 1.0 / dist, positions })
    }

    #[inline]
    pub fn min(&self) -> f32
    {
        self.min
    }

    #[inline]
    pub fn max(&self) -> f32
    {
        self.max
    }

    /// Width of one cell.
    #[inline]
    pub fn dist(&self) -> f32
    {
        self.dist
    }

    #[inline]
    pub fn inv_dist(&self) -> f32
    {
        self.inv_dist
    }

    #[inline]
    pub const fn points(&self) -> usize
    {
        N
    }

    /// Inclusive span check.
    #[inline]
    pub fn contains(&self, pos: f32) -> bool
    {
        self.min <= pos && pos <= self.max
    }

    ///
    /// Physical coordinate of grid line `i`. Indices past the last line are
    /// extrapolated with the uniform cell width.
    ///
    #[inline]
    pub fn index_to_position(&self, i: usize) -> f32
    {
        if i < N
        {
            self.positions[i]
        }
        else
        {
            self.min + i as f32 * self.dist
        }
    }

    ///
    /// Index of the cell whose lower line is at or below `pos`, clamped into
    /// `[0, N-2]`. Positions off the mesh map to the nearest edge cell.
    ///
    #[inline]
    pub fn position_to_cell_index(&self, pos: f32) -> usize
    {
        let raw = ((pos - self.min) * self.inv_dist).floor() as isize;
        let mut cell = raw.clamp(0, N as isize - 2) as usize;
        // the reciprocal can land a hair below a grid line
        if cell + 2 < N && pos >= self.positions[cell + 1]
        {
            cell += 1;
        }
        else if cell > 0 && pos < self.positions[cell]
        {
            cell -= 1;
        }
        cell
    }

    ///
    /// Nearest grid line to `pos`, or `None` when that line would be off the mesh.
    ///
    #[inline]
    pub fn position_to_nearest_index(&self, pos: f32) -> Option<usize>
    {
        let raw = ((pos - self.min + self.dist * 0.5) * self.inv_dist).floor();
        if raw >= 0.0 && raw <= (N - 1) as f32
        {
            Some(raw as usize)
        }
        else
        {
            None
        }
    }

    ///
    /// Fractional position of `pos` inside the cell starting at line `cell`.
    /// Exactly `1.0` on the cell's upper line; unclamped elsewhere.
    ///
    #[inline]
    pub fn cell_ratio(&self, pos: f32, cell: usize) -> f32
    {
        if cell + 1 < N && pos == self.positions[cell + 1]
        {
            1.0
        }
        else
        {
            (pos - self.index_to_position(cell)) * self.inv_dist
        }
    }
}

///
/// Both axes of an `NX` x `NY` mesh.
///
#[derive(Clone, Debug)]
pub struct MeshGeometry<const NX: usize, const NY: usize>
{
    pub x: AxisGeometry<NX>,
    pub y: AxisGeometry<NY>,
}

impl<const NX: usize, const NY: usize> MeshGeometry<NX, NY>
{
    pub fn new(bounds: BoundingBox) -> Result<Self, LevelingError>
    {
        Ok(Self {
            x: AxisGeometry::new(bounds.lower[0], bounds.upper[0])?,
            y: AxisGeometry::new(bounds.lower[1], bounds.upper[1])?,
        })
    }

    pub fn bounds(&self) -> BoundingBox
    {
        BoundingBox::new([self.x.min(), self.y.min()], [self.x.max(), self.y.max()])
    }

    #[inline]
    pub fn index_to_position(&self, axis: Axis, i: usize) -> f32
    {
        match axis
        {
            Axis::X => self.x.index_to_position(i),
            Axis::Y => self.y.index_to_position(i),
        }
    }

    #[inline]
    pub fn position_to_cell_index(&self, axis: Axis, pos: f32) -> usize
    {
        match axis
        {
            Axis::X => self.x.position_to_cell_index(pos),
            Axis::Y => self.y.position_to_cell_index(pos),
        }
    }

    #[inline]
    pub fn position_to_nearest_index(&self, axis: Axis, pos: f32) -> Option<usize>
    {
        match axis
        {
            Axis::X => self.x.position_to_nearest_index(pos),
            Axis::Y => self.y.position_to_nearest_index(pos),
        }
    }

    /// Bed coordinate of grid point `(xi, yi)`.
    #[inline]
    pub fn point_position(&self, xi: usize, yi: usize) -> [f32; 2]
    {
        [self.x.index_to_position(xi), self.y.index_to_position(yi)]
    }

    #[inline]
    pub fn contains(&self, x: f32, y: f32) -> bool
    {
        self.x.contains(x) && self.y.contains(y)
    }
}
