//! Incremental weighted least-squares plane fit, `z = a*x + b*y + c`.

use crate::errors::LevelingError;

/// Relative size below which the normal-equation determinant counts as zero.
const DEGENERATE_TOLERANCE: f64 = 1e-9;

/// Fitted plane.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Plane
{
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Plane
{
    /// Plane through three points, `Err(DegenerateFit)` when their XY
    /// positions are colinear.
    pub fn through_points(p: [[f64; 3]; 3]) -> Result<Self, LevelingError>
    {
        let v1 = [p[0][0] - p[1][0], p[0][1] - p[1][1], p[0][2] - p[1][2]];
        let v2 = [p[2][0] - p[1][0], p[2][1] - p[1][1], p[2][2] - p[1][2]];
        let normal = [
            v1[1] * v2[2] - v1[2] * v2[1],
            v1[2] * v2[0] - v1[0] * v2[2],
            v1[0] * v2[1] - v1[1] * v2[0],
        ];
        let scale = v1[0].hypot(v1[1]) * v2[0].hypot(v2[1]);
        if !(normal[2].abs() > DEGENERATE_TOLERANCE * scale)
        {
            return Err(LevelingError::DegenerateFit);
        }
        let a = -normal[0] / normal[2];
        let b = -normal[1] / normal[2];
        Ok(Self { a, b, c: p[1][2] - a * p[1][0] - b * p[1][1] })
    }

    #[inline]
    pub fn z_at(&self, x: f64, y: f64) -> f64
    {
        self.a * x + self.b * y + self.c
    }
}

///
/// Running sums of a weighted plane fit. Add samples, then [`finish`](Self::finish).
///
#[derive(Clone, Debug, Default)]
pub struct LeastSquaresFit
{
    n: f64,
    x: f64,
    y: f64,
    z: f64,
    xx: f64,
    yy: f64,
    xy: f64,
    xz: f64,
    yz: f64,
    samples: usize,
}

impl LeastSquaresFit
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn reset(&mut self)
    {
        *self = Self::default();
    }

    #[inline]
    pub fn add(&mut self, x: f64, y: f64, z: f64)
    {
        self.add_weighted(x, y, z, 1.0);
    }

    #[inline]
    pub fn add_weighted(&mut self, x: f64, y: f64, z: f64, w: f64)
    {
        self.n += w;
        self.x += w * x;
        self.y += w * y;
        self.z += w * z;
        self.xx += w * x * x;
        self.yy += w * y * y;
        self.xy += w * x * y;
        self.xz += w * x * z;
        self.yz += w * y * z;
        self.samples += 1;
    }

    pub fn samples(&self) -> usize
    {
        self.samples
    }

    ///
    /// Solve the centred normal equations. Fewer than three samples, or
    /// samples whose XY positions lie on one line, give `Err(DegenerateFit)`.
    ///
    pub fn finish(&self) -> Result<Plane, LevelingError>
    {
        if self.samples < 3 || !(self.n > 0.0)
        {
            return Err(LevelingError::DegenerateFit);
        }
        let n = self.n;
        let (xbar, ybar, zbar) = (self.x / n, self.y / n, self.z / n);
        let sxx = self.xx / n - xbar * xbar;
        let syy = self.yy / n - ybar * ybar;
        let sxy = self.xy / n - xbar * ybar;
        let sxz = self.xz / n - xbar * zbar;
        let syz = self.yz / n - ybar * zbar;

        let det = sxx * syy - sxy * sxy;
        if !(det.abs() > DEGENERATE_TOLERANCE * (sxx + syy) * (sxx + syy)) || !det.is_finite()
        {
            return Err(LevelingError::DegenerateFit);
        }
        let a = (sxz * syy - syz * sxy) / det;
        let b = (syz * sxx - sxz * sxy) / det;
        Ok(Plane { a, b, c: zbar - a * xbar - b * ybar })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn recovers_exact_plane()
    {
        let mut fit = LeastSquaresFit::new();
        for i in 0..5
        {
            for j in 0..4
            {
                let (x, y) = (i as f64 * 40.0 + 10.0, j as f64 * 50.0 + 5.0);
                fit.add(x, y, 0.01 * x - 0.02 * y + 0.3);
            }
        }
        let plane = fit.finish().unwrap();
        assert!((plane.a - 0.01).abs() < 1e-9);
        assert!((plane.b + 0.02).abs() < 1e-9);
        assert!((plane.c - 0.3).abs() < 1e-7);
    }

    #[test]
    fn noisy_samples_average_out()
    {
        let mut fit = LeastSquaresFit::new();
        let noise = [0.01, -0.01, 0.02, -0.02];
        for (k, (x, y)) in [(0.0, 0.0), (100.0, 0.0), (0.0, 100.0), (100.0, 100.0)].into_iter().enumerate()
        {
            fit.add(x, y, 1.0 + noise[k]);
        }
        let plane = fit.finish().unwrap();
        assert!((plane.z_at(50.0, 50.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn weights_pull_towards_heavy_samples()
    {
        let mut light = LeastSquaresFit::new();
        let mut heavy = LeastSquaresFit::new();
        let samples = [(0.0, 0.0, 0.0), (10.0, 0.0, 0.0), (0.0, 10.0, 0.0), (10.0, 10.0, 1.0)];
        for (x, y, z) in samples
        {
            light.add(x, y, z);
            heavy.add_weighted(x, y, z, if z > 0.0 { 10.0 } else { 1.0 });
        }
        let at_corner = |p: Plane| p.z_at(10.0, 10.0);
        assert!(at_corner(heavy.finish().unwrap()) > at_corner(light.finish().unwrap()));
    }

    #[test]
    fn degenerate_inputs()
    {
        let mut fit = LeastSquaresFit::new();
        fit.add(0.0, 0.0, 1.0);
        fit.add(1.0, 1.0, 1.0);
        assert_eq!(fit.finish(), Err(LevelingError::DegenerateFit));
        fit.add(2.0, 2.0, 5.0);
        fit.add(37.5, 37.5, 5.0);
        assert_eq!(fit.finish(), Err(LevelingError::DegenerateFit));
        fit.reset();
        for i in 0..6
        {
            fit.add(20.0, i as f64 * 10.0, 0.0);
        }
        assert_eq!(fit.finish(), Err(LevelingError::DegenerateFit));
    }

    #[test]
    fn plane_through_three_points()
    {
        let plane = Plane::through_points([[39.0, 180.0, 0.5], [39.0, 20.0, 0.1], [180.0, 20.0, -0.2]]).unwrap();
        assert!((plane.z_at(39.0, 180.0) - 0.5).abs() < 1e-12);
        assert!((plane.z_at(39.0, 20.0) - 0.1).abs() < 1e-12);
        assert!((plane.z_at(180.0, 20.0) + 0.2).abs() < 1e-12);
        let colinear = Plane::through_points([[0.0, 0.0, 0.0], [50.0, 50.0, 1.0], [100.0, 100.0, 3.0]]);
        assert_eq!(colinear, Err(LevelingError::DegenerateFit));
        let repeated = Plane::through_points([[10.0, 10.0, 0.0], [10.0, 10.0, 1.0], [30.0, 10.0, 3.0]]);
        assert_eq!(repeated, Err(LevelingError::DegenerateFit));
    }
}
