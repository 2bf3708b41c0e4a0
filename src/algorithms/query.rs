use kdtree::KdTree;
use kdtree::distance::squared_euclidean;
use log::trace;

use crate::config::BoundingBox;
use crate::errors::LevelingError;
use crate::geometry::MeshGeometry;
use crate::storage::mesh::{Mesh, MeshBitmap, MeshPointType};

/// Mesh point indices with the distance that selected them.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MeshIndexPair
{
    pub x: usize,
    pub y: usize,
    pub distance: f32,
}

///
/// Nearest mesh point of `point_type` to `(x, y)` whose physical position lies
/// inside `reach`. Points marked in `exclude` are skipped; with
/// [`MeshPointType::SetInBitmap`] only that exclusion applies. Ties keep the
/// first point in scan order.
///
pub fn find_closest_of_type<const NX: usize, const NY: usize>(
    geometry: &MeshGeometry<NX, NY>,
    mesh: &Mesh<NX, NY>,
    point_type: MeshPointType,
    x: f32,
    y: f32,
    reach: &BoundingBox,
    exclude: Option<&MeshBitmap<NX, NY>>,
) -> Option<MeshIndexPair>
{
    let mut closest: Option<MeshIndexPair> = None;
    for (xi, yi, _) in mesh.iter()
    {
        let type_matches = match point_type
        {
            MeshPointType::SetInBitmap => true,
            t => mesh.point_type(xi, yi) == t,
        };
        if !type_matches || exclude.is_some_and(|b| b.is_marked(xi, yi))
        {
            continue;
        }
        let position = geometry.point_position(xi, yi);
        if !reach.contains(position)
        {
            continue;
        }
        let distance = (position[0] - x).hypot(position[1] - y);
        if closest.map_or(true, |c| distance < c.distance)
        {
            closest = Some(MeshIndexPair { x: xi, y: yi, distance });
        }
    }
    closest
}

fn build_kdtree<const NX: usize, const NY: usize>(mesh: &Mesh<NX, NY>) -> Result<KdTree<f64, (usize, usize), [f64; 2]>, kdtree::ErrorKind>
{
    let mut tree = KdTree::new(2);
    for (xi, yi, z) in mesh.iter()
    {
        if !z.is_nan()
        {
            tree.add([xi as f64, yi as f64], (xi, yi))?;
        }
    }
    Ok(tree)
}

///
/// Undefined, probe-reachable point furthest (in index space) from every
/// defined point, used to spread probing across the bed. With nothing
/// defined yet the centre of the mesh is returned. `Ok(None)` when no
/// reachable point is undefined.
///
pub fn find_furthest_invalid<const NX: usize, const NY: usize>(
    geometry: &MeshGeometry<NX, NY>,
    mesh: &Mesh<NX, NY>,
    probe_bounds: &BoundingBox,
) -> Result<Option<MeshIndexPair>, LevelingError>
{
    let candidates: Vec<(usize, usize)> = mesh.iter()
        .filter(|&(xi, yi, z)| z.is_nan() && probe_bounds.contains(geometry.point_position(xi, yi)))
        .map(|(xi, yi, _)| (xi, yi))
        .collect();
    if candidates.is_empty()
    {
        return Ok(None);
    }
    let tree = build_kdtree(mesh).map_err(|_| LevelingError::KdTreeError)?;
    if tree.size() == 0
    {
        return Ok(Some(MeshIndexPair { x: NX / 2, y: NY / 2, distance: 1.0 }));
    }

    let mut furthest: Option<MeshIndexPair> = None;
    for (xi, yi) in candidates
    {
        let nearest = tree.nearest(&[xi as f64, yi as f64], 1, &squared_euclidean).map_err(|_| LevelingError::KdTreeError)?;
        let Some(&(d2, _)) = nearest.first() else { continue };
        let distance = d2.sqrt() as f32;
        if furthest.map_or(true, |f| distance > f.distance)
        {
            furthest = Some(MeshIndexPair { x: xi, y: yi, distance });
        }
    }
    trace!("furthest undefined point: {furthest:?}");
    Ok(furthest)
}
