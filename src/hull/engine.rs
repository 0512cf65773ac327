//! Convex hull engine abstraction and the in-tree backend.
//!
//! The builders in this module's siblings only consume the narrow
//! [HullEngine] contract, so the in-tree incremental beneath–beyond
//! backend can be swapped for an external engine (e.g. Qhull bindings)
//! without touching them.

use crate::errors::{GibbsError, GibbsResult};
use crate::linalg::hyperplane_normal;
use nalgebra::{DMatrix, DVector};
use std::collections::{BTreeMap, BTreeSet};

/// A facet as reported by a hull engine, in full input coordinates
/// (dropped dimensions carry zero normal components).
#[derive(Clone, Debug)]
pub struct EngineFacet {
    /// Indices of the facet vertices into the input point list.
    pub vertices: Vec<usize>,
    /// Outward hyperplane normal, one coefficient per input dimension.
    pub normal: Vec<f64>,
    /// Hyperplane offset: `normal · x = offset` on the facet.
    pub offset: f64,
    pub area: f64,
    pub simplicial: bool,
    pub defined: bool,
}

impl EngineFacet {
    /// Facets of the lower hull have a non-positive final (energy)
    /// normal coordinate.
    pub fn is_lower(&self) -> bool {
        self.normal.last().is_some_and(|&coefficient| coefficient <= 0.0)
    }
}

/// The external hull-engine contract: compute the convex hull of `points`
/// while ignoring the listed dimensions.
pub trait HullEngine {
    fn convex_hull(
        &self,
        points: &[Vec<f64>],
        dropped_dimensions: &BTreeSet<usize>,
    ) -> GibbsResult<Vec<EngineFacet>>;
}

/// In-tree d-dimensional incremental beneath–beyond construction.
#[derive(Default)]
pub struct BeneathBeyond;

struct Face {
    vertices: Vec<usize>,
    normal: DVector<f64>,
    offset: f64,
    alive: bool,
}

impl HullEngine for BeneathBeyond {
    fn convex_hull(
        &self,
        points: &[Vec<f64>],
        dropped_dimensions: &BTreeSet<usize>,
    ) -> GibbsResult<Vec<EngineFacet>> {
        let full_dimension = points.first().map(|p| p.len()).unwrap_or(0);
        let active: Vec<usize> = (0..full_dimension)
            .filter(|dim| !dropped_dimensions.contains(dim))
            .collect();
        let dimension = active.len();
        if dimension < 2 || points.len() <= dimension {
            return Err(GibbsError::DegenerateHull {
                npoints: points.len(),
                dimension,
            });
        }
        let projected: Vec<DVector<f64>> = points
            .iter()
            .map(|point| DVector::from_iterator(dimension, active.iter().map(|&dim| point[dim])))
            .collect();
        let scale = projected
            .iter()
            .flat_map(|p| p.iter())
            .fold(0.0f64, |acc, &v| acc.max(v.abs()));
        let epsilon = 1e-9 * (1.0 + scale);

        let simplex = initial_simplex(&projected, dimension, epsilon)?;
        let interior = {
            let mut centroid = DVector::<f64>::zeros(dimension);
            for &index in &simplex {
                centroid += &projected[index];
            }
            centroid / simplex.len() as f64
        };

        // Faces of the initial simplex: each drops one vertex.
        let mut faces: Vec<Face> = Vec::new();
        for skip in 0..simplex.len() {
            let vertices: Vec<usize> = simplex
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, &index)| index)
                .collect();
            if let Some(face) = make_face(vertices, &projected, &interior) {
                faces.push(face);
            }
        }

        let in_simplex: BTreeSet<usize> = simplex.iter().copied().collect();
        for index in 0..projected.len() {
            if in_simplex.contains(&index) {
                continue;
            }
            insert_point(index, &projected, &interior, &mut faces, epsilon);
        }

        Ok(faces
            .iter()
            .filter(|face| face.alive)
            .map(|face| embed_facet(face, &projected, &active, full_dimension))
            .collect())
    }
}

/// Greedily pick d+1 affinely independent points, extending an
/// orthonormal basis of the spanned subspace one residual at a time.
fn initial_simplex(
    projected: &[DVector<f64>],
    dimension: usize,
    epsilon: f64,
) -> GibbsResult<Vec<usize>> {
    let mut simplex = vec![0usize];
    let mut basis: Vec<DVector<f64>> = Vec::new();
    while simplex.len() < dimension + 1 {
        let origin = &projected[simplex[0]];
        let mut best: Option<(usize, f64, DVector<f64>)> = None;
        for (index, point) in projected.iter().enumerate() {
            if simplex.contains(&index) {
                continue;
            }
            let mut residual = point - origin;
            for direction in &basis {
                let projection = direction.dot(&residual);
                residual -= direction * projection;
            }
            let magnitude = residual.norm();
            if best.as_ref().map(|(_, m, _)| magnitude > *m).unwrap_or(true) {
                best = Some((index, magnitude, residual));
            }
        }
        match best {
            Some((index, magnitude, residual)) if magnitude > epsilon => {
                basis.push(residual / magnitude);
                simplex.push(index);
            }
            _ => {
                return Err(GibbsError::DegenerateHull {
                    npoints: projected.len(),
                    dimension,
                })
            }
        }
    }
    Ok(simplex)
}

/// Build an outward-oriented face over the given vertices, or `None`
/// when they are affinely dependent.
fn make_face(vertices: Vec<usize>, projected: &[DVector<f64>], interior: &DVector<f64>) -> Option<Face> {
    let simplex: Vec<DVector<f64>> = vertices
        .iter()
        .map(|&index| projected[index].clone())
        .collect();
    let mut normal = hyperplane_normal(&simplex)?;
    let mut offset = normal.dot(&simplex[0]);
    if normal.dot(interior) > offset {
        normal = -normal;
        offset = -offset;
    }
    Some(Face {
        vertices,
        normal,
        offset,
        alive: true,
    })
}

/// Beneath–beyond step: find the faces visible from the new point,
/// replace them with the cone from the point over the horizon ridges.
fn insert_point(
    index: usize,
    projected: &[DVector<f64>],
    interior: &DVector<f64>,
    faces: &mut Vec<Face>,
    epsilon: f64,
) {
    let point = &projected[index];
    let visible: Vec<usize> = faces
        .iter()
        .enumerate()
        .filter(|(_, face)| face.alive && face.normal.dot(point) - face.offset > epsilon)
        .map(|(face_index, _)| face_index)
        .collect();
    if visible.is_empty() {
        return;
    }

    // A ridge of the visible region that is not shared between two
    // visible faces lies on the horizon.
    let mut ridge_counts: BTreeMap<Vec<usize>, usize> = BTreeMap::new();
    for &face_index in &visible {
        for skip in 0..faces[face_index].vertices.len() {
            let mut ridge: Vec<usize> = faces[face_index]
                .vertices
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, &v)| v)
                .collect();
            ridge.sort_unstable();
            *ridge_counts.entry(ridge).or_insert(0) += 1;
        }
    }

    let mut new_faces = Vec::new();
    for (ridge, count) in &ridge_counts {
        if *count != 1 {
            continue;
        }
        let mut vertices = ridge.clone();
        vertices.push(index);
        match make_face(vertices, projected, interior) {
            Some(face) => new_faces.push(face),
            // The point is affinely dependent with the ridge; leave the
            // existing faces in place rather than tear a hole in the hull.
            None => return,
        }
    }
    for &face_index in &visible {
        faces[face_index].alive = false;
    }
    faces.extend(new_faces);
}

fn embed_facet(
    face: &Face,
    projected: &[DVector<f64>],
    active: &[usize],
    full_dimension: usize,
) -> EngineFacet {
    let mut normal = vec![0.0; full_dimension];
    for (component, &dim) in active.iter().enumerate() {
        normal[dim] = face.normal[component];
    }
    EngineFacet {
        vertices: face.vertices.clone(),
        normal,
        offset: face.offset,
        area: facet_area(&face.vertices, projected),
        simplicial: true,
        defined: true,
    }
}

/// Area of a (d−1)-simplex in `R^d` from the Gram determinant of its
/// edge vectors.
fn facet_area(vertices: &[usize], projected: &[DVector<f64>]) -> f64 {
    let edge_count = vertices.len() - 1;
    if edge_count == 0 {
        return 0.0;
    }
    let dimension = projected[vertices[0]].len();
    let mut edges = DMatrix::<f64>::zeros(dimension, edge_count);
    for (j, &vertex) in vertices.iter().skip(1).enumerate() {
        edges.set_column(j, &(&projected[vertex] - &projected[vertices[0]]));
    }
    let gram = edges.transpose() * &edges;
    let determinant = gram.determinant().max(0.0);
    let factorial: f64 = (1..=edge_count).map(|k| k as f64).product();
    determinant.sqrt() / factorial
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn square_hull_has_four_edges() {
        let points = vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 1.0],
            vec![0.5, 0.5],
        ];
        let facets = BeneathBeyond
            .convex_hull(&points, &BTreeSet::new())
            .unwrap();
        assert_eq!(facets.len(), 4);
        // The interior point never appears as a vertex.
        assert!(facets.iter().all(|f| !f.vertices.contains(&4)));
        for facet in &facets {
            assert_relative_eq!(facet.area, 1.0, max_relative = 1e-12);
            // Outward normals point away from the centre.
            let centre = DVector::from_vec(vec![0.5, 0.5]);
            let n = DVector::from_vec(facet.normal.clone());
            assert!(n.dot(&centre) < facet.offset);
        }
    }

    #[test]
    fn lower_hull_of_a_parabola_skips_interior_points() {
        // y = x^2 sampled over [-2, 2] plus one point well above the curve.
        let mut points: Vec<Vec<f64>> = (-2..=2)
            .map(|i| {
                let x = i as f64;
                vec![x, x * x]
            })
            .collect();
        points.push(vec![0.0, 10.0]);
        let facets = BeneathBeyond
            .convex_hull(&points, &BTreeSet::new())
            .unwrap();
        let lower: Vec<&EngineFacet> = facets.iter().filter(|f| f.is_lower()).collect();
        // Lower chain: (-2,4) - (-1,1) - (0,0) - (1,1) - (2,4).
        assert_eq!(lower.len(), 4);
        let lower_vertices: BTreeSet<usize> =
            lower.iter().flat_map(|f| f.vertices.iter().copied()).collect();
        assert_eq!(lower_vertices, BTreeSet::from([0, 1, 2, 3, 4]));
    }

    #[test]
    fn dropped_dimensions_are_ignored_and_zeroed_in_normals() {
        // 3-d points whose middle coordinate is dependent; the hull is
        // computed on (x, z) only.
        let points = vec![
            vec![0.0, 9.0, 0.0],
            vec![1.0, 9.0, 0.0],
            vec![0.5, 9.0, 1.0],
            vec![0.5, 9.0, 0.25],
        ];
        let dropped = BTreeSet::from([1]);
        let facets = BeneathBeyond.convex_hull(&points, &dropped).unwrap();
        assert_eq!(facets.len(), 3);
        for facet in &facets {
            assert_eq!(facet.normal.len(), 3);
            assert_eq!(facet.normal[1], 0.0);
            assert!(!facet.vertices.contains(&3));
        }
    }

    #[test]
    fn coplanar_points_are_degenerate() {
        let points = vec![
            vec![0.0, 0.0],
            vec![1.0, 1.0],
            vec![2.0, 2.0],
            vec![3.0, 3.0],
        ];
        let result = BeneathBeyond.convex_hull(&points, &BTreeSet::new());
        assert!(matches!(result, Err(GibbsError::DegenerateHull { .. })));
    }

    #[test]
    fn tetrahedron_in_three_dimensions() {
        let points = vec![
            vec![0.0, 0.0, 0.0],
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.25, 0.25, 0.25],
        ];
        let facets = BeneathBeyond
            .convex_hull(&points, &BTreeSet::new())
            .unwrap();
        assert_eq!(facets.len(), 4);
        let total_area: f64 = facets.iter().map(|f| f.area).sum();
        // Three unit right triangles plus the diagonal face.
        assert_relative_eq!(
            total_area,
            1.5 + 0.75f64.sqrt(),
            max_relative = 1e-12
        );
    }
}
