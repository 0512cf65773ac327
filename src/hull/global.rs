//! Global lower convex hull over all phases' energy landscapes.

use crate::errors::{GibbsError, GibbsResult};
use crate::hull::engine::HullEngine;
use crate::hull::facet::SimplicialFacet;
use itertools::Itertools;
use nalgebra::DMatrix;
use std::collections::BTreeSet;

/// Candidate tie-hyperplane facets of the global energy landscape.
///
/// `points` are mole fractions (ordered by element) followed by energy as
/// the last coordinate; indices into `points` are the hull-map ids. The
/// final mole-fraction coordinate is dependent (`1 − Σ` of the others)
/// and is dropped for the hull computation. `midpoint_energy(id1, id2)`
/// returns the true energy at the midpoint of two points' internal
/// coordinates, or infinity when they belong to different phases.
pub fn global_lower_convex_hull(
    points: &[Vec<f64>],
    critical_edge_length: f64,
    coplanarity_allowance: f64,
    engine: &dyn HullEngine,
    mut midpoint_energy: impl FnMut(usize, usize) -> GibbsResult<f64>,
) -> GibbsResult<Vec<SimplicialFacet>> {
    assert!(critical_edge_length > 0.0);
    if points.is_empty() {
        return Ok(Vec::new());
    }
    let point_dimension = points[0].len();

    // Degenerate inputs cannot support a proper hull; a single reduced
    // facet carries what composition variance there is.
    if points.len() < point_dimension {
        return degenerate_facets(points);
    }

    let dropped = BTreeSet::from([point_dimension - 2]);
    let facets = match engine.convex_hull(points, &dropped) {
        Ok(facets) => facets,
        Err(GibbsError::DegenerateHull { .. }) => return degenerate_facets(points),
        Err(error) => return Err(error),
    };

    let mut candidates = Vec::new();
    for facet in facets
        .iter()
        .filter(|f| f.defined && f.simplicial && f.is_lower())
    {
        // A facet is a candidate tie hyperplane only if some edge is a
        // genuine tie line: longer than the critical length, with a
        // midpoint energy measurably above the lever rule.
        let mut real_tie_edge = false;
        for pair in facet.vertices.iter().combinations(2) {
            let (id1, id2) = (*pair[0], *pair[1]);
            let distance = points[id1][..point_dimension - 1]
                .iter()
                .zip(&points[id2][..point_dimension - 1])
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            if distance <= critical_edge_length {
                continue;
            }
            let lever_rule_energy =
                (midpoint_energy(id1, id1)? + midpoint_energy(id2, id2)?) / 2.0;
            let true_energy = midpoint_energy(id1, id2)?;
            if (true_energy - lever_rule_energy) / lever_rule_energy.abs()
                < coplanarity_allowance
            {
                continue;
            }
            real_tie_edge = true;
            break;
        }
        if !real_tie_edge {
            continue;
        }
        candidates.push(SimplicialFacet {
            vertices: facet.vertices.clone(),
            normal: facet.normal.clone(),
            area: facet.area,
            basis_inverse: Some(invert_basis(&facet.vertices, points)?),
        });
    }
    Ok(candidates)
}

/// Facets for inputs with fewer points than the reduced dimension
/// requires: a single point becomes a single-vertex facet that encloses
/// every target; a handful of points become one facet spanning them all.
fn degenerate_facets(points: &[Vec<f64>]) -> GibbsResult<Vec<SimplicialFacet>> {
    let point_dimension = points[0].len();
    if points.len() == 1 {
        return Ok(vec![SimplicialFacet {
            vertices: vec![0],
            normal: vec![0.0; point_dimension],
            area: 0.0,
            basis_inverse: None,
        }]);
    }
    let vertices: Vec<usize> = (0..points.len()).collect();
    match invert_basis(&vertices, points) {
        Ok(inverse) => Ok(vec![SimplicialFacet {
            basis_inverse: Some(inverse),
            vertices,
            normal: vec![0.0; point_dimension],
            area: 0.0,
        }]),
        // Coincident compositions: no variance left, keep the lowest
        // point alone.
        Err(_) => {
            let minimum = (0..points.len())
                .min_by(|&a, &b| {
                    points[a].last().unwrap().total_cmp(points[b].last().unwrap())
                })
                .unwrap();
            Ok(vec![SimplicialFacet {
                vertices: vec![minimum],
                normal: vec![0.0; point_dimension],
                area: 0.0,
                basis_inverse: None,
            }])
        }
    }
}

/// Build and invert the barycentric basis of a facet: columns are the
/// vertices' leading independent mole fractions with a final row of ones.
fn invert_basis(vertices: &[usize], points: &[Vec<f64>]) -> GibbsResult<DMatrix<f64>> {
    let size = vertices.len();
    let mut basis = DMatrix::<f64>::zeros(size, size);
    for (column, &vertex) in vertices.iter().enumerate() {
        for row in 0..size - 1 {
            basis[(row, column)] = points[vertex][row];
        }
        basis[(size - 1, column)] = 1.0;
    }
    basis
        .try_inverse()
        .ok_or_else(|| GibbsError::Factorization("global hull facet basis".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hull::engine::BeneathBeyond;
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    fn energies(points: &[Vec<f64>]) -> impl FnMut(usize, usize) -> GibbsResult<f64> + '_ {
        // Same-phase midpoint energies follow a hump; a real gap.
        move |id1, id2| {
            if id1 == id2 {
                Ok(points[id1].last().copied().unwrap())
            } else {
                Ok(f64::INFINITY)
            }
        }
    }

    #[test]
    fn single_point_becomes_a_trivial_facet() -> GibbsResult<()> {
        let points = vec![vec![0.4, 0.6, -100.0]];
        let facets = global_lower_convex_hull(&points, 0.05, 0.001, &BeneathBeyond, |_, _| {
            Ok(0.0)
        })?;
        assert_eq!(facets.len(), 1);
        assert_eq!(facets[0].vertices, vec![0]);
        assert!(facets[0].basis_inverse.is_none());
        assert!(facets[0].encloses(&DVector::from_vec(vec![0.3, 1.0])));
        Ok(())
    }

    #[test]
    fn two_points_span_one_facet_with_invertible_basis() -> GibbsResult<()> {
        // Binary system: (x_A, x_B, G).
        let points = vec![vec![0.95, 0.05, -500.0], vec![0.1, 0.9, -800.0]];
        let facets =
            global_lower_convex_hull(&points, 0.05, 0.001, &BeneathBeyond, energies(&points))?;
        assert_eq!(facets.len(), 1);
        assert_eq!(facets[0].vertices, vec![0, 1]);
        // Barycentric coordinates of x_A = 0.5 between 0.95 and 0.1.
        let weights = facets[0]
            .barycentric(&DVector::from_vec(vec![0.5, 1.0]))
            .unwrap();
        assert_relative_eq!(weights.sum(), 1.0, max_relative = 1e-10);
        assert_relative_eq!(weights[0], (0.5 - 0.1) / 0.85, max_relative = 1e-10);
        assert!(facets[0].encloses(&DVector::from_vec(vec![0.5, 1.0])));
        assert!(!facets[0].encloses(&DVector::from_vec(vec![0.99, 1.0])));
        Ok(())
    }

    #[test]
    fn tie_facets_survive_and_coplanar_facets_are_filtered() -> GibbsResult<()> {
        // One phase sampled along a convex valley (coplanar region) and a
        // second phase far away: only cross-phase facets are candidates.
        let points = vec![
            vec![0.98, 0.02, -100.0],
            vec![0.96, 0.04, -104.0],
            vec![0.94, 0.06, -106.0],
            vec![0.05, 0.95, -150.0],
        ];
        let facets = global_lower_convex_hull(&points, 0.05, 0.001, &BeneathBeyond, |a, b| {
            if a == b {
                Ok(points[a].last().copied().unwrap())
            } else if a < 3 && b < 3 {
                // Convex same-phase landscape: midpoints below the chord.
                Ok((points[a].last().unwrap() + points[b].last().unwrap()) / 2.0 - 1.0)
            } else {
                Ok(f64::INFINITY)
            }
        })?;
        assert_eq!(facets.len(), 1);
        assert!(facets[0].vertices.contains(&3));
        // Lower-hull orientation: non-positive energy component.
        assert!(facets[0].normal.last().unwrap() <= &0.0);
        Ok(())
    }
}
