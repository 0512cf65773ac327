//! Per-phase internal lower convex hull.
//!
//! Finds the stable branch of one phase's energy landscape, including
//! across its own miscibility gaps. Works on reduced coordinates (the
//! dependent site-fraction dimensions stripped, energy last) and restores
//! the dependent coordinates on the way out.

use crate::errors::{GibbsError, GibbsResult};
use crate::hull::engine::HullEngine;
use itertools::Itertools;
use std::collections::BTreeSet;

/// Vertices of the tie hyperplanes of one phase's energy landscape.
///
/// `points` are site fractions followed by energy as the last coordinate;
/// the returned points are full site-fraction coordinates (energy
/// stripped, dependent dimensions restored). `energy` is called with full
/// site-fraction coordinates.
pub fn internal_lower_convex_hull(
    points: &[Vec<f64>],
    dependent_dimensions: &BTreeSet<usize>,
    critical_edge_length: f64,
    coplanarity_allowance: f64,
    engine: &dyn HullEngine,
    mut energy: impl FnMut(&[f64]) -> GibbsResult<f64>,
) -> GibbsResult<Vec<Vec<f64>>> {
    assert!(critical_edge_length > 0.0);
    if points.is_empty() {
        return Ok(Vec::new());
    }

    // Reduced representation: independent site fractions, then energy.
    let full_dimension = points[0].len() - 1;
    let reduced: Vec<Vec<f64>> = points
        .iter()
        .map(|point| {
            let mut r: Vec<f64> = (0..full_dimension)
                .filter(|dim| !dependent_dimensions.contains(dim))
                .map(|dim| point[dim])
                .collect();
            r.push(point[full_dimension]);
            r
        })
        .collect();
    let reduced_dimension = reduced[0].len();

    // No composition dependence, or too few points to build a hull:
    // return everything, restored.
    if points.len() == 1 || points.len() <= reduced_dimension {
        return Ok(reduced
            .iter()
            .map(|point| {
                restore_dependent_dimensions(
                    &point[..reduced_dimension - 1],
                    dependent_dimensions,
                )
            })
            .collect());
    }

    let mut candidate_points: Vec<Vec<f64>> = Vec::new();
    match engine.convex_hull(&reduced, &BTreeSet::new()) {
        Ok(facets) => {
            for facet in facets.iter().filter(|f| f.defined && f.is_lower()) {
                // Only edges beyond the critical length whose midpoint lies
                // measurably above the lever-rule energy are real tie lines.
                for pair in facet.vertices.iter().combinations(2) {
                    let (v1, v2) = (&reduced[*pair[0]], &reduced[*pair[1]]);
                    let coords1 = &v1[..reduced_dimension - 1];
                    let coords2 = &v2[..reduced_dimension - 1];
                    let distance = coords1
                        .iter()
                        .zip(coords2)
                        .map(|(a, b)| (a - b).powi(2))
                        .sum::<f64>()
                        .sqrt();
                    if distance <= critical_edge_length {
                        continue;
                    }
                    let lever_rule_energy =
                        (v1[reduced_dimension - 1] + v2[reduced_dimension - 1]) / 2.0;
                    let midpoint: Vec<f64> = coords1
                        .iter()
                        .zip(coords2)
                        .map(|(a, b)| (a + b) / 2.0)
                        .collect();
                    let restored_midpoint =
                        restore_dependent_dimensions(&midpoint, dependent_dimensions);
                    let true_energy = energy(&restored_midpoint)?;
                    if (true_energy - lever_rule_energy) / lever_rule_energy.abs()
                        < coplanarity_allowance
                    {
                        continue;
                    }
                    candidate_points.push(coords1.to_vec());
                    candidate_points.push(coords2.to_vec());
                }
            }
        }
        // Affinely dependent input: no composition variance to resolve.
        Err(GibbsError::DegenerateHull { .. }) => {}
        Err(error) => return Err(error),
    }

    if candidate_points.is_empty() {
        // No tie hyperplane: the phase contributes its minimum-energy
        // point alone.
        let minimum = reduced
            .iter()
            .min_by(|a, b| {
                a[reduced_dimension - 1].total_cmp(&b[reduced_dimension - 1])
            })
            .expect("point list is non-empty");
        return Ok(vec![restore_dependent_dimensions(
            &minimum[..reduced_dimension - 1],
            dependent_dimensions,
        )]);
    }

    // Deduplicate: points are identical iff every coordinate agrees to
    // within 1e-20.
    candidate_points.sort_by(|a, b| {
        a.iter()
            .zip(b)
            .map(|(x, y)| x.total_cmp(y))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidate_points.dedup_by(|a, b| {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= 1e-20)
    });

    Ok(candidate_points
        .iter()
        .map(|point| restore_dependent_dimensions(point, dependent_dimensions))
        .collect())
}

/// Insert the dependent site-fraction coordinates back into a reduced
/// point: each dependent coordinate is one minus the sum of the
/// independent coordinates of its sublattice.
pub fn restore_dependent_dimensions(
    point: &[f64],
    dependent_dimensions: &BTreeSet<usize>,
) -> Vec<f64> {
    let mut restored = Vec::with_capacity(point.len() + dependent_dimensions.len());
    let mut iter = point.iter();
    let mut sublattice_offset = 0;
    for &dim in dependent_dimensions {
        let mut sum = 0.0;
        for _ in sublattice_offset..dim {
            let &coordinate = iter.next().expect("reduced point too short");
            sum += coordinate;
            restored.push(coordinate);
        }
        restored.push(1.0 - sum);
        sublattice_offset = dim + 1;
    }
    restored.extend(iter.copied());
    restored
}
