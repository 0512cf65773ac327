//! Adaptive sampling of a phase's site-fraction simplex product.
//!
//! A uniform barycentric grid over every sublattice locates the basins of
//! the energy landscape; surviving local minima are then resampled in
//! recursively shrinking neighborhoods. The returned point set feeds the
//! per-phase internal hull, so ordering is irrelevant downstream.

use crate::composition_set::CompositionSet;
use crate::conditions::Conditions;
use crate::errors::GibbsResult;
use crate::MinimizerOptions;
use itertools::Itertools;

/// Sample a phase's composition space: full site-fraction coordinates,
/// one entry per point.
pub fn adaptive_simplex_sample(
    composition_set: &CompositionSet,
    conditions: &Conditions,
    options: &MinimizerOptions,
) -> GibbsResult<Vec<Vec<f64>>> {
    assert!(options.initial_subdivisions_per_axis > 0);
    assert!(options.refinement_subdivisions_per_axis > 0);
    let subdivisions = options.initial_subdivisions_per_axis;
    let phase = composition_set.phase();

    // Level-0 grid: the cartesian product of every sublattice's
    // barycentric lattice, tracked in integer coordinates.
    let sublattice_sizes: Vec<usize> = phase
        .sublattices
        .iter()
        .map(|sublattice| sublattice.species.len())
        .collect();
    let lattice: Vec<Vec<usize>> = sublattice_sizes
        .iter()
        .map(|&size| simplex_lattice(size, subdivisions))
        .multi_cartesian_product()
        .map(|per_sublattice| per_sublattice.concat())
        .collect();

    let mut grid_energies = Vec::with_capacity(lattice.len());
    for key in &lattice {
        let point = to_site_fractions(key, subdivisions);
        let energy = composition_set.energy(conditions, &point)?;
        grid_energies.push(energy);
    }

    let survivors: Vec<usize> = if options.discard_unstable {
        local_minima(&lattice, &grid_energies, &sublattice_sizes)
    } else {
        (0..lattice.len()).collect()
    };

    let mut points: Vec<Vec<f64>> = if options.discard_unstable {
        survivors
            .iter()
            .map(|&index| to_site_fractions(&lattice[index], subdivisions))
            .collect()
    } else {
        lattice
            .iter()
            .map(|key| to_site_fractions(key, subdivisions))
            .collect()
    };

    // Refine each surviving minimum on recursively shrinking
    // neighborhood grids.
    let spacing = 1.0 / subdivisions as f64;
    for &index in &survivors {
        let center = to_site_fractions(&lattice[index], subdivisions);
        let center_energy = grid_energies[index];
        refine(
            composition_set,
            conditions,
            &sublattice_sizes,
            center,
            center_energy,
            spacing,
            options.refinement_subdivisions_per_axis,
            options.max_search_depth,
            0,
            &mut points,
        )?;
    }

    Ok(points)
}

/// All barycentric lattice points of a `size`-species simplex with
/// `subdivisions` steps: non-negative integer tuples summing to
/// `subdivisions`.
fn simplex_lattice(size: usize, subdivisions: usize) -> Vec<Vec<usize>> {
    if size == 0 {
        return vec![Vec::new()];
    }
    let mut result = Vec::new();
    let mut current = vec![0usize; size];
    fill_lattice(size, subdivisions, 0, &mut current, &mut result);
    result
}

fn fill_lattice(
    size: usize,
    remaining: usize,
    position: usize,
    current: &mut Vec<usize>,
    result: &mut Vec<Vec<usize>>,
) {
    if position == size - 1 {
        current[position] = remaining;
        result.push(current.clone());
        return;
    }
    for value in 0..=remaining {
        current[position] = value;
        fill_lattice(size, remaining - value, position + 1, current, result);
    }
}

fn to_site_fractions(key: &[usize], subdivisions: usize) -> Vec<f64> {
    key.iter()
        .map(|&k| k as f64 / subdivisions as f64)
        .collect()
}

/// Indices of grid points whose energy does not exceed that of any
/// single-step neighbor (one unit moved between two species of one
/// sublattice).
fn local_minima(
    lattice: &[Vec<usize>],
    energies: &[f64],
    sublattice_sizes: &[usize],
) -> Vec<usize> {
    use std::collections::HashMap;
    let index_of: HashMap<&[usize], usize> = lattice
        .iter()
        .enumerate()
        .map(|(index, key)| (key.as_slice(), index))
        .collect();

    let mut survivors = Vec::new();
    'points: for (index, key) in lattice.iter().enumerate() {
        let mut offset = 0;
        for &size in sublattice_sizes {
            for from in 0..size {
                if key[offset + from] == 0 {
                    continue;
                }
                for to in 0..size {
                    if to == from {
                        continue;
                    }
                    let mut neighbor = key.clone();
                    neighbor[offset + from] -= 1;
                    neighbor[offset + to] += 1;
                    if let Some(&neighbor_index) = index_of.get(neighbor.as_slice()) {
                        if energies[neighbor_index] < energies[index] {
                            continue 'points;
                        }
                    }
                }
            }
            offset += size;
        }
        survivors.push(index);
    }
    survivors
}

fn refine(
    composition_set: &CompositionSet,
    conditions: &Conditions,
    sublattice_sizes: &[usize],
    center: Vec<f64>,
    center_energy: f64,
    spacing: f64,
    subdivisions: usize,
    max_search_depth: usize,
    depth: usize,
    points: &mut Vec<Vec<f64>>,
) -> GibbsResult<()> {
    if depth >= max_search_depth {
        return Ok(());
    }
    let step = spacing / subdivisions as f64;
    let range = subdivisions as isize;

    // Zero-sum integer offsets per sublattice keep every candidate on the
    // constraint manifold.
    let offsets_per_sublattice: Vec<Vec<Vec<isize>>> = sublattice_sizes
        .iter()
        .map(|&size| zero_sum_offsets(size, range))
        .collect();

    let mut best: Option<(Vec<f64>, f64)> = None;
    for offsets in offsets_per_sublattice
        .iter()
        .map(|per_sublattice| per_sublattice.iter())
        .multi_cartesian_product()
    {
        let mut candidate = center.clone();
        let mut feasible = true;
        let mut is_center = true;
        let mut offset_index = 0;
        for sublattice_offsets in &offsets {
            for &delta in sublattice_offsets.iter() {
                if delta != 0 {
                    is_center = false;
                }
                candidate[offset_index] += delta as f64 * step;
                if candidate[offset_index] < 0.0 {
                    feasible = false;
                }
                offset_index += 1;
            }
        }
        if is_center || !feasible {
            continue;
        }
        let energy = composition_set.energy(conditions, &candidate)?;
        points.push(candidate.clone());
        if best
            .as_ref()
            .map(|(_, best_energy)| energy < *best_energy)
            .unwrap_or(true)
        {
            best = Some((candidate, energy));
        }
    }

    if let Some((best_point, best_energy)) = best {
        // Recurse on the improved center; without strict improvement the
        // incumbent stays and only the mesh shrinks.
        let (next_center, next_energy) = if best_energy < center_energy {
            (best_point, best_energy)
        } else {
            (center, center_energy)
        };
        refine(
            composition_set,
            conditions,
            sublattice_sizes,
            next_center,
            next_energy,
            step,
            subdivisions,
            max_search_depth,
            depth + 1,
            points,
        )?;
    }
    Ok(())
}

/// Integer offset vectors of length `size` with entries in `[-range, range]`
/// summing to zero.
fn zero_sum_offsets(size: usize, range: isize) -> Vec<Vec<isize>> {
    let mut result = Vec::new();
    let mut current = vec![0isize; size];
    fill_offsets(size, range, 0, 0, &mut current, &mut result);
    result
}

fn fill_offsets(
    size: usize,
    range: isize,
    position: usize,
    sum: isize,
    current: &mut Vec<isize>,
    result: &mut Vec<Vec<isize>>,
) {
    if position == size - 1 {
        let last = -sum;
        if last.abs() <= range {
            current[position] = last;
            result.push(current.clone());
        }
        return;
    }
    for value in -range..=range {
        current[position] = value;
        fill_offsets(size, range, position + 1, sum + value, current, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::{Parameter, ParameterSet};
    use crate::expression::Expr;
    use crate::sublattice::{Phase, Sublattice};
    use approx::assert_abs_diff_eq;

    fn ideal_binary() -> CompositionSet {
        let phase = Phase::new("ALPHA", vec![Sublattice::new(1.0, &["A", "B"])]);
        CompositionSet::new(phase, &ParameterSet::new()).unwrap()
    }

    fn conditions() -> Conditions {
        let mut conditions = Conditions::default();
        conditions.statevars.insert('T', 1000.0);
        conditions
    }

    #[test]
    fn grid_covers_vertices_and_stays_feasible() -> GibbsResult<()> {
        let set = ideal_binary();
        let options = MinimizerOptions::new().discard_unstable(false).max_search_depth(0);
        let points = adaptive_simplex_sample(&set, &conditions(), &options)?;
        assert_eq!(points.len(), 21);
        assert!(points.iter().any(|p| p == &vec![0.0, 1.0]));
        assert!(points.iter().any(|p| p == &vec![1.0, 0.0]));
        for point in &points {
            assert_abs_diff_eq!(point[0] + point[1], 1.0, epsilon = 1e-12);
            assert!(point.iter().all(|&y| y >= 0.0));
        }
        Ok(())
    }

    #[test]
    fn instability_filter_keeps_the_symmetric_minimum() -> GibbsResult<()> {
        let set = ideal_binary();
        let options = MinimizerOptions::new().max_search_depth(0);
        let points = adaptive_simplex_sample(&set, &conditions(), &options)?;
        // Ideal mixing has its only minimum at the equimolar point.
        assert_eq!(points.len(), 1);
        assert_abs_diff_eq!(points[0][0], 0.5, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn refinement_approaches_an_off_grid_minimum() -> GibbsResult<()> {
        // Minimum of 10000 y_B + RT(y ln y) sits off the level-0 grid.
        let phase = Phase::new("ALPHA", vec![Sublattice::new(1.0, &["A", "B"])]);
        let mut parameters = ParameterSet::new();
        parameters.add(Parameter::new(
            "ALPHA",
            "G",
            &[&["B"]],
            0,
            Expr::constant(10000.0),
        ));
        let set = CompositionSet::new(phase, &parameters).unwrap();
        let mut state = Conditions::default();
        state.statevars.insert('T', 300.0);

        let options = MinimizerOptions::new().max_search_depth(16);
        let points = adaptive_simplex_sample(&set, &state, &options)?;
        let best = points
            .iter()
            .map(|p| (p.clone(), set.energy(&state, p).unwrap()))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap();
        // Analytic minimum: ln(y/(1-y)) = -10000/RT.
        let rt = crate::conditions::GAS_CONSTANT * 300.0;
        let expected = 1.0 / (1.0 + (10000.0 / rt).exp());
        assert_abs_diff_eq!(best.0[1], expected, epsilon = 1e-4);
        // Every refined point stays on the simplex.
        for point in &points {
            assert_abs_diff_eq!(point[0] + point[1], 1.0, epsilon = 1e-12);
            assert!(point.iter().all(|&y| y >= 0.0));
        }
        Ok(())
    }

    #[test]
    fn two_sublattice_grid_is_a_cartesian_product() -> GibbsResult<()> {
        let phase = Phase::new(
            "FCC_A1",
            vec![
                Sublattice::new(1.0, &["FE", "NI"]),
                Sublattice::new(1.0, &["C", "VA"]),
            ],
        );
        let set = CompositionSet::new(phase, &ParameterSet::new())?;
        let options = MinimizerOptions::new()
            .initial_subdivisions_per_axis(4)
            .discard_unstable(false)
            .max_search_depth(0);
        let points = adaptive_simplex_sample(&set, &conditions(), &options)?;
        assert_eq!(points.len(), 25);
        for point in &points {
            assert_abs_diff_eq!(point[0] + point[1], 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(point[2] + point[3], 1.0, epsilon = 1e-12);
        }
        Ok(())
    }
}
