//! Global minimization of the Gibbs energy over all candidate phases.
//!
//! Energy manifolds are sampled for every entered phase over its internal
//! degrees of freedom, reduced to their internal lower hulls, and unioned
//! in mole-fraction space; the facets of the global lower hull are the
//! candidate tie hyperplanes. Equilibria are then read off the facet that
//! encloses the target composition.

use crate::composition_set::CompositionSet;
use crate::conditions::{Conditions, PhaseStatus};
use crate::errors::{GibbsError, GibbsResult};
use crate::hull::{
    global_lower_convex_hull, internal_lower_convex_hull, BeneathBeyond, HullEngine, HullEntry,
    HullMap, SimplicialFacet,
};
use crate::sampler::adaptive_simplex_sample;
use crate::{log_iter, log_result, MinimizerOptions, Verbosity};
use indexmap::IndexMap;
use itertools::Itertools;
use nalgebra::DVector;

/// Global Gibbs energy minimizer.
///
/// The pipeline is a pure function of the phase models and conditions:
/// [GlobalMinimizer::run] populates the hull map and candidate facets,
/// [GlobalMinimizer::find_tie_points] resolves the equilibrium tie points
/// for the conditions' composition target.
pub struct GlobalMinimizer {
    options: MinimizerOptions,
    engine: Box<dyn HullEngine>,
    hull_map: HullMap,
    candidate_facets: Vec<SimplicialFacet>,
}

impl Default for GlobalMinimizer {
    fn default() -> Self {
        Self::new(MinimizerOptions::default())
    }
}

impl GlobalMinimizer {
    pub fn new(options: MinimizerOptions) -> Self {
        Self::with_engine(options, Box::new(BeneathBeyond))
    }

    /// Use an alternative hull-engine backend.
    pub fn with_engine(options: MinimizerOptions, engine: Box<dyn HullEngine>) -> Self {
        Self {
            options,
            engine,
            hull_map: HullMap::new(),
            candidate_facets: Vec::new(),
        }
    }

    /// Sample every entered phase, build the per-phase internal hulls,
    /// and resolve the global hull over their union.
    pub fn run(
        &mut self,
        phase_list: &IndexMap<String, CompositionSet>,
        conditions: &Conditions,
    ) -> GibbsResult<()> {
        assert!(self.options.critical_edge_length > 0.0);
        let verbosity = self.options.verbosity;
        self.hull_map = HullMap::new();
        self.candidate_facets.clear();

        let mut global_points: Vec<Vec<f64>> = Vec::new();
        for (phase_name, composition_set) in phase_list {
            match conditions.phases.get(phase_name.as_str()) {
                None | Some(PhaseStatus::Entered) => {}
                Some(_) => continue,
            }
            let dependent_dimensions = composition_set.dependent_dimensions();

            // Sample the composition space of this phase.
            let samples = adaptive_simplex_sample(composition_set, conditions, &self.options)?;
            let mut sampled_points = Vec::with_capacity(samples.len());
            for site_fractions in samples {
                let energy = composition_set.energy(conditions, &site_fractions)?;
                let mut point = site_fractions;
                point.push(energy);
                sampled_points.push(point);
            }

            // Reduce to the phase's internal lower hull.
            let hull_points = internal_lower_convex_hull(
                &sampled_points,
                &dependent_dimensions,
                self.options.critical_edge_length,
                self.options.coplanarity_allowance,
                self.engine.as_ref(),
                |site_fractions| composition_set.energy(conditions, site_fractions),
            )?;
            log_iter!(
                verbosity,
                "{}: {} sampled points, {} internal hull points",
                phase_name,
                sampled_points.len(),
                hull_points.len()
            );

            for site_fractions in hull_points {
                let energy = composition_set.energy(conditions, &site_fractions)?;
                let global_coordinates = composition_set
                    .phase()
                    .site_to_mole_fractions(&conditions.elements, &site_fractions);
                let mut global_point: Vec<f64> = global_coordinates.values().copied().collect();
                global_point.push(energy);
                self.hull_map
                    .insert_point(phase_name, energy, site_fractions, global_coordinates);
                global_points.push(global_point);
            }
        }

        // Candidate tie hyperplanes over all phases' landscapes.
        let hull_map = &self.hull_map;
        self.candidate_facets = global_lower_convex_hull(
            &global_points,
            self.options.critical_edge_length,
            self.options.coplanarity_allowance,
            self.engine.as_ref(),
            |id1, id2| {
                if id1 == id2 {
                    return Ok(hull_map[id1].energy);
                }
                if hull_map[id1].phase_name != hull_map[id2].phase_name {
                    // No single-phase energy exists between two phases.
                    return Ok(f64::INFINITY);
                }
                let midpoint: Vec<f64> = hull_map[id1]
                    .internal_coordinates
                    .iter()
                    .zip(&hull_map[id2].internal_coordinates)
                    .map(|(a, b)| (a + b) / 2.0)
                    .collect();
                let composition_set = &phase_list[hull_map[id1].phase_name.as_str()];
                composition_set.energy(conditions, &midpoint)
            },
        )?;
        log_result!(
            verbosity,
            "global hull: {} points, {} candidate facets",
            self.hull_map.len(),
            self.candidate_facets.len()
        );

        for facet in &self.candidate_facets {
            for &id in &facet.vertices {
                self.hull_map.set_global_hull_status(id, true);
            }
        }
        Ok(())
    }

    pub fn get_hull_entries(&self) -> &[HullEntry] {
        self.hull_map.get_all_points()
    }

    pub fn get_facets(&self) -> &[SimplicialFacet] {
        &self.candidate_facets
    }

    /// Resolve the equilibrium tie points for the conditions' composition
    /// target, as entries of the hull map ordered by id.
    pub fn find_tie_points(&self, conditions: &Conditions) -> GibbsResult<Vec<HullEntry>> {
        let verbosity = self.options.verbosity;
        let critical_edge_length = self.options.critical_edge_length;

        // Locate the facets whose closed simplex contains the target.
        let mut pre_candidate_facets: Vec<&SimplicialFacet> = Vec::new();
        for facet in &self.candidate_facets {
            let target = self.target_point(conditions, facet)?;
            if facet.encloses(&target) {
                pre_candidate_facets.push(facet);
            }
        }
        log_iter!(
            verbosity,
            "{} of {} facets enclose the target",
            pre_candidate_facets.len(),
            self.candidate_facets.len()
        );

        // The smallest facet pins the composition most tightly; insertion
        // order breaks ties.
        pre_candidate_facets.sort_by(|a, b| a.area.total_cmp(&b.area));
        let Some(final_facet) = pre_candidate_facets.first() else {
            return Ok(Vec::new());
        };

        let mut candidate_ids: Vec<usize> = Vec::new();
        for pair in final_facet.vertices.iter().combinations(2) {
            let (id1, id2) = (*pair[0], *pair[1]);
            let entry1 = &self.hull_map[id1];
            let entry2 = &self.hull_map[id2];
            if entry1.phase_name != entry2.phase_name {
                // Phases differ; definitely a tie line.
                insert_id(&mut candidate_ids, id1);
                insert_id(&mut candidate_ids, id2);
            } else if internal_distance(entry1, entry2) > critical_edge_length {
                // Same phase: a tie line only across a miscibility gap.
                insert_id(&mut candidate_ids, id1);
                insert_id(&mut candidate_ids, id2);
            }
        }

        // Merge near-duplicate points of the same phase; restart the
        // pairwise scan after every deletion.
        let mut i = 0;
        'merge: while i < candidate_ids.len() {
            let mut j = i + 1;
            while j < candidate_ids.len() {
                let entry1 = &self.hull_map[candidate_ids[i]];
                let entry2 = &self.hull_map[candidate_ids[j]];
                if entry1.phase_name == entry2.phase_name
                    && internal_distance(entry1, entry2) <= critical_edge_length
                {
                    candidate_ids.remove(j);
                    i = 0;
                    continue 'merge;
                }
                j += 1;
            }
            i += 1;
        }

        // No tie lines at all: a single-phase region.
        if candidate_ids.is_empty() {
            if let Some(&first_vertex) = final_facet.vertices.first() {
                candidate_ids.push(first_vertex);
            }
        }

        Ok(candidate_ids
            .iter()
            .map(|&id| self.hull_map[id].clone())
            .collect())
    }

    /// The target composition point for a facet: the leading independent
    /// mole fractions from the conditions, with a trailing 1.
    fn target_point(
        &self,
        conditions: &Conditions,
        facet: &SimplicialFacet,
    ) -> GibbsResult<DVector<f64>> {
        let size = facet.vertices.len();
        let mut target = DVector::<f64>::zeros(size.max(1));
        for i in 0..size.saturating_sub(1) {
            let element = conditions
                .elements
                .get(i)
                .ok_or_else(|| GibbsError::MissingCondition(format!("element #{i}")))?;
            target[i] = *conditions
                .mole_fractions
                .get(element.as_str())
                .ok_or_else(|| GibbsError::MissingCondition(element.clone()))?;
        }
        if size > 0 {
            target[size - 1] = 1.0;
        }
        Ok(target)
    }
}

fn insert_id(ids: &mut Vec<usize>, id: usize) {
    if let Err(position) = ids.binary_search(&id) {
        ids.insert(position, id);
    }
}

fn internal_distance(entry1: &HullEntry, entry2: &HullEntry) -> f64 {
    entry1
        .internal_coordinates
        .iter()
        .zip(&entry2.internal_coordinates)
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
        .sqrt()
}
