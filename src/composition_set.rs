use crate::conditions::Conditions;
use crate::errors::{GibbsError, GibbsResult};
use crate::expression::{
    differentiate, is_zero_tree, rename_phase_prefix, simplify, Expr, SymbolTable, VariableMap,
};
use crate::linalg::constraint_basis;
use crate::models::phase_models;
use crate::parameter::ParameterSet;
use crate::sublattice::Phase;
use indexmap::IndexMap;
use nalgebra::DMatrix;
use ndarray::Array1;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const FINITE_DIFFERENCE_STEP: f64 = 1e-7;
const NULL_SPACE_TOL: f64 = 1e-10;

/// One phase's energy models, cached derivative trees, and linear
/// constraint system.
///
/// A composition set is constructed once per phase and is immutable
/// afterwards; a second instance of the same phase (for a miscibility
/// gap) is expressed by [CompositionSet::clone_with_new_name].
pub struct CompositionSet {
    name: String,
    phase: Phase,
    models: IndexMap<&'static str, Arc<Expr>>,
    symbols: SymbolTable,
    /// Site-fraction variables in sublattice-major order, then the
    /// phase-amount variable last.
    variables: VariableMap,
    /// Cached first-derivative trees by differentiation variable; the
    /// phase-amount entry holds the merged energy itself.
    first_derivatives: Vec<(String, Arc<Expr>)>,
    /// Cached second-derivative trees, keyed by the unordered variable
    /// name pair (stored with the lower local index first).
    second_derivatives: Vec<((String, String), Arc<Expr>)>,
    /// Variable indices of each sublattice-balance constraint row.
    constraints: Vec<Vec<usize>>,
    null_space: DMatrix<f64>,
    gradient_projector: DMatrix<f64>,
    starting_point: Option<IndexMap<String, f64>>,
}

impl CompositionSet {
    pub fn new(phase: Phase, parameters: &ParameterSet) -> GibbsResult<Self> {
        let models = phase_models(&phase, parameters);
        let symbols = parameters.symbols().clone();

        let mut variables: VariableMap = phase.site_fraction_names().into_iter().collect();
        let frac_name = phase.phase_fraction_name();
        variables.insert(frac_name.clone());

        let merged = simplify(&Expr::sum(models.values().cloned()));

        // First derivatives of the merged model with respect to every
        // site-fraction variable; the derivative with respect to the
        // phase amount is the phase's raw energy.
        let mut first_derivatives = Vec::new();
        let site_count = phase.site_fraction_count();
        for name in variables.iter().take(site_count) {
            let derivative = simplify(&differentiate(&merged, name, &symbols)?);
            if !is_zero_tree(&derivative) {
                first_derivatives.push((name.clone(), derivative));
            }
        }
        first_derivatives.push((frac_name.clone(), merged.clone()));

        // Second derivatives: site-variable pairs from the cached first
        // derivatives, plus the (site, phase-amount) entries which reduce
        // to the plain energy gradient.
        let mut second_derivatives = Vec::new();
        for (first_name, first_tree) in &first_derivatives {
            if *first_name == frac_name {
                continue;
            }
            let first_index = variables.get_index_of(first_name.as_str()).unwrap();
            for second_name in variables.iter().take(site_count).skip(first_index) {
                let derivative = simplify(&differentiate(first_tree, second_name, &symbols)?);
                if !is_zero_tree(&derivative) {
                    second_derivatives
                        .push(((first_name.clone(), second_name.clone()), derivative));
                }
            }
            second_derivatives.push(((first_name.clone(), frac_name.clone()), first_tree.clone()));
        }

        // Sublattice site-balance constraints: one row of ones per
        // sublattice, right-hand side 1.
        let mut constraints = Vec::new();
        let mut offset = 0;
        for sublattice in &phase.sublattices {
            let count = sublattice.species.len();
            if count > 0 {
                constraints.push((offset..offset + count).collect::<Vec<usize>>());
            }
            offset += count;
        }

        let (null_space, gradient_projector) =
            build_constraint_basis(&phase.name, site_count, &constraints)?;

        Ok(Self {
            name: phase.name.clone(),
            phase,
            models,
            symbols,
            variables,
            first_derivatives,
            second_derivatives,
            constraints,
            null_space,
            gradient_projector,
            starting_point: None,
        })
    }

    /// Make a renamed deep copy for a second composition instance of the
    /// same phase across a miscibility gap. Every variable and symbol
    /// whose name carries the old phase prefix is renamed inside the
    /// rebuilt trees; the starting point seeds the outer optimizer.
    pub fn clone_with_new_name(
        &self,
        new_name: &str,
        starting_point: IndexMap<String, f64>,
    ) -> Self {
        let old_name = self.name.as_str();
        let rename = |name: &str| -> String {
            match name.strip_prefix(old_name) {
                Some(suffix) => format!("{new_name}{suffix}"),
                None => name.to_string(),
            }
        };

        let mut phase = self.phase.clone();
        phase.name = new_name.to_string();

        let models = self
            .models
            .iter()
            .map(|(key, tree)| (*key, rename_phase_prefix(tree, old_name, new_name)))
            .collect();
        let symbols = self
            .symbols
            .iter()
            .map(|(key, tree)| (rename(key), rename_phase_prefix(tree, old_name, new_name)))
            .collect();
        let variables = self.variables.iter().map(|name| rename(name)).collect();
        let first_derivatives = self
            .first_derivatives
            .iter()
            .map(|(name, tree)| (rename(name), rename_phase_prefix(tree, old_name, new_name)))
            .collect();
        let second_derivatives = self
            .second_derivatives
            .iter()
            .map(|((first, second), tree)| {
                (
                    (rename(first), rename(second)),
                    rename_phase_prefix(tree, old_name, new_name),
                )
            })
            .collect();

        Self {
            name: new_name.to_string(),
            phase,
            models,
            symbols,
            variables,
            first_derivatives,
            second_derivatives,
            constraints: self.constraints.clone(),
            null_space: self.null_space.clone(),
            gradient_projector: self.gradient_projector.clone(),
            starting_point: Some(starting_point),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Site-fraction variables plus the phase-amount variable (last).
    pub fn variable_map(&self) -> &VariableMap {
        &self.variables
    }

    pub fn phase_fraction_name(&self) -> String {
        self.phase.phase_fraction_name()
    }

    pub fn starting_point(&self) -> Option<&IndexMap<String, f64>> {
        self.starting_point.as_ref()
    }

    /// Null-space basis `Z` of the constraint Jacobian; feasible moves
    /// stay on the constraint manifold along its columns.
    pub fn constraint_null_space(&self) -> &DMatrix<f64> {
        &self.null_space
    }

    /// The projector `Z Zᵀ` onto the constraint null space.
    pub fn gradient_projector(&self) -> &DMatrix<f64> {
        &self.gradient_projector
    }

    /// Indices of the dependent site-fraction dimensions.
    pub fn dependent_dimensions(&self) -> BTreeSet<usize> {
        self.phase.dependent_dimensions()
    }

    /// Sum of the model trees at `x`.
    pub fn evaluate_objective(
        &self,
        conditions: &Conditions,
        indices: &VariableMap,
        x: &[f64],
    ) -> GibbsResult<f64> {
        let mut objective = 0.0;
        for tree in self.models.values() {
            objective += tree.evaluate(conditions, indices, &self.symbols, x)?;
        }
        Ok(objective)
    }

    /// Energy at a site-fraction point, using the set's own variable map.
    pub fn energy(&self, conditions: &Conditions, site_fractions: &[f64]) -> GibbsResult<f64> {
        self.evaluate_objective(conditions, &self.variables, site_fractions)
    }

    /// Gradient of the phase's contribution to the total energy: each
    /// site-fraction derivative is weighted by the phase amount, while
    /// the phase-amount derivative is the raw energy.
    pub fn evaluate_objective_gradient(
        &self,
        conditions: &Conditions,
        indices: &VariableMap,
        x: &[f64],
    ) -> GibbsResult<BTreeMap<usize, f64>> {
        let frac_name = self.phase_fraction_name();
        let frac_value = x[indices
            .get_index_of(frac_name.as_str())
            .filter(|&i| i < x.len())
            .ok_or_else(|| GibbsError::MissingVariable(frac_name.clone()))?];
        let mut gradient: BTreeMap<usize, f64> = (0..indices.len()).map(|i| (i, 0.0)).collect();
        for (name, tree) in &self.first_derivatives {
            let index = indices
                .get_index_of(name.as_str())
                .ok_or_else(|| GibbsError::MissingVariable(name.clone()))?;
            let value = tree.evaluate(conditions, indices, &self.symbols, x)?;
            let weight = if *name == frac_name { 1.0 } else { frac_value };
            *gradient.get_mut(&index).unwrap() += weight * value;
        }
        Ok(gradient)
    }

    /// Gradient of the phase considered in isolation: no phase-amount
    /// weighting.
    pub fn evaluate_single_phase_objective_gradient(
        &self,
        conditions: &Conditions,
        indices: &VariableMap,
        x: &[f64],
    ) -> GibbsResult<BTreeMap<usize, f64>> {
        let mut gradient: BTreeMap<usize, f64> = (0..indices.len()).map(|i| (i, 0.0)).collect();
        for (name, tree) in &self.first_derivatives {
            let index = indices
                .get_index_of(name.as_str())
                .ok_or_else(|| GibbsError::MissingVariable(name.clone()))?;
            let value = tree.evaluate(conditions, indices, &self.symbols, x)?;
            *gradient.get_mut(&index).unwrap() += value;
        }
        Ok(gradient)
    }

    /// Central-difference gradient over the site-fraction variables; a
    /// reference path for cross-checking the cached derivative trees.
    pub fn evaluate_internal_objective_gradient(
        &self,
        conditions: &Conditions,
        x: &[f64],
    ) -> GibbsResult<Array1<f64>> {
        let site_count = self.phase.site_fraction_count();
        let mut gradient = Array1::zeros(site_count);
        let mut probe = x.to_vec();
        for i in 0..site_count {
            probe[i] = x[i] - FINITE_DIFFERENCE_STEP;
            let lower = self.evaluate_objective(conditions, &self.variables, &probe)?;
            probe[i] = x[i] + FINITE_DIFFERENCE_STEP;
            let upper = self.evaluate_objective(conditions, &self.variables, &probe)?;
            probe[i] = x[i];
            gradient[i] = (upper - lower) / (2.0 * FINITE_DIFFERENCE_STEP);
        }
        Ok(gradient)
    }

    /// Strictly lower-triangular Hessian contribution, keyed on
    /// `(i, j)` with `i ≤ j`. Entries involving the phase amount are
    /// unweighted; the rest are multiplied by the phase amount.
    pub fn evaluate_objective_hessian(
        &self,
        conditions: &Conditions,
        indices: &VariableMap,
        x: &[f64],
    ) -> GibbsResult<BTreeMap<(usize, usize), f64>> {
        let frac_name = self.phase_fraction_name();
        let frac_value = x[indices
            .get_index_of(frac_name.as_str())
            .filter(|&i| i < x.len())
            .ok_or_else(|| GibbsError::MissingVariable(frac_name.clone()))?];
        let mut hessian = BTreeMap::new();
        for i in 0..indices.len() {
            for j in i..indices.len() {
                hessian.insert((i, j), 0.0);
            }
        }
        for ((first, second), tree) in &self.second_derivatives {
            let index1 = indices
                .get_index_of(first.as_str())
                .ok_or_else(|| GibbsError::MissingVariable(first.clone()))?;
            let index2 = indices
                .get_index_of(second.as_str())
                .ok_or_else(|| GibbsError::MissingVariable(second.clone()))?;
            let key = (index1.min(index2), index1.max(index2));
            let value = tree.evaluate(conditions, indices, &self.symbols, x)?;
            let weight = if *first == frac_name || *second == frac_name {
                1.0
            } else {
                frac_value
            };
            *hessian.get_mut(&key).unwrap() += weight * value;
        }
        Ok(hessian)
    }

    /// Support pattern of the Hessian for the outer optimizer.
    pub fn hessian_sparsity_structure(
        &self,
        indices: &VariableMap,
    ) -> GibbsResult<BTreeSet<(usize, usize)>> {
        let mut pattern = BTreeSet::new();
        for ((first, second), _) in &self.second_derivatives {
            let index1 = indices
                .get_index_of(first.as_str())
                .ok_or_else(|| GibbsError::MissingVariable(first.clone()))?;
            let index2 = indices
                .get_index_of(second.as_str())
                .ok_or_else(|| GibbsError::MissingVariable(second.clone()))?;
            pattern.insert((index1.min(index2), index1.max(index2)));
        }
        Ok(pattern)
    }
}

/// Orthonormal basis in the constraints (Nocedal & Wright, ch. 15.2):
/// full QR of `Aᵀ`, `Q = [Y | Z]`, returning `Z` and the projector `Z Zᵀ`.
fn build_constraint_basis(
    phase_name: &str,
    site_count: usize,
    constraints: &[Vec<usize>],
) -> GibbsResult<(DMatrix<f64>, DMatrix<f64>)> {
    let ncons = constraints.len();
    let mut a_transpose = DMatrix::<f64>::zeros(site_count, ncons);
    for (row, members) in constraints.iter().enumerate() {
        for &index in members {
            a_transpose[(index, row)] = 1.0;
        }
    }
    let (_, z) = constraint_basis(&a_transpose);
    // A Z must vanish; anything else means the factorization broke down.
    let residual = a_transpose.transpose() * &z;
    if residual.iter().any(|value| value.abs() > NULL_SPACE_TOL) {
        return Err(GibbsError::Factorization(phase_name.to_string()));
    }
    let projector = &z * z.transpose();
    Ok((z, projector))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::Parameter;
    use crate::sublattice::Sublattice;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn binary_solution() -> GibbsResult<CompositionSet> {
        let phase = Phase::new("ALPHA", vec![Sublattice::new(1.0, &["A", "B"])]);
        let mut parameters = ParameterSet::new();
        parameters.add(Parameter::new(
            "ALPHA",
            "G",
            &[&["A"]],
            0,
            Expr::constant(-500.0),
        ));
        parameters.add(Parameter::new(
            "ALPHA",
            "G",
            &[&["B"]],
            0,
            Expr::constant(2000.0),
        ));
        parameters.add(Parameter::new(
            "ALPHA",
            "L",
            &[&["A", "B"]],
            0,
            Expr::constant(12000.0),
        ));
        CompositionSet::new(phase, &parameters)
    }

    fn conditions() -> Conditions {
        let mut conditions = Conditions::default();
        conditions.statevars.insert('T', 800.0);
        conditions
    }

    #[test]
    fn objective_matches_closed_form() -> GibbsResult<()> {
        let set = binary_solution()?;
        let (ya, yb) = (0.7, 0.3);
        let value = set.energy(&conditions(), &[ya, yb])?;
        let rt = crate::conditions::GAS_CONSTANT * 800.0;
        let expected =
            ya * -500.0 + yb * 2000.0 + rt * (ya * ya.ln() + yb * yb.ln()) + ya * yb * 12000.0;
        assert_relative_eq!(value, expected, max_relative = 1e-12);
        Ok(())
    }

    #[test]
    fn cached_gradient_matches_finite_differences() -> GibbsResult<()> {
        let set = binary_solution()?;
        let conditions = conditions();
        for &(ya, yb) in &[(0.9, 0.1), (0.5, 0.5), (0.2, 0.8)] {
            let x = [ya, yb, 1.0];
            let gradient =
                set.evaluate_single_phase_objective_gradient(&conditions, set.variable_map(), &x)?;
            let reference = set.evaluate_internal_objective_gradient(&conditions, &x[..2])?;
            let objective = set.energy(&conditions, &x[..2])?;
            for (i, &fd) in reference.iter().enumerate() {
                assert_abs_diff_eq!(
                    gradient[&i],
                    fd,
                    epsilon = 1e-5 * (1.0 + objective.abs())
                );
            }
        }
        Ok(())
    }

    #[test]
    fn phase_amount_weighting() -> GibbsResult<()> {
        let set = binary_solution()?;
        let conditions = conditions();
        let frac = 0.25;
        let x = [0.6, 0.4, frac];
        let weighted = set.evaluate_objective_gradient(&conditions, set.variable_map(), &x)?;
        let unweighted =
            set.evaluate_single_phase_objective_gradient(&conditions, set.variable_map(), &x)?;
        for i in 0..2 {
            assert_relative_eq!(weighted[&i], frac * unweighted[&i], max_relative = 1e-12);
        }
        // The phase-amount component is the raw energy.
        let energy = set.energy(&conditions, &x[..2])?;
        assert_relative_eq!(weighted[&2], energy, max_relative = 1e-12);
        Ok(())
    }

    #[test]
    fn hessian_structure_and_values() -> GibbsResult<()> {
        let set = binary_solution()?;
        let conditions = conditions();
        let x = [0.6, 0.4, 1.0];
        let hessian = set.evaluate_objective_hessian(&conditions, set.variable_map(), &x)?;
        let rt = crate::conditions::GAS_CONSTANT * 800.0;
        // d2G/dyA2 = RT / yA, cross term d2G/dyAdyB = L0-only curvature.
        assert_relative_eq!(hessian[&(0, 0)], rt / 0.6, max_relative = 1e-10);
        assert_relative_eq!(hessian[&(1, 1)], rt / 0.4, max_relative = 1e-10);
        assert_relative_eq!(hessian[&(0, 1)], 12000.0, max_relative = 1e-10);
        let pattern = set.hessian_sparsity_structure(set.variable_map())?;
        assert!(pattern.contains(&(0, 2)));
        assert!(!pattern.contains(&(2, 2)));
        Ok(())
    }

    #[test]
    fn constraint_null_space_invariants() -> GibbsResult<()> {
        let phase = Phase::new(
            "FCC_A1",
            vec![
                Sublattice::new(1.0, &["FE", "NI"]),
                Sublattice::new(1.0, &["C", "VA"]),
            ],
        );
        let set = CompositionSet::new(phase, &ParameterSet::new())?;
        let z = set.constraint_null_space();
        assert_eq!(z.shape(), (4, 2));
        // Rows of A are the sublattice balances.
        let a = DMatrix::from_row_slice(2, 4, &[1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0]);
        let az = a * z;
        for value in az.iter() {
            assert_abs_diff_eq!(*value, 0.0, epsilon = 1e-10);
        }
        let ztz = z.transpose() * z;
        for i in 0..2 {
            for j in 0..2 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(ztz[(i, j)], expected, epsilon = 1e-10);
            }
        }
        Ok(())
    }

    #[test]
    fn renamed_clone_reproduces_the_original() -> GibbsResult<()> {
        let set = binary_solution()?;
        let clone = set.clone_with_new_name("ALPHA#2", IndexMap::new());
        assert_eq!(clone.name(), "ALPHA#2");
        assert!(clone.variable_map().contains("ALPHA#2_0_A"));
        assert!(!clone.variable_map().contains("ALPHA_0_A"));

        let conditions = conditions();
        let x = [0.35, 0.65, 1.0];
        assert_relative_eq!(
            set.energy(&conditions, &x[..2])?,
            clone.energy(&conditions, &x[..2])?,
            max_relative = 1e-14
        );
        let gradient = set.evaluate_objective_gradient(&conditions, set.variable_map(), &x)?;
        let clone_gradient =
            clone.evaluate_objective_gradient(&conditions, clone.variable_map(), &x)?;
        for i in 0..3 {
            assert_relative_eq!(gradient[&i], clone_gradient[&i], max_relative = 1e-14);
        }
        Ok(())
    }
}
