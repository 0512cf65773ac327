//! Pure-compound (end-member) reference energy.

use crate::expression::{simplify, Expr};
use crate::parameter::ParameterSet;
use crate::sublattice::Phase;
use itertools::Itertools;
use std::sync::Arc;

/// Reference surface: a sum over every end-member (one species chosen per
/// sublattice), weighted by the product of the chosen site fractions, of
/// the end-member's `G` parameter.
pub fn pure_compound_energy(phase: &Phase, parameters: &ParameterSet) -> Arc<Expr> {
    endmember_sum(phase, parameters, "G")
}

/// Site-fraction-weighted sum of end-member parameters of the given kind.
/// Shared by the reference surface (`G`) and the magnetic property
/// surfaces (`TC`, `BMAGN`). End-members without a parameter contribute
/// nothing.
pub(crate) fn endmember_sum(phase: &Phase, parameters: &ParameterSet, kind: &str) -> Arc<Expr> {
    let mut terms = Vec::new();
    for choice in phase
        .sublattices
        .iter()
        .map(|sublattice| sublattice.species.iter())
        .multi_cartesian_product()
    {
        let constituents: Vec<Vec<String>> =
            choice.iter().map(|species| vec![(*species).clone()]).collect();
        let Some(parameter) = parameters.get(&phase.name, kind, &constituents, 0) else {
            continue;
        };
        let occupation = Expr::product(choice.iter().enumerate().map(|(sublindex, species)| {
            Expr::variable(phase.site_fraction_name(sublindex, species))
        }));
        terms.push(Expr::mul(occupation, parameter.clone()));
    }
    simplify(&Expr::sum(terms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::Conditions;
    use crate::expression::{SymbolTable, VariableMap};
    use crate::parameter::Parameter;
    use crate::sublattice::Sublattice;
    use approx::assert_relative_eq;

    #[test]
    fn endmembers_are_weighted_by_site_fraction_products() {
        let phase = Phase::new(
            "ALPHA",
            vec![
                Sublattice::new(1.0, &["A", "B"]),
                Sublattice::new(1.0, &["X"]),
            ],
        );
        let mut parameters = ParameterSet::new();
        parameters.add(Parameter::new(
            "ALPHA",
            "G",
            &[&["A"], &["X"]],
            0,
            Expr::constant(-1000.0),
        ));
        parameters.add(Parameter::new(
            "ALPHA",
            "G",
            &[&["B"], &["X"]],
            0,
            Expr::constant(3000.0),
        ));
        let tree = pure_compound_energy(&phase, &parameters);

        let mut indices = VariableMap::new();
        for name in phase.site_fraction_names() {
            indices.insert(name);
        }
        let x = [0.25, 0.75, 1.0];
        let value = tree
            .evaluate(&Conditions::default(), &indices, &SymbolTable::new(), &x)
            .unwrap();
        assert_relative_eq!(
            value,
            0.25 * -1000.0 + 0.75 * 3000.0,
            max_relative = 1e-14
        );
    }
}
