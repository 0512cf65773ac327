//! Ideal entropy of mixing.

use crate::conditions::GAS_CONSTANT;
use crate::expression::{simplify, Expr};
use crate::sublattice::Phase;
use std::sync::Arc;

/// Ideal mixing contribution: `R·T · Σ_s m_s Σ_i y_i log y_i`, with the
/// `0·log 0 = 0` convention carried by the evaluator.
pub fn ideal_mixing_energy(phase: &Phase) -> Arc<Expr> {
    let mut sublattice_terms = Vec::new();
    for (sublindex, sublattice) in phase.sublattices.iter().enumerate() {
        if sublattice.species.len() < 2 {
            // A fully occupied site has no configurational entropy.
            continue;
        }
        let entropy = Expr::sum(sublattice.species.iter().map(|species| {
            let y = Expr::variable(phase.site_fraction_name(sublindex, species));
            Expr::mul(y.clone(), Expr::log(y))
        }));
        sublattice_terms.push(Expr::mul(
            Expr::constant(sublattice.multiplicity),
            entropy,
        ));
    }
    if sublattice_terms.is_empty() {
        return Expr::constant(0.0);
    }
    simplify(&Expr::mul(
        Expr::mul(Expr::constant(GAS_CONSTANT), Expr::state_variable('T')),
        Expr::sum(sublattice_terms),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::Conditions;
    use crate::expression::{SymbolTable, VariableMap};
    use crate::sublattice::Sublattice;
    use approx::assert_relative_eq;

    #[test]
    fn matches_closed_form_and_vanishes_at_vertices() {
        let phase = Phase::new("ALPHA", vec![Sublattice::new(1.0, &["A", "B"])]);
        let tree = ideal_mixing_energy(&phase);
        let indices: VariableMap = phase.site_fraction_names().into_iter().collect();
        let mut conditions = Conditions::default();
        conditions.statevars.insert('T', 1000.0);

        let y = 0.3;
        let value = tree
            .evaluate(&conditions, &indices, &SymbolTable::new(), &[1.0 - y, y])
            .unwrap();
        let expected = GAS_CONSTANT * 1000.0 * ((1.0 - y) * (1.0 - y).ln() + y * y.ln());
        assert_relative_eq!(value, expected, max_relative = 1e-12);

        let vertex = tree
            .evaluate(&conditions, &indices, &SymbolTable::new(), &[1.0, 0.0])
            .unwrap();
        assert_eq!(vertex, 0.0);
    }
}
