//! Inden–Hillert–Jarl magnetic contribution.

use super::{endmember_sum, interaction_sum};
use crate::conditions::GAS_CONSTANT;
use crate::expression::{is_zero_tree, simplify, Branch, Expr};
use crate::parameter::ParameterSet;
use crate::sublattice::Phase;
use std::sync::Arc;

// Curie temperatures below this are treated as non-magnetic.
const TC_FLOOR: f64 = 1e-12;

/// Magnetic ordering energy `R·T·ln(β+1)·g(τ)` with `τ = T/TC`.
///
/// The Curie temperature and mean moment are composition surfaces built
/// from the phase's `TC` and `BMAGN` parameters with the same end-member
/// and interaction expansion as the nonmagnetic models; negative values
/// are rescaled by the phase's antiferromagnetic factor. Phases without
/// magnetic parameters or structure contribute a zero tree.
pub fn ihj_magnetic_energy(phase: &Phase, parameters: &ParameterSet) -> Arc<Expr> {
    let p = phase.magnetic_sro_enthalpy_order_fraction;
    let afm = phase.magnetic_afm_factor;
    if p <= 0.0 || afm == 0.0 {
        return Expr::constant(0.0);
    }
    let curie = property_surface(phase, parameters, "TC", afm);
    let moment = property_surface(phase, parameters, "BMAGN", afm);
    if is_zero_tree(&curie) {
        return Expr::constant(0.0);
    }

    let tau = Expr::div(Expr::state_variable('T'), curie.clone());
    let g = ordering_function(&tau, p);
    let core = Expr::mul(
        Expr::mul(
            Expr::mul(Expr::constant(GAS_CONSTANT), Expr::state_variable('T')),
            Expr::log(Expr::add(moment, Expr::constant(1.0))),
        ),
        g,
    );
    // No contribution where the adjusted Curie temperature vanishes.
    simplify(&Expr::piecewise(
        curie,
        vec![Branch {
            lower: TC_FLOOR,
            upper: f64::INFINITY,
            body: core,
        }],
    ))
}

/// Composition surface of a magnetic property, with negative values
/// divided by the antiferromagnetic factor.
fn property_surface(
    phase: &Phase,
    parameters: &ParameterSet,
    kind: &str,
    afm_factor: f64,
) -> Arc<Expr> {
    let raw = simplify(&Expr::add(
        endmember_sum(phase, parameters, kind),
        interaction_sum(phase, parameters, kind),
    ));
    if is_zero_tree(&raw) {
        return raw;
    }
    Expr::piecewise(
        raw.clone(),
        vec![
            Branch {
                lower: f64::NEG_INFINITY,
                upper: 0.0,
                body: Expr::div(raw.clone(), Expr::constant(afm_factor)),
            },
            Branch {
                lower: 0.0,
                upper: f64::INFINITY,
                body: raw,
            },
        ],
    )
}

/// The Hillert–Jarl polynomial `g(τ)`, split at τ = 1, for structure
/// factor `p`.
fn ordering_function(tau: &Arc<Expr>, p: f64) -> Arc<Expr> {
    let a = 518.0 / 1125.0 + (11692.0 / 15975.0) * (1.0 / p - 1.0);
    let tau_pow = |n: f64| Expr::pow(tau.clone(), Expr::constant(n));

    let series_below = Expr::sum([
        Expr::mul(Expr::constant(1.0 / 6.0), tau_pow(3.0)),
        Expr::mul(Expr::constant(1.0 / 135.0), tau_pow(9.0)),
        Expr::mul(Expr::constant(1.0 / 600.0), tau_pow(15.0)),
    ]);
    let below = Expr::sub(
        Expr::constant(1.0),
        Expr::div(
            Expr::add(
                Expr::mul(Expr::constant(79.0 / (140.0 * p)), tau_pow(-1.0)),
                Expr::mul(
                    Expr::constant(474.0 / 497.0 * (1.0 / p - 1.0)),
                    series_below,
                ),
            ),
            Expr::constant(a),
        ),
    );
    let above = Expr::neg(Expr::div(
        Expr::sum([
            Expr::mul(Expr::constant(1.0 / 10.0), tau_pow(-5.0)),
            Expr::mul(Expr::constant(1.0 / 315.0), tau_pow(-15.0)),
            Expr::mul(Expr::constant(1.0 / 1500.0), tau_pow(-25.0)),
        ]),
        Expr::constant(a),
    ));
    Expr::piecewise(
        tau.clone(),
        vec![
            Branch {
                lower: 0.0,
                upper: 1.0,
                body: below,
            },
            Branch {
                lower: 1.0,
                upper: f64::INFINITY,
                body: above,
            },
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::Conditions;
    use crate::expression::{SymbolTable, VariableMap};
    use crate::parameter::Parameter;
    use crate::sublattice::Sublattice;
    use approx::assert_relative_eq;

    fn magnetic_phase() -> (Phase, ParameterSet) {
        let phase = Phase::new("BCC_A2", vec![Sublattice::new(1.0, &["FE"])])
            .with_magnetic_structure(-1.0, 0.4);
        let mut parameters = ParameterSet::new();
        parameters.add(Parameter::new(
            "BCC_A2",
            "TC",
            &[&["FE"]],
            0,
            Expr::constant(1043.0),
        ));
        parameters.add(Parameter::new(
            "BCC_A2",
            "BMAGN",
            &[&["FE"]],
            0,
            Expr::constant(2.22),
        ));
        (phase, parameters)
    }

    fn evaluate_at(tree: &Arc<Expr>, phase: &Phase, temperature: f64) -> f64 {
        let indices: VariableMap = phase.site_fraction_names().into_iter().collect();
        let mut conditions = Conditions::default();
        conditions.statevars.insert('T', temperature);
        tree.evaluate(&conditions, &indices, &SymbolTable::new(), &[1.0])
            .unwrap()
    }

    fn reference_g(tau: f64, p: f64) -> f64 {
        let a = 518.0 / 1125.0 + (11692.0 / 15975.0) * (1.0 / p - 1.0);
        if tau < 1.0 {
            1.0 - (79.0 / (140.0 * p * tau)
                + 474.0 / 497.0 * (1.0 / p - 1.0)
                    * (tau.powi(3) / 6.0 + tau.powi(9) / 135.0 + tau.powi(15) / 600.0))
                / a
        } else {
            -(tau.powi(-5) / 10.0 + tau.powi(-15) / 315.0 + tau.powi(-25) / 1500.0) / a
        }
    }

    #[test]
    fn matches_hillert_jarl_closed_form_on_both_sides_of_tc() {
        let (phase, parameters) = magnetic_phase();
        let tree = ihj_magnetic_energy(&phase, &parameters);
        for &temperature in &[300.0, 800.0, 1200.0, 2000.0] {
            let tau = temperature / 1043.0;
            let expected =
                GAS_CONSTANT * temperature * (2.22f64 + 1.0).ln() * reference_g(tau, 0.4);
            assert_relative_eq!(
                evaluate_at(&tree, &phase, temperature),
                expected,
                max_relative = 1e-10
            );
        }
    }

    #[test]
    fn nonmagnetic_phase_contributes_zero() {
        let phase = Phase::new("LIQUID", vec![Sublattice::new(1.0, &["FE"])]);
        let tree = ihj_magnetic_energy(&phase, &ParameterSet::new());
        assert!(is_zero_tree(&tree));
    }
}
