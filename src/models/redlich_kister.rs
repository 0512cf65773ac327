//! Redlich–Kister excess energy.

use crate::expression::{simplify, Expr};
use crate::parameter::ParameterSet;
use crate::sublattice::Phase;
use itertools::Itertools;
use std::sync::Arc;

/// Excess contribution: every binary or ternary interaction subset within
/// a single sublattice, combined with one chosen species on every other
/// sublattice, weighted by the product of the participating site
/// fractions and the matching `L` parameters.
pub fn redlich_kister_excess_energy(phase: &Phase, parameters: &ParameterSet) -> Arc<Expr> {
    interaction_sum(phase, parameters, "L")
}

/// Interaction expansion for a parameter kind (`L` for the excess energy,
/// `TC`/`BMAGN` for the magnetic property surfaces).
///
/// Binary subsets expand as a Redlich–Kister polynomial in the site
/// fraction difference of the alphabetically ordered pair; ternary
/// subsets weight the order-ℓ parameter with the site fraction of the
/// ℓ-th constituent, with a lone order-0 parameter applied symmetrically.
pub(crate) fn interaction_sum(phase: &Phase, parameters: &ParameterSet, kind: &str) -> Arc<Expr> {
    let mut terms = Vec::new();
    for (sublindex, sublattice) in phase.sublattices.iter().enumerate() {
        if sublattice.species.len() < 2 {
            continue;
        }
        let other_choices = single_choices_on_other_sublattices(phase, sublindex);
        for size in [2usize, 3] {
            for subset in sublattice.species.iter().combinations(size) {
                let mut subset: Vec<&String> = subset;
                subset.sort();
                for others in &other_choices {
                    let constituents = constituent_array(phase, sublindex, &subset, others);
                    let orders = parameters.orders(&phase.name, kind, &constituents);
                    if orders.is_empty() {
                        continue;
                    }
                    let interacting: Vec<Arc<Expr>> = subset
                        .iter()
                        .map(|species| {
                            Expr::variable(phase.site_fraction_name(sublindex, species))
                        })
                        .collect();
                    let parameter_sum = if size == 2 {
                        binary_polynomial(&interacting, &orders)
                    } else {
                        ternary_polynomial(&interacting, &orders)
                    };
                    let occupation = Expr::product(
                        others
                            .iter()
                            .map(|(other_subl, species)| {
                                Expr::variable(phase.site_fraction_name(*other_subl, species))
                            })
                            .chain(interacting.iter().cloned()),
                    );
                    terms.push(Expr::mul(occupation, parameter_sum));
                }
            }
        }
    }
    simplify(&Expr::sum(terms))
}

/// `Σ_ℓ L_ℓ (y_i − y_j)^ℓ` over the defined orders.
fn binary_polynomial(interacting: &[Arc<Expr>], orders: &[(i32, Arc<Expr>)]) -> Arc<Expr> {
    let difference = Expr::sub(interacting[0].clone(), interacting[1].clone());
    Expr::sum(orders.iter().map(|(order, parameter)| {
        if *order == 0 {
            parameter.clone()
        } else {
            Expr::mul(
                parameter.clone(),
                Expr::pow(difference.clone(), Expr::constant(*order as f64)),
            )
        }
    }))
}

/// `Σ_ℓ y_ℓ L_ℓ` over orders 0..=2; a lone order-0 parameter is symmetric.
fn ternary_polynomial(interacting: &[Arc<Expr>], orders: &[(i32, Arc<Expr>)]) -> Arc<Expr> {
    if let [(0, parameter)] = orders {
        return parameter.clone();
    }
    Expr::sum(orders.iter().filter_map(|(order, parameter)| {
        let species = interacting.get(*order as usize)?;
        Some(Expr::mul(species.clone(), parameter.clone()))
    }))
}

fn single_choices_on_other_sublattices<'a>(
    phase: &'a Phase,
    interaction_sublattice: usize,
) -> Vec<Vec<(usize, &'a String)>> {
    let others: Vec<Vec<(usize, &String)>> = phase
        .sublattices
        .iter()
        .enumerate()
        .filter(|(sublindex, _)| *sublindex != interaction_sublattice)
        .map(|(sublindex, sublattice)| {
            sublattice
                .species
                .iter()
                .map(|species| (sublindex, species))
                .collect()
        })
        .collect();
    if others.is_empty() {
        return vec![Vec::new()];
    }
    others
        .into_iter()
        .multi_cartesian_product()
        .collect()
}

fn constituent_array(
    phase: &Phase,
    interaction_sublattice: usize,
    subset: &[&String],
    others: &[(usize, &String)],
) -> Vec<Vec<String>> {
    phase
        .sublattices
        .iter()
        .enumerate()
        .map(|(sublindex, _)| {
            if sublindex == interaction_sublattice {
                subset.iter().map(|s| (*s).clone()).collect()
            } else {
                others
                    .iter()
                    .filter(|(other_subl, _)| *other_subl == sublindex)
                    .map(|(_, species)| (*species).clone())
                    .collect()
            }
        })
        .collect()
}
