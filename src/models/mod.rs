//! Per-phase Gibbs energy model assembly.
//!
//! Each phase's energy is the ordered sum of four contributions, every one
//! a symbolic tree over the phase's site-fraction variables and the state
//! variables: the pure-compound reference surface, ideal mixing,
//! Redlich–Kister excess, and the IHJ magnetic term. Trees are normalized
//! by the total number of sites so all phases share a per-mole-of-sites
//! energy scale.

use crate::expression::Expr;
use crate::parameter::ParameterSet;
use crate::sublattice::Phase;
use indexmap::IndexMap;
use std::sync::Arc;

mod ideal_mixing;
mod magnetic;
mod pure_compound;
mod redlich_kister;

pub use ideal_mixing::ideal_mixing_energy;
pub use magnetic::ihj_magnetic_energy;
pub use pure_compound::pure_compound_energy;
pub use redlich_kister::redlich_kister_excess_energy;

pub(crate) use pure_compound::endmember_sum;
pub(crate) use redlich_kister::interaction_sum;

pub const PURE_ENERGY: &str = "PURE_ENERGY";
pub const IDEAL_MIX: &str = "IDEAL_MIX";
pub const REDLICH_KISTER: &str = "REDLICH_KISTER";
pub const IHJ_MAGNETIC: &str = "IHJ_MAGNETIC";

/// Assemble the four model trees of a phase, normalized by its total
/// number of sites, keyed by model name in evaluation order.
pub fn phase_models(phase: &Phase, parameters: &ParameterSet) -> IndexMap<&'static str, Arc<Expr>> {
    let mut models = IndexMap::new();
    models.insert(PURE_ENERGY, pure_compound_energy(phase, parameters));
    models.insert(IDEAL_MIX, ideal_mixing_energy(phase));
    models.insert(REDLICH_KISTER, redlich_kister_excess_energy(phase, parameters));
    models.insert(IHJ_MAGNETIC, ihj_magnetic_energy(phase, parameters));

    let total_sites = phase.total_sites();
    if total_sites > 0.0 && total_sites != 1.0 {
        for tree in models.values_mut() {
            *tree = Expr::div(tree.clone(), Expr::constant(total_sites));
        }
    }
    models
}
