use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Molar gas constant in J/mol·K (Thermo-Calc value).
pub const GAS_CONSTANT: f64 = 8.3145;

/// Status of a phase with respect to the equilibrium calculation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseStatus {
    /// The phase participates in the minimization.
    Entered,
    /// The phase is evaluated but may not contribute to the equilibrium.
    Dormant,
    /// The phase amount is fixed by the caller.
    Fixed,
    /// The phase is excluded entirely.
    Suspended,
}

/// State conditions for one equilibrium point.
///
/// State variables are keyed by their single-character code (`T`, `P`, `N`).
/// The element list is the projection basis for mole-fraction space; its
/// last entry is the dependent mole-fraction dimension.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conditions {
    /// State variable values, e.g. temperature in K under `'T'`.
    pub statevars: BTreeMap<char, f64>,
    /// Elements under consideration, in projection order.
    pub elements: Vec<String>,
    /// Phases under consideration.
    pub phases: IndexMap<String, PhaseStatus>,
    /// Target system mole fractions by element symbol.
    pub mole_fractions: IndexMap<String, f64>,
}

impl Conditions {
    /// Shorthand for the temperature condition.
    pub fn temperature(&self) -> Option<f64> {
        self.statevars.get(&'T').copied()
    }

    /// Phases with status [PhaseStatus::Entered], in insertion order.
    pub fn entered_phases(&self) -> impl Iterator<Item = &String> {
        self.phases
            .iter()
            .filter(|(_, status)| **status == PhaseStatus::Entered)
            .map(|(name, _)| name)
    }
}
