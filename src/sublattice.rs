use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Species name used for vacant sites; excluded from mole-fraction space.
pub const VACANCY: &str = "VA";

/// One crystallographically distinct site type of a phase.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sublattice {
    /// Stoichiometric number of sites of this type per formula unit.
    pub multiplicity: f64,
    /// Species that may occupy this site, in constituent order. The last
    /// species is the dependent dimension of the sublattice.
    pub species: Vec<String>,
}

impl Sublattice {
    pub fn new(multiplicity: f64, species: &[&str]) -> Self {
        Self {
            multiplicity,
            species: species.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Static description of a phase: its name, site structure, and magnetic
/// configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub sublattices: Vec<Sublattice>,
    /// Antiferromagnetic scaling factor of the IHJ model; negative Curie
    /// temperatures and moments are divided by it.
    pub magnetic_afm_factor: f64,
    /// Fraction of the magnetic enthalpy due to short-range order (the
    /// structure factor `p` of the IHJ model).
    pub magnetic_sro_enthalpy_order_fraction: f64,
}

impl Phase {
    pub fn new(name: impl Into<String>, sublattices: Vec<Sublattice>) -> Self {
        Self {
            name: name.into(),
            sublattices,
            magnetic_afm_factor: 0.0,
            magnetic_sro_enthalpy_order_fraction: 0.0,
        }
    }

    pub fn with_magnetic_structure(mut self, afm_factor: f64, sro_fraction: f64) -> Self {
        self.magnetic_afm_factor = afm_factor;
        self.magnetic_sro_enthalpy_order_fraction = sro_fraction;
        self
    }

    /// Name of the site-fraction variable of `species` on sublattice
    /// `sublindex`: `<PHASE>_<SUBLINDEX>_<SPECIES>`.
    pub fn site_fraction_name(&self, sublindex: usize, species: &str) -> String {
        format!("{}_{}_{}", self.name, sublindex, species)
    }

    /// Name of the phase-amount variable: `<PHASE>_FRAC`.
    pub fn phase_fraction_name(&self) -> String {
        format!("{}_FRAC", self.name)
    }

    /// Site-fraction variable names in index order (sublattice-major).
    pub fn site_fraction_names(&self) -> Vec<String> {
        self.sublattices
            .iter()
            .enumerate()
            .flat_map(|(sublindex, sublattice)| {
                sublattice
                    .species
                    .iter()
                    .map(move |species| self.site_fraction_name(sublindex, species))
            })
            .collect()
    }

    /// Number of site-fraction variables (the phase-amount variable is
    /// not counted).
    pub fn site_fraction_count(&self) -> usize {
        self.sublattices.iter().map(|s| s.species.len()).sum()
    }

    /// Total number of sites per formula unit.
    pub fn total_sites(&self) -> f64 {
        self.sublattices.iter().map(|s| s.multiplicity).sum()
    }

    /// Indices of the dependent dimensions of the site-fraction vector:
    /// the last species of every sublattice, whose value is implied by the
    /// sum-to-one balance.
    pub fn dependent_dimensions(&self) -> BTreeSet<usize> {
        let mut dependent = BTreeSet::new();
        let mut offset = 0;
        for sublattice in &self.sublattices {
            let count = sublattice.species.len();
            if count > 0 {
                dependent.insert(offset + count - 1);
            }
            offset += count;
        }
        dependent
    }

    /// Project a site-fraction point into mole-fraction space.
    ///
    /// The mole fraction of an element is its site-weighted occupation
    /// divided by the number of element-bearing sites; vacancies reduce
    /// the denominator. Returned in `elements` order.
    pub fn site_to_mole_fractions(
        &self,
        elements: &[String],
        site_fractions: &[f64],
    ) -> IndexMap<String, f64> {
        let mut weights: IndexMap<String, f64> = elements
            .iter()
            .map(|element| (element.clone(), 0.0))
            .collect();
        let mut total = 0.0;
        let mut offset = 0;
        for sublattice in &self.sublattices {
            for (i, species) in sublattice.species.iter().enumerate() {
                let y = site_fractions[offset + i];
                if species == VACANCY {
                    continue;
                }
                total += sublattice.multiplicity * y;
                if let Some(weight) = weights.get_mut(species.as_str()) {
                    *weight += sublattice.multiplicity * y;
                }
            }
            offset += sublattice.species.len();
        }
        if total > 0.0 {
            for weight in weights.values_mut() {
                *weight /= total;
            }
        }
        weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn interstitial_phase() -> Phase {
        Phase::new(
            "FCC_A1",
            vec![
                Sublattice::new(1.0, &["FE", "NI"]),
                Sublattice::new(1.0, &["C", "VA"]),
            ],
        )
    }

    #[test]
    fn variable_names_and_dependent_dimensions() {
        let phase = interstitial_phase();
        assert_eq!(
            phase.site_fraction_names(),
            vec!["FCC_A1_0_FE", "FCC_A1_0_NI", "FCC_A1_1_C", "FCC_A1_1_VA"]
        );
        assert_eq!(phase.phase_fraction_name(), "FCC_A1_FRAC");
        let dependent: Vec<usize> = phase.dependent_dimensions().into_iter().collect();
        assert_eq!(dependent, vec![1, 3]);
    }

    #[test]
    fn vacancies_are_excluded_from_mole_fractions() {
        let phase = interstitial_phase();
        let elements = vec!["FE".to_string(), "NI".to_string(), "C".to_string()];
        // Half the interstitial sites vacant.
        let x = phase.site_to_mole_fractions(&elements, &[0.6, 0.4, 0.5, 0.5]);
        let total = 0.6 + 0.4 + 0.5;
        assert_relative_eq!(x["FE"], 0.6 / total, max_relative = 1e-14);
        assert_relative_eq!(x["NI"], 0.4 / total, max_relative = 1e-14);
        assert_relative_eq!(x["C"], 0.5 / total, max_relative = 1e-14);
        let sum: f64 = x.values().sum();
        assert_relative_eq!(sum, 1.0, max_relative = 1e-14);
    }
}
