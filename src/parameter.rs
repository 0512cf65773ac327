//! Thermodynamic parameter records.
//!
//! A [ParameterSet] plays the role of the parameter table of a
//! thermodynamic database: end-member Gibbs energies (`G`), interaction
//! parameters (`L`), Curie temperatures (`TC`), and magnetic moments
//! (`BMAGN`), plus the table of named functions the parameter expressions
//! may reference. Database parsing itself is out of scope; callers build
//! records in memory.

use crate::expression::{Expr, SymbolTable};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A single parameter record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Parameter {
    /// Phase the parameter applies to.
    pub phase: String,
    /// Parameter type: `G`, `L`, `TC`, or `BMAGN`.
    pub kind: String,
    /// Constituent array: one species list per sublattice. Interaction
    /// entries hold two or three species on exactly one sublattice.
    pub constituents: Vec<Vec<String>>,
    /// Redlich–Kister order.
    pub order: i32,
    /// The parameter expression (typically a function of temperature).
    pub expression: Arc<Expr>,
}

impl Parameter {
    pub fn new(
        phase: impl Into<String>,
        kind: impl Into<String>,
        constituents: &[&[&str]],
        order: i32,
        expression: Arc<Expr>,
    ) -> Self {
        Self {
            phase: phase.into(),
            kind: kind.into(),
            constituents: constituents
                .iter()
                .map(|sublattice| normalized(sublattice.iter().map(|s| s.to_string())))
                .collect(),
            order,
            expression,
        }
    }
}

/// Sort a constituent list; matching is order-insensitive within a
/// sublattice.
fn normalized(species: impl Iterator<Item = String>) -> Vec<String> {
    let mut list: Vec<String> = species.collect();
    list.sort();
    list
}

/// All parameters of a system plus the named-function table.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ParameterSet {
    parameters: Vec<Parameter>,
    symbols: SymbolTable,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, parameter: Parameter) {
        self.parameters.push(parameter);
    }

    pub fn define_symbol(&mut self, name: impl Into<String>, expression: Arc<Expr>) {
        self.symbols.insert(name.into(), expression);
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Look up the parameter matching `(phase, kind, constituents, order)`.
    /// Constituent lists are compared order-insensitively per sublattice.
    pub fn get(
        &self,
        phase: &str,
        kind: &str,
        constituents: &[Vec<String>],
        order: i32,
    ) -> Option<&Arc<Expr>> {
        let query: Vec<Vec<String>> = constituents
            .iter()
            .map(|sublattice| normalized(sublattice.iter().cloned()))
            .collect();
        self.parameters
            .iter()
            .find(|p| p.phase == phase && p.kind == kind && p.order == order && p.constituents == query)
            .map(|p| &p.expression)
    }

    /// All orders defined for a constituent array, ascending.
    pub fn orders(
        &self,
        phase: &str,
        kind: &str,
        constituents: &[Vec<String>],
    ) -> Vec<(i32, Arc<Expr>)> {
        let query: Vec<Vec<String>> = constituents
            .iter()
            .map(|sublattice| normalized(sublattice.iter().cloned()))
            .collect();
        let mut found: Vec<(i32, Arc<Expr>)> = self
            .parameters
            .iter()
            .filter(|p| p.phase == phase && p.kind == kind && p.constituents == query)
            .map(|p| (p.order, p.expression.clone()))
            .collect();
        found.sort_by_key(|(order, _)| *order);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_order_insensitive_within_a_sublattice() {
        let mut params = ParameterSet::new();
        params.add(Parameter::new(
            "LIQUID",
            "L",
            &[&["B", "A"]],
            0,
            Expr::constant(-2000.0),
        ));
        let constituents = vec![vec!["A".to_string(), "B".to_string()]];
        let found = params.get("LIQUID", "L", &constituents, 0);
        assert!(found.is_some());
        assert!(params.get("LIQUID", "L", &constituents, 1).is_none());
        assert!(params.get("LIQUID", "G", &constituents, 0).is_none());
    }

    #[test]
    fn orders_are_sorted() {
        let mut params = ParameterSet::new();
        let constituents: &[&[&str]] = &[&["A", "B"]];
        params.add(Parameter::new("S", "L", constituents, 2, Expr::constant(3.0)));
        params.add(Parameter::new("S", "L", constituents, 0, Expr::constant(1.0)));
        let query = vec![vec!["A".to_string(), "B".to_string()]];
        let orders = params.orders("S", "L", &query);
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].0, 0);
        assert_eq!(orders[1].0, 2);
    }
}
