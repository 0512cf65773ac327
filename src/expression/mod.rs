//! Symbolic expression trees for Gibbs energy models.
//!
//! Model builders assemble immutable [Expr] trees once per phase; the
//! composition set then evaluates them (and their cached derivatives) at
//! every sampled point. Subtrees are shared through [Arc], so
//! differentiation and simplification never copy more than they change.

use crate::conditions::Conditions;
use crate::errors::{GibbsError, GibbsResult};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

mod diff;
mod simplify;

pub use diff::differentiate;
pub use simplify::{is_zero_tree, simplify};

/// Named symbol table; entries may reference other entries.
pub type SymbolTable = IndexMap<String, Arc<Expr>>;

/// Bidirectional variable name ↔ index map: the position of a name in the
/// set is its index into the value vector.
pub type VariableMap = IndexSet<String>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Log,
    Exp,
}

/// One branch of a piecewise expression, selected when the scrutinee value
/// lies in `[lower, upper)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub lower: f64,
    pub upper: f64,
    pub body: Arc<Expr>,
}

/// A node of the expression tree.
///
/// Trees are pure: evaluation has no observable side effects and
/// differentiation produces a new tree of the same form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Constant(f64),
    /// A site-fraction (or phase-amount) variable, resolved through the
    /// name → index map into the value vector.
    Variable(String),
    /// A named symbol, resolved through the symbol table.
    SymbolRef(String),
    /// A state variable, resolved from the conditions record by its
    /// single-character code.
    StateVariable(char),
    Binary(BinaryOp, Arc<Expr>, Arc<Expr>),
    Unary(UnaryOp, Arc<Expr>),
    /// Range-conditional expression. The scrutinee is a state variable for
    /// ordinary temperature-range parameters; the magnetic model uses a
    /// computed ratio. No matching branch evaluates to zero.
    Piecewise {
        scrutinee: Arc<Expr>,
        branches: Vec<Branch>,
    },
}

impl Expr {
    pub fn constant(value: f64) -> Arc<Expr> {
        Arc::new(Expr::Constant(value))
    }

    pub fn variable(name: impl Into<String>) -> Arc<Expr> {
        Arc::new(Expr::Variable(name.into()))
    }

    pub fn symbol(name: impl Into<String>) -> Arc<Expr> {
        Arc::new(Expr::SymbolRef(name.into()))
    }

    pub fn state_variable(code: char) -> Arc<Expr> {
        Arc::new(Expr::StateVariable(code))
    }

    pub fn add(lhs: Arc<Expr>, rhs: Arc<Expr>) -> Arc<Expr> {
        Arc::new(Expr::Binary(BinaryOp::Add, lhs, rhs))
    }

    pub fn sub(lhs: Arc<Expr>, rhs: Arc<Expr>) -> Arc<Expr> {
        Arc::new(Expr::Binary(BinaryOp::Sub, lhs, rhs))
    }

    pub fn mul(lhs: Arc<Expr>, rhs: Arc<Expr>) -> Arc<Expr> {
        Arc::new(Expr::Binary(BinaryOp::Mul, lhs, rhs))
    }

    pub fn div(lhs: Arc<Expr>, rhs: Arc<Expr>) -> Arc<Expr> {
        Arc::new(Expr::Binary(BinaryOp::Div, lhs, rhs))
    }

    pub fn pow(base: Arc<Expr>, exponent: Arc<Expr>) -> Arc<Expr> {
        Arc::new(Expr::Binary(BinaryOp::Pow, base, exponent))
    }

    pub fn neg(child: Arc<Expr>) -> Arc<Expr> {
        Arc::new(Expr::Unary(UnaryOp::Neg, child))
    }

    pub fn log(child: Arc<Expr>) -> Arc<Expr> {
        Arc::new(Expr::Unary(UnaryOp::Log, child))
    }

    pub fn exp(child: Arc<Expr>) -> Arc<Expr> {
        Arc::new(Expr::Unary(UnaryOp::Exp, child))
    }

    pub fn piecewise(scrutinee: Arc<Expr>, branches: Vec<Branch>) -> Arc<Expr> {
        Arc::new(Expr::Piecewise {
            scrutinee,
            branches,
        })
    }

    /// Sum a sequence of terms into a left-associated chain; an empty
    /// sequence folds to zero.
    pub fn sum(terms: impl IntoIterator<Item = Arc<Expr>>) -> Arc<Expr> {
        let mut iter = terms.into_iter();
        match iter.next() {
            None => Expr::constant(0.0),
            Some(first) => iter.fold(first, Expr::add),
        }
    }

    /// Multiply a sequence of factors into a left-associated chain; an
    /// empty sequence folds to one.
    pub fn product(factors: impl IntoIterator<Item = Arc<Expr>>) -> Arc<Expr> {
        let mut iter = factors.into_iter();
        match iter.next() {
            None => Expr::constant(1.0),
            Some(first) => iter.fold(first, Expr::mul),
        }
    }

    /// Evaluate the tree at the point `x`.
    ///
    /// Variable nodes resolve through `indices` into `x`, state variables
    /// from `conditions`, and named symbols through `symbols` (recursively,
    /// with the same bindings). Missing bindings and domain errors surface
    /// as distinct [GibbsError] variants; nothing is silently substituted.
    pub fn evaluate(
        &self,
        conditions: &Conditions,
        indices: &VariableMap,
        symbols: &SymbolTable,
        x: &[f64],
    ) -> GibbsResult<f64> {
        let mut expansion_stack = Vec::new();
        self.evaluate_inner(conditions, indices, symbols, x, &mut expansion_stack)
    }

    fn evaluate_inner(
        &self,
        conditions: &Conditions,
        indices: &VariableMap,
        symbols: &SymbolTable,
        x: &[f64],
        expansion_stack: &mut Vec<String>,
    ) -> GibbsResult<f64> {
        match self {
            Expr::Constant(value) => Ok(*value),
            Expr::Variable(name) => {
                let index = indices
                    .get_index_of(name.as_str())
                    .filter(|&i| i < x.len())
                    .ok_or_else(|| GibbsError::MissingVariable(name.clone()))?;
                Ok(x[index])
            }
            Expr::SymbolRef(name) => {
                if expansion_stack.iter().any(|visited| visited == name) {
                    return Err(GibbsError::CyclicSymbol(name.clone()));
                }
                let body = symbols
                    .get(name.as_str())
                    .ok_or_else(|| GibbsError::MissingVariable(name.clone()))?;
                expansion_stack.push(name.clone());
                let value = body.evaluate_inner(conditions, indices, symbols, x, expansion_stack)?;
                expansion_stack.pop();
                Ok(value)
            }
            Expr::StateVariable(code) => conditions
                .statevars
                .get(code)
                .copied()
                .ok_or(GibbsError::MissingStateVariable(*code)),
            Expr::Binary(op, lhs, rhs) => {
                let left = lhs.evaluate_inner(conditions, indices, symbols, x, expansion_stack)?;
                // A zero factor annihilates the product without evaluating
                // the other side; this is the 0·log 0 = 0 convention.
                if *op == BinaryOp::Mul && left == 0.0 {
                    return Ok(0.0);
                }
                let right = rhs.evaluate_inner(conditions, indices, symbols, x, expansion_stack)?;
                let value = match op {
                    BinaryOp::Add => left + right,
                    BinaryOp::Sub => left - right,
                    BinaryOp::Mul => {
                        if right == 0.0 {
                            return Ok(0.0);
                        }
                        left * right
                    }
                    BinaryOp::Div => {
                        if right == 0.0 {
                            return Err(GibbsError::Domain {
                                operation: "divide",
                                argument: right,
                            });
                        }
                        left / right
                    }
                    BinaryOp::Pow => left.powf(right),
                };
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(GibbsError::Domain {
                        operation: "arithmetic",
                        argument: value,
                    })
                }
            }
            Expr::Unary(op, child) => {
                let arg = child.evaluate_inner(conditions, indices, symbols, x, expansion_stack)?;
                match op {
                    UnaryOp::Neg => Ok(-arg),
                    UnaryOp::Log => {
                        if arg <= 0.0 {
                            Err(GibbsError::Domain {
                                operation: "log",
                                argument: arg,
                            })
                        } else {
                            Ok(arg.ln())
                        }
                    }
                    UnaryOp::Exp => {
                        let value = arg.exp();
                        if value.is_finite() {
                            Ok(value)
                        } else {
                            Err(GibbsError::Domain {
                                operation: "exp",
                                argument: arg,
                            })
                        }
                    }
                }
            }
            Expr::Piecewise {
                scrutinee,
                branches,
            } => {
                let value =
                    scrutinee.evaluate_inner(conditions, indices, symbols, x, expansion_stack)?;
                for branch in branches {
                    if branch.lower <= value && value < branch.upper {
                        return branch
                            .body
                            .evaluate_inner(conditions, indices, symbols, x, expansion_stack);
                    }
                }
                Ok(0.0)
            }
        }
    }

}

/// Rebuild a tree with every `Variable` and `SymbolRef` name that starts
/// with `old_prefix` renamed to start with `new_prefix`. Untouched
/// subtrees stay shared.
pub fn rename_phase_prefix(expr: &Arc<Expr>, old_prefix: &str, new_prefix: &str) -> Arc<Expr> {
    let rename = |name: &str| -> Option<String> {
        name.strip_prefix(old_prefix)
            .map(|suffix| format!("{new_prefix}{suffix}"))
    };
    match expr.as_ref() {
        Expr::Constant(_) | Expr::StateVariable(_) => expr.clone(),
        Expr::Variable(name) => match rename(name) {
            Some(renamed) => Arc::new(Expr::Variable(renamed)),
            None => expr.clone(),
        },
        Expr::SymbolRef(name) => match rename(name) {
            Some(renamed) => Arc::new(Expr::SymbolRef(renamed)),
            None => expr.clone(),
        },
        Expr::Binary(op, lhs, rhs) => Arc::new(Expr::Binary(
            *op,
            rename_phase_prefix(lhs, old_prefix, new_prefix),
            rename_phase_prefix(rhs, old_prefix, new_prefix),
        )),
        Expr::Unary(op, child) => Arc::new(Expr::Unary(
            *op,
            rename_phase_prefix(child, old_prefix, new_prefix),
        )),
        Expr::Piecewise {
            scrutinee,
            branches,
        } => Arc::new(Expr::Piecewise {
            scrutinee: rename_phase_prefix(scrutinee, old_prefix, new_prefix),
            branches: branches
                .iter()
                .map(|branch| Branch {
                    lower: branch.lower,
                    upper: branch.upper,
                    body: rename_phase_prefix(&branch.body, old_prefix, new_prefix),
                })
                .collect(),
        }),
    }
}
