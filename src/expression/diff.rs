//! Symbolic differentiation of expression trees.

use super::{BinaryOp, Branch, Expr, SymbolTable, UnaryOp};
use crate::errors::{GibbsError, GibbsResult};
use std::sync::Arc;

/// Differentiate `expr` with respect to the variable `var`.
///
/// Named symbols are expanded through `symbols` before differentiation;
/// reference cycles are fatal. The returned tree is not simplified.
pub fn differentiate(expr: &Arc<Expr>, var: &str, symbols: &SymbolTable) -> GibbsResult<Arc<Expr>> {
    let mut expansion_stack = Vec::new();
    differentiate_inner(expr, var, symbols, &mut expansion_stack)
}

fn differentiate_inner(
    expr: &Arc<Expr>,
    var: &str,
    symbols: &SymbolTable,
    expansion_stack: &mut Vec<String>,
) -> GibbsResult<Arc<Expr>> {
    match expr.as_ref() {
        Expr::Constant(_) | Expr::StateVariable(_) => Ok(Expr::constant(0.0)),
        Expr::Variable(name) => {
            if name == var {
                Ok(Expr::constant(1.0))
            } else {
                Ok(Expr::constant(0.0))
            }
        }
        Expr::SymbolRef(name) => {
            if expansion_stack.iter().any(|visited| visited == name) {
                return Err(GibbsError::CyclicSymbol(name.clone()));
            }
            let body = symbols
                .get(name.as_str())
                .ok_or_else(|| GibbsError::MissingVariable(name.clone()))?
                .clone();
            expansion_stack.push(name.clone());
            let derivative = differentiate_inner(&body, var, symbols, expansion_stack)?;
            expansion_stack.pop();
            Ok(derivative)
        }
        Expr::Binary(op, lhs, rhs) => {
            let dl = differentiate_inner(lhs, var, symbols, expansion_stack)?;
            let dr = differentiate_inner(rhs, var, symbols, expansion_stack)?;
            match op {
                BinaryOp::Add => Ok(Expr::add(dl, dr)),
                BinaryOp::Sub => Ok(Expr::sub(dl, dr)),
                BinaryOp::Mul => Ok(Expr::add(
                    Expr::mul(dl, rhs.clone()),
                    Expr::mul(lhs.clone(), dr),
                )),
                BinaryOp::Div => {
                    // (u/v)' = (u'v - uv') / v^2
                    let numerator =
                        Expr::sub(Expr::mul(dl, rhs.clone()), Expr::mul(lhs.clone(), dr));
                    let denominator = Expr::pow(rhs.clone(), Expr::constant(2.0));
                    Ok(Expr::div(numerator, denominator))
                }
                BinaryOp::Pow => {
                    if let Expr::Constant(exponent) = rhs.as_ref() {
                        // (u^c)' = c u^(c-1) u'
                        Ok(Expr::mul(
                            Expr::mul(
                                Expr::constant(*exponent),
                                Expr::pow(lhs.clone(), Expr::constant(exponent - 1.0)),
                            ),
                            dl,
                        ))
                    } else {
                        // (u^v)' = u^v (v' log u + v u' / u)
                        Ok(Expr::mul(
                            expr.clone(),
                            Expr::add(
                                Expr::mul(dr, Expr::log(lhs.clone())),
                                Expr::div(Expr::mul(rhs.clone(), dl), lhs.clone()),
                            ),
                        ))
                    }
                }
            }
        }
        Expr::Unary(op, child) => {
            let dc = differentiate_inner(child, var, symbols, expansion_stack)?;
            match op {
                UnaryOp::Neg => Ok(Expr::neg(dc)),
                UnaryOp::Log => Ok(Expr::div(dc, child.clone())),
                UnaryOp::Exp => Ok(Expr::mul(Expr::exp(child.clone()), dc)),
            }
        }
        Expr::Piecewise {
            scrutinee,
            branches,
        } => {
            // Differentiate branch bodies; the branch boundaries carry no
            // almost-everywhere derivative contribution.
            let branches = branches
                .iter()
                .map(|branch| {
                    Ok(Branch {
                        lower: branch.lower,
                        upper: branch.upper,
                        body: differentiate_inner(&branch.body, var, symbols, expansion_stack)?,
                    })
                })
                .collect::<GibbsResult<Vec<_>>>()?;
            Ok(Expr::piecewise(scrutinee.clone(), branches))
        }
    }
}
