//! Algebraic simplification: constant folding, identity elimination, and
//! flattening of nested same-operator chains.

use super::{BinaryOp, Branch, Expr, UnaryOp};
use std::sync::Arc;

/// Simplify a tree. The result evaluates identically to the input wherever
/// the input is defined.
pub fn simplify(expr: &Arc<Expr>) -> Arc<Expr> {
    match expr.as_ref() {
        Expr::Constant(_) | Expr::Variable(_) | Expr::SymbolRef(_) | Expr::StateVariable(_) => {
            expr.clone()
        }
        Expr::Binary(BinaryOp::Add, _, _) => simplify_sum(expr),
        Expr::Binary(BinaryOp::Mul, _, _) => simplify_product(expr),
        Expr::Binary(op, lhs, rhs) => {
            let lhs = simplify(lhs);
            let rhs = simplify(rhs);
            simplify_binary(*op, lhs, rhs)
        }
        Expr::Unary(op, child) => {
            let child = simplify(child);
            match (op, child.as_ref()) {
                (UnaryOp::Neg, Expr::Constant(c)) => Expr::constant(-c),
                (UnaryOp::Neg, Expr::Unary(UnaryOp::Neg, inner)) => inner.clone(),
                (UnaryOp::Log, Expr::Constant(c)) if *c == 1.0 => Expr::constant(0.0),
                (UnaryOp::Log, Expr::Constant(c)) if *c > 0.0 => Expr::constant(c.ln()),
                (UnaryOp::Exp, Expr::Constant(c)) => Expr::constant(c.exp()),
                _ => Arc::new(Expr::Unary(*op, child.clone())),
            }
        }
        Expr::Piecewise {
            scrutinee,
            branches,
        } => {
            let scrutinee = simplify(scrutinee);
            let branches: Vec<Branch> = branches
                .iter()
                .map(|branch| Branch {
                    lower: branch.lower,
                    upper: branch.upper,
                    body: simplify(&branch.body),
                })
                .collect();
            if branches
                .iter()
                .all(|branch| matches!(branch.body.as_ref(), Expr::Constant(c) if *c == 0.0))
            {
                Expr::constant(0.0)
            } else {
                Expr::piecewise(scrutinee, branches)
            }
        }
    }
}

/// True iff the tree simplifies to a numeric zero.
pub fn is_zero_tree(expr: &Arc<Expr>) -> bool {
    matches!(simplify(expr).as_ref(), Expr::Constant(c) if *c == 0.0)
}

fn simplify_binary(op: BinaryOp, lhs: Arc<Expr>, rhs: Arc<Expr>) -> Arc<Expr> {
    if let (Expr::Constant(a), Expr::Constant(b)) = (lhs.as_ref(), rhs.as_ref()) {
        let folded = match op {
            BinaryOp::Add => Some(a + b),
            BinaryOp::Sub => Some(a - b),
            BinaryOp::Mul => Some(a * b),
            BinaryOp::Div => (*b != 0.0).then(|| a / b),
            BinaryOp::Pow => {
                let value = a.powf(*b);
                value.is_finite().then_some(value)
            }
        };
        if let Some(value) = folded {
            return Expr::constant(value);
        }
    }
    let lhs_is = |value: f64| matches!(lhs.as_ref(), Expr::Constant(c) if *c == value);
    let rhs_is = |value: f64| matches!(rhs.as_ref(), Expr::Constant(c) if *c == value);
    match op {
        BinaryOp::Sub if rhs_is(0.0) => lhs,
        BinaryOp::Sub if lhs_is(0.0) => Expr::neg(rhs),
        BinaryOp::Div if rhs_is(1.0) => lhs,
        BinaryOp::Div if lhs_is(0.0) => Expr::constant(0.0),
        BinaryOp::Pow if rhs_is(1.0) => lhs,
        BinaryOp::Pow if rhs_is(0.0) => Expr::constant(1.0),
        _ => Arc::new(Expr::Binary(op, lhs, rhs)),
    }
}

/// Flatten a nested `+` chain, fold its constant terms, and rebuild.
fn simplify_sum(expr: &Arc<Expr>) -> Arc<Expr> {
    let mut terms = Vec::new();
    collect_chain(expr, BinaryOp::Add, &mut terms);
    let mut constant = 0.0;
    let mut rest = Vec::new();
    for term in terms {
        match term.as_ref() {
            Expr::Constant(c) => constant += c,
            _ => rest.push(term),
        }
    }
    if constant != 0.0 || rest.is_empty() {
        rest.push(Expr::constant(constant));
    }
    Expr::sum(rest)
}

/// Flatten a nested `×` chain, fold its constant factors, and rebuild.
/// A zero factor collapses the whole product.
fn simplify_product(expr: &Arc<Expr>) -> Arc<Expr> {
    let mut factors = Vec::new();
    collect_chain(expr, BinaryOp::Mul, &mut factors);
    let mut constant = 1.0;
    let mut rest = Vec::new();
    for factor in factors {
        match factor.as_ref() {
            Expr::Constant(c) => constant *= c,
            _ => rest.push(factor),
        }
    }
    if constant == 0.0 {
        return Expr::constant(0.0);
    }
    if constant != 1.0 || rest.is_empty() {
        rest.insert(0, Expr::constant(constant));
    }
    Expr::product(rest)
}

fn collect_chain(expr: &Arc<Expr>, op: BinaryOp, out: &mut Vec<Arc<Expr>>) {
    match expr.as_ref() {
        Expr::Binary(node_op, lhs, rhs) if *node_op == op => {
            collect_chain(lhs, op, out);
            collect_chain(rhs, op, out);
        }
        _ => out.push(simplify(expr)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identities_collapse() {
        let y = Expr::variable("Y");
        assert_eq!(
            simplify(&Expr::add(y.clone(), Expr::constant(0.0))),
            y.clone()
        );
        assert_eq!(
            simplify(&Expr::mul(y.clone(), Expr::constant(1.0))),
            y.clone()
        );
        assert!(is_zero_tree(&Expr::mul(y.clone(), Expr::constant(0.0))));
        assert_eq!(
            simplify(&Expr::pow(y.clone(), Expr::constant(1.0))),
            y.clone()
        );
        assert!(is_zero_tree(&Expr::log(Expr::constant(1.0))));
        assert!(is_zero_tree(&Expr::div(Expr::constant(0.0), y)));
    }

    #[test]
    fn nested_chains_flatten_and_fold() {
        // (Y + 1) + (2 + Y) -> Y + Y + 3
        let y = Expr::variable("Y");
        let tree = Expr::add(
            Expr::add(y.clone(), Expr::constant(1.0)),
            Expr::add(Expr::constant(2.0), y.clone()),
        );
        let expected = Expr::sum([y.clone(), y.clone(), Expr::constant(3.0)]);
        assert_eq!(simplify(&tree), expected);

        // 2 * (Y * 3) -> 6 * Y
        let tree = Expr::mul(
            Expr::constant(2.0),
            Expr::mul(y.clone(), Expr::constant(3.0)),
        );
        let expected = Expr::product([Expr::constant(6.0), y]);
        assert_eq!(simplify(&tree), expected);
    }

    #[test]
    fn zero_tree_detection_through_structure() {
        let y = Expr::variable("Y");
        // (0 * Y) + (1 - 1)
        let tree = Expr::add(
            Expr::mul(Expr::constant(0.0), y),
            Expr::sub(Expr::constant(1.0), Expr::constant(1.0)),
        );
        assert!(is_zero_tree(&tree));
    }
}
