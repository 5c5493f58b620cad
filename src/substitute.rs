//! Variable substitution

use rustc_hash::FxHashMap;

use crate::node::{Expr, ExprKind};

impl Expr {
    /// Replace the variable at global `index` by `sub` everywhere.
    ///
    /// Returns a new DAG. Subtrees that do not contain the variable are
    /// returned as the same nodes, and a shared subtree is rebuilt once, so
    /// sharing survives the substitution. No simplification is applied.
    pub fn substitute(&self, index: usize, sub: &Expr) -> Expr {
        let mut memo: FxHashMap<u64, Expr> = FxHashMap::default();
        for node in self.post_order() {
            let rebuilt = match node.kind() {
                ExprKind::Variable(v) if v.index == index => sub.clone(),
                ExprKind::Variable(_) | ExprKind::Constant { .. } => node.clone(),
                ExprKind::Unary { op, arg } => {
                    let a = &memo[&arg.id()];
                    if a.ptr_eq(arg) {
                        node.clone()
                    } else {
                        Expr::unary(*op, a.clone())
                    }
                }
                ExprKind::PowerInt { arg, exponent } => {
                    let a = &memo[&arg.id()];
                    if a.ptr_eq(arg) {
                        node.clone()
                    } else {
                        Expr::power_int(a.clone(), *exponent)
                    }
                }
                ExprKind::External { function, arg } => {
                    let a = &memo[&arg.id()];
                    if a.ptr_eq(arg) {
                        node.clone()
                    } else {
                        Expr::external(function.clone(), a.clone())
                    }
                }
                ExprKind::Binary { op, lhs, rhs } => {
                    let (a, b) = (&memo[&lhs.id()], &memo[&rhs.id()]);
                    if a.ptr_eq(lhs) && b.ptr_eq(rhs) {
                        node.clone()
                    } else {
                        Expr::binary(*op, a.clone(), b.clone())
                    }
                }
            };
            memo.insert(node.id(), rebuilt);
        }
        memo.remove(&self.id()).unwrap_or_else(|| self.clone())
    }
}
