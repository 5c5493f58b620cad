//! Symbolic derivative cache and `differentiate`.
//!
//! Every non-leaf node can carry its local partial derivatives as
//! expressions: `f'(arg)` and `f''(arg)` for unary-like nodes, the two first
//! and three second partials for binary nodes. These are computed with
//! respect to the node's own arguments; the chain rule is applied by the
//! callers (`differentiate`, the symbolic AD sweeps).
//!
//! # Population
//! [`Expr::init_derivative`] fills the cache for a whole DAG in two phases:
//! 1. collect the distinct nodes bottom-up and build the partials of every
//!    node that has none yet
//! 2. attach them
//!
//! Nothing is attached if phase 1 fails. Afterwards every node is marked
//! ready, so a second call returns at once and the cached expressions stay
//! pointer-identical.

use std::sync::atomic::Ordering;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::ExprError;
use crate::node::{Expr, ExprKind, my_add, my_power, my_power_int, my_prod};

/// Local partial derivatives of one node
#[derive(Clone)]
pub(crate) enum Partials {
    /// Variables and constants have no arguments
    Leaf,
    Unary {
        first: Expr,
        second: Expr,
    },
    /// `[∂f/∂a, ∂f/∂b]` and `[∂²f/∂a², ∂²f/∂a∂b, ∂²f/∂b²]`
    Binary {
        first: [Expr; 2],
        second: [Expr; 3],
    },
}

/// `arg^(n - k)`; a real power once the exponent leaves `i32`
fn shifted_power(arg: &Expr, n: i32, k: i32) -> Expr {
    match n.checked_sub(k) {
        Some(m) => my_power_int(arg.clone(), m),
        None => my_power(arg.clone(), Expr::constant(f64::from(n) - f64::from(k))),
    }
}

fn build_partials(e: &Expr) -> Result<Partials, ExprError> {
    Ok(match e.kind() {
        ExprKind::Variable(_) | ExprKind::Constant { .. } => Partials::Leaf,
        ExprKind::Unary { op, arg } => {
            let def = op.definition();
            Partials::Unary {
                first: (def.sym_d1)(arg),
                second: (def.sym_d2)(arg),
            }
        }
        ExprKind::PowerInt { arg, exponent } => {
            let n = *exponent;
            let n1 = f64::from(n);
            Partials::Unary {
                first: my_prod(Expr::constant(n1), shifted_power(arg, n, 1)),
                second: my_prod(Expr::constant(n1 * (n1 - 1.0)), shifted_power(arg, n, 2)),
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let def = op.definition();
            Partials::Binary {
                first: (def.sym_partials)(lhs, rhs),
                second: (def.sym_second)(lhs, rhs),
            }
        }
        ExprKind::External { function, .. } => {
            return Err(ExprError::NotSymbolic {
                name: function.name.clone(),
            });
        }
    })
}

impl Expr {
    /// Build and attach the local partials of every node in the DAG.
    ///
    /// Idempotent: a DAG that was initialized before returns at once, and
    /// subtrees initialized by an earlier call are not walked again.
    pub fn init_derivative(&self) -> Result<(), ExprError> {
        if self.0.derivative_ready.load(Ordering::Acquire) {
            return Ok(());
        }
        let pending = self.pending_derivatives();

        let built = pending
            .iter()
            .filter(|n| n.0.partials.get().is_none())
            .map(|n| build_partials(n).map(|p| (n, p)))
            .collect::<Result<Vec<_>, _>>()?;
        let count = built.len();

        for (node, partials) in built {
            // A concurrent initializer may have won; its partials are equivalent
            let _ = node.0.partials.set(partials);
        }
        for node in &pending {
            node.0.derivative_ready.store(true, Ordering::Release);
        }
        if count > 0 {
            debug!(count, "attached derivative caches");
        }
        Ok(())
    }

    /// Distinct nodes not yet marked ready, children before parents.
    /// Marked subtrees are skipped whole.
    fn pending_derivatives(&self) -> Vec<Expr> {
        fn visit(e: &Expr, seen: &mut FxHashSet<u64>, out: &mut Vec<Expr>) {
            if e.0.derivative_ready.load(Ordering::Acquire) || !seen.insert(e.id()) {
                return;
            }
            for child in e.children() {
                visit(child, seen, out);
            }
            out.push(e.clone());
        }

        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        visit(self, &mut seen, &mut out);
        out
    }

    /// This node's partials, building them on first use
    pub(crate) fn partials(&self) -> Result<&Partials, ExprError> {
        if let Some(p) = self.0.partials.get() {
            return Ok(p);
        }
        let built = build_partials(self)?;
        Ok(self.0.partials.get_or_init(|| built))
    }

    /// `f'(arg)` of a unary-like node (`None` for leaves and binary nodes)
    pub fn derivative(&self) -> Result<Option<Expr>, ExprError> {
        self.init_derivative()?;
        Ok(match self.partials()? {
            Partials::Unary { first, .. } => Some(first.clone()),
            _ => None,
        })
    }

    /// `f''(arg)` of a unary-like node (`None` for leaves and binary nodes)
    pub fn derivative2(&self) -> Result<Option<Expr>, ExprError> {
        self.init_derivative()?;
        Ok(match self.partials()? {
            Partials::Unary { second, .. } => Some(second.clone()),
            _ => None,
        })
    }

    /// Symbolic derivative with respect to the variable at global `index`.
    ///
    /// Returns a new DAG. Shared subexpressions are differentiated once, and
    /// algebraically zero results collapse to the zero constant.
    ///
    /// # Errors
    /// `NotSymbolic` if the DAG contains an external function.
    ///
    /// # Example
    /// ```ignore
    /// let x = Expr::variable(VariableType::DifferentialState, 0, 0);
    /// let d = x.powi(3).differentiate(0)?; // 3 * x^2
    /// ```
    pub fn differentiate(&self, index: usize) -> Result<Expr, ExprError> {
        let mut memo = FxHashMap::default();
        differentiate_rec(self, index, &mut memo)
    }
}

fn differentiate_rec(
    e: &Expr,
    index: usize,
    memo: &mut FxHashMap<u64, Expr>,
) -> Result<Expr, ExprError> {
    if let Some(hit) = memo.get(&e.id()) {
        return Ok(hit.clone());
    }

    let result = match e.kind() {
        ExprKind::Variable(v) => {
            if v.index == index {
                Expr::one()
            } else {
                Expr::zero()
            }
        }
        ExprKind::Constant { .. } => Expr::zero(),
        ExprKind::PowerInt { exponent: 0, .. } => Expr::zero(),
        ExprKind::External { function, .. } => {
            return Err(ExprError::NotSymbolic {
                name: function.name.clone(),
            });
        }
        ExprKind::Unary { arg, .. } | ExprKind::PowerInt { arg, .. } => {
            let darg = differentiate_rec(arg, index, memo)?;
            if darg.as_constant() == Some(0.0) {
                Expr::zero()
            } else {
                match e.partials()? {
                    Partials::Unary { first, .. } => my_prod(first.clone(), darg),
                    _ => unreachable!("unary-like node with non-unary partials"),
                }
            }
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            let da = differentiate_rec(lhs, index, memo)?;
            let db = differentiate_rec(rhs, index, memo)?;
            if da.as_constant() == Some(0.0) && db.as_constant() == Some(0.0) {
                Expr::zero()
            } else {
                match e.partials()? {
                    Partials::Binary { first: [fa, fb], .. } => {
                        my_add(my_prod(fa.clone(), da), my_prod(fb.clone(), db))
                    }
                    _ => unreachable!("binary node with non-binary partials"),
                }
            }
        }
    };

    memo.insert(e.id(), result.clone());
    Ok(result)
}
