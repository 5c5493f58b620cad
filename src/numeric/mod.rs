//! Numeric evaluation and automatic differentiation.
//!
//! All passes run over an [`EvalContext`] that owns per-node, per-slot
//! buffers:
//!
//! - [`Expr::evaluate`] stores the primal of every node
//! - [`Expr::ad_forward`] stores primals and first-order tangents
//! - [`Expr::ad_forward_buffered`] refreshes tangents at already stored primals
//! - [`Expr::ad_backward`] accumulates one adjoint sweep into a gradient
//! - [`Expr::ad_forward2`] / [`Expr::ad_backward2`] add the second-order
//!   terms along the tangent stored by the preceding `ad_forward`
//!
//! Each pass visits every distinct node once: forward passes walk the DAG
//! children-first, reverse passes walk it parents-first and sum the adjoints
//! of shared nodes.
//!
//! Every operator validates its domain and the finiteness of its result and
//! local partials, so a NaN never travels silently through a pass.

mod context;
mod forward;
mod reverse;

pub use context::EvalContext;

use crate::Expr;
use crate::error::ExprError;
use crate::node::ExprKind;

/// How much local derivative information a pass needs
#[derive(Clone, Copy, PartialEq, Eq)]
enum Order {
    First,
    Second,
}

/// Numeric local partials of one node at the buffered primal point
enum Local<'e> {
    Leaf,
    Unary {
        arg: &'e Expr,
        d1: f64,
        d2: f64,
    },
    Binary {
        lhs: &'e Expr,
        rhs: &'e Expr,
        first: [f64; 2],
        second: [f64; 3],
    },
}

/// `a^(n - k)`, falling back to a real power when the exponent leaves `i32`
fn powi_shifted(a: f64, n: i32, k: i32) -> f64 {
    match n.checked_sub(k) {
        Some(m) => a.powi(m),
        None => a.powf(f64::from(n) - f64::from(k)),
    }
}

fn finite(op: &'static str, args: &[f64], v: f64) -> Result<f64, ExprError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(ExprError::domain(op, args))
    }
}

/// Primal of one node, reading its children's primals from `ctx`
fn primal(e: &Expr, ctx: &EvalContext, slot: usize, x: &[f64]) -> Result<f64, ExprError> {
    match e.kind() {
        ExprKind::Variable(v) => lookup(x, v.index),
        ExprKind::Constant { value, .. } => Ok(*value),
        ExprKind::Unary { op, arg } => {
            let a = ctx.read_value(arg, slot)?;
            let def = op.definition();
            if !(def.domain)(a) {
                return Err(ExprError::domain(def.name, &[a]));
            }
            finite(def.name, &[a], (def.eval)(a))
        }
        ExprKind::PowerInt { arg, exponent } => {
            let a = ctx.read_value(arg, slot)?;
            if *exponent == 0 {
                return Ok(1.0);
            }
            finite("powint", &[a], a.powi(*exponent))
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let a = ctx.read_value(lhs, slot)?;
            let b = ctx.read_value(rhs, slot)?;
            let def = op.definition();
            if !(def.domain)(a, b) {
                return Err(ExprError::domain(def.name, &[a, b]));
            }
            finite(def.name, &[a, b], (def.eval)(a, b))
        }
        ExprKind::External { function, arg } => {
            let a = ctx.read_value(arg, slot)?;
            finite("external", &[a], (function.eval)(a))
        }
    }
}

/// Local partials of one node at the primal point buffered in `slot`.
///
/// Second-order entries are only computed (and checked) for `Order::Second`
/// and are zero otherwise.
fn local<'e>(
    e: &'e Expr,
    ctx: &EvalContext,
    slot: usize,
    order: Order,
) -> Result<Local<'e>, ExprError> {
    let second = order == Order::Second;
    Ok(match e.kind() {
        ExprKind::Variable(_) | ExprKind::Constant { .. } => Local::Leaf,
        ExprKind::Unary { op, arg } => {
            let a = ctx.read_value(arg, slot)?;
            let def = op.definition();
            let d1 = finite(def.name, &[a], (def.d1)(a))?;
            let d2 = if second {
                finite(def.name, &[a], (def.d2)(a))?
            } else {
                0.0
            };
            Local::Unary { arg, d1, d2 }
        }
        ExprKind::PowerInt { arg, exponent } => {
            let a = ctx.read_value(arg, slot)?;
            let n = *exponent;
            let (d1, d2) = match n {
                0 => (0.0, 0.0),
                1 => (1.0, 0.0),
                _ => {
                    let nf = f64::from(n);
                    let d1 = finite("powint", &[a], nf * powi_shifted(a, n, 1))?;
                    let d2 = if second {
                        finite("powint", &[a], nf * (nf - 1.0) * powi_shifted(a, n, 2))?
                    } else {
                        0.0
                    };
                    (d1, d2)
                }
            };
            Local::Unary { arg, d1, d2 }
        }
        ExprKind::External { function, arg } => {
            let a = ctx.read_value(arg, slot)?;
            let d1 = finite("external", &[a], (function.d1)(a))?;
            let d2 = if second {
                finite("external", &[a], (function.d2)(a))?
            } else {
                0.0
            };
            Local::Unary { arg, d1, d2 }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let a = ctx.read_value(lhs, slot)?;
            let b = ctx.read_value(rhs, slot)?;
            let def = op.definition();
            let first = (def.partials)(a, b);
            if !first.iter().all(|v| v.is_finite()) {
                return Err(ExprError::domain(def.name, &[a, b]));
            }
            let second = if second {
                let s = (def.second)(a, b);
                if !s.iter().all(|v| v.is_finite()) {
                    return Err(ExprError::domain(def.name, &[a, b]));
                }
                s
            } else {
                [0.0; 3]
            };
            Local::Binary {
                lhs,
                rhs,
                first,
                second,
            }
        }
    })
}

fn lookup(v: &[f64], index: usize) -> Result<f64, ExprError> {
    v.get(index).copied().ok_or(ExprError::IndexOutOfRange {
        index,
        len: v.len(),
    })
}

fn lookup_mut(v: &mut [f64], index: usize) -> Result<&mut f64, ExprError> {
    let len = v.len();
    v.get_mut(index)
        .ok_or(ExprError::IndexOutOfRange { index, len })
}
