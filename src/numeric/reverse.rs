use rustc_hash::FxHashMap;

use super::{EvalContext, Local, Order, local, lookup_mut};
use crate::Expr;
use crate::error::ExprError;

impl Expr {
    /// Reverse-mode AD: `df[i] += seed · ∂f/∂x[i]`.
    ///
    /// Reads the primals stored in `slot` by a preceding
    /// [`evaluate`](Self::evaluate) or [`ad_forward`](Self::ad_forward).
    /// Adjoints of shared nodes are summed before being pushed further down,
    /// so each node is processed once.
    ///
    /// # Errors
    /// - `BufferNotPopulated` if `slot` holds no primal for a node that needs one
    /// - `IndexOutOfRange` if a variable's index does not fit `df`
    pub fn ad_backward(
        &self,
        ctx: &EvalContext,
        slot: usize,
        seed: f64,
        df: &mut [f64],
    ) -> Result<(), ExprError> {
        let order = self.post_order();
        let mut adjoint: FxHashMap<u64, f64> = FxHashMap::default();
        adjoint.insert(self.id(), seed);

        for node in order.iter().rev() {
            let s = adjoint.remove(&node.id()).unwrap_or(0.0);
            if s == 0.0 {
                continue;
            }
            match local(node, ctx, slot, Order::First)? {
                Local::Leaf => {
                    if let Some(v) = node.as_variable() {
                        *lookup_mut(df, v.index)? += s;
                    }
                }
                Local::Unary { arg, d1, .. } => {
                    *adjoint.entry(arg.id()).or_default() += s * d1;
                }
                Local::Binary {
                    lhs,
                    rhs,
                    first: [fa, fb],
                    ..
                } => {
                    *adjoint.entry(lhs.id()).or_default() += s * fa;
                    *adjoint.entry(rhs.id()).or_default() += s * fb;
                }
            }
        }
        Ok(())
    }

    /// Second-order reverse sweep.
    ///
    /// With `u` the tangent stored by the preceding [`ad_forward`](Self::ad_forward)
    /// at `slot`, accumulates
    /// `df += seed1 · ∇f` and `ddf += seed1 · ∇²f u + seed2 · ∇f`.
    pub fn ad_backward2(
        &self,
        ctx: &EvalContext,
        slot: usize,
        seed1: f64,
        seed2: f64,
        df: &mut [f64],
        ddf: &mut [f64],
    ) -> Result<(), ExprError> {
        let order = self.post_order();
        let mut adjoint: FxHashMap<u64, (f64, f64)> = FxHashMap::default();
        adjoint.insert(self.id(), (seed1, seed2));

        for node in order.iter().rev() {
            let (s1, s2) = adjoint.remove(&node.id()).unwrap_or((0.0, 0.0));
            if s1 == 0.0 && s2 == 0.0 {
                continue;
            }
            match local(node, ctx, slot, Order::Second)? {
                Local::Leaf => {
                    if let Some(v) = node.as_variable() {
                        *lookup_mut(df, v.index)? += s1;
                        *lookup_mut(ddf, v.index)? += s2;
                    }
                }
                Local::Unary { arg, d1, d2 } => {
                    let ua = ctx.read_tangent(arg, slot)?;
                    let entry = adjoint.entry(arg.id()).or_default();
                    entry.0 += s1 * d1;
                    entry.1 += s2 * d1 + s1 * d2 * ua;
                }
                Local::Binary {
                    lhs,
                    rhs,
                    first: [fa, fb],
                    second: [faa, fab, fbb],
                } => {
                    let ua = ctx.read_tangent(lhs, slot)?;
                    let ub = ctx.read_tangent(rhs, slot)?;

                    let entry = adjoint.entry(lhs.id()).or_default();
                    entry.0 += s1 * fa;
                    entry.1 += s2 * fa + s1 * (faa * ua + fab * ub);

                    let entry = adjoint.entry(rhs.id()).or_default();
                    entry.0 += s1 * fb;
                    entry.1 += s2 * fb + s1 * (fab * ua + fbb * ub);
                }
            }
        }
        Ok(())
    }
}
