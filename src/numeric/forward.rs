use rustc_hash::FxHashMap;

use super::{EvalContext, Local, Order, local, lookup, primal};
use crate::Expr;
use crate::error::ExprError;

impl Expr {
    /// Evaluate at `x`, storing every node's primal in `slot`.
    ///
    /// # Errors
    /// - `Domain` if an operator is evaluated outside its domain
    /// - `IndexOutOfRange` if a variable's index does not fit `x`
    pub fn evaluate(&self, ctx: &mut EvalContext, slot: usize, x: &[f64]) -> Result<f64, ExprError> {
        for node in self.post_order() {
            let v = primal(&node, ctx, slot, x)?;
            ctx.store_value(&node, slot, v);
        }
        ctx.read_value(self, slot)
    }

    /// Evaluate at several points, point `k` going to slot `k`
    pub fn evaluate_points(
        &self,
        ctx: &mut EvalContext,
        points: &[Vec<f64>],
    ) -> Result<Vec<f64>, ExprError> {
        let order = self.post_order();
        points
            .iter()
            .enumerate()
            .map(|(slot, x)| {
                for node in &order {
                    let v = primal(node, ctx, slot, x)?;
                    ctx.store_value(node, slot, v);
                }
                ctx.read_value(self, slot)
            })
            .collect()
    }

    /// Forward-mode AD at `x` along `seed`: returns `(f, ∇f·seed)`.
    ///
    /// Primals and tangents of every node are stored in `slot`; the tangents
    /// are the direction later used by [`ad_forward2`](Self::ad_forward2) and
    /// [`ad_backward2`](Self::ad_backward2).
    pub fn ad_forward(
        &self,
        ctx: &mut EvalContext,
        slot: usize,
        x: &[f64],
        seed: &[f64],
    ) -> Result<(f64, f64), ExprError> {
        for node in self.post_order() {
            let v = primal(&node, ctx, slot, x)?;
            ctx.store_value(&node, slot, v);
            let d = tangent(&node, ctx, slot, seed)?;
            ctx.store_tangent(&node, slot, d);
        }
        Ok((ctx.read_value(self, slot)?, ctx.read_tangent(self, slot)?))
    }

    /// Forward-mode AD along `seed` at the primal already stored in `slot`
    ///
    /// # Errors
    /// `BufferNotPopulated` if no evaluation has filled `slot` for this DAG.
    pub fn ad_forward_buffered(
        &self,
        ctx: &mut EvalContext,
        slot: usize,
        seed: &[f64],
    ) -> Result<f64, ExprError> {
        for node in self.post_order() {
            ctx.read_value(&node, slot)?;
            let d = tangent(&node, ctx, slot, seed)?;
            ctx.store_tangent(&node, slot, d);
        }
        ctx.read_tangent(self, slot)
    }

    /// Second-order forward sweep along `seed` with second-order seed `dseed`.
    ///
    /// With `u` the tangent stored by the preceding [`ad_forward`](Self::ad_forward)
    /// at `slot`, returns `(∇f·seed, uᵀ∇²f·seed + ∇f·dseed)`.
    pub fn ad_forward2(
        &self,
        ctx: &EvalContext,
        slot: usize,
        seed: &[f64],
        dseed: &[f64],
    ) -> Result<(f64, f64), ExprError> {
        let mut sweep: FxHashMap<u64, (f64, f64)> = FxHashMap::default();
        for node in self.post_order() {
            let pair = match local(&node, ctx, slot, Order::Second)? {
                Local::Leaf => match node.as_variable() {
                    Some(v) => (lookup(seed, v.index)?, lookup(dseed, v.index)?),
                    None => (0.0, 0.0),
                },
                Local::Unary { arg, d1, d2 } => {
                    let (da, dda) = sweep[&arg.id()];
                    let ua = ctx.read_tangent(arg, slot)?;
                    (d1 * da, d1 * dda + d2 * ua * da)
                }
                Local::Binary {
                    lhs,
                    rhs,
                    first: [fa, fb],
                    second: [faa, fab, fbb],
                } => {
                    let (da, dda) = sweep[&lhs.id()];
                    let (db, ddb) = sweep[&rhs.id()];
                    let ua = ctx.read_tangent(lhs, slot)?;
                    let ub = ctx.read_tangent(rhs, slot)?;
                    (
                        fa * da + fb * db,
                        fa * dda
                            + fb * ddb
                            + faa * ua * da
                            + fab * (ua * db + ub * da)
                            + fbb * ub * db,
                    )
                }
            };
            sweep.insert(node.id(), pair);
        }
        Ok(sweep[&self.id()])
    }
}

/// First-order tangent of one node from its children's stored tangents
fn tangent(e: &Expr, ctx: &EvalContext, slot: usize, seed: &[f64]) -> Result<f64, ExprError> {
    Ok(match local(e, ctx, slot, Order::First)? {
        Local::Leaf => match e.as_variable() {
            Some(v) => lookup(seed, v.index)?,
            None => 0.0,
        },
        Local::Unary { arg, d1, .. } => d1 * ctx.read_tangent(arg, slot)?,
        Local::Binary {
            lhs,
            rhs,
            first: [fa, fb],
            ..
        } => fa * ctx.read_tangent(lhs, slot)? + fb * ctx.read_tangent(rhs, slot)?,
    })
}
