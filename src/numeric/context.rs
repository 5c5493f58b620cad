use std::sync::{Arc, Weak};

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::Expr;
use crate::error::ExprError;
use crate::node::Node;

/// Primal and tangent results of one node, one entry per evaluation slot
#[derive(Debug, Clone)]
struct NodeBuffer {
    /// Dead once every handle to the node is dropped
    node: Weak<Node>,
    value: Vec<Option<f64>>,
    dvalue: Vec<Option<f64>>,
}

impl NodeBuffer {
    fn with_size(e: &Expr, size: usize) -> Self {
        NodeBuffer {
            node: Arc::downgrade(&e.0),
            value: vec![None; size],
            dvalue: vec![None; size],
        }
    }

    fn size(&self) -> usize {
        self.value.len()
    }

    /// Make `slot` addressable, keeping every stored slot
    fn reserve_slot(&mut self, node: u64, slot: usize) {
        let size = self.size();
        if slot < size {
            return;
        }
        let grown = (slot + 1).max(size + slot);
        trace!(node, slot, from = size, to = grown, "growing evaluation buffer");
        self.value.resize(grown, None);
        self.dvalue.resize(grown, None);
    }
}

/// Evaluation state for numeric passes over expression DAGs.
///
/// Holds, for every node touched so far, a primal buffer and a tangent
/// buffer indexed by evaluation slot. Slots let one DAG be evaluated at many
/// points (or along many directions) and have the reverse passes pick up the
/// matching primal later.
///
/// Buffers start at [`initial_slots`](Self::with_initial_slots) entries (1 by
/// default) and grow on demand to `max(slot + 1, size + slot)`.
///
/// The context does not keep nodes alive. Buffers of dropped nodes are
/// released by [`clear_buffer`](Self::clear_buffer); [`reset`](Self::reset)
/// releases everything.
///
/// # Example
/// ```ignore
/// let mut ctx = EvalContext::new().with_initial_slots(4);
/// let f = expr.evaluate(&mut ctx, 2, &x)?;
/// expr.ad_backward(&ctx, 2, 1.0, &mut grad)?;
/// ```
#[derive(Debug, Clone)]
pub struct EvalContext {
    buffers: FxHashMap<u64, NodeBuffer>,
    initial_slots: usize,
}

impl Default for EvalContext {
    fn default() -> Self {
        EvalContext::new()
    }
}

impl EvalContext {
    pub fn new() -> Self {
        EvalContext {
            buffers: FxHashMap::default(),
            initial_slots: 1,
        }
    }

    /// Size newly created buffers for `slots` evaluation points
    #[must_use]
    pub fn with_initial_slots(mut self, slots: usize) -> Self {
        self.initial_slots = slots.max(1);
        self
    }

    /// Current buffer size of a node (the initial size if never touched)
    pub fn buffer_size(&self, e: &Expr) -> usize {
        self.buffers
            .get(&e.id())
            .map_or(self.initial_slots, NodeBuffer::size)
    }

    /// Shrink every buffer back to one slot; slot 0 is kept.
    ///
    /// Buffers of nodes that no longer exist are dropped.
    pub fn clear_buffer(&mut self) {
        let before = self.buffers.len();
        self.buffers.retain(|_, b| b.node.strong_count() > 0);
        let pruned = before - self.buffers.len();
        if pruned > 0 {
            debug!(pruned, "dropped buffers of released nodes");
        }
        for buffer in self.buffers.values_mut() {
            buffer.value.truncate(1);
            buffer.dvalue.truncate(1);
        }
    }

    /// Drop every buffer
    pub fn reset(&mut self) {
        self.buffers.clear();
    }

    /// Number of nodes holding buffers
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Buffered primal of a node at `slot`, if a pass has stored one
    pub fn value(&self, e: &Expr, slot: usize) -> Option<f64> {
        self.buffers
            .get(&e.id())
            .and_then(|b| b.value.get(slot).copied().flatten())
    }

    /// Buffered first-order tangent of a node at `slot`
    pub fn tangent(&self, e: &Expr, slot: usize) -> Option<f64> {
        self.buffers
            .get(&e.id())
            .and_then(|b| b.dvalue.get(slot).copied().flatten())
    }

    fn buffer_mut(&mut self, e: &Expr, slot: usize) -> &mut NodeBuffer {
        let initial = self.initial_slots;
        let buffer = self
            .buffers
            .entry(e.id())
            .or_insert_with(|| NodeBuffer::with_size(e, initial));
        buffer.reserve_slot(e.id(), slot);
        buffer
    }

    pub(crate) fn store_value(&mut self, e: &Expr, slot: usize, v: f64) {
        self.buffer_mut(e, slot).value[slot] = Some(v);
    }

    pub(crate) fn store_tangent(&mut self, e: &Expr, slot: usize, d: f64) {
        self.buffer_mut(e, slot).dvalue[slot] = Some(d);
    }

    pub(crate) fn read_value(&self, e: &Expr, slot: usize) -> Result<f64, ExprError> {
        self.value(e, slot)
            .ok_or(ExprError::BufferNotPopulated { slot })
    }

    pub(crate) fn read_tangent(&self, e: &Expr, slot: usize) -> Result<f64, ExprError> {
        self.tangent(e, slot)
            .ok_or(ExprError::BufferNotPopulated { slot })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_rule() {
        let e = Expr::constant(2.0);
        let mut ctx = EvalContext::new();
        assert_eq!(ctx.buffer_size(&e), 1);

        ctx.store_value(&e, 0, 1.5);
        assert_eq!(ctx.buffer_size(&e), 1);

        // max(5 + 1, 1 + 5)
        ctx.store_value(&e, 5, 2.5);
        assert_eq!(ctx.buffer_size(&e), 6);

        // max(7 + 1, 6 + 7)
        ctx.store_value(&e, 7, 3.5);
        assert_eq!(ctx.buffer_size(&e), 13);

        assert_eq!(ctx.value(&e, 0), Some(1.5));
        assert_eq!(ctx.value(&e, 5), Some(2.5));
        assert_eq!(ctx.value(&e, 3), None);
    }

    #[test]
    fn test_clear_buffer_is_idempotent() {
        let e = Expr::constant(2.0);
        let mut ctx = EvalContext::new();
        ctx.store_value(&e, 0, 1.0);
        ctx.store_value(&e, 4, 1.0);
        ctx.clear_buffer();
        assert_eq!(ctx.buffer_size(&e), 1);
        ctx.clear_buffer();
        assert_eq!(ctx.buffer_size(&e), 1);
        assert_eq!(ctx.value(&e, 0), Some(1.0));
        assert_eq!(ctx.value(&e, 4), None);
    }

    #[test]
    fn test_clear_buffer_drops_released_nodes() {
        let x = Expr::variable(crate::VariableType::DifferentialState, 0, 0);
        let kept = x.sin();
        let mut ctx = EvalContext::new();
        kept.evaluate(&mut ctx, 0, &[0.5]).unwrap();
        {
            let scratch = x.cos() * 2.0;
            scratch.evaluate(&mut ctx, 3, &[0.5]).unwrap();
        }
        // x, sin, cos, 2 and the product
        assert_eq!(ctx.len(), 5);

        ctx.clear_buffer();
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.value(&kept, 0), Some(0.5_f64.sin()));
        assert_eq!(ctx.buffer_size(&x), 1);

        ctx.reset();
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_initial_slots() {
        let e = Expr::one();
        let mut ctx = EvalContext::new().with_initial_slots(8);
        assert_eq!(ctx.buffer_size(&e), 8);
        ctx.store_tangent(&e, 3, 0.5);
        assert_eq!(ctx.buffer_size(&e), 8);
        assert_eq!(ctx.tangent(&e, 3), Some(0.5));
        assert_eq!(
            ctx.read_value(&e, 3),
            Err(ExprError::BufferNotPopulated { slot: 3 })
        );
    }
}
