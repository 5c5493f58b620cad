use thiserror::Error;

/// Errors raised while evaluating or differentiating an expression DAG
///
/// Every operation propagates these unchanged up the recursion: a composite
/// expression fails as soon as any of its sub-computations fails.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    /// Numeric evaluation left an operator's domain (e.g. `asin(2)`, `log(-1)`,
    /// division by zero) or produced a non-finite value.
    #[error("{op} is undefined at {args:?}")]
    Domain { op: &'static str, args: Vec<f64> },

    /// A symbolic operation reached a node that only has a numeric implementation.
    #[error("'{name}' has no symbolic representation")]
    NotSymbolic { name: String },

    /// A variable's global index does not fit the supplied value/seed vector.
    #[error("variable index {index} is out of range for a vector of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A buffered pass read a slot that no evaluation has populated yet.
    #[error("evaluation slot {slot} has not been populated by a forward pass")]
    BufferNotPopulated { slot: usize },

    /// Seed or result arrays disagree with the number of directions.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

impl ExprError {
    pub(crate) fn domain(op: &'static str, args: &[f64]) -> Self {
        tracing::debug!(op, ?args, "domain error");
        ExprError::Domain {
            op,
            args: args.to_vec(),
        }
    }

    /// True for the NaN-class failure (as opposed to a usage error)
    pub fn is_domain(&self) -> bool {
        matches!(self, ExprError::Domain { .. })
    }
}
