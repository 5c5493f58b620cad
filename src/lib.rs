//! Symbolic Expression DAGs with Automatic Differentiation
//!
//! Scalar expressions are built as directed acyclic graphs of operator nodes
//! that share common subexpressions. On top of the graph the crate offers:
//!
//! # Features
//! - Symbolic differentiation (`differentiate`) with a cached, idempotent
//!   per-node derivative table (`init_derivative`)
//! - Numeric evaluation and forward / reverse / second-order AD over
//!   slot-indexed buffers (`EvalContext`)
//! - Forward, reverse and symmetric (Hessian) AD producing derivative
//!   *expressions* for code generation
//! - Classification: dependency, linearity, polynomiality, rationality,
//!   monotonicity, curvature
//! - Substitution, printing, variable registration, pluggable evaluation
//!   strategies (`Evaluation`)
//!
//! # Usage Examples
//!
//! ## Building and evaluating
//! ```ignore
//! use symb_ad::{EvalContext, Expr, VariableType};
//!
//! let x = Expr::variable(VariableType::DifferentialState, 0, 0);
//! let f = x.powi(3) + x.sin();
//!
//! let mut ctx = EvalContext::new();
//! let (value, slope) = f.ad_forward(&mut ctx, 0, &[2.0], &[1.0])?;
//! ```
//!
//! ## Symbolic derivatives
//! ```ignore
//! let df = f.differentiate(0)?;   // 3 * x^2 + cos(x)
//! println!("{df}");
//! ```

mod classify;
mod derivative;
mod display;
mod error;
mod helpers;
mod index_list;
pub mod math;
mod node;
mod numeric;
pub mod ops;
mod substitute;
mod symbolic_ad;
pub mod traits;
pub mod visitor;

#[cfg(feature = "parallel")]
pub mod parallel;

#[cfg(test)]
mod tests;

// Re-export key types for easier usage
pub use classify::{Curvature, Monotonicity};
pub use error::ExprError;
pub use helpers::{gradient, gradient_at, hessian, hessian_at, jacobian};
pub use index_list::SymbolicIndexList;
pub use math::Dual;
pub use node::{
    Expr, ExprKind, ExternalFunction, NeutralElement, OperatorName, Variable, VariableId,
    VariableType, my_add, my_power, my_power_int, my_prod, my_quotient, my_sub, my_unary, neg,
};
pub use numeric::EvalContext;
pub use ops::{BinaryOp, UnaryOp};
pub use symbolic_ad::{IntermediateStates, SymmetricResult};
pub use traits::{EvalScalar, approx_eq};
pub use visitor::{Evaluation, ScalarEvaluation};
