//! Scalar types for the template evaluator

pub mod dual;

pub use dual::Dual;
