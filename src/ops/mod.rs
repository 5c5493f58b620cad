//! Operator catalogue.
//!
//! Every operator kind is one row of a static definition table holding its
//! numeric formulas, domain predicate, intrinsic classification and symbolic
//! derivative builders. The AD, classification and printing machinery is
//! written once against these rows.

mod binary;
mod unary;

pub use binary::{BinaryDefinition, BinaryOp};
pub use unary::{UnaryDefinition, UnaryOp};
