//! Alternative evaluation strategies
//!
//! An [`Evaluation`] receives one call per node, bottom-up, with the results
//! already computed for the node's arguments. Implementing it is enough to
//! add a new backend (code emission, interval arithmetic, evaluation in a
//! different scalar type) without touching the node types.
//!
//! [`ScalarEvaluation`] is the template evaluator over any [`EvalScalar`];
//! with [`Dual`](crate::Dual) it gives forward-mode derivatives.

use rustc_hash::FxHashMap;

use crate::error::ExprError;
use crate::node::{Expr, ExprKind, ExternalFunction, Variable};
use crate::ops::{BinaryOp, UnaryOp};
use crate::traits::EvalScalar;

/// One method per operator kind
///
/// # Example
/// ```ignore
/// use symb_ad::{Evaluation, ExprError, Variable};
///
/// struct Counter;
///
/// impl Evaluation for Counter {
///     type Output = usize;
///     fn variable(&mut self, _v: &Variable) -> Result<usize, ExprError> { Ok(1) }
///     fn constant(&mut self, _c: f64) -> Result<usize, ExprError> { Ok(1) }
///     // ...
/// }
/// ```
pub trait Evaluation {
    type Output: Clone;

    fn variable(&mut self, v: &Variable) -> Result<Self::Output, ExprError>;
    fn constant(&mut self, value: f64) -> Result<Self::Output, ExprError>;

    fn sin(&mut self, arg: Self::Output) -> Result<Self::Output, ExprError>;
    fn cos(&mut self, arg: Self::Output) -> Result<Self::Output, ExprError>;
    fn tan(&mut self, arg: Self::Output) -> Result<Self::Output, ExprError>;
    fn asin(&mut self, arg: Self::Output) -> Result<Self::Output, ExprError>;
    fn acos(&mut self, arg: Self::Output) -> Result<Self::Output, ExprError>;
    fn atan(&mut self, arg: Self::Output) -> Result<Self::Output, ExprError>;
    fn exp(&mut self, arg: Self::Output) -> Result<Self::Output, ExprError>;
    fn log(&mut self, arg: Self::Output) -> Result<Self::Output, ExprError>;
    fn sqrt(&mut self, arg: Self::Output) -> Result<Self::Output, ExprError>;

    fn power_int(&mut self, arg: Self::Output, exponent: i32) -> Result<Self::Output, ExprError>;

    fn add(&mut self, a: Self::Output, b: Self::Output) -> Result<Self::Output, ExprError>;
    fn sub(&mut self, a: Self::Output, b: Self::Output) -> Result<Self::Output, ExprError>;
    fn mul(&mut self, a: Self::Output, b: Self::Output) -> Result<Self::Output, ExprError>;
    fn div(&mut self, a: Self::Output, b: Self::Output) -> Result<Self::Output, ExprError>;
    fn pow(&mut self, a: Self::Output, b: Self::Output) -> Result<Self::Output, ExprError>;

    /// Opaque numeric function; strategies without a numeric meaning reject it
    fn external(
        &mut self,
        function: &ExternalFunction,
        arg: Self::Output,
    ) -> Result<Self::Output, ExprError> {
        let _ = arg;
        Err(ExprError::NotSymbolic {
            name: function.name.clone(),
        })
    }
}

impl Expr {
    /// Run an evaluation strategy over the DAG.
    ///
    /// Shared subexpressions are handed to the strategy once; their result
    /// is reused by every parent.
    pub fn accept<E: Evaluation>(&self, eval: &mut E) -> Result<E::Output, ExprError> {
        let mut done: FxHashMap<u64, E::Output> = FxHashMap::default();
        for node in self.post_order() {
            let out = match node.kind() {
                ExprKind::Variable(v) => eval.variable(v)?,
                ExprKind::Constant { value, .. } => eval.constant(*value)?,
                ExprKind::Unary { op, arg } => {
                    let a = done[&arg.id()].clone();
                    match op {
                        UnaryOp::Sin => eval.sin(a)?,
                        UnaryOp::Cos => eval.cos(a)?,
                        UnaryOp::Tan => eval.tan(a)?,
                        UnaryOp::Asin => eval.asin(a)?,
                        UnaryOp::Acos => eval.acos(a)?,
                        UnaryOp::Atan => eval.atan(a)?,
                        UnaryOp::Exp => eval.exp(a)?,
                        UnaryOp::Log => eval.log(a)?,
                        UnaryOp::Sqrt => eval.sqrt(a)?,
                    }
                }
                ExprKind::PowerInt { arg, exponent } => {
                    eval.power_int(done[&arg.id()].clone(), *exponent)?
                }
                ExprKind::Binary { op, lhs, rhs } => {
                    let a = done[&lhs.id()].clone();
                    let b = done[&rhs.id()].clone();
                    match op {
                        BinaryOp::Add => eval.add(a, b)?,
                        BinaryOp::Sub => eval.sub(a, b)?,
                        BinaryOp::Mul => eval.mul(a, b)?,
                        BinaryOp::Div => eval.div(a, b)?,
                        BinaryOp::Pow => eval.pow(a, b)?,
                    }
                }
                ExprKind::External { function, arg } => {
                    eval.external(function, done[&arg.id()].clone())?
                }
            };
            done.insert(node.id(), out);
        }
        Ok(done[&self.id()].clone())
    }
}

// =============================================================================
// TEMPLATE SCALAR EVALUATION
// =============================================================================

/// Evaluates an expression in any [`EvalScalar`] type.
///
/// Domain checks are made on the primal part, so `ScalarEvaluation<Dual<f64>>`
/// fails exactly where the `f64` evaluation does. External functions only
/// have `f64` implementations and are rejected.
pub struct ScalarEvaluation<'a, T: EvalScalar> {
    /// Values indexed by each variable's global index
    pub values: &'a [T],
}

impl<'a, T: EvalScalar> ScalarEvaluation<'a, T> {
    pub fn new(values: &'a [T]) -> Self {
        ScalarEvaluation { values }
    }

    fn unary(&self, op: UnaryOp, a: T) -> Result<T, ExprError> {
        let def = op.definition();
        if !(def.domain)(a.value()) {
            return Err(ExprError::domain(def.name, &[a.value()]));
        }
        let r = match op {
            UnaryOp::Sin => a.sin(),
            UnaryOp::Cos => a.cos(),
            UnaryOp::Tan => a.tan(),
            UnaryOp::Asin => a.asin(),
            UnaryOp::Acos => a.acos(),
            UnaryOp::Atan => a.atan(),
            UnaryOp::Exp => a.exp(),
            UnaryOp::Log => a.ln(),
            UnaryOp::Sqrt => a.sqrt(),
        };
        checked(def.name, &[a.value()], r)
    }

    fn binary(&self, op: BinaryOp, a: T, b: T) -> Result<T, ExprError> {
        let def = op.definition();
        let args = [a.value(), b.value()];
        if !(def.domain)(args[0], args[1]) {
            return Err(ExprError::domain(def.name, &args));
        }
        let r = match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.powf(b),
        };
        checked(def.name, &args, r)
    }
}

fn checked<T: EvalScalar>(op: &'static str, args: &[f64], r: T) -> Result<T, ExprError> {
    if r.value().is_finite() {
        Ok(r)
    } else {
        Err(ExprError::domain(op, args))
    }
}

impl<T: EvalScalar> Evaluation for ScalarEvaluation<'_, T> {
    type Output = T;

    fn variable(&mut self, v: &Variable) -> Result<T, ExprError> {
        self.values
            .get(v.index)
            .copied()
            .ok_or(ExprError::IndexOutOfRange {
                index: v.index,
                len: self.values.len(),
            })
    }

    fn constant(&mut self, value: f64) -> Result<T, ExprError> {
        Ok(T::from_f64(value))
    }

    fn sin(&mut self, arg: T) -> Result<T, ExprError> {
        self.unary(UnaryOp::Sin, arg)
    }

    fn cos(&mut self, arg: T) -> Result<T, ExprError> {
        self.unary(UnaryOp::Cos, arg)
    }

    fn tan(&mut self, arg: T) -> Result<T, ExprError> {
        self.unary(UnaryOp::Tan, arg)
    }

    fn asin(&mut self, arg: T) -> Result<T, ExprError> {
        self.unary(UnaryOp::Asin, arg)
    }

    fn acos(&mut self, arg: T) -> Result<T, ExprError> {
        self.unary(UnaryOp::Acos, arg)
    }

    fn atan(&mut self, arg: T) -> Result<T, ExprError> {
        self.unary(UnaryOp::Atan, arg)
    }

    fn exp(&mut self, arg: T) -> Result<T, ExprError> {
        self.unary(UnaryOp::Exp, arg)
    }

    fn log(&mut self, arg: T) -> Result<T, ExprError> {
        self.unary(UnaryOp::Log, arg)
    }

    fn sqrt(&mut self, arg: T) -> Result<T, ExprError> {
        self.unary(UnaryOp::Sqrt, arg)
    }

    fn power_int(&mut self, arg: T, exponent: i32) -> Result<T, ExprError> {
        if exponent == 0 {
            return Ok(T::from_f64(1.0));
        }
        checked("powint", &[arg.value()], arg.powi(exponent))
    }

    fn add(&mut self, a: T, b: T) -> Result<T, ExprError> {
        self.binary(BinaryOp::Add, a, b)
    }

    fn sub(&mut self, a: T, b: T) -> Result<T, ExprError> {
        self.binary(BinaryOp::Sub, a, b)
    }

    fn mul(&mut self, a: T, b: T) -> Result<T, ExprError> {
        self.binary(BinaryOp::Mul, a, b)
    }

    fn div(&mut self, a: T, b: T) -> Result<T, ExprError> {
        self.binary(BinaryOp::Div, a, b)
    }

    fn pow(&mut self, a: T, b: T) -> Result<T, ExprError> {
        self.binary(BinaryOp::Pow, a, b)
    }
}
