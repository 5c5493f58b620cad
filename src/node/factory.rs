//! Simplifying constructors.
//!
//! These apply neutral-element rules (`0 + x -> x`, `1 * x -> x`, `x^0 -> 1`, ...)
//! and fold constant operands before allocating a node. Derivative
//! construction goes through them so that differentiating deep expressions
//! does not produce trees full of `0 * ...` and `1 * ...` terms.
//!
//! The `std::ops` overloads on [`Expr`] route through the same helpers.

use std::ops::{Add, Div, Mul, Neg, Sub};

use super::{Expr, NeutralElement};
use crate::ops::{BinaryOp, UnaryOp};

/// Addition with `0 + x -> x` and constant folding
pub fn my_add(a: Expr, b: Expr) -> Expr {
    match (a.is_one_or_zero(), b.is_one_or_zero()) {
        (NeutralElement::Zero, _) => return b,
        (_, NeutralElement::Zero) => return a,
        _ => {}
    }
    if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant()) {
        return Expr::constant(x + y);
    }
    Expr::binary(BinaryOp::Add, a, b)
}

/// Subtraction with `x - 0 -> x`, `0 - x -> -x` and constant folding
pub fn my_sub(a: Expr, b: Expr) -> Expr {
    if b.is_one_or_zero() == NeutralElement::Zero {
        return a;
    }
    if a.is_one_or_zero() == NeutralElement::Zero {
        return neg(b);
    }
    if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant()) {
        return Expr::constant(x - y);
    }
    Expr::binary(BinaryOp::Sub, a, b)
}

/// Multiplication with `0 * x -> 0`, `1 * x -> x` and constant folding
pub fn my_prod(a: Expr, b: Expr) -> Expr {
    match (a.is_one_or_zero(), b.is_one_or_zero()) {
        (NeutralElement::Zero, _) | (_, NeutralElement::Zero) => return Expr::zero(),
        (NeutralElement::One, _) => return b,
        (_, NeutralElement::One) => return a,
        _ => {}
    }
    if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant()) {
        return Expr::constant(x * y);
    }
    Expr::binary(BinaryOp::Mul, a, b)
}

/// Division with `0 / x -> 0`, `x / 1 -> x` and constant folding
pub fn my_quotient(a: Expr, b: Expr) -> Expr {
    if b.is_one_or_zero() == NeutralElement::One {
        return a;
    }
    if a.is_one_or_zero() == NeutralElement::Zero && b.is_one_or_zero() != NeutralElement::Zero {
        return Expr::zero();
    }
    if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant())
        && y != 0.0
    {
        return Expr::constant(x / y);
    }
    Expr::binary(BinaryOp::Div, a, b)
}

/// Integer power with `x^0 -> 1`, `x^1 -> x` and constant folding
pub fn my_power_int(a: Expr, exponent: i32) -> Expr {
    match exponent {
        0 => return Expr::one(),
        1 => return a,
        _ => {}
    }
    if let Some(x) = a.as_constant() {
        let v = x.powi(exponent);
        if v.is_finite() {
            return Expr::constant(v);
        }
    }
    Expr::power_int(a, exponent)
}

/// Real power; integer-valued constant exponents become [`my_power_int`]
pub fn my_power(a: Expr, b: Expr) -> Expr {
    if let Some(e) = b.as_constant()
        && e.fract() == 0.0
        && e.abs() <= f64::from(i32::MAX)
    {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "exponent is integer-valued and within i32 range"
        )]
        return my_power_int(a, e as i32);
    }
    if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant()) {
        let v = x.powf(y);
        if v.is_finite() {
            return Expr::constant(v);
        }
    }
    Expr::binary(BinaryOp::Pow, a, b)
}

/// Elementary function, folded when the argument is an in-domain constant
pub fn my_unary(op: UnaryOp, a: Expr) -> Expr {
    if let Some(x) = a.as_constant() {
        let def = op.definition();
        if (def.domain)(x) {
            let v = (def.eval)(x);
            if v.is_finite() {
                return Expr::constant(v);
            }
        }
    }
    Expr::unary(op, a)
}

/// Negate an expression
pub fn neg(a: Expr) -> Expr {
    my_prod(Expr::constant(-1.0), a)
}

// ===== Operator overloading =====

macro_rules! impl_binary_ops {
    ($($trait:ident, $method:ident => $helper:ident);* $(;)?) => {
        $(
            impl $trait<Expr> for Expr {
                type Output = Expr;
                fn $method(self, rhs: Expr) -> Expr {
                    $helper(self, rhs)
                }
            }

            impl $trait<&Expr> for Expr {
                type Output = Expr;
                fn $method(self, rhs: &Expr) -> Expr {
                    $helper(self, rhs.clone())
                }
            }

            impl $trait<Expr> for &Expr {
                type Output = Expr;
                fn $method(self, rhs: Expr) -> Expr {
                    $helper(self.clone(), rhs)
                }
            }

            impl $trait<&Expr> for &Expr {
                type Output = Expr;
                fn $method(self, rhs: &Expr) -> Expr {
                    $helper(self.clone(), rhs.clone())
                }
            }

            impl $trait<f64> for Expr {
                type Output = Expr;
                fn $method(self, rhs: f64) -> Expr {
                    $helper(self, Expr::constant(rhs))
                }
            }

            impl $trait<f64> for &Expr {
                type Output = Expr;
                fn $method(self, rhs: f64) -> Expr {
                    $helper(self.clone(), Expr::constant(rhs))
                }
            }

            impl $trait<Expr> for f64 {
                type Output = Expr;
                fn $method(self, rhs: Expr) -> Expr {
                    $helper(Expr::constant(self), rhs)
                }
            }

            impl $trait<&Expr> for f64 {
                type Output = Expr;
                fn $method(self, rhs: &Expr) -> Expr {
                    $helper(Expr::constant(self), rhs.clone())
                }
            }
        )*
    };
}

impl_binary_ops! {
    Add, add => my_add;
    Sub, sub => my_sub;
    Mul, mul => my_prod;
    Div, div => my_quotient;
}

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        neg(self)
    }
}

impl Neg for &Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        neg(self.clone())
    }
}
