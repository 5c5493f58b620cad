//! Elementary functions of one argument
//!
//! # Derivative References
//!
//! Standard calculus identities (DLMF §4.21-4.28 for the trigonometric and
//! inverse trigonometric functions):
//! - `asin'(x) = (1-x²)^(-1/2)`, `asin''(x) = x (1-x²)^(-3/2)`
//! - `atan'(x) = (1+x²)^(-1)`, `atan''(x) = -2x (1+x²)^(-2)`
//! - `tan'(x) = cos(x)^(-2)`, `tan''(x) = 2 sin(x) cos(x)^(-3)`

use std::sync::OnceLock;

use crate::Expr;
use crate::classify::{Curvature, Monotonicity};
use crate::node::{my_add, my_power, my_power_int, my_prod, my_sub, my_unary, neg};

/// Smooth elementary function kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum UnaryOp {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Exp,
    Log,
    Sqrt,
}

impl UnaryOp {
    pub const ALL: [UnaryOp; 9] = [
        UnaryOp::Sin,
        UnaryOp::Cos,
        UnaryOp::Tan,
        UnaryOp::Asin,
        UnaryOp::Acos,
        UnaryOp::Atan,
        UnaryOp::Exp,
        UnaryOp::Log,
        UnaryOp::Sqrt,
    ];

    /// Table row for this operator - O(1) index
    #[inline]
    pub fn definition(self) -> &'static UnaryDefinition {
        &TABLE.get_or_init(all_definitions)[self as usize]
    }

    /// Printed name, e.g. `"asin"`
    pub fn name(self) -> &'static str {
        self.definition().name
    }
}

/// Formulas and classification of one elementary function
pub struct UnaryDefinition {
    pub op: UnaryOp,
    pub name: &'static str,

    /// Primal `f(x)`
    pub eval: fn(f64) -> f64,
    /// `f'(x)`
    pub d1: fn(f64) -> f64,
    /// `f''(x)`
    pub d2: fn(f64) -> f64,

    /// Points where `f` is defined; evaluating elsewhere is a domain error
    pub domain: fn(f64) -> bool,

    /// Monotonicity of `f` itself on its domain
    pub monotonicity: Monotonicity,
    /// Curvature of `f` itself on its domain
    pub curvature: Curvature,

    /// Symbolic `f'(arg)` (derivative with respect to the argument only)
    pub sym_d1: fn(&Expr) -> Expr,
    /// Symbolic `f''(arg)`
    pub sym_d2: fn(&Expr) -> Expr,
}

static TABLE: OnceLock<Vec<UnaryDefinition>> = OnceLock::new();

fn one_minus_square(x: &Expr) -> Expr {
    my_sub(Expr::one(), my_power_int(x.clone(), 2))
}

fn one_plus_square(x: &Expr) -> Expr {
    my_add(Expr::one(), my_power_int(x.clone(), 2))
}

fn all_definitions() -> Vec<UnaryDefinition> {
    use Curvature::{Concave, Convex, NeitherConvexNorConcave};
    use Monotonicity::{NonDecreasing, NonIncreasing, NonMonotonic};

    let defs = vec![
        UnaryDefinition {
            op: UnaryOp::Sin,
            name: "sin",
            eval: f64::sin,
            d1: f64::cos,
            d2: |x| -x.sin(),
            domain: f64::is_finite,
            monotonicity: NonMonotonic,
            curvature: NeitherConvexNorConcave,
            sym_d1: |x| my_unary(UnaryOp::Cos, x.clone()),
            sym_d2: |x| neg(my_unary(UnaryOp::Sin, x.clone())),
        },
        UnaryDefinition {
            op: UnaryOp::Cos,
            name: "cos",
            eval: f64::cos,
            d1: |x| -x.sin(),
            d2: |x| -x.cos(),
            domain: f64::is_finite,
            monotonicity: NonMonotonic,
            curvature: NeitherConvexNorConcave,
            sym_d1: |x| neg(my_unary(UnaryOp::Sin, x.clone())),
            sym_d2: |x| neg(my_unary(UnaryOp::Cos, x.clone())),
        },
        UnaryDefinition {
            op: UnaryOp::Tan,
            name: "tan",
            eval: f64::tan,
            d1: |x| x.cos().powi(-2),
            d2: |x| 2.0 * x.sin() * x.cos().powi(-3),
            domain: |x| x.is_finite() && x.cos() != 0.0,
            monotonicity: NonMonotonic,
            curvature: NeitherConvexNorConcave,
            sym_d1: |x| my_power_int(my_unary(UnaryOp::Cos, x.clone()), -2),
            sym_d2: |x| {
                my_prod(
                    my_prod(Expr::constant(2.0), my_unary(UnaryOp::Sin, x.clone())),
                    my_power_int(my_unary(UnaryOp::Cos, x.clone()), -3),
                )
            },
        },
        UnaryDefinition {
            op: UnaryOp::Asin,
            name: "asin",
            eval: f64::asin,
            d1: |x| (1.0 - x * x).powf(-0.5),
            d2: |x| x * (1.0 - x * x).powf(-1.5),
            domain: |x| (-1.0..=1.0).contains(&x),
            monotonicity: NonDecreasing,
            curvature: NeitherConvexNorConcave,
            sym_d1: |x| my_power(one_minus_square(x), Expr::constant(-0.5)),
            sym_d2: |x| {
                my_prod(
                    x.clone(),
                    my_power(one_minus_square(x), Expr::constant(-1.5)),
                )
            },
        },
        UnaryDefinition {
            op: UnaryOp::Acos,
            name: "acos",
            eval: f64::acos,
            d1: |x| -(1.0 - x * x).powf(-0.5),
            d2: |x| -x * (1.0 - x * x).powf(-1.5),
            domain: |x| (-1.0..=1.0).contains(&x),
            monotonicity: NonIncreasing,
            curvature: NeitherConvexNorConcave,
            sym_d1: |x| neg(my_power(one_minus_square(x), Expr::constant(-0.5))),
            sym_d2: |x| {
                neg(my_prod(
                    x.clone(),
                    my_power(one_minus_square(x), Expr::constant(-1.5)),
                ))
            },
        },
        UnaryDefinition {
            op: UnaryOp::Atan,
            name: "atan",
            eval: f64::atan,
            d1: |x| 1.0 / (1.0 + x * x),
            d2: |x| -2.0 * x * (1.0 + x * x).powi(-2),
            domain: f64::is_finite,
            monotonicity: NonDecreasing,
            curvature: NeitherConvexNorConcave,
            sym_d1: |x| my_power_int(one_plus_square(x), -1),
            sym_d2: |x| {
                my_prod(
                    my_prod(Expr::constant(-2.0), x.clone()),
                    my_power_int(one_plus_square(x), -2),
                )
            },
        },
        UnaryDefinition {
            op: UnaryOp::Exp,
            name: "exp",
            eval: f64::exp,
            d1: f64::exp,
            d2: f64::exp,
            domain: f64::is_finite,
            monotonicity: NonDecreasing,
            curvature: Convex,
            sym_d1: |x| my_unary(UnaryOp::Exp, x.clone()),
            sym_d2: |x| my_unary(UnaryOp::Exp, x.clone()),
        },
        UnaryDefinition {
            op: UnaryOp::Log,
            name: "log",
            eval: f64::ln,
            d1: |x| 1.0 / x,
            d2: |x| -1.0 / (x * x),
            domain: |x| x > 0.0 && x.is_finite(),
            monotonicity: NonDecreasing,
            curvature: Concave,
            sym_d1: |x| my_power_int(x.clone(), -1),
            sym_d2: |x| neg(my_power_int(x.clone(), -2)),
        },
        UnaryDefinition {
            op: UnaryOp::Sqrt,
            name: "sqrt",
            eval: f64::sqrt,
            d1: |x| 0.5 / x.sqrt(),
            d2: |x| -0.25 * x.powf(-1.5),
            domain: |x| x >= 0.0 && x.is_finite(),
            monotonicity: NonDecreasing,
            curvature: Concave,
            sym_d1: |x| {
                my_prod(
                    Expr::constant(0.5),
                    my_power(x.clone(), Expr::constant(-0.5)),
                )
            },
            sym_d2: |x| {
                my_prod(
                    Expr::constant(-0.25),
                    my_power(x.clone(), Expr::constant(-1.5)),
                )
            },
        },
    ];

    debug_assert!(defs.iter().enumerate().all(|(i, d)| d.op as usize == i));
    defs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_enum() {
        for op in UnaryOp::ALL {
            assert_eq!(op.definition().op, op);
        }
        assert_eq!(UnaryOp::Log.name(), "log");
    }

    #[test]
    fn test_numeric_derivatives_match_finite_differences() {
        let points = [
            (UnaryOp::Sin, 0.7),
            (UnaryOp::Cos, 0.7),
            (UnaryOp::Tan, 0.4),
            (UnaryOp::Asin, 0.3),
            (UnaryOp::Acos, -0.3),
            (UnaryOp::Atan, 1.5),
            (UnaryOp::Exp, 0.2),
            (UnaryOp::Log, 2.5),
            (UnaryOp::Sqrt, 1.7),
        ];
        let h = 1e-5;
        for (op, x) in points {
            let def = op.definition();
            let fd1 = ((def.eval)(x + h) - (def.eval)(x - h)) / (2.0 * h);
            let fd2 = ((def.d1)(x + h) - (def.d1)(x - h)) / (2.0 * h);
            assert!((fd1 - (def.d1)(x)).abs() < 1e-6, "{op:?} first derivative");
            assert!((fd2 - (def.d2)(x)).abs() < 1e-5, "{op:?} second derivative");
        }
    }

    #[test]
    fn test_domains() {
        assert!(!(UnaryOp::Asin.definition().domain)(1.5));
        assert!((UnaryOp::Asin.definition().domain)(-1.0));
        assert!(!(UnaryOp::Log.definition().domain)(0.0));
        assert!((UnaryOp::Sqrt.definition().domain)(0.0));
        assert!(!(UnaryOp::Sqrt.definition().domain)(-1e-12));
        assert!((UnaryOp::Sin.definition().domain)(1e9));
    }
}
