//! Binary arithmetic
//!
//! Partial derivatives are listed per operand: first partials as
//! `[∂f/∂a, ∂f/∂b]`, second partials as `[∂²f/∂a², ∂²f/∂a∂b, ∂²f/∂b²]`.

use std::sync::OnceLock;

use crate::Expr;
use crate::node::{my_add, my_power, my_power_int, my_prod, my_quotient, my_sub, my_unary, neg};
use crate::ops::UnaryOp;

/// Binary operator kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    /// Real-valued power `a^b`
    Pow,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 5] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Pow,
    ];

    #[inline]
    pub fn definition(self) -> &'static BinaryDefinition {
        &TABLE.get_or_init(all_definitions)[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.definition().name
    }
}

/// Formulas of one binary operator
pub struct BinaryDefinition {
    pub op: BinaryOp,
    pub name: &'static str,
    /// Infix symbol used when printing (`None` prints as a call)
    pub symbol: Option<char>,

    pub eval: fn(f64, f64) -> f64,
    pub partials: fn(f64, f64) -> [f64; 2],
    pub second: fn(f64, f64) -> [f64; 3],
    pub domain: fn(f64, f64) -> bool,

    pub sym_partials: fn(&Expr, &Expr) -> [Expr; 2],
    pub sym_second: fn(&Expr, &Expr) -> [Expr; 3],
}

static TABLE: OnceLock<Vec<BinaryDefinition>> = OnceLock::new();

/// `ln(a)` for the exponent partials of `a^b`.
///
/// For a non-positive base the power is only defined at integer exponents,
/// where `b` is treated as locally constant and the log terms vanish.
#[inline]
fn pow_log(a: f64) -> f64 {
    if a > 0.0 { a.ln() } else { 0.0 }
}

fn all_definitions() -> Vec<BinaryDefinition> {
    let defs = vec![
        BinaryDefinition {
            op: BinaryOp::Add,
            name: "add",
            symbol: Some('+'),
            eval: |a, b| a + b,
            partials: |_, _| [1.0, 1.0],
            second: |_, _| [0.0; 3],
            domain: |_, _| true,
            sym_partials: |_, _| [Expr::one(), Expr::one()],
            sym_second: |_, _| [Expr::zero(), Expr::zero(), Expr::zero()],
        },
        BinaryDefinition {
            op: BinaryOp::Sub,
            name: "sub",
            symbol: Some('-'),
            eval: |a, b| a - b,
            partials: |_, _| [1.0, -1.0],
            second: |_, _| [0.0; 3],
            domain: |_, _| true,
            sym_partials: |_, _| [Expr::one(), Expr::constant(-1.0)],
            sym_second: |_, _| [Expr::zero(), Expr::zero(), Expr::zero()],
        },
        BinaryDefinition {
            op: BinaryOp::Mul,
            name: "mul",
            symbol: Some('*'),
            eval: |a, b| a * b,
            partials: |a, b| [b, a],
            second: |_, _| [0.0, 1.0, 0.0],
            domain: |_, _| true,
            sym_partials: |a, b| [b.clone(), a.clone()],
            sym_second: |_, _| [Expr::zero(), Expr::one(), Expr::zero()],
        },
        BinaryDefinition {
            op: BinaryOp::Div,
            name: "div",
            symbol: Some('/'),
            eval: |a, b| a / b,
            partials: |a, b| [1.0 / b, -a / (b * b)],
            second: |a, b| [0.0, -1.0 / (b * b), 2.0 * a / (b * b * b)],
            domain: |_, b| b != 0.0,
            sym_partials: |a, b| {
                [
                    my_power_int(b.clone(), -1),
                    neg(my_quotient(a.clone(), my_power_int(b.clone(), 2))),
                ]
            },
            sym_second: |a, b| {
                [
                    Expr::zero(),
                    neg(my_power_int(b.clone(), -2)),
                    my_prod(
                        my_prod(Expr::constant(2.0), a.clone()),
                        my_power_int(b.clone(), -3),
                    ),
                ]
            },
        },
        BinaryDefinition {
            op: BinaryOp::Pow,
            name: "pow",
            symbol: None,
            eval: f64::powf,
            partials: |a, b| [b * a.powf(b - 1.0), a.powf(b) * pow_log(a)],
            second: |a, b| {
                let ln_a = pow_log(a);
                [
                    b * (b - 1.0) * a.powf(b - 2.0),
                    a.powf(b - 1.0) * (1.0 + b * ln_a),
                    a.powf(b) * ln_a * ln_a,
                ]
            },
            domain: |a, b| a.is_finite() && (a > 0.0 || b.fract() == 0.0),
            sym_partials: |a, b| {
                let b_minus_one = my_sub(b.clone(), Expr::one());
                [
                    my_prod(b.clone(), my_power(a.clone(), b_minus_one)),
                    my_prod(
                        my_power(a.clone(), b.clone()),
                        my_unary(UnaryOp::Log, a.clone()),
                    ),
                ]
            },
            sym_second: |a, b| {
                let ln_a = my_unary(UnaryOp::Log, a.clone());
                let b_minus_one = my_sub(b.clone(), Expr::one());
                let b_minus_two = my_sub(b.clone(), Expr::constant(2.0));
                [
                    my_prod(
                        my_prod(b.clone(), b_minus_one.clone()),
                        my_power(a.clone(), b_minus_two),
                    ),
                    my_prod(
                        my_power(a.clone(), b_minus_one),
                        my_add(Expr::one(), my_prod(b.clone(), ln_a.clone())),
                    ),
                    my_prod(my_power(a.clone(), b.clone()), my_power_int(ln_a, 2)),
                ]
            },
        },
    ];

    debug_assert!(defs.iter().enumerate().all(|(i, d)| d.op as usize == i));
    defs
}
