use num_traits::{Float, NumCast};
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A scalar that a generic evaluation strategy can compute with.
///
/// Implemented for `f32`/`f64` (through `num_traits::Float`) and for
/// [`Dual`](crate::Dual) numbers, so the same template evaluator yields plain
/// values or forward-mode derivatives. Nesting duals gives second derivatives.
pub trait EvalScalar:
    Copy
    + Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    /// Lift a plain number into this scalar (derivative parts are zero)
    fn from_f64(v: f64) -> Self;

    /// The primal value, used for domain checks
    fn value(&self) -> f64;

    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn tan(self) -> Self;
    fn asin(self) -> Self;
    fn acos(self) -> Self;
    fn atan(self) -> Self;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn sqrt(self) -> Self;
    fn powi(self, n: i32) -> Self;
    fn powf(self, e: Self) -> Self;
}

macro_rules! impl_eval_scalar_float {
    ($($t:ty),*) => {
        $(
            impl EvalScalar for $t {
                #[inline]
                fn from_f64(v: f64) -> Self {
                    <$t as NumCast>::from(v).unwrap_or(<$t as Float>::nan())
                }
                #[inline]
                fn value(&self) -> f64 {
                    (*self).into()
                }
                #[inline]
                fn sin(self) -> Self { Float::sin(self) }
                #[inline]
                fn cos(self) -> Self { Float::cos(self) }
                #[inline]
                fn tan(self) -> Self { Float::tan(self) }
                #[inline]
                fn asin(self) -> Self { Float::asin(self) }
                #[inline]
                fn acos(self) -> Self { Float::acos(self) }
                #[inline]
                fn atan(self) -> Self { Float::atan(self) }
                #[inline]
                fn exp(self) -> Self { Float::exp(self) }
                #[inline]
                fn ln(self) -> Self { Float::ln(self) }
                #[inline]
                fn sqrt(self) -> Self { Float::sqrt(self) }
                #[inline]
                fn powi(self, n: i32) -> Self { Float::powi(self, n) }
                #[inline]
                fn powf(self, e: Self) -> Self { Float::powf(self, e) }
            }
        )*
    };
}

impl_eval_scalar_float!(f32, f64);

/// Exact integer parity, used by the integer-power classification rules
#[inline]
pub(crate) fn is_even(n: i32) -> bool {
    n % 2 == 0
}

/// Relative closeness check used by tests and the numeric helpers
#[inline]
pub fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= tol * scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parity() {
        assert!(is_even(0));
        assert!(is_even(-2));
        assert!(!is_even(-3));
        assert!(!is_even(7));
    }

    #[test]
    fn test_float_impls() {
        let x = <f64 as EvalScalar>::from_f64(0.5);
        assert_eq!(EvalScalar::value(&x), 0.5);
        assert_eq!(EvalScalar::powi(2.0_f64, -1), 0.5);
        let y = <f32 as EvalScalar>::from_f64(4.0);
        assert_eq!(EvalScalar::sqrt(y), 2.0);
    }

    #[test]
    fn test_approx_eq() {
        assert!(approx_eq(1.0, 1.0 + 1e-12, 1e-10));
        assert!(approx_eq(1e6, 1e6 + 1e-5, 1e-10));
        assert!(!approx_eq(1.0, 1.1, 1e-6));
    }
}
