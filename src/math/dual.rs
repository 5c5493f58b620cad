use crate::traits::EvalScalar;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Forward-mode dual number `val + eps·ε` with `ε² = 0`.
///
/// Evaluating an expression with [`ScalarEvaluation`](crate::ScalarEvaluation)
/// over duals yields the value and one directional derivative. Since `Dual`
/// is itself an [`EvalScalar`], `Dual<Dual<f64>>` carries second derivatives.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Dual<T: EvalScalar> {
    pub val: T,
    pub eps: T,
}

impl<T: EvalScalar> Dual<T> {
    pub fn new(val: T, eps: T) -> Self {
        Self { val, eps }
    }

    pub fn constant(val: T) -> Self {
        Self {
            val,
            eps: T::from_f64(0.0),
        }
    }

    /// Seed a variable: derivative part one
    pub fn variable(val: T) -> Self {
        Self {
            val,
            eps: T::from_f64(1.0),
        }
    }

    /// Apply a scalar function given its value and derivative at `val`
    #[inline]
    fn chain(self, f: T, df: T) -> Self {
        Self::new(f, df * self.eps)
    }
}

impl<T: EvalScalar + fmt::Display> fmt::Display for Dual<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}ε", self.val, self.eps)
    }
}

// Basic Arithmetic

impl<T: EvalScalar> Add for Dual<T> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.val + rhs.val, self.eps + rhs.eps)
    }
}

impl<T: EvalScalar> Sub for Dual<T> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.val - rhs.val, self.eps - rhs.eps)
    }
}

impl<T: EvalScalar> Mul for Dual<T> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        // Product rule
        Self::new(self.val * rhs.val, self.val * rhs.eps + self.eps * rhs.val)
    }
}

impl<T: EvalScalar> Div for Dual<T> {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        // Quotient rule
        let val = self.val / rhs.val;
        let eps = (self.eps * rhs.val - self.val * rhs.eps) / (rhs.val * rhs.val);
        Self::new(val, eps)
    }
}

impl<T: EvalScalar> Neg for Dual<T> {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.val, -self.eps)
    }
}

impl<T: EvalScalar> EvalScalar for Dual<T> {
    fn from_f64(v: f64) -> Self {
        Self::constant(T::from_f64(v))
    }

    fn value(&self) -> f64 {
        self.val.value()
    }

    fn sin(self) -> Self {
        self.chain(self.val.sin(), self.val.cos())
    }

    fn cos(self) -> Self {
        self.chain(self.val.cos(), -self.val.sin())
    }

    fn tan(self) -> Self {
        let t = self.val.tan();
        self.chain(t, T::from_f64(1.0) + t * t)
    }

    fn asin(self) -> Self {
        let one = T::from_f64(1.0);
        self.chain(
            self.val.asin(),
            one / (one - self.val * self.val).sqrt(),
        )
    }

    fn acos(self) -> Self {
        let one = T::from_f64(1.0);
        self.chain(
            self.val.acos(),
            -(one / (one - self.val * self.val).sqrt()),
        )
    }

    fn atan(self) -> Self {
        let one = T::from_f64(1.0);
        self.chain(self.val.atan(), one / (one + self.val * self.val))
    }

    fn exp(self) -> Self {
        let e = self.val.exp();
        self.chain(e, e)
    }

    fn ln(self) -> Self {
        self.chain(self.val.ln(), T::from_f64(1.0) / self.val)
    }

    fn sqrt(self) -> Self {
        let s = self.val.sqrt();
        self.chain(s, T::from_f64(0.5) / s)
    }

    fn powi(self, n: i32) -> Self {
        if n == 0 {
            return Self::from_f64(1.0);
        }
        let shifted = match n.checked_sub(1) {
            Some(m) => self.val.powi(m),
            None => self.val.powf(T::from_f64(f64::from(n) - 1.0)),
        };
        let df = T::from_f64(f64::from(n)) * shifted;
        self.chain(self.val.powi(n), df)
    }

    fn powf(self, e: Self) -> Self {
        // d(a^b) = b a^(b-1) da + a^b ln(a) db; the log term vanishes for a <= 0
        let val = self.val.powf(e.val);
        let da = e.val * self.val.powf(e.val - T::from_f64(1.0)) * self.eps;
        let db = if self.val.value() > 0.0 {
            val * self.val.ln() * e.eps
        } else {
            T::from_f64(0.0)
        };
        Self::new(val, da + db)
    }
}
