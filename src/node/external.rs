use std::fmt;

/// An opaque, externally supplied scalar function of one argument.
///
/// Only numeric evaluation and numeric AD are available for it: the node has
/// no symbolic derivative, so any symbolic operation reaching it fails with
/// [`ExprError::NotSymbolic`](crate::ExprError::NotSymbolic).
///
/// # Example
/// ```ignore
/// use std::sync::Arc;
/// use symb_ad::{Expr, ExternalFunction};
///
/// let cube = Arc::new(ExternalFunction::new("cube", |x| x * x * x, |x| 3.0 * x * x, |x| 6.0 * x));
/// let e = Expr::external(cube, x);
/// ```
#[derive(Clone)]
pub struct ExternalFunction {
    pub name: String,
    pub eval: fn(f64) -> f64,
    pub d1: fn(f64) -> f64,
    pub d2: fn(f64) -> f64,
}

impl ExternalFunction {
    pub fn new(
        name: impl Into<String>,
        eval: fn(f64) -> f64,
        d1: fn(f64) -> f64,
        d2: fn(f64) -> f64,
    ) -> Self {
        ExternalFunction {
            name: name.into(),
            eval,
            d1,
            d2,
        }
    }
}

impl fmt::Debug for ExternalFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
