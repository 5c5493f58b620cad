//! Parallel batch evaluation using Rayon
//!
//! Evaluates one expression DAG at many points. Every worker thread gets its
//! own [`EvalContext`], so the shared DAG itself is only read.
//!
//! Enable with the `parallel` feature:
//! ```toml
//! symb_ad = { version = "0.1", features = ["parallel"] }
//! ```

use crate::{EvalContext, Expr, ExprError};
use rayon::prelude::*;

/// Evaluate `expr` at every point; results keep the order of `points`
///
/// # Example
/// ```ignore
/// let points: Vec<Vec<f64>> = (0..1000).map(|i| vec![i as f64 * 1e-3]).collect();
/// let values = evaluate_parallel(&expr, &points)?;
/// ```
pub fn evaluate_parallel(expr: &Expr, points: &[Vec<f64>]) -> Result<Vec<f64>, ExprError> {
    points
        .par_iter()
        .map_init(EvalContext::new, |ctx, x| expr.evaluate(ctx, 0, x))
        .collect()
}

/// Gradient of `expr` at every point (one reverse sweep per point)
pub fn gradient_parallel(expr: &Expr, points: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ExprError> {
    points
        .par_iter()
        .map_init(EvalContext::new, |ctx, x| {
            expr.evaluate(ctx, 0, x)?;
            let mut df = vec![0.0; x.len()];
            expr.ad_backward(ctx, 0, 1.0, &mut df)?;
            Ok(df)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VariableType;

    #[test]
    fn test_parallel_matches_sequential() {
        let x = Expr::variable(VariableType::DifferentialState, 0, 0);
        let e = x.sin() * x.exp();
        let points: Vec<Vec<f64>> = (0..64).map(|i| vec![f64::from(i) * 0.1]).collect();

        let par = evaluate_parallel(&e, &points).unwrap();
        let mut ctx = EvalContext::new();
        for (p, v) in points.iter().zip(&par) {
            assert_eq!(*v, e.evaluate(&mut ctx, 0, p).unwrap());
        }

        let grads = gradient_parallel(&e, &points).unwrap();
        let g = grads[10][0];
        let x0: f64 = 1.0;
        assert!((g - (x0.cos() + x0.sin()) * x0.exp()).abs() < 1e-12);
    }

    #[test]
    fn test_parallel_propagates_errors() {
        let x = Expr::variable(VariableType::DifferentialState, 0, 0);
        let e = x.ln();
        let points = vec![vec![1.0], vec![-1.0]];
        assert!(evaluate_parallel(&e, &points).unwrap_err().is_domain());
    }
}
