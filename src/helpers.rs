//! Multi-variable differentiation helpers
//!
//! Symbolic `gradient`, `hessian` and `jacobian` by global variable index,
//! and their numeric counterparts built on the buffered AD passes.

use crate::{EvalContext, Expr, ExprError};

// ===== Symbolic =====

/// Gradient `[∂f/∂x_i]` for the given global indices
///
/// # Example
/// ```ignore
/// let x = Expr::variable(VariableType::DifferentialState, 0, 0);
/// let y = Expr::variable(VariableType::DifferentialState, 1, 1);
/// let grad = gradient(&(x.powi(2) + y.powi(2)), &[0, 1])?;
/// // grad = [2*x, 2*y]
/// ```
pub fn gradient(expr: &Expr, indices: &[usize]) -> Result<Vec<Expr>, ExprError> {
    indices.iter().map(|&i| expr.differentiate(i)).collect()
}

/// Hessian `H[i][j] = ∂²f/∂x_i∂x_j` for the given global indices
pub fn hessian(expr: &Expr, indices: &[usize]) -> Result<Vec<Vec<Expr>>, ExprError> {
    gradient(expr, indices)?
        .iter()
        .map(|partial| gradient(partial, indices))
        .collect()
}

/// Jacobian `J[k][i] = ∂f_k/∂x_i`
pub fn jacobian(exprs: &[Expr], indices: &[usize]) -> Result<Vec<Vec<Expr>>, ExprError> {
    exprs.iter().map(|e| gradient(e, indices)).collect()
}

// ===== Numeric =====

/// Gradient at `x` (one evaluation and one reverse sweep)
pub fn gradient_at(expr: &Expr, x: &[f64]) -> Result<Vec<f64>, ExprError> {
    let mut ctx = EvalContext::new();
    expr.evaluate(&mut ctx, 0, x)?;
    let mut df = vec![0.0; x.len()];
    expr.ad_backward(&ctx, 0, 1.0, &mut df)?;
    Ok(df)
}

/// Dense Hessian at `x`, forward-over-reverse: one column per unit direction
pub fn hessian_at(expr: &Expr, x: &[f64]) -> Result<Vec<Vec<f64>>, ExprError> {
    let n = x.len();
    let mut ctx = EvalContext::new();
    let mut columns = Vec::with_capacity(n);
    let mut seed = vec![0.0; n];
    for j in 0..n {
        seed[j] = 1.0;
        expr.ad_forward(&mut ctx, 0, x, &seed)?;
        seed[j] = 0.0;

        let mut df = vec![0.0; n];
        let mut ddf = vec![0.0; n];
        expr.ad_backward2(&ctx, 0, 1.0, 0.0, &mut df, &mut ddf)?;
        columns.push(ddf);
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VariableType;

    fn x(i: usize) -> Expr {
        Expr::variable(VariableType::DifferentialState, i, i)
    }

    fn value(e: &Expr, p: &[f64]) -> f64 {
        e.evaluate(&mut EvalContext::new(), 0, p).unwrap()
    }

    #[test]
    fn test_symbolic_hessian() {
        let f = x(0).powi(2) * x(1);
        let h = hessian(&f, &[0, 1]).unwrap();
        let p = [3.0, 5.0];
        assert_eq!(value(&h[0][0], &p), 10.0);
        assert_eq!(value(&h[0][1], &p), 6.0);
        assert_eq!(value(&h[1][0], &p), 6.0);
        assert_eq!(h[1][1].as_constant(), Some(0.0));
    }

    #[test]
    fn test_jacobian_shape() {
        let j = jacobian(&[x(0) + x(1), x(0) * x(1), x(1).exp()], &[0, 1]).unwrap();
        assert_eq!(j.len(), 3);
        assert!(j.iter().all(|row| row.len() == 2));
        assert_eq!(j[2][0].as_constant(), Some(0.0));
    }

    #[test]
    fn test_numeric_matches_symbolic() {
        let f = x(0).sin() * x(1).powi(3) + (x(0) / x(1));
        let p = [0.6, 1.4];
        let g = gradient_at(&f, &p).unwrap();
        let gs = gradient(&f, &[0, 1]).unwrap();
        let h = hessian_at(&f, &p).unwrap();
        let hs = hessian(&f, &[0, 1]).unwrap();
        for i in 0..2 {
            assert!((g[i] - value(&gs[i], &p)).abs() < 1e-12);
            for j in 0..2 {
                assert!((h[j][i] - value(&hs[i][j], &p)).abs() < 1e-10);
            }
        }
    }
}
