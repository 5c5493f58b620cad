//! Property-Based Testing
//!
//! Uses quickcheck to build random DAGs (with shared subterms) and check that
//! every route to a derivative agrees:
//! - forward tangent vs central finite differences
//! - reverse sweep vs one forward sweep per direction
//! - numeric AD vs the symbolic derivative
//! - numeric AD vs dual-number evaluation through the visitor
//! - second-order forward vs reverse
//! - substitution vs evaluation

use quickcheck::{Arbitrary, Gen, QuickCheck, TestResult};

use crate::{Dual, EvalContext, Expr, ExprError, ScalarEvaluation, VariableType, approx_eq};

const TOL: f64 = 1e-7;
/// Points with larger intermediates are discarded to keep rounding in check
const MAX_MAGNITUDE: f64 = 1e3;
/// Same for first and second derivatives near a singularity
const MAX_SLOPE: f64 = 1e4;

// ============================================================
// EXPRESSION GENERATOR
// ============================================================

fn gen_expr(g: &mut Gen, pool: &mut Vec<Expr>, depth: usize) -> Expr {
    // Reuse an earlier node now and then to create shared subterms
    if !pool.is_empty() && u8::arbitrary(g) % 5 == 0 {
        return pool[usize::arbitrary(g) % pool.len()].clone();
    }
    let e = if depth == 0 {
        match u8::arbitrary(g) % 4 {
            0 => Expr::variable(VariableType::DifferentialState, 0, 0),
            1 => Expr::variable(VariableType::DifferentialState, 1, 1),
            2 => Expr::variable(VariableType::Control, 0, 2),
            _ => Expr::constant(f64::from(i8::arbitrary(g) % 5) * 0.5),
        }
    } else {
        // Partial operators are free to leave their domain; such points are discarded
        match u8::arbitrary(g) % 17 {
            0 => gen_expr(g, pool, depth - 1) + gen_expr(g, pool, depth - 1),
            1 => gen_expr(g, pool, depth - 1) - gen_expr(g, pool, depth - 1),
            2 | 3 => gen_expr(g, pool, depth - 1) * gen_expr(g, pool, depth - 1),
            4 => gen_expr(g, pool, depth - 1) / gen_expr(g, pool, depth - 1),
            5 => gen_expr(g, pool, depth - 1).sin(),
            6 => gen_expr(g, pool, depth - 1).cos(),
            7 => gen_expr(g, pool, depth - 1).tan(),
            8 => gen_expr(g, pool, depth - 1).asin(),
            9 => gen_expr(g, pool, depth - 1).acos(),
            10 => gen_expr(g, pool, depth - 1).atan(),
            11 => gen_expr(g, pool, depth - 1).exp(),
            12 => gen_expr(g, pool, depth - 1).ln(),
            13 => gen_expr(g, pool, depth - 1).sqrt(),
            14 => gen_expr(g, pool, depth - 1).powi(i32::from(i8::arbitrary(g) % 4)),
            15 => gen_expr(g, pool, depth - 1).powf(f64::from(u8::arbitrary(g) % 7) * 0.5 - 1.0),
            _ => gen_expr(g, pool, depth - 1).powf(gen_expr(g, pool, depth - 1)),
        }
    };
    pool.push(e.clone());
    e
}

fn random_expr(g: &mut Gen) -> Expr {
    let mut pool = Vec::new();
    gen_expr(g, &mut pool, 3)
}

/// Map raw integers onto `[-2, 2]`
fn point(a: i16, b: i16, c: i16) -> Vec<f64> {
    [a, b, c]
        .iter()
        .map(|&v| f64::from(v) / 16384.0)
        .collect()
}

/// Evaluate and store primals in slot 0, discarding badly scaled points
fn evaluate_tame(e: &Expr, ctx: &mut EvalContext, p: &[f64]) -> Option<f64> {
    let v = e.evaluate(ctx, 0, p).ok()?;
    e.post_order()
        .iter()
        .all(|n| ctx.value(n, 0).is_some_and(|v| v.abs() <= MAX_MAGNITUDE))
        .then_some(v)
}

/// AD may only fail at a tame point when a local derivative is not finite
fn reject(err: &ExprError) -> TestResult {
    if err.is_domain() {
        TestResult::discard()
    } else {
        TestResult::error(err.to_string())
    }
}

/// Reverse gradient, or the verdict for a point too close to a singularity
fn reverse_gradient(e: &Expr, ctx: &EvalContext) -> Result<Vec<f64>, TestResult> {
    let mut df = vec![0.0; 3];
    e.ad_backward(ctx, 0, 1.0, &mut df).map_err(|err| reject(&err))?;
    if df.iter().all(|g| g.abs() <= MAX_SLOPE) {
        Ok(df)
    } else {
        Err(TestResult::discard())
    }
}

fn unit(i: usize) -> Vec<f64> {
    let mut v = vec![0.0; 3];
    v[i] = 1.0;
    v
}

// ============================================================
// PROPERTIES
// ============================================================

#[test]
fn test_tangent_matches_finite_differences() {
    fn prop(a: i16, b: i16, c: i16) -> TestResult {
        const H: f64 = 1e-6;
        let p = point(a, b, c);
        let e = random_expr(&mut Gen::new(8));
        let mut ctx = EvalContext::new();
        if evaluate_tame(&e, &mut ctx, &p).is_none() {
            return TestResult::discard();
        }
        let dir = [0.6, -0.8, 0.3];
        let df = match e.ad_forward(&mut ctx, 0, &p, &dir) {
            Ok((_, df)) => df,
            Err(err) => return reject(&err),
        };
        let shifted = |t: f64| -> Vec<f64> {
            p.iter().zip(&dir).map(|(v, d)| v + t * d).collect()
        };
        let mut central = |h: f64, slot: usize| -> Option<f64> {
            let fp = e.evaluate(&mut ctx, slot, &shifted(h)).ok()?;
            let fm = e.evaluate(&mut ctx, slot + 1, &shifted(-h)).ok()?;
            Some((fp - fm) / (2.0 * h))
        };
        let (Some(coarse), Some(fd)) = (central(H, 1), central(H / 2.0, 3)) else {
            return TestResult::discard();
        };
        // Halving the step moves the estimate by most of its own error
        if !approx_eq(coarse, fd, 1e-5) {
            return TestResult::discard();
        }
        if approx_eq(fd, df, 1e-4) {
            TestResult::passed()
        } else {
            TestResult::error(format!("{e}: tangent {df} vs finite difference {fd}"))
        }
    }
    QuickCheck::new()
        .tests(300)
        .max_tests(6000)
        .quickcheck(prop as fn(i16, i16, i16) -> TestResult);
}

#[test]
fn test_forward_reverse_duality() {
    fn prop(a: i16, b: i16, c: i16) -> TestResult {
        let p = point(a, b, c);
        let e = random_expr(&mut Gen::new(8));
        let mut ctx = EvalContext::new();
        if evaluate_tame(&e, &mut ctx, &p).is_none() {
            return TestResult::discard();
        }
        let grad = match reverse_gradient(&e, &ctx) {
            Ok(grad) => grad,
            Err(verdict) => return verdict,
        };
        for (i, g) in grad.iter().enumerate() {
            let d = match e.ad_forward(&mut ctx, 0, &p, &unit(i)) {
                Ok((_, d)) => d,
                Err(err) => return reject(&err),
            };
            if !approx_eq(d, *g, TOL) {
                return TestResult::error(format!("{e}: d/dx{i} {d} vs {g}"));
            }
        }
        TestResult::passed()
    }
    QuickCheck::new()
        .tests(300)
        .max_tests(6000)
        .quickcheck(prop as fn(i16, i16, i16) -> TestResult);
}

#[test]
fn test_symbolic_derivative_matches_numeric() {
    fn prop(a: i16, b: i16, c: i16) -> TestResult {
        let p = point(a, b, c);
        let e = random_expr(&mut Gen::new(8));
        let mut ctx = EvalContext::new();
        if evaluate_tame(&e, &mut ctx, &p).is_none() {
            return TestResult::discard();
        }
        let grad = match reverse_gradient(&e, &ctx) {
            Ok(grad) => grad,
            Err(verdict) => return verdict,
        };
        for (i, g) in grad.iter().enumerate() {
            let d = match e.differentiate(i) {
                Ok(d) => d,
                Err(err) => return TestResult::error(err.to_string()),
            };
            let Ok(v) = d.evaluate(&mut EvalContext::new(), 0, &p) else {
                return TestResult::discard();
            };
            if !approx_eq(v, *g, TOL) {
                return TestResult::error(format!("{e}: symbolic {v} vs numeric {g}"));
            }
        }
        TestResult::passed()
    }
    QuickCheck::new()
        .tests(300)
        .max_tests(6000)
        .quickcheck(prop as fn(i16, i16, i16) -> TestResult);
}

#[test]
fn test_dual_visitor_matches_tangent() {
    fn prop(a: i16, b: i16, c: i16) -> TestResult {
        let p = point(a, b, c);
        let e = random_expr(&mut Gen::new(8));
        let mut ctx = EvalContext::new();
        if evaluate_tame(&e, &mut ctx, &p).is_none() {
            return TestResult::discard();
        }
        let seed = [1.0, -0.5, 0.25];
        let (f, df) = match e.ad_forward(&mut ctx, 0, &p, &seed) {
            Ok(v) => v,
            Err(err) => return reject(&err),
        };
        if df.abs() > MAX_SLOPE {
            return TestResult::discard();
        }
        let duals: Vec<Dual<f64>> = p
            .iter()
            .zip(&seed)
            .map(|(&v, &s)| Dual::new(v, s))
            .collect();
        let Ok(d) = e.accept(&mut ScalarEvaluation::new(&duals)) else {
            return TestResult::failed();
        };
        TestResult::from_bool(approx_eq(d.val, f, TOL) && approx_eq(d.eps, df, TOL))
    }
    QuickCheck::new()
        .tests(300)
        .max_tests(6000)
        .quickcheck(prop as fn(i16, i16, i16) -> TestResult);
}

#[test]
fn test_second_order_duality() {
    fn prop(a: i16, b: i16, c: i16) -> TestResult {
        let p = point(a, b, c);
        let e = random_expr(&mut Gen::new(8));
        let mut ctx = EvalContext::new();
        if evaluate_tame(&e, &mut ctx, &p).is_none() {
            return TestResult::discard();
        }
        let dir = [0.5, 1.0, -1.0];
        if let Err(err) = e.ad_forward(&mut ctx, 0, &p, &dir) {
            return reject(&err);
        }
        let mut df = vec![0.0; 3];
        let mut ddf = vec![0.0; 3];
        if let Err(err) = e.ad_backward2(&ctx, 0, 1.0, 0.0, &mut df, &mut ddf) {
            return reject(&err);
        }
        if df.iter().chain(&ddf).any(|d| d.abs() > MAX_SLOPE) {
            return TestResult::discard();
        }
        for j in 0..3 {
            let d2 = match e.ad_forward2(&ctx, 0, &unit(j), &[0.0; 3]) {
                Ok((_, d2)) => d2,
                Err(err) => return reject(&err),
            };
            if !approx_eq(d2, ddf[j], 1e-7) {
                return TestResult::error(format!("{e}: row {j} {d2} vs {}", ddf[j]));
            }
        }
        TestResult::passed()
    }
    QuickCheck::new()
        .tests(200)
        .max_tests(4000)
        .quickcheck(prop as fn(i16, i16, i16) -> TestResult);
}

#[test]
fn test_substitution_matches_evaluation() {
    fn prop(a: i16, b: i16, c: i16) -> TestResult {
        let p = point(a, b, c);
        let e = random_expr(&mut Gen::new(8));
        let Ok(direct) = e.evaluate(&mut EvalContext::new(), 0, &p) else {
            return TestResult::discard();
        };
        let replaced = e.substitute(1, &Expr::constant(p[1]));
        if replaced.depends_on_index(1) {
            return TestResult::failed();
        }
        let moved = [p[0], 100.0, p[2]];
        match replaced.evaluate(&mut EvalContext::new(), 0, &moved) {
            Ok(v) => TestResult::from_bool(approx_eq(v, direct, 1e-12)),
            Err(err) => TestResult::error(err.to_string()),
        }
    }
    QuickCheck::new()
        .tests(300)
        .max_tests(6000)
        .quickcheck(prop as fn(i16, i16, i16) -> TestResult);
}
