// Agreement between the numeric passes: forward vs reverse, first vs second
// order, buffered vs fresh, numeric vs symbolic.
use std::sync::Arc;

use crate::{EvalContext, Expr, ExprError, ExternalFunction, VariableType, approx_eq};

fn x(i: usize) -> Expr {
    Expr::variable(VariableType::DifferentialState, i, i)
}

fn u(component: usize, index: usize) -> Expr {
    Expr::variable(VariableType::Control, component, index)
}

fn model() -> Expr {
    // Shared subterm `s` reached from three parents
    let s = x(0) * x(1);
    let t = s.sin() + s.powi(2);
    t * u(0, 2).exp() / (x(1) + 3.0) + s.atan() - x(0).sqrt()
}

fn unit(n: usize, i: usize) -> Vec<f64> {
    let mut e = vec![0.0; n];
    e[i] = 1.0;
    e
}

#[test]
fn test_forward_tangents_match_reverse_gradient() {
    let f = model();
    let p = [0.7, 1.1, -0.4];
    let mut ctx = EvalContext::new();
    f.evaluate(&mut ctx, 0, &p).unwrap();
    let mut grad = [0.0; 3];
    f.ad_backward(&ctx, 0, 1.0, &mut grad).unwrap();

    for (i, g) in grad.iter().enumerate() {
        let (_, d) = f.ad_forward(&mut ctx, 0, &p, &unit(3, i)).unwrap();
        assert!(approx_eq(d, *g, 1e-12), "component {i}: {d} vs {g}");
    }
}

#[test]
fn test_numeric_gradient_matches_symbolic() {
    let f = model();
    let p = [0.7, 1.1, -0.4];
    let mut ctx = EvalContext::new();
    f.evaluate(&mut ctx, 0, &p).unwrap();
    let mut grad = [0.0; 3];
    f.ad_backward(&ctx, 0, 1.0, &mut grad).unwrap();

    for (i, g) in grad.iter().enumerate() {
        let d = f.differentiate(i).unwrap();
        let v = d.evaluate(&mut EvalContext::new(), 0, &p).unwrap();
        assert!(approx_eq(v, *g, 1e-12), "component {i}: {v} vs {g}");
    }
}

#[test]
fn test_second_order_forward_and_reverse_agree() {
    // For direction u: ad_forward2 along e_j gives e_jᵀ H u, which is entry j
    // of the Hessian column ad_backward2 produces.
    let f = model();
    let p = [0.7, 1.1, -0.4];
    let dir = [0.3, -1.2, 0.5];
    let mut ctx = EvalContext::new();
    f.ad_forward(&mut ctx, 0, &p, &dir).unwrap();

    let mut df = [0.0; 3];
    let mut ddf = [0.0; 3];
    f.ad_backward2(&ctx, 0, 1.0, 0.0, &mut df, &mut ddf).unwrap();

    for j in 0..3 {
        let (d1, d2) = f.ad_forward2(&ctx, 0, &unit(3, j), &[0.0; 3]).unwrap();
        assert!(approx_eq(d1, df[j], 1e-12));
        assert!(approx_eq(d2, ddf[j], 1e-10), "row {j}: {d2} vs {}", ddf[j]);
    }
}

#[test]
fn test_second_order_seed_adds_gradient_term() {
    let f = model();
    let p = [0.7, 1.1, -0.4];
    let dir = [1.0, 0.0, 0.0];
    let mut ctx = EvalContext::new();
    f.ad_forward(&mut ctx, 0, &p, &dir).unwrap();

    let mut df = [0.0; 3];
    let mut h = [0.0; 3];
    f.ad_backward2(&ctx, 0, 1.0, 0.0, &mut df, &mut h).unwrap();

    let mut df2 = [0.0; 3];
    let mut h2 = [0.0; 3];
    f.ad_backward2(&ctx, 0, 1.0, 2.0, &mut df2, &mut h2).unwrap();
    for i in 0..3 {
        assert!(approx_eq(h2[i], h[i] + 2.0 * df[i], 1e-12));
    }
}

#[test]
fn test_buffered_forward_reuses_primal() {
    let f = model();
    let p = [0.7, 1.1, -0.4];
    let seed = [0.2, 0.4, 0.6];
    let mut ctx = EvalContext::new();
    let (_, fresh) = f.ad_forward(&mut ctx, 0, &p, &seed).unwrap();

    let mut buffered_ctx = EvalContext::new();
    f.evaluate(&mut buffered_ctx, 3, &p).unwrap();
    let buffered = f.ad_forward_buffered(&mut buffered_ctx, 3, &seed).unwrap();
    assert!(approx_eq(fresh, buffered, 1e-15));

    // Nothing stored in slot 1
    assert!(matches!(
        f.ad_forward_buffered(&mut buffered_ctx, 1, &seed),
        Err(ExprError::BufferNotPopulated { .. })
    ));
}

#[test]
fn test_slots_are_independent() {
    let f = model();
    let a = [0.7, 1.1, -0.4];
    let b = [1.5, 0.2, 0.9];
    let mut ctx = EvalContext::new();
    let fa = f.evaluate(&mut ctx, 0, &a).unwrap();
    let fb = f.evaluate(&mut ctx, 1, &b).unwrap();

    let mut ga = [0.0; 3];
    let mut gb = [0.0; 3];
    f.ad_backward(&ctx, 0, 1.0, &mut ga).unwrap();
    f.ad_backward(&ctx, 1, 1.0, &mut gb).unwrap();

    assert_eq!(ctx.value(&f, 0), Some(fa));
    assert_eq!(ctx.value(&f, 1), Some(fb));
    let (ea, eb) = (
        crate::gradient_at(&f, &a).unwrap(),
        crate::gradient_at(&f, &b).unwrap(),
    );
    for i in 0..3 {
        assert!(approx_eq(ga[i], ea[i], 1e-15));
        assert!(approx_eq(gb[i], eb[i], 1e-15));
    }
}

#[test]
fn test_evaluate_points_fills_consecutive_slots() {
    let f = x(0).powi(2) + x(1);
    let points = vec![vec![1.0, 1.0], vec![2.0, 0.5], vec![3.0, -9.0]];
    let mut ctx = EvalContext::new();
    let values = f.evaluate_points(&mut ctx, &points).unwrap();
    assert_eq!(values, vec![2.0, 4.5, 0.0]);
    assert_eq!(ctx.value(&f, 2), Some(0.0));
}

#[test]
fn test_clear_buffer_keeps_slot_zero_only() {
    let f = x(0).sin();
    let mut ctx = EvalContext::new();
    f.evaluate(&mut ctx, 0, &[0.0]).unwrap();
    f.evaluate(&mut ctx, 4, &[1.0]).unwrap();
    ctx.clear_buffer();
    assert_eq!(ctx.buffer_size(&f), 1);
    assert_eq!(ctx.value(&f, 0), Some(0.0));
    assert_eq!(ctx.value(&f, 4), None);

    ctx.reset();
    assert_eq!(ctx.value(&f, 0), None);
}

#[test]
fn test_external_function_numeric_ad() {
    let cube = Arc::new(ExternalFunction::new(
        "cube",
        |v| v * v * v,
        |v| 3.0 * v * v,
        |v| 6.0 * v,
    ));
    let f = Expr::external(cube, x(0)) * x(1);
    let p = [2.0, 0.5];
    let mut ctx = EvalContext::new();
    let (v, d) = f.ad_forward(&mut ctx, 0, &p, &[1.0, 0.0]).unwrap();
    assert_eq!(v, 4.0);
    assert_eq!(d, 6.0);

    let mut df = [0.0; 2];
    let mut ddf = [0.0; 2];
    f.ad_backward2(&ctx, 0, 1.0, 0.0, &mut df, &mut ddf).unwrap();
    assert_eq!(df, [6.0, 8.0]);
    // ∂²f/∂x0² = 6 x0 x1 = 6, ∂²f/∂x1∂x0 = 3 x0² = 12
    assert_eq!(ddf, [6.0, 12.0]);

    assert!(!f.is_symbolic());
    assert!(matches!(
        f.differentiate(0),
        Err(ExprError::NotSymbolic { .. })
    ));
}

#[test]
fn test_domain_errors_surface() {
    let mut ctx = EvalContext::new();
    let err = x(0).asin().evaluate(&mut ctx, 0, &[2.0]).unwrap_err();
    assert!(err.is_domain());
    let err = x(0).powf(0.5).evaluate(&mut ctx, 0, &[-1.0]).unwrap_err();
    assert!(err.is_domain());
    assert!(matches!(
        x(3).evaluate(&mut ctx, 0, &[1.0]),
        Err(ExprError::IndexOutOfRange { index: 3, len: 1 })
    ));
}
