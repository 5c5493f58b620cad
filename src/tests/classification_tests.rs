use std::sync::Arc;

use crate::{
    Curvature, Expr, ExternalFunction, Monotonicity, NeutralElement, VariableId, VariableType,
};

fn x() -> Expr {
    Expr::variable(VariableType::DifferentialState, 0, 0)
}

fn u() -> Expr {
    Expr::variable(VariableType::Control, 0, 1)
}

fn ids() -> (VariableId, VariableId) {
    (
        VariableId::new(VariableType::DifferentialState, 0),
        VariableId::new(VariableType::Control, 0),
    )
}

#[test]
fn test_neutral_elements() {
    assert_eq!(Expr::zero().is_one_or_zero(), NeutralElement::Zero);
    assert_eq!(Expr::one().is_one_or_zero(), NeutralElement::One);
    assert_eq!(Expr::constant(-0.0).is_one_or_zero(), NeutralElement::Zero);
    assert_eq!(Expr::constant(2.0).is_one_or_zero(), NeutralElement::Neither);
    // Non-constants are never classified, even if they evaluate to 0
    assert_eq!((x() - x()).is_one_or_zero(), NeutralElement::Neither);
}

#[test]
fn test_dependency_queries() {
    let (xi, ui) = ids();
    let e = x().sin() * 2.0;
    assert!(e.is_depending_on(&[xi]));
    assert!(!e.is_depending_on(&[ui]));
    assert!(e.depends_on_type(VariableType::DifferentialState));
    assert!(!e.depends_on_type(VariableType::Control));
    assert!(e.depends_on_index(0));
    assert!(!e.depends_on_index(1));
    assert!(!Expr::constant(4.0).is_depending_on(&[xi, ui]));
}

#[test]
fn test_linearity_mixed_selection() {
    let (xi, ui) = ids();
    // u * x is linear in x alone but not jointly
    let e = u() * x() + 3.0;
    assert!(e.is_linear_in(&[xi]));
    assert!(e.is_linear_in(&[ui]));
    assert!(!e.is_linear_in(&[xi, ui]));
    assert!(e.is_polynomial_in(&[xi, ui]));

    assert!((x() / 4.0).is_linear_in(&[xi]));
    assert!(!(4.0 / x()).is_linear_in(&[xi]));
    assert!((4.0 / x()).is_rational_in(&[xi]));
    assert!(!(4.0 / x()).is_polynomial_in(&[xi]));

    // Functions of unselected variables are coefficients
    assert!((u().exp() * x()).is_linear_in(&[xi]));
    assert!(!x().exp().is_rational_in(&[xi]));
}

#[test]
fn test_real_power_structure() {
    let (xi, _) = ids();
    let x = x();
    let p3 = Expr::binary(crate::BinaryOp::Pow, x.clone(), Expr::constant(3.0));
    let ph = Expr::binary(crate::BinaryOp::Pow, x.clone(), Expr::constant(0.5));
    let pm = Expr::binary(crate::BinaryOp::Pow, x.clone(), Expr::constant(-2.0));
    assert!(p3.is_polynomial_in(&[xi]));
    assert!(!ph.is_rational_in(&[xi]));
    assert!(pm.is_rational_in(&[xi]));
    assert!(!pm.is_polynomial_in(&[xi]));
}

#[test]
fn test_unary_monotonicity_composition() {
    assert_eq!(x().exp().monotonicity(), Monotonicity::NonDecreasing);
    assert_eq!(x().acos().monotonicity(), Monotonicity::NonIncreasing);
    assert_eq!((-x()).exp().monotonicity(), Monotonicity::NonIncreasing);
    assert_eq!(x().acos().ln().monotonicity(), Monotonicity::NonIncreasing);
    assert_eq!(x().sin().monotonicity(), Monotonicity::NonMonotonic);
    assert_eq!(Expr::constant(0.3).sin().monotonicity(), Monotonicity::Constant);
    assert_eq!((x() + u()).monotonicity(), Monotonicity::NonDecreasing);
    assert_eq!((x() - u()).monotonicity(), Monotonicity::NonMonotonic);
}

#[test]
fn test_unary_curvature_composition() {
    assert_eq!(x().exp().curvature(), Curvature::Convex);
    assert_eq!(x().ln().curvature(), Curvature::Concave);
    assert_eq!(x().sqrt().ln().curvature(), Curvature::Concave);
    assert_eq!((-x().ln()).curvature(), Curvature::Convex);
    // exp of a concave argument has no known curvature
    assert_eq!(x().ln().exp().curvature(), Curvature::NeitherConvexNorConcave);
    assert_eq!((x().exp() + x().powi(2)).curvature(), Curvature::Convex);
    assert_eq!((x().exp() - x().powi(2)).curvature(), Curvature::NeitherConvexNorConcave);
    assert_eq!((x() * 3.0 + 1.0).curvature(), Curvature::Affine);
}

#[test]
fn test_overrides_take_precedence() {
    let e = x().sin();
    assert_eq!(e.monotonicity(), Monotonicity::NonMonotonic);
    e.set_monotonicity(Monotonicity::NonDecreasing);
    e.set_curvature(Curvature::Concave);
    assert_eq!(e.monotonicity(), Monotonicity::NonDecreasing);
    assert_eq!(e.curvature(), Curvature::Concave);

    // Parents see the pinned value
    assert_eq!(e.exp().monotonicity(), Monotonicity::NonDecreasing);

    e.set_monotonicity(Monotonicity::Unknown);
    e.set_curvature(Curvature::Unknown);
    assert_eq!(e.monotonicity(), Monotonicity::NonMonotonic);
}

#[test]
fn test_external_nodes() {
    let f = Arc::new(ExternalFunction::new("sq", |v| v * v, |v| 2.0 * v, |_| 2.0));
    let e = Expr::external(f.clone(), x());
    let (xi, ui) = ids();
    assert!(!e.is_symbolic());
    assert!(x().sin().is_symbolic());
    assert!(e.is_depending_on(&[xi]));
    assert!(!e.is_linear_in(&[xi]));
    assert!(e.is_linear_in(&[ui]));
    assert_eq!(e.monotonicity(), Monotonicity::NonMonotonic);
    assert_eq!(
        Expr::external(f, Expr::constant(1.0)).curvature(),
        Curvature::Constant
    );
}
