//! Structural classification of expression DAGs
//!
//! Dependency, linearity, polynomiality and rationality are pure predicates
//! over the DAG. Monotonicity and curvature are conservative bottom-up
//! classifications; an explicit override on a node (`set_monotonicity`,
//! `set_curvature`) wins over anything derived for that node.
//!
//! All queries walk a DAG once per call, memoizing by node id, so heavily
//! shared expressions stay linear in the number of distinct nodes.

use std::sync::atomic::Ordering;

use rustc_hash::FxHashMap;

use crate::node::{Expr, ExprKind, NeutralElement, Variable, VariableId, VariableType};
use crate::ops::BinaryOp;
use crate::traits::is_even;

// =============================================================================
// CLASSIFICATION TYPES
// =============================================================================

/// Curvature of an expression over its domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Curvature {
    Unknown = 0,
    Constant,
    Affine,
    Convex,
    Concave,
    NeitherConvexNorConcave,
}

impl Curvature {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Curvature::Constant,
            2 => Curvature::Affine,
            3 => Curvature::Convex,
            4 => Curvature::Concave,
            5 => Curvature::NeitherConvexNorConcave,
            _ => Curvature::Unknown,
        }
    }

    /// Curvature of `-f`
    pub fn negate(self) -> Self {
        match self {
            Curvature::Convex => Curvature::Concave,
            Curvature::Concave => Curvature::Convex,
            other => other,
        }
    }

    pub fn is_convex(self) -> bool {
        matches!(
            self,
            Curvature::Constant | Curvature::Affine | Curvature::Convex
        )
    }

    pub fn is_concave(self) -> bool {
        matches!(
            self,
            Curvature::Constant | Curvature::Affine | Curvature::Concave
        )
    }

    /// Curvature of `f + g`
    pub fn sum(self, other: Curvature) -> Curvature {
        if self == Curvature::Constant {
            return other;
        }
        if other == Curvature::Constant {
            return self;
        }
        match (
            self.is_convex() && other.is_convex(),
            self.is_concave() && other.is_concave(),
        ) {
            (true, true) => Curvature::Affine,
            (true, false) => Curvature::Convex,
            (false, true) => Curvature::Concave,
            (false, false) => Curvature::NeitherConvexNorConcave,
        }
    }

    /// Curvature of `c * f` for a known scalar `c`
    pub fn scale(self, c: f64) -> Curvature {
        if c == 0.0 {
            Curvature::Constant
        } else if c > 0.0 {
            self
        } else {
            self.negate()
        }
    }
}

/// Monotonicity of an expression with respect to all its variables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Monotonicity {
    Unknown = 0,
    Constant,
    NonDecreasing,
    NonIncreasing,
    NonMonotonic,
}

impl Monotonicity {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Monotonicity::Constant,
            2 => Monotonicity::NonDecreasing,
            3 => Monotonicity::NonIncreasing,
            4 => Monotonicity::NonMonotonic,
            _ => Monotonicity::Unknown,
        }
    }

    /// Monotonicity of `-f`
    pub fn negate(self) -> Self {
        match self {
            Monotonicity::NonDecreasing => Monotonicity::NonIncreasing,
            Monotonicity::NonIncreasing => Monotonicity::NonDecreasing,
            other => other,
        }
    }

    /// Monotonicity of `f + g`
    pub fn sum(self, other: Monotonicity) -> Monotonicity {
        match (self, other) {
            (Monotonicity::Constant, m) | (m, Monotonicity::Constant) => m,
            (a, b) if a == b => a,
            _ => Monotonicity::NonMonotonic,
        }
    }

    /// Monotonicity of `c * f` for a known scalar `c`
    pub fn scale(self, c: f64) -> Monotonicity {
        if c == 0.0 {
            Monotonicity::Constant
        } else if c > 0.0 {
            self
        } else {
            self.negate()
        }
    }

    /// Monotonicity of `f(g)` where `self` is the outer function's
    fn compose(self, inner: Monotonicity) -> Monotonicity {
        match (self, inner) {
            (_, Monotonicity::Constant) => Monotonicity::Constant,
            (Monotonicity::NonDecreasing, m) => m,
            (Monotonicity::NonIncreasing, m) => m.negate(),
            _ => Monotonicity::NonMonotonic,
        }
    }
}

// =============================================================================
// DEPENDENCY AND ALGEBRAIC STRUCTURE
// =============================================================================

/// Memoized structural predicates over one variable selection
struct StructureQuery<'a> {
    is_selected: &'a dyn Fn(&Variable) -> bool,
    depends: FxHashMap<u64, bool>,
    linear: FxHashMap<u64, bool>,
    polynomial: FxHashMap<u64, bool>,
    rational: FxHashMap<u64, bool>,
}

impl<'a> StructureQuery<'a> {
    fn new(is_selected: &'a dyn Fn(&Variable) -> bool) -> Self {
        StructureQuery {
            is_selected,
            depends: FxHashMap::default(),
            linear: FxHashMap::default(),
            polynomial: FxHashMap::default(),
            rational: FxHashMap::default(),
        }
    }

    fn depends(&mut self, e: &Expr) -> bool {
        if let Some(&hit) = self.depends.get(&e.id()) {
            return hit;
        }
        let result = match e.kind() {
            ExprKind::Variable(v) => (self.is_selected)(v),
            ExprKind::Constant { .. } => false,
            // x^0 == 1 whatever x is
            ExprKind::PowerInt { exponent: 0, .. } => false,
            ExprKind::Unary { arg, .. }
            | ExprKind::PowerInt { arg, .. }
            | ExprKind::External { arg, .. } => self.depends(arg),
            ExprKind::Binary { lhs, rhs, .. } => self.depends(lhs) || self.depends(rhs),
        };
        self.depends.insert(e.id(), result);
        result
    }

    fn linear(&mut self, e: &Expr) -> bool {
        if let Some(&hit) = self.linear.get(&e.id()) {
            return hit;
        }
        // The exponent rule applies even when the base is a coefficient
        let result = match e.kind() {
            ExprKind::PowerInt { arg, exponent } => {
                *exponent == 0 || (*exponent == 1 && self.linear(arg))
            }
            _ if !self.depends(e) => true,
            ExprKind::Variable(_) | ExprKind::Constant { .. } => true,
            ExprKind::Binary { op, lhs, rhs } => match op {
                BinaryOp::Add | BinaryOp::Sub => self.linear(lhs) && self.linear(rhs),
                BinaryOp::Mul => {
                    (!self.depends(lhs) && self.linear(rhs))
                        || (!self.depends(rhs) && self.linear(lhs))
                }
                BinaryOp::Div => !self.depends(rhs) && self.linear(lhs),
                BinaryOp::Pow => rhs.as_constant() == Some(1.0) && self.linear(lhs),
            },
            ExprKind::Unary { .. } | ExprKind::External { .. } => false,
        };
        self.linear.insert(e.id(), result);
        result
    }

    fn polynomial(&mut self, e: &Expr) -> bool {
        if let Some(&hit) = self.polynomial.get(&e.id()) {
            return hit;
        }
        let result = match e.kind() {
            ExprKind::PowerInt { arg, exponent } => *exponent >= 0 && self.polynomial(arg),
            _ if !self.depends(e) => true,
            ExprKind::Variable(_) | ExprKind::Constant { .. } => true,
            ExprKind::Binary { op, lhs, rhs } => match op {
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
                    self.polynomial(lhs) && self.polynomial(rhs)
                }
                BinaryOp::Div => !self.depends(rhs) && self.polynomial(lhs),
                BinaryOp::Pow => {
                    rhs.as_constant()
                        .is_some_and(|b| b >= 0.0 && b.fract() == 0.0)
                        && self.polynomial(lhs)
                }
            },
            ExprKind::Unary { .. } | ExprKind::External { .. } => false,
        };
        self.polynomial.insert(e.id(), result);
        result
    }

    fn rational(&mut self, e: &Expr) -> bool {
        if let Some(&hit) = self.rational.get(&e.id()) {
            return hit;
        }
        let result = !self.depends(e)
            || match e.kind() {
                ExprKind::Variable(_) | ExprKind::Constant { .. } => true,
                ExprKind::PowerInt { arg, .. } => self.rational(arg),
                ExprKind::Binary { op, lhs, rhs } => match op {
                    BinaryOp::Pow => {
                        rhs.as_constant().is_some_and(|b| b.fract() == 0.0) && self.rational(lhs)
                    }
                    _ => self.rational(lhs) && self.rational(rhs),
                },
                ExprKind::Unary { .. } | ExprKind::External { .. } => false,
            };
        self.rational.insert(e.id(), result);
        result
    }
}

impl Expr {
    /// Neutral-element classification.
    ///
    /// Constants report their literal classification; every other node is
    /// `Neither`. Factory helpers use this to fold `0 + x`, `1 * x`, ...
    pub fn is_one_or_zero(&self) -> NeutralElement {
        match self.kind() {
            ExprKind::Constant { neutral, .. } => *neutral,
            _ => NeutralElement::Neither,
        }
    }

    /// True if the expression depends on any of `vars`
    pub fn is_depending_on(&self, vars: &[VariableId]) -> bool {
        StructureQuery::new(&|v: &Variable| vars.contains(&v.id)).depends(self)
    }

    /// True if the expression depends on any variable of the given type
    pub fn depends_on_type(&self, var_type: VariableType) -> bool {
        StructureQuery::new(&|v: &Variable| v.id.var_type == var_type).depends(self)
    }

    /// True if the expression depends on the variable at global index `index`
    pub fn depends_on_index(&self, index: usize) -> bool {
        StructureQuery::new(&|v: &Variable| v.index == index).depends(self)
    }

    /// True if the expression is affine in `vars`
    pub fn is_linear_in(&self, vars: &[VariableId]) -> bool {
        StructureQuery::new(&|v: &Variable| vars.contains(&v.id)).linear(self)
    }

    /// True if the expression is a polynomial in `vars`
    pub fn is_polynomial_in(&self, vars: &[VariableId]) -> bool {
        StructureQuery::new(&|v: &Variable| vars.contains(&v.id)).polynomial(self)
    }

    /// True if the expression is a rational function of `vars`
    pub fn is_rational_in(&self, vars: &[VariableId]) -> bool {
        StructureQuery::new(&|v: &Variable| vars.contains(&v.id)).rational(self)
    }

    /// False if any node of the subtree only has a numeric implementation
    pub fn is_symbolic(&self) -> bool {
        !self
            .post_order()
            .iter()
            .any(|n| matches!(n.kind(), ExprKind::External { .. }))
    }

    // =========================================================================
    // MONOTONICITY AND CURVATURE
    // =========================================================================

    /// Monotonicity with respect to all variables (override first)
    pub fn monotonicity(&self) -> Monotonicity {
        monotonicity_rec(self, &mut FxHashMap::default())
    }

    /// Curvature over the domain (override first)
    pub fn curvature(&self) -> Curvature {
        curvature_rec(self, &mut FxHashMap::default())
    }

    /// Pin this node's monotonicity; `Unknown` clears the override
    pub fn set_monotonicity(&self, m: Monotonicity) {
        self.0.monotonicity.store(m as u8, Ordering::Relaxed);
    }

    /// Pin this node's curvature; `Unknown` clears the override
    pub fn set_curvature(&self, c: Curvature) {
        self.0.curvature.store(c as u8, Ordering::Relaxed);
    }
}

fn monotonicity_rec(e: &Expr, memo: &mut FxHashMap<u64, Monotonicity>) -> Monotonicity {
    let pinned = Monotonicity::from_u8(e.0.monotonicity.load(Ordering::Relaxed));
    if pinned != Monotonicity::Unknown {
        return pinned;
    }
    if let Some(&hit) = memo.get(&e.id()) {
        return hit;
    }

    let result = match e.kind() {
        ExprKind::Constant { .. } => Monotonicity::Constant,
        ExprKind::Variable(_) => Monotonicity::NonDecreasing,
        ExprKind::Unary { op, arg } => op
            .definition()
            .monotonicity
            .compose(monotonicity_rec(arg, memo)),
        ExprKind::PowerInt { arg, exponent } => {
            let m = monotonicity_rec(arg, memo);
            if m == Monotonicity::Constant || *exponent == 0 {
                Monotonicity::Constant
            } else if is_even(*exponent) || *exponent < 0 {
                Monotonicity::NonMonotonic
            } else {
                m
            }
        }
        ExprKind::External { arg, .. } => {
            if monotonicity_rec(arg, memo) == Monotonicity::Constant {
                Monotonicity::Constant
            } else {
                Monotonicity::NonMonotonic
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let ma = monotonicity_rec(lhs, memo);
            let mb = monotonicity_rec(rhs, memo);
            match op {
                BinaryOp::Add => ma.sum(mb),
                BinaryOp::Sub => ma.sum(mb.negate()),
                BinaryOp::Mul => match (lhs.as_constant(), rhs.as_constant()) {
                    (Some(c), _) => mb.scale(c),
                    (_, Some(c)) => ma.scale(c),
                    _ if ma == Monotonicity::Constant && mb == Monotonicity::Constant => {
                        Monotonicity::Constant
                    }
                    _ => Monotonicity::NonMonotonic,
                },
                BinaryOp::Div => match rhs.as_constant() {
                    Some(c) if c != 0.0 => ma.scale(1.0 / c),
                    _ if ma == Monotonicity::Constant && mb == Monotonicity::Constant => {
                        Monotonicity::Constant
                    }
                    _ => Monotonicity::NonMonotonic,
                },
                BinaryOp::Pow => {
                    if ma == Monotonicity::Constant && mb == Monotonicity::Constant {
                        Monotonicity::Constant
                    } else {
                        Monotonicity::NonMonotonic
                    }
                }
            }
        }
    };
    memo.insert(e.id(), result);
    result
}

/// Composition rule `f(g)` for a scalar function with known shape
fn compose_curvature(outer: Curvature, outer_mono: Monotonicity, inner: Curvature) -> Curvature {
    if inner == Curvature::Constant {
        return Curvature::Constant;
    }
    let nondecreasing = outer_mono == Monotonicity::NonDecreasing;
    let nonincreasing = outer_mono == Monotonicity::NonIncreasing;
    let affine = inner == Curvature::Affine;

    let convex = outer.is_convex()
        && (affine
            || (nondecreasing && inner.is_convex())
            || (nonincreasing && inner.is_concave()));
    let concave = outer.is_concave()
        && (affine
            || (nondecreasing && inner.is_concave())
            || (nonincreasing && inner.is_convex()));

    match (convex, concave) {
        (true, true) => Curvature::Affine,
        (true, false) => Curvature::Convex,
        (false, true) => Curvature::Concave,
        (false, false) => Curvature::NeitherConvexNorConcave,
    }
}

fn curvature_rec(e: &Expr, memo: &mut FxHashMap<u64, Curvature>) -> Curvature {
    let pinned = Curvature::from_u8(e.0.curvature.load(Ordering::Relaxed));
    if pinned != Curvature::Unknown {
        return pinned;
    }
    if let Some(&hit) = memo.get(&e.id()) {
        return hit;
    }

    let result = match e.kind() {
        ExprKind::Constant { .. } => Curvature::Constant,
        ExprKind::Variable(_) => Curvature::Affine,
        ExprKind::Unary { op, arg } => {
            let def = op.definition();
            compose_curvature(def.curvature, def.monotonicity, curvature_rec(arg, memo))
        }
        ExprKind::PowerInt { arg, exponent } => {
            let cc = curvature_rec(arg, memo);
            let n = *exponent;
            if cc == Curvature::Constant {
                Curvature::Constant
            } else if is_even(n) {
                if n < 0 {
                    Curvature::NeitherConvexNorConcave
                } else if n == 0 {
                    Curvature::Constant
                } else if cc == Curvature::Affine {
                    Curvature::Convex
                } else {
                    Curvature::NeitherConvexNorConcave
                }
            } else if n == 1 {
                cc
            } else {
                Curvature::NeitherConvexNorConcave
            }
        }
        ExprKind::External { arg, .. } => {
            if curvature_rec(arg, memo) == Curvature::Constant {
                Curvature::Constant
            } else {
                Curvature::NeitherConvexNorConcave
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let ca = curvature_rec(lhs, memo);
            let cb = curvature_rec(rhs, memo);
            let both_constant = ca == Curvature::Constant && cb == Curvature::Constant;
            match op {
                BinaryOp::Add => ca.sum(cb),
                BinaryOp::Sub => ca.sum(cb.negate()),
                BinaryOp::Mul => match (lhs.as_constant(), rhs.as_constant()) {
                    (Some(c), _) => cb.scale(c),
                    (_, Some(c)) => ca.scale(c),
                    _ if both_constant => Curvature::Constant,
                    // constant-valued factor of unknown sign
                    _ if (ca == Curvature::Constant && cb == Curvature::Affine)
                        || (cb == Curvature::Constant && ca == Curvature::Affine) =>
                    {
                        Curvature::Affine
                    }
                    _ => Curvature::NeitherConvexNorConcave,
                },
                BinaryOp::Div => match rhs.as_constant() {
                    Some(c) if c != 0.0 => ca.scale(1.0 / c),
                    _ if both_constant => Curvature::Constant,
                    _ => Curvature::NeitherConvexNorConcave,
                },
                BinaryOp::Pow => {
                    if both_constant {
                        Curvature::Constant
                    } else {
                        Curvature::NeitherConvexNorConcave
                    }
                }
            }
        }
    };
    memo.insert(e.id(), result);
    result
}
