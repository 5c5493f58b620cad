//! Expression DAG nodes.
//!
//! This module defines:
//! - `Expr` - a reference-counted handle to an immutable operator node
//! - `ExprKind` - the closed set of operator kinds (variable, constant,
//!   unary function, integer power, binary arithmetic, external function)
//! - `Variable` / `VariableId` / `VariableType` - variable leaves
//!
//! # Architecture
//!
//! ## Shared subexpressions
//! Children are held as `Expr` handles (`Arc<Node>`), so a common subterm can
//! be referenced from any number of parents. Cloning an `Expr` never copies
//! the node; use [`Expr::shallow_copy`] for a new node identity.
//!
//! ## Node identity
//! Every node carries a process-unique id. Evaluation buffers, derivative
//! memo tables and the index registry are keyed by it, so shared nodes are
//! visited once per pass.
//!
//! ## Mutable state
//! Algebraic meaning never changes after construction. The only mutable
//! parts are the explicit classification overrides and the once-only
//! derivative cache.

mod external;
mod factory;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use rustc_hash::FxHashSet;

use crate::classify::{Curvature, Monotonicity};
use crate::derivative::Partials;
use crate::ops::{BinaryOp, UnaryOp};

pub use external::ExternalFunction;
pub use factory::{my_add, my_power, my_power_int, my_prod, my_quotient, my_sub, my_unary, neg};

static NODE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NODE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

// =============================================================================
// VARIABLES
// =============================================================================

/// Category of an optimization/simulation variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VariableType {
    DifferentialState,
    AlgebraicState,
    Control,
    IntegerControl,
    Parameter,
    IntegerParameter,
    Disturbance,
    Time,
    IntermediateState,
    DifferentialStateDerivative,
    OnlineData,
}

impl VariableType {
    /// Short prefix used when printing variables
    pub fn prefix(self) -> &'static str {
        match self {
            VariableType::DifferentialState => "xd",
            VariableType::AlgebraicState => "xa",
            VariableType::Control => "u",
            VariableType::IntegerControl => "v",
            VariableType::Parameter => "p",
            VariableType::IntegerParameter => "q",
            VariableType::Disturbance => "w",
            VariableType::Time => "t",
            VariableType::IntermediateState => "a",
            VariableType::DifferentialStateDerivative => "dx",
            VariableType::OnlineData => "od",
        }
    }
}

/// Identity of a variable: its type and component within that type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId {
    pub var_type: VariableType,
    pub component: usize,
}

impl VariableId {
    pub fn new(var_type: VariableType, component: usize) -> Self {
        VariableId {
            var_type,
            component,
        }
    }
}

/// A variable leaf: identity plus its slot in the global value vector `x`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variable {
    pub id: VariableId,
    /// Position of this variable in the value/seed vectors
    pub index: usize,
}

/// Algebraic neutral-element classification of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NeutralElement {
    Zero,
    One,
    Neither,
}

/// Type tag of a node, stable for the node's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorName {
    Variable,
    Constant,
    Unary(UnaryOp),
    PowerInt,
    Binary(BinaryOp),
    External,
}

// =============================================================================
// EXPR
// =============================================================================

/// The operator kinds an expression node can take
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Variable leaf
    Variable(Variable),

    /// Numeric literal with its neutral-element classification
    Constant { value: f64, neutral: NeutralElement },

    /// Smooth elementary function of one argument
    Unary { op: UnaryOp, arg: Expr },

    /// `arg^exponent` for an integer exponent
    PowerInt { arg: Expr, exponent: i32 },

    /// Binary arithmetic (including real-valued power)
    Binary { op: BinaryOp, lhs: Expr, rhs: Expr },

    /// Opaque numeric function of one argument
    External {
        function: Arc<ExternalFunction>,
        arg: Expr,
    },
}

pub(crate) struct Node {
    pub(crate) id: u64,
    pub(crate) kind: ExprKind,
    pub(crate) curvature: AtomicU8,
    pub(crate) monotonicity: AtomicU8,
    pub(crate) partials: OnceLock<Partials>,
    /// Set once every node of this subtree carries its partials
    pub(crate) derivative_ready: AtomicBool,
}

/// Shared handle to an expression node
#[derive(Clone)]
pub struct Expr(pub(crate) Arc<Node>);

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr(Arc::new(Node {
            id: next_id(),
            kind,
            curvature: AtomicU8::new(Curvature::Unknown as u8),
            monotonicity: AtomicU8::new(Monotonicity::Unknown as u8),
            partials: OnceLock::new(),
            derivative_ready: AtomicBool::new(false),
        }))
    }

    // Convenience constructors (no simplification, see `factory` for that)

    /// Create a variable leaf addressing `x[index]`
    pub fn variable(var_type: VariableType, component: usize, index: usize) -> Self {
        Expr::new(ExprKind::Variable(Variable {
            id: VariableId::new(var_type, component),
            index,
        }))
    }

    /// Create a numeric constant; its neutral element is read off the value
    pub fn constant(value: f64) -> Self {
        let neutral = if value == 0.0 {
            NeutralElement::Zero
        } else if value == 1.0 {
            NeutralElement::One
        } else {
            NeutralElement::Neither
        };
        Expr::new(ExprKind::Constant { value, neutral })
    }

    pub fn zero() -> Self {
        Expr::constant(0.0)
    }

    pub fn one() -> Self {
        Expr::constant(1.0)
    }

    pub fn unary(op: UnaryOp, arg: Expr) -> Self {
        Expr::new(ExprKind::Unary { op, arg })
    }

    pub fn power_int(arg: Expr, exponent: i32) -> Self {
        Expr::new(ExprKind::PowerInt { arg, exponent })
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::new(ExprKind::Binary { op, lhs, rhs })
    }

    pub fn external(function: Arc<ExternalFunction>, arg: Expr) -> Self {
        Expr::new(ExprKind::External { function, arg })
    }

    // Accessors

    /// Process-unique node id (not used for equality)
    #[inline]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    #[inline]
    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    /// The node's type tag
    pub fn name(&self) -> OperatorName {
        match &self.0.kind {
            ExprKind::Variable(_) => OperatorName::Variable,
            ExprKind::Constant { .. } => OperatorName::Constant,
            ExprKind::Unary { op, .. } => OperatorName::Unary(*op),
            ExprKind::PowerInt { .. } => OperatorName::PowerInt,
            ExprKind::Binary { op, .. } => OperatorName::Binary(*op),
            ExprKind::External { .. } => OperatorName::External,
        }
    }

    /// Value of a constant node
    pub fn as_constant(&self) -> Option<f64> {
        match &self.0.kind {
            ExprKind::Constant { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// The variable this node is, if it is a bare variable leaf
    pub fn as_variable(&self) -> Option<&Variable> {
        match &self.0.kind {
            ExprKind::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_variable(&self) -> bool {
        self.as_variable().is_some()
    }

    /// True if both handles refer to the same node
    #[inline]
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of handles currently sharing this node
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Duplicate this node under a new identity.
    ///
    /// Scalar fields, classification overrides and the derivative cache are
    /// copied; child handles are shared, not copied.
    pub fn shallow_copy(&self) -> Expr {
        let partials = OnceLock::new();
        if let Some(p) = self.0.partials.get() {
            let _ = partials.set(p.clone());
        }
        Expr(Arc::new(Node {
            id: next_id(),
            kind: self.0.kind.clone(),
            curvature: AtomicU8::new(self.0.curvature.load(Ordering::Relaxed)),
            monotonicity: AtomicU8::new(self.0.monotonicity.load(Ordering::Relaxed)),
            partials,
            derivative_ready: AtomicBool::new(self.0.derivative_ready.load(Ordering::Acquire)),
        }))
    }

    /// Direct children, left to right
    pub fn children(&self) -> impl Iterator<Item = &Expr> {
        let pair: [Option<&Expr>; 2] = match &self.0.kind {
            ExprKind::Variable(_) | ExprKind::Constant { .. } => [None, None],
            ExprKind::Unary { arg, .. }
            | ExprKind::PowerInt { arg, .. }
            | ExprKind::External { arg, .. } => [Some(arg), None],
            ExprKind::Binary { lhs, rhs, .. } => [Some(lhs), Some(rhs)],
        };
        pair.into_iter().flatten()
    }

    // Analysis methods

    /// Every distinct node of the DAG, children before parents
    pub fn post_order(&self) -> Vec<Expr> {
        fn visit(e: &Expr, seen: &mut FxHashSet<u64>, out: &mut Vec<Expr>) {
            if !seen.insert(e.id()) {
                return;
            }
            for child in e.children() {
                visit(child, seen, out);
            }
            out.push(e.clone());
        }

        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        visit(self, &mut seen, &mut out);
        out
    }

    /// Number of distinct nodes (shared subexpressions count once)
    pub fn node_count(&self) -> usize {
        self.post_order().len()
    }

    /// Length of the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        1 + self.children().map(Expr::depth).max().unwrap_or(0)
    }

    // Elementary functions

    pub fn powi(&self, exponent: i32) -> Expr {
        Expr::power_int(self.clone(), exponent)
    }

    pub fn powf(&self, exponent: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Pow, self.clone(), exponent.into())
    }
}

macro_rules! unary_methods {
    ($($method:ident => $op:ident),* $(,)?) => {
        impl Expr {
            $(
                #[doc = concat!("`", stringify!($method), "(self)`")]
                pub fn $method(&self) -> Expr {
                    Expr::unary(UnaryOp::$op, self.clone())
                }
            )*
        }
    };
}

unary_methods! {
    sin => Sin,
    cos => Cos,
    tan => Tan,
    asin => Asin,
    acos => Acos,
    atan => Atan,
    exp => Exp,
    ln => Log,
    sqrt => Sqrt,
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::constant(value)
    }
}

impl From<&Expr> for Expr {
    fn from(e: &Expr) -> Self {
        e.clone()
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expr")
            .field("id", &self.0.id)
            .field("kind", &self.0.kind)
            .finish()
    }
}

// Structural equality: same node, or same operator over equal children
impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (&self.0.kind, &other.0.kind) {
            (ExprKind::Variable(a), ExprKind::Variable(b)) => a == b,
            (ExprKind::Constant { value: a, .. }, ExprKind::Constant { value: b, .. }) => {
                a.to_bits() == b.to_bits()
            }
            (ExprKind::Unary { op: o1, arg: a1 }, ExprKind::Unary { op: o2, arg: a2 }) => {
                o1 == o2 && a1 == a2
            }
            (
                ExprKind::PowerInt {
                    arg: a1,
                    exponent: n1,
                },
                ExprKind::PowerInt {
                    arg: a2,
                    exponent: n2,
                },
            ) => n1 == n2 && a1 == a2,
            (
                ExprKind::Binary {
                    op: o1,
                    lhs: l1,
                    rhs: r1,
                },
                ExprKind::Binary {
                    op: o2,
                    lhs: l2,
                    rhs: r2,
                },
            ) => o1 == o2 && l1 == l2 && r1 == r2,
            (
                ExprKind::External {
                    function: f1,
                    arg: a1,
                },
                ExprKind::External {
                    function: f2,
                    arg: a2,
                },
            ) => Arc::ptr_eq(f1, f2) && a1 == a2,
            _ => false,
        }
    }
}
