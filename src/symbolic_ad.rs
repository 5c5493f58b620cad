//! Automatic differentiation on expression graphs.
//!
//! These sweeps produce derivative *expressions* rather than numbers, for
//! consumers that generate code or evaluate derivatives many times:
//!
//! - [`Expr::ad_forward_symbolic`] builds `∇f · seed` for a symbolic seed
//! - [`Expr::ad_backward_symbolic`] accumulates `seed · ∇f` into `df`
//! - [`Expr::ad_symmetric`] builds the forward products `∇f · S` and the
//!   projected Hessian `Sᵀ ∇²(l f) S` in one forward and one reverse sweep
//!
//! Variables are addressed by [`VariableId`]: position `i` of every seed or
//! result array belongs to `vars[i]`. Variables not listed are treated as
//! constants.
//!
//! The second-order sweep reduces every node to its local partials: a node
//! `φ(a, b)` with adjoint `λ` contributes
//! `λ (φ_aa FaFaᵀ + φ_ab (FaFbᵀ + FbFaᵀ) + φ_bb FbFbᵀ)` to the Hessian, where
//! `Fa`, `Fb` are the forward products of its arguments. Unary-like nodes are
//! the one-argument case of the same rule.

use rustc_hash::FxHashMap;

use crate::error::ExprError;
use crate::derivative::Partials;
use crate::node::{Expr, ExprKind, NeutralElement, VariableId, my_add, my_prod};

fn is_zero(e: &Expr) -> bool {
    e.is_one_or_zero() == NeutralElement::Zero
}

fn check_len(expected: usize, got: usize) -> Result<(), ExprError> {
    if expected == got {
        Ok(())
    } else {
        Err(ExprError::DimensionMismatch { expected, got })
    }
}

/// Memo of forward derivative expressions, one per node, for one direction.
///
/// Reusing the same `IntermediateStates` across calls lets derivatives of
/// different roots share the derivative of their common subexpressions. The
/// memo is tied to the variables and seed it was filled with and resets
/// itself when called with a different direction.
#[derive(Debug, Default, Clone)]
pub struct IntermediateStates {
    direction: Vec<(VariableId, u64)>,
    forward: FxHashMap<u64, Expr>,
}

impl IntermediateStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of memoized intermediate derivatives
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Derivative expression memoized for a node, if any
    pub fn get(&self, e: &Expr) -> Option<&Expr> {
        self.forward.get(&e.id())
    }

    fn bind(&mut self, vars: &[VariableId], seed: &[Expr]) {
        let direction: Vec<(VariableId, u64)> = vars
            .iter()
            .copied()
            .zip(seed.iter().map(Expr::id))
            .collect();
        if direction != self.direction {
            self.direction = direction;
            self.forward.clear();
        }
    }
}

/// Result of [`Expr::ad_symmetric`]
#[derive(Debug, Clone)]
pub struct SymmetricResult {
    /// `forward[j] = ∇f · S[:, j]`
    pub forward: Vec<Expr>,
    /// Packed lower triangle, `hessian[i(i+1)/2 + j]` for `j <= i`
    pub hessian: Vec<Expr>,
}

impl SymmetricResult {
    /// Number of seed directions
    pub fn dim(&self) -> usize {
        self.forward.len()
    }

    /// Hessian entry `(i, j)`; either triangle may be addressed
    pub fn hessian_entry(&self, i: usize, j: usize) -> Option<&Expr> {
        let (i, j) = if j > i { (j, i) } else { (i, j) };
        if i >= self.dim() {
            return None;
        }
        self.hessian.get(i * (i + 1) / 2 + j)
    }
}

fn unary_first(p: &Partials) -> &Expr {
    match p {
        Partials::Unary { first, .. } => first,
        _ => unreachable!("unary-like node with non-unary partials"),
    }
}

impl Expr {
    /// Forward-mode AD on the graph: `Σ_i ∂f/∂vars[i] · seed[i]`
    ///
    /// # Errors
    /// - `DimensionMismatch` if `vars` and `seed` differ in length
    /// - `NotSymbolic` if the DAG contains an external function
    pub fn ad_forward_symbolic(
        &self,
        vars: &[VariableId],
        seed: &[Expr],
        states: &mut IntermediateStates,
    ) -> Result<Expr, ExprError> {
        check_len(vars.len(), seed.len())?;
        self.init_derivative()?;
        states.bind(vars, seed);

        for node in self.post_order() {
            if states.forward.contains_key(&node.id()) {
                continue;
            }
            let d = match node.kind() {
                ExprKind::Variable(v) => vars
                    .iter()
                    .position(|id| *id == v.id)
                    .map_or_else(Expr::zero, |pos| seed[pos].clone()),
                ExprKind::Constant { .. } | ExprKind::PowerInt { exponent: 0, .. } => Expr::zero(),
                ExprKind::Binary { lhs, rhs, .. } => {
                    let da = states.forward[&lhs.id()].clone();
                    let db = states.forward[&rhs.id()].clone();
                    match node.partials()? {
                        Partials::Binary { first: [fa, fb], .. } => {
                            my_add(my_prod(fa.clone(), da), my_prod(fb.clone(), db))
                        }
                        _ => unreachable!("binary node with non-binary partials"),
                    }
                }
                ExprKind::Unary { arg, .. }
                | ExprKind::PowerInt { arg, .. }
                | ExprKind::External { arg, .. } => {
                    let da = states.forward[&arg.id()].clone();
                    my_prod(unary_first(node.partials()?).clone(), da)
                }
            };
            states.forward.insert(node.id(), d);
        }
        Ok(states.forward[&self.id()].clone())
    }

    /// Reverse-mode AD on the graph: `df[i] += seed · ∂f/∂vars[i]`
    ///
    /// # Errors
    /// - `DimensionMismatch` if `vars` and `df` differ in length
    /// - `NotSymbolic` if the DAG contains an external function
    pub fn ad_backward_symbolic(
        &self,
        vars: &[VariableId],
        seed: &Expr,
        df: &mut [Expr],
    ) -> Result<(), ExprError> {
        check_len(vars.len(), df.len())?;
        self.init_derivative()?;

        let mut adjoint: FxHashMap<u64, Expr> = FxHashMap::default();
        adjoint.insert(self.id(), seed.clone());

        for node in self.post_order().iter().rev() {
            let Some(s) = adjoint.remove(&node.id()) else {
                continue;
            };
            if is_zero(&s) {
                continue;
            }
            match node.kind() {
                ExprKind::Variable(v) => {
                    if let Some(pos) = vars.iter().position(|id| *id == v.id) {
                        df[pos] = my_add(df[pos].clone(), s);
                    }
                }
                ExprKind::Constant { .. } | ExprKind::PowerInt { exponent: 0, .. } => {}
                ExprKind::Binary { lhs, rhs, .. } => {
                    let Partials::Binary { first: [fa, fb], .. } = node.partials()? else {
                        unreachable!("binary node with non-binary partials");
                    };
                    push_adjoint(&mut adjoint, lhs, my_prod(s.clone(), fa.clone()));
                    push_adjoint(&mut adjoint, rhs, my_prod(s, fb.clone()));
                }
                ExprKind::Unary { arg, .. }
                | ExprKind::PowerInt { arg, .. }
                | ExprKind::External { arg, .. } => {
                    let fa = unary_first(node.partials()?).clone();
                    push_adjoint(&mut adjoint, arg, my_prod(s, fa));
                }
            }
        }
        Ok(())
    }

    /// Combined first- and second-order sweep.
    ///
    /// `s[i]` is the row of the seed matrix `S` belonging to `vars[i]`; every
    /// row has the same length `dim_s`. Returns `∇f · S` and the packed lower
    /// triangle of `l · Sᵀ ∇²f S`, and accumulates `ldf[i] += l · ∂f/∂vars[i]`.
    ///
    /// # Errors
    /// - `DimensionMismatch` if `s`, `ldf` and `vars` disagree, or the rows of
    ///   `s` have different lengths
    /// - `NotSymbolic` if the DAG contains an external function
    pub fn ad_symmetric(
        &self,
        vars: &[VariableId],
        l: &Expr,
        s: &[Vec<Expr>],
        ldf: &mut [Expr],
    ) -> Result<SymmetricResult, ExprError> {
        check_len(vars.len(), s.len())?;
        check_len(vars.len(), ldf.len())?;
        let dim_s = s.first().map_or(0, Vec::len);
        for row in s {
            check_len(dim_s, row.len())?;
        }
        self.init_derivative()?;

        let order = self.post_order();
        let zeros = || vec![Expr::zero(); dim_s];

        // Forward products ∇v · S for every node v
        let mut fwd: FxHashMap<u64, Vec<Expr>> = FxHashMap::default();
        for node in &order {
            let row = match node.kind() {
                ExprKind::Variable(v) => vars
                    .iter()
                    .position(|id| *id == v.id)
                    .map_or_else(zeros, |pos| s[pos].clone()),
                ExprKind::Constant { .. } | ExprKind::PowerInt { exponent: 0, .. } => zeros(),
                ExprKind::Binary { lhs, rhs, .. } => {
                    let Partials::Binary { first: [fa, fb], .. } = node.partials()? else {
                        unreachable!("binary node with non-binary partials");
                    };
                    fwd[&lhs.id()]
                        .iter()
                        .zip(&fwd[&rhs.id()])
                        .map(|(da, db)| {
                            my_add(
                                my_prod(fa.clone(), da.clone()),
                                my_prod(fb.clone(), db.clone()),
                            )
                        })
                        .collect()
                }
                ExprKind::Unary { arg, .. }
                | ExprKind::PowerInt { arg, .. }
                | ExprKind::External { arg, .. } => {
                    let fa = unary_first(node.partials()?);
                    fwd[&arg.id()]
                        .iter()
                        .map(|da| my_prod(fa.clone(), da.clone()))
                        .collect()
                }
            };
            fwd.insert(node.id(), row);
        }

        // Reverse sweep: adjoints and Hessian contributions
        let mut hessian = vec![Expr::zero(); dim_s * (dim_s + 1) / 2];
        let mut adjoint: FxHashMap<u64, Expr> = FxHashMap::default();
        adjoint.insert(self.id(), l.clone());

        for node in order.iter().rev() {
            let Some(lambda) = adjoint.remove(&node.id()) else {
                continue;
            };
            if is_zero(&lambda) {
                continue;
            }
            match node.kind() {
                ExprKind::Variable(v) => {
                    if let Some(pos) = vars.iter().position(|id| *id == v.id) {
                        ldf[pos] = my_add(ldf[pos].clone(), lambda);
                    }
                }
                ExprKind::Constant { .. } | ExprKind::PowerInt { exponent: 0, .. } => {}
                ExprKind::Binary { lhs, rhs, .. } => {
                    let Partials::Binary {
                        first: [fa, fb],
                        second: [faa, fab, fbb],
                    } = node.partials()?
                    else {
                        unreachable!("binary node with non-binary partials");
                    };
                    let (ra, rb) = (&fwd[&lhs.id()], &fwd[&rhs.id()]);
                    for i in 0..dim_s {
                        for j in 0..=i {
                            let mut term = Expr::zero();
                            if !is_zero(faa) {
                                term = my_add(term, product3(faa, &ra[i], &ra[j]));
                            }
                            if !is_zero(fab) {
                                let cross = my_add(
                                    my_prod(ra[i].clone(), rb[j].clone()),
                                    my_prod(rb[i].clone(), ra[j].clone()),
                                );
                                term = my_add(term, my_prod(fab.clone(), cross));
                            }
                            if !is_zero(fbb) {
                                term = my_add(term, product3(fbb, &rb[i], &rb[j]));
                            }
                            add_hessian(&mut hessian, i, j, &lambda, term);
                        }
                    }
                    push_adjoint(&mut adjoint, lhs, my_prod(lambda.clone(), fa.clone()));
                    push_adjoint(&mut adjoint, rhs, my_prod(lambda, fb.clone()));
                }
                ExprKind::Unary { arg, .. }
                | ExprKind::PowerInt { arg, .. }
                | ExprKind::External { arg, .. } => {
                    let Partials::Unary { first, second } = node.partials()? else {
                        unreachable!("unary-like node with non-unary partials");
                    };
                    if !is_zero(second) {
                        let ra = &fwd[&arg.id()];
                        for i in 0..dim_s {
                            for j in 0..=i {
                                add_hessian(
                                    &mut hessian,
                                    i,
                                    j,
                                    &lambda,
                                    product3(second, &ra[i], &ra[j]),
                                );
                            }
                        }
                    }
                    push_adjoint(&mut adjoint, arg, my_prod(lambda, first.clone()));
                }
            }
        }

        let forward = fwd.remove(&self.id()).unwrap_or_else(zeros);
        Ok(SymmetricResult { forward, hessian })
    }
}

fn push_adjoint(adjoint: &mut FxHashMap<u64, Expr>, target: &Expr, contribution: Expr) {
    if is_zero(&contribution) {
        return;
    }
    let slot = adjoint.entry(target.id()).or_insert_with(Expr::zero);
    *slot = my_add(slot.clone(), contribution);
}

fn product3(c: &Expr, a: &Expr, b: &Expr) -> Expr {
    my_prod(c.clone(), my_prod(a.clone(), b.clone()))
}

fn add_hessian(hessian: &mut [Expr], i: usize, j: usize, lambda: &Expr, term: Expr) {
    if is_zero(&term) {
        return;
    }
    let k = i * (i + 1) / 2 + j;
    hessian[k] = my_add(hessian[k].clone(), my_prod(lambda.clone(), term));
}
