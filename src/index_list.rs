//! Registry of the variables and intermediate nodes of a set of DAGs.
//!
//! One registry is typically shared by many expressions (all components of a
//! model). Each variable gets a dense index within its [`VariableType`] in
//! first-seen order, and each distinct operator node registered through
//! [`Expr::load_indices`] gets an intermediate index. The registry remembers
//! which nodes it has walked, so a subtree shared by several parents or
//! several expressions is visited once.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::node::{Expr, ExprKind, VariableId, VariableType};

#[derive(Debug, Default, Clone)]
pub struct SymbolicIndexList {
    variables: FxHashMap<VariableId, usize>,
    counts: FxHashMap<VariableType, usize>,
    order: Vec<VariableId>,
    intermediates: FxHashMap<u64, usize>,
    enumerated: FxHashSet<u64>,
    loaded: FxHashSet<u64>,
}

impl SymbolicIndexList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variable.
    ///
    /// Returns `(already_present, index)` where `index` is the variable's
    /// position among the registered variables of the same type.
    pub fn add_new_element(&mut self, var_type: VariableType, component: usize) -> (bool, usize) {
        let id = VariableId::new(var_type, component);
        if let Some(&index) = self.variables.get(&id) {
            return (true, index);
        }
        let count = self.counts.entry(var_type).or_insert(0);
        let index = *count;
        *count += 1;
        self.variables.insert(id, index);
        self.order.push(id);
        (false, index)
    }

    /// Per-type index of a registered variable
    pub fn index_of(&self, id: VariableId) -> Option<usize> {
        self.variables.get(&id).copied()
    }

    /// Registered variables in registration order
    pub fn variables(&self) -> &[VariableId] {
        &self.order
    }

    /// Number of registered variables of one type
    pub fn number_of(&self, var_type: VariableType) -> usize {
        self.counts.get(&var_type).copied().unwrap_or(0)
    }

    /// Intermediate index of a node registered by `load_indices`
    pub fn intermediate_index(&self, e: &Expr) -> Option<usize> {
        self.intermediates.get(&e.id()).copied()
    }

    pub fn number_of_intermediates(&self) -> usize {
        self.intermediates.len()
    }
}

impl Expr {
    /// Register every distinct variable leaf of the DAG
    pub fn enumerate_variables(&self, list: &mut SymbolicIndexList) {
        if !list.enumerated.insert(self.id()) {
            return;
        }
        if let ExprKind::Variable(v) = self.kind() {
            list.add_new_element(v.id.var_type, v.id.component);
        }
        for child in self.children() {
            child.enumerate_variables(list);
        }
    }

    /// Register every distinct variable and operator node of the DAG.
    ///
    /// Operator nodes receive intermediate indices children-first. Returns
    /// this node's intermediate index, or `None` for a leaf.
    pub fn load_indices(&self, list: &mut SymbolicIndexList) -> Option<usize> {
        if list.loaded.insert(self.id()) {
            for child in self.children() {
                child.load_indices(list);
            }
            match self.kind() {
                ExprKind::Variable(v) => {
                    list.add_new_element(v.id.var_type, v.id.component);
                }
                ExprKind::Constant { .. } => {}
                _ => {
                    let next = list.intermediates.len();
                    list.intermediates.insert(self.id(), next);
                }
            }
        }
        list.intermediate_index(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_new_element() {
        let mut list = SymbolicIndexList::new();
        assert_eq!(list.add_new_element(VariableType::Control, 4), (false, 0));
        assert_eq!(list.add_new_element(VariableType::Control, 1), (false, 1));
        assert_eq!(list.add_new_element(VariableType::Parameter, 4), (false, 0));
        assert_eq!(list.add_new_element(VariableType::Control, 4), (true, 0));
        assert_eq!(list.number_of(VariableType::Control), 2);
        assert_eq!(list.number_of(VariableType::Time), 0);
    }

    #[test]
    fn test_enumerate_counts_shared_once() {
        let u = Expr::variable(VariableType::Control, 0, 0);
        let p = Expr::variable(VariableType::Parameter, 0, 1);
        let shared = &u * &p;
        let e1 = shared.sin();
        let e2 = &shared + &u;

        let mut list = SymbolicIndexList::new();
        e1.enumerate_variables(&mut list);
        e2.enumerate_variables(&mut list);
        assert_eq!(list.variables().len(), 2);
        assert_eq!(
            list.index_of(VariableId::new(VariableType::Parameter, 0)),
            Some(0)
        );
    }

    #[test]
    fn test_load_indices_numbers_intermediates() {
        let x = Expr::variable(VariableType::DifferentialState, 0, 0);
        let s = x.sin();
        let e = &s * &s;

        let mut list = SymbolicIndexList::new();
        let root = e.load_indices(&mut list);
        assert_eq!(list.number_of_intermediates(), 2);
        assert_eq!(list.intermediate_index(&s), Some(0));
        assert_eq!(root, Some(1));
        assert_eq!(x.load_indices(&mut list), None);

        // Second registration is a no-op
        assert_eq!(e.load_indices(&mut list), Some(1));
        assert_eq!(list.number_of_intermediates(), 2);
        assert_eq!(list.number_of(VariableType::DifferentialState), 1);
    }
}
