use crate::types::{to_var, Lit, Var};

use super::map::{var_map, VarMap};

#[derive(Clone, Copy)]
struct VarData {
    value: bool,
    level: usize,
}

/// The tri-state variable mapping together with the trail and the
/// implication graph: each propagated variable remembers the clauses that
/// forced it, decision variables have no reasons.
pub struct Assignment {
    data: VarMap<Option<VarData>>,
    reasons: VarMap<Vec<usize>>,
    is_final: VarMap<bool>,
    trail: Vec<Lit>,
}

impl Assignment {
    pub fn new(var_count: usize) -> Self {
        Self {
            data: var_map(var_count),
            reasons: var_map(var_count),
            is_final: var_map(var_count),
            trail: vec![],
        }
    }

    pub fn var_count(&self) -> usize {
        self.data.len() - 1
    }

    pub fn eval(&self, lit: Lit) -> Option<bool> {
        self.data[to_var(lit)]
            .as_ref()
            .map(|data| data.value == lit.is_positive())
    }

    pub fn value(&self, var: Var) -> Option<bool> {
        self.data[var].as_ref().map(|data| data.value)
    }

    /// Decision level the variable was assigned at; 0 when unassigned
    /// or assigned before the search started.
    pub fn level(&self, var: Var) -> usize {
        self.data[var].as_ref().map_or(0, |data| data.level)
    }

    pub fn assign(&mut self, lit: Lit, level: usize) {
        debug_assert!(self.eval(lit).is_none());

        self.trail.push(lit);
        self.data[to_var(lit)] = Some(VarData {
            value: lit.is_positive(),
            level,
        });
    }

    pub fn add_reason(&mut self, var: Var, i_clause: usize) {
        debug_assert!(self.value(var).is_some());
        self.reasons[var].push(i_clause);
    }

    pub fn reasons(&self, var: Var) -> &[usize] {
        &self.reasons[var]
    }

    pub fn is_final(&self, var: Var) -> bool {
        self.is_final[var]
    }

    /// Marks the variable's current value as settled: no later unwind
    /// will clear it.
    pub fn set_final(&mut self, var: Var) {
        debug_assert!(self.value(var).is_some());
        self.is_final[var] = true;
    }

    pub fn trail(&self) -> &[Lit] {
        &self.trail
    }

    pub fn first_unassigned(&self) -> Option<Var> {
        (1..=self.var_count()).find(|&var| self.value(var).is_none())
    }

    /// Pops the trail back through `dec_var`, clearing every popped variable
    /// that was assigned at `target` or above and is not final. Variables
    /// that keep their assignment are put back on the trail in their
    /// original order, so the trail keeps listing exactly the assigned
    /// variables.
    pub fn unwind(&mut self, dec_var: Var, target: usize) {
        let mut kept = vec![];
        while let Some(lit) = self.trail.pop() {
            let var = to_var(lit);
            if var == dec_var {
                self.clear(var);
                break;
            }
            if self.is_final[var] || self.level(var) < target {
                kept.push(lit);
            } else {
                self.clear(var);
            }
        }
        kept.reverse();
        self.trail.append(&mut kept);
    }

    /// Clears every non-final variable assigned above `target`. Assignments
    /// at or below the target keep their place on the trail.
    pub fn unwind_to(&mut self, target: usize) {
        let mut kept = vec![];
        while let Some(lit) = self.trail.pop() {
            let var = to_var(lit);
            if self.is_final[var] || self.level(var) <= target {
                kept.push(lit);
            } else {
                self.clear(var);
            }
        }
        kept.reverse();
        self.trail = kept;
    }

    fn clear(&mut self, var: Var) {
        self.data[var] = None;
        self.reasons[var].clear();
    }
}
