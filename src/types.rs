pub type Lit = i32;

pub type Var = usize;

pub type Clause = Vec<Lit>;

pub fn to_var(lit: Lit) -> Var {
    debug_assert_ne!(lit, 0);
    lit.unsigned_abs() as Var
}

#[derive(Clone, Debug)]
pub struct Problem {
    pub var_count: usize,
    pub clauses: Vec<Clause>,
    /// Literals fixed by pure-literal elimination, asserted at level 0.
    pub prefill: Vec<Lit>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Solution {
    Sat {
        model: Vec<Lit>,
    },
    Unsat {
        /// Literals of the clause that was falsified last.
        conflict: Clause,
    },
    Unknown {
        /// Decisions pending when the deadline hit, oldest first.
        decisions: Vec<(Var, bool)>,
    },
}
