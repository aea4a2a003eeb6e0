use log::trace;

use crate::types::Lit;

use super::assignment::Assignment;

/// Status of a clause under the current assignment, judged from its
/// two watched literals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Satisfied,
    Unit(Lit),
    Falsified,
    Undetermined,
}

/// An immutable literal sequence plus two watch slots. Watches hold signed
/// literals; 0 marks a missing second watch (unit-length clauses).
pub struct Clause {
    lits: Vec<Lit>,
    watches: (Lit, Lit),
}

impl Clause {
    fn new(mut lits: Vec<Lit>) -> Self {
        lits.sort();
        lits.dedup();
        let watches = match lits[..] {
            [] => (0, 0),
            [l0] => (l0, 0),
            [l0, l1, ..] => (l0, l1),
        };
        Clause { lits, watches }
    }

    pub fn lits(&self) -> &[Lit] {
        &self.lits
    }

    pub fn watches(&self) -> (Lit, Lit) {
        self.watches
    }
}

/// Owns every clause, original and learned. Clauses are only ever appended
/// and are addressed by index, so an identity handed out once stays valid
/// for the lifetime of the store.
pub struct ClauseStore {
    clauses: Vec<Clause>,
    original_count: usize,
}

impl ClauseStore {
    pub fn new(clauses: Vec<Vec<Lit>>) -> Self {
        let clauses: Vec<Clause> = clauses.into_iter().map(Clause::new).collect();
        let original_count = clauses.len();
        Self {
            clauses,
            original_count,
        }
    }

    /// Appends a learned clause and returns its identity.
    pub fn add(&mut self, lits: Vec<Lit>) -> usize {
        let i = self.clauses.len();
        self.clauses.push(Clause::new(lits));
        i
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn get(&self, i: usize) -> &Clause {
        &self.clauses[i]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter()
    }

    pub fn learned(&self) -> &[Clause] {
        &self.clauses[self.original_count..]
    }

    /// Determines the clause's status by inspecting its watches, moving a
    /// falsified watch to an unassigned or satisfied literal when one
    /// exists. Only when both watches are falsified and neither can move is
    /// the whole clause falsified.
    pub fn classify(&mut self, i: usize, assignment: &Assignment) -> Status {
        let (w0, w1) = self.clauses[i].watches;
        if w0 == 0 {
            return Status::Falsified;
        }
        if w1 == 0 {
            // unit-length clause watches its only literal
            return match assignment.eval(w0) {
                None => Status::Unit(w0),
                Some(true) => Status::Satisfied,
                Some(false) => Status::Falsified,
            };
        }

        let mut status = [assignment.eval(w0), assignment.eval(w1)];
        if status.contains(&Some(true)) {
            return Status::Satisfied;
        }

        for slot in 0..2 {
            if status[slot] == Some(false) && self.retarget(i, slot, assignment) {
                let (w0, w1) = self.clauses[i].watches;
                status[slot] = assignment.eval(if slot == 0 { w0 } else { w1 });
            }
        }
        if status.contains(&Some(true)) {
            return Status::Satisfied;
        }

        let (w0, w1) = self.clauses[i].watches;
        match status {
            [None, None] => Status::Undetermined,
            [None, Some(false)] => Status::Unit(w0),
            [Some(false), None] => Status::Unit(w1),
            [Some(false), Some(false)] => Status::Falsified,
            _ => unreachable!(),
        }
    }

    /// Scans the clause for a literal that is not falsified and not already
    /// watched, and points the given watch slot at it.
    fn retarget(&mut self, i: usize, slot: usize, assignment: &Assignment) -> bool {
        let clause = &mut self.clauses[i];
        let (w0, w1) = clause.watches;

        for &lit in &clause.lits {
            if lit == w0 || lit == w1 {
                continue;
            }
            if assignment.eval(lit) != Some(false) {
                trace!("clause {i}: watch moved to {lit}");
                if slot == 0 {
                    clause.watches.0 = lit;
                } else {
                    clause.watches.1 = lit;
                }
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::{Assignment, ClauseStore, Status};

    #[test]
    fn unit_length_clause() {
        let mut store = ClauseStore::new(vec![vec![-1]]);
        let mut ass = Assignment::new(1);

        assert_eq!(store.classify(0, &ass), Status::Unit(-1));

        ass.assign(-1, 0);
        assert_eq!(store.classify(0, &ass), Status::Satisfied);

        ass.unwind(1, 0);
        ass.assign(1, 0);
        assert_eq!(store.classify(0, &ass), Status::Falsified);
    }

    #[test]
    fn duplicate_literals_collapse() {
        let mut store = ClauseStore::new(vec![vec![5, 5]]);
        let ass = Assignment::new(5);

        assert_eq!(store.get(0).lits(), &[5]);
        assert_eq!(store.classify(0, &ass), Status::Unit(5));
    }

    #[test]
    fn satisfied_watch_short_circuits() {
        let mut store = ClauseStore::new(vec![vec![1, 2, 3]]);
        let mut ass = Assignment::new(3);

        assert_eq!(store.classify(0, &ass), Status::Undetermined);

        ass.assign(2, 1);
        assert_eq!(store.classify(0, &ass), Status::Satisfied);
    }

    #[test]
    fn falsified_watch_is_retargeted() {
        let mut store = ClauseStore::new(vec![vec![1, 2, 3]]);
        let mut ass = Assignment::new(3);

        ass.assign(-1, 1);
        assert_eq!(store.classify(0, &ass), Status::Undetermined);
        // the falsified watch moved on to the free literal
        assert_eq!(store.get(0).watches(), (3, 2));
    }

    #[test]
    fn unit_when_no_retarget_possible() {
        let mut store = ClauseStore::new(vec![vec![1, 2, 3]]);
        let mut ass = Assignment::new(3);

        ass.assign(-1, 1);
        ass.assign(-3, 1);
        assert_eq!(store.classify(0, &ass), Status::Unit(2));
    }

    #[test]
    fn falsified_when_every_literal_is_false() {
        let mut store = ClauseStore::new(vec![vec![1, 2, 3]]);
        let mut ass = Assignment::new(3);

        ass.assign(-2, 1);
        ass.assign(-3, 1);
        ass.assign(-1, 1);
        assert_eq!(store.classify(0, &ass), Status::Falsified);
    }

    #[test]
    fn watch_invariant_after_retarget() {
        let mut store = ClauseStore::new(vec![vec![1, 2, 3, 4]]);
        let mut ass = Assignment::new(4);

        ass.assign(-1, 1);
        ass.assign(-2, 1);
        assert_eq!(store.classify(0, &ass), Status::Undetermined);

        let (w0, w1) = store.get(0).watches();
        assert_ne!(ass.eval(w0), Some(false));
        assert_ne!(ass.eval(w1), Some(false));
    }
}
