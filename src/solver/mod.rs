mod analyze;
mod assignment;
mod clauses;
mod map;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::types::{to_var, Lit, Problem, Solution, Var};

use self::{
    assignment::Assignment,
    clauses::{ClauseStore, Status},
    map::LitMap,
};

/// Selects whether conflicts are answered with clause learning and a
/// backjump, or with a plain chronological flip of the latest decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Cdcl,
    Dpll,
}

#[derive(Clone, Copy, Debug)]
struct Decision {
    var: Var,
    value: bool,
}

/// Transient record of a falsified clause, alive between detection and
/// analysis.
struct Conflict {
    i_clause: usize,
    level: usize,
}

pub struct Solver {
    clauses: ClauseStore,
    assignment: Assignment,

    /// For every literal, the clauses containing it; drives re-examination
    /// after an assignment touches a clause.
    occurs: LitMap<Vec<usize>>,
    queue: VecDeque<usize>,

    decisions: Vec<Decision>,
    decision_level: usize,

    mode: Mode,
    conflicts: usize,
}

impl Solver {
    pub fn new(problem: Problem, mode: Mode) -> Self {
        let Problem {
            var_count,
            clauses,
            prefill,
        } = problem;

        let clauses = ClauseStore::new(clauses);
        let mut occurs = LitMap::<Vec<usize>>::new(var_count);
        for (i, clause) in clauses.iter().enumerate() {
            for &lit in clause.lits() {
                occurs[lit].push(i);
            }
        }

        let mut solver = Solver {
            clauses,
            assignment: Assignment::new(var_count),
            occurs,
            queue: VecDeque::new(),
            decisions: vec![],
            decision_level: 0,
            mode,
            conflicts: 0,
        };

        for lit in prefill {
            solver.assignment.assign(lit, 0);
            solver.assignment.set_final(to_var(lit));
        }

        solver
    }

    pub fn solve(&mut self, timeout: Option<Duration>) -> Solution {
        let deadline = timeout.map(|t| Instant::now() + t);

        if self.clauses.iter().any(|clause| clause.lits().is_empty()) {
            return Solution::Unsat { conflict: vec![] };
        }

        // Everything is a unit candidate before the first fixpoint.
        self.queue.extend(0..self.clauses.len());

        loop {
            if deadline.is_some_and(|end| Instant::now() >= end) {
                debug!("deadline hit after {} conflicts", self.conflicts);
                return Solution::Unknown {
                    decisions: self.decision_trail(),
                };
            }

            let Some(conflict) = self.propagate() else {
                if self.assignment.trail().len() == self.assignment.var_count() {
                    let model = self.assignment.trail().to_vec();
                    return Solution::Sat { model };
                }
                self.decide();
                continue;
            };

            self.conflicts += 1;
            debug!(
                "conflict {}: clause {} at level {}",
                self.conflicts, conflict.i_clause, conflict.level
            );
            let falsified = self.clauses.get(conflict.i_clause).lits().to_vec();

            match self.mode {
                Mode::Cdcl => {
                    // every root-level assignment is a consequence of the
                    // formula, so a conflict there settles the verdict
                    if conflict.level == 0 {
                        return Solution::Unsat {
                            conflict: falsified,
                        };
                    }
                    let analysis = analyze::analyze(&self.clauses, &self.assignment, &conflict);
                    let Some(analysis) = analysis else {
                        return Solution::Unsat {
                            conflict: falsified,
                        };
                    };

                    self.backjump(analysis.assertion_level);
                    let i_clause = self.add(analysis.learnt);
                    self.queue.push_back(i_clause);
                }
                Mode::Dpll => {
                    if self.decisions.is_empty() {
                        return Solution::Unsat {
                            conflict: falsified,
                        };
                    }
                    self.flip_last_decision();
                }
            }
        }
    }

    /// The clauses learned so far, in the order they were derived.
    pub fn learned_clauses(&self) -> impl Iterator<Item = &[Lit]> {
        self.clauses.learned().iter().map(|clause| clause.lits())
    }

    fn add(&mut self, clause: Vec<Lit>) -> usize {
        let i = self.clauses.add(clause);
        for &lit in self.clauses.get(i).lits() {
            self.occurs[lit].push(i);
        }
        i
    }

    /// Works the queue of touched clauses down to a fixpoint or a conflict.
    fn propagate(&mut self) -> Option<Conflict> {
        while let Some(c) = self.queue.pop_front() {
            match self.clauses.classify(c, &self.assignment) {
                Status::Satisfied | Status::Undetermined => (),
                Status::Unit(lit) => {
                    trace!("clause {c} forces {lit} at level {}", self.decision_level);
                    self.assignment.assign(lit, self.decision_level);
                    self.assignment.add_reason(to_var(lit), c);
                    if self.decision_level == 0 {
                        // root facts are settled for good
                        self.assignment.set_final(to_var(lit));
                    }
                    // only clauses holding the negation can turn unit or false
                    self.enqueue_containing(-lit);
                }
                Status::Falsified => {
                    trace!("clause {c} falsified at level {}", self.decision_level);
                    self.queue.clear();
                    return Some(Conflict {
                        i_clause: c,
                        level: self.decision_level,
                    });
                }
            }
        }
        None
    }

    fn decide(&mut self) {
        // Lowest-indexed unassigned variable, branched to false first.
        let var = match self.assignment.first_unassigned() {
            Some(var) => var,
            None => panic!(
                "exhausted possible decisions with {} of {} variables assigned",
                self.assignment.trail().len(),
                self.assignment.var_count()
            ),
        };

        self.decision_level += 1;
        debug!("decision: {var} = false at level {}", self.decision_level);
        self.assignment.assign(-(var as Lit), self.decision_level);
        self.decisions.push(Decision { var, value: false });
        self.enqueue_var(var);
    }

    /// Drops every decision above the target level and unassigns everything
    /// made there. The learned clause appended right after is unit at the
    /// target level, so propagation re-asserts its surviving literal with
    /// the clause as its reason; decisions at or below the target stand.
    fn backjump(&mut self, target: usize) {
        while self
            .decisions
            .last()
            .is_some_and(|dec| self.assignment.level(dec.var) > target)
        {
            self.decisions.pop();
        }

        debug!("backjump to level {target}");
        self.assignment.unwind_to(target);
        self.decision_level = target;
    }

    /// Chronological undo for DPLL mode: the most recent decision becomes
    /// its own second branch. The flip is not recorded as a decision, so a
    /// later conflict backtracks past it.
    fn flip_last_decision(&mut self) {
        let dec = self.decisions.pop().unwrap();
        let level = self.assignment.level(dec.var);

        self.assignment.unwind(dec.var, level);
        self.decision_level = level;

        let lit = if dec.value {
            -(dec.var as Lit)
        } else {
            dec.var as Lit
        };
        debug!("chronological flip: {lit} at level {level}");
        self.assignment.assign(lit, level);
        self.enqueue_var(dec.var);
    }

    fn enqueue_containing(&mut self, lit: Lit) {
        self.queue.extend(self.occurs[lit].iter().copied());
    }

    fn enqueue_var(&mut self, var: Var) {
        self.enqueue_containing(var as Lit);
        self.enqueue_containing(-(var as Lit));
    }

    fn decision_trail(&self) -> Vec<(Var, bool)> {
        self.decisions.iter().map(|d| (d.var, d.value)).collect()
    }
}

/// Checks a solution against the problem: a model must satisfy every
/// clause, and the verdict must match the expected one.
pub fn verify(problem: &Problem, sat: bool, solution: &Solution) -> bool {
    match solution {
        Solution::Sat { model } => {
            if !sat {
                return false;
            }
            let mut sorted = model.clone();
            sorted.sort_unstable();
            problem
                .clauses
                .iter()
                .all(|clause| clause.iter().any(|lit| sorted.binary_search(lit).is_ok()))
        }
        Solution::Unsat { .. } => !sat,
        Solution::Unknown { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{Clause, Problem, Solution};

    use super::{verify, Mode, Solver};

    fn problem(clauses: Vec<Clause>) -> Problem {
        Problem {
            var_count: clauses.iter().flatten().map(|lit| lit.unsigned_abs()).max().unwrap_or(0)
                as usize,
            clauses,
            prefill: vec![],
        }
    }

    fn check(clauses: Vec<Clause>, sat: bool) {
        let p = problem(clauses);
        for mode in [Mode::Cdcl, Mode::Dpll] {
            let solution = Solver::new(p.clone(), mode).solve(None);
            assert!(verify(&p, sat, &solution), "mode {mode:?}");
        }
    }

    #[test]
    fn basic_sat() {
        let clauses = vec![vec![1, 2], vec![-1, 2], vec![-1, -2, 3], vec![-1, -2, -3]];
        check(clauses, true);

        let clauses = vec![
            vec![-1, -2, 3],
            vec![2, -1, 3],
            vec![1, -2, 3],
            vec![-3, 4, 5],
            vec![-3, 4, -5],
            vec![-3, -4, 5],
            vec![-3, -4, -5],
        ];
        check(clauses, true);
    }

    #[test]
    fn basic_unsat() {
        let clauses = vec![
            vec![1, 2],
            vec![-2, 3],
            vec![-2, -3],
            vec![-1, -2, -4],
            vec![-1, 2, -4],
            vec![-1, 2, 4],
        ];

        check(clauses, false);
    }

    /// Formulas with non-trivial propagation before the first decision.
    #[test]
    fn kickstart() {
        let clauses = vec![vec![1], vec![-1, 2], vec![-1, -2]];
        check(clauses, false);
    }

    #[test]
    fn contradictory_units() {
        let clauses = vec![vec![1], vec![-1]];
        check(clauses, false);
    }

    #[test]
    fn empty_formula_is_sat() {
        let p = Problem {
            var_count: 0,
            clauses: vec![],
            prefill: vec![],
        };
        let solution = Solver::new(p, Mode::Cdcl).solve(None);
        assert_eq!(solution, Solution::Sat { model: vec![] });
    }

    #[test]
    fn empty_clause_is_unsat() {
        let clauses = vec![vec![1], vec![]];
        let p = problem(clauses);
        let solution = Solver::new(p, Mode::Cdcl).solve(None);
        assert!(matches!(solution, Solution::Unsat { .. }));
    }

    #[test]
    fn prefill_counts_as_assigned() {
        let p = Problem {
            var_count: 2,
            clauses: vec![vec![1, -2]],
            prefill: vec![1, 2],
        };
        let solution = Solver::new(p.clone(), Mode::Cdcl).solve(None);
        let Solution::Sat { model } = solution else {
            panic!("expected sat");
        };
        assert!(model.contains(&1));
        assert!(model.contains(&2));
    }

    #[test]
    fn root_propagations_become_final() {
        let p = problem(vec![vec![1], vec![-1, 2]]);
        let mut solver = Solver::new(p, Mode::Cdcl);
        let solution = solver.solve(None);

        assert!(matches!(solution, Solution::Sat { .. }));
        assert!(solver.assignment.is_final(1));
        assert!(solver.assignment.is_final(2));
    }

    #[test]
    fn backjump_keeps_earlier_decisions_open() {
        // under 1 = false, 2 = false the conflict resolves to a clause over
        // both decision variables; committing either one for good at this
        // point would lose the only models (1 = false, 2 = true)
        let clauses = vec![vec![-1, 2], vec![-1, -2], vec![1, 2, 3], vec![-3, 2]];
        check(clauses, true);
    }

    #[test]
    fn unit_learning_below_the_decision_stack() {
        // the first learned clause is unit and asserts at level 0 while two
        // decisions are still standing; neither may be flipped permanently
        let clauses = vec![vec![-1, 5], vec![-5, -4], vec![-5, 4], vec![2, 5]];
        check(clauses, true);
    }

    #[test]
    fn learns_entailed_clauses() {
        // forces a conflict on the first decision; every learned clause
        // must hold in every model of the formula
        let clauses = vec![vec![1, 2], vec![-1, 2], vec![1, -2]];
        let p = problem(clauses.clone());

        let mut solver = Solver::new(p.clone(), Mode::Cdcl);
        let solution = solver.solve(None);
        assert!(verify(&p, true, &solution));

        let mut learned = solver.learned_clauses().peekable();
        assert!(learned.peek().is_some());

        for assignment in 0..(1 << 2) {
            let value = |lit: i32| {
                let set = assignment & (1 << (lit.unsigned_abs() - 1)) != 0;
                if lit > 0 {
                    set
                } else {
                    !set
                }
            };
            let satisfies =
                |clause: &[i32]| clause.iter().any(|&lit| value(lit));
            if clauses.iter().all(|c| satisfies(c)) {
                for clause in solver.learned_clauses() {
                    assert!(satisfies(clause), "learned clause not entailed");
                }
            }
        }
    }
}
