use std::collections::VecDeque;

use log::debug;

use crate::types::{to_var, Lit, Var};

use super::assignment::Assignment;
use super::clauses::ClauseStore;
use super::map::{var_map, VarMap};
use super::Conflict;

pub(super) struct Analysis {
    pub learnt: Vec<Lit>,
    /// Backjump target: second-highest decision level among the clause's
    /// variables, 0 when fewer than two levels are present.
    pub assertion_level: usize,
}

/// Derives an asserting clause from a falsified clause by resolving the
/// implication graph backward until every decision level holds at most one
/// frontier literal. Returns `None` when the conflict resolves away to the
/// empty trail, i.e. the formula is unsatisfiable at the root.
pub(super) fn analyze(
    clauses: &ClauseStore,
    assignment: &Assignment,
    conflict: &Conflict,
) -> Option<Analysis> {
    let mut frontier: VecDeque<(Var, usize)> = VecDeque::new();
    let mut visited: VarMap<bool> = var_map(assignment.var_count());

    for &lit in clauses.get(conflict.i_clause).lits() {
        let var = to_var(lit);
        if !visited[var] {
            visited[var] = true;
            frontier.push_back((var, assignment.level(var)));
        }
    }

    while !is_uip(&frontier) {
        // Resolve the next literal that was propagated; decisions and
        // flipped finals have no reasons and stay in the frontier.
        let Some(pos) = frontier
            .iter()
            .position(|&(var, _)| !assignment.reasons(var).is_empty())
        else {
            // Nothing left to resolve against, yet some level still holds
            // several literals: the implication graph is malformed. Learning
            // from it would not be sound.
            panic!("conflict analysis stuck before reaching an implication point");
        };
        let (var, _) = frontier.remove(pos).unwrap();

        for &i_reason in assignment.reasons(var) {
            for &lit in clauses.get(i_reason).lits() {
                let v = to_var(lit);
                if v == var || visited[v] {
                    continue;
                }
                visited[v] = true;
                frontier.push_back((v, assignment.level(v)));
            }
        }
    }

    if frontier.is_empty() {
        return None;
    }

    let assertion_level = second_highest_level(&frontier);
    let learnt = assemble(&frontier, assignment);
    debug!("learned {learnt:?}, asserting at level {assertion_level}");

    Some(Analysis {
        learnt,
        assertion_level,
    })
}

/// The stopping test: no decision level is represented more than once.
fn is_uip(frontier: &VecDeque<(Var, usize)>) -> bool {
    frontier
        .iter()
        .all(|&(_, level)| frontier.iter().filter(|&&(_, l)| l == level).count() <= 1)
}

fn second_highest_level(frontier: &VecDeque<(Var, usize)>) -> usize {
    let (mut max, mut snd) = (0, 0);
    for &(_, level) in frontier {
        if level > max {
            snd = max;
            max = level;
        } else if level > snd {
            snd = level;
        }
    }
    snd
}

/// The learned clause excludes exactly the assignments the frontier
/// currently stands for: each literal is the negation of its variable's
/// value on the trail.
fn assemble(frontier: &VecDeque<(Var, usize)>, assignment: &Assignment) -> Vec<Lit> {
    frontier
        .iter()
        .map(|&(var, _)| {
            if assignment.value(var) == Some(true) {
                -(var as Lit)
            } else {
                var as Lit
            }
        })
        .collect()
}
