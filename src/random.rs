use std::collections::HashSet;
use std::time::{Duration, Instant};

use log::{debug, warn};
use rand::rngs::SmallRng;
use rand::Rng;

use crate::types::{to_var, Clause, Lit, Problem, Solution, Var};

/// Above this many free variables the explored-assignment set can no longer
/// be indexed by a 64-bit key, so the search refuses to start.
const MAX_FREE_VARS: usize = 62;

/// Evaluates uniformly random full assignments until one satisfies the
/// formula, the whole space has been seen, or the deadline passes. Only
/// sensible for small instances.
pub fn solve(problem: &Problem, timeout: Duration, rng: &mut SmallRng) -> Solution {
    let mut values = vec![false; problem.var_count + 1];
    for &lit in &problem.prefill {
        values[to_var(lit)] = lit > 0;
    }

    let free: Vec<Var> = (1..=problem.var_count)
        .filter(|&var| !problem.prefill.iter().any(|&lit| to_var(lit) == var))
        .collect();
    if free.len() > MAX_FREE_VARS {
        warn!(
            "{} free variables, random evaluation cannot track the full assignment space",
            free.len()
        );
        return Solution::Unknown { decisions: vec![] };
    }

    let space = 1u64 << free.len();
    let deadline = Instant::now() + timeout;
    let mut explored = HashSet::new();

    while Instant::now() < deadline {
        let mut key = 0u64;
        for (bit, &var) in free.iter().enumerate() {
            let value = rng.gen::<bool>();
            values[var] = value;
            if value {
                key |= 1 << bit;
            }
        }
        if !explored.insert(key) {
            continue;
        }

        if evaluate(&problem.clauses, &values) {
            debug!("satisfied after exploring {} of {space} assignments", explored.len());
            let model = (1..=problem.var_count)
                .map(|var| if values[var] { var as Lit } else { -(var as Lit) })
                .collect();
            return Solution::Sat { model };
        }
        if explored.len() as u64 == space {
            return Solution::Unsat { conflict: vec![] };
        }
    }

    Solution::Unknown { decisions: vec![] }
}

fn evaluate(clauses: &[Clause], values: &[bool]) -> bool {
    clauses
        .iter()
        .all(|clause| clause.iter().any(|&lit| (lit > 0) == values[to_var(lit)]))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use crate::types::{Problem, Solution};

    use super::{evaluate, solve};

    fn problem(clauses: Vec<Vec<i32>>, var_count: usize) -> Problem {
        Problem {
            var_count,
            clauses,
            prefill: vec![],
        }
    }

    #[test]
    fn evaluates_clause_by_clause() {
        let clauses = vec![vec![1, -2], vec![-1, 2]];
        let mut values = vec![false; 3];
        assert!(evaluate(&clauses, &values));

        values[1] = true;
        assert!(!evaluate(&clauses, &values));

        values[2] = true;
        assert!(evaluate(&clauses, &values));
    }

    #[test]
    fn finds_a_model() {
        let p = problem(vec![vec![1, 2], vec![-1, 2], vec![1, -2]], 2);
        let mut rng = SmallRng::seed_from_u64(7);
        let solution = solve(&p, Duration::from_secs(10), &mut rng);
        let Solution::Sat { model } = solution else {
            panic!("expected sat");
        };
        assert_eq!(model, vec![1, 2]);
    }

    #[test]
    fn exhausts_the_space_on_unsat() {
        let p = problem(
            vec![vec![1, 2], vec![1, -2], vec![-1, 2], vec![-1, -2]],
            2,
        );
        let mut rng = SmallRng::seed_from_u64(7);
        let solution = solve(&p, Duration::from_secs(10), &mut rng);
        assert!(matches!(solution, Solution::Unsat { .. }));
    }

    #[test]
    fn prefilled_values_are_respected() {
        let p = Problem {
            var_count: 2,
            clauses: vec![vec![1, 2]],
            prefill: vec![-2],
        };
        let mut rng = SmallRng::seed_from_u64(7);
        let solution = solve(&p, Duration::from_secs(10), &mut rng);
        let Solution::Sat { model } = solution else {
            panic!("expected sat");
        };
        assert!(model.contains(&1));
        assert!(model.contains(&-2));
    }
}
