//! A SAT solver for DIMACS CNF formulas, with CDCL, plain DPLL, and
//! random-evaluation backends.

pub mod io;
pub mod random;
pub mod solver;
pub mod types;
