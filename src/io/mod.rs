use std::io::{BufRead, BufReader, BufWriter, Read, Write};

use log::debug;
use thiserror::Error;

use crate::types::{to_var, Lit, Problem, Solution, Var};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing problem line")]
    MissingHeader,
    #[error("malformed problem line: {0:?}")]
    BadHeader(String),
    #[error("malformed literal: {0:?}")]
    BadLiteral(String),
    #[error("variable {0} out of range (the problem line declared {1})")]
    VarOutOfRange(Var, usize),
    #[error("expected {expected} clauses, found {found}")]
    ClauseCountMismatch { expected: usize, found: usize },
}

/// Reads a DIMACS CNF problem and applies pure-literal elimination: a
/// variable that only ever occurs with one polarity is fixed to that
/// polarity up front, and every clause it satisfies is dropped.
pub fn read_problem(reader: &mut impl Read) -> Result<Problem, ParseError> {
    let mut lines = BufReader::new(reader).lines();

    let (var_count, clause_count) = loop {
        let Some(line) = lines.next() else {
            return Err(ParseError::MissingHeader);
        };
        let line = line?;

        if line.starts_with('c') || line.trim().is_empty() {
            continue;
        }

        // problem line
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 4 || parts[0] != "p" || parts[1] != "cnf" {
            return Err(ParseError::BadHeader(line));
        }
        let Ok(var_count) = parts[2].parse::<usize>() else {
            return Err(ParseError::BadHeader(line));
        };
        let Ok(clause_count) = parts[3].parse::<usize>() else {
            return Err(ParseError::BadHeader(line));
        };
        break (var_count, clause_count);
    };

    let mut clauses = vec![];
    let mut clause = vec![];

    for line in lines {
        let line = line?;
        if line.starts_with('c') {
            continue;
        }

        for word in line.split_whitespace() {
            let lit = word
                .parse::<Lit>()
                .map_err(|_| ParseError::BadLiteral(word.to_string()))?;
            match lit {
                0 => {
                    clauses.push(std::mem::take(&mut clause));
                }
                _ => {
                    let var = to_var(lit);
                    if var > var_count {
                        return Err(ParseError::VarOutOfRange(var, var_count));
                    }
                    clause.push(lit);
                }
            }
        }
    }

    if clause_count != clauses.len() {
        return Err(ParseError::ClauseCountMismatch {
            expected: clause_count,
            found: clauses.len(),
        });
    }

    let prefill = eliminate_pure_literals(var_count, &mut clauses);
    Ok(Problem {
        var_count,
        clauses,
        prefill,
    })
}

/// Scans polarities across the whole formula; single-polarity variables are
/// returned as pre-assigned literals and the clauses they satisfy are
/// removed. A variable that never occurs at all defaults to false.
fn eliminate_pure_literals(var_count: usize, clauses: &mut Vec<Vec<Lit>>) -> Vec<Lit> {
    let mut is_pure = vec![true; var_count + 1];
    let mut last_polarity = vec![0i8; var_count + 1];

    for &lit in clauses.iter().flatten() {
        let var = to_var(lit);
        let polarity: i8 = if lit > 0 { 1 } else { -1 };
        if last_polarity[var] != 0 && last_polarity[var] != polarity {
            is_pure[var] = false;
        }
        last_polarity[var] = polarity;
    }

    let prefill: Vec<Lit> = (1..=var_count)
        .filter(|&var| is_pure[var])
        .map(|var| {
            if last_polarity[var] == 1 {
                var as Lit
            } else {
                -(var as Lit)
            }
        })
        .collect();

    if !prefill.is_empty() {
        debug!("pure literals fixed up front: {prefill:?}");
        clauses.retain(|clause| !clause.iter().any(|&lit| is_pure[to_var(lit)]));
    }

    prefill
}

pub fn write_solution(
    writer: &mut impl Write,
    solution: &Solution,
    verbose: bool,
) -> std::io::Result<()> {
    let mut writer = BufWriter::new(writer);

    let verdict = match solution {
        Solution::Sat { .. } => "sat",
        Solution::Unsat { .. } => "unsat",
        Solution::Unknown { .. } => "unknown",
    };
    writeln!(writer, "{verdict}")?;

    if verbose {
        match solution {
            Solution::Sat { model } => {
                const PER_LINE: usize = 10;
                for chunk in model.chunks(PER_LINE) {
                    let chunk_str = chunk
                        .iter()
                        .fold(String::new(), |str, lit| str + &lit.to_string() + " ");
                    writeln!(writer, "v {}", chunk_str.trim_end())?;
                }
                writeln!(writer, "v 0")?;
            }
            Solution::Unsat { conflict } => {
                let lits = conflict
                    .iter()
                    .fold(String::new(), |str, lit| str + &lit.to_string() + " ");
                writeln!(writer, "{}", lits.trim_end())?;
            }
            Solution::Unknown { decisions } => {
                writeln!(writer, "decisions:")?;
                for (var, value) in decisions.iter().rev() {
                    writeln!(writer, "{var}: {value}")?;
                }
            }
        }
    }

    writer.flush()
}
