//! Solves single-variable algebraic equations written in everyday notation.
//!
//! ```
//! assert_eq!(equation_solver::solve("2*x + 4 = 10", "x").unwrap(), "x = 3");
//! assert_eq!(equation_solver::solve("2 + 2", "x").unwrap(), "4");
//! ```

pub mod config;
pub mod error;
pub mod expr;
pub mod format;
pub mod lex;
pub mod number;
pub mod parse;
pub mod simplify;
pub mod solve;

#[cfg(test)]
mod tests;

use tracing::{debug, instrument};

pub use config::Limits;
pub use error::{ErrorClass, SolveError};
pub use expr::Expr;
pub use format::format_solution;
pub use lex::Lexer;
pub use number::Number;
pub use parse::Parser;
pub use solve::{SolutionSet, Solver};

/// Solves `equation` for `variable` with the default limits and renders the
/// answer.
pub fn solve(equation: &str, variable: &str) -> Result<String, SolveError> {
    solve_with(equation, variable, &Limits::default())
}

pub fn solve_with(equation: &str, variable: &str, limits: &Limits) -> Result<String, SolveError> {
    let solutions = solve_set(equation, variable, limits)?;
    Ok(format_solution(&solutions, variable))
}

/// Like [`solve_with`] but returns the structured result.
#[instrument(skip(limits), level = "debug")]
pub fn solve_set(
    equation: &str,
    variable: &str,
    limits: &Limits,
) -> Result<SolutionSet, SolveError> {
    let equation = equation.trim();
    if equation.is_empty() {
        return Err(SolveError::EmptyInput);
    }
    let len = equation.chars().count();
    if len > limits.max_input_len {
        return Err(SolveError::InputTooLong {
            len,
            max: limits.max_input_len,
        });
    }
    check_variable(variable)?;

    let normalized = lex::normalize(equation);
    let parsed = Parser::new(None, &normalized)
        .with_variable(variable)
        .with_user_text(equation)
        .parse()?;
    debug!(%parsed, "parsed");

    Solver::new(limits).solve(&parsed.expr, variable)
}

fn check_variable(variable: &str) -> Result<(), SolveError> {
    let mut chars = variable.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && expr::Function::from_name(variable).is_none()
        && !matches!(variable, "pi" | "E" | "I");
    if valid {
        Ok(())
    } else {
        Err(SolveError::InvalidVariable(variable.to_string()))
    }
}
