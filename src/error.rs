use miette::Diagnostic;
use thiserror::Error;

use crate::{lex::LexError, parse::ParseError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainErrorKind {
    #[error("division by zero")]
    DivisionByZero,
    #[error("zero raised to a non-positive power")]
    ZeroToNegativePower,
    #[error("logarithm of zero")]
    LogOfZero,
    #[error("numeric overflow")]
    Overflow,
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[error("Math error: {kind}")]
#[diagnostic(
    code(equation::domain),
    help("the expression is undefined for these values")
)]
pub struct DomainError {
    pub kind: DomainErrorKind,
}

impl From<DomainErrorKind> for DomainError {
    fn from(kind: DomainErrorKind) -> Self {
        DomainError { kind }
    }
}

/// The equation has a recognised shape that the engine cannot solve.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[error("Could not solve equation: {reason}")]
#[diagnostic(
    code(equation::unsolved),
    help("only linear, quadratic and polynomial equations in one variable are supported")
)]
pub struct Unsolved {
    pub reason: String,
}

impl Unsolved {
    pub fn new(reason: impl Into<String>) -> Self {
        Unsolved {
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Diagnostic)]
pub enum SolveError {
    #[error("Missing equation")]
    #[diagnostic(code(equation::empty), help("pass an expression such as `2x + 4 = 10`"))]
    EmptyInput,

    #[error("Equation too long ({len} characters, max {max})")]
    #[diagnostic(code(equation::too_long))]
    InputTooLong { len: usize, max: usize },

    #[error("Invalid variable name `{0}`")]
    #[diagnostic(
        code(equation::variable),
        help("a variable is a letter followed by letters, digits or `_`")
    )]
    InvalidVariable(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Unsolved(#[from] Unsolved),
}

/// How a failure should be reported at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller sent something malformed or undefined.
    InvalidInput,
    /// The input was fine but outside what the engine can solve.
    CouldNotSolve,
}

impl SolveError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SolveError::Unsolved(_) => ErrorClass::CouldNotSolve,
            SolveError::EmptyInput
            | SolveError::InputTooLong { .. }
            | SolveError::InvalidVariable(_)
            | SolveError::Lex(_)
            | SolveError::Parse(_)
            | SolveError::Domain(_) => ErrorClass::InvalidInput,
        }
    }
}

impl From<DomainErrorKind> for SolveError {
    fn from(kind: DomainErrorKind) -> Self {
        SolveError::Domain(kind.into())
    }
}
