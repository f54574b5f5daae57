use std::fmt::Display;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;
use tracing::trace;

use crate::{
    Lexer, SolveError,
    expr::{Expr, Function},
    lex::{Token, TokenKind},
    number::Number,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("unmatched opening parenthesis")]
    UnclosedParen,
    #[error("unmatched closing parenthesis")]
    UnexpectedClosingParen,
    #[error("expected an operand")]
    MissingOperand,
    #[error("more than one `=` in the equation")]
    SecondEquals,
    #[error("unexpected input after a complete expression")]
    TrailingInput,
    #[error("function `{0}` is missing its argument")]
    BareFunction(String),
}

impl ParseErrorKind {
    fn help(&self) -> Option<String> {
        Some(match self {
            ParseErrorKind::UnclosedParen => "add the missing `)`".to_string(),
            ParseErrorKind::UnexpectedClosingParen => "remove this `)`".to_string(),
            ParseErrorKind::MissingOperand => {
                "every operator needs a number, variable or parenthesised group".to_string()
            }
            ParseErrorKind::SecondEquals => "an equation has exactly one `=`".to_string(),
            ParseErrorKind::TrailingInput => return None,
            ParseErrorKind::BareFunction(name) => format!("write `{name}(x)`"),
        })
    }
}

#[derive(Error, Debug, Diagnostic)]
#[error("Invalid equation syntax: {kind}")]
#[diagnostic(code(equation::parse))]
pub struct ParseError {
    #[source_code]
    src: NamedSource<String>,

    #[label("here")]
    span: SourceSpan,

    pub kind: ParseErrorKind,

    #[help]
    help: Option<String>,
}

impl ParseError {
    pub fn offset(&self) -> usize {
        self.span.offset()
    }
}

/// The parser's output: an expression, already in `lhs - rhs` form when the
/// input was an equation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedInput {
    pub expr: Expr,
    pub is_equation: bool,
}

impl Display for ParsedInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_equation {
            write!(f, "{} = 0", self.expr)
        } else {
            write!(f, "{}", self.expr)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

pub struct Parser<'de> {
    whole: &'de str,
    lexer: Lexer<'de>,
    variable: Option<&'de str>,
}

impl<'de> Parser<'de> {
    pub fn new(filename: Option<&'de str>, whole: &'de str) -> Self {
        Parser {
            whole,
            lexer: Lexer::new(filename, whole),
            variable: None,
        }
    }

    /// Marks `variable` as the solve target, so it is never split into
    /// single-letter symbols.
    pub fn with_variable(mut self, variable: &'de str) -> Self {
        self.variable = Some(variable);
        self
    }

    /// See [`Lexer::with_user_text`].
    pub fn with_user_text(mut self, text: &'de str) -> Self {
        self.lexer = self.lexer.with_user_text(text);
        self
    }

    pub fn parse(mut self) -> Result<ParsedInput, SolveError> {
        let lhs = self.parse_within(0)?;
        let token = self.next_token()?;
        match token.kind {
            TokenKind::End => {
                return Ok(ParsedInput {
                    expr: lhs,
                    is_equation: false,
                });
            }
            TokenKind::Equal => {}
            _ => return Err(self.unexpected(&token)),
        }

        let rhs = self.parse_within(0)?;
        let token = self.next_token()?;
        match token.kind {
            TokenKind::End => Ok(ParsedInput {
                expr: Expr::difference(lhs, rhs),
                is_equation: true,
            }),
            TokenKind::Equal => Err(self.error(token.span(), ParseErrorKind::SecondEquals)),
            _ => Err(self.unexpected(&token)),
        }
    }

    pub fn parse_within(&mut self, min_bp: u8) -> Result<Expr, SolveError> {
        let token = self.next_token()?;
        let mut lhs = match token.kind {
            TokenKind::Number(ref n) => Expr::Const(n.clone()),
            TokenKind::Ident => self.identifier(&token)?,
            TokenKind::LeftParen => {
                let inner = self.parse_within(0)?;
                self.expect_close(&token)?;
                inner
            }
            TokenKind::Minus | TokenKind::Plus => {
                let ((), r_bp) = prefix_binding_power();
                let operand = self.parse_within(r_bp)?;
                if token.kind == TokenKind::Minus {
                    Expr::neg(operand)
                } else {
                    operand
                }
            }
            _ => return Err(self.error(token.span(), ParseErrorKind::MissingOperand)),
        };

        loop {
            let kind = self.peek_kind()?;
            let (op, implicit) = match kind {
                TokenKind::End | TokenKind::Equal | TokenKind::RightParen => break,
                TokenKind::Plus => (Op::Add, false),
                TokenKind::Minus => (Op::Sub, false),
                TokenKind::Star => (Op::Mul, false),
                TokenKind::Slash => (Op::Div, false),
                TokenKind::Power => (Op::Pow, false),
                TokenKind::Number(_) | TokenKind::Ident | TokenKind::LeftParen => (Op::Mul, true),
            };

            let (l_bp, r_bp) = infix_binding_power(op);
            if l_bp < min_bp {
                break;
            }
            if implicit {
                trace!(byte = self.lexer.byte, "implicit multiplication");
            } else {
                self.next_token()?;
            }

            let rhs = self.parse_within(r_bp)?;
            lhs = match op {
                Op::Add => Expr::Sum(vec![lhs, rhs]),
                Op::Sub => Expr::Sum(vec![lhs, Expr::neg(rhs)]),
                Op::Mul => Expr::Product(vec![lhs, rhs]),
                Op::Div => Expr::Product(vec![lhs, Expr::power(rhs, Expr::integer(-1))]),
                Op::Pow => Expr::power(lhs, rhs),
            };
        }

        Ok(lhs)
    }

    fn identifier(&mut self, token: &Token<'de>) -> Result<Expr, SolveError> {
        let name = token.literal;
        if self.variable == Some(name) {
            return Ok(Expr::var(name));
        }
        match name {
            "pi" => return Ok(Expr::Const(Number::float(std::f64::consts::PI))),
            "E" => return Ok(Expr::Const(Number::float(std::f64::consts::E))),
            "I" => return Ok(Expr::Const(Number::imaginary_unit())),
            _ => {}
        }
        if let Some(func) = Function::from_name(name) {
            return self.application(func, token);
        }
        if name.len() > 1 && name.chars().all(|c| c.is_ascii_alphabetic()) {
            // `xy` is the product of two symbols
            return Ok(Expr::Product(name.chars().map(letter).collect()));
        }
        Ok(Expr::var(name))
    }

    fn application(&mut self, func: Function, token: &Token<'de>) -> Result<Expr, SolveError> {
        let argument = match self.peek_kind()? {
            TokenKind::LeftParen => {
                let open = self.next_token()?;
                let argument = self.parse_within(0)?;
                self.expect_close(&open)?;
                argument
            }
            kind if kind.starts_operand() => self.parse_within(FUNCTION_BP)?,
            _ => {
                return Err(self.error(
                    token.span(),
                    ParseErrorKind::BareFunction(token.literal.to_string()),
                ));
            }
        };
        Ok(Expr::Func(func, Box::new(argument)))
    }

    fn expect_close(&mut self, open: &Token<'de>) -> Result<(), SolveError> {
        let token = self.next_token()?;
        match token.kind {
            TokenKind::RightParen => Ok(()),
            _ => Err(self.error(open.span(), ParseErrorKind::UnclosedParen)),
        }
    }

    fn peek_kind(&mut self) -> Result<TokenKind, SolveError> {
        if let Some(Ok(token)) = self.lexer.peek() {
            return Ok(token.kind.clone());
        }
        match self.lexer.next() {
            Some(Err(e)) => Err(e.into()),
            _ => Ok(TokenKind::End),
        }
    }

    fn next_token(&mut self) -> Result<Token<'de>, SolveError> {
        match self.lexer.next() {
            Some(Ok(token)) => Ok(token),
            Some(Err(e)) => Err(e.into()),
            None => Ok(Token {
                kind: TokenKind::End,
                literal: "",
                offset: self.whole.len(),
            }),
        }
    }

    fn unexpected(&self, token: &Token<'de>) -> SolveError {
        match token.kind {
            TokenKind::RightParen => self.error(token.span(), ParseErrorKind::UnexpectedClosingParen),
            _ => self.error(token.span(), ParseErrorKind::TrailingInput),
        }
    }

    fn error(&self, span: SourceSpan, kind: ParseErrorKind) -> SolveError {
        ParseError {
            src: self.lexer.source(),
            span: self.lexer.user_span(span),
            help: kind.help(),
            kind,
        }
        .into()
    }
}

/// One letter of a split symbol. `I` and `E` keep their constant meaning.
fn letter(c: char) -> Expr {
    match c {
        'I' => Expr::Const(Number::imaginary_unit()),
        'E' => Expr::Const(Number::float(std::f64::consts::E)),
        c => Expr::var(c.to_string()),
    }
}

/// Right binding power for an un-parenthesised function argument: `sin x^2`
/// is `sin(x^2)` but `sin 2x` is `sin(2)*x`.
const FUNCTION_BP: u8 = 6;

fn prefix_binding_power() -> ((), u8) {
    ((), 5)
}

fn infix_binding_power(op: Op) -> (u8, u8) {
    match op {
        Op::Add | Op::Sub => (1, 2),
        Op::Mul | Op::Div => (3, 4),
        Op::Pow => (8, 7),
    }
}
