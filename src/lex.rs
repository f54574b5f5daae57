use std::{borrow::Cow, fmt::Display};

use miette::{Diagnostic, NamedSource, SourceSpan};
use num_bigint::BigInt;
use thiserror::Error;

use crate::number::Number;

#[derive(Error, Debug, Diagnostic)]
#[error("Unexpected character '{token}'")]
#[diagnostic(code(equation::lex), help("remove or correct the character: `{token}`"))]
pub struct LexError {
    #[source_code]
    src: NamedSource<String>,

    #[label("this character")]
    bad_bit: SourceSpan,

    pub token: char,
}

impl LexError {
    pub fn offset(&self) -> usize {
        self.bad_bit.offset()
    }
}

/// Rewrites surface syntax before lexing: `^` becomes `**`.
pub fn normalize(input: &str) -> Cow<'_, str> {
    if input.contains('^') {
        Cow::Owned(input.replace('^', "**"))
    } else {
        Cow::Borrowed(input)
    }
}

/// Maps a byte offset into `normalize(text)` back to the same place in `text`.
pub fn user_offset(text: &str, offset: usize) -> usize {
    let mut normalized = 0;
    for (at, c) in text.char_indices() {
        if normalized >= offset {
            return at;
        }
        normalized += if c == '^' { 2 } else { c.len_utf8() };
    }
    text.len()
}

/// Length of an exponent suffix such as `e5` or `E-3` at the start of `rest`.
fn exponent_len(rest: &str) -> usize {
    let bytes = rest.as_bytes();
    if !matches!(bytes.first(), Some(b'e' | b'E')) {
        return 0;
    }
    let sign = usize::from(matches!(bytes.get(1), Some(b'+' | b'-')));
    let digits = bytes[1 + sign..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 { 0 } else { 1 + sign + digits }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'de> {
    pub kind: TokenKind,
    pub literal: &'de str,
    pub offset: usize,
}

impl Token<'_> {
    pub fn span(&self) -> SourceSpan {
        SourceSpan::from(self.offset..self.offset + self.literal.len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    Plus,
    Minus,
    Star,
    Slash,
    Power,
    Equal,
    Ident,
    Number(Number),
    End,
}

impl TokenKind {
    /// Whether a token of this kind can begin an operand, which is what
    /// triggers implicit multiplication after a complete operand.
    pub fn starts_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Number(_) | TokenKind::Ident | TokenKind::LeftParen
        )
    }
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self.literal;
        match &self.kind {
            TokenKind::LeftParen => write!(f, "LEFT_PAREN {lit} null"),
            TokenKind::RightParen => write!(f, "RIGHT_PAREN {lit} null"),
            TokenKind::Plus => write!(f, "PLUS {lit} null"),
            TokenKind::Minus => write!(f, "MINUS {lit} null"),
            TokenKind::Star => write!(f, "STAR {lit} null"),
            TokenKind::Slash => write!(f, "SLASH {lit} null"),
            TokenKind::Power => write!(f, "POWER {lit} null"),
            TokenKind::Equal => write!(f, "EQUAL {lit} null"),
            TokenKind::Ident => write!(f, "IDENTIFIER {lit} null"),
            TokenKind::Number(n) => write!(f, "NUMBER {lit} {n}"),
            TokenKind::End => write!(f, "EOF  null"),
        }
    }
}

pub struct Lexer<'de> {
    filename: Option<&'de str>,
    whole: &'de str,
    user_text: Option<&'de str>,
    rest: &'de str,
    pub byte: usize,
    peeked: Option<Result<Token<'de>, LexError>>,
    finished: bool,
}

impl<'de> Lexer<'de> {
    pub fn new(filename: Option<&'de str>, input: &'de str) -> Self {
        Lexer {
            filename,
            whole: input,
            user_text: None,
            rest: input,
            byte: 0,
            peeked: None,
            finished: false,
        }
    }

    /// Reports errors against `text`, the input as written before
    /// [`normalize`], rather than against the lexed text.
    pub fn with_user_text(mut self, text: &'de str) -> Self {
        self.user_text = Some(text);
        self
    }

    pub fn source(&self) -> NamedSource<String> {
        NamedSource::new(
            self.filename.unwrap_or("<equation>"),
            self.user_text.unwrap_or(self.whole).to_string(),
        )
    }

    /// Moves a span over the lexed text onto the text the user wrote.
    pub fn user_span(&self, span: SourceSpan) -> SourceSpan {
        let Some(text) = self.user_text else {
            return span;
        };
        let start = user_offset(text, span.offset());
        let end = user_offset(text, span.offset() + span.len());
        SourceSpan::from(start..end)
    }

    pub fn peek(&mut self) -> Option<&Result<Token<'de>, LexError>> {
        if self.peeked.is_some() {
            return self.peeked.as_ref();
        }
        self.peeked = self.next();
        self.peeked.as_ref()
    }
}

impl<'de> Iterator for Lexer<'de> {
    type Item = Result<Token<'de>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(peeked) = self.peeked.take() {
            return Some(peeked);
        }
        loop {
            let mut chars = self.rest.chars();
            let Some(c) = chars.next() else {
                if self.finished {
                    return None;
                }
                self.finished = true;
                return Some(Ok(Token {
                    kind: TokenKind::End,
                    literal: "",
                    offset: self.byte,
                }));
            };
            let literal = &self.rest[..c.len_utf8()];
            let cur = self.rest;
            let offset = self.byte;
            self.rest = chars.as_str();
            self.byte += c.len_utf8();

            enum Start {
                Star,
                Ident,
                Number,
            }

            let process = |kind: TokenKind| {
                Some(Ok(Token {
                    kind,
                    literal,
                    offset,
                }))
            };

            let started = match c {
                '(' => return process(TokenKind::LeftParen),
                ')' => return process(TokenKind::RightParen),
                '+' => return process(TokenKind::Plus),
                '-' => return process(TokenKind::Minus),
                '/' => return process(TokenKind::Slash),
                '^' => return process(TokenKind::Power),
                '=' => return process(TokenKind::Equal),
                '*' => Start::Star,
                'a'..='z' | 'A'..='Z' => Start::Ident,
                '0'..='9' => Start::Number,
                '.' if self.rest.starts_with(|d: char| d.is_ascii_digit()) => Start::Number,
                c if c.is_whitespace() => continue,
                c => {
                    return Some(Err(LexError {
                        src: self.source(),
                        bad_bit: self.user_span(SourceSpan::from(offset..self.byte)),
                        token: c,
                    }));
                }
            };

            match started {
                Start::Star => {
                    if self.rest.starts_with('*') {
                        self.rest = &self.rest[1..];
                        self.byte += 1;
                        return Some(Ok(Token {
                            kind: TokenKind::Power,
                            literal: &cur[..2],
                            offset,
                        }));
                    }
                    return process(TokenKind::Star);
                }
                Start::Ident => {
                    let first_non_ident = cur
                        .find(|c| !matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_'))
                        .unwrap_or(cur.len());

                    let literal = &cur[..first_non_ident];
                    let extra_bytes = literal.len() - c.len_utf8();
                    self.byte += extra_bytes;
                    self.rest = &self.rest[extra_bytes..];

                    return Some(Ok(Token {
                        kind: TokenKind::Ident,
                        literal,
                        offset,
                    }));
                }
                Start::Number => {
                    let first_non_digit = cur
                        .find(|c| !matches!(c, '0'..='9' | '.'))
                        .unwrap_or(cur.len());

                    let mut literal = &cur[..first_non_digit];

                    // a trailing dot is left behind for the next token
                    let mut dotted = literal.splitn(3, '.');
                    match (dotted.next(), dotted.next(), dotted.next()) {
                        (Some(one), Some(two), Some(_)) => {
                            let second_dot = offset + one.len() + two.len() + 1;
                            let span = SourceSpan::from(second_dot..second_dot + 1);
                            return Some(Err(LexError {
                                src: self.source(),
                                bad_bit: self.user_span(span),
                                token: '.',
                            }));
                        }
                        (Some(one), Some(""), None) => literal = &literal[..one.len()],
                        _ => {}
                    };
                    let exponent = exponent_len(&cur[literal.len()..]);
                    literal = &cur[..literal.len() + exponent];

                    let extra_bytes = literal.len() - c.len_utf8();
                    self.byte += extra_bytes;
                    self.rest = &self.rest[extra_bytes..];

                    let value = if literal.contains(|c| matches!(c, '.' | 'e' | 'E')) {
                        literal.parse::<f64>().ok().map(Number::float)
                    } else {
                        literal.parse::<BigInt>().ok().map(Number::big_integer)
                    };
                    let Some(value) = value else {
                        return Some(Err(LexError {
                            src: self.source(),
                            bad_bit: self.user_span(SourceSpan::from(offset..self.byte)),
                            token: c,
                        }));
                    };

                    return Some(Ok(Token {
                        kind: TokenKind::Number(value),
                        literal,
                        offset,
                    }));
                }
            }
        }
    }
}
