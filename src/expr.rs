use std::{cmp::Ordering, fmt::Display};

use crate::number::Number;

/// An algebraic expression tree.
///
/// Trees are plain owned values: every rewrite builds a new tree, nothing is
/// shared or mutated in place, so independent solves never observe each
/// other.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(Number),
    Var(String),
    Sum(Vec<Expr>),
    Product(Vec<Expr>),
    Power(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Func(Function, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Function {
    Sqrt,
    Sin,
    Cos,
    Tan,
    Exp,
    Log,
    Abs,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Function> {
        Some(match name {
            "sqrt" => Function::Sqrt,
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "exp" => Function::Exp,
            "log" | "ln" => Function::Log,
            "abs" => Function::Abs,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Sqrt => "sqrt",
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Exp => "exp",
            Function::Log => "log",
            Function::Abs => "abs",
        }
    }
}

impl Expr {
    pub fn integer(n: i64) -> Expr {
        Expr::Const(Number::integer(n))
    }

    pub fn zero() -> Expr {
        Expr::integer(0)
    }

    pub fn one() -> Expr {
        Expr::integer(1)
    }

    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Var(name.into())
    }

    pub fn power(base: Expr, exponent: Expr) -> Expr {
        Expr::Power(Box::new(base), Box::new(exponent))
    }

    pub fn neg(inner: Expr) -> Expr {
        Expr::Neg(Box::new(inner))
    }

    /// `lhs - rhs`, the form every equation is reduced to.
    pub fn difference(lhs: Expr, rhs: Expr) -> Expr {
        Expr::Sum(vec![lhs, Expr::neg(rhs)])
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Expr::Const(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_number().is_some_and(Number::is_zero)
    }

    /// Whether `name` occurs anywhere in the tree.
    pub fn contains_var(&self, name: &str) -> bool {
        match self {
            Expr::Const(_) => false,
            Expr::Var(v) => v == name,
            Expr::Sum(children) | Expr::Product(children) => {
                children.iter().any(|c| c.contains_var(name))
            }
            Expr::Power(base, exponent) => base.contains_var(name) || exponent.contains_var(name),
            Expr::Neg(inner) | Expr::Func(_, inner) => inner.contains_var(name),
        }
    }

    /// A new tree with every occurrence of `name` replaced by `value`.
    pub fn substitute(&self, name: &str, value: &Expr) -> Expr {
        match self {
            Expr::Const(_) => self.clone(),
            Expr::Var(v) if v == name => value.clone(),
            Expr::Var(_) => self.clone(),
            Expr::Sum(terms) => Expr::Sum(terms.iter().map(|t| t.substitute(name, value)).collect()),
            Expr::Product(factors) => {
                Expr::Product(factors.iter().map(|f| f.substitute(name, value)).collect())
            }
            Expr::Power(base, exponent) => {
                Expr::power(base.substitute(name, value), exponent.substitute(name, value))
            }
            Expr::Neg(inner) => Expr::neg(inner.substitute(name, value)),
            Expr::Func(f, arg) => Expr::Func(*f, Box::new(arg.substitute(name, value))),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Expr::Const(_) => 0,
            Expr::Var(_) => 1,
            Expr::Power(..) => 2,
            Expr::Product(_) => 3,
            Expr::Func(..) => 4,
            Expr::Sum(_) => 5,
            Expr::Neg(_) => 6,
        }
    }

    /// Structural total order, consistent with `==` for finite constants.
    pub fn canonical_cmp(&self, other: &Expr) -> Ordering {
        match (self, other) {
            (Expr::Const(a), Expr::Const(b)) => a.canonical_cmp(b),
            (Expr::Var(a), Expr::Var(b)) => a.cmp(b),
            (Expr::Sum(a), Expr::Sum(b)) | (Expr::Product(a), Expr::Product(b)) => {
                cmp_slices(a, b)
            }
            (Expr::Power(ab, ae), Expr::Power(bb, be)) => {
                ab.canonical_cmp(bb).then_with(|| ae.canonical_cmp(be))
            }
            (Expr::Neg(a), Expr::Neg(b)) => a.canonical_cmp(b),
            (Expr::Func(fa, a), Expr::Func(fb, b)) => fa.cmp(fb).then_with(|| a.canonical_cmp(b)),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

pub(crate) fn cmp_slices(a: &[Expr], b: &[Expr]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match x.canonical_cmp(y) {
            Ordering::Equal => continue,
            unequal => return unequal,
        }
    }
    a.len().cmp(&b.len())
}

// Display precedences, loosest first.
const PREC_SUM: u8 = 1;
const PREC_PRODUCT: u8 = 2;
const PREC_NEG: u8 = 3;
const PREC_POWER: u8 = 4;
const PREC_ATOM: u8 = 5;

fn number_prec(n: &Number) -> u8 {
    if !n.is_real() {
        let pure_imaginary = n.re_f64() == 0.0;
        return match pure_imaginary {
            true if n.im_f64() == 1.0 => PREC_ATOM,
            true => PREC_PRODUCT,
            false => PREC_SUM,
        };
    }
    if n.as_rational().is_some_and(|r| !r.is_integer()) {
        PREC_PRODUCT
    } else if n.is_negative_real() {
        PREC_NEG
    } else {
        PREC_ATOM
    }
}

/// A term of a sum split into its sign and its magnitude.
fn split_sign(term: &Expr) -> (bool, Expr) {
    match term {
        Expr::Const(n) if n.is_negative_real() => (true, Expr::Const(-n)),
        Expr::Neg(inner) => (true, (**inner).clone()),
        Expr::Product(factors) => match factors.split_first() {
            Some((Expr::Const(c), rest)) if c.is_negative_real() => {
                let c = -c;
                let mut magnitude = Vec::with_capacity(factors.len());
                if !c.is_one() || rest.is_empty() {
                    magnitude.push(Expr::Const(c));
                }
                magnitude.extend(rest.iter().cloned());
                match magnitude.len() {
                    1 => (true, magnitude.remove(0)),
                    _ => (true, Expr::Product(magnitude)),
                }
            }
            _ => (false, term.clone()),
        },
        other => (false, other.clone()),
    }
}

fn negative_exponent(exponent: &Expr) -> Option<Number> {
    exponent
        .as_number()
        .filter(|n| n.is_negative_real())
        .map(|n| -n)
}

impl Expr {
    fn prec(&self) -> u8 {
        match self {
            Expr::Const(n) => number_prec(n),
            Expr::Var(_) | Expr::Func(..) => PREC_ATOM,
            Expr::Sum(_) => PREC_SUM,
            Expr::Product(_) => PREC_PRODUCT,
            Expr::Power(_, e) if negative_exponent(e).is_some() => PREC_PRODUCT,
            Expr::Power(..) => PREC_POWER,
            Expr::Neg(_) => PREC_NEG,
        }
    }

    fn fmt_within(&self, f: &mut std::fmt::Formatter<'_>, min_prec: u8) -> std::fmt::Result {
        if self.prec() < min_prec {
            write!(f, "(")?;
            self.fmt_bare(f)?;
            write!(f, ")")
        } else {
            self.fmt_bare(f)
        }
    }

    fn fmt_bare(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Const(n) => write!(f, "{n}"),
            Expr::Var(name) => write!(f, "{name}"),
            Expr::Sum(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if i == 0 {
                        term.fmt_within(f, PREC_SUM)?;
                        continue;
                    }
                    match split_sign(term) {
                        (true, magnitude) => {
                            write!(f, " - ")?;
                            magnitude.fmt_within(f, PREC_PRODUCT)?;
                        }
                        (false, _) => {
                            write!(f, " + ")?;
                            term.fmt_within(f, PREC_PRODUCT)?;
                        }
                    }
                }
                Ok(())
            }
            Expr::Product(factors) => fmt_product(factors, f),
            Expr::Power(_, e) if negative_exponent(e).is_some() => {
                fmt_product(std::slice::from_ref(self), f)
            }
            Expr::Power(base, exponent) => {
                base.fmt_within(f, PREC_ATOM)?;
                write!(f, "^")?;
                exponent.fmt_within(f, PREC_POWER)
            }
            Expr::Neg(inner) => {
                write!(f, "-")?;
                inner.fmt_within(f, PREC_NEG)
            }
            Expr::Func(func, arg) => write!(f, "{}({arg})", func.name()),
        }
    }
}

/// Writes a product as `coefficient*numerator/denominator`.
fn fmt_product(factors: &[Expr], f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut negative = false;
    let mut numerator: Vec<Expr> = Vec::new();
    let mut denominator: Vec<Expr> = Vec::new();

    for (i, factor) in factors.iter().enumerate() {
        match factor {
            Expr::Const(c) if i == 0 && c.is_real() => {
                negative = c.is_negative_real();
                let magnitude = c.abs();
                match magnitude.as_rational() {
                    Some(r) => {
                        let numer = Number::big_integer(r.numer().clone());
                        let denom = Number::big_integer(r.denom().clone());
                        if !numer.is_one() {
                            numerator.push(Expr::Const(numer));
                        }
                        if !denom.is_one() {
                            denominator.push(Expr::Const(denom));
                        }
                    }
                    None if magnitude.is_one() => {}
                    None => numerator.push(Expr::Const(magnitude)),
                }
            }
            Expr::Power(base, exponent) => match negative_exponent(exponent) {
                Some(e) if e.is_one() => denominator.push((**base).clone()),
                Some(e) => denominator.push(Expr::power((**base).clone(), Expr::Const(e))),
                None => numerator.push(factor.clone()),
            },
            other => numerator.push(other.clone()),
        }
    }

    if negative {
        write!(f, "-")?;
    }
    if numerator.is_empty() {
        write!(f, "1")?;
    }
    for (i, factor) in numerator.iter().enumerate() {
        if i > 0 {
            write!(f, "*")?;
        }
        factor.fmt_within(f, PREC_NEG + 1)?;
    }
    match denominator.as_slice() {
        [] => Ok(()),
        [single] => {
            write!(f, "/")?;
            single.fmt_within(f, PREC_POWER)
        }
        many => {
            write!(f, "/(")?;
            for (i, factor) in many.iter().enumerate() {
                if i > 0 {
                    write!(f, "*")?;
                }
                factor.fmt_within(f, PREC_NEG + 1)?;
            }
            write!(f, ")")
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_within(f, PREC_SUM)
    }
}
