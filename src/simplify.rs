//! Rewrites expressions into a canonical normal form.
//!
//! The normal form is what makes structural equality meaningful downstream:
//!
//! - no `Neg` nodes, negation is a `-1` coefficient;
//! - sums and products are flat, with at most one constant, placed last in a
//!   sum and first in a product;
//! - like terms are combined and factors with the same base are merged into
//!   one power;
//! - products never contain a sum factor, they are distributed, and small
//!   positive integer powers of sums are expanded;
//! - terms and factors are sorted deterministically.
//!
//! As a consequence an equation is an identity exactly when its difference
//! simplifies to `Const(0)`, and `simplify` is idempotent.

use std::cmp::Ordering;

use tracing::trace;

use crate::{
    config::Limits,
    error::{DomainError, DomainErrorKind},
    expr::{Expr, Function, cmp_slices},
    number::Number,
};

pub fn simplify(expr: &Expr, limits: &Limits) -> Result<Expr, DomainError> {
    Simplifier::new(limits).simplify(expr)
}

pub struct Simplifier<'l> {
    limits: &'l Limits,
}

impl<'l> Simplifier<'l> {
    pub fn new(limits: &'l Limits) -> Self {
        Simplifier { limits }
    }

    pub fn simplify(&self, expr: &Expr) -> Result<Expr, DomainError> {
        match expr {
            Expr::Const(n) => {
                self.check(n)?;
                Ok(expr.clone())
            }
            Expr::Var(_) => Ok(expr.clone()),
            Expr::Neg(inner) => {
                let inner = self.simplify(inner)?;
                self.product(vec![Expr::Const(Number::minus_one()), inner])
            }
            Expr::Sum(terms) => {
                let terms = terms
                    .iter()
                    .map(|t| self.simplify(t))
                    .collect::<Result<Vec<_>, _>>()?;
                let sum = self.sum(terms);
                match &sum {
                    Expr::Const(n) => self.check(n)?,
                    Expr::Sum(terms) => {
                        if let Some(Expr::Const(n)) = terms.last() {
                            self.check(n)?;
                        }
                    }
                    _ => {}
                }
                Ok(sum)
            }
            Expr::Product(factors) => {
                let factors = factors
                    .iter()
                    .map(|f| self.simplify(f))
                    .collect::<Result<Vec<_>, _>>()?;
                self.product(factors)
            }
            Expr::Power(base, exponent) => {
                let base = self.simplify(base)?;
                let exponent = self.simplify(exponent)?;
                self.power(base, exponent)
            }
            Expr::Func(func, arg) => {
                let arg = self.simplify(arg)?;
                self.apply(*func, arg)
            }
        }
    }

    /// Sum of already simplified terms.
    pub fn sum(&self, terms: Vec<Expr>) -> Expr {
        let mut constant = Number::zero();
        let mut like: Vec<(Expr, Number)> = Vec::new();

        for term in flatten_sum(terms) {
            match term {
                Expr::Const(n) => constant = &constant + &n,
                other => {
                    let (coefficient, key) = split_coefficient(other);
                    match like.iter_mut().find(|(k, _)| *k == key) {
                        Some((_, total)) => *total = &*total + &coefficient,
                        None => like.push((key, coefficient)),
                    }
                }
            }
        }

        let mut out: Vec<Expr> = like
            .into_iter()
            .filter(|(_, coefficient)| !coefficient.is_zero())
            .map(|(key, coefficient)| with_coefficient(coefficient, key))
            .collect();
        out.sort_by(term_order);
        if !constant.is_zero() {
            out.push(Expr::Const(constant));
        }

        match out.len() {
            0 => Expr::zero(),
            1 => out.remove(0),
            _ => Expr::Sum(out),
        }
    }

    /// Product of already simplified factors.
    pub fn product(&self, factors: Vec<Expr>) -> Result<Expr, DomainError> {
        let mut coefficient = Number::one();
        let mut bases: Vec<(Expr, Expr)> = Vec::new();

        for factor in flatten_product(factors) {
            let (base, exponent) = match factor {
                Expr::Const(n) => {
                    coefficient = &coefficient * &n;
                    continue;
                }
                Expr::Power(base, exponent) => (*base, *exponent),
                other => (other, Expr::one()),
            };
            match bases.iter_mut().find(|(b, _)| *b == base) {
                Some((_, total)) => *total = self.sum(vec![total.clone(), exponent]),
                None => bases.push((base, exponent)),
            }
        }

        if coefficient.is_zero() {
            return Ok(Expr::zero());
        }

        let mut rest = Vec::with_capacity(bases.len());
        let mut regroup = false;
        for (base, exponent) in bases {
            match self.power(base, exponent)? {
                Expr::Const(n) => coefficient = &coefficient * &n,
                Expr::Product(inner) => {
                    regroup = true;
                    rest.extend(inner);
                }
                other => rest.push(other),
            }
        }
        self.check(&coefficient)?;
        if regroup {
            rest.insert(0, Expr::Const(coefficient));
            return self.product(rest);
        }
        if coefficient.is_zero() {
            return Ok(Expr::zero());
        }

        if let Some(at) = rest.iter().position(|f| matches!(f, Expr::Sum(_))) {
            let Expr::Sum(terms) = rest.remove(at) else {
                unreachable!("position matched a sum");
            };
            rest.insert(0, Expr::Const(coefficient));
            let expanded = terms
                .into_iter()
                .map(|term| {
                    let mut factors = rest.clone();
                    factors.push(term);
                    self.product(factors)
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(self.sum(expanded));
        }

        rest.sort_by(Expr::canonical_cmp);
        match (coefficient.is_one(), rest.len()) {
            (_, 0) => Ok(Expr::Const(coefficient)),
            (true, 1) => Ok(rest.remove(0)),
            (true, _) => Ok(Expr::Product(rest)),
            (false, _) => {
                rest.insert(0, Expr::Const(coefficient));
                Ok(Expr::Product(rest))
            }
        }
    }

    /// `base ^ exponent` for already simplified operands.
    pub fn power(&self, base: Expr, exponent: Expr) -> Result<Expr, DomainError> {
        if exponent.is_zero() {
            return Ok(Expr::one());
        }
        if exponent.as_number().is_some_and(Number::is_one) {
            return Ok(base);
        }

        let integer = exponent.as_number().and_then(Number::as_integer);
        match (base, exponent) {
            (Expr::Const(b), Expr::Const(e)) => {
                Ok(Expr::Const(b.pow(&e, self.limits)?))
            }
            (Expr::Const(b), _) if b.is_one() => Ok(Expr::one()),
            (Expr::Power(inner, inner_exp), exponent) if integer.is_some() => {
                let exponent = self.product(vec![*inner_exp, exponent])?;
                self.power(*inner, exponent)
            }
            (Expr::Product(factors), exponent) if integer.is_some() => {
                let factors = factors
                    .into_iter()
                    .map(|f| self.power(f, exponent.clone()))
                    .collect::<Result<Vec<_>, _>>()?;
                self.product(factors)
            }
            (Expr::Sum(terms), _) if integer.as_ref().is_some_and(|n| self.expands(n)) => {
                let times = integer.and_then(|n| u32::try_from(n).ok()).unwrap_or(1);
                trace!(times, "expanding power of a sum");
                Ok(self.sum(self.expand_power(&terms, times)?))
            }
            (base, exponent) => Ok(Expr::power(base, exponent)),
        }
    }

    /// Terms of `(a_1 + a_2 + ...)^times`, for `times >= 1`.
    pub(crate) fn expand_power(
        &self,
        terms: &[Expr],
        times: u32,
    ) -> Result<Vec<Expr>, DomainError> {
        let mut acc = terms.to_vec();
        for _ in 1..times {
            acc = self.multiply_sums(&acc, terms)?;
        }
        Ok(acc)
    }

    /// Terms of `(a_1 + a_2 + ...) * (b_1 + b_2 + ...)`, multiplied out
    /// pairwise. Equal sums must not reach `product` together, it would fold
    /// them back into a power.
    pub(crate) fn multiply_sums(
        &self,
        a: &[Expr],
        b: &[Expr],
    ) -> Result<Vec<Expr>, DomainError> {
        let mut products = Vec::with_capacity(a.len() * b.len());
        for x in a {
            for y in b {
                products.push(self.product(vec![x.clone(), y.clone()])?);
            }
        }
        Ok(match self.sum(products) {
            Expr::Sum(terms) => terms,
            other => vec![other],
        })
    }

    /// Fails with `Overflow` on a folded constant that is not finite or
    /// outgrew `max_exact_bits`.
    fn check(&self, n: &Number) -> Result<(), DomainError> {
        if n.is_finite() && n.exact_bits() <= self.limits.max_exact_bits {
            Ok(())
        } else {
            Err(DomainErrorKind::Overflow.into())
        }
    }

    fn expands(&self, n: &num_bigint::BigInt) -> bool {
        u32::try_from(n).is_ok_and(|n| n >= 2 && n <= self.limits.max_expand_exponent)
    }

    fn apply(&self, func: Function, arg: Expr) -> Result<Expr, DomainError> {
        if func == Function::Sqrt {
            return self.power(arg, Expr::Const(Number::ratio(1, 2)));
        }
        let Expr::Const(n) = arg else {
            return Ok(Expr::Func(func, Box::new(arg)));
        };
        if func == Function::Abs {
            return Ok(Expr::Const(n.abs()));
        }
        let z = n.to_complex64();
        let mut value = match func {
            Function::Sin => z.sin(),
            Function::Cos => z.cos(),
            Function::Tan => z.tan(),
            Function::Exp => z.exp(),
            Function::Log if n.is_zero() => return Err(DomainErrorKind::LogOfZero.into()),
            Function::Log => z.ln(),
            Function::Sqrt | Function::Abs => unreachable!("handled above"),
        };
        if !value.re.is_finite() || !value.im.is_finite() {
            return Err(DomainErrorKind::Overflow.into());
        }
        if matches!(func, Function::Sin | Function::Cos | Function::Tan) {
            // sin(pi) lands one rounding error away from zero
            let noise = f64::EPSILON * z.norm();
            for part in [&mut value.re, &mut value.im] {
                if part.abs() <= noise {
                    *part = 0.0;
                }
            }
        }
        Ok(Expr::Const(Number::Float(value)))
    }
}

fn flatten_sum(terms: Vec<Expr>) -> Vec<Expr> {
    let mut flat = Vec::with_capacity(terms.len());
    for term in terms {
        match term {
            Expr::Sum(inner) => flat.extend(flatten_sum(inner)),
            other => flat.push(other),
        }
    }
    flat
}

fn flatten_product(factors: Vec<Expr>) -> Vec<Expr> {
    let mut flat = Vec::with_capacity(factors.len());
    for factor in factors {
        match factor {
            Expr::Product(inner) => flat.extend(flatten_product(inner)),
            other => flat.push(other),
        }
    }
    flat
}

/// Splits a simplified term into its numeric coefficient and the rest.
fn split_coefficient(term: Expr) -> (Number, Expr) {
    match term {
        Expr::Product(mut factors) if matches!(factors.first(), Some(Expr::Const(_))) => {
            let Expr::Const(coefficient) = factors.remove(0) else {
                unreachable!("first factor is a constant");
            };
            let key = match factors.len() {
                1 => factors.remove(0),
                _ => Expr::Product(factors),
            };
            (coefficient, key)
        }
        other => (Number::one(), other),
    }
}

fn with_coefficient(coefficient: Number, key: Expr) -> Expr {
    if coefficient.is_one() {
        return key;
    }
    match key {
        Expr::Product(mut factors) => {
            factors.insert(0, Expr::Const(coefficient));
            Expr::Product(factors)
        }
        other => Expr::Product(vec![Expr::Const(coefficient), other]),
    }
}

/// Rough degree used to list higher-order terms first.
fn degree(expr: &Expr) -> f64 {
    match expr {
        Expr::Const(_) => 0.0,
        Expr::Var(_) | Expr::Func(..) | Expr::Sum(_) | Expr::Neg(_) => 1.0,
        Expr::Power(base, exponent) => match exponent.as_number() {
            Some(n) if n.is_real() => n.re_f64() * degree(base),
            _ => degree(base),
        },
        Expr::Product(factors) => factors.iter().map(degree).sum(),
    }
}

fn term_order(a: &Expr, b: &Expr) -> Ordering {
    let (ka, kb) = (key_factors(a), key_factors(b));
    let total = |key: &[Expr]| key.iter().map(degree).sum::<f64>();
    total(kb)
        .total_cmp(&total(ka))
        .then_with(|| cmp_slices(ka, kb))
        .then_with(|| a.canonical_cmp(b))
}

fn key_factors(term: &Expr) -> &[Expr] {
    match term {
        Expr::Product(factors) if matches!(factors.first(), Some(Expr::Const(_))) => &factors[1..],
        other => std::slice::from_ref(other),
    }
}
