use nalgebra::DMatrix;
use num_bigint::BigInt;
use num_complex::Complex64;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use tracing::{debug, trace};

use crate::{
    SolveError,
    config::Limits,
    error::{DomainError, DomainErrorKind, Unsolved},
    expr::Expr,
    number::Number,
    simplify::Simplifier,
};

/// What solving an input produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SolutionSet {
    /// The equation never holds.
    Empty,
    /// The equation holds for every value of the variable.
    AllReals,
    /// Distinct roots, in reporting order.
    Finite(Vec<Expr>),
    /// The input had no variable and was evaluated instead.
    Scalar(Expr),
}

const MAX_CLEARING_PASSES: usize = 4;
const ROOT_TOLERANCE: f64 = 1e-9;

pub struct Solver<'l> {
    limits: &'l Limits,
    simplifier: Simplifier<'l>,
}

impl<'l> Solver<'l> {
    pub fn new(limits: &'l Limits) -> Self {
        Solver {
            limits,
            simplifier: Simplifier::new(limits),
        }
    }

    /// Solves `expr = 0` for `variable`.
    ///
    /// `expr` is the parser's output, not yet simplified: whether the
    /// variable occurs at all is decided on the input as written, so
    /// `x - x = 5` is a contradiction rather than an evaluation.
    pub fn solve(&self, expr: &Expr, variable: &str) -> Result<SolutionSet, SolveError> {
        if !expr.contains_var(variable) {
            let value = self.simplifier.simplify(expr)?;
            debug!(%value, "no `{variable}` in input, evaluating");
            return Ok(SolutionSet::Scalar(value));
        }

        let simplified = self.simplifier.simplify(expr)?;
        debug!(%simplified, "simplified");
        if !simplified.contains_var(variable) {
            return Ok(degenerate(&simplified));
        }

        let (cleared, poles) = self.clear_denominators(simplified, variable)?;
        if !cleared.contains_var(variable) {
            return Ok(degenerate(&cleared));
        }

        let expanded = self.expand_sum_powers(cleared, variable)?;
        let poly = Polynomial::extract(&expanded, variable, &self.simplifier, self.limits)?;
        trace!(degree = poly.degree(), "classified as polynomial");
        if poly.degree() == 0 {
            return Ok(degenerate(&poly.coefficients[0]));
        }

        let roots = self.roots(&poly)?;
        let roots = self.finish(roots, &poles, variable);
        Ok(if roots.is_empty() {
            SolutionSet::Empty
        } else {
            SolutionSet::Finite(roots)
        })
    }

    /// Multiplies every term through by the denominators that depend on
    /// `variable`, returning the cleared expression and the denominators.
    fn clear_denominators(
        &self,
        expr: Expr,
        variable: &str,
    ) -> Result<(Expr, Vec<Expr>), DomainError> {
        let mut current = expr;
        let mut poles = Vec::new();

        for _ in 0..MAX_CLEARING_PASSES {
            let denominators = denominators(&current, variable, self.limits.max_degree);
            if denominators.is_empty() {
                break;
            }
            trace!(count = denominators.len(), "clearing denominators");

            let terms = match current {
                Expr::Sum(terms) => terms,
                other => vec![other],
            };
            let mut cleared = Vec::with_capacity(terms.len());
            for term in terms {
                let mut factors = vec![term];
                for (base, multiplicity) in &denominators {
                    factors.extend(std::iter::repeat_n(base.clone(), *multiplicity));
                }
                cleared.push(self.simplifier.product(factors)?);
            }
            current = self.simplifier.sum(cleared);
            poles.extend(denominators.into_iter().map(|(base, _)| base));
        }

        Ok((current, poles))
    }

    /// Multiplies out the powers of sums that `simplify` leaves alone because
    /// their exponent is above `max_expand_exponent`, so that `(x + 1)^20`
    /// can be read as a polynomial. The expanded degree of a term must stay
    /// within `max_degree`.
    fn expand_sum_powers(&self, expr: Expr, variable: &str) -> Result<Expr, SolveError> {
        let any = as_terms(&expr)
            .iter()
            .flat_map(|term| as_factors(term))
            .any(|factor| expandable(factor, variable).is_some());
        if !any {
            return Ok(expr);
        }

        let mut expanded = Vec::new();
        for term in as_terms(&expr) {
            let mut acc = vec![Expr::one()];
            let mut rest = Vec::new();
            let mut degree = 0usize;
            for factor in as_factors(term) {
                let Some((terms, times, factor_degree)) = expandable(factor, variable) else {
                    rest.push(factor.clone());
                    continue;
                };
                degree = degree.saturating_add(factor_degree);
                if degree > self.limits.max_degree {
                    return Err(Unsolved::new(format!(
                        "degree {degree} exceeds the limit of {}",
                        self.limits.max_degree
                    ))
                    .into());
                }
                trace!(times, "expanding power of a polynomial");
                let power = self.simplifier.expand_power(terms, times)?;
                acc = self.simplifier.multiply_sums(&acc, &power)?;
            }
            let rest = self.simplifier.product(rest)?;
            expanded.extend(self.simplifier.multiply_sums(&acc, std::slice::from_ref(&rest))?);
        }
        Ok(self.simplifier.sum(expanded))
    }

    fn roots(&self, poly: &Polynomial) -> Result<Vec<Expr>, SolveError> {
        let degree = poly.degree();
        let Some(numeric) = poly.numeric() else {
            if degree == 1 {
                return Ok(vec![self.symbolic_linear(poly)?]);
            }
            return Err(Unsolved::new(format!(
                "degree {degree} equation with symbolic coefficients"
            ))
            .into());
        };

        let roots = match degree {
            1 => vec![linear(&numeric[1], &numeric[0])?],
            2 => quadratic(&numeric[2], &numeric[1], &numeric[0])?,
            _ => self.higher(&numeric)?,
        };
        if !roots.iter().all(Number::is_finite) {
            return Err(DomainErrorKind::Overflow.into());
        }
        Ok(roots.into_iter().map(Expr::Const).collect())
    }

    /// `-b/a` for `a*v + b` where the coefficients involve other symbols.
    fn symbolic_linear(&self, poly: &Polynomial) -> Result<Expr, DomainError> {
        let a = poly.coefficients[1].clone();
        let b = poly.coefficients[0].clone();
        let inverse = self.simplifier.power(a, Expr::integer(-1))?;
        self.simplifier
            .product(vec![Expr::Const(Number::minus_one()), b, inverse])
    }

    fn higher(&self, coefficients: &[Number]) -> Result<Vec<Number>, SolveError> {
        let exact: Option<Vec<BigRational>> = coefficients
            .iter()
            .map(|c| c.as_rational().cloned())
            .collect();
        let Some(mut poly) = exact else {
            return numeric_roots(coefficients);
        };

        let mut roots = Vec::new();
        if poly[0].is_zero() {
            roots.push(Number::zero());
            while poly.len() > 1 && poly[0].is_zero() {
                poly.remove(0);
            }
        }
        let mut poly = square_free(poly);
        trace!(degree = poly.len() - 1, "square-free part");

        loop {
            let degree = poly.len() - 1;
            if degree <= 2 {
                let small: Vec<Number> = poly.iter().cloned().map(Number::rational).collect();
                match degree {
                    1 => roots.push(linear(&small[1], &small[0])?),
                    2 => roots.extend(quadratic(&small[2], &small[1], &small[0])?),
                    _ => {}
                }
                break;
            }

            match self.rational_root(&poly) {
                RootSearch::Found(root) => {
                    trace!(%root, "rational root");
                    poly = deflate(&poly, &root);
                    roots.push(Number::rational(root));
                }
                _ if degree <= 4 => {
                    let residual: Vec<Number> =
                        poly.iter().cloned().map(Number::rational).collect();
                    roots.extend(numeric_roots(&residual)?);
                    break;
                }
                RootSearch::Exhausted => {
                    return Err(Unsolved::new(format!(
                        "no rational root found for a degree {degree} polynomial"
                    ))
                    .into());
                }
                RootSearch::BoundReached => {
                    return Err(Unsolved::new(format!(
                        "rational root search bound reached for a degree {degree} polynomial"
                    ))
                    .into());
                }
            }
        }
        Ok(roots)
    }

    /// Tests `±p/q` over divisors `p` of the constant term and `q` of the
    /// leading coefficient, smallest first, for at most
    /// `max_root_candidates` candidates.
    fn rational_root(&self, poly: &[BigRational]) -> RootSearch {
        let integers = integer_coefficients(poly);
        let (Some(constant), Some(leading)) = (integers.first(), integers.last()) else {
            return RootSearch::Exhausted;
        };
        let (ps, all_ps) = self.candidate_divisors(&constant.abs());
        let (qs, all_qs) = self.candidate_divisors(&leading.abs());

        let mut budget = self.limits.max_root_candidates;
        for q in &qs {
            for p in &ps {
                for numer in [p.clone(), -p] {
                    if budget == 0 {
                        debug!("rational root candidate budget spent");
                        return RootSearch::BoundReached;
                    }
                    budget -= 1;
                    let candidate = BigRational::new(numer, q.clone());
                    if evaluate(poly, &candidate).is_zero() {
                        return RootSearch::Found(candidate);
                    }
                }
            }
        }
        if all_ps && all_qs {
            RootSearch::Exhausted
        } else {
            RootSearch::BoundReached
        }
    }

    /// Divisors of `n` and whether that list is complete. When enumerating
    /// them all would take more than `max_divisor_search` trial divisions,
    /// only the small ones are listed.
    fn candidate_divisors(&self, n: &BigInt) -> (Vec<BigInt>, bool) {
        if let Some(all) = divisors(n, self.limits.max_divisor_search) {
            return (all, true);
        }
        let bound = (self.limits.max_root_candidates / 2) as u64;
        let small = (1..=bound.min(self.limits.max_divisor_search))
            .map(BigInt::from)
            .filter(|d| (n % d).is_zero())
            .collect::<Vec<_>>();
        debug!(found = small.len(), "divisor search bound reached, using small divisors");
        (small, false)
    }

    /// Drops roots that land on a cleared denominator, then orders and
    /// deduplicates the rest.
    fn finish(&self, roots: Vec<Expr>, poles: &[Expr], variable: &str) -> Vec<Expr> {
        let mut kept: Vec<Expr> = roots
            .into_iter()
            .filter(|root| {
                poles.iter().all(|pole| {
                    match self.simplifier.simplify(&pole.substitute(variable, root)) {
                        Ok(value) => !vanishes(&value),
                        Err(_) => false,
                    }
                })
            })
            .collect();

        kept.sort_by(|a, b| match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x.root_cmp(y),
            _ => a.canonical_cmp(b),
        });
        kept.dedup_by(|a, b| match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x.approx_eq(y, ROOT_TOLERANCE),
            _ => a == b,
        });
        kept
    }
}

/// Outcome of one rational root search.
enum RootSearch {
    Found(BigRational),
    /// Every candidate was tested.
    Exhausted,
    /// The search stopped at a limit before testing every candidate.
    BoundReached,
}

fn degenerate(constant: &Expr) -> SolutionSet {
    if constant.is_zero() {
        SolutionSet::AllReals
    } else {
        SolutionSet::Empty
    }
}

fn vanishes(value: &Expr) -> bool {
    match value.as_number() {
        Some(Number::Float(c)) => c.norm() < ROOT_TOLERANCE,
        Some(n) => n.is_zero(),
        None => false,
    }
}

/// Bases raised to negative integer powers in the terms of `expr`, each with
/// its largest multiplicity.
fn denominators(expr: &Expr, variable: &str, max_multiplicity: usize) -> Vec<(Expr, usize)> {
    let mut found: Vec<(Expr, usize)> = Vec::new();
    for term in as_terms(expr) {
        for factor in as_factors(term) {
            let Expr::Power(base, exponent) = factor else {
                continue;
            };
            if !base.contains_var(variable) {
                continue;
            }
            let Some(multiplicity) = exponent
                .as_number()
                .and_then(Number::as_integer)
                .filter(|n| n.is_negative())
                .and_then(|n| (-n).to_usize())
                .filter(|n| *n <= max_multiplicity)
            else {
                continue;
            };
            match found.iter_mut().find(|(b, _)| b == &**base) {
                Some((_, highest)) => *highest = (*highest).max(multiplicity),
                None => found.push(((**base).clone(), multiplicity)),
            }
        }
    }
    found
}

fn as_terms(expr: &Expr) -> &[Expr] {
    match expr {
        Expr::Sum(terms) => terms,
        other => std::slice::from_ref(other),
    }
}

fn as_factors(term: &Expr) -> &[Expr] {
    match term {
        Expr::Product(factors) => factors,
        other => std::slice::from_ref(other),
    }
}

/// A polynomial in the solve variable, coefficients indexed by degree.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    pub coefficients: Vec<Expr>,
}

impl Polynomial {
    /// Reads a simplified, denominator-free expression as a polynomial in
    /// `variable`. Any other occurrence of the variable is `Unsolved`.
    pub fn extract(
        expr: &Expr,
        variable: &str,
        simplifier: &Simplifier<'_>,
        limits: &Limits,
    ) -> Result<Polynomial, Unsolved> {
        let mut by_degree: Vec<Vec<Expr>> = Vec::new();
        for term in as_terms(expr) {
            let mut degree = 0usize;
            let mut rest = Vec::new();
            for factor in as_factors(term) {
                if !factor.contains_var(variable) {
                    rest.push(factor.clone());
                    continue;
                }
                degree += monomial_degree(factor, variable).ok_or_else(|| {
                    Unsolved::new(format!("`{variable}` appears in the non-polynomial term `{factor}`"))
                })?;
            }
            if degree > limits.max_degree {
                return Err(Unsolved::new(format!(
                    "degree {degree} exceeds the limit of {}",
                    limits.max_degree
                )));
            }
            if by_degree.len() <= degree {
                by_degree.resize(degree + 1, Vec::new());
            }
            let coefficient = match rest.len() {
                0 => Expr::one(),
                1 => rest.remove(0),
                _ => Expr::Product(rest),
            };
            by_degree[degree].push(coefficient);
        }

        let mut coefficients: Vec<Expr> = by_degree
            .into_iter()
            .map(|terms| simplifier.sum(terms))
            .collect();
        while coefficients.len() > 1 && coefficients.last().is_some_and(Expr::is_zero) {
            coefficients.pop();
        }
        if coefficients.is_empty() {
            coefficients.push(Expr::zero());
        }
        Ok(Polynomial { coefficients })
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    /// The coefficients as numbers, if none of them is symbolic.
    pub fn numeric(&self) -> Option<Vec<Number>> {
        self.coefficients
            .iter()
            .map(|c| c.as_number().cloned())
            .collect()
    }
}

fn monomial_degree(factor: &Expr, variable: &str) -> Option<usize> {
    match factor {
        Expr::Var(v) if v == variable => Some(1),
        Expr::Power(base, exponent) if matches!(&**base, Expr::Var(v) if v == variable) => {
            exponent
                .as_number()?
                .as_integer()
                .filter(|n| !n.is_negative())?
                .to_usize()
        }
        _ => None,
    }
}

/// A power of a polynomial in `variable` with numeric coefficients and an
/// integer exponent of at least 2: its terms, the exponent and the degree it
/// expands to.
fn expandable<'e>(factor: &'e Expr, variable: &str) -> Option<(&'e [Expr], u32, usize)> {
    let Expr::Power(base, exponent) = factor else {
        return None;
    };
    let Expr::Sum(terms) = &**base else {
        return None;
    };
    let times = exponent
        .as_number()?
        .as_integer()?
        .to_u32()
        .filter(|n| *n >= 2)?;
    let mut degree = 0usize;
    for term in terms {
        let mut term_degree = 0usize;
        for factor in as_factors(term) {
            if !matches!(factor, Expr::Const(_)) {
                term_degree += monomial_degree(factor, variable)?;
            }
        }
        degree = degree.max(term_degree);
    }
    (degree > 0).then(|| (terms.as_slice(), times, degree.saturating_mul(times as usize)))
}

fn linear(a: &Number, b: &Number) -> Result<Number, DomainError> {
    (-b).checked_div(a)
}

/// Both roots of `a*v^2 + b*v + c`, or the single root when the
/// discriminant is zero.
fn quadratic(a: &Number, b: &Number, c: &Number) -> Result<Vec<Number>, DomainError> {
    let b_squared = b * b;
    let four_ac = &(&Number::integer(4) * a) * c;
    let discriminant = &b_squared - &four_ac;
    let two_a = &Number::integer(2) * a;
    let minus_b = -b;
    trace!(%discriminant, "quadratic");
    if vanishes_against(&discriminant, &b_squared, &four_ac) {
        return Ok(vec![minus_b.checked_div(&two_a)?]);
    }
    let root = discriminant.sqrt()?;
    Ok(vec![
        (&minus_b + &root).checked_div(&two_a)?,
        (&minus_b - &root).checked_div(&two_a)?,
    ])
}

/// Whether `difference = lhs - rhs` is zero. A float difference counts as
/// zero within `ROOT_TOLERANCE` of the larger operand.
fn vanishes_against(difference: &Number, lhs: &Number, rhs: &Number) -> bool {
    match difference {
        Number::Exact(_) => difference.is_zero(),
        Number::Float(d) => {
            let scale = lhs.to_complex64().norm().max(rhs.to_complex64().norm());
            d.norm() <= ROOT_TOLERANCE * scale
        }
    }
}

fn evaluate(poly: &[BigRational], x: &BigRational) -> BigRational {
    poly.iter()
        .rev()
        .fold(BigRational::zero(), |acc, coefficient| acc * x + coefficient)
}

/// Divides `poly` by `(v - root)`, dropping the remainder.
fn deflate(poly: &[BigRational], root: &BigRational) -> Vec<BigRational> {
    let degree = poly.len() - 1;
    let mut quotient = vec![BigRational::zero(); degree];
    let mut carry = BigRational::zero();
    for k in (1..=degree).rev() {
        carry = &poly[k] + &carry * root;
        quotient[k - 1] = carry.clone();
    }
    quotient
}

/// `poly / gcd(poly, poly')`: the same roots, each with multiplicity one.
fn square_free(poly: Vec<BigRational>) -> Vec<BigRational> {
    let repeated = poly_gcd(&poly, &derivative(&poly));
    if repeated.len() <= 1 {
        return poly;
    }
    divide(&poly, &repeated).0
}

fn derivative(poly: &[BigRational]) -> Vec<BigRational> {
    poly.iter()
        .enumerate()
        .skip(1)
        .map(|(k, c)| c * BigRational::from_integer(BigInt::from(k)))
        .collect()
}

/// Euclid's algorithm over the rationals. The zero polynomial is empty.
fn poly_gcd(a: &[BigRational], b: &[BigRational]) -> Vec<BigRational> {
    let (mut a, mut b) = (a.to_vec(), b.to_vec());
    trim(&mut a);
    trim(&mut b);
    while !b.is_empty() {
        let (_, remainder) = divide(&a, &b);
        a = std::mem::replace(&mut b, remainder);
    }
    a
}

/// Quotient and remainder of polynomial long division; `divisor` must have a
/// nonzero leading coefficient.
fn divide(
    dividend: &[BigRational],
    divisor: &[BigRational],
) -> (Vec<BigRational>, Vec<BigRational>) {
    let mut remainder = dividend.to_vec();
    let Some(leading) = divisor.last() else {
        return (Vec::new(), remainder);
    };
    if dividend.len() < divisor.len() {
        return (Vec::new(), remainder);
    }
    let steps = dividend.len() - divisor.len();
    let mut quotient = vec![BigRational::zero(); steps + 1];
    for shift in (0..=steps).rev() {
        let factor = &remainder[shift + divisor.len() - 1] / leading;
        for (k, c) in divisor.iter().enumerate() {
            remainder[shift + k] -= &factor * c;
        }
        quotient[shift] = factor;
    }
    trim(&mut remainder);
    (quotient, remainder)
}

fn trim(poly: &mut Vec<BigRational>) {
    while poly.last().is_some_and(|c| c.is_zero()) {
        poly.pop();
    }
}

/// Scales rational coefficients to integers with no common factor.
fn integer_coefficients(poly: &[BigRational]) -> Vec<BigInt> {
    let lcm = poly
        .iter()
        .fold(BigInt::one(), |acc, c| acc.lcm(c.denom()));
    let scaled: Vec<BigInt> = poly
        .iter()
        .map(|c| (c * BigRational::from_integer(lcm.clone())).to_integer())
        .collect();
    let content = scaled.iter().fold(BigInt::zero(), |acc, c| acc.gcd(c));
    if content.is_zero() || content.is_one() {
        scaled
    } else {
        scaled.into_iter().map(|c| c / &content).collect()
    }
}

/// All positive divisors of `n`, or `None` when trial division would exceed
/// `max_search` steps.
fn divisors(n: &BigInt, max_search: u64) -> Option<Vec<BigInt>> {
    let n = n.to_u64()?;
    if n == 0 {
        return None;
    }
    let mut found = Vec::new();
    let mut d = 1u64;
    while d.checked_mul(d).is_some_and(|square| square <= n) {
        if d > max_search {
            return None;
        }
        if n % d == 0 {
            found.push(d);
            if d != n / d {
                found.push(n / d);
            }
        }
        d += 1;
    }
    found.sort_unstable();
    Some(found.into_iter().map(BigInt::from).collect())
}

/// Roots of a cubic or quartic, as the eigenvalues of its companion matrix.
fn numeric_roots(coefficients: &[Number]) -> Result<Vec<Number>, SolveError> {
    let degree = coefficients.len().saturating_sub(1);
    if degree > 4 {
        return Err(Unsolved::new(format!(
            "degree {degree} polynomial with inexact coefficients"
        ))
        .into());
    }
    if degree <= 2 {
        let roots = match degree {
            1 => vec![linear(&coefficients[1], &coefficients[0])?],
            2 => quadratic(&coefficients[2], &coefficients[1], &coefficients[0])?,
            _ => Vec::new(),
        };
        return Ok(roots);
    }

    let leading = coefficients[degree].to_complex64();
    let mut companion = DMatrix::<Complex64>::zeros(degree, degree);
    for row in 1..degree {
        companion[(row, row - 1)] = Complex64::new(1.0, 0.0);
    }
    for (column, coefficient) in coefficients[..degree].iter().rev().enumerate() {
        companion[(0, column)] = -coefficient.to_complex64() / leading;
    }
    let eigenvalues = companion.eigenvalues().ok_or_else(|| {
        Unsolved::new(format!(
            "eigenvalues of the degree {degree} companion matrix did not converge"
        ))
    })?;
    Ok(eigenvalues.iter().map(|&z| snap(z)).collect())
}

/// Zeroes parts of a float root that are rounding noise.
fn snap(z: Complex64) -> Number {
    let re = if z.re.abs() <= ROOT_TOLERANCE { 0.0 } else { z.re };
    let im = if z.im.abs() <= ROOT_TOLERANCE * (1.0 + z.re.abs()) {
        0.0
    } else {
        z.im
    };
    Number::Float(Complex64::new(re, im))
}
