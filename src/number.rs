use std::{
    cmp::Ordering,
    fmt::Display,
    ops::{Add, Mul, Neg, Sub},
};

use num_bigint::BigInt;
use num_complex::{Complex, Complex64};
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::{
    config::Limits,
    error::{DomainError, DomainErrorKind},
};

/// A numeric constant.
///
/// Integer literals and everything computed from them stay exact as Gaussian
/// rationals. Decimal literals, irrational roots and transcendental functions
/// produce floats, and a float anywhere in an operation makes the result a
/// float.
#[derive(Debug, Clone, PartialEq)]
pub enum Number {
    Exact(Complex<BigRational>),
    Float(Complex64),
}

fn rat(n: i64) -> BigRational {
    BigRational::from_integer(BigInt::from(n))
}

fn rat_to_f64(r: &BigRational) -> f64 {
    r.to_f64().unwrap_or(f64::NAN)
}

impl Number {
    pub fn integer(n: i64) -> Self {
        Number::rational(rat(n))
    }

    pub fn big_integer(n: BigInt) -> Self {
        Number::rational(BigRational::from_integer(n))
    }

    pub fn rational(r: BigRational) -> Self {
        Number::Exact(Complex::new(r, BigRational::zero()))
    }

    /// `numer / denom`; `denom` must be nonzero.
    pub fn ratio(numer: i64, denom: i64) -> Self {
        Number::rational(BigRational::new(BigInt::from(numer), BigInt::from(denom)))
    }

    pub fn float(x: f64) -> Self {
        Number::Float(Complex64::new(x, 0.0))
    }

    pub fn imaginary_unit() -> Self {
        Number::Exact(Complex::new(BigRational::zero(), BigRational::one()))
    }

    pub fn zero() -> Self {
        Number::integer(0)
    }

    pub fn one() -> Self {
        Number::integer(1)
    }

    pub fn minus_one() -> Self {
        Number::integer(-1)
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Number::Exact(c) => c.is_zero(),
            Number::Float(c) => c.re == 0.0 && c.im == 0.0,
        }
    }

    pub fn is_one(&self) -> bool {
        match self {
            Number::Exact(c) => c.is_one(),
            Number::Float(c) => c.re == 1.0 && c.im == 0.0,
        }
    }

    /// Exact values are always finite; floats may have overflowed.
    pub fn is_finite(&self) -> bool {
        match self {
            Number::Exact(_) => true,
            Number::Float(c) => c.re.is_finite() && c.im.is_finite(),
        }
    }

    /// Bits needed to store the value exactly, zero for floats.
    pub fn exact_bits(&self) -> u64 {
        match self {
            Number::Exact(c) => {
                let bits = |r: &BigRational| r.numer().bits() + r.denom().bits();
                bits(&c.re).max(bits(&c.im))
            }
            Number::Float(_) => 0,
        }
    }

    pub fn is_real(&self) -> bool {
        match self {
            Number::Exact(c) => c.im.is_zero(),
            Number::Float(c) => c.im == 0.0,
        }
    }

    /// The value as an exact real rational, if it is one.
    pub fn as_rational(&self) -> Option<&BigRational> {
        match self {
            Number::Exact(c) if c.im.is_zero() => Some(&c.re),
            _ => None,
        }
    }

    /// The value as an exact integer, if it is one.
    pub fn as_integer(&self) -> Option<BigInt> {
        self.as_rational()
            .filter(|r| r.is_integer())
            .map(|r| r.to_integer())
    }

    pub fn is_negative_real(&self) -> bool {
        match self {
            Number::Exact(c) => c.im.is_zero() && c.re.is_negative(),
            Number::Float(c) => c.im == 0.0 && c.re < 0.0,
        }
    }

    pub fn to_complex64(&self) -> Complex64 {
        match self {
            Number::Exact(c) => Complex64::new(rat_to_f64(&c.re), rat_to_f64(&c.im)),
            Number::Float(c) => *c,
        }
    }

    pub fn re_f64(&self) -> f64 {
        self.to_complex64().re
    }

    pub fn im_f64(&self) -> f64 {
        self.to_complex64().im
    }

    pub fn abs(&self) -> Number {
        match self {
            Number::Exact(c) if c.im.is_zero() => Number::rational(c.re.abs()),
            other => Number::float(other.to_complex64().norm()),
        }
    }

    pub fn checked_div(&self, rhs: &Number) -> Result<Number, DomainError> {
        if rhs.is_zero() {
            return Err(DomainErrorKind::DivisionByZero.into());
        }
        Ok(match (self, rhs) {
            (Number::Exact(a), Number::Exact(b)) => Number::Exact(a / b),
            (a, b) => Number::Float(a.to_complex64() / b.to_complex64()),
        })
    }

    pub fn recip(&self) -> Result<Number, DomainError> {
        Number::one().checked_div(self)
    }

    /// Principal square root; negative reals give a pure imaginary result.
    pub fn sqrt(&self) -> Result<Number, DomainError> {
        if let Some(root) = self.as_rational().and_then(|r| exact_root(r, 2)) {
            return Ok(root);
        }
        if self.is_real() {
            let x = self.re_f64();
            return Ok(if x >= 0.0 {
                Number::float(x.sqrt())
            } else {
                Number::Float(Complex64::new(0.0, (-x).sqrt()))
            });
        }
        Ok(Number::Float(self.to_complex64().sqrt()))
    }

    /// `self ^ exponent` on the principal branch.
    ///
    /// Exact bases with integer exponents up to `max_exact_exponent` are
    /// computed exactly, as are rational exponents whose root is exact, as
    /// long as the result stays within `max_exact_bits`. Everything else is
    /// computed in floats and fails with `Overflow` when that is not finite.
    pub fn pow(&self, exponent: &Number, limits: &Limits) -> Result<Number, DomainError> {
        if exponent.is_zero() {
            return Ok(Number::one());
        }
        if self.is_zero() {
            return if exponent.is_real() && exponent.re_f64() > 0.0 {
                Ok(Number::zero())
            } else if exponent.is_negative_real() {
                Err(DomainErrorKind::DivisionByZero.into())
            } else {
                Err(DomainErrorKind::ZeroToNegativePower.into())
            };
        }

        if *exponent == Number::ratio(1, 2) {
            return self.sqrt();
        }

        if let (Number::Exact(base), Some(n)) = (self, exponent.as_integer()) {
            let exact = n
                .abs()
                .to_u32()
                .filter(|k| *k <= limits.max_exact_exponent)
                .filter(|k| {
                    self.exact_bits().saturating_mul(u64::from(*k)) <= limits.max_exact_bits
                });
            if let Some(k) = exact {
                let raised = Number::Exact(num_traits::pow(base.clone(), k as usize));
                return if n.is_negative() {
                    raised.recip()
                } else {
                    Ok(raised)
                };
            }
        }

        if let (Some(base), Some(e)) = (self.as_rational(), exponent.as_rational()) {
            let root = e
                .denom()
                .to_u32()
                .filter(|q| !e.is_integer() && *q <= limits.max_exact_exponent)
                .and_then(|q| exact_root(base, q));
            if let Some(root) = root {
                return root.pow(&Number::big_integer(e.numer().clone()), limits);
            }
        }

        let base = self.to_complex64();
        let result = match exponent {
            e if e.is_real() && base.im == 0.0 && base.re > 0.0 => {
                Complex64::new(base.re.powf(e.re_f64()), 0.0)
            }
            e => match e.as_integer().and_then(|n| n.to_i32()) {
                Some(n) => base.powi(n),
                None => base.powc(e.to_complex64()),
            },
        };
        if !result.re.is_finite() || !result.im.is_finite() {
            return Err(DomainErrorKind::Overflow.into());
        }
        Ok(Number::Float(result))
    }

    /// Total order used when sorting terms and factors into canonical form.
    pub fn canonical_cmp(&self, other: &Number) -> Ordering {
        match (self, other) {
            (Number::Exact(a), Number::Exact(b)) => a.re.cmp(&b.re).then_with(|| a.im.cmp(&b.im)),
            (Number::Exact(_), Number::Float(_)) => Ordering::Less,
            (Number::Float(_), Number::Exact(_)) => Ordering::Greater,
            (Number::Float(a), Number::Float(b)) => {
                a.re.total_cmp(&b.re).then_with(|| a.im.total_cmp(&b.im))
            }
        }
    }

    /// Order roots are reported in: larger real part first, then larger
    /// imaginary part first.
    pub fn root_cmp(&self, other: &Number) -> Ordering {
        match (self, other) {
            (Number::Exact(a), Number::Exact(b)) => b.re.cmp(&a.re).then_with(|| b.im.cmp(&a.im)),
            (a, b) => {
                let (a, b) = (a.to_complex64(), b.to_complex64());
                b.re.total_cmp(&a.re).then_with(|| b.im.total_cmp(&a.im))
            }
        }
    }

    /// Whether two values agree within `tolerance`, for comparing float roots.
    pub fn approx_eq(&self, other: &Number, tolerance: f64) -> bool {
        match (self, other) {
            (Number::Exact(a), Number::Exact(b)) => a == b,
            (a, b) => (a.to_complex64() - b.to_complex64()).norm() <= tolerance,
        }
    }
}

/// The exact `q`-th root of `base`, when numerator and denominator are both
/// perfect powers. Negative bases only resolve for square roots.
fn exact_root(base: &BigRational, q: u32) -> Option<Number> {
    let magnitude = base.abs();
    let numer = perfect_root(magnitude.numer(), q)?;
    let denom = perfect_root(magnitude.denom(), q)?;
    let root = BigRational::new(numer, denom);
    if base.is_negative() {
        (q == 2).then(|| Number::Exact(Complex::new(BigRational::zero(), root)))
    } else {
        Some(Number::rational(root))
    }
}

fn perfect_root(n: &BigInt, q: u32) -> Option<BigInt> {
    let root = n.nth_root(q);
    (num_traits::pow(root.clone(), q as usize) == *n).then_some(root)
}

impl Add for &Number {
    type Output = Number;

    fn add(self, rhs: &Number) -> Number {
        match (self, rhs) {
            (Number::Exact(a), Number::Exact(b)) => Number::Exact(a + b),
            (a, b) => Number::Float(a.to_complex64() + b.to_complex64()),
        }
    }
}

impl Sub for &Number {
    type Output = Number;

    fn sub(self, rhs: &Number) -> Number {
        match (self, rhs) {
            (Number::Exact(a), Number::Exact(b)) => Number::Exact(a - b),
            (a, b) => Number::Float(a.to_complex64() - b.to_complex64()),
        }
    }
}

impl Mul for &Number {
    type Output = Number;

    fn mul(self, rhs: &Number) -> Number {
        match (self, rhs) {
            (Number::Exact(a), Number::Exact(b)) => Number::Exact(a * b),
            (a, b) => Number::Float(a.to_complex64() * b.to_complex64()),
        }
    }
}

impl Neg for &Number {
    type Output = Number;

    fn neg(self) -> Number {
        match self {
            Number::Exact(c) => Number::Exact(-c.clone()),
            Number::Float(c) => Number::Float(-*c),
        }
    }
}

fn fmt_rational(r: &BigRational) -> String {
    if r.is_integer() {
        r.numer().to_string()
    } else {
        format!("{}/{}", r.numer(), r.denom())
    }
}

fn fmt_float(x: f64) -> String {
    if x == 0.0 {
        "0".to_string()
    } else if x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{x:.0}")
    } else {
        format!("{x}")
    }
}

/// Joins a real and an imaginary part into `a+bi` form.
fn fmt_complex(re: Option<String>, im: Option<(bool, String)>) -> String {
    let imaginary = |negative: bool, magnitude: String| {
        let sign = if negative { "-" } else { "" };
        match magnitude.as_str() {
            "1" => format!("{sign}i"),
            m if m.contains('/') => format!("{sign}({m})i"),
            m => format!("{sign}{m}i"),
        }
    };
    match (re, im) {
        (None, None) => "0".to_string(),
        (Some(re), None) => re,
        (None, Some((negative, magnitude))) => imaginary(negative, magnitude),
        (Some(re), Some((negative, magnitude))) => {
            let sign = if negative { "-" } else { "+" };
            let imag = imaginary(false, magnitude);
            format!("{re}{sign}{imag}")
        }
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Number::Exact(c) => fmt_complex(
                (!c.re.is_zero() || c.im.is_zero()).then(|| fmt_rational(&c.re)),
                (!c.im.is_zero()).then(|| (c.im.is_negative(), fmt_rational(&c.im.abs()))),
            ),
            Number::Float(c) => fmt_complex(
                (c.re != 0.0 || c.im == 0.0).then(|| fmt_float(c.re)),
                (c.im != 0.0).then(|| (c.im < 0.0, fmt_float(c.im.abs()))),
            ),
        };
        write!(f, "{text}")
    }
}
