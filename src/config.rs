/// Work bounds for a single solve request.
///
/// The pipeline has no timeouts of its own; these limits keep the cost of any
/// one request bounded instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Longest accepted equation, in characters, after trimming.
    pub max_input_len: usize,
    /// Polynomials above this degree are not attempted.
    pub max_degree: usize,
    /// Upper bound on rational root candidates tested per reduction step.
    pub max_root_candidates: usize,
    /// Upper bound on trial divisions when enumerating divisors of a coefficient.
    pub max_divisor_search: u64,
    /// Largest positive integer power of a sum that gets expanded.
    pub max_expand_exponent: u32,
    /// Largest integer exponent evaluated exactly; beyond it powers go to floats.
    pub max_exact_exponent: u32,
    /// Largest exact constant, in bits of numerator plus denominator. Powers
    /// that would exceed it are computed in floats, and sums or products that
    /// exceed it are an overflow.
    pub max_exact_bits: u64,
}

pub const MAX_INPUT_LEN: usize = 500;

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_input_len: MAX_INPUT_LEN,
            max_degree: 64,
            max_root_candidates: 20_000,
            max_divisor_search: 1_000_000,
            max_expand_exponent: 16,
            max_exact_exponent: 4096,
            max_exact_bits: 1 << 16,
        }
    }
}
