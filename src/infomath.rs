//! Entropy building blocks for the map equation.
//!
//! Everything here is defined on `[0, +inf)`; a negative argument indicates a
//! caller bug and is rejected by `debug_assert!` only, so release builds get
//! whatever `log` of a negative number gives them. `log2` goes through the
//! natural logarithm times `1/ln 2` so results are bit-identical across
//! platforms with differing `f64::log2` implementations.

/// `1 / ln 2`, the factor converting natural logarithms to base 2.
pub const LOG2_E: f64 = core::f64::consts::LOG2_E;

/// Base-2 logarithm via the natural logarithm.
#[inline]
pub fn log2(p: f64) -> f64 {
    p.ln() * LOG2_E
}

/// `p * log2(p)` for `p > 0`, else `0`.
///
/// The building block of Shannon entropy. Note the sign: for `p` in `(0, 1)`
/// the result is negative, so entropies are sums of *negated* `plogp` terms.
#[inline]
pub fn plogp(p: f64) -> f64 {
    // Tolerate cancellation noise from incremental sum maintenance; anything
    // materially negative is a caller bug.
    debug_assert!(p > -1e-12, "plogp of negative probability {p}");
    if p > 0.0 { p * log2(p) } else { 0.0 }
}

/// Component-wise [`plogp`] on a two-flavor flow pair.
///
/// Teleportation-aware flows keep unrecorded and recorded flow separate; the
/// entropy terms stay separate as well.
#[inline]
pub fn plogp_pair(p: (f64, f64)) -> (f64, f64) {
    (plogp(p.0), plogp(p.1))
}

/// Total of a two-flavor flow pair.
#[inline]
pub fn pair_total(p: (f64, f64)) -> f64 {
    p.0 + p.1
}

/// `p * log2(q)` for `q > 0`, else `0`.
#[inline]
pub fn plogq(p: f64, q: f64) -> f64 {
    debug_assert!(q > -1e-12, "plogq of negative probability {q}");
    if q > 0.0 { p * log2(q) } else { 0.0 }
}

/// Integer-normalized `plogp`: `(1/n) * (plogp(p) - p * log2(n))` for
/// `p > 0`, else `0`.
///
/// Equivalent to `plogp(p / n)`, but keeps the inputs in the exact integer
/// domain until the final evaluation. `n` is the total degree of the network.
#[inline]
pub fn plogp_n(p: u64, n: u64) -> f64 {
    debug_assert!(n > 0, "plogp_n with zero total degree");
    if p > 0 {
        let p = p as f64;
        1.0 / n as f64 * (plogp(p) - plogq(p, n as f64))
    } else {
        0.0
    }
}

/// Absolute-tolerance comparison for codelength values normalized to unit
/// order.
#[inline]
pub fn is_approx_eq(v1: f64, v2: f64, epsilon: f64) -> bool {
    (v2 - v1).abs() < epsilon
}
