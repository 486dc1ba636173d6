//! Wavelet transform: a pure Haar lifting transform between a
//! scaling coefficient and 7 detail coefficients for one octree node's
//! 8 children.
//!
//! The basis is the 3-D tensor-product Haar / Walsh-Hadamard basis: for
//! child `i` (3-bit relative index, bit0=x, bit1=y, bit2=z), the 8 basis
//! patterns are the products of `{+1,+1}` (low-pass) and `{+1,-1}`
//! (high-pass) along each axis. Pattern 0 (low-low-low) is the scale;
//! the other 7 are the details, in a fixed order matching the relative
//! child index bit pattern that "turns on." Because this Hadamard-style
//! matrix is self-inverse up to a constant (`H·H = 8·I`), `forward` and
//! `backward` are exact inverses of one another in real arithmetic, and
//! within 1 ulp per coefficient in `f32`.

use crate::geometry::NUM_CHILDREN;

/// The 8 Walsh-Hadamard basis patterns over a 3-bit index, generated at
/// compile time. `PATTERNS[0]` is the all-ones (scale) pattern;
/// `PATTERNS[1..8]` are the 7 detail patterns, one per non-zero relative
/// child index used as a bitmask selecting which axes are "high-pass."
const PATTERNS: [[f32; NUM_CHILDREN]; NUM_CHILDREN] = {
    let mut patterns = [[0.0_f32; NUM_CHILDREN]; NUM_CHILDREN];
    let mut k = 0;
    while k < NUM_CHILDREN {
        let mut i = 0;
        while i < NUM_CHILDREN {
            // Bit `a` of `k` selects whether axis `a` contributes its
            // high-pass (-1 on the "1" half) or low-pass (+1 everywhere)
            // factor; the pattern value is the product of those factors.
            let mut sign: i32 = 1;
            let mut axis = 0;
            while axis < 3 {
                if (k >> axis) & 1 == 1 && (i >> axis) & 1 == 1 {
                    sign = -sign;
                }
                axis += 1;
            }
            patterns[k][i] = sign as f32;
            i += 1;
        }
        k += 1;
    }
    patterns
};

/// Forward transform: 8 child scale coefficients → (parent scale, 7
/// detail coefficients), in fixed child order.
pub fn forward(children: [f32; NUM_CHILDREN]) -> (f32, [f32; 7]) {
    let raw = hadamard_raw(children);
    let mut details = [0.0_f32; 7];
    for (d, &r) in details.iter_mut().zip(raw[1..8].iter()) {
        *d = r * 0.125;
    }
    (raw[0] * 0.125, details)
}

/// Backward transform: (parent scale, 7 detail coefficients) → 8 child
/// scale coefficients. Exact inverse of [`forward`].
///
/// `PATTERNS` squares to `8*I` (each row has norm^2 8 and rows are
/// mutually orthogonal), and `forward` applies `PATTERNS / 8`, so its
/// inverse is `PATTERNS` with no normalization — not `PATTERNS / 8`
/// again. Reusing the normalized helper here would reconstruct every
/// child scaled down by a further factor of 8.
pub fn backward(scale: f32, details: [f32; 7]) -> [f32; NUM_CHILDREN] {
    let mut coeffs = [0.0_f32; NUM_CHILDREN];
    coeffs[0] = scale;
    coeffs[1..8].copy_from_slice(&details);
    hadamard_raw(coeffs)
}

/// `out[k] = sum_i in[i] * PATTERNS[k][i]`, unnormalized.
fn hadamard_raw(input: [f32; NUM_CHILDREN]) -> [f32; NUM_CHILDREN] {
    let mut out = [0.0_f32; NUM_CHILDREN];
    for (k, out_k) in out.iter_mut().enumerate() {
        let mut acc = 0.0_f32;
        for (i, &v) in input.iter().enumerate() {
            acc += v * PATTERNS[k][i];
        }
        *out_k = acc;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    #[test]
    fn forward_of_backward_is_identity() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10_000 {
            let scale = rng.random_range(-2.0_f32..2.0);
            let details: [f32; 7] = std::array::from_fn(|_| rng.random_range(-2.0_f32..2.0));
            let children = backward(scale, details);
            let (scale2, details2) = forward(children);
            assert_ulps_eq(scale, scale2);
            for i in 0..7 {
                assert_ulps_eq(details[i], details2[i]);
            }
        }
    }

    #[test]
    fn backward_of_forward_is_identity() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let children: [f32; 8] = std::array::from_fn(|_| rng.random_range(-2.0_f32..2.0));
            let (scale, details) = forward(children);
            let children2 = backward(scale, details);
            for i in 0..8 {
                assert_ulps_eq(children[i], children2[i]);
            }
        }
    }

    #[test]
    fn constant_field_has_no_detail() {
        let (scale, details) = forward([1.5; 8]);
        assert_ulps_eq(scale, 1.5);
        for d in details {
            assert_ulps_eq(d, 0.0);
        }
    }

    fn assert_ulps_eq(a: f32, b: f32) {
        let diff = (a - b).abs();
        let ulp = f32::EPSILON * a.abs().max(b.abs()).max(1.0) * 4.0;
        assert!(diff <= ulp, "{a} != {b} (diff {diff}, tol {ulp})");
    }
}
