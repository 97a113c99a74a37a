//! Byte-level similarity ratios.
//!
//! All three ratios are `2 * M / T`, where `T` is the combined length of
//! both inputs and `M` a count of matching bytes; two empty inputs are
//! identical. Each ratio bounds the next from above, so a cheap ratio at or
//! below a threshold rules out the expensive one.

use similar::{capture_diff_slices, Algorithm, DiffOp};

fn ratio_of(matches: usize, a: &[u8], b: &[u8]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        1.0
    } else {
        2.0 * matches as f64 / total as f64
    }
}

/// Upper bound from lengths alone.
pub fn real_quick_ratio(a: &[u8], b: &[u8]) -> f64 {
    ratio_of(a.len().min(b.len()), a, b)
}

/// Upper bound from byte multisets, ignoring order.
pub fn quick_ratio(a: &[u8], b: &[u8]) -> f64 {
    let mut counts = [0usize; 256];
    for &byte in a {
        counts[usize::from(byte)] += 1;
    }
    let mut matches = 0;
    for &byte in b {
        let slot = &mut counts[usize::from(byte)];
        if *slot > 0 {
            *slot -= 1;
            matches += 1;
        }
    }
    ratio_of(matches, a, b)
}

/// Ratio of bytes kept by a Myers alignment of the two inputs.
pub fn ratio(a: &[u8], b: &[u8]) -> f64 {
    let matches = capture_diff_slices(Algorithm::Myers, a, b)
        .iter()
        .map(|op| match op {
            DiffOp::Equal { len, .. } => *len,
            _ => 0,
        })
        .sum();
    ratio_of(matches, a, b)
}

/// Whether `a` and `b` are more than `threshold` similar, checking the
/// cheap ratios first.
pub fn is_similar(a: &[u8], b: &[u8], threshold: f64) -> bool {
    real_quick_ratio(a, b) > threshold && quick_ratio(a, b) > threshold && ratio(a, b) > threshold
}
