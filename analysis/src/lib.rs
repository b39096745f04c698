pub mod behavior;
pub mod explain;
pub mod flags;
pub mod network;
pub mod score;
pub mod stats;

/// Guard against division by near-zero denominators in ratio comparisons.
pub const EPSILON: f64 = 1e-9;

pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// `1 - |a-b| / max(a, b, eps)`, clamped to [0, 1].
///
/// Two zero-valued metrics compare as identical, which is why callers must
/// gate on sample size before trusting the result.
pub fn ratio_similarity(a: f64, b: f64) -> f64 {
    let denom = a.max(b).max(EPSILON);
    clamp01(1.0 - (a - b).abs() / denom)
}

/// Cosine similarity over two aligned non-negative vectors.
///
/// Returns 0 when either vector has no magnitude, so disjoint performance
/// surfaces compare as dissimilar rather than undefined.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a <= EPSILON || norm_b <= EPSILON {
        return 0.0;
    }

    clamp01(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Jaccard similarity from pre-computed set sizes.
pub fn jaccard_from_counts(left: u64, right: u64, shared: u64) -> f64 {
    let union = (left + right).saturating_sub(shared);
    if union == 0 {
        return 0.0;
    }
    shared as f64 / union as f64
}

/// Jensen-Shannon divergence between two probability distributions, using
/// log base 2 so the result is bounded by [0, 1].
pub fn jensen_shannon(p: &[f64], q: &[f64]) -> f64 {
    debug_assert_eq!(p.len(), q.len());

    fn kl(d: &[f64], m: &[f64]) -> f64 {
        d.iter()
            .zip(m.iter())
            .filter(|(x, y)| **x > 0.0 && **y > 0.0)
            .map(|(x, y)| x * (x / y).log2())
            .sum()
    }

    let mid: Vec<f64> = p.iter().zip(q.iter()).map(|(x, y)| (x + y) / 2.0).collect();

    clamp01(0.5 * kl(p, &mid) + 0.5 * kl(q, &mid))
}

/// Normalize a count histogram into a probability distribution.
/// Returns None when the histogram is empty.
pub fn to_distribution(counts: &[u64]) -> Option<Vec<f64>> {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return None;
    }
    Some(counts.iter().map(|c| *c as f64 / total as f64).collect())
}
