//! Matching scorer: three pure functions, no I/O.

const EPS: f64 = 1e-10;
const RECENCY_HALFLIFE_DAYS: f64 = 7.0;
const RECENCY_HARD_CUTOFF_DAYS: f64 = 14.0;
const POLARITY_SCALE: f64 = 10.0;

pub const TAU_PRE: f64 = 0.85;
pub const TAU_CACHE: f64 = 0.90;
pub const PULSE_SIMILARITY_MIN: f64 = 0.85;

fn clip01(x: f64) -> f64 {
    x.max(0.0).min(1.0)
}

/// `r(age_days) = 0 if age_days > 14 else 0.5^(age_days / 7)`.
pub fn compute_recency_score(age_days: f64) -> f64 {
    if age_days > RECENCY_HARD_CUTOFF_DAYS {
        return 0.0;
    }
    (-std::f64::consts::LN_2 * age_days / RECENCY_HALFLIFE_DAYS).exp()
}

/// `desired, influencer ∈ [-10, 10]`. Allies rule collapses to 0 when desired
/// is positive and the influencer is negative; otherwise a continuous
/// alignment in `[0, 1]`.
pub fn compute_polarity_alignment(desired: i32, influencer: i32) -> f64 {
    if desired > 0 && influencer < 0 {
        return 0.0;
    }
    let raw = (1.0 + (desired as f64 * influencer as f64) / (POLARITY_SCALE * POLARITY_SCALE)) / 2.0;
    clip01(raw)
}

/// Product-of-experts over named factors with per-factor weights.
/// `exp( Σ wᵢ · ln(max(ε, xᵢ)) / Σ wᵢ )`, clipped to `[0, 1]`.
fn product_of_experts(factors: &[(&str, f64)], weights: &[(&str, f64)]) -> f64 {
    let mut total_weight = 0.0;
    let mut weighted_log_sum = 0.0;
    for &(name, w) in weights {
        if w <= 0.0 {
            continue;
        }
        let x = factors
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
            .unwrap_or(0.0);
        total_weight += w;
        weighted_log_sum += w * x.max(EPS).ln();
    }
    if total_weight <= 0.0 {
        return 0.0;
    }
    (weighted_log_sum / total_weight).exp()
}

/// Fused match score (MMS): product-of-experts over `{similarity, recency,
/// polarity}`, all weights default 1. A single near-zero factor collapses
/// the score — intentional, not a bug: the gate must refuse a candidate that
/// is stale, off-polarity, *or* dissimilar.
pub fn compute_mms(similarity: f64, recency_score: f64, polarity_alignment: f64) -> f64 {
    let factors = [
        ("similarity", clip01(similarity)),
        ("recency", clip01(recency_score)),
        ("polarity", clip01(polarity_alignment)),
    ];
    let weights = [("similarity", 1.0), ("recency", 1.0), ("polarity", 1.0)];
    clip01(product_of_experts(&factors, &weights))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recency_boundary_behaviors() {
        assert!((compute_recency_score(0.0) - 1.0).abs() < 1e-9);
        assert!((compute_recency_score(7.0) - 0.5).abs() < 1e-9);
        assert!(compute_recency_score(14.0) > 0.0);
        assert_eq!(compute_recency_score(14.01), 0.0);
    }

    #[test]
    fn polarity_boundary_behaviors() {
        assert_eq!(compute_polarity_alignment(1, -1), 0.0);
        assert!((compute_polarity_alignment(10, 10) - 1.0).abs() < 1e-9);
        assert!((compute_polarity_alignment(-10, -10) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn mms_collapses_when_any_factor_is_near_zero() {
        assert!(compute_mms(0.99, 0.99, 0.0) < 0.01);
        assert!(compute_mms(0.0, 0.99, 0.99) < 0.01);
        assert!(compute_mms(0.99, 0.0, 0.99) < 0.01);
    }

    #[test]
    fn mms_stays_within_unit_interval() {
        for s in [0.0, 0.3, 0.85, 1.0] {
            for r in [0.0, 0.5, 1.0] {
                for p in [0.0, 0.5, 1.0] {
                    let mms = compute_mms(s, r, p);
                    assert!((0.0..=1.0).contains(&mms));
                }
            }
        }
    }

    #[test]
    fn mms_is_monotonic_in_similarity() {
        let low = compute_mms(0.2, 0.8, 0.8);
        let high = compute_mms(0.6, 0.8, 0.8);
        assert!(high >= low);
    }

    #[test]
    fn mms_is_monotonic_in_recency() {
        let low = compute_mms(0.8, 0.2, 0.8);
        let high = compute_mms(0.8, 0.6, 0.8);
        assert!(high >= low);
    }

    #[test]
    fn mms_is_monotonic_in_polarity() {
        let low = compute_mms(0.8, 0.8, 0.2);
        let high = compute_mms(0.8, 0.8, 0.6);
        assert!(high >= low);
    }
}
