//! Wilson lower-bound confidence score
//!
//! A Bayesian-smoothed lower bound on the true like ratio, used to temper
//! small sample sizes: one like out of one vote scores far below 1.0. The
//! smoothing adds one positive and one negative pseudo-vote, so an empty
//! sample yields a stable non-zero prior instead of dividing by zero.

/// Normal distribution quantile used for the confidence bound
pub const WILSON_Z: f64 = 2.0;

/// Wilson score for `pos` positive votes out of `total`
///
/// Rounded to 4 decimal places. Monotonically non-decreasing in `pos` for a
/// fixed `total`.
pub fn wilson_score(pos: f64, total: f64) -> f64 {
    let z = WILSON_Z;
    let t = total + 2.0;
    let pos_rate = (pos + 1.0) / t;

    let score = (pos_rate + z * z / (2.0 * t)
        - (z / (2.0 * t)) * (4.0 * t * (1.0 - pos_rate) * pos_rate + z * z).sqrt())
        / (1.0 + z * z / t);

    round4(score)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sample_yields_stable_prior() {
        // no votes: deterministic non-zero prior, no division by zero
        let score = wilson_score(0.0, 0.0);
        assert_eq!(score, 0.0918);
        assert_eq!(wilson_score(0.0, 0.0), score);
    }

    #[test]
    fn test_single_like() {
        assert_eq!(wilson_score(1.0, 1.0), 0.2026);
    }

    #[test]
    fn test_monotonic_in_pos_for_fixed_total() {
        for total in [1.0, 5.0, 10.0, 100.0] {
            let mut previous = f64::MIN;
            let mut pos = 0.0;
            while pos <= total {
                let score = wilson_score(pos, total);
                assert!(
                    score >= previous,
                    "score regressed at pos={} total={}",
                    pos,
                    total
                );
                previous = score;
                pos += 1.0;
            }
        }
    }

    #[test]
    fn test_bounded_between_zero_and_one() {
        for (pos, total) in [(0.0, 0.0), (0.0, 1000.0), (1000.0, 1000.0), (3.0, 7.0)] {
            let score = wilson_score(pos, total);
            assert!((0.0..=1.0).contains(&score), "out of range: {}", score);
        }
    }

    #[test]
    fn test_large_sample_approaches_raw_ratio() {
        // with many votes the confidence penalty shrinks
        let score = wilson_score(9000.0, 10000.0);
        assert!(score > 0.88 && score < 0.9);
    }
}
