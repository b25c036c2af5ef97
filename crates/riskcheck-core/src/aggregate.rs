use crate::horizon::Horizon;
use crate::report::{round_to, HorizonResult};
use crate::tier::{classify, RiskCategory, Tier};

pub const SCORE_MAX: f64 = 5.0;
const PERCENT_PER_POINT: f64 = 100.0 / SCORE_MAX;

/// Near-term horizons weigh more. Weights sum to 1.
pub const fn horizon_weight(horizon: Horizon) -> f64 {
    match horizon {
        Horizon::Days30 => 0.5,
        Horizon::Days60 => 0.3,
        Horizon::Days90 => 0.2,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate {
    pub final_score: f64,
    pub final_tier: Tier,
    pub risk_category: RiskCategory,
}

/// Re-tiers a `[0, 5]` score through the probability bands.
pub fn tier_for_score(score: f64) -> Tier {
    classify(score * PERCENT_PER_POINT)
}

/// Combines the 30/60/90-day results, in `Horizon::ALL` order.
pub fn aggregate(results: &[HorizonResult; 3]) -> Aggregate {
    let weighted = Horizon::ALL
        .iter()
        .zip(results)
        .map(|(horizon, result)| horizon_weight(*horizon) * result.probability_percent)
        .sum::<f64>();
    let final_score = round_to(weighted / PERCENT_PER_POINT, 2).clamp(0.0, SCORE_MAX);
    let final_tier = tier_for_score(final_score);

    Aggregate {
        final_score,
        final_tier,
        risk_category: final_tier.category(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(percent: f64) -> HorizonResult {
        HorizonResult {
            probability_percent: percent,
            tier: classify(percent),
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let total: f64 = Horizon::ALL.into_iter().map(horizon_weight).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn score_stays_within_display_range() {
        let low = aggregate(&[result(0.0), result(0.0), result(0.0)]);
        let high = aggregate(&[result(100.0), result(100.0), result(100.0)]);
        assert_eq!(low.final_score, 0.0);
        assert_eq!(high.final_score, SCORE_MAX);
        assert_eq!(low.final_tier, Tier::Tier1);
        assert_eq!(high.final_tier, Tier::Tier5);
    }

    #[test]
    fn final_tier_comes_from_score_not_worst_horizon() {
        let out = aggregate(&[result(29.7), result(50.6), result(65.3)]);
        // 0.5 * 29.7 + 0.3 * 50.6 + 0.2 * 65.3 = 43.09 percent
        assert_eq!(out.final_score, 2.15);
        assert_eq!(out.final_tier, Tier::Tier3);
        assert_eq!(out.risk_category, RiskCategory::Moderate);
    }

    #[test]
    fn score_bands_mirror_probability_bands() {
        assert_eq!(tier_for_score(0.49), Tier::Tier1);
        assert_eq!(tier_for_score(0.5), Tier::Tier2);
        assert_eq!(tier_for_score(1.25), Tier::Tier3);
        assert_eq!(tier_for_score(2.25), Tier::Tier4);
        assert_eq!(tier_for_score(3.25), Tier::Tier5);
        assert_eq!(tier_for_score(SCORE_MAX), Tier::Tier5);
    }

    #[test]
    fn raising_any_horizon_never_lowers_final_tier() {
        let base = [20.0, 35.0, 50.0];
        for slot in 0..3 {
            let mut previous = Tier::Tier1;
            for step in 0..=100 {
                let mut probabilities = base;
                if let Some(p) = probabilities.get_mut(slot) {
                    *p = f64::from(step);
                }
                let tier = aggregate(&probabilities.map(result)).final_tier;
                assert!(tier >= previous, "slot {slot} step {step}");
                previous = tier;
            }
        }
    }
}
