use serde::{Deserialize, Serialize};

use crate::aggregate::aggregate;
use crate::careplan::resolve_care_plan;
use crate::horizon::{score_horizon, Horizon};
use crate::input::RiskInput;
use crate::normalize::normalize;
use crate::tier::{classify, RiskCategory, Tier};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HorizonResult {
    pub probability_percent: f64,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskReport {
    pub p30: f64,
    pub p60: f64,
    pub p90: f64,
    pub tier30: Tier,
    pub tier60: Tier,
    pub tier90: Tier,
    pub final_score: f64,
    pub final_tier: Tier,
    pub risk_category: RiskCategory,
    pub care_plan: String,
}

impl RiskReport {
    pub const fn horizon(&self, horizon: Horizon) -> HorizonResult {
        let (probability_percent, tier) = match horizon {
            Horizon::Days30 => (self.p30, self.tier30),
            Horizon::Days60 => (self.p60, self.tier60),
            Horizon::Days90 => (self.p90, self.tier90),
        };
        HorizonResult {
            probability_percent,
            tier,
        }
    }

    pub fn horizons(&self) -> [(Horizon, HorizonResult); 3] {
        Horizon::ALL.map(|h| (h, self.horizon(h)))
    }
}

/// Runs the full pipeline. Total and deterministic: every input, in range or
/// not, yields a report, and the same input always yields the same report.
pub fn compute(input: RiskInput) -> RiskReport {
    let features = normalize(&input);
    // tiers are taken from the reported (rounded) value so the two never disagree
    let [r30, r60, r90] = Horizon::ALL.map(|horizon| {
        let probability_percent = round_to(score_horizon(&features, horizon), 1);
        HorizonResult {
            probability_percent,
            tier: classify(probability_percent),
        }
    });
    let summary = aggregate(&[r30, r60, r90]);

    RiskReport {
        p30: r30.probability_percent,
        p60: r60.probability_percent,
        p90: r90.probability_percent,
        tier30: r30.tier,
        tier60: r60.tier,
        tier90: r90.tier,
        final_score: summary.final_score,
        final_tier: summary.final_tier,
        risk_category: summary.risk_category,
        care_plan: resolve_care_plan(summary.final_tier).to_string(),
    }
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}
