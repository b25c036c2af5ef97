//! Per-horizon probability model.
//!
//! A fixed positive-weight combination of the normalized features gives a base
//! score `z` in `[0, 1]`. The 30-day probability is `logistic(-3.9 + 5.4 z)`;
//! longer horizons compound that window as independent exposures,
//! `p_h = 1 - (1 - p30)^(h / 30)`. The result is non-decreasing in both `z`
//! and horizon length, and is bounded away from 0 and 100.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::input::Feature;
use crate::normalize::FeatureVector;

const INTERCEPT: f64 = -3.9;
const SLOPE: f64 = 5.4;

pub const PROBABILITY_FLOOR: f64 = 0.5;
pub const PROBABILITY_CEILING: f64 = 99.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "30d")]
    Days30,
    #[serde(rename = "60d")]
    Days60,
    #[serde(rename = "90d")]
    Days90,
}

impl Horizon {
    pub const ALL: [Self; 3] = [Self::Days30, Self::Days60, Self::Days90];

    pub const fn days(self) -> u32 {
        match self {
            Self::Days30 => 30,
            Self::Days60 => 60,
            Self::Days90 => 90,
        }
    }

    /// Number of 30-day windows the horizon spans.
    const fn windows(self) -> i32 {
        match self {
            Self::Days30 => 1,
            Self::Days60 => 2,
            Self::Days90 => 3,
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-day", self.days())
    }
}

/// Contribution of each feature to the base score. Weights sum to 1.
pub const fn feature_weight(feature: Feature) -> f64 {
    match feature {
        Feature::Glucose => 0.30,
        Feature::Bmi => 0.18,
        Feature::Age => 0.15,
        Feature::PedigreeFunction => 0.14,
        Feature::Insulin => 0.07,
        Feature::Pregnancies => 0.06,
        Feature::BloodPressure => 0.06,
        Feature::SkinThickness => 0.04,
    }
}

pub fn base_score(features: &FeatureVector) -> f64 {
    features
        .iter()
        .map(|(feature, value)| feature_weight(feature) * value)
        .sum::<f64>()
        .clamp(0.0, 1.0)
}

/// Probability, in percent, that the outcome occurs within `horizon`.
pub fn score_horizon(features: &FeatureVector, horizon: Horizon) -> f64 {
    horizon_probability(base_score(features), horizon)
}

pub fn horizon_probability(base: f64, horizon: Horizon) -> f64 {
    let window = logistic(INTERCEPT + SLOPE * base);
    let cumulative = 1.0 - (1.0 - window).powi(horizon.windows());
    (cumulative * 100.0).clamp(PROBABILITY_FLOOR, PROBABILITY_CEILING)
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
