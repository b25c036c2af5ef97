use std::fmt;

use serde::{Deserialize, Serialize};

use crate::careplan::resolve_care_plan;
use crate::error::InvalidTier;

/// Ordered severity bucket. Serialized as its level, 1 through 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Tier {
    Tier1,
    Tier2,
    Tier3,
    Tier4,
    Tier5,
}

/// Half-open probability range `[lower, upper)`; the top band also includes `upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbabilityBand {
    pub lower: f64,
    pub upper: f64,
    pub upper_inclusive: bool,
}

impl ProbabilityBand {
    pub fn contains(&self, percent: f64) -> bool {
        percent >= self.lower
            && (percent < self.upper || (self.upper_inclusive && percent <= self.upper))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskCategory {
    Low,
    Mild,
    Moderate,
    High,
    Critical,
}

impl RiskCategory {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Mild => "Mild",
            Self::Moderate => "Moderate",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Tier {
    pub const ALL: [Self; 5] = [Self::Tier1, Self::Tier2, Self::Tier3, Self::Tier4, Self::Tier5];

    pub const fn level(self) -> u8 {
        match self {
            Self::Tier1 => 1,
            Self::Tier2 => 2,
            Self::Tier3 => 3,
            Self::Tier4 => 4,
            Self::Tier5 => 5,
        }
    }

    pub const fn band(self) -> ProbabilityBand {
        let (lower, upper) = match self {
            Self::Tier1 => (0.0, 10.0),
            Self::Tier2 => (10.0, 25.0),
            Self::Tier3 => (25.0, 45.0),
            Self::Tier4 => (45.0, 65.0),
            Self::Tier5 => (65.0, 100.0),
        };
        ProbabilityBand {
            lower,
            upper,
            upper_inclusive: matches!(self, Self::Tier5),
        }
    }

    pub const fn category(self) -> RiskCategory {
        match self {
            Self::Tier1 => RiskCategory::Low,
            Self::Tier2 => RiskCategory::Mild,
            Self::Tier3 => RiskCategory::Moderate,
            Self::Tier4 => RiskCategory::High,
            Self::Tier5 => RiskCategory::Critical,
        }
    }

    /// Display color name for badges.
    pub const fn color(self) -> &'static str {
        match self {
            Self::Tier1 => "green",
            Self::Tier2 => "blue",
            Self::Tier3 => "yellow",
            Self::Tier4 => "orange",
            Self::Tier5 => "red",
        }
    }

    pub const fn care_plan(self) -> &'static str {
        resolve_care_plan(self)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tier {}", self.level())
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.level()
    }
}

impl TryFrom<u8> for Tier {
    type Error = InvalidTier;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.level() == level)
            .ok_or(InvalidTier(level))
    }
}

/// Maps a probability percentage to its band. Boundary values go to the
/// higher tier. Anything below 0 (or NaN) is Tier1, anything above 100 is Tier5.
pub fn classify(percent: f64) -> Tier {
    Tier::ALL
        .into_iter()
        .rev()
        .find(|tier| percent >= tier.band().lower)
        .unwrap_or(Tier::Tier1)
}
