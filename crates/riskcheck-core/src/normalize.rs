use crate::input::{Feature, RiskInput};

/// Features rescaled into `[0, 1]`, one named slot per indicator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(RiskInput);

impl FeatureVector {
    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.into_iter().map(|feature| (feature, self.get(feature)))
    }

    pub const fn get(&self, feature: Feature) -> f64 {
        self.0.get(feature)
    }
}

/// Clamps each raw indicator into its entry range and rescales it to `[0, 1]`.
pub fn normalize(input: &RiskInput) -> FeatureVector {
    FeatureVector(RiskInput::from_fn(|feature| {
        feature.bounds().scale(input.get(feature))
    }))
}
