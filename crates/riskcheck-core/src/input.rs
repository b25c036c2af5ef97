use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// The eight indicators the engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    Pregnancies,
    Glucose,
    BloodPressure,
    SkinThickness,
    Insulin,
    Bmi,
    PedigreeFunction,
    Age,
}

/// Closed entry range for one feature. Values outside it are clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureBounds {
    pub min: f64,
    pub max: f64,
}

impl FeatureBounds {
    /// Clamps into `[min, max]`. NaN lands on `min` so the result is always finite.
    pub fn clamp(self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }

    /// Linear rescale of the clamped value into `[0, 1]`.
    pub fn scale(self, value: f64) -> f64 {
        (self.clamp(value) - self.min) / (self.max - self.min)
    }
}

impl Feature {
    pub const ALL: [Self; 8] = [
        Self::Pregnancies,
        Self::Glucose,
        Self::BloodPressure,
        Self::SkinThickness,
        Self::Insulin,
        Self::Bmi,
        Self::PedigreeFunction,
        Self::Age,
    ];

    pub const fn bounds(self) -> FeatureBounds {
        let (min, max) = match self {
            Self::Pregnancies => (0.0, 20.0),
            Self::Glucose => (50.0, 300.0),
            Self::BloodPressure => (40.0, 200.0),
            Self::SkinThickness => (0.0, 100.0),
            Self::Insulin => (0.0, 500.0),
            Self::Bmi => (10.0, 60.0),
            Self::PedigreeFunction => (0.0, 3.0),
            Self::Age => (18.0, 100.0),
        };
        FeatureBounds { min, max }
    }

    /// Field name on the wire.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pregnancies => "pregnancies",
            Self::Glucose => "glucose",
            Self::BloodPressure => "bloodPressure",
            Self::SkinThickness => "skinThickness",
            Self::Insulin => "insulin",
            Self::Bmi => "bmi",
            Self::PedigreeFunction => "pedigreeFunction",
            Self::Age => "age",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pregnancies => "Number of Pregnancies",
            Self::Glucose => "Glucose Level",
            Self::BloodPressure => "Blood Pressure",
            Self::SkinThickness => "Skin Thickness",
            Self::Insulin => "Insulin Level",
            Self::Bmi => "BMI (Body Mass Index)",
            Self::PedigreeFunction => "Diabetes Pedigree Function",
            Self::Age => "Age",
        }
    }

    pub const fn unit(self) -> Option<&'static str> {
        match self {
            Self::Glucose => Some("mg/dL"),
            Self::BloodPressure => Some("mmHg"),
            Self::SkinThickness => Some("mm"),
            Self::Insulin => Some("μU/mL"),
            Self::Bmi => Some("kg/m²"),
            Self::Age => Some("years"),
            Self::Pregnancies | Self::PedigreeFunction => None,
        }
    }

    /// Input granularity a form should offer for this field.
    pub const fn step(self) -> f64 {
        match self {
            Self::Bmi => 0.1,
            Self::PedigreeFunction => 0.001,
            _ => 1.0,
        }
    }

    pub fn default_value(self) -> f64 {
        RiskInput::default().get(self)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw indicators as entered by the caller. Nothing here is trusted to be in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskInput {
    pub pregnancies: f64,
    pub glucose: f64,
    pub blood_pressure: f64,
    pub skin_thickness: f64,
    pub insulin: f64,
    pub bmi: f64,
    #[serde(alias = "diabetesPedigreeFunction")]
    pub pedigree_function: f64,
    pub age: f64,
}

impl Default for RiskInput {
    fn default() -> Self {
        Self {
            pregnancies: 0.0,
            glucose: 100.0,
            blood_pressure: 80.0,
            skin_thickness: 20.0,
            insulin: 80.0,
            bmi: 25.0,
            pedigree_function: 0.5,
            age: 30.0,
        }
    }
}

impl RiskInput {
    pub fn from_fn(mut value: impl FnMut(Feature) -> f64) -> Self {
        Self {
            pregnancies: value(Feature::Pregnancies),
            glucose: value(Feature::Glucose),
            blood_pressure: value(Feature::BloodPressure),
            skin_thickness: value(Feature::SkinThickness),
            insulin: value(Feature::Insulin),
            bmi: value(Feature::Bmi),
            pedigree_function: value(Feature::PedigreeFunction),
            age: value(Feature::Age),
        }
    }

    /// Every field at the lower edge of its entry range.
    pub fn minimums() -> Self {
        Self::from_fn(|feature| feature.bounds().min)
    }

    /// Every field at the upper edge of its entry range.
    pub fn maximums() -> Self {
        Self::from_fn(|feature| feature.bounds().max)
    }

    pub const fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Pregnancies => self.pregnancies,
            Feature::Glucose => self.glucose,
            Feature::BloodPressure => self.blood_pressure,
            Feature::SkinThickness => self.skin_thickness,
            Feature::Insulin => self.insulin,
            Feature::Bmi => self.bmi,
            Feature::PedigreeFunction => self.pedigree_function,
            Feature::Age => self.age,
        }
    }

    #[must_use]
    pub fn with(self, feature: Feature, value: f64) -> Self {
        Self::from_fn(|f| if f == feature { value } else { self.get(f) })
    }

    /// Copy with every field clamped into its entry range. The engine produces
    /// the same report for `x` and `x.clamped()`.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self::from_fn(|feature| feature.bounds().clamp(self.get(feature)))
    }

    /// Boundary check for callers that accept untyped input. `compute` never
    /// needs it; it only rejects values no form could have produced.
    pub fn validate(&self) -> Result<(), InputError> {
        match Feature::ALL
            .into_iter()
            .find(|feature| !self.get(*feature).is_finite())
        {
            Some(field) => Err(InputError::NonFinite { field }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_handles_out_of_range_and_non_finite() {
        let bounds = Feature::Glucose.bounds();
        assert_eq!(bounds.clamp(10.0), 50.0);
        assert_eq!(bounds.clamp(1_000.0), 300.0);
        assert_eq!(bounds.clamp(f64::NAN), 50.0);
        assert_eq!(bounds.clamp(f64::INFINITY), 300.0);
        assert_eq!(bounds.clamp(f64::NEG_INFINITY), 50.0);
        assert_eq!(bounds.clamp(120.0), 120.0);
    }

    #[test]
    fn clamped_input_stays_within_bounds() {
        let wild = RiskInput::from_fn(|feature| match feature {
            Feature::Age => 7.0,
            Feature::Bmi => f64::NAN,
            _ => 1.0e9,
        });
        let clamped = wild.clamped();
        for feature in Feature::ALL {
            let bounds = feature.bounds();
            let value = clamped.get(feature);
            assert!(value >= bounds.min && value <= bounds.max, "{feature}");
        }
        assert_eq!(clamped.age, 18.0);
        assert_eq!(clamped.bmi, 10.0);
        assert_eq!(clamped.insulin, 500.0);
    }

    #[test]
    fn validate_names_the_first_non_finite_field() {
        let input = RiskInput::default().with(Feature::Insulin, f64::INFINITY);
        assert_eq!(
            input.validate(),
            Err(InputError::NonFinite {
                field: Feature::Insulin
            })
        );
        assert!(RiskInput::default().validate().is_ok());
        // out of range is not an error, only non-finite is
        assert!(RiskInput::default()
            .with(Feature::Glucose, -40.0)
            .validate()
            .is_ok());
    }

    #[test]
    fn default_matches_form_initial_values() {
        let input = RiskInput::default();
        assert_eq!(input.glucose, 100.0);
        assert_eq!(input.pedigree_function, 0.5);
        assert_eq!(Feature::Age.default_value(), 30.0);
    }

    #[test]
    fn deserializes_camel_case_and_pedigree_alias() {
        let json = r#"{"pregnancies":2,"glucose":120,"bloodPressure":80,"skinThickness":25,
            "insulin":100,"bmi":28,"diabetesPedigreeFunction":0.6,"age":40}"#;
        let input: RiskInput = serde_json::from_str(json).expect("parse input");
        assert_eq!(input.pedigree_function, 0.6);
        assert_eq!(input.blood_pressure, 80.0);
    }

    #[test]
    fn missing_field_fails_deserialization() {
        let json = r#"{"pregnancies":2,"glucose":120}"#;
        assert!(serde_json::from_str::<RiskInput>(json).is_err());
    }

    #[test]
    fn feature_names_match_serialized_field_names() {
        let value = serde_json::to_value(RiskInput::default()).expect("serialize input");
        for feature in Feature::ALL {
            assert!(value.get(feature.name()).is_some(), "{feature}");
        }
    }
}
