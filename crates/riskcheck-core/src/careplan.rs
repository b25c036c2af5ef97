use crate::tier::Tier;

/// Recommended care plan for a final tier.
pub const fn resolve_care_plan(tier: Tier) -> &'static str {
    match tier {
        Tier::Tier1 => {
            "Maintain current habits: balanced meals, at least 150 minutes of activity per week, \
             and an annual wellness visit with routine glucose screening."
        }
        Tier::Tier2 => {
            "Start preventive lifestyle changes: cut refined sugars, add regular exercise, \
             and repeat glucose and BMI screening within 6 months."
        }
        Tier::Tier3 => {
            "Book a primary-care visit within 4 to 6 weeks for HbA1c testing and begin a \
             structured nutrition and exercise program with monthly self-monitoring."
        }
        Tier::Tier4 => {
            "Arrange a clinical review within 2 weeks to confirm with HbA1c and fasting glucose, \
             consider referral to a diabetes prevention program, and monitor glucose weekly."
        }
        Tier::Tier5 => {
            "Seek medical evaluation within days for diagnostic testing, endocrinology referral, \
             and an individualized treatment and monitoring plan."
        }
    }
}
