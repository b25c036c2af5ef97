use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use riskcheck_core::{compute, tier_for_score, Horizon, RiskInput, Tier};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Case {
    name: String,
    input: RiskInput,
    expected_tiers: [u8; 3],
    expected_final_tier: u8,
}

#[test]
fn scenario_cases_pass() {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let fixture = root
        .join("..")
        .join("..")
        .join("data")
        .join("scenarios")
        .join("risk_cases.json");

    let content = fs::read_to_string(&fixture)
        .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", fixture.display()));
    let cases: Vec<Case> = serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", fixture.display()));
    assert!(!cases.is_empty());

    for case in cases {
        let report = compute(case.input);
        let tiers = Horizon::ALL.map(|h| report.horizon(h).tier.level());
        assert_eq!(tiers, case.expected_tiers, "case {} horizon tiers", case.name);
        assert_eq!(
            report.final_tier.level(),
            case.expected_final_tier,
            "case {} final tier",
            case.name
        );
        assert_eq!(
            report.final_tier,
            tier_for_score(report.final_score),
            "case {} final tier must match its score band",
            case.name
        );
        assert!(report.p30 <= report.p60 && report.p60 <= report.p90, "case {}", case.name);
    }
}

#[test]
fn mid_range_probabilities_strictly_increase() {
    let report = compute(RiskInput {
        pregnancies: 2.0,
        glucose: 120.0,
        blood_pressure: 80.0,
        skin_thickness: 25.0,
        insulin: 100.0,
        bmi: 28.0,
        pedigree_function: 0.6,
        age: 40.0,
    });
    assert!(report.p30 < report.p60);
    assert!(report.p60 < report.p90);
}

#[test]
fn every_final_tier_is_reachable() {
    let reached = (0..=250)
        .map(|step| {
            let scale = f64::from(step) / 250.0;
            compute(RiskInput::from_fn(|feature| {
                let bounds = feature.bounds();
                bounds.min + scale * (bounds.max - bounds.min)
            }))
            .final_tier
        })
        .collect::<BTreeSet<_>>();
    assert_eq!(reached.into_iter().collect::<Vec<_>>(), Tier::ALL.to_vec());
}
