//! Deterministic free-text suggestions attached to an assessment.

use carbonsense_emissions::Scope;

use crate::assessor::{ComplianceStatus, SourceSummary};

/// Below this share of verified entries a data-quality line is added.
const VERIFIED_SHARE_THRESHOLD: f64 = 0.5;

/// One line per top source (already ranked), then a status line, then an
/// optional verification-coverage line.
pub fn build(
    top_sources: &[SourceSummary],
    status: ComplianceStatus,
    reduction_target_percent: f64,
    verified_share: f64,
    ledger_is_empty: bool,
) -> Vec<String> {
    let mut out: Vec<String> = top_sources.iter().map(source_line).collect();

    out.push(status_line(status, reduction_target_percent));

    if ledger_is_empty {
        out.push("Record emission entries for all three scopes to get a meaningful assessment.".to_string());
    } else if verified_share < VERIFIED_SHARE_THRESHOLD {
        out.push(format!(
            "Only {:.0}% of entries are verified; internal or third-party verification improves credibility.",
            verified_share * 100.0
        ));
    }

    out
}

fn source_line(source: &SourceSummary) -> String {
    format!(
        "{} ({}): {:.2} t CO2e, {:.0}% of total. {}",
        source.activity,
        source.scope,
        source.emissions_kg / 1000.0,
        source.share * 100.0,
        scope_hint(source.scope)
    )
}

fn scope_hint(scope: Scope) -> &'static str {
    match scope {
        Scope::Scope1 => "Improve fuel efficiency or switch to lower-carbon fuels.",
        Scope::Scope2 => "Source renewable electricity and cut consumption.",
        Scope::Scope3 => "Engage suppliers and reduce business travel.",
    }
}

fn status_line(status: ComplianceStatus, target: f64) -> String {
    match status {
        ComplianceStatus::Excellent => format!(
            "Emissions are well below the industry benchmark; surplus can be sold as credits. Keep tracking toward the {target:.0}% reduction target."
        ),
        ComplianceStatus::Good => format!(
            "Emissions are within the industry benchmark. Plan for the {target:.0}% reduction target."
        ),
        ComplianceStatus::NeedsImprovement => format!(
            "Emissions exceed the benchmark. Prioritise the largest sources to reach the {target:.0}% reduction target."
        ),
        ComplianceStatus::Poor => format!(
            "Emissions are far above the benchmark. Set a reduction plan toward the {target:.0}% target and consider offsets."
        ),
        ComplianceStatus::Critical => format!(
            "Emissions are at least twice the benchmark. Immediate reduction and offsetting are needed to avoid carbon tax (target {target:.0}%)."
        ),
    }
}
