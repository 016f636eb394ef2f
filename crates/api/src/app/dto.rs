use serde::{Deserialize, Serialize};

use carbonsense_compliance::{ComplianceResult, ReductionScenario};
use carbonsense_core::CompanyId;
use carbonsense_emissions::EmissionRecord;
use carbonsense_registry::{BlueCarbonProject, ProjectId, VerificationRecord};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SubmitVerificationRequest {
    pub project_id: ProjectId,
    pub verified_amount: f64,
    pub verifier: String,
    #[serde(default)]
    pub verification_data: serde_json::Value,
    #[serde(default)]
    pub comments: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordEmissionsRequest {
    pub company: CompanyId,
    pub amount_tonnes: f64,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub buyer: CompanyId,
    pub seller: CompanyId,
    pub amount: f64,
    pub price_per_ton: f64,
}

/// One row, or a batch under `entries` (imported all or nothing).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EmissionsUpload {
    Batch { entries: Vec<EmissionRecord> },
    Single(EmissionRecord),
}

impl EmissionsUpload {
    pub fn into_rows(self) -> Vec<EmissionRecord> {
        match self {
            EmissionsUpload::Batch { entries } => entries,
            EmissionsUpload::Single(row) => vec![row],
        }
    }
}

/// Profile fields missing from the company record; industry and country
/// default to the registered ones.
#[derive(Debug, Deserialize)]
pub struct AssessmentRequest {
    pub employees: u32,
    pub revenue_million: f64,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default = "default_period_months")]
    pub period_months: u32,
    /// Assess an unknown industry against the `other` benchmark instead of failing.
    #[serde(default)]
    pub fallback_to_default: bool,
}

fn default_period_months() -> u32 {
    12
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: BlueCarbonProject,
    pub verifications: Vec<VerificationRecord>,
}

/// Reduction percentages offered by the savings calculator.
pub const REDUCTION_SCENARIOS: [f64; 2] = [10.0, 25.0];

#[derive(Debug, Serialize)]
pub struct AssessmentResponse {
    #[serde(flatten)]
    pub result: ComplianceResult,
    pub reduction_scenarios: Vec<ReductionScenario>,
}
