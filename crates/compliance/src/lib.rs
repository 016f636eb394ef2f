//! Compliance benchmarking and carbon tax / credit calculation.
//!
//! Pure, deterministic functions over an emission ledger and a company
//! profile. No IO; callers own persistence and presentation.

pub mod assessor;
pub mod benchmark;
pub mod error;
pub mod recommendations;

pub use assessor::{
    AssessmentPeriod, AssessmentRates, CompanyProfile, ComplianceAssessor, ComplianceResult,
    ComplianceStatus, ReductionScenario, SourceSummary, CREDIT_RATE_PER_TONNE,
    TAX_RATE_PER_TONNE,
};
pub use benchmark::{BenchmarkTable, IndustryBenchmark, DEFAULT_INDUSTRY};
pub use error::ComplianceError;
