use serde::{Deserialize, Serialize};

use carbonsense_core::error::{ensure_non_negative, ensure_not_blank};
use carbonsense_core::ValueObject;
use carbonsense_emissions::{EmissionLedger, Scope, KG_PER_TONNE};

use crate::benchmark::{BenchmarkTable, IndustryBenchmark};
use crate::error::ComplianceError;
use crate::recommendations;

/// Carbon tax per tonne CO2e above benchmark (INR).
pub const TAX_RATE_PER_TONNE: f64 = 2100.0;

/// Credit value per tonne CO2e below benchmark (INR).
pub const CREDIT_RATE_PER_TONNE: f64 = 1680.0;

/// Number of top sources recommendations are derived from.
const TOP_SOURCES: usize = 5;

/// Monetary rates applied to the benchmark gap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRates {
    pub tax_rate_per_tonne: f64,
    pub credit_rate_per_tonne: f64,
}

impl Default for AssessmentRates {
    fn default() -> Self {
        Self {
            tax_rate_per_tonne: TAX_RATE_PER_TONNE,
            credit_rate_per_tonne: CREDIT_RATE_PER_TONNE,
        }
    }
}

/// Company attributes the benchmark is scaled by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    #[serde(default)]
    pub name: String,
    pub industry: String,
    pub employees: u32,
    /// Annual revenue in millions (INR).
    pub revenue_million: f64,
    pub country: String,
}

impl ValueObject for CompanyProfile {}

impl CompanyProfile {
    pub fn validate(&self) -> Result<(), ComplianceError> {
        ensure_not_blank("industry", &self.industry)?;
        ensure_not_blank("country", &self.country)?;
        ensure_non_negative("revenue_million", self.revenue_million)?;
        Ok(())
    }
}

/// Length of the assessment window in months (1..=36).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct AssessmentPeriod(u32);

impl AssessmentPeriod {
    pub const MIN_MONTHS: u32 = 1;
    pub const MAX_MONTHS: u32 = 36;

    pub fn months(months: u32) -> Result<Self, ComplianceError> {
        if !(Self::MIN_MONTHS..=Self::MAX_MONTHS).contains(&months) {
            return Err(ComplianceError::Validation(format!(
                "assessment period must be between {} and {} months (got {months})",
                Self::MIN_MONTHS,
                Self::MAX_MONTHS
            )));
        }
        Ok(Self(months))
    }

    pub fn annual() -> Self {
        Self(12)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Fraction of a year covered by the period.
    pub fn year_fraction(self) -> f64 {
        f64::from(self.0) / 12.0
    }

    pub fn description(self) -> String {
        if self.0 == 1 {
            "1 month".to_string()
        } else {
            format!("{} months", self.0)
        }
    }
}

impl TryFrom<u32> for AssessmentPeriod {
    type Error = ComplianceError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::months(value)
    }
}

impl From<AssessmentPeriod> for u32 {
    fn from(value: AssessmentPeriod) -> Self {
        value.0
    }
}

/// Five-bucket classification of the performance ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Excellent,
    Good,
    NeedsImprovement,
    Poor,
    Critical,
}

impl ComplianceStatus {
    /// Lower bounds are inclusive, except that a ratio of exactly 1.0
    /// (on benchmark) still counts as `Good`.
    pub fn classify(ratio: f64) -> Self {
        if ratio < 0.8 {
            ComplianceStatus::Excellent
        } else if ratio <= 1.0 {
            ComplianceStatus::Good
        } else if ratio < 1.5 {
            ComplianceStatus::NeedsImprovement
        } else if ratio < 2.0 {
            ComplianceStatus::Poor
        } else {
            ComplianceStatus::Critical
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComplianceStatus::Excellent => "excellent",
            ComplianceStatus::Good => "good",
            ComplianceStatus::NeedsImprovement => "needs_improvement",
            ComplianceStatus::Poor => "poor",
            ComplianceStatus::Critical => "critical",
        }
    }
}

/// One of the largest emission sources in the assessed ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub activity: String,
    pub scope: Scope,
    pub emissions_kg: f64,
    /// Share of the ledger total, 0..=1.
    pub share: f64,
}

/// What a given percentage cut in actual emissions would avoid in tax.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReductionScenario {
    pub percent: f64,
    pub tonnes_saved: f64,
    pub tax_savings: f64,
}

/// Outcome of one assessment.
///
/// At most one of `fine_amount` / `credit_amount` is positive; both are zero
/// when actual emissions equal the benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub industry: String,
    /// Actual emissions in tonnes CO2e (whole ledger).
    pub emissions_actual: f64,
    /// Benchmark in tonnes CO2e, scaled to the period.
    pub emissions_benchmark: f64,
    pub performance_ratio: f64,
    pub status: ComplianceStatus,
    pub fine_amount: f64,
    pub credit_amount: f64,
    /// Benchmark reduced by the industry's reduction target.
    pub target_tonnes: f64,
    pub period_description: String,
    pub top_sources: Vec<SourceSummary>,
    pub recommendations: Vec<String>,
    tax_rate_per_tonne: f64,
}

impl ValueObject for ComplianceResult {}

impl ComplianceResult {
    /// Tax avoided if actual emissions dropped by `percent` (0..=100).
    pub fn reduction_savings(&self, percent: f64) -> Result<ReductionScenario, ComplianceError> {
        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(ComplianceError::Validation(
                "reduction percent must be between 0 and 100".to_string(),
            ));
        }
        let tonnes_saved = self.emissions_actual * percent / 100.0;
        Ok(ReductionScenario {
            percent,
            tonnes_saved,
            tax_savings: tonnes_saved * self.tax_rate_per_tonne,
        })
    }

    /// Positive gap (tonnes) between actual and benchmark.
    pub fn excess_tonnes(&self) -> f64 {
        (self.emissions_actual - self.emissions_benchmark).max(0.0)
    }

    /// Positive gap (tonnes) between benchmark and actual.
    pub fn saved_tonnes(&self) -> f64 {
        (self.emissions_benchmark - self.emissions_actual).max(0.0)
    }
}

/// Benchmark for a profile over a period, in tonnes CO2e.
///
/// Average of the per-employee and per-revenue estimates, prorated by
/// `months / 12`.
pub fn scaled_benchmark_tonnes(
    benchmark: &IndustryBenchmark,
    profile: &CompanyProfile,
    period: AssessmentPeriod,
) -> f64 {
    let employee_estimate =
        f64::from(profile.employees) * benchmark.emissions_per_employee_kg / KG_PER_TONNE;
    let revenue_estimate =
        profile.revenue_million * benchmark.emissions_per_revenue_kg_per_million / KG_PER_TONNE;
    (employee_estimate + revenue_estimate) / 2.0 * period.year_fraction()
}

/// Compares a ledger against its industry benchmark.
#[derive(Debug, Clone)]
pub struct ComplianceAssessor {
    benchmarks: BenchmarkTable,
    rates: AssessmentRates,
}

impl Default for ComplianceAssessor {
    fn default() -> Self {
        Self::new(BenchmarkTable::standard())
    }
}

impl ComplianceAssessor {
    pub fn new(benchmarks: BenchmarkTable) -> Self {
        Self {
            benchmarks,
            rates: AssessmentRates::default(),
        }
    }

    pub fn with_rates(mut self, rates: AssessmentRates) -> Self {
        self.rates = rates;
        self
    }

    pub fn benchmarks(&self) -> &BenchmarkTable {
        &self.benchmarks
    }

    pub fn rates(&self) -> AssessmentRates {
        self.rates
    }

    /// Assess a ledger; unknown industries fail with `UnknownIndustry`.
    pub fn assess(
        &self,
        ledger: &EmissionLedger,
        profile: &CompanyProfile,
        period: AssessmentPeriod,
    ) -> Result<ComplianceResult, ComplianceError> {
        profile.validate()?;
        let benchmark = self.benchmarks.get(&profile.industry)?;
        self.assess_against(ledger, profile, period, benchmark)
    }

    /// Like `assess`, but an unknown industry is assessed against the `other` row.
    pub fn assess_or_default(
        &self,
        ledger: &EmissionLedger,
        profile: &CompanyProfile,
        period: AssessmentPeriod,
    ) -> Result<ComplianceResult, ComplianceError> {
        profile.validate()?;
        let benchmark = self.benchmarks.get_or_default(&profile.industry)?;
        self.assess_against(ledger, profile, period, benchmark)
    }

    fn assess_against(
        &self,
        ledger: &EmissionLedger,
        profile: &CompanyProfile,
        period: AssessmentPeriod,
        benchmark: &IndustryBenchmark,
    ) -> Result<ComplianceResult, ComplianceError> {
        // The whole ledger counts as actual; the period only scales the benchmark.
        let actual = ledger.total_tonnes();
        let scaled = scaled_benchmark_tonnes(benchmark, profile, period);

        if !(scaled.is_finite() && scaled > 0.0) {
            return Err(ComplianceError::DivisionByZero);
        }

        let ratio = actual / scaled;
        let status = ComplianceStatus::classify(ratio);

        let (fine_amount, credit_amount) = if actual > scaled {
            ((actual - scaled) * self.rates.tax_rate_per_tonne, 0.0)
        } else if actual < scaled {
            (0.0, (scaled - actual) * self.rates.credit_rate_per_tonne)
        } else {
            (0.0, 0.0)
        };

        let total_kg = ledger.total_kg();
        let top_sources: Vec<SourceSummary> = ledger
            .top_sources(TOP_SOURCES)
            .into_iter()
            .map(|e| SourceSummary {
                activity: e.activity().to_string(),
                scope: e.scope(),
                emissions_kg: e.emissions_kg(),
                share: if total_kg > 0.0 { e.emissions_kg() / total_kg } else { 0.0 },
            })
            .collect();

        let recommendations = recommendations::build(
            &top_sources,
            status,
            benchmark.reduction_target_percent,
            ledger.verified_share(),
            ledger.is_empty(),
        );

        Ok(ComplianceResult {
            industry: benchmark.industry.clone(),
            emissions_actual: actual,
            emissions_benchmark: scaled,
            performance_ratio: ratio,
            status,
            fine_amount,
            credit_amount,
            target_tonnes: scaled * (1.0 - benchmark.reduction_target_percent / 100.0),
            period_description: period.description(),
            top_sources,
            recommendations,
            tax_rate_per_tonne: self.rates.tax_rate_per_tonne,
        })
    }
}
