use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use carbonsense_core::ValueObject;

use crate::error::ComplianceError;

/// Industry used when a company's industry has no dedicated row.
pub const DEFAULT_INDUSTRY: &str = "other";

const ALL_COUNTRIES: [&str; 4] = ["India", "Indonesia", "Japan", "Global"];

/// Annual emission intensity reference for one industry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryBenchmark {
    pub industry: String,
    /// kg CO2e per employee per year.
    pub emissions_per_employee_kg: f64,
    /// kg CO2e per million (INR) of revenue per year.
    pub emissions_per_revenue_kg_per_million: f64,
    pub reduction_target_percent: f64,
    pub applicable_countries: Vec<String>,
}

impl ValueObject for IndustryBenchmark {}

impl IndustryBenchmark {
    fn builtin(industry: &str, per_employee: f64, per_revenue: f64, target: f64) -> Self {
        Self {
            industry: industry.to_string(),
            emissions_per_employee_kg: per_employee,
            emissions_per_revenue_kg_per_million: per_revenue,
            reduction_target_percent: target,
            applicable_countries: ALL_COUNTRIES.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn applies_to(&self, country: &str) -> bool {
        self.applicable_countries
            .iter()
            .any(|c| c.eq_ignore_ascii_case(country) || c.eq_ignore_ascii_case("Global"))
    }
}

/// Static per-industry lookup, keyed case-insensitively.
///
/// Immutable once built; the assessor only reads from it.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkTable {
    rows: BTreeMap<String, IndustryBenchmark>,
}

impl BenchmarkTable {
    /// Build from explicit rows. Later rows replace earlier ones with the same key.
    pub fn from_rows(rows: impl IntoIterator<Item = IndustryBenchmark>) -> Self {
        let rows = rows
            .into_iter()
            .map(|b| (normalize(&b.industry), b))
            .collect();
        Self { rows }
    }

    /// The built-in reference table.
    pub fn standard() -> Self {
        Self::from_rows([
            IndustryBenchmark::builtin("Manufacturing", 12_000.0, 150_000.0, 30.0),
            IndustryBenchmark::builtin("Technology", 2_500.0, 25_000.0, 25.0),
            IndustryBenchmark::builtin("Services", 1_000.0, 37_500.0, 20.0),
            IndustryBenchmark::builtin("Retail", 3_000.0, 45_000.0, 20.0),
            IndustryBenchmark::builtin("Transportation", 15_000.0, 200_000.0, 35.0),
            IndustryBenchmark::builtin("Agriculture", 6_000.0, 120_000.0, 25.0),
            IndustryBenchmark::builtin("Energy", 25_000.0, 300_000.0, 40.0),
            IndustryBenchmark::builtin("Other", 5_000.0, 75_000.0, 25.0),
        ])
    }

    pub fn get(&self, industry: &str) -> Result<&IndustryBenchmark, ComplianceError> {
        self.rows
            .get(&normalize(industry))
            .ok_or_else(|| ComplianceError::UnknownIndustry(industry.trim().to_string()))
    }

    /// Lookup falling back to the `other` row; `UnknownIndustry` only if that is absent too.
    pub fn get_or_default(&self, industry: &str) -> Result<&IndustryBenchmark, ComplianceError> {
        self.get(industry).or_else(|_| self.get(DEFAULT_INDUSTRY))
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndustryBenchmark> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Default for BenchmarkTable {
    fn default() -> Self {
        Self::standard()
    }
}

fn normalize(industry: &str) -> String {
    industry.trim().to_lowercase()
}
