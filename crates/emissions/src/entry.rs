use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use carbonsense_core::error::{ensure_non_negative, ensure_not_blank};
use carbonsense_core::{DomainError, DomainResult, Entity, EntryId};

/// GHG Protocol emission scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "ScopeRepr", into = "String")]
pub enum Scope {
    /// Direct emissions from owned or controlled sources.
    Scope1,
    /// Indirect emissions from purchased energy.
    Scope2,
    /// All other indirect emissions in the value chain.
    Scope3,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::Scope1, Scope::Scope2, Scope::Scope3];

    pub fn number(self) -> u8 {
        match self {
            Scope::Scope1 => 1,
            Scope::Scope2 => 2,
            Scope::Scope3 => 3,
        }
    }

    pub fn from_number(n: u8) -> DomainResult<Self> {
        match n {
            1 => Ok(Scope::Scope1),
            2 => Ok(Scope::Scope2),
            3 => Ok(Scope::Scope3),
            other => Err(DomainError::validation(format!(
                "scope must be 1, 2 or 3 (got {other})"
            ))),
        }
    }
}

impl core::fmt::Display for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Scope {}", self.number())
    }
}

impl core::str::FromStr for Scope {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("Scope")
            .or_else(|| trimmed.strip_prefix("scope"))
            .unwrap_or(trimmed)
            .trim();
        let n: u8 = digits
            .parse()
            .map_err(|_| DomainError::validation(format!("invalid scope: {s}")))?;
        Self::from_number(n)
    }
}

impl From<Scope> for String {
    fn from(value: Scope) -> Self {
        value.to_string()
    }
}

/// Wire shape accepted for a scope: `1`, `"1"` or `"Scope 1"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ScopeRepr {
    Number(u8),
    Text(String),
}

impl TryFrom<ScopeRepr> for Scope {
    type Error = DomainError;

    fn try_from(value: ScopeRepr) -> Result<Self, Self::Error> {
        match value {
            ScopeRepr::Number(n) => Scope::from_number(n),
            ScopeRepr::Text(s) => s.parse(),
        }
    }
}

/// Self-assessed quality of the activity data behind an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataQuality {
    Low,
    #[default]
    Medium,
    High,
}

/// Assurance level of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VerificationStatus {
    #[default]
    Unverified,
    #[serde(rename = "Internally Verified")]
    InternallyVerified,
    #[serde(rename = "Third-Party Verified")]
    ThirdPartyVerified,
}

impl VerificationStatus {
    pub fn is_verified(self) -> bool {
        !matches!(self, VerificationStatus::Unverified)
    }
}

/// One emission-producing activity.
///
/// Entries are immutable once created: `emissions_kg_co2e` is either
/// `quantity × emission_factor` or an externally supplied non-negative figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EmissionRecord")]
pub struct EmissionEntry {
    id: EntryId,
    date: NaiveDate,
    business_unit: String,
    project: String,
    scope: Scope,
    category: String,
    activity: String,
    country: String,
    facility: String,
    responsible_person: String,
    quantity: f64,
    unit: String,
    emission_factor: f64,
    #[serde(rename = "emissions_kgCO2e")]
    emissions_kg_co2e: f64,
    data_quality: DataQuality,
    verification_status: VerificationStatus,
    notes: String,
}

/// Form input for a single entry (emissions are always derived).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEmissionEntry {
    pub date: NaiveDate,
    pub business_unit: String,
    pub project: String,
    pub scope: Scope,
    pub category: String,
    pub activity: String,
    pub country: String,
    pub facility: String,
    pub responsible_person: String,
    pub quantity: f64,
    pub unit: String,
    pub emission_factor: f64,
    pub data_quality: DataQuality,
    pub verification_status: VerificationStatus,
    pub notes: String,
}

impl EmissionEntry {
    /// Create an entry from form input; emissions = quantity × emission_factor.
    pub fn record(input: NewEmissionEntry) -> DomainResult<Self> {
        let quantity = ensure_non_negative("quantity", input.quantity)?;
        let emission_factor = ensure_non_negative("emission_factor", input.emission_factor)?;
        ensure_not_blank("category", &input.category)?;
        ensure_not_blank("activity", &input.activity)?;

        Ok(Self {
            id: EntryId::new(),
            date: input.date,
            business_unit: input.business_unit,
            project: input.project,
            scope: input.scope,
            category: input.category,
            activity: input.activity,
            country: input.country,
            facility: input.facility,
            responsible_person: input.responsible_person,
            quantity,
            unit: input.unit,
            emission_factor,
            emissions_kg_co2e: quantity * emission_factor,
            data_quality: input.data_quality,
            verification_status: input.verification_status,
            notes: input.notes,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn business_unit(&self) -> &str {
        &self.business_unit
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn activity(&self) -> &str {
        &self.activity
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn facility(&self) -> &str {
        &self.facility
    }

    pub fn responsible_person(&self) -> &str {
        &self.responsible_person
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn emission_factor(&self) -> f64 {
        self.emission_factor
    }

    /// Emissions in kg CO2e.
    pub fn emissions_kg(&self) -> f64 {
        self.emissions_kg_co2e
    }

    pub fn data_quality(&self) -> DataQuality {
        self.data_quality
    }

    pub fn verification_status(&self) -> VerificationStatus {
        self.verification_status
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }
}

impl Entity for EmissionEntry {
    type Id = EntryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn default_business_unit() -> String {
    "Corporate".to_string()
}

fn default_project() -> String {
    "Not Applicable".to_string()
}

fn default_country() -> String {
    "India".to_string()
}

/// Loosely-typed row as found in persisted JSON and bulk uploads.
///
/// Only `scope`, `category`, `activity`, `quantity`, `unit` and
/// `emission_factor` are required. Missing enterprise fields fall back to the
/// upload defaults, a missing date to today, and a missing id to a fresh one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmissionRecord {
    #[serde(default)]
    pub id: Option<EntryId>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default = "default_business_unit")]
    pub business_unit: String,
    #[serde(default = "default_project")]
    pub project: String,
    pub scope: Scope,
    pub category: String,
    pub activity: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub facility: String,
    #[serde(default)]
    pub responsible_person: String,
    pub quantity: f64,
    pub unit: String,
    pub emission_factor: f64,
    #[serde(default, rename = "emissions_kgCO2e")]
    pub emissions_kg_co2e: Option<f64>,
    #[serde(default)]
    pub data_quality: DataQuality,
    #[serde(default)]
    pub verification_status: VerificationStatus,
    #[serde(default)]
    pub notes: String,
}

impl TryFrom<EmissionRecord> for EmissionEntry {
    type Error = DomainError;

    fn try_from(record: EmissionRecord) -> Result<Self, Self::Error> {
        let reported = record.emissions_kg_co2e;
        let mut entry = EmissionEntry::record(NewEmissionEntry {
            date: record.date.unwrap_or_else(|| Utc::now().date_naive()),
            business_unit: record.business_unit,
            project: record.project,
            scope: record.scope,
            category: record.category,
            activity: record.activity,
            country: record.country,
            facility: record.facility,
            responsible_person: record.responsible_person,
            quantity: record.quantity,
            unit: record.unit,
            emission_factor: record.emission_factor,
            data_quality: record.data_quality,
            verification_status: record.verification_status,
            notes: record.notes,
        })?;

        if let Some(kg) = reported {
            entry.emissions_kg_co2e = ensure_non_negative("emissions_kgCO2e", kg)?;
        }
        if let Some(id) = record.id {
            entry.id = id;
        }
        Ok(entry)
    }
}
