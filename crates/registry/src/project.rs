use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use carbonsense_core::{CompanyId, DomainError, Entity};

sequence_id!(
    /// Blue-carbon project identifier. Never reused.
    ProjectId
);

/// Coastal ecosystem a project restores or protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EcosystemType {
    Mangrove,
    Seagrass,
    SaltMarsh,
    CoastalWetland,
}

impl EcosystemType {
    pub const ALL: [EcosystemType; 4] = [
        EcosystemType::Mangrove,
        EcosystemType::Seagrass,
        EcosystemType::SaltMarsh,
        EcosystemType::CoastalWetland,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EcosystemType::Mangrove => "mangrove",
            EcosystemType::Seagrass => "seagrass",
            EcosystemType::SaltMarsh => "salt_marsh",
            EcosystemType::CoastalWetland => "coastal_wetland",
        }
    }
}

impl core::fmt::Display for EcosystemType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for EcosystemType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        EcosystemType::ALL
            .into_iter()
            .find(|e| e.as_str() == key)
            .ok_or_else(|| DomainError::validation(format!("unknown ecosystem type '{s}'")))
    }
}

/// Project lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    /// Registered, no approved verification yet.
    Proposed,
    /// At least one verification has been approved.
    Verified,
}

/// A registered sequestration project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueCarbonProject {
    pub id: ProjectId,
    pub name: String,
    pub location: String,
    pub area_hectares: f64,
    pub ecosystem_type: EcosystemType,
    pub owner: CompanyId,
    /// Tonnes CO2 per year.
    pub estimated_sequestration: f64,
    pub created_at: DateTime<Utc>,
    pub status: ProjectStatus,
    /// SHA-256 of the registration metadata.
    pub content_hash: String,
}

impl Entity for BlueCarbonProject {
    type Id = ProjectId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecosystem_parses_loose_spellings() {
        assert_eq!("Salt Marsh".parse::<EcosystemType>().unwrap(), EcosystemType::SaltMarsh);
        assert_eq!("coastal-wetland".parse::<EcosystemType>().unwrap(), EcosystemType::CoastalWetland);
        assert!("kelp".parse::<EcosystemType>().is_err());
    }

    #[test]
    fn ids_are_plain_numbers_on_the_wire() {
        assert_eq!(serde_json::to_string(&ProjectId::new(7)).unwrap(), "7");
        assert_eq!(ProjectId::FIRST.next(), ProjectId::new(2));
        assert_eq!("12".parse::<ProjectId>().unwrap().get(), 12);
        assert_eq!(serde_json::to_string(&ProjectStatus::Proposed).unwrap(), "\"PROPOSED\"");
    }
}
