use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use carbonsense_core::Entity;

use crate::project::ProjectId;

sequence_id!(
    /// Verification record identifier. Never reused.
    VerificationId
);

/// A verifier's attestation of sequestered carbon for a project.
///
/// `is_approved` flips from false to true at most once; approval issues
/// exactly one credit lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub id: VerificationId,
    pub project_id: ProjectId,
    pub verifier: String,
    /// Tonnes CO2.
    pub verified_amount: f64,
    pub verification_date: DateTime<Utc>,
    pub data_hash: String,
    pub is_approved: bool,
    pub comments: String,
}

impl Entity for VerificationRecord {
    type Id = VerificationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
