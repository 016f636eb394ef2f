use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use carbonsense_core::{CompanyId, Entity};

use crate::project::ProjectId;

/// Price per tonne (USD) of lots issued on verification approval.
pub const DEFAULT_PRICE_PER_TON: f64 = 50.0;

sequence_id!(
    /// Credit lot identifier, allocated in creation order.
    LotId
);

/// A quantity of credits held by one company.
///
/// Active lots make up the holder's balance. `project_id` is kept for
/// provenance after transfers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditLot {
    pub id: LotId,
    pub project_id: ProjectId,
    /// Tonnes CO2.
    pub amount: f64,
    pub price_per_ton: f64,
    pub holder: CompanyId,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl CreditLot {
    pub fn total_price(&self) -> f64 {
        self.amount * self.price_per_ton
    }
}

impl Entity for CreditLot {
    type Id = LotId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
