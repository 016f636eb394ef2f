//! Marketplace matcher: greedy, first-in-order allocation of a seller's lots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use carbonsense_core::CompanyId;

use crate::credit::{CreditLot, LotId};
use crate::project::ProjectId;

/// Amounts closer than this are treated as equal when walking lots.
pub const AMOUNT_EPSILON: f64 = 1e-9;

/// One slice of a purchase taken from a single seller lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferLeg {
    pub source_lot: LotId,
    /// Lot created for the buyer.
    pub new_lot: LotId,
    pub project_id: ProjectId,
    pub amount: f64,
    /// The whole source lot was consumed and is deactivated; otherwise it is
    /// reduced in place and stays active for the seller.
    pub exhausts_source: bool,
}

/// An active lot as offered on the marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketplaceListing {
    pub lot_id: LotId,
    pub seller: CompanyId,
    pub project_id: ProjectId,
    pub amount: f64,
    pub price_per_ton: f64,
    pub total_price: f64,
    pub created_at: DateTime<Utc>,
}

impl From<&CreditLot> for MarketplaceListing {
    fn from(lot: &CreditLot) -> Self {
        Self {
            lot_id: lot.id,
            seller: lot.holder.clone(),
            project_id: lot.project_id,
            amount: lot.amount,
            price_per_ton: lot.price_per_ton,
            total_price: lot.total_price(),
            created_at: lot.created_at,
        }
    }
}

/// Walk the seller's active lots in creation order until `amount` is covered.
///
/// Lot prices are ignored: the order is insertion order, not cheapest first.
/// New buyer lots get consecutive ids starting at `first_new_lot`. The caller
/// checks the balance first; if the lots run out early the plan is short.
pub fn plan_transfer<'a>(
    seller_lots: impl IntoIterator<Item = &'a CreditLot>,
    amount: f64,
    first_new_lot: LotId,
) -> Vec<TransferLeg> {
    let mut legs = Vec::new();
    let mut remaining = amount;
    let mut next_lot = first_new_lot;

    for lot in seller_lots.into_iter().filter(|l| l.is_active) {
        if remaining <= AMOUNT_EPSILON {
            break;
        }
        let exhausts_source = lot.amount <= remaining + AMOUNT_EPSILON;
        let take = if exhausts_source { lot.amount } else { remaining };

        legs.push(TransferLeg {
            source_lot: lot.id,
            new_lot: next_lot,
            project_id: lot.project_id,
            amount: take,
            exhausts_source,
        });
        next_lot = next_lot.next();
        remaining -= take;
    }

    legs
}
