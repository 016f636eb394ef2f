//! Emission ledger module.
//!
//! Ordered, per-company collection of emission entries plus the aggregations
//! the compliance assessor and reporting consume. Pure domain logic only.

pub mod entry;
pub mod ledger;

pub use entry::{
    DataQuality, EmissionEntry, EmissionRecord, NewEmissionEntry, Scope, VerificationStatus,
};
pub use ledger::{EmissionLedger, ScopeTotals};

/// Kilograms per tonne.
pub const KG_PER_TONNE: f64 = 1000.0;
