//! Blue-carbon credit registry.
//!
//! Project registration, verification, credit issuance, emissions
//! bookkeeping and the marketplace matcher, modelled as a single
//! event-sourced aggregate (`CarbonRegistry`). Pure domain logic; the
//! infra layer owns the event log and replay.

/// Sequential `u64` identifier, starting at 1 and allocated by the
/// registry in creation order.
macro_rules! sequence_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Copy,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const FIRST: Self = Self(1);

            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> u64 {
                self.0
            }

            pub const fn next(self) -> Self {
                Self(self.0 + 1)
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::carbonsense_core::DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u64>().map(Self).map_err(|e| {
                    ::carbonsense_core::DomainError::invalid_id(format!(
                        "{}: {}",
                        stringify!($name),
                        e
                    ))
                })
            }
        }
    };
}

pub mod credit;
pub mod error;
pub mod hash;
pub mod marketplace;
pub mod project;
pub mod registry;
pub mod verification;

pub use credit::{CreditLot, LotId, DEFAULT_PRICE_PER_TON};
pub use error::RegistryError;
pub use hash::content_hash;
pub use marketplace::{MarketplaceListing, TransferLeg};
pub use project::{BlueCarbonProject, EcosystemType, ProjectId, ProjectStatus};
pub use registry::{
    ApproveVerification, CarbonPosition, CarbonRegistry, CompanyDashboard, CreditsTransferred,
    EmissionsRecorded, ProjectRegistered, PurchaseCredits, RecordEmissions, RegisterProject,
    RegistryCommand, RegistryEvent, RegistryStats, SubmitVerification, VerificationApproved,
    VerificationSubmitted,
};
pub use verification::{VerificationId, VerificationRecord};
