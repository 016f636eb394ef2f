//! `carbonsense-core`: shared domain building blocks.
//!
//! Pure domain primitives only: identifiers, the error model and the
//! aggregate/entity/value-object traits the engine crates build on.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, CompanyId, EntryId};
pub use value_object::ValueObject;
