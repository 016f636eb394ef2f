//! Infrastructure layer: event log, file storage, config and the services
//! that drive the domain crates.

pub mod companies;
pub mod config;
pub mod event_store;
pub mod registry_service;
pub mod storage;

pub use companies::{CarbonSummary, CompanyDirectory, CompanyRecord, CreditAccount, DirectoryError, NewCompany};
pub use config::{AppConfig, ConfigError};
pub use registry_service::{NewProject, RegistryService, ServiceError};
pub use storage::{JsonFileStore, StorageError};
