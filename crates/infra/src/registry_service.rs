//! Registry command execution over an event store.
//!
//! The service rehydrates once at startup, then for every command runs
//!
//! ```text
//! handle (pure) -> append (ExpectedVersion::Exact) -> apply
//! ```
//!
//! The in-memory aggregate sits behind a mutex held across the append, so
//! commands are serialized and the log and the state never diverge: if the
//! append fails nothing is applied.

use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use carbonsense_core::{Aggregate, AggregateId, AggregateRoot, CompanyId, ExpectedVersion};
use carbonsense_events::{Event, EventEnvelope};
use carbonsense_registry::{
    ApproveVerification, BlueCarbonProject, CarbonRegistry, CreditLot, CreditsTransferred,
    EcosystemType, ProjectId, PurchaseCredits, RecordEmissions, RegisterProject, RegistryCommand,
    RegistryError, RegistryEvent, SubmitVerification, VerificationId, DEFAULT_PRICE_PER_TON,
};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Aggregate type recorded on every registry event.
pub const REGISTRY_AGGREGATE_TYPE: &str = "carbon_registry";

/// Stream id of the process-wide registry.
const REGISTRY_STREAM: u128 = 0x0190_0000_0000_7000_8000_ca4b_0000_0001;

pub fn registry_stream_id() -> AggregateId {
    AggregateId::from_uuid(Uuid::from_u128(REGISTRY_STREAM))
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] EventStoreError),

    #[error("failed to decode stored event #{sequence}: {message}")]
    Deserialize { sequence: u64, message: String },

    #[error("registry state lock poisoned")]
    Poisoned,
}

/// Input for `RegistryService::register_project`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub location: String,
    pub area_hectares: f64,
    pub ecosystem_type: EcosystemType,
    pub estimated_sequestration: f64,
    pub owner: CompanyId,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Event-sourced registry service; one instance per process.
#[derive(Debug)]
pub struct RegistryService<S> {
    store: S,
    stream_id: AggregateId,
    state: Mutex<CarbonRegistry>,
    default_price_per_ton: f64,
}

impl<S: EventStore> RegistryService<S> {
    /// Open the default registry stream, replaying its history.
    pub fn open(store: S) -> Result<Self, ServiceError> {
        Self::open_stream(store, registry_stream_id())
    }

    pub fn open_stream(store: S, stream_id: AggregateId) -> Result<Self, ServiceError> {
        let history = store.load_stream(stream_id)?;
        let mut registry = CarbonRegistry::empty(stream_id);
        for stored in &history {
            registry.apply(&decode(stored)?);
        }

        tracing::info!(
            stream_id = %stream_id,
            events = history.len(),
            version = registry.version(),
            "registry rehydrated"
        );

        Ok(Self {
            store,
            stream_id,
            state: Mutex::new(registry),
            default_price_per_ton: DEFAULT_PRICE_PER_TON,
        })
    }

    /// Price per tonne of lots issued on approval.
    pub fn with_default_price(mut self, price_per_ton: f64) -> Self {
        self.default_price_per_ton = price_per_ton;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Handle, persist and apply one command.
    pub fn execute(&self, command: RegistryCommand) -> Result<Vec<RegistryEvent>, ServiceError> {
        let mut state = self.state.lock().map_err(|_| ServiceError::Poisoned)?;

        let decided = state.handle(&command)?;
        if decided.is_empty() {
            return Ok(decided);
        }

        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    self.stream_id,
                    REGISTRY_AGGREGATE_TYPE,
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let expected = ExpectedVersion::Exact(state.version());
        if let Err(err) = self.store.append(uncommitted, expected) {
            tracing::warn!(error = %err, "registry append failed; state unchanged");
            return Err(err.into());
        }

        for ev in &decided {
            state.apply(ev);
        }
        Ok(decided)
    }

    /// Run a read-only query against the current state.
    pub fn read<T>(&self, f: impl FnOnce(&CarbonRegistry) -> T) -> Result<T, ServiceError> {
        let state = self.state.lock().map_err(|_| ServiceError::Poisoned)?;
        Ok(f(&state))
    }

    pub fn register_project(&self, input: NewProject) -> Result<BlueCarbonProject, ServiceError> {
        let events = self.execute(RegistryCommand::RegisterProject(RegisterProject {
            name: input.name,
            location: input.location,
            area_hectares: input.area_hectares,
            ecosystem_type: input.ecosystem_type,
            estimated_sequestration: input.estimated_sequestration,
            owner: input.owner,
            metadata: input.metadata,
            occurred_at: Utc::now(),
        }))?;

        let id = events
            .iter()
            .find_map(|e| match e {
                RegistryEvent::ProjectRegistered(p) => Some(p.project_id),
                _ => None,
            })
            .ok_or_else(|| missing_event("project registration"))?;
        let project = self
            .read(|r| r.project(id).cloned())?
            .ok_or(RegistryError::ProjectNotFound(id))?;

        tracing::info!(
            project_id = %project.id,
            owner = %project.owner,
            ecosystem = %project.ecosystem_type,
            "blue carbon project registered"
        );
        Ok(project)
    }

    pub fn submit_verification(
        &self,
        project_id: ProjectId,
        verified_amount: f64,
        verifier: impl Into<String>,
        verification_data: serde_json::Value,
        comments: impl Into<String>,
    ) -> Result<VerificationId, ServiceError> {
        let verifier = verifier.into();
        let events = self.execute(RegistryCommand::SubmitVerification(SubmitVerification {
            project_id,
            verified_amount,
            verifier: verifier.clone(),
            verification_data,
            comments: comments.into(),
            occurred_at: Utc::now(),
        }))?;

        let id = events
            .iter()
            .find_map(|e| match e {
                RegistryEvent::VerificationSubmitted(v) => Some(v.verification_id),
                _ => None,
            })
            .ok_or_else(|| missing_event("verification submission"))?;

        let estimate = self.read(|r| r.project(project_id).map(|p| p.estimated_sequestration))?;
        if let Some(estimate) = estimate.filter(|est| verified_amount > *est) {
            tracing::warn!(
                project_id = %project_id,
                verified_amount,
                estimate,
                "verified amount exceeds the project's estimated sequestration"
            );
        }

        tracing::info!(verification_id = %id, project_id = %project_id, verifier = %verifier, "verification submitted");
        Ok(id)
    }

    /// Approve a verification; returns the credit lot it issued.
    pub fn approve_verification(&self, verification_id: VerificationId) -> Result<CreditLot, ServiceError> {
        let events = self.execute(RegistryCommand::ApproveVerification(ApproveVerification {
            verification_id,
            price_per_ton: self.default_price_per_ton,
            occurred_at: Utc::now(),
        }))?;

        let lot_id = events
            .iter()
            .find_map(|e| match e {
                RegistryEvent::VerificationApproved(a) => Some(a.lot_id),
                _ => None,
            })
            .ok_or_else(|| missing_event("verification approval"))?;
        let lot = self
            .read(|r| r.lots().iter().find(|l| l.id == lot_id).cloned())?
            .ok_or_else(|| missing_event("issued credit lot"))?;

        tracing::info!(
            verification_id = %verification_id,
            owner = %lot.holder,
            amount = lot.amount,
            "verification approved, credits issued"
        );
        Ok(lot)
    }

    pub fn record_emissions(&self, company: CompanyId, amount_tonnes: f64) -> Result<f64, ServiceError> {
        self.execute(RegistryCommand::RecordEmissions(RecordEmissions {
            company: company.clone(),
            amount_tonnes,
            occurred_at: Utc::now(),
        }))?;
        let total = self.read(|r| r.emissions(&company))?;
        tracing::info!(company = %company, amount_tonnes, total, "emissions recorded");
        Ok(total)
    }

    pub fn purchase(
        &self,
        buyer: CompanyId,
        seller: CompanyId,
        amount: f64,
        price_per_ton: f64,
    ) -> Result<CreditsTransferred, ServiceError> {
        let events = self.execute(RegistryCommand::PurchaseCredits(PurchaseCredits {
            buyer,
            seller,
            amount,
            price_per_ton,
            occurred_at: Utc::now(),
        }))?;

        let transfer = events
            .into_iter()
            .find_map(|e| match e {
                RegistryEvent::CreditsTransferred(t) => Some(t),
                _ => None,
            })
            .ok_or_else(|| missing_event("credit transfer"))?;

        tracing::info!(
            buyer = %transfer.buyer,
            seller = %transfer.seller,
            amount = transfer.amount,
            total_cost = transfer.total_cost(),
            lots = transfer.legs.len(),
            "credits transferred"
        );
        Ok(transfer)
    }

    /// The full registry log as typed envelopes, oldest first.
    pub fn history(&self) -> Result<Vec<EventEnvelope<RegistryEvent>>, ServiceError> {
        self.store
            .load_stream(self.stream_id)?
            .iter()
            .map(|stored| -> Result<EventEnvelope<RegistryEvent>, ServiceError> {
                let event = decode(stored)?;
                Ok(EventEnvelope::new(
                    stored.event_id,
                    stored.aggregate_id,
                    stored.aggregate_type.clone(),
                    stored.sequence_number,
                    event.event_type(),
                    stored.occurred_at,
                    event,
                ))
            })
            .collect()
    }
}

fn decode(stored: &StoredEvent) -> Result<RegistryEvent, ServiceError> {
    serde_json::from_value(stored.payload.clone()).map_err(|e| ServiceError::Deserialize {
        sequence: stored.sequence_number,
        message: e.to_string(),
    })
}

fn missing_event(what: &str) -> ServiceError {
    ServiceError::Store(EventStoreError::InvalidAppend(format!(
        "{what} produced no matching event"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::event_store::{FileEventStore, InMemoryEventStore};

    fn company(id: &str) -> CompanyId {
        CompanyId::new(id).unwrap()
    }

    fn mangrove(owner: &str) -> NewProject {
        NewProject {
            name: "Pichavaram Mangroves".to_string(),
            location: "Tamil Nadu, India".to_string(),
            area_hectares: 150.0,
            ecosystem_type: EcosystemType::Mangrove,
            estimated_sequestration: 75.0,
            owner: company(owner),
            metadata: json!({"planting_density": 2500}),
        }
    }

    #[test]
    fn verification_flow_issues_credits() {
        let service = RegistryService::open(InMemoryEventStore::new()).unwrap();
        let project = service.register_project(mangrove("0xowner")).unwrap();
        let v = service
            .submit_verification(project.id, 68.5, "NCCR", json!({"plots": 4}), "field audit")
            .unwrap();
        let lot = service.approve_verification(v).unwrap();

        assert_eq!(lot.amount, 68.5);
        assert_eq!(lot.price_per_ton, DEFAULT_PRICE_PER_TON);
        assert_eq!(service.read(|r| r.balance(&company("0xowner"))).unwrap(), 68.5);

        let err = service.approve_verification(v).unwrap_err();
        assert!(matches!(err, ServiceError::Registry(RegistryError::AlreadyApproved(_))));
    }

    #[test]
    fn rejected_commands_append_nothing() {
        let store = Arc::new(InMemoryEventStore::new());
        let service = RegistryService::open(Arc::clone(&store)).unwrap();
        let project = service.register_project(mangrove("0xseller")).unwrap();
        let v = service.submit_verification(project.id, 10.0, "v", json!({}), "").unwrap();
        service.approve_verification(v).unwrap();

        let before = store.load_stream(registry_stream_id()).unwrap().len();
        let err = service
            .purchase(company("0xbuyer"), company("0xseller"), 25.0, 50.0)
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Registry(RegistryError::InsufficientCredits { .. })
        ));
        assert_eq!(store.load_stream(registry_stream_id()).unwrap().len(), before);
    }

    #[test]
    fn state_is_rebuilt_from_the_file_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry_events.jsonl");
        {
            let service = RegistryService::open(FileEventStore::open(&path).unwrap())
                .unwrap()
                .with_default_price(42.0);
            let project = service.register_project(mangrove("0xseller")).unwrap();
            let v = service.submit_verification(project.id, 30.0, "v", json!({}), "").unwrap();
            service.approve_verification(v).unwrap();
            service
                .purchase(company("0xbuyer"), company("0xseller"), 12.0, 60.0)
                .unwrap();
            service.record_emissions(company("0xbuyer"), 4.0).unwrap();
        }

        let service = RegistryService::open(FileEventStore::open(&path).unwrap()).unwrap();
        let (seller, buyer, net, version) = service
            .read(|r| {
                (
                    r.balance(&company("0xseller")),
                    r.balance(&company("0xbuyer")),
                    r.net_balance(&company("0xbuyer")),
                    r.version(),
                )
            })
            .unwrap();
        assert_eq!(seller, 18.0);
        assert_eq!(buyer, 12.0);
        assert_eq!(net, 8.0);
        assert_eq!(version, 5);

        // Ids keep counting after replay.
        let next = service.register_project(mangrove("0xseller")).unwrap();
        assert_eq!(next.id, ProjectId::new(2));
    }

    #[test]
    fn history_returns_typed_envelopes() {
        let service = RegistryService::open(InMemoryEventStore::new()).unwrap();
        service.record_emissions(company("0xa"), 1.5).unwrap();
        service.record_emissions(company("0xa"), 2.0).unwrap();

        let history = service.history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].sequence_number(), 2);
        assert_eq!(history[0].event_type(), "registry.emissions.recorded");
        assert!(matches!(history[0].payload(), RegistryEvent::EmissionsRecorded(e) if e.amount_tonnes == 1.5));
    }
}
