use std::collections::HashMap;
use std::sync::RwLock;

use carbonsense_core::{AggregateId, ExpectedVersion};

use super::r#trait::{
    commit_batch, validate_batch, EventStore, EventStoreError, StoredEvent, UncommittedEvent,
};

/// In-memory append-only event store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<AggregateId, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some((aggregate_id, aggregate_type)) = validate_batch(&events)? else {
            return Ok(vec![]);
        };

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        let stream = streams.entry(aggregate_id).or_default();
        let committed = commit_batch(stream, &aggregate_type, events, expected_version)?;
        stream.extend(committed.iter().cloned());

        Ok(committed)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(streams.get(&aggregate_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn event(aggregate_id: AggregateId, aggregate_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: "registry.emissions.recorded".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({}),
        }
    }

    #[test]
    fn assigns_contiguous_sequence_numbers() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        store
            .append(vec![event(id, "registry"), event(id, "registry")], ExpectedVersion::Exact(0))
            .unwrap();
        let more = store
            .append(vec![event(id, "registry")], ExpectedVersion::Exact(2))
            .unwrap();
        assert_eq!(more[0].sequence_number, 3);
        assert_eq!(store.load_stream(id).unwrap().len(), 3);
        assert!(store.load_stream(AggregateId::new()).unwrap().is_empty());
    }

    #[test]
    fn stale_expected_version_is_rejected() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        store.append(vec![event(id, "registry")], ExpectedVersion::Any).unwrap();
        let err = store
            .append(vec![event(id, "registry")], ExpectedVersion::Exact(0))
            .unwrap_err();
        let EventStoreError::Concurrency(message) = err else {
            panic!("expected concurrency error, got {err:?}");
        };
        assert!(message.contains("actual: 1"), "{message}");
        assert_eq!(store.load_stream(id).unwrap().len(), 1);
    }

    #[test]
    fn mixed_batches_and_type_changes_are_rejected() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        let err = store
            .append(vec![event(id, "registry"), event(AggregateId::new(), "registry")], ExpectedVersion::Any)
            .unwrap_err();
        assert!(matches!(err, EventStoreError::InvalidAppend(_)));

        store.append(vec![event(id, "registry")], ExpectedVersion::Any).unwrap();
        let err = store
            .append(vec![event(id, "ledger")], ExpectedVersion::Any)
            .unwrap_err();
        assert!(matches!(err, EventStoreError::AggregateTypeMismatch(_)));
    }
}
