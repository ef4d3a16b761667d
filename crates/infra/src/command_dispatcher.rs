//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the aggregate's stream from the store
//!   ↓
//! 2. Rehydrate (apply historical events)
//!   ↓
//! 3. Handle the command (pure decision, produces events)
//!   ↓
//! 4. Append (optimistic concurrency check on the loaded version)
//!   ↓
//! 5. Publish committed events on the bus
//! ```
//!
//! The dispatcher does no IO itself; it composes `EventStore` and `EventBus`.

use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use stockbook_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use stockbook_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Stale aggregate version (someone else appended first).
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// Duplicate creation or a similar domain-level conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("not found")]
    NotFound,

    /// Historical payloads could not be decoded into the aggregate event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error("event store error: {0}")]
    Store(EventStoreError),

    /// Publication failed after a successful append (at-least-once; a retry may duplicate).
    #[error("failed to publish event: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
            DomainError::InvalidInput(msg) => DispatchError::InvalidInput(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Conflict(msg),
            DomainError::NotFound => DispatchError::NotFound,
        }
    }
}

/// Reusable command execution engine.
///
/// Events are appended before they are published: if the append fails nothing
/// reaches the bus. If publishing fails after the append the error is returned
/// and the events stay committed.
///
/// Append and publish happen under one commit lock, so every stream reaches
/// the bus in sequence order even when commands on the same aggregate race.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
    commit: Mutex<()>,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            commit: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Rehydrate the current state of `aggregate_id` straight from its stream.
    ///
    /// Unlike projections this never lags behind committed commands.
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_type, aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    /// Run `command` against the aggregate `aggregate_id`.
    ///
    /// `make_aggregate` builds the empty instance that history is applied to
    /// (e.g. `|id| Product::empty(ProductId::new(id))`). Returns the committed
    /// events with their sequence numbers; an empty vector if the command
    /// decided nothing.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: stockbook_events::Event + Serialize + DeserializeOwned,
    {
        let aggregate_type = aggregate_type.into();
        let history = self.store.load_stream(&aggregate_type, aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(aggregate_id, aggregate_type.clone(), Uuid::now_v7(), ev)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let _commit = self
            .commit
            .lock()
            .map_err(|_| EventStoreError::Unavailable("commit lock poisoned".to_string()))?;
        let committed = self.store.append(uncommitted, expected)?;

        for stored in &committed {
            debug!(
                aggregate_id = %stored.aggregate_id,
                aggregate_type = %stored.aggregate_type,
                event_type = %stored.event_type,
                sequence_number = stored.sequence_number,
                "event committed"
            );
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    use stockbook_core::Money;
    use stockbook_events::InMemoryEventBus;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use stockbook_events::Subscription;
    use stockbook_products::{
        CreateProduct, DeleteProduct, Product, ProductCommand, ProductDetails, ProductId,
        UpdateProduct,
    };

    use crate::event_store::InMemoryEventStore;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

    fn dispatcher() -> (CommandDispatcher<Arc<InMemoryEventStore>, Bus>, Bus) {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        (
            CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), bus.clone()),
            bus,
        )
    }

    fn create(product_id: ProductId) -> ProductCommand {
        ProductCommand::CreateProduct(CreateProduct {
            product_id,
            details: ProductDetails {
                sku: "SKU-1".to_string(),
                name: "Widget".to_string(),
                description: None,
                price: Money::new(dec!(9.90)),
                image_url: None,
            },
            occurred_at: Utc::now(),
        })
    }

    fn run(
        d: &CommandDispatcher<Arc<InMemoryEventStore>, Bus>,
        product_id: ProductId,
        cmd: ProductCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        d.dispatch(product_id.0, "products.product", cmd, |id| {
            Product::empty(ProductId::new(id))
        })
    }

    #[test]
    fn committed_events_are_published_in_order() {
        let (d, bus) = dispatcher();
        let sub = bus.subscribe();
        let product_id = ProductId::new(AggregateId::new());

        run(&d, product_id, create(product_id)).unwrap();
        let committed = run(
            &d,
            product_id,
            ProductCommand::DeleteProduct(DeleteProduct {
                product_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        assert_eq!(committed[0].sequence_number, 2);
        assert_eq!(sub.try_recv().unwrap().sequence_number(), 1);
        assert_eq!(sub.try_recv().unwrap().sequence_number(), 2);
    }

    #[test]
    fn domain_errors_are_mapped_and_nothing_is_appended() {
        let (d, bus) = dispatcher();
        let sub = bus.subscribe();
        let product_id = ProductId::new(AggregateId::new());

        run(&d, product_id, create(product_id)).unwrap();
        let _ = sub.try_recv();

        let err = run(&d, product_id, create(product_id)).unwrap_err();
        assert!(matches!(err, DispatchError::Conflict(_)));
        assert!(sub.try_recv().is_err());
        assert_eq!(d.store().load_stream("products.product", product_id.0).unwrap().len(), 1);
    }

    #[test]
    fn load_rehydrates_without_appending() {
        let (d, _bus) = dispatcher();
        let product_id = ProductId::new(AggregateId::new());
        run(&d, product_id, create(product_id)).unwrap();

        let product = d
            .load(product_id.0, "products.product", |id| Product::empty(ProductId::new(id)))
            .unwrap();
        assert_eq!(product.details().map(|p| p.name.as_str()), Some("Widget"));
        assert!(!product.is_deleted());
        assert_eq!(d.store().load_stream("products.product", product_id.0).unwrap().len(), 1);
    }

    #[test]
    fn unknown_aggregate_is_not_found() {
        let (d, _bus) = dispatcher();
        let product_id = ProductId::new(AggregateId::new());
        let err = run(
            &d,
            product_id,
            ProductCommand::DeleteProduct(DeleteProduct {
                product_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound));
    }

    /// Records publish order and stalls on sequence 2, leaving room for a
    /// racing command to overtake it.
    #[derive(Default)]
    struct StallingBus {
        published: Mutex<Vec<u64>>,
    }

    impl EventBus<EventEnvelope<JsonValue>> for StallingBus {
        type Error = ();

        fn publish(&self, message: EventEnvelope<JsonValue>) -> Result<(), ()> {
            if message.sequence_number() == 2 {
                thread::sleep(Duration::from_millis(50));
            }
            self.published.lock().unwrap().push(message.sequence_number());
            Ok(())
        }

        fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
            let (_tx, rx) = mpsc::channel();
            Subscription::new(rx)
        }
    }

    #[test]
    fn racing_commands_on_one_stream_publish_in_sequence_order() {
        let bus = Arc::new(StallingBus::default());
        let store = Arc::new(InMemoryEventStore::new());
        let d = Arc::new(CommandDispatcher::new(store.clone(), bus.clone()));
        let product_id = ProductId::new(AggregateId::new());

        d.dispatch(product_id.0, "products.product", create(product_id), |id| {
            Product::empty(ProductId::new(id))
        })
        .unwrap();

        let update = move |d: Arc<CommandDispatcher<Arc<InMemoryEventStore>, Arc<StallingBus>>>,
                           name: &'static str| {
            let ProductCommand::CreateProduct(created) = create(product_id) else {
                unreachable!()
            };
            let mut details = created.details;
            details.name = name.to_string();
            loop {
                let cmd = ProductCommand::UpdateProduct(UpdateProduct {
                    product_id,
                    details: details.clone(),
                    occurred_at: Utc::now(),
                });
                match d.dispatch(product_id.0, "products.product", cmd, |id| {
                    Product::empty(ProductId::new(id))
                }) {
                    Err(DispatchError::Concurrency(_)) => continue,
                    other => return other.map(|_| ()),
                }
            }
        };

        let first = {
            let d = d.clone();
            thread::spawn(move || update(d, "First"))
        };
        thread::sleep(Duration::from_millis(10));
        let second = {
            let d = d.clone();
            thread::spawn(move || update(d, "Second"))
        };
        first.join().unwrap().unwrap();
        second.join().unwrap().unwrap();

        let stored = store.load_stream("products.product", product_id.0).unwrap();
        let published = bus.published.lock().unwrap().clone();
        assert_eq!(published, vec![1, 2, 3]);
        assert_eq!(stored.last().map(|e| e.sequence_number), Some(3));
    }
}
