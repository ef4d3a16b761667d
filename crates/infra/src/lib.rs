//! Infrastructure layer: event store, command dispatch, read models and
//! the projection worker that keeps them current.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod workers;


pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent};
pub use read_model::{InMemoryReadModelStore, ReadModelStore};
pub use workers::{ProjectionWorker, WorkerHandle};
