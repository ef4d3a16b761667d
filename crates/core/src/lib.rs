//! `stockbook-core`: domain building blocks shared by every bounded context.
//!
//! Pure domain primitives only; nothing in here performs IO.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;
pub mod validate;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, UserId};
pub use money::Money;
pub use value_object::ValueObject;
