//! Value objects: equality by value, not identity.

/// Marker trait for immutable domain values compared by their attributes.
///
/// Entities (products, orders, parties) are compared by id; value objects
/// such as [`crate::Money`] or an order line are compared field by field.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
