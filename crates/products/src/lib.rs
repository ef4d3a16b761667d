//! Product catalog (event-sourced).
//!
//! Deterministic domain logic only: no IO, no HTTP, no storage.

pub mod product;

pub use product::{
    CreateProduct, DeleteProduct, Product, ProductCommand, ProductCreated, ProductDeleted,
    ProductDetails, ProductEvent, ProductId, ProductUpdated, UpdateProduct,
};
