use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use stockbook_core::Money;
use stockbook_events::EventEnvelope;
use stockbook_products::{ProductDetails, ProductEvent, ProductId};

use crate::projections::cursor::{Projection, ProjectionError, StreamCursors, decode, ensure_stream};
use crate::projections::aggregate_types;
use crate::read_model::ReadModelStore;

/// Queryable product read model (catalog).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductReadModel {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductReadModel {
    fn from_details(
        product_id: ProductId,
        details: ProductDetails,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            product_id,
            sku: details.sku,
            name: details.name,
            description: details.description,
            price: details.price,
            image_url: details.image_url,
            created_at,
            updated_at,
        }
    }
}

#[derive(Debug)]
pub struct ProductCatalogProjection<S>
where
    S: ReadModelStore<ProductId, ProductReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> ProductCatalogProjection<S>
where
    S: ReadModelStore<ProductId, ProductReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, product_id: &ProductId) -> Option<ProductReadModel> {
        self.store.get(product_id)
    }

    pub fn list(&self) -> Vec<ProductReadModel> {
        self.store.list()
    }
}

impl<S> Projection for ProductCatalogProjection<S>
where
    S: ReadModelStore<ProductId, ProductReadModel>,
{
    fn name(&self) -> &'static str {
        "products.catalog"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::PRODUCT {
            return Ok(());
        }
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: ProductEvent = decode(envelope)?;
        let product_id = match &ev {
            ProductEvent::ProductCreated(e) => e.product_id,
            ProductEvent::ProductUpdated(e) => e.product_id,
            ProductEvent::ProductDeleted(e) => e.product_id,
        };
        ensure_stream(envelope, product_id.0)?;

        match ev {
            ProductEvent::ProductCreated(e) => {
                self.store.upsert(
                    e.product_id,
                    ProductReadModel::from_details(e.product_id, e.details, e.occurred_at, e.occurred_at),
                );
            }
            ProductEvent::ProductUpdated(e) => {
                let created_at = self
                    .store
                    .get(&e.product_id)
                    .map(|rm| rm.created_at)
                    .unwrap_or(e.occurred_at);
                self.store.upsert(
                    e.product_id,
                    ProductReadModel::from_details(e.product_id, e.details, created_at, e.occurred_at),
                );
            }
            ProductEvent::ProductDeleted(e) => {
                self.store.remove(&e.product_id);
            }
        }

        self.cursors.advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}
