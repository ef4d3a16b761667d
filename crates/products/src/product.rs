use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, validate};
use stockbook_events::Event;

/// Product identifier. Also identifies the product's stock item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Editable catalog attributes of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub image_url: Option<String>,
}

impl ProductDetails {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate::non_blank("sku", &self.sku)?;
        validate::min_len("name", &self.name, 2)?;
        if !self.price.is_positive() {
            return Err(DomainError::validation("price must be greater than zero"));
        }
        if let Some(url) = &self.image_url {
            validate::http_url("image_url", url)?;
        }
        Ok(())
    }

    /// Trimmed copy; blank optional strings collapse to `None`.
    fn normalized(&self) -> Self {
        let opt = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            sku: self.sku.trim().to_string(),
            name: self.name.trim().to_string(),
            description: opt(&self.description),
            price: self.price,
            image_url: opt(&self.image_url),
        }
    }
}

/// Aggregate root: Product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    details: Option<ProductDetails>,
    deleted: bool,
    version: u64,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            details: None,
            deleted: false,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn details(&self) -> Option<&ProductDetails> {
        self.details.as_ref()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn is_live(&self) -> bool {
        self.details.is_some() && !self.deleted
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Replaces every editable attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub product_id: ProductId,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    UpdateProduct(UpdateProduct),
    DeleteProduct(DeleteProduct),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdated {
    pub product_id: ProductId,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDeleted {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductUpdated(ProductUpdated),
    ProductDeleted(ProductDeleted),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "products.product.created",
            ProductEvent::ProductUpdated(_) => "products.product.updated",
            ProductEvent::ProductDeleted(_) => "products.product.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductUpdated(e) => e.occurred_at,
            ProductEvent::ProductDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.details = Some(e.details.clone());
            }
            ProductEvent::ProductUpdated(e) => {
                self.details = Some(e.details.clone());
            }
            ProductEvent::ProductDeleted(_) => {
                self.deleted = true;
            }
        }

        // +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::UpdateProduct(cmd) => self.handle_update(cmd),
            ProductCommand::DeleteProduct(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Product {
    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.is_live() {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.details.is_some() {
            return Err(DomainError::conflict("product already exists"));
        }
        let details = cmd.details.normalized();
        details.validate()?;

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            product_id: cmd.product_id,
            details,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_product_id(cmd.product_id)?;
        let details = cmd.details.normalized();
        details.validate()?;

        Ok(vec![ProductEvent::ProductUpdated(ProductUpdated {
            product_id: cmd.product_id,
            details,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_product_id(cmd.product_id)?;

        Ok(vec![ProductEvent::ProductDeleted(ProductDeleted {
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn details(name: &str, price: Money) -> ProductDetails {
        ProductDetails {
            sku: "SKU-001".to_string(),
            name: name.to_string(),
            description: None,
            price,
            image_url: None,
        }
    }

    fn created(id: ProductId) -> Product {
        let mut product = Product::empty(id);
        let events = product
            .handle(&ProductCommand::CreateProduct(CreateProduct {
                product_id: id,
                details: details("Widget", Money::new(dec!(10.00))),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            product.apply(e);
        }
        product
    }

    #[test]
    fn create_emits_product_created_with_trimmed_details() {
        let id = test_product_id();
        let product = Product::empty(id);
        let mut d = details("  Widget  ", Money::new(dec!(10.00)));
        d.description = Some("   ".to_string());

        let events = product
            .handle(&ProductCommand::CreateProduct(CreateProduct {
                product_id: id,
                details: d,
                occurred_at: Utc::now(),
            }))
            .unwrap();

        match &events[..] {
            [ProductEvent::ProductCreated(e)] => {
                assert_eq!(e.product_id, id);
                assert_eq!(e.details.name, "Widget");
                assert_eq!(e.details.description, None);
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn create_rejects_non_positive_price_and_short_name() {
        let id = test_product_id();
        let product = Product::empty(id);
        for d in [
            details("Widget", Money::zero()),
            details("W", Money::new(dec!(1))),
        ] {
            let err = product
                .handle(&ProductCommand::CreateProduct(CreateProduct {
                    product_id: id,
                    details: d,
                    occurred_at: Utc::now(),
                }))
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
    }

    #[test]
    fn create_rejects_non_http_image_url() {
        let id = test_product_id();
        let mut d = details("Widget", Money::new(dec!(1)));
        d.image_url = Some("ftp://files/x.png".to_string());
        let err = Product::empty(id)
            .handle(&ProductCommand::CreateProduct(CreateProduct {
                product_id: id,
                details: d,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn creating_twice_is_a_conflict() {
        let id = test_product_id();
        let product = created(id);
        let err = product
            .handle(&ProductCommand::CreateProduct(CreateProduct {
                product_id: id,
                details: details("Other", Money::new(dec!(2))),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn update_replaces_details() {
        let id = test_product_id();
        let mut product = created(id);
        let events = product
            .handle(&ProductCommand::UpdateProduct(UpdateProduct {
                product_id: id,
                details: details("Gadget", Money::new(dec!(12.50))),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        product.apply(&events[0]);

        let d = product.details().unwrap();
        assert_eq!(d.name, "Gadget");
        assert_eq!(d.price, Money::new(dec!(12.50)));
        assert_eq!(product.version(), 2);
    }

    #[test]
    fn deleted_product_rejects_everything() {
        let id = test_product_id();
        let mut product = created(id);
        let events = product
            .handle(&ProductCommand::DeleteProduct(DeleteProduct {
                product_id: id,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        product.apply(&events[0]);
        assert!(product.is_deleted());

        let err = product
            .handle(&ProductCommand::DeleteProduct(DeleteProduct {
                product_id: id,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);

        let err = product
            .handle(&ProductCommand::UpdateProduct(UpdateProduct {
                product_id: id,
                details: details("Gadget", Money::new(dec!(1))),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn unknown_product_is_not_found() {
        let id = test_product_id();
        let err = Product::empty(id)
            .handle(&ProductCommand::DeleteProduct(DeleteProduct {
                product_id: id,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Handle never mutates state and yields the same events each time.
            #[test]
            fn handle_is_pure(
                name in "[A-Za-z][A-Za-z0-9 ]{1,40}",
                cents in 1i64..10_000_000i64,
            ) {
                let id = test_product_id();
                let product = created(id);
                let before = product.clone();
                let cmd = ProductCommand::UpdateProduct(UpdateProduct {
                    product_id: id,
                    details: details(&name, Money::new(rust_decimal::Decimal::new(cents, 2))),
                    occurred_at: Utc::now(),
                });

                let first = product.handle(&cmd);
                let second = product.handle(&cmd);

                prop_assert_eq!(&before, &product);
                prop_assert_eq!(first, second);
            }
        }
    }
}
