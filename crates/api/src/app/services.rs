//! In-memory infrastructure wiring: event store, bus, projections, worker and
//! the user directory.

use std::io;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use stockbook_auth::{AuthError, Hs256Jwt, JwtClaims, JwtValidator, NewUser, Role, UserAccount};
use stockbook_core::{Aggregate, AggregateId, DomainError};
use stockbook_events::{EventEnvelope, InMemoryEventBus};
use stockbook_infra::{
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{InMemoryEventStore, StoredEvent},
    projections::{
        LedgerProjection, OrderReadModel, OrdersProjection, PartyDirectoryProjection,
        PartyReadModel, aggregate_types, ProductCatalogProjection, ProductReadModel, Projection,
        StockLevelReadModel, StockLevelsProjection,
    },
    read_model::{InMemoryReadModelStore, ReadModelStore},
    workers::{ProjectionWorker, WorkerHandle},
};
use stockbook_ledger::{Transaction, TransactionId};
use stockbook_parties::{Party, PartyId, PartyKind};
use stockbook_products::{Product, ProductId};
use stockbook_sales::{Order, OrderId};

use crate::config::ApiConfig;

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Bus>;

pub type ProductsView = ProductCatalogProjection<InMemoryReadModelStore<ProductId, ProductReadModel>>;
pub type StockView = StockLevelsProjection<InMemoryReadModelStore<ProductId, StockLevelReadModel>>;
pub type PartiesView = PartyDirectoryProjection<InMemoryReadModelStore<PartyId, PartyReadModel>>;
pub type OrdersView = OrdersProjection<InMemoryReadModelStore<OrderId, OrderReadModel>>;
pub type LedgerView = LedgerProjection<InMemoryReadModelStore<TransactionId, Transaction>>;

pub struct AppServices {
    dispatcher: Dispatcher,
    pub products: Arc<ProductsView>,
    pub stock: Arc<StockView>,
    pub parties: Arc<PartiesView>,
    pub orders: Arc<OrdersView>,
    pub ledger: Arc<LedgerView>,
    /// Accounts keyed by normalized e-mail.
    users: InMemoryReadModelStore<String, UserAccount>,
    /// Serializes registrations so an e-mail cannot be taken twice.
    registration: Mutex<()>,
    jwt: Arc<Hs256Jwt>,
    token_ttl: Duration,
    pub low_stock_default: i64,
    _worker: WorkerHandle,
}

impl AppServices {
    pub fn build(config: &ApiConfig) -> io::Result<Self> {
        let store = Arc::new(InMemoryEventStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());

        let products: Arc<ProductsView> = Arc::new(ProductCatalogProjection::new(InMemoryReadModelStore::new()));
        let stock: Arc<StockView> = Arc::new(StockLevelsProjection::new(InMemoryReadModelStore::new()));
        let parties: Arc<PartiesView> = Arc::new(PartyDirectoryProjection::new(InMemoryReadModelStore::new()));
        let orders: Arc<OrdersView> = Arc::new(OrdersProjection::new(InMemoryReadModelStore::new()));
        let ledger: Arc<LedgerView> = Arc::new(LedgerProjection::new(InMemoryReadModelStore::new()));

        // Subscribe before the dispatcher can publish anything.
        let worker = ProjectionWorker::spawn_projections(
            "stockbook-projections",
            bus.clone(),
            vec![
                products.clone() as Arc<dyn Projection>,
                stock.clone() as Arc<dyn Projection>,
                parties.clone() as Arc<dyn Projection>,
                orders.clone() as Arc<dyn Projection>,
                ledger.clone() as Arc<dyn Projection>,
            ],
        )?;

        Ok(Self {
            dispatcher: CommandDispatcher::new(store, bus),
            products,
            stock,
            parties,
            orders,
            ledger,
            users: InMemoryReadModelStore::new(),
            registration: Mutex::new(()),
            jwt: Arc::new(Hs256Jwt::new(config.jwt_secret.as_bytes())),
            token_ttl: config.token_ttl(),
            low_stock_default: config.low_stock_default,
            _worker: worker,
        })
    }

    pub fn jwt_validator(&self) -> Arc<dyn JwtValidator> {
        self.jwt.clone()
    }

    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &'static str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: stockbook_events::Event + Serialize + DeserializeOwned,
    {
        self.dispatcher
            .dispatch(aggregate_id, aggregate_type, command, make_aggregate)
    }

    /// Product that exists and is not deleted (read from its stream).
    pub fn live_product(&self, id: ProductId) -> Result<Product, DispatchError> {
        let product = self
            .dispatcher
            .load(id.0, aggregate_types::PRODUCT, |a| Product::empty(ProductId::new(a)))?;
        if product.details().is_none() || product.is_deleted() {
            return Err(DispatchError::NotFound);
        }
        Ok(product)
    }

    /// Active party of `kind` (read from its stream).
    pub fn live_party(&self, id: PartyId, kind: PartyKind) -> Result<Party, DispatchError> {
        let party = self
            .dispatcher
            .load(id.0, aggregate_types::PARTY, |a| Party::empty(PartyId::new(a)))?;
        if !party.is_active() || party.kind() != kind {
            return Err(DispatchError::NotFound);
        }
        Ok(party)
    }

    /// Order that is placed and not deleted (read from its stream).
    pub fn live_order(&self, id: OrderId) -> Result<Order, DispatchError> {
        let order = self
            .dispatcher
            .load(id.0, aggregate_types::ORDER, |a| Order::empty(OrderId::new(a)))?;
        if !order.is_live() {
            return Err(DispatchError::NotFound);
        }
        Ok(order)
    }

    /// Create an account. The e-mail must be unused.
    ///
    /// Hashing runs on the blocking pool; only the uniqueness check and the
    /// insert happen under the registration lock.
    pub async fn register_user(&self, new: NewUser) -> Result<UserAccount, RegistrationError> {
        new.validate()?;
        let email = UserAccount::normalize_email(&new.email);
        if self.users.get(&email).is_some() {
            return Err(RegistrationError::EmailTaken);
        }

        let account =
            tokio::task::spawn_blocking(move || UserAccount::register(&new, Role::User, Utc::now()))
                .await
                .map_err(|_| RegistrationError::Unavailable)??;
        self.insert_user(email, account)
    }

    fn insert_user(&self, email: String, account: UserAccount) -> Result<UserAccount, RegistrationError> {
        let _guard = self
            .registration
            .lock()
            .map_err(|_| RegistrationError::Unavailable)?;
        if self.users.get(&email).is_some() {
            return Err(RegistrationError::EmailTaken);
        }
        self.users.upsert(email, account.clone());
        Ok(account)
    }

    pub async fn authenticate(&self, email: &str, password: String) -> Result<UserAccount, AuthError> {
        let account = self
            .users
            .get(&UserAccount::normalize_email(email))
            .ok_or(AuthError::InvalidCredentials)?;
        tokio::task::spawn_blocking(move || account.check_password(&password).map(|()| account))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))?
    }

    pub fn user(&self, email: &str) -> Option<UserAccount> {
        self.users.get(&UserAccount::normalize_email(email))
    }

    pub fn issue_token(&self, account: &UserAccount) -> Result<String, AuthError> {
        let now = Utc::now();
        self.jwt.issue(&JwtClaims {
            sub: account.id,
            email: account.email.clone(),
            role: account.role,
            iat: now,
            exp: now
                .checked_add_signed(self.token_ttl)
                .ok_or_else(|| AuthError::Encoding("token expiry out of range".to_string()))?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error("e-mail already registered")]
    EmailTaken,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("user directory unavailable")]
    Unavailable,
}
