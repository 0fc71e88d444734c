//! Document store abstraction.
//!
//! Handlers only perform exact-match lookups and single-collection writes, so
//! the store is modelled as a pair of narrow traits. `PgStore` is the
//! production backend; `MemoryStore` backs tests and `--dsn memory://` runs.

pub mod memory;
pub mod models;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub use memory::MemoryStore;
pub use models::{
    BaselineAction, CheckIn, PaymentTransaction, Role, SessionRecord, Subscription, TriggerCard,
    User, Verse,
};
pub use postgres::PgStore;

/// Outcome of inserting a user keyed by a unique email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    Conflict,
}

/// Users, sessions and subscriptions: everything the auth gate reads.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>>;
    async fn insert_user(&self, user: &User) -> Result<InsertOutcome>;
    /// Refresh display fields; role and credentials are never touched.
    async fn update_user_profile(
        &self,
        user_id: &str,
        name: &str,
        picture: Option<&str>,
    ) -> Result<()>;
    async fn delete_user(&self, user_id: &str) -> Result<bool>;

    async fn find_session(&self, session_token: &str) -> Result<Option<SessionRecord>>;
    async fn insert_session(&self, session: &SessionRecord) -> Result<()>;
    async fn delete_session(&self, session_token: &str) -> Result<bool>;

    async fn find_subscription(&self, user_id: &str) -> Result<Option<Subscription>>;
    /// Replace the user's current subscription (one per user, no history).
    async fn upsert_subscription(&self, subscription: &Subscription) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}

/// Wellness content, check-ins and payment bookkeeping.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn list_actions(&self, base_category: Option<&str>) -> Result<Vec<BaselineAction>>;
    async fn find_action(&self, action_id: &str) -> Result<Option<BaselineAction>>;
    async fn insert_action(&self, action: &BaselineAction) -> Result<()>;
    async fn delete_action(&self, action_id: &str) -> Result<bool>;

    async fn list_triggers(&self, trigger_type: Option<&str>) -> Result<Vec<TriggerCard>>;
    async fn insert_trigger(&self, trigger: &TriggerCard) -> Result<()>;
    async fn delete_trigger(&self, trigger_id: &str) -> Result<bool>;

    /// Verses in any of `categories`; an empty slice lists everything.
    async fn list_verses(&self, categories: &[&str]) -> Result<Vec<Verse>>;
    async fn find_verse(&self, verse_id: &str) -> Result<Option<Verse>>;
    async fn insert_verse(&self, verse: &Verse) -> Result<()>;
    async fn delete_verse(&self, verse_id: &str) -> Result<bool>;

    /// Insert or overwrite the check-in for `(user_id, date)`.
    async fn upsert_checkin(&self, checkin: &CheckIn) -> Result<()>;
    async fn find_checkin(&self, user_id: &str, date: &str) -> Result<Option<CheckIn>>;

    async fn insert_transaction(&self, transaction: &PaymentTransaction) -> Result<()>;
    async fn find_transaction(&self, session_id: &str) -> Result<Option<PaymentTransaction>>;
    async fn update_transaction_status(
        &self,
        session_id: &str,
        payment_status: &str,
        status: &str,
    ) -> Result<()>;
}

pub trait Store: CredentialStore + ContentStore {}

impl<T: CredentialStore + ContentStore> Store for T {}

pub type DynStore = Arc<dyn Store>;

/// Open the store named by `dsn`: `memory://` or a Postgres URL.
///
/// # Errors
/// Returns an error if the Postgres pool cannot be created.
pub async fn connect(dsn: &str) -> Result<DynStore> {
    if dsn.starts_with("memory://") {
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = PgStore::connect(dsn).await?;
    Ok(Arc::new(store))
}
