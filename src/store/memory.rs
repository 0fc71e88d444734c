//! In-process store used by the test suite and `memory://` runs.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{
    BaselineAction, CheckIn, ContentStore, CredentialStore, InsertOutcome, PaymentTransaction,
    SessionRecord, Subscription, TriggerCard, User, Verse,
};

#[derive(Default)]
struct Collections {
    users: Vec<User>,
    sessions: Vec<SessionRecord>,
    subscriptions: HashMap<String, Subscription>,
    actions: Vec<BaselineAction>,
    triggers: Vec<TriggerCard>,
    verses: Vec<Verse>,
    checkins: HashMap<(String, String), CheckIn>,
    transactions: Vec<PaymentTransaction>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of session rows, including expired ones.
    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    /// Number of check-in rows across all users and days.
    pub async fn checkin_count(&self) -> usize {
        self.inner.read().await.checkins.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|user| user.email == email).cloned())
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .iter()
            .find(|user| user.user_id == user_id)
            .cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<InsertOutcome> {
        let mut inner = self.inner.write().await;
        if inner.users.iter().any(|existing| existing.email == user.email) {
            return Ok(InsertOutcome::Conflict);
        }
        inner.users.push(user.clone());
        Ok(InsertOutcome::Created)
    }

    async fn update_user_profile(
        &self,
        user_id: &str,
        name: &str,
        picture: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(user) = inner.users.iter_mut().find(|user| user.user_id == user_id) {
            user.name = name.to_string();
            user.picture = picture.map(str::to_string);
        }
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.users.len();
        inner.users.retain(|user| user.user_id != user_id);
        Ok(inner.users.len() != before)
    }

    async fn find_session(&self, session_token: &str) -> Result<Option<SessionRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .iter()
            .find(|session| session.session_token == session_token)
            .cloned())
    }

    async fn insert_session(&self, session: &SessionRecord) -> Result<()> {
        self.inner.write().await.sessions.push(session.clone());
        Ok(())
    }

    async fn delete_session(&self, session_token: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        // Matches a single-document delete: only the first row goes.
        let position = inner
            .sessions
            .iter()
            .position(|session| session.session_token == session_token);
        Ok(position.map(|index| inner.sessions.remove(index)).is_some())
    }

    async fn find_subscription(&self, user_id: &str) -> Result<Option<Subscription>> {
        Ok(self.inner.read().await.subscriptions.get(user_id).cloned())
    }

    async fn upsert_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.inner
            .write()
            .await
            .subscriptions
            .insert(subscription.user_id.clone(), subscription.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn list_actions(&self, base_category: Option<&str>) -> Result<Vec<BaselineAction>> {
        let inner = self.inner.read().await;
        Ok(inner
            .actions
            .iter()
            .filter(|action| base_category.is_none_or(|c| action.base_category == c))
            .cloned()
            .collect())
    }

    async fn find_action(&self, action_id: &str) -> Result<Option<BaselineAction>> {
        let inner = self.inner.read().await;
        Ok(inner
            .actions
            .iter()
            .find(|action| action.action_id == action_id)
            .cloned())
    }

    async fn insert_action(&self, action: &BaselineAction) -> Result<()> {
        self.inner.write().await.actions.push(action.clone());
        Ok(())
    }

    async fn delete_action(&self, action_id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.actions.len();
        inner.actions.retain(|action| action.action_id != action_id);
        Ok(inner.actions.len() != before)
    }

    async fn list_triggers(&self, trigger_type: Option<&str>) -> Result<Vec<TriggerCard>> {
        let inner = self.inner.read().await;
        Ok(inner
            .triggers
            .iter()
            .filter(|trigger| trigger_type.is_none_or(|t| trigger.trigger_type == t))
            .cloned()
            .collect())
    }

    async fn insert_trigger(&self, trigger: &TriggerCard) -> Result<()> {
        self.inner.write().await.triggers.push(trigger.clone());
        Ok(())
    }

    async fn delete_trigger(&self, trigger_id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.triggers.len();
        inner
            .triggers
            .retain(|trigger| trigger.trigger_id != trigger_id);
        Ok(inner.triggers.len() != before)
    }

    async fn list_verses(&self, categories: &[&str]) -> Result<Vec<Verse>> {
        let inner = self.inner.read().await;
        Ok(inner
            .verses
            .iter()
            .filter(|verse| {
                categories.is_empty() || categories.contains(&verse.category.as_str())
            })
            .cloned()
            .collect())
    }

    async fn find_verse(&self, verse_id: &str) -> Result<Option<Verse>> {
        let inner = self.inner.read().await;
        Ok(inner
            .verses
            .iter()
            .find(|verse| verse.verse_id == verse_id)
            .cloned())
    }

    async fn insert_verse(&self, verse: &Verse) -> Result<()> {
        self.inner.write().await.verses.push(verse.clone());
        Ok(())
    }

    async fn delete_verse(&self, verse_id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.verses.len();
        inner.verses.retain(|verse| verse.verse_id != verse_id);
        Ok(inner.verses.len() != before)
    }

    async fn upsert_checkin(&self, checkin: &CheckIn) -> Result<()> {
        let key = (checkin.user_id.clone(), checkin.date.clone());
        self.inner.write().await.checkins.insert(key, checkin.clone());
        Ok(())
    }

    async fn find_checkin(&self, user_id: &str, date: &str) -> Result<Option<CheckIn>> {
        let key = (user_id.to_string(), date.to_string());
        Ok(self.inner.read().await.checkins.get(&key).cloned())
    }

    async fn insert_transaction(&self, transaction: &PaymentTransaction) -> Result<()> {
        self.inner
            .write()
            .await
            .transactions
            .push(transaction.clone());
        Ok(())
    }

    async fn find_transaction(&self, session_id: &str) -> Result<Option<PaymentTransaction>> {
        let inner = self.inner.read().await;
        Ok(inner
            .transactions
            .iter()
            .find(|transaction| transaction.session_id == session_id)
            .cloned())
    }

    async fn update_transaction_status(
        &self,
        session_id: &str,
        payment_status: &str,
        status: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(transaction) = inner
            .transactions
            .iter_mut()
            .find(|transaction| transaction.session_id == session_id)
        {
            transaction.payment_status = payment_status.to_string();
            transaction.status = Some(status.to_string());
            transaction.updated_at = Some(super::models::now_timestamp());
        }
        Ok(())
    }
}
