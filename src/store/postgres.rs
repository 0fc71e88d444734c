//! `PostgreSQL` implementation of the document store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    Connection, PgPool, Row,
    postgres::{PgPoolOptions, PgRow},
};
use std::time::Duration;
use tracing::{Instrument, Span, info_span};

use super::{
    BaselineAction, CheckIn, ContentStore, CredentialStore, InsertOutcome, PaymentTransaction,
    Role, SessionRecord, Subscription, TriggerCard, User, Verse,
};

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a small pool; the schema lives in `sql/schema.sql`.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_span(operation: &'static str, statement: &'static str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn user_from_row(row: &PgRow) -> User {
    let role: String = row.get("role");
    User {
        user_id: row.get("user_id"),
        email: row.get("email"),
        name: row.get("name"),
        picture: row.get("picture"),
        password_hash: row.get("password_hash"),
        role: Role::from_stored(&role),
        created_at: row.get("created_at"),
    }
}

fn session_from_row(row: &PgRow) -> SessionRecord {
    SessionRecord {
        user_id: row.get("user_id"),
        session_token: row.get("session_token"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }
}

fn subscription_from_row(row: &PgRow) -> Subscription {
    Subscription {
        subscription_id: row.get("subscription_id"),
        user_id: row.get("user_id"),
        plan: row.get("plan"),
        status: row.get("status"),
        amount: row.get("amount"),
        started_at: row.get("started_at"),
        updated_at: row.get("updated_at"),
    }
}

fn action_from_row(row: &PgRow) -> BaselineAction {
    BaselineAction {
        action_id: row.get("action_id"),
        base_category: row.get("base_category"),
        action_text: row.get("action_text"),
        movement_text: row.get("movement_text"),
        why_it_helps: row.get("why_it_helps"),
        examples: row.get("examples"),
        created_at: row.get("created_at"),
    }
}

fn trigger_from_row(row: &PgRow) -> TriggerCard {
    TriggerCard {
        trigger_id: row.get("trigger_id"),
        trigger_type: row.get("trigger_type"),
        title: row.get("title"),
        immediate_action: row.get("immediate_action"),
        explanation: row.get("explanation"),
        body_truth: row.get("body_truth"),
        verse: row.get("verse"),
        verse_ref: row.get("verse_ref"),
        created_at: row.get("created_at"),
    }
}

fn verse_from_row(row: &PgRow) -> Verse {
    Verse {
        verse_id: row.get("verse_id"),
        verse_text: row.get("verse_text"),
        verse_ref: row.get("verse_ref"),
        category: row.get("category"),
        created_at: row.get("created_at"),
    }
}

fn checkin_from_row(row: &PgRow) -> CheckIn {
    CheckIn {
        check_in_id: row.get("check_in_id"),
        user_id: row.get("user_id"),
        date: row.get("date"),
        signal: row.get("signal"),
        base_category: row.get("base_category"),
        action_id: row.get("action_id"),
        verse_id: row.get("verse_id"),
        generated: row.get("generated"),
        created_at: row.get("created_at"),
    }
}

fn transaction_from_row(row: &PgRow) -> PaymentTransaction {
    PaymentTransaction {
        transaction_id: row.get("transaction_id"),
        session_id: row.get("session_id"),
        user_id: row.get("user_id"),
        email: row.get("email"),
        amount: row.get("amount"),
        currency: row.get("currency"),
        plan: row.get("plan"),
        payment_status: row.get("payment_status"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        const QUERY: &str = "SELECT user_id, email, name, picture, password_hash, role, created_at FROM users WHERE email = $1";
        let row = sqlx::query(QUERY)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", QUERY))
            .await
            .context("failed to lookup user by email")?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>> {
        const QUERY: &str = "SELECT user_id, email, name, picture, password_hash, role, created_at FROM users WHERE user_id = $1";
        let row = sqlx::query(QUERY)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", QUERY))
            .await
            .context("failed to lookup user by id")?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn insert_user(&self, user: &User) -> Result<InsertOutcome> {
        const QUERY: &str = r"
            INSERT INTO users
                (user_id, email, name, picture, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        ";
        let result = sqlx::query(QUERY)
            .bind(&user.user_id)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.picture)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(&user.created_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", QUERY))
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created),
            Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn update_user_profile(
        &self,
        user_id: &str,
        name: &str,
        picture: Option<&str>,
    ) -> Result<()> {
        const QUERY: &str = "UPDATE users SET name = $2, picture = $3 WHERE user_id = $1";
        sqlx::query(QUERY)
            .bind(user_id)
            .bind(name)
            .bind(picture)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", QUERY))
            .await
            .context("failed to update user profile")?;
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool> {
        const QUERY: &str = "DELETE FROM users WHERE user_id = $1";
        let result = sqlx::query(QUERY)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", QUERY))
            .await
            .context("failed to delete user")?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_session(&self, session_token: &str) -> Result<Option<SessionRecord>> {
        const QUERY: &str = r"
            SELECT user_id, session_token, expires_at, created_at
            FROM user_sessions
            WHERE session_token = $1
            ORDER BY id
            LIMIT 1
        ";
        let row = sqlx::query(QUERY)
            .bind(session_token)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", QUERY))
            .await
            .context("failed to lookup session")?;
        Ok(row.as_ref().map(session_from_row))
    }

    async fn insert_session(&self, session: &SessionRecord) -> Result<()> {
        const QUERY: &str = r"
            INSERT INTO user_sessions (user_id, session_token, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
        ";
        sqlx::query(QUERY)
            .bind(&session.user_id)
            .bind(&session.session_token)
            .bind(&session.expires_at)
            .bind(&session.created_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", QUERY))
            .await
            .context("failed to insert session")?;
        Ok(())
    }

    async fn delete_session(&self, session_token: &str) -> Result<bool> {
        const QUERY: &str = r"
            DELETE FROM user_sessions
            WHERE id = (
                SELECT id FROM user_sessions WHERE session_token = $1 ORDER BY id LIMIT 1
            )
        ";
        let result = sqlx::query(QUERY)
            .bind(session_token)
            .execute(&self.pool)
            .instrument(db_span("DELETE", QUERY))
            .await
            .context("failed to delete session")?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_subscription(&self, user_id: &str) -> Result<Option<Subscription>> {
        const QUERY: &str = r"
            SELECT subscription_id, user_id, plan, status, amount, started_at, updated_at
            FROM subscriptions
            WHERE user_id = $1
        ";
        let row = sqlx::query(QUERY)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", QUERY))
            .await
            .context("failed to lookup subscription")?;
        Ok(row.as_ref().map(subscription_from_row))
    }

    async fn upsert_subscription(&self, subscription: &Subscription) -> Result<()> {
        const QUERY: &str = r"
            INSERT INTO subscriptions
                (user_id, subscription_id, plan, status, amount, started_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE SET
                subscription_id = EXCLUDED.subscription_id,
                plan = EXCLUDED.plan,
                status = EXCLUDED.status,
                amount = EXCLUDED.amount,
                started_at = EXCLUDED.started_at,
                updated_at = EXCLUDED.updated_at
        ";
        sqlx::query(QUERY)
            .bind(&subscription.user_id)
            .bind(&subscription.subscription_id)
            .bind(&subscription.plan)
            .bind(&subscription.status)
            .bind(subscription.amount)
            .bind(&subscription.started_at)
            .bind(&subscription.updated_at)
            .execute(&self.pool)
            .instrument(db_span("UPSERT", QUERY))
            .await
            .context("failed to upsert subscription")?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .instrument(info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            ))
            .await
            .context("failed to acquire database connection")?;
        conn.ping()
            .instrument(info_span!(
                "db.ping",
                db.system = "postgresql",
                db.operation = "PING"
            ))
            .await
            .context("failed to ping database")
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn list_actions(&self, base_category: Option<&str>) -> Result<Vec<BaselineAction>> {
        const QUERY: &str = r"
            SELECT action_id, base_category, action_text, movement_text, why_it_helps, examples, created_at
            FROM baseline_actions
            WHERE $1::text IS NULL OR base_category = $1
            ORDER BY created_at
        ";
        let rows = sqlx::query(QUERY)
            .bind(base_category)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", QUERY))
            .await
            .context("failed to list actions")?;
        Ok(rows.iter().map(action_from_row).collect())
    }

    async fn find_action(&self, action_id: &str) -> Result<Option<BaselineAction>> {
        const QUERY: &str = r"
            SELECT action_id, base_category, action_text, movement_text, why_it_helps, examples, created_at
            FROM baseline_actions
            WHERE action_id = $1
        ";
        let row = sqlx::query(QUERY)
            .bind(action_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", QUERY))
            .await
            .context("failed to lookup action")?;
        Ok(row.as_ref().map(action_from_row))
    }

    async fn insert_action(&self, action: &BaselineAction) -> Result<()> {
        const QUERY: &str = r"
            INSERT INTO baseline_actions
                (action_id, base_category, action_text, movement_text, why_it_helps, examples, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        ";
        sqlx::query(QUERY)
            .bind(&action.action_id)
            .bind(&action.base_category)
            .bind(&action.action_text)
            .bind(&action.movement_text)
            .bind(&action.why_it_helps)
            .bind(&action.examples)
            .bind(&action.created_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", QUERY))
            .await
            .context("failed to insert action")?;
        Ok(())
    }

    async fn delete_action(&self, action_id: &str) -> Result<bool> {
        const QUERY: &str = "DELETE FROM baseline_actions WHERE action_id = $1";
        let result = sqlx::query(QUERY)
            .bind(action_id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", QUERY))
            .await
            .context("failed to delete action")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_triggers(&self, trigger_type: Option<&str>) -> Result<Vec<TriggerCard>> {
        const QUERY: &str = r"
            SELECT trigger_id, trigger_type, title, immediate_action, explanation, body_truth, verse, verse_ref, created_at
            FROM trigger_cards
            WHERE $1::text IS NULL OR trigger_type = $1
            ORDER BY created_at
        ";
        let rows = sqlx::query(QUERY)
            .bind(trigger_type)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", QUERY))
            .await
            .context("failed to list trigger cards")?;
        Ok(rows.iter().map(trigger_from_row).collect())
    }

    async fn insert_trigger(&self, trigger: &TriggerCard) -> Result<()> {
        const QUERY: &str = r"
            INSERT INTO trigger_cards
                (trigger_id, trigger_type, title, immediate_action, explanation, body_truth, verse, verse_ref, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ";
        sqlx::query(QUERY)
            .bind(&trigger.trigger_id)
            .bind(&trigger.trigger_type)
            .bind(&trigger.title)
            .bind(&trigger.immediate_action)
            .bind(&trigger.explanation)
            .bind(&trigger.body_truth)
            .bind(&trigger.verse)
            .bind(&trigger.verse_ref)
            .bind(&trigger.created_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", QUERY))
            .await
            .context("failed to insert trigger card")?;
        Ok(())
    }

    async fn delete_trigger(&self, trigger_id: &str) -> Result<bool> {
        const QUERY: &str = "DELETE FROM trigger_cards WHERE trigger_id = $1";
        let result = sqlx::query(QUERY)
            .bind(trigger_id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", QUERY))
            .await
            .context("failed to delete trigger card")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_verses(&self, categories: &[&str]) -> Result<Vec<Verse>> {
        const QUERY: &str = r"
            SELECT verse_id, verse_text, verse_ref, category, created_at
            FROM verses
            WHERE cardinality($1::text[]) = 0 OR category = ANY($1)
            ORDER BY created_at
        ";
        let categories: Vec<String> = categories.iter().map(ToString::to_string).collect();
        let rows = sqlx::query(QUERY)
            .bind(&categories)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", QUERY))
            .await
            .context("failed to list verses")?;
        Ok(rows.iter().map(verse_from_row).collect())
    }

    async fn find_verse(&self, verse_id: &str) -> Result<Option<Verse>> {
        const QUERY: &str = r"
            SELECT verse_id, verse_text, verse_ref, category, created_at
            FROM verses
            WHERE verse_id = $1
        ";
        let row = sqlx::query(QUERY)
            .bind(verse_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", QUERY))
            .await
            .context("failed to lookup verse")?;
        Ok(row.as_ref().map(verse_from_row))
    }

    async fn insert_verse(&self, verse: &Verse) -> Result<()> {
        const QUERY: &str = r"
            INSERT INTO verses (verse_id, verse_text, verse_ref, category, created_at)
            VALUES ($1, $2, $3, $4, $5)
        ";
        sqlx::query(QUERY)
            .bind(&verse.verse_id)
            .bind(&verse.verse_text)
            .bind(&verse.verse_ref)
            .bind(&verse.category)
            .bind(&verse.created_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", QUERY))
            .await
            .context("failed to insert verse")?;
        Ok(())
    }

    async fn delete_verse(&self, verse_id: &str) -> Result<bool> {
        const QUERY: &str = "DELETE FROM verses WHERE verse_id = $1";
        let result = sqlx::query(QUERY)
            .bind(verse_id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", QUERY))
            .await
            .context("failed to delete verse")?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_checkin(&self, checkin: &CheckIn) -> Result<()> {
        const QUERY: &str = r"
            INSERT INTO daily_checkins
                (user_id, date, check_in_id, signal, base_category, action_id, verse_id, generated, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id, date) DO UPDATE SET
                check_in_id = EXCLUDED.check_in_id,
                signal = EXCLUDED.signal,
                base_category = EXCLUDED.base_category,
                action_id = EXCLUDED.action_id,
                verse_id = EXCLUDED.verse_id,
                generated = EXCLUDED.generated,
                created_at = EXCLUDED.created_at
        ";
        sqlx::query(QUERY)
            .bind(&checkin.user_id)
            .bind(&checkin.date)
            .bind(&checkin.check_in_id)
            .bind(&checkin.signal)
            .bind(&checkin.base_category)
            .bind(&checkin.action_id)
            .bind(&checkin.verse_id)
            .bind(&checkin.generated)
            .bind(&checkin.created_at)
            .execute(&self.pool)
            .instrument(db_span("UPSERT", QUERY))
            .await
            .context("failed to upsert check-in")?;
        Ok(())
    }

    async fn find_checkin(&self, user_id: &str, date: &str) -> Result<Option<CheckIn>> {
        const QUERY: &str = r"
            SELECT check_in_id, user_id, date, signal, base_category, action_id, verse_id, generated,
                   created_at
            FROM daily_checkins
            WHERE user_id = $1 AND date = $2
        ";
        let row = sqlx::query(QUERY)
            .bind(user_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", QUERY))
            .await
            .context("failed to lookup check-in")?;
        Ok(row.as_ref().map(checkin_from_row))
    }

    async fn insert_transaction(&self, transaction: &PaymentTransaction) -> Result<()> {
        const QUERY: &str = r"
            INSERT INTO payment_transactions
                (transaction_id, session_id, user_id, email, amount, currency, plan, payment_status, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ";
        sqlx::query(QUERY)
            .bind(&transaction.transaction_id)
            .bind(&transaction.session_id)
            .bind(&transaction.user_id)
            .bind(&transaction.email)
            .bind(transaction.amount)
            .bind(&transaction.currency)
            .bind(&transaction.plan)
            .bind(&transaction.payment_status)
            .bind(&transaction.status)
            .bind(&transaction.created_at)
            .bind(&transaction.updated_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", QUERY))
            .await
            .context("failed to insert payment transaction")?;
        Ok(())
    }

    async fn find_transaction(&self, session_id: &str) -> Result<Option<PaymentTransaction>> {
        const QUERY: &str = r"
            SELECT transaction_id, session_id, user_id, email, amount, currency, plan, payment_status, status, created_at, updated_at
            FROM payment_transactions
            WHERE session_id = $1
        ";
        let row = sqlx::query(QUERY)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", QUERY))
            .await
            .context("failed to lookup payment transaction")?;
        Ok(row.as_ref().map(transaction_from_row))
    }

    async fn update_transaction_status(
        &self,
        session_id: &str,
        payment_status: &str,
        status: &str,
    ) -> Result<()> {
        const QUERY: &str = r"
            UPDATE payment_transactions
            SET payment_status = $2, status = $3, updated_at = $4
            WHERE session_id = $1
        ";
        sqlx::query(QUERY)
            .bind(session_id)
            .bind(payment_status)
            .bind(status)
            .bind(super::models::now_timestamp())
            .execute(&self.pool)
            .instrument(db_span("UPDATE", QUERY))
            .await
            .context("failed to update payment transaction")?;
        Ok(())
    }
}
