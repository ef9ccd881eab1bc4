//! PostgreSQL implementation of the repositories.
//!
//! Queries are plain `sqlx::query` strings against the layout in `schema.sql`.
//! Enum columns (tier, status, token kind) are stored as TEXT.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};

use super::errors::{StoreError, StoreResult};
use super::repository::{
    AccountRepository, AuthTokenRepository, ContactRepository, PaymentEventRepository,
    PreferencesRepository, QuestionRepository, StoreHealth, StudySessionRepository,
    TemplateRepository, UserRepository,
};
use crate::auth::{AuthToken, TokenKind};
use crate::contact::ContactMessage;
use crate::identity::{GuestAccount, Principal, PrincipalRef, UserAccount};
use crate::payment::PaymentEventRecord;
use crate::preferences::Preferences;
use crate::questions::Question;
use crate::study::StudySession;
use crate::subscription::{ReminderCandidate, SubscriptionState};
use crate::templates::{Template, TemplateItem};

const SUBSCRIPTION_COLUMNS: &str = "tier, subscription_status, subscription_expires_at, \
     stripe_customer_id, stripe_payment_intent_id, stripe_subscription_id, \
     last_payment_date, upgraded_at";

const USER_COLUMNS: &str = "id, email, first_name, last_name, created_at, last_login";

const GUEST_COLUMNS: &str = "guest_id, email, linked_user_id, created_at";

const QUESTION_COLUMNS: &str = "id, user_id, question, answer, category, tags, duration, color, \
     times_reviewed, last_reviewed, performance_score, sort_order, created_at, updated_at";

const PREFERENCES_COLUMNS: &str = "user_id, duration, banner_height, font_size, sound_enabled, \
     shuffle, spaced_repetition, color_scheme, custom_colors, selected_categories, updated_at";

/// Repository implementation over a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn subscription_from_row(r: &PgRow) -> StoreResult<SubscriptionState> {
    Ok(SubscriptionState {
        tier: r
            .get::<String, _>("tier")
            .parse()
            .map_err(StoreError::Corrupt)?,
        status: r
            .get::<String, _>("subscription_status")
            .parse()
            .map_err(StoreError::Corrupt)?,
        expires_at: r.get("subscription_expires_at"),
        provider_customer_id: r.get("stripe_customer_id"),
        provider_payment_intent_id: r.get("stripe_payment_intent_id"),
        provider_subscription_id: r.get("stripe_subscription_id"),
        last_payment_date: r.get("last_payment_date"),
        upgraded_at: r.get("upgraded_at"),
    })
}

fn user_from_row(r: &PgRow) -> StoreResult<UserAccount> {
    Ok(UserAccount {
        id: r.get("id"),
        email: r.get("email"),
        first_name: r.get("first_name"),
        last_name: r.get("last_name"),
        created_at: r.get("created_at"),
        last_login: r.get("last_login"),
        subscription: subscription_from_row(r)?,
    })
}

fn guest_from_row(r: &PgRow) -> StoreResult<GuestAccount> {
    Ok(GuestAccount {
        guest_id: r.get("guest_id"),
        email: r.get("email"),
        linked_user_id: r.get("linked_user_id"),
        created_at: r.get("created_at"),
        subscription: subscription_from_row(r)?,
    })
}

fn question_from_row(r: &PgRow) -> Question {
    Question {
        id: r.get("id"),
        owner_id: r.get("user_id"),
        question: r.get("question"),
        answer: r.get("answer"),
        category: r.get("category"),
        tags: r.get("tags"),
        duration: r.get("duration"),
        color: r.get("color"),
        times_reviewed: r.get("times_reviewed"),
        last_reviewed: r.get("last_reviewed"),
        performance_score: r.get("performance_score"),
        order: r.get("sort_order"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

fn template_from_row(r: &PgRow) -> Template {
    let Json(items) = r.get::<Json<Vec<TemplateItem>>, _>("items");
    Template {
        id: r.get("id"),
        name: r.get("name"),
        description: r.get("description"),
        category: r.get("category"),
        items,
        created_at: r.get("created_at"),
    }
}

/// Principal key from a `(kind, key)` pair produced by the union queries below
fn principal_from_row(r: &PgRow) -> PrincipalRef {
    let key: String = r.get("key");
    match r.get::<String, _>("kind").as_str() {
        "user" => PrincipalRef::User(key),
        _ => PrincipalRef::Guest(key),
    }
}

/// Table and key column holding a principal's subscription
fn account_table(principal: &PrincipalRef) -> (&'static str, &'static str) {
    match principal {
        PrincipalRef::User(_) => ("users", "id"),
        PrincipalRef::Guest(_) => ("guest_premium", "guest_id"),
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, user: &UserAccount, password_hash: &str) -> StoreResult<()> {
        let sub = &user.subscription;
        sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}, password_hash, {SUBSCRIPTION_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"
        ))
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.created_at)
        .bind(user.last_login)
        .bind(password_hash)
        .bind(sub.tier.as_str())
        .bind(sub.status.as_str())
        .bind(sub.expires_at)
        .bind(&sub.provider_customer_id)
        .bind(&sub.provider_payment_intent_id)
        .bind(&sub.provider_subscription_id)
        .bind(sub.last_payment_date)
        .bind(sub.upgraded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_insert(e, "email"))?;
        Ok(())
    }

    async fn find_credentials(&self, email: &str) -> StoreResult<Option<(UserAccount, String)>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS}, password_hash, {SUBSCRIPTION_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Ok((user_from_row(&r)?, r.get("password_hash"))))
            .transpose()
    }

    async fn find_user_by_id(&self, user_id: &str) -> StoreResult<Option<UserAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS}, {SUBSCRIPTION_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS}, {SUBSCRIPTION_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn update_password(&self, user_id: &str, password_hash: &str) -> StoreResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_last_login(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(user_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AuthTokenRepository for PgStore {
    async fn store_token(&self, token: &AuthToken) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO auth_tokens (token_hash, kind, email, expires_at, used_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&token.token_hash)
        .bind(token.kind.as_str())
        .bind(&token.email)
        .bind(token.expires_at)
        .bind(token.used_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_insert(e, "token"))?;
        Ok(())
    }

    async fn consume_token(
        &self,
        token_hash: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<AuthToken>> {
        // Single statement so two concurrent redemptions cannot both succeed
        let row = sqlx::query(
            "UPDATE auth_tokens SET used_at = $3
             WHERE token_hash = $1 AND kind = $2 AND used_at IS NULL AND expires_at > $3
             RETURNING token_hash, email, expires_at, used_at, created_at",
        )
        .bind(token_hash)
        .bind(kind.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| AuthToken {
            token_hash: r.get("token_hash"),
            kind,
            email: r.get("email"),
            expires_at: r.get("expires_at"),
            used_at: r.get("used_at"),
            created_at: r.get("created_at"),
        }))
    }
}

#[async_trait]
impl AccountRepository for PgStore {
    async fn load_principal(&self, principal: &PrincipalRef) -> StoreResult<Option<Principal>> {
        match principal {
            PrincipalRef::User(id) => Ok(self.find_user_by_id(id).await?.map(Principal::from)),
            PrincipalRef::Guest(id) => {
                let row = sqlx::query(&format!(
                    "SELECT {GUEST_COLUMNS}, {SUBSCRIPTION_COLUMNS} FROM guest_premium WHERE guest_id = $1"
                ))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

                Ok(row
                    .as_ref()
                    .map(guest_from_row)
                    .transpose()?
                    .map(Principal::from))
            }
        }
    }

    async fn save_subscription(
        &self,
        principal: &PrincipalRef,
        state: &SubscriptionState,
    ) -> StoreResult<()> {
        let (table, key) = account_table(principal);
        sqlx::query(&format!(
            "UPDATE {table} SET tier = $2, subscription_status = $3, subscription_expires_at = $4,
                 stripe_customer_id = $5, stripe_payment_intent_id = $6, stripe_subscription_id = $7,
                 last_payment_date = $8, upgraded_at = $9
             WHERE {key} = $1"
        ))
        .bind(principal.owner_key())
        .bind(state.tier.as_str())
        .bind(state.status.as_str())
        .bind(state.expires_at)
        .bind(&state.provider_customer_id)
        .bind(&state.provider_payment_intent_id)
        .bind(&state.provider_subscription_id)
        .bind(state.last_payment_date)
        .bind(state.upgraded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_guest(&self, guest: &GuestAccount) -> StoreResult<()> {
        let sub = &guest.subscription;
        sqlx::query(&format!(
            "INSERT INTO guest_premium ({GUEST_COLUMNS}, {SUBSCRIPTION_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (guest_id) DO NOTHING"
        ))
        .bind(&guest.guest_id)
        .bind(&guest.email)
        .bind(&guest.linked_user_id)
        .bind(guest.created_at)
        .bind(sub.tier.as_str())
        .bind(sub.status.as_str())
        .bind(sub.expires_at)
        .bind(&sub.provider_customer_id)
        .bind(&sub.provider_payment_intent_id)
        .bind(&sub.provider_subscription_id)
        .bind(sub.last_payment_date)
        .bind(sub.upgraded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_guest_by_email(&self, email: &str) -> StoreResult<Option<GuestAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {GUEST_COLUMNS}, {SUBSCRIPTION_COLUMNS} FROM guest_premium
             WHERE email = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(guest_from_row).transpose()
    }

    async fn set_guest_link(&self, guest_id: &str, user_id: &str) -> StoreResult<()> {
        sqlx::query("UPDATE guest_premium SET linked_user_id = $2 WHERE guest_id = $1")
            .bind(guest_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_by_provider_subscription(
        &self,
        subscription_id: &str,
    ) -> StoreResult<Option<PrincipalRef>> {
        let row = sqlx::query(
            "SELECT 'user' AS kind, id AS key FROM users WHERE stripe_subscription_id = $1
             UNION ALL
             SELECT 'guest', guest_id FROM guest_premium WHERE stripe_subscription_id = $1
             ORDER BY kind DESC LIMIT 1",
        )
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(principal_from_row))
    }

    async fn find_by_provider_customer(
        &self,
        customer_id: &str,
    ) -> StoreResult<Option<PrincipalRef>> {
        let row = sqlx::query(
            "SELECT 'user' AS kind, id AS key FROM users WHERE stripe_customer_id = $1
             UNION ALL
             SELECT 'guest', guest_id FROM guest_premium WHERE stripe_customer_id = $1
             ORDER BY kind DESC LIMIT 1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(principal_from_row))
    }

    async fn list_lapsed(&self, now: DateTime<Utc>) -> StoreResult<Vec<PrincipalRef>> {
        let rows = sqlx::query(
            "SELECT 'user' AS kind, id AS key FROM users
             WHERE subscription_status IN ('active', 'cancelled') AND subscription_expires_at < $1
             UNION ALL
             SELECT 'guest', guest_id FROM guest_premium
             WHERE subscription_status IN ('active', 'cancelled') AND subscription_expires_at < $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(principal_from_row).collect())
    }

    async fn list_expiring(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<ReminderCandidate>> {
        let rows = sqlx::query(
            "SELECT 'user' AS kind, id AS key, email, subscription_expires_at FROM users
             WHERE subscription_status = 'active'
               AND subscription_expires_at > $1 AND subscription_expires_at <= $2
             UNION ALL
             SELECT 'guest', guest_id, email, subscription_expires_at FROM guest_premium
             WHERE subscription_status = 'active'
               AND subscription_expires_at > $1 AND subscription_expires_at <= $2
             ORDER BY subscription_expires_at",
        )
        .bind(now)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| ReminderCandidate {
                principal: principal_from_row(r),
                email: r.get("email"),
                expires_at: r.get("subscription_expires_at"),
            })
            .collect())
    }
}

#[async_trait]
impl QuestionRepository for PgStore {
    async fn list_questions(&self, owner: &str) -> StoreResult<Vec<Question>> {
        let rows = sqlx::query(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE user_id = $1
             ORDER BY sort_order, created_at, id"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(question_from_row).collect())
    }

    async fn find_question(&self, id: &str, owner: &str) -> StoreResult<Option<Question>> {
        let row = sqlx::query(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(question_from_row))
    }

    async fn count_questions(&self, owner: &str) -> StoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM questions WHERE user_id = $1")
            .bind(owner)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }

    async fn max_order(&self, owner: &str) -> StoreResult<Option<i32>> {
        let row = sqlx::query("SELECT MAX(sort_order) AS max_order FROM questions WHERE user_id = $1")
            .bind(owner)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("max_order"))
    }

    async fn insert_questions(&self, questions: &[Question]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for q in questions {
            sqlx::query(&format!(
                "INSERT INTO questions ({QUESTION_COLUMNS})
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
            ))
            .bind(&q.id)
            .bind(&q.owner_id)
            .bind(&q.question)
            .bind(&q.answer)
            .bind(&q.category)
            .bind(&q.tags)
            .bind(q.duration)
            .bind(&q.color)
            .bind(q.times_reviewed)
            .bind(q.last_reviewed)
            .bind(q.performance_score)
            .bind(q.order)
            .bind(q.created_at)
            .bind(q.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::from_insert(e, "question"))?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn update_question(&self, q: &Question) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE questions SET question = $3, answer = $4, category = $5, tags = $6,
                 duration = $7, color = $8, times_reviewed = $9, last_reviewed = $10,
                 performance_score = $11, sort_order = $12, updated_at = $13
             WHERE id = $1 AND user_id = $2",
        )
        .bind(&q.id)
        .bind(&q.owner_id)
        .bind(&q.question)
        .bind(&q.answer)
        .bind(&q.category)
        .bind(&q.tags)
        .bind(q.duration)
        .bind(&q.color)
        .bind(q.times_reviewed)
        .bind(q.last_reviewed)
        .bind(q.performance_score)
        .bind(q.order)
        .bind(q.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_question(&self, id: &str, owner: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_questions(&self, owner: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM questions WHERE user_id = $1")
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn set_question_order(&self, id: &str, owner: &str, order: i32) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE questions SET sort_order = $3 WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(owner)
                .bind(order)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PreferencesRepository for PgStore {
    async fn find_preferences(&self, owner: &str) -> StoreResult<Option<Preferences>> {
        let row = sqlx::query(&format!(
            "SELECT {PREFERENCES_COLUMNS} FROM preferences WHERE user_id = $1"
        ))
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Preferences {
            owner_id: r.get("user_id"),
            duration: r.get("duration"),
            banner_height: r.get("banner_height"),
            font_size: r.get("font_size"),
            sound_enabled: r.get("sound_enabled"),
            shuffle: r.get("shuffle"),
            spaced_repetition: r.get("spaced_repetition"),
            color_scheme: r.get("color_scheme"),
            custom_colors: r.get("custom_colors"),
            selected_categories: r.get("selected_categories"),
            updated_at: r.get("updated_at"),
        }))
    }

    async fn upsert_preferences(&self, p: &Preferences) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO preferences ({PREFERENCES_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (user_id) DO UPDATE SET
                 duration = EXCLUDED.duration,
                 banner_height = EXCLUDED.banner_height,
                 font_size = EXCLUDED.font_size,
                 sound_enabled = EXCLUDED.sound_enabled,
                 shuffle = EXCLUDED.shuffle,
                 spaced_repetition = EXCLUDED.spaced_repetition,
                 color_scheme = EXCLUDED.color_scheme,
                 custom_colors = EXCLUDED.custom_colors,
                 selected_categories = EXCLUDED.selected_categories,
                 updated_at = EXCLUDED.updated_at"
        ))
        .bind(&p.owner_id)
        .bind(p.duration)
        .bind(p.banner_height)
        .bind(p.font_size)
        .bind(p.sound_enabled)
        .bind(p.shuffle)
        .bind(p.spaced_repetition)
        .bind(&p.color_scheme)
        .bind(&p.custom_colors)
        .bind(&p.selected_categories)
        .bind(p.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TemplateRepository for PgStore {
    async fn list_templates(&self, category: Option<&str>) -> StoreResult<Vec<Template>> {
        let rows = sqlx::query(
            "SELECT id, name, description, category, items, created_at FROM templates
             WHERE $1::TEXT IS NULL OR category = $1
             ORDER BY name",
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(template_from_row).collect())
    }

    async fn find_template(&self, id: &str) -> StoreResult<Option<Template>> {
        let row = sqlx::query(
            "SELECT id, name, description, category, items, created_at FROM templates WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(template_from_row))
    }

    async fn insert_template(&self, template: &Template) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO templates (id, name, description, category, items, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&template.id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(&template.category)
        .bind(Json(&template.items))
        .bind(template.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_insert(e, "template"))?;
        Ok(())
    }

    async fn delete_template(&self, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl StudySessionRepository for PgStore {
    async fn insert_session(&self, s: &StudySession) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO study_sessions
                 (id, user_id, started_at, ended_at, questions_reviewed, total_duration)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&s.id)
        .bind(&s.owner_id)
        .bind(s.started_at)
        .bind(s.ended_at)
        .bind(s.questions_reviewed)
        .bind(s.total_duration)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_sessions(&self, owner: &str) -> StoreResult<Vec<StudySession>> {
        let rows = sqlx::query(
            "SELECT id, user_id, started_at, ended_at, questions_reviewed, total_duration
             FROM study_sessions WHERE user_id = $1 ORDER BY started_at DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| StudySession {
                id: r.get("id"),
                owner_id: r.get("user_id"),
                started_at: r.get("started_at"),
                ended_at: r.get("ended_at"),
                questions_reviewed: r.get("questions_reviewed"),
                total_duration: r.get("total_duration"),
            })
            .collect())
    }
}

#[async_trait]
impl PaymentEventRepository for PgStore {
    async fn record_event(&self, record: &PaymentEventRecord) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO payment_events (event_id, event_type, principal, processed_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(&record.event_id)
        .bind(record.kind.as_str())
        .bind(&record.principal)
        .bind(record.processed_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn forget_event(&self, event_id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM payment_events WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ContactRepository for PgStore {
    async fn insert_contact(&self, m: &ContactMessage) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO contact_messages (id, name, email, message, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&m.id)
        .bind(&m.name)
        .bind(&m.email)
        .bind(&m.message)
        .bind(m.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
