//! In-process implementation of every repository.
//!
//! Used by tests and by the server's `--memory` mode. State lives behind one
//! mutex and is never held across an `.await`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::errors::{StoreError, StoreResult};
use super::repository::{
    AccountRepository, AuthTokenRepository, ContactRepository, PaymentEventRepository,
    PreferencesRepository, QuestionRepository, StoreHealth, StudySessionRepository,
    TemplateRepository, UserRepository,
};
use crate::auth::{AuthToken, TokenKind};
use crate::contact::ContactMessage;
use crate::identity::{Account, GuestAccount, Principal, PrincipalRef, UserAccount};
use crate::payment::PaymentEventRecord;
use crate::preferences::Preferences;
use crate::questions::Question;
use crate::study::StudySession;
use crate::subscription::{ReminderCandidate, SubscriptionState, SubscriptionStatus};
use crate::templates::Template;

#[derive(Default)]
struct MemoryState {
    users: HashMap<String, (UserAccount, String)>,
    guests: HashMap<String, GuestAccount>,
    tokens: HashMap<String, AuthToken>,
    questions: HashMap<String, Question>,
    preferences: HashMap<String, Preferences>,
    templates: HashMap<String, Template>,
    sessions: Vec<StudySession>,
    payment_events: HashSet<String>,
    contacts: Vec<ContactMessage>,
}

impl MemoryState {
    fn accounts(&self) -> impl Iterator<Item = Principal> + '_ {
        let users = self.users.values().map(|(u, _)| Principal::from(u.clone()));
        let guests = self.guests.values().map(|g| Principal::from(g.clone()));
        users.chain(guests)
    }
}

/// Repository implementation backed by process memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored contact messages
    pub fn contact_count(&self) -> usize {
        self.lock().contacts.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &UserAccount, password_hash: &str) -> StoreResult<()> {
        let mut state = self.lock();
        if state.users.values().any(|(u, _)| u.email == user.email) {
            return Err(StoreError::Conflict("email".to_string()));
        }
        state
            .users
            .insert(user.id.clone(), (user.clone(), password_hash.to_string()));
        Ok(())
    }

    async fn find_credentials(&self, email: &str) -> StoreResult<Option<(UserAccount, String)>> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|(u, _)| u.email == email)
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: &str) -> StoreResult<Option<UserAccount>> {
        Ok(self.lock().users.get(user_id).map(|(u, _)| u.clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserAccount>> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|(u, _)| u.email == email)
            .map(|(u, _)| u.clone()))
    }

    async fn update_password(&self, user_id: &str, password_hash: &str) -> StoreResult<()> {
        if let Some((_, hash)) = self.lock().users.get_mut(user_id) {
            *hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn update_last_login(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some((user, _)) = self.lock().users.get_mut(user_id) {
            user.last_login = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl AuthTokenRepository for MemoryStore {
    async fn store_token(&self, token: &AuthToken) -> StoreResult<()> {
        self.lock()
            .tokens
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn consume_token(
        &self,
        token_hash: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<AuthToken>> {
        let mut state = self.lock();
        let Some(token) = state.tokens.get_mut(token_hash) else {
            return Ok(None);
        };
        if token.kind != kind || token.used_at.is_some() || token.expires_at <= now {
            return Ok(None);
        }
        token.used_at = Some(now);
        Ok(Some(token.clone()))
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn load_principal(&self, principal: &PrincipalRef) -> StoreResult<Option<Principal>> {
        let state = self.lock();
        Ok(match principal {
            PrincipalRef::User(id) => state.users.get(id).map(|(u, _)| u.clone().into()),
            PrincipalRef::Guest(id) => state.guests.get(id).map(|g| g.clone().into()),
        })
    }

    async fn save_subscription(
        &self,
        principal: &PrincipalRef,
        subscription: &SubscriptionState,
    ) -> StoreResult<()> {
        let mut state = self.lock();
        match principal {
            PrincipalRef::User(id) => {
                if let Some((user, _)) = state.users.get_mut(id) {
                    user.subscription = subscription.clone();
                }
            }
            PrincipalRef::Guest(id) => {
                if let Some(guest) = state.guests.get_mut(id) {
                    guest.subscription = subscription.clone();
                }
            }
        }
        Ok(())
    }

    async fn insert_guest(&self, guest: &GuestAccount) -> StoreResult<()> {
        self.lock()
            .guests
            .entry(guest.guest_id.clone())
            .or_insert_with(|| guest.clone());
        Ok(())
    }

    async fn find_guest_by_email(&self, email: &str) -> StoreResult<Option<GuestAccount>> {
        Ok(self
            .lock()
            .guests
            .values()
            .filter(|g| g.email.as_deref() == Some(email))
            .max_by_key(|g| g.created_at)
            .cloned())
    }

    async fn set_guest_link(&self, guest_id: &str, user_id: &str) -> StoreResult<()> {
        if let Some(guest) = self.lock().guests.get_mut(guest_id) {
            guest.linked_user_id = Some(user_id.to_string());
        }
        Ok(())
    }

    async fn find_by_provider_subscription(
        &self,
        subscription_id: &str,
    ) -> StoreResult<Option<PrincipalRef>> {
        Ok(self
            .lock()
            .accounts()
            .find(|p| p.subscription().provider_subscription_id.as_deref() == Some(subscription_id))
            .map(|p| p.principal_ref()))
    }

    async fn find_by_provider_customer(
        &self,
        customer_id: &str,
    ) -> StoreResult<Option<PrincipalRef>> {
        Ok(self
            .lock()
            .accounts()
            .find(|p| p.subscription().provider_customer_id.as_deref() == Some(customer_id))
            .map(|p| p.principal_ref()))
    }

    async fn list_lapsed(&self, now: DateTime<Utc>) -> StoreResult<Vec<PrincipalRef>> {
        Ok(self
            .lock()
            .accounts()
            .filter(|p| {
                let sub = p.subscription();
                matches!(
                    sub.status,
                    SubscriptionStatus::Active | SubscriptionStatus::Cancelled
                ) && sub.expires_at.is_some_and(|exp| exp < now)
            })
            .map(|p| p.principal_ref())
            .collect())
    }

    async fn list_expiring(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<ReminderCandidate>> {
        let mut candidates: Vec<ReminderCandidate> = self
            .lock()
            .accounts()
            .filter_map(|p| {
                let sub = p.subscription();
                let expires_at = sub.expires_at?;
                let due = sub.status == SubscriptionStatus::Active
                    && expires_at > now
                    && expires_at <= until;
                due.then(|| ReminderCandidate {
                    principal: p.principal_ref(),
                    email: p.email().map(str::to_string),
                    expires_at,
                })
            })
            .collect();
        candidates.sort_by_key(|c| c.expires_at);
        Ok(candidates)
    }
}

#[async_trait]
impl QuestionRepository for MemoryStore {
    async fn list_questions(&self, owner: &str) -> StoreResult<Vec<Question>> {
        let mut questions: Vec<Question> = self
            .lock()
            .questions
            .values()
            .filter(|q| q.owner_id == owner)
            .cloned()
            .collect();
        questions.sort_by(|a, b| {
            a.order
                .cmp(&b.order)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(questions)
    }

    async fn find_question(&self, id: &str, owner: &str) -> StoreResult<Option<Question>> {
        Ok(self
            .lock()
            .questions
            .get(id)
            .filter(|q| q.owner_id == owner)
            .cloned())
    }

    async fn count_questions(&self, owner: &str) -> StoreResult<i64> {
        Ok(self
            .lock()
            .questions
            .values()
            .filter(|q| q.owner_id == owner)
            .count() as i64)
    }

    async fn max_order(&self, owner: &str) -> StoreResult<Option<i32>> {
        Ok(self
            .lock()
            .questions
            .values()
            .filter(|q| q.owner_id == owner)
            .map(|q| q.order)
            .max())
    }

    async fn insert_questions(&self, questions: &[Question]) -> StoreResult<()> {
        let mut state = self.lock();
        for question in questions {
            state.questions.insert(question.id.clone(), question.clone());
        }
        Ok(())
    }

    async fn update_question(&self, question: &Question) -> StoreResult<bool> {
        let mut state = self.lock();
        match state.questions.get_mut(&question.id) {
            Some(existing) if existing.owner_id == question.owner_id => {
                *existing = question.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_question(&self, id: &str, owner: &str) -> StoreResult<bool> {
        let mut state = self.lock();
        let owned = state.questions.get(id).is_some_and(|q| q.owner_id == owner);
        if owned {
            state.questions.remove(id);
        }
        Ok(owned)
    }

    async fn delete_all_questions(&self, owner: &str) -> StoreResult<u64> {
        let mut state = self.lock();
        let before = state.questions.len();
        state.questions.retain(|_, q| q.owner_id != owner);
        Ok((before - state.questions.len()) as u64)
    }

    async fn set_question_order(&self, id: &str, owner: &str, order: i32) -> StoreResult<bool> {
        match self.lock().questions.get_mut(id) {
            Some(q) if q.owner_id == owner => {
                q.order = order;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl PreferencesRepository for MemoryStore {
    async fn find_preferences(&self, owner: &str) -> StoreResult<Option<Preferences>> {
        Ok(self.lock().preferences.get(owner).cloned())
    }

    async fn upsert_preferences(&self, preferences: &Preferences) -> StoreResult<()> {
        self.lock()
            .preferences
            .insert(preferences.owner_id.clone(), preferences.clone());
        Ok(())
    }
}

#[async_trait]
impl TemplateRepository for MemoryStore {
    async fn list_templates(&self, category: Option<&str>) -> StoreResult<Vec<Template>> {
        let mut templates: Vec<Template> = self
            .lock()
            .templates
            .values()
            .filter(|t| category.is_none_or(|c| t.category == c))
            .cloned()
            .collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }

    async fn find_template(&self, id: &str) -> StoreResult<Option<Template>> {
        Ok(self.lock().templates.get(id).cloned())
    }

    async fn insert_template(&self, template: &Template) -> StoreResult<()> {
        self.lock()
            .templates
            .insert(template.id.clone(), template.clone());
        Ok(())
    }

    async fn delete_template(&self, id: &str) -> StoreResult<bool> {
        Ok(self.lock().templates.remove(id).is_some())
    }
}

#[async_trait]
impl StudySessionRepository for MemoryStore {
    async fn insert_session(&self, session: &StudySession) -> StoreResult<()> {
        self.lock().sessions.push(session.clone());
        Ok(())
    }

    async fn list_sessions(&self, owner: &str) -> StoreResult<Vec<StudySession>> {
        let mut sessions: Vec<StudySession> = self
            .lock()
            .sessions
            .iter()
            .filter(|s| s.owner_id == owner)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(sessions)
    }
}

#[async_trait]
impl PaymentEventRepository for MemoryStore {
    async fn record_event(&self, record: &PaymentEventRecord) -> StoreResult<bool> {
        Ok(self.lock().payment_events.insert(record.event_id.clone()))
    }

    async fn forget_event(&self, event_id: &str) -> StoreResult<()> {
        self.lock().payment_events.remove(event_id);
        Ok(())
    }
}

#[async_trait]
impl ContactRepository for MemoryStore {
    async fn insert_contact(&self, message: &ContactMessage) -> StoreResult<()> {
        self.lock().contacts.push(message.clone());
        Ok(())
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questions::NewQuestion;
    use crate::tier::Tier;
    use chrono::Duration;

    fn question(id: &str, owner: &str, order: i32) -> Question {
        NewQuestion::new("q", "a").into_question(id.to_string(), owner, order, Utc::now())
    }

    #[tokio::test]
    async fn test_questions_are_owner_scoped() {
        let store = MemoryStore::new();
        store
            .insert_questions(&[question("a", "alice", 0), question("b", "bob", 0)])
            .await
            .unwrap();

        assert!(store.find_question("a", "alice").await.unwrap().is_some());
        assert!(store.find_question("a", "bob").await.unwrap().is_none());
        assert!(!store.delete_question("a", "bob").await.unwrap());
        assert!(!store.set_question_order("a", "bob", 5).await.unwrap());
        assert_eq!(store.count_questions("alice").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        let user = UserAccount {
            id: "u1".to_string(),
            email: "a@example.com".to_string(),
            first_name: None,
            last_name: None,
            created_at: Utc::now(),
            last_login: None,
            subscription: SubscriptionState::default(),
        };
        store.create_user(&user, "hash").await.unwrap();

        let mut other = user.clone();
        other.id = "u2".to_string();
        assert!(matches!(
            store.create_user(&other, "hash").await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_lapsed_and_expiring_queries() {
        let store = MemoryStore::new();
        let now = Utc::now();

        for (id, status, offset) in [
            ("lapsed", SubscriptionStatus::Active, -1),
            ("cancelled_lapsed", SubscriptionStatus::Cancelled, -2),
            ("soon", SubscriptionStatus::Active, 3),
            ("later", SubscriptionStatus::Active, 30),
            ("done", SubscriptionStatus::Expired, -5),
        ] {
            let mut guest = GuestAccount::new(id.to_string(), None, now);
            guest.subscription = SubscriptionState {
                tier: Tier::Premium,
                status,
                expires_at: Some(now + Duration::days(offset)),
                ..Default::default()
            };
            store.insert_guest(&guest).await.unwrap();
        }

        let mut lapsed = store.list_lapsed(now).await.unwrap();
        lapsed.sort_by(|a, b| a.owner_key().cmp(b.owner_key()));
        assert_eq!(
            lapsed,
            vec![
                PrincipalRef::Guest("cancelled_lapsed".to_string()),
                PrincipalRef::Guest("lapsed".to_string()),
            ]
        );

        let expiring = store.list_expiring(now, now + Duration::days(7)).await.unwrap();
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].principal, PrincipalRef::Guest("soon".to_string()));
    }

    #[tokio::test]
    async fn test_token_consumed_once() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let token = AuthToken {
            token_hash: "h".to_string(),
            kind: TokenKind::PasswordReset,
            email: "a@example.com".to_string(),
            expires_at: now + Duration::hours(1),
            used_at: None,
            created_at: now,
        };
        store.store_token(&token).await.unwrap();

        assert!(store
            .consume_token("h", TokenKind::MagicLink, now)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .consume_token("h", TokenKind::PasswordReset, now)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .consume_token("h", TokenKind::PasswordReset, now)
            .await
            .unwrap()
            .is_none());
    }
}
