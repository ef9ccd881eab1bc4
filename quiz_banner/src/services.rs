//! Wiring of every manager over one shared store.

use crate::{
    auth::{AuthManager, AuthSettings},
    clock::Clock,
    contact::ContactManager,
    db::{Store, StoreHealth},
    identity::IdentityResolver,
    mail::Mailer,
    payment::{PaymentIntake, PaymentProvider},
    preferences::PreferencesManager,
    questions::QuestionManager,
    study::StudyManager,
    subscription::SubscriptionManager,
    templates::TemplateManager,
};
use std::sync::Arc;

/// All domain services of a running backend
#[derive(Clone)]
pub struct Services {
    pub auth: AuthManager,
    pub identity: IdentityResolver,
    pub subscriptions: SubscriptionManager,
    pub payments: PaymentIntake,
    pub questions: QuestionManager,
    pub preferences: PreferencesManager,
    pub templates: TemplateManager,
    pub study: StudyManager,
    pub contact: ContactManager,
    pub mailer: Arc<dyn Mailer>,
    pub clock: Arc<dyn Clock>,
    pub health: Arc<dyn StoreHealth>,
}

impl Services {
    pub fn new<S: Store>(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        auth_settings: AuthSettings,
        mailer: Arc<dyn Mailer>,
        support_email: String,
        provider: Option<Arc<dyn PaymentProvider>>,
    ) -> Self {
        let auth = AuthManager::new(store.clone(), clock.clone(), mailer.clone(), auth_settings);
        let subscriptions = SubscriptionManager::new(store.clone(), clock.clone());
        let identity = IdentityResolver::new(auth.clone(), subscriptions.clone(), store.clone());
        let payments = PaymentIntake::new(store.clone(), subscriptions.clone(), provider);

        Self {
            questions: QuestionManager::new(store.clone(), clock.clone()),
            preferences: PreferencesManager::new(store.clone(), clock.clone()),
            templates: TemplateManager::new(store.clone(), clock.clone()),
            study: StudyManager::new(store.clone(), clock.clone()),
            contact: ContactManager::new(store.clone(), clock.clone(), mailer.clone(), support_email),
            health: store,
            auth,
            identity,
            subscriptions,
            payments,
            mailer,
            clock,
        }
    }
}
