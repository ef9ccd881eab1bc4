//! Authentication manager implementation.

use super::{
    errors::{AuthError, AuthResult},
    models::{
        AccessTokenClaims, AuthSession, AuthToken, LoginRequest, MagicLinkOutcome,
        RegisterRequest, TokenKind,
    },
};
use crate::{
    clock::Clock,
    db::{AccountRepository, AuthTokenRepository, StoreError, UserRepository},
    identity::UserAccount,
    mail::{Email, Mailer},
    subscription::SubscriptionState,
};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Duration;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

const RESET_TOKEN_TTL_HOURS: i64 = 1;
const MAGIC_LINK_TTL_MINUTES: i64 = 15;
const MIN_PASSWORD_LEN: usize = 8;

/// Secrets and lifetimes used by [`AuthManager`]
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub pepper: String,
    pub access_token_ttl: Duration,
    /// Base of links placed in reset and magic-link mails
    pub app_base_url: String,
}

impl AuthSettings {
    pub fn new(jwt_secret: impl Into<String>, pepper: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            pepper: pepper.into(),
            access_token_ttl: Duration::days(7),
            app_base_url: "http://localhost:5173".to_string(),
        }
    }
}

/// Authentication manager
#[derive(Clone)]
pub struct AuthManager {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn AuthTokenRepository>,
    accounts: Arc<dyn AccountRepository>,
    clock: Arc<dyn Clock>,
    mailer: Arc<dyn Mailer>,
    settings: AuthSettings,
}

impl AuthManager {
    pub fn new<S>(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        mailer: Arc<dyn Mailer>,
        settings: AuthSettings,
    ) -> Self
    where
        S: UserRepository + AuthTokenRepository + AccountRepository + 'static,
    {
        Self {
            users: store.clone(),
            tokens: store.clone(),
            accounts: store,
            clock,
            mailer,
            settings,
        }
    }

    /// Register a new user
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidEmail` - Email format invalid
    /// * `AuthError::WeakPassword` - Password too weak
    /// * `AuthError::EmailTaken` - Email already registered
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<AuthSession> {
        let email = normalize_email(&request.email)?;
        validate_password(&request.password)?;

        let password_hash = self.hash_password(&request.password)?;
        let user = UserAccount {
            id: Uuid::new_v4().to_string(),
            email,
            first_name: trimmed(request.first_name),
            last_name: trimmed(request.last_name),
            created_at: self.clock.now(),
            last_login: None,
            subscription: SubscriptionState::default(),
        };

        self.users
            .create_user(&user, &password_hash)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AuthError::EmailTaken,
                other => AuthError::Store(other),
            })?;
        log::info!("Registered user {}", user.id);

        let token = self.issue_access_token(&user)?;
        Ok(AuthSession { user, token })
    }

    /// Login with email and password.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(&self, request: LoginRequest) -> AuthResult<AuthSession> {
        let email = request.email.trim().to_lowercase();
        let (mut user, password_hash) = self
            .users
            .find_credentials(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        self.verify_password(&request.password, &password_hash)?;

        let now = self.clock.now();
        self.users.update_last_login(&user.id, now).await?;
        user.last_login = Some(now);

        let token = self.issue_access_token(&user)?;
        Ok(AuthSession { user, token })
    }

    /// Verify a JWT access token against the injected clock
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        let mut validation = Validation::default();
        validation.validate_exp = false;

        let token_data = decode::<AccessTokenClaims>(
            token,
            &DecodingKey::from_secret(self.settings.jwt_secret.as_bytes()),
            &validation,
        )?;

        if token_data.claims.exp <= self.clock.now().timestamp() {
            return Err(AuthError::InvalidToken);
        }
        Ok(token_data.claims)
    }

    pub async fn me(&self, user_id: &str) -> AuthResult<UserAccount> {
        self.users
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Mail a password reset link; unknown emails succeed silently
    pub async fn forgot_password(&self, email: &str) -> AuthResult<()> {
        let email = email.trim().to_lowercase();
        if self.users.find_user_by_email(&email).await?.is_none() {
            log::debug!("Password reset requested for unknown email");
            return Ok(());
        }

        let secret = self
            .store_token(
                TokenKind::PasswordReset,
                &email,
                Duration::hours(RESET_TOKEN_TTL_HOURS),
            )
            .await?;
        let link = format!(
            "{}/reset-password?token={secret}",
            self.settings.app_base_url
        );
        self.send(Email::new(
            &email,
            "Reset your QuizBanner password",
            format!("Use this link within one hour to choose a new password:\n\n{link}"),
        ))
        .await;
        Ok(())
    }

    /// Set a new password with a reset token; the token works once
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<()> {
        validate_password(new_password)?;

        let stored = self
            .tokens
            .consume_token(&hash_token(token), TokenKind::PasswordReset, self.clock.now())
            .await?
            .ok_or(AuthError::InvalidToken)?;
        let user = self
            .users
            .find_user_by_email(&stored.email)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let password_hash = self.hash_password(new_password)?;
        self.users.update_password(&user.id, &password_hash).await?;
        log::info!("Password reset for user {}", user.id);
        Ok(())
    }

    /// Mail a single-use sign-in link
    pub async fn request_magic_link(&self, email: &str) -> AuthResult<()> {
        let email = normalize_email(email)?;
        let secret = self
            .store_token(
                TokenKind::MagicLink,
                &email,
                Duration::minutes(MAGIC_LINK_TTL_MINUTES),
            )
            .await?;
        let link = format!("{}/auth/magic?token={secret}", self.settings.app_base_url);
        self.send(Email::new(
            &email,
            "Your QuizBanner sign-in link",
            format!("This link signs you in and expires in 15 minutes:\n\n{link}"),
        ))
        .await;
        Ok(())
    }

    /// Redeem a magic link.
    ///
    /// A registered email signs the user in; otherwise a guest premium record
    /// carrying the email is reported so the client can restore it.
    pub async fn verify_magic_link(&self, token: &str) -> AuthResult<MagicLinkOutcome> {
        let now = self.clock.now();
        let stored = self
            .tokens
            .consume_token(&hash_token(token), TokenKind::MagicLink, now)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if let Some(mut user) = self.users.find_user_by_email(&stored.email).await? {
            self.users.update_last_login(&user.id, now).await?;
            user.last_login = Some(now);
            let token = self.issue_access_token(&user)?;
            return Ok(MagicLinkOutcome::User { user, token });
        }

        match self.accounts.find_guest_by_email(&stored.email).await? {
            Some(guest) => Ok(MagicLinkOutcome::GuestPremium {
                subscription: guest.subscription.info(now),
                guest_id: guest.guest_id,
            }),
            None => Err(AuthError::InvalidToken),
        }
    }

    /// Generate a random secret, persist its digest and return the secret
    async fn store_token(&self, kind: TokenKind, email: &str, ttl: Duration) -> AuthResult<String> {
        let secret = generate_secret();
        let now = self.clock.now();
        self.tokens
            .store_token(&AuthToken {
                token_hash: hash_token(&secret),
                kind,
                email: email.to_string(),
                expires_at: now + ttl,
                used_at: None,
                created_at: now,
            })
            .await?;
        Ok(secret)
    }

    async fn send(&self, email: Email) {
        let to = email.to.clone();
        if let Err(e) = self.mailer.send(email).await {
            log::warn!("Failed to send mail to {to}: {e}");
        }
    }

    fn issue_access_token(&self, user: &UserAccount) -> AuthResult<String> {
        let now = self.clock.now();
        let claims = AccessTokenClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            tier: user.subscription.effective_tier(now),
            exp: (now + self.settings.access_token_ttl).timestamp(),
            iat: now.timestamp(),
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.settings.jwt_secret.as_bytes()),
        )?)
    }

    /// Hash password with Argon2id + pepper
    fn hash_password(&self, password: &str) -> AuthResult<String> {
        let peppered = format!("{}{}", password, self.settings.pepper);
        let salt = SaltString::generate(&mut OsRng);

        Ok(Argon2::default()
            .hash_password(peppered.as_bytes(), &salt)
            .map_err(|_| AuthError::HashingFailed)?
            .to_string())
    }

    fn verify_password(&self, password: &str, hash: &str) -> AuthResult<()> {
        let peppered = format!("{}{}", password, self.settings.pepper);
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

        Argon2::default()
            .verify_password(peppered.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)
    }
}

/// Loose structural email check: `local@domain.tld`, no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn normalize_email(email: &str) -> AuthResult<String> {
    let email = email.trim().to_lowercase();
    if is_valid_email(&email) {
        Ok(email)
    } else {
        Err(AuthError::InvalidEmail)
    }
}

fn validate_password(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_letter = password.chars().any(char::is_alphabetic);
    if !has_digit || !has_letter {
        return Err(AuthError::WeakPassword(
            "Password must contain at least one letter and one number".to_string(),
        ));
    }
    Ok(())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 32 random bytes, hex encoded
fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

fn hash_token(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        db::MemoryStore,
        identity::GuestAccount,
        mail::Outbox,
        subscription::ProviderRefs,
    };
    use chrono::{TimeZone, Utc};

    struct Harness {
        auth: AuthManager,
        store: Arc<MemoryStore>,
        clock: ManualClock,
        outbox: Outbox,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap());
        let outbox = Outbox::new();
        let auth = AuthManager::new(
            store.clone(),
            Arc::new(clock.clone()),
            Arc::new(outbox.clone()),
            AuthSettings::new("test_jwt_secret_that_is_long_enough!", "test_pepper_16ch"),
        );
        Harness {
            auth,
            store,
            clock,
            outbox,
        }
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "flashcards42".to_string(),
            first_name: Some(" Ada ".to_string()),
            last_name: None,
        }
    }

    /// Token secret from the last mail sent to `to`
    fn token_from_mail(outbox: &Outbox, to: &str) -> String {
        let body = outbox.last_to(to).unwrap().body;
        body.rsplit("token=").next().unwrap().trim().to_string()
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let h = harness();
        let session = h.auth.register(register_request("Ada@Example.com")).await.unwrap();
        assert_eq!(session.user.email, "ada@example.com");
        assert_eq!(session.user.first_name.as_deref(), Some("Ada"));

        let claims = h.auth.verify_access_token(&session.token).unwrap();
        assert_eq!(claims.sub, session.user.id);

        let login = h
            .auth
            .login(LoginRequest {
                email: "ada@example.com".to_string(),
                password: "flashcards42".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(login.user.id, session.user.id);
        assert!(login.user.last_login.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_taken() {
        let h = harness();
        h.auth.register(register_request("ada@example.com")).await.unwrap();
        assert!(matches!(
            h.auth.register(register_request("ADA@example.com")).await,
            Err(AuthError::EmailTaken)
        ));
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_look_the_same() {
        let h = harness();
        h.auth.register(register_request("ada@example.com")).await.unwrap();

        for (email, password) in [("ada@example.com", "wrong-pass1"), ("bob@example.com", "flashcards42")] {
            let result = h
                .auth
                .login(LoginRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                })
                .await;
            assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        }
    }

    #[tokio::test]
    async fn test_weak_password_rejected() {
        let h = harness();
        let mut request = register_request("ada@example.com");
        request.password = "abcdefgh".to_string();
        assert!(matches!(
            h.auth.register(request).await,
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[tokio::test]
    async fn test_access_token_expires_with_clock() {
        let h = harness();
        let session = h.auth.register(register_request("ada@example.com")).await.unwrap();

        h.clock.advance(Duration::days(8));
        assert!(matches!(
            h.auth.verify_access_token(&session.token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_password_reset_is_single_use() {
        let h = harness();
        h.auth.register(register_request("ada@example.com")).await.unwrap();
        h.auth.forgot_password("ada@example.com").await.unwrap();
        let token = token_from_mail(&h.outbox, "ada@example.com");

        h.auth.reset_password(&token, "newpassword9").await.unwrap();
        assert!(matches!(
            h.auth.reset_password(&token, "another1pass").await,
            Err(AuthError::InvalidToken)
        ));

        h.auth
            .login(LoginRequest {
                email: "ada@example.com".to_string(),
                password: "newpassword9".to_string(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reset_token_expires_after_an_hour() {
        let h = harness();
        h.auth.register(register_request("ada@example.com")).await.unwrap();
        h.auth.forgot_password("ada@example.com").await.unwrap();
        let token = token_from_mail(&h.outbox, "ada@example.com");

        h.clock.advance(Duration::minutes(61));
        assert!(matches!(
            h.auth.reset_password(&token, "newpassword9").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_forgot_password_for_unknown_email_sends_nothing() {
        let h = harness();
        h.auth.forgot_password("nobody@example.com").await.unwrap();
        assert!(h.outbox.sent().is_empty());
    }

    #[tokio::test]
    async fn test_magic_link_signs_in_user() {
        let h = harness();
        let session = h.auth.register(register_request("ada@example.com")).await.unwrap();
        h.auth.request_magic_link("ada@example.com").await.unwrap();
        let token = token_from_mail(&h.outbox, "ada@example.com");

        match h.auth.verify_magic_link(&token).await.unwrap() {
            MagicLinkOutcome::User { user, .. } => assert_eq!(user.id, session.user.id),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(h.auth.verify_magic_link(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_magic_link_restores_guest_premium() {
        let h = harness();
        let now = h.clock.now();
        let mut guest = GuestAccount::new("guest_42".to_string(), Some("kim@example.com".to_string()), now);
        guest.subscription.activate(now, &ProviderRefs::default());
        h.store.insert_guest(&guest).await.unwrap();

        h.auth.request_magic_link("kim@example.com").await.unwrap();
        let token = token_from_mail(&h.outbox, "kim@example.com");

        match h.auth.verify_magic_link(&token).await.unwrap() {
            MagicLinkOutcome::GuestPremium {
                guest_id,
                subscription,
            } => {
                assert_eq!(guest_id, "guest_42");
                assert!(subscription.is_active);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_magic_link_for_unknown_email_is_invalid() {
        let h = harness();
        h.auth.request_magic_link("ghost@example.com").await.unwrap();
        let token = token_from_mail(&h.outbox, "ghost@example.com");
        assert!(matches!(
            h.auth.verify_magic_link(&token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("a@b.io"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.io"));
        assert!(!is_valid_email("a b@c.io"));
        assert!(!is_valid_email("a@@b.io"));
    }
}
