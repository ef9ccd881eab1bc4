//! Authentication data models.

use crate::{
    identity::{GuestId, UserAccount, UserId},
    subscription::SubscriptionInfo,
    tier::Tier,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// User registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// User login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// JWT claims for access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: UserId,
    pub email: String,
    /// Tier at issuance; informational, entitlement is re-checked per request
    pub tier: Tier,
    pub exp: i64,
    pub iat: i64,
}

/// Signed-in user together with a fresh access token
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: UserAccount,
    pub token: String,
}

/// Single-use token purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    PasswordReset,
    MagicLink,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::PasswordReset => "password_reset",
            TokenKind::MagicLink => "magic_link",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored single-use token; only the SHA-256 of the secret is persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub token_hash: String,
    pub kind: TokenKind,
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Result of following a magic link
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MagicLinkOutcome {
    /// The email belongs to a registered user
    #[serde(rename_all = "camelCase")]
    User { user: UserAccount, token: String },
    /// The email only holds anonymous premium
    #[serde(rename_all = "camelCase")]
    GuestPremium {
        guest_id: GuestId,
        subscription: SubscriptionInfo,
    },
}
