//! Accounts, passwords and tokens.
//!
//! - Argon2id password hashing with a server-side pepper
//! - HS256 JWT access tokens (7 days by default)
//! - Single-use password reset (1 hour) and magic-link (15 minutes) tokens,
//!   stored only as SHA-256 digests
//!
//! ## Example
//!
//! ```no_run
//! use quiz_banner::auth::{AuthManager, AuthSettings, RegisterRequest};
//! use quiz_banner::{clock::SystemClock, db::MemoryStore, mail::LogMailer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let auth = AuthManager::new(
//!         store,
//!         Arc::new(SystemClock),
//!         Arc::new(LogMailer),
//!         AuthSettings::new("a-jwt-secret-of-at-least-32-bytes!!", "pepper-pepper-16"),
//!     );
//!
//!     let session = auth
//!         .register(RegisterRequest {
//!             email: "reader@example.com".to_string(),
//!             password: "flashcards42".to_string(),
//!             first_name: None,
//!             last_name: None,
//!         })
//!         .await?;
//!     println!("Registered user: {}", session.user.email);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{AuthError, AuthResult};
pub use manager::{AuthManager, AuthSettings, is_valid_email};
pub use models::{
    AccessTokenClaims, AuthSession, AuthToken, LoginRequest, MagicLinkOutcome, RegisterRequest,
    TokenKind,
};
