//! Request principals and their resolution.

pub mod errors;
pub mod principal;
pub mod resolver;

pub use errors::{IdentityError, IdentityResult};
pub use principal::{
    Account, GuestAccount, GuestId, Identity, Principal, PrincipalRef, UserAccount, UserId,
};
pub use resolver::{AuthRequirement, Credentials, IdentityResolver, validate_guest_id};
