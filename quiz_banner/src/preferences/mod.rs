//! Display and study preferences, one row per principal.

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{PreferencesError, PreferencesResult};
pub use manager::PreferencesManager;
pub use models::{Preferences, PreferencesPatch};
