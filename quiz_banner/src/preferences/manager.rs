//! Per-principal preferences, created lazily with defaults.

use super::{
    errors::{PreferencesError, PreferencesResult},
    models::{Preferences, PreferencesPatch},
};
use crate::{
    clock::Clock,
    db::PreferencesRepository,
    tier::{Feature, Tier, TierLimits},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct PreferencesManager {
    store: Arc<dyn PreferencesRepository>,
    clock: Arc<dyn Clock>,
}

impl PreferencesManager {
    pub fn new(store: Arc<dyn PreferencesRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Stored preferences, or freshly persisted defaults on first read
    pub async fn get_or_create_default(&self, owner: &str) -> PreferencesResult<Preferences> {
        if let Some(preferences) = self.store.find_preferences(owner).await? {
            return Ok(preferences);
        }

        let preferences = Preferences::defaults(owner, self.clock.now());
        self.store.upsert_preferences(&preferences).await?;
        log::debug!("Created default preferences for {}", owner);
        Ok(preferences)
    }

    /// Merge a partial update. Custom palettes need a tier that allows them.
    pub async fn update(
        &self,
        owner: &str,
        tier: Tier,
        patch: PreferencesPatch,
    ) -> PreferencesResult<Preferences> {
        patch.validate().map_err(PreferencesError::Validation)?;
        if patch.sets_custom_colors() && !TierLimits::for_tier(tier).allows(Feature::CustomColors) {
            return Err(PreferencesError::FeatureLocked {
                feature: Feature::CustomColors,
                tier,
            });
        }

        let mut preferences = self.get_or_create_default(owner).await?;
        preferences.apply(patch, self.clock.now());
        self.store.upsert_preferences(&preferences).await?;
        Ok(preferences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, db::MemoryStore};
    use chrono::{TimeZone, Utc};

    fn manager() -> PreferencesManager {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 5, 5, 0, 0).unwrap());
        PreferencesManager::new(Arc::new(MemoryStore::new()), Arc::new(clock))
    }

    #[tokio::test]
    async fn test_defaults_created_once() {
        let manager = manager();
        let first = manager.get_or_create_default("g1").await.unwrap();
        assert_eq!(first.duration, 5);
        assert_eq!(first.color_scheme, "default");
        assert_eq!(manager.get_or_create_default("g1").await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_update_creates_row_and_merges() {
        let manager = manager();
        let patch = PreferencesPatch {
            sound_enabled: Some(true),
            ..Default::default()
        };
        let updated = manager.update("g2", Tier::Free, patch).await.unwrap();
        assert!(updated.sound_enabled);
        assert_eq!(updated.banner_height, 80);
    }

    #[tokio::test]
    async fn test_custom_colors_gated() {
        let manager = manager();
        let patch = PreferencesPatch {
            custom_colors: Some(vec!["#112233".to_string()]),
            ..Default::default()
        };
        assert!(matches!(
            manager.update("g3", Tier::Free, patch.clone()).await,
            Err(PreferencesError::FeatureLocked { .. })
        ));
        let updated = manager.update("g3", Tier::Premium, patch).await.unwrap();
        assert_eq!(updated.custom_colors, vec!["#112233".to_string()]);

        // Clearing the palette is always allowed
        let clear = PreferencesPatch {
            custom_colors: Some(Vec::new()),
            ..Default::default()
        };
        assert!(manager.update("g3", Tier::Free, clear).await.is_ok());
    }
}
