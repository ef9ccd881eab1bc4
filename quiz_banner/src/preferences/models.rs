//! Display and study preference models.

use crate::questions::models::{validate_color, validate_duration};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MAX_CUSTOM_COLORS: usize = 10;

/// Per-principal display and study settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(rename = "userId")]
    pub owner_id: String,
    pub duration: i32,
    pub banner_height: i32,
    pub font_size: i32,
    pub sound_enabled: bool,
    pub shuffle: bool,
    pub spaced_repetition: bool,
    pub color_scheme: String,
    pub custom_colors: Vec<String>,
    pub selected_categories: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl Preferences {
    /// Defaults used when a principal reads preferences for the first time
    pub fn defaults(owner_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            duration: 5,
            banner_height: 80,
            font_size: 18,
            sound_enabled: false,
            shuffle: false,
            spaced_repetition: false,
            color_scheme: "default".to_string(),
            custom_colors: Vec::new(),
            selected_categories: Vec::new(),
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: PreferencesPatch, now: DateTime<Utc>) {
        if let Some(v) = patch.duration {
            self.duration = v;
        }
        if let Some(v) = patch.banner_height {
            self.banner_height = v;
        }
        if let Some(v) = patch.font_size {
            self.font_size = v;
        }
        if let Some(v) = patch.sound_enabled {
            self.sound_enabled = v;
        }
        if let Some(v) = patch.shuffle {
            self.shuffle = v;
        }
        if let Some(v) = patch.spaced_repetition {
            self.spaced_repetition = v;
        }
        if let Some(v) = patch.color_scheme {
            self.color_scheme = v;
        }
        if let Some(v) = patch.custom_colors {
            self.custom_colors = v;
        }
        if let Some(v) = patch.selected_categories {
            self.selected_categories = v;
        }
        self.updated_at = now;
    }
}

/// Partial preferences update
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    pub duration: Option<i32>,
    pub banner_height: Option<i32>,
    pub font_size: Option<i32>,
    pub sound_enabled: Option<bool>,
    pub shuffle: Option<bool>,
    pub spaced_repetition: Option<bool>,
    pub color_scheme: Option<String>,
    pub custom_colors: Option<Vec<String>>,
    pub selected_categories: Option<Vec<String>>,
}

impl PreferencesPatch {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(duration) = self.duration {
            validate_duration(duration)?;
        }
        if let Some(height) = self.banner_height {
            if !(40..=400).contains(&height) {
                return Err("bannerHeight must be between 40 and 400".to_string());
            }
        }
        if let Some(size) = self.font_size {
            if !(8..=72).contains(&size) {
                return Err("fontSize must be between 8 and 72".to_string());
            }
        }
        if let Some(scheme) = &self.color_scheme {
            if scheme.trim().is_empty() || scheme.len() > 50 {
                return Err("colorScheme must be 1-50 characters".to_string());
            }
        }
        if let Some(colors) = &self.custom_colors {
            if colors.len() > MAX_CUSTOM_COLORS {
                return Err(format!("at most {MAX_CUSTOM_COLORS} custom colors"));
            }
            for color in colors {
                validate_color(color)?;
            }
        }
        Ok(())
    }

    /// Whether the update sets a non-empty custom palette
    pub fn sets_custom_colors(&self) -> bool {
        self.custom_colors.as_ref().is_some_and(|c| !c.is_empty())
    }
}
