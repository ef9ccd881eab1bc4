//! Shared question templates.
//!
//! Templates are global, not tenant scoped. Copying one into a deck goes
//! through [`crate::questions::QuestionManager::apply_template`] so the quota
//! still applies there.

use crate::{
    clock::Clock,
    db::{StoreError, TemplateRepository},
    questions::models::{validate_category, validate_text},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

const MAX_ITEMS: usize = 100;
const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 1000;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Template not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),
}

impl TemplateError {
    pub fn client_message(&self) -> String {
        match self {
            TemplateError::Store(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type TemplateResult<T> = Result<T, TemplateError>;

/// One question/answer pair of a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateItem {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub items: Vec<TemplateItem>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    pub items: Vec<TemplateItem>,
}

impl NewTemplate {
    pub fn validate(&self) -> Result<(), String> {
        let name_len = self.name.trim().chars().count();
        if name_len == 0 || name_len > MAX_NAME_LEN {
            return Err(format!("name must be 1-{MAX_NAME_LEN} characters"));
        }
        if self
            .description
            .as_ref()
            .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN)
        {
            return Err(format!(
                "description must be at most {MAX_DESCRIPTION_LEN} characters"
            ));
        }
        if self.category.trim().is_empty() {
            return Err("category is required".to_string());
        }
        validate_category(&self.category)?;
        if self.items.is_empty() || self.items.len() > MAX_ITEMS {
            return Err(format!("a template needs 1-{MAX_ITEMS} items"));
        }
        for item in &self.items {
            validate_text("question", &item.question)?;
            validate_text("answer", &item.answer)?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct TemplateManager {
    store: Arc<dyn TemplateRepository>,
    clock: Arc<dyn Clock>,
}

impl TemplateManager {
    pub fn new(store: Arc<dyn TemplateRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// All templates by name, optionally narrowed to a category
    pub async fn list(&self, category: Option<&str>) -> TemplateResult<Vec<Template>> {
        Ok(self.store.list_templates(category).await?)
    }

    pub async fn get(&self, id: &str) -> TemplateResult<Template> {
        self.store
            .find_template(id)
            .await?
            .ok_or(TemplateError::NotFound)
    }

    pub async fn create(&self, new: NewTemplate) -> TemplateResult<Template> {
        new.validate().map_err(TemplateError::Validation)?;

        let template = Template {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            description: new.description.map(|d| d.trim().to_string()),
            category: new.category.trim().to_string(),
            items: new
                .items
                .into_iter()
                .map(|item| TemplateItem {
                    question: item.question.trim().to_string(),
                    answer: item.answer.trim().to_string(),
                })
                .collect(),
            created_at: self.clock.now(),
        };
        self.store.insert_template(&template).await?;
        log::info!("Created template {} ({} items)", template.id, template.items.len());
        Ok(template)
    }

    /// Idempotent; returns whether a template was removed
    pub async fn delete(&self, id: &str) -> TemplateResult<bool> {
        Ok(self.store.delete_template(id).await?)
    }
}
