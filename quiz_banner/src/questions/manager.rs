//! Tenant-scoped question store with tier quotas.

use super::{
    errors::{QuestionError, QuestionResult},
    models::{NewQuestion, Question, QuestionPatch},
};
use crate::{
    clock::Clock,
    db::{QuestionRepository, TemplateRepository},
    tier::{self, Feature, Tier, TierLimits},
};
use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};
use uuid::Uuid;

/// Question manager
///
/// Every operation takes the owner key of the resolved principal and never
/// touches rows of another owner. Foreign rows look exactly like missing ones.
#[derive(Clone)]
pub struct QuestionManager {
    questions: Arc<dyn QuestionRepository>,
    templates: Arc<dyn TemplateRepository>,
    clock: Arc<dyn Clock>,
}

impl QuestionManager {
    pub fn new<S>(store: Arc<S>, clock: Arc<dyn Clock>) -> Self
    where
        S: QuestionRepository + TemplateRepository + 'static,
    {
        Self {
            questions: store.clone(),
            templates: store,
            clock,
        }
    }

    pub async fn list(&self, owner: &str) -> QuestionResult<Vec<Question>> {
        Ok(self.questions.list_questions(owner).await?)
    }

    pub async fn get(&self, id: &str, owner: &str) -> QuestionResult<Question> {
        self.questions
            .find_question(id, owner)
            .await?
            .ok_or(QuestionError::NotFound)
    }

    /// Add one question after checking the owner's quota
    pub async fn create(
        &self,
        owner: &str,
        tier: Tier,
        data: NewQuestion,
    ) -> QuestionResult<Question> {
        let current = self.count(owner).await?;
        if !tier::check_quota(current, tier) {
            log::info!("Quota reached for {} ({} of {})", owner, current, tier::limit_for(tier));
            return Err(QuestionError::QuotaExceeded {
                current,
                limit: tier::limit_for(tier),
                tier,
            });
        }
        data.validate().map_err(QuestionError::Validation)?;

        let order = self.next_order(owner).await?;
        let question = data.into_question(Uuid::new_v4().to_string(), owner, order, self.clock.now());
        self.questions
            .insert_questions(std::slice::from_ref(&question))
            .await?;

        log::debug!("Created question {} for {}", question.id, owner);
        Ok(question)
    }

    pub async fn update(
        &self,
        id: &str,
        owner: &str,
        patch: QuestionPatch,
    ) -> QuestionResult<Question> {
        patch.validate().map_err(QuestionError::Validation)?;

        let mut question = self.get(id, owner).await?;
        question.apply(patch, self.clock.now());
        if !self.questions.update_question(&question).await? {
            return Err(QuestionError::NotFound);
        }
        Ok(question)
    }

    /// Delete one question; deleting a missing one is not an error
    pub async fn delete(&self, id: &str, owner: &str) -> QuestionResult<bool> {
        Ok(self.questions.delete_question(id, owner).await?)
    }

    /// Delete every question of the owner, returning how many were removed
    pub async fn delete_all(&self, owner: &str) -> QuestionResult<u64> {
        let removed = self.questions.delete_all_questions(owner).await?;
        log::info!("Deleted {} questions of {}", removed, owner);
        Ok(removed)
    }

    /// Set `order = position` for each ID.
    ///
    /// IDs the owner does not have are skipped. For a repeated ID the last
    /// position wins. Returns the number of questions updated.
    pub async fn reorder(&self, owner: &str, ids: &[String]) -> QuestionResult<usize> {
        let mut positions: HashMap<&str, i32> = HashMap::with_capacity(ids.len());
        for (index, id) in ids.iter().enumerate() {
            let order = i32::try_from(index)
                .map_err(|_| QuestionError::Validation("too many question IDs".to_string()))?;
            positions.insert(id.as_str(), order);
        }

        let mut updated = 0;
        for (id, order) in positions {
            if self.questions.set_question_order(id, owner, order).await? {
                updated += 1;
            }
        }
        Ok(updated)
    }

    pub async fn record_review(
        &self,
        id: &str,
        owner: &str,
        correct: bool,
    ) -> QuestionResult<Question> {
        let mut question = self.get(id, owner).await?;
        question.record_review(correct, self.clock.now());
        if !self.questions.update_question(&question).await? {
            return Err(QuestionError::NotFound);
        }
        Ok(question)
    }

    /// Bulk create. Premium only; the batch is accepted or rejected as a whole.
    pub async fn import(
        &self,
        owner: &str,
        tier: Tier,
        items: Vec<NewQuestion>,
    ) -> QuestionResult<Vec<Question>> {
        if !TierLimits::for_tier(tier).allows(Feature::BulkImport) {
            return Err(QuestionError::FeatureLocked {
                feature: Feature::BulkImport,
                tier,
            });
        }
        for (index, item) in items.iter().enumerate() {
            item.validate()
                .map_err(|e| QuestionError::Validation(format!("question {}: {}", index + 1, e)))?;
        }
        self.insert_batch(owner, tier, items).await
    }

    /// Copy a template's items into the owner's deck
    pub async fn apply_template(
        &self,
        owner: &str,
        tier: Tier,
        template_id: &str,
    ) -> QuestionResult<Vec<Question>> {
        let template = self
            .templates
            .find_template(template_id)
            .await?
            .ok_or(QuestionError::TemplateNotFound)?;

        let items = template
            .items
            .into_iter()
            .map(|item| NewQuestion {
                category: Some(template.category.clone()),
                ..NewQuestion::new(item.question, item.answer)
            })
            .collect();
        self.insert_batch(owner, tier, items).await
    }

    /// Distinct categories in the owner's deck, sorted
    pub async fn categories(&self, owner: &str) -> QuestionResult<Vec<String>> {
        let categories: BTreeSet<String> = self
            .questions
            .list_questions(owner)
            .await?
            .into_iter()
            .filter_map(|q| q.category)
            .collect();
        Ok(categories.into_iter().collect())
    }

    async fn insert_batch(
        &self,
        owner: &str,
        tier: Tier,
        items: Vec<NewQuestion>,
    ) -> QuestionResult<Vec<Question>> {
        if items.is_empty() {
            return Err(QuestionError::Validation("no questions given".to_string()));
        }

        let current = self.count(owner).await?;
        if !tier::check_batch_quota(current, items.len(), tier) {
            return Err(QuestionError::QuotaExceeded {
                current,
                limit: tier::limit_for(tier),
                tier,
            });
        }

        let now = self.clock.now();
        let mut order = self.next_order(owner).await?;
        let mut questions = Vec::with_capacity(items.len());
        for item in items {
            questions.push(item.into_question(Uuid::new_v4().to_string(), owner, order, now));
            order = order.saturating_add(1);
        }
        self.questions.insert_questions(&questions).await?;

        log::info!("Added {} questions for {}", questions.len(), owner);
        Ok(questions)
    }

    async fn count(&self, owner: &str) -> QuestionResult<usize> {
        let count = self.questions.count_questions(owner).await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn next_order(&self, owner: &str) -> QuestionResult<i32> {
        Ok(self
            .questions
            .max_order(owner)
            .await?
            .map_or(0, |max| max.saturating_add(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        db::MemoryStore,
        templates::{Template, TemplateItem},
    };
    use chrono::{TimeZone, Utc};

    fn setup() -> (QuestionManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap());
        (QuestionManager::new(store.clone(), Arc::new(clock)), store)
    }

    fn batch(n: usize) -> Vec<NewQuestion> {
        (0..n)
            .map(|i| NewQuestion::new(format!("q{i}"), format!("a{i}")))
            .collect()
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_order() {
        let (manager, _) = setup();
        let first = manager.create("g1", Tier::Free, NewQuestion::new("q", "a")).await.unwrap();
        let second = manager.create("g1", Tier::Free, NewQuestion::new("q", "a")).await.unwrap();
        assert_eq!(first.order, 0);
        assert_eq!(second.order, 1);
    }

    #[tokio::test]
    async fn test_invalid_input_rejected() {
        let (manager, _) = setup();
        let result = manager.create("g1", Tier::Free, NewQuestion::new(" ", "a")).await;
        assert!(matches!(result, Err(QuestionError::Validation(_))));
        assert!(manager.list("g1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_of_foreign_question_is_not_found() {
        let (manager, _) = setup();
        let q = manager.create("owner", Tier::Free, NewQuestion::new("q", "a")).await.unwrap();
        let patch = QuestionPatch {
            answer: Some("b".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            manager.update(&q.id, "intruder", patch.clone()).await,
            Err(QuestionError::NotFound)
        ));
        let updated = manager.update(&q.id, "owner", patch).await.unwrap();
        assert_eq!(updated.answer, "b");
    }

    #[tokio::test]
    async fn test_reorder_skips_unknown_and_last_duplicate_wins() {
        let (manager, _) = setup();
        let a = manager.create("g1", Tier::Free, NewQuestion::new("a", "a")).await.unwrap();
        let b = manager.create("g1", Tier::Free, NewQuestion::new("b", "b")).await.unwrap();

        let ids = vec![a.id.clone(), "nope".to_string(), b.id.clone(), a.id.clone()];
        assert_eq!(manager.reorder("g1", &ids).await.unwrap(), 2);

        let listed: Vec<String> = manager.list("g1").await.unwrap().into_iter().map(|q| q.id).collect();
        assert_eq!(listed, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn test_import_is_premium_and_all_or_nothing() {
        let (manager, _) = setup();
        assert!(matches!(
            manager.import("g1", Tier::Free, batch(2)).await,
            Err(QuestionError::FeatureLocked { feature: Feature::BulkImport, .. })
        ));

        manager.import("g1", Tier::Premium, batch(45)).await.unwrap();
        assert!(matches!(
            manager.import("g1", Tier::Premium, batch(6)).await,
            Err(QuestionError::QuotaExceeded { current: 45, limit: 50, .. })
        ));
        assert_eq!(manager.list("g1").await.unwrap().len(), 45);

        let added = manager.import("g1", Tier::Premium, batch(5)).await.unwrap();
        assert_eq!(added.last().map(|q| q.order), Some(49));
    }

    #[tokio::test]
    async fn test_apply_template_and_categories() {
        let (manager, store) = setup();
        let template = Template {
            id: "t1".to_string(),
            name: "Capitals".to_string(),
            description: None,
            category: "Geography".to_string(),
            items: vec![
                TemplateItem {
                    question: "France?".to_string(),
                    answer: "Paris".to_string(),
                },
                TemplateItem {
                    question: "Japan?".to_string(),
                    answer: "Tokyo".to_string(),
                },
            ],
            created_at: Utc::now(),
        };
        store.insert_template(&template).await.unwrap();

        let mut history = NewQuestion::new("1066?", "Hastings");
        history.category = Some("History".to_string());
        manager.create("g1", Tier::Free, history).await.unwrap();

        let added = manager.apply_template("g1", Tier::Free, "t1").await.unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(
            manager.categories("g1").await.unwrap(),
            vec!["Geography".to_string(), "History".to_string()]
        );
        assert!(matches!(
            manager.apply_template("g1", Tier::Free, "missing").await,
            Err(QuestionError::TemplateNotFound)
        ));
    }

    #[tokio::test]
    async fn test_review_updates_stats() {
        let (manager, _) = setup();
        let q = manager.create("g1", Tier::Free, NewQuestion::new("q", "a")).await.unwrap();
        let reviewed = manager.record_review(&q.id, "g1", true).await.unwrap();
        assert_eq!(reviewed.times_reviewed, 1);
        assert!(reviewed.performance_score > 0.5);
        assert_eq!(manager.get(&q.id, "g1").await.unwrap(), reviewed);
    }
}
