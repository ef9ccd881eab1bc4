//! Question data models and input validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Default banner duration in seconds
pub const DEFAULT_DURATION_SECS: i32 = 5;

/// Performance score of a question that was never reviewed
pub const INITIAL_PERFORMANCE_SCORE: f64 = 0.5;

/// Weight of the running score when folding in a new review
pub const SCORE_DECAY: f64 = 0.7;

const MAX_TEXT_LEN: usize = 1000;
const MAX_CATEGORY_LEN: usize = 100;
const MAX_TAGS: usize = 20;
const MAX_TAG_LEN: usize = 50;
const MAX_DURATION_SECS: i32 = 300;

/// Question ID type
pub type QuestionId = String;

/// A question/answer pair owned by one principal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    /// Owner key: a user ID or a guest ID
    #[serde(rename = "userId")]
    pub owner_id: String,
    pub question: String,
    pub answer: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub duration: i32,
    pub color: Option<String>,
    pub times_reviewed: i32,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub performance_score: f64,
    pub order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Question {
    /// Fold one review outcome into the statistics
    pub fn record_review(&mut self, correct: bool, now: DateTime<Utc>) {
        let outcome = if correct { 1.0 } else { 0.0 };
        let score = SCORE_DECAY * self.performance_score + (1.0 - SCORE_DECAY) * outcome;
        self.performance_score = score.clamp(0.0, 1.0);
        self.times_reviewed = self.times_reviewed.saturating_add(1);
        self.last_reviewed = Some(now);
        self.updated_at = now;
    }

    /// Merge a partial update
    pub fn apply(&mut self, patch: QuestionPatch, now: DateTime<Utc>) {
        if let Some(question) = patch.question {
            self.question = question.trim().to_string();
        }
        if let Some(answer) = patch.answer {
            self.answer = answer.trim().to_string();
        }
        if let Some(category) = patch.category {
            self.category = normalize_category(category);
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(duration) = patch.duration {
            self.duration = duration;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(score) = patch.performance_score {
            self.performance_score = score;
        }
        if let Some(order) = patch.order {
            self.order = order;
        }
        self.updated_at = now;
    }
}

/// Input for creating a question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub duration: Option<i32>,
    #[serde(default)]
    pub color: Option<String>,
}

impl NewQuestion {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_text("question", &self.question)?;
        validate_text("answer", &self.answer)?;
        if let Some(category) = &self.category {
            validate_category(category)?;
        }
        validate_tags(&self.tags)?;
        if let Some(duration) = self.duration {
            validate_duration(duration)?;
        }
        if let Some(color) = &self.color {
            validate_color(color)?;
        }
        Ok(())
    }

    /// Build the stored record with server-assigned defaults
    pub fn into_question(
        self,
        id: QuestionId,
        owner_id: &str,
        order: i32,
        now: DateTime<Utc>,
    ) -> Question {
        Question {
            id,
            owner_id: owner_id.to_string(),
            question: self.question.trim().to_string(),
            answer: self.answer.trim().to_string(),
            category: self.category.and_then(|c| normalize_category(Some(c))),
            tags: self.tags,
            duration: self.duration.unwrap_or(DEFAULT_DURATION_SECS),
            color: self.color,
            times_reviewed: 0,
            last_reviewed: None,
            performance_score: INITIAL_PERFORMANCE_SCORE,
            order,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update; absent fields are left untouched, `null` clears nullable ones
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPatch {
    pub question: Option<String>,
    pub answer: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub duration: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub color: Option<Option<String>>,
    pub performance_score: Option<f64>,
    pub order: Option<i32>,
}

impl QuestionPatch {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(question) = &self.question {
            validate_text("question", question)?;
        }
        if let Some(answer) = &self.answer {
            validate_text("answer", answer)?;
        }
        if let Some(Some(category)) = &self.category {
            validate_category(category)?;
        }
        if let Some(tags) = &self.tags {
            validate_tags(tags)?;
        }
        if let Some(duration) = self.duration {
            validate_duration(duration)?;
        }
        if let Some(Some(color)) = &self.color {
            validate_color(color)?;
        }
        if let Some(score) = self.performance_score {
            if !(0.0..=1.0).contains(&score) {
                return Err("performanceScore must be between 0 and 1".to_string());
            }
        }
        Ok(())
    }
}

/// Distinguishes an explicit `null` from an absent field
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn normalize_category(category: Option<String>) -> Option<String> {
    category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

pub(crate) fn validate_text(field: &str, value: &str) -> Result<(), String> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(format!("{field} is required"));
    }
    if len > MAX_TEXT_LEN {
        return Err(format!("{field} must be at most {MAX_TEXT_LEN} characters"));
    }
    Ok(())
}

pub(crate) fn validate_category(category: &str) -> Result<(), String> {
    if category.chars().count() > MAX_CATEGORY_LEN {
        return Err(format!(
            "category must be at most {MAX_CATEGORY_LEN} characters"
        ));
    }
    Ok(())
}

fn validate_tags(tags: &[String]) -> Result<(), String> {
    if tags.len() > MAX_TAGS {
        return Err(format!("at most {MAX_TAGS} tags are allowed"));
    }
    if tags
        .iter()
        .any(|t| t.trim().is_empty() || t.chars().count() > MAX_TAG_LEN)
    {
        return Err(format!("tags must be 1-{MAX_TAG_LEN} characters"));
    }
    Ok(())
}

pub(crate) fn validate_duration(duration: i32) -> Result<(), String> {
    if !(1..=MAX_DURATION_SECS).contains(&duration) {
        return Err(format!(
            "duration must be between 1 and {MAX_DURATION_SECS} seconds"
        ));
    }
    Ok(())
}

/// Accepts `#RRGGBB`
pub(crate) fn validate_color(color: &str) -> Result<(), String> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(format!("invalid color '{color}', expected #RRGGBB"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_question_defaults() {
        let now = Utc::now();
        let q = NewQuestion::new("  Capital of France? ", "Paris").into_question(
            "q1".to_string(),
            "guest_1",
            0,
            now,
        );
        assert_eq!(q.question, "Capital of France?");
        assert_eq!(q.duration, DEFAULT_DURATION_SECS);
        assert_eq!(q.times_reviewed, 0);
        assert_eq!(q.performance_score, INITIAL_PERFORMANCE_SCORE);
        assert_eq!(q.owner_id, "guest_1");
    }

    #[test]
    fn test_validation_rejects_bad_input() {
        assert!(NewQuestion::new("", "a").validate().is_err());
        assert!(NewQuestion::new("q", "a").validate().is_ok());

        let mut q = NewQuestion::new("q", "a");
        q.duration = Some(0);
        assert!(q.validate().is_err());

        let mut q = NewQuestion::new("q", "a");
        q.color = Some("red".to_string());
        assert!(q.validate().is_err());
        q.color = Some("#FFaa00".to_string());
        assert!(q.validate().is_ok());
    }

    #[test]
    fn test_review_moves_score_toward_outcome() {
        let now = Utc::now();
        let mut q = NewQuestion::new("q", "a").into_question("q1".into(), "o", 0, now);
        q.record_review(true, now);
        assert!((q.performance_score - 0.65).abs() < 1e-9);
        assert_eq!(q.times_reviewed, 1);
        assert_eq!(q.last_reviewed, Some(now));

        for _ in 0..50 {
            q.record_review(false, now);
        }
        assert!(q.performance_score >= 0.0 && q.performance_score < 0.01);
    }

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let patch: QuestionPatch = serde_json::from_str(r#"{"category": null}"#).unwrap();
        assert_eq!(patch.category, Some(None));

        let patch: QuestionPatch = serde_json::from_str(r#"{"answer": "b"}"#).unwrap();
        assert_eq!(patch.category, None);
        assert_eq!(patch.answer.as_deref(), Some("b"));
    }

    #[test]
    fn test_patch_rejects_score_out_of_range() {
        let patch = QuestionPatch {
            performance_score: Some(1.5),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn test_apply_patch_clears_category() {
        let now = Utc::now();
        let mut new = NewQuestion::new("q", "a");
        new.category = Some("geo".to_string());
        let mut q = new.into_question("q1".into(), "o", 0, now);

        q.apply(
            QuestionPatch {
                category: Some(None),
                question: Some("q2".to_string()),
                ..Default::default()
            },
            now,
        );
        assert_eq!(q.category, None);
        assert_eq!(q.question, "q2");
        assert_eq!(q.answer, "a");
    }
}
