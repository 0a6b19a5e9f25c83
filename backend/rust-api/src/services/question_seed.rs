use uuid::Uuid;

use crate::error::CoreResult;
use crate::models::{Category, Difficulty, Question};
use crate::services::store::MongoStore;

const SAMPLE_QUESTIONS: [(&str, Category, Difficulty); 6] = [
    (
        "Design a mobile app for busy parents to manage their family's schedule and activities.",
        Category::Design,
        Difficulty::Intermediate,
    ),
    (
        "How would you improve the user experience of online grocery shopping?",
        Category::Improvement,
        Difficulty::Intermediate,
    ),
    (
        "Instagram Stories engagement has dropped by 15% over the past month. What could be causing this and how would you investigate?",
        Category::Rca,
        Difficulty::Intermediate,
    ),
    (
        "Estimate the number of pizza slices consumed in New York City on a typical Friday night.",
        Category::Guesstimate,
        Difficulty::Intermediate,
    ),
    (
        "Design a product to help remote workers stay connected with their colleagues.",
        Category::Design,
        Difficulty::Beginner,
    ),
    (
        "How would you improve the checkout process for an e-commerce website?",
        Category::Improvement,
        Difficulty::Beginner,
    ),
];

/// Starter question bank, one fresh id per question.
pub fn sample_questions() -> Vec<Question> {
    SAMPLE_QUESTIONS
        .iter()
        .map(|(text, category, difficulty)| Question {
            id: Uuid::new_v4().to_string(),
            question_text: (*text).to_string(),
            category: *category,
            difficulty: *difficulty,
        })
        .collect()
}

/// Inserts the sample questions when the collection is empty.
///
/// Returns the number of inserted questions.
pub async fn ensure_seeded(store: &MongoStore) -> CoreResult<usize> {
    let existing = store.count_questions().await?;
    if existing > 0 {
        tracing::debug!(existing, "Question bank already populated");
        return Ok(0);
    }

    let questions = sample_questions();
    store.insert_questions(&questions).await?;
    tracing::info!(count = questions.len(), "Sample questions inserted");
    Ok(questions.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_a_sample() {
        let questions = sample_questions();
        assert_eq!(questions.len(), 6);
        for category in Category::ALL {
            assert!(questions.iter().any(|q| q.category == category));
        }
    }

    #[test]
    fn sample_ids_are_unique() {
        let questions = sample_questions();
        let mut ids: Vec<&str> = questions.iter().map(|q| q.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), questions.len());
    }
}
