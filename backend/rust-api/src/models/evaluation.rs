use std::fmt;
use std::ops::Index;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::Category;

pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 10.0;

const DESIGN_CRITERIA: &[&str] = &[
    "Problem Structuring & Clarification",
    "User-Centric Thinking",
    "Solution Creativity & Breadth",
    "Prioritization & Tradeoffs",
    "Metrics Definition",
    "Communication & Storytelling",
];

const IMPROVEMENT_CRITERIA: &[&str] = &[
    "Diagnosis of Current State",
    "User Impact Awareness",
    "Creativity of Solutions",
    "Prioritization & ROI Thinking",
    "Metrics for Measuring Improvement",
    "Communication",
];

const RCA_CRITERIA: &[&str] = &[
    "Problem Understanding & Clarification",
    "Hypothesis Generation",
    "Logical Depth",
    "Use of Data & Metrics",
    "Conclusion & Next Steps",
    "Communication",
];

const GUESSTIMATE_CRITERIA: &[&str] = &[
    "Problem Breakdown & Structure",
    "Logical Assumptions",
    "Mathematical Accuracy",
    "Sanity Checks",
    "Communication",
];

/// Fixed, ordered scoring criteria of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rubric {
    pub category: Category,
    criteria: &'static [&'static str],
}

impl Rubric {
    pub fn for_category(category: Category) -> Self {
        let criteria = match category {
            Category::Design => DESIGN_CRITERIA,
            Category::Improvement => IMPROVEMENT_CRITERIA,
            Category::Rca => RCA_CRITERIA,
            Category::Guesstimate => GUESSTIMATE_CRITERIA,
        };
        Self { category, criteria }
    }

    pub fn criteria(&self) -> &'static [&'static str] {
        self.criteria
    }

    pub fn contains(&self, criterion: &str) -> bool {
        self.criteria.contains(&criterion)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Feedback {
    pub what_worked_well: String,
    pub areas_to_improve: String,
}

/// Schema-validated grading result. Only constructed by the evaluation
/// gateway after every score has been range-checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub composite_score: f64,
    pub dimension_scores: DimensionScores,
    pub feedback: Feedback,
}

/// Per-criterion scores kept in rubric order.
///
/// Serializes as a plain object whose keys appear in insertion order, so
/// stored records and API responses list criteria the way the rubric does.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimensionScores(Vec<(String, f64)>);

impl DimensionScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a criterion score, keeping the original position on overwrite.
    pub fn insert(&mut self, criterion: impl Into<String>, score: f64) {
        let criterion = criterion.into();
        match self.0.iter_mut().find(|(name, _)| *name == criterion) {
            Some(entry) => entry.1 = score,
            None => self.0.push((criterion, score)),
        }
    }

    pub fn get(&self, criterion: &str) -> Option<f64> {
        self.0
            .iter()
            .find(|(name, _)| name == criterion)
            .map(|(_, score)| *score)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, score)| (name.as_str(), *score))
    }

    pub fn criteria(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }
}

impl Index<&str> for DimensionScores {
    type Output = f64;

    fn index(&self, criterion: &str) -> &f64 {
        self.0
            .iter()
            .find(|(name, _)| name == criterion)
            .map(|(_, score)| score)
            .unwrap_or_else(|| panic!("no score for criterion '{}'", criterion))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for DimensionScores {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut scores = DimensionScores::new();
        for (criterion, score) in iter {
            scores.insert(criterion, score);
        }
        scores
    }
}

impl Serialize for DimensionScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (criterion, score) in &self.0 {
            map.serialize_entry(criterion, score)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DimensionScores {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScoresVisitor;

        impl<'de> Visitor<'de> for ScoresVisitor {
            type Value = DimensionScores;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of criterion names to scores")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut scores = DimensionScores::new();
                while let Some((criterion, score)) = access.next_entry::<String, f64>()? {
                    scores.insert(criterion, score);
                }
                Ok(scores)
            }
        }

        deserializer.deserialize_map(ScoresVisitor)
    }
}
