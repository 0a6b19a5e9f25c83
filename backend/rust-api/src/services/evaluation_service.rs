use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::error::{CoreError, CoreResult};
use crate::metrics::EVALUATIONS_TOTAL;
use crate::models::evaluation::{MAX_SCORE, MIN_SCORE};
use crate::models::{ConversationLog, DimensionScores, Evaluation, Feedback, Question, Rubric};
use crate::services::llm::{Generated, TextGenerator};

const COMPOSITE_KEY: &str = "composite_score";
const DIMENSIONS_KEY: &str = "dimension_scores";
const STRENGTHS_KEY: &str = "what_worked_well";
const IMPROVEMENTS_KEY: &str = "areas_to_improve";

/// Grades a finished transcript against the category rubric and returns only
/// schema-valid results.
#[derive(Clone)]
pub struct EvaluationGateway {
    generator: Arc<dyn TextGenerator>,
}

impl EvaluationGateway {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn evaluate(&self, question: &Question, log: &ConversationLog) -> CoreResult<Evaluation> {
        let rubric = Rubric::for_category(question.category);
        let schema = response_schema(&rubric);
        let prompt = evaluation_prompt(question, &rubric, log);
        tracing::debug!(
            category = %question.category,
            prompt_chars = prompt.len(),
            turns = log.len(),
            "Requesting evaluation"
        );

        let generated = match self.generator.generate(&prompt, Some(&schema)).await {
            Ok(generated) => generated,
            Err(e) => {
                EVALUATIONS_TOTAL.with_label_values(&["failed"]).inc();
                return Err(CoreError::GenerationFailure(format!("{:#}", e)));
            }
        };

        match parse_evaluation(generated, &rubric) {
            Ok(evaluation) => {
                EVALUATIONS_TOTAL.with_label_values(&["valid"]).inc();
                Ok(evaluation)
            }
            Err(reason) => {
                EVALUATIONS_TOTAL
                    .with_label_values(&["contract_violation"])
                    .inc();
                tracing::warn!(category = %question.category, %reason, "Evaluation rejected");
                Err(CoreError::EvaluationContractViolation(reason))
            }
        }
    }
}

/// JSON schema declared to the grader for `rubric`.
pub fn response_schema(rubric: &Rubric) -> Value {
    let score = json!({ "type": "number", "minimum": MIN_SCORE, "maximum": MAX_SCORE });
    let dimensions: Map<String, Value> = rubric
        .criteria()
        .iter()
        .map(|criterion| (criterion.to_string(), score.clone()))
        .collect();

    json!({
        "type": "object",
        "properties": {
            COMPOSITE_KEY: score,
            DIMENSIONS_KEY: {
                "type": "object",
                "properties": dimensions,
                "required": rubric.criteria(),
                "additionalProperties": false
            },
            STRENGTHS_KEY: { "type": "string" },
            IMPROVEMENTS_KEY: { "type": "string" }
        },
        "required": [COMPOSITE_KEY, DIMENSIONS_KEY, STRENGTHS_KEY, IMPROVEMENTS_KEY]
    })
}

pub fn evaluation_prompt(question: &Question, rubric: &Rubric, log: &ConversationLog) -> String {
    let quoted = rubric
        .criteria()
        .iter()
        .map(|criterion| format!("\"{}\"", criterion))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "# Product Interview - Evaluation Mode\n\n\
         ## Role\n\
         You are an extremely strict product interview evaluator. Most candidates score poorly. \
         A score above 6 should be rare and only for genuinely good performance. \
         DEFAULT TO LOW SCORES.\n\n\
         ## Critical rule: score only observable evidence\n\
         - If you cannot find specific evidence for a criterion in the conversation, its score is 1.\n\
         - Count candidate messages with actual work (not just greetings or \"I'm done\"). \
         With 2 or fewer substantive messages, every score is 1.\n\
         - If the core task was not completed, no score exceeds 3.\n\n\
         ## Scoring scale\n\
         - 1-3: weak, major gaps, shallow or incoherent\n\
         - 4-6: average, some structure but lacks depth\n\
         - 7-8: strong, solid structured answer with minor gaps\n\
         - 9-10: exceptional, interview-ready\n\n\
         ## Interview\n\
         **Question Type:** {category}\n\
         **Question:** {question}\n\n\
         **Conversation:**\n{transcript}\n\n\
         **Evaluation Criteria:** {criteria}\n\n\
         You must score each of these exact criteria from 1 to 10: {quoted}. \
         The composite_score is the arithmetic mean of all criterion scores. \
         Be constructive and specific in what_worked_well and areas_to_improve.",
        category = question.category.label(),
        question = question.question_text,
        transcript = log.transcript(),
        criteria = rubric.criteria().join(", "),
        quoted = quoted,
    )
}

/// Turns whatever the grader returned into a validated [`Evaluation`].
pub fn parse_evaluation(generated: Generated, rubric: &Rubric) -> Result<Evaluation, String> {
    let value = match generated {
        Generated::Json(value) => value,
        Generated::Text(text) => extract_json_object(&text)
            .ok_or_else(|| "response contains no JSON object".to_string())?,
    };
    validate(&value, rubric)
}

/// Finds a JSON object in free text: the whole text, a fenced code block, or
/// the outermost braces.
fn extract_json_object(text: &str) -> Option<Value> {
    let text = text.trim();
    let as_object = |candidate: &str| match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    };

    if let Some(value) = as_object(text) {
        return Some(value);
    }

    if let Some(start) = text.find("```") {
        let fenced = &text[start + 3..];
        let fenced = fenced.strip_prefix("json").unwrap_or(fenced);
        if let Some(end) = fenced.find("```") {
            if let Some(value) = as_object(&fenced[..end]) {
                return Some(value);
            }
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    as_object(&text[start..=end])
}

fn validate(value: &Value, rubric: &Rubric) -> Result<Evaluation, String> {
    let object = value
        .as_object()
        .ok_or_else(|| "response is not a JSON object".to_string())?;

    let composite_score = score(object.get(COMPOSITE_KEY), COMPOSITE_KEY)?;

    let dimensions = object
        .get(DIMENSIONS_KEY)
        .ok_or_else(|| format!("missing required key '{}'", DIMENSIONS_KEY))?
        .as_object()
        .ok_or_else(|| format!("'{}' is not an object", DIMENSIONS_KEY))?;

    if let Some(extra) = dimensions.keys().find(|key| !rubric.contains(key)) {
        return Err(format!("unexpected rubric criterion '{}'", extra));
    }

    let mut dimension_scores = DimensionScores::new();
    for criterion in rubric.criteria() {
        let value = score(dimensions.get(*criterion), criterion)?;
        dimension_scores.insert(*criterion, value);
    }

    let feedback = Feedback {
        what_worked_well: text(object.get(STRENGTHS_KEY), STRENGTHS_KEY)?,
        areas_to_improve: text(object.get(IMPROVEMENTS_KEY), IMPROVEMENTS_KEY)?,
    };

    Ok(Evaluation {
        composite_score,
        dimension_scores,
        feedback,
    })
}

fn score(value: Option<&Value>, key: &str) -> Result<f64, String> {
    let value = value.ok_or_else(|| format!("missing required key '{}'", key))?;
    let number = value
        .as_f64()
        .ok_or_else(|| format!("'{}' is not a number", key))?;
    if !(MIN_SCORE..=MAX_SCORE).contains(&number) {
        return Err(format!(
            "'{}' = {} is outside [{}, {}]",
            key, number, MIN_SCORE, MAX_SCORE
        ));
    }
    Ok(number)
}

fn text(value: Option<&Value>, key: &str) -> Result<String, String> {
    value
        .ok_or_else(|| format!("missing required key '{}'", key))?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| format!("'{}' is not a string", key))
}
