use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::models::{ConversationLog, Question};
use crate::services::llm::TextGenerator;

const INTERVIEWER_RULES: &str = "\
## Rules
1. Keep it real
   - Act exactly like a real interviewer: professional, conversational and concise.
   - Ask follow-up or probing questions only when they naturally extend the candidate's answer.
   - Do not steer the candidate toward a specific stage, feature or solution.
   - Do not invent new or unrelated questions.
2. Answering clarifications
   - Answer in short, direct sentences (e.g. \"North America\", \"Yes, seasonality is minor\").
   - Never suggest frameworks, metrics or approaches.
3. Handling vague or weak answers
   - Push back with short nudges such as \"Can you be more specific?\" or \"Why would you prioritize that?\"
   - Do not lecture or list options for the candidate.
4. Strict role boundaries
   - Never reveal the rubric, scores or feedback during the interview.
   - No evaluation or guidance until the interview ends.";

/// Synthetic first turn introducing the question. Not generated.
pub fn opening_message(question: &Question, duration_seconds: u64) -> String {
    let minutes = (duration_seconds / 60).max(1);
    format!(
        "Hello! I'll be your interviewer today. We'll be practicing a {} question.\n\n\
         Here's your question:\n\n{}\n\n\
         Take a moment to think about your approach, then walk me through your thinking. \
         I'll ask follow-up questions along the way. You have {} minutes - let's begin!",
        question.category.label(),
        question.question_text,
        minutes
    )
}

/// Prompt for the next interviewer turn, given the log so far.
pub fn interviewer_prompt(question: &Question, log: &ConversationLog) -> String {
    format!(
        "# Product Interviewer - Interview Mode\n\n\
         ## Role\n\
         You are a senior product manager interviewer with 5+ years of experience, \
         conducting a realistic product interview on the question below. \
         Do not create or modify the question.\n\n\
         {rules}\n\n\
         ## Current Interview\n\
         **Question Type**: {category}\n\
         **Question**: \"{question}\"\n\n\
         **Conversation so far**:\n{transcript}\n\n\
         **Instructions**: Respond as a real interviewer would. \
         Keep your reply under 50 words. Be direct and conversational.",
        rules = INTERVIEWER_RULES,
        category = question.category.label(),
        question = question.question_text,
        transcript = log.transcript(),
    )
}

/// Produces interviewer replies through a [`TextGenerator`].
#[derive(Clone)]
pub struct Interviewer {
    generator: Arc<dyn TextGenerator>,
}

impl Interviewer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn next_turn(&self, question: &Question, log: &ConversationLog) -> CoreResult<String> {
        let prompt = interviewer_prompt(question, log);
        tracing::debug!(prompt_chars = prompt.len(), turns = log.len(), "Requesting interviewer turn");

        let reply = self
            .generator
            .generate(&prompt, None)
            .await
            .map_err(|e| CoreError::GenerationFailure(format!("{:#}", e)))?
            .into_text();

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(CoreError::GenerationFailure(
                "interviewer reply was empty".to_string(),
            ));
        }
        Ok(reply.to_string())
    }
}
