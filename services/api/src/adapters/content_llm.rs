//! services/api/src/adapters/content_llm.rs
//!
//! This module contains the adapter for the content-generating LLM.
//! It implements the `ContentProvider` port from the `core` crate: every
//! request sends a natural-language instruction plus the exact output
//! schema, and every response is routed through the core's coercion layer
//! so a malformed answer degrades instead of erroring.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use regex::Regex;
use tracing::warn;
use tutor_core::{
    content::{
        fallback_quiz, parse_action_content, parse_question_batch, ActionContent,
        CHAT_EMPTY_REPLY,
    },
    domain::{ActionType, ChatMessage, ChatRole, Difficulty, Question, StudentProfile},
    ports::{ContentProvider, PortError, PortResult},
};

const QUESTION_SCHEMA_NOTE: &str = "Return ONLY a JSON array. Each element must be an object \
with exactly these fields: \"id\" (string), \"text\" (string), \"options\" (array of strings), \
\"correctOptionIndex\" (integer index into options), \"explanation\" (string). No markdown, \
no surrounding prose.";

const ACTION_SCHEMA_NOTE: &str = "Return ONLY a JSON object with exactly these fields: \
\"title\" (string), \"description\" (string), \"content\" (string). No markdown, no \
surrounding prose.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ContentProvider` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiContentAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiContentAdapter {
    /// Creates a new `OpenAiContentAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// The tutor persona shared by every request kind.
    fn system_instruction(profile: &StudentProfile) -> String {
        format!(
            "You are an expert AI tutor for K-12 students in India.\n\
             Student: {}, Class: {}, Subject: {}.\n\n\
             Your Goal: Create high-quality, error-free educational content.\n\
             Tone: Encouraging, simple, and practical.\n\
             Context: Use relatable examples from rural India (e.g., agriculture, village \
             life, local markets, cricket, festivals).",
            profile.name, profile.class_level, profile.subject
        )
    }

    /// One round-trip to the chat-completion endpoint, returning the raw
    /// reply text.
    async fn complete(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        temperature: f32,
    ) -> PortResult<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(temperature)
            .messages(messages)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Provider(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| PortError::Provider("empty completion response".to_string()))
    }

    fn prompt_pair(
        &self,
        profile: &StudentProfile,
        user_prompt: String,
    ) -> PortResult<Vec<ChatCompletionRequestMessage>> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(Self::system_instruction(profile))
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(user_prompt)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(vec![system.into(), user.into()])
    }

    /// Isolates the first JSON array or object in a reply that arrived
    /// wrapped in prose, so the strict parse downstream gets a fair chance.
    fn extract_json_block(text: &str) -> String {
        // Whichever bracket opens first is the outermost value.
        let array = Regex::new(r"(?s)\[.*\]").unwrap().find(text);
        let object = Regex::new(r"(?s)\{.*\}").unwrap().find(text);
        match (array, object) {
            (Some(a), Some(o)) if o.start() < a.start() => o.as_str().to_string(),
            (Some(a), _) => a.as_str().to_string(),
            (None, Some(o)) => o.as_str().to_string(),
            (None, None) => text.to_string(),
        }
    }
}

//=========================================================================================
// `ContentProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentProvider for OpenAiContentAdapter {
    /// Generates the one-time diagnostic batch. Failures propagate: the
    /// orchestrator treats the whole stage as skippable.
    async fn generate_diagnostic(&self, profile: &StudentProfile) -> PortResult<Vec<Question>> {
        let prompt = format!(
            "Subject: {}\nClass: {}\n\n\
             Generate 5 diagnostic questions to assess proficiency.\n\
             Difficulty: Mixed (Easy to Hard).\n\n\
             Requirements:\n\
             1. Use practical, real-world scenarios.\n\
             2. Ensure clear wording suited for the class level.\n\
             3. Focus on core concepts of the subject.\n\n\
             {QUESTION_SCHEMA_NOTE}",
            profile.subject, profile.class_level
        );
        let reply = self.complete(self.prompt_pair(profile, prompt)?, 0.3).await?;
        let questions = parse_question_batch(&Self::extract_json_block(&reply), "d")
            .map_err(|e| PortError::Provider(format!("unparseable diagnostic response: {e}")))?;
        if questions.is_empty() {
            return Err(PortError::Provider(
                "diagnostic response contained no questions".to_string(),
            ));
        }
        Ok(questions)
    }

    /// Generates an adaptive quiz. This path never errors by contract:
    /// any failure yields the designated single-item fallback quiz, which
    /// the orchestrator forwards as-is.
    async fn generate_quiz(
        &self,
        profile: &StudentProfile,
        topic: &str,
        difficulty: Difficulty,
    ) -> PortResult<Vec<Question>> {
        let prompt = format!(
            "Topic: {topic}\nDifficulty: {}\n\n\
             Generate 5 high-quality multiple-choice questions.\n\n\
             Requirements:\n\
             1. Questions must be conceptually accurate and clear.\n\
             2. Options must be distinct and plausible.\n\
             3. Explanations should be helpful and educational.\n\
             4. Avoid repetition.\n\n\
             {QUESTION_SCHEMA_NOTE}",
            difficulty.prompt_description()
        );

        let outcome = match self.complete(self.prompt_pair(profile, prompt)?, 0.3).await {
            Ok(reply) => parse_question_batch(&Self::extract_json_block(&reply), "q")
                .map_err(|e| PortError::Provider(format!("unparseable quiz response: {e}"))),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(questions) if !questions.is_empty() => Ok(questions),
            Ok(_) => {
                warn!(topic, "quiz response contained no questions, serving the fallback");
                Ok(fallback_quiz())
            }
            Err(e) => {
                warn!(topic, "quiz generation failed, serving the fallback: {e}");
                Ok(fallback_quiz())
            }
        }
    }

    /// Generates the study content that fills a pending action. Failures
    /// propagate; the orchestrator leaves the action's content empty.
    async fn generate_action_content(
        &self,
        profile: &StudentProfile,
        topic: &str,
        action_type: ActionType,
    ) -> PortResult<ActionContent> {
        let action_name = match action_type {
            ActionType::Remedial => "REMEDIAL",
            ActionType::Practice => "PRACTICE",
            ActionType::Advance => "ADVANCE",
        };
        let prompt = format!(
            "Topic: \"{topic}\"\nAction Plan: {action_name}\n\n\
             Create a structured learning task.\n\n\
             Requirements:\n\
             1. Title: Short, catchy title for the task (max 5 words).\n\
             2. Description: A single sentence summary of what the student will learn.\n\
             3. Content: The detailed advice, explanation, or activity (max 80 words).\n\n\
             Context: Rural India.\n\n\
             {ACTION_SCHEMA_NOTE}"
        );
        let reply = self.complete(self.prompt_pair(profile, prompt)?, 0.4).await?;
        parse_action_content(&Self::extract_json_block(&reply)).ok_or_else(|| {
            PortError::Provider("action content response missing the content field".to_string())
        })
    }

    /// Answers one tutor-chat message. The full dashboard history rides
    /// along as conversation context.
    async fn chat(
        &self,
        profile: &StudentProfile,
        history: &[ChatMessage],
        message: &str,
        topic: &str,
    ) -> PortResult<String> {
        let mut messages = vec![ChatCompletionRequestMessage::from(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(Self::system_instruction(profile))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?,
        )];

        // The final entry of the history is the message being answered; it
        // is re-framed with the topic below instead of repeated verbatim.
        let prior = history.split_last().map(|(_, rest)| rest).unwrap_or(history);
        for entry in prior {
            let mapped = match entry.role {
                ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(entry.text.clone())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
                ChatRole::Model => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(entry.text.clone())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
            };
            messages.push(mapped);
        }

        let prompt = format!(
            "Topic: {topic}\nStudent Question: \"{message}\"\n\n\
             Provide a helpful, direct answer (max 3 sentences).\n\
             Use a rural India context if helpful for explanation."
        );
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );

        let reply = self.complete(messages, 0.7).await?;
        if reply.trim().is_empty() {
            return Ok(CHAT_EMPTY_REPLY.to_string());
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_block_extraction_survives_prose_wrapping() {
        let wrapped = "Here you go!\n[{\"text\": \"Q?\"}]\nHope that helps.";
        assert_eq!(
            OpenAiContentAdapter::extract_json_block(wrapped),
            "[{\"text\": \"Q?\"}]"
        );

        let object = "Sure: {\"content\": \"x\"} done";
        assert_eq!(
            OpenAiContentAdapter::extract_json_block(object),
            "{\"content\": \"x\"}"
        );

        // Nothing JSON-shaped: passed through untouched for the parser to
        // reject.
        assert_eq!(OpenAiContentAdapter::extract_json_block("plain"), "plain");
    }
}
