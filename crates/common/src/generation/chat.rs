//! OpenAI-compatible chat-completions client
//!
//! Defaults target DeepSeek (`https://api.deepseek.com`, `deepseek-chat`),
//! but any endpoint speaking the `/chat/completions` protocol works.

use super::{parse_paraphrases, parse_relevance_scores, GenerationProvider};
use crate::config::GenerationConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// One chat message
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Chat-completions backed [`GenerationProvider`]
pub struct ChatGenerator {
    config: GenerationConfig,
    client: reqwest::Client,
}

impl ChatGenerator {
    /// Create a new generator
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Send one chat-completions request and return the first choice's text
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::CollaboratorUnavailable {
                collaborator: "generation".to_string(),
                message: "no API key configured".to_string(),
            })?;

        let request = ChatRequest {
            model: &self.config.model,
            messages,
            max_tokens,
            temperature,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Generation {
                message: format!("LLM API request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation {
                message: format!("LLM API error {}: {}", status, body),
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| AppError::Generation {
            message: format!("Failed to parse LLM response: {}", e),
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::Generation {
                message: "Empty response from LLM".to_string(),
            })
    }
}

fn multi_query_prompt(query: &str, n: usize) -> String {
    format!(
        "Rewrite the following user query as {n} queries with the same meaning but different wording, \
        to improve retrieval recall.\n\n\
        Original query: {query}\n\n\
        Requirements:\n\
        1. Keep the core meaning unchanged\n\
        2. Use different phrasing and synonyms\n\
        3. One query per line\n\
        4. No numbering or other markers\n\n\
        Rewritten queries:"
    )
}

fn hypothetical_prompt(query: &str) -> String {
    format!(
        "Write a detailed, expert answer to the following question. \
        Do not say you don't know; write the most plausible answer directly.\n\n\
        Question: {query}\n\n\
        Answer:"
    )
}

fn relevance_prompt(query: &str, documents: &[String]) -> String {
    let docs_text = documents
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("Document {}:\n{}", i + 1, doc))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Rate the relevance of each document to the query on a scale of 0-10 (10 = most relevant).\n\n\
        Query: {query}\n\n\
        {docs_text}\n\n\
        Output one line per document in exactly this format:\n\
        1: score\n\
        2: score\n\
        3: score\n\
        ...\n\n\
        Scores:"
    )
}

fn answer_prompt(query: &str, contexts: &[String]) -> String {
    let context_text = contexts
        .iter()
        .enumerate()
        .map(|(i, ctx)| format!("[Document {}]\n{}", i + 1, ctx))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Answer the user's question using the retrieved documents below. \
        If the documents do not contain the information, say so honestly.\n\n\
        Retrieved documents:\n\
        {context_text}\n\n\
        Question: {query}\n\n\
        Answer:"
    )
}

#[async_trait]
impl GenerationProvider for ChatGenerator {
    #[instrument(skip(self))]
    async fn expand_query(&self, query: &str, n: usize) -> Result<Vec<String>> {
        let messages = [
            ChatMessage::system("You are a query optimization assistant."),
            ChatMessage::user(multi_query_prompt(query, n)),
        ];
        let response = self.chat(&messages, 0.8, 300).await?;
        let queries = parse_paraphrases(query, &response, n);
        debug!(count = queries.len(), "Expanded query");
        Ok(queries)
    }

    #[instrument(skip(self))]
    async fn generate_hypothetical_passage(&self, query: &str) -> Result<String> {
        let messages = [
            ChatMessage::system("You are a knowledgeable assistant who writes high-quality answers."),
            ChatMessage::user(hypothetical_prompt(query)),
        ];
        self.chat(&messages, 0.7, 500).await
    }

    #[instrument(skip(self, documents), fields(documents = documents.len()))]
    async fn score_relevance(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
    ) -> Result<Vec<(usize, f32)>> {
        if documents.is_empty() {
            return Ok(vec![]);
        }
        let messages = [
            ChatMessage::system("You are an information retrieval evaluation expert."),
            ChatMessage::user(relevance_prompt(query, documents)),
        ];
        let response = self.chat(&messages, 0.3, 200).await?;
        Ok(parse_relevance_scores(&response, documents.len(), top_k))
    }

    #[instrument(skip(self, contexts), fields(contexts = contexts.len()))]
    async fn synthesize_answer(&self, query: &str, contexts: &[String]) -> Result<String> {
        let messages = [
            ChatMessage::system("You are a helpful assistant who answers questions from the given documents."),
            ChatMessage::user(answer_prompt(query, contexts)),
        ];
        self.chat(&messages, 0.7, 1000).await
    }
}
