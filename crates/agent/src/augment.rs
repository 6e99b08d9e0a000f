//! Long-term memory augmentation.
//!
//! Embeds the user's own turns, asks the vector index for related document
//! parts and wraps them in one assistant-authored reference message. Then
//! works out how many tokens are left for the real conversation once the
//! fixed prompt and the reference are paid for.

use memochat_config::AppConfig;
use memochat_core::error::{BudgetError, MemoryError, Result};
use memochat_core::memory::{VectorIndex, VectorQuery};
use memochat_core::message::{Message, Role};
use memochat_core::provider::{EmbeddingRequest, Provider};
use std::sync::Arc;
use tracing::{debug, info};

use crate::budget::HistoryBudgeter;

/// Knobs for retrieval and budget reconciliation.
#[derive(Debug, Clone)]
pub struct AugmentSettings {
    /// Ceiling for the whole outbound request
    pub max_request_tokens: usize,
    /// Token cap for the text sent to the embedding endpoint
    pub embedding_input_cap: usize,
    pub embedding_model: String,
    pub top_k: usize,
    /// First line of the reference message
    pub reference_label: String,
}

impl AugmentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_request_tokens: config.budget.max_request_tokens,
            embedding_input_cap: config.budget.embedding_input_cap,
            embedding_model: config.memory.embedding_model.clone(),
            top_k: config.memory.top_k,
            reference_label: config.memory.reference_label.clone(),
        }
    }
}

impl Default for AugmentSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// The result of augmenting one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Augmentation {
    /// Retrieved context, present only when a vector index is configured
    pub reference: Option<Message>,
    /// Tokens left for the conversation history
    pub history_budget: usize,
    pub prompt_tokens: usize,
    pub reference_tokens: usize,
}

pub struct MemoryAugmenter {
    budgeter: HistoryBudgeter,
    index: Option<Arc<dyn VectorIndex>>,
    settings: AugmentSettings,
}

impl MemoryAugmenter {
    pub fn new(
        budgeter: HistoryBudgeter,
        index: Option<Arc<dyn VectorIndex>>,
        settings: AugmentSettings,
    ) -> Self {
        Self {
            budgeter,
            index,
            settings,
        }
    }

    pub fn settings(&self) -> &AugmentSettings {
        &self.settings
    }

    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    /// Build the reference message (if any) and the remaining history budget.
    ///
    /// `provider` is used for the embedding call, so retrieval runs under the
    /// same credential as the completion.
    pub async fn augment(
        &self,
        provider: &dyn Provider,
        messages: &[Message],
        prompt: Option<&Message>,
    ) -> Result<Augmentation> {
        let reference = match &self.index {
            Some(index) => self.retrieve(provider, index.as_ref(), messages).await?,
            None => None,
        };

        let counter = self.budgeter.counter();
        let prompt_tokens = prompt.map_or(0, |p| counter.message_tokens(p));
        let reference_tokens = reference.as_ref().map_or(0, |r| counter.message_tokens(r));
        let history_budget = self.reconcile(prompt_tokens, reference_tokens)?;

        Ok(Augmentation {
            reference,
            history_budget,
            prompt_tokens,
            reference_tokens,
        })
    }

    /// Tokens left for history after the fixed content. Zero left is fatal.
    pub fn reconcile(&self, prompt_tokens: usize, reference_tokens: usize) -> Result<usize> {
        let ceiling = self.settings.max_request_tokens;
        match ceiling.checked_sub(prompt_tokens + reference_tokens) {
            Some(left) if left > 0 => Ok(left),
            _ => Err(BudgetError::ExceededByFixedContent {
                ceiling,
                prompt_tokens,
                reference_tokens,
            }
            .into()),
        }
    }

    async fn retrieve(
        &self,
        provider: &dyn Provider,
        index: &dyn VectorIndex,
        messages: &[Message],
    ) -> Result<Option<Message>> {
        let Some(input) = self.embedding_input(messages) else {
            debug!("No user text to embed, skipping memory retrieval");
            return Ok(None);
        };

        let response = provider
            .embed(EmbeddingRequest {
                model: self.settings.embedding_model.clone(),
                inputs: vec![input],
            })
            .await?;
        let vector = response.embeddings.into_iter().next().ok_or_else(|| {
            MemoryError::EmbeddingFailed("embedding response carried no vectors".into())
        })?;

        let matches = index
            .query(VectorQuery::new(vector, self.settings.top_k))
            .await?;

        let mut reference = self.settings.reference_label.clone();
        reference.push('\n');
        let texts: Vec<&str> = matches.iter().filter_map(|m| m.text.as_deref()).collect();
        reference.push_str(&texts.join("\n"));

        info!(
            index = index.name(),
            matches = matches.len(),
            chars = reference.chars().count(),
            "Reference message added"
        );
        Ok(Some(Message::new(Role::Assistant, reference)))
    }

    /// The user's turns, newest kept first, joined by newlines. `None` when
    /// nothing textual is left to embed.
    fn embedding_input(&self, messages: &[Message]) -> Option<String> {
        let user_messages: Vec<Message> = messages
            .iter()
            .filter(|m| m.role == Role::User)
            .cloned()
            .collect();

        // one token reserved per separator
        let cap = self
            .settings
            .embedding_input_cap
            .saturating_sub(user_messages.len());
        let kept = self.budgeter.reduce(&user_messages, cap);

        let input = kept
            .iter()
            .map(|m| m.content.as_text())
            .collect::<Vec<_>>()
            .join("\n");
        (!input.trim().is_empty()).then_some(input)
    }
}
