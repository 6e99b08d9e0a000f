//! The request pipeline.
//!
//! One inbound conversation goes through:
//!
//! 1. **Access**: resolve the credential (a denial stops here)
//! 2. **Memory**: optional reference message, and the history budget left
//!    after the fixed content
//! 3. **Budget**: trim the conversation newest-first to that budget
//! 4. **Assemble**: `[fixed prompt?, reference?, ...history]`
//! 5. **Complete**: timeout-raced call with bounded retries
//! 6. **Account**: record the reported usage against the user
//!
//! The orchestrator holds no conversation state between calls.

use memochat_access::{AccessGate, AccessGrant};
use memochat_config::AppConfig;
use memochat_core::error::Result;
use memochat_core::memory::VectorIndex;
use memochat_core::message::{Message, Role};
use memochat_core::provider::{
    ProviderFactory, ProviderRequest, ProviderResponse, Transcription, TranscriptionRequest,
};
use memochat_core::tokenizer::Tokenizer;
use memochat_core::user::{UsageLedger, UsageTier, UserIdentity};
use memochat_providers::{RetryPolicy, transcribe_with_retry};
use std::sync::Arc;
use tracing::{info, warn};

use crate::augment::{AugmentSettings, MemoryAugmenter};
use crate::budget::HistoryBudgeter;
use crate::tokens::TokenCounter;

/// Everything the pipeline needs that is fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub model: String,
    pub temperature: f32,
    /// Sent first in every request, as an assistant message
    pub default_prompt: Option<String>,
    pub image_token_weight: usize,
    pub retry: RetryPolicy,
    pub augment: AugmentSettings,
    pub transcription_model: String,
    pub transcription_attempts: u32,
}

impl OrchestratorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            default_prompt: config.default_prompt.clone(),
            image_token_weight: config.budget.image_token_weight,
            retry: RetryPolicy::from_config(config),
            augment: AugmentSettings::from_config(config),
            transcription_model: config.completion.transcription_model.clone(),
            transcription_attempts: config.completion.transcription_attempts,
        }
    }
}

/// Token accounting of one assembled request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAccounting {
    pub prompt_tokens: usize,
    pub reference_tokens: usize,
    pub history_tokens: usize,
    pub ceiling: usize,
}

impl TokenAccounting {
    pub fn total(&self) -> usize {
        self.prompt_tokens + self.reference_tokens + self.history_tokens
    }
}

/// The outcome of one handled conversation.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub response: ProviderResponse,
    pub tier: UsageTier,
    pub accounting: TokenAccounting,
    /// Number of messages actually sent to the model
    pub messages_sent: usize,
}

pub struct RequestOrchestrator {
    gate: AccessGate,
    factory: Arc<dyn ProviderFactory>,
    ledger: Arc<dyn UsageLedger>,
    budgeter: HistoryBudgeter,
    augmenter: MemoryAugmenter,
    prompt: Option<Message>,
    settings: OrchestratorSettings,
}

impl RequestOrchestrator {
    pub fn new(
        gate: AccessGate,
        factory: Arc<dyn ProviderFactory>,
        ledger: Arc<dyn UsageLedger>,
        tokenizer: Arc<dyn Tokenizer>,
        index: Option<Arc<dyn VectorIndex>>,
        settings: OrchestratorSettings,
    ) -> Self {
        let counter = TokenCounter::new(tokenizer, settings.image_token_weight);
        let budgeter = HistoryBudgeter::new(counter);
        let augmenter = MemoryAugmenter::new(budgeter.clone(), index, settings.augment.clone());
        let prompt = settings
            .default_prompt
            .as_ref()
            .filter(|p| !p.is_empty())
            .map(|p| Message::new(Role::Assistant, p.as_str()));

        Self {
            gate,
            factory,
            ledger,
            budgeter,
            augmenter,
            prompt,
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    /// Answer a conversation on behalf of `identity`.
    ///
    /// `messages` is the full history, oldest first, ending with the new
    /// user turn.
    pub async fn handle(&self, identity: &UserIdentity, messages: &[Message]) -> Result<ChatReply> {
        let grant = self.gate.resolve(identity).await?;
        let provider = self.factory.for_credential(&grant.credential);

        let augmentation = self
            .augmenter
            .augment(provider.as_ref(), messages, self.prompt.as_ref())
            .await?;

        let history = self.budgeter.reduce(messages, augmentation.history_budget);
        let accounting = TokenAccounting {
            prompt_tokens: augmentation.prompt_tokens,
            reference_tokens: augmentation.reference_tokens,
            history_tokens: self.budgeter.counter().count_total_tokens(&history),
            ceiling: self.settings.augment.max_request_tokens,
        };
        info!(
            user_id = identity.user_id,
            prompt_tokens = accounting.prompt_tokens,
            reference_tokens = accounting.reference_tokens,
            history_tokens = accounting.history_tokens,
            total = accounting.total(),
            ceiling = accounting.ceiling,
            "Request assembled"
        );

        let final_messages: Vec<Message> = self
            .prompt
            .iter()
            .cloned()
            .chain(augmentation.reference)
            .chain(history)
            .collect();
        let messages_sent = final_messages.len();

        let request = ProviderRequest {
            model: self.settings.model.clone(),
            messages: final_messages,
            temperature: self.settings.temperature,
            max_tokens: None,
        };
        let response = self.settings.retry.complete(provider.as_ref(), request).await?;

        self.record_usage(&grant, &response).await;

        Ok(ChatReply {
            response,
            tier: grant.tier,
            accounting,
            messages_sent,
        })
    }

    /// Transcribe a voice message on behalf of `identity`.
    pub async fn transcribe(
        &self,
        identity: &UserIdentity,
        file_name: impl Into<String>,
        audio: Vec<u8>,
    ) -> Result<Transcription> {
        let grant = self.gate.resolve(identity).await?;
        let provider = self.factory.for_credential(&grant.credential);

        let request = TranscriptionRequest {
            model: self.settings.transcription_model.clone(),
            file_name: file_name.into(),
            audio,
        };
        let transcription =
            transcribe_with_retry(provider.as_ref(), request, self.settings.transcription_attempts)
                .await?;

        info!(
            user_id = identity.user_id,
            chars = transcription.text.chars().count(),
            "Audio transcribed"
        );
        Ok(transcription)
    }

    /// The answer is already in hand, so a ledger failure is logged rather
    /// than surfaced.
    async fn record_usage(&self, grant: &AccessGrant, response: &ProviderResponse) {
        let Some(usage) = response.usage else {
            warn!(user_id = grant.record.user_id, "Completion reported no usage");
            return;
        };
        if let Err(e) = self.ledger.record_usage(grant.record.user_id, &usage).await {
            warn!(user_id = grant.record.user_id, error = %e, "Failed to record token usage");
        }
    }
}
