//! Token accounting for messages.
//!
//! Text is counted with the real tokenizer. Images are not measured: every
//! image part costs a fixed weight.

use memochat_core::message::{Content, ContentPart, Message};
use memochat_core::tokenizer::Tokenizer;
use std::sync::Arc;

/// Default cost charged for one image part.
pub const DEFAULT_IMAGE_TOKEN_WEIGHT: usize = 800;

/// Counts tokens the way the history budgeter charges them.
#[derive(Clone)]
pub struct TokenCounter {
    tokenizer: Arc<dyn Tokenizer>,
    image_weight: usize,
}

impl TokenCounter {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, image_weight: usize) -> Self {
        Self {
            tokenizer,
            image_weight,
        }
    }

    pub fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    pub fn image_weight(&self) -> usize {
        self.image_weight
    }

    pub fn text_tokens(&self, text: &str) -> usize {
        self.tokenizer.count(text)
    }

    pub fn part_tokens(&self, part: &ContentPart) -> usize {
        match part {
            ContentPart::Text { text } => self.text_tokens(text),
            ContentPart::ImageUrl { .. } => self.image_weight,
        }
    }

    pub fn content_tokens(&self, content: &Content) -> usize {
        match content {
            Content::Text(text) => self.text_tokens(text),
            Content::Parts(parts) => parts.iter().map(|p| self.part_tokens(p)).sum(),
        }
    }

    pub fn message_tokens(&self, message: &Message) -> usize {
        self.content_tokens(&message.content)
    }

    /// Total cost of a message list. Roles and framing are not charged.
    pub fn count_total_tokens(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.message_tokens(m)).sum()
    }
}
