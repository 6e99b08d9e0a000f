//! The memochat request pipeline.
//!
//! Turns an unbounded conversation into one token-bounded completion request:
//!
//! 1. **Access**: the [`AccessGate`](memochat_access::AccessGate) picks the credential
//! 2. **Memory**: the [`MemoryAugmenter`] retrieves related document parts
//! 3. **Budget**: the [`HistoryBudgeter`] trims history newest-first
//! 4. **Complete**: the [`RetryPolicy`](memochat_providers::RetryPolicy) races
//!    each attempt against a timeout
//!
//! [`RequestOrchestrator`] runs the whole sequence per inbound message.

pub mod augment;
pub mod budget;
pub mod orchestrator;
pub mod tokenizer;
pub mod tokens;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use augment::{AugmentSettings, Augmentation, MemoryAugmenter};
pub use budget::HistoryBudgeter;
pub use orchestrator::{ChatReply, OrchestratorSettings, RequestOrchestrator, TokenAccounting};
pub use tokenizer::TiktokenTokenizer;
pub use tokens::{DEFAULT_IMAGE_TOKEN_WEIGHT, TokenCounter};
