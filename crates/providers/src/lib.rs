//! Provider implementations for memochat.
//!
//! All providers implement the `memochat_core::Provider` trait. The factory
//! binds a provider to each resolved credential, and the retry policy wraps
//! every outbound completion and transcription.

pub mod factory;
pub mod openai_compat;
pub mod retry;

pub use factory::OpenAiCompatFactory;
pub use openai_compat::OpenAiCompatProvider;
pub use retry::{RetryPolicy, transcribe_with_retry};
