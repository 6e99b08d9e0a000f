//! Error types for the memochat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the top-level [`Error`]
//! wraps them without changing their kind.

use thiserror::Error;

/// The top-level error type for all memochat operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Completion / embedding / transcription provider ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Access gate ---
    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    // --- Token budget ---
    #[error("Budget error: {0}")]
    Budget(#[from] BudgetError),

    // --- Vector memory ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- User records and usage ledger ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the failure is one the completion retry loop is allowed to retry.
    ///
    /// Only provider failures qualify. Access denials and budget violations are
    /// terminal regardless of how many attempts remain.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Provider(_))
    }

    /// True when the request was refused because the user has no usable credential.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Error::Access(AccessError::Denied { .. }))
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Coarse classification of a provider failure, used for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    ApiRejection,
    Unknown,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::ApiRejection => "api_rejection",
            FailureKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The remote API answered with a structured error.
    #[error("API rejected request: {message} (status: {status})")]
    ApiRejection {
        status: u16,
        code: Option<String>,
        message: String,
        error_type: Option<String>,
    },

    #[error("Unknown provider failure: {0}")]
    Unknown(String),
}

impl ProviderError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProviderError::Timeout { .. } => FailureKind::Timeout,
            ProviderError::ApiRejection { .. } => FailureKind::ApiRejection,
            ProviderError::Unknown(_) => FailureKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum AccessError {
    /// No custom key, not premium, and the trial allowance is used up.
    #[error("Access denied for user {user_id}: {tokens_used} of {ceiling} trial tokens used")]
    Denied {
        user_id: i64,
        tokens_used: u64,
        ceiling: u64,
    },
}

#[derive(Debug, Clone, Error)]
pub enum BudgetError {
    /// The fixed prompt plus the reference message leave no room for history.
    #[error(
        "Token ceiling {ceiling} exhausted by fixed content \
         (prompt: {prompt_tokens}, reference: {reference_tokens})"
    )]
    ExceededByFixedContent {
        ceiling: usize,
        prompt_tokens: usize,
        reference_tokens: usize,
    },
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Vector query failed: {0}")]
    QueryFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Vector index not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Corrupt record for user {user_id}: {reason}")]
    Corrupt { user_id: i64, reason: String },
}
