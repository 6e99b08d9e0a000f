//! # memochat Core
//!
//! Domain types, collaborator traits, and error definitions for memochat.
//! This crate performs no I/O; it defines the domain model that every other
//! crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (completion provider, tokenizer, vector index,
//! user-record store, usage ledger) is a trait here. Implementations live in
//! their respective crates, and tests swap them for stubs.

pub mod error;
pub mod memory;
pub mod message;
pub mod provider;
pub mod tokenizer;
pub mod user;

// Re-export key types at crate root for ergonomics
pub use error::{AccessError, BudgetError, Error, FailureKind, MemoryError, ProviderError, Result, StoreError};
pub use memory::{VectorIndex, VectorMatch, VectorQuery};
pub use message::{Content, ContentPart, ImageUrl, Message, Role};
pub use provider::{Credential, CredentialSource, Provider, ProviderFactory, ProviderRequest, ProviderResponse, Usage};
pub use tokenizer::{Token, Tokenizer};
pub use user::{UsageLedger, UsageTier, UserIdentity, UserRecord, UserStore};
