//! Access control for memochat.
//!
//! Decides per request which API key to use (the user's own, or the shared
//! one for premium and trial users) and keeps user records and lifetime
//! token usage in a [`UserStore`](memochat_core::user::UserStore) /
//! [`UsageLedger`](memochat_core::user::UsageLedger) backend.

pub mod gate;
pub mod in_memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use gate::{AccessGate, AccessGrant};
pub use in_memory::InMemoryUserStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteUserStore;
