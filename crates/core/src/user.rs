//! User records, usage tiers, and the persistence traits behind them.
//!
//! The access gate reads and writes records through [`UserStore`] and reads
//! lifetime consumption through [`UsageLedger`]. Both are implemented in the
//! `memochat-access` crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::provider::Usage;

/// Identity fields carried by an inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

impl UserIdentity {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            username: None,
            language_code: None,
        }
    }
}

/// How a user is allowed to reach the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageTier {
    CustomKey,
    Premium,
    TrialActive,
    TrialEnded,
}

impl UsageTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageTier::CustomKey => "custom_key",
            UsageTier::Premium => "premium",
            UsageTier::TrialActive => "trial_active",
            UsageTier::TrialEnded => "trial_ended",
        }
    }
}

impl std::fmt::Display for UsageTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UsageTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "custom_key" => Ok(UsageTier::CustomKey),
            "premium" => Ok(UsageTier::Premium),
            "trial_active" => Ok(UsageTier::TrialActive),
            "trial_ended" => Ok(UsageTier::TrialEnded),
            other => Err(format!("unknown usage tier '{other}'")),
        }
    }
}

/// The persisted per-user record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: i64,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub language_code: Option<String>,

    #[serde(default)]
    pub default_language_code: Option<String>,

    /// A key the user registered themselves; always preferred when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_api_key: Option<String>,

    /// Last tier decision; `None` until the gate has run once
    #[serde(default)]
    pub usage_tier: Option<UsageTier>,
}

impl UserRecord {
    /// The record created on first contact.
    pub fn from_identity(identity: &UserIdentity) -> Self {
        Self {
            user_id: identity.user_id,
            username: identity.username.clone(),
            language_code: identity.language_code.clone(),
            default_language_code: identity.language_code.clone(),
            custom_api_key: None,
            usage_tier: None,
        }
    }

    /// Overwrite profile fields the inbound identity carries; keep the rest.
    pub fn refresh_from(&mut self, identity: &UserIdentity) {
        if let Some(username) = &identity.username {
            self.username = Some(username.clone());
        }
        if let Some(lang) = &identity.language_code {
            self.language_code = Some(lang.clone());
            self.default_language_code = Some(lang.clone());
        }
    }
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("language_code", &self.language_code)
            .field("default_language_code", &self.default_language_code)
            .field(
                "custom_api_key",
                &self.custom_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("usage_tier", &self.usage_tier)
            .finish()
    }
}

/// Row-level persistence of user records. `upsert` is the only write path.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, user_id: i64) -> std::result::Result<Option<UserRecord>, StoreError>;

    async fn upsert(&self, record: &UserRecord) -> std::result::Result<(), StoreError>;
}

/// Lifetime token accounting per user.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    async fn lifetime_tokens_used(&self, user_id: i64) -> std::result::Result<u64, StoreError>;

    async fn record_usage(&self, user_id: i64, usage: &Usage) -> std::result::Result<(), StoreError>;
}
