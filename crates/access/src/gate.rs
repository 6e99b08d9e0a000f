//! The access gate: decides which credential a request runs under.
//!
//! Order of precedence:
//! 1. A custom key registered by the user, always honored.
//! 2. Premium users get the operator's shared key.
//! 3. Everyone else is on trial: the shared key is granted while lifetime
//!    consumption stays under the trial ceiling, and denied afterwards.
//!
//! Every tier change is persisted before the grant is returned, so the
//! completion call never runs on a stale decision.

use memochat_config::AppConfig;
use memochat_core::error::{AccessError, Error, Result};
use memochat_core::provider::Credential;
use memochat_core::user::{UsageLedger, UsageTier, UserIdentity, UserRecord, UserStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The outcome of a successful access check.
#[derive(Debug, Clone)]
pub struct AccessGrant {
    /// The user's record as persisted
    pub record: UserRecord,
    /// The tier the request runs under
    pub tier: UsageTier,
    /// The key to call the model with
    pub credential: Credential,
    /// Lifetime consumption, when the trial check had to look it up
    pub tokens_used: Option<u64>,
}

pub struct AccessGate {
    store: Arc<dyn UserStore>,
    ledger: Arc<dyn UsageLedger>,
    shared_api_key: String,
    trial_ceiling: u64,
}

impl AccessGate {
    pub fn new(
        store: Arc<dyn UserStore>,
        ledger: Arc<dyn UsageLedger>,
        shared_api_key: impl Into<String>,
        trial_ceiling: u64,
    ) -> Self {
        Self {
            store,
            ledger,
            shared_api_key: shared_api_key.into(),
            trial_ceiling,
        }
    }

    /// Build a gate over one backing store that serves both records and usage.
    ///
    /// The shared key comes from the configured `api_key`; without it the
    /// gate cannot serve premium or trial users, so this is a config error.
    pub fn from_config<S>(store: Arc<S>, config: &AppConfig) -> Result<Self>
    where
        S: UserStore + UsageLedger + 'static,
    {
        let shared_api_key = config.api_key.clone().ok_or_else(|| Error::Config {
            message: "no shared api key configured (set MEMOCHAT_API_KEY or OPENAI_API_KEY)".into(),
        })?;
        Ok(Self::new(
            store.clone(),
            store,
            shared_api_key,
            config.access.max_trial_tokens,
        ))
    }

    pub fn trial_ceiling(&self) -> u64 {
        self.trial_ceiling
    }

    /// Load or create the user's record and refresh its profile fields.
    ///
    /// Idempotent: safe to call on every request.
    pub async fn sync_user(&self, identity: &UserIdentity) -> Result<UserRecord> {
        let record = match self.store.get(identity.user_id).await? {
            Some(mut existing) => {
                existing.refresh_from(identity);
                self.store.upsert(&existing).await?;
                debug!(user_id = identity.user_id, "User data updated");
                existing
            }
            None => {
                let created = UserRecord::from_identity(identity);
                self.store.upsert(&created).await?;
                info!(user_id = identity.user_id, "User created");
                created
            }
        };
        Ok(record)
    }

    /// Resolve the credential for an inbound request.
    ///
    /// Fails with [`AccessError::Denied`] once a trial user has used up the
    /// ceiling; that error must reach the caller unchanged.
    pub async fn resolve(&self, identity: &UserIdentity) -> Result<AccessGrant> {
        let mut record = self.sync_user(identity).await?;
        let user_id = record.user_id;

        if let Some(api_key) = record.custom_api_key.clone() {
            info!(user_id, "[ACCESS GRANTED] user has a custom api key");
            return Ok(AccessGrant {
                record,
                tier: UsageTier::CustomKey,
                credential: Credential::custom(api_key),
                tokens_used: None,
            });
        }

        if record.usage_tier == Some(UsageTier::Premium) {
            info!(user_id, "[ACCESS GRANTED] premium user, shared api key");
            return Ok(AccessGrant {
                record,
                tier: UsageTier::Premium,
                credential: Credential::shared(self.shared_api_key.clone()),
                tokens_used: None,
            });
        }

        let tokens_used = self.ledger.lifetime_tokens_used(user_id).await?;
        let tier = if tokens_used < self.trial_ceiling {
            UsageTier::TrialActive
        } else {
            UsageTier::TrialEnded
        };

        if record.usage_tier != Some(tier) {
            record.usage_tier = Some(tier);
            self.store.upsert(&record).await?;
        }

        if tier == UsageTier::TrialEnded {
            warn!(
                user_id,
                tokens_used,
                ceiling = self.trial_ceiling,
                "[ACCESS DENIED] trial exhausted, no custom key, not premium"
            );
            return Err(Error::Access(AccessError::Denied {
                user_id,
                tokens_used,
                ceiling: self.trial_ceiling,
            }));
        }

        info!(
            user_id,
            tokens_used,
            ceiling = self.trial_ceiling,
            "[ACCESS GRANTED] trial user within limit, shared api key"
        );
        Ok(AccessGrant {
            record,
            tier,
            credential: Credential::shared(self.shared_api_key.clone()),
            tokens_used: Some(tokens_used),
        })
    }
}
