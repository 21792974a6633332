//! On-disk cache of delegated tokens, keyed by account.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Tokens kept for one signed-in account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAccount {
    pub tenant_id: String,
    pub client_id: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl CachedAccount {
    /// True if the access token outlives `margin` from now.
    pub fn is_fresh(&self, margin: Duration) -> bool {
        Utc::now() + margin < self.expires_at
    }
}

/// Serializable token cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenCache {
    #[serde(default)]
    accounts: BTreeMap<String, CachedAccount>,
}

impl TokenCache {
    /// Load the cache from `path`.
    ///
    /// A missing file yields an empty cache. So does an unreadable or corrupt
    /// one, after a warning.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!("no token cache at {:?}", path);
            return Self::default();
        }

        let parsed = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()));

        match parsed {
            Ok(cache) => {
                debug!("loaded token cache from {:?}", path);
                cache
            }
            Err(e) => {
                warn!("ignoring unreadable token cache {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Persist the cache to `path`, creating parent directories on demand.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write to a sibling temp file, then rename over the target
        let temp_path = path.with_extension("tmp");
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
        }

        debug!("saved token cache to {:?}", path);
        Ok(())
    }

    /// First account issued for this tenant and client.
    pub fn find(&self, tenant_id: &str, client_id: &str) -> Option<(&str, &CachedAccount)> {
        self.accounts
            .iter()
            .find(|(_, a)| a.tenant_id == tenant_id && a.client_id == client_id)
            .map(|(key, account)| (key.as_str(), account))
    }

    /// Insert or replace the entry for `account_key`.
    pub fn upsert(&mut self, account_key: impl Into<String>, account: CachedAccount) {
        self.accounts.insert(account_key.into(), account);
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
