//! Per-user session token storage.
//!
//! One record per username holding the upstream session token and the time
//! of the last login attempt. The file store keeps each record as a small
//! pretty-printed JSON file so operators can inspect and diff them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use telemon_types::{Timestamp, mask_username};
use tokio::sync::RwLock;

use crate::error::{Result, TokenError};

/// Directory under the data path holding token records.
pub const TOKENS_DIR: &str = "tokens";

/// Longest username accepted as a storage key.
const MAX_USERNAME_LEN: usize = 64;

/// A persisted upstream session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    /// Session token issued by the upstream. Empty after invalidation.
    pub token: String,
    /// Unix seconds of the last login attempt.
    #[serde(rename = "loginLastTime")]
    pub login_last_time: Timestamp,
}

impl UserSession {
    /// Whether a usable token is present.
    pub fn has_token(&self) -> bool {
        !self.token.is_empty()
    }
}

/// Check that a username is safe to use as a storage key.
///
/// Accepts ASCII alphanumerics and `_ - . @`, at most 64 bytes, not starting
/// with a dot. This rules out path separators and `..`.
pub fn validate_username(username: &str) -> Result<&str> {
    let valid = !username.is_empty()
        && username.len() <= MAX_USERNAME_LEN
        && !username.starts_with('.')
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@'));
    if valid {
        Ok(username)
    } else {
        Err(TokenError::InvalidUsername(username.to_string()))
    }
}

// ============================================================================
// TokenStore Trait
// ============================================================================

/// Durable storage for per-user session tokens.
#[async_trait]
pub trait TokenStore: Send + Sync + std::fmt::Debug {
    /// Read the session for a user.
    ///
    /// Never fails visibly: unreadable or unparsable records are logged and
    /// reported as absent.
    async fn get(&self, username: &str) -> Option<UserSession>;

    /// Persist (overwrite) the session for a user.
    async fn set(&self, username: &str, token: &str, login_time: Timestamp) -> Result<()>;

    /// Remove the session for a user. A missing record is not an error.
    async fn delete(&self, username: &str) -> Result<()>;
}

/// Shared token store for use across async contexts.
pub type SharedTokenStore = Arc<dyn TokenStore>;

// ============================================================================
// FileTokenStore
// ============================================================================

/// File-based token store for production use.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    tokens_dir: PathBuf,
}

impl FileTokenStore {
    /// Create a store keeping records under `{data_dir}/tokens/`.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            tokens_dir: data_dir.join(TOKENS_DIR),
        }
    }

    /// Create a store using `tokens_dir` directly.
    pub fn with_dir(tokens_dir: PathBuf) -> Self {
        Self { tokens_dir }
    }

    /// Directory holding the records.
    pub fn tokens_dir(&self) -> &Path {
        &self.tokens_dir
    }

    /// Path of the record for `username`.
    pub fn record_path(&self, username: &str) -> Result<PathBuf> {
        let key = validate_username(username)?;
        Ok(self.tokens_dir.join(format!("{key}.json")))
    }

    async fn read_record(&self, username: &str) -> Result<Option<UserSession>> {
        let path = self.record_path(username)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(TokenError::Io {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };
        Ok(Some(serde_json::from_str(&content)?))
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, username: &str) -> Option<UserSession> {
        match self.read_record(username).await {
            Ok(Some(session)) => Some(session),
            Ok(None) => {
                tracing::debug!(username = %mask_username(username), "No token record");
                None
            }
            Err(e) => {
                tracing::error!(
                    username = %mask_username(username),
                    error = %e,
                    "Failed to read token record, treating as absent"
                );
                None
            }
        }
    }

    async fn set(&self, username: &str, token: &str, login_time: Timestamp) -> Result<()> {
        let path = self.record_path(username)?;
        let session = UserSession {
            token: token.to_string(),
            login_last_time: login_time,
        };
        let json = serde_json::to_string_pretty(&session)?;

        tokio::fs::create_dir_all(&self.tokens_dir)
            .await
            .map_err(|e| TokenError::Io {
                path: self.tokens_dir.display().to_string(),
                source: e,
            })?;

        // Write next to the target and rename so readers never see a torn record.
        let tmp = self.tokens_dir.join(format!(".{username}.json.tmp"));
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| TokenError::Io {
                path: tmp.display().to_string(),
                source: e,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| TokenError::Io {
                path: path.display().to_string(),
                source: e,
            })?;

        tracing::info!(username = %mask_username(username), "Token record saved");
        Ok(())
    }

    async fn delete(&self, username: &str) -> Result<()> {
        let path = self.record_path(username)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(username = %mask_username(username), "Token record deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TokenError::Io {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }
}

// ============================================================================
// InMemoryTokenStore (for testing)
// ============================================================================

/// In-memory token store for testing.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    sessions: RwLock<HashMap<String, UserSession>>,
    write_count: AtomicU32,
    fail_writes: AtomicBool,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` calls.
    pub fn write_count(&self) -> u32 {
        self.write_count.load(Ordering::SeqCst)
    }

    /// Make subsequent writes fail, to exercise best-effort persistence.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get(&self, username: &str) -> Option<UserSession> {
        self.sessions.read().await.get(username).cloned()
    }

    async fn set(&self, username: &str, token: &str, login_time: Timestamp) -> Result<()> {
        validate_username(username)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TokenError::Unavailable("writes disabled".to_string()));
        }
        self.sessions.write().await.insert(
            username.to_string(),
            UserSession {
                token: token.to_string(),
                login_last_time: login_time,
            },
        );
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, username: &str) -> Result<()> {
        self.sessions.write().await.remove(username);
        Ok(())
    }
}
