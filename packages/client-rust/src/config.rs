//! Client-side configuration for the open-group reaction glue.

use std::time::Duration;

use crate::rooms::DEFAULT_SNAPSHOT_CAPACITY;

/// Session-level configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Our (blinded or unblinded) session id as the server reports it in
    /// `reactors`.
    pub our_pubkey: String,
    /// How long a reaction request may take before its optimistic mutation
    /// is dropped.
    pub submission_timeout: Duration,
    /// Number of recently deleted message ids remembered per room.
    pub deletion_window: usize,
    /// Number of canonical message snapshots held per room. The snapshots of
    /// the messages seen longest ago are evicted first.
    pub snapshot_capacity: usize,
    pub log: LogConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            our_pubkey: String::new(),
            submission_timeout: Duration::from_secs(30),
            deletion_window: 200,
            snapshot_capacity: DEFAULT_SNAPSHOT_CAPACITY,
            log: LogConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Builds a default configuration for the given identity.
    #[must_use]
    pub fn for_user(our_pubkey: impl Into<String>) -> Self {
        Self {
            our_pubkey: our_pubkey.into(),
            ..Self::default()
        }
    }

    /// Checks the settings that have no usable zero value.
    ///
    /// # Errors
    ///
    /// Returns the first offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.our_pubkey.is_empty() {
            return Err(ConfigError::MissingPubkey);
        }
        if self.submission_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.deletion_window == 0 {
            return Err(ConfigError::ZeroDeletionWindow);
        }
        if self.snapshot_capacity == 0 {
            return Err(ConfigError::ZeroSnapshotCapacity);
        }
        Ok(())
    }
}

/// Logging output settings, consumed by [`init_tracing`](crate::logging::init_tracing).
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub default_directive: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_directive: "opengroup_core=info,opengroup_client=info,warn".to_string(),
            json: false,
        }
    }
}

/// Invalid [`ClientConfig`] setting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("our_pubkey must be set")]
    MissingPubkey,
    #[error("submission_timeout must be non-zero")]
    ZeroTimeout,
    #[error("deletion_window must be non-zero")]
    ZeroDeletionWindow,
    #[error("snapshot_capacity must be non-zero")]
    ZeroSnapshotCapacity,
}
