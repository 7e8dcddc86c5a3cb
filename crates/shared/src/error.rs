//! Error types shared across Chatline crates

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SharedError {
    #[error("Presence store request failed: {0}")]
    PresenceStore(String),

    #[error("Presence store rejected update with status {0}")]
    PresenceStoreStatus(u16),
}

impl SharedError {
    /// Whether retrying the same request could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            SharedError::PresenceStore(_) => true,
            SharedError::PresenceStoreStatus(status) => *status == 429 || *status >= 500,
        }
    }
}
