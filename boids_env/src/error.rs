//! Error types for the environment abstraction.

use thiserror::Error;

/// Errors that can occur while delivering events between entities.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The recipient's mailbox was dropped (its task has exited)
    #[error("Mailbox closed: {0}")]
    MailboxClosed(String),

    /// No entity with this id is registered in the space
    #[error("Unknown recipient: {0}")]
    UnknownRecipient(String),
}

impl EnvError {
    /// Creates a closed-mailbox error.
    pub fn closed(entity: impl std::fmt::Display) -> Self {
        Self::MailboxClosed(entity.to_string())
    }

    /// Creates an unknown-recipient error.
    pub fn unknown(entity: impl std::fmt::Display) -> Self {
        Self::UnknownRecipient(entity.to_string())
    }
}
