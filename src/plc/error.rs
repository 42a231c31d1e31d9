// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use thiserror::Error;

/// Failure of a single register link request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The socket or session is gone; the link must be reopened.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// A single request failed while the link itself is still usable.
    #[error("I/O error: {0}")]
    Transient(String),
}

impl LinkError {
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }
}

/// Errors returned by [`super::ConnectionManager`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlcError {
    #[error("failed to connect to PLC at {endpoint} after {attempts} attempts: {reason}")]
    ConnectFailed {
        endpoint: String,
        attempts: u32,
        reason: String,
    },

    #[error("PLC connection lost: {0}")]
    ConnectionLost(String),

    #[error("PLC I/O error: {0}")]
    Transient(String),

    #[error("unknown PLC command: {0}")]
    UnknownCommand(String),
}

impl PlcError {
    /// True for errors after which the link is considered down.
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, Self::ConnectFailed { .. } | Self::ConnectionLost(_))
    }
}

impl From<LinkError> for PlcError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::ConnectionLost(msg) => Self::ConnectionLost(msg),
            LinkError::Transient(msg) => Self::Transient(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_error_classification_is_preserved() {
        let lost: PlcError = LinkError::ConnectionLost("reset by peer".into()).into();
        let glitch: PlcError = LinkError::Transient("illegal data address".into()).into();
        assert!(lost.is_connection_loss());
        assert!(!glitch.is_connection_loss());
        assert!(!PlcError::UnknownCommand("x".into()).is_connection_loss());
        assert_eq!(glitch.to_string(), "PLC I/O error: illegal data address");
    }
}
