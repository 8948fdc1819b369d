// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::primitives::B256;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Connection failed to endpoint: {0}")]
    Connection(String),

    #[error("API request failed: {0}")]
    Api(String),

    #[error("Validation failed for field {field}: {message}")]
    Validation { field: String, message: String },

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Failures raised by the wallet/signing provider. Every variant is fatal to
/// the job that produced it, none of them is fatal to the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("User rejected the request: {0}")]
    Rejected(String),

    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    #[error("Timed out waiting for receipt of {0:#x}")]
    ReceiptTimeout(B256),

    #[error("Transaction {0:#x} reverted")]
    ReceiptReverted(B256),

    #[error("Receipt lookup failed: {0}")]
    Receipt(String),

    #[error("Wallet activation failed: {0}")]
    Activation(String),

    #[error("Simulation failed: {0}")]
    Simulation(String),

    #[error("Unsupported wallet operation: {0}")]
    Unsupported(String),
}

impl WalletError {
    /// Text shown to the user, without the variant prefix.
    pub fn short_message(&self) -> String {
        match self {
            WalletError::Rejected(msg)
            | WalletError::Broadcast(msg)
            | WalletError::Receipt(msg)
            | WalletError::Activation(msg)
            | WalletError::Simulation(msg)
            | WalletError::Unsupported(msg) => msg
                .lines()
                .next()
                .unwrap_or_default()
                .trim()
                .to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        matches!(self, WalletError::Rejected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_keeps_first_line_only() {
        let err = WalletError::Rejected("User denied signature\nDetails: request id 7".into());
        assert_eq!(err.short_message(), "User denied signature");
        assert!(err.is_user_rejection());
    }

    #[test]
    fn receipt_errors_render_hash() {
        let err = WalletError::ReceiptReverted(B256::repeat_byte(0xab));
        assert!(err.short_message().starts_with("Transaction 0xabab"));
        assert!(!err.is_user_rejection());
    }

    #[test]
    fn api_errors_use_generic_prefix() {
        let err = AppError::Api("503 Service Unavailable".into());
        assert_eq!(err.to_string(), "API request failed: 503 Service Unavailable");
    }
}
