//! Error types for the cardscore client
//!
//! This module defines every error that can surface while talking to the
//! card management API or while manipulating local ledger state.
//!
//! # Error Categories
//!
//! - **Validation Errors**: Bad amounts, missing form fields, unknown records.
//!   Raised before any network call; local state is untouched.
//! - **Remote Errors**: Authentication failures, non-2xx responses, transport
//!   and decoding failures.
//! - **Local Errors**: Missing session, session storage and configuration
//!   problems, arithmetic overflow while predicting a balance.

use rust_decimal::Decimal;
use thiserror::Error;

use super::card::{CardId, LoadId, OperationId};

/// Main error type for the cardscore client
///
/// Every variant carries enough context to be shown to the operator as-is.
/// The type is `Clone + PartialEq` so that view-models can keep the last
/// notice around and tests can compare errors directly.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Amount input is non-numeric, zero or negative
    ///
    /// Rejected locally, no request is issued.
    #[error("Invalid amount '{input}': expected a number greater than zero")]
    InvalidAmount {
        /// The raw input as typed by the operator
        input: String,
    },

    /// A required form field is empty
    #[error("Missing required field '{field}'")]
    MissingField {
        /// Name of the field
        field: String,
    },

    /// A balance-affecting action was attempted without a selected card
    #[error("No card is selected")]
    NoCardSelected,

    /// A destructive action was requested without its confirmation step
    #[error("Refusing to {action} without confirmation (pass --yes)")]
    ConfirmationRequired {
        /// What would have been deleted
        action: String,
    },

    /// The card is not part of the ledger's card list
    #[error("Card {card} not found")]
    CardNotFound {
        /// Card ID
        card: CardId,
    },

    /// The operation is not in the selected card's operation list
    #[error("Operation {operation} not found")]
    OperationNotFound {
        /// Operation ID
        operation: OperationId,
    },

    /// The recharge is not in the selected card's recharge list
    #[error("Recharge {load} not found")]
    RechargeNotFound {
        /// Recharge ID
        load: LoadId,
    },

    /// Missing or expired credential (HTTP 401/403)
    ///
    /// The caller is expected to drop the session and send the operator
    /// back to the login entry point.
    #[error("Authentication required: {message}")]
    Unauthorized {
        /// Server-provided reason
        message: String,
    },

    /// The API answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Server-provided message or the status reason
        message: String,
    },

    /// The request never produced a response
    #[error("Network error: {message}")]
    Network {
        /// Transport error description
        message: String,
    },

    /// The response body did not have the expected shape
    #[error("Unexpected response body: {message}")]
    Decode {
        /// Decoder error description
        message: String,
    },

    /// An action requiring a session was attempted while logged out
    #[error("Not logged in")]
    NotLoggedIn,

    /// Session persistence failed
    #[error("Session storage error: {message}")]
    Storage {
        /// Description of the storage failure
        message: String,
    },

    /// Runtime configuration is unusable
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },

    /// Writing a report failed
    #[error("Output error: {message}")]
    Output {
        /// Description of the write failure
        message: String,
    },

    /// Predicting a balance would overflow
    #[error("Arithmetic overflow applying {delta} to card {card}")]
    ArithmeticOverflow {
        /// Card ID
        card: CardId,
        /// Delta that could not be applied
        delta: Decimal,
    },

    /// A mutating call failed and its balance prediction was rolled back
    #[error("{action} on card {card} failed and was rolled back: {source}")]
    CommitFailed {
        /// Name of the action (recharge, add operation, ...)
        action: String,
        /// Card whose balance was restored
        card: CardId,
        /// Underlying failure
        source: Box<LedgerError>,
    },
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::Storage {
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(error: serde_json::Error) -> Self {
        LedgerError::Decode {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        LedgerError::Output {
            message: error.to_string(),
        }
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            return LedgerError::Decode {
                message: error.to_string(),
            };
        }
        match error.status() {
            Some(status) => LedgerError::from_status(status.as_u16(), error.to_string()),
            None => LedgerError::Network {
                message: error.to_string(),
            },
        }
    }
}

impl LedgerError {
    /// Create an InvalidAmount error
    pub fn invalid_amount(input: &str) -> Self {
        LedgerError::InvalidAmount {
            input: input.to_string(),
        }
    }

    /// Create a MissingField error
    pub fn missing_field(field: &str) -> Self {
        LedgerError::MissingField {
            field: field.to_string(),
        }
    }

    /// Create an Unauthorized or Api error from an HTTP status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => LedgerError::Unauthorized { message },
            _ => LedgerError::Api { status, message },
        }
    }

    /// Create a CommitFailed error wrapping the underlying failure
    pub fn commit_failed(action: &str, card: CardId, source: LedgerError) -> Self {
        LedgerError::CommitFailed {
            action: action.to_string(),
            card,
            source: Box::new(source),
        }
    }

    /// Create a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        LedgerError::Storage {
            message: message.into(),
        }
    }

    /// Whether this error means the credential is missing or no longer valid
    pub fn is_auth_failure(&self) -> bool {
        match self {
            LedgerError::Unauthorized { .. } | LedgerError::NotLoggedIn => true,
            LedgerError::CommitFailed { source, .. } => source.is_auth_failure(),
            _ => false,
        }
    }

    /// Whether the error was raised by local validation, before any request
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidAmount { .. }
                | LedgerError::MissingField { .. }
                | LedgerError::NoCardSelected
                | LedgerError::ConfirmationRequired { .. }
                | LedgerError::CardNotFound { .. }
                | LedgerError::OperationNotFound { .. }
                | LedgerError::RechargeNotFound { .. }
        )
    }
}
