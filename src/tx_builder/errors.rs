//! Error types for the launch pipeline
//!
//! One taxonomy covers everything between form validation and the final
//! confirmation query. Each variant tells the flow layer two things:
//! - whether the user can simply try again from Review (`is_retryable`)
//! - how the failure is labelled in metrics and logs (`category`)
//!
//! Messages shown to users go through [`LaunchError::user_message`], which
//! redacts base58 addresses and keys.

use thiserror::Error;

/// Comprehensive error type for all launch operations
#[derive(Error, Debug)]
pub enum LaunchError {
    /// Request failed validation before any network call
    ///
    /// User-correctable: bad symbol, decimals out of range, URI too long,
    /// supply overflowing the raw amount, etc.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Wallet is missing a capability the launch needs
    ///
    /// Typically a wallet that cannot sign transactions or messages.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The user declined the signing prompt
    ///
    /// Nothing was submitted; messaging should be non-alarming.
    #[error("Signing rejected: {0}")]
    SigningRejected(String),

    /// Expired blockhash, timeout, congestion or transport failure
    ///
    /// Safe to retry from Review. When the failure happened after the first
    /// bundle was sent the signature is attached so the caller can still
    /// query its status.
    #[error("Network error: {reason}")]
    NetworkTransient {
        reason: String,
        signature: Option<String>,
    },

    /// The ledger rejected the bundle (preflight or execution failure)
    ///
    /// Nothing was created; `raw` carries the ledger's error payload.
    #[error("Ledger rejected transaction: {raw}")]
    LedgerExecution {
        raw: String,
        signature: Option<String>,
    },

    /// Cancelled before the first bundle was submitted
    #[error("Launch cancelled before submission")]
    Cancelled,

    /// Another launch for the same key is already in flight
    #[error("Launch already in progress for {0}")]
    DuplicateSubmission(String),

    /// Instructions were assembled in an order that breaks an invariant
    ///
    /// Always a bug in the sequencer, never a user error.
    #[error("Invalid instruction order: {0}")]
    InvalidInstructionOrder(String),

    /// Missing or inconsistent configuration (fee wallet, pool config, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An external collaborator (bonding curve service, rent oracle,
    /// upload service) returned something unusable
    #[error("{service} error: {reason}")]
    Collaborator { service: String, reason: String },

    /// Internal invariant violation or unexpected state
    #[error("Internal error: {0}")]
    Internal(String),

    /// Wrapped error from external crates
    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl LaunchError {
    /// Whether re-entering the flow at Review might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkTransient { .. } => true,
            // Nothing was created, so a fresh attempt is safe
            Self::LedgerExecution { .. } => true,
            Self::SigningRejected(_) => true,
            Self::Cancelled => true,
            Self::DuplicateSubmission(_) => true,
            Self::Collaborator { .. } => true,

            Self::Validation(_) => false,
            Self::Authentication(_) => false,
            Self::InvalidInstructionOrder(_) => false,
            Self::Configuration(_) => false,
            Self::Internal(_) => false,
            Self::External(_) => false,
        }
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Authentication(_) => "authentication",
            Self::SigningRejected(_) => "signing_rejected",
            Self::NetworkTransient { .. } => "network",
            Self::LedgerExecution { .. } => "ledger",
            Self::Cancelled => "cancelled",
            Self::DuplicateSubmission(_) => "duplicate",
            Self::InvalidInstructionOrder(_) => "order",
            Self::Configuration(_) => "config",
            Self::Collaborator { .. } => "collaborator",
            Self::Internal(_) => "internal",
            Self::External(_) => "external",
        }
    }

    /// True when the error happened before anything irreversible
    pub fn nothing_submitted(&self) -> bool {
        match self {
            Self::NetworkTransient { signature, .. } => signature.is_none(),
            _ => true,
        }
    }

    /// Single sanitized message suitable for display
    pub fn user_message(&self) -> String {
        let message = match self {
            Self::Validation(reason) => format!("Please check your token details: {reason}"),
            Self::Authentication(reason) => {
                format!("Your wallet cannot complete this launch: {reason}")
            }
            Self::SigningRejected(_) => {
                "Signing was cancelled in your wallet. Nothing was submitted.".to_string()
            }
            Self::NetworkTransient { signature: None, .. } => {
                "The network is busy or the request expired. Please try again.".to_string()
            }
            Self::NetworkTransient {
                signature: Some(_), ..
            } => "The launch was sent but its status is unknown yet. Check the explorer before retrying."
                .to_string(),
            Self::LedgerExecution { raw, .. } => {
                format!("The transaction was rejected and nothing was created ({raw}).")
            }
            Self::Cancelled => "Launch cancelled. Nothing was submitted.".to_string(),
            Self::DuplicateSubmission(_) => {
                "A launch is already in progress. Please wait for it to finish.".to_string()
            }
            Self::InvalidInstructionOrder(_) | Self::Internal(_) | Self::External(_) => {
                "Something went wrong while preparing the launch.".to_string()
            }
            Self::Configuration(_) => "The launch service is misconfigured.".to_string(),
            Self::Collaborator { service, .. } => {
                format!("The {service} is unavailable right now. Please try again.")
            }
        };
        crate::security::redact_sensitive(&message)
    }
}

// Convenience constructors for common error scenarios
impl LaunchError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Self::NetworkTransient {
            reason: reason.into(),
            signature: None,
        }
    }

    pub fn collaborator(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Collaborator {
            service: service.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Self::InvalidInstructionOrder(reason.into())
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }
}

impl From<solana_sdk::program_error::ProgramError> for LaunchError {
    fn from(err: solana_sdk::program_error::ProgramError) -> Self {
        Self::Internal(format!("instruction encoding failed: {err}"))
    }
}
