//! Integration flow error types

use std::fmt;

use super::verifier::VerificationError;

/// Errors surfaced to the user by the integration flow
///
/// Every variant ends its step. Nothing is retried automatically; the user may restart the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationError {
    /// Returned state does not match the stored verification token
    CsrfMismatch,

    /// Returned state belongs to another flow sharing the redirect URI
    CsrfForeignFlow,

    /// Code exchange failed or returned no access token
    TokenExchangeFailed(String),

    /// User/team context could not be loaded
    ContextFetchFailed(String),

    /// Dedup check for the selected team failed
    DedupCheckFailed(String),

    /// Integration context could not be persisted
    PersistFailed(String),

    /// Webhook provisioning failed
    ProvisionFailed(String),
}

impl fmt::Display for IntegrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrationError::CsrfMismatch => write!(f, "Verification state mismatch"),
            IntegrationError::CsrfForeignFlow => write!(f, "Redirect belongs to another flow"),
            IntegrationError::TokenExchangeFailed(msg) => write!(f, "Token exchange failed: {}", msg),
            IntegrationError::ContextFetchFailed(msg) => write!(f, "Failed to load Linear teams: {}", msg),
            IntegrationError::DedupCheckFailed(msg) => {
                write!(f, "Failed to check existing webhook: {}", msg)
            }
            IntegrationError::PersistFailed(msg) => write!(f, "Failed to save integration: {}", msg),
            IntegrationError::ProvisionFailed(msg) => write!(f, "Failed to create webhook: {}", msg),
        }
    }
}

impl std::error::Error for IntegrationError {}

impl IntegrationError {
    /// Message shown to the user in the blocking alert
    pub fn user_message(&self) -> String {
        match self {
            IntegrationError::CsrfMismatch => {
                "Linear authentication could not be verified. Please start the connection again."
                    .to_string()
            }
            IntegrationError::TokenExchangeFailed(_) => {
                "Linear authentication failed. Please start the connection again.".to_string()
            }
            IntegrationError::ContextFetchFailed(_) => {
                "Could not load your Linear teams. Please try again.".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Whether the error is reported to the user at all
    pub fn is_silent(&self) -> bool {
        matches!(self, IntegrationError::CsrfForeignFlow)
    }
}

impl From<VerificationError> for IntegrationError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::NotOurFlow => IntegrationError::CsrfForeignFlow,
            VerificationError::Mismatch => IntegrationError::CsrfMismatch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_verification_error() {
        assert_eq!(
            IntegrationError::from(VerificationError::NotOurFlow),
            IntegrationError::CsrfForeignFlow
        );
        assert_eq!(
            IntegrationError::from(VerificationError::Mismatch),
            IntegrationError::CsrfMismatch
        );
    }

    #[test]
    fn test_only_foreign_flow_is_silent() {
        assert!(IntegrationError::CsrfForeignFlow.is_silent());
        assert!(!IntegrationError::CsrfMismatch.is_silent());
        assert!(!IntegrationError::ProvisionFailed("boom".to_string()).is_silent());
    }

    #[test]
    fn test_user_message_keeps_detail_for_deploy_errors() {
        let err = IntegrationError::PersistFailed("503".to_string());
        assert_eq!(err.user_message(), "Failed to save integration: 503");

        let err = IntegrationError::TokenExchangeFailed("invalid_grant".to_string());
        assert!(!err.user_message().contains("invalid_grant"));
    }
}
