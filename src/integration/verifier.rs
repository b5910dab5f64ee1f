//! CSRF verification for the redirect round-trip

use std::fmt;
use std::sync::Arc;

use subtle::ConstantTimeEq;

use super::storage::{Storage, VERIFICATION_KEY};

/// Marker every verification token issued by this flow carries
pub const PROVIDER_MARKER: &str = "linear";

/// Verification failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationError {
    /// Returned state has no provider marker; the redirect belongs to another flow
    NotOurFlow,
    /// Returned state differs from the stored token
    Mismatch,
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationError::NotOurFlow => write!(f, "Redirect does not belong to the Linear flow"),
            VerificationError::Mismatch => write!(f, "Verification state mismatch"),
        }
    }
}

impl std::error::Error for VerificationError {}

/// Issues and checks the one-time `state` token
///
/// The token is `linear-<uuid v4>`. It is read back on return but not deleted.
#[derive(Clone)]
pub struct CsrfVerifier {
    storage: Arc<dyn Storage>,
}

impl CsrfVerifier {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Generate a fresh token and store it
    pub fn begin_verification(&self) -> anyhow::Result<String> {
        let token = format!("{}-{}", PROVIDER_MARKER, uuid::Uuid::new_v4());
        self.storage.set(VERIFICATION_KEY, &token)?;
        tracing::debug!("Stored new verification token");
        Ok(token)
    }

    /// Check the `state` echoed back by the provider
    pub fn validate_return(&self, returned_state: &str) -> Result<(), VerificationError> {
        if !returned_state.contains(PROVIDER_MARKER) {
            return Err(VerificationError::NotOurFlow);
        }

        match self.storage.get(VERIFICATION_KEY) {
            Some(expected) if constant_time_eq(&expected, returned_state) => Ok(()),
            _ => Err(VerificationError::Mismatch),
        }
    }
}

/// Constant-time string comparison
fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
