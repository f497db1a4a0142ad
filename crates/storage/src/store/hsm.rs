#![forbid(unsafe_code)]

use pm_core::Stage;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct HsmSignRequest<'a> {
    pub signature_id: i64,
    pub application_id: &'a str,
    pub stage: Stage,
    pub officer_id: &'a str,
    pub document_path: Option<&'a str>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HsmReceipt {
    pub transaction_id: String,
    pub signed_document_path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum HsmError {
    /// Network, timeout or 5xx. Retried.
    #[error("hsm unavailable: {0}")]
    Unavailable(String),
    /// The HSM answered and refused to sign. Not retried.
    #[error("hsm rejected the request: {0}")]
    Rejected(String),
}

/// Signing-key custodian. Implementations must be safe to call more than once for the same
/// `signature_id`.
pub trait HsmClient {
    fn sign(&self, request: &HsmSignRequest<'_>) -> Result<HsmReceipt, HsmError>;
}

pub(in crate::store) struct HsmFailure {
    pub(in crate::store) attempts: u32,
    pub(in crate::store) error: HsmError,
}

pub(in crate::store) fn sign_with_retry(
    hsm: &dyn HsmClient,
    request: &HsmSignRequest<'_>,
    retries: u32,
    backoff: Duration,
) -> Result<HsmReceipt, HsmFailure> {
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match hsm.sign(request) {
            Ok(receipt) => return Ok(receipt),
            Err(HsmError::Unavailable(detail)) if attempts <= retries => {
                tracing::warn!(
                    signature_id = request.signature_id,
                    attempt = attempts,
                    %detail,
                    "hsm call failed; retrying"
                );
                std::thread::sleep(backoff * attempts);
            }
            Err(error) => return Err(HsmFailure { attempts, error }),
        }
    }
}
