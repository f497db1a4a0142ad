#![forbid(unsafe_code)]

use pm_storage::{HsmClient, HsmError, HsmReceipt, HsmSignRequest};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct SignBody<'a> {
    signature_id: i64,
    application_id: &'a str,
    stage: &'a str,
    officer_id: &'a str,
    document_path: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SignReply {
    transaction_id: String,
    signed_document_path: String,
}

/// Remote HSM speaking JSON over HTTP: `POST {endpoint}/sign`.
pub(crate) struct HttpHsmClient {
    agent: ureq::Agent,
    sign_url: String,
}

impl HttpHsmClient {
    pub(crate) fn new(endpoint: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        Self {
            agent,
            sign_url: format!("{}/sign", endpoint.trim_end_matches('/')),
        }
    }
}

impl HsmClient for HttpHsmClient {
    fn sign(&self, request: &HsmSignRequest<'_>) -> Result<HsmReceipt, HsmError> {
        let body = SignBody {
            signature_id: request.signature_id,
            application_id: request.application_id,
            stage: request.stage.as_str(),
            officer_id: request.officer_id,
            document_path: request.document_path,
        };
        let resp = match self
            .agent
            .post(&self.sign_url)
            .set("idempotency-key", &format!("sig-{}", request.signature_id))
            .send_json(&body)
        {
            Ok(resp) => resp,
            Err(ureq::Error::Status(code, _)) if code >= 500 => {
                return Err(HsmError::Unavailable(format!("hsm http status {code}")));
            }
            Err(ureq::Error::Status(code, resp)) => {
                let detail = resp.into_string().unwrap_or_default();
                return Err(HsmError::Rejected(format!(
                    "hsm http status {code}: {}",
                    detail.trim()
                )));
            }
            Err(ureq::Error::Transport(err)) => {
                return Err(HsmError::Unavailable(format!("hsm transport error: {err}")));
            }
        };

        let reply: SignReply = resp
            .into_json()
            .map_err(|err| HsmError::Unavailable(format!("hsm reply unreadable: {err}")))?;
        if reply.transaction_id.trim().is_empty() || reply.signed_document_path.trim().is_empty() {
            return Err(HsmError::Unavailable("hsm reply is missing fields".to_string()));
        }
        Ok(HsmReceipt {
            transaction_id: reply.transaction_id,
            signed_document_path: reply.signed_document_path,
        })
    }
}

/// Development signer: derives a stable transaction id from the request instead of holding a key.
pub(crate) struct LocalDigestHsm;

impl HsmClient for LocalDigestHsm {
    fn sign(&self, request: &HsmSignRequest<'_>) -> Result<HsmReceipt, HsmError> {
        let mut hasher = Sha256::new();
        hasher.update(request.signature_id.to_be_bytes());
        for part in [
            request.application_id,
            request.stage.as_str(),
            request.officer_id,
            request.document_path.unwrap_or(""),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();

        let signed_document_path = match request.document_path {
            Some(path) if !path.trim().is_empty() => format!("{}.signed", path.trim()),
            _ => format!(
                "signed/{}-{}.pdf",
                request.application_id,
                request.stage.as_str()
            ),
        };
        Ok(HsmReceipt {
            transaction_id: format!("local-{hex}"),
            signed_document_path,
        })
    }
}
