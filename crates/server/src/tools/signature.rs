#![forbid(unsafe_code)]

use super::definitions::SIGNATURE_OPS;
use super::{render, unknown_op};
use crate::{
    Args, PmServer, ai_store_error, optional_string, request_now, require_stage, require_string,
};
use pm_storage::{OtpGenerateRequest, SignatureApplyRequest, SignatureOutcome};
use serde_json::{Value, json};

pub(super) fn handle(server: &mut PmServer, args: &Args, op: &str) -> Result<Value, Value> {
    match op {
        "generate_otp" => {
            let request = OtpGenerateRequest {
                application_id: require_string(args, "application_id")?,
                stage: require_stage(args, "stage")?,
                officer_id: require_string(args, "officer_id")?,
                now_ms: request_now(args)?,
            };
            let issue = server
                .store_mut()
                .generate_otp(request)
                .map_err(ai_store_error)?;
            tracing::info!(
                signature_id = issue.record.signature_id,
                application_id = %issue.record.application_id,
                officer_id = %issue.record.officer_id,
                "otp issued"
            );
            // The notifier delivers the code; this is the only place it leaves the process.
            Ok(json!({
                "signature": render::signature(&issue.record),
                "otp_code": issue.otp_code,
            }))
        }
        "apply" => {
            let request = SignatureApplyRequest {
                application_id: require_string(args, "application_id")?,
                stage: require_stage(args, "stage")?,
                officer_id: require_string(args, "officer_id")?,
                otp_code: require_string(args, "otp_code")?,
                document_path: optional_string(args, "document_path")?,
                now_ms: request_now(args)?,
            };
            let (store, hsm) = server.store_and_hsm();
            let result = store
                .apply_signature(request, hsm)
                .map_err(ai_store_error)?;
            let attempts_remaining = match result.outcome {
                SignatureOutcome::Mismatch { attempts_remaining } => Some(attempts_remaining),
                SignatureOutcome::Signed | SignatureOutcome::Failed => None,
            };
            Ok(json!({
                "outcome": result.outcome.as_str(),
                "attempts_remaining": attempts_remaining,
                "signature": render::signature(&result.record),
            }))
        }
        "list" => {
            let application_id = require_string(args, "application_id")?;
            let rows = server
                .store()
                .signatures_for(&application_id)
                .map_err(ai_store_error)?;
            Ok(json!({ "signatures": render::list(&rows, render::signature) }))
        }
        _ => Err(unknown_op("signature", op, SIGNATURE_OPS)),
    }
}
