#![forbid(unsafe_code)]

use std::time::Duration;

pub const DEFAULT_OTP_TTL_MS: i64 = 5 * 60 * 1000;
pub const DEFAULT_MAX_OTP_ATTEMPTS: i64 = 3;
pub const DEFAULT_OTP_COOLDOWN_MS: i64 = 60 * 1000;
pub const DEFAULT_HSM_RETRIES: u32 = 2;
pub const DEFAULT_HSM_BACKOFF_MS: u64 = 200;
pub const ROUND_ROBIN_CAS_RETRIES: u32 = 3;

/// Tunables for the signature coordinator and the assignment engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowPolicy {
    pub otp_ttl_ms: i64,
    pub max_otp_attempts: i64,
    pub otp_cooldown_ms: i64,
    /// Retries after the first failed HSM call.
    pub hsm_retries: u32,
    /// Backoff before retry `n` is `hsm_backoff * n`.
    pub hsm_backoff: Duration,
    pub round_robin_cas_retries: u32,
}

impl Default for WorkflowPolicy {
    fn default() -> Self {
        Self {
            otp_ttl_ms: DEFAULT_OTP_TTL_MS,
            max_otp_attempts: DEFAULT_MAX_OTP_ATTEMPTS,
            otp_cooldown_ms: DEFAULT_OTP_COOLDOWN_MS,
            hsm_retries: DEFAULT_HSM_RETRIES,
            hsm_backoff: Duration::from_millis(DEFAULT_HSM_BACKOFF_MS),
            round_robin_cas_retries: ROUND_ROBIN_CAS_RETRIES,
        }
    }
}
