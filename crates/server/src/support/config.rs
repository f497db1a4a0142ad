#![forbid(unsafe_code)]

use pm_storage::WorkflowPolicy;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_STORAGE_DIR: &str = ".pmcrms";
const DEFAULT_HSM_TIMEOUT_MS: u64 = 10_000;

#[derive(Clone, Debug)]
pub(crate) struct ServerConfig {
    pub(crate) storage_dir: PathBuf,
    pub(crate) hsm_url: Option<String>,
    pub(crate) hsm_timeout: Duration,
    pub(crate) policy: WorkflowPolicy,
    pub(crate) log_level: Option<String>,
}

impl ServerConfig {
    /// Flags win over environment variables; both fall back to defaults.
    pub(crate) fn from_env() -> Result<Self, String> {
        let args = std::env::args().skip(1).collect::<Vec<_>>();
        Self::from_parts(&args, |key| std::env::var(key).ok())
    }

    pub(crate) fn from_parts(
        args: &[String],
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, String> {
        let lookup = |flag: &str, env_key: Option<&str>| -> Option<String> {
            flag_value(args, flag)
                .or_else(|| env_key.and_then(&env))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let storage_dir = lookup("--storage-dir", Some("PMCRMS_STORAGE_DIR"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR));
        let hsm_url = lookup("--hsm-url", Some("PMCRMS_HSM_URL"));
        let hsm_timeout_ms = parse_number::<u64>(
            lookup("--hsm-timeout-ms", Some("PMCRMS_HSM_TIMEOUT_MS")),
            "--hsm-timeout-ms",
        )?
        .unwrap_or(DEFAULT_HSM_TIMEOUT_MS);

        let mut policy = WorkflowPolicy::default();
        if let Some(secs) = parse_number::<i64>(
            lookup("--otp-ttl-secs", Some("PMCRMS_OTP_TTL_SECS")),
            "--otp-ttl-secs",
        )? {
            policy.otp_ttl_ms = positive_secs_to_ms(secs, "--otp-ttl-secs")?;
        }
        if let Some(secs) = parse_number::<i64>(
            lookup("--otp-cooldown-secs", Some("PMCRMS_OTP_COOLDOWN_SECS")),
            "--otp-cooldown-secs",
        )? {
            policy.otp_cooldown_ms = positive_secs_to_ms(secs, "--otp-cooldown-secs")?;
        }

        Ok(Self {
            storage_dir,
            hsm_url,
            hsm_timeout: Duration::from_millis(hsm_timeout_ms),
            policy,
            log_level: lookup("--log-level", None),
        })
    }
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let mut it = args.iter();
    let mut found = None;
    while let Some(arg) = it.next() {
        if arg == flag {
            found = it.next().cloned();
        } else if let Some(value) = arg.strip_prefix(flag).and_then(|rest| rest.strip_prefix('=')) {
            found = Some(value.to_string());
        }
    }
    found
}

fn parse_number<T: std::str::FromStr>(
    raw: Option<String>,
    flag: &str,
) -> Result<Option<T>, String> {
    raw.map(|value| {
        value
            .parse::<T>()
            .map_err(|_| format!("{flag} must be a number (got {value:?})"))
    })
    .transpose()
}

fn positive_secs_to_ms(secs: i64, flag: &str) -> Result<i64, String> {
    if secs <= 0 {
        return Err(format!("{flag} must be > 0"));
    }
    secs.checked_mul(1000)
        .ok_or_else(|| format!("{flag} is too large"))
}
