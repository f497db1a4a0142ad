#![forbid(unsafe_code)]

mod entry;
mod hsm;
mod server;
mod support;
mod tools;

pub(crate) use support::*;

use pm_storage::{HsmClient, SqliteStore};
use std::fmt::Write as _;

const MCP_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "pmcrms-server";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

fn write_last_crash(storage_dir: &std::path::Path, kind: &str, detail: &str) {
    // Never includes request bodies; OTP codes travel in them.
    let _ = std::fs::create_dir_all(storage_dir);
    let path = storage_dir.join("pmcrms_last_crash.txt");

    let mut out = String::new();
    let _ = writeln!(out, "ts={}", ts_ms_to_rfc3339(now_ms_i64()));
    let _ = writeln!(out, "pid={}", std::process::id());
    let _ = writeln!(out, "kind={kind}");
    let _ = writeln!(out, "build={}", build_fingerprint());
    let _ = writeln!(out, "args={:?}", std::env::args().collect::<Vec<_>>());
    let _ = writeln!(out, "detail={detail}");

    let _ = std::fs::write(path, out);
}

fn install_crash_reporter(storage_dir: std::path::PathBuf) {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let mut detail = info.to_string();
        let backtrace = std::backtrace::Backtrace::force_capture();
        let _ = write!(&mut detail, "\nbacktrace:\n{backtrace}");
        write_last_crash(&storage_dir, "panic", &detail);
        default_hook(info);
    }));
}

pub(crate) struct PmServer {
    initialized: bool,
    store: SqliteStore,
    hsm: Box<dyn HsmClient>,
}

fn usage() -> &'static str {
    "pmcrms_server - permit workflow core (JSON-RPC over stdio)\n\n\
USAGE:\n\
  pmcrms_server [--storage-dir DIR] [--hsm-url URL] [--hsm-timeout-ms MS]\n\
               [--otp-ttl-secs S] [--otp-cooldown-secs S] [--log-level FILTER]\n\
\n\
FLAGS:\n\
  -h, --help       Print this help and exit\n\
  -V, --version    Print version/build and exit\n\
\n\
ENV:\n\
  PMCRMS_STORAGE_DIR, PMCRMS_HSM_URL, PMCRMS_HSM_TIMEOUT_MS,\n\
  PMCRMS_OTP_TTL_SECS, PMCRMS_OTP_COOLDOWN_SECS, PMCRMS_LOG\n\
\n\
NOTES:\n\
  - Without --hsm-url documents are signed by a local SHA-256 digest signer.\n\
  - Logs go to stderr; stdout carries protocol frames only.\n"
}

fn version_line() -> String {
    format!("pmcrms_server {SERVER_VERSION} build={}", build_fingerprint())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = std::env::args().collect::<Vec<_>>();
    if args
        .iter()
        .any(|arg| matches!(arg.as_str(), "-h" | "--help"))
    {
        print!("{}", usage());
        return Ok(());
    }
    if args
        .iter()
        .any(|arg| matches!(arg.as_str(), "-V" | "--version"))
    {
        println!("{}", version_line());
        return Ok(());
    }

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(message) => {
            eprintln!("pmcrms_server: {message}");
            std::process::exit(2);
        }
    };
    init_logging(config.log_level.as_deref());

    install_crash_reporter(config.storage_dir.clone());
    let mut session = SessionLog::new(&config.storage_dir);

    let store = match SqliteStore::open_with_policy(&config.storage_dir, config.policy.clone()) {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(code = err.code(), error = %err, "storage open failed");
            write_last_crash(&config.storage_dir, "store_open", &err.to_string());
            session.note_exit("store open failed");
            return Err(err.into());
        }
    };

    let hsm: Box<dyn HsmClient> = match config.hsm_url.as_deref() {
        Some(url) => {
            tracing::info!(%url, "using remote hsm");
            Box::new(hsm::HttpHsmClient::new(url, config.hsm_timeout))
        }
        None => {
            tracing::warn!("no --hsm-url configured; using the local digest signer");
            Box::new(hsm::LocalDigestHsm)
        }
    };

    tracing::info!(
        storage_dir = %config.storage_dir.display(),
        version = SERVER_VERSION,
        "pmcrms_server starting"
    );
    let mut server = PmServer::new(store, hsm);
    if let Err(err) = entry::run_stdio(&mut server, &mut session) {
        write_last_crash(&config.storage_dir, "stdio", &err.to_string());
        session.note_exit("transport error");
        return Err(err);
    }
    Ok(())
}
