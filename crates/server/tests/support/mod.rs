#![forbid(unsafe_code)]
#![allow(dead_code)]

use serde_json::{Value, json};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

pub(crate) const T0: i64 = 1_700_000_000_000;

pub(crate) struct Server {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    storage_dir: PathBuf,
    next_id: i64,
}

impl Server {
    pub(crate) fn start(test_name: &str) -> Self {
        let storage_dir = temp_dir(test_name);
        let mut child = Command::new(env!("CARGO_BIN_EXE_pmcrms_server"))
            .arg("--storage-dir")
            .arg(&storage_dir)
            .arg("--log-level")
            .arg("warn")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn pmcrms_server");

        let stdin = child.stdin.take().expect("stdin");
        let stdout = BufReader::new(child.stdout.take().expect("stdout"));

        Self {
            child,
            stdin,
            stdout,
            storage_dir,
            next_id: 100,
        }
    }

    pub(crate) fn start_initialized(test_name: &str) -> Self {
        let mut server = Self::start(test_name);
        server.initialize_default();
        server
    }

    pub(crate) fn storage_dir(&self) -> &std::path::Path {
        &self.storage_dir
    }

    pub(crate) fn send(&mut self, req: Value) {
        writeln!(self.stdin, "{req}").expect("write request");
        self.stdin.flush().expect("flush request");
    }

    pub(crate) fn send_raw(&mut self, line: &str) {
        writeln!(self.stdin, "{line}").expect("write raw line");
        self.stdin.flush().expect("flush raw line");
    }

    pub(crate) fn recv(&mut self) -> Value {
        let mut line = String::new();
        self.stdout.read_line(&mut line).expect("read response");
        assert!(!line.trim().is_empty(), "empty response line");
        serde_json::from_str(&line).expect("parse response json")
    }

    pub(crate) fn request(&mut self, req: Value) -> Value {
        self.send(req);
        self.recv()
    }

    pub(crate) fn initialize_default(&mut self) {
        let _ = self.request(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "test", "version": "0" }
            }
        }));
        self.send(json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized",
            "params": {}
        }));
    }

    /// Calls a tool and returns the decoded envelope.
    pub(crate) fn call(&mut self, tool: &str, arguments: Value) -> Value {
        self.next_id += 1;
        let resp = self.request(json!({
            "jsonrpc": "2.0",
            "id": self.next_id,
            "method": "tools/call",
            "params": { "name": tool, "arguments": arguments }
        }));
        extract_tool_text(&resp)
    }

    /// Calls a tool and returns `result`, failing the test on an error envelope.
    pub(crate) fn call_ok(&mut self, tool: &str, arguments: Value) -> Value {
        let envelope = self.call(tool, arguments);
        assert_eq!(
            envelope["success"],
            json!(true),
            "{tool} call failed: {envelope}"
        );
        envelope["result"].clone()
    }

    /// Calls a tool that must fail and returns its `error` object.
    pub(crate) fn call_err(&mut self, tool: &str, arguments: Value) -> Value {
        let envelope = self.call(tool, arguments);
        assert_eq!(
            envelope["success"],
            json!(false),
            "{tool} call unexpectedly succeeded: {envelope}"
        );
        envelope["error"].clone()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.storage_dir);
    }
}

pub(crate) fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("pmcrms_server_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub(crate) fn extract_tool_text(resp: &Value) -> Value {
    let text = resp
        .get("result")
        .and_then(|v| v.get("content"))
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("text"))
        .and_then(|v| v.as_str())
        .expect("result.content[0].text");
    serde_json::from_str(text).expect("tool text is json")
}

pub(crate) fn assert_json_rpc_error(resp: &Value, expected_code: i64) {
    let code = resp
        .get("error")
        .and_then(|v| v.get("code"))
        .and_then(|v| v.as_i64())
        .expect("error.code");
    assert_eq!(code, expected_code);
}

/// One officer per role and a round-robin rule for each role on the structural engineer path.
pub(crate) fn seed_structural_pipeline(server: &mut Server) {
    let roster = [
        ("je-1", "junior_engineer"),
        ("ae-struct-1", "ae_structural"),
        ("ee-1", "executive_engineer"),
        ("ce-1", "city_engineer"),
        ("clerk-1", "clerk"),
    ];
    for (officer_id, role) in roster {
        server.call_ok(
            "admin",
            json!({
                "op": "officer_upsert",
                "officer_id": officer_id,
                "name": format!("Officer {officer_id}"),
                "role": role,
                "now": T0
            }),
        );
        server.call_ok(
            "admin",
            json!({
                "op": "rule_upsert",
                "position_type": "structural_engineer",
                "target_role": role,
                "strategy": "round_robin",
                "now": T0
            }),
        );
    }
}

pub(crate) fn create_and_submit(server: &mut Server, application_id: &str, now_ms: i64) -> Value {
    server.call_ok(
        "applications",
        json!({
            "op": "create",
            "application_id": application_id,
            "position_type": "structural_engineer",
            "applicant_name": "Asha Patil",
            "now": now_ms
        }),
    );
    server.call_ok(
        "applications",
        json!({ "op": "submit", "application_id": application_id, "now": now_ms }),
    )
}

pub(crate) fn approve(
    server: &mut Server,
    application_id: &str,
    stage: &str,
    officer_id: &str,
    now_ms: i64,
) -> Value {
    server.call_ok(
        "workflow",
        json!({
            "op": "transition",
            "application_id": application_id,
            "stage": stage,
            "decision": "approved",
            "officer_id": officer_id,
            "now": now_ms
        }),
    )
}
