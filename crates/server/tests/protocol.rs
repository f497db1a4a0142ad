#![forbid(unsafe_code)]

mod support;

use serde_json::{Value, json};
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};
use support::*;

#[test]
fn initialize_reports_server_info() {
    let mut server = Server::start("initialize");
    let resp = server.request(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {}
    }));
    assert_eq!(resp["id"], json!(1));
    assert_eq!(resp["result"]["protocolVersion"], json!("2024-11-05"));
    assert_eq!(resp["result"]["serverInfo"]["name"], json!("pmcrms-server"));
    assert_eq!(
        resp["result"]["serverInfo"]["version"],
        json!(env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn requests_before_initialized_are_refused() {
    let mut server = Server::start("not_initialized");
    let resp = server.request(json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }));
    assert_json_rpc_error(&resp, -32002);
}

#[test]
fn tools_list_names_every_tool() {
    let mut server = Server::start_initialized("tools_list");
    let resp = server.request(json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }));
    let names: Vec<_> = resp["result"]["tools"]
        .as_array()
        .expect("tools")
        .iter()
        .filter_map(|tool| tool["name"].as_str().map(str::to_string))
        .collect();
    assert_eq!(
        names,
        vec![
            "applications",
            "workflow",
            "assignment",
            "appointment",
            "signature",
            "admin",
            "report"
        ]
    );
}

#[test]
fn unknown_method_and_malformed_lines_keep_the_session_alive() {
    let mut server = Server::start_initialized("malformed");

    let resp = server.request(json!({ "jsonrpc": "2.0", "id": 3, "method": "resources/list" }));
    assert_json_rpc_error(&resp, -32601);

    server.send_raw("{not json");
    let resp = server.recv();
    assert_json_rpc_error(&resp, -32700);
    assert_eq!(resp["id"], Value::Null);

    let resp = server.request(json!({ "jsonrpc": "2.0", "id": 4 }));
    assert_json_rpc_error(&resp, -32600);
    assert_eq!(resp["id"], json!(4));

    let resp = server.request(json!({ "jsonrpc": "2.0", "id": 5, "method": "ping" }));
    assert_eq!(resp["result"], json!({}));
}

#[test]
fn tool_errors_are_flagged_in_the_call_result() {
    let mut server = Server::start_initialized("is_error");
    let resp = server.request(json!({
        "jsonrpc": "2.0",
        "id": 6,
        "method": "tools/call",
        "params": { "name": "nope", "arguments": {} }
    }));
    assert_eq!(resp["result"]["isError"], json!(true));
    let envelope = extract_tool_text(&resp);
    assert_eq!(envelope["error"]["code"], json!("UNKNOWN_TOOL"));

    let resp = server.request(json!({
        "jsonrpc": "2.0",
        "id": 7,
        "method": "tools/call",
        "params": { "name": "report", "arguments": { "op": "stage_counts" } }
    }));
    assert_eq!(resp["result"]["isError"], json!(false));
}

#[test]
fn session_record_tracks_transport_and_methods() {
    let mut server = Server::start_initialized("session_log");
    let _ = server.request(json!({ "jsonrpc": "2.0", "id": 8, "method": "tools/list" }));

    let record = std::fs::read_to_string(server.storage_dir().join("pmcrms_last_session.txt"))
        .expect("session record");
    assert!(record.contains("mode=newline_json"), "record={record}");
    assert!(record.contains("last_method=tools/list"), "record={record}");
}

#[test]
fn content_length_framing_is_detected() {
    let storage_dir = temp_dir("content_length");
    let mut child = Command::new(env!("CARGO_BIN_EXE_pmcrms_server"))
        .arg("--storage-dir")
        .arg(&storage_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn pmcrms_server");
    let mut stdin = child.stdin.take().expect("stdin");
    let mut stdout = BufReader::new(child.stdout.take().expect("stdout"));

    let body = serde_json::to_vec(&json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {}
    }))
    .expect("serialize");
    write!(stdin, "Content-Length: {}\r\n\r\n", body.len()).expect("header");
    stdin.write_all(&body).expect("body");
    stdin.flush().expect("flush");

    let mut content_length = None;
    loop {
        let mut line = String::new();
        let read = stdout.read_line(&mut line).expect("header line");
        assert!(read > 0, "unexpected EOF reading response headers");
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((key, value)) = trimmed.split_once(':')
            && key.trim().eq_ignore_ascii_case("content-length")
        {
            content_length = value.trim().parse::<usize>().ok();
        }
    }
    let mut buf = vec![0u8; content_length.expect("content-length header")];
    stdout.read_exact(&mut buf).expect("body");
    let resp: Value = serde_json::from_slice(&buf).expect("json body");
    assert_eq!(resp["result"]["serverInfo"]["name"], json!("pmcrms-server"));

    let _ = child.kill();
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(&storage_dir);
}
