use std::io::{BufRead, BufReader, Write};
use std::process::{Command, Stdio};

use serde_json::{json, Value};

fn spawn_stdio() -> std::process::Child {
    Command::new(env!("CARGO_BIN_EXE_riskcheckd"))
        .env("RISKCHECKD_TRANSPORT", "stdio")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn riskcheckd")
}

#[test]
fn line_delimited_compute_works() {
    let mut child = spawn_stdio();
    let mut child_stdin = child.stdin.take().expect("stdin");
    let child_stdout = child.stdout.take().expect("stdout");
    let mut reader = BufReader::new(child_stdout);

    let req = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": {
            "name": "risk_compute",
            "arguments": {
                "pregnancies": 0,
                "glucose": 50,
                "bloodPressure": 40,
                "skinThickness": 0,
                "insulin": 0,
                "bmi": 10,
                "pedigreeFunction": 0,
                "age": 18
            }
        }
    });

    writeln!(child_stdin, "{req}").expect("write request");
    writeln!(child_stdin, "{{not json").expect("write garbage");
    drop(child_stdin);

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let response: Value = serde_json::from_str(&line).expect("parse response json");
    let report = &response["result"]["structuredContent"];
    assert_eq!(report["p30"], 2.0);
    assert_eq!(report["finalTier"], 1);
    assert_eq!(report["riskCategory"], "Low");

    line.clear();
    reader.read_line(&mut line).expect("read parse error line");
    let parse_error: Value = serde_json::from_str(&line).expect("parse error json");
    assert_eq!(parse_error["error"]["code"], -32700);
    assert_eq!(parse_error["id"], Value::Null);

    let status = child.wait().expect("wait child");
    assert!(status.success());
}

fn write_framed(stdin: &mut std::process::ChildStdin, payload: &Value) {
    let body = serde_json::to_vec(payload).expect("serialize payload");
    let frame = format!("Content-Length: {}\r\n\r\n", body.len());
    stdin
        .write_all(frame.as_bytes())
        .expect("write frame header");
    stdin.write_all(&body).expect("write frame body");
    stdin.flush().expect("flush frame");
}

fn read_framed(reader: &mut BufReader<std::process::ChildStdout>) -> Value {
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).expect("read frame header");
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse::<usize>().ok();
            }
        }
    }

    let len = content_length.expect("content-length header");
    let mut body = vec![0_u8; len];
    std::io::Read::read_exact(reader, &mut body).expect("read frame body");
    serde_json::from_slice(&body).expect("parse framed response")
}

#[test]
fn content_length_initialize_and_tools_list_work() {
    let mut child = spawn_stdio();
    let mut child_stdin = child.stdin.take().expect("stdin");
    let child_stdout = child.stdout.take().expect("stdout");
    let mut reader = BufReader::new(child_stdout);

    write_framed(
        &mut child_stdin,
        &json!({
            "jsonrpc":"2.0",
            "id":1,
            "method":"initialize",
            "params":{
                "protocolVersion":"2024-11-05",
                "capabilities":{},
                "clientInfo":{"name":"stdio-test","version":"1.0.0"}
            }
        }),
    );
    let init = read_framed(&mut reader);
    assert_eq!(
        init["result"]["protocolVersion"].as_str(),
        Some("2024-11-05")
    );
    assert_eq!(
        init["result"]["serverInfo"]["name"].as_str(),
        Some("riskcheck-server")
    );

    // notifications are consumed silently; the next frame answers id 2
    write_framed(
        &mut child_stdin,
        &json!({"jsonrpc":"2.0","method":"notifications/initialized"}),
    );
    write_framed(
        &mut child_stdin,
        &json!({
            "jsonrpc":"2.0",
            "id":2,
            "method":"tools/list",
            "params":{}
        }),
    );
    let tools = read_framed(&mut reader);
    assert_eq!(tools["id"], 2);
    let names = tools["result"]["tools"]
        .as_array()
        .expect("tools array")
        .iter()
        .filter_map(|tool| tool.get("name").and_then(Value::as_str))
        .collect::<Vec<_>>();
    assert!(names.contains(&"risk_compute"));
    assert!(names.contains(&"risk_tiers"));

    drop(child_stdin);
    let status = child.wait().expect("wait child");
    assert!(status.success());
}

#[test]
fn unknown_transport_fails_startup() {
    let status = Command::new(env!("CARGO_BIN_EXE_riskcheckd"))
        .env("RISKCHECKD_TRANSPORT", "carrier-pigeon")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("run riskcheckd");
    assert!(!status.success());
}

#[test]
fn oversized_frames_are_refused_and_skipped() {
    let mut child = spawn_stdio();
    let mut child_stdin = child.stdin.take().expect("stdin");
    let child_stdout = child.stdout.take().expect("stdout");
    let mut reader = BufReader::new(child_stdout);

    // over the limit but actually sent: the body is skipped and the next frame is served
    let padding = vec![b' '; 70_000];
    write!(child_stdin, "Content-Length: {}\r\n\r\n", padding.len()).expect("write header");
    child_stdin.write_all(&padding).expect("write padding");
    write_framed(
        &mut child_stdin,
        &json!({"jsonrpc":"2.0","id":3,"method":"ping","params":{}}),
    );

    let refused = read_framed(&mut reader);
    assert_eq!(refused["error"]["code"], -32700);
    let pong = read_framed(&mut reader);
    assert_eq!(pong["id"], 3);
    assert!(pong["result"].is_object());

    // a length no process could allocate
    child_stdin
        .write_all(b"Content-Length: 18446744073709551615\r\n\r\n")
        .expect("write huge header");
    child_stdin.flush().expect("flush");
    let refused = read_framed(&mut reader);
    assert_eq!(refused["error"]["code"], -32700);
    assert!(refused["error"]["message"]
        .as_str()
        .is_some_and(|m| m.contains("limit")));

    drop(child_stdin);
    let status = child.wait().expect("wait child");
    assert!(status.success());
}
