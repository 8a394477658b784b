#![cfg(all(unix, feature = "cli"))]

use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use serde_json::{json, Value};

const BIN: &str = env!("CARGO_BIN_EXE_netstrand");

fn run(args: &[&str]) -> Output {
    Command::new(BIN)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("netstrand should run")
}

fn records(out: &Output) -> Vec<Value> {
    String::from_utf8_lossy(&out.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each stdout line should be JSON"))
        .collect()
}

fn messages(out: &Output) -> Vec<Value> {
    records(out)
        .into_iter()
        .filter(|record| record["kind"] == "message")
        .map(|record| record["message"].clone())
        .collect()
}

#[test]
fn spawn_echoes_messages_through_shell_child() {
    let out = run(&[
        "spawn",
        "--format",
        "json",
        "--message",
        r#"["hello", 1]"#,
        "--message",
        "[]",
        "/bin/sh",
        "-c",
        "cat <&3 >&4",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(messages(&out), vec![json!(["hello", 1]), json!([])]);

    let exit = records(&out).pop().expect("exit record");
    assert_eq!(exit["kind"], "exit");
    assert_eq!(exit["code"], 0);
    assert_eq!(exit["success"], true);
}

#[test]
fn spawn_mirrors_child_exit_code() {
    let out = run(&["spawn", "--format", "json", "/bin/sh", "-c", "exit 3"]);
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn spawn_runs_serve_echo_child() {
    let out = run(&[
        "spawn",
        "--format",
        "json",
        "--message",
        r#"["ping", {"n": 1}]"#,
        "--message",
        r#"["café"]"#,
        BIN,
        "serve-echo",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(
        messages(&out),
        vec![json!(["ping", {"n": 1}]), json!(["caf\u{e9}"])]
    );
}

#[test]
fn spawn_rejects_non_array_message_before_launch() {
    let out = run(&[
        "spawn",
        "--message",
        r#"{"not": "array"}"#,
        "/bin/sh",
        "-c",
        "exit 0",
    ]);
    assert_eq!(out.status.code(), Some(64));
}

#[test]
fn spawn_missing_program_is_launch_failure() {
    let out = run(&["spawn", "/nonexistent/netstrand-missing"]);
    assert_eq!(out.status.code(), Some(127));
    assert!(String::from_utf8_lossy(&out.stderr).contains("spawn failed"));
}

#[test]
fn spawn_invalid_child_output_is_data_invalid() {
    let out = run(&[
        "spawn",
        "--format",
        "json",
        "/bin/sh",
        "-c",
        "printf '3:[1],4:nope,' >&4; exec sleep 30",
    ]);
    assert_eq!(out.status.code(), Some(60));
    assert_eq!(messages(&out), vec![json!([1])]);
}

#[test]
fn spawn_timeout_kills_child() {
    let started = Instant::now();
    let out = run(&[
        "spawn",
        "--timeout",
        "300ms",
        "/bin/sh",
        "-c",
        "exec sleep 30",
    ]);
    assert_eq!(out.status.code(), Some(124));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn spawn_timeout_fires_while_child_ignores_input() {
    // Two messages larger than a pipe buffer; the child never reads fd3.
    let big = format!(r#"["{}"]"#, "x".repeat(70_000));
    let started = Instant::now();
    let out = run(&[
        "spawn",
        "--timeout",
        "1s",
        "--message",
        &big,
        "--message",
        &big,
        "/bin/sh",
        "-c",
        "exec sleep 30",
    ]);
    assert_eq!(out.status.code(), Some(124));
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "took {:?}",
        started.elapsed()
    );
}

#[test]
fn spawn_keep_open_holds_input_until_output_closes() {
    let out = run(&[
        "spawn",
        "--format",
        "json",
        "--keep-open",
        "--message",
        "[1]",
        "/bin/sh",
        "-c",
        "head -c 6 <&3 >&4; exec 4>&-; cat <&3 >/dev/null",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(messages(&out), vec![json!([1])]);
}

#[test]
fn spawn_waits_for_child_that_closes_output_early() {
    let out = run(&[
        "spawn",
        "--format",
        "json",
        "/bin/sh",
        "-c",
        "exec 4>&-; sleep 0.2; exit 7",
    ]);
    assert_eq!(out.status.code(), Some(7));
}

#[test]
fn serve_echo_without_descriptors_is_usage_error() {
    let out = Command::new("/bin/sh")
        .args(["-c", "exec 3<&- 4>&-; exec \"$0\" serve-echo", BIN])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("shell should run");
    assert_eq!(out.status.code(), Some(64));
}
