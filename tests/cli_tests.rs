//! End-to-end tests for the rxstream binary

use std::process::Command;

fn rxstream() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rxstream"))
}

fn stdout_of(command: &mut Command) -> String {
    let output = command.output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn test_append_then_read_and_tail() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("log.txt");
    let file = file.to_str().unwrap();

    stdout_of(rxstream().args(["append", file, "one", "two", "three", "four"]));

    assert_eq!(stdout_of(rxstream().args(["lines", file])), "4\n");
    assert_eq!(stdout_of(rxstream().args(["read", file, "--line", "2", "-n", "2"])), "two\nthree\n");
    assert_eq!(stdout_of(rxstream().args(["tail", file, "-n", "2"])), "three\nfour\n");
    assert_eq!(stdout_of(rxstream().args(["tail", file, "-n", "9"])), "one\ntwo\nthree\nfour\n");
}

#[test]
fn test_info_json() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("data.txt");
    std::fs::write(&file, "a\nbb\nccc\n").unwrap();

    let json = stdout_of(rxstream().args(["--format", "json", "info", file.to_str().unwrap()]));
    let report: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(report["lines"], 3);
    assert_eq!(report["chars"], 9);
    assert_eq!(report["bytes"], "9");
    assert_eq!(report["stream_type"], "PERSISTENT");
}

#[test]
fn test_exec_script() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("s.txt");
    let script = dir.path().join("ops.rxs");
    let data = data.to_str().unwrap();
    std::fs::write(
        &script,
        format!(
            "# build and query a stream\n\
             stream {data} OPEN BOTH REPLACE\n\
             lineout {data} alpha\n\
             lineout {data} beta\n\
             stream {data} SEEK =2 READ LINE\n\
             linein {data}\n\
             linein {data}\n\
             describe {data}\n"
        ),
    )
    .unwrap();

    let output = stdout_of(rxstream().args(["exec", script.to_str().unwrap()]));
    assert_eq!(output, "READY:\n0\n0\n2\nbeta\n\nNOTREADY:EOF\n");
}

#[test]
fn test_missing_stream_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = rxstream()
        .args(["lines", dir.path().join("nope").to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!output.status.success());
}
