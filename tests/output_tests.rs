//! 输出规范化与结果类型测试

use ssh_stream::{normalize_command_output, strip_ansi, CommandOutput, ReadStatus};

// ==================== 规范化 ====================

#[test]
fn test_normalize_multiline_listing() {
    let raw = "total 8\r\n\x1B[01;34mbin\x1B[0m\r\nnotes.txt\r\n[tian@host ~]$ ";
    assert_eq!(normalize_command_output(raw, "]$"), "total 8\nbin\nnotes.txt");
}

#[test]
fn test_normalize_empty_output() {
    assert_eq!(normalize_command_output("[root@host ~]# ", "]#"), "");
}

#[test]
fn test_normalize_custom_marker() {
    assert_eq!(normalize_command_output("ok\r\nmysql> ", "mysql>"), "ok");
}

#[test]
fn test_normalize_partial_output_keeps_last_line() {
    // 未出现提示符时不丢弃最后一行
    assert_eq!(
        normalize_command_output("step 1\r\nstep 2\r\n", "]$"),
        "step 1\nstep 2"
    );
}

#[test]
fn test_strip_ansi_idempotent() {
    let inputs = [
        "\x1B[\x1B[31m31mred",
        "\x1B",
        "text\x1B",
        "\x1B[",
        "\x1B[31",
        "\x1B[1;",
        "\x1B]0;title without terminator",
        "\x1B]0;a\x1B]0;b\x07c",
        "\u{9B}",
        "\u{9B}31",
        "a\u{9B}31mb\x1B",
        "\x1B\x1B[0m[0m\x1B\\",
        "\x1B[?2004h[tian@host ~]$ \x1B[?2004l\r",
        "plain [brackets] ~ text",
    ];

    for input in inputs {
        let once = strip_ansi(input);
        assert_eq!(strip_ansi(&once), once, "input: {:?}", input);
    }
}

// ==================== 结果类型 ====================

#[test]
fn test_command_output_serializes_status() {
    let output = CommandOutput {
        command: "uptime".to_string(),
        text: String::new(),
        status: ReadStatus::TimedOut,
        duration_secs: 10.0,
        late_output: None,
    };

    let json = serde_json::to_value(&output).unwrap();
    assert_eq!(json["status"], "timed_out");
    assert_eq!(json["command"], "uptime");
    assert!(json.get("late_output").is_none());
    assert!(output.timed_out());
    assert!(!output.is_complete());
}

#[test]
fn test_command_output_late_output_round_trip() {
    let json = r#"{"command":"echo b","text":"b","status":"complete","duration_secs":0.1,"late_output":"a"}"#;
    let output: CommandOutput = serde_json::from_str(json).unwrap();
    assert_eq!(output.late_output.as_deref(), Some("a"));

    let without: CommandOutput =
        serde_json::from_str(r#"{"command":"pwd","text":"/","status":"complete","duration_secs":0.1}"#)
            .unwrap();
    assert!(without.late_output.is_none());
}
