use std::process::Command;

fn run_callscreen(args: &[&str]) -> (bool, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_callscreen"))
        .args(args)
        // keep a developer's .env or shell settings out of the run
        .current_dir(tempfile::tempdir().expect("Failed to create temp dir").path())
        .env_remove("PORT")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute callscreen");

    let text = String::from_utf8_lossy(&output.stderr).to_string() + &String::from_utf8_lossy(&output.stdout);
    (output.status.success(), text)
}

#[test]
fn test_help_lists_options() {
    let (ok, text) = run_callscreen(&["--help"]);
    assert!(ok, "--help failed: {}", text);
    for option in ["--port", "--max-rings", "--webhook-url", "--codec", "--mode"] {
        assert!(text.contains(option), "missing {} in help: {}", option, text);
    }
}

#[test]
fn test_missing_serial_port_is_fatal() {
    let (ok, text) = run_callscreen(&["--port", "/nonexistent/tty", "--log-file", "calls.csv"]);
    assert!(!ok, "expected failure, got: {}", text);
    assert!(text.contains("/nonexistent/tty"), "error should name the port: {}", text);
}

#[test]
fn test_invalid_settings_rejected_before_opening_port() {
    let (ok, text) = run_callscreen(&["--port", "/nonexistent/tty", "--target-rms", "2.5"]);
    assert!(!ok);
    assert!(text.contains("target RMS"), "unexpected output: {}", text);
}

#[test]
fn test_unknown_mode_rejected() {
    let (ok, text) = run_callscreen(&["--mode", "voicemail"]);
    assert!(!ok);
    assert!(text.contains("voicemail"), "unexpected output: {}", text);
}
