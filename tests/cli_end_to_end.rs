use std::process::Command;

use serde_json::Value;

fn tutor_render() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tutor-render"));
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"))
        .env_remove("TUTOR_RENDER_CONFIG_FILE")
        .env("TUTOR_RENDER_LOG", "error");
    cmd
}

#[test]
fn classify_prints_the_decision_and_spans() {
    let output = tutor_render()
        .args(["classify", "Bu adımda $x+5=10$ işlemini yapıyoruz"])
        .output()
        .expect("binary runs");
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).expect("json on stdout");
    assert_eq!(json["decision"]["strategy"], "inline_math");
    assert_eq!(json["spans"][1]["kind"], "latex");
    assert_eq!(json["spans"][1]["text"], "x+5=10");
}

#[test]
fn render_fixture_reports_every_element() {
    let output = tutor_render()
        .args(["render", "fixtures/solution.json"])
        .output()
        .expect("binary runs");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json: Value = serde_json::from_slice(&output.stdout).expect("json on stdout");
    assert_eq!(json["report"]["total"], 6);
    assert_eq!(json["report"]["priority"], 2);
    assert_eq!(json["report"]["failed"], 0);
    assert_eq!(json["stats"]["batch_size"], 4);
    assert_eq!(json["elements"].as_array().map(Vec::len), Some(6));
}

#[test]
fn missing_fixture_exits_with_failure() {
    let output = tutor_render()
        .args(["render", "fixtures/does-not-exist.json"])
        .output()
        .expect("binary runs");

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
}

#[test]
fn invalid_configuration_exits_with_usage_code() {
    let output = tutor_render()
        .args(["render", "fixtures/solution.json", "--render-batch-size", "0"])
        .output()
        .expect("binary runs");

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}
