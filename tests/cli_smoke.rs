use std::path::PathBuf;

fn exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_cutscene")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "cutscene.exe"
            } else {
                "cutscene"
            });
            p
        })
}

fn fixture() -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join("comic_intro.json")
        .to_string_lossy()
        .to_string()
}

#[test]
fn cli_run_prints_final_state() {
    let input = fixture();
    let output = std::process::Command::new(exe())
        .args(["run", "--in", input.as_str(), "--fps", "60"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["done"], serde_json::json!(true));
    assert_eq!(summary["phase"], serde_json::json!("Done"));
    assert_eq!(summary["step_index"], serde_json::json!(5));
    assert_eq!(summary["macro_index"], serde_json::json!(5));
    assert_eq!(
        summary["targets"]["title"]["visible_characters"],
        serde_json::json!(11)
    );
    assert!(summary["targets"].get("bubble-0").is_none());
}

#[test]
fn cli_validate_accepts_fixture() {
    let input = fixture();
    let status = std::process::Command::new(exe())
        .args(["validate", "--in", input.as_str()])
        .status()
        .unwrap();
    assert!(status.success());
}

#[test]
fn cli_run_rejects_missing_file() {
    let dir = PathBuf::from("target").join("cli_smoke");
    std::fs::create_dir_all(&dir).unwrap();
    let missing = dir.join("does_not_exist.json");
    let _ = std::fs::remove_file(&missing);

    let status = std::process::Command::new(exe())
        .args(["run", "--in"])
        .arg(&missing)
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn cli_run_rejects_out_of_range_max_secs() {
    let input = fixture();
    let output = std::process::Command::new(exe())
        .args(["run", "--in", input.as_str(), "--max-secs", "1e30"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--max-secs is out of range"));
}
