//! Binary smoke tests

use assert_cmd::Command;
use serde_json::json;
use tempfile::TempDir;

fn downloader() -> Command {
    let mut cmd = Command::cargo_bin("player-data-downloader").unwrap();
    cmd.env_remove("API_SPORTS_KEY")
        .env_remove("RAPIDAPI_KEY")
        .env_remove("BALLDONTLIE_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let output = downloader().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("fetch"));
    assert!(stdout.contains("validate"));
}

#[test]
fn test_fetch_without_key_fails_before_any_request() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().join("players.json");

    let output = downloader()
        .args(["fetch", "--source", "balldontlie", "--output"])
        .arg(&output_path)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("BALLDONTLIE_API_KEY"), "{stderr}");
    assert!(!output_path.exists());
}

#[test]
fn test_invalid_flag_value_is_usage_error() {
    let output = downloader()
        .args(["fetch", "--requests-per-minute", "0"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_validate_missing_output_succeeds() {
    let temp_dir = TempDir::new().unwrap();

    let output = downloader()
        .args(["validate", "--output"])
        .arg(temp_dir.path().join("absent.json"))
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No saved state found"));
}

#[test]
fn test_validate_reports_partial_state() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().join("players.json");
    let store = json!({"meta": {"source": "api-sports"}, "records": [{"id": 1}, {"id": 2}]});
    let checkpoint = json!({
        "schema_version": "1.0.0",
        "source": "api-sports",
        "next_cursor": 4,
        "total_pages": 9,
        "pages_fetched": 3,
        "record_count": 2,
        "completed": false,
        "saved_at": 1_700_000_000,
    });
    std::fs::write(&output_path, store.to_string()).unwrap();
    std::fs::write(
        temp_dir.path().join("players.checkpoint.json"),
        checkpoint.to_string(),
    )
    .unwrap();

    let output = downloader()
        .args(["validate", "--output"])
        .arg(&output_path)
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Records: 2"), "{stdout}");
    assert!(stdout.contains("Total pages: 9"), "{stdout}");
    assert!(stdout.contains("resumes at 4"), "{stdout}");
}

#[test]
fn test_validate_rejects_corrupt_checkpoint() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().join("players.json");
    std::fs::write(&output_path, "[]").unwrap();
    std::fs::write(temp_dir.path().join("players.checkpoint.json"), "{not json").unwrap();

    let output = downloader()
        .args(["validate", "--output"])
        .arg(&output_path)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
}
