use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

use std::time::Duration;
use tempfile::tempdir;

fn peoplefetch(data_path: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("peoplefetch").unwrap();
    cmd.timeout(Duration::from_secs(10));
    cmd.arg("--data-path").arg(data_path);
    cmd
}

#[test]
fn test_fetch_sample_roster_direct() {
    let dir = tempdir().unwrap();
    let mut cmd = peoplefetch(dir.path());
    cmd.arg("fetch").arg("--delay-ms").arg("0");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Progress: 100%"))
        .stdout(predicate::str::contains("Fetched 7 people:"))
        .stdout(predicate::str::contains("John Koenig"))
        .stdout(predicate::str::contains("Isaac Gampu"));
}

#[test]
fn test_fetch_sample_roster_callback() {
    let dir = tempdir().unwrap();
    let mut cmd = peoplefetch(dir.path());
    cmd.arg("fetch")
        .arg("--style")
        .arg("callback")
        .arg("--delay-ms")
        .arg("0");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Fetched 7 people:"))
        .stdout(predicate::str::contains("ERROR").not())
        .stdout(predicate::str::contains("CANCELED").not());
}

#[test]
fn test_fetch_both_styles() {
    let dir = tempdir().unwrap();
    let mut cmd = peoplefetch(dir.path());
    cmd.arg("fetch")
        .arg("--style")
        .arg("both")
        .arg("--delay-ms")
        .arg("1");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Fetched 7 people:"));
}

#[test]
fn test_fetch_json_output() {
    let dir = tempdir().unwrap();
    let mut cmd = peoplefetch(dir.path());
    cmd.arg("fetch").arg("--delay-ms").arg("0").arg("--json");

    let output = cmd.output().unwrap();
    assert!(output.status.success());

    let people: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be pure JSON");
    let people = people.as_array().expect("Should be an array");
    assert_eq!(people.len(), 7);
    assert_eq!(people[0]["family_name"], "Koenig");
    assert_eq!(people[0]["start_date"], "1975-10-17");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Progress: 100%"));
}

#[test]
fn test_fetch_from_configured_people_file() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("crew.json"),
        r#"[
            {"id": 21, "given_name": "Kathryn", "family_name": "Janeway", "start_date": "1995-01-16", "rating": 9},
            {"id": 22, "given_name": "Benjamin", "family_name": "Sisko", "start_date": "1993-01-03", "rating": 9}
        ]"#,
    )
    .unwrap();

    let mut cmd = peoplefetch(dir.path());
    cmd.arg("config")
        .arg("set")
        .arg("reader.people_file")
        .arg("crew.json");
    cmd.assert().success();

    let mut cmd = peoplefetch(dir.path());
    cmd.arg("fetch").arg("--delay-ms").arg("0");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Progress: 50%"))
        .stdout(predicate::str::contains("Fetched 2 people:"))
        .stdout(predicate::str::contains("Kathryn Janeway"))
        .stdout(predicate::str::contains("John Koenig").not());
}

#[test]
fn test_fetch_missing_people_file_reports_error() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        "[reader]\npeople_file = \"absent.json\"\nrecord_delay_ms = 0\n",
    )
    .unwrap();

    let mut cmd = peoplefetch(dir.path());
    cmd.arg("fetch");
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("ERROR [IO]"))
        .stdout(predicate::str::contains("absent.json"))
        .stdout(predicate::str::contains("No people fetched."));
}

#[test]
fn test_fetch_invalid_records_report_one_error_each() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("people.json"),
        r#"[
            {"id": 1, "given_name": "", "family_name": "Koenig", "start_date": "1975-10-17", "rating": 6},
            {"id": 2, "given_name": "Dylan", "family_name": "", "start_date": "2000-10-02", "rating": 8},
            {"id": 3, "given_name": "John", "family_name": "Crichton", "start_date": "1999-03-19", "rating": 7}
        ]"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("config.toml"),
        "[reader]\npeople_file = \"people.json\"\nrecord_delay_ms = 0\n",
    )
    .unwrap();

    let mut cmd = peoplefetch(dir.path());
    cmd.arg("fetch").arg("--style").arg("callback");

    let output = cmd.output().unwrap();
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("ERROR [Validation]").count(), 2);
    assert!(stdout.contains("person 1 has an empty given name"));
    assert!(stdout.contains("person 2 has an empty family name"));
    assert!(stdout.contains("No people fetched."));
}

#[test]
fn test_fetch_both_styles_counts_every_fault() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("people.json"),
        r#"[
            {"id": 1, "given_name": "", "family_name": "Koenig", "start_date": "1975-10-17", "rating": 6},
            {"id": 2, "given_name": "Dylan", "family_name": "Hunt", "start_date": "2000-10-02", "rating": 11}
        ]"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("config.toml"),
        "[reader]\npeople_file = \"people.json\"\nrecord_delay_ms = 0\n",
    )
    .unwrap();

    let mut cmd = peoplefetch(dir.path());
    cmd.arg("fetch").arg("--style").arg("both");

    let output = cmd.output().unwrap();
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("ERROR [Validation]").count(), 4);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("fetch failed with 4 error(s)"));
}

#[test]
fn test_fetch_cancel_after_threshold() {
    let dir = tempdir().unwrap();
    let mut cmd = peoplefetch(dir.path());
    cmd.arg("fetch")
        .arg("--delay-ms")
        .arg("100")
        .arg("--cancel-after")
        .arg("30");

    let output = cmd.output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("CANCELED").count(), 1);
    assert!(!stdout.contains("Progress: 100%"));
    assert!(stdout.contains("No people fetched."));
}

#[test]
fn test_fetch_rejects_out_of_range_threshold() {
    let dir = tempdir().unwrap();
    let mut cmd = peoplefetch(dir.path());
    cmd.arg("fetch").arg("--cancel-after").arg("150");
    cmd.assert().failure();
}

#[test]
fn test_config_set_get() {
    let dir = tempdir().unwrap();
    let mut cmd = peoplefetch(dir.path());
    cmd.arg("config")
        .arg("set")
        .arg("reader.record_delay_ms")
        .arg("25");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("reader.record_delay_ms set to: 25"));

    let mut cmd = peoplefetch(dir.path());
    cmd.arg("config").arg("get").arg("reader.record_delay_ms");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("reader.record_delay_ms: 25"));

    let content = fs::read_to_string(dir.path().join("config.toml")).unwrap();
    assert!(content.contains("record_delay_ms = 25"));
}

#[test]
fn test_config_show_all() {
    let dir = tempdir().unwrap();
    let mut cmd = peoplefetch(dir.path());
    cmd.arg("config");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Current Configuration:"))
        .stdout(predicate::str::contains("reader.record_delay_ms: 500"))
        .stdout(predicate::str::contains("controller.event_capacity: 64"));
}

#[test]
fn test_config_unknown_key() {
    let dir = tempdir().unwrap();
    let mut cmd = peoplefetch(dir.path());
    cmd.arg("config").arg("get").arg("reader.colour");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Unknown key: reader.colour"))
        .stdout(predicate::str::contains("reader.people_file"));
}
