mod common;

use assert_cmd::Command;
use predicates::str::{contains, is_match};
use serde_json::Value;

use common::{REFERENCE_INSTANT, TestWorkspace, fixture_path};

fn sieve() -> Command {
    Command::cargo_bin("csv-sieve").expect("binary exists")
}

#[test]
fn validate_writes_cleaned_rejected_and_statistics() {
    let workspace = TestWorkspace::new();
    let input = fixture_path("transactions.csv");
    let valid = workspace.file("valid.csv");
    let invalid = workspace.file("invalid.csv");
    let stats = workspace.file("stats.json");

    sieve()
        .args([
            "validate",
            "-i",
            input.to_str().unwrap(),
            "--valid",
            valid.to_str().unwrap(),
            "--invalid",
            invalid.to_str().unwrap(),
            "--stats",
            stats.to_str().unwrap(),
            "--now",
            REFERENCE_INSTANT,
        ])
        .assert()
        .success()
        .stdout(contains("valid_rows"))
        .stdout(contains("ROW_MALFORMED"));

    let cleaned = workspace.read("valid.csv");
    let mut lines = cleaned.lines();
    assert_eq!(
        lines.next(),
        Some("\"transaction_id\",\"amount\",\"timestamp\",\"country\",\"channel\"")
    );
    assert_eq!(
        lines.next(),
        Some("\"TXN_001_ABC\",\"100.50\",\"2025-01-13T14:30:00\",\"US\",\"web\"")
    );
    assert_eq!(cleaned.lines().count(), 4);

    let rejected = workspace.read("invalid.csv");
    assert!(rejected.lines().next().unwrap().ends_with("\"rejection_reason\""));
    assert!(rejected.contains("\"ID_DUPLICATE(transaction_id)\""));
    assert!(rejected.contains("\"TXN_007_PQR\",\"19.99\",\"2025-02-30\",\"AU\",\"\",\"ROW_MALFORMED\""));
    assert_eq!(rejected.lines().count(), 7);

    let document: Value = serde_json::from_str(&workspace.read("stats.json")).unwrap();
    assert_eq!(document["ingestion_summary"]["total_rows_read"], 9);
    assert_eq!(document["ingestion_summary"]["data_quality_score_percent"], 33.33);
    assert_eq!(document["error_breakdown"]["AMOUNT_PRECISION"], 1);
    assert!(document["execution_metadata"]["processing_duration_seconds"].is_number());
}

#[test]
fn validate_fails_on_missing_columns() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("short.csv", "transaction_id,amount\nTXN_001_ABC,1.00\n");
    sieve()
        .args(["validate", "-i", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("Missing required columns: country, timestamp"));
}

#[test]
fn validate_reads_tab_separated_input_by_extension() {
    let workspace = TestWorkspace::new();
    let input = workspace.write(
        "feed.tsv",
        "transaction_id\tamount\ttimestamp\tcountry\nTXN_001_ABC\t5\t2025-01-01\tSE\n",
    );
    let valid = workspace.file("valid.tsv");
    sieve()
        .args([
            "validate",
            "-i",
            input.to_str().unwrap(),
            "--valid",
            valid.to_str().unwrap(),
            "--now",
            REFERENCE_INSTANT,
        ])
        .assert()
        .success();
    assert!(workspace.read("valid.tsv").contains("\"TXN_001_ABC\"\t\"5.00\""));
}

#[test]
fn validate_honours_custom_rules() {
    let workspace = TestWorkspace::new();
    let input = workspace.write(
        "skus.csv",
        "sku,price,region\nSKU-0001,9.99,NORTH\nSKU-0002,-,SOUTH\n",
    );
    let stats = workspace.file("stats.json");
    sieve()
        .args([
            "validate",
            "-i",
            input.to_str().unwrap(),
            "--config",
            fixture_path("rules.yml").to_str().unwrap(),
            "--stats",
            stats.to_str().unwrap(),
        ])
        .assert()
        .success();
    let document: Value = serde_json::from_str(&workspace.read("stats.json")).unwrap();
    assert_eq!(document["ingestion_summary"]["valid_rows"], 1);
    assert_eq!(document["error_breakdown"]["AMOUNT_EMPTY"], 1);
}

#[test]
fn assess_prints_quality_report_json() {
    let output = sieve()
        .args(["assess", "-i", fixture_path("transactions.csv").to_str().unwrap()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["data_profile"]["rows"], 9);
    assert_eq!(report["data_profile"]["columns"], 5);
    assert!(report["quality_score"].as_f64().unwrap() < 100.0);
    assert_eq!(
        report["suggested_actions"].as_array().unwrap().last().unwrap(),
        "Export cleaned data for further analysis"
    );
}

#[test]
fn rules_output_round_trips_through_config() {
    let workspace = TestWorkspace::new();
    let rules = workspace.file("rules.yml");
    sieve()
        .args(["rules", "-o", rules.to_str().unwrap()])
        .assert()
        .success();
    assert!(workspace.read("rules.yml").contains("transaction_id"));

    let input = workspace.write(
        "one.csv",
        "transaction_id,amount,timestamp,country\nTXN_001_ABC,1.00,2025-01-01,US\n",
    );
    sieve()
        .args([
            "validate",
            "-i",
            input.to_str().unwrap(),
            "--config",
            rules.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(is_match(r"valid_rows\s+1\n").unwrap());
}

#[test]
fn rules_prints_yaml_to_stdout() {
    sieve()
        .arg("rules")
        .assert()
        .success()
        .stdout(contains("type: identifier"))
        .stdout(contains("null_tokens"));
}
