//! E2E tests for the command-line interface

use std::io::Write;
use std::process::{Command, Output, Stdio};

fn taxcalc(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_taxcalc"))
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn calculate_employment_text() {
    let output = taxcalc(&["calculate", "-r", "tests/data/employment_50k.json"]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let out = stdout(&output);
    assert!(out.contains("TAX LIABILITY employment-50k (2024/25)"));
    assert!(out.contains("£37430.00"));
    assert!(out.contains("£7486.00"));
    assert!(out.contains("£2994.40"));
    assert!(out.contains("£10480.40"));
    assert!(out.contains("Owed: £2980.40"));
}

#[test]
fn calculate_employment_json() {
    let output = taxcalc(&["calculate", "-r", "tests/data/employment_50k.json", "--json"]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["tax_return_id"], "employment-50k");
    assert_eq!(json["calculated_by"], "auto");
    assert_eq!(json["run"], 1);
    assert_eq!(json["owes_tax"], true);
    assert_eq!(json["input_digest"].as_str().unwrap().len(), 64);
    assert!(json["net_liability"].as_str().unwrap().starts_with("2980.4"));
}

#[test]
fn calculate_reads_stdin() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_taxcalc"))
        .args(["calculate", "--json"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("Failed to spawn command");

    let input = std::fs::read("tests/data/employment_50k.json").unwrap();
    child.stdin.take().unwrap().write_all(&input).unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success(), "Command failed: {:?}", output);
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["tax_return_id"], "employment-50k");
}

#[test]
fn calculate_with_configured_rates() {
    let output = taxcalc(&[
        "calculate",
        "-r",
        "tests/data/employment_50k_2026.json",
        "--rates",
        "tests/data/rates_2026.json",
        "--json",
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["personal_allowance"], "13000");
    assert!(json["net_liability"].as_str().unwrap().starts_with("10394.4"));
}

#[test]
fn invalid_rates_rejected() {
    let output = taxcalc(&[
        "calculate",
        "-r",
        "tests/data/employment_50k.json",
        "--rates",
        "tests/data/invalid_rates.json",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("calculation unavailable"));
    assert!(stderr.contains("invalid rate table"));
}

#[test]
fn negative_income_fails_with_message() {
    let output = taxcalc(&["calculate", "-r", "tests/data/negative_income.json"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("calculation unavailable"));
    assert!(stderr.contains("negative amount"));
}

#[test]
fn missing_file_fails() {
    let output = taxcalc(&["calculate", "-r", "tests/data/does_not_exist.json"]);
    assert!(!output.status.success());
}

#[test]
fn breakdown_table_lists_steps() {
    let output = taxcalc(&["breakdown", "-r", "tests/data/mixed_income.json"]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let out = stdout(&output);
    for key in [
        "income_aggregation",
        "trading_allowance",
        "furnished_property_relief",
        "gift_aid",
        "tax_band_calculation",
        "investment_income_tax",
        "class_4_ni",
        "hicbc_charge",
        "final_liability",
    ] {
        assert!(out.contains(key), "missing step {}", key);
    }
}

#[test]
fn breakdown_csv() {
    let output = taxcalc(&["breakdown", "-r", "tests/data/employment_50k.json", "--csv"]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let out = stdout(&output);
    let mut lines = out.lines();
    assert_eq!(
        lines.next(),
        Some("tax_return_id,run,sequence,step_key,result,inputs,explanation")
    );
    assert_eq!(out.lines().count(), 19);
    assert!(out.contains("personal_allowance"));
}

#[test]
fn breakdown_json_in_order() {
    let output = taxcalc(&["breakdown", "-r", "tests/data/mixed_income.json", "--json"]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let steps: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(steps.len(), 18);
    assert_eq!(steps[0]["step_key"], "income_aggregation");
    assert_eq!(steps[17]["step_key"], "final_liability");
    for (i, step) in steps.iter().enumerate() {
        assert_eq!(step["sequence"], i as u64 + 1);
    }
}

#[test]
fn rates_for_default_year() {
    let output = taxcalc(&["rates", "--json"]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["tax_year"], 2025);
    assert_eq!(json["personal_allowance"], "12570");
    assert_eq!(json["basic_rate_limit"], "50270");
}

#[test]
fn rates_table_output() {
    let output = taxcalc(&["rates", "-y", "2025"]);
    assert!(output.status.success(), "Command failed: {:?}", output);
    let out = stdout(&output);
    assert!(out.contains("RATE TABLE (2024/25)"));
    assert!(out.contains("dividend_allowance"));
}

#[test]
fn schema_for_tax_return() {
    let output = taxcalc(&["schema"]);
    assert!(output.status.success(), "Command failed: {:?}", output);
    let out = stdout(&output);
    assert!(out.contains("income_sources"));
    assert!(out.contains("self_employment"));
}

#[test]
fn schema_for_rate_table() {
    let output = taxcalc(&["schema", "rate-table"]);
    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(stdout(&output).contains("pa_withdrawal_threshold"));
}
