//! Integration tests for the formfill CLI
//!
//! Runs the built binary against the generated sample form:
//! - demo / fields / template output
//! - fill with complete and incomplete data
//! - error handling for unreadable inputs

use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::{tempdir, TempDir};

/// Test helper to get the CLI binary path
fn get_cli_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test binary name
    if path.ends_with("deps") {
        path.pop(); // Remove "deps" directory
    }
    path.push("formfill");
    #[cfg(windows)]
    path.set_extension("exe");
    path
}

fn setup_temp_dir() -> TempDir {
    tempdir().expect("Failed to create temp directory")
}

fn run_cli_command(args: &[&str]) -> Output {
    Command::new(get_cli_path())
        .args(args)
        .output()
        .expect("Failed to run CLI")
}

fn assert_pdf_exists_and_valid(path: &Path) {
    assert!(path.exists(), "PDF file should exist: {}", path.display());
    let content = fs::read(path).expect("Failed to read PDF file");
    assert!(
        content.starts_with(b"%PDF-"),
        "File should start with PDF header"
    );
}

/// Writes the sample form into `dir` and returns its path.
fn sample_form(dir: &Path) -> PathBuf {
    let path = dir.join("form.pdf");
    let output = run_cli_command(&["demo", "-o", path.to_str().unwrap()]);
    assert!(output.status.success(), "demo should succeed");
    path
}

fn write_data(dir: &Path, json: &str) -> PathBuf {
    let path = dir.join("data.json");
    fs::write(&path, json).unwrap();
    path
}

const COMPLETE: &str = r#"{
    "CustomerName": "Acme",
    "ServiceAddress": "1 Rd",
    "City": "X",
    "State": "Y",
    "ZipCode": "00000",
    "PhoneNumber": "555",
    "Email": "a@b.c",
    "AgreementCheckbox1": true
}"#;

#[test]
fn test_cli_help_command() {
    let output = run_cli_command(&["--help"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["fill", "fields", "template", "demo"] {
        assert!(stdout.contains(command), "help should list {command}");
    }
}

#[test]
fn test_cli_demo_command() {
    let temp_dir = setup_temp_dir();
    let output_path = temp_dir.path().join("sample.pdf");

    let output = run_cli_command(&["demo", "-o", output_path.to_str().unwrap()]);

    assert!(output.status.success());
    assert_pdf_exists_and_valid(&output_path);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Sample form created successfully"));
}

#[test]
fn test_cli_fields_command() {
    let temp_dir = setup_temp_dir();
    let form = sample_form(temp_dir.path());

    let output = run_cli_command(&["fields", form.to_str().unwrap()]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("//Contract/CustomerName [text]"));
    assert!(stdout.contains("//bool1 [checkbox: Yes]"));
    assert!(stdout.contains("office.notes"));
}

#[test]
fn test_cli_fields_json() {
    let temp_dir = setup_temp_dir();
    let form = sample_form(temp_dir.path());

    let output = run_cli_command(&["fields", form.to_str().unwrap(), "--json"]);
    assert!(output.status.success());

    let fields: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = fields
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"//Contract/Email"));
}

#[test]
fn test_cli_fill_command() {
    let temp_dir = setup_temp_dir();
    let form = sample_form(temp_dir.path());
    let data = write_data(temp_dir.path(), COMPLETE);
    let output_path = temp_dir.path().join("filled.pdf");

    let output = run_cli_command(&[
        "fill",
        form.to_str().unwrap(),
        "--data",
        data.to_str().unwrap(),
        "-o",
        output_path.to_str().unwrap(),
    ]);

    assert!(
        output.status.success(),
        "fill failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_pdf_exists_and_valid(&output_path);
    assert!(String::from_utf8_lossy(&output.stdout).contains("✓ Filled"));

    // flattened: nothing left to list
    let listed = run_cli_command(&["fields", output_path.to_str().unwrap()]);
    assert!(String::from_utf8_lossy(&listed.stdout).contains("No form fields found"));
}

#[test]
fn test_cli_fill_no_flatten_keeps_values() {
    let temp_dir = setup_temp_dir();
    let form = sample_form(temp_dir.path());
    let data = write_data(temp_dir.path(), COMPLETE);
    let output_path = temp_dir.path().join("editable.pdf");

    let output = run_cli_command(&[
        "fill",
        form.to_str().unwrap(),
        "-d",
        data.to_str().unwrap(),
        "-o",
        output_path.to_str().unwrap(),
        "--no-flatten",
    ]);
    assert!(output.status.success());

    let listed = run_cli_command(&["fields", output_path.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&listed.stdout);
    assert!(stdout.contains("//Contract/CustomerName [text] = \"Acme\""));
    assert!(stdout.contains("//ContractStartDate/MonthName [checkbox: Yes] = \"Yes\""));
}

#[test]
fn test_cli_fill_missing_fields() {
    let temp_dir = setup_temp_dir();
    let form = sample_form(temp_dir.path());
    let data = write_data(temp_dir.path(), r#"{"CustomerName": "Acme"}"#);
    let output_path = temp_dir.path().join("never.pdf");

    let output = run_cli_command(&[
        "fill",
        form.to_str().unwrap(),
        "--data",
        data.to_str().unwrap(),
        "-o",
        output_path.to_str().unwrap(),
    ]);

    assert!(!output.status.success());
    assert!(!output_path.exists());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Missing or empty required fields"));
    assert!(stderr.contains("ServiceAddress"));
}

#[test]
fn test_cli_fill_nonexistent_input() {
    let temp_dir = setup_temp_dir();
    let data = write_data(temp_dir.path(), COMPLETE);

    let output = run_cli_command(&[
        "fill",
        "/nonexistent/form.pdf",
        "--data",
        data.to_str().unwrap(),
        "-o",
        temp_dir.path().join("out.pdf").to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read"));
}

#[test]
fn test_cli_template_command() {
    let output = run_cli_command(&["template"]);
    assert!(output.status.success());

    let template: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(template["output_file_name"], "filled_constellation_form.pdf");
    assert_eq!(template["required_keys"].as_array().unwrap().len(), 7);
}

#[test]
fn test_cli_custom_template_round_trip() {
    let temp_dir = setup_temp_dir();
    let template_path = temp_dir.path().join("template.json");
    let output = run_cli_command(&["template", "-o", template_path.to_str().unwrap()]);
    assert!(output.status.success());

    let form = temp_dir.path().join("custom.pdf");
    let output = run_cli_command(&[
        "demo",
        "-o",
        form.to_str().unwrap(),
        "--template",
        template_path.to_str().unwrap(),
    ]);
    assert!(output.status.success());
    assert_pdf_exists_and_valid(&form);
}
