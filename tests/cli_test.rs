//! CLI Tests
//!
//! `xlsxcsv`バイナリを実行し、終了コード、標準出力のJSONレポート、出力ファイルを検証します。

use rust_xlsxwriter::{Workbook, XlsxError};
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn generate_workbook() -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Ventas")?;
    worksheet.write_string(0, 0, "producto")?;
    worksheet.write_string(0, 1, "unidades")?;
    worksheet.write_string(1, 0, "mesa")?;
    worksheet.write_number(1, 1, 4.0)?;
    Ok(workbook.save_to_buffer()?)
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_xlsxcsv"))
        .args(args)
        .env("RUST_LOG", "info")
        .output()
        .unwrap()
}

fn write_input(dir: &Path) -> String {
    let input = dir.join("ventas.xlsx");
    fs::write(&input, generate_workbook().unwrap()).unwrap();
    input.display().to_string()
}

#[test]
fn test_successful_run() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path());
    let output_dir = dir.path().join("csv");

    let output = run(&["--input", &input, "--output", output_dir.to_str().unwrap()]);

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["success"], true);
    assert_eq!(report["total_rows"], 2);
    assert_eq!(report["sheets"][0]["name"], "Ventas");
    assert!(report.get("error").is_none());

    assert_eq!(
        fs::read_to_string(output_dir.join("Ventas.csv")).unwrap(),
        "producto;unidades;sheet_name\nmesa;4;Ventas\n"
    );
    // ログは標準エラー出力へ
    assert!(String::from_utf8_lossy(&output.stderr).contains("Ventas"));
}

#[test]
fn test_custom_delimiter_flag() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path());
    let output_dir = dir.path().join("csv");

    let output = run(&[
        "--input",
        &input,
        "--output",
        output_dir.to_str().unwrap(),
        "--delimiter",
        "|",
        "--width-policy",
        "prescan",
        "--progress-every",
        "1",
    ]);

    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(output_dir.join("Ventas.csv")).unwrap(),
        "producto|unidades|sheet_name\nmesa|4|Ventas\n"
    );
    assert!(String::from_utf8_lossy(&output.stderr).contains("processed 2 rows of Ventas"));
}

#[test]
fn test_missing_input_exits_with_failure() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.xlsx");

    let output = run(&[
        "--input",
        missing.to_str().unwrap(),
        "--output",
        dir.path().join("csv").to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["success"], false);
    assert_eq!(report["sheets"].as_array().map(Vec::len), Some(0));
    assert!(report["error"]
        .as_str()
        .unwrap_or_default()
        .starts_with("Error opening Excel container"));
}

#[test]
fn test_quote_delimiter_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path());

    let output = run(&[
        "--input",
        &input,
        "--output",
        dir.path().join("csv").to_str().unwrap(),
        "--delimiter",
        "\"",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(report["error"]
        .as_str()
        .unwrap_or_default()
        .starts_with("Configuration error"));
    assert!(!dir.path().join("csv").exists());
}

#[test]
fn test_invalid_arguments_exit_with_failure() {
    let output = run(&["--input", "a.xlsx"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--output"));

    let output = run(&["--input", "a.xlsx", "--output", "out", "--delimiter", ";;"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());

    let output = run(&["--input", "a.xlsx", "--output", "out", "--progress-every", "0"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_help_exits_with_success() {
    let output = run(&["--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("--delimiter"));
}
