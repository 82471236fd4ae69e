//! Security Tests
//!
//! ZIP bomb攻撃（大量のメンバー、巨大なメタデータ）とパストラバーサル攻撃への対策を検証します。
//! いずれもコンテナを開く段階で拒否され、シートは1つも出力されません。

use std::io::{Cursor, Write};
use xlsxcsv::{ConversionReport, ConverterBuilder, SecurityConfig};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

fn zip_with(names: &[&str]) -> Vec<u8> {
    let mut zip_data = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut zip_data));
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        for name in names {
            zip.start_file(*name, options).unwrap();
            zip.write_all(b"<worksheet/>").unwrap();
        }
        zip.finish().unwrap();
    }
    zip_data
}

fn convert(zip_data: Vec<u8>, security: SecurityConfig) -> (ConversionReport, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let converter = ConverterBuilder::new()
        .with_security_config(security)
        .build()
        .unwrap();
    let report = converter.convert_reader(Cursor::new(zip_data), dir.path().join("out"));
    (report, dir)
}

fn assert_security_violation(report: &ConversionReport, fragment: &str) {
    assert!(!report.success);
    assert!(report.sheets.is_empty());
    let error = report.error.as_deref().unwrap_or_default();
    assert!(
        error.starts_with("Security violation") && error.contains(fragment),
        "unexpected error: {}",
        error
    );
}

/// ZIP bomb攻撃のテスト: 大量のファイルを含むZIPアーカイブ
#[test]
fn test_zip_bomb_too_many_files() {
    // 10,001個のファイルを含むZIPアーカイブを作成（上限: 10,000）
    let names: Vec<String> = (0..10_001).map(|i| format!("xl/file{}.xml", i)).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();

    let (report, dir) = convert(zip_with(&names), SecurityConfig::default());

    assert_security_violation(&report, "too many files");
    // 出力ディレクトリは作成されない
    assert!(!dir.path().join("out").exists());
}

/// メンバー数の上限は設定で変更できる
#[test]
fn test_custom_file_count_limit() {
    let security = SecurityConfig {
        max_file_count: 1,
        ..SecurityConfig::default()
    };
    let (report, _dir) = convert(
        zip_with(&["xl/worksheets/sheet1.xml", "xl/worksheets/sheet2.xml"]),
        security,
    );
    assert_security_violation(&report, "too many files");
}

/// メタデータパートのサイズ上限
#[test]
fn test_shared_strings_size_limit() {
    let mut zip_data = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut zip_data));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file("xl/sharedStrings.xml", options).unwrap();
        zip.write_all(b"<sst>").unwrap();
        for _ in 0..1_000 {
            zip.write_all(b"<si><t>repeated</t></si>").unwrap();
        }
        zip.write_all(b"</sst>").unwrap();
        zip.finish().unwrap();
    }

    let security = SecurityConfig {
        max_metadata_size: 1_024,
        ..SecurityConfig::default()
    };
    let (report, _dir) = convert(zip_data, security);
    assert_security_violation(&report, "exceeds maximum size");
}

/// パストラバーサル攻撃のテスト: `..`を含むパス
#[test]
fn test_path_traversal_dotdot() {
    let (report, _dir) = convert(
        zip_with(&["xl/worksheets/sheet1.xml", "../etc/passwd"]),
        SecurityConfig::default(),
    );
    assert_security_violation(&report, "Path traversal");
}

/// パストラバーサル攻撃のテスト: 絶対パス
#[test]
fn test_path_traversal_absolute_path() {
    let (report, _dir) = convert(zip_with(&["/etc/passwd"]), SecurityConfig::default());
    assert_security_violation(&report, "Invalid ZIP path");
}

/// パストラバーサル攻撃のテスト: Windows形式の絶対パス
#[test]
fn test_path_traversal_windows_absolute_path() {
    let (report, _dir) = convert(
        zip_with(&["C:\\Windows\\system32"]),
        SecurityConfig::default(),
    );
    assert_security_violation(&report, "Invalid ZIP path");
}

/// 正常なファイルの処理が成功することを確認
#[test]
fn test_valid_file_processing() {
    let (report, dir) = convert(
        zip_with(&["[Content_Types].xml", "xl/worksheets/sheet1.xml"]),
        SecurityConfig::default(),
    );

    assert!(report.success, "{:?}", report.error);
    assert_eq!(report.sheets.len(), 1);
    assert!(dir.path().join("out").join("sheet1.csv").exists());
}
