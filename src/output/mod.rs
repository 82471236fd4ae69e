//! Output Module
//!
//! CSVファイルへの行の書き込みと、シート名から出力ファイル名への変換を提供するモジュール。

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::ConvertError;

/// 出力ファイル名に使用できない文字
const RESERVED_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

const CSV_EXTENSION: &str = "csv";

/// 1シート分のCSV出力先
///
/// `csv`クレートのライターをラップし、区切り文字と標準的なクォート規則
/// （区切り文字・引用符・改行を含むフィールドのみクォート）を適用します。
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    sheet: String,
    rows_written: u64,
}

impl<W: Write> CsvSink<W> {
    /// # 引数
    ///
    /// * `writer` - 出力先
    /// * `delimiter` - フィールド区切り文字（1バイト）
    /// * `sheet` - エラーメッセージに使用するシート名
    pub fn new(writer: W, delimiter: u8, sheet: &str) -> Self {
        let writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .quote_style(csv::QuoteStyle::Necessary)
            .has_headers(false)
            .from_writer(writer);
        Self {
            writer,
            sheet: sheet.to_string(),
            rows_written: 0,
        }
    }

    /// 1行を書き込む
    pub fn write_row<I, T>(&mut self, fields: I) -> Result<(), ConvertError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer
            .write_record(fields)
            .map_err(|source| ConvertError::Write {
                sheet: self.sheet.clone(),
                source,
            })?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// バッファをフラッシュし、内側のライターを返す
    pub fn finish(self) -> Result<W, ConvertError> {
        let sheet = self.sheet;
        self.writer
            .into_inner()
            .map_err(|e| ConvertError::write_io(&sheet, e.into_error()))
    }
}

/// シート名をファイル名の語幹として安全な文字列に変換する
///
/// パス区切り文字、予約文字、制御文字を`_`に置き換えます。
/// 空文字列、`.`、`..`は`_`になります。
///
/// # 使用例
///
/// ```rust
/// use xlsxcsv::sanitize_file_stem;
///
/// assert_eq!(sanitize_file_stem("Ventas 2024"), "Ventas 2024");
/// assert_eq!(sanitize_file_stem("Q1/Q2"), "Q1_Q2");
/// assert_eq!(sanitize_file_stem(".."), "_");
/// ```
pub fn sanitize_file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if RESERVED_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    match stem.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => stem,
    }
}

/// 1回の変換内で出力ファイルパスを割り当てる
///
/// 同じ語幹が2回目以降に現れた場合は`_2`、`_3`…の接尾辞を付け、
/// 既に出力したファイルを上書きしないようにします。
/// 比較は大文字・小文字を区別しないファイルシステムを考慮し、小文字化して行います。
#[derive(Debug)]
pub struct OutputNamer {
    dir: PathBuf,
    used: HashSet<String>,
}

impl OutputNamer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            used: HashSet::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// シート名に対応する出力パスを割り当てる
    pub fn assign(&mut self, sheet_name: &str) -> PathBuf {
        let stem = sanitize_file_stem(sheet_name);
        let mut candidate = stem.clone();
        let mut suffix = 1usize;

        while self.used.contains(&candidate.to_lowercase()) {
            suffix += 1;
            candidate = format!("{}_{}", stem, suffix);
        }

        self.used.insert(candidate.to_lowercase());
        self.dir.join(format!("{}.{}", candidate, CSV_EXTENSION))
    }
}
