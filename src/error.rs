//! Error Types Module
//!
//! 変換処理全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーメッセージのフォーマットを実現する。
//!
//! いずれのエラーもリトライ対象ではなく、発生した時点で変換全体が中断されます。
//! 中断前に完了したシートの結果はレポートに残ります。

use std::path::PathBuf;

use thiserror::Error;

/// xlsxcsvクレート全体で使用するエラー型
///
/// # エラーの種類
///
/// - `Open`: コンテナ（ZIPアーカイブ）を開けない、または不正な形式
/// - `Directory`: 出力ディレクトリを作成できない
/// - `StringsLoad` / `NameMapLoad`: 共有文字列・ワークブックメタデータが不正
/// - `SheetRead`: ワークシートXMLが不正、または読み込み途中のI/O失敗
/// - `Write`: 出力CSVファイルの作成・書き込みに失敗
/// - `Stat`: 完了したCSVファイルのサイズを取得できない
/// - `Config`: ビルダー・CLIで指定された設定が不正
/// - `SecurityViolation`: ZIPアーカイブがセキュリティ制限に違反
#[derive(Error, Debug)]
pub enum ConvertError {
    /// コンテナを開けなかった
    #[error("Error opening Excel container: {0}")]
    Open(String),

    /// 出力ディレクトリの作成に失敗した
    #[error("Error creating output directory {}: {source}", path.display())]
    Directory {
        /// 作成しようとしたディレクトリ
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `xl/sharedStrings.xml`の解析に失敗した
    #[error("Error loading shared strings: {0}")]
    StringsLoad(String),

    /// `xl/workbook.xml`（またはリレーションシップ）の解析に失敗した
    #[error("Error loading sheet names: {0}")]
    NameMapLoad(String),

    /// ワークシートの読み込みに失敗した
    ///
    /// XMLの整形式違反、行要素のデコード失敗、ストリーム途中のI/O失敗などで発生します。
    #[error("Error processing sheet {sheet}: {message}")]
    SheetRead {
        /// 失敗したシートの表示名
        sheet: String,
        /// 詳細メッセージ
        message: String,
    },

    /// CSVファイルの作成・書き込みに失敗した
    #[error("Error writing CSV for {sheet}: {source}")]
    Write {
        /// 書き込み中だったシートの表示名
        sheet: String,
        #[source]
        source: csv::Error,
    },

    /// 出力ファイルのサイズ取得に失敗した
    #[error("Error getting CSV file info for {}: {source}", path.display())]
    Stat {
        /// 対象のCSVファイル
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 設定の検証に失敗した
    ///
    /// `ConverterBuilder::build()`時に、区切り文字や進捗間隔が不正な場合に発生します。
    #[error("Configuration error: {0}")]
    Config(String),

    /// セキュリティ制限に違反した
    ///
    /// ファイル数の上限超過、パストラバーサルを含むメンバー名、
    /// メタデータパートのサイズ上限超過などで発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}

impl ConvertError {
    /// シート名付きの読み込みエラーを生成する
    pub(crate) fn sheet_read(sheet: &str, message: impl Into<String>) -> Self {
        ConvertError::SheetRead {
            sheet: sheet.to_string(),
            message: message.into(),
        }
    }

    /// I/Oエラーを書き込みエラーとして包む
    pub(crate) fn write_io(sheet: &str, source: std::io::Error) -> Self {
        ConvertError::Write {
            sheet: sheet.to_string(),
            source: csv::Error::from(source),
        }
    }
}
