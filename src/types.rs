//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConvertError;

/// 共有文字列プール
///
/// `xl/sharedStrings.xml`の`<si>`要素を文書順に保持します。
/// インデックス（プール内の位置）が、セルから参照される識別子になります。
/// 1回の変換で1度だけ構築され、以降は変更されません。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedStringPool {
    strings: Vec<String>,
}

impl SharedStringPool {
    /// 空のプールを生成
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, value: String) {
        self.strings.push(value);
    }

    /// インデックスに対応する文字列を取得（範囲外の場合は`None`）
    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    /// プール内の文字列数
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// プールが空かどうか
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl From<Vec<String>> for SharedStringPool {
    fn from(strings: Vec<String>) -> Self {
        Self { strings }
    }
}

/// シートID → 表示名のマッピング
///
/// `xl/workbook.xml`の`<sheet sheetId="N" name="...">`から構築されます。
/// キーはワークシートパートのファイル名（`sheet<N>.xml`）に埋め込まれた番号と突き合わされます。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetNameMap {
    names: HashMap<u32, String>,
}

impl SheetNameMap {
    /// 空のマッピングを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// エントリを追加（同じIDが既に存在する場合は上書き）
    pub fn insert(&mut self, sheet_id: u32, name: impl Into<String>) {
        self.names.insert(sheet_id, name.into());
    }

    /// IDに対応する表示名を取得
    ///
    /// 空の名前はエントリが存在しないものとして扱います。
    pub fn get(&self, sheet_id: u32) -> Option<&str> {
        self.names
            .get(&sheet_id)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// セルの型タグ（`t`属性）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CellKind {
    /// `t="s"`: 値は共有文字列プールのインデックス
    SharedString,
    /// `t="inlineStr"`: 値は`<is>`要素内のテキスト
    InlineString,
    /// その他（数値、論理値、エラー、数式結果の文字列）: `<v>`の値をそのまま使用
    Literal,
}

impl CellKind {
    pub(crate) fn from_type_attr(value: &str) -> Self {
        match value {
            "s" => CellKind::SharedString,
            "inlineStr" => CellKind::InlineString,
            _ => CellKind::Literal,
        }
    }
}

/// 行の組み立て中にのみ存在するセル
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Cell {
    /// 0始まりの列インデックス（参照が不正で位置を決定できない場合は`None`）
    pub column: Option<usize>,
    pub kind: CellKind,
    pub value: String,
}

/// 変換対象のワークシートパート
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WorksheetPart {
    /// ZIPアーカイブ内のメンバー名（例: `xl/worksheets/sheet1.xml`）
    pub member: String,
    /// 解決済みのシート表示名
    pub name: String,
}

/// 1シート分の変換結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetConversionResult {
    /// シートの表示名
    pub name: String,
    /// 出力CSVファイルのパス
    pub path: String,
    /// 出力した行数（ヘッダー行を含む）
    pub rows: u64,
    /// 出力ファイルサイズ（KiB、切り捨て）
    pub size_kb: u64,
    /// 出力ファイルサイズ（バイト）
    pub size_bytes: u64,
    /// シートの変換に要した時間（ミリ秒）
    pub duration_ms: u64,
}

/// 変換全体のレポート
///
/// 変換の成否にかかわらず1回だけ出力されます。
/// 失敗時も、失敗前に完了したシートの結果は保持されます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionReport {
    pub success: bool,
    pub sheets: Vec<SheetConversionResult>,
    pub total_rows: u64,
    pub total_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for ConversionReport {
    fn default() -> Self {
        Self {
            success: true,
            sheets: Vec::new(),
            total_rows: 0,
            total_time_ms: 0,
            error: None,
        }
    }
}

impl ConversionReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 変換開始前のエラー（設定エラーなど）から失敗レポートを生成
    pub fn failed(error: &ConvertError) -> Self {
        let mut report = Self::new();
        report.fail(error);
        report
    }

    pub(crate) fn push_sheet(&mut self, result: SheetConversionResult) {
        self.total_rows += result.rows;
        self.sheets.push(result);
    }

    pub(crate) fn fail(&mut self, error: &ConvertError) {
        self.success = false;
        self.error = Some(error.to_string());
    }

    pub(crate) fn finish(&mut self, elapsed: Duration) {
        self.total_time_ms = millis(elapsed);
    }

    /// 整形済みJSONとしてシリアライズ
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub(crate) fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
