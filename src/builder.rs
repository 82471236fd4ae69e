//! Builder Module
//!
//! Fluent Builder APIを提供し、`Converter`インスタンスを段階的に構築する。

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek};
use std::path::Path;
use std::time::Instant;

use zip::read::ZipFile;

use crate::api::{MissingStringPolicy, SheetDiscovery, WidthPolicy};
use crate::container::{synthesized_name, Container};
use crate::error::ConvertError;
use crate::output::{CsvSink, OutputNamer};
use crate::parser::{
    load_relationships, load_sheet_descriptors, load_shared_strings, prescan_width,
    sheet_name_map, SheetDescriptor, SheetRows,
};
use crate::security::SecurityConfig;
use crate::types::{
    millis, ConversionReport, SharedStringPool, SheetConversionResult, WorksheetPart,
};

/// 区切り文字のデフォルト値
pub const DEFAULT_DELIMITER: char = ';';

/// 進捗ログを出力する行間隔のデフォルト値
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 50_000;

/// 変換処理の設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct ConversionConfig {
    /// フィールド区切り文字
    pub delimiter: char,

    /// 行幅の決定方式
    pub width_policy: WidthPolicy,

    /// 範囲外の共有文字列参照の扱い
    pub missing_strings: MissingStringPolicy,

    /// ワークシートパートの検出方式
    pub discovery: SheetDiscovery,

    /// 進捗ログの行間隔
    pub progress_interval: u64,

    /// セキュリティ設定
    pub security: SecurityConfig,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            width_policy: WidthPolicy::default(),
            missing_strings: MissingStringPolicy::default(),
            discovery: SheetDiscovery::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            security: SecurityConfig::default(),
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxcsv::{ConverterBuilder, WidthPolicy};
///
/// # fn main() -> Result<(), xlsxcsv::ConvertError> {
/// let converter = ConverterBuilder::new()
///     .with_delimiter(',')
///     .with_width_policy(WidthPolicy::Prescan)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConverterBuilder {
    /// 内部設定（構築中）
    config: ConversionConfig,
}

impl Default for ConverterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - 区切り文字: `;`
    /// - 行幅: 最初の行のセル数
    /// - 範囲外の共有文字列参照: 生の値を出力
    /// - ワークシートの検出: 命名規則（ZIP格納順）
    /// - 進捗ログ: 50000行ごと
    pub fn new() -> Self {
        Self {
            config: ConversionConfig::default(),
        }
    }

    /// フィールド区切り文字を指定する
    ///
    /// ASCII文字のみ指定できます。`"`と改行文字は使用できません。
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.config.delimiter = delimiter;
        self
    }

    /// 行幅の決定方式を指定する
    pub fn with_width_policy(mut self, policy: WidthPolicy) -> Self {
        self.config.width_policy = policy;
        self
    }

    /// 範囲外の共有文字列参照の扱いを指定する
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxcsv::{ConverterBuilder, MissingStringPolicy};
    ///
    /// let builder = ConverterBuilder::new()
    ///     .with_missing_string_policy(MissingStringPolicy::Reject);
    /// ```
    pub fn with_missing_string_policy(mut self, policy: MissingStringPolicy) -> Self {
        self.config.missing_strings = policy;
        self
    }

    /// ワークシートパートの検出方式を指定する
    pub fn with_sheet_discovery(mut self, discovery: SheetDiscovery) -> Self {
        self.config.discovery = discovery;
        self
    }

    /// 進捗ログを出力する行間隔を指定する（1以上）
    pub fn with_progress_interval(mut self, rows: u64) -> Self {
        self.config.progress_interval = rows;
        self
    }

    /// セキュリティ設定を指定する
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxcsv::{ConverterBuilder, SecurityConfig};
    ///
    /// let security = SecurityConfig {
    ///     max_file_count: 500,
    ///     ..SecurityConfig::default()
    /// };
    /// let builder = ConverterBuilder::new().with_security_config(security);
    /// ```
    pub fn with_security_config(mut self, security: SecurityConfig) -> Self {
        self.config.security = security;
        self
    }

    /// 設定を検証し、`Converter`インスタンスを生成する
    ///
    /// # 戻り値
    ///
    /// * `Ok(Converter)`: 設定が有効な場合
    /// * `Err(ConvertError::Config)`: 設定が無効な場合
    ///
    /// # 発生し得るエラー
    ///
    /// * 区切り文字がASCII文字でない、または`"`・`\r`・`\n`
    /// * 進捗ログの行間隔が0
    pub fn build(self) -> Result<Converter, ConvertError> {
        // 1. 区切り文字の検証
        let delimiter = u8::try_from(self.config.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                ConvertError::Config(format!(
                    "Delimiter must be a single ASCII character, got {:?}",
                    self.config.delimiter
                ))
            })?;
        if matches!(delimiter, b'"' | b'\r' | b'\n') {
            return Err(ConvertError::Config(format!(
                "Delimiter {:?} cannot be used as a field separator",
                self.config.delimiter
            )));
        }

        // 2. 進捗間隔の検証
        if self.config.progress_interval == 0 {
            return Err(ConvertError::Config(
                "Progress interval must be greater than zero".to_string(),
            ));
        }

        Ok(Converter::new(self.config, delimiter))
    }
}

/// 変換処理のファサード
///
/// XLSXファイルを、シートごとのCSVファイルに変換するためのメインエントリーポイントです。
/// 変換は同期的に1シートずつ実行され、最初のエラーで中断されます。
/// 結果は成否にかかわらず`ConversionReport`として返されます。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxcsv::ConverterBuilder;
///
/// # fn main() -> Result<(), xlsxcsv::ConvertError> {
/// let converter = ConverterBuilder::new().build()?;
/// let report = converter.convert_path("ventas.xlsx", "out");
/// println!("{}", report.to_json_pretty().unwrap_or_default());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Converter {
    /// 変換設定
    config: ConversionConfig,

    /// 検証済みの区切り文字
    delimiter: u8,
}

impl Converter {
    pub(crate) fn new(config: ConversionConfig, delimiter: u8) -> Self {
        Self { config, delimiter }
    }

    /// ファイルパスで指定したXLSXファイルを変換
    ///
    /// # 引数
    ///
    /// * `input` - XLSXファイルのパス
    /// * `output_dir` - CSVファイルの出力先ディレクトリ（存在しない場合は作成）
    ///
    /// # 戻り値
    ///
    /// 変換レポート。失敗時は`success`が`false`になり、`error`にメッセージが入ります。
    ///
    /// # 処理フロー
    ///
    /// 1. コンテナを開く
    /// 2. 出力ディレクトリを作成
    /// 3. 共有文字列プールとシート名マッピングを読み込む
    /// 4. ワークシートパートを検出
    /// 5. 各シートについて処理（ループ）
    ///    - 出力ファイルの作成
    ///    - 行のストリーミング変換と書き込み
    ///    - フラッシュ、サイズ取得、結果の追加
    pub fn convert_path(
        &self,
        input: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> ConversionReport {
        let started = Instant::now();
        let mut report = ConversionReport::new();

        let result = Container::open_path(input.as_ref(), &self.config.security)
            .and_then(|mut container| self.run(&mut container, output_dir.as_ref(), &mut report));

        self.complete(report, result, started)
    }

    /// リーダーから読み込んだXLSXデータを変換
    ///
    /// # 引数
    ///
    /// * `input` - XLSXデータのリーダー（Read + Seekトレイトを実装）
    /// * `output_dir` - CSVファイルの出力先ディレクトリ
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use std::io::Cursor;
    /// use xlsxcsv::ConverterBuilder;
    ///
    /// # fn main() -> Result<(), xlsxcsv::ConvertError> {
    /// let converter = ConverterBuilder::new().build()?;
    /// let excel_data: Vec<u8> = std::fs::read("ventas.xlsx").unwrap_or_default();
    /// let report = converter.convert_reader(Cursor::new(excel_data), "out");
    /// assert!(report.success);
    /// # Ok(())
    /// # }
    /// ```
    pub fn convert_reader<R: Read + Seek>(
        &self,
        input: R,
        output_dir: impl AsRef<Path>,
    ) -> ConversionReport {
        let started = Instant::now();
        let mut report = ConversionReport::new();

        let result = Container::new(input, &self.config.security)
            .and_then(|mut container| self.run(&mut container, output_dir.as_ref(), &mut report));

        self.complete(report, result, started)
    }

    fn complete(
        &self,
        mut report: ConversionReport,
        result: Result<(), ConvertError>,
        started: Instant,
    ) -> ConversionReport {
        report.finish(started.elapsed());
        match result {
            Ok(()) => tracing::info!(
                sheets = report.sheets.len(),
                total_rows = report.total_rows,
                total_time_ms = report.total_time_ms,
                "conversion finished"
            ),
            Err(e) => {
                tracing::error!(error = %e, "conversion failed");
                report.fail(&e);
            }
        }
        report
    }

    fn run<R: Read + Seek>(
        &self,
        container: &mut Container<R>,
        output_dir: &Path,
        report: &mut ConversionReport,
    ) -> Result<(), ConvertError> {
        fs::create_dir_all(output_dir).map_err(|source| ConvertError::Directory {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let pool = load_shared_strings(container)?;
        let descriptors = load_sheet_descriptors(container)?;
        let parts = self.discover(container, &descriptors)?;
        tracing::debug!(sheets = parts.len(), "discovered worksheet parts");

        let mut namer = OutputNamer::new(output_dir);
        for part in &parts {
            let path = namer.assign(&part.name);
            let result = self.convert_sheet(container, &pool, part, &path)?;
            report.push_sheet(result);
        }

        Ok(())
    }

    /// 変換対象のワークシートパートを決定する
    fn discover<R: Read + Seek>(
        &self,
        container: &mut Container<R>,
        descriptors: &[SheetDescriptor],
    ) -> Result<Vec<WorksheetPart>, ConvertError> {
        match self.config.discovery {
            SheetDiscovery::Convention => Ok(convention_parts(container, descriptors)),
            SheetDiscovery::Relationships => {
                let parts = match load_relationships(container)? {
                    Some(relationships) if !descriptors.is_empty() => {
                        relationship_parts(container, descriptors, &relationships)
                    }
                    _ => Vec::new(),
                };
                if parts.is_empty() {
                    tracing::warn!(
                        "no worksheet reachable through workbook relationships, falling back to worksheet file names"
                    );
                    return Ok(convention_parts(container, descriptors));
                }
                Ok(parts)
            }
        }
    }

    /// 1シートを変換し、CSVファイルに書き込む
    fn convert_sheet<R: Read + Seek>(
        &self,
        container: &mut Container<R>,
        pool: &SharedStringPool,
        part: &WorksheetPart,
        path: &Path,
    ) -> Result<SheetConversionResult, ConvertError> {
        let started = Instant::now();
        let name = part.name.as_str();
        tracing::info!(sheet = name, member = %part.member, output = %path.display(), "converting sheet");

        let width = match self.config.width_policy {
            WidthPolicy::FirstRow => None,
            WidthPolicy::Prescan => {
                let member = open_worksheet(container, part)?;
                Some(prescan_width(BufReader::new(member), name)?)
            }
        };

        let file = File::create(path).map_err(|e| ConvertError::write_io(name, e))?;
        let mut sink = CsvSink::new(BufWriter::new(file), self.delimiter, name);

        let member = open_worksheet(container, part)?;
        let mut rows = SheetRows::new(BufReader::new(member), pool, name)
            .with_missing_string_policy(self.config.missing_strings);
        if let Some(width) = width {
            rows = rows.with_width(width);
        }

        for row in rows {
            let row = row?;
            sink.write_row(&row)?;
            if sink.rows_written() % self.config.progress_interval == 0 {
                tracing::info!("processed {} rows of {}", sink.rows_written(), name);
            }
        }

        let rows = sink.rows_written();
        drop(sink.finish()?);

        let size_bytes = fs::metadata(path)
            .map_err(|source| ConvertError::Stat {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        let result = SheetConversionResult {
            name: part.name.clone(),
            path: path.display().to_string(),
            rows,
            size_kb: size_bytes / 1024,
            size_bytes,
            duration_ms: millis(started.elapsed()),
        };
        tracing::info!(
            sheet = name,
            rows = result.rows,
            size_kb = result.size_kb,
            duration_ms = result.duration_ms,
            "sheet converted"
        );
        Ok(result)
    }
}

fn open_worksheet<'c, R: Read + Seek>(
    container: &'c mut Container<R>,
    part: &WorksheetPart,
) -> Result<ZipFile<'c>, ConvertError> {
    match container.open_member(&part.member) {
        Ok(Some(file)) => Ok(file),
        Ok(None) => Err(ConvertError::sheet_read(
            &part.name,
            format!("worksheet part {} not found", part.member),
        )),
        Err(e) => Err(ConvertError::sheet_read(
            &part.name,
            format!("cannot open {}: {}", part.member, e),
        )),
    }
}

/// 命名規則に一致するメンバーを格納順に列挙し、シートIDで表示名を解決する
fn convention_parts<R: Read + Seek>(
    container: &Container<R>,
    descriptors: &[SheetDescriptor],
) -> Vec<WorksheetPart> {
    let names = sheet_name_map(descriptors);
    container
        .worksheet_members()
        .into_iter()
        .map(|(member, sheet_id)| {
            let name = match sheet_id.and_then(|id| names.get(id)) {
                Some(name) => name.to_string(),
                None => {
                    let fallback = synthesized_name(&member);
                    tracing::debug!(member = %member, name = %fallback, "sheet id not in workbook, using file name");
                    fallback
                }
            };
            WorksheetPart { member, name }
        })
        .collect()
}

/// ワークブックの宣言順に、リレーションシップを辿ってワークシートを列挙する
fn relationship_parts<R: Read + Seek>(
    container: &Container<R>,
    descriptors: &[SheetDescriptor],
    relationships: &std::collections::HashMap<String, String>,
) -> Vec<WorksheetPart> {
    let mut parts = Vec::new();
    for descriptor in descriptors {
        let member = descriptor
            .relationship_id
            .as_ref()
            .and_then(|id| relationships.get(id));
        let Some(member) = member else {
            tracing::debug!(sheet = %descriptor.name, "no worksheet relationship, skipping");
            continue;
        };
        if !container.contains(member) {
            tracing::warn!(sheet = %descriptor.name, member = %member, "worksheet part missing from archive, skipping");
            continue;
        }

        let name = if descriptor.name.is_empty() {
            synthesized_name(member)
        } else {
            descriptor.name.clone()
        };
        parts.push(WorksheetPart {
            member: member.clone(),
            name,
        });
    }
    parts
}
