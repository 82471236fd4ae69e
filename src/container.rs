//! Container Module
//!
//! XLSXファイル（ZIPアーカイブ）のラッパー。
//! アーカイブを開く際のセキュリティ検証、ネイティブ格納順でのメンバー列挙、
//! 命名規則に基づくワークシートパートの検出を提供します。

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::ConvertError;
use crate::security::{validate_zip_path, SecurityConfig};

pub(crate) const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
pub(crate) const WORKBOOK_PART: &str = "xl/workbook.xml";
pub(crate) const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";

const WORKSHEET_DIR: &str = "xl/worksheets/";
const WORKSHEET_PREFIX: &str = "xl/worksheets/sheet";
const WORKSHEET_SUFFIX: &str = ".xml";

/// 開いたXLSXコンテナ
pub(crate) struct Container<R: Read + Seek> {
    archive: ZipArchive<R>,
    /// セントラルディレクトリの格納順のメンバー名
    members: Vec<String>,
    security: SecurityConfig,
}

impl Container<BufReader<File>> {
    /// パスからコンテナを開く
    pub fn open_path(path: &Path, security: &SecurityConfig) -> Result<Self, ConvertError> {
        let file = File::open(path)
            .map_err(|e| ConvertError::Open(format!("{}: {}", path.display(), e)))?;
        Self::new(BufReader::new(file), security)
    }
}

impl<R: Read + Seek> Container<R> {
    /// リーダーからコンテナを開き、メンバー名を検証する
    ///
    /// # 戻り値
    ///
    /// * `Ok(Container)` - ZIPアーカイブとして読み込めた場合
    /// * `Err(ConvertError::Open)` - ZIPアーカイブとして不正な場合
    /// * `Err(ConvertError::SecurityViolation)` - メンバー数超過、または危険なメンバー名を含む場合
    pub fn new(reader: R, security: &SecurityConfig) -> Result<Self, ConvertError> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| ConvertError::Open(e.to_string()))?;

        if archive.len() > security.max_file_count {
            return Err(ConvertError::SecurityViolation(format!(
                "ZIP archive contains too many files: {} (max: {})",
                archive.len(),
                security.max_file_count
            )));
        }

        let mut members = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let file = archive
                .by_index(i)
                .map_err(|e| ConvertError::Open(e.to_string()))?;
            let name = file.name().to_string();
            validate_zip_path(&name).map_err(|e| {
                ConvertError::SecurityViolation(format!("Invalid ZIP path: {}", e))
            })?;
            members.push(name);
        }

        tracing::debug!(members = members.len(), "opened container");

        Ok(Self {
            archive,
            members,
            security: security.clone(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.iter().any(|member| member == name)
    }

    /// 命名規則に一致するワークシートパートを格納順に列挙する
    ///
    /// 戻り値は `(メンバー名, シートID)` のペアです。
    /// 番号が`u32`に収まらない場合、シートIDは`None`になります。
    pub fn worksheet_members(&self) -> Vec<(String, Option<u32>)> {
        self.members
            .iter()
            .filter_map(|member| {
                worksheet_digits(member).map(|digits| (member.clone(), digits.parse().ok()))
            })
            .collect()
    }

    /// メンバーを開く（存在しない場合は`Ok(None)`）
    pub fn open_member(&mut self, name: &str) -> Result<Option<ZipFile<'_>>, ZipError> {
        match self.archive.by_name(name) {
            Ok(file) => Ok(Some(file)),
            Err(ZipError::FileNotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// メモリに保持するメタデータパートを開く
    ///
    /// 展開後サイズが`SecurityConfig::max_metadata_size`を超える場合はエラーになります。
    pub fn open_metadata(&mut self, name: &str) -> Result<Option<ZipFile<'_>>, ConvertError> {
        let limit = self.security.max_metadata_size;
        let file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(ConvertError::Open(format!("{}: {}", name, e))),
        };

        if file.size() > limit {
            return Err(ConvertError::SecurityViolation(format!(
                "File '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                name,
                file.size(),
                limit
            )));
        }

        Ok(Some(file))
    }
}

/// ワークシートパートのメンバー名から番号部分を取り出す
///
/// `xl/worksheets/sheet<数字>.xml` の形式のみを受け付けます。
fn worksheet_digits(member: &str) -> Option<&str> {
    let digits = member
        .strip_prefix(WORKSHEET_PREFIX)?
        .strip_suffix(WORKSHEET_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(digits)
}

/// メンバー名からフォールバック用のシート名を合成する
///
/// `xl/worksheets/sheet3.xml` → `sheet3`
pub(crate) fn synthesized_name(member: &str) -> String {
    let file_name = member.strip_prefix(WORKSHEET_DIR).unwrap_or(member);
    let file_name = file_name.rsplit('/').next().unwrap_or(file_name);
    file_name
        .strip_suffix(WORKSHEET_SUFFIX)
        .unwrap_or(file_name)
        .to_string()
}
