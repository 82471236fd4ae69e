//! Security Module
//!
//! 信頼できないXLSXファイルを扱うためのセキュリティ制限を提供します。
//! ZIP bomb攻撃（大量のメンバー）、パストラバーサル攻撃、
//! メモリに保持するメタデータパートの肥大化への対策です。

/// セキュリティ設定
///
/// ワークシートパートはストリーミング処理されるためサイズ制限の対象外です。
/// メモリに保持される共有文字列プールとワークブックメタデータのみを制限します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityConfig {
    /// ZIPアーカイブ内の最大メンバー数
    /// デフォルト: 10000
    pub max_file_count: usize,
    /// メタデータパート（`xl/sharedStrings.xml`、`xl/workbook.xml`、
    /// `xl/_rels/workbook.xml.rels`）の展開後の最大サイズ（バイト）
    /// デフォルト: 512MB (536_870_912 bytes)
    pub max_metadata_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_file_count: 10_000,
            max_metadata_size: 536_870_912, // 512MB
        }
    }
}

/// ZIPメンバー名の検証
///
/// # 引数
///
/// * `path` - 検証するメンバー名
///
/// # 戻り値
///
/// * `Ok(())` - 安全なメンバー名の場合
/// * `Err(String)` - 空、絶対パス、`..`セグメント、バックスラッシュを含む場合
pub(crate) fn validate_zip_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("Empty member name is not allowed".to_string());
    }

    let bytes = path.as_bytes();
    let has_drive_prefix = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    if path.starts_with('/') || has_drive_prefix {
        return Err(format!("Absolute member path is not allowed: {}", path));
    }

    if path.contains('\\') {
        return Err(format!("Backslash in member path is not allowed: {}", path));
    }

    if path.split('/').any(|segment| segment == "..") {
        return Err(format!("Path traversal detected: {}", path));
    }

    Ok(())
}
