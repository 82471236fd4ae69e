//! セル参照（A1形式）のデコード

/// セル参照から0始まりの列インデックスを求める
///
/// 先頭の英字部分のみを全単射26進数としてデコードし（A=1 … Z=26, AA=27 …）、
/// 1を引いて0始まりにします。後続の行番号部分は無視されます。
/// 英字は大文字・小文字を区別しません。
///
/// # 戻り値
///
/// * `Some(index)` - 列インデックス
/// * `None` - 先頭が英字でない（空文字列を含む）、または桁あふれする場合。
///   呼び出し側はこのセルを破棄します。
///
/// # 使用例
///
/// ```rust
/// use xlsxcsv::column_index;
///
/// assert_eq!(column_index("A1"), Some(0));
/// assert_eq!(column_index("AB12"), Some(27));
/// assert_eq!(column_index("12"), None);
/// ```
pub fn column_index(reference: &str) -> Option<usize> {
    let mut index: usize = 0;
    let mut letters = 0usize;

    for byte in reference.bytes() {
        if !byte.is_ascii_alphabetic() {
            break;
        }
        let digit = usize::from(byte.to_ascii_uppercase() - b'A') + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
        letters += 1;
    }

    if letters == 0 {
        return None;
    }
    Some(index - 1)
}
