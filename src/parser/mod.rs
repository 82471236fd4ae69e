//! Parser Module
//!
//! quick-xmlのイベントリーダーによる、XLSXパートのストリーミング解析。
//! ドキュメントツリー全体を構築せず、要素を1つずつ処理します。

mod cell_ref;
mod sheet;
mod shared_strings;
mod workbook;

pub use cell_ref::column_index;
pub use sheet::{prescan_width, SheetRows, HEADER_MARKER};

pub(crate) use shared_strings::load_shared_strings;
pub(crate) use workbook::{load_relationships, load_sheet_descriptors, sheet_name_map, SheetDescriptor};

use quick_xml::events::BytesStart;
use quick_xml::Reader;

/// 要素から指定したローカル名の属性値を取得する（名前空間プレフィックスは無視）
///
/// 値のデコードには`reader`のエンコーディングを使用します。
pub(crate) fn attribute_value<B>(
    reader: &Reader<B>,
    element: &BytesStart<'_>,
    local_name: &[u8],
) -> Result<Option<String>, quick_xml::Error> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == local_name {
            return Ok(Some(attr.decode_and_unescape_value(reader)?.into_owned()));
        }
    }
    Ok(None)
}
