//! xl/sharedStrings.xml のストリーミング読み込み

use std::io::{BufRead, BufReader, Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::container::{Container, SHARED_STRINGS_PART};
use crate::error::ConvertError;
use crate::types::SharedStringPool;

/// コンテナから共有文字列プールを読み込む
///
/// `xl/sharedStrings.xml`が存在しない場合は空のプールを返します
/// （共有文字列を持たないワークブックも正当です）。
pub(crate) fn load_shared_strings<R: Read + Seek>(
    container: &mut Container<R>,
) -> Result<SharedStringPool, ConvertError> {
    let file = match container.open_metadata(SHARED_STRINGS_PART)? {
        Some(file) => file,
        None => {
            tracing::debug!("no shared strings part, using empty pool");
            return Ok(SharedStringPool::new());
        }
    };

    let pool = parse_shared_strings(BufReader::new(file))?;
    tracing::debug!(strings = pool.len(), "loaded shared strings");
    Ok(pool)
}

/// `<sst>`を1パスで解析し、`<si>`ごとに1エントリを文書順に追加する
///
/// 各`<si>`のテキストは、配下の`<t>`（`<r>`ランの`<t>`を含む）を連結したものです。
/// ルビ（`<rPh>`）のテキストは含めません。
/// メモリ使用量は1エントリ分のバッファに制限されます。
pub(crate) fn parse_shared_strings<B: BufRead>(input: B) -> Result<SharedStringPool, ConvertError> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(false);

    let mut buf = Vec::new();
    let mut pool = SharedStringPool::new();
    let mut depth = 0usize;
    let mut in_item = false;
    let mut in_text = false;
    let mut phonetic_depth = 0usize;
    let mut current = String::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            ConvertError::StringsLoad(format!(
                "XML parse error at position {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(e) => {
                depth += 1;
                match e.local_name().as_ref() {
                    b"si" => {
                        in_item = true;
                        current.clear();
                    }
                    b"rPh" if in_item => phonetic_depth += 1,
                    b"t" if in_item && phonetic_depth == 0 => in_text = true,
                    _ => {}
                }
            }
            Event::Empty(e) => {
                // <si/> は空文字列として位置を占める
                if e.local_name().as_ref() == b"si" {
                    pool.push(String::new());
                }
            }
            Event::Text(e) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|e| ConvertError::StringsLoad(format!("XML text error: {}", e)))?;
                current.push_str(&text);
            }
            Event::CData(e) if in_text => {
                let text = reader
                    .decoder()
                    .decode(&e)
                    .map_err(|e| ConvertError::StringsLoad(format!("XML text error: {}", e)))?;
                current.push_str(&text);
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                match e.local_name().as_ref() {
                    b"t" => in_text = false,
                    b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                    b"si" if in_item => {
                        pool.push(std::mem::take(&mut current));
                        in_item = false;
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if depth != 0 {
        return Err(ConvertError::StringsLoad(
            "unexpected end of shared strings document".to_string(),
        ));
    }

    Ok(pool)
}
