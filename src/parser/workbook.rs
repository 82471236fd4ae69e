//! xl/workbook.xml と xl/_rels/workbook.xml.rels の解析
//!
//! ワークブックのメタデータは小さいため、ストリーミングである必要はありませんが、
//! 他のパートと同じくquick-xmlのイベントリーダーで読み込みます。

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader;

use super::attribute_value;
use crate::container::{Container, WORKBOOK_PART, WORKBOOK_RELS_PART};
use crate::error::ConvertError;
use crate::types::SheetNameMap;

const WORKSHEET_REL_TYPE_SUFFIX: &str = "/worksheet";

/// `<sheet>`要素の記述子
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SheetDescriptor {
    /// 表示名（`name`属性）
    pub name: String,
    /// `sheetId`属性（数値として解釈できない場合は`None`）
    pub sheet_id: Option<u32>,
    /// `r:id`属性
    pub relationship_id: Option<String>,
}

/// `<Relationship>`要素
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Relationship {
    pub id: String,
    pub kind: String,
    pub target: String,
}

impl Relationship {
    pub fn is_worksheet(&self) -> bool {
        self.kind.ends_with(WORKSHEET_REL_TYPE_SUFFIX)
    }
}

/// 宣言順のシート記述子からシートID → 表示名のマッピングを構築する
pub(crate) fn sheet_name_map(descriptors: &[SheetDescriptor]) -> SheetNameMap {
    let mut map = SheetNameMap::new();
    for descriptor in descriptors {
        if let Some(id) = descriptor.sheet_id {
            map.insert(id, descriptor.name.clone());
        }
    }
    map
}

/// コンテナから宣言順のシート記述子を読み込む
///
/// `xl/workbook.xml`が存在しない場合は空のリストを返します。
pub(crate) fn load_sheet_descriptors<R: Read + Seek>(
    container: &mut Container<R>,
) -> Result<Vec<SheetDescriptor>, ConvertError> {
    let file = match container.open_metadata(WORKBOOK_PART)? {
        Some(file) => file,
        None => {
            tracing::debug!("no workbook part, sheet names fall back to file names");
            return Ok(Vec::new());
        }
    };
    parse_workbook_sheets(BufReader::new(file))
}

/// コンテナからワークブックのリレーションシップ（Id → 解決済みメンバー名）を読み込む
///
/// リレーションシップパートが存在しない場合は`Ok(None)`を返します。
/// ワークシート以外のリレーションシップ（スタイル、テーマなど）は含みません。
pub(crate) fn load_relationships<R: Read + Seek>(
    container: &mut Container<R>,
) -> Result<Option<HashMap<String, String>>, ConvertError> {
    let file = match container.open_metadata(WORKBOOK_RELS_PART)? {
        Some(file) => file,
        None => return Ok(None),
    };

    let relationships = parse_relationships(BufReader::new(file))?;
    let map = relationships
        .into_iter()
        .filter(Relationship::is_worksheet)
        .map(|rel| {
            let member = resolve_target(&rel.target);
            (rel.id, member)
        })
        .collect();
    Ok(Some(map))
}

/// `<sheets>`配下の`<sheet>`要素を宣言順に取り出す
pub(crate) fn parse_workbook_sheets<B: BufRead>(
    input: B,
) -> Result<Vec<SheetDescriptor>, ConvertError> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    let mut in_sheets = false;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            ConvertError::NameMapLoad(format!(
                "XML parse error at position {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(e) if e.local_name().as_ref() == b"sheets" => in_sheets = true,
            Event::End(e) if e.local_name().as_ref() == b"sheets" => in_sheets = false,
            Event::Start(e) | Event::Empty(e)
                if in_sheets && e.local_name().as_ref() == b"sheet" =>
            {
                let attr_error =
                    |e: quick_xml::Error| ConvertError::NameMapLoad(format!("XML attribute error: {}", e));
                let name = attribute_value(&reader, &e, b"name").map_err(attr_error)?;
                let sheet_id = attribute_value(&reader, &e, b"sheetId").map_err(attr_error)?;
                let relationship_id = attribute_value(&reader, &e, b"id").map_err(attr_error)?;

                sheets.push(SheetDescriptor {
                    name: name.unwrap_or_default(),
                    sheet_id: sheet_id.and_then(|id| id.trim().parse().ok()),
                    relationship_id,
                });
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

/// `<Relationships>`配下の`<Relationship>`要素を取り出す
pub(crate) fn parse_relationships<B: BufRead>(input: B) -> Result<Vec<Relationship>, ConvertError> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut relationships = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            ConvertError::NameMapLoad(format!(
                "XML parse error in relationships at position {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let attr_error = |e: quick_xml::Error| {
                    ConvertError::NameMapLoad(format!("XML attribute error: {}", e))
                };
                let id = attribute_value(&reader, &e, b"Id").map_err(attr_error)?;
                let kind = attribute_value(&reader, &e, b"Type").map_err(attr_error)?;
                let target = attribute_value(&reader, &e, b"Target").map_err(attr_error)?;

                if let (Some(id), Some(target)) = (id, target) {
                    relationships.push(Relationship {
                        id,
                        kind: kind.unwrap_or_default(),
                        target,
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

/// リレーションシップのTargetをZIPメンバー名に解決する
///
/// 相対パスは`xl/`からの相対として扱い、`/`始まりはパッケージルートからの絶対パスとして扱います。
pub(crate) fn resolve_target(target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"
          xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <workbookPr/>
  <sheets>
    <sheet name="Ventas" sheetId="1" r:id="rId1"/>
    <sheet name="Compras &amp; Gastos" sheetId="3" r:id="rId2"/>
  </sheets>
  <definedNames><definedName name="sheet">Ventas!$A$1</definedName></definedNames>
</workbook>"#;

    #[test]
    fn test_parse_workbook_sheets() {
        let sheets = parse_workbook_sheets(WORKBOOK_XML.as_bytes()).unwrap();
        assert_eq!(
            sheets,
            vec![
                SheetDescriptor {
                    name: "Ventas".to_string(),
                    sheet_id: Some(1),
                    relationship_id: Some("rId1".to_string()),
                },
                SheetDescriptor {
                    name: "Compras & Gastos".to_string(),
                    sheet_id: Some(3),
                    relationship_id: Some("rId2".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_sheet_name_map() {
        let sheets = parse_workbook_sheets(WORKBOOK_XML.as_bytes()).unwrap();
        let map = sheet_name_map(&sheets);
        assert_eq!(map.get(1), Some("Ventas"));
        assert_eq!(map.get(3), Some("Compras & Gastos"));
        assert_eq!(map.get(2), None);
    }

    #[test]
    fn test_malformed_workbook_is_name_map_error() {
        let result = parse_workbook_sheets("<workbook><sheets><sheet name=\"a\"></sheets>".as_bytes());
        assert!(matches!(result, Err(ConvertError::NameMapLoad(_))));
    }

    #[test]
    fn test_parse_relationships() {
        let xml = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/data.xml"/>
</Relationships>"#;
        let rels = parse_relationships(xml.as_bytes()).unwrap();
        assert_eq!(rels.len(), 3);
        assert!(!rels[0].is_worksheet());
        assert!(rels[1].is_worksheet());
        assert_eq!(rels[2].target, "/xl/worksheets/data.xml");
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
        assert_eq!(resolve_target("./worksheets/sheet3.xml"), "xl/worksheets/sheet3.xml");
        assert_eq!(resolve_target("../xl/worksheets/sheet4.xml"), "xl/worksheets/sheet4.xml");
    }
}
