//! ワークシートパートのストリーミング変換
//!
//! ワークシートXMLを1パスで読み込み、デコード済みの行を1行ずつ返すイテレーターを提供します。
//! 常に1行分のデータしかメモリに保持しないため、シートのサイズに依存せずメモリ使用量が一定です。
//! 行の書き込みと件数の集計は呼び出し側の責務です。

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::cell_ref::column_index;
use crate::api::MissingStringPolicy;
use crate::error::ConvertError;
use crate::types::{Cell, CellKind, SharedStringPool};

/// ヘッダー行の末尾列に入るリテラル
pub const HEADER_MARKER: &str = "sheet_name";

/// `<row>`探索中のイベント分類
enum Scan {
    RowOpened,
    RowEmpty,
    Eof,
    Skip,
}

/// ワークシートの行イテレーター
///
/// 状態遷移: 行待ち → 行内（セルを蓄積）→ 行待ち … → 終端（入力終了またはエラー）。
/// エラーを1度返した後は`None`を返し続けます。
///
/// 出力行の幅は、`with_width`で指定しない限り最初の行のセル数で固定されます。
/// すべての行は `幅 + 1` 個のフィールドを持ち、最後のフィールドには
/// ヘッダー行では`sheet_name`、データ行ではシート名が入ります。
///
/// # 使用例
///
/// ```rust
/// use xlsxcsv::{SharedStringPool, SheetRows};
///
/// let xml = r#"<worksheet><sheetData>
///   <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
///   <row r="2"><c r="A2"><v>10</v></c><c r="B2"><v>20</v></c></row>
/// </sheetData></worksheet>"#;
/// let pool = SharedStringPool::from(vec!["id".to_string(), "total".to_string()]);
///
/// let rows: Vec<Vec<String>> = SheetRows::new(xml.as_bytes(), &pool, "Ventas")
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(rows[0], ["id", "total", "sheet_name"]);
/// assert_eq!(rows[1], ["10", "20", "Ventas"]);
/// ```
pub struct SheetRows<'a, B: BufRead> {
    reader: Reader<B>,
    buf: Vec<u8>,
    pool: &'a SharedStringPool,
    sheet_name: &'a str,
    missing_strings: MissingStringPolicy,
    width: Option<usize>,
    rows_read: u64,
    depth: usize,
    finished: bool,
}

impl<'a, B: BufRead> SheetRows<'a, B> {
    /// ワークシートXMLのリーダーからイテレーターを生成
    ///
    /// # 引数
    ///
    /// * `input` - ワークシートXML（`xl/worksheets/sheetN.xml`）のリーダー
    /// * `pool` - 共有文字列プール
    /// * `sheet_name` - 末尾列に入れるシートの表示名（エラーメッセージにも使用）
    pub fn new(input: B, pool: &'a SharedStringPool, sheet_name: &'a str) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(false);
        Self {
            reader,
            buf: Vec::new(),
            pool,
            sheet_name,
            missing_strings: MissingStringPolicy::default(),
            width: None,
            rows_read: 0,
            depth: 0,
            finished: false,
        }
    }

    /// 範囲外の共有文字列参照の扱いを指定する
    pub fn with_missing_string_policy(mut self, policy: MissingStringPolicy) -> Self {
        self.missing_strings = policy;
        self
    }

    /// 行幅を事前に固定する（`prescan_width`の結果など）
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    /// 確定した行幅（最初の行を読むまでは`None`）
    pub fn width(&self) -> Option<usize> {
        self.width
    }

    /// これまでに読み込んだ行数
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    fn fail(&self, message: String) -> ConvertError {
        ConvertError::sheet_read(self.sheet_name, message)
    }

    /// 次の`<row>`要素を探し、そのセルを返す（入力終了時は`Ok(None)`）
    fn next_cells(&mut self) -> Result<Option<Vec<Cell>>, ConvertError> {
        let sheet = self.sheet_name;
        loop {
            let step = match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(e)) if e.local_name().as_ref() == b"row" => Scan::RowOpened,
                Ok(Event::Empty(e)) if e.local_name().as_ref() == b"row" => Scan::RowEmpty,
                Ok(Event::Start(_)) => {
                    self.depth += 1;
                    Scan::Skip
                }
                Ok(Event::End(_)) => {
                    self.depth = self.depth.saturating_sub(1);
                    Scan::Skip
                }
                Ok(Event::Eof) => Scan::Eof,
                Ok(_) => Scan::Skip,
                Err(e) => {
                    return Err(ConvertError::sheet_read(
                        sheet,
                        format!(
                            "XML parse error at position {}: {}",
                            self.reader.buffer_position(),
                            e
                        ),
                    ));
                }
            };
            self.buf.clear();

            match step {
                Scan::RowOpened => return self.read_row().map(Some),
                Scan::RowEmpty => return Ok(Some(Vec::new())),
                Scan::Eof if self.depth != 0 => {
                    return Err(self.fail("unexpected end of worksheet".to_string()));
                }
                Scan::Eof => return Ok(None),
                Scan::Skip => {}
            }
        }
    }

    /// 開始済みの`<row>`を`</row>`まで読み込む
    fn read_row(&mut self) -> Result<Vec<Cell>, ConvertError> {
        let mut buf = Vec::new();
        let mut cells = Vec::new();
        let mut current: Option<Cell> = None;
        let mut next_column = 0usize;
        let mut capturing = false;
        let mut in_inline = false;
        let mut phonetic_depth = 0usize;

        loop {
            let event = match self.reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(e) => {
                    let position = self.reader.buffer_position();
                    return Err(self.fail(format!("XML parse error at position {}: {}", position, e)));
                }
            };

            match event {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"c" => {
                        current = Some(self.start_cell(&e, next_column)?);
                    }
                    b"v" if current.is_some() && !in_inline => capturing = true,
                    b"is" if current.is_some() => in_inline = true,
                    b"rPh" if in_inline => phonetic_depth += 1,
                    b"t" if in_inline && phonetic_depth == 0 => capturing = true,
                    _ => {}
                },
                Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                    let cell = self.start_cell(&e, next_column)?;
                    if let Some(column) = cell.column {
                        next_column = column + 1;
                    }
                    cells.push(cell);
                }
                Event::Text(e) if capturing => {
                    let text = e
                        .unescape()
                        .map_err(|e| self.fail(format!("XML text error: {}", e)))?;
                    if let Some(cell) = current.as_mut() {
                        cell.value.push_str(&text);
                    }
                }
                Event::CData(e) if capturing => {
                    let text = self
                        .reader
                        .decoder()
                        .decode(&e)
                        .map_err(|e| self.fail(format!("XML text error: {}", e)))?;
                    if let Some(cell) = current.as_mut() {
                        cell.value.push_str(&text);
                    }
                }
                Event::End(e) => match e.local_name().as_ref() {
                    b"v" | b"t" => capturing = false,
                    b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                    b"is" => in_inline = false,
                    b"c" => {
                        if let Some(cell) = current.take() {
                            if let Some(column) = cell.column {
                                next_column = column + 1;
                            }
                            cells.push(cell);
                        }
                        capturing = false;
                        in_inline = false;
                    }
                    b"row" => return Ok(cells),
                    _ => {}
                },
                Event::Eof => {
                    return Err(self.fail("unexpected end of worksheet inside a row".to_string()));
                }
                _ => {}
            }
            buf.clear();
        }
    }

    /// `<c>`要素の属性から、値が空のセルを生成する
    ///
    /// `r`属性がない場合は、直前のセルの次の列に配置します。
    /// `r`属性があるが英字で始まらない場合、列は`None`になり、セルは破棄されます。
    fn start_cell(&self, element: &BytesStart<'_>, next_column: usize) -> Result<Cell, ConvertError> {
        let mut reference: Option<String> = None;
        let mut kind = CellKind::Literal;

        for attr in element.attributes() {
            let attr = attr.map_err(|e| self.fail(format!("XML attribute error: {}", e)))?;
            match attr.key.local_name().as_ref() {
                b"r" => {
                    let value = attr
                        .decode_and_unescape_value(&self.reader)
                        .map_err(|e| self.fail(format!("XML attribute error: {}", e)))?;
                    reference = Some(value.into_owned());
                }
                b"t" => {
                    let value = attr
                        .decode_and_unescape_value(&self.reader)
                        .map_err(|e| self.fail(format!("XML attribute error: {}", e)))?;
                    kind = CellKind::from_type_attr(&value);
                }
                _ => {}
            }
        }

        let column = match reference {
            Some(reference) => column_index(&reference),
            None => Some(next_column),
        };

        Ok(Cell {
            column,
            kind,
            value: String::new(),
        })
    }

    /// セルを固定幅の行に配置し、末尾列を設定する
    fn assemble(&mut self, cells: Vec<Cell>) -> Result<Vec<String>, ConvertError> {
        let is_header = self.rows_read == 0;
        let width = *self.width.get_or_insert(cells.len());

        let mut fields = vec![String::new(); width + 1];
        for cell in cells {
            let Some(column) = cell.column else {
                continue;
            };
            if column >= width {
                continue;
            }
            let value = self.resolve(cell)?;
            if let Some(slot) = fields.get_mut(column) {
                *slot = value;
            }
        }

        if let Some(last) = fields.last_mut() {
            *last = if is_header {
                HEADER_MARKER.to_string()
            } else {
                self.sheet_name.to_string()
            };
        }

        self.rows_read += 1;
        Ok(fields)
    }

    /// 共有文字列セルの値をプールの文字列に置き換える
    fn resolve(&self, cell: Cell) -> Result<String, ConvertError> {
        if cell.kind != CellKind::SharedString {
            return Ok(cell.value);
        }

        let entry = cell
            .value
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|index| self.pool.get(index));
        if let Some(entry) = entry {
            return Ok(entry.to_string());
        }

        match self.missing_strings {
            MissingStringPolicy::Literal => Ok(cell.value),
            MissingStringPolicy::Empty => Ok(String::new()),
            MissingStringPolicy::Reject => Err(self.fail(format!(
                "shared string reference '{}' is out of range (pool size {})",
                cell.value,
                self.pool.len()
            ))),
        }
    }
}

impl<'a, B: BufRead> Iterator for SheetRows<'a, B> {
    type Item = Result<Vec<String>, ConvertError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let result = match self.next_cells() {
            Ok(Some(cells)) => self.assemble(cells),
            Ok(None) => {
                self.finished = true;
                return None;
            }
            Err(e) => Err(e),
        };

        if result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}

/// シート全体を走査し、最大の列位置（インデックス + 1）を返す
///
/// 共有文字列の解決は行いません。`WidthPolicy::Prescan`の1回目の読み込みで使用します。
pub fn prescan_width<B: BufRead>(input: B, sheet_name: &str) -> Result<usize, ConvertError> {
    let pool = SharedStringPool::new();
    let mut rows = SheetRows::new(input, &pool, sheet_name);
    let mut width = 0usize;

    while let Some(cells) = rows.next_cells()? {
        let row_width = cells
            .iter()
            .filter_map(|cell| cell.column)
            .map(|column| column + 1)
            .max()
            .unwrap_or(0);
        width = width.max(row_width);
    }

    Ok(width)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(values: &[&str]) -> SharedStringPool {
        SharedStringPool::from(values.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    fn sheet(rows: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1:C3"/><sheetData>{}</sheetData><pageMargins left="0.7"/></worksheet>"#,
            rows
        )
    }

    fn collect(xml: &str, pool: &SharedStringPool, name: &str) -> Vec<Vec<String>> {
        SheetRows::new(xml.as_bytes(), pool, name)
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_header_and_data_rows() {
        let xml = sheet(
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="s"><v>2</v></c></row>
<row r="2"><c r="A2"><v>1</v></c><c r="B2"><v>2</v></c><c r="C2"><v>3</v></c></row>"#,
        );
        let rows = collect(&xml, &pool(&["A", "B", "C"]), "Sheet1");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], ["A", "B", "C", "sheet_name"]);
        assert_eq!(rows[1], ["1", "2", "3", "Sheet1"]);
    }

    #[test]
    fn test_width_fixed_at_first_row() {
        let xml = sheet(
            r#"<row r="1"><c r="A1"><v>h1</v></c><c r="B1"><v>h2</v></c></row>
<row r="2"><c r="A2"><v>1</v></c><c r="B2"><v>2</v></c><c r="C2"><v>3</v></c><c r="D2"><v>4</v></c></row>
<row r="3"><c r="B3"><v>x</v></c></row>"#,
        );
        let rows = collect(&xml, &SharedStringPool::new(), "S");

        assert!(rows.iter().all(|row| row.len() == 3));
        // 幅を超えたセルは破棄
        assert_eq!(rows[1], ["1", "2", "S"]);
        // 欠けたセルは空フィールド
        assert_eq!(rows[2], ["", "x", "S"]);
    }

    #[test]
    fn test_first_row_counts_cells_not_positions() {
        // 最初の行はA1とC1の2セル → 幅2、C列は幅の外
        let xml = sheet(r#"<row r="1"><c r="A1"><v>a</v></c><c r="C1"><v>c</v></c></row>"#);
        let rows = collect(&xml, &SharedStringPool::new(), "S");
        assert_eq!(rows[0], ["a", "", "sheet_name"]);
    }

    #[test]
    fn test_empty_rows_are_counted() {
        let xml = sheet(
            r#"<row r="1"><c r="A1"><v>a</v></c></row><row r="2"/><row r="3" spans="1:1"></row>"#,
        );
        let pool = SharedStringPool::new();
        let mut rows = SheetRows::new(xml.as_bytes(), &pool, "S");
        let collected: Vec<_> = rows.by_ref().collect::<Result<_, _>>().unwrap();

        assert_eq!(rows.rows_read(), 3);
        assert_eq!(collected[1], ["", "S"]);
        assert_eq!(collected[2], ["", "S"]);
    }

    #[test]
    fn test_empty_sheet_has_no_rows() {
        let xml = r#"<worksheet><sheetData/></worksheet>"#;
        let rows = collect(xml, &SharedStringPool::new(), "S");
        assert!(rows.is_empty());
    }

    #[test]
    fn test_missing_reference_uses_next_position() {
        let xml = sheet(r#"<row><c><v>a</v></c><c r="C1"><v>c</v></c><c><v>d</v></c></row>"#);
        let rows = SheetRows::new(xml.as_bytes(), &SharedStringPool::new(), "S")
            .with_width(4)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(rows[0], ["a", "", "c", "d", "sheet_name"]);
    }

    #[test]
    fn test_malformed_reference_is_dropped() {
        let xml = sheet(r#"<row r="1"><c r="1A"><v>bad</v></c><c r="B1"><v>ok</v></c></row>"#);
        let rows = collect(&xml, &SharedStringPool::new(), "S");
        assert_eq!(rows[0], ["", "ok", "sheet_name"]);
    }

    #[test]
    fn test_inline_strings_and_formulas() {
        let xml = sheet(
            r#"<row r="1"><c r="A1" t="inlineStr"><is><t>inline</t></is></c><c r="B1"><f>1+1</f><v>2</v></c><c r="C1" t="b"><v>1</v></c></row>"#,
        );
        let rows = collect(&xml, &SharedStringPool::new(), "S");
        assert_eq!(rows[0], ["inline", "2", "1", "sheet_name"]);
    }

    #[test]
    fn test_values_are_unescaped_and_whitespace_kept() {
        let xml = sheet(r#"<row r="1"><c r="A1" t="str"><v> a &amp; b </v></c></row>"#);
        let rows = collect(&xml, &SharedStringPool::new(), "S");
        assert_eq!(rows[0][0], " a & b ");
    }

    #[test]
    fn test_missing_string_policies() {
        let xml = sheet(
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>7</v></c></row>"#,
        );
        let strings = pool(&["known"]);

        let literal = collect(&xml, &strings, "S");
        assert_eq!(literal[0], ["known", "7", "sheet_name"]);

        let empty = SheetRows::new(xml.as_bytes(), &strings, "S")
            .with_missing_string_policy(MissingStringPolicy::Empty)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(empty[0], ["known", "", "sheet_name"]);

        let rejected = SheetRows::new(xml.as_bytes(), &strings, "S")
            .with_missing_string_policy(MissingStringPolicy::Reject)
            .collect::<Result<Vec<_>, _>>();
        match rejected {
            Err(ConvertError::SheetRead { sheet, message }) => {
                assert_eq!(sheet, "S");
                assert!(message.contains("out of range"));
            }
            other => panic!("Expected SheetRead error, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_sheet_is_error() {
        let xml = r#"<worksheet><sheetData><row r="1"><c r="A1"><v>1</v></c></row><row r="2"><c r="A2"><v>2"#;
        let pool = SharedStringPool::new();
        let mut rows = SheetRows::new(xml.as_bytes(), &pool, "Datos");

        assert!(matches!(rows.next(), Some(Ok(_))));
        match rows.next() {
            Some(Err(ConvertError::SheetRead { sheet, .. })) => assert_eq!(sheet, "Datos"),
            other => panic!("Expected SheetRead error, got {:?}", other),
        }
        // エラー後は終端
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_truncated_after_complete_rows_is_error() {
        let xml = r#"<worksheet><sheetData><row r="1"><c r="A1"><v>1</v></c></row>"#;
        let result: Result<Vec<_>, _> =
            SheetRows::new(xml.as_bytes(), &SharedStringPool::new(), "S").collect();
        assert!(matches!(result, Err(ConvertError::SheetRead { .. })));
    }

    #[test]
    fn test_mismatched_tags_are_error() {
        let xml = r#"<worksheet><sheetData><row r="1"><c r="A1"><v>1</c></row></sheetData></worksheet>"#;
        let result: Result<Vec<_>, _> =
            SheetRows::new(xml.as_bytes(), &SharedStringPool::new(), "S").collect();
        assert!(matches!(result, Err(ConvertError::SheetRead { .. })));
    }

    #[test]
    fn test_prescan_width_uses_widest_row() {
        let xml = sheet(
            r#"<row r="1"><c r="A1"><v>h</v></c></row>
<row r="2"><c r="A2"><v>1</v></c><c r="E2"><v>5</v></c></row>
<row r="3"><c r="B3"><v>2</v></c></row>"#,
        );
        let width = prescan_width(xml.as_bytes(), "S").unwrap();
        assert_eq!(width, 5);

        let rows = SheetRows::new(xml.as_bytes(), &SharedStringPool::new(), "S")
            .with_width(width)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert!(rows.iter().all(|row| row.len() == 6));
        assert_eq!(rows[0], ["h", "", "", "", "", "sheet_name"]);
        assert_eq!(rows[1], ["1", "", "", "", "5", "S"]);
    }
}
