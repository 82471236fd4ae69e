//! Public API Types
//!
//! 公開APIで使用する列挙型を定義するモジュール。

/// 行幅（列数）の決定方式
///
/// 各シートの出力行は固定幅です。この列挙型は、その幅をどのように決めるかを指定します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum WidthPolicy {
    /// 最初に出現した行のセル数を幅とする（デフォルト）
    ///
    /// ヘッダー行より多くのセルを持つ後続行では、幅を超えた列が黙って切り捨てられます。
    /// シートを1回だけ読み込むため、最も高速です。
    #[default]
    FirstRow,

    /// シート全体を事前に走査し、最大の列位置を幅とする
    ///
    /// ワークシートパートを2回読み込みます（1回目は幅の計算のみ）。
    /// メモリ使用量は`FirstRow`と同じく1行分に制限されます。
    Prescan,
}

/// 共有文字列テーブルの範囲外参照の扱い
///
/// `t="s"`のセルが、共有文字列プールに存在しないインデックス
/// （または数値として解釈できない値）を参照している場合の動作を指定します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum MissingStringPolicy {
    /// セルの生の値（インデックス文字列）をそのまま出力する（デフォルト）
    #[default]
    Literal,

    /// 空文字列を出力する
    Empty,

    /// シートの変換をエラーとして中断する
    Reject,
}

/// ワークシートパートの検出方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum SheetDiscovery {
    /// 命名規則（`xl/worksheets/sheet<N>.xml`）に一致するメンバーを、
    /// ZIPアーカイブの格納順で処理する（デフォルト）
    ///
    /// シート名は`xl/workbook.xml`の`sheetId`と`<N>`を突き合わせて解決します。
    #[default]
    Convention,

    /// `xl/workbook.xml`で宣言された順に、
    /// `xl/_rels/workbook.xml.rels`のリレーションシップを辿ってワークシートを処理する
    ///
    /// リレーションシップパートが存在しない場合は`Convention`にフォールバックします。
    Relationships,
}
