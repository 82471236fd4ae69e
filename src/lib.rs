//! xlsxcsv - Memory-bounded streaming converter from XLSX workbooks to CSV
//!
//! This crate converts every worksheet of an XLSX workbook into its own CSV file,
//! appending a trailing `sheet_name` column to every row, and returns a structured
//! report with per-sheet and aggregate statistics.
//!
//! Worksheets are streamed with an XML event reader, so memory use stays bounded by
//! a single row regardless of sheet size. Only the shared-string pool and the
//! workbook sheet map are held in memory for the whole run.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use xlsxcsv::ConverterBuilder;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create a converter with default settings (`;` delimiter)
//!     let converter = ConverterBuilder::new().build()?;
//!
//!     // Convert every sheet into out/<sheet name>.csv
//!     let report = converter.convert_path("ventas.xlsx", "out");
//!
//!     println!("{}", report.to_json_pretty()?);
//!     Ok(())
//! }
//! ```
//!
//! # Custom Configuration
//!
//! ```rust,no_run
//! use xlsxcsv::{ConverterBuilder, MissingStringPolicy, SheetDiscovery, WidthPolicy};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = ConverterBuilder::new()
//!         .with_delimiter(',')
//!         .with_width_policy(WidthPolicy::Prescan) // widest row instead of header width
//!         .with_missing_string_policy(MissingStringPolicy::Reject)
//!         .with_sheet_discovery(SheetDiscovery::Relationships) // workbook order
//!         .build()?;
//!
//!     let report = converter.convert_path("ventas.xlsx", "out");
//!     if !report.success {
//!         eprintln!("{}", report.error.unwrap_or_default());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Streaming a Single Worksheet
//!
//! ```rust
//! use xlsxcsv::{SharedStringPool, SheetRows};
//!
//! let xml = r#"<worksheet><sheetData><row r="1"><c r="A1"><v>1</v></c></row></sheetData></worksheet>"#;
//! let pool = SharedStringPool::new();
//! for row in SheetRows::new(xml.as_bytes(), &pool, "Sheet1") {
//!     let row = row.unwrap();
//!     assert_eq!(row, ["1", "sheet_name"]);
//! }
//! ```

mod api;
mod builder;
mod container;
mod error;
mod output;
mod parser;
mod security;
mod types;

// 公開API
pub use api::{MissingStringPolicy, SheetDiscovery, WidthPolicy};
pub use builder::{Converter, ConverterBuilder, DEFAULT_DELIMITER, DEFAULT_PROGRESS_INTERVAL};
pub use error::ConvertError;
pub use output::{sanitize_file_stem, CsvSink, OutputNamer};
pub use parser::{column_index, prescan_width, SheetRows, HEADER_MARKER};
pub use security::SecurityConfig;
pub use types::{ConversionReport, SharedStringPool, SheetConversionResult, SheetNameMap};
