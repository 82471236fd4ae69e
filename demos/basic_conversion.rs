//! Basic Conversion Example
//!
//! Converts every sheet of a workbook into its own CSV file using the default
//! settings (`;` delimiter, width taken from the first row).
//!
//! # Usage
//!
//! ```bash
//! cargo run --example basic_conversion -- input.xlsx output_dir
//! ```
//!
//! Without arguments, a small two-sheet workbook is generated in memory and
//! written to `demo_output/`.

use rust_xlsxwriter::Workbook;
use std::io::Cursor;
use xlsxcsv::{ConversionReport, ConverterBuilder};

fn sample_workbook() -> Result<Vec<u8>, rust_xlsxwriter::XlsxError> {
    let mut workbook = Workbook::new();

    let ventas = workbook.add_worksheet();
    ventas.set_name("Ventas")?;
    ventas.write_string(0, 0, "producto")?;
    ventas.write_string(0, 1, "unidades")?;
    ventas.write_string(1, 0, "mesa")?;
    ventas.write_number(1, 1, 4.0)?;
    ventas.write_string(2, 0, "silla; plegable")?;
    ventas.write_number(2, 1, 12.0)?;

    let stock = workbook.add_worksheet();
    stock.set_name("Stock")?;
    stock.write_string(0, 0, "almacen")?;
    stock.write_string(1, 0, "norte")?;

    workbook.save_to_buffer()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let input_path = std::env::args().nth(1);
    let output_dir = std::env::args()
        .nth(2)
        .unwrap_or_else(|| "demo_output".to_string());

    // Create a converter with default settings
    let converter = ConverterBuilder::new().build()?;

    let report: ConversionReport = match &input_path {
        Some(path) => {
            println!("Converting {} into {}/...", path, output_dir);
            converter.convert_path(path, &output_dir)
        }
        None => {
            println!("No input given, converting a generated sample into {}/...", output_dir);
            converter.convert_reader(Cursor::new(sample_workbook()?), &output_dir)
        }
    };

    for sheet in &report.sheets {
        println!(
            "  {} -> {} ({} rows, {} KB)",
            sheet.name, sheet.path, sheet.rows, sheet.size_kb
        );
    }

    match &report.error {
        Some(error) => {
            eprintln!("Conversion failed: {}", error);
            std::process::exit(1);
        }
        None => println!(
            "Converted {} rows in {} ms",
            report.total_rows, report.total_time_ms
        ),
    }

    Ok(())
}
