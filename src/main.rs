use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing_subscriber::prelude::*;
use xlsxcsv::{
    ConversionReport, ConverterBuilder, MissingStringPolicy, SheetDiscovery, WidthPolicy,
    DEFAULT_PROGRESS_INTERVAL,
};

#[derive(Parser)]
#[command(name = "xlsxcsv")]
#[command(about = "Convert every sheet of an XLSX workbook into its own CSV file")]
#[command(version)]
struct Cli {
    /// Path to the XLSX workbook
    #[arg(long, value_name = "PATH")]
    input: PathBuf,

    /// Directory for the CSV files (created if missing)
    #[arg(long, value_name = "DIR")]
    output: PathBuf,

    /// Field delimiter, a single ASCII character
    #[arg(long, default_value = ";", value_parser = parse_delimiter)]
    delimiter: char,

    /// How the column count of each sheet is decided
    #[arg(long, value_enum, default_value = "first-row")]
    width_policy: WidthArg,

    /// What to write when a cell references a missing shared string
    #[arg(long, value_enum, default_value = "literal")]
    missing_strings: MissingStringsArg,

    /// How worksheet parts are found and ordered
    #[arg(long, value_enum, default_value = "convention")]
    discovery: DiscoveryArg,

    /// Log a progress line every N rows
    #[arg(long, value_name = "N", default_value_t = DEFAULT_PROGRESS_INTERVAL,
          value_parser = clap::value_parser!(u64).range(1..))]
    progress_every: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum WidthArg {
    /// Cell count of the first row
    FirstRow,
    /// Widest row of the sheet (reads each sheet twice)
    Prescan,
}

#[derive(Clone, Copy, ValueEnum)]
enum MissingStringsArg {
    /// Keep the raw index text
    Literal,
    /// Write an empty field
    Empty,
    /// Fail the conversion
    Reject,
}

#[derive(Clone, Copy, ValueEnum)]
enum DiscoveryArg {
    /// xl/worksheets/sheet<N>.xml in archive order
    Convention,
    /// Declared workbook order through relationships
    Relationships,
}

impl From<WidthArg> for WidthPolicy {
    fn from(arg: WidthArg) -> Self {
        match arg {
            WidthArg::FirstRow => WidthPolicy::FirstRow,
            WidthArg::Prescan => WidthPolicy::Prescan,
        }
    }
}

impl From<MissingStringsArg> for MissingStringPolicy {
    fn from(arg: MissingStringsArg) -> Self {
        match arg {
            MissingStringsArg::Literal => MissingStringPolicy::Literal,
            MissingStringsArg::Empty => MissingStringPolicy::Empty,
            MissingStringsArg::Reject => MissingStringPolicy::Reject,
        }
    }
}

impl From<DiscoveryArg> for SheetDiscovery {
    fn from(arg: DiscoveryArg) -> Self {
        match arg {
            DiscoveryArg::Convention => SheetDiscovery::Convention,
            DiscoveryArg::Relationships => SheetDiscovery::Relationships,
        }
    }
}

fn parse_delimiter(value: &str) -> Result<char, String> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c),
        _ => Err(format!(
            "expected exactly one ASCII character, got {:?}",
            value
        )),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // 引数エラーも致命的エラーとして終了コード1で返す
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let report = match ConverterBuilder::new()
        .with_delimiter(cli.delimiter)
        .with_width_policy(cli.width_policy.into())
        .with_missing_string_policy(cli.missing_strings.into())
        .with_sheet_discovery(cli.discovery.into())
        .with_progress_interval(cli.progress_every)
        .build()
    {
        Ok(converter) => converter.convert_path(&cli.input, &cli.output),
        Err(e) => ConversionReport::failed(&e),
    };

    match report.to_json_pretty() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            tracing::error!(error = %e, "cannot serialize report");
            return ExitCode::FAILURE;
        }
    }

    if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
