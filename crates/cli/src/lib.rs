pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::commands::export::ExportFormat;

#[derive(Debug, Parser)]
#[command(
    name = "magalia",
    about = "Magalia operator CLI",
    long_about = "Apply migrations, inspect configuration, and reprice or export stored quotes.",
    after_help = concat!(
        "Examples:\n",
        "  magalia migrate\n",
        "  magalia reprice --quote-id 12 --persist\n",
        "  magalia export --quote-id 12 --format excel --out quote.xlsx"
    )
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Recompute the totals of a stored quote")]
    Reprice {
        #[arg(long, help = "Identifier of the quote to price")]
        quote_id: i64,
        #[arg(long, help = "Write the recomputed totals back to the database")]
        persist: bool,
    },
    #[command(about = "Render a stored quote as a Word itinerary or an Excel workbook")]
    Export {
        #[arg(long, help = "Identifier of the quote to export")]
        quote_id: i64,
        #[arg(long, value_enum, default_value_t = ExportFormat::Word)]
        format: ExportFormat,
        #[arg(long, help = "Destination file (defaults to quote_<id>.<ext>)")]
        out: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Reprice { quote_id, persist } => commands::reprice::run(quote_id, persist),
        Command::Export { quote_id, format, out } => {
            commands::export::run(quote_id, format, out)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
