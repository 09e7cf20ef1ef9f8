//! stmt2ofx - CLI tool converting bank statements (MT940, ZIP of MT940, CSV) to OFX.

use chrono::Utc;
use clap::{ArgAction, Parser};
use std::fs;
use std::io::{self, Read, Write};
use stmt2ofx::{
    conversion::{convert, ConversionOptions},
    ofx_file_name,
    ofx_format::default_server_time,
    Error, Format, Result, StatementDefaults,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "stmt2ofx")]
#[command(about = "Convert bank statements (MT940, ZIP of MT940, CSV) to OFX", long_about = None)]
struct Cli {
    /// Input file path (or stdin if not provided)
    #[arg(short, long)]
    input: Option<String>,

    /// Input format (mt940, zip, csv); guessed from the input extension if omitted
    #[arg(short, long)]
    format: Option<String>,

    /// Output file path (or stdout if not provided)
    #[arg(short, long)]
    output: Option<String>,

    /// Write the OFX file next to the input, replacing its extension with .ofx
    #[arg(long, conflicts_with = "output")]
    beside: bool,

    /// Bank identifier used when the source does not carry one
    #[arg(long = "bank-id")]
    bank_id: Option<String>,

    /// Account identifier used when the source does not carry one
    #[arg(long = "account-id")]
    account_id: Option<String>,

    /// Currency used when the source does not carry one
    #[arg(long)]
    currency: Option<String>,

    /// Report the current time as the OFX server time
    #[arg(long)]
    now: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}={}", env!("CARGO_CRATE_NAME"), level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let format = match (&cli.format, &cli.input) {
        (Some(format), _) => format.parse::<Format>()?,
        (None, Some(path)) => Format::from_path(path)?,
        (None, None) => {
            return Err(Error::MissingField(
                "--format is required when reading from stdin".to_string(),
            ))
        }
    };

    let input = if let Some(ref input_path) = cli.input {
        fs::read(input_path)?
    } else {
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        buffer
    };

    let options = build_options(&cli);
    tracing::info!(?format, bytes = input.len(), "converting statement");
    let ofx = convert(&input, format, &options)?;

    let output_path = match (&cli.output, &cli.input) {
        (Some(path), _) => Some(path.clone()),
        (None, Some(input_path)) if cli.beside => Some(ofx_file_name(input_path)),
        (None, None) if cli.beside => {
            return Err(Error::MissingField("--beside requires --input".to_string()))
        }
        _ => None,
    };

    // Output based on output file or stdout
    if let Some(path) = output_path {
        fs::write(&path, ofx.as_bytes())?;
        tracing::info!(output = %path, "wrote OFX document");
    } else {
        let mut stdout = io::stdout();
        stdout.write_all(ofx.as_bytes())?;
        stdout.flush()?;
    }

    Ok(())
}

fn build_options(cli: &Cli) -> ConversionOptions {
    let mut defaults = StatementDefaults::default();
    if let Some(ref bank_id) = cli.bank_id {
        defaults.bank_id = bank_id.clone();
    }
    if let Some(ref account_id) = cli.account_id {
        defaults.account_id = account_id.clone();
    }
    if let Some(ref currency) = cli.currency {
        defaults.currency = currency.to_uppercase();
    }

    ConversionOptions {
        defaults,
        server_time: if cli.now { Utc::now() } else { default_server_time() },
    }
}
