//! `pwsafe`: inspect PasswordSafe v3 vaults and export them to Bitwarden.
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::doc_markdown)]

mod bitwarden;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use pwsafe_core::vault::format::DEFAULT_MAX_ITERATIONS;
use pwsafe_core::{OpenOptions, Record, Vault};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

const PASSWORD_ENV: &str = "PWSAFE_PASSWORD";
const STDOUT_PATH: &str = "-";

#[derive(Parser, Debug)]
#[command(name = "pwsafe", version, about = "PasswordSafe v3 vault tools")]
struct Cli {
    /// Vault file to open
    #[arg(
        short = 'f',
        long = "file",
        env = "PWSAFE_FILE",
        default_value = "example.psafe3",
        global = true
    )]
    file: PathBuf,

    /// Largest key-stretching iteration count to accept
    #[arg(
        long,
        env = "PWSAFE_MAX_ITERATIONS",
        default_value_t = DEFAULT_MAX_ITERATIONS,
        global = true
    )]
    max_iterations: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the vault as a Bitwarden unencrypted JSON export
    Export {
        /// Output file, or `-` for stdout
        #[arg(short = 'o', long = "output", default_value = "bitwarden.json")]
        output: PathBuf,
    },
    /// List records (group, title, username)
    List {
        /// Print full records as JSON, passwords included
        #[arg(long)]
        json: bool,
    },
    /// Show header details and the record count
    Info,
}

fn main() -> ExitCode {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run(cli: &Cli) -> Result<()> {
    let options = OpenOptions::default().max_iterations(cli.max_iterations);
    let passphrase = read_passphrase()?;
    let vault = Vault::open_file(&cli.file, passphrase.as_bytes(), &options)
        .wrap_err_with(|| format!("failed to open {}", cli.file.display()))?;
    drop(passphrase);

    match &cli.command {
        Command::Export { output } => cmd_export(vault.records(), output),
        Command::List { json } => cmd_list(vault.records(), *json),
        Command::Info => {
            cmd_info(&cli.file, &vault);
            Ok(())
        }
    }
}

fn read_passphrase() -> Result<Zeroizing<String>> {
    if let Ok(passphrase) = std::env::var(PASSWORD_ENV) {
        debug!("using passphrase from {PASSWORD_ENV}");
        return Ok(Zeroizing::new(passphrase));
    }
    let passphrase =
        rpassword::prompt_password("Vault passphrase: ").wrap_err("failed to read passphrase")?;
    Ok(Zeroizing::new(passphrase))
}

fn cmd_export(records: &[Record], output: &Path) -> Result<()> {
    let export = bitwarden::from_records(records, Utc::now());
    let json = Zeroizing::new(serde_json::to_string(&export).wrap_err("failed to encode export")?);

    if output.as_os_str() == STDOUT_PATH {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(json.as_bytes())
            .and_then(|()| stdout.write_all(b"\n"))
            .wrap_err("failed to write export to stdout")?;
    } else {
        std::fs::write(output, json.as_bytes())
            .wrap_err_with(|| format!("failed to write {}", output.display()))?;
        eprintln!(
            "exported {} records to {}",
            export.item_count(),
            output.display()
        );
    }
    Ok(())
}

fn cmd_list(records: &[Record], json: bool) -> Result<()> {
    let mut stdout = std::io::stdout().lock();

    if json {
        let body = Zeroizing::new(
            serde_json::to_string_pretty(records).wrap_err("failed to encode records")?,
        );
        writeln!(stdout, "{}", body.as_str())?;
        return Ok(());
    }

    let group_width = column_width(records.iter().map(|r| r.group.as_str()), "GROUP");
    let title_width = column_width(records.iter().map(|r| r.title.as_str()), "TITLE");

    writeln!(
        stdout,
        "{:group_width$}  {:title_width$}  USERNAME",
        "GROUP", "TITLE"
    )?;
    for record in records {
        writeln!(
            stdout,
            "{:group_width$}  {:title_width$}  {}",
            record.group, record.title, record.username
        )?;
    }
    Ok(())
}

fn column_width<'a>(values: impl Iterator<Item = &'a str>, heading: &str) -> usize {
    values
        .map(|v| v.chars().count())
        .chain(std::iter::once(heading.len()))
        .max()
        .unwrap_or(0)
}

fn cmd_info(path: &Path, vault: &Vault) {
    let header = vault.header();
    println!("file:        {}", path.display());
    println!("format:      {}", String::from_utf8_lossy(&header.magic));
    println!("iterations:  {}", header.iterations);
    println!("salt:        {}", hex::encode(header.salt));
    println!("records:     {}", vault.records().len());
}
