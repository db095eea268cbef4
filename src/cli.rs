//! Command line front end of the probe.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use clap::error::ErrorKind;
use serde_json::json;

use crate::config::{ListingMode, ProbeConfig};
use crate::probe::{self, ProbeReport};

/// Log in to an FTP server, list a directory and dump the server's answer.
#[derive(Debug, Parser)]
#[command(name = "ftp-probe")]
#[command(about = "FTP smoke test: connect, log in, list a directory", long_about = None)]
pub struct Cli {
    /// JSON config file; flags given on the command line override it.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    /// Connect and reply timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    #[arg(long)]
    pub user: Option<String>,

    #[arg(long)]
    pub password: Option<String>,

    /// Directory to change into before listing.
    #[arg(long)]
    pub directory: Option<String>,

    /// Trust the address in PASV replies instead of the control peer address.
    #[arg(long, value_name = "BOOL")]
    pub use_pasv_address: Option<bool>,

    /// Use active mode (PORT) instead of passive mode.
    #[arg(long)]
    pub active: bool,

    /// Send LIST as a raw command or run it over a data connection.
    #[arg(long, value_enum)]
    pub listing: Option<ListingMode>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Log protocol progress to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Parses `args`, printing clap's message when that fails
    ///
    /// The error carries the exit status: 0 for `--help`, 1 for anything
    /// clap rejects.
    pub fn parse_args<I, T>(args: I) -> Result<Self, u8>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args).map_err(|err| {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            if let Err(e) = err.print() {
                eprintln!("ftp-probe error: {}", e);
            }
            code
        })
    }

    /// Builds the probe config: defaults, then the config file, then flags
    pub fn probe_config(&self) -> anyhow::Result<ProbeConfig> {
        let mut config = match &self.config {
            Some(path) => ProbeConfig::load(path)?,
            None => ProbeConfig::default(),
        };
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(user) = &self.user {
            config.user = user.clone();
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        if let Some(directory) = &self.directory {
            config.directory = directory.clone();
        }
        if let Some(use_pasv_address) = self.use_pasv_address {
            config.use_pasv_address = use_pasv_address;
        }
        if self.active {
            config.passive = false;
        }
        if let Some(listing) = self.listing {
            config.listing = listing;
        }
        config.validate()?;
        Ok(config)
    }

    /// Runs the probe, prints its report and returns the process exit code
    pub async fn run(&self) -> anyhow::Result<u8> {
        let config = self.probe_config()?;
        let report = probe::run(&config).await;

        let mut stdout = io::stdout().lock();
        stdout.write_all(self.render(&report)?.as_bytes())?;
        stdout.flush()?;
        Ok(report.exit_code())
    }

    /// Formats the report for stdout
    pub fn render(&self, report: &ProbeReport) -> anyhow::Result<String> {
        if self.json {
            let failure = report.failure.as_ref().map(|failure| {
                json!({
                    "step": failure.step,
                    "message": failure.step.failure_message(),
                    "error": format!("{:#}", failure.error),
                })
            });
            let value = json!({
                "welcome": report.welcome,
                "completed": report.completed,
                "warnings": report.warnings,
                "failure": failure,
                "listing": report.listing,
            });
            return Ok(serde_json::to_string_pretty(&value)? + "\n");
        }

        let mut out = String::new();
        for step in &report.warnings {
            out.push_str(step.failure_message());
            out.push('\n');
        }
        match &report.failure {
            Some(failure) => {
                out.push_str(failure.step.failure_message());
                out.push('\n');
            }
            None => {
                for line in &report.listing {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        Ok(out)
    }
}
