//! The connect, login, list smoke test against an FTP server.
//!
//! Every step is checked once. The first failing step ends the run, except
//! setting the passive-address option, which only warns. Once connected the
//! session is closed on every path.

use std::fmt;

use anyhow::anyhow;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{ListingMode, ProbeConfig};
use crate::session::FtpSession;
use crate::types::{Reply, SessionOption};

/// One step of the probe, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStep {
    Connect,
    SetOption,
    Login,
    ChangeDirectory,
    PassiveMode,
    TransferType,
    List,
}

impl ProbeStep {
    /// The diagnostic printed when this step fails
    pub fn failure_message(self) -> &'static str {
        match self {
            ProbeStep::Connect => "Could not connect to FTP server",
            ProbeStep::SetOption => "Could not set FTP option",
            ProbeStep::Login => "Could not login to server",
            ProbeStep::ChangeDirectory => "Could not change directory",
            ProbeStep::PassiveMode => "Could not set passive mode",
            ProbeStep::TransferType => "Could not execute TYPE command",
            ProbeStep::List => "Could not run LIST",
        }
    }
}

impl fmt::Display for ProbeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProbeStep::Connect => "connect",
            ProbeStep::SetOption => "set option",
            ProbeStep::Login => "login",
            ProbeStep::ChangeDirectory => "change directory",
            ProbeStep::PassiveMode => "passive mode",
            ProbeStep::TransferType => "transfer type",
            ProbeStep::List => "list",
        };
        f.write_str(name)
    }
}

/// The step that ended the probe and why
#[derive(Debug)]
pub struct ProbeFailure {
    pub step: ProbeStep,
    pub error: anyhow::Error,
}

/// What happened during one probe run
#[derive(Debug, Default)]
pub struct ProbeReport {
    pub welcome: Option<Reply>,
    pub completed: Vec<ProbeStep>,
    /// Steps that failed without ending the run
    pub warnings: Vec<ProbeStep>,
    pub failure: Option<ProbeFailure>,
    /// The LIST response, one entry per line
    pub listing: Vec<String>,
}

impl ProbeReport {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    pub fn exit_code(&self) -> u8 {
        if self.succeeded() { 0 } else { 1 }
    }
}

/// Runs the probe against the server named in `config`
pub async fn run(config: &ProbeConfig) -> ProbeReport {
    let mut report = ProbeReport::default();

    let mut session =
        match FtpSession::connect(&config.host, config.port, config.timeout()).await {
            Ok(session) => session,
            Err(e) => {
                fail(&mut report, ProbeStep::Connect, e.into());
                return report;
            }
        };
    report.welcome = Some(session.welcome().clone());
    report.completed.push(ProbeStep::Connect);

    if let Err((step, e)) = steps(&mut session, config, &mut report).await {
        fail(&mut report, step, e);
    }

    if let Err(e) = session.close().await {
        warn!("Failed to close session cleanly: {}", e);
    }
    report
}

async fn steps(
    session: &mut FtpSession,
    config: &ProbeConfig,
    report: &mut ProbeReport,
) -> Result<(), (ProbeStep, anyhow::Error)> {
    match session.set_option(SessionOption::UsePasvAddress(config.use_pasv_address)) {
        Ok(()) => report.completed.push(ProbeStep::SetOption),
        Err(e) => {
            warn!("{}: {}", ProbeStep::SetOption.failure_message(), e);
            report.warnings.push(ProbeStep::SetOption);
        }
    }

    session
        .login(&config.user, &config.password)
        .await
        .map_err(|e| (ProbeStep::Login, anyhow::Error::from(e)))?;
    report.completed.push(ProbeStep::Login);

    session
        .chdir(&config.directory)
        .await
        .map_err(|e| (ProbeStep::ChangeDirectory, anyhow::Error::from(e)))?;
    report.completed.push(ProbeStep::ChangeDirectory);

    session
        .set_passive(config.passive)
        .await
        .map_err(|e| (ProbeStep::PassiveMode, anyhow::Error::from(e)))?;
    report.completed.push(ProbeStep::PassiveMode);

    let reply = session
        .raw(&config.type_command)
        .await
        .map_err(|e| (ProbeStep::TransferType, anyhow::Error::from(e)))?;
    info!("{} answered with {}", config.type_command, reply);
    report.completed.push(ProbeStep::TransferType);

    let listing = match config.listing {
        ListingMode::Raw => session.raw("LIST").await.map(|reply| reply.lines),
        ListingMode::Data => session.list(None).await,
    }
    .map_err(|e| (ProbeStep::List, anyhow::Error::from(e)))?;
    if listing.is_empty() {
        return Err((ProbeStep::List, anyhow!("server sent an empty listing")));
    }
    report.listing = listing;
    report.completed.push(ProbeStep::List);
    Ok(())
}

fn fail(report: &mut ProbeReport, step: ProbeStep, error: anyhow::Error) {
    error!("{} failed: {:#}", step, error);
    report.failure = Some(ProbeFailure { step, error });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_follows_failure() {
        let mut report = ProbeReport::default();
        assert_eq!(report.exit_code(), 0);

        report.failure = Some(ProbeFailure {
            step: ProbeStep::Login,
            error: anyhow!("530 Not logged in"),
        });
        assert_eq!(report.exit_code(), 1);
        assert!(!report.succeeded());
    }

    #[test]
    fn failure_messages() {
        assert_eq!(
            ProbeStep::Connect.failure_message(),
            "Could not connect to FTP server"
        );
        assert_eq!(ProbeStep::List.failure_message(), "Could not run LIST");
        assert_eq!(ProbeStep::ChangeDirectory.to_string(), "change directory");
    }

    #[tokio::test]
    async fn unreachable_server_fails_at_connect() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = ProbeConfig {
            host: "127.0.0.1".to_string(),
            port,
            timeout_secs: 2,
            ..ProbeConfig::default()
        };
        let report = run(&config).await;

        assert_eq!(report.exit_code(), 1);
        assert!(report.completed.is_empty());
        assert_eq!(report.failure.unwrap().step, ProbeStep::Connect);
    }
}
