//! LabsDB auditor.
//!
//! Connects to every configured replica host, compares its databases, tables
//! and public views against the declared model and writes a report.
//!
//! # Security Guarantees
//! - Read-only metadata statements only
//! - The password is read from `MYSQL_PWD` and never logged

use clap::Parser;
use labsdb_auditor::{Cli, Command, load, run_audit, run_bootstrap};
use labsdb_auditor_core::{AuditConfig, Connector, Result, logging::init_logging};
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(
        cli.verbosity(),
        cli.global.quiet,
        cli.global.log_file_path.as_deref(),
    )?;

    let (config, model) = load(&cli.global.config_file_path, cli.global.ignore_public_dbs)
        .map_err(|e| {
            error!("Failed to load configuration: {}", e);
            e
        })?;
    let connector = connector(&config)?;
    let output_path = cli.output_path();

    match cli.command() {
        Command::Audit => {
            let report = run_audit(config, model, connector.as_ref(), output_path)
                .await
                .map_err(|e| {
                    error!("Audit failed: {}", e);
                    e
                })?;
            if report.is_complete() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Bootstrap => {
            run_bootstrap(&config, &model, connector.as_ref(), output_path)
                .await
                .map_err(|e| {
                    error!("Bootstrap failed: {}", e);
                    e
                })?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(feature = "mysql")]
fn connector(config: &AuditConfig) -> Result<Box<dyn Connector>> {
    use labsdb_auditor_core::{MySqlConnector, MySqlCredentials};

    let credentials =
        MySqlCredentials::from_env(config.mysql_user.as_deref(), config.connect_timeout());
    Ok(Box::new(MySqlConnector::new(credentials)))
}

#[cfg(not(feature = "mysql"))]
fn connector(_config: &AuditConfig) -> Result<Box<dyn Connector>> {
    Err(labsdb_auditor_core::error::AuditorError::configuration(
        "MySQL support not compiled in. Compile with --features mysql",
    ))
}
