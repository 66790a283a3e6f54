//! The `audit` and `bootstrap` commands.

use crate::bootstrap::{bootstrap_hosts, dblists_path};
use crate::output::write_output;
use labsdb_auditor_core::{AuditConfig, AuditReport, Connector, Model, ReportRunner, Result};
use std::path::Path;
use tracing::{error, info};

/// Loads the configuration and the declared model.
///
/// With `ignore_public_dbs` the model carries no public databases.
pub fn load(config_path: &Path, ignore_public_dbs: bool) -> Result<(AuditConfig, Model)> {
    info!("Loading configuration from {}", config_path.display());
    let config = AuditConfig::load(config_path)?;
    let model = config.load_model(ignore_public_dbs)?;
    Ok((config, model))
}

/// Audits every host and writes the report to `output_path`.
///
/// The report is written even when some hosts failed; the returned report
/// tells which ones.
pub async fn run_audit(
    config: AuditConfig,
    model: Model,
    connector: &dyn Connector,
    output_path: &Path,
) -> Result<AuditReport> {
    let runner = ReportRunner::with_default_reports(config, model)?;

    info!("Starting report generation");
    let report = runner.run(connector).await?;
    write_output(&report, output_path).await?;
    info!(
        "Finished report generation, output written to {}",
        output_path.display()
    );

    for host in report.failed_hosts() {
        error!("Host {} could not be audited", host);
    }
    Ok(report)
}

/// Reflects every configured host and writes a starting table schema.
///
/// The databases missing from the hosts, and those present but not
/// modelled, are written to a `dblists` file next to the schema.
pub async fn run_bootstrap(
    config: &AuditConfig,
    model: &Model,
    connector: &dyn Connector,
    output_path: &Path,
) -> Result<()> {
    let hosts = config.host_specs()?;
    let schema = bootstrap_hosts(connector, &hosts, model).await?;

    write_output(&schema.to_table_defs(), output_path).await?;
    let lists_path = dblists_path(output_path);
    write_output(&schema.dblists(), &lists_path).await?;
    info!(
        "Wrote {} table definitions to {} and database lists to {}",
        schema.tables.len(),
        output_path.display(),
        lists_path.display()
    );
    Ok(())
}
