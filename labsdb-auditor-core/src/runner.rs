//! Runs every registered report against every configured host.
//!
//! Hosts are processed one at a time. Each host gets exactly one
//! [`SchemaSource`], shared by all reports and closed before the next host is
//! contacted, whether the reports succeeded or not. A host that fails is
//! recorded with its error and the run moves on.

use crate::Result;
use crate::adapters::{Connector, SchemaSource};
use crate::config::{AuditConfig, DatabaseFilters, HostSpec};
use crate::models::Model;
use crate::reports::{NamedReport, ReportContext, ReportGenerator, default_generators};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info};

/// Reports of one host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostReport {
    /// `host:port`
    pub host: String,
    /// Why the host's reports are missing or incomplete
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub reports: Vec<NamedReport>,
}

impl HostReport {
    /// The report produced by the generator named `name`.
    pub fn report(&self, name: &str) -> Option<&crate::reports::Report> {
        self.reports.iter().find(|r| r.name == name).map(|r| &r.report)
    }
}

/// Complete output of one audit run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReport {
    pub generated_at: DateTime<Utc>,
    pub hosts: Vec<HostReport>,
}

impl AuditReport {
    /// Hosts that could not be fully audited.
    pub fn failed_hosts(&self) -> Vec<&str> {
        self.hosts
            .iter()
            .filter(|h| h.error.is_some())
            .map(|h| h.host.as_str())
            .collect()
    }

    /// True when every host was audited.
    pub fn is_complete(&self) -> bool {
        self.hosts.iter().all(|h| h.error.is_none())
    }
}

/// Orchestrates report generation over the configured hosts.
pub struct ReportRunner {
    config: AuditConfig,
    filters: DatabaseFilters,
    model: Model,
    generators: Vec<Box<dyn ReportGenerator>>,
}

impl std::fmt::Debug for ReportRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.generators.iter().map(|g| g.name()).collect();
        f.debug_struct("ReportRunner")
            .field("hosts", &self.config.hosts)
            .field("generators", &names)
            .finish_non_exhaustive()
    }
}

impl ReportRunner {
    /// Creates a runner without any report registered.
    ///
    /// # Errors
    /// Returns a configuration error when the database filters do not compile.
    pub fn new(config: AuditConfig, model: Model) -> Result<Self> {
        let filters = config.filters()?;
        Ok(Self {
            config,
            filters,
            model,
            generators: Vec::new(),
        })
    }

    /// Creates a runner with the standard reports registered.
    pub fn with_default_reports(config: AuditConfig, model: Model) -> Result<Self> {
        let mut runner = Self::new(config, model)?;
        for generator in default_generators() {
            runner.register_report(generator);
        }
        Ok(runner)
    }

    /// Appends a report generator; reports run in registration order.
    pub fn register_report(&mut self, generator: Box<dyn ReportGenerator>) {
        tracing::debug!("Registered report {}", generator.name());
        self.generators.push(generator);
    }

    /// Names of the registered reports.
    pub fn report_names(&self) -> Vec<&'static str> {
        self.generators.iter().map(|g| g.name()).collect()
    }

    /// Audits every configured host.
    ///
    /// # Errors
    /// Only configuration errors abort the run; host failures are recorded in
    /// the returned report.
    pub async fn run(&self, connector: &dyn Connector) -> Result<AuditReport> {
        let hosts = self.config.host_specs()?;
        let mut host_reports = Vec::with_capacity(hosts.len());

        for host in &hosts {
            info!("Auditing {}", host);
            let host_report = match self.run_host(connector, host).await {
                Ok(reports) => HostReport {
                    host: host.to_string(),
                    error: None,
                    reports,
                },
                Err(e) => {
                    error!("Audit of {} failed: {}", host, e);
                    HostReport {
                        host: host.to_string(),
                        error: Some(e.to_string()),
                        reports: Vec::new(),
                    }
                }
            };
            host_reports.push(host_report);
        }

        Ok(AuditReport {
            generated_at: Utc::now(),
            hosts: host_reports,
        })
    }

    async fn run_host(&self, connector: &dyn Connector, host: &HostSpec) -> Result<Vec<NamedReport>> {
        let source = connector.connect(host).await?;
        let result = self.run_reports(source.as_ref()).await;
        source.close().await;
        result
    }

    async fn run_reports(&self, source: &dyn SchemaSource) -> Result<Vec<NamedReport>> {
        let ctx = ReportContext {
            config: &self.config,
            filters: &self.filters,
            model: &self.model,
        };

        let mut reports = Vec::with_capacity(self.generators.len());
        for generator in &self.generators {
            let started = Instant::now();
            let report = generator.generate(&ctx, source).await?;
            info!(
                "Finished {} in {:.2}s",
                generator.name(),
                started.elapsed().as_secs_f64()
            );
            reports.push(NamedReport {
                name: generator.name().to_string(),
                report,
            });
        }
        Ok(reports)
    }
}
