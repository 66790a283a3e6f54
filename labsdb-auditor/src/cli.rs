//! Command line interface definition.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Default report path of the `audit` command.
pub const DEFAULT_REPORT_PATH: &str = "report.yaml";
/// Default schema path of the `bootstrap` command.
pub const DEFAULT_SCHEMA_PATH: &str = "tableschema.yaml";

#[derive(Debug, Parser)]
#[command(name = "labsdb-auditor")]
#[command(about = "Audit LabsDB replica hosts against their declared model")]
#[command(version)]
#[command(long_about = "
LabsDB Auditor - verify that replica hosts are as clean as they should be

For every configured host the auditor reports:
- databases that exist but are not modelled, and modelled ones that are missing
- tables in modelled databases that the model does not know about
- public views whose redaction differs from the declared table schema

Only metadata statements are issued and sessions are read-only. The MySQL
password is taken from the MYSQL_PWD environment variable.

EXAMPLES:
  labsdb-auditor --config-file-path config.yaml --output-file-path report.yaml
  labsdb-auditor --ignore-public-dbs --output-file-path sanitarium.json
  labsdb-auditor bootstrap --output-file-path tableschema.yaml
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Audit every configured host (default)
    Audit,
    /// Write a starting table schema and dblists from every configured host
    Bootstrap,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Configuration file
    #[arg(
        long,
        global = true,
        env = "LABSDB_AUDITOR_CONFIG",
        default_value = "config.yaml",
        help = "Path to config file"
    )]
    pub config_file_path: PathBuf,

    /// Output file
    #[arg(
        long,
        global = true,
        help = "Path to output file (.yaml or .json); defaults to report.yaml, or tableschema.yaml for bootstrap"
    )]
    pub output_file_path: Option<PathBuf>,

    /// Log file
    #[arg(long, global = true, help = "Path to log file; logs go to stderr when omitted")]
    pub log_file_path: Option<PathBuf>,

    /// Debug logging
    #[arg(long, global = true, help = "Turn on debug logging")]
    pub debug: bool,

    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    pub quiet: bool,

    /// Skip public databases
    #[arg(
        long,
        global = true,
        help = "Ignore public dbs (useful for running against hosts without views)"
    )]
    pub ignore_public_dbs: bool,
}

impl Cli {
    /// The command to run, `audit` when none was given.
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Audit)
    }

    /// Output path, defaulted per command.
    pub fn output_path(&self) -> &Path {
        match (&self.global.output_file_path, self.command()) {
            (Some(path), _) => path,
            (None, Command::Audit) => Path::new(DEFAULT_REPORT_PATH),
            (None, Command::Bootstrap) => Path::new(DEFAULT_SCHEMA_PATH),
        }
    }

    /// Verbosity with `--debug` counted as one `-v`.
    pub fn verbosity(&self) -> u8 {
        if self.global.debug {
            self.global.verbose.max(1)
        } else {
            self.global.verbose
        }
    }
}
