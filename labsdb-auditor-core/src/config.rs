//! Typed audit configuration and declared model loading.
//!
//! The configuration file is YAML with `kebab-case` keys. It is validated as a
//! whole before any host is contacted, so a typo in a regex or a missing dblist
//! fails the run immediately with a precise message.

use crate::error::AuditorError;
use crate::models::{Model, Table, TableDef};
use crate::Result;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default MySQL port used when a host entry carries none.
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

fn default_public_db_suffix() -> String {
    "_p".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

/// Raw configuration as written in the YAML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuditConfig {
    /// `host[:port]` entries to audit, in order
    pub hosts: Vec<String>,
    /// Files mapping table name to table definition
    pub tableschema_files: Vec<PathBuf>,
    /// Directory holding `all.dblist` and `private.dblist`
    pub mediawiki_config_path: PathBuf,
    /// Suffix turning a private database name into its public counterpart
    #[serde(default = "default_public_db_suffix")]
    pub public_db_suffix: String,
    /// Databases matching this pattern are excluded from all accounting
    #[serde(default)]
    pub ignore_db_pattern: Option<String>,
    /// Databases matching this pattern are user databases, never "extra"
    #[serde(default)]
    pub user_dbname_regex: Option<String>,
    /// User to connect as; falls back to `MYSQL_USER`, then `root`
    #[serde(default)]
    pub mysql_user: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl AuditConfig {
    /// Reads and validates a configuration file.
    ///
    /// Relative schema-file and mediawiki-config paths are resolved against
    /// the directory containing the configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuditorError::io(format!("Failed to read config file {}", path.display()), e)
        })?;
        let mut config = Self::from_yaml(&content)?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        config.tableschema_files = config
            .tableschema_files
            .iter()
            .map(|p| base_dir.join(p))
            .collect();
        config.mediawiki_config_path = base_dir.join(&config.mediawiki_config_path);

        Ok(config)
    }

    /// Parses and validates configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| {
            AuditorError::configuration(format!("Malformed configuration: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values.
    ///
    /// # Errors
    /// Returns error if a required list is empty, a host entry is malformed or
    /// a pattern does not compile.
    pub fn validate(&self) -> Result<()> {
        if self.hosts.is_empty() {
            return Err(AuditorError::configuration("hosts must not be empty"));
        }
        for host in &self.hosts {
            HostSpec::parse(host)?;
        }

        if self.tableschema_files.is_empty() {
            return Err(AuditorError::configuration(
                "tableschema-files must not be empty",
            ));
        }

        if self.connect_timeout_secs == 0 {
            return Err(AuditorError::configuration(
                "connect-timeout-secs must be greater than 0",
            ));
        }

        DatabaseFilters::compile(
            self.ignore_db_pattern.as_deref(),
            self.user_dbname_regex.as_deref(),
        )?;

        Ok(())
    }

    /// Parsed host entries.
    pub fn host_specs(&self) -> Result<Vec<HostSpec>> {
        self.hosts.iter().map(|h| HostSpec::parse(h)).collect()
    }

    /// Compiled database name filters.
    pub fn filters(&self) -> Result<DatabaseFilters> {
        DatabaseFilters::compile(
            self.ignore_db_pattern.as_deref(),
            self.user_dbname_regex.as_deref(),
        )
    }

    /// Connection timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Name of the private database a public database is derived from.
    ///
    /// Only a trailing suffix is removed, so names that merely contain the
    /// suffix elsewhere are left intact.
    pub fn source_db_name<'a>(&self, public_db: &'a str) -> &'a str {
        public_db
            .strip_suffix(self.public_db_suffix.as_str())
            .unwrap_or(public_db)
    }

    /// Builds the declared model from the configured dblists and schema files.
    ///
    /// With `ignore_public_dbs` set the model carries no public databases,
    /// which suits hosts that only hold unredacted replicas.
    pub fn load_model(&self, ignore_public_dbs: bool) -> Result<Model> {
        let tables = load_table_schemas(&self.tableschema_files)?;

        let all_dbs = read_dblist(self.mediawiki_config_path.join("all.dblist"))?;
        let private_wikis = read_dblist(self.mediawiki_config_path.join("private.dblist"))?;
        let replicated: BTreeSet<String> = all_dbs.difference(&private_wikis).cloned().collect();

        let suffix = (!ignore_public_dbs).then_some(self.public_db_suffix.as_str());
        let model = Model::new(replicated, suffix, tables);

        tracing::info!(
            "Loaded model: {} private dbs, {} public dbs, {} tables",
            model.private_dbs.len(),
            model.public_dbs.len(),
            model.tables.len()
        );
        Ok(model)
    }
}

/// A host to audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSpec {
    pub host: String,
    pub port: u16,
}

impl HostSpec {
    /// Parses `host` or `host:port`.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        let (host, port) = match spec.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    AuditorError::configuration(format!("Invalid port in host entry '{}'", spec))
                })?;
                (host, port)
            }
            None => (spec, DEFAULT_MYSQL_PORT),
        };

        if host.is_empty() {
            return Err(AuditorError::configuration(format!(
                "Host entry '{}' has an empty host name",
                spec
            )));
        }
        if port == 0 {
            return Err(AuditorError::configuration(format!(
                "Host entry '{}' has port 0",
                spec
            )));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl std::fmt::Display for HostSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Compiled database name filters.
///
/// Both patterns match at the start of a name, like a `^` anchored regex.
#[derive(Debug, Clone, Default)]
pub struct DatabaseFilters {
    ignore: Option<Regex>,
    user_db: Option<Regex>,
}

impl DatabaseFilters {
    /// Compiles the optional ignore and user-database patterns.
    pub fn compile(ignore_db_pattern: Option<&str>, user_dbname_regex: Option<&str>) -> Result<Self> {
        Ok(Self {
            ignore: ignore_db_pattern
                .map(|p| compile_anchored("ignore-db-pattern", p))
                .transpose()?,
            user_db: user_dbname_regex
                .map(|p| compile_anchored("user-dbname-regex", p))
                .transpose()?,
        })
    }

    /// True when the database is excluded from all accounting.
    pub fn is_ignored(&self, db: &str) -> bool {
        self.ignore.as_ref().is_some_and(|re| re.is_match(db))
    }

    /// True when the database was created by a user.
    pub fn is_user_db(&self, db: &str) -> bool {
        self.user_db.as_ref().is_some_and(|re| re.is_match(db))
    }
}

fn compile_anchored(key: &str, pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{})", pattern)).map_err(|e| {
        AuditorError::configuration(format!("Invalid {} '{}': {}", key, pattern, e))
    })
}

/// Reads a dblist: one database per line, blanks and `#` comments skipped.
pub fn read_dblist(path: impl AsRef<Path>) -> Result<BTreeSet<String>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        AuditorError::configuration(format!("Failed to read dblist {}: {}", path.display(), e))
    })?;
    Ok(parse_dblist(&content))
}

fn parse_dblist(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Loads every table schema file into one table map.
///
/// A table declared in more than one file takes the last definition.
pub fn load_table_schemas(paths: &[PathBuf]) -> Result<BTreeMap<String, Table>> {
    let mut tables = BTreeMap::new();
    for path in paths {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuditorError::configuration(format!(
                "Failed to read table schema file {}: {}",
                path.display(),
                e
            ))
        })?;
        let schema = parse_table_schema(&content).map_err(|e| {
            AuditorError::configuration(format!("{}: {}", path.display(), e))
        })?;
        for (name, table) in schema {
            if tables.insert(name.clone(), table).is_some() {
                tracing::warn!(
                    "Table {} redefined in {}, using the later definition",
                    name,
                    path.display()
                );
            }
        }
        tracing::debug!("Loaded table schema file {}", path.display());
    }
    Ok(tables)
}

/// Parses the content of one table schema file.
pub fn parse_table_schema(content: &str) -> Result<BTreeMap<String, Table>> {
    let defs: BTreeMap<String, TableDef> = serde_yaml::from_str(content)
        .map_err(|e| AuditorError::configuration(format!("Malformed table schema: {}", e)))?;
    Ok(defs
        .into_iter()
        .map(|(name, def)| (name.clone(), Table::from_def(name, def)))
        .collect())
}
