//! Generation of a starting table schema from live hosts.
//!
//! Every table found in the modelled databases is written with all of its
//! columns whitelisted. The result is a starting point to be reviewed and
//! redacted by hand, never a model to audit against as is.

use labsdb_auditor_core::{
    Connector, Model, Result, SchemaSource, Table, TableDef, config::HostSpec, models::Column,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Tables and databases reflected from all hosts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapSchema {
    /// Every table seen, with the columns of its first occurrence
    pub tables: BTreeMap<String, Table>,
    /// Modelled databases found on no host
    pub missing_dbs: BTreeSet<String>,
    /// Live databases that are not modelled
    pub unmodelled_dbs: BTreeSet<String>,
}

/// Database name discrepancies written next to the generated schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DbLists {
    pub not_in_db: Vec<String>,
    pub not_in_dblist: Vec<String>,
}

impl BootstrapSchema {
    /// Schema-file representation of the reflected tables.
    pub fn to_table_defs(&self) -> BTreeMap<String, TableDef> {
        self.tables
            .iter()
            .map(|(name, table)| (name.clone(), table.to_def()))
            .collect()
    }

    pub fn dblists(&self) -> DbLists {
        DbLists {
            not_in_db: self.missing_dbs.iter().cloned().collect(),
            not_in_dblist: self.unmodelled_dbs.iter().cloned().collect(),
        }
    }
}

/// Accumulates tables across hosts.
///
/// Public databases are preferred since they expose what users can see;
/// without public databases the private ones are reflected.
#[derive(Debug)]
pub struct SchemaCollector<'a> {
    model: &'a Model,
    live_dbs: BTreeSet<String>,
    tables: BTreeMap<String, Table>,
}

impl<'a> SchemaCollector<'a> {
    pub fn new(model: &'a Model) -> Self {
        Self {
            model,
            live_dbs: BTreeSet::new(),
            tables: BTreeMap::new(),
        }
    }

    fn databases(&self) -> &'a BTreeSet<String> {
        if self.model.public_dbs.is_empty() {
            &self.model.private_dbs
        } else {
            &self.model.public_dbs
        }
    }

    /// Reflects one host. Tables already seen on an earlier host are kept.
    pub async fn reflect(&mut self, source: &dyn SchemaSource) -> Result<()> {
        let databases = self.databases();
        let live = source.list_databases().await?;

        for db in live.iter().filter(|db| databases.contains(*db)) {
            let tables = match source.list_tables(db).await {
                Ok(tables) => tables,
                Err(e) if e.is_unknown_database() => {
                    warn!("Skipping {}: {}", db, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            for name in tables {
                if self.tables.contains_key(&name) {
                    continue;
                }
                let mut table = Table::new(name.clone());
                for column in source.list_columns(db, &name).await? {
                    table.add_column(Column::whitelisted(column.name));
                }
                self.tables.insert(name, table);
            }
        }

        self.live_dbs.extend(live);
        Ok(())
    }

    pub fn finish(self) -> BootstrapSchema {
        let missing_dbs = self.databases().difference(&self.live_dbs).cloned().collect();
        let unmodelled_dbs = self
            .live_dbs
            .iter()
            .filter(|db| !self.model.knows_database(db))
            .cloned()
            .collect();
        BootstrapSchema {
            tables: self.tables,
            missing_dbs,
            unmodelled_dbs,
        }
    }
}

/// Reflects every host in order and merges their tables.
///
/// Any host that cannot be reflected fails the whole bootstrap.
pub async fn bootstrap_hosts(
    connector: &dyn Connector,
    hosts: &[HostSpec],
    model: &Model,
) -> Result<BootstrapSchema> {
    let mut collector = SchemaCollector::new(model);

    for host in hosts {
        info!("Reflecting tables from {}", host);
        let source = connector.connect(host).await?;
        let result = collector.reflect(source.as_ref()).await;
        source.close().await;
        result?;
    }

    let schema = collector.finish();
    for db in &schema.missing_dbs {
        warn!("Modelled database {} not found on any host", db);
    }
    info!(
        "Found {} tables, {} unmodelled databases",
        schema.tables.len(),
        schema.unmodelled_dbs.len()
    );
    Ok(schema)
}

/// Path of the dblists file written next to `schema_path`, in the same format.
pub fn dblists_path(schema_path: &Path) -> PathBuf {
    let extension = schema_path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("yaml");
    schema_path.with_file_name(format!("dblists.{}", extension))
}
