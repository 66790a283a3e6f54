//! MySQL connection setup.
//!
//! Every host gets a pool capped at a single connection, opened eagerly so
//! that an unreachable host fails before any report runs.

use super::MySqlSchemaSource;
use crate::Result;
use crate::config::HostSpec;
use crate::error::{AuditorError, redact_database_url};
use sqlx::MySqlPool;
use std::time::Duration;
use url::Url;

/// User name used when neither the configuration nor `MYSQL_USER` sets one.
pub const DEFAULT_MYSQL_USER: &str = "root";

/// Credentials and limits for MySQL connections.
#[derive(Clone, Default)]
pub struct MySqlCredentials {
    pub user: String,
    password: Option<String>,
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for MySqlCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlCredentials")
            .field("user", &self.user)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

impl MySqlCredentials {
    pub fn new(user: impl Into<String>, password: Option<String>, connect_timeout: Duration) -> Self {
        Self {
            user: user.into(),
            password,
            connect_timeout,
        }
    }

    /// Resolves credentials from the configured user and the environment.
    ///
    /// The user is `configured_user`, else `MYSQL_USER`, else `root`; the
    /// password comes from `MYSQL_PWD` only.
    pub fn from_env(configured_user: Option<&str>, connect_timeout: Duration) -> Self {
        let user = configured_user
            .map(str::to_string)
            .or_else(|| std::env::var("MYSQL_USER").ok())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_MYSQL_USER.to_string());
        let password = std::env::var("MYSQL_PWD").ok().filter(|p| !p.is_empty());
        Self::new(user, password, connect_timeout)
    }
}

/// Builds the connection URL for a host.
///
/// The URL carries the password when one is set; use
/// [`redact_database_url`] before logging it.
pub fn connection_url(host: &HostSpec, credentials: &MySqlCredentials) -> Result<String> {
    let invalid = |what: &str| {
        AuditorError::configuration(format!("Invalid {} for host {}", what, host))
    };

    let mut url = Url::parse("mysql://localhost")
        .map_err(|e| AuditorError::configuration(format!("Invalid base URL: {}", e)))?;
    url.set_host(Some(&host.host)).map_err(|_| invalid("host name"))?;
    url.set_port(Some(host.port)).map_err(|()| invalid("port"))?;
    url.set_username(&credentials.user).map_err(|()| invalid("user name"))?;
    if let Some(password) = &credentials.password {
        url.set_password(Some(password)).map_err(|()| invalid("password"))?;
    }
    Ok(url.to_string())
}

impl MySqlSchemaSource {
    /// Connects to `host`.
    ///
    /// # Errors
    /// Returns [`AuditorError::Connection`] with a redacted URL when the host
    /// cannot be reached within the connect timeout.
    pub async fn connect(host: &HostSpec, credentials: &MySqlCredentials) -> Result<Self> {
        let url = connection_url(host, credentials)?;
        let pool = create_pool(&url, credentials.connect_timeout).await?;
        tracing::debug!("Connected to {}", redact_database_url(&url));
        Ok(Self {
            pool,
            host: host.to_string(),
        })
    }

    /// Host this source is connected to, as `host:port`.
    pub fn host(&self) -> &str {
        &self.host
    }
}

async fn create_pool(url: &str, connect_timeout: Duration) -> Result<MySqlPool> {
    use sqlx::Executor;

    sqlx::mysql::MySqlPoolOptions::new()
        .max_connections(1)
        .min_connections(0)
        .acquire_timeout(connect_timeout)
        .test_before_acquire(true)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET SESSION TRANSACTION READ ONLY").await?;
                Ok(())
            })
        })
        .connect(url)
        .await
        .map_err(|e| {
            AuditorError::connection_failed(
                format!("Failed to connect to {}", redact_database_url(url)),
                e,
            )
        })
}
