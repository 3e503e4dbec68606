use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use oracle::{Connection, Connector};
use sea_query::Value;
use secrecy::{ExposeSecret, SecretString};
use snafu::prelude::*;
use tokio::task;

use super::{
    dbconnection::{oracleconn::OracleConnection, AsyncDbConnection, DbConnection},
    DbConnectionPool,
};
use crate::util;

/// Default TCP port for Oracle Database
const DEFAULT_ORACLE_PORT: u16 = 1521;

/// Default service name for Oracle Database connections
static DEFAULT_SERVICE_NAME: &str = "ORCL";

/// Default timezone for Oracle sessions (UTC for consistent timestamp handling)
static DEFAULT_TIMEZONE: &str = "UTC";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Oracle connection failed: {source}"))]
    ConnectionError { source: oracle::Error },

    #[snafu(display("Unable to set the session time zone to '{timezone}': {source}"))]
    SessionSetupError {
        timezone: String,
        source: oracle::Error,
    },

    #[snafu(display("Oracle connection task failed: {source}"))]
    ConnectTaskError { source: task::JoinError },

    #[snafu(display("Missing required parameter: {param}"))]
    MissingParameter { param: String },

    #[snafu(display("Invalid parameter: {param}"))]
    InvalidParameter { param: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Opens a dedicated session for every [`DbConnectionPool::connect`] call.
///
/// Each session gets its time zone set with `ALTER SESSION` right after logon.
pub struct OracleConnectionPool {
    connector: Connector,
    timezone: String,
}

impl std::fmt::Debug for OracleConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleConnectionPool")
            .field("timezone", &self.timezone)
            .finish_non_exhaustive()
    }
}

impl OracleConnectionPool {
    /// Creates a new instance of `OracleConnectionPool`. No session is opened until the first
    /// connection is requested.
    ///
    /// # Arguments
    ///
    /// * `params` - A map of parameters, keys may carry an `oracle_` prefix.
    ///   * `user` - The user to connect as. Required.
    ///   * `password` - The user's password. Required.
    ///   * `host` - The host of the listener. Required.
    ///   * `port` - The listener port. Defaults to 1521.
    ///   * `service_name` (or `sid`) - The service to connect to. Defaults to `ORCL`.
    ///   * `timezone` - The session time zone. Defaults to `UTC`.
    ///
    /// # Errors
    ///
    /// Returns an error if a required parameter is missing or the port is not a number.
    pub fn new(params: HashMap<String, SecretString>) -> Result<Self> {
        let params = util::remove_prefix_from_hashmap_keys(params, "oracle_");

        let user = params
            .get("user")
            .ok_or(Error::MissingParameter {
                param: "user".to_string(),
            })?
            .expose_secret();

        let password = params
            .get("password")
            .ok_or(Error::MissingParameter {
                param: "password".to_string(),
            })?
            .expose_secret();

        let host = params
            .get("host")
            .ok_or(Error::MissingParameter {
                param: "host".to_string(),
            })?
            .expose_secret();

        let port = match params.get("port") {
            Some(port) => port
                .expose_secret()
                .parse::<u16>()
                .map_err(|_| Error::InvalidParameter {
                    param: "port".to_string(),
                })?,
            None => DEFAULT_ORACLE_PORT,
        };

        let service_name = params
            .get("service_name")
            .or_else(|| params.get("sid"))
            .map(|s| s.expose_secret().to_string())
            .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());

        let timezone = params
            .get("timezone")
            .map(|s| s.expose_secret().to_string())
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());

        let connect_string = connect_string(host, port, &service_name);
        tracing::debug!("Oracle connect string: {connect_string}");

        Ok(Self {
            connector: Connector::new(user, password, connect_string),
            timezone,
        })
    }

    /// Opens a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if the logon or the session setup fails.
    pub async fn connect_direct(&self) -> Result<OracleConnection> {
        let connector = self.connector.clone();
        let timezone = self.timezone.clone();

        let conn = task::spawn_blocking(move || -> Result<Connection> {
            let conn = connector.connect().context(ConnectionSnafu)?;
            conn.execute(&format!("ALTER SESSION SET TIME_ZONE = '{timezone}'"), &[])
                .context(SessionSetupSnafu { timezone: &timezone })?;
            Ok(conn)
        })
        .await
        .context(ConnectTaskSnafu)??;

        Ok(OracleConnection::new(Arc::new(conn)))
    }
}

/// Easy Connect string for the listener at `host:port`.
fn connect_string(host: &str, port: u16, service_name: &str) -> String {
    format!("//{host}:{port}/{service_name}")
}

#[async_trait]
impl DbConnectionPool<Arc<Connection>, Value> for OracleConnectionPool {
    async fn connect(
        &self,
    ) -> std::result::Result<
        Box<dyn DbConnection<Arc<Connection>, Value>>,
        Box<dyn std::error::Error + Send + Sync>,
    > {
        Ok(Box::new(self.connect_direct().await?))
    }
}
