use std::{collections::HashMap, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use mysql_async::{prelude::Queryable, Params, Row, SslOpts};
use sea_query::Value;
use secrecy::{ExposeSecret, SecretString};
use snafu::{ResultExt, Snafu};

use crate::{
    sql::db_connection_pool::dbconnection::{
        mysqlconn::MySQLConnection, AsyncDbConnection, DbConnection,
    },
    util,
};

use super::{DbConnectionPool, Result};

const DEFAULT_MYSQL_PORT: u16 = 3306;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("ConnectionPoolError: {source}"))]
    ConnectionPoolError { source: mysql_async::UrlError },

    #[snafu(display("ConnectionPoolRunError: {source}"))]
    ConnectionPoolRunError { source: mysql_async::Error },

    #[snafu(display("Invalid parameter: {parameter_name}"))]
    InvalidParameterError { parameter_name: String },

    #[snafu(display("Invalid root cert path: {path}"))]
    InvalidRootCertPathError { path: String },
}

pub struct MySQLConnectionPool {
    pool: Arc<mysql_async::Pool>,
}

impl MySQLConnectionPool {
    /// Creates a new instance of `MySQLConnectionPool` and checks that the server answers.
    ///
    /// # Arguments
    ///
    /// * `params` - A map of parameters to create the connection pool.
    ///   * `connection_string` - A `mysql://` URL, or use the individual parameters below.
    ///   * `host` - The host of the MySQL server.
    ///   * `port` - The TCP port of the MySQL server. Defaults to 3306.
    ///   * `database` - The database unqualified table names resolve against.
    ///   * `user` - The user to connect as.
    ///   * `password` - The user's password.
    ///   * `sslmode` - "disabled", "required" (default) or "preferred".
    ///   * `sslrootcert` - The path to the root certificate used to verify the server.
    ///
    /// Keys may carry a `mysql_` prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter is invalid or the server cannot be reached.
    pub async fn new(params: HashMap<String, SecretString>) -> Result<Self> {
        let params = util::remove_prefix_from_hashmap_keys(params, "mysql_");

        let mut connection_string = mysql_async::OptsBuilder::default();
        let mut ssl_mode = "required";
        let mut ssl_rootcert_path: Option<PathBuf> = None;

        if let Some(mysql_connection_string) =
            params.get("connection_string").map(ExposeSecret::expose_secret)
        {
            connection_string = mysql_async::OptsBuilder::from_opts(
                mysql_async::Opts::from_url(mysql_connection_string)
                    .context(ConnectionPoolSnafu)?,
            );
        } else {
            if let Some(mysql_host) = params.get("host").map(ExposeSecret::expose_secret) {
                connection_string = connection_string.ip_or_hostname(mysql_host);
            }
            if let Some(mysql_user) = params.get("user").map(ExposeSecret::expose_secret) {
                connection_string = connection_string.user(Some(mysql_user));
            }
            if let Some(mysql_db) = params.get("database").map(ExposeSecret::expose_secret) {
                connection_string = connection_string.db_name(Some(mysql_db));
            }
            if let Some(mysql_pass) = params.get("password").map(ExposeSecret::expose_secret) {
                connection_string = connection_string.pass(Some(mysql_pass));
            }
            if let Some(mysql_port) = params.get("port").map(ExposeSecret::expose_secret) {
                let port = mysql_port
                    .parse::<u16>()
                    .map_err(|_| Error::InvalidParameterError {
                        parameter_name: "port".to_string(),
                    })?;
                connection_string = connection_string.tcp_port(port);
            } else {
                connection_string = connection_string.tcp_port(DEFAULT_MYSQL_PORT);
            }
        }

        if let Some(mysql_sslmode) = params.get("sslmode").map(ExposeSecret::expose_secret) {
            match mysql_sslmode.to_lowercase().as_str() {
                "disabled" | "required" | "preferred" => {
                    ssl_mode = mysql_sslmode;
                }
                _ => {
                    InvalidParameterSnafu {
                        parameter_name: "sslmode".to_string(),
                    }
                    .fail()?;
                }
            }
        }
        if let Some(mysql_sslrootcert) = params.get("sslrootcert").map(ExposeSecret::expose_secret)
        {
            if !std::path::Path::new(mysql_sslrootcert).exists() {
                InvalidRootCertPathSnafu {
                    path: mysql_sslrootcert,
                }
                .fail()?;
            }

            ssl_rootcert_path = Some(PathBuf::from(mysql_sslrootcert));
        }

        let ssl_opts = get_ssl_opts(&ssl_mode.to_lowercase(), ssl_rootcert_path);

        connection_string = connection_string.ssl_opts(ssl_opts);

        let opts = mysql_async::Opts::from(connection_string);
        tracing::debug!(
            "Connecting to MySQL at {}:{}",
            opts.ip_or_hostname(),
            opts.tcp_port()
        );

        let pool = mysql_async::Pool::new(opts);

        // Test the connection
        let mut conn = pool.get_conn().await.context(ConnectionPoolRunSnafu)?;
        let _rows: Vec<Row> = conn
            .exec("SELECT 1", Params::Empty)
            .await
            .context(ConnectionPoolRunSnafu)?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Returns a direct connection to the underlying MySQL server.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection can be checked out of the pool.
    pub async fn connect_direct(&self) -> Result<MySQLConnection> {
        let conn = self.pool.get_conn().await.context(ConnectionPoolRunSnafu)?;
        Ok(MySQLConnection::new(conn))
    }
}

fn get_ssl_opts(ssl_mode: &str, rootcert_path: Option<PathBuf>) -> Option<SslOpts> {
    if ssl_mode == "disabled" {
        return None;
    }

    let mut opts = SslOpts::default();

    if let Some(rootcert_path) = rootcert_path {
        opts = opts.with_root_certs(vec![rootcert_path.into()]);
    }

    // "preferred" accepts any certificate; mysql_async has no notion of an SSL mode
    if ssl_mode == "preferred" {
        opts = opts
            .with_danger_accept_invalid_certs(true)
            .with_danger_skip_domain_validation(true);
    }

    Some(opts)
}

#[async_trait]
impl DbConnectionPool<mysql_async::Conn, Value> for MySQLConnectionPool {
    async fn connect(&self) -> Result<Box<dyn DbConnection<mysql_async::Conn, Value>>> {
        Ok(Box::new(self.connect_direct().await?))
    }
}
