use async_trait::async_trait;
use dbconnection::DbConnection;

pub mod dbconnection;
#[cfg(feature = "mysql")]
pub mod mysqlpool;
#[cfg(feature = "oracle")]
pub mod oraclepool;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
type Result<T, E = Error> = std::result::Result<T, E>;

/// Hands out connections to one database.
///
/// `P` is the statement parameter type the connections accept.
#[async_trait]
pub trait DbConnectionPool<T, P: 'static> {
    async fn connect(&self) -> Result<Box<dyn DbConnection<T, P>>>;
}
