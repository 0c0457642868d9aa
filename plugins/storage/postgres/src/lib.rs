//! PostgreSQL destination over `tokio-postgres`.
//!
//! One connection, no explicit transactions: every statement autocommits, so
//! a record that fails does not roll back the ones before it. TLS goes
//! through rustls unless `sslmode` is `disable`.

mod param;
mod tls;

use std::future::Future;

use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};
use tokio_postgres_rustls::MakeRustlsConnect;

use kobo_api::{BackendError, BoxFuture, Database, InsertRow, TableDefinition, TableIdentity};

pub use param::PgParam;
pub use tls::SslMode;

const SQL_TABLE_EXISTS: &str = "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
     WHERE table_schema = $1 AND table_name = $2)";

/// Connection parameters.
#[derive(Debug, Clone)]
pub struct PgSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub ssl_mode: SslMode,
}

impl Default for PgSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            dbname: "postgres".to_string(),
            ssl_mode: SslMode::default(),
        }
    }
}

/// PostgreSQL `Database`.
pub struct PgDatabase {
    client: Client,
}

impl PgDatabase {
    /// Open the connection and drive it on a background task.
    pub async fn connect(settings: &PgSettings) -> Result<Self, BackendError> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&settings.host)
            .port(settings.port)
            .user(&settings.user)
            .password(&settings.password)
            .dbname(&settings.dbname);
        let context = || {
            format!(
                "connect {}@{}:{}/{} (sslmode={})",
                settings.user, settings.host, settings.port, settings.dbname, settings.ssl_mode
            )
        };

        let client = match tls::client_config(settings.ssl_mode)? {
            None => {
                config.ssl_mode(tokio_postgres::config::SslMode::Disable);
                let (client, connection) = config
                    .connect(NoTls)
                    .await
                    .map_err(|e| pg_error(e).with_context(context()))?;
                spawn_connection(connection);
                client
            }
            Some(tls_config) => {
                config.ssl_mode(tokio_postgres::config::SslMode::Require);
                let (client, connection) = config
                    .connect(MakeRustlsConnect::new(tls_config))
                    .await
                    .map_err(|e| pg_error(e).with_context(context()))?;
                spawn_connection(connection);
                client
            }
        };

        tracing::info!(
            host = %settings.host,
            port = settings.port,
            db = %settings.dbname,
            sslmode = %settings.ssl_mode,
            "connected to postgres"
        );
        Ok(Self { client })
    }
}

fn spawn_connection<F>(connection: F)
where
    F: Future<Output = Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %e, "postgres connection closed");
        }
    });
}

impl Database for PgDatabase {
    fn ensure_namespace<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            let sql = TableDefinition::create_namespace_sql(namespace);
            tracing::debug!(sql = %sql, "ensure namespace");
            self.client.batch_execute(&sql).await.map_err(pg_error)
        })
    }

    fn table_exists<'a>(&'a self, table: &'a TableIdentity) -> BoxFuture<'a, Result<bool, BackendError>> {
        Box::pin(async move {
            let row = self
                .client
                .query_one(SQL_TABLE_EXISTS, &[&table.namespace, &table.name])
                .await
                .map_err(pg_error)?;
            row.try_get::<_, bool>(0).map_err(pg_error)
        })
    }

    fn create_table<'a>(&'a self, def: &'a TableDefinition) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            let sql = def.to_sql();
            tracing::debug!(sql = %sql, "create table");
            self.client.batch_execute(&sql).await.map_err(pg_error)
        })
    }

    fn insert_or_ignore<'a>(&'a self, row: &'a InsertRow) -> BoxFuture<'a, Result<u64, BackendError>> {
        Box::pin(async move {
            let params: Vec<PgParam<'_>> = row.values.iter().map(|(_, v)| PgParam(v)).collect();
            let refs: Vec<&(dyn ToSql + Sync)> =
                params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
            self.client
                .execute(row.to_sql().as_str(), &refs)
                .await
                .map_err(pg_error)
        })
    }
}

/// A dropped connection is transport trouble, rejected credentials are auth,
/// anything else the server said is a query error. Server messages are used
/// as-is, without the driver prefix.
fn pg_error(e: tokio_postgres::Error) -> BackendError {
    if e.is_closed() {
        return BackendError::io(format!("postgres: {e}"));
    }
    match e.as_db_error() {
        Some(db)
            if *db.code() == SqlState::INVALID_PASSWORD
                || *db.code() == SqlState::INVALID_AUTHORIZATION_SPECIFICATION =>
        {
            BackendError::auth(db.message())
        }
        Some(db) => BackendError::query(db.message()),
        None if is_io(&e) => BackendError::io(e.to_string()),
        None => BackendError::query(e.to_string()),
    }
}

fn is_io(e: &tokio_postgres::Error) -> bool {
    std::error::Error::source(e).is_some_and(|s| s.is::<std::io::Error>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = PgSettings::default();
        assert_eq!(s.port, 5432);
        assert_eq!(s.host, "localhost");
        assert_eq!(s.ssl_mode, SslMode::Require);
    }

    #[test]
    fn test_exists_query_is_parameterized() {
        assert!(SQL_TABLE_EXISTS.contains("$1"));
        assert!(SQL_TABLE_EXISTS.contains("$2"));
    }
}
