//! SQL Server connection built on tiberius.
//!
//! A single TDS session over tokio TCP, opened once per run. Named
//! instances are resolved through the SQL Browser service, and Azure SQL
//! gateway redirects are followed once.

mod value;

pub use value::render_value;

use super::{ResultSet, SqlConnection};
use crate::{Result, error::DbExportError, security::Credentials};
use async_trait::async_trait;
use futures::TryStreamExt;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, SqlBrowser, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use super::ConnectionConfig;

/// Live SQL Server session.
#[derive(Debug)]
pub struct MssqlConnection {
    client: Client<Compat<TcpStream>>,
    description: String,
}

impl MssqlConnection {
    /// Opens a session.
    ///
    /// # Security
    /// Credentials are handed to the driver and not retained. Driver errors
    /// raised during login are reduced to their category and server error
    /// code so that user names never reach logs.
    ///
    /// # Errors
    /// Returns `DbExportError::Connection` if the server cannot be reached,
    /// TLS negotiation fails, login is rejected or `connect_timeout` elapses.
    pub async fn connect(config: &ConnectionConfig, credentials: &Credentials) -> Result<Self> {
        config.validate()?;

        let tiberius_config = build_tiberius_config(config, credentials);
        let description = format!("SQL Server {}", config);

        info!("Connecting to {}", description);
        let client = tokio::time::timeout(config.connect_timeout, open_client(tiberius_config))
            .await
            .map_err(|_| {
                DbExportError::connection_failed(
                    format!("timed out after {:?}", config.connect_timeout),
                    std::io::Error::from(std::io::ErrorKind::TimedOut),
                )
            })??;
        info!("Connected to {}", description);

        Ok(Self {
            client,
            description,
        })
    }
}

fn build_tiberius_config(config: &ConnectionConfig, credentials: &Credentials) -> Config {
    let mut tiberius_config = Config::new();
    tiberius_config.host(&config.host);
    if let Some(port) = config.port {
        tiberius_config.port(port);
    }
    if let Some(instance) = &config.instance {
        tiberius_config.instance_name(instance);
    }
    if let Some(database) = &config.database {
        tiberius_config.database(database);
    }
    tiberius_config.application_name(&config.application_name);
    tiberius_config.authentication(AuthMethod::sql_server(
        credentials.username(),
        credentials.password().unwrap_or(""),
    ));
    tiberius_config.encryption(if config.encrypt {
        EncryptionLevel::Required
    } else {
        EncryptionLevel::Off
    });
    if config.trust_server_certificate {
        tiberius_config.trust_cert();
    }
    tiberius_config
}

async fn open_client(mut config: Config) -> Result<Client<Compat<TcpStream>>> {
    let tcp = connect_tcp(&config).await?;

    match Client::connect(config.clone(), tcp.compat_write()).await {
        Ok(client) => Ok(client),
        // Azure SQL gateways answer the first login with a redirect
        Err(tiberius::error::Error::Routing { host, port }) => {
            debug!("Following server redirect to port {}", port);
            config.host(&host);
            config.port(port);
            let tcp = connect_tcp(&config).await?;
            Client::connect(config, tcp.compat_write())
                .await
                .map_err(|e| DbExportError::connection_failed("login failed", sanitize(&e)))
        }
        Err(e) => Err(DbExportError::connection_failed("login failed", sanitize(&e))),
    }
}

async fn connect_tcp(config: &Config) -> Result<TcpStream> {
    let tcp = TcpStream::connect_named(config)
        .await
        .map_err(|e| DbExportError::connection_failed("server unreachable", sanitize(&e)))?;
    tcp.set_nodelay(true)
        .map_err(|e| DbExportError::connection_failed("socket setup failed", e))?;
    Ok(tcp)
}

/// Reduces a driver error to text that cannot carry credentials.
fn sanitize(error: &tiberius::error::Error) -> std::io::Error {
    use tiberius::error::Error;

    let summary = match error {
        Error::Io { kind, .. } => format!("I/O error ({:?})", kind),
        Error::Server(token) => format!(
            "server error {} (class {}, state {})",
            token.code(),
            token.class(),
            token.state()
        ),
        Error::Tls(_) => "TLS negotiation failed".to_string(),
        Error::Routing { .. } => "unexpected second redirect".to_string(),
        _ => "protocol error".to_string(),
    };
    std::io::Error::other(summary)
}

#[async_trait]
impl SqlConnection for MssqlConnection {
    async fn query(&mut self, sql: &str, params: &[&str]) -> Result<ResultSet> {
        let params: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();

        let stream = self
            .client
            .query(sql, &params)
            .await
            .map_err(|e| DbExportError::query_failed_with("statement rejected", e))?;

        let mut rows = stream.into_row_stream();
        let mut result = ResultSet::default();

        while let Some(row) = rows
            .try_next()
            .await
            .map_err(|e| DbExportError::query_failed_with("reading rows failed", e))?
        {
            if result.columns.is_empty() {
                result.columns = row
                    .columns()
                    .iter()
                    .map(|column| column.name().to_string())
                    .collect();
            }
            let cells = row
                .into_iter()
                .map(render_value)
                .collect::<Result<Vec<_>>>()?;
            result.rows.push(cells);
        }

        Ok(result)
    }

    async fn close(self) -> Result<()> {
        debug!("Closing {}", self.description);
        self.client
            .close()
            .await
            .map_err(|e| DbExportError::connection_failed("close failed", sanitize(&e)))
    }

    fn safe_description(&self) -> String {
        self.description.clone()
    }
}
