/// MongoDB client wrapper
///
/// Wraps the `mongodb` driver client to provide:
/// - explicit configuration (URI, Stable API v1, TLS trust material)
/// - a `ping` performed at connect time, so a bad URI or bad credentials
///   fail immediately instead of on the first operation
/// - scoped acquisition with [`with_document_store`]
///
/// Accepting invalid certificates is a configuration toggle
/// ([`MongoConfig::tls_allow_invalid_certificates`]) and is off by default.
///
/// # Example
///
/// ```no_run
/// use taskledger_shared::config::MongoConfig;
/// use taskledger_shared::documents::client::DocumentStore;
///
/// # async fn example() -> Result<(), taskledger_shared::error::DataError> {
/// let store = DocumentStore::connect(&MongoConfig::new("mongodb://localhost:27017")).await?;
/// let cats = store.cats();
/// println!("{} cats", cats.find_all_vec().await?.len());
/// store.close().await;
/// # Ok(())
/// # }
/// ```
use crate::config::MongoConfig;
use crate::documents::cats::CatCollection;
use crate::error::{DataError, DataResult};
use futures::future::BoxFuture;
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, ServerApi, ServerApiVersion, Tls, TlsOptions};
use mongodb::{Client, Database};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Connected document store
///
/// Cheap to clone; clones share the driver's connection pool.
#[derive(Clone)]
pub struct DocumentStore {
    client: Client,
    config: Arc<MongoConfig>,
}

impl DocumentStore {
    /// Connects and verifies the connection with a `ping`
    ///
    /// # Errors
    ///
    /// - `ConfigurationError` if the connection string cannot be parsed
    /// - `ConnectionError` if the server cannot be reached or rejects the
    ///   credentials
    pub async fn connect(config: &MongoConfig) -> DataResult<Self> {
        info!(
            database = %config.database,
            collection = %config.collection,
            allow_invalid_certificates = config.tls_allow_invalid_certificates,
            "Connecting to MongoDB"
        );

        let options = client_options(config).await?;
        let client = Client::with_options(options)
            .map_err(|e| DataError::ConfigurationError(format!("Invalid MongoDB options: {}", e)))?;

        let store = Self {
            client,
            config: Arc::new(config.clone()),
        };

        if let Err(err) = store.ping().await {
            warn!(error = %err, "MongoDB ping failed");
            store.client.clone().shutdown().await;
            return Err(DataError::ConnectionError(err.to_string()));
        }

        info!("Connected to MongoDB");
        Ok(store)
    }

    /// Runs the `ping` admin command
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the server does not answer.
    pub async fn ping(&self) -> DataResult<()> {
        debug!("Pinging MongoDB");
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }

    /// Names of the databases visible to the configured user
    pub async fn list_database_names(&self) -> DataResult<Vec<String>> {
        Ok(self.client.list_database_names(None, None).await?)
    }

    /// The configured database
    pub fn database(&self) -> Database {
        self.client.database(&self.config.database)
    }

    /// The configured cats collection
    pub fn cats(&self) -> CatCollection {
        CatCollection::new(self.database().collection(&self.config.collection))
    }

    /// Configuration this store was opened with
    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    /// Shuts the client down, closing its pooled connections
    pub async fn close(self) {
        debug!("Shutting down MongoDB client");
        self.client.shutdown().await;
        info!("MongoDB client closed");
    }
}

/// Connects, runs `f`, and closes the client on every path
///
/// # Errors
///
/// Connection failures from [`DocumentStore::connect`], or whatever `f`
/// returns.
pub async fn with_document_store<T, F>(config: &MongoConfig, f: F) -> DataResult<T>
where
    F: for<'s> FnOnce(&'s DocumentStore) -> BoxFuture<'s, DataResult<T>>,
{
    let store = DocumentStore::connect(config).await?;
    let result = f(&store).await;
    store.close().await;
    result
}

async fn client_options(config: &MongoConfig) -> DataResult<ClientOptions> {
    let mut options = ClientOptions::parse(&config.connection_string)
        .await
        .map_err(|e| DataError::ConfigurationError(format!("Invalid MongoDB connection string: {}", e)))?;

    options.server_api = Some(ServerApi::builder().version(ServerApiVersion::V1).build());
    options.tls = tls_setting(config, options.tls.take());

    if let Some(app_name) = &config.app_name {
        options.app_name = Some(app_name.clone());
    }

    Ok(options)
}

/// Resolves the TLS setting from the config and whatever the URI asked for
fn tls_setting(config: &MongoConfig, from_uri: Option<Tls>) -> Option<Tls> {
    if config.tls == Some(false) {
        return Some(Tls::Disabled);
    }

    let wants_custom = config.tls_ca_file.is_some() || config.tls_allow_invalid_certificates;
    if !wants_custom {
        return match config.tls {
            Some(true) => Some(Tls::Enabled(TlsOptions::default())),
            _ => from_uri,
        };
    }

    let mut tls = match from_uri {
        Some(Tls::Enabled(existing)) => existing,
        _ => TlsOptions::default(),
    };
    if let Some(ca_file) = &config.tls_ca_file {
        tls.ca_file_path = Some(ca_file.clone());
    }
    if config.tls_allow_invalid_certificates {
        tls.allow_invalid_certificates = Some(true);
    }
    Some(Tls::Enabled(tls))
}
