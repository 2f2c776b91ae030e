//! Remote store capability used by the pipeline, and its Qizx implementation

use crate::error::{BulkError, Result};
use async_trait::async_trait;
use qizx_api::{Client, ConnectionConfig, Member, MemberKind, Properties, PropertyUpdate};
use std::sync::Arc;
use tracing::debug;

const NATURE_ONLY: &[&str] = &["nature"];

/// Database operations needed to dump and restore libraries.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list_libraries(&self) -> Result<Vec<String>>;

    /// Members below `path` down to `depth` levels, excluding `path` itself.
    async fn list_members(&self, library: &str, path: &str, depth: u32) -> Result<Vec<Member>>;

    async fn get_document(&self, library: &str, path: &str) -> Result<Vec<u8>>;

    async fn get_properties(&self, library: &str, path: &str) -> Result<Properties>;

    /// Store a document body, creating missing parent collections.
    async fn put_document(
        &self,
        library: &str,
        path: &str,
        body: Vec<u8>,
        kind: MemberKind,
    ) -> Result<()>;

    async fn put_properties(&self, library: &str, path: &str, properties: &Properties)
        -> Result<()>;

    async fn create_library(&self, library: &str) -> Result<()>;

    /// Create a collection and its parents; existing collections are left alone.
    async fn create_collection(&self, library: &str, path: &str) -> Result<()>;
}

/// Opens one store connection per worker.
#[async_trait]
pub trait StoreFactory: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn RemoteStore>>;
}

/// [`RemoteStore`] backed by the Qizx REST API.
pub struct QizxStore {
    client: Client,
}

impl QizxStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteStore for QizxStore {
    async fn list_libraries(&self) -> Result<Vec<String>> {
        Ok(self.client.listlib().await?)
    }

    async fn list_members(&self, library: &str, path: &str, depth: u32) -> Result<Vec<Member>> {
        let groups = self
            .client
            .getprop(path, Some(NATURE_ONLY), depth, Some(library))
            .await?;

        Ok(groups
            .into_iter()
            .filter(|(member, _)| member != path)
            .map(|(member, properties)| {
                let kind = properties
                    .get("nature")
                    .and_then(|nature| nature.as_str())
                    .map(MemberKind::from_nature)
                    .unwrap_or(MemberKind::Document);
                Member { path: member, kind }
            })
            .collect())
    }

    async fn get_document(&self, library: &str, path: &str) -> Result<Vec<u8>> {
        Ok(self.client.get(path, Some(library)).await?)
    }

    async fn get_properties(&self, library: &str, path: &str) -> Result<Properties> {
        let groups = self.client.getprop(path, None, 0, Some(library)).await?;
        Ok(groups
            .into_iter()
            .next()
            .map(|(_, properties)| properties)
            .unwrap_or_default())
    }

    async fn put_document(
        &self,
        library: &str,
        path: &str,
        body: Vec<u8>,
        kind: MemberKind,
    ) -> Result<()> {
        let xml = kind != MemberKind::NonXmlDocument;
        self.client
            .put(vec![(path.to_string(), body)], xml, Some(library))
            .await?;
        Ok(())
    }

    async fn put_properties(
        &self,
        library: &str,
        path: &str,
        properties: &Properties,
    ) -> Result<()> {
        if properties.is_empty() {
            return Ok(());
        }
        let updates: Vec<PropertyUpdate> = properties
            .iter()
            .map(|(name, value)| PropertyUpdate::set(name.clone(), value.clone()))
            .collect();
        self.client.setprop(path, &updates, Some(library)).await?;
        Ok(())
    }

    async fn create_library(&self, library: &str) -> Result<()> {
        self.client.mklib(library).await?;
        Ok(())
    }

    async fn create_collection(&self, library: &str, path: &str) -> Result<()> {
        match self.client.getprop(path, Some(NATURE_ONLY), 0, Some(library)).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!(library = %library, path = %path, "Creating collection");
                self.client.mkcol(path, true, Some(library)).await?;
                Ok(())
            },
            Err(e) => Err(e.into()),
        }
    }
}

/// Connects [`QizxStore`]s from one resolved configuration.
pub struct QizxStoreFactory {
    config: ConnectionConfig,
}

impl QizxStoreFactory {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StoreFactory for QizxStoreFactory {
    async fn connect(&self) -> Result<Arc<dyn RemoteStore>> {
        let connection_error = |e: qizx_api::QizxError| BulkError::Connection(e.to_string());

        let client = Client::new(self.config.clone()).map_err(connection_error)?;
        client.info().await.map_err(connection_error)?;
        debug!(url = %client.base_url(), "Connected to database");

        Ok(Arc::new(QizxStore::new(client)))
    }
}
