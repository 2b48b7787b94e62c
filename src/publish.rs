//! Publishing the tileset to the Bunny CDN: upload to the storage zone, then
//! purge the public URL from the edge cache.

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use reqwest::{Body, Method, Url};
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::config::CdnKeys;
use crate::error::{Error, Result};
use crate::fetch::auth::AccessKey;
use crate::fetch::{HttpClient, request};

pub const STORAGE_URL: &str = "https://uk.storage.bunnycdn.com/plantopo/bus_stops_uk.pmtiles";
pub const PUBLIC_URL: &str = "https://plantopo-storage.b-cdn.net/bus_stops_uk.pmtiles";
pub const PURGE_ENDPOINT: &str = "https://api.bunny.net/purge";

/// Destination for a finished tileset.
#[async_trait]
pub trait CdnPublisher: Send + Sync {
    /// Uploads the file at `path`, replacing the current object.
    async fn upload(&self, path: &Path) -> Result<()>;
    /// Evicts cached copies of the published object.
    async fn purge(&self) -> Result<()>;

    async fn publish(&self, path: &Path) -> Result<()> {
        self.upload(path).await?;
        self.purge().await
    }
}

pub struct BunnyPublisher<C> {
    storage: AccessKey<C>,
    api: AccessKey<C>,
    pub storage_url: String,
    pub public_url: String,
    pub purge_endpoint: String,
}

impl<C: HttpClient + Clone> BunnyPublisher<C> {
    pub fn new(client: C, keys: &CdnKeys) -> Result<Self> {
        Ok(Self {
            storage: AccessKey::new(client.clone(), &keys.storage_key)?,
            api: AccessKey::new(client, &keys.api_key)?,
            storage_url: STORAGE_URL.to_string(),
            public_url: PUBLIC_URL.to_string(),
            purge_endpoint: PURGE_ENDPOINT.to_string(),
        })
    }
}

impl<C> BunnyPublisher<C> {
    /// The purge API call for the public object URL.
    pub fn purge_url(&self) -> Result<Url> {
        Url::parse_with_params(&self.purge_endpoint, [("url", self.public_url.as_str())])
            .map_err(|e| Error::transport(&self.purge_endpoint, format!("invalid url: {e}")))
    }
}

#[async_trait]
impl<C: HttpClient> CdnPublisher for BunnyPublisher<C> {
    #[tracing::instrument(skip(self), fields(url = %self.storage_url, path = %path.display()))]
    async fn upload(&self, path: &Path) -> Result<()> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| Error::io(path, e))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| Error::io(path, e))?
            .len();

        let mut req = request(Method::PUT, &self.storage_url)?;
        req.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(len));
        req.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        *req.body_mut() = Some(Body::wrap_stream(ReaderStream::new(file)));

        info!(bytes = len, "Uploading");
        self.storage.execute(req).await?.error_for_status()?;
        info!("Uploaded");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(url = %self.public_url))]
    async fn purge(&self) -> Result<()> {
        let req = reqwest::Request::new(Method::GET, self.purge_url()?);
        info!("Purging");
        self.api.execute(req).await?.error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::test_support::{FakeClient, response};

    #[test]
    fn test_purge_url_encodes_public_url() {
        let publisher = BunnyPublisher::new(FakeClient::default(), &keys()).unwrap();

        assert_eq!(
            publisher.purge_url().unwrap().as_str(),
            "https://api.bunny.net/purge?url=https%3A%2F%2Fplantopo-storage.b-cdn.net%2Fbus_stops_uk.pmtiles"
        );
    }

    #[tokio::test]
    async fn test_publish_uploads_then_purges_with_separate_keys() {
        let dir = tempfile::tempdir().unwrap();
        let tiles = dir.path().join("bus_stops_uk.pmtiles");
        std::fs::write(&tiles, b"PMTiles").unwrap();
        let fake = FakeClient::new(vec![response(201, ""), response(200, "")]);

        let publisher = BunnyPublisher::new(fake.clone(), &keys()).unwrap();
        publisher.publish(&tiles).await.unwrap();

        let seen = fake.requests();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].method, "PUT");
        assert_eq!(seen[0].url, STORAGE_URL);
        assert_eq!(seen[0].header("accesskey"), Some("storage-key"));
        assert_eq!(seen[0].header("content-length"), Some("7"));
        assert_eq!(seen[1].method, "GET");
        assert!(seen[1].url.starts_with(PURGE_ENDPOINT));
        assert_eq!(seen[1].header("accesskey"), Some("api-key"));
    }

    #[tokio::test]
    async fn test_failed_upload_skips_purge() {
        let dir = tempfile::tempdir().unwrap();
        let tiles = dir.path().join("bus_stops_uk.pmtiles");
        std::fs::write(&tiles, b"PMTiles").unwrap();
        let fake = FakeClient::new(vec![response(401, "unauthorized")]);

        let publisher = BunnyPublisher::new(fake.clone(), &keys()).unwrap();
        let err = publisher.publish(&tiles).await.unwrap_err();

        assert!(matches!(err, Error::Transport { .. }));
        assert_eq!(fake.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_io_error() {
        let publisher = BunnyPublisher::new(FakeClient::default(), &keys()).unwrap();
        let err = publisher
            .upload(Path::new("/nonexistent/bus_stops_uk.pmtiles"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Io { .. }));
    }

    // Helper functions for tests
    fn keys() -> CdnKeys {
        CdnKeys {
            storage_key: "storage-key".to_string(),
            api_key: "api-key".to_string(),
        }
    }
}
