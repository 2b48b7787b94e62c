//! HTTP plumbing for the download and publishing collaborators.

mod basic;
mod client;
pub mod auth;
#[cfg(test)]
pub(crate) mod test_support;

pub use basic::{BasicClient, USER_AGENT};
pub use client::HttpClient;

use std::path::Path;

use reqwest::{Method, Request};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Builds a bare request for `url`.
pub fn request(method: Method, url: &str) -> Result<Request> {
    let url = url
        .parse()
        .map_err(|e| Error::transport(url, format!("invalid url: {e}")))?;
    Ok(Request::new(method, url))
}

/// Executes `req` and returns the full body. Error statuses fail.
pub async fn fetch_bytes<C: HttpClient>(client: &C, req: Request) -> Result<Vec<u8>> {
    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

/// Executes `req` and streams the body into a new file at `path`, returning
/// the number of bytes written.
#[tracing::instrument(skip(client, req), fields(url = %req.url(), path = %path.display()))]
pub async fn download_to_file<C: HttpClient>(client: &C, req: Request, path: &Path) -> Result<u64> {
    let mut resp = client.execute(req).await?.error_for_status()?;
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| Error::io(path, e))?;

    let mut total: u64 = 0;
    while let Some(chunk) = resp.chunk().await? {
        file.write_all(&chunk).await.map_err(|e| Error::io(path, e))?;
        total += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| Error::io(path, e))?;

    debug!(bytes = total, "Download stream finished");
    info!(bytes = total, "Downloaded");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::test_support::{FakeClient, response};

    #[tokio::test]
    async fn test_download_to_file_writes_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("naptan.csv");
        let client = FakeClient::new(vec![response(200, "ATCOCode\nA1\n")]);

        let req = request(Method::GET, "https://example.test/naptan.csv").unwrap();
        let bytes = download_to_file(&client, req, &path).await.unwrap();

        assert_eq!(bytes, 12);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ATCOCode\nA1\n");
        assert_eq!(client.requests()[0].url, "https://example.test/naptan.csv");
    }

    #[tokio::test]
    async fn test_error_status_is_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("naptan.csv");
        let client = FakeClient::new(vec![response(503, "unavailable")]);

        let req = request(Method::GET, "https://example.test/naptan.csv").unwrap();
        let err = download_to_file(&client, req, &path).await.unwrap_err();

        assert!(matches!(err, Error::Transport { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_request_rejects_invalid_url() {
        let err = request(Method::GET, "not a url").unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }
}
