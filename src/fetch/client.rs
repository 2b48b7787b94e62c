use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes a prepared request. Implemented by the real client, by header
/// injecting wrappers, and by test doubles.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
