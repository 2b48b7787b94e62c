use super::client::HttpClient;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub const USER_AGENT: &str = concat!("naptan_map/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new() -> Self {
        Self(reqwest::Client::new())
    }

    /// A client that keeps cookies across requests, for login flows.
    pub fn with_cookies(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self(client))
    }
}

impl Default for BasicClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.0.execute(req).await
    }
}
