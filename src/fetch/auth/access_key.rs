use crate::error::Result;
use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};

/// An [`HttpClient`] wrapper that sends an API key in the `AccessKey` header,
/// as the CDN storage and purge APIs expect.
pub struct AccessKey<C> {
    inner: C,
    header_name: HeaderName,
    key: HeaderValue,
}

impl<C> AccessKey<C> {
    pub const HEADER: &'static str = "AccessKey";

    /// # Errors
    ///
    /// Fails if `key` contains bytes not allowed in a header value.
    pub fn new(inner: C, key: &str) -> Result<Self> {
        let mut key = HeaderValue::from_str(key)?;
        key.set_sensitive(true);
        Ok(Self {
            inner,
            header_name: HeaderName::from_static("accesskey"),
            key,
        })
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for AccessKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(self.header_name.clone(), self.key.clone());
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::fetch::request;
    use crate::fetch::test_support::{FakeClient, response};
    use reqwest::Method;

    #[tokio::test]
    async fn test_injects_access_key_header() {
        let fake = FakeClient::new(vec![response(200, "")]);
        let client = AccessKey::new(fake.clone(), "secret-key").unwrap();

        let req = request(Method::GET, "https://api.example.test/purge").unwrap();
        client.execute(req).await.unwrap();

        let seen = fake.requests();
        assert_eq!(seen[0].header(AccessKey::<FakeClient>::HEADER), Some("secret-key"));
    }

    #[test]
    fn test_rejects_invalid_header_value() {
        let err = AccessKey::new(FakeClient::default(), "bad\nkey").err().unwrap();
        assert!(matches!(err, Error::InvalidHeader(_)));
    }
}
