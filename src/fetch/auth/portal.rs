use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderValue, ORIGIN, REFERER};
use tracing::info;

use crate::config::PortalCredentials;
use crate::error::{Error, Result};
use crate::fetch::client::HttpClient;
use crate::fetch::{download_to_file, fetch_bytes, request};

pub const PORTAL_ORIGIN: &str = "https://data.bus-data.dft.gov.uk";

const LOGIN_PATH: &str = "/account/login/";
const DOWNLOAD_PAGE_PATH: &str = "/timetable/download/";
const GTFS_ALL_PATH: &str = "/timetable/download/gtfs-file/all/";
const CSRF_FIELD: &str = "csrfmiddlewaretoken";

static INPUT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<input\b[^>]*>").expect("static regex"));
static CSRF_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bname\s*=\s*["']?csrfmiddlewaretoken["'\s>/]"#).expect("static regex")
});
static VALUE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bvalue\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).expect("static regex")
});

/// A logged-in session on the bus-data portal.
///
/// The wrapped client must keep cookies between requests
/// (see [`BasicClient::with_cookies`](crate::fetch::BasicClient::with_cookies)).
pub struct PortalSession<C> {
    client: C,
    origin: String,
}

impl<C: HttpClient> PortalSession<C> {
    /// Fetches the login form for its CSRF token and submits the credentials.
    #[tracing::instrument(skip(client, credentials), fields(username = %credentials.username))]
    pub async fn login(client: C, origin: &str, credentials: &PortalCredentials) -> Result<Self> {
        let origin = origin.trim_end_matches('/').to_string();
        let login_url = format!("{origin}{LOGIN_PATH}");

        let page = fetch_bytes(&client, request(Method::GET, &login_url)?).await?;
        let token = extract_csrf_token(&String::from_utf8_lossy(&page))
            .ok_or_else(|| Error::transport(&login_url, "login page has no csrf token"))?;

        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair(CSRF_FIELD, &token)
            .append_pair("login", &credentials.username)
            .append_pair("password", &credentials.password)
            .append_pair("submit", "submit")
            .finish();

        let mut req = request(Method::POST, &login_url)?;
        let headers = req.headers_mut();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        headers.insert(REFERER, HeaderValue::from_str(&login_url)?);
        headers.insert(ORIGIN, HeaderValue::from_str(&origin)?);
        *req.body_mut() = Some(form.into());

        client.execute(req).await?.error_for_status()?;
        info!("Logged in to bus data portal");

        Ok(Self { client, origin })
    }

    /// Streams the all-regions GTFS archive to `out`.
    pub async fn download_gtfs(&self, out: &Path) -> Result<u64> {
        let url = format!("{}{GTFS_ALL_PATH}", self.origin);
        info!(url = %url, "Downloading timetable archive");

        let mut req = request(Method::GET, &url)?;
        let headers = req.headers_mut();
        headers.insert(
            REFERER,
            HeaderValue::from_str(&format!("{}{DOWNLOAD_PAGE_PATH}", self.origin))?,
        );
        headers.insert(ORIGIN, HeaderValue::from_str(&self.origin)?);

        download_to_file(&self.client, req, out).await
    }
}

/// Returns the non-empty value of the `csrfmiddlewaretoken` input in `html`.
pub fn extract_csrf_token(html: &str) -> Option<String> {
    INPUT_TAG
        .find_iter(html)
        .map(|tag| tag.as_str())
        .find(|tag| CSRF_NAME.is_match(tag))
        .and_then(|tag| VALUE_ATTR.captures(tag))
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| m.as_str().to_string())
        .filter(|token| !token.is_empty())
}
