//! Authenticated access to the external services.
//!
//! [`AccessKey`] decorates any [`HttpClient`](super::HttpClient) with a fixed
//! key header. [`PortalSession`] logs in to the bus-data portal with a
//! form and a CSRF token and then downloads the timetable archive.

mod access_key;
mod portal;

pub use access_key::AccessKey;
pub use portal::{PORTAL_ORIGIN, PortalSession, extract_csrf_token};
