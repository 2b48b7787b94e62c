//! In-memory [`HttpClient`] for exercising request flows without a network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::{Request, Response};

use super::HttpClient;

/// What the fake saw of one request.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl SeenRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Replays canned responses in order and records every request.
#[derive(Clone, Default)]
pub struct FakeClient {
    responses: Arc<Mutex<VecDeque<Response>>>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl FakeClient {
    pub fn new(responses: Vec<Response>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            seen: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for FakeClient {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        let body = req
            .body()
            .and_then(|b| b.as_bytes())
            .map(|b| String::from_utf8_lossy(b).into_owned());
        let headers = req
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        self.seen.lock().unwrap().push(SeenRequest {
            method: req.method().to_string(),
            url: req.url().to_string(),
            headers,
            body,
        });

        let next = self.responses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| response(404, "no canned response")))
    }
}

pub fn response(status: u16, body: &str) -> Response {
    http::Response::builder()
        .status(status)
        .body(body.to_string())
        .unwrap()
        .into()
}
