use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use crate::bmerror::BMResult;

/// What came back on the wire, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

/// One request, one reply. Implementations must not retry.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn exchange(&self, method: Method, url: &str, body: Option<&Value>) -> BMResult<RawReply>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> HttpTransport {
        // no timeout: an unresponsive device keeps the caller waiting
        HttpTransport { http: reqwest::Client::new() }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn exchange(&self, method: Method, url: &str, body: Option<&Value>) -> BMResult<RawReply> {
        let mut req = self.http.request(method, url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let status_text = status.canonical_reason().unwrap_or("").to_string();
        let body = resp.text().await?;
        Ok(RawReply {
            status: status.as_u16(),
            status_text,
            body,
        })
    }
}
