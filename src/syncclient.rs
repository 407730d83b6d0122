use std::fmt;
use std::sync::Arc;
use log::{error, warn};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use crate::bmerror::{BMError, BMResult};
use crate::transport::{HttpTransport, RawReply, Transport};

/// Outcome of one exchange with the device.
///
/// The status code travels next to the body instead of inside it. A status of
/// 300 or more is a failure reply, not an `Err`: callers branch on
/// [`Reply::is_success`]. On failure `body` holds the raw reply text.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub endpoint: String,
    pub status: u16,
    pub status_text: String,
    pub body: Value,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        self.status < 300
    }

    /// Top level field of an object body.
    pub fn field(&self, name: &str) -> BMResult<&Value> {
        let map = self.body.as_object().ok_or_else(|| BMError::UnexpectedShape {
            endpoint: self.endpoint.clone(),
            expected: "an object",
        })?;
        map.get(name).ok_or_else(|| BMError::MissingField {
            endpoint: self.endpoint.clone(),
            field: name.to_string(),
        })
    }

    pub fn json<T: DeserializeOwned>(&self) -> BMResult<T> {
        Ok(T::deserialize(&self.body)?)
    }

    fn from_raw(endpoint: &str, raw: RawReply) -> Reply {
        let body = if raw.status < 300 {
            parse_body(endpoint, &raw.body)
        } else {
            error!("Error {} {}: {} {}", raw.status, raw.status_text, endpoint, raw.body);
            Value::String(raw.body)
        };
        Reply {
            endpoint: endpoint.to_string(),
            status: raw.status,
            status_text: raw.status_text,
            body,
        }
    }
}

fn parse_body(endpoint: &str, text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Object(Map::new());
    }
    match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!("Unparseable body from {}: {}", endpoint, e);
            Value::Object(Map::new())
        }
    }
}

/// Single-shot request/response access to the control endpoints.
///
/// Every call performs exactly one exchange and waits for it; there is no
/// timeout and no retry.
#[derive(Clone)]
pub struct SyncClient {
    base_address: String,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncClient").field("base_address", &self.base_address).finish()
    }
}

impl SyncClient {
    pub fn new(base_address: impl Into<String>) -> SyncClient {
        SyncClient::with_transport(base_address, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(base_address: impl Into<String>, transport: Arc<dyn Transport>) -> SyncClient {
        SyncClient {
            base_address: base_address.into(),
            transport,
        }
    }

    pub fn base_address(&self) -> &str {
        &self.base_address
    }

    pub async fn get(&self, endpoint: &str) -> BMResult<Reply> {
        self.exchange(Method::GET, endpoint, None).await
    }

    pub async fn put<T: Serialize + ?Sized>(&self, endpoint: &str, payload: &T) -> BMResult<Reply> {
        let payload = serde_json::to_value(payload)?;
        self.exchange(Method::PUT, endpoint, Some(&payload)).await
    }

    pub async fn send<T: Serialize + ?Sized>(&self, method: Method, endpoint: &str,
            payload: Option<&T>) -> BMResult<Reply> {
        let payload = payload.map(serde_json::to_value).transpose()?;
        self.exchange(method, endpoint, payload.as_ref()).await
    }

    async fn exchange(&self, method: Method, endpoint: &str, payload: Option<&Value>) -> BMResult<Reply> {
        let url = format!("{}{}", self.base_address, endpoint);
        let raw = self.transport.exchange(method, &url, payload).await?;
        Ok(Reply::from_raw(endpoint, raw))
    }
}
