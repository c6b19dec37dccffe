use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    error::{ErrorCode, RemoteError},
    protocol::Command,
};
use tracing::{debug, warn};
use url::Url;

use crate::{executor::CommandExecutor, store::Topic};

/// HTTP backend: methods are `POST {server}/methods/{name}`, publications are
/// `GET {server}/publications/{name}`.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: Client,
    base: Url,
}

impl RemoteClient {
    pub fn new(server_url: &str) -> Result<Self> {
        let trimmed = server_url.trim().trim_end_matches('/');
        let base = Url::parse(&format!("{trimmed}/"))
            .with_context(|| format!("invalid server url: {server_url}"))?;
        if !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!("server url must start with http:// or https://");
        }
        Ok(Self {
            http: Client::new(),
            base,
        })
    }

    fn endpoint(&self, section: &str, name: &str) -> Result<Url> {
        self.base
            .join(&format!("{section}/{name}"))
            .with_context(|| format!("invalid {section} name: {name}"))
    }

    pub async fn fetch_publication<T: DeserializeOwned>(&self, topic: &Topic) -> Result<Vec<T>> {
        let url = self.endpoint("publications", &topic.name)?;
        let records = self
            .http
            .get(url)
            .query(&topic.params)
            .send()
            .await
            .with_context(|| format!("failed to fetch publication {topic}"))?
            .error_for_status()?
            .json::<Vec<T>>()
            .await
            .with_context(|| format!("invalid payload for publication {topic}"))?;
        debug!(%topic, records = records.len(), "publication fetched");
        Ok(records)
    }
}

#[async_trait]
impl CommandExecutor for RemoteClient {
    async fn invoke(&self, command: Command) -> Result<serde_json::Value, RemoteError> {
        let url = self
            .endpoint("methods", &command.name)
            .map_err(|err| RemoteError::internal(err.to_string()))?;
        debug!(command = %command.name, "invoking remote method");

        let response = self
            .http
            .post(url)
            .json(&command.payload)
            .send()
            .await
            .map_err(|err| RemoteError::transport(format!("failed to reach server: {err}")))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| RemoteError::transport(format!("failed to read reply: {err}")))?;

        if status.is_success() {
            if body.iter().all(u8::is_ascii_whitespace) {
                return Ok(serde_json::Value::Null);
            }
            return serde_json::from_slice(&body)
                .map_err(|err| RemoteError::internal(format!("invalid reply from server: {err}")));
        }

        let error = serde_json::from_slice::<RemoteError>(&body)
            .ok()
            .map(|mut error| {
                if error.code == ErrorCode::Unknown {
                    error.code = ErrorCode::from_wire(status.as_str());
                }
                error
            })
            .unwrap_or_else(|| status_error(status));
        warn!(command = %command.name, status = status.as_u16(), reason = %error.reason, "remote method failed");
        Err(error)
    }
}

fn status_error(status: StatusCode) -> RemoteError {
    RemoteError::new(
        ErrorCode::from_wire(status.as_str()),
        status
            .canonical_reason()
            .unwrap_or("remote command failed")
            .to_string(),
    )
}
