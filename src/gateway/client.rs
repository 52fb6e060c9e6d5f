//! Transport adapter to one remote session instance.
//!
//! Pure HTTP plumbing: every method is one remote call with a fixed timeout
//! and no business retries. Retrying and recovery belong to the services.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::normalize;
use crate::store::models::ConnectionSnapshot;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Could not reach the instance at all: connect failure or timeout.
    #[error("instance unreachable: {0}")]
    Unreachable(String),

    /// The instance answered with a non-success status.
    #[error("instance rejected request: {status}: {detail}")]
    Rejected { status: u16, detail: String },

    /// The instance answered 2xx but the body was not usable.
    #[error("invalid response payload: {0}")]
    InvalidPayload(String),
}

/// Outcome of a session-create request. The remote create is not idempotent,
/// so "already exists" is surfaced as its own success-shaped value rather
/// than an error the caller has to string-match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Scannable pairing credential for linking a messaging account.
#[derive(Debug, Clone)]
pub struct PairingArtifact {
    pub code: String,
    pub image_base64: Option<String>,
}

/// One remote instance's API surface, keyed by per-tenant session name.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn create_session(&self, session: &str) -> Result<CreateOutcome, ClientError>;

    /// `Ok(None)` means the session exists but has not produced a pairing
    /// artifact yet; callers poll on a bounded schedule.
    async fn fetch_pairing_artifact(
        &self,
        session: &str,
    ) -> Result<Option<PairingArtifact>, ClientError>;

    async fn connection_state(&self, session: &str) -> Result<ConnectionSnapshot, ClientError>;

    async fn delete_session(&self, session: &str) -> Result<(), ClientError>;

    async fn configure_webhook(
        &self,
        session: &str,
        callback_url: &str,
    ) -> Result<(), ClientError>;

    async fn send_text(&self, session: &str, to: &str, body: &str) -> Result<(), ClientError>;
}

/// reqwest-backed implementation against one instance base URL.
pub struct HttpGatewayClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpGatewayClient {
    pub fn new(
        base_url: Url,
        timeout: Duration,
        api_key: Option<String>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Unreachable(e.to_string()))?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::InvalidPayload(format!("bad endpoint {path}: {e}")))
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("apikey", key),
            None => req,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = self
            .apply_auth(req)
            .send()
            .await
            .map_err(|e| ClientError::Unreachable(e.to_string()))?;
        Ok(response)
    }

    async fn expect_json(&self, response: reqwest::Response) -> Result<Value, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| ClientError::InvalidPayload(e.to_string()))
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn create_session(&self, session: &str) -> Result<CreateOutcome, ClientError> {
        let url = self.endpoint("instance/create")?;
        let response = self
            .send(self.http.post(url).json(&json!({ "instanceName": session })))
            .await?;

        match response.status() {
            StatusCode::CONFLICT => Ok(CreateOutcome::AlreadyExists),
            status if status.is_success() => Ok(CreateOutcome::Created),
            status => {
                let detail = response.text().await.unwrap_or_default();
                // Some instance versions report duplicates as a 403 with a
                // "already in use" message instead of a 409.
                if status == StatusCode::FORBIDDEN && detail.contains("already") {
                    return Ok(CreateOutcome::AlreadyExists);
                }
                Err(ClientError::Rejected {
                    status: status.as_u16(),
                    detail,
                })
            }
        }
    }

    async fn fetch_pairing_artifact(
        &self,
        session: &str,
    ) -> Result<Option<PairingArtifact>, ClientError> {
        let url = self.endpoint(&format!("instance/connect/{session}"))?;
        let body = self.expect_json(self.send(self.http.get(url)).await?).await?;

        // The artifact has lived under "code" and "pairingCode"; the QR image
        // under "base64" and "qrcode.base64".
        let code = body
            .get("code")
            .or_else(|| body.get("pairingCode"))
            .and_then(Value::as_str)
            .unwrap_or("");
        if code.is_empty() {
            return Ok(None);
        }
        let image_base64 = body
            .get("base64")
            .or_else(|| body.get("qrcode").and_then(|q| q.get("base64")))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Some(PairingArtifact {
            code: code.to_string(),
            image_base64,
        }))
    }

    async fn connection_state(&self, session: &str) -> Result<ConnectionSnapshot, ClientError> {
        let url = self.endpoint(&format!("instance/connectionState/{session}"))?;
        let body = self.expect_json(self.send(self.http.get(url)).await?).await?;
        Ok(normalize::snapshot_from_value(&body))
    }

    async fn delete_session(&self, session: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&format!("instance/delete/{session}"))?;
        let response = self.send(self.http.delete(url)).await?;
        let status = response.status();
        // Deleting an absent session is a success for our purposes.
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let detail = response.text().await.unwrap_or_default();
        Err(ClientError::Rejected {
            status: status.as_u16(),
            detail,
        })
    }

    async fn configure_webhook(
        &self,
        session: &str,
        callback_url: &str,
    ) -> Result<(), ClientError> {
        let url = self.endpoint(&format!("webhook/set/{session}"))?;
        let payload = json!({
            "url": callback_url,
            "enabled": true,
            "events": ["connection.update", "messages.upsert"],
        });
        self.expect_json(self.send(self.http.post(url).json(&payload)).await?)
            .await?;
        Ok(())
    }

    async fn send_text(&self, session: &str, to: &str, body: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&format!("message/sendText/{session}"))?;
        let payload = json!({ "number": to, "text": body });
        self.expect_json(self.send(self.http.post(url).json(&payload)).await?)
            .await?;
        Ok(())
    }
}
