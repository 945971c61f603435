//! Signed connection credentials
//!
//! The kiosk backend hands out short-lived signed URLs for the voice agent so
//! the API key never reaches this host.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error};

use super::error::SessionError;

/// Source of signed voice-session URLs
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn signed_url(&self) -> Result<String, SessionError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignedUrlResponse {
    signed_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentIdResponse {
    agent_id: String,
}

/// Fetches credentials from the kiosk backend over HTTP
#[derive(Debug, Clone)]
pub struct HttpCredentialProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCredentialProvider {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// The voice agent the backend is configured for
    pub async fn agent_id(&self) -> Result<String> {
        let response: AgentIdResponse = self
            .get_json("/api/getAgentId")
            .await
            .context("failed to get agent id")?;
        Ok(response.agent_id)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> reqwest::Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "requesting credentials");
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl CredentialProvider for HttpCredentialProvider {
    async fn signed_url(&self) -> Result<String, SessionError> {
        match self.get_json::<SignedUrlResponse>("/api/signed-url").await {
            Ok(response) => Ok(response.signed_url),
            Err(e) => {
                error!(?e, "error getting signed url");
                Err(SessionError::CredentialFetchFailed(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer a single HTTP request with a canned response
    async fn serve_once(status: &str, body: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = stream.read(&mut buf).await.unwrap();
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
        });

        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_signed_url_fetched() {
        let base = serve_once("200 OK", r#"{"signedUrl":"wss://agent.test/convai?token=abc"}"#).await;
        let provider = HttpCredentialProvider::new(&base);

        let url = provider.signed_url().await.unwrap();
        assert_eq!(url, "wss://agent.test/convai?token=abc");
    }

    #[tokio::test]
    async fn test_non_success_status_fails() {
        let base = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let provider = HttpCredentialProvider::new(&base);

        let err = provider.signed_url().await.unwrap_err();
        assert!(matches!(err, SessionError::CredentialFetchFailed(_)));
    }

    #[tokio::test]
    async fn test_malformed_body_fails() {
        let base = serve_once("200 OK", r#"{"url":"missing-field"}"#).await;
        let provider = HttpCredentialProvider::new(&base);

        let err = provider.signed_url().await.unwrap_err();
        assert!(matches!(err, SessionError::CredentialFetchFailed(_)));
    }

    #[tokio::test]
    async fn test_agent_id_fetched() {
        let base = serve_once("200 OK", r#"{"agentId":"agent-42"}"#).await;
        let provider = HttpCredentialProvider::new(&base);

        assert_eq!(provider.agent_id().await.unwrap(), "agent-42");
    }

    #[tokio::test]
    async fn test_unreachable_backend_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provider = HttpCredentialProvider::new(&format!("http://{}", addr));
        tokio_test::assert_err!(provider.signed_url().await);
    }
}
