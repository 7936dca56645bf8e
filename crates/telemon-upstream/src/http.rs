//! reqwest-backed upstream client.
//!
//! Every call is a JSON `POST` answered by an envelope of the form
//! `{"resultCode": "...", "resultDesc": "...", "data": ...}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use telemon_types::{Credentials, FluxPackage, ImportantData, mask_username};

use crate::client::{LoginTicket, UpstreamClient, UpstreamSession};
use crate::error::{Result, UpstreamError};

/// Result code for a successful call.
const CODE_OK: &str = "0000";

/// Result code the provider uses for an expired session.
const CODE_SESSION_EXPIRED: &str = "X201";

/// Header carrying the session token.
const SESSION_HEADER: &str = "X-Session-Token";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CLIENT_VERSION: &str = "telemon/0.1";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for [`HttpUpstream`].
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the provider API, without trailing slash.
    pub base_url: String,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Client version string sent on login.
    pub client_version: String,
}

impl UpstreamConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            client_version: DEFAULT_CLIENT_VERSION.to_string(),
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the client version sent on login.
    pub fn with_client_version(mut self, version: impl Into<String>) -> Self {
        self.client_version = version.into();
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    phonenum: &'a str,
    password: &'a str,
    client_version: &'a str,
}

#[derive(Serialize)]
struct FetchRequest<'a> {
    phonenum: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    result_code: String,
    #[serde(default)]
    result_desc: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct LoginData {
    token: String,
}

impl Envelope {
    /// Unwrap the payload, mapping provider result codes to errors.
    fn into_data<T: DeserializeOwned>(self) -> Result<T> {
        match self.result_code.as_str() {
            CODE_OK => {
                let data = self
                    .data
                    .ok_or_else(|| UpstreamError::Decode("missing data".to_string()))?;
                Ok(serde_json::from_value(data)?)
            }
            CODE_SESSION_EXPIRED => Err(UpstreamError::SessionExpired),
            _ => Err(UpstreamError::Rejected {
                code: self.result_code,
                msg: self.result_desc,
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HttpUpstream
// ─────────────────────────────────────────────────────────────────────────────

/// Upstream client speaking the provider's JSON envelope protocol.
pub struct HttpUpstream {
    client: Client,
    config: UpstreamConfig,
}

impl HttpUpstream {
    /// Create a client with the given configuration.
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| UpstreamError::Network(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        token: Option<&str>,
    ) -> Result<T> {
        let mut request = self.client.post(self.endpoint(path)).json(body);
        if let Some(token) = token {
            request = request.header(SESSION_HEADER, token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(UpstreamError::SessionExpired);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Rejected {
                code: status.as_u16().to_string(),
                msg: text,
            });
        }

        let bytes = response.bytes().await?;
        let envelope: Envelope = serde_json::from_slice(&bytes)?;
        envelope.into_data()
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn login(&self, credentials: &Credentials) -> Result<LoginTicket> {
        tracing::debug!(username = %mask_username(&credentials.username), "Upstream login");
        let body = LoginRequest {
            phonenum: &credentials.username,
            password: &credentials.password,
            client_version: &self.config.client_version,
        };
        let data: LoginData = self.post("login", &body, None).await?;
        if data.token.is_empty() {
            return Err(UpstreamError::Decode("empty token".to_string()));
        }
        Ok(LoginTicket { token: data.token })
    }

    async fn important_data(&self, session: &UpstreamSession) -> Result<ImportantData> {
        tracing::debug!(username = %mask_username(&session.username), "Fetching important data");
        let body = FetchRequest {
            phonenum: &session.username,
        };
        self.post("qryImportantData", &body, Some(&session.token))
            .await
    }

    async fn flux_package(&self, session: &UpstreamSession) -> Result<FluxPackage> {
        tracing::debug!(username = %mask_username(&session.username), "Fetching flux package");
        let body = FetchRequest {
            phonenum: &session.username,
        };
        self.post("userFluxPackage", &body, Some(&session.token))
            .await
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Json;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::Router;
    use serde_json::{Value, json};

    async fn login(Json(body): Json<Value>) -> Json<Value> {
        if body["password"] == "secret" && body["clientVersion"] == "test/1" {
            Json(json!({"resultCode": "0000", "resultDesc": "ok", "data": {"token": "tok-1"}}))
        } else {
            Json(json!({"resultCode": "1001", "resultDesc": "bad password"}))
        }
    }

    async fn important(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
        if headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) != Some("tok-1") {
            return Json(json!({"resultCode": "X201", "resultDesc": "session expired"}));
        }
        Json(json!({
            "resultCode": "0000",
            "resultDesc": "ok",
            "data": {
                "phonenum": body["phonenum"],
                "balance": 1200,
                "voiceUsage": 3,
                "voiceTotal": 100,
                "flowItems": [{"name": "Domestic", "category": "common", "use": 512000, "total": 1048576}]
            }
        }))
    }

    async fn flux() -> Json<Value> {
        Json(json!({"resultCode": "0000", "data": "not a package"}))
    }

    async fn spawn_fake() -> String {
        let app = Router::new()
            .route("/login", post(login))
            .route("/qryImportantData", post(important))
            .route("/userFluxPackage", post(flux));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn client(base: String) -> HttpUpstream {
        HttpUpstream::new(UpstreamConfig::new(base).with_client_version("test/1")).unwrap()
    }

    #[test]
    fn test_envelope_codes() {
        let ok: Envelope =
            serde_json::from_value(json!({"resultCode": "0000", "data": {"token": "t"}})).unwrap();
        let data: LoginData = ok.into_data().unwrap();
        assert_eq!(data.token, "t");

        let expired: Envelope = serde_json::from_value(json!({"resultCode": "X201"})).unwrap();
        assert_eq!(
            expired.into_data::<LoginData>().err(),
            Some(UpstreamError::SessionExpired)
        );

        let missing: Envelope = serde_json::from_value(json!({"resultCode": "0000"})).unwrap();
        assert!(matches!(
            missing.into_data::<LoginData>(),
            Err(UpstreamError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_login_and_fetch() {
        let upstream = client(spawn_fake().await);

        let ticket = upstream
            .login(&Credentials::new("13812345678", "secret"))
            .await
            .unwrap();
        assert_eq!(ticket.token, "tok-1");

        let session = UpstreamSession::new("13812345678", ticket.token);
        let data = upstream.important_data(&session).await.unwrap();
        assert_eq!(data.phonenum, "13812345678");
        assert_eq!(data.flow_items.len(), 1);
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let upstream = client(spawn_fake().await);
        let err = upstream
            .login(&Credentials::new("13812345678", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err, UpstreamError::rejected("1001", "bad password"));
    }

    #[tokio::test]
    async fn test_expired_session() {
        let upstream = client(spawn_fake().await);
        let session = UpstreamSession::new("13812345678", "stale");
        let err = upstream.important_data(&session).await.unwrap_err();
        assert_eq!(err, UpstreamError::SessionExpired);
    }

    #[tokio::test]
    async fn test_bad_payload_is_decode_error() {
        let upstream = client(spawn_fake().await);
        let session = UpstreamSession::new("13812345678", "tok-1");
        let err = upstream.flux_package(&session).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_is_network_error() {
        // Bind and drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let upstream = client(format!("http://{addr}"));
        let err = upstream
            .login(&Credentials::new("13812345678", "secret"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
