use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

use crate::auth::SharedAuth;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3001";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub backend_url: String,
}

impl ClientConfig {
    /// Reads `BACKEND_URL`, falling back to the local development backend.
    pub fn from_env() -> Self {
        Self {
            backend_url: std::env::var("BACKEND_URL")
                .unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Json(Value),
    Text(String),
}

#[derive(Debug)]
pub enum ApiError {
    /// The backend refused the credential. It has been cleared; the user
    /// has to sign in again.
    Unauthorized,
    Status { status: u16, message: String },
    Request(reqwest::Error),
    Decode(serde_json::Error),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unauthorized => f.write_str("Unauthorized"),
            ApiError::Status { message, .. } => f.write_str(message),
            ApiError::Request(e) => write!(f, "request failed: {}", e),
            ApiError::Decode(e) => write!(f, "invalid json response: {}", e),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Request(e)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e)
    }
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: SharedAuth,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, auth: SharedAuth) -> Self {
        Self {
            client: Client::new(),
            base_url: config.backend_url.trim_end_matches('/').to_owned(),
            auth,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> Option<String> {
        let auth = self.auth.read().ok()?;
        auth.token().map(|token| format!("Bearer {}", token))
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, ApiError> {
        let mut builder = self
            .client
            .request(method.clone(), &self.url(path))
            .header(CONTENT_TYPE, "application/json");
        if let Some(bearer) = self.bearer() {
            builder = builder.header(AUTHORIZATION, bearer);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        log::debug!("{} {}", method, path);
        let response = builder.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_owned();
        let text = response.text().await?;
        self.finish(status, &content_type, text)
    }

    fn finish(
        &self,
        status: StatusCode,
        content_type: &str,
        text: String,
    ) -> Result<ApiResponse, ApiError> {
        if status == StatusCode::UNAUTHORIZED {
            log::warn!("Backend rejected the credential");
            if let Ok(mut auth) = self.auth.write() {
                auth.clear();
            }
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let message = if text.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_owned()
            } else {
                text
            };
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }
        if content_type.contains("application/json") {
            Ok(ApiResponse::Json(serde_json::from_str(&text)?))
        } else {
            Ok(ApiResponse::Text(text))
        }
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse, ApiError> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse, ApiError> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(Method::DELETE, path, None).await
    }
}
