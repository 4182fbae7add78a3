//! OAuth2 client-credentials token acquisition
//!
//! The engine only needs "attach a bearer token to subsequent requests"; the
//! token itself is opaque. A [`BearerToken`] is an immutable snapshot scoped
//! to one workflow run — re-authenticating never mutates a token another
//! in-flight run is using.

use crate::transport::{Method, Transport, TransportRequest};
use crate::utils::error::{BatchError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Client id/secret pair for the client-credentials grant.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

// Secrets must not leak through debug logging.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Immutable bearer token for one workflow run.
#[derive(Clone)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn from_raw(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// `Authorization` header value.
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Exchange client credentials for a bearer token.
///
/// Sends `grant_type=client_credentials` with HTTP Basic auth and pulls
/// `access_token` out of the JSON response. Any non-success response from the
/// token endpoint is an `Authentication` error — fatal, never retried.
pub async fn authenticate(
    transport: &dyn Transport,
    token_url: &str,
    credentials: &Credentials,
) -> Result<BearerToken> {
    let basic = STANDARD.encode(format!(
        "{}:{}",
        credentials.client_id, credentials.client_secret
    ));

    let request = TransportRequest {
        method: Method::Post,
        url: token_url.to_string(),
        headers: vec![
            ("Authorization".to_string(), format!("Basic {basic}")),
            (
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            ),
            ("Accept".to_string(), "application/json".to_string()),
        ],
        body: Some(b"grant_type=client_credentials".to_vec()),
    };

    let response = transport.send(request).await?;
    if !response.is_success() {
        return Err(BatchError::Authentication(format!(
            "token endpoint returned {}: {}",
            response.status,
            response.body_text()
        )));
    }

    let body: Value = serde_json::from_slice(&response.body).map_err(|e| {
        BatchError::Authentication(format!("unparseable token response: {e}"))
    })?;
    let token = body
        .get("access_token")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            BatchError::Authentication("token response missing access_token".to_string())
        })?;

    debug!(client_id = %credentials.client_id, "acquired bearer token");
    Ok(BearerToken(token.to_string()))
}
