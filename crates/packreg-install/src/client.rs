//! # Registry Client
//!
//! [`RegistryClient`] is the installer's only view of the registry. The
//! HTTP implementation wraps a `reqwest::Client` with the bearer token as a
//! default header and maps the registry's error envelope back into typed
//! [`ClientError`]s, so a `403 TIER_INSUFFICIENT` arrives as
//! `ClientError::TierInsufficient` with its upgrade link intact.

use std::time::Duration;

use async_trait::async_trait;
use packreg_core::wire::{
    AccountInfo, DownloadResponse, ErrorBody, LicenseKeyInfo, PackInfo, TierInsufficientDetails,
};
use packreg_core::PackSlug;
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::retry::retry_send;

/// Registry operations the installer needs.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Subject and tier of the configured token.
    async fn account(&self) -> Result<AccountInfo, ClientError>;

    async fn pack(&self, slug: &PackSlug) -> Result<PackInfo, ClientError>;

    /// Files and license in one response. `version` is a SemVer string or
    /// `latest`.
    async fn download(&self, slug: &PackSlug, version: &str)
        -> Result<DownloadResponse, ClientError>;

    /// The key that verifies this registry's licenses.
    async fn license_key(&self) -> Result<LicenseKeyInfo, ClientError>;
}

// ─── HTTP implementation ─────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRegistryClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = &config.token {
            headers.insert(
                reqwest::header::AUTHORIZATION,
                reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| ClientError::Config("invalid token characters".into()))?,
            );
        }
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;

        let base_url = config.registry_url.trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ClientError> {
        let url = format!("{}{endpoint}", self.base_url);
        tracing::debug!(%url, "registry request");
        let resp = retry_send(endpoint, || self.client.get(&url).send())
            .await
            .map_err(|source| ClientError::Http {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(error_from_response(endpoint, status.as_u16(), &body));
        }

        resp.json::<T>()
            .await
            .map_err(|source| ClientError::Deserialization {
                endpoint: endpoint.to_string(),
                source,
            })
    }
}

/// Decode the registry's `{"error": {...}}` envelope, falling back to the
/// raw body when it is absent.
fn error_from_response(endpoint: &str, status: u16, body: &str) -> ClientError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let (code, message, details) = match parsed {
        Some(b) => (b.error.code, b.error.message, b.error.details),
        None => (String::new(), body.to_string(), None),
    };

    if code == "TIER_INSUFFICIENT" {
        if let Some(d) =
            details.and_then(|d| serde_json::from_value::<TierInsufficientDetails>(d).ok())
        {
            return ClientError::TierInsufficient {
                current: d.current_tier,
                required: d.required_tier,
                upgrade_url: d.upgrade_url,
            };
        }
    }
    if status == 404 {
        return ClientError::NotFound {
            endpoint: endpoint.to_string(),
            message,
        };
    }
    ClientError::Api {
        endpoint: endpoint.to_string(),
        status,
        code,
        message,
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn account(&self) -> Result<AccountInfo, ClientError> {
        self.get_json("/v1/account").await
    }

    async fn pack(&self, slug: &PackSlug) -> Result<PackInfo, ClientError> {
        self.get_json(&format!("/v1/packs/{slug}")).await
    }

    async fn download(
        &self,
        slug: &PackSlug,
        version: &str,
    ) -> Result<DownloadResponse, ClientError> {
        self.get_json(&format!("/v1/packs/{slug}/versions/{version}/download"))
            .await
    }

    async fn license_key(&self) -> Result<LicenseKeyInfo, ClientError> {
        self.get_json("/v1/license/key").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packreg_core::Tier;

    #[test]
    fn tier_envelope_becomes_typed_error() {
        let body = serde_json::json!({
            "error": {
                "code": "TIER_INSUFFICIENT",
                "message": "tier free is insufficient; team required",
                "details": {
                    "current_tier": "free",
                    "required_tier": "team",
                    "upgrade_url": "https://example.test/up"
                }
            }
        })
        .to_string();
        match error_from_response("/x", 403, &body) {
            ClientError::TierInsufficient {
                current,
                required,
                upgrade_url,
            } => {
                assert_eq!(current, Tier::Free);
                assert_eq!(required, Tier::Team);
                assert_eq!(upgrade_url, "https://example.test/up");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn non_json_body_is_kept_verbatim() {
        match error_from_response("/x", 502, "bad gateway") {
            ClientError::Api {
                status, message, ..
            } => {
                assert_eq!(status, 502);
                assert_eq!(message, "bad gateway");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(error_from_response("/x", 503, "").is_transient());
        assert!(!error_from_response("/x", 409, "").is_transient());
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = HttpRegistryClient::new(&ClientConfig::new("http://r.test/", "/tmp")).unwrap();
        assert_eq!(client.base_url(), "http://r.test");
    }
}
