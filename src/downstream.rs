//! Downstream APIs: TaaS (diagnostics and release hooks) and the Akkeris
//! controller (release listings).
//!
//! Endpoints used:
//!   * GET  {TAAS_URL}/v1/diagnostic/{test}
//!   * GET  {AKKERIS_API_URL}/apps/{app}-{space}/releases
//!   * POST {TAAS_URL}/v1/releasehook

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};

/// Last known run of a TaaS test, including the app and space it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub app: String,
    pub space: String,
    pub id: String,
    pub action: String,
    pub result: String,
}

impl DiagnosticRecord {
    /// Akkeris application key, `{app}-{space}`.
    pub fn app_key(&self) -> String {
        format!("{}-{}", self.app, self.space)
    }
}

/// One Akkeris release. Only the id is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerApp {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSpace {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRelease {
    pub result: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerBuild {
    pub id: String,
}

/// Body of the release hook POSTed to TaaS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPayload {
    pub action: String,
    pub app: TriggerApp,
    pub space: TriggerSpace,
    pub release: TriggerRelease,
    pub build: TriggerBuild,
}

impl TriggerPayload {
    /// Builds the payload from a diagnostic record and the chosen release.
    /// The build id is never tracked and is always empty.
    pub fn new(diagnostic: DiagnosticRecord, release_id: String) -> Self {
        Self {
            action: diagnostic.action,
            app: TriggerApp {
                id: diagnostic.id,
                name: diagnostic.app,
            },
            space: TriggerSpace {
                name: diagnostic.space,
            },
            release: TriggerRelease {
                result: diagnostic.result,
                id: release_id,
            },
            build: TriggerBuild::default(),
        }
    }
}

/// Calls the relay makes to the outside world.
#[async_trait]
pub trait ReleaseApi: Send + Sync {
    async fn fetch_diagnostic(&self, test_name: &str) -> Result<DiagnosticRecord>;

    /// Releases for `{app}-{space}`, oldest first.
    async fn fetch_releases(&self, app_key: &str) -> Result<Vec<Release>>;

    async fn post_release_hook(&self, tag: &str, payload: &TriggerPayload) -> Result<()>;
}

/// reqwest-backed implementation.
#[derive(Debug, Clone)]
pub struct HttpReleaseApi {
    http: Client,
    taas_url: String,
    akkeris_api_url: String,
    token: String, // sent verbatim as the Authorization header
}

impl HttpReleaseApi {
    pub fn new(http: Client, taas_url: String, akkeris_api_url: String, token: String) -> Self {
        debug!(
            "Creating HttpReleaseApi with taas_url={} akkeris_api_url={}",
            taas_url, akkeris_api_url
        );
        Self {
            http,
            taas_url,
            akkeris_api_url,
            token,
        }
    }

    /// Client with the configured request timeout applied to every call.
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RelayError::StartupConfig(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::new(
            http,
            config.taas_url.clone(),
            config.akkeris_api_url.clone(),
            config.api_token.clone(),
        ))
    }
}

#[async_trait]
impl ReleaseApi for HttpReleaseApi {
    async fn fetch_diagnostic(&self, test_name: &str) -> Result<DiagnosticRecord> {
        let url = format!("{}/v1/diagnostic/{}", self.taas_url, test_name);
        debug!("TaaS fetch_diagnostic: {}", url);

        let to_error = |e: reqwest::Error| RelayError::DiagnosticFetch {
            test_name: test_name.to_string(),
            message: e.to_string(),
        };

        self.http
            .get(url)
            .send()
            .await
            .map_err(to_error)?
            .error_for_status()
            .map_err(to_error)?
            .json()
            .await
            .map_err(to_error)
    }

    async fn fetch_releases(&self, app_key: &str) -> Result<Vec<Release>> {
        let url = format!("{}/apps/{}/releases", self.akkeris_api_url, app_key);
        debug!("Akkeris fetch_releases: {}", url);

        let to_error = |e: reqwest::Error| RelayError::ReleaseFetch {
            app: app_key.to_string(),
            message: e.to_string(),
        };

        self.http
            .get(url)
            .header("Authorization", &self.token)
            .send()
            .await
            .map_err(to_error)?
            .error_for_status()
            .map_err(to_error)?
            .json()
            .await
            .map_err(to_error)
    }

    async fn post_release_hook(&self, tag: &str, payload: &TriggerPayload) -> Result<()> {
        let url = format!("{}/v1/releasehook", self.taas_url);
        debug!("TaaS post_release_hook: {}", url);

        let to_error = |e: reqwest::Error| RelayError::Dispatch {
            tag: tag.to_string(),
            message: e.to_string(),
        };

        self.http
            .post(url)
            .header("Authorization", &self.token)
            .json(payload)
            .send()
            .await
            .map_err(to_error)?
            .error_for_status()
            .map_err(to_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_shape_matches_taas_release_hook() {
        let diagnostic = DiagnosticRecord {
            app: "foo".into(),
            space: "prod".into(),
            id: "x".into(),
            action: "create".into(),
            result: "succeeded".into(),
        };
        assert_eq!(diagnostic.app_key(), "foo-prod");

        let payload = TriggerPayload::new(diagnostic, "r2".into());
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "action": "create",
                "app": { "id": "x", "name": "foo" },
                "space": { "name": "prod" },
                "release": { "result": "succeeded", "id": "r2" },
                "build": { "id": "" }
            })
        );
    }

    #[test]
    fn release_ignores_extra_fields() {
        let releases: Vec<Release> = serde_json::from_value(json!([
            { "id": "r1", "version": 1, "description": "Deploy abc" },
            { "id": "r2", "version": 2 }
        ]))
        .unwrap();
        assert_eq!(releases.last().map(|r| r.id.as_str()), Some("r2"));
    }
}
