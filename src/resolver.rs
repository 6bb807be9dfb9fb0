//! Resolves the trigger payload for a test from TaaS and Akkeris.

use std::sync::Arc;
use tracing::{debug, info};

use crate::downstream::{ReleaseApi, TriggerPayload};
use crate::error::{RelayError, Result};

#[derive(Clone)]
pub struct ReleaseResolver {
    api: Arc<dyn ReleaseApi>,
}

impl ReleaseResolver {
    pub fn new(api: Arc<dyn ReleaseApi>) -> Self {
        Self { api }
    }

    /// Looks up the app the test targets and its most recent release.
    ///
    /// The release list is taken in the order Akkeris returns it; the last
    /// entry is the current release.
    pub async fn resolve(&self, test_name: &str) -> Result<TriggerPayload> {
        let diagnostic = self.api.fetch_diagnostic(test_name).await?;
        let app_key = diagnostic.app_key();
        debug!(
            "Test '{}' targets app '{}' (last action '{}', result '{}')",
            test_name, app_key, diagnostic.action, diagnostic.result
        );

        let mut releases = self.api.fetch_releases(&app_key).await?;
        let release = releases
            .pop()
            .ok_or_else(|| RelayError::NoReleases { app: app_key.clone() })?;

        info!("Latest release for '{}' is {}", app_key, release.id);
        Ok(TriggerPayload::new(diagnostic, release.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downstream::{DiagnosticRecord, Release};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StubApi {
        releases: Vec<Release>,
        fail_diagnostic: bool,
        release_calls: Mutex<Vec<String>>,
    }

    impl StubApi {
        fn with_releases(ids: &[&str]) -> Self {
            Self {
                releases: ids.iter().map(|id| Release { id: id.to_string() }).collect(),
                fail_diagnostic: false,
                release_calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ReleaseApi for StubApi {
        async fn fetch_diagnostic(&self, test_name: &str) -> Result<DiagnosticRecord> {
            if self.fail_diagnostic {
                return Err(RelayError::DiagnosticFetch {
                    test_name: test_name.to_string(),
                    message: "connection refused".into(),
                });
            }
            Ok(DiagnosticRecord {
                app: "foo".into(),
                space: "prod".into(),
                id: "x".into(),
                action: "create".into(),
                result: "succeeded".into(),
            })
        }

        async fn fetch_releases(&self, app_key: &str) -> Result<Vec<Release>> {
            self.release_calls.lock().unwrap().push(app_key.to_string());
            Ok(self.releases.clone())
        }

        async fn post_release_hook(&self, _tag: &str, _payload: &TriggerPayload) -> Result<()> {
            unreachable!("resolver never dispatches")
        }
    }

    #[tokio::test]
    async fn picks_last_release() {
        let api = Arc::new(StubApi::with_releases(&["r1", "r2"]));
        let payload = ReleaseResolver::new(api.clone())
            .resolve("ui-tests-taas")
            .await
            .unwrap();

        assert_eq!(payload.release.id, "r2");
        assert_eq!(payload.release.result, "succeeded");
        assert_eq!(payload.app.name, "foo");
        assert_eq!(payload.app.id, "x");
        assert_eq!(payload.space.name, "prod");
        assert_eq!(payload.action, "create");
        assert_eq!(payload.build.id, "");
        assert_eq!(*api.release_calls.lock().unwrap(), vec!["foo-prod".to_string()]);
    }

    #[tokio::test]
    async fn empty_release_list_is_an_error() {
        let api = Arc::new(StubApi::with_releases(&[]));
        let err = ReleaseResolver::new(api).resolve("t").await.unwrap_err();
        assert!(matches!(err, RelayError::NoReleases { ref app } if app == "foo-prod"));
    }

    #[tokio::test]
    async fn diagnostic_failure_stops_before_release_lookup() {
        let mut stub = StubApi::with_releases(&["r1"]);
        stub.fail_diagnostic = true;
        let api = Arc::new(stub);
        let err = ReleaseResolver::new(api.clone()).resolve("t").await.unwrap_err();
        assert!(matches!(err, RelayError::DiagnosticFetch { .. }));
        assert!(api.release_calls.lock().unwrap().is_empty());
    }
}
