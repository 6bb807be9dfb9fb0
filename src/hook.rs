//! Inbound registry hook payload and its validation.

use serde::Deserialize;
use tracing::{error, info};

use crate::config::RelayConfig;
use crate::error::RelayError;

/// Registry push notification as sent by the image registry.
///
/// Only the fields the relay looks at are modelled; everything else in the
/// payload is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundHook {
    pub repository: Option<HookRepository>,
    pub push_data: Option<PushData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookRepository {
    pub repo_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushData {
    pub tag: Option<String>,
}

impl InboundHook {
    /// Parses a raw request body. Anything that is not a JSON object with the
    /// expected field types is a malformed payload.
    pub fn from_slice(body: &[u8]) -> Result<Self, RelayError> {
        serde_json::from_slice(body)
            .map_err(|e| RelayError::MalformedPayload(format!("invalid JSON body: {}", e)))
    }

    pub fn tag(&self) -> Option<&str> {
        self.push_data.as_ref().and_then(|p| p.tag.as_deref())
    }

    pub fn repo_name(&self) -> Option<&str> {
        self.repository.as_ref().and_then(|r| r.repo_name.as_deref())
    }
}

/// Why a hook was not turned into a trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Malformed(String),
    RepoMismatch { repo_name: Option<String> },
    TagPrefixMismatch { tag: String },
}

/// Outcome of validating one hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookVerdict {
    Accepted { repo_name: String, tag: String },
    Rejected(Rejection),
}

/// Repository and tag-prefix filter applied to every inbound hook.
#[derive(Debug, Clone)]
pub struct HookFilter {
    pub repo_name: String,
    pub tag_prefix: String,
}

impl HookFilter {
    pub fn new(repo_name: impl Into<String>, tag_prefix: impl Into<String>) -> Self {
        Self {
            repo_name: repo_name.into(),
            tag_prefix: tag_prefix.into(),
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.image_repo.clone(), config.image_tag_prefix.clone())
    }

    /// Classifies a hook and logs the decision.
    pub fn validate(&self, hook: &InboundHook) -> HookVerdict {
        let tag = hook.tag().filter(|t| !t.is_empty());
        let (Some(_), Some(tag)) = (hook.repository.as_ref(), tag) else {
            error!("Invalid hook payload: missing repository or push_data.tag");
            return HookVerdict::Rejected(Rejection::Malformed(
                "missing repository or push_data.tag".to_string(),
            ));
        };

        let repo_name = hook.repo_name();
        if repo_name != Some(self.repo_name.as_str()) {
            info!(
                "Received valid hook, but repo {:?} did not match expected '{}'. Ignored webhook.",
                repo_name, self.repo_name
            );
            return HookVerdict::Rejected(Rejection::RepoMismatch {
                repo_name: repo_name.map(String::from),
            });
        }

        if !tag.starts_with(&self.tag_prefix) {
            info!(
                "Received valid hook, but image tag '{}' did not match required prefix '{}'. Ignored webhook.",
                tag, self.tag_prefix
            );
            return HookVerdict::Rejected(Rejection::TagPrefixMismatch {
                tag: tag.to_string(),
            });
        }

        info!("Accepted hook for image {}:{}", self.repo_name, tag);
        HookVerdict::Accepted {
            repo_name: self.repo_name.clone(),
            tag: tag.to_string(),
        }
    }

    /// Parses and validates a raw body in one step.
    pub fn validate_body(&self, body: &[u8]) -> HookVerdict {
        match InboundHook::from_slice(body) {
            Ok(hook) => self.validate(&hook),
            Err(e) => {
                error!("{}", e);
                HookVerdict::Rejected(Rejection::Malformed(e.to_string()))
            }
        }
    }
}
