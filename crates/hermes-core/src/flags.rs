//! Portal feature flags.
//!
//! Loaded once at startup and handed to whoever needs them. The JSON file
//! uses camelCase keys. Unknown keys are ignored and missing keys take their
//! defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureFlags {
    pub chat_enabled: bool,
    pub document_upload_enabled: bool,
    pub moderation_enabled: bool,
    pub language: String,
    pub timezone: String,
    pub weekly_reports: bool,
    pub storage_provider: String,
    pub sso_endpoint: String,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            chat_enabled: true,
            document_upload_enabled: true,
            moderation_enabled: false,
            language: "es".to_owned(),
            timezone: "mx".to_owned(),
            weekly_reports: true,
            storage_provider: "local".to_owned(),
            sso_endpoint: String::new(),
        }
    }
}

impl FeatureFlags {
    /// Parse flags from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if `json` is not an object with
    /// correctly typed values.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load flags from `path`, or return the defaults.
    ///
    /// A missing path yields the defaults silently. An unreadable or invalid
    /// file yields the defaults with a warning.
    #[must_use]
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        let loaded = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|raw| Self::from_json(&raw).map_err(|e| e.to_string()));

        match loaded {
            Ok(flags) => {
                info!(path = %path.display(), "feature flags loaded");
                flags
            }
            Err(reason) => {
                warn!(path = %path.display(), %reason, "feature flags unavailable, using defaults");
                Self::default()
            }
        }
    }

    /// Whether a named feature is enabled.
    ///
    /// Recognises `chat`, `documentUpload` and `moderation`. Every other
    /// feature is allowed.
    #[must_use]
    pub fn has_feature(&self, feature: &str) -> bool {
        match feature {
            "chat" => self.chat_enabled,
            "documentUpload" => self.document_upload_enabled,
            "moderation" => self.moderation_enabled,
            _ => true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn defaults_match_portal_config() {
        let flags = FeatureFlags::default();
        assert!(flags.chat_enabled);
        assert!(flags.document_upload_enabled);
        assert!(!flags.moderation_enabled);
        assert_eq!(flags.language, "es");
        assert_eq!(flags.timezone, "mx");
        assert_eq!(flags.storage_provider, "local");
        assert!(flags.sso_endpoint.is_empty());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let flags =
            FeatureFlags::from_json(r#"{"documentUploadEnabled": false, "openaiApiKey": "x"}"#)
                .unwrap();
        assert!(!flags.document_upload_enabled);
        assert!(flags.chat_enabled);
        assert_eq!(flags.language, "es");
    }

    #[test]
    fn serialises_with_camel_case_keys() {
        let value = serde_json::to_value(FeatureFlags::default()).unwrap();
        assert_eq!(value["documentUploadEnabled"], true);
        assert_eq!(value["ssoEndpoint"], "");
        assert!(value.get("document_upload_enabled").is_none());
    }

    #[test]
    fn has_feature_covers_known_and_unknown_names() {
        let flags = FeatureFlags {
            chat_enabled: false,
            moderation_enabled: true,
            ..FeatureFlags::default()
        };
        assert!(!flags.has_feature("chat"));
        assert!(flags.has_feature("documentUpload"));
        assert!(flags.has_feature("moderation"));
        assert!(flags.has_feature("weeklyDigest"));
    }

    #[test]
    fn load_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"language": "en", "moderationEnabled": true}"#).unwrap();

        let flags = FeatureFlags::load(Some(&path));
        assert_eq!(flags.language, "en");
        assert!(flags.moderation_enabled);
    }

    #[test]
    fn load_falls_back_on_missing_or_invalid_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.json");
        assert_eq!(FeatureFlags::load(Some(&missing)), FeatureFlags::default());

        let invalid = dir.path().join("bad.json");
        std::fs::write(&invalid, "{\"chatEnabled\": \"yes\"}").unwrap();
        assert_eq!(FeatureFlags::load(Some(&invalid)), FeatureFlags::default());

        assert_eq!(FeatureFlags::load(None), FeatureFlags::default());
    }
}
