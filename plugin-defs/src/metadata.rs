use semver::Version;
use serde::{Deserialize, Serialize};

use crate::{is_valid_identifier, version_compatible};

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("not well-formed JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("declared api {declared} is incompatible with host api {host}")]
    IncompatibleApi { declared: Version, host: Version },
    #[error("'{0}' is not a valid plugin identifier")]
    InvalidName(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DependencySpec {
    pub name: String,
    pub version: Version,
}

/// The decoded contents of a plug-in's exported `metadata` symbol.
///
/// Field names match the JSON schema in spec.md §6 verbatim so `#[serde(rename)]`
/// is never needed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub api: Version,
    pub name: String,
    #[serde(rename = "prettyName")]
    pub pretty_name: String,
    pub version: Version,
    pub author: String,
    pub url: String,
    pub license: String,
    pub copyright: String,
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
}

impl PluginMetadata {
    /// Parses and validates a metadata blob against the host's expected API version.
    ///
    /// Folds every failure mode from spec.md §4.2 (malformed JSON, missing/incompatible
    /// `api`, missing required fields, malformed `dependencies`) into a single error —
    /// `serde`'s derive already rejects a document missing a required string field, so
    /// that case surfaces as `MetadataError::Malformed` without extra code here.
    pub fn decode(bytes: &[u8], host_api: &Version) -> Result<Self, MetadataError> {
        let meta: PluginMetadata = serde_json::from_slice(bytes)?;
        if !version_compatible(host_api, &meta.api) {
            return Err(MetadataError::IncompatibleApi {
                declared: meta.api,
                host: host_api.clone(),
            });
        }
        if !is_valid_identifier(&meta.name) {
            return Err(MetadataError::InvalidName(meta.name));
        }
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_api() -> Version {
        Version::new(1, 0, 0)
    }

    #[test]
    fn decodes_well_formed_document() {
        let json = br#"{
            "api": "1.0.0",
            "name": "greeter",
            "prettyName": "Greeter",
            "version": "1.0.0",
            "author": "someone",
            "url": "https://example.com",
            "license": "MIT",
            "copyright": "2026",
            "dependencies": []
        }"#;
        let meta = PluginMetadata::decode(json, &host_api()).unwrap();
        assert_eq!(meta.name, "greeter");
        assert!(meta.dependencies.is_empty());
    }

    #[test]
    fn rejects_malformed_json() {
        let err = PluginMetadata::decode(b"not json", &host_api()).unwrap_err();
        assert!(matches!(err, MetadataError::Malformed(_)));
    }

    #[test]
    fn rejects_incompatible_api() {
        let json = br#"{
            "api": "2.0.0",
            "name": "greeter",
            "prettyName": "Greeter",
            "version": "1.0.0",
            "author": "someone",
            "url": "",
            "license": "",
            "copyright": "",
            "dependencies": []
        }"#;
        let err = PluginMetadata::decode(json, &host_api()).unwrap_err();
        assert!(matches!(err, MetadataError::IncompatibleApi { .. }));
    }

    #[test]
    fn rejects_missing_required_field() {
        let json = br#"{"api": "1.0.0", "name": "greeter"}"#;
        let err = PluginMetadata::decode(json, &host_api()).unwrap_err();
        assert!(matches!(err, MetadataError::Malformed(_)));
    }
}
