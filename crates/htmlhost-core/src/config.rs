//! Host configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

use crate::error::ConfigError;

/// Configuration for a [`BrowserHost`](crate::BrowserHost)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Placeholder page loaded while the control bootstraps
    pub blank_url: String,

    /// URL scheme the engine routes to content sources instead of the network
    pub content_scheme: String,

    /// Path used by `set_html` under the host's synthetic origin
    pub placeholder_path: String,

    /// Zoom settings
    pub zoom: ZoomConfig,
}

/// Accepted zoom range in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    /// Smallest accepted zoom
    pub min: u32,

    /// Largest accepted zoom
    pub max: u32,

    /// Zoom assumed until the host sets one
    pub initial: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            blank_url: "about:blank".to_string(),
            content_scheme: "htmlhost".to_string(),
            placeholder_path: "index.html".to_string(),
            zoom: ZoomConfig::default(),
        }
    }
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min: 10,
            max: 1000,
            initial: 100,
        }
    }
}

impl ZoomConfig {
    /// Clamp `percent` into the accepted range.
    pub fn clamp(&self, percent: u32) -> u32 {
        percent.clamp(self.min, self.max)
    }
}

impl HostConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check every field for usability.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.blank_url).map_err(|source| ConfigError::Url {
            url: self.blank_url.clone(),
            source,
        })?;

        if !is_valid_scheme(&self.content_scheme) {
            return Err(ConfigError::Scheme(self.content_scheme.clone()));
        }

        let sample = format!("{}://w1/{}", self.content_scheme, self.placeholder_path);
        Url::parse(&sample).map_err(|source| ConfigError::Url { url: sample, source })?;

        let zoom = self.zoom;
        if zoom.min == 0 || zoom.min > zoom.max {
            return Err(ConfigError::ZoomBounds {
                min: zoom.min,
                max: zoom.max,
            });
        }
        if zoom.initial < zoom.min || zoom.initial > zoom.max {
            return Err(ConfigError::InitialZoom {
                initial: zoom.initial,
                min: zoom.min,
                max: zoom.max,
            });
        }

        Ok(())
    }
}

// RFC 3986: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )
fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = HostConfig::default();
        config.validate().unwrap();
        assert_eq!(config.blank_url, "about:blank");
        assert_eq!(config.zoom.initial, 100);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = HostConfig::from_json_str(r#"{ "content_scheme": "its" }"#).unwrap();
        assert_eq!(config.content_scheme, "its");
        assert_eq!(config.placeholder_path, "index.html");
        assert_eq!(config.zoom, ZoomConfig::default());
    }

    #[test]
    fn test_inverted_zoom_bounds_rejected() {
        let err = HostConfig::from_json_str(r#"{ "zoom": { "min": 500, "max": 100 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::ZoomBounds { min: 500, max: 100 }));
    }

    #[test]
    fn test_initial_zoom_outside_bounds_rejected() {
        let err = HostConfig::from_json_str(
            r#"{ "zoom": { "min": 50, "max": 200, "initial": 300 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InitialZoom { initial: 300, .. }));
    }

    #[test]
    fn test_malformed_blank_url_rejected() {
        let err = HostConfig::from_json_str(r#"{ "blank_url": "not a url" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Url { .. }));
    }

    #[test]
    fn test_bad_scheme_rejected() {
        for scheme in ["", "1abc", "has space", "a/b"] {
            let config = HostConfig {
                content_scheme: scheme.to_string(),
                ..HostConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::Scheme(_))),
                "scheme {scheme:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_zoom_clamp() {
        let zoom = ZoomConfig::default();
        assert_eq!(zoom.clamp(5), 10);
        assert_eq!(zoom.clamp(150), 150);
        assert_eq!(zoom.clamp(5000), 1000);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("htmlhost.json");
        std::fs::write(&path, r#"{ "placeholder_path": "page.html" }"#).unwrap();

        let config = HostConfig::load(&path).unwrap();
        assert_eq!(config.placeholder_path, "page.html");
    }

    #[test]
    fn test_load_missing_file() {
        let err = HostConfig::load("/nonexistent/htmlhost.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
