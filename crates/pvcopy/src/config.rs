//! Engine configuration.

use serde::Deserialize;

/// Tunables for request parsing and copy construction.
///
/// Every key is optional when deserializing; missing keys take the
/// [`Default`] values.
///
/// ```
/// use pvcopy::CopyConfig;
///
/// let config = CopyConfig::from_json(r#"{ "max_depth": 4 }"#).unwrap();
/// assert_eq!(config.max_depth, 4);
/// assert!(config.filter_plugins);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CopyConfig {
    /// Longest accepted request, in bytes after whitespace is stripped.
    pub max_request_length: usize,
    /// Deepest accepted nesting of `{}` groups and dotted path steps.
    pub max_depth: usize,
    /// Whether per-field options are looked up in the plugin registry.
    pub filter_plugins: bool,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            max_request_length: 4096,
            max_depth: 32,
            filter_plugins: true,
        }
    }
}

impl CopyConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
