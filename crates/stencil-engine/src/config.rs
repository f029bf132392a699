//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use stencil_types::{Bindings, Result, TemplateError, Value};

/// Default open delimiter.
pub const DEFAULT_OPEN: &str = "<%";
/// Default close delimiter.
pub const DEFAULT_CLOSE: &str = "%>";
/// Default bound on nested includes per render.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 64;

/// Options recognized by [`Engine`](crate::Engine).
///
/// Every field has a default, so a JSON document only needs the fields it
/// changes:
///
/// ```json
/// { "open": "{{", "close": "}}", "globals": { "site": "example.org" } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Marker that starts a code tag.
    pub open: String,
    /// Marker that ends a code tag.
    pub close: String,
    /// Return the assembled program instead of executing it.
    pub raw: bool,
    /// Bindings visible to every render; per-render imports override them.
    pub globals: Bindings,
    /// Nested include bound; exceeding it fails with `CyclicInclude`.
    pub max_include_depth: usize,
    /// Directory includes resolve against when a template has no id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            open: DEFAULT_OPEN.to_string(),
            close: DEFAULT_CLOSE.to_string(),
            raw: false,
            globals: Bindings::new(),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            base_dir: None,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| TemplateError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the scanner cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.open.is_empty() || self.close.is_empty() {
            return Err(TemplateError::InvalidConfig(
                "open and close delimiters must not be empty".to_string(),
            ));
        }
        if self.max_include_depth == 0 {
            return Err(TemplateError::InvalidConfig(
                "max_include_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_delimiters(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.open = open.into();
        self.close = close.into();
        self
    }

    pub fn with_raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    pub fn with_global(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.globals.insert(name.into(), value.into());
        self
    }

    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }
}
