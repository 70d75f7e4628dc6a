//! Declarative engine configuration.
//!
//! [`EngineConfig`] describes an [`Engine`] in YAML so servers can keep view
//! settings next to the rest of their configuration:
//!
//! ```yaml
//! directory: ./views
//! extension: .html
//! layouts: [layouts/main]
//! delimiters:
//!   left: "[["
//!   right: "]]"
//! reload: true
//! undefined: lenient
//! ```
//!
//! Every field is optional except `extension`.

use std::path::{Path, PathBuf};

use minijinja::UndefinedBehavior;
use serde::Deserialize;

use crate::engine::Engine;
use crate::error::ViewError;
use crate::source::TemplateSource;

/// A delimiter pair; an empty side keeps the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DelimiterConfig {
    pub left: String,
    pub right: String,
}

/// How undefined values behave during execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedMode {
    /// Undefined values render as empty and are falsy.
    Lenient,
    /// Like lenient, but attribute access on undefined stays undefined.
    Chainable,
    /// Any use of an undefined value is an error.
    #[default]
    Strict,
}

impl From<UndefinedMode> for UndefinedBehavior {
    fn from(mode: UndefinedMode) -> Self {
        match mode {
            UndefinedMode::Lenient => UndefinedBehavior::Lenient,
            UndefinedMode::Chainable => UndefinedBehavior::Chainable,
            UndefinedMode::Strict => UndefinedBehavior::Strict,
        }
    }
}

/// Serializable description of an [`Engine`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Template directory; defaults to the current directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Suffix appended to every template name, e.g. `.html`.
    pub extension: String,
    /// Layouts applied when a render call names none.
    #[serde(default)]
    pub layouts: Vec<String>,
    /// Expression delimiters.
    #[serde(default)]
    pub delimiters: Option<DelimiterConfig>,
    /// Statement delimiters.
    #[serde(default)]
    pub block_delimiters: Option<DelimiterConfig>,
    /// Name of the layout embedding function (default `embed`).
    #[serde(default)]
    pub embed: Option<String>,
    #[serde(default)]
    pub reload: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub undefined: UndefinedMode,
}

impl EngineConfig {
    /// Parses a YAML configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Config`] if the YAML is malformed or has unknown keys.
    pub fn from_yaml(yaml: &str) -> Result<Self, ViewError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads and parses a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ViewError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ViewError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// Builds an engine reading from [`directory`](Self::directory).
    ///
    /// # Errors
    ///
    /// Fails like [`Engine::load`] if the directory or delimiters are unusable.
    pub fn into_engine(self) -> Result<Engine, ViewError> {
        let directory = self
            .directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let engine = Engine::new(directory, self.extension.clone());
        self.configure(engine)
    }

    /// Builds an engine over `source`, ignoring [`directory`](Self::directory).
    pub fn into_engine_with_source(
        self,
        source: impl TemplateSource + 'static,
    ) -> Result<Engine, ViewError> {
        let engine = Engine::with_source(source, self.extension.clone());
        self.configure(engine)
    }

    fn configure(self, mut engine: Engine) -> Result<Engine, ViewError> {
        engine
            .set_default_layouts(self.layouts)
            .set_undefined_behavior(self.undefined.into());
        if let Some(d) = &self.delimiters {
            engine.set_delimiters(&d.left, &d.right);
        }
        if let Some(d) = &self.block_delimiters {
            engine.set_block_delimiters(&d.left, &d.right);
        }
        if let Some(name) = self.embed {
            engine.set_embed_function(name);
        }
        engine.set_reload(self.reload).set_debug(self.debug);
        engine.load()?;
        Ok(engine)
    }
}
