//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/treestore/treestore.toml`
//! 3. Explicit config file passed with `--config`
//! 4. Environment variables: `TREESTORE_*` prefix

use std::fmt;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;

pub const ENV_PREFIX: &str = "TREESTORE";

/// How `show` prints the projected mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Tree,
    Json,
    Toml,
    Yaml,
    /// `key=value` lines, keys joined with the separator
    Flat,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Tree => "tree",
            OutputFormat::Json => "json",
            OutputFormat::Toml => "toml",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Flat => "flat",
        };
        f.write_str(name)
    }
}

/// Unified configuration for treestore.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Joins nested keys when flattening (default: "_")
    pub separator: String,
    /// Skip missing source files instead of failing
    pub skip_missing: bool,
    /// Type ini and environment strings (numbers, booleans, null)
    pub auto_convert: bool,
    /// Environment prefix always loaded after the given sources
    pub env_prefix: Option<String>,
    /// Output format of `show`
    pub output: OutputFormat,
    /// Schema file applied by `show` and `check`
    pub schema: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            separator: "_".to_string(),
            skip_missing: false,
            auto_convert: true,
            env_prefix: None,
            output: OutputFormat::default(),
            schema: None,
        }
    }
}

/// Get the XDG config directory for treestore.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "treestore").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("treestore.toml"))
}

/// Expand `~`, `$VAR` and `${VAR}`; unresolvable variables leave the input as is.
pub fn expand_path(raw: &str) -> String {
    shellexpand::full(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

impl Settings {
    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `explicit` - Optional config file from the command line; must exist
    pub fn load(explicit: Option<&Path>) -> Result<Self, ApplicationError> {
        Self::load_with(global_config_path().as_deref(), explicit)
    }

    /// Same as [`Settings::load`] with the global file location given.
    pub fn load_with(global: Option<&Path>, explicit: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut builder = Config::builder();

        if let Some(global_path) = global.filter(|p| p.exists()) {
            debug!("global config: {}", global_path.display());
            builder = builder.add_source(File::from(global_path).required(false));
        }

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ApplicationError::FileNotFound(path.to_path_buf()));
            }
            debug!("explicit config: {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        let config = builder.build().map_err(config_err)?;
        let mut settings: Self = config.try_deserialize().map_err(config_err)?;

        settings.expand_paths();
        Ok(settings)
    }

    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        if let Some(schema) = &self.schema {
            self.schema = Some(PathBuf::from(expand_path(&schema.to_string_lossy())));
        }
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# treestore configuration
#
# Locations (by precedence, lowest to highest):
#   Global:   ~/.config/treestore/treestore.toml
#   Explicit: treestore --config <file>
#   Env:      TREESTORE_* environment variables (e.g. TREESTORE_OUTPUT=json)

# Joins nested keys in flat output and `flatten`
# separator = "_"

# Skip source files that do not exist
# skip_missing = false

# Type ini and environment strings: "8000" -> 8000, "yes" -> true, "none" -> null
# auto_convert = true

# Environment prefix loaded after all sources (MYAPP_SERVER_PORT -> server_port)
# env_prefix = "MYAPP"

# Output of `show`: tree | json | toml | yaml | flat
# output = "tree"

# Schema with allowed children and cardinalities
# schema = "~/.config/treestore/schema.toml"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_no_config_when_loading_then_uses_defaults() {
        let settings = Settings::load_with(None, None).expect("load defaults");
        assert_eq!(settings.separator, "_");
        assert!(settings.auto_convert);
        assert_eq!(settings.output, OutputFormat::Tree);
    }

    #[test]
    fn given_tilde_in_schema_when_expand_paths_then_expands_to_home() {
        let mut settings = Settings {
            schema: Some(PathBuf::from("~/schema.toml")),
            ..Settings::default()
        };

        settings.expand_paths();

        let home = std::env::var("HOME").expect("HOME should be set");
        let schema = settings.schema.unwrap();
        assert!(schema.to_string_lossy().starts_with(&home));
        assert!(!schema.to_string_lossy().contains('~'));
    }

    #[test]
    fn given_template_when_parsed_then_yields_defaults() {
        let parsed: Settings = toml::from_str(&Settings::template()).unwrap();
        assert_eq!(parsed, Settings::default());
    }
}
