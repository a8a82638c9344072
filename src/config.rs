//! Stow configuration via `stow.toml`
//!
//! One file selects the backend and, optionally, the schema bindings of a
//! typed store. A commented default is written on first use; edit it and
//! reopen to change settings.

use std::path::Path;

use serde::{Deserialize, Serialize};
use stow_core::{StowError, StowResult};
use stow_primitives::{SchemaDirectory, SchemaRegistry, TypedConfig, TypedStore};
use stow_storage::{AnyStore, StorageConfig};
use tracing::info;

/// Config file name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "stow.toml";

/// Configuration loaded from `stow.toml`
///
/// # Example
///
/// ```toml
/// [storage]
/// backend = "file"
/// mount_point = "./data"
/// versioned = false
///
/// [typed]
/// sep = "/"
/// read = false
/// schema_dir = "./schemas"
/// [[typed.paths]]
/// pattern = "users/.*"
/// schema = "User.json"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StowConfig {
    /// Backend selection
    #[serde(default)]
    pub storage: StorageConfig,
    /// Schema bindings; absent means no typed store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typed: Option<TypedConfig>,
}

impl StowConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Stow configuration
#
# Backend: "file" (default) or "memory"
#   "file"   = one file per key under mount_point/<bucket>/
#   "memory" = process memory, lost on exit
[storage]
backend = "file"
mount_point = "./data"

# Keep every version of every key (default: false)
versioned = false

# Schema bindings for a typed store.
# Uncomment to validate writes against JSON Schema documents.
# [typed]
# sep = "/"               # placed between bucket and key before matching
# read = false            # also validate reads (slow)
# schema_dir = "./schemas"
# [[typed.paths]]
# pattern = "users/.*"    # full match over <bucket><sep><key>
# schema = "User.json"
"#
    }

    /// Parse config from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this layout, or
    /// if a typed path pattern does not compile.
    pub fn from_toml(text: &str) -> StowResult<Self> {
        let config: StowConfig = toml::from_str(text)
            .map_err(|e| StowError::config(format!("Failed to parse config: {}", e)))?;
        // Validate the patterns eagerly
        if let Some(typed) = &config.typed {
            SchemaRegistry::from_config(typed)?;
        }
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> StowResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StowError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            StowError::Config(msg) => {
                StowError::config(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> StowResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                StowError::config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            info!(target: "stow::storage", path = %path.display(), "Wrote default config");
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> StowResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StowError::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            StowError::config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Open the configured backend
    pub fn open_store(&self) -> StowResult<AnyStore> {
        self.storage.open()
    }

    /// Open the configured backend behind the typed decorator
    ///
    /// `Ok(None)` if no `[typed]` section is present.
    pub fn open_typed(&self) -> StowResult<Option<TypedStore<AnyStore, SchemaDirectory>>> {
        let Some(typed) = &self.typed else {
            return Ok(None);
        };
        let checker = SchemaDirectory::new(&typed.schema_dir);
        TypedStore::from_config(self.open_store()?, typed, checker).map(Some)
    }
}
