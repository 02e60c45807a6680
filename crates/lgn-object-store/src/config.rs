use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::{AwsS3ObjectStore, Error, MemoryObjectStore, ObjectStore, Result};

/// The default filename for configuration files.
pub static DEFAULT_FILENAME: &str = "object-store.toml";

/// The environment variable that names an extra configuration file.
pub static CONFIG_FILE_ENV: &str = "LGN_OBJECT_STORE_CONFIG";

/// The prefix of the environment variables that override the configuration.
pub static ENV_PREFIX: &str = "LGN_OBJECT_STORE_";

/// The configuration of the object-store.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub bucket: Option<String>,

    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    Memory {},
    AwsS3(AwsS3ProviderConfig),
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::AwsS3(AwsS3ProviderConfig::default())
    }
}

/// Overrides for the default AWS configuration chain.
///
/// Every unset field is resolved by the AWS SDK itself.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AwsS3ProviderConfig {
    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub profile: Option<String>,

    #[serde(default)]
    pub endpoint_url: Option<String>,

    #[serde(default)]
    pub force_path_style: bool,
}

impl Config {
    /// Load the configuration from all its various sources.
    ///
    /// If a configuration value is set in different sources, the value from the
    /// last read source will be used.
    ///
    /// Namely, the configuration will be loaded from the following locations, in
    /// order:
    ///
    /// - `$XDG_CONFIG_HOME/legion-labs/object-store.toml` on UNIX, or
    /// `%APPDATA%/legion-labs/object-store.toml` on Windows.
    /// - Any `object-store.toml` file in the current working directory, or one
    /// of its parent directories, stopping as soon as a file is found.
    /// - Any file specified in the `LGN_OBJECT_STORE_CONFIG` environment
    /// variable.
    /// - Environment variables, starting with `LGN_OBJECT_STORE_`. Nested keys
    /// are separated by `__`, as in `LGN_OBJECT_STORE_PROVIDER__REGION`.
    ///
    /// # Errors
    ///
    /// If the configuration cannot be read or is invalid, an error is returned.
    pub fn load() -> Result<Self> {
        let path = std::env::current_dir()?;

        Self::load_with_current_directory(path)
    }

    /// Load a configuration, using the specified root as the current directory.
    ///
    /// See `load()` for more information.
    ///
    /// # Errors
    ///
    /// If the configuration cannot be read or is invalid, an error is returned.
    pub fn load_with_current_directory(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_figment(&Self::figment(path.as_ref()))
    }

    /// Create a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// If the TOML is invalid, an error is returned.
    pub fn from_toml(toml: &str) -> Result<Self> {
        Self::from_figment(&Figment::new().merge(Toml::string(toml)))
    }

    fn from_figment(figment: &Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }

    fn figment(path: &Path) -> Figment {
        let mut figment = Figment::new();

        if let Some(config_dir) = dirs::config_dir() {
            figment = figment.merge(Toml::file(
                config_dir.join("legion-labs").join(DEFAULT_FILENAME),
            ));
        }

        if let Some(config_file_path) = find_in_ancestors(path) {
            figment = figment.merge(Toml::file(config_file_path));
        }

        if let Some(config_file_path) = std::env::var_os(CONFIG_FILE_ENV) {
            figment = figment.merge(Toml::file(config_file_path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"))
    }

    /// Returns the configured bucket, or the specified override.
    ///
    /// # Errors
    ///
    /// If neither is set, `Error::MissingBucket` is returned.
    pub fn bucket_or(&self, bucket: Option<String>) -> Result<String> {
        bucket
            .or_else(|| self.bucket.clone())
            .ok_or(Error::MissingBucket)
    }
}

impl ProviderConfig {
    /// Instantiate the store for this configuration.
    ///
    /// # Errors
    ///
    /// If the store cannot be created, typically because no credentials are
    /// available, an error is returned.
    pub async fn instantiate(&self) -> Result<Arc<dyn ObjectStore>> {
        match self {
            Self::Memory {} => Ok(Arc::new(MemoryObjectStore::new())),
            Self::AwsS3(config) => Ok(Arc::new(AwsS3ObjectStore::new(config).await?)),
        }
    }
}

fn find_in_ancestors(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .map(|dir| dir.join(DEFAULT_FILENAME))
        .find(|config_file_path| config_file_path.is_file())
}
