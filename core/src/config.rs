//! Client configuration and external property resolution.
//!
//! # Design
//! `ClientConfig` is the immutable result of `DiscoveryClientBuilder::build`.
//! Values the caller leaves out are resolved from service properties, read
//! from a credentials file and then from the process environment, each
//! named `<SERVICE>_<PROPERTY>` (e.g. `DISCOVERY_URL`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::DiscoveryError;

/// Service URL used when neither the caller nor the environment sets one.
pub const DEFAULT_SERVICE_URL: &str = "https://api.us-south.discovery.watson.cloud.ibm.com";

/// Environment variable naming an explicit credentials file.
pub const CREDENTIALS_FILE_ENV: &str = "IBM_CREDENTIALS_FILE";

/// File looked up in the working directory, then in `$HOME`.
pub const DEFAULT_CREDENTIALS_FILE: &str = "ibm-credentials.env";

/// Immutable settings shared by every call of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    version: String,
    service_url: String,
    default_headers: Vec<(String, String)>,
}

impl ClientConfig {
    pub(crate) fn new(
        version: String,
        service_url: &str,
        default_headers: Vec<(String, String)>,
    ) -> Result<Self, DiscoveryError> {
        if version.trim().is_empty() {
            return Err(DiscoveryError::Config("version must be provided".to_string()));
        }
        let service_url = service_url.trim_end_matches('/');
        if service_url.is_empty() {
            return Err(DiscoveryError::Config("service URL must not be empty".to_string()));
        }
        Ok(Self {
            version,
            service_url: service_url.to_string(),
            default_headers,
        })
    }

    /// API version date, `YYYY-MM-DD`.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    pub fn default_headers(&self) -> &[(String, String)] {
        &self.default_headers
    }
}

/// Configuration properties of one service, keyed by property name with the
/// service prefix stripped (`AUTH_TYPE`, `URL`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceProperties {
    values: HashMap<String, String>,
}

impl ServiceProperties {
    /// Load properties for `service_name` from the credentials file and the
    /// process environment. Environment values win.
    pub fn load(service_name: &str) -> Result<Self, DiscoveryError> {
        let explicit = std::env::var_os(CREDENTIALS_FILE_ENV).map(PathBuf::from);
        let home = std::env::var_os("HOME").map(PathBuf::from);
        let file = credentials_file(explicit, Path::new("."), home.as_deref())?;
        Self::load_from(service_name, file.as_deref(), std::env::vars())
    }

    /// Properties from an optional credentials file, overridden by `env`.
    pub fn load_from<I>(service_name: &str, file: Option<&Path>, env: I) -> Result<Self, DiscoveryError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut props = match file {
            Some(path) => {
                tracing::debug!(path = %path.display(), "reading credentials file");
                Self::from_pairs(service_name, read_credentials_file(path)?)
            }
            None => Self::default(),
        };
        props.merge(Self::from_pairs(service_name, env));
        Ok(props)
    }

    /// Keep the pairs whose key carries the service prefix.
    pub fn from_pairs<I>(service_name: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let prefix = format!("{}_", service_name.to_uppercase().replace('-', "_"));
        let values = pairs
            .into_iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(&prefix)
                    .filter(|prop| !prop.is_empty())
                    .map(|prop| (prop.to_string(), value))
            })
            .collect();
        Self { values }
    }

    /// Non-empty value of a property.
    pub fn get(&self, property: &str) -> Option<&str> {
        self.values
            .get(property)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Overlay `other`; its empty values leave existing ones in place.
    fn merge(&mut self, other: ServiceProperties) {
        self.values
            .extend(other.values.into_iter().filter(|(_, v)| !v.is_empty()));
    }
}

/// Pick the credentials file: an explicit path must exist, otherwise the
/// first of `<cwd>/ibm-credentials.env` and `<home>/ibm-credentials.env`
/// that does.
fn credentials_file(
    explicit: Option<PathBuf>,
    cwd: &Path,
    home: Option<&Path>,
) -> Result<Option<PathBuf>, DiscoveryError> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(DiscoveryError::Config(format!(
                "credentials file {} does not exist",
                path.display()
            )));
        }
        return Ok(Some(path));
    }
    let mut candidates = vec![cwd.join(DEFAULT_CREDENTIALS_FILE)];
    if let Some(home) = home {
        candidates.push(home.join(DEFAULT_CREDENTIALS_FILE));
    }
    Ok(candidates.into_iter().find(|p| p.is_file()))
}

/// Parse a dotenv-style file without touching the process environment.
pub fn read_credentials_file(path: &Path) -> Result<Vec<(String, String)>, DiscoveryError> {
    let iter = dotenvy::from_path_iter(path).map_err(|e| {
        DiscoveryError::Config(format!("cannot read {}: {e}", path.display()))
    })?;
    iter.map(|item| {
        item.map_err(|e| DiscoveryError::Config(format!("invalid line in {}: {e}", path.display())))
    })
    .collect()
}
