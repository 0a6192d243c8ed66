//! Authenticators that attach credentials to outgoing requests.
//!
//! Token acquisition is out of scope: only schemes whose credentials are
//! fully known up front are implemented. `iam` and other exchange-based
//! types are rejected at configuration time.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::ServiceProperties;
use crate::error::DiscoveryError;
use crate::http::HttpRequest;

pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Decorates a request with credentials before it is sent.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, request: &mut HttpRequest) -> Result<(), DiscoveryError>;

    /// Name of the scheme as used in `<SERVICE>_AUTH_TYPE`.
    fn authentication_type(&self) -> &'static str;
}

/// Sends requests without credentials.
#[derive(Debug, Clone, Default)]
pub struct NoAuthAuthenticator;

impl Authenticator for NoAuthAuthenticator {
    fn authenticate(&self, _request: &mut HttpRequest) -> Result<(), DiscoveryError> {
        Ok(())
    }

    fn authentication_type(&self) -> &'static str {
        "noAuth"
    }
}

/// HTTP basic authentication.
#[derive(Clone)]
pub struct BasicAuthenticator {
    header_value: String,
}

impl BasicAuthenticator {
    pub fn new(username: &str, password: &str) -> Result<Self, DiscoveryError> {
        if username.is_empty() || password.is_empty() {
            return Err(DiscoveryError::Config(
                "basic authentication requires a username and a password".to_string(),
            ));
        }
        let encoded = STANDARD.encode(format!("{username}:{password}"));
        Ok(Self {
            header_value: format!("Basic {encoded}"),
        })
    }
}

impl std::fmt::Debug for BasicAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuthenticator").finish_non_exhaustive()
    }
}

impl Authenticator for BasicAuthenticator {
    fn authenticate(&self, request: &mut HttpRequest) -> Result<(), DiscoveryError> {
        request.set_header(AUTHORIZATION_HEADER, self.header_value.clone());
        Ok(())
    }

    fn authentication_type(&self) -> &'static str {
        "basic"
    }
}

/// A caller-managed bearer token.
#[derive(Clone)]
pub struct BearerTokenAuthenticator {
    token: String,
}

impl BearerTokenAuthenticator {
    pub fn new(token: &str) -> Result<Self, DiscoveryError> {
        if token.is_empty() {
            return Err(DiscoveryError::Config(
                "bearer token authentication requires a token".to_string(),
            ));
        }
        Ok(Self {
            token: token.to_string(),
        })
    }
}

impl std::fmt::Debug for BearerTokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerTokenAuthenticator").finish_non_exhaustive()
    }
}

impl Authenticator for BearerTokenAuthenticator {
    fn authenticate(&self, request: &mut HttpRequest) -> Result<(), DiscoveryError> {
        request.set_header(AUTHORIZATION_HEADER, format!("Bearer {}", self.token));
        Ok(())
    }

    fn authentication_type(&self) -> &'static str {
        "bearerToken"
    }
}

/// Resolve an authenticator for `service_name` from the credentials file and
/// environment.
pub fn authenticator_from_env(service_name: &str) -> Result<Arc<dyn Authenticator>, DiscoveryError> {
    let props = ServiceProperties::load(service_name)?;
    authenticator_from_properties(&props)
}

/// Build an authenticator from already-loaded service properties.
///
/// Without `AUTH_TYPE`, a configured username selects `basic`, a bearer
/// token selects `bearerToken`, and anything else defaults to `iam`.
pub fn authenticator_from_properties(
    props: &ServiceProperties,
) -> Result<Arc<dyn Authenticator>, DiscoveryError> {
    let auth_type = match props.get("AUTH_TYPE") {
        Some(t) => t.to_string(),
        None if props.get("USERNAME").is_some() => "basic".to_string(),
        None if props.get("BEARER_TOKEN").is_some() => "bearerToken".to_string(),
        None => "iam".to_string(),
    };
    tracing::debug!(auth_type = %auth_type, "resolved authentication type");

    match auth_type.to_ascii_lowercase().as_str() {
        "noauth" => Ok(Arc::new(NoAuthAuthenticator)),
        "basic" => Ok(Arc::new(BasicAuthenticator::new(
            props.get("USERNAME").unwrap_or_default(),
            props.get("PASSWORD").unwrap_or_default(),
        )?)),
        "bearertoken" => Ok(Arc::new(BearerTokenAuthenticator::new(
            props.get("BEARER_TOKEN").unwrap_or_default(),
        )?)),
        _ => Err(DiscoveryError::Config(format!(
            "authentication type '{auth_type}' is not supported; use basic, bearerToken or noAuth"
        ))),
    }
}
