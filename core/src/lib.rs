//! Synchronous client for the Discovery V2 document-search service.
//!
//! # Overview
//! Turns typed parameters into `HttpRequest` values (query string, JSON body
//! or multipart form), stamps them with the API version date and SDK trace
//! headers, and dispatches them through a pluggable `Transport`. Responses
//! come back as a `DetailedResponse` holding the raw JSON body.
//!
//! # Design
//! - `DiscoveryClient` is stateless beyond its immutable `ClientConfig`.
//! - Each endpoint has a pure `build_*` method and a dispatching method of
//!   the same name, so the I/O boundary stays explicit and testable.
//! - Credentials come from an `Authenticator`, resolved from
//!   `DISCOVERY_*` properties when the caller supplies none.
//!
//! ```no_run
//! use discovery_core::{BearerTokenAuthenticator, DiscoveryClient, QueryRequest};
//!
//! # fn main() -> Result<(), discovery_core::DiscoveryError> {
//! let client = DiscoveryClient::builder()
//!     .version("2020-08-30")
//!     .authenticator(BearerTokenAuthenticator::new("token")?)
//!     .build()?;
//! let query = QueryRequest {
//!     natural_language_query: Some("cats".to_string()),
//!     ..QueryRequest::default()
//! };
//! let response = client.query("project-id", &query)?;
//! println!("{:?}", response.result);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod sdk;
pub mod transport;
pub mod types;

pub use auth::{
    authenticator_from_env, authenticator_from_properties, Authenticator, BasicAuthenticator,
    BearerTokenAuthenticator, NoAuthAuthenticator,
};
pub use client::{encode_path_segment, DiscoveryClient, DiscoveryClientBuilder};
pub use config::{ClientConfig, ServiceProperties, DEFAULT_SERVICE_URL};
pub use error::DiscoveryError;
pub use http::{DetailedResponse, FormPart, HttpMethod, HttpRequest, HttpResponse, RequestBody};
pub use transport::{Transport, UreqTransport};
pub use types::{
    AutocompletionOptions, DocumentContent, DocumentUpload, NoticesOptions, QueryLargePassages,
    QueryLargeSuggestedRefinements, QueryLargeTableResults, QueryRequest, TrainingExample, TrainingQuery,
};
