//! Request builders and dispatch for the Discovery V2 API.
//!
//! # Design
//! `DiscoveryClient` holds an immutable `ClientConfig` plus shared handles to
//! an `Authenticator` and a `Transport`; it keeps no state between calls.
//! Every endpoint is split in two:
//!
//! - `build_*` validates arguments and produces an `HttpRequest` without
//!   any I/O (reading a `DocumentContent::Path` aside).
//! - the operation method of the same name authenticates the request, sends
//!   it through the transport and parses the response envelope.
//!
//! Required arguments are checked first, so a missing one never reaches the
//! transport.

use std::fmt;
use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::auth::{authenticator_from_properties, Authenticator};
use crate::config::{ClientConfig, ServiceProperties, DEFAULT_SERVICE_URL};
use crate::error::DiscoveryError;
use crate::http::{DetailedResponse, FormPart, HttpMethod, HttpRequest, HttpResponse, RequestBody};
use crate::sdk::{sdk_headers, SERVICE_NAME, SERVICE_VERSION};
use crate::transport::{Transport, UreqTransport};
use crate::types::{
    AutocompletionOptions, DocumentContent, DocumentUpload, NoticesOptions, QueryRequest, TrainingQuery,
};

pub const FORCE_HEADER: &str = "X-Watson-Discovery-Force";

/// Content type of the `file` part when the caller gives none.
pub const DEFAULT_FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// Largest `metadata` part the service accepts.
pub const MAX_METADATA_BYTES: usize = 1024 * 1024;

/// Everything outside the RFC 3986 unreserved set gets encoded, `/` included.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Percent-encode one path segment.
///
/// `.` and `..` are encoded as well so an identifier can never be read as a
/// dot-segment.
pub fn encode_path_segment(segment: &str) -> String {
    match segment {
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => utf8_percent_encode(segment, PATH_SEGMENT).to_string(),
    }
}

fn require(name: &'static str, value: &str) -> Result<(), DiscoveryError> {
    if value.is_empty() {
        return Err(DiscoveryError::MissingArgument(name));
    }
    Ok(())
}

/// Builder for `DiscoveryClient`.
#[derive(Default)]
pub struct DiscoveryClientBuilder {
    version: Option<String>,
    service_url: Option<String>,
    authenticator: Option<Arc<dyn Authenticator>>,
    transport: Option<Arc<dyn Transport>>,
    properties: Option<ServiceProperties>,
    default_headers: Vec<(String, String)>,
}

impl DiscoveryClientBuilder {
    /// API version date, `YYYY-MM-DD`. Required.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = Some(url.into());
        self
    }

    pub fn authenticator<A: Authenticator + 'static>(mut self, authenticator: A) -> Self {
        self.authenticator = Some(Arc::new(authenticator));
        self
    }

    pub fn shared_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use these properties instead of reading the credentials file and
    /// environment.
    pub fn properties(mut self, properties: ServiceProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Header sent on every request. Trace headers never replace it.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    pub fn build(self) -> Result<DiscoveryClient, DiscoveryError> {
        let version = self
            .version
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| DiscoveryError::Config("version must be provided".to_string()))?;

        let needs_properties = self.authenticator.is_none() || self.service_url.is_none();
        let properties = match (self.properties, needs_properties) {
            (Some(props), _) => props,
            (None, true) => ServiceProperties::load(SERVICE_NAME)?,
            (None, false) => ServiceProperties::default(),
        };

        let authenticator = match self.authenticator {
            Some(auth) => auth,
            None => authenticator_from_properties(&properties)?,
        };
        let service_url = self
            .service_url
            .or_else(|| properties.get("URL").map(str::to_string))
            .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string());
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(UreqTransport::new()));

        let config = ClientConfig::new(version, &service_url, self.default_headers)?;
        tracing::debug!(
            service_url = config.service_url(),
            version = config.version(),
            auth_type = authenticator.authentication_type(),
            "discovery client configured"
        );
        Ok(DiscoveryClient {
            config,
            authenticator,
            transport,
        })
    }
}

/// Synchronous client for the Discovery V2 API.
#[derive(Clone)]
pub struct DiscoveryClient {
    config: ClientConfig,
    authenticator: Arc<dyn Authenticator>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for DiscoveryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryClient")
            .field("config", &self.config)
            .field("authentication_type", &self.authenticator.authentication_type())
            .finish_non_exhaustive()
    }
}

impl DiscoveryClient {
    pub fn builder() -> DiscoveryClientBuilder {
        DiscoveryClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: HttpMethod, path: String) -> HttpRequest {
        let mut request = HttpRequest::new(method, format!("{}{path}", self.config.service_url()));
        request
            .query
            .push(("version".to_string(), self.config.version().to_string()));
        request
    }

    /// Apply `Accept`, caller default headers and trace headers, in that
    /// order, never replacing a header already set.
    fn finish(&self, mut request: HttpRequest, operation: &str, accept_json: bool) -> HttpRequest {
        if accept_json {
            request.insert_header_if_absent("Accept", "application/json");
        }
        for (name, value) in self.config.default_headers() {
            request.insert_header_if_absent(name, value.clone());
        }
        for (name, value) in sdk_headers(SERVICE_NAME, SERVICE_VERSION, operation) {
            request.insert_header_if_absent(&name, value);
        }
        request
    }

    fn send(&self, operation: &str, mut request: HttpRequest) -> Result<HttpResponse, DiscoveryError> {
        self.authenticator.authenticate(&mut request)?;
        tracing::debug!(operation, method = %request.method, url = %request.url, "sending request");
        let response = self.transport.send(&request)?;
        tracing::debug!(operation, status = response.status, "received response");
        if !response.is_success() {
            tracing::warn!(operation, status = response.status, "request failed");
        }
        Ok(response)
    }

    /// Check the status and parse the body as JSON. An empty body yields
    /// `result: None`.
    pub fn parse_detailed(&self, response: HttpResponse) -> Result<DetailedResponse, DiscoveryError> {
        check_status(&response)?;
        let result = if response.body.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&response.body).map_err(DiscoveryError::Deserialization)?)
        };
        Ok(DetailedResponse {
            status: response.status,
            headers: response.headers,
            result,
        })
    }

    /// Check the status and discard the body.
    pub fn parse_empty(&self, response: HttpResponse) -> Result<(), DiscoveryError> {
        check_status(&response)
    }

    fn call(&self, operation: &str, request: HttpRequest) -> Result<DetailedResponse, DiscoveryError> {
        let response = self.send(operation, request)?;
        self.parse_detailed(response)
    }

    // -----------------------------------------------------------------------
    // Collections
    // -----------------------------------------------------------------------

    pub fn build_list_collections(&self, project_id: &str) -> Result<HttpRequest, DiscoveryError> {
        require("project_id", project_id)?;
        let request = self.request(
            HttpMethod::Get,
            format!("/v2/projects/{}/collections", encode_path_segment(project_id)),
        );
        Ok(self.finish(request, "list_collections", true))
    }

    /// List the collections of a project.
    pub fn list_collections(&self, project_id: &str) -> Result<DetailedResponse, DiscoveryError> {
        let request = self.build_list_collections(project_id)?;
        self.call("list_collections", request)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn build_query(&self, project_id: &str, query: &QueryRequest) -> Result<HttpRequest, DiscoveryError> {
        require("project_id", project_id)?;
        let request = self
            .request(
                HttpMethod::Post,
                format!("/v2/projects/{}/query", encode_path_segment(project_id)),
            )
            .with_json(query)
            .map_err(DiscoveryError::Serialization)?;
        Ok(self.finish(request, "query", true))
    }

    /// Search the collections of a project.
    pub fn query(&self, project_id: &str, query: &QueryRequest) -> Result<DetailedResponse, DiscoveryError> {
        let request = self.build_query(project_id, query)?;
        self.call("query", request)
    }

    pub fn build_get_autocompletion(
        &self,
        project_id: &str,
        prefix: &str,
        options: &AutocompletionOptions,
    ) -> Result<HttpRequest, DiscoveryError> {
        require("project_id", project_id)?;
        require("prefix", prefix)?;
        let mut request = self.request(
            HttpMethod::Get,
            format!("/v2/projects/{}/autocompletion", encode_path_segment(project_id)),
        );
        request.push_query("prefix", Some(prefix));
        request.push_query("collection_ids", options.collection_ids.as_ref().map(|ids| ids.join(",")));
        request.push_query("field", options.field.as_deref());
        request.push_query("count", options.count);
        Ok(self.finish(request, "get_autocompletion", true))
    }

    /// Suggest completions for a query prefix.
    pub fn get_autocompletion(
        &self,
        project_id: &str,
        prefix: &str,
        options: &AutocompletionOptions,
    ) -> Result<DetailedResponse, DiscoveryError> {
        let request = self.build_get_autocompletion(project_id, prefix, options)?;
        self.call("get_autocompletion", request)
    }

    pub fn build_query_notices(
        &self,
        project_id: &str,
        options: &NoticesOptions,
    ) -> Result<HttpRequest, DiscoveryError> {
        require("project_id", project_id)?;
        let mut request = self.request(
            HttpMethod::Get,
            format!("/v2/projects/{}/notices", encode_path_segment(project_id)),
        );
        request.push_query("filter", options.filter.as_deref());
        request.push_query("query", options.query.as_deref());
        request.push_query("natural_language_query", options.natural_language_query.as_deref());
        request.push_query("count", options.count);
        request.push_query("offset", options.offset);
        Ok(self.finish(request, "query_notices", true))
    }

    /// Search the ingestion and training notices of a project.
    pub fn query_notices(
        &self,
        project_id: &str,
        options: &NoticesOptions,
    ) -> Result<DetailedResponse, DiscoveryError> {
        let request = self.build_query_notices(project_id, options)?;
        self.call("query_notices", request)
    }

    pub fn build_list_fields(
        &self,
        project_id: &str,
        collection_ids: Option<&[String]>,
    ) -> Result<HttpRequest, DiscoveryError> {
        require("project_id", project_id)?;
        let mut request = self.request(
            HttpMethod::Get,
            format!("/v2/projects/{}/fields", encode_path_segment(project_id)),
        );
        request.push_query("collection_ids", collection_ids.map(|ids| ids.join(",")));
        Ok(self.finish(request, "list_fields", true))
    }

    /// List the queryable fields of a project's collections.
    pub fn list_fields(
        &self,
        project_id: &str,
        collection_ids: Option<&[String]>,
    ) -> Result<DetailedResponse, DiscoveryError> {
        let request = self.build_list_fields(project_id, collection_ids)?;
        self.call("list_fields", request)
    }

    // -----------------------------------------------------------------------
    // Component settings
    // -----------------------------------------------------------------------

    pub fn build_get_component_settings(&self, project_id: &str) -> Result<HttpRequest, DiscoveryError> {
        require("project_id", project_id)?;
        let request = self.request(
            HttpMethod::Get,
            format!("/v2/projects/{}/component_settings", encode_path_segment(project_id)),
        );
        Ok(self.finish(request, "get_component_settings", true))
    }

    pub fn get_component_settings(&self, project_id: &str) -> Result<DetailedResponse, DiscoveryError> {
        let request = self.build_get_component_settings(project_id)?;
        self.call("get_component_settings", request)
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    pub fn build_add_document(
        &self,
        project_id: &str,
        collection_id: &str,
        upload: &DocumentUpload,
    ) -> Result<HttpRequest, DiscoveryError> {
        require("project_id", project_id)?;
        require("collection_id", collection_id)?;
        let mut request = self.request(
            HttpMethod::Post,
            format!(
                "/v2/projects/{}/collections/{}/documents",
                encode_path_segment(project_id),
                encode_path_segment(collection_id)
            ),
        );
        apply_force(&mut request, upload.force);
        request.body = RequestBody::Multipart(document_form(upload)?);
        Ok(self.finish(request, "add_document", true))
    }

    /// Upload a document to a collection. The service answers 202 and
    /// ingests asynchronously.
    pub fn add_document(
        &self,
        project_id: &str,
        collection_id: &str,
        upload: &DocumentUpload,
    ) -> Result<DetailedResponse, DiscoveryError> {
        let request = self.build_add_document(project_id, collection_id, upload)?;
        self.call("add_document", request)
    }

    pub fn build_update_document(
        &self,
        project_id: &str,
        collection_id: &str,
        document_id: &str,
        upload: &DocumentUpload,
    ) -> Result<HttpRequest, DiscoveryError> {
        require("project_id", project_id)?;
        require("collection_id", collection_id)?;
        require("document_id", document_id)?;
        let mut request = self.request(
            HttpMethod::Post,
            format!(
                "/v2/projects/{}/collections/{}/documents/{}",
                encode_path_segment(project_id),
                encode_path_segment(collection_id),
                encode_path_segment(document_id)
            ),
        );
        apply_force(&mut request, upload.force);
        request.body = RequestBody::Multipart(document_form(upload)?);
        Ok(self.finish(request, "update_document", true))
    }

    /// Replace a document, keeping its ID.
    pub fn update_document(
        &self,
        project_id: &str,
        collection_id: &str,
        document_id: &str,
        upload: &DocumentUpload,
    ) -> Result<DetailedResponse, DiscoveryError> {
        let request = self.build_update_document(project_id, collection_id, document_id, upload)?;
        self.call("update_document", request)
    }

    pub fn build_delete_document(
        &self,
        project_id: &str,
        collection_id: &str,
        document_id: &str,
        force: Option<bool>,
    ) -> Result<HttpRequest, DiscoveryError> {
        require("project_id", project_id)?;
        require("collection_id", collection_id)?;
        require("document_id", document_id)?;
        let mut request = self.request(
            HttpMethod::Delete,
            format!(
                "/v2/projects/{}/collections/{}/documents/{}",
                encode_path_segment(project_id),
                encode_path_segment(collection_id),
                encode_path_segment(document_id)
            ),
        );
        apply_force(&mut request, force);
        Ok(self.finish(request, "delete_document", true))
    }

    /// Delete a document. Unknown IDs still come back with status `deleted`.
    pub fn delete_document(
        &self,
        project_id: &str,
        collection_id: &str,
        document_id: &str,
        force: Option<bool>,
    ) -> Result<DetailedResponse, DiscoveryError> {
        let request = self.build_delete_document(project_id, collection_id, document_id, force)?;
        self.call("delete_document", request)
    }

    // -----------------------------------------------------------------------
    // Training data
    // -----------------------------------------------------------------------

    pub fn build_list_training_queries(&self, project_id: &str) -> Result<HttpRequest, DiscoveryError> {
        require("project_id", project_id)?;
        let request = self.request(
            HttpMethod::Get,
            format!("/v2/projects/{}/training_data/queries", encode_path_segment(project_id)),
        );
        Ok(self.finish(request, "list_training_queries", true))
    }

    pub fn list_training_queries(&self, project_id: &str) -> Result<DetailedResponse, DiscoveryError> {
        let request = self.build_list_training_queries(project_id)?;
        self.call("list_training_queries", request)
    }

    pub fn build_delete_training_queries(&self, project_id: &str) -> Result<HttpRequest, DiscoveryError> {
        require("project_id", project_id)?;
        let request = self.request(
            HttpMethod::Delete,
            format!("/v2/projects/{}/training_data/queries", encode_path_segment(project_id)),
        );
        Ok(self.finish(request, "delete_training_queries", false))
    }

    /// Remove every training query of a project. The response body is
    /// discarded.
    pub fn delete_training_queries(&self, project_id: &str) -> Result<(), DiscoveryError> {
        let request = self.build_delete_training_queries(project_id)?;
        let response = self.send("delete_training_queries", request)?;
        self.parse_empty(response)
    }

    pub fn build_create_training_query(
        &self,
        project_id: &str,
        training_query: &TrainingQuery,
    ) -> Result<HttpRequest, DiscoveryError> {
        require("project_id", project_id)?;
        require("natural_language_query", &training_query.natural_language_query)?;
        let request = self
            .request(
                HttpMethod::Post,
                format!("/v2/projects/{}/training_data/queries", encode_path_segment(project_id)),
            )
            .with_json(training_query)
            .map_err(DiscoveryError::Serialization)?;
        Ok(self.finish(request, "create_training_query", true))
    }

    pub fn create_training_query(
        &self,
        project_id: &str,
        training_query: &TrainingQuery,
    ) -> Result<DetailedResponse, DiscoveryError> {
        let request = self.build_create_training_query(project_id, training_query)?;
        self.call("create_training_query", request)
    }

    pub fn build_get_training_query(&self, project_id: &str, query_id: &str) -> Result<HttpRequest, DiscoveryError> {
        require("project_id", project_id)?;
        require("query_id", query_id)?;
        let request = self.request(
            HttpMethod::Get,
            format!(
                "/v2/projects/{}/training_data/queries/{}",
                encode_path_segment(project_id),
                encode_path_segment(query_id)
            ),
        );
        Ok(self.finish(request, "get_training_query", true))
    }

    pub fn get_training_query(&self, project_id: &str, query_id: &str) -> Result<DetailedResponse, DiscoveryError> {
        let request = self.build_get_training_query(project_id, query_id)?;
        self.call("get_training_query", request)
    }

    pub fn build_update_training_query(
        &self,
        project_id: &str,
        query_id: &str,
        training_query: &TrainingQuery,
    ) -> Result<HttpRequest, DiscoveryError> {
        require("project_id", project_id)?;
        require("query_id", query_id)?;
        require("natural_language_query", &training_query.natural_language_query)?;
        let request = self
            .request(
                HttpMethod::Post,
                format!(
                    "/v2/projects/{}/training_data/queries/{}",
                    encode_path_segment(project_id),
                    encode_path_segment(query_id)
                ),
            )
            .with_json(training_query)
            .map_err(DiscoveryError::Serialization)?;
        Ok(self.finish(request, "update_training_query", true))
    }

    pub fn update_training_query(
        &self,
        project_id: &str,
        query_id: &str,
        training_query: &TrainingQuery,
    ) -> Result<DetailedResponse, DiscoveryError> {
        let request = self.build_update_training_query(project_id, query_id, training_query)?;
        self.call("update_training_query", request)
    }
}

fn apply_force(request: &mut HttpRequest, force: Option<bool>) {
    if let Some(force) = force {
        request.set_header(FORCE_HEADER, force.to_string());
    }
}

/// Turn an upload into its `file` and `metadata` parts.
fn document_form(upload: &DocumentUpload) -> Result<Vec<FormPart>, DiscoveryError> {
    if let Some(metadata) = &upload.metadata {
        if metadata.len() > MAX_METADATA_BYTES {
            return Err(DiscoveryError::InvalidArgument(format!(
                "metadata is {} bytes; the limit is {MAX_METADATA_BYTES}",
                metadata.len()
            )));
        }
    }

    let mut parts = Vec::with_capacity(2);
    if let Some(file) = &upload.file {
        let (data, source_name) = match file {
            DocumentContent::Bytes(bytes) => (bytes.clone(), None),
            DocumentContent::Path(path) => (
                std::fs::read(path)?,
                path.file_name().map(|name| name.to_string_lossy().into_owned()),
            ),
            DocumentContent::Json(value) => (
                serde_json::to_vec(value).map_err(DiscoveryError::Serialization)?,
                None,
            ),
        };
        parts.push(FormPart {
            name: "file".to_string(),
            filename: upload.filename.clone().or(source_name),
            content_type: upload
                .file_content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_FILE_CONTENT_TYPE.to_string()),
            data,
        });
    }
    if let Some(metadata) = &upload.metadata {
        parts.push(FormPart {
            name: "metadata".to_string(),
            filename: None,
            content_type: "text/plain".to_string(),
            data: metadata.as_bytes().to_vec(),
        });
    }
    Ok(parts)
}

fn check_status(response: &HttpResponse) -> Result<(), DiscoveryError> {
    if response.is_success() {
        return Ok(());
    }
    Err(DiscoveryError::from_response(response))
}
