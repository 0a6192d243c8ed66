//! Dispatch behavior checked through a transport that records every request.

use std::sync::{Arc, Mutex};

use discovery_core::{
    AutocompletionOptions, BasicAuthenticator, DiscoveryClient, DiscoveryError, DocumentUpload,
    HttpMethod, HttpRequest, HttpResponse, NoAuthAuthenticator, NoticesOptions, QueryRequest,
    Transport, TrainingQuery,
};
use serde_json::json;

struct RecordingTransport {
    calls: Mutex<Vec<HttpRequest>>,
    status: u16,
    body: String,
}

impl RecordingTransport {
    fn new(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            status,
            body: body.to_string(),
        })
    }

    fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, DiscoveryError> {
        self.calls.lock().unwrap().push(request.clone());
        Ok(HttpResponse {
            status: self.status,
            headers: Vec::new(),
            body: self.body.clone(),
        })
    }
}

fn client_with(transport: Arc<RecordingTransport>) -> DiscoveryClient {
    DiscoveryClient::builder()
        .version("2020-08-30")
        .service_url("https://discovery.example.com")
        .authenticator(NoAuthAuthenticator)
        .shared_transport(transport)
        .build()
        .unwrap()
}

fn training(text: &str) -> TrainingQuery {
    TrainingQuery {
        natural_language_query: text.to_string(),
        examples: Vec::new(),
        filter: None,
    }
}

#[test]
fn missing_identifiers_never_reach_the_transport() {
    let transport = RecordingTransport::new(200, "{}");
    let c = client_with(transport.clone());
    let upload = DocumentUpload::new("x");

    let failures: Vec<(&str, DiscoveryError)> = vec![
        ("project_id", c.list_collections("").unwrap_err()),
        ("project_id", c.query("", &QueryRequest::default()).unwrap_err()),
        ("project_id", c.get_autocompletion("", "a", &AutocompletionOptions::default()).unwrap_err()),
        ("prefix", c.get_autocompletion("p", "", &AutocompletionOptions::default()).unwrap_err()),
        ("project_id", c.query_notices("", &NoticesOptions::default()).unwrap_err()),
        ("project_id", c.list_fields("", None).unwrap_err()),
        ("project_id", c.get_component_settings("").unwrap_err()),
        ("project_id", c.add_document("", "c", &upload).unwrap_err()),
        ("collection_id", c.add_document("p", "", &upload).unwrap_err()),
        ("project_id", c.update_document("", "c", "d", &upload).unwrap_err()),
        ("collection_id", c.update_document("p", "", "d", &upload).unwrap_err()),
        ("document_id", c.update_document("p", "c", "", &upload).unwrap_err()),
        ("project_id", c.delete_document("", "c", "d", None).unwrap_err()),
        ("collection_id", c.delete_document("p", "", "d", None).unwrap_err()),
        ("document_id", c.delete_document("p", "c", "", None).unwrap_err()),
        ("project_id", c.list_training_queries("").unwrap_err()),
        ("project_id", c.delete_training_queries("").unwrap_err()),
        ("project_id", c.create_training_query("", &training("q")).unwrap_err()),
        ("natural_language_query", c.create_training_query("p", &training("")).unwrap_err()),
        ("project_id", c.get_training_query("", "q").unwrap_err()),
        ("query_id", c.get_training_query("p", "").unwrap_err()),
        ("project_id", c.update_training_query("", "q", &training("q")).unwrap_err()),
        ("query_id", c.update_training_query("p", "", &training("q")).unwrap_err()),
        ("natural_language_query", c.update_training_query("p", "q", &training("")).unwrap_err()),
    ];

    for (field, err) in failures {
        match err {
            DiscoveryError::MissingArgument(name) => assert_eq!(name, field),
            other => panic!("expected missing {field}, got {other:?}"),
        }
    }
    assert!(transport.calls().is_empty());
}

#[test]
fn natural_language_query_scenario() {
    let transport = RecordingTransport::new(200, r#"{"matching_results":0,"results":[]}"#);
    let c = client_with(transport.clone());

    let query = QueryRequest {
        natural_language_query: Some("cats".to_string()),
        ..QueryRequest::default()
    };
    let resp = c.query("p1", &query).unwrap();
    assert_eq!(resp.result, Some(json!({ "matching_results": 0, "results": [] })));

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    let req = &calls[0];
    assert_eq!(req.method, HttpMethod::Post);
    assert_eq!(req.url, "https://discovery.example.com/v2/projects/p1/query");
    assert_eq!(req.query, vec![("version".to_string(), "2020-08-30".to_string())]);
    assert_eq!(req.body.as_json(), Some(&json!({ "natural_language_query": "cats" })));
    assert_eq!(
        req.header("X-IBMCloud-SDK-Analytics"),
        Some("service_name=discovery;service_version=V2;operation_id=query")
    );
}

#[test]
fn delete_training_queries_discards_the_body() {
    let transport = RecordingTransport::new(200, "this is not json");
    let c = client_with(transport.clone());

    c.delete_training_queries("p1").unwrap();
    let calls = transport.calls();
    assert_eq!(calls[0].method, HttpMethod::Delete);
    assert_eq!(
        calls[0].url,
        "https://discovery.example.com/v2/projects/p1/training_data/queries"
    );
}

#[test]
fn delete_training_queries_propagates_http_errors() {
    let transport = RecordingTransport::new(500, r#"{"code":500,"error":"boom"}"#);
    let c = client_with(transport);

    let err = c.delete_training_queries("p1").unwrap_err();
    assert!(matches!(err, DiscoveryError::Http { status: 500, ref message, .. } if message == "boom"));
}

#[test]
fn error_statuses_are_not_swallowed() {
    let transport = RecordingTransport::new(409, r#"{"code":409,"error":"data sharing conflict"}"#);
    let c = client_with(transport.clone());

    let err = c
        .add_document("p1", "c1", &DocumentUpload::new("x"))
        .unwrap_err();
    assert_eq!(err.status(), Some(409));
    assert_eq!(transport.calls().len(), 1);
}

#[test]
fn authenticator_decorates_the_sent_request() {
    let transport = RecordingTransport::new(200, "{}");
    let c = DiscoveryClient::builder()
        .version("2020-08-30")
        .service_url("https://discovery.example.com")
        .authenticator(BasicAuthenticator::new("user", "pass").unwrap())
        .shared_transport(transport.clone())
        .build()
        .unwrap();

    c.list_training_queries("p1").unwrap();
    let calls = transport.calls();
    assert_eq!(calls[0].header("Authorization"), Some("Basic dXNlcjpwYXNz"));
}

#[test]
fn build_methods_do_not_authenticate() {
    let transport = RecordingTransport::new(200, "{}");
    let c = DiscoveryClient::builder()
        .version("2020-08-30")
        .service_url("https://discovery.example.com")
        .authenticator(BasicAuthenticator::new("user", "pass").unwrap())
        .shared_transport(transport.clone())
        .build()
        .unwrap();

    let req = c.build_list_training_queries("p1").unwrap();
    assert!(req.header("Authorization").is_none());
    assert!(transport.calls().is_empty());
}

#[test]
fn upload_parts_reach_the_transport() {
    let transport = RecordingTransport::new(202, r#"{"document_id":"d1","status":"processing"}"#);
    let c = client_with(transport.clone());

    let upload = DocumentUpload::new(b"%PDF-1.4".to_vec()).metadata(r#"{"source":"scan"}"#);
    let resp = c.add_document("p1", "c1", &upload).unwrap();
    assert_eq!(resp.status, 202);

    let calls = transport.calls();
    let parts = calls[0].body.parts();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].name, "file");
    assert_eq!(parts[0].content_type, "application/octet-stream");
    assert_eq!(parts[1].name, "metadata");
    assert_eq!(parts[1].content_type, "text/plain");
    assert_eq!(parts[1].data, br#"{"source":"scan"}"#);
}

#[test]
fn empty_success_body_yields_no_result() {
    let transport = RecordingTransport::new(200, "");
    let c = client_with(transport);
    let resp = c.get_component_settings("p1").unwrap();
    assert_eq!(resp.status, 200);
    assert!(resp.result.is_none());
}

#[test]
fn detailed_response_into_typed_result() {
    #[derive(serde::Deserialize)]
    struct Collections {
        collections: Vec<serde_json::Value>,
    }

    let transport = RecordingTransport::new(200, r#"{"collections":[{"collection_id":"c1"}]}"#);
    let c = client_with(transport);
    let parsed: Collections = c.list_collections("p1").unwrap().into_result().unwrap();
    assert_eq!(parsed.collections.len(), 1);
}
