//! End-to-end runs against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives every client
//! operation over real HTTP through the default `UreqTransport`. This
//! checks that the requests the client builds are ones a server can route,
//! decode and answer.

use discovery_core::{
    AutocompletionOptions, DiscoveryClient, DiscoveryError, DocumentContent, DocumentUpload,
    NoAuthAuthenticator, NoticesOptions, QueryRequest, TrainingExample, TrainingQuery,
};
use serde_json::json;

/// Run the mock server on its own runtime thread and return its base URL.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

/// Answer a single connection with `response`, byte for byte.
fn serve_once(response: Vec<u8>) -> String {
    use std::io::{Read, Write};

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        stream.write_all(&response).unwrap();
    });
    format!("http://{addr}")
}

fn raw_response(extra_headers: &[u8], body: &[u8]) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n", body.len()).into_bytes();
    out.extend_from_slice(extra_headers);
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    out
}

fn client(base_url: &str) -> DiscoveryClient {
    DiscoveryClient::builder()
        .version("2020-08-30")
        .service_url(base_url)
        .authenticator(NoAuthAuthenticator)
        .build()
        .unwrap()
}

fn nl_query(text: &str) -> QueryRequest {
    QueryRequest {
        natural_language_query: Some(text.to_string()),
        ..QueryRequest::default()
    }
}

#[test]
fn document_and_training_lifecycle() {
    let client = client(&start_server());

    // Step 1: a fresh project has no collections.
    let resp = client.list_collections("p1").unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.result.unwrap()["collections"], json!([]));

    // Step 2: upload a text document with metadata.
    let upload = DocumentUpload::new("Cats purr when happy")
        .filename("cats.txt")
        .content_type("text/plain")
        .metadata(r#"{"author":"tester"}"#);
    let resp = client.add_document("p1", "c1", &upload).unwrap();
    assert_eq!(resp.status, 202);
    let result = resp.result.unwrap();
    assert_eq!(result["status"], "processing");
    let cat_id = result["document_id"].as_str().unwrap().to_string();

    // Step 3: upload a JSON document with the force flag.
    let upload = DocumentUpload::new(DocumentContent::Json(json!({ "title": "Dogs bark", "year": 2020 })))
        .force(true);
    let resp = client.add_document("p1", "c2", &upload).unwrap();
    assert_eq!(resp.status, 202);
    assert_eq!(resp.header("x-watson-discovery-force-seen"), Some("true"));

    // Step 4: both collections now exist.
    let resp = client.list_collections("p1").unwrap();
    assert_eq!(resp.result.unwrap()["collections"].as_array().unwrap().len(), 2);

    // Step 5: query, with and without a collection filter.
    let result = client.query("p1", &nl_query("cats")).unwrap().result.unwrap();
    assert_eq!(result["matching_results"], 1);
    assert_eq!(result["results"][0]["document_id"], cat_id.as_str());

    let filtered = QueryRequest {
        collection_ids: Some(vec!["c2".to_string()]),
        ..nl_query("cats")
    };
    let result = client.query("p1", &filtered).unwrap().result.unwrap();
    assert_eq!(result["matching_results"], 0);

    // Step 6: autocompletion, fields, notices, component settings.
    let options = AutocompletionOptions {
        collection_ids: Some(vec!["c1".to_string(), "c2".to_string()]),
        count: Some(5),
        ..AutocompletionOptions::default()
    };
    let result = client.get_autocompletion("p1", "pu", &options).unwrap().result.unwrap();
    assert_eq!(result["completions"], json!(["purr"]));

    let ids = vec!["c2".to_string()];
    let result = client.list_fields("p1", Some(&ids)).unwrap().result.unwrap();
    assert_eq!(result["fields"].as_array().unwrap().len(), 2);

    let result = client
        .query_notices("p1", &NoticesOptions::default())
        .unwrap()
        .result
        .unwrap();
    assert_eq!(result["matching_results"], 0);

    let resp = client.get_component_settings("p1").unwrap();
    assert_eq!(resp.status, 200);
    assert!(resp.result.unwrap()["fields_shown"].is_object());

    // Step 7: training query create, get, update, list.
    let training = TrainingQuery {
        natural_language_query: "happy cats".to_string(),
        examples: vec![TrainingExample::new(&cat_id, "c1", 10)],
        filter: None,
    };
    let resp = client.create_training_query("p1", &training).unwrap();
    assert_eq!(resp.status, 201);
    let query_id = resp.result.unwrap()["query_id"].as_str().unwrap().to_string();

    let result = client.get_training_query("p1", &query_id).unwrap().result.unwrap();
    assert_eq!(result["natural_language_query"], "happy cats");
    assert_eq!(result["examples"][0]["relevance"], 10);

    let updated = TrainingQuery {
        natural_language_query: "content cats".to_string(),
        examples: Vec::new(),
        filter: Some("collection_id::c1".to_string()),
    };
    let resp = client.update_training_query("p1", &query_id, &updated).unwrap();
    assert_eq!(resp.status, 201);
    assert_eq!(resp.result.unwrap()["filter"], "collection_id::c1");

    let result = client.list_training_queries("p1").unwrap().result.unwrap();
    assert_eq!(result["queries"].as_array().unwrap().len(), 1);

    // Step 8: delete all training queries; the query is gone.
    client.delete_training_queries("p1").unwrap();
    let err = client.get_training_query("p1", &query_id).unwrap_err();
    match err {
        DiscoveryError::Http { status, message, .. } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Training query not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Step 9: replace the cat document; it no longer matches.
    let resp = client
        .update_document("p1", "c1", &cat_id, &DocumentUpload::new("Only birds here"))
        .unwrap();
    assert_eq!(resp.status, 202);
    assert_eq!(resp.result.unwrap()["document_id"], cat_id.as_str());
    let result = client.query("p1", &nl_query("cats")).unwrap().result.unwrap();
    assert_eq!(result["matching_results"], 0);

    // Step 10: delete the document, twice; both report "deleted".
    for _ in 0..2 {
        let resp = client.delete_document("p1", "c1", &cat_id, None).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.result.unwrap()["status"], "deleted");
    }
}

#[test]
fn special_character_ids_reach_the_server_intact() {
    let client = client(&start_server());

    let resp = client
        .add_document("proj 1", "my coll/é", &DocumentUpload::new("hello"))
        .unwrap();
    assert_eq!(resp.status, 202);

    let result = client.list_collections("proj 1").unwrap().result.unwrap();
    assert_eq!(result["collections"][0]["collection_id"], "my coll/é");

    let result = client.list_collections("proj").unwrap().result.unwrap();
    assert_eq!(result["collections"], json!([]));
}

#[test]
fn server_errors_are_propagated() {
    let client = client(&start_server());

    let err = client
        .add_document("p1", "c1", &DocumentUpload::default())
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("A file part is required"));
}

#[test]
fn connection_failure_is_a_transport_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let client = client(&format!("http://{addr}"));

    let err = client.list_collections("p1").unwrap_err();
    assert!(matches!(err, DiscoveryError::Transport(_)));

    let err = client.delete_training_queries("p1").unwrap_err();
    assert!(matches!(err, DiscoveryError::Transport(_)));
}

#[test]
fn responses_above_ten_mib_are_read_in_full() {
    let client = client(&start_server());

    let mut text = "cats ".repeat(11 * 1024 * 1024 / 5);
    text.push_str("end");
    let resp = client
        .add_document("p1", "c1", &DocumentUpload::new(text.as_str()).content_type("text/plain"))
        .unwrap();
    assert_eq!(resp.status, 202);

    let result = client.query("p1", &nl_query("cats")).unwrap().result.unwrap();
    assert_eq!(result["matching_results"], 1);
    assert_eq!(result["results"][0]["text"].as_str().unwrap().len(), text.len());
}

#[test]
fn non_utf8_body_is_discarded_by_delete_training_queries() {
    let base = serve_once(raw_response(b"", &[0xff, 0xfe, 0x00, 0x80]));
    client(&base).delete_training_queries("p1").unwrap();
}

#[test]
fn non_ascii_header_values_are_kept() {
    let base = serve_once(raw_response(b"X-Note: caf\xe9\r\n", b"{}"));
    let resp = client(&base).list_collections("p1").unwrap();
    assert_eq!(resp.header("x-note"), Some("caf\u{FFFD}"));
    assert_eq!(resp.result, Some(json!({})));
}
