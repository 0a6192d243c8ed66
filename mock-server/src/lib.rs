//! In-memory Discovery V2 server for integration tests and local runs.
//!
//! Projects and collections spring into existence on first write. Every
//! route requires the `version` query parameter, as the real service does.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const FORCE_HEADER: &str = "x-watson-discovery-force";

/// Response header echoing the force flag the server received.
pub const FORCE_SEEN_HEADER: &str = "x-watson-discovery-force-seen";

const BODY_LIMIT: usize = 50 * 1024 * 1024;

#[derive(Clone, Debug, Serialize)]
pub struct Document {
    pub document_id: String,
    pub collection_id: String,
    pub filename: Option<String>,
    pub content_type: String,
    pub text: String,
    pub metadata: Option<Value>,
    #[serde(skip)]
    pub json: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrainingExample {
    pub document_id: String,
    pub collection_id: String,
    pub relevance: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct TrainingQueryRecord {
    pub query_id: String,
    pub natural_language_query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    pub examples: Vec<TrainingExample>,
}

#[derive(Debug, Deserialize)]
pub struct TrainingQueryInput {
    #[serde(default)]
    pub natural_language_query: String,
    #[serde(default)]
    pub examples: Vec<TrainingExample>,
    pub filter: Option<String>,
}

#[derive(Debug, Default)]
pub struct Project {
    pub collections: BTreeMap<String, BTreeMap<String, Document>>,
    pub training_queries: BTreeMap<String, TrainingQueryRecord>,
}

pub type Db = Arc<RwLock<HashMap<String, Project>>>;

/// Error body in the service's `{"code", "error"}` shape.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "code": self.status.as_u16(), "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, e.body_text())
    }
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/v2/projects/{project_id}/collections", get(list_collections))
        .route("/v2/projects/{project_id}/query", post(query))
        .route("/v2/projects/{project_id}/autocompletion", get(autocompletion))
        .route("/v2/projects/{project_id}/notices", get(notices))
        .route("/v2/projects/{project_id}/fields", get(list_fields))
        .route("/v2/projects/{project_id}/component_settings", get(component_settings))
        .route(
            "/v2/projects/{project_id}/collections/{collection_id}/documents",
            post(add_document),
        )
        .route(
            "/v2/projects/{project_id}/collections/{collection_id}/documents/{document_id}",
            post(update_document).delete(delete_document),
        )
        .route(
            "/v2/projects/{project_id}/training_data/queries",
            get(list_training_queries)
                .post(create_training_query)
                .delete(delete_training_queries),
        )
        .route(
            "/v2/projects/{project_id}/training_data/queries/{query_id}",
            get(get_training_query).post(update_training_query),
        )
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(middleware::from_fn(require_version))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

#[derive(Deserialize)]
struct VersionParam {
    version: Option<String>,
}

async fn require_version(request: Request, next: Next) -> Response {
    let version = Query::<VersionParam>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(p)| p.version)
        .filter(|v| !v.is_empty());
    if version.is_none() {
        return ApiError::new(StatusCode::BAD_REQUEST, "Missing required query parameter 'version'")
            .into_response();
    }
    next.run(request).await
}

// ---------------------------------------------------------------------------
// Collections and queries
// ---------------------------------------------------------------------------

async fn list_collections(State(db): State<Db>, Path(project_id): Path<String>) -> Json<Value> {
    let db = db.read().await;
    let collections: Vec<Value> = db
        .get(&project_id)
        .map(|p| {
            p.collections
                .keys()
                .map(|id| json!({ "collection_id": id, "name": id }))
                .collect()
        })
        .unwrap_or_default();
    Json(json!({ "collections": collections }))
}

#[derive(Debug, Default, Deserialize)]
pub struct QueryBody {
    pub collection_ids: Option<Vec<String>>,
    pub query: Option<String>,
    pub natural_language_query: Option<String>,
    pub count: Option<usize>,
    pub offset: Option<usize>,
}

async fn query(
    State(db): State<Db>,
    Path(project_id): Path<String>,
    Json(body): Json<QueryBody>,
) -> Json<Value> {
    let db = db.read().await;
    let term = body
        .natural_language_query
        .or(body.query)
        .map(|t| t.to_lowercase());
    let matches: Vec<&Document> = documents(db.get(&project_id), body.collection_ids.as_deref())
        .filter(|doc| match &term {
            Some(term) => doc.text.to_lowercase().contains(term.as_str()),
            None => true,
        })
        .collect();
    let results: Vec<Value> = matches
        .iter()
        .skip(body.offset.unwrap_or(0))
        .take(body.count.unwrap_or(10))
        .map(|doc| {
            json!({
                "document_id": doc.document_id,
                "result_metadata": { "collection_id": doc.collection_id },
                "text": doc.text,
            })
        })
        .collect();
    Json(json!({ "matching_results": matches.len(), "results": results }))
}

#[derive(Debug, Deserialize)]
pub struct AutocompletionParams {
    pub prefix: String,
    pub collection_ids: Option<String>,
    pub count: Option<usize>,
}

async fn autocompletion(
    State(db): State<Db>,
    Path(project_id): Path<String>,
    Query(params): Query<AutocompletionParams>,
) -> Json<Value> {
    let db = db.read().await;
    let ids = split_ids(params.collection_ids.as_deref());
    let prefix = params.prefix.to_lowercase();
    let words: BTreeSet<String> = documents(db.get(&project_id), ids.as_deref())
        .flat_map(|doc| {
            doc.text
                .split(|c: char| !c.is_alphanumeric())
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
        })
        .filter(|word| !word.is_empty() && word.starts_with(&prefix))
        .collect();
    let completions: Vec<String> = words.into_iter().take(params.count.unwrap_or(5)).collect();
    Json(json!({ "completions": completions }))
}

async fn notices(Path(_project_id): Path<String>) -> Json<Value> {
    Json(json!({ "matching_results": 0, "notices": [] }))
}

#[derive(Debug, Deserialize)]
pub struct FieldsParams {
    pub collection_ids: Option<String>,
}

async fn list_fields(
    State(db): State<Db>,
    Path(project_id): Path<String>,
    Query(params): Query<FieldsParams>,
) -> Json<Value> {
    let db = db.read().await;
    let ids = split_ids(params.collection_ids.as_deref());
    let mut seen = BTreeSet::new();
    for doc in documents(db.get(&project_id), ids.as_deref()) {
        if let Some(Value::Object(map)) = &doc.json {
            for (key, value) in map {
                seen.insert((doc.collection_id.clone(), key.clone(), json_type(value)));
            }
        }
    }
    let fields: Vec<Value> = seen
        .into_iter()
        .map(|(collection_id, field, kind)| json!({ "field": field, "type": kind, "collection_id": collection_id }))
        .collect();
    Json(json!({ "fields": fields }))
}

async fn component_settings(Path(_project_id): Path<String>) -> Json<Value> {
    Json(json!({
        "fields_shown": {
            "body": { "use_passage": true, "field": "text" },
            "title": { "field": "title" }
        },
        "autocomplete": true,
        "structured_search": false,
        "results_per_page": 10,
        "aggregations": []
    }))
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

async fn add_document(
    State(db): State<Db>,
    Path((project_id, collection_id)): Path<(String, String)>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let document_id = Uuid::new_v4().simple().to_string();
    store_document(db, project_id, collection_id, document_id, &headers, multipart).await
}

async fn update_document(
    State(db): State<Db>,
    Path((project_id, collection_id, document_id)): Path<(String, String, String)>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    store_document(db, project_id, collection_id, document_id, &headers, multipart).await
}

async fn store_document(
    db: Db,
    project_id: String,
    collection_id: String,
    document_id: String,
    headers: &HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut file: Option<(Option<String>, String, Vec<u8>)> = None;
    let mut metadata = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await?.to_vec();
                file = Some((filename, content_type, data));
            }
            Some("metadata") => {
                let text = field.text().await?;
                let value = serde_json::from_str::<Value>(&text)
                    .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("Invalid metadata: {e}")))?;
                metadata = Some(value);
            }
            _ => {}
        }
    }
    let (filename, content_type, data) =
        file.ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "A file part is required"))?;

    let json = serde_json::from_slice::<Value>(&data).ok();
    let text = match &json {
        Some(value) => flatten_text(value),
        None => String::from_utf8_lossy(&data).into_owned(),
    };
    let document = Document {
        document_id: document_id.clone(),
        collection_id: collection_id.clone(),
        filename,
        content_type,
        text,
        metadata,
        json,
    };
    tracing::info!(%project_id, %collection_id, %document_id, "stored document");
    db.write()
        .await
        .entry(project_id)
        .or_default()
        .collections
        .entry(collection_id)
        .or_default()
        .insert(document_id.clone(), document);

    let body = json!({ "document_id": document_id, "status": "processing" });
    Ok(with_force_echo((StatusCode::ACCEPTED, Json(body)).into_response(), headers))
}

async fn delete_document(
    State(db): State<Db>,
    Path((project_id, collection_id, document_id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Some(collection) = db
        .write()
        .await
        .get_mut(&project_id)
        .and_then(|p| p.collections.get_mut(&collection_id))
    {
        collection.remove(&document_id);
    }
    let body = json!({ "document_id": document_id, "status": "deleted" });
    with_force_echo(Json(body).into_response(), &headers)
}

// ---------------------------------------------------------------------------
// Training data
// ---------------------------------------------------------------------------

async fn list_training_queries(State(db): State<Db>, Path(project_id): Path<String>) -> Json<Value> {
    let db = db.read().await;
    let queries: Vec<&TrainingQueryRecord> = db
        .get(&project_id)
        .map(|p| p.training_queries.values().collect())
        .unwrap_or_default();
    Json(json!({ "queries": queries }))
}

async fn delete_training_queries(State(db): State<Db>, Path(project_id): Path<String>) -> StatusCode {
    if let Some(project) = db.write().await.get_mut(&project_id) {
        project.training_queries.clear();
    }
    StatusCode::NO_CONTENT
}

async fn create_training_query(
    State(db): State<Db>,
    Path(project_id): Path<String>,
    Json(input): Json<TrainingQueryInput>,
) -> Result<(StatusCode, Json<TrainingQueryRecord>), ApiError> {
    let record = training_record(Uuid::new_v4().simple().to_string(), input)?;
    db.write()
        .await
        .entry(project_id)
        .or_default()
        .training_queries
        .insert(record.query_id.clone(), record.clone());
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_training_query(
    State(db): State<Db>,
    Path((project_id, query_id)): Path<(String, String)>,
) -> Result<Json<TrainingQueryRecord>, ApiError> {
    let db = db.read().await;
    db.get(&project_id)
        .and_then(|p| p.training_queries.get(&query_id))
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Training query not found"))
}

async fn update_training_query(
    State(db): State<Db>,
    Path((project_id, query_id)): Path<(String, String)>,
    Json(input): Json<TrainingQueryInput>,
) -> Result<(StatusCode, Json<TrainingQueryRecord>), ApiError> {
    let mut db = db.write().await;
    let slot = db
        .get_mut(&project_id)
        .and_then(|p| p.training_queries.get_mut(&query_id))
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Training query not found"))?;
    *slot = training_record(query_id, input)?;
    Ok((StatusCode::CREATED, Json(slot.clone())))
}

fn training_record(query_id: String, input: TrainingQueryInput) -> Result<TrainingQueryRecord, ApiError> {
    if input.natural_language_query.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "natural_language_query is required",
        ));
    }
    Ok(TrainingQueryRecord {
        query_id,
        natural_language_query: input.natural_language_query,
        filter: input.filter,
        examples: input.examples,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn documents<'a>(
    project: Option<&'a Project>,
    collection_ids: Option<&'a [String]>,
) -> impl Iterator<Item = &'a Document> + 'a {
    project
        .into_iter()
        .flat_map(|p| p.collections.iter())
        .filter(move |(id, _)| collection_ids.is_none_or(|ids| ids.contains(*id)))
        .flat_map(|(_, docs)| docs.values())
}

fn split_ids(raw: Option<&str>) -> Option<Vec<String>> {
    raw.map(|s| s.split(',').filter(|id| !id.is_empty()).map(str::to_string).collect())
}

fn flatten_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(flatten_text).collect::<Vec<_>>().join(" "),
        Value::Object(map) => map.values().map(flatten_text).collect::<Vec<_>>().join(" "),
        other => other.to_string(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "string",
        Value::Number(n) if n.is_i64() || n.is_u64() => "long",
        Value::Number(_) => "double",
        Value::Bool(_) => "boolean",
        Value::Array(_) => "array",
        Value::Object(_) => "nested",
        Value::Null => "null",
    }
}

fn with_force_echo(mut response: Response, headers: &HeaderMap) -> Response {
    if let Some(value) = headers.get(FORCE_HEADER) {
        response
            .headers_mut()
            .insert(FORCE_SEEN_HEADER, value.clone());
    }
    response
}
