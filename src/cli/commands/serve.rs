//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for question answering and search.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::RagError;
use crate::pipeline::RagPipeline;
use crate::search::SearchOverrides;
use crate::vector_index::{DocumentMetadata, RetrievedHit, SearchFilter};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Serve) {
        Output::error(&e.to_string());
        return Err(e.into());
    }

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);

    let pipeline = Arc::new(RagPipeline::from_settings(settings)?);
    let app = router(pipeline.clone());

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("ragtube API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    Output::kv("Collection", pipeline.collection());
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Ask (RAG)", "POST /qa");
    Output::kv("Search", "POST /search");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the API router around a shared pipeline.
pub fn router(pipeline: Arc<RagPipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/qa", post(qa))
        .route("/search", post(search))
        .layer(cors)
        .with_state(pipeline)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct QaRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct QaResponse {
    answer: String,
    hits: Vec<HitInfo>,
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    min_importance: Option<f32>,
    #[serde(default)]
    doc_id: Option<String>,
    /// Search this collection instead of the configured one.
    #[serde(default)]
    collection: Option<String>,
}

#[derive(Serialize)]
struct SearchResponse {
    hits: Vec<HitInfo>,
}

#[derive(Serialize)]
struct HitInfo {
    score: f32,
    doc_id: String,
    title: String,
    text: String,
    chunk_index: usize,
    total_chunks: usize,
    source_url: String,
    tags: BTreeSet<String>,
    importance: f32,
    metadata: DocumentMetadata,
}

impl From<RetrievedHit> for HitInfo {
    fn from(hit: RetrievedHit) -> Self {
        let p = hit.payload;
        Self {
            score: hit.score,
            doc_id: p.doc_id,
            title: p.title,
            text: p.text,
            chunk_index: p.chunk_index,
            total_chunks: p.total_chunks,
            source_url: p.source_url,
            tags: p.tags,
            importance: p.importance,
            metadata: p.metadata,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(e: RagError) -> Response {
    let status = match e {
        RagError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error!("Request failed: {}", e);
    (status, Json(ErrorResponse { error: e.to_string() })).into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn qa(State(pipeline): State<Arc<RagPipeline>>, Json(req): Json<QaRequest>) -> Response {
    let top_k = req.top_k.unwrap_or(pipeline.settings().search.top_k);
    match pipeline.query(&req.query, top_k).await {
        Ok(response) => Json(QaResponse {
            answer: response.answer,
            hits: response.hits.into_iter().map(HitInfo::from).collect(),
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn search(State(pipeline): State<Arc<RagPipeline>>, Json(req): Json<SearchRequest>) -> Response {
    let top_k = req.top_k.unwrap_or(pipeline.settings().search.top_k);
    let filter = SearchFilter {
        tags: req.tag.into_iter().collect(),
        min_importance: req.min_importance,
        doc_id: req.doc_id,
    };
    let overrides = SearchOverrides {
        collection: req.collection,
        ..Default::default()
    };

    match pipeline.retrieve_with(&req.query, top_k, &filter, &overrides).await {
        Ok(hits) => Json(SearchResponse {
            hits: hits.into_iter().map(HitInfo::from).collect(),
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}
