use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use jam_stf_core::codec::Codec;
use jam_stf_core::crypto::blake2b_256;
use jam_stf_core::importer;
use jam_stf_trace_runner::env::EnvVarSpec;
use serde::{Deserialize, Serialize};
use tracing::Span;

use crate::common::AppState;

const BIND_ADDR: EnvVarSpec = EnvVarSpec { key: "NODE_BIND_ADDR", sensitive: false };

pub fn launch(state: Arc<AppState>, parent_span: Span) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("server".into())
        .spawn(move || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(run_server(state, parent_span));
        })
        .unwrap()
}

async fn run_server(state: Arc<AppState>, parent_span: Span) {
    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .route("/state-root", get(state_root_handler))
        .route("/import-block", post(import_block_handler))
        .with_state(state);

    let addr: SocketAddr = BIND_ADDR.default("0.0.0.0:8080".to_string()).value.parse().expect("invalid NODE_BIND_ADDR");
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let _span = parent_span.enter();
    tracing::info!(%addr, "node listening");
    axum::serve(listener, app).await.unwrap();
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.report_metrics() {
        Ok((buffer, format)) => Response::builder()
            .header("Content-Type", format)
            .body(buffer.into())
            .map(|response| (StatusCode::OK, response))
            .unwrap_or_else(|_| (StatusCode::INTERNAL_SERVER_ERROR, "failed to build metrics response".into_response())),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "failed to collect metrics".into_response()),
    }
}

#[derive(Serialize)]
struct StateRootResponse {
    tip_hash: String,
    state_root: String,
}

async fn state_root_handler(State(state): State<Arc<AppState>>) -> Json<StateRootResponse> {
    let chain = state.chain.lock().await;
    let dict = jam_stf_core::dictionary::project(&chain.state);
    let root = jam_stf_core::merkle::root(&dict);
    Json(StateRootResponse {
        tip_hash: hex::encode(chain.tip_hash),
        state_root: hex::encode(root),
    })
}

#[derive(Deserialize)]
struct ImportBlockRequest {
    /// Hex-encoded codec bytes of a single `Block`.
    block: String,
}

#[derive(Serialize)]
enum ImportBlockResponse {
    Imported { tip_hash: String, state_root: String },
    Rejected { reason: String },
}

async fn import_block_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ImportBlockRequest>,
) -> (StatusCode, Json<ImportBlockResponse>) {
    let bytes = match hex::decode(request.block.trim_start_matches("0x")) {
        Ok(bytes) => bytes,
        Err(err) => return (StatusCode::BAD_REQUEST, Json(ImportBlockResponse::Rejected { reason: err.to_string() })),
    };
    let block = match jam_stf_core::block::Block::decode_from_slice(&bytes) {
        Ok(block) => block,
        Err(err) => return (StatusCode::BAD_REQUEST, Json(ImportBlockResponse::Rejected { reason: err.to_string() })),
    };

    let mut chain = state.chain.lock().await;
    let timer = state.metrics.import_duration_seconds.start_timer();
    let outcome = importer::import_block(&chain.state, &chain.tip_hash, &block, &state.config, state.vrf.as_ref(), state.pvm.as_ref());
    timer.observe_duration();

    match outcome {
        Ok(result) => {
            let header_hash = blake2b_256(&block.header.encode_to_vec());
            chain.tip_hash = header_hash;
            chain.state = result.post_state;
            state.metrics.import_block_total.inc();
            state.metrics.tip_slot.set(block.header.slot as f64);
            (
                StatusCode::OK,
                Json(ImportBlockResponse::Imported {
                    tip_hash: hex::encode(header_hash),
                    state_root: hex::encode(result.post_state_root),
                }),
            )
        }
        Err(err) => {
            state.metrics.import_block_failed_total.inc();
            (StatusCode::UNPROCESSABLE_ENTITY, Json(ImportBlockResponse::Rejected { reason: err.to_string() }))
        }
    }
}
