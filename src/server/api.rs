//! HTTP API server implementation

use axum::{
    extract::{Json, State},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::config::TranslatorConfig;
use crate::core::cost::{CostBreakdown, CostEstimator};
use crate::core::models::{TranslationRequest, TranslationResult, UsageReport};
use crate::core::orchestrator::Orchestrator;

/// Application state
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    costs: CostEstimator,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            costs: CostEstimator::new(),
        }
    }
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
}

/// Models in use
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct ModelsResponse {
    pub translation_model: String,
    pub evaluation_model: String,
    pub quality_threshold: f64,
    pub max_retries: u32,
}

/// Translation request
#[derive(Deserialize)]
pub struct TranslateRequest {
    pub source_lang: String,
    pub target_lang: String,
    pub context: Option<String>,
    pub text_list: Vec<String>,
}

/// Translation response
#[derive(Serialize, Debug)]
pub struct TranslateResponse {
    pub results: Vec<TranslationResult>,
    pub usage: UsageReport,
    pub estimated_cost: CostBreakdown,
}

/// Error response
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize, Debug)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
}

fn invalid_request(message: impl Into<String>) -> axum::Json<ErrorResponse> {
    axum::Json(ErrorResponse {
        error: ErrorDetail {
            message: message.into(),
            code: Some("invalid_request".to_string()),
            r#type: Some("invalid_request_error".to_string()),
        },
    })
}

/// Health check handler
async fn health_check() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Get models handler
async fn get_models(State(state): State<Arc<AppState>>) -> axum::Json<ModelsResponse> {
    let orchestrator = &state.orchestrator;
    axum::Json(ModelsResponse {
        translation_model: orchestrator.translation_model_id().to_string(),
        evaluation_model: orchestrator.evaluation_model_id().to_string(),
        quality_threshold: orchestrator.quality_threshold(),
        max_retries: orchestrator.max_retries(),
    })
}

/// Translation handler
async fn translate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TranslateRequest>,
) -> Result<axum::Json<TranslateResponse>, axum::Json<ErrorResponse>> {
    if payload.text_list.is_empty() {
        return Err(invalid_request("text_list cannot be empty"));
    }

    let mut requests = Vec::with_capacity(payload.text_list.len());
    for text in payload.text_list {
        let mut request = TranslationRequest::new(text, payload.source_lang.clone(), payload.target_lang.clone())
            .map_err(|e| invalid_request(e.to_string()))?;
        if let Some(context) = payload.context.as_deref().filter(|c| !c.trim().is_empty()) {
            request = request.with_context(context);
        }
        requests.push(request);
    }

    let report = state.orchestrator.translate_batch(&requests).await;
    if report.failed > 0 {
        warn!("{} of {} translations failed", report.failed, report.results.len());
    }

    let estimated_cost = state.costs.estimate_all(&report.results);
    Ok(axum::Json(TranslateResponse {
        results: report.results,
        usage: report.usage,
        estimated_cost,
    }))
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/v1/models", get(get_models))
        .route("/translate", post(translate))
        .with_state(Arc::new(state))
}

/// Run the HTTP server
pub async fn run_server(config: TranslatorConfig, host: String, port: u16) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::from_config(config)?;
    let app = router(AppState::new(orchestrator));

    // Bind address
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("Starting server on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
