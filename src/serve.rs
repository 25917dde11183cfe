use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use log::{error, info, warn};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc as StdArc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::analyzer::{Analyzer, SubprocessAnalyzer};
use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    validate_analysis_request, validate_recording_input, Analysis, NewAnalysis, Recording,
};
use crate::storage::{Storage, StorageError};

const RECORDING_NOT_FOUND: &str = "Recording not found";
const ANALYSIS_NOT_FOUND: &str = "Analysis not found";
const ANALYSIS_FAILED: &str = "Failed to analyze recording";

// State shared by all API handlers
pub struct AppState {
    pub storage: Storage,
    pub analyzer: StdArc<dyn Analyzer>,
}

/// Build the API router
///
/// When `static_dir` is set, paths that match no API route are served from it.
pub fn build_router(state: StdArc<AppState>, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/recordings",
            get(list_recordings_handler).post(create_recording_handler),
        )
        .route("/api/recordings/{id}", get(get_recording_handler))
        .route(
            "/api/recordings/{id}/analysis",
            get(get_recording_analysis_handler),
        )
        .route("/api/analyses", post(create_analysis_handler))
        .route("/api/analyses/{id}", get(get_analysis_handler));

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router.layer(cors).with_state(state)
}

/// Open the database, build the analyzer and serve until the process exits
pub fn serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_server(config))
}

pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pool = crate::db::open_and_init(&config.database_path).await?;

    let app_state = StdArc::new(AppState {
        storage: Storage::new(pool),
        analyzer: StdArc::new(SubprocessAnalyzer::new(&config.analyzer)),
    });

    info!("Database: {}", config.database_path.display());
    info!(
        "Analyzer: {} {} (timeout {}s, max {} concurrent)",
        config.analyzer.program,
        config.analyzer.args.join(" "),
        config.analyzer.timeout_secs,
        config.analyzer.max_concurrent
    );
    if let Some(dir) = &config.static_dir {
        info!("Static files: {}", dir.display());
    }

    println!("Listening on: http://[::]:{} (IPv4 + IPv6)", config.port);
    println!("Endpoints:");
    println!("  GET  /health  - Health check");
    println!("  GET  /api/recordings  - List recordings");
    println!("  POST /api/recordings  - Create a recording");
    println!("  GET  /api/recordings/:id  - Recording by id");
    println!("  GET  /api/recordings/:id/analysis  - Latest analysis for a recording");
    println!("  POST /api/analyses  - Analyze a recording");
    println!("  GET  /api/analyses/:id  - Analysis by id");

    let app = build_router(app_state, config.static_dir.clone());

    let listener = tokio::net::TcpListener::bind(format!("[::]:{}", config.port))
        .await
        .map_err(|e| format!("Failed to bind to port {}: {}", config.port, e))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    Ok(())
}

// Health check endpoint - returns 200 OK if server is running
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

fn json_body(
    body: Result<Json<Value>, JsonRejection>,
    message: &'static str,
) -> ApiResult<Value> {
    body.map(|Json(value)| value).map_err(|rejection| {
        warn!("{}: {}", message, rejection.body_text());
        ApiError::BadRequest {
            message,
            detail: rejection.body_text(),
        }
    })
}

fn path_id(id: Result<Path<i64>, PathRejection>) -> ApiResult<i64> {
    id.map(|Path(id)| id).map_err(|rejection| ApiError::BadRequest {
        message: "Invalid id",
        detail: rejection.body_text(),
    })
}

async fn create_recording_handler(
    State(state): State<StdArc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Recording>> {
    const INVALID: &str = "Invalid recording data";
    const FAILED: &str = "Failed to create recording";

    info!("Creating new recording");
    let body = json_body(body, INVALID)?;
    let input = validate_recording_input(&body).map_err(|source| {
        warn!("{}: {}", INVALID, source);
        ApiError::Validation {
            message: INVALID,
            source,
        }
    })?;

    let recording = state.storage.create_recording(&input).await.map_err(|source| {
        error!("Recording creation error: {}", source);
        ApiError::Persistence {
            message: FAILED,
            source,
        }
    })?;

    info!("Recording created: {}", recording.id);
    Ok(Json(recording))
}

async fn create_analysis_handler(
    State(state): State<StdArc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Analysis>> {
    const INVALID: &str = "Invalid analysis data";

    info!("Creating new analysis");
    let body = json_body(body, INVALID)?;
    let request = validate_analysis_request(&body).map_err(|source| {
        warn!("{}: {}", INVALID, source);
        ApiError::Validation {
            message: INVALID,
            source,
        }
    })?;

    let recording = state
        .storage
        .get_recording(request.recording_id)
        .await
        .map_err(|source| {
            error!("Failed to look up recording {}: {}", request.recording_id, source);
            ApiError::Persistence {
                message: ANALYSIS_FAILED,
                source,
            }
        })?
        .ok_or(ApiError::NotFound(RECORDING_NOT_FOUND))?;

    info!("Starting analysis for recording: {}", recording.id);
    let fields = state
        .analyzer
        .analyze(&recording.audio_url)
        .await
        .map_err(|source| {
            error!("Analysis error for recording {}: {}", recording.id, source);
            ApiError::Analysis {
                message: ANALYSIS_FAILED,
                source,
            }
        })?;
    info!(
        "Analysis result for recording {}: clarity={} pacing={} tone={}",
        recording.id, fields.clarity, fields.pacing, fields.emotional_tone
    );

    let analysis = state
        .storage
        .create_analysis(&NewAnalysis::from_request(request, fields))
        .await
        .map_err(|source| {
            error!(
                "Failed to store analysis for recording {}: {}",
                recording.id, source
            );
            ApiError::Persistence {
                message: ANALYSIS_FAILED,
                source,
            }
        })?;

    info!("Analysis created: {}", analysis.id);
    Ok(Json(analysis))
}

async fn list_recordings_handler(
    State(state): State<StdArc<AppState>>,
) -> ApiResult<Json<Vec<Recording>>> {
    let recordings = state.storage.get_all_recordings().await.map_err(|source| {
        error!("Failed to list recordings: {}", source);
        ApiError::Persistence {
            message: "Failed to fetch recordings",
            source,
        }
    })?;
    Ok(Json(recordings))
}

async fn get_recording_handler(
    State(state): State<StdArc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Recording>> {
    let id = path_id(id)?;
    let recording = state
        .storage
        .get_recording(id)
        .await
        .map_err(|source| {
            error!("Failed to fetch recording {}: {}", id, source);
            ApiError::Persistence {
                message: "Failed to fetch recording",
                source,
            }
        })?
        .ok_or(ApiError::NotFound(RECORDING_NOT_FOUND))?;
    Ok(Json(recording))
}

async fn get_recording_analysis_handler(
    State(state): State<StdArc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Analysis>> {
    let id = path_id(id)?;
    let persistence = |source: StorageError| {
        error!("Failed to fetch analysis for recording {}: {}", id, source);
        ApiError::Persistence {
            message: "Failed to fetch analysis",
            source,
        }
    };

    if state
        .storage
        .get_recording(id)
        .await
        .map_err(persistence)?
        .is_none()
    {
        return Err(ApiError::NotFound(RECORDING_NOT_FOUND));
    }

    let analysis = state
        .storage
        .get_analysis_by_recording_id(id)
        .await
        .map_err(persistence)?
        .ok_or(ApiError::NotFound(ANALYSIS_NOT_FOUND))?;
    Ok(Json(analysis))
}

async fn get_analysis_handler(
    State(state): State<StdArc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Analysis>> {
    let id = path_id(id)?;
    let analysis = state
        .storage
        .get_analysis(id)
        .await
        .map_err(|source| {
            error!("Failed to fetch analysis {}: {}", id, source);
            ApiError::Persistence {
                message: "Failed to fetch analysis",
                source,
            }
        })?
        .ok_or(ApiError::NotFound(ANALYSIS_NOT_FOUND))?;
    Ok(Json(analysis))
}
