//! `webpilot serve`: HTTP surface wrapping the dispatch loop.
//!
//! One endpoint: POST /automate runs a task and reports how it ended.
//! Context files are looked up inside the configured context directory;
//! path traversal in the file name is rejected outright.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use webpilot_agent::{load_context_file, run_task, BrowserExecutor};
use webpilot_core::{Config, Error, RunOutcome};
use webpilot_oracle::create_oracle;

struct AppState {
    config: Config,
    context_dir: PathBuf,
}

#[derive(Deserialize)]
struct AutomateRequest {
    query: String,
    #[serde(default)]
    context_file: Option<String>,
}

#[derive(Serialize)]
struct AutomateResponse {
    status: String,
    answer: String,
    turns: u32,
}

pub async fn run(
    config_path: &Path,
    host: &str,
    port: u16,
    context_dir: PathBuf,
) -> anyhow::Result<()> {
    let config = Config::load_or_default(config_path)?;
    let state = Arc::new(AppState {
        config,
        context_dir,
    });

    let app = Router::new()
        .route("/automate", post(automate))
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    info!(addr = %addr, "Automation service listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn error_response(status: StatusCode, detail: String) -> Response {
    (status, Json(json!({"detail": detail}))).into_response()
}

/// Reject names that would escape the context directory.
fn safe_context_path(dir: &Path, name: &str) -> Option<PathBuf> {
    if name.contains("..") || name.starts_with('/') || name.starts_with('\\') {
        return None;
    }
    Some(dir.join(name))
}

async fn automate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AutomateRequest>,
) -> Response {
    if request.query.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Query must not be empty".to_string());
    }

    let context = match &request.context_file {
        Some(name) => {
            let path = match safe_context_path(&state.context_dir, name) {
                Some(path) => path,
                None => {
                    return error_response(
                        StatusCode::BAD_REQUEST,
                        format!("Invalid context file name '{}'", name),
                    );
                }
            };
            match load_context_file(&path) {
                Ok(events) => events,
                Err(Error::ContextFileNotFound(p)) => {
                    return error_response(
                        StatusCode::NOT_FOUND,
                        format!("Context file not found: {}", p),
                    );
                }
                Err(Error::ContextFileMalformed(detail)) => {
                    return error_response(
                        StatusCode::BAD_REQUEST,
                        format!("Context file is not valid JSON: {}", detail),
                    );
                }
                Err(e) => {
                    return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
                }
            }
        }
        None => Vec::new(),
    };

    let api_key = state.config.resolve_api_key().unwrap_or_default();
    let oracle = match create_oracle(&state.config.agent, &api_key) {
        Ok(oracle) => oracle,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    info!(query = %request.query, context_events = context.len(), "Automation request accepted");

    let mut executor = BrowserExecutor::new(state.config.clone(), context.clone());
    match run_task(
        oracle.as_ref(),
        &mut executor,
        &state.config.agent,
        &request.query,
        &context,
    )
    .await
    {
        Ok(RunOutcome::Completed { answer, turns }) => Json(AutomateResponse {
            status: "completed".to_string(),
            answer,
            turns,
        })
        .into_response(),
        Ok(RunOutcome::CeilingExceeded { turns }) => Json(AutomateResponse {
            status: "ceiling_exceeded".to_string(),
            answer: String::new(),
            turns,
        })
        .into_response(),
        Err(e) => {
            error!(error = %e, "Automation run failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
