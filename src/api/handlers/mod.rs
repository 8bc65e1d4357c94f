use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::state::{AppState, ClassifyOptions};
use crate::classify::{BatchRunner, ClassifyError, ClassifyOutcome};
use crate::export::{self, ExportKind, Workbook};
use crate::input;
use crate::models::*;

type ApiError = (StatusCode, String);

// ============================================================
// Error Handling
// ============================================================

/// Map a failed classification run to a status the client can act on.
/// Upstream error bodies are logged, never returned.
fn classify_error(e: ClassifyError) -> ApiError {
    match e {
        ClassifyError::InputEmpty => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        ClassifyError::InvalidBatchSize => (StatusCode::BAD_REQUEST, e.to_string()),
        ClassifyError::Batch { index, ref source } => {
            tracing::error!("Classification failed on batch {}: {}", index + 1, source);
            (
                StatusCode::BAD_GATEWAY,
                format!("Classification failed on batch {}", index + 1),
            )
        }
        ClassifyError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

fn session_not_found() -> ApiError {
    (StatusCode::NOT_FOUND, "Session not found".to_string())
}

fn record_error(e: SessionError) -> ApiError {
    (StatusCode::NOT_FOUND, e.to_string())
}

/// Log an internal error and return a sanitized response to the client.
fn internal_error(e: impl std::fmt::Display) -> ApiError {
    tracing::error!("Internal error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Sessions
// ============================================================

pub async fn create_session(
    State(state): State<AppState>,
    Json(input): Json<CreateSessionInput>,
) -> Result<Response, ApiError> {
    let lines = input::split_lines(&input.text);
    let batch_size = input.batch_size.unwrap_or(state.batch_size);
    let classifier = state.classifier(&ClassifyOptions {
        system_instruction: input.system_instruction,
        suggested_labels: input.suggested_labels,
    });

    let outcome = BatchRunner::new(classifier.as_ref())
        .batch_size(batch_size)
        .run(&lines, |progress| tracing::debug!("{}", progress))
        .await
        .map_err(classify_error)?;

    match outcome {
        ClassifyOutcome::Records(records) => {
            let session = AnalysisSession::new(records);
            let view = SessionView::from(&session);
            state.sessions.insert(session);
            tracing::info!(
                "Created session {} with {} records",
                view.id,
                view.records.len()
            );
            Ok((StatusCode::CREATED, Json(view)).into_response())
        }
        ClassifyOutcome::Empty => Ok((
            StatusCode::OK,
            Json(EmptyResultResponse {
                warning: "Classification returned no results".to_string(),
            }),
        )
            .into_response()),
    }
}

pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.sessions.list())
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    state
        .sessions
        .with_session(id, |session| SessionView::from(&*session))
        .map(Json)
        .ok_or_else(session_not_found)
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(session_not_found())
    }
}

pub async fn get_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<LabelCount>>, ApiError> {
    state
        .sessions
        .with_session(id, |session| session.summary())
        .map(Json)
        .ok_or_else(session_not_found)
}

// ============================================================
// Review edits
// ============================================================

pub async fn update_record(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(input): Json<UpdateRecordInput>,
) -> Result<Json<RecordUpdateView>, ApiError> {
    state
        .sessions
        .with_session(id, |session| {
            let record = session.update_record(index, input)?.clone();
            Ok::<_, SessionError>(RecordUpdateView {
                index,
                record,
                summary: session.summary(),
            })
        })
        .ok_or_else(session_not_found)?
        .map(Json)
        .map_err(record_error)
}

pub async fn toggle_incorrect(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<RecordUpdateView>, ApiError> {
    state
        .sessions
        .with_session(id, |session| {
            let record = session.toggle_incorrect(index)?.clone();
            Ok::<_, SessionError>(RecordUpdateView {
                index,
                record,
                summary: session.summary(),
            })
        })
        .ok_or_else(session_not_found)?
        .map(Json)
        .map_err(record_error)
}

// ============================================================
// Export
// ============================================================

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub kind: ExportKind,
}

pub async fn export_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let workbook = state
        .sessions
        .with_session(id, |session| Workbook::build(query.kind, &session.records))
        .ok_or_else(session_not_found)?;

    let bytes = export::workbook_to_bytes(&workbook).map_err(internal_error)?;
    tracing::info!(
        "Exporting session {} as {} ({} bytes)",
        id,
        query.kind.as_str(),
        bytes.len()
    );

    Ok((
        [
            (header::CONTENT_TYPE, export::XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", workbook.file_name),
            ),
        ],
        bytes,
    )
        .into_response())
}
