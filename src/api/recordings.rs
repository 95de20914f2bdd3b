use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        Multipart, Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::api::handlers::AppState;
use crate::error::{AppError, AppResult, ErrorResponse};
use crate::logic::{blobs, ChunkSource};
use crate::model::FileRecord;
use crate::store::Store;

/// Multipart field carrying the uploaded audio.
pub const RECORDING_FIELD: &str = "recording";

pub const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// Recording endpoints report an unknown name as a bad request rather than 404.
#[derive(Debug)]
pub struct RecordingError(AppError);

impl From<AppError> for RecordingError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for RecordingError {
    fn into_response(self) -> Response {
        match self.0 {
            err @ AppError::NotFound(_) => {
                log::warn!("{}", err);
                (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new(&err.to_string())),
                )
                    .into_response()
            }
            other => other.into_response(),
        }
    }
}

struct FieldSource<'a>(Field<'a>);

#[async_trait::async_trait]
impl<'a> ChunkSource for FieldSource<'a> {
    async fn next_piece(&mut self) -> AppResult<Option<Vec<u8>>> {
        self.0
            .chunk()
            .await
            .map(|piece| piece.map(|bytes| bytes.to_vec()))
            .map_err(|e| AppError::ValidationFailed(format!("reading upload: {}", e.body_text())))
    }
}

/// Stream a recording to the browser as `audio/mpeg`.
pub async fn get_recording<S: Store>(
    State(store): State<AppState<S>>,
    Path(name): Path<String>,
) -> Result<Response, RecordingError> {
    let bytes = blobs::download(&*store, &name).await?;
    log::debug!("serving recording {} ({} bytes)", name, bytes.len());
    Ok(([(header::CONTENT_TYPE, AUDIO_CONTENT_TYPE)], bytes).into_response())
}

pub async fn upload_recording<S: Store>(
    State(store): State<AppState<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<FileRecord>, RecordingError> {
    let mut multipart = multipart.map_err(|e| AppError::ValidationFailed(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::ValidationFailed(e.body_text()))?
    {
        if field.name() != Some(RECORDING_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::ValidationFailed("recording upload has no filename".to_string()))?;

        let record = blobs::upload(&*store, &filename, FieldSource(field)).await?;
        return Ok(Json(record));
    }

    Err(AppError::ValidationFailed(format!("missing multipart field {:?}", RECORDING_FIELD)).into())
}

pub async fn delete_recording<S: Store>(
    State(store): State<AppState<S>>,
    Path(name): Path<String>,
) -> Result<Json<FileRecord>, RecordingError> {
    let record = blobs::delete_by_name(&*store, &name).await?;
    Ok(Json(record))
}
