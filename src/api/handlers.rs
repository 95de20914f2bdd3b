use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::AppResult;
use crate::logic::{Collection, MergePatch, Resource};
use crate::model::{Document, FormFields, ObjectId};
use crate::store::{with_session, Store};

pub type AppState<S> = Arc<S>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn list_documents<S: Store, R: Resource>(
    State(store): State<AppState<S>>,
) -> AppResult<Json<Vec<Document>>> {
    let docs = with_session(&*store, move |session| {
        Box::pin(async move {
            Collection::new(session, R::COLLECTION)
                .read_all(R::SORT_FIELD)
                .await
        })
    })
    .await?;
    Ok(Json(docs))
}

pub async fn get_document<S: Store, R: Resource>(
    State(store): State<AppState<S>>,
    Path(id): Path<String>,
) -> AppResult<Json<Document>> {
    let id = ObjectId::parse_hex(&id)?;
    let doc = with_session(&*store, move |session| {
        Box::pin(async move { Collection::new(session, R::COLLECTION).read_by_id(&id).await })
    })
    .await?;
    Ok(Json(doc))
}

pub async fn create_document<S: Store, R: Resource>(
    State(store): State<AppState<S>>,
    form: FormFields,
) -> AppResult<Json<Document>> {
    let fields = R::from_form(&form)?.to_document()?;

    let doc = with_session(&*store, move |session| {
        Box::pin(async move { Collection::new(session, R::COLLECTION).insert(fields).await })
    })
    .await?;
    Ok(Json(doc))
}

/// Partially update a document; responds with the document as it was before the update.
pub async fn update_document<S: Store, R: Resource>(
    State(store): State<AppState<S>>,
    Path(id): Path<String>,
    form: FormFields,
) -> AppResult<Json<Document>> {
    let id = ObjectId::parse_hex(&id)?;
    // Every field is converted before a session is opened.
    let set = R::Patch::from_form(&form)?.into_instruction();

    let prior = with_session(&*store, move |session| {
        Box::pin(async move {
            Collection::new(session, R::COLLECTION)
                .update_merge(&id, &set)
                .await
        })
    })
    .await?;
    Ok(Json(prior))
}

/// Delete a document; responds with its last stored state.
pub async fn delete_document<S: Store, R: Resource>(
    State(store): State<AppState<S>>,
    Path(id): Path<String>,
) -> AppResult<Json<Document>> {
    let id = ObjectId::parse_hex(&id)?;
    let prior = with_session(&*store, move |session| {
        Box::pin(async move {
            Collection::new(session, R::COLLECTION)
                .delete_and_return(&id)
                .await
        })
    })
    .await?;
    Ok(Json(prior))
}
