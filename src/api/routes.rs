use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, MethodRouter},
    Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::api::{handlers, recordings};
use crate::logic::Resource;
use crate::model::{Appointment, Question};
use crate::store::Store;

/// Collection routes: `GET`/`POST` on the base path, `GET`/`PATCH`/`DELETE` by id.
fn resource_routes<S: Store, R: Resource>(base: &str) -> Router<Arc<S>> {
    let collection = || -> MethodRouter<Arc<S>> {
        get(handlers::list_documents::<S, R>).post(handlers::create_document::<S, R>)
    };

    Router::new()
        .route(base, collection())
        .route(&format!("{}/", base), collection())
        .route(
            &format!("{}/:id", base),
            get(handlers::get_document::<S, R>)
                .patch(handlers::update_document::<S, R>)
                .delete(handlers::delete_document::<S, R>),
        )
}

fn recording_routes<S: Store>(max_upload_bytes: usize) -> Router<Arc<S>> {
    Router::new()
        .route("/recording", post(recordings::upload_recording::<S>))
        .route("/recording/", post(recordings::upload_recording::<S>))
        .route(
            "/recording/:name",
            get(recordings::get_recording::<S>).delete(recordings::delete_recording::<S>),
        )
        // Uploads are streamed; the only bound is the configured size.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
}

pub fn create_router<S: Store + 'static>(max_upload_bytes: usize) -> Router<Arc<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .merge(resource_routes::<S, Appointment>("/appointment"))
        .merge(resource_routes::<S, Question>("/question"))
        .merge(recording_routes::<S>(max_upload_bytes))
}
