use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::header,
    Form,
};

use crate::error::AppError;
use crate::model::FormFields;

/// Axum extractor for an urlencoded form body.
///
/// A request without a `Content-Type` and with an empty body is an empty
/// form, so a bare PATCH is a no-op rather than a rejection.
#[async_trait]
impl<S> FromRequest<S> for FormFields
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !req.headers().contains_key(header::CONTENT_TYPE) {
            let body = Bytes::from_request(req, state)
                .await
                .map_err(|e| AppError::ValidationFailed(e.body_text()))?;
            if body.is_empty() {
                return Ok(FormFields::default());
            }
            return Err(AppError::ValidationFailed(
                "form body without Content-Type: application/x-www-form-urlencoded".to_string(),
            ));
        }

        let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
            .await
            .map_err(|e| AppError::ValidationFailed(e.body_text()))?;
        Ok(FormFields::from_pairs(pairs))
    }
}
