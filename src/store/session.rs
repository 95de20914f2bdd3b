use std::future::Future;
use std::pin::Pin;

use crate::error::{AppError, AppResult};
use crate::store::traits::{Connector, DocumentSession};

pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'a>>;

/// Run `op` against a freshly opened session and close it afterwards.
///
/// `op` and the close are each bounded by the connector's operation timeout.
/// The session is closed whether `op` succeeds, fails or times out. A failure
/// to close is logged and does not replace the operation's own result.
pub async fn with_session<C, T, F>(connector: &C, op: F) -> AppResult<T>
where
    C: Connector + ?Sized,
    T: Send,
    F: for<'a> FnOnce(&'a mut C::Session) -> SessionFuture<'a, T> + Send,
{
    let limit = connector.operation_timeout();
    let mut session = connector.open_session().await?;

    let result = match tokio::time::timeout(limit, op(&mut session)).await {
        Ok(result) => result,
        Err(_) => Err(AppError::StoreUnavailable(format!(
            "store operation timed out after {:?}",
            limit
        ))),
    };

    match tokio::time::timeout(limit, session.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::warn!("failed to close store session: {}", e),
        Err(_) => log::warn!("closing store session timed out after {:?}", limit),
    }
    result
}
