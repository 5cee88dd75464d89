use std::future::Future;
use std::pin::Pin;

use crate::backend::RenderBackend;

/// Runs `body` against `backend`, then closes the backend whatever `body`
/// returned.
///
/// A close failure is logged and does not replace the body's result: records
/// already collected are still handed back.
pub async fn with_session<B, T, F>(backend: B, body: F) -> T
where
    B: RenderBackend,
    F: for<'s> FnOnce(&'s B) -> Pin<Box<dyn Future<Output = T> + 's>>,
{
    let output = body(&backend).await;

    match backend.close().await {
        Ok(()) => tracing::debug!("rendering session closed"),
        Err(e) => tracing::warn!(error = %e, "failed to close rendering session"),
    }

    output
}
