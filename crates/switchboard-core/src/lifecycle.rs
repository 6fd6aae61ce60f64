//! Guaranteed teardown of a session's tool servers.

use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use switchboard_mcp::ServerPool;

/// Boxed body future that borrows the pool for its whole run.
pub type SessionFuture<'p, R> = Pin<Box<dyn Future<Output = R> + 'p>>;

/// Run `body` with the pool, then close every connection the pool holds.
///
/// Teardown happens whether `body` returns normally, returns an error, or
/// panics. A panic is re-raised once the servers are closed.
pub async fn run_with_cleanup<R, F>(pool: &mut ServerPool, body: F) -> R
where
    F: for<'p> FnOnce(&'p mut ServerPool) -> SessionFuture<'p, R>,
{
    let outcome = {
        let pool = &mut *pool;
        AssertUnwindSafe(async move { body(pool).await })
            .catch_unwind()
            .await
    };

    let summary = pool.close_all().await;
    if summary.failed.is_empty() {
        tracing::info!("Closed all MCP connections");
    } else {
        tracing::warn!(
            "Closed all MCP connections ({} of {} failed to close cleanly)",
            summary.failed.len(),
            summary.attempted()
        );
    }

    match outcome {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
