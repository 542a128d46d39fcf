use std::future::Future;

use async_trait::async_trait;

/// Persistence callback invoked by the coordinator with a whole document.
///
/// Rejection (an `Err`) is the only failure signal the coordinator relies on.
/// Implementations must have overwrite semantics: saving the same document
/// twice, or two documents out of order, leaves whichever write completed
/// last at the store.
#[async_trait]
pub trait SaveHandler: Send + Sync + 'static {
    async fn save(&self, content: String) -> anyhow::Result<()>;
}

/// Closures returning a future are accepted as handlers, which keeps tests
/// and simple hosts free of a dedicated type.
#[async_trait]
impl<F, Fut> SaveHandler for F
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn save(&self, content: String) -> anyhow::Result<()> {
        (self)(content).await
    }
}
