use std::sync::Arc;

use async_trait::async_trait;
use shared::{error::RemoteError, protocol::Command};

/// Boundary to the backend's method endpoint.
///
/// Every `invoke` settles exactly once, with either the method's reply or the
/// error it raised. Latency is unbounded; callers must not assume a timeout.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn invoke(&self, command: Command) -> Result<serde_json::Value, RemoteError>;
}

#[async_trait]
impl<T> CommandExecutor for Arc<T>
where
    T: CommandExecutor + ?Sized,
{
    async fn invoke(&self, command: Command) -> Result<serde_json::Value, RemoteError> {
        (**self).invoke(command).await
    }
}
