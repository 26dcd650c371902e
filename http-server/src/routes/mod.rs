use wallet::WalletError;

use crate::error::ApiError;

pub mod users;
pub mod wallets;

// Store calls and argon2 block, so they run off the async worker threads
pub(crate) async fn run_blocking<T, F>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> wallet::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| WalletError::Store(format!("blocking task failed: {e}")))?;
    Ok(result?)
}
