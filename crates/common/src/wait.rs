#[cfg(feature = "async")]
use std::future::Future;
#[cfg(feature = "async")]
use std::time::Duration;

/// Keep calling `connect` until it succeeds, sleeping `poll_interval_ms`
/// between attempts.
#[cfg(feature = "async")]
pub async fn wait_for_resource_async<F, Fut, T, E>(
    mut connect: F,
    poll_interval_ms: u64,
    resource_name: &str,
) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempts = 0u32;
    loop {
        match connect().await {
            Ok(resource) => {
                tracing::info!(attempts = attempts + 1, "{} connected", resource_name);
                return resource;
            }
            Err(e) => {
                attempts = attempts.saturating_add(1);
                tracing::debug!(attempt = attempts, "Waiting for {} ({})", resource_name, e);
                tokio::time::sleep(Duration::from_millis(poll_interval_ms)).await;
            }
        }
    }
}
