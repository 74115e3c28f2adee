use std::future::Future;
use std::time::Duration;

use ostack_common::{OstackError, Result};

/// Poll `probe` on a fixed interval until it yields a value, bounded by
/// `wait_timeout`. The probe decides terminal failure by returning `Err`.
pub(crate) async fn poll_until<T, F, Fut>(
    poll_interval: Duration,
    wait_timeout: Duration,
    resource: &str,
    target: &str,
    mut probe: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let loop_body = async {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            ticker.tick().await;
            if let Some(value) = probe().await? {
                return Ok(value);
            }
        }
    };
    match tokio::time::timeout(wait_timeout, loop_body).await {
        Ok(result) => result,
        Err(_) => Err(OstackError::WaitTimeout {
            resource: resource.to_string(),
            target: target.to_string(),
        }),
    }
}
