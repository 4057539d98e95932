use std::future::Future;
use std::time::Duration;
pub mod metrics;
pub mod patch;

pub(crate) mod colors;

mod error;

pub use error::*;

/// The default interval for requeuing a managed resource once it's healthy.
pub(crate) const PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Name of the kubernetes resource manager.
pub(crate) const MANAGER_NAME: &str = "mysql-operator";

/// Bounded attempts the `RetryLoop` (spec.md §4.4) gives a reconciliation
/// sink before giving up and surfacing retry-later to the framework.
const RETRY_LOOP_ATTEMPTS: usize = 3;

/// Wraps a public event sink's body: on a transient-transport `AdminError`
/// (spec.md §7 kind 1), sleeps with full-jitter backoff and retries the same
/// closure in place, up to a bounded number of attempts, instead of bouncing
/// straight back out to the reconciliation framework for something that is
/// likely to clear on the next try. Any other error — including a `Busy` or
/// `RetryAfter` sentinel the closure itself raised — is surfaced immediately.
pub async fn retry_loop<T, Fut>(mut attempt: impl FnMut() -> Fut) -> Result<T, Error>
where
    Fut: Future<Output = Result<T, Error>>,
{
    let base = Duration::from_millis(200);
    let cap = Duration::from_secs(5);

    for n in 0..RETRY_LOOP_ATTEMPTS {
        match attempt().await {
            Ok(v) => return Ok(v),
            Err(Error::Admin(e)) if e.is_transient() && n + 1 < RETRY_LOOP_ATTEMPTS => {
                tokio::time::sleep(mysql_operator_common::wait::backoff_full_jitter(
                    base, cap, n,
                ))
                .await;
            }
            Err(Error::Admin(e)) if e.is_transient() => {
                return Err(Error::retry_after(
                    Duration::from_secs(5),
                    format!("transient admin error after {RETRY_LOOP_ATTEMPTS} attempts: {e}"),
                ));
            }
            Err(e) => return Err(e),
        }
    }
    unreachable!("loop always returns within RETRY_LOOP_ATTEMPTS iterations")
}

pub fn hash_spec<T: serde::Serialize>(spec: &T) -> String {
    use sha2::{Digest, Sha256};
    let spec_bytes = serde_json::to_vec(spec).unwrap();
    let mut hasher = Sha256::new();
    hasher.update(&spec_bytes);
    let result = hasher.finalize();
    hex::encode(result)
}
