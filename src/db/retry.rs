use backon::{ExponentialBuilder, Retryable};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{BudgetError, IsRetryable};

pub(crate) fn storage_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_millis(500))
        .with_max_times(3)
        .with_jitter()
}

/// Run a storage operation, retrying busy/locked database and pool faults.
pub(crate) async fn retry_storage<T, F, Fut>(what: &'static str, op: F) -> Result<T, BudgetError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BudgetError>>,
{
    op.retry(storage_retry_policy())
        .when(|e: &BudgetError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!("{} retrying after error {}, sleeping {:?}", what, err, dur);
        })
        .await
}
