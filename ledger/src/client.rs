//! The ledger client capability.

use ballot_types::{ElectionId, EventIndex, VoteEvent, VoteSubmission};
use std::future::Future;
use std::time::Duration;

use crate::LedgerError;

/// Append-only, independently queryable vote event log.
///
/// Constructed once at process start and shared read-only (behind an `Arc`)
/// by every component that needs it.
pub trait LedgerClient: Send + Sync {
    /// Append a vote event. Resolves once the ledger has durably accepted it.
    ///
    /// Must reject a second submission carrying the same voter hash for the
    /// same election with [`LedgerError::DuplicateVote`].
    fn append(
        &self,
        submission: VoteSubmission,
    ) -> impl Future<Output = Result<EventIndex, LedgerError>> + Send;

    /// Every accepted event of one election, in ledger order.
    ///
    /// Finite and re-queryable: calling it twice without new appends returns
    /// the same sequence.
    ///
    /// Implementations must be read-your-writes: once `append` has returned
    /// an index, every later query includes that event. The consistency sweep
    /// treats a `cast` ballot with no event as an orphan, so a backend that
    /// answers from a lagging replica must route these reads to the primary.
    fn query_events(
        &self,
        election: ElectionId,
    ) -> impl Future<Output = Result<Vec<VoteEvent>, LedgerError>> + Send;

    /// Human-readable name of the backend, for logs.
    fn name(&self) -> &str;
}

/// Bound a ledger call by `timeout`, mapping expiry to [`LedgerError::Timeout`].
pub async fn with_timeout<T, F>(timeout: Duration, call: F) -> Result<T, LedgerError>
where
    F: Future<Output = Result<T, LedgerError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(LedgerError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_fast_calls() {
        let result = with_timeout(Duration::from_millis(100), async { Ok::<_, LedgerError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_calls_become_timeouts() {
        let result = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, LedgerError>(())
        })
        .await;
        assert!(matches!(result, Err(LedgerError::Timeout(_))));
        assert!(result.unwrap_err().is_transient());
    }
}
