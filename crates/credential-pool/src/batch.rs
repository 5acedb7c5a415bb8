//! Batch orchestration for bulk generation
//!
//! Producing a bounded set of results (e.g. six redesign variants) one call
//! at a time wastes a privileged token's quota. When the pool holds one, the
//! set is split into two concurrent halves, each half running its slots
//! sequentially. A failed slot is simply omitted; partial success is the
//! expected outcome. Only when the concurrent pass yields nothing does the
//! whole set rerun fully sequentially, paced per call.

use std::future::Future;

use tracing::{debug, warn};

use crate::rotation::{Attempt, Executor};

impl Executor {
    /// Produce up to `count` results from repeated invocations of `op`.
    ///
    /// Never fails for individual slot errors; returns whatever subset
    /// succeeded (possibly empty). Each slot goes through the full
    /// rotation/pacing path of [`Executor::execute_with_retry`].
    pub async fn generate_set<T, F, Fut>(&self, count: usize, op: F) -> Vec<T>
    where
        F: Fn(Attempt) -> Fut,
        Fut: Future<Output = provider::Result<T>>,
    {
        if count == 0 {
            return Vec::new();
        }

        if self.pool().has_privileged().await {
            let front = count.div_ceil(2);
            let (mut results, rest) = tokio::join!(
                self.run_slots(front, &op),
                self.run_slots(count - front, &op)
            );
            results.extend(rest);
            if !results.is_empty() {
                return results;
            }
            warn!(count, "concurrent batch produced nothing, retrying sequentially");
        }

        self.run_slots(count, &op).await
    }

    async fn run_slots<T, F, Fut>(&self, slots: usize, op: &F) -> Vec<T>
    where
        F: Fn(Attempt) -> Fut,
        Fut: Future<Output = provider::Result<T>>,
    {
        let mut results = Vec::with_capacity(slots);
        for _ in 0..slots {
            match self.execute_with_retry(op).await {
                Ok(value) => results.push(value),
                Err(e) => debug!(error = %e, "batch slot failed, omitting result"),
            }
        }
        results
    }
}
