//! Retry/rotation executor
//!
//! Runs an operation against successive credentials: free tier exhaustively,
//! then paid tier, rotating only on rate-limit failures. The operation sees
//! which credential and tier it was handed, so callers can shape requests
//! per kind without touching rotation logic.

use std::future::Future;
use std::sync::Arc;

use provider::Credential;
use tracing::{debug, warn};

use crate::classify::{FailureClass, classify_failure};
use crate::error::{Error, Result};
use crate::pacer::Pacer;
use crate::pool::{KeyPool, Tier};

/// One attempt's context, handed to the operation.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub credential: Credential,
    pub tier: Tier,
}

/// Executes operations with tiered credential rotation and pacing.
///
/// Owns nothing mutable itself; the pool's atomic cursors are the only
/// shared state, and they advance before each provider call is issued.
pub struct Executor {
    pool: Arc<KeyPool>,
    pacer: Pacer,
}

impl Executor {
    pub fn new(pool: Arc<KeyPool>, pacer: Pacer) -> Self {
        Self { pool, pacer }
    }

    pub fn pool(&self) -> &Arc<KeyPool> {
        &self.pool
    }

    /// Execute `op` with tiered rotation.
    ///
    /// 1. Empty pools: one attempt on the fallback credential (no rotation),
    ///    or `NotConfigured` when none is set.
    /// 2. Free tier: up to N attempts starting at the cursor. Success returns
    ///    immediately; a rate-limited failure rotates to the next credential;
    ///    any other failure propagates unchanged.
    /// 3. Paid tier: same loop.
    /// 4. Everything rate limited: `AllExhausted`.
    pub async fn execute_with_retry<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(Attempt) -> Fut,
        Fut: Future<Output = provider::Result<T>>,
    {
        if !self.pool.has_credentials().await {
            let Some(fallback) = self.pool.fallback() else {
                return Err(Error::NotConfigured);
            };
            debug!("pools empty, using fallback credential");
            self.pacer.pace(fallback.kind(), Tier::Paid).await;
            return match op(Attempt {
                credential: fallback.clone(),
                tier: Tier::Paid,
            })
            .await
            {
                Ok(value) => {
                    record_attempt("ok");
                    Ok(value)
                }
                Err(e) => {
                    record_attempt("failed");
                    Err(Error::Provider(e))
                }
            };
        }

        let mut attempts = 0usize;
        for tier in [Tier::Free, Tier::Paid] {
            let n = self.pool.tier_len(tier).await;
            for _ in 0..n {
                // Cursor advances here, before the call goes out.
                let Some(credential) = self.pool.next_in_tier(tier).await else {
                    break;
                };
                self.pacer.pace(credential.kind(), tier).await;
                attempts += 1;

                match op(Attempt {
                    credential,
                    tier,
                })
                .await
                {
                    Ok(value) => {
                        record_attempt("ok");
                        return Ok(value);
                    }
                    Err(e) => match classify_failure(&e) {
                        FailureClass::RateLimited => {
                            record_attempt("rate_limited");
                            warn!(tier = tier.label(), "credential rate limited, rotating");
                        }
                        FailureClass::Fatal => {
                            record_attempt("fatal");
                            return Err(Error::Provider(e));
                        }
                    },
                }
            }
        }

        warn!(attempts, "every credential rate limited");
        Err(Error::AllExhausted { attempts })
    }
}

fn record_attempt(outcome: &'static str) {
    metrics::counter!("rotation_attempts_total", "outcome" => outcome).increment(1);
}
