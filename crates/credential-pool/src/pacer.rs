//! Inter-call pacing
//!
//! Keeps standard keys under the provider's per-minute limits by delaying
//! before each call. Pacing is keyed by credential kind first: privileged
//! tokens are never delayed; standard keys wait a tier-dependent interval
//! with paid <= free.

use std::time::Duration;

use provider::CredentialKind;

use crate::pool::Tier;

const DEFAULT_FREE_DELAY: Duration = Duration::from_millis(2000);
const DEFAULT_PAID_DELAY: Duration = Duration::from_millis(600);

/// Delay policy applied before each provider call.
#[derive(Debug, Clone)]
pub struct Pacer {
    free_delay: Duration,
    paid_delay: Duration,
}

impl Default for Pacer {
    fn default() -> Self {
        Self {
            free_delay: DEFAULT_FREE_DELAY,
            paid_delay: DEFAULT_PAID_DELAY,
        }
    }
}

impl Pacer {
    pub fn new(free_delay: Duration, paid_delay: Duration) -> Self {
        Self {
            free_delay,
            paid_delay,
        }
    }

    /// A pacer that never sleeps (tests, trusted deployments).
    pub fn unpaced() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Delay to apply before a call with this credential kind and tier.
    /// Pure function; the rule set in one place.
    pub fn pace_for(&self, kind: CredentialKind, tier: Tier) -> Duration {
        if kind.is_privileged() {
            return Duration::ZERO;
        }
        match tier {
            Tier::Free => self.free_delay,
            Tier::Paid => self.paid_delay,
        }
    }

    /// Sleep for the computed delay, if any.
    pub async fn pace(&self, kind: CredentialKind, tier: Tier) {
        let delay = self.pace_for(kind, tier);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
