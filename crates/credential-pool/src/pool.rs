//! Tiered credential storage and round-robin selection
//!
//! Two tiers, each an ordered list of credentials plus an independent
//! rotation cursor. Lists are replaced wholesale via `set_pools` (settings
//! updates); persistence belongs to the caller. Credential kinds are
//! resolved once here, at load time.
//!
//! Cursor contract: `next_in_tier` advances the cursor atomically at
//! selection time, before the caller issues its provider call, and the
//! cursor moves past the selected credential regardless of whether that
//! call later succeeds. This keeps rotation fair across calls that fail
//! fast and keeps concurrent selections race-free.

use std::sync::atomic::{AtomicUsize, Ordering};

use provider::Credential;
use tokio::sync::RwLock;
use tracing::info;

/// Credential tier, establishing rotation priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Free,
    Paid,
}

impl Tier {
    /// Tier label for logging and health reporting.
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Paid => "paid",
        }
    }
}

/// Tiered credential pool with per-tier rotation cursors.
pub struct KeyPool {
    free: RwLock<Vec<Credential>>,
    paid: RwLock<Vec<Credential>>,
    free_cursor: AtomicUsize,
    paid_cursor: AtomicUsize,
    fallback: Option<Credential>,
}

impl KeyPool {
    /// Create an empty pool.
    ///
    /// `fallback` is the externally-configured default credential used only
    /// when both tiers are empty (e.g. from an environment variable).
    pub fn new(fallback: Option<Credential>) -> Self {
        Self {
            free: RwLock::new(Vec::new()),
            paid: RwLock::new(Vec::new()),
            free_cursor: AtomicUsize::new(0),
            paid_cursor: AtomicUsize::new(0),
            fallback,
        }
    }

    /// Replace both tiers wholesale and reset both cursors to 0.
    ///
    /// Tokens are classified into kinds here; no other validation happens.
    /// Order is preserved and duplicates are allowed.
    pub async fn set_pools(&self, free: Vec<String>, paid: Vec<String>) {
        let free: Vec<Credential> = free.into_iter().map(Credential::new).collect();
        let paid: Vec<Credential> = paid.into_iter().map(Credential::new).collect();
        info!(free = free.len(), paid = paid.len(), "credential pools replaced");

        *self.free.write().await = free;
        *self.paid.write().await = paid;
        self.free_cursor.store(0, Ordering::Relaxed);
        self.paid_cursor.store(0, Ordering::Relaxed);
    }

    /// True iff at least one tier holds a credential.
    pub async fn has_credentials(&self) -> bool {
        !self.free.read().await.is_empty() || !self.paid.read().await.is_empty()
    }

    /// Next credential in round-robin order for the tier; `None` if empty.
    pub async fn next_in_tier(&self, tier: Tier) -> Option<Credential> {
        let list = self.tier_list(tier).read().await;
        if list.is_empty() {
            return None;
        }
        let idx = self.tier_cursor(tier).fetch_add(1, Ordering::Relaxed) % list.len();
        Some(list[idx].clone())
    }

    /// Number of credentials in the tier.
    pub async fn tier_len(&self, tier: Tier) -> usize {
        self.tier_list(tier).read().await.len()
    }

    /// Cursor position within the tier (raw count modulo tier size; 0 when
    /// empty). Round-robin wrap makes this equal `calls % size`.
    pub async fn cursor_position(&self, tier: Tier) -> usize {
        let len = self.tier_len(tier).await;
        if len == 0 {
            return 0;
        }
        self.tier_cursor(tier).load(Ordering::Relaxed) % len
    }

    /// Whether any credential in either tier is a privileged token.
    /// Drives batch parallelism.
    pub async fn has_privileged(&self) -> bool {
        self.free
            .read()
            .await
            .iter()
            .chain(self.paid.read().await.iter())
            .any(|c| c.kind().is_privileged())
    }

    /// The externally-configured default credential, if any.
    pub fn fallback(&self) -> Option<&Credential> {
        self.fallback.as_ref()
    }

    /// Pool summary for the health endpoint.
    pub async fn health(&self) -> serde_json::Value {
        let free = self.free.read().await;
        let paid = self.paid.read().await;
        let privileged = free
            .iter()
            .chain(paid.iter())
            .filter(|c| c.kind().is_privileged())
            .count();
        serde_json::json!({
            "free": free.len(),
            "paid": paid.len(),
            "privileged_tokens": privileged,
            "fallback_configured": self.fallback.is_some(),
        })
    }

    fn tier_list(&self, tier: Tier) -> &RwLock<Vec<Credential>> {
        match tier {
            Tier::Free => &self.free,
            Tier::Paid => &self.paid,
        }
    }

    fn tier_cursor(&self, tier: Tier) -> &AtomicUsize {
        match tier {
            Tier::Free => &self.free_cursor,
            Tier::Paid => &self.paid_cursor,
        }
    }
}
