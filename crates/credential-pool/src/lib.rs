//! Tiered credential pool with rotation, retry, and pacing
//!
//! The pool holds two tiers of credentials ("free" and "paid"), each with an
//! independent round-robin cursor. The executor runs an operation against
//! successive credentials: the free tier is tried exhaustively before the
//! paid tier, rate-limit failures rotate to the next credential, and any
//! other failure propagates unchanged.
//!
//! Rotation lifecycle for one top-level call:
//! 1. Empty pools fall back to a single default credential (or fail with
//!    `NotConfigured` when none is set)
//! 2. Free tier: up to N attempts starting at the cursor, pacing before each
//! 3. Paid tier: same loop when the free tier was exhausted by rate limits
//! 4. Everything rate limited → `AllExhausted`
//!
//! Cursors advance atomically at selection time, before the provider call is
//! issued, so concurrent top-level calls never race a cursor update against
//! an in-flight request.

mod batch;
pub mod classify;
pub mod error;
pub mod pacer;
pub mod pool;
pub mod rotation;

pub use classify::{FailureClass, classify_failure};
pub use error::{Error, Result};
pub use pacer::Pacer;
pub use pool::{KeyPool, Tier};
pub use rotation::{Attempt, Executor};
