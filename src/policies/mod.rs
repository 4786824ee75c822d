//! Retry delay policies.
//!
//! The dispatch worker never exits on a transient queue-access error; it
//! waits and retries. These knobs decide **how long** it waits.
//!
//! ## Contents
//! - [`BackoffPolicy`] how retry delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization applied on top of the base delay
//!
//! ## Quick wiring
//! ```text
//! BusConfig { backoff: BackoffPolicy, .. }
//!      └─► core::worker::DispatchWorker uses:
//!           - backoff.next(consecutive_errors) after each failed dequeue
//!           - counter resets on the next successful dequeue or idle timeout
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=100ms, factor=1.0 (constant), max=30s, jitter=None.
//! - `BusConfig::default()` uses a constant 2s retry delay.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
