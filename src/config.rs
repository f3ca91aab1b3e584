//! # Dispatcher configuration.
//!
//! [`Config`] defines the blockbeat pipeline's behavior, most importantly the
//! per-consumer processing budget. The timeout is carried by the dispatcher
//! instead of a process-wide global so that independent dispatchers (and
//! tests) can pick their own budget.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use blockbeat::{Config, DEFAULT_PROCESS_BLOCK_TIMEOUT};
//!
//! let mut cfg = Config::default();
//! assert_eq!(cfg.process_block_timeout, DEFAULT_PROCESS_BLOCK_TIMEOUT);
//!
//! cfg.process_block_timeout = Duration::from_secs(5);
//! ```

use std::time::Duration;

/// Default budget a single consumer gets to process one block.
///
/// Generous for Lightning's workload; a consumer that stays silent past this
/// budget is assumed deadlocked and the whole pipeline shuts down.
pub const DEFAULT_PROCESS_BLOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for a [`BlockbeatDispatcher`](crate::BlockbeatDispatcher).
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time each consumer may take to acknowledge one block.
    ///
    /// The budget is independent per consumer: a slow consumer does not eat
    /// into its neighbors' budgets.
    pub process_block_timeout: Duration,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `process_block_timeout = 60s`
    fn default() -> Self {
        Self {
            process_block_timeout: DEFAULT_PROCESS_BLOCK_TIMEOUT,
        }
    }
}
