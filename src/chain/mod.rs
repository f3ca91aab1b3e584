//! # Chain inputs: block epochs and the source that delivers them.
//!
//! The dispatcher does not discover blocks itself. It consumes a
//! [`BlockSource`], a serial stream of [`BlockEpoch`] values that some chain
//! backend produces for each new best block. The source is expected to emit
//! monotone non-decreasing heights with at most one epoch per height; reorg
//! handling lives in the backend, not here.

mod epoch;
mod source;

pub use epoch::BlockEpoch;
pub use source::BlockSource;
