//! # Consumers: the subscriber side of the blockbeat pipeline.
//!
//! A consumer is any on-chain-aware subsystem that must see every new block.
//! The [`Consumer`] trait is the contract the dispatcher speaks; the
//! [`BeatConsumer`] helper is the preferred way to satisfy it, adapting the
//! dispatcher's push into the channel the subsystem's own event loop reads.

mod consumer;
mod helper;

pub use consumer::{Consumer, ConsumerRef};
pub use helper::BeatConsumer;
