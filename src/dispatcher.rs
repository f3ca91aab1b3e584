//! # BlockbeatDispatcher: drives every queue from the chain's clock.
//!
//! The dispatcher owns the registry of consumer queues, pulls epochs from
//! the block source, and fans each resulting beat out with two-tier
//! scheduling: concurrent across queues, sequential within a queue.
//!
//! ## Architecture
//! ```text
//! BlockSource ──► run() loop ──► Beat per epoch ──► notify_queues()
//!                                                        │
//!                              queue 1 ◄─ JoinSet task ──┤  dispatch_sequential
//!                              queue 2 ◄─ JoinSet task ──┤  dispatch_sequential
//!                              queue N ◄─ JoinSet task ──┘  dispatch_sequential
//!
//!                   next epoch accepted only after every queue reports
//! ```
//!
//! ## Rules
//! - Queues are registered strictly before [`run`](BlockbeatDispatcher::run);
//!   afterwards the registry is read-only.
//! - Block N is seen by every consumer before block N+1 is seen by any.
//! - Consumers in one queue depend on each other (sequential, registration
//!   order); queues do not (concurrent).
//! - Any dispatch error stops the loop. The embedding node is expected to
//!   shut down: a consumer that failed or stalled can no longer be trusted
//!   to track on-chain state.

use std::collections::{BTreeMap, HashSet};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::{
    beats::Beat,
    chain::BlockSource,
    config::Config,
    consumers::ConsumerRef,
    error::DispatchError,
};

/// Fans every new block out to all registered consumer queues and does not
/// accept the next block until every consumer has acknowledged the previous
/// one. This is what makes the block chain the node's logical clock.
pub struct BlockbeatDispatcher<S> {
    /// Where new block epochs come from.
    source: S,

    /// Registered queues, keyed by their id. Iteration order is stable but
    /// carries no meaning: queues are independent by construction.
    queues: BTreeMap<u32, Vec<ConsumerRef>>,

    /// Names of all registered consumers, for duplicate rejection.
    names: HashSet<String>,

    /// Id handed to the next registered queue, starting at 1.
    next_queue_id: u32,

    /// The beat currently being dispatched. Diagnostic.
    current_beat: Option<Beat>,

    cfg: Config,

    /// Shutdown token. Cancelling it stops the main loop between beats.
    quit: CancellationToken,
}

impl<S: BlockSource> BlockbeatDispatcher<S> {
    /// Creates a dispatcher over the given block source.
    ///
    /// The per-consumer timeout lives in `cfg`; cancel `quit` to stop the
    /// dispatcher.
    pub fn new(source: S, cfg: Config, quit: CancellationToken) -> Self {
        Self {
            source,
            queues: BTreeMap::new(),
            names: HashSet::new(),
            next_queue_id: 1,
            current_beat: None,
            cfg,
            quit,
        }
    }

    /// Registers a new queue of consumers and returns its id.
    ///
    /// Consumers in the queue are notified sequentially in the supplied
    /// order; put subsystems in the same queue exactly when the later ones
    /// depend on the effects of the earlier ones.
    ///
    /// Fails on an empty queue and on a consumer name that is already
    /// registered anywhere in this dispatcher.
    pub fn register_queue(&mut self, consumers: Vec<ConsumerRef>) -> Result<u32, DispatchError> {
        if consumers.is_empty() {
            return Err(DispatchError::EmptyQueue);
        }

        // Validate the whole batch before touching the registry, so a
        // rejected call leaves no name behind.
        let mut batch = HashSet::new();
        for consumer in &consumers {
            let name = consumer.name();
            if self.names.contains(name) || !batch.insert(name.to_string()) {
                return Err(DispatchError::DuplicateConsumer {
                    name: name.to_string(),
                });
            }
        }
        self.names.extend(batch);

        let id = self.next_queue_id;
        self.next_queue_id += 1;

        debug!(queue = id, consumers = consumers.len(), "registered consumer queue");
        self.queues.insert(id, consumers);

        Ok(id)
    }

    /// Number of registered queues.
    pub fn num_queues(&self) -> usize {
        self.queues.len()
    }

    /// Number of consumers in the given queue, if it exists.
    pub fn queue_len(&self, id: u32) -> Option<usize> {
        self.queues.get(&id).map(Vec::len)
    }

    /// Height of the beat currently being dispatched, if any.
    pub fn current_height(&self) -> Option<i32> {
        self.current_beat.as_ref().map(Beat::height)
    }

    /// Runs the dispatch loop until the source closes, `quit` is cancelled,
    /// or a dispatch fails.
    ///
    /// ### Exit conditions
    /// - **Source exhausted** or **quit cancelled**: returns `Ok(())`.
    /// - **Dispatch error**: returns the error. The caller must treat it as
    ///   fatal and shut the node down; there is no retry, because a missed
    ///   beat is indistinguishable from a missed state transition.
    pub async fn run(mut self) -> Result<(), DispatchError> {
        info!(queues = self.queues.len(), "blockbeat dispatcher started");

        loop {
            let next = tokio::select! {
                biased;

                _ = self.quit.cancelled() => {
                    debug!("blockbeat dispatcher received shutdown");
                    return Ok(());
                }

                epoch = self.source.next_epoch() => epoch,
            };

            let Some(epoch) = next else {
                debug!("block source closed, dispatcher exiting");
                return Ok(());
            };

            info!(height = epoch.height, hash = %epoch.hash, "received new block");

            let (beat, _ack) = Beat::new(epoch);
            self.current_beat = Some(beat);

            if let Err(err) = self.notify_queues().await {
                error!(%err, "failed to notify all consumers, shutting down");
                return Err(err);
            }
        }
    }

    /// Drives the current beat through every queue: one task per queue,
    /// sequential inside each. Returns only after every queue has finished
    /// or errored, then surfaces the first error.
    async fn notify_queues(&mut self) -> Result<(), DispatchError> {
        let beat = match &self.current_beat {
            Some(beat) => beat,
            None => return Ok(()),
        };

        let timeout = self.cfg.process_block_timeout;
        let mut workers = JoinSet::new();

        for (&id, consumers) in &self.queues {
            let (queue_beat, _ack) = beat.fork();
            let consumers = consumers.clone();

            workers.spawn(async move {
                debug!(queue = id, height = queue_beat.height(), "notifying queue");
                (id, queue_beat.dispatch_sequential(&consumers, timeout).await)
            });
        }

        // Every queue must finish before the next beat, so keep draining
        // even once an error shows up.
        let mut first_err = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((id, Ok(()))) => {
                    trace!(queue = id, "queue finished processing block");
                }
                Ok((id, Err(err))) => {
                    error!(queue = id, %err, "queue failed to process block");
                    first_err.get_or_insert(err);
                }
                Err(join_err) => {
                    first_err.get_or_insert(DispatchError::QueueWorkerPanicked {
                        reason: join_err.to_string(),
                    });
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
