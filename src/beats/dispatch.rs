//! # Delivering one beat to one or more consumers.
//!
//! Two tiers of delivery live here, both driven by `notify_and_wait`:
//!
//! - [`Beat::dispatch_sequential`] walks consumers in order, one ack at a
//!   time. Consumers placed in the same queue express a downstream
//!   dependency; the second must see the effects of the first.
//! - [`Beat::dispatch_concurrent`] notifies all consumers at once and waits
//!   for every one of them before returning, error or not.
//!
//! ## Rules
//! - Every delivery is a fresh [`Beat::fork`]; consumers never share an ack
//!   slot.
//! - Each consumer gets an independent timeout budget.
//! - Sequential dispatch aborts on the first error. Concurrent dispatch
//!   still waits for all siblings, then surfaces the first error in supplied
//!   order.

use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::time;
use tracing::{debug, error};

use crate::{consumers::ConsumerRef, error::DispatchError};

use super::Beat;

impl Beat {
    /// Notifies the consumers about the new block one at a time, in the
    /// supplied order. The next consumer is not started until the previous
    /// one has acknowledged. Aborts on the first failure.
    pub async fn dispatch_sequential(
        &self,
        consumers: &[ConsumerRef],
        timeout: Duration,
    ) -> Result<(), DispatchError> {
        for consumer in consumers {
            if let Err(err) = self.notify_and_wait(consumer, timeout).await {
                error!(
                    height = self.height(),
                    consumer = consumer.name(),
                    %err,
                    "consumer failed to process block",
                );
                return Err(err);
            }
        }

        Ok(())
    }

    /// Notifies every consumer about the new block concurrently.
    ///
    /// Waits until all consumers have either acknowledged or timed out, then
    /// returns the first error in supplied order, if any.
    pub async fn dispatch_concurrent(
        &self,
        consumers: &[ConsumerRef],
        timeout: Duration,
    ) -> Result<(), DispatchError> {
        let waits = consumers.iter().map(|c| self.notify_and_wait(c, timeout));

        for (consumer, result) in consumers.iter().zip(join_all(waits).await) {
            if let Err(err) = result {
                error!(
                    height = self.height(),
                    consumer = consumer.name(),
                    %err,
                    "consumer failed to process block",
                );
                return Err(err);
            }
        }

        Ok(())
    }

    /// Delivers a fresh copy of this beat to the consumer and waits for its
    /// acknowledgement, bounded by `timeout`.
    pub(crate) async fn notify_and_wait(
        &self,
        consumer: &ConsumerRef,
        timeout: Duration,
    ) -> Result<(), DispatchError> {
        let (copy, mut ack_rx) = self.fork();

        debug!(
            height = self.height(),
            consumer = consumer.name(),
            "waiting for consumer to process block",
        );

        let start = Instant::now();

        let handoff_and_ack = async {
            consumer.process_block(copy).await;
            ack_rx.recv().await
        };

        match time::timeout(timeout, handoff_and_ack).await {
            Ok(Some(Ok(()))) => {
                debug!(
                    height = self.height(),
                    consumer = consumer.name(),
                    elapsed = ?start.elapsed(),
                    "consumer processed block",
                );
                Ok(())
            }
            Ok(Some(Err(err))) => Err(DispatchError::ConsumerFailed {
                consumer: consumer.name().to_string(),
                source: err,
            }),
            Ok(None) => Err(DispatchError::AckChannelClosed {
                consumer: consumer.name().to_string(),
            }),
            Err(_elapsed) => Err(DispatchError::ProcessBlockTimeout {
                consumer: consumer.name().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use bitcoin::{blockdata::constants::genesis_block, Network};
    use tokio::sync::Barrier;

    use crate::{chain::BlockEpoch, consumers::Consumer, error::ConsumerError};

    use super::*;

    const TEST_TIMEOUT: Duration = Duration::from_millis(50);

    fn test_beat() -> (Beat, crate::beats::AckReceiver) {
        let block = genesis_block(Network::Regtest);
        Beat::new(BlockEpoch::from_block(100, block))
    }

    /// How a scripted consumer reacts to a beat.
    enum Reaction {
        AckOk,
        AckErr(&'static str),
        /// Keep the beat alive without acking, forcing a timeout.
        Hold,
        /// Drop the beat without acking.
        Drop,
    }

    /// Consumer scripted for one reaction, recording its call order.
    struct Scripted {
        name: &'static str,
        reaction: Reaction,
        calls: Arc<Mutex<Vec<&'static str>>>,
        held: Mutex<Option<Beat>>,
    }

    impl Scripted {
        fn arc(
            name: &'static str,
            reaction: Reaction,
            calls: &Arc<Mutex<Vec<&'static str>>>,
        ) -> ConsumerRef {
            Arc::new(Self {
                name,
                reaction,
                calls: Arc::clone(calls),
                held: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl Consumer for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn process_block(&self, beat: Beat) {
            self.calls.lock().unwrap().push(self.name);
            match &self.reaction {
                Reaction::AckOk => beat.try_ack(Ok(())),
                Reaction::AckErr(reason) => beat.try_ack(Err(ConsumerError::new(*reason))),
                Reaction::Hold => *self.held.lock().unwrap() = Some(beat),
                Reaction::Drop => drop(beat),
            }
        }
    }

    #[tokio::test]
    async fn sequential_respects_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let consumers = vec![
            Scripted::arc("c1", Reaction::AckOk, &calls),
            Scripted::arc("c2", Reaction::AckOk, &calls),
            Scripted::arc("c3", Reaction::AckOk, &calls),
        ];

        let (beat, _ack) = test_beat();
        beat.dispatch_sequential(&consumers, TEST_TIMEOUT)
            .await
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["c1", "c2", "c3"]);
    }

    #[tokio::test]
    async fn sequential_aborts_on_first_error() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let consumers = vec![
            Scripted::arc("c1", Reaction::AckOk, &calls),
            Scripted::arc("c2", Reaction::AckErr("boom"), &calls),
            Scripted::arc("c3", Reaction::AckOk, &calls),
        ];

        let (beat, _ack) = test_beat();
        let err = beat
            .dispatch_sequential(&consumers, TEST_TIMEOUT)
            .await
            .unwrap_err();

        // c3 must never have been started.
        assert_eq!(*calls.lock().unwrap(), vec!["c1", "c2"]);
        assert_eq!(err.to_string(), "c2: ProcessBlock got: boom");
        assert!(matches!(
            err,
            DispatchError::ConsumerFailed { consumer, .. } if consumer == "c2"
        ));
    }

    #[tokio::test]
    async fn timeout_names_the_silent_consumer() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let consumers = vec![Scripted::arc("c1", Reaction::Hold, &calls)];

        let (beat, _ack) = test_beat();
        let err = beat
            .dispatch_sequential(&consumers, Duration::from_millis(10))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::ProcessBlockTimeout { consumer } if consumer == "c1"
        ));
    }

    #[tokio::test]
    async fn dropped_beat_is_reported_without_waiting_out_the_timeout() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let consumers = vec![Scripted::arc("c1", Reaction::Drop, &calls)];

        let (beat, _ack) = test_beat();
        let err = beat
            .dispatch_sequential(&consumers, Duration::from_secs(60))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::AckChannelClosed { consumer } if consumer == "c1"
        ));
    }

    /// Consumer that parks on a shared barrier before acking; only passes if
    /// its sibling is in flight at the same time.
    struct Rendezvous {
        name: &'static str,
        barrier: Arc<Barrier>,
    }

    #[async_trait]
    impl Consumer for Rendezvous {
        fn name(&self) -> &str {
            self.name
        }

        async fn process_block(&self, beat: Beat) {
            self.barrier.wait().await;
            beat.try_ack(Ok(()));
        }
    }

    #[tokio::test]
    async fn concurrent_consumers_overlap() {
        let barrier = Arc::new(Barrier::new(2));
        let consumers: Vec<ConsumerRef> = vec![
            Arc::new(Rendezvous {
                name: "c1",
                barrier: Arc::clone(&barrier),
            }),
            Arc::new(Rendezvous {
                name: "c2",
                barrier: Arc::clone(&barrier),
            }),
        ];

        // A sequential dispatch would deadlock on the barrier and trip the
        // timeout; success proves the windows overlapped.
        let (beat, _ack) = test_beat();
        beat.dispatch_concurrent(&consumers, Duration::from_millis(500))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn concurrent_waits_for_all_then_surfaces_error() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let consumers = vec![
            Scripted::arc("c1", Reaction::AckErr("boom"), &calls),
            Scripted::arc("c2", Reaction::AckOk, &calls),
        ];

        let (beat, _ack) = test_beat();
        let err = beat
            .dispatch_concurrent(&consumers, TEST_TIMEOUT)
            .await
            .unwrap_err();

        // Both consumers ran despite c1's failure.
        assert_eq!(calls.lock().unwrap().len(), 2);
        assert!(matches!(
            err,
            DispatchError::ConsumerFailed { consumer, .. } if consumer == "c1"
        ));
    }
}
