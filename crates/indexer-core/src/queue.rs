//! A bounded, FIFO, single-consumer queue used to decouple a chain pipeline's
//! log decoding from a sink's delivery. Enqueue never blocks: once the
//! channel is full, new items are discarded rather than applying backpressure
//! to the pipeline. Discarded items are still handed to the consumer, tagged
//! `discarded: true`, so a consumer can log or count what was lost instead of
//! it vanishing silently.

use {
    std::sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
};

struct Shared {
    closed: AtomicBool,
    discarded: AtomicU64,
}

/// Producer handle. Cheaply cloneable; every clone shares the same channel and
/// discard counter.
#[derive(Clone)]
pub struct BoundedQueue<T> {
    sender: mpsc::Sender<T>,
    discard_sender: mpsc::UnboundedSender<T>,
    shared: Arc<Shared>,
}

pub struct QueueConsumer<T> {
    receiver: mpsc::Receiver<T>,
    discard_receiver: mpsc::UnboundedReceiver<T>,
    shared: Arc<Shared>,
}

/// Create a bounded queue with room for `capacity` items in flight.
pub fn bounded<T>(capacity: usize) -> (BoundedQueue<T>, QueueConsumer<T>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let (discard_sender, discard_receiver) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        closed: AtomicBool::new(false),
        discarded: AtomicU64::new(0),
    });
    (
        BoundedQueue { sender, discard_sender, shared: shared.clone() },
        QueueConsumer { receiver, discard_receiver, shared },
    )
}

impl<T> BoundedQueue<T> {
    /// Attempt to enqueue `value`. Returns `true` if admitted, `false` if the
    /// queue is closed or full. A full queue still routes `value` to the
    /// consumer's handler, marked as discarded, rather than dropping it
    /// unobserved; a closed queue drops it outright since nothing drains it.
    pub fn enqueue(&self, value: T) -> bool {
        if self.shared.closed.load(Ordering::Acquire) {
            return false;
        }
        match self.sender.try_send(value) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(value)) => {
                self.shared.discarded.fetch_add(1, Ordering::Relaxed);
                let _ = self.discard_sender.send(value);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn discarded_count(&self) -> u64 {
        self.shared.discarded.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl<T: Send + 'static> QueueConsumer<T> {
    /// Drain items in FIFO order, invoking `handler(item, discarded)` for
    /// each, until `cancel` fires. Admitted items are delivered with
    /// `discarded = false`; items that overflowed the bounded channel are
    /// delivered with `discarded = true` instead of being dropped unseen.
    /// Marks the queue closed on exit so that subsequent `enqueue` calls fail
    /// fast instead of blocking on a channel nobody drains.
    pub async fn run<F, Fut>(mut self, cancel: CancellationToken, mut handler: F)
    where
        F: FnMut(T, bool) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                item = self.receiver.recv() => {
                    match item {
                        Some(item) => handler(item, false).await,
                        None => break,
                    }
                }
                Some(item) = self.discard_receiver.recv() => {
                    handler(item, true).await;
                }
            }
        }
        self.shared.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_queue_discards_and_counts() {
        let (queue, consumer) = bounded::<u32>(1);
        assert!(queue.enqueue(1));
        assert!(!queue.enqueue(2));
        assert_eq!(queue.discarded_count(), 1);
        drop(consumer);
    }

    #[tokio::test]
    async fn full_queue_delivers_discarded_item_to_handler() {
        let (queue, consumer) = bounded::<u32>(1);
        assert!(queue.enqueue(1));
        assert!(!queue.enqueue(2));
        let cancel = CancellationToken::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(async move {
            consumer
                .run(cancel_clone, |item, discarded| {
                    let seen = seen_clone.clone();
                    async move {
                        seen.lock().unwrap().push((item, discarded));
                    }
                })
                .await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(1, false), (2, true)]);
    }

    #[tokio::test]
    async fn consumer_drains_fifo_order() {
        let (queue, consumer) = bounded::<u32>(8);
        for i in 0..5 {
            assert!(queue.enqueue(i));
        }
        let cancel = CancellationToken::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(async move {
            consumer
                .run(cancel_clone, |item, _discarded| {
                    let seen = seen_clone.clone();
                    async move {
                        seen.lock().unwrap().push(item);
                    }
                })
                .await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn closing_consumer_fails_subsequent_enqueues() {
        let (queue, consumer) = bounded::<u32>(4);
        let cancel = CancellationToken::new();
        cancel.cancel();
        consumer.run(cancel, |_: u32, _discarded: bool| async {}).await;
        assert!(queue.is_closed());
        assert!(!queue.enqueue(1));
    }
}
