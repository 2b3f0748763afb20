//! The relational sink: an `indexer_core::sink::Sink` that hands decoded
//! events to its own bounded queue and a background consumer task, so a slow
//! or momentarily unavailable database never blocks the chain pipeline that
//! feeds it.

use {
    crate::{consumer, metrics::Metrics},
    async_trait::async_trait,
    indexer_core::{
        event::TypedEvent,
        queue::{self, BoundedQueue, QueueConsumer},
        sink::Sink,
        supervisor::BackgroundService,
    },
    sqlx::PgPool,
    std::sync::Arc,
    tokio::{sync::Mutex, task::JoinHandle},
    tokio_util::sync::CancellationToken,
};

pub struct RelationalSink {
    chain: String,
    queue: BoundedQueue<Arc<TypedEvent>>,
}

#[async_trait]
impl Sink for RelationalSink {
    fn name(&self) -> &str {
        "relational"
    }

    async fn accept(&self, event: Arc<TypedEvent>) {
        if !self.queue.enqueue(event) {
            Metrics::get()
                .queue_discards
                .with_label_values(&[&self.chain])
                .inc();
        }
    }
}

/// The sink's background consumer, started once by the supervisor. Pairs
/// with exactly one [`RelationalSink`] built from the same [`new`] call.
pub struct RelationalConsumer {
    chain: String,
    pool: PgPool,
    consumer: Mutex<Option<QueueConsumer<Arc<TypedEvent>>>>,
}

impl BackgroundService for RelationalConsumer {
    fn name(&self) -> String {
        format!("relational-sink[{}]", self.chain)
    }

    fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let consumer = self
                .consumer
                .lock()
                .await
                .take()
                .expect("RelationalConsumer spawned more than once");
            let pool = self.pool.clone();
            let chain = self.chain.clone();
            consumer
                .run(cancel, move |event, discarded| {
                    let pool = pool.clone();
                    let chain = chain.clone();
                    async move {
                        if discarded {
                            tracing::warn!(chain, event = ?event.identity(), "discarding event, queue was full");
                            return;
                        }
                        consumer::apply(&pool, event).await
                    }
                })
                .await;
        })
    }
}

/// Build a sink/consumer pair for one chain. `capacity` bounds how many
/// decoded events may be in flight between the pipeline and the database
/// before new ones are discarded.
pub fn new(chain: String, pool: PgPool, capacity: usize) -> (Arc<RelationalSink>, Arc<RelationalConsumer>) {
    let (queue, consumer) = queue::bounded(capacity);
    let sink = Arc::new(RelationalSink {
        chain: chain.clone(),
        queue,
    });
    let consumer_task = Arc::new(RelationalConsumer {
        chain,
        pool,
        consumer: Mutex::new(Some(consumer)),
    });
    (sink, consumer_task)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accept_without_a_draining_consumer_eventually_discards() {
        observe::metrics::setup_registry(None, None);
        let pool = PgPool::connect_lazy("postgres://localhost/nonexistent").unwrap();
        let (sink, _consumer) = new("eth".into(), pool, 1);
        assert_eq!(sink.name(), "relational");
        assert_eq!(Metrics::get().queue_discards.with_label_values(&["eth"]).get(), 0);
    }
}
