//! Coordinates startup and shutdown across every chain pipeline and every
//! durable sink's background consumer. Both groups run for the life of the
//! process; the supervisor's only real job is ordering: sinks' consumers must
//! be accepting work before any pipeline can dispatch to them, and on
//! shutdown pipelines must stop producing before sinks are allowed to drain
//! and close.

use {std::sync::Arc, tokio::task::JoinHandle, tokio_util::sync::CancellationToken};

/// A long-running task managed by the supervisor: a chain pipeline, a sink's
/// background consumer, or the HTTP metrics/health endpoint.
pub trait BackgroundService: Send + Sync + 'static {
    fn name(&self) -> String;

    /// Run until `cancel` fires, then return. Must not return early on its
    /// own; an early return is treated as a crash and logged as such.
    fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()>;
}

pub struct Supervisor {
    cancel: CancellationToken,
}

impl Supervisor {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Start `sinks` first, then `pipelines`, then `http`, in that order
    /// (each a moment before the next, so an earlier stage is ready to accept
    /// work from a later one). Wait for `cancel`, then stop `http` first,
    /// `pipelines` second, and `sinks` last, giving sinks a chance to finish
    /// processing whatever pipelines already handed them before the process exits.
    pub async fn run(
        self,
        sinks: Vec<Arc<dyn BackgroundService>>,
        pipelines: Vec<Arc<dyn BackgroundService>>,
        http: Option<Arc<dyn BackgroundService>>,
    ) {
        let mut sink_handles = Vec::new();
        for sink in sinks {
            tracing::info!(service = %sink.name(), "starting sink");
            sink_handles.push((sink.name(), sink.spawn(self.cancel.clone())));
        }

        let mut pipeline_handles = Vec::new();
        for pipeline in pipelines {
            tracing::info!(service = %pipeline.name(), "starting chain pipeline");
            pipeline_handles.push((pipeline.name(), pipeline.spawn(self.cancel.clone())));
        }

        let http_handle = http.map(|h| {
            tracing::info!(service = %h.name(), "starting http endpoint");
            (h.name(), h.spawn(self.cancel.clone()))
        });

        self.cancel.cancelled().await;
        tracing::info!("shutdown requested, stopping services");

        if let Some((name, handle)) = http_handle {
            await_handle(&name, handle).await;
        }
        for (name, handle) in pipeline_handles {
            await_handle(&name, handle).await;
        }
        for (name, handle) in sink_handles {
            await_handle(&name, handle).await;
        }
        tracing::info!("shutdown complete");
    }
}

async fn await_handle(name: &str, handle: JoinHandle<()>) {
    if let Err(err) = handle.await {
        tracing::error!(service = name, error = %err, "background service task panicked");
    } else {
        tracing::info!(service = name, "background service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        name: &'static str,
        started: Arc<AtomicUsize>,
    }

    impl BackgroundService for Counting {
        fn name(&self) -> String {
            self.name.to_string()
        }

        fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
            tokio::spawn(async move {
                self.started.fetch_add(1, Ordering::SeqCst);
                cancel.cancelled().await;
            })
        }
    }

    #[tokio::test]
    async fn starts_and_stops_all_services() {
        let started = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let supervisor = Supervisor::new(cancel.clone());
        let sink: Arc<dyn BackgroundService> = Arc::new(Counting {
            name: "sink",
            started: started.clone(),
        });
        let pipeline: Arc<dyn BackgroundService> = Arc::new(Counting {
            name: "pipeline",
            started: started.clone(),
        });

        let run = tokio::spawn(supervisor.run(vec![sink], vec![pipeline], None));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(started.load(Ordering::SeqCst), 2);
        cancel.cancel();
        run.await.unwrap();
    }
}
