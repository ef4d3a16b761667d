use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::{info, warn};

use stockbook_events::{EventBus, EventEnvelope, Subscription};

use crate::projections::{Projection, ProjectionError};

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Generic projection worker loop.
///
/// - Subscribes to an event bus at spawn time
/// - Applies an idempotent handler to each message
/// - Stops on shutdown or when the bus goes away
#[derive(Debug)]
pub struct ProjectionWorker;

impl ProjectionWorker {
    /// Spawn a named worker thread. `handler` must tolerate redelivery.
    pub fn spawn<M, B, H, E>(name: &'static str, bus: B, mut handler: H) -> io::Result<WorkerHandle>
    where
        M: Send + 'static,
        B: EventBus<M>,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub: Subscription<M> = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, sub, shutdown_rx, &mut handler))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }

    /// Spawn a worker feeding every envelope to each of `projections`.
    ///
    /// One failing projection does not stop the others from seeing the envelope.
    pub fn spawn_projections<B>(
        name: &'static str,
        bus: B,
        projections: Vec<Arc<dyn Projection>>,
    ) -> io::Result<WorkerHandle>
    where
        B: EventBus<EventEnvelope<JsonValue>>,
    {
        Self::spawn(name, bus, move |env: EventEnvelope<JsonValue>| {
            let mut first_err: Option<(&'static str, ProjectionError)> = None;
            for p in &projections {
                if let Err(err) = p.apply_envelope(&env) {
                    first_err.get_or_insert((p.name(), err));
                }
            }
            match first_err {
                Some(failure) => Err(failure),
                None => Ok(()),
            }
        })
    }
}

fn worker_loop<M, H, E>(
    name: &'static str,
    sub: Subscription<M>,
    shutdown_rx: mpsc::Receiver<()>,
    handler: &mut H,
) where
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Debug,
{
    let tick = Duration::from_millis(250);
    info!(worker = name, "projection worker started");

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(msg) => {
                if let Err(err) = handler(msg) {
                    warn!(worker = name, error = ?err, "projection worker handler failed");
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!(worker = name, "projection worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;

    use stockbook_events::InMemoryEventBus;

    #[test]
    fn handler_sees_messages_and_shutdown_joins() {
        let bus: Arc<InMemoryEventBus<u32>> = Arc::new(InMemoryEventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let handle = ProjectionWorker::spawn("test-worker", bus.clone(), move |m: u32| {
            sink.lock().unwrap().push(m);
            if m == 2 { Err("boom") } else { Ok(()) }
        })
        .unwrap();

        for m in 1..=3 {
            bus.publish(m).unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        while seen.lock().unwrap().len() < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        handle.shutdown();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }
}
