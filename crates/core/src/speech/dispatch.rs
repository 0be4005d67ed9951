use crate::config::DispatchConfig;
use crate::speech::{RendererProvider, SpeechError, SpeechEvent, SpeechRenderer};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// How long an idle worker waits before re-checking the running flag.
const IDLE_POLL: Duration = Duration::from_secs(2);

/// Bounded event queue with recency-preserving overflow: a full queue is
/// drained down to the most recent `keep_recent` events before the new one
/// is admitted.
struct BoundedEventQueue {
    inner: Mutex<VecDeque<SpeechEvent>>,
    capacity: usize,
    keep_recent: usize,
}

impl BoundedEventQueue {
    fn new(capacity: usize, keep_recent: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            keep_recent,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<SpeechEvent>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn push(&self, event: SpeechEvent) {
        let mut queue = self.lock();
        if queue.len() >= self.capacity {
            while queue.len() > self.keep_recent {
                queue.pop_front();
            }
        }
        queue.push_back(event);
    }

    fn pop(&self) -> Option<SpeechEvent> {
        self.lock().pop_front()
    }

    fn clear(&self) -> usize {
        let mut queue = self.lock();
        let dropped = queue.len();
        queue.clear();
        dropped
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

struct Shared {
    queue: BoundedEventQueue,
    wakeup: Notify,
    running: AtomicBool,
    enabled: AtomicBool,
}

/// Decouples trigger decisions from speech-rendering latency.
///
/// Events go through the bounded queue and are drained by parallel
/// workers, each holding its own renderer handle; a single worker renders
/// one event to completion before pulling the next. `speak_now` bypasses
/// the queue entirely on a freshly acquired renderer.
pub struct SpeechDispatcher {
    shared: Arc<Shared>,
    provider: Arc<dyn RendererProvider>,
    workers: Vec<JoinHandle<()>>,
}

impl SpeechDispatcher {
    /// Acquires one renderer per worker and starts the worker tasks.
    pub fn start(
        config: DispatchConfig,
        provider: Arc<dyn RendererProvider>,
    ) -> Result<Self, SpeechError> {
        let shared = Arc::new(Shared {
            queue: BoundedEventQueue::new(config.capacity, config.keep_recent),
            wakeup: Notify::new(),
            running: AtomicBool::new(true),
            enabled: AtomicBool::new(true),
        });

        let mut workers = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            let renderer = provider.acquire()?;
            let shared = Arc::clone(&shared);
            workers.push(tokio::spawn(async move {
                worker_loop(worker_id, shared, renderer).await;
            }));
        }

        Ok(Self {
            shared,
            provider,
            workers,
        })
    }

    /// Queues an event. Returns whether it was admitted (speech disabled or
    /// shut down means not). Overflow is resolved silently by recency.
    pub fn submit(&self, event: SpeechEvent) -> bool {
        if !self.shared.enabled.load(Ordering::Relaxed)
            || !self.shared.running.load(Ordering::Relaxed)
        {
            return false;
        }
        self.shared.queue.push(event);
        self.shared.wakeup.notify_one();
        true
    }

    /// Speaks immediately on a fresh renderer, never waiting behind queue
    /// backlog. Synchronous from the caller's perspective.
    pub async fn speak_now(&self, text: &str) -> Result<(), SpeechError> {
        let renderer = self.provider.acquire()?;
        renderer.speak(text).await
    }

    /// Toggles queueing on or off; pending events are unaffected.
    pub fn set_enabled(&self, enabled: bool) {
        self.shared.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Relaxed)
    }

    /// Drops all pending events.
    pub fn clear(&self) {
        let dropped = self.shared.queue.clear();
        if dropped > 0 {
            tracing::debug!(dropped, "cleared pending speech");
        }
    }

    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    /// Cooperative shutdown: stops the workers, clears pending speech, and
    /// waits for in-flight rendering to finish.
    pub async fn shutdown(self) {
        self.shared.running.store(false, Ordering::Relaxed);
        self.clear();
        self.shared.wakeup.notify_waiters();

        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "speech worker did not exit cleanly");
            }
        }
    }
}

async fn worker_loop(worker_id: usize, shared: Arc<Shared>, renderer: Arc<dyn SpeechRenderer>) {
    tracing::debug!(worker_id, "speech worker started");

    while shared.running.load(Ordering::Relaxed) {
        match shared.queue.pop() {
            Some(event) => {
                if let Err(e) = renderer.speak(&event.text).await {
                    // Rendering failures never stop the worker loop.
                    tracing::warn!(
                        worker_id,
                        error = %e,
                        text = %event.text,
                        reason = %event.reason,
                        "speech rendering failed"
                    );
                } else {
                    tracing::trace!(worker_id, text = %event.text, at = ?event.at, "spoke");
                }
            }
            None => {
                let _ = tokio::time::timeout(IDLE_POLL, shared.wakeup.notified()).await;
            }
        }
    }

    // Teardown is best-effort; secondary errors are suppressed.
    if let Err(e) = renderer.stop().await {
        tracing::debug!(worker_id, error = %e, "renderer stop failed during teardown");
    }
    tracing::debug!(worker_id, "speech worker stopped");
}
