//! Decode worker queue.
//!
//! - Bounded worker pool (2-4 threads) decoding off the render path
//! - Each request answers through its own [`DecodeHandle`]
//! - Requests whose handle was dropped before a worker picked them up are
//!   skipped, so scrolled-away tiles cost nothing
//! - Uses flume for communication between the render thread and workers

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::{Receiver, Sender};
use parking_lot::RwLock;
use tracing::{debug, error, trace, warn};

use super::{DecodeHandle, DecodeReply};
use crate::error::MediaError;
use crate::models::MediaId;

/// Default number of worker threads.
pub const DEFAULT_WORKERS: usize = 2;

/// Maximum number of worker threads.
const MAX_WORKERS: usize = 4;

/// Maximum number of queued requests.
const MAX_QUEUE_SIZE: usize = 256;

/// How long an idle worker waits before re-checking for shutdown.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Outstanding request count per id.
type PendingRequests = Arc<RwLock<HashMap<MediaId, usize>>>;

/// Function run by the workers for each request.
pub type DecodeFn<I> = dyn Fn(&MediaId, f64, f64) -> Result<I, MediaError> + Send + Sync;

struct DecodeRequest<I> {
    id: MediaId,
    max_width: f64,
    max_height: f64,
    reply: DecodeReply<I>,
}

/// Worker queue for image decoding.
pub struct DecodeQueue<I: Send + 'static> {
    /// Sender for new requests.
    request_tx: Sender<DecodeRequest<I>>,
    /// Worker thread handles.
    workers: Vec<JoinHandle<()>>,
    /// Flag to signal workers to stop.
    shutdown: Arc<AtomicBool>,
    /// Number of workers currently decoding.
    active_workers: Arc<AtomicUsize>,
    /// Ids queued or being decoded, with their request count.
    pending: PendingRequests,
}

impl<I: Send + 'static> DecodeQueue<I> {
    /// Starts `workers` threads (clamped to 1..=4) running `decode`.
    pub fn new<F>(workers: usize, decode: F) -> io::Result<Self>
    where
        F: Fn(&MediaId, f64, f64) -> Result<I, MediaError> + Send + Sync + 'static,
    {
        let num_workers = workers.clamp(1, MAX_WORKERS);
        let decode: Arc<DecodeFn<I>> = Arc::new(decode);

        let (request_tx, request_rx) = flume::bounded(MAX_QUEUE_SIZE);
        let shutdown = Arc::new(AtomicBool::new(false));
        let active_workers = Arc::new(AtomicUsize::new(0));
        let pending: PendingRequests = Arc::new(RwLock::new(HashMap::new()));

        let mut handles = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let rx = request_rx.clone();
            let shutdown = Arc::clone(&shutdown);
            let active = Arc::clone(&active_workers);
            let pending = Arc::clone(&pending);
            let decode = Arc::clone(&decode);

            let handle = thread::Builder::new()
                .name(format!("decode-worker-{}", worker_id))
                .spawn(move || worker_loop(worker_id, rx, shutdown, active, pending, decode))?;
            handles.push(handle);
        }

        debug!(num_workers, "Started decode worker queue");

        Ok(Self {
            request_tx,
            workers: handles,
            shutdown,
            active_workers,
            pending,
        })
    }

    /// Queues a decode request.
    ///
    /// When the queue is full the request is dropped and the handle reports
    /// [`MediaError::Cancelled`], so the caller can ask again later.
    pub fn submit(&self, id: &MediaId, max_width: f64, max_height: f64) -> DecodeHandle<I> {
        let (reply, handle) = DecodeHandle::channel(id.clone());

        if track(&self.pending, id) > 1 {
            trace!(%id, "Decode already pending, queueing another request");
        }

        let request = DecodeRequest {
            id: id.clone(),
            max_width,
            max_height,
            reply,
        };
        match self.request_tx.try_send(request) {
            Ok(()) => {}
            Err(flume::TrySendError::Full(req)) => {
                warn!(id = %req.id, "Decode queue full, dropping request");
                release(&self.pending, &req.id);
            }
            Err(flume::TrySendError::Disconnected(req)) => {
                error!(id = %req.id, "Decode queue disconnected");
                release(&self.pending, &req.id);
            }
        }
        handle
    }

    /// Number of ids queued or being decoded.
    pub fn pending_count(&self) -> usize {
        self.pending.read().len()
    }

    /// Number of workers currently decoding.
    pub fn active_worker_count(&self) -> usize {
        self.active_workers.load(Ordering::Relaxed)
    }

    pub fn is_busy(&self) -> bool {
        !self.pending.read().is_empty() || self.active_worker_count() > 0
    }

    /// Stops the workers and waits for them to exit.
    ///
    /// Requests still queued are dropped; their handles report cancellation.
    pub fn shutdown(&mut self) {
        debug!("Shutting down decode queue");
        self.shutdown.store(true, Ordering::SeqCst);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        self.pending.write().clear();
        debug!("Decode queue shutdown complete");
    }
}

impl<I: Send + 'static> Drop for DecodeQueue<I> {
    fn drop(&mut self) {
        if !self.shutdown.load(Ordering::Relaxed) {
            self.shutdown();
        }
    }
}

/// Records one more request for `id`; returns how many are now outstanding.
fn track(pending: &PendingRequests, id: &MediaId) -> usize {
    let mut pending = pending.write();
    let count = pending.entry(id.clone()).or_insert(0);
    *count += 1;
    *count
}

fn release(pending: &PendingRequests, id: &MediaId) {
    let mut pending = pending.write();
    if let Some(count) = pending.get_mut(id) {
        *count -= 1;
        if *count == 0 {
            pending.remove(id);
        }
    }
}

fn worker_loop<I>(
    worker_id: usize,
    rx: Receiver<DecodeRequest<I>>,
    shutdown: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
    pending: PendingRequests,
    decode: Arc<DecodeFn<I>>,
) {
    debug!(worker_id, "Decode worker started");

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        match rx.recv_timeout(IDLE_POLL) {
            Ok(req) => {
                if req.reply.is_cancelled() {
                    trace!(worker_id, id = %req.id, "Skipping cancelled decode");
                    release(&pending, &req.id);
                    continue;
                }

                active.fetch_add(1, Ordering::Relaxed);
                let result = decode(&req.id, req.max_width, req.max_height);
                if let Err(e) = &result {
                    warn!(worker_id, id = %req.id, error = %e, "Decode failed");
                }
                release(&pending, &req.id);
                if !req.reply.send(result) {
                    trace!(worker_id, id = %req.id, "Decode finished after handle was dropped");
                }
                active.fetch_sub(1, Ordering::Relaxed);
            }
            Err(flume::RecvTimeoutError::Timeout) => continue,
            Err(flume::RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!(worker_id, "Decode worker stopped");
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn wait_idle<I: Send + 'static>(queue: &DecodeQueue<I>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while queue.is_busy() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_decodes_request() {
        let queue = DecodeQueue::new(2, |id: &MediaId, w: f64, h: f64| {
            Ok(format!("{}@{}x{}", id, w, h))
        })
        .unwrap();
        let handle = queue.submit(&"a.png".into(), 40.0, 30.0);
        assert_eq!(handle.wait(), Ok("a.png@40x30".to_string()));
    }

    #[test]
    fn test_failure_is_reported() {
        let queue: DecodeQueue<u8> = DecodeQueue::new(1, |id: &MediaId, _: f64, _: f64| {
            Err(MediaError::decode_failed(id.as_str(), "corrupt"))
        })
        .unwrap();
        let handle = queue.submit(&"bad.png".into(), 10.0, 10.0);
        assert!(matches!(handle.wait(), Err(MediaError::DecodeFailed { .. })));
    }

    #[test]
    fn test_dropped_handle_is_skipped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(parking_lot::Mutex::new(()));
        let guard = gate.lock();

        let queue = {
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            DecodeQueue::new(1, move |_: &MediaId, _: f64, _: f64| {
                let _open = gate.lock();
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap()
        };

        // The single worker blocks on the first request while the second
        // one's handle is dropped.
        let first = queue.submit(&"first".into(), 1.0, 1.0);
        thread::sleep(Duration::from_millis(50));
        drop(queue.submit(&"second".into(), 1.0, 1.0));
        drop(guard);

        assert_eq!(first.wait(), Ok(()));
        wait_idle(&queue);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_duplicate_submit_stays_pending_until_both_finish() {
        let (ticket_tx, ticket_rx) = flume::unbounded::<()>();
        let queue = DecodeQueue::new(1, move |_: &MediaId, _: f64, _: f64| {
            ticket_rx.recv().map_err(|_| MediaError::Cancelled)?;
            Ok(())
        })
        .unwrap();

        let id: MediaId = "same.png".into();
        let first = queue.submit(&id, 1.0, 1.0);
        let second = queue.submit(&id, 1.0, 1.0);
        assert_eq!(queue.pending_count(), 1);

        ticket_tx.send(()).unwrap();
        assert_eq!(first.wait(), Ok(()));
        // The second request for the same id is still outstanding.
        assert_eq!(queue.pending_count(), 1);
        assert!(queue.is_busy());

        ticket_tx.send(()).unwrap();
        assert_eq!(second.wait(), Ok(()));
        wait_idle(&queue);
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_shutdown_cancels_queued_requests() {
        let mut queue = DecodeQueue::new(1, |_: &MediaId, _: f64, _: f64| Ok(1u32)).unwrap();
        queue.shutdown();
        let handle = queue.submit(&"late".into(), 1.0, 1.0);
        // No receiver is left, so the request is dropped on submit.
        assert_eq!(handle.wait(), Err(MediaError::Cancelled));
    }
}
