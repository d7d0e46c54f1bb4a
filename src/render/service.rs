//! Render service - worker pool, priority queue, and request tickets
//!
//! The service owns the only path into the tile cache's write side:
//! every key has at most one live ticket, created here, completed by
//! exactly one worker, and retired in `poll_responses`.

use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use flume::{Receiver, Sender};

use crate::document::Generation;
use crate::geometry::Rect;
use crate::source::{PageSource, PixelBuffer};

use super::cache::{TileCache, TilePayload};
use super::cancel::CancelToken;
use super::request::{
    RenderFault, RenderJob, RenderResponse, RequestId, TileKey, WorkerMessage,
};
use super::worker::render_worker;

/// Distance penalty applied when a pending page scrolls out of view
const DEMOTE_PENALTY: f32 = 1_000_000.0;

/// Immediate answer to a tile request
#[derive(Debug)]
pub enum RequestOutcome {
    /// Fresh cache hit
    Ready(Arc<PixelBuffer>),
    /// Cached failure still inside its TTL
    Failed(Arc<RenderFault>),
    /// Queued or in flight; completion arrives on the response channel.
    /// Duplicate requests for the same key share one id.
    Pending(RequestId),
}

/// Heap entry; pops lowest cost (= closest to viewport center) first
#[derive(Debug, PartialEq, Eq)]
struct Queued {
    cost: u32,
    seq: u64,
    key: TileKey,
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap: invert so lower cost wins, FIFO on ties
        other
            .cost
            .cmp(&self.cost)
            .then(other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
struct Ticket {
    id: RequestId,
    cancel: CancelToken,
    region: Rect,
    generation: Generation,
    distance: f32,
    dispatched_at: Option<Instant>,
}

/// Manages tile rendering with worker threads, priority scheduling and
/// the shared cache
pub struct RenderService {
    job_tx: Sender<WorkerMessage>,
    response_rx: Receiver<RenderResponse>,
    cache: Arc<Mutex<TileCache>>,
    tickets: HashMap<TileKey, Ticket>,
    queue: BinaryHeap<Queued>,
    // Current valid heap sequence per queued key; older heap entries are
    // skipped on pop
    queued_seq: HashMap<TileKey, u64>,
    next_request_id: u64,
    next_seq: u64,
    max_concurrent: usize,
    soft_timeout: Duration,
    num_workers: usize,
}

impl RenderService {
    #[must_use]
    pub fn new(
        source: Arc<dyn PageSource>,
        cache: Arc<Mutex<TileCache>>,
        max_concurrent: usize,
        soft_timeout: Duration,
    ) -> Self {
        // Flume gives us MPMC: every worker clones the receiver and pulls
        // from one shared queue (same fan-out the std/tokio mpsc types
        // cannot do).
        let (job_tx, job_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let max_concurrent = max_concurrent.max(1);
        // One spare thread beyond the dispatch window: when a render
        // exceeds the soft timeout and stops counting against the
        // window, the job dispatched around it needs a free worker.
        let num_workers = max_concurrent + 1;
        for _ in 0..num_workers {
            let source = Arc::clone(&source);
            let rx = job_rx.clone();
            let tx = response_tx.clone();
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                render_worker(source, rx, tx, cache);
            });
        }

        Self {
            job_tx,
            response_rx,
            cache,
            tickets: HashMap::new(),
            queue: BinaryHeap::new(),
            queued_seq: HashMap::new(),
            next_request_id: 1,
            next_seq: 0,
            max_concurrent,
            soft_timeout,
            num_workers,
        }
    }

    /// Request a tile. `distance` is the page's distance from the
    /// viewport center and orders the pending queue.
    pub fn request(
        &mut self,
        key: TileKey,
        region: Rect,
        generation: Generation,
        distance: f32,
    ) -> RequestOutcome {
        let cached = self
            .cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&key);
        match cached {
            Some(TilePayload::Ready(tile)) => return RequestOutcome::Ready(tile),
            Some(TilePayload::Failed(fault)) => return RequestOutcome::Failed(fault),
            None => {}
        }

        if let Some(ticket) = self.tickets.get(&key) {
            if ticket.cancel.is_cancelled() {
                // The cancelled render will never be delivered; retire
                // the dead ticket and dispatch afresh. Its late result
                // still lands in the cache and may satisfy the new job.
                self.tickets.remove(&key);
                self.queued_seq.remove(&key);
            } else {
                let id = ticket.id;
                // Attach to the in-flight ticket; promote if the page
                // moved closer to the viewport center
                if ticket.dispatched_at.is_none() && distance < ticket.distance {
                    self.requeue(key, distance);
                }
                return RequestOutcome::Pending(id);
            }
        }

        let id = self.next_id();
        self.tickets.insert(
            key,
            Ticket {
                id,
                cancel: CancelToken::new(),
                region,
                generation,
                distance,
                dispatched_at: None,
            },
        );
        self.push_queued(key, distance);
        self.pump();
        RequestOutcome::Pending(id)
    }

    /// Demote a pending request whose page scrolled out of view.
    /// It stays queued; it just loses to every visible page.
    pub fn demote(&mut self, key: &TileKey) {
        let Some(ticket) = self.tickets.get(key) else {
            return;
        };
        if ticket.dispatched_at.is_some() {
            return;
        }
        let demoted = ticket.distance + DEMOTE_PENALTY;
        self.requeue(*key, demoted);
    }

    /// Cancel every pending request matching the predicate. Undispatched
    /// tickets are dropped silently (the caller is the only holder);
    /// dispatched ones get a `Cancelled` response from their worker, and
    /// a render that cannot stop is cached but not delivered.
    pub fn cancel_where(&mut self, mut stale: impl FnMut(&TileKey) -> bool) -> usize {
        let keys: Vec<TileKey> = self.tickets.keys().filter(|k| stale(k)).copied().collect();
        let count = keys.len();

        for key in keys {
            let dispatched = match self.tickets.get(&key) {
                Some(ticket) => {
                    ticket.cancel.cancel();
                    ticket.dispatched_at.is_some()
                }
                None => continue,
            };
            if !dispatched {
                self.tickets.remove(&key);
                self.queued_seq.remove(&key);
            }
        }

        if count > 0 {
            log::debug!("cancelled {count} pending renders");
            self.pump();
        }
        count
    }

    /// Drain completed responses and refill the dispatch window.
    /// Completion order across requests is not guaranteed.
    pub fn poll_responses(&mut self) -> Vec<RenderResponse> {
        let mut responses = Vec::new();

        while let Ok(response) = self.response_rx.try_recv() {
            let (id, key) = match &response {
                RenderResponse::Tile { id, key, .. }
                | RenderResponse::Failed { id, key, .. }
                | RenderResponse::Cancelled { id, key } => (*id, *key),
            };
            if self.tickets.get(&key).is_some_and(|t| t.id == id) {
                self.tickets.remove(&key);
            }
            responses.push(response);
        }

        self.pump();
        responses
    }

    /// The response receiver, for callers that want to block or select
    #[must_use]
    pub fn response_receiver(&self) -> &Receiver<RenderResponse> {
        &self.response_rx
    }

    /// True if this key has a live ticket (queued or in flight)
    #[must_use]
    pub fn is_pending(&self, key: &TileKey) -> bool {
        self.tickets.contains_key(key)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.tickets.len()
    }

    /// Keys with live tickets, for the controller's demotion sweep
    #[must_use]
    pub fn pending_keys(&self) -> Vec<TileKey> {
        self.tickets.keys().copied().collect()
    }

    fn requeue(&mut self, key: TileKey, distance: f32) {
        if let Some(ticket) = self.tickets.get_mut(&key) {
            ticket.distance = distance;
        }
        self.push_queued(key, distance);
    }

    fn push_queued(&mut self, key: TileKey, distance: f32) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queued_seq.insert(key, seq);
        self.queue.push(Queued {
            cost: distance.max(0.0).to_bits(),
            seq,
            key,
        });
    }

    /// Renders past the soft timeout stop counting against the window so
    /// fresh work keeps the remaining workers busy; they are not
    /// cancelled.
    fn in_flight(&self) -> usize {
        self.tickets
            .values()
            .filter(|t| {
                t.dispatched_at
                    .is_some_and(|at| at.elapsed() < self.soft_timeout)
            })
            .count()
    }

    fn pump(&mut self) {
        while self.in_flight() < self.max_concurrent {
            let Some(next) = self.queue.pop() else {
                break;
            };
            // Skip heap entries superseded by a requeue or cancellation
            if self.queued_seq.get(&next.key) != Some(&next.seq) {
                continue;
            }
            self.queued_seq.remove(&next.key);

            let Some(ticket) = self.tickets.get_mut(&next.key) else {
                continue;
            };
            if ticket.dispatched_at.is_some() {
                continue;
            }
            ticket.dispatched_at = Some(Instant::now());

            let job = RenderJob {
                id: ticket.id,
                key: next.key,
                region: ticket.region,
                generation: ticket.generation,
                cancel: ticket.cancel.clone(),
            };
            if self.job_tx.send(WorkerMessage::Render(job)).is_err() {
                log::warn!("render workers are gone; dropping dispatch");
                break;
            }
        }
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }

    /// Ask all workers to exit once their current job finishes
    pub fn shutdown(&self) {
        for _ in 0..self.num_workers {
            let _ = self.job_tx.send(WorkerMessage::Shutdown);
        }
    }
}

impl Drop for RenderService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
