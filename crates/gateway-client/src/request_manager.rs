// crates/gateway-client/src/request_manager.rs
//! Correlation tables for outstanding requests.
//!
//! Two tables under one lock:
//!
//! - `by_id`:   correlation id → request (`WithId` and `Ticker` requests)
//! - `by_code`: reply code → FIFO of requests (`WithoutId` requests; the
//!   oldest pending request of a code takes the next reply of that code)
//!
//! Registration always happens before the request bytes are queued, so a
//! reply can never overtake its own request.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::ClientError;
use crate::request::{Request, RequestKey, Response};

/// Where an incoming reply should go.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    Id(i32),
    Code(i32),
}

#[derive(Default)]
struct Tables {
    by_id: HashMap<i32, Arc<Request>>,
    by_code: HashMap<i32, VecDeque<Arc<Request>>>,
}

pub(crate) struct RequestManager {
    tables: Mutex<Tables>,
    /// Next correlation id; 0 until seeded by the first id from the peer.
    next_id: AtomicI32,
    /// Next local pseudo-id for `WithoutId` requests.
    next_seq: AtomicI32,
}

impl Default for RequestManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestManager {
    pub(crate) fn new() -> Self {
        RequestManager {
            tables: Mutex::new(Tables::default()),
            next_id: AtomicI32::new(0),
            next_seq: AtomicI32::new(1),
        }
    }

    /// Seed the correlation counter (values below 1 become 1).
    pub(crate) fn seed_ids(&self, first: i32) {
        self.next_id.store(first.max(1), Ordering::Release);
    }

    /// Next correlation id for a `WithId` / `Ticker` request.
    pub(crate) fn allocate_id(&self) -> Result<i32, ClientError> {
        match bump(&self.next_id) {
            0 => Err(ClientError::Internal(
                "correlation ids not initialised".to_string(),
            )),
            id => Ok(id),
        }
    }

    /// Key for a `WithoutId` request answered by reply `code`.
    pub(crate) fn without_id_key(&self, code: i32) -> RequestKey {
        RequestKey::WithoutId {
            code,
            seq: bump(&self.next_seq),
        }
    }

    pub(crate) fn register(&self, request: Arc<Request>) -> Result<(), ClientError> {
        let mut tables = self.tables.lock();
        match request.key() {
            RequestKey::WithId(id) | RequestKey::Ticker(id) => {
                if tables.by_id.contains_key(&id) {
                    return Err(ClientError::Internal(format!("id {id} is already pending")));
                }
                tables.by_id.insert(id, request);
            }
            RequestKey::WithoutId { code, .. } => {
                tables.by_code.entry(code).or_default().push_back(request);
            }
        }
        Ok(())
    }

    fn unregister(&self, request: &Arc<Request>) {
        let mut tables = self.tables.lock();
        match request.key() {
            RequestKey::WithId(id) | RequestKey::Ticker(id) => {
                if tables
                    .by_id
                    .get(&id)
                    .is_some_and(|pending| Arc::ptr_eq(pending, request))
                {
                    tables.by_id.remove(&id);
                }
            }
            RequestKey::WithoutId { code, .. } => {
                if let Some(queue) = tables.by_code.get_mut(&code) {
                    queue.retain(|pending| !Arc::ptr_eq(pending, request));
                    if queue.is_empty() {
                        tables.by_code.remove(&code);
                    }
                }
            }
        }
    }

    /// Route one reply. Returns `false` when nothing was pending for
    /// `target` (late replies after a cancel are expected).
    ///
    /// `handler` runs under the request's own lock and returns whether the
    /// reply was terminal. A terminal reply or an error unregisters and
    /// completes the request; a `WithoutId` request is always completed
    /// because the lookup already popped it.
    pub(crate) fn dispatch<F>(&self, target: Target, handler: F) -> bool
    where
        F: FnOnce(&mut Response) -> Result<bool, ClientError>,
    {
        let request = {
            let mut guard = self.tables.lock();
            let tables = &mut *guard;
            match target {
                Target::Id(id) => tables.by_id.get(&id).cloned(),
                Target::Code(code) => {
                    let popped = tables.by_code.get_mut(&code).and_then(VecDeque::pop_front);
                    if tables.by_code.get(&code).is_some_and(VecDeque::is_empty) {
                        tables.by_code.remove(&code);
                    }
                    popped
                }
            }
        };

        let Some(request) = request else {
            trace!(?target, "no pending request for reply");
            return false;
        };

        match request.handle(handler) {
            None => trace!(key = ?request.key(), "reply for inert request dropped"),
            Some(Ok(false)) => {}
            Some(Ok(true)) => {
                self.unregister(&request);
                request.complete(None);
            }
            Some(Err(err)) => {
                debug!(key = ?request.key(), error = %err, "request failed");
                self.unregister(&request);
                request.complete(Some(err));
            }
        }

        if matches!(target, Target::Code(_)) {
            request.complete(None);
        }
        true
    }

    /// Fail the request registered under `id`, if any.
    pub(crate) fn fail(&self, id: i32, err: ClientError) -> bool {
        let request = self.tables.lock().by_id.remove(&id);
        match request {
            Some(request) => {
                request.complete(Some(err));
                true
            }
            None => false,
        }
    }

    /// Local cancellation: unregister and complete. Returns whether the
    /// request was still live.
    pub(crate) fn cancel(&self, request: &Arc<Request>, err: ClientError) -> bool {
        self.unregister(request);
        request.complete(Some(err))
    }

    /// Complete every pending request with `err` and leave both tables empty.
    pub(crate) fn teardown(&self, err: &ClientError) {
        let tables = std::mem::take(&mut *self.tables.lock());

        let pending = tables
            .by_id
            .into_values()
            .chain(tables.by_code.into_values().flatten());
        let mut count = 0usize;
        for request in pending {
            request.complete(Some(err.clone()));
            count += 1;
        }
        if count > 0 {
            debug!(count, error = %err, "pending requests torn down");
        }
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        let tables = self.tables.lock();
        tables.by_id.len() + tables.by_code.values().map(VecDeque::len).sum::<usize>()
    }
}

/// Return the current value and advance, wrapping `i32::MAX` to 1.
/// A counter still at 0 is left untouched and 0 is returned.
fn bump(counter: &AtomicI32) -> i32 {
    let mut current = counter.load(Ordering::Acquire);
    loop {
        if current == 0 {
            return 0;
        }
        let next = if current == i32::MAX { 1 } else { current + 1 };
        match counter.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return current,
            Err(actual) => current = actual,
        }
    }
}
