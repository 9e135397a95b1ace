//! FIFO concurrency-limited slot allocation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum QueueError {
    /// The queue has been closed and no longer admits new requests.
    #[error("interaction queue is closed")]
    Closed,
    /// The waiter's cancellation token fired before a slot was granted,
    /// or the queue was cleared while this request was still waiting.
    #[error("request cancelled before a slot was granted")]
    Cancelled,
}

struct Waiter {
    id: u64,
    grant: oneshot::Sender<bool>,
}

struct State {
    running: usize,
    waiters: VecDeque<Waiter>,
    closed: bool,
}

/// A bounded FIFO queue of concurrent "slots". At most `capacity`
/// callers hold a [`Slot`] at once; everyone else waits in arrival
/// order until one is released.
pub struct InteractionQueue {
    capacity: usize,
    state: Mutex<State>,
    waiting_count: AtomicUsize,
    next_waiter_id: AtomicU64,
}

impl InteractionQueue {
    pub fn new(capacity: usize) -> Arc<Self> {
        assert!(capacity > 0, "a zero-capacity queue could never grant a slot");
        Arc::new(Self {
            capacity,
            state: Mutex::new(State {
                running: 0,
                waiters: VecDeque::new(),
                closed: false,
            }),
            waiting_count: AtomicUsize::new(0),
            next_waiter_id: AtomicU64::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held.
    pub fn running(&self) -> usize {
        self.state.lock().expect("queue mutex poisoned").running
    }

    /// Requests currently waiting for a slot.
    pub fn waiting(&self) -> usize {
        self.waiting_count.load(Ordering::SeqCst)
    }

    /// Wait for a slot, honoring FIFO arrival order among waiters.
    /// Returns immediately if under capacity. `cancel` lets the caller
    /// give up while still queued (e.g. on its own request timeout)
    /// without disturbing anyone ahead of it in line.
    pub async fn obtain_slot(self: &Arc<Self>, cancel: CancellationToken) -> Result<Slot, QueueError> {
        let queued = {
            let mut state = self.state.lock().expect("queue mutex poisoned");
            if state.closed {
                return Err(QueueError::Closed);
            }
            if state.running < self.capacity {
                state.running += 1;
                None
            } else {
                let (tx, rx) = oneshot::channel();
                let id = self.next_waiter_id.fetch_add(1, Ordering::SeqCst);
                state.waiters.push_back(Waiter { id, grant: tx });
                self.waiting_count.fetch_add(1, Ordering::SeqCst);
                Some((id, rx))
            }
        };

        if let Some((id, mut rx)) = queued {
            let granted = tokio::select! {
                biased;
                res = &mut rx => matches!(res, Ok(true)),
                _ = cancel.cancelled() => {
                    // Remove ourselves from the queue before anyone can
                    // grant us the slot; if we're no longer there, a
                    // grant already landed (or clear()/close() already
                    // rejected us) and the oneshot carries the answer.
                    let mut state = self.state.lock().expect("queue mutex poisoned");
                    if let Some(pos) = state.waiters.iter().position(|w| w.id == id) {
                        state.waiters.remove(pos);
                        drop(state);
                        false
                    } else {
                        drop(state);
                        matches!(rx.try_recv(), Ok(true))
                    }
                }
            };
            self.waiting_count.fetch_sub(1, Ordering::SeqCst);
            if !granted {
                return Err(QueueError::Cancelled);
            }
        }

        Ok(Slot {
            queue: self.clone(),
            released: false,
        })
    }

    /// Release one slot, handing it directly to the oldest waiter if
    /// any, or returning it to the free pool otherwise.
    fn release(&self) {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        if let Some(waiter) = state.waiters.pop_front() {
            // Ownership of the slot transfers to the waiter; `running`
            // is unchanged.
            let _ = waiter.grant.send(true);
        } else {
            state.running = state.running.saturating_sub(1);
        }
    }

    /// Cancel every currently-queued waiter without affecting slots
    /// already held. Distinct from [`InteractionQueue::close`]: the
    /// queue keeps accepting new requests afterward.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        for waiter in state.waiters.drain(..) {
            let _ = waiter.grant.send(false);
        }
    }

    /// Stop admitting new requests and cancel every queued waiter.
    /// Slots already held remain valid until released.
    pub fn close(&self) {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        state.closed = true;
        for waiter in state.waiters.drain(..) {
            let _ = waiter.grant.send(false);
        }
    }
}

/// A held concurrency slot. Releases exactly once, either explicitly
/// via [`Slot::release`] or on drop.
pub struct Slot {
    queue: Arc<InteractionQueue>,
    released: bool,
}

impl Slot {
    /// Release this slot now instead of waiting for drop.
    pub fn release(mut self) {
        self.released = true;
        self.queue.release();
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            self.queue.release();
        }
    }
}
