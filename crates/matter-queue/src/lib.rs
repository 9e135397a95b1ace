//! # matter-queue
//!
//! A bounded, FIFO-fair concurrency limiter for remote interactions:
//! [`InteractionQueue`] caps how many requests a node has outstanding
//! against a given peer at once, queuing the rest in arrival order and
//! releasing exactly one waiter per completed slot.
//!
//! This sits above the exchange/session layers: it doesn't know about
//! messages or protocols, only about how many concurrent operations are
//! allowed to be in flight. A caller wraps each outgoing interaction
//! with [`InteractionQueue::obtain_slot`] before opening the exchange
//! that actually carries it.

mod queue;

pub use queue::{InteractionQueue, QueueError, Slot};
