//! Message Reliability Protocol: tracks unacknowledged reliably-sent
//! messages and decides when to retransmit or give up.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use rand::Rng;

use matter_session::SessionParameters;
use matter_types::{ExchangeId, SessionId};

/// Random jitter added to each computed interval, to avoid lockstep
/// retransmits between peers that sent at the same moment.
pub const JITTER_MAX: Duration = Duration::from_millis(100);

/// Number of total transmission attempts (the original send plus
/// retransmits) before giving up on a message. Not part of a session's
/// negotiated [`SessionParameters`]; the core treats it as a fixed
/// property of MRP itself rather than something peers negotiate.
pub const MAX_TRANSMISSIONS: u8 = 5;

/// A reliably-sent message awaiting acknowledgement.
struct PendingMessage {
    payload: Vec<u8>,
    dest: SocketAddr,
    session_id: SessionId,
    exchange_id: ExchangeId,
    parameters: SessionParameters,
    attempts: u8,
    first_sent_at: Instant,
    next_retransmit_at: Instant,
}

/// The base retransmit interval for a message that has been pending
/// for `since_first_sent`: the session's active interval while the
/// peer is presumed active (within `session_active_threshold_ms` of
/// this message's first send), its idle interval afterward.
fn base_interval(parameters: SessionParameters, since_first_sent: Duration) -> Duration {
    if since_first_sent < Duration::from_millis(parameters.session_active_threshold_ms as u64) {
        Duration::from_millis(parameters.session_active_interval_ms as u64)
    } else {
        Duration::from_millis(parameters.session_idle_interval_ms as u64)
    }
}

fn backoff_interval(attempts: u8, base: Duration) -> Duration {
    let exponent = attempts.saturating_sub(1).min(4) as u32;
    let scaled = base * 2u32.saturating_pow(exponent);
    let jitter_ms = rand::thread_rng().gen_range(0..=JITTER_MAX.as_millis() as u64);
    scaled + Duration::from_millis(jitter_ms)
}

/// Per-session tracker of in-flight reliable messages, keyed by the
/// message counter they were sent under.
#[derive(Default)]
pub struct RetransmissionTracker {
    pending: HashMap<u32, PendingMessage>,
}

/// What the retransmit sweep decided to do with one pending message.
pub enum RetransmitOutcome {
    /// Resend this payload to this destination.
    Resend {
        payload: Vec<u8>,
        dest: SocketAddr,
        session_id: SessionId,
        exchange_id: ExchangeId,
        attempt: u8,
    },
    /// The message exhausted its retransmission budget.
    GiveUp { session_id: SessionId, exchange_id: ExchangeId },
}

impl RetransmissionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a freshly-sent reliable message, backing off
    /// against `parameters` — the negotiated timing of the session it
    /// was sent on — rather than a fixed interval.
    #[allow(clippy::too_many_arguments)]
    pub fn track(
        &mut self,
        message_counter: u32,
        payload: Vec<u8>,
        dest: SocketAddr,
        session_id: SessionId,
        exchange_id: ExchangeId,
        parameters: SessionParameters,
        now: Instant,
    ) {
        self.pending.insert(
            message_counter,
            PendingMessage {
                payload,
                dest,
                session_id,
                exchange_id,
                parameters,
                attempts: 1,
                first_sent_at: now,
                next_retransmit_at: now + backoff_interval(1, base_interval(parameters, Duration::ZERO)),
            },
        );
    }

    /// The peer acknowledged `message_counter`; stop tracking it.
    pub fn acknowledge(&mut self, message_counter: u32) {
        self.pending.remove(&message_counter);
    }

    pub fn is_pending(&self, message_counter: u32) -> bool {
        self.pending.contains_key(&message_counter)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// The earliest time any pending message is next due, for the
    /// retransmit loop to sleep until.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.next_retransmit_at).min()
    }

    /// Sweep pending messages whose deadline has passed, returning what
    /// should happen to each. Messages that give up are removed;
    /// messages that get resent have their attempt count and deadline
    /// advanced.
    pub fn sweep_due(&mut self, now: Instant) -> Vec<(u32, RetransmitOutcome)> {
        let due: Vec<u32> = self
            .pending
            .iter()
            .filter(|(_, p)| p.next_retransmit_at <= now)
            .map(|(counter, _)| *counter)
            .collect();

        let mut outcomes = Vec::with_capacity(due.len());
        for counter in due {
            let give_up = {
                let pending = self.pending.get(&counter).expect("just collected key");
                pending.attempts >= MAX_TRANSMISSIONS
            };
            if give_up {
                let pending = self.pending.remove(&counter).expect("just collected key");
                outcomes.push((
                    counter,
                    RetransmitOutcome::GiveUp {
                        session_id: pending.session_id,
                        exchange_id: pending.exchange_id,
                    },
                ));
            } else {
                let pending = self.pending.get_mut(&counter).expect("just collected key");
                pending.attempts += 1;
                let base = base_interval(pending.parameters, now.duration_since(pending.first_sent_at));
                pending.next_retransmit_at = now + backoff_interval(pending.attempts, base);
                outcomes.push((
                    counter,
                    RetransmitOutcome::Resend {
                        payload: pending.payload.clone(),
                        dest: pending.dest,
                        session_id: pending.session_id,
                        exchange_id: pending.exchange_id,
                        attempt: pending.attempts,
                    },
                ));
            }
        }
        outcomes
    }

    /// Age of the oldest still-pending message, if any.
    pub fn oldest_age(&self, now: Instant) -> Option<Duration> {
        self.pending.values().map(|p| now.duration_since(p.first_sent_at)).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:1234".parse().unwrap()
    }

    // Matches `SessionParameters::default().session_active_interval_ms`,
    // the base interval these tests exercise via the default parameters.
    const BASE_RETRANSMIT_INTERVAL: Duration = Duration::from_millis(300);

    #[test]
    fn tracked_message_is_pending() {
        let mut tracker = RetransmissionTracker::new();
        tracker.track(1, b"hello".to_vec(), addr(), SessionId(1), ExchangeId(1), SessionParameters::default(), Instant::now());
        assert!(tracker.is_pending(1));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn acknowledge_clears_pending() {
        let mut tracker = RetransmissionTracker::new();
        tracker.track(1, b"hello".to_vec(), addr(), SessionId(1), ExchangeId(1), SessionParameters::default(), Instant::now());
        tracker.acknowledge(1);
        assert!(!tracker.is_pending(1));
        assert!(tracker.is_empty());
    }

    #[test]
    fn sweep_before_deadline_yields_nothing() {
        let mut tracker = RetransmissionTracker::new();
        let now = Instant::now();
        tracker.track(1, b"hello".to_vec(), addr(), SessionId(1), ExchangeId(1), SessionParameters::default(), now);
        assert!(tracker.sweep_due(now).is_empty());
    }

    #[test]
    fn sweep_after_deadline_resends_and_advances_attempts() {
        let mut tracker = RetransmissionTracker::new();
        let now = Instant::now();
        tracker.track(1, b"hello".to_vec(), addr(), SessionId(1), ExchangeId(1), SessionParameters::default(), now);

        let later = now + BASE_RETRANSMIT_INTERVAL + JITTER_MAX + Duration::from_millis(1);
        let outcomes = tracker.sweep_due(later);
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0].1, RetransmitOutcome::Resend { attempt: 2, .. }));
        assert!(tracker.is_pending(1));
    }

    #[test]
    fn exhausting_attempts_gives_up_and_stops_tracking() {
        let mut tracker = RetransmissionTracker::new();
        let mut now = Instant::now();
        tracker.track(1, b"hello".to_vec(), addr(), SessionId(1), ExchangeId(1), SessionParameters::default(), now);

        for _ in 0..(MAX_TRANSMISSIONS - 1) {
            now += BASE_RETRANSMIT_INTERVAL + JITTER_MAX + Duration::from_millis(1);
            let outcomes = tracker.sweep_due(now);
            assert!(matches!(outcomes[0].1, RetransmitOutcome::Resend { .. }));
        }

        now += BASE_RETRANSMIT_INTERVAL + JITTER_MAX + Duration::from_millis(1);
        let outcomes = tracker.sweep_due(now);
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0].1, RetransmitOutcome::GiveUp { .. }));
        assert!(!tracker.is_pending(1));
    }

    #[test]
    fn idle_session_backs_off_with_the_idle_interval() {
        let mut tracker = RetransmissionTracker::new();
        let now = Instant::now();
        let parameters = SessionParameters {
            session_idle_interval_ms: 5_000,
            session_active_interval_ms: 300,
            session_active_threshold_ms: 100,
        };
        tracker.track(1, b"hello".to_vec(), addr(), SessionId(1), ExchangeId(1), parameters, now);

        // First retransmit lands after the active threshold has long
        // since elapsed, so it should back off using the idle interval
        // rather than the (much shorter) active one.
        let later = now + Duration::from_secs(5);
        let outcomes = tracker.sweep_due(later);
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0].1, RetransmitOutcome::Resend { .. }));

        let pending_deadline = tracker.next_deadline().expect("still pending");
        assert!(pending_deadline >= later + Duration::from_millis(parameters.session_idle_interval_ms as u64));
    }
}
