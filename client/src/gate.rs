//! Rolling-window request gate.
//!
//! Every dispatched request holds a [`Ticket`] stamped with its admission time.
//! A new request is admitted once fewer than `limit` tickets are outstanding, or
//! once the oldest outstanding ticket is at least one window old. Tickets are
//! removed when their request completes, success or failure.
//!
//! Admission returns a [`GatePermit`] that releases its ticket on drop, so a
//! caller cancelled mid-wait (for example by `tokio::time::timeout`) never
//! leaks capacity.
//!
//! There is no FIFO guarantee between callers waiting at the same time; only
//! the aggregate bound holds.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Length of the rolling rate-limit window.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// An outstanding request, identified by admission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    id: u64,
    issued_at: Instant,
}

impl Ticket {
    #[must_use]
    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }
}

#[derive(Debug)]
pub struct RateGate {
    /// `0` = unlimited.
    limit: usize,
    window: Duration,
    next_id: AtomicU64,
    /// Ordered by `issued_at`; pushes happen under the lock with a fresh timestamp.
    tickets: Mutex<VecDeque<Ticket>>,
}

impl RateGate {
    #[must_use]
    pub fn new(requests_per_minute: u32) -> Self {
        Self::with_window(requests_per_minute, RATE_WINDOW)
    }

    #[must_use]
    pub fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit as usize,
            window,
            next_id: AtomicU64::new(0),
            tickets: Mutex::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit as u32
    }

    #[must_use]
    pub fn is_unlimited(&self) -> bool {
        self.limit == 0
    }

    /// Tickets admitted (or waiting) and not yet released.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    /// Take a ticket, suspending while the window is full.
    ///
    /// The wait is recomputed after every sleep, since other callers may have
    /// been admitted or released in the meantime.
    pub async fn admit(&self) -> GatePermit<'_> {
        let permit = GatePermit {
            gate: self,
            ticket: self.push_ticket(),
            released: false,
        };

        if self.is_unlimited() {
            return permit;
        }

        while let Some(deadline) = self.throttle_deadline() {
            let wait = deadline.saturating_duration_since(Instant::now());
            tracing::warn!(
                wait_secs = wait.as_secs_f64(),
                limit = self.limit,
                "Rate limited; retrying in {:.2}s",
                wait.as_secs_f64()
            );
            tokio::time::sleep_until(deadline).await;
        }

        permit
    }

    /// Remove exactly one ticket. Returns false if it was already released.
    pub fn release(&self, ticket: Ticket) -> bool {
        let mut tickets = self.lock();
        match tickets.iter().position(|t| t.id == ticket.id) {
            Some(index) => {
                tickets.remove(index);
                true
            }
            None => false,
        }
    }

    fn push_ticket(&self) -> Ticket {
        let mut tickets = self.lock();
        let ticket = Ticket {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            issued_at: Instant::now(),
        };
        tickets.push_back(ticket);
        ticket
    }

    /// When the oldest ticket ages out, if the window is currently over the limit.
    fn throttle_deadline(&self) -> Option<Instant> {
        let tickets = self.lock();
        if tickets.len() <= self.limit {
            return None;
        }
        let deadline = tickets.front()?.issued_at + self.window;
        (deadline > Instant::now()).then_some(deadline)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Ticket>> {
        self.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scoped admission: releases its ticket exactly once, on [`GatePermit::release`]
/// or on drop.
#[derive(Debug)]
#[must_use = "dropping a permit releases its ticket immediately"]
pub struct GatePermit<'a> {
    gate: &'a RateGate,
    ticket: Ticket,
    released: bool,
}

impl GatePermit<'_> {
    #[must_use]
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.gate.release(self.ticket);
        }
    }
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        self.release_once();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn admits_up_to_limit_without_waiting() {
        let gate = RateGate::new(3);
        let start = Instant::now();

        let a = gate.admit().await;
        let b = gate.admit().await;
        let c = gate.admit().await;

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(gate.in_flight(), 3);
        drop((a, b, c));
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn over_limit_waits_until_oldest_ages_out() {
        let gate = RateGate::new(2);
        let start = Instant::now();

        let first = gate.admit().await;
        tokio::time::advance(Duration::from_secs(10)).await;
        let _second = gate.admit().await;

        let third = gate.admit().await;
        let waited = third.ticket().issued_at().elapsed();

        assert!(Instant::now() >= first.ticket().issued_at() + RATE_WINDOW);
        assert_eq!(start.elapsed(), RATE_WINDOW);
        assert_eq!(waited, Duration::from_secs(50));
    }

    #[tokio::test(start_paused = true)]
    async fn unlimited_never_waits() {
        let gate = RateGate::new(0);
        let start = Instant::now();

        let mut permits = Vec::new();
        for _ in 0..1_000 {
            permits.push(gate.admit().await);
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(gate.in_flight(), 1_000);
    }

    #[tokio::test(start_paused = true)]
    async fn released_tickets_free_capacity() {
        let gate = RateGate::new(1);
        let start = Instant::now();

        gate.admit().await.release();
        let _again = gate.admit().await;

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(gate.in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn release_removes_exactly_one_ticket() {
        let gate = RateGate::new(0);
        let a = gate.admit().await;
        let b = gate.admit().await;
        let ticket = a.ticket();

        assert!(gate.release(ticket));
        assert!(!gate.release(ticket));
        assert_eq!(gate.in_flight(), 1);

        // `a` must not remove `b`'s ticket when it drops.
        drop(a);
        assert_eq!(gate.in_flight(), 1);
        drop(b);
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_wait_releases_its_ticket() {
        let gate = RateGate::new(1);
        let _held = gate.admit().await;

        let timed_out = tokio::time::timeout(Duration::from_secs(5), gate.admit()).await;

        assert!(timed_out.is_err());
        assert_eq!(gate.in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn window_is_configurable() {
        let gate = RateGate::with_window(1, Duration::from_secs(2));
        let start = Instant::now();

        let _a = gate.admit().await;
        let _b = gate.admit().await;

        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }
}
