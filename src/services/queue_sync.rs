//! Queue synchronizer: polling, optimistic actions and reconciliation.
//!
//! DESIGN
//! ======
//! Single-threaded cooperative model: state lives in `Rc<RefCell<_>>` and all
//! background work is spawned with `tokio::task::spawn_local`, so callers must
//! run inside a `LocalSet`. Network calls are the only suspension points and
//! no `RefCell` borrow is ever held across one.
//!
//! Fetches pull `/patients` and `/stats` together and apply them only when
//! both succeed. Every fetch takes a sequence number; a result older than the
//! last applied one is dropped, so a slow poll cannot overwrite a newer
//! reconciliation. Timer ticks are skipped while any fetch is in flight.
//!
//! Optimistic attend is a two-phase local transaction: remove locally, call
//! the service, then re-fetch unconditionally so the replica converges on
//! server truth whether or not the call succeeded. The ticket stays hidden
//! from snapshots until a fetch numbered after the call resolved is applied.
//!
//! LIFECYCLE
//! =========
//! `start` returns a [`PollHandle`]; cancelling (or dropping) it stops the
//! timer and marks the view inactive. In-flight calls are left to finish, but
//! their results are discarded.

#[cfg(test)]
#[path = "queue_sync_test.rs"]
mod queue_sync_test;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::net::api;
use crate::net::gateway::{Gateway, GatewayError};
use crate::state::queue::{QueueState, ResolveDialog};
use crate::util::auth::AuthExpiry;

/// Default cadence between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Shown in the resolve dialog when confirming without a diagnosis.
pub const EMPTY_DIAGNOSIS_MESSAGE: &str = "enter a final diagnosis before confirming";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchKind {
    /// First load after mount.
    Initial,
    /// Timer-driven; skipped while another fetch is in flight.
    Poll,
    /// Follows an operator action.
    Reconcile,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// Poll tick suppressed by an in-flight fetch.
    Skipped,
    /// A newer fetch already landed.
    Stale,
    /// The view was torn down or halted.
    Inactive,
    Failed(String),
    AuthExpired,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    Done,
    Failed(String),
    /// Refused locally without a network call.
    Rejected(String),
    AuthExpired,
    Inactive,
}

struct SyncInner {
    gateway: Gateway,
    expiry: AuthExpiry,
    state: RefCell<QueueState>,
    in_flight: Cell<usize>,
    next_seq: Cell<u64>,
    applied_seq: Cell<u64>,
    active: Cell<bool>,
    halted: Cell<bool>,
}

/// Shared handle; clones drive the same replica.
#[derive(Clone)]
pub struct QueueSynchronizer {
    inner: Rc<SyncInner>,
}

impl QueueSynchronizer {
    pub fn new(gateway: Gateway, expiry: AuthExpiry) -> Self {
        Self {
            inner: Rc::new(SyncInner {
                gateway,
                expiry,
                state: RefCell::new(QueueState::loading()),
                in_flight: Cell::new(0),
                next_seq: Cell::new(0),
                applied_seq: Cell::new(0),
                active: Cell::new(true),
                halted: Cell::new(false),
            }),
        }
    }

    /// Create and start in one step. Must run inside a `LocalSet`.
    pub fn mount(gateway: Gateway, expiry: AuthExpiry, period: Duration) -> (Self, PollHandle) {
        let sync = Self::new(gateway, expiry);
        let handle = sync.start(period);
        (sync, handle)
    }

    /// Kick off the initial load and the polling timer.
    ///
    /// Must run inside a `LocalSet`.
    pub fn start(&self, period: Duration) -> PollHandle {
        if let Ok(seq) = self.begin_fetch(FetchKind::Initial) {
            let this = self.clone();
            tokio::task::spawn_local(async move {
                this.run_fetch(seq).await;
            });
        }

        let this = self.clone();
        let task = tokio::task::spawn_local(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !this.is_live() {
                    break;
                }
                this.tick();
            }
            debug!("queue poll loop stopped");
        });

        PollHandle { abort: task.abort_handle(), inner: self.inner.clone() }
    }

    // -------------------------------------------------------------------------
    // Observation
    // -------------------------------------------------------------------------

    /// Read the replica without cloning it.
    pub fn with_state<R>(&self, f: impl FnOnce(&QueueState) -> R) -> R {
        f(&self.inner.state.borrow())
    }

    #[must_use]
    pub fn snapshot(&self) -> QueueState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn contains(&self, ticket: &str) -> bool {
        self.inner.state.borrow().contains(ticket)
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.inner.state.borrow().revision
    }

    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.inner.in_flight.get() > 0
    }

    /// Still mounted and not halted by an auth expiry.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.inner.active.get() && !self.inner.halted.get()
    }

    /// Clear the global error banner.
    pub fn dismiss_error(&self) {
        let mut state = self.inner.state.borrow_mut();
        if state.error.take().is_some() {
            state.touch();
        }
    }

    // -------------------------------------------------------------------------
    // Fetching
    // -------------------------------------------------------------------------

    /// Handle one timer tick: start a poll unless a fetch is already running.
    ///
    /// Returns whether a poll was started. Must run inside a `LocalSet`.
    pub fn tick(&self) -> bool {
        let Ok(seq) = self.begin_fetch(FetchKind::Poll) else {
            return false;
        };
        let this = self.clone();
        tokio::task::spawn_local(async move {
            this.run_fetch(seq).await;
        });
        true
    }

    /// Fetch entries and stats and apply them if both succeed.
    pub async fn refresh(&self, kind: FetchKind) -> FetchOutcome {
        match self.begin_fetch(kind) {
            Ok(seq) => self.run_fetch(seq).await,
            Err(outcome) => outcome,
        }
    }

    /// Reserve a fetch slot synchronously so a tick cannot slip in between.
    fn begin_fetch(&self, kind: FetchKind) -> Result<u64, FetchOutcome> {
        let inner = &self.inner;
        if !self.is_live() {
            return Err(FetchOutcome::Inactive);
        }
        if kind == FetchKind::Poll && inner.in_flight.get() > 0 {
            debug!("poll tick skipped; fetch already in flight");
            return Err(FetchOutcome::Skipped);
        }
        let seq = inner.next_seq.get() + 1;
        inner.next_seq.set(seq);
        inner.in_flight.set(inner.in_flight.get() + 1);
        let mut state = inner.state.borrow_mut();
        if !state.refreshing {
            state.refreshing = true;
            state.touch();
        }
        debug!(seq, kind = ?kind, "queue fetch started");
        Ok(seq)
    }

    async fn run_fetch(&self, seq: u64) -> FetchOutcome {
        let inner = &self.inner;
        let (entries, stats) = tokio::join!(api::list_patients(&inner.gateway), api::fetch_stats(&inner.gateway));
        inner.in_flight.set(inner.in_flight.get().saturating_sub(1));

        if !inner.active.get() {
            debug!(seq, "discarding queue fetch after teardown");
            return FetchOutcome::Inactive;
        }

        {
            let mut state = inner.state.borrow_mut();
            let still_refreshing = inner.in_flight.get() > 0;
            if state.refreshing != still_refreshing {
                state.refreshing = still_refreshing;
                state.touch();
            }
        }

        match (entries, stats) {
            (Err(GatewayError::AuthExpired), _) | (_, Err(GatewayError::AuthExpired)) => {
                self.expire();
                FetchOutcome::AuthExpired
            }
            _ if seq <= inner.applied_seq.get() => {
                debug!(seq, applied = inner.applied_seq.get(), "dropping stale queue fetch");
                FetchOutcome::Stale
            }
            (Ok(entries), Ok(stats)) => {
                inner.applied_seq.set(seq);
                let mut state = inner.state.borrow_mut();
                state.release_pending(seq);
                state.apply_snapshot(entries, stats);
                FetchOutcome::Applied
            }
            (Err(err), _) | (_, Err(err)) => {
                inner.applied_seq.set(seq);
                let message = err.to_string();
                warn!(seq, error = %message, "queue fetch failed");
                inner.state.borrow_mut().record_fetch_error(message.clone());
                FetchOutcome::Failed(message)
            }
        }
    }

    fn expire(&self) {
        self.inner.halted.set(true);
        self.inner.expiry.trigger();
    }

    // -------------------------------------------------------------------------
    // Attend (optimistic)
    // -------------------------------------------------------------------------

    /// Remove `ticket` locally right now, then return the future that calls
    /// the service and reconciles.
    ///
    /// The local removal happens before this returns, so it is visible before
    /// the call is even issued. Dropping the future unpolled releases the
    /// hold, so the next snapshot brings the row back.
    #[must_use = "the attend call is only sent when the returned future is awaited or spawned"]
    pub fn attend(&self, ticket: &str) -> impl Future<Output = ActionOutcome> + 'static {
        let this = self.clone();
        let ticket = ticket.to_owned();
        let hold = self.is_live().then(|| {
            let mut state = self.inner.state.borrow_mut();
            state.remove_entry(&ticket);
            state.row_errors.remove(&ticket);
            state.hold_removal(&ticket);
            state.touch();
            RemovalHold { inner: self.inner.clone(), ticket: ticket.clone(), settled: false }
        });

        async move {
            let Some(hold) = hold else {
                return ActionOutcome::Inactive;
            };
            let result = api::attend(&this.inner.gateway, &ticket).await;
            // Fetches already numbered may carry pre-attend snapshots.
            hold.settle(this.inner.next_seq.get() + 1);

            if !this.inner.active.get() {
                return ActionOutcome::Inactive;
            }
            let outcome = match result {
                Ok(()) => {
                    info!(ticket = %ticket, "patient attended");
                    ActionOutcome::Done
                }
                Err(GatewayError::AuthExpired) => {
                    this.expire();
                    return ActionOutcome::AuthExpired;
                }
                Err(err) => {
                    let message = err.to_string();
                    warn!(ticket = %ticket, error = %message, "attend failed");
                    let mut state = this.inner.state.borrow_mut();
                    state.row_errors.insert(ticket.clone(), message.clone());
                    state.touch();
                    ActionOutcome::Failed(message)
                }
            };

            this.refresh(FetchKind::Reconcile).await;
            outcome
        }
    }

    // -------------------------------------------------------------------------
    // Resolve with diagnosis
    // -------------------------------------------------------------------------

    pub fn open_resolve(&self, ticket: &str) {
        let mut state = self.inner.state.borrow_mut();
        state.resolve = Some(ResolveDialog { ticket: ticket.to_owned(), ..ResolveDialog::default() });
        state.touch();
    }

    /// Update the dialog's diagnosis text. Ignored while a call is in flight.
    pub fn set_diagnosis(&self, text: &str) {
        let mut state = self.inner.state.borrow_mut();
        let Some(dialog) = state.resolve.as_mut() else {
            return;
        };
        if dialog.submitting {
            return;
        }
        dialog.diagnosis = text.to_owned();
        state.touch();
    }

    pub fn cancel_resolve(&self) {
        let mut state = self.inner.state.borrow_mut();
        if state.resolve.take().is_some() {
            state.touch();
        }
    }

    /// Send the open dialog's diagnosis.
    ///
    /// The entry is removed only after the service confirms. On failure the
    /// dialog stays open with its text and an error so the operator can retry.
    pub async fn confirm_resolve(&self) -> ActionOutcome {
        if !self.is_live() {
            return ActionOutcome::Inactive;
        }
        let (ticket, diagnosis) = {
            let mut state = self.inner.state.borrow_mut();
            let Some(dialog) = state.resolve.as_mut() else {
                return ActionOutcome::Rejected("no resolve dialog is open".to_owned());
            };
            if dialog.submitting {
                return ActionOutcome::Rejected("resolve already in progress".to_owned());
            }
            let diagnosis = dialog.diagnosis.trim().to_owned();
            if diagnosis.is_empty() {
                dialog.error = Some(EMPTY_DIAGNOSIS_MESSAGE.to_owned());
                state.touch();
                return ActionOutcome::Rejected(EMPTY_DIAGNOSIS_MESSAGE.to_owned());
            }
            dialog.submitting = true;
            dialog.error = None;
            let ticket = dialog.ticket.clone();
            state.touch();
            (ticket, diagnosis)
        };

        let result = api::resolve(&self.inner.gateway, &ticket, &diagnosis).await;
        if !self.inner.active.get() {
            return ActionOutcome::Inactive;
        }

        match result {
            Ok(()) => {
                info!(ticket = %ticket, "patient resolved");
                {
                    let mut state = self.inner.state.borrow_mut();
                    state.remove_entry(&ticket);
                    if state.resolve.as_ref().is_some_and(|d| d.ticket == ticket) {
                        state.resolve = None;
                    }
                    state.touch();
                }
                self.refresh(FetchKind::Reconcile).await;
                ActionOutcome::Done
            }
            Err(GatewayError::AuthExpired) => {
                self.expire();
                ActionOutcome::AuthExpired
            }
            Err(err) => {
                let message = err.to_string();
                warn!(ticket = %ticket, error = %message, "resolve failed");
                let mut state = self.inner.state.borrow_mut();
                if let Some(dialog) = state.resolve.as_mut().filter(|d| d.ticket == ticket) {
                    dialog.submitting = false;
                    dialog.error = Some(message.clone());
                }
                state.touch();
                ActionOutcome::Failed(message)
            }
        }
    }
}

/// Optimistic-removal mark owned by one attend future.
struct RemovalHold {
    inner: Rc<SyncInner>,
    ticket: String,
    settled: bool,
}

impl RemovalHold {
    /// The call resolved; let fetches numbered `seq` or later show the ticket.
    fn settle(mut self, seq: u64) {
        self.settled = true;
        self.inner.state.borrow_mut().release_removal_from(&self.ticket, seq);
    }
}

impl Drop for RemovalHold {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        match self.inner.state.try_borrow_mut() {
            Ok(mut state) => {
                debug!(ticket = %self.ticket, "attend abandoned before completion");
                state.drop_removal(&self.ticket);
            }
            Err(_) => warn!(ticket = %self.ticket, "could not release abandoned attend hold"),
        }
    }
}

/// Cancellation handle for a started synchronizer.
pub struct PollHandle {
    abort: AbortHandle,
    inner: Rc<SyncInner>,
}

impl PollHandle {
    /// Stop the timer and mark the view inactive. Idempotent.
    pub fn cancel(&self) {
        if self.inner.active.replace(false) {
            debug!("queue synchronizer torn down");
        }
        self.abort.abort();
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
