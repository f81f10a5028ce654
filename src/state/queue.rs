//! Client-side replica of the patient queue.
//!
//! DESIGN
//! ======
//! Entries and stats are server-owned. The replica is replaced wholesale from
//! a consistent snapshot (never merged), except for transient optimistic
//! removals. An attended ticket is held out of incoming snapshots while its
//! call is in flight and afterwards until a fetch that began after the call
//! resolved has been applied. Older snapshots may still list it.
//!
//! Error scopes are kept apart on purpose: `error` is the global fetch banner,
//! `row_errors` belong to one ticket, and the resolve dialog carries its own.

#[cfg(test)]
#[path = "queue_test.rs"]
mod queue_test;

use std::collections::{BTreeMap, BTreeSet};

use crate::net::types::{QueueEntry, QueueStats};

/// Open "resolve with diagnosis" dialog for one ticket.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolveDialog {
    pub ticket: String,
    pub diagnosis: String,
    pub submitting: bool,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueueState {
    /// Server order, minus optimistic removals.
    pub entries: Vec<QueueEntry>,
    pub stats: QueueStats,
    /// True until the first fetch completes (success or failure).
    pub initial_loading: bool,
    /// True while any fetch is in flight.
    pub refreshing: bool,
    /// Global fetch error; cleared by the next successful fetch.
    pub error: Option<String>,
    /// Action failures keyed by ticket. Pruned when a ticket leaves the queue.
    pub row_errors: BTreeMap<String, String>,
    /// Attended tickets hidden from snapshots, keyed to the first fetch
    /// sequence number allowed to show them again. `u64::MAX` while the
    /// attend call is still in flight.
    pub pending_removals: BTreeMap<String, u64>,
    pub resolve: Option<ResolveDialog>,
    /// Bumped on every visible change.
    pub revision: u64,
}

impl QueueState {
    /// Fresh state for a newly mounted view.
    #[must_use]
    pub fn loading() -> Self {
        Self { initial_loading: true, ..Self::default() }
    }

    pub(crate) fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Replace entries and stats from one snapshot.
    pub fn apply_snapshot(&mut self, entries: Vec<QueueEntry>, stats: QueueStats) {
        let listed: BTreeSet<&str> = entries.iter().map(|entry| entry.ticket.as_str()).collect();
        self.row_errors.retain(|ticket, _| listed.contains(ticket.as_str()));
        self.entries = entries
            .into_iter()
            .filter(|entry| !self.pending_removals.contains_key(&entry.ticket))
            .collect();
        self.stats = stats;
        self.error = None;
        self.initial_loading = false;
        self.touch();
    }

    /// Hide `ticket` from snapshots until [`QueueState::release_removal_from`]
    /// and [`QueueState::release_pending`] let it through.
    pub fn hold_removal(&mut self, ticket: &str) {
        self.pending_removals.insert(ticket.to_owned(), u64::MAX);
    }

    /// The attend call resolved: snapshots from fetch `seq` onward are
    /// authoritative for `ticket`.
    pub fn release_removal_from(&mut self, ticket: &str, seq: u64) {
        if let Some(release) = self.pending_removals.get_mut(ticket) {
            *release = seq;
        }
    }

    /// Drop every hold the fetch numbered `seq` is allowed to see past.
    /// Call before applying that fetch's snapshot.
    pub fn release_pending(&mut self, seq: u64) {
        self.pending_removals.retain(|_, release| *release > seq);
    }

    /// Abandon a hold outright, e.g. when the attend call was never made.
    pub fn drop_removal(&mut self, ticket: &str) {
        self.pending_removals.remove(ticket);
    }

    pub fn record_fetch_error(&mut self, message: String) {
        self.error = Some(message);
        self.initial_loading = false;
        self.touch();
    }

    /// Drop one ticket from the local replica.
    pub fn remove_entry(&mut self, ticket: &str) -> Option<QueueEntry> {
        let index = self.entries.iter().position(|entry| entry.ticket == ticket)?;
        let removed = self.entries.remove(index);
        self.touch();
        Some(removed)
    }

    #[must_use]
    pub fn contains(&self, ticket: &str) -> bool {
        self.entries.iter().any(|entry| entry.ticket == ticket)
    }

    /// Display order: most severe first, then longest wait, then ticket.
    #[must_use]
    pub fn sorted_entries(&self) -> Vec<&QueueEntry> {
        let mut sorted: Vec<&QueueEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.wait_minutes.cmp(&a.wait_minutes))
                .then_with(|| a.ticket.cmp(&b.ticket))
        });
        sorted
    }

    #[must_use]
    pub fn row_error(&self, ticket: &str) -> Option<&str> {
        self.row_errors.get(ticket).map(String::as_str)
    }
}
