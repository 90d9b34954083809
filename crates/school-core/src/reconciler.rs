// ── Notification reconciler ──
//
// Merges the one-time snapshot fetch and the live push stream into one
// newest-first, id-unique collection. Every mutation rebuilds the
// snapshot that subscribers receive through a `watch` channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use tokio::sync::watch;
use tracing::{debug, trace};

use school_api::InboundMessage;

use crate::model::{Notification, NotificationId};
use crate::stream::NotificationStream;

/// Point-in-time view of the collection, newest first.
pub type NotificationSnapshot = Arc<Vec<Arc<Notification>>>;

/// Owner of the notification collection.
///
/// Insertion order of the inner map *is* display order: index 0 is the
/// newest entry. Ids are unique. The unread count is always derived from
/// the entries, never cached.
pub struct NotificationReconciler {
    entries: Mutex<IndexMap<NotificationId, Notification>>,
    snapshot: watch::Sender<NotificationSnapshot>,
}

impl NotificationReconciler {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            entries: Mutex::new(IndexMap::new()),
            snapshot,
        }
    }

    /// Replace the collection wholesale with a snapshot (newest first).
    ///
    /// If the snapshot repeats an id, the first occurrence wins.
    pub fn initialize(&self, snapshot: impl IntoIterator<Item = Notification>) {
        let mut fresh = IndexMap::new();
        for notification in snapshot {
            fresh
                .entry(notification.id.clone())
                .or_insert(notification);
        }

        let mut entries = self.lock();
        *entries = fresh;
        debug!(count = entries.len(), "notification snapshot applied");
        self.publish(&entries);
    }

    /// Prepend a pushed notification. Returns `false` if its id is already
    /// present (redelivery after a reconnect); the existing entry is kept.
    pub fn on_push(&self, notification: Notification) -> bool {
        let mut entries = self.lock();
        if entries.contains_key(&notification.id) {
            trace!(id = %notification.id, "duplicate push ignored");
            return false;
        }
        debug!(id = %notification.id, "notification pushed");
        entries.shift_insert(0, notification.id.clone(), notification);
        self.publish(&entries);
        true
    }

    /// Route a socket frame. Non-notification frames, and notification
    /// frames without an id, are ignored.
    pub fn apply_message(&self, message: &InboundMessage) -> bool {
        match Notification::from_push(message) {
            Some(notification) => self.on_push(notification),
            None => {
                trace!(kind = ?message.kind, "frame ignored by reconciler");
                false
            }
        }
    }

    /// Mark one entry read. Unknown ids are a no-op. Returns `true` if the
    /// entry existed and was unread.
    pub fn mark_read(&self, id: &NotificationId) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(id) else {
            debug!(%id, "mark_read for unknown notification");
            return false;
        };
        if entry.read {
            return false;
        }
        entry.read = true;
        self.publish(&entries);
        true
    }

    /// Mark every entry read. Returns how many flipped.
    pub fn mark_all_read(&self) -> usize {
        let mut entries = self.lock();
        let mut flipped = 0;
        for entry in entries.values_mut().filter(|n| !n.read) {
            entry.read = true;
            flipped += 1;
        }
        if flipped > 0 {
            self.publish(&entries);
        }
        flipped
    }

    /// Number of entries with `read == false`.
    pub fn unread_count(&self) -> usize {
        self.lock().values().filter(|n| !n.read).count()
    }

    pub fn get(&self, id: &NotificationId) -> Option<Notification> {
        self.lock().get(id).cloned()
    }

    /// Current collection (cheap `Arc` clone).
    pub fn snapshot(&self) -> NotificationSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to collection changes.
    pub fn subscribe(&self) -> NotificationStream {
        NotificationStream::new(self.snapshot.subscribe())
    }

    /// Drop every entry (session ended).
    pub fn clear(&self) {
        let mut entries = self.lock();
        if entries.is_empty() {
            return;
        }
        entries.clear();
        self.publish(&entries);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Rebuild the snapshot while the entry lock is held, so snapshots are
    /// published in mutation order.
    fn publish(&self, entries: &IndexMap<NotificationId, Notification>) {
        let values: Vec<Arc<Notification>> = entries.values().cloned().map(Arc::new).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<NotificationId, Notification>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for NotificationReconciler {
    fn default() -> Self {
        Self::new()
    }
}
