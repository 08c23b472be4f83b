//! Live client membership.
//!
//! Keyed by connection id rather than UID because a client is registered
//! before it has joined. Bulk iteration always goes through
//! [`ClientRegistry::snapshot`], a point-in-time copy taken under a short
//! read lock, so callers may send, close or look up other clients while
//! iterating without touching the lock again.

use std::{
    collections::HashMap,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use athena_core::Uid;

use crate::client::{Client, ClientId};

/// Concurrent set of connected clients.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<ClientId, Arc<Client>>>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh connection id.
    pub fn next_id(&self) -> ClientId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a client.
    pub fn add(&self, client: Arc<Client>) {
        self.clients.write().unwrap_or_else(PoisonError::into_inner).insert(client.id(), client);
    }

    /// Unregister a client. Returns `false` if it was not present.
    pub fn remove(&self, id: ClientId) -> bool {
        self.clients.write().unwrap_or_else(PoisonError::into_inner).remove(&id).is_some()
    }

    /// Point-in-time copy of every registered client.
    pub fn snapshot(&self) -> Vec<Arc<Client>> {
        self.clients.read().unwrap_or_else(PoisonError::into_inner).values().cloned().collect()
    }

    /// Joined clients only, in ascending UID order.
    pub fn joined(&self) -> Vec<Arc<Client>> {
        let mut joined: Vec<(Uid, Arc<Client>)> =
            self.snapshot().into_iter().filter_map(|c| c.uid().map(|uid| (uid, c))).collect();
        joined.sort_by_key(|(uid, _)| *uid);
        joined.into_iter().map(|(_, c)| c).collect()
    }

    /// Client holding `uid`.
    pub fn find_by_uid(&self, uid: Uid) -> Option<Arc<Client>> {
        self.snapshot().into_iter().find(|c| c.uid() == Some(uid))
    }

    /// Every client sharing `ipid`, joined or not.
    pub fn find_by_ipid(&self, ipid: &str) -> Vec<Arc<Client>> {
        self.snapshot().into_iter().filter(|c| c.ipid() == ipid).collect()
    }

    /// Joined clients in area `area`.
    pub fn in_area(&self, area: usize) -> Vec<Arc<Client>> {
        self.joined().into_iter().filter(|c| c.area() == area).collect()
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True if nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::client::{Limits, OUTBOUND_CAPACITY};

    fn client(registry: &ClientRegistry, ipid: &str) -> Arc<Client> {
        let (tx, _rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let limits = Limits {
            rate_limit: 0,
            rate_window: Duration::from_secs(1),
            modcall_cooldown: Duration::ZERO,
        };
        let client = Arc::new(Client::new(registry.next_id(), ipid.to_string(), Arc::from("Athena"), limits, tx));
        registry.add(Arc::clone(&client));
        client
    }

    #[test]
    fn snapshot_is_unaffected_by_later_changes() {
        let registry = ClientRegistry::new();
        let first = client(&registry, "ipid-a");
        let snapshot = registry.snapshot();

        client(&registry, "ipid-b");
        assert!(registry.remove(first.id()));
        assert!(!registry.remove(first.id()));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), first.id());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unjoined_clients_have_no_uid_lookup() {
        let registry = ClientRegistry::new();
        let waiting = client(&registry, "ipid-a");
        let joined = client(&registry, "ipid-b");
        joined.set_uid(0);

        assert!(waiting.uid().is_none());
        assert_eq!(registry.find_by_uid(0).map(|c| c.id()), Some(joined.id()));
        assert!(registry.find_by_uid(1).is_none());
        assert_eq!(registry.joined().len(), 1);
        assert_eq!(registry.in_area(0).len(), 1);
    }

    #[test]
    fn joined_is_sorted_by_uid() {
        let registry = ClientRegistry::new();
        for (ipid, uid) in [("ipid-a", 2), ("ipid-b", 0), ("ipid-c", 1)] {
            client(&registry, ipid).set_uid(uid);
        }
        let uids: Vec<_> = registry.joined().iter().filter_map(|c| c.uid()).collect();
        assert_eq!(uids, [0, 1, 2]);
    }

    #[test]
    fn ipid_lookup_includes_unjoined() {
        let registry = ClientRegistry::new();
        let a = client(&registry, "shared");
        let b = client(&registry, "shared");
        client(&registry, "other");
        b.set_uid(3);

        let mut ids: Vec<_> = registry.find_by_ipid("shared").iter().map(|c| c.id()).collect();
        ids.sort_unstable();
        assert_eq!(ids, [a.id(), b.id()]);
        assert!(registry.find_by_ipid("nobody").is_empty());
    }
}
