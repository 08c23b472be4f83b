use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use super::{BanRecord, NewBan, Storage, StorageError, UserRecord, Warning};

/// In-memory storage for tests and ephemeral runs.
///
/// Clones share the same state. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryStorageInner>>,
}

#[derive(Default)]
struct MemoryStorageInner {
    /// Bans keyed by id, so iteration is oldest first
    bans: BTreeMap<u64, BanRecord>,

    /// Warnings per IPID in issue order
    warnings: HashMap<String, Vec<Warning>>,

    users: HashMap<String, UserRecord>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bans ever recorded, lifted or not.
    pub fn ban_count(&self) -> usize {
        self.lock().bans.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStorageInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for MemoryStorage {
    fn add_ban(&self, ban: NewBan) -> Result<BanRecord, StorageError> {
        let mut inner = self.lock();
        let id = inner.bans.keys().next_back().map_or(1, |last| last + 1);
        let record = ban.into_record(id);
        inner.bans.insert(id, record.clone());
        Ok(record)
    }

    fn find_active_ban(
        &self,
        ipid: &str,
        hdid: &str,
        now_secs: u64,
    ) -> Result<Option<BanRecord>, StorageError> {
        Ok(self
            .lock()
            .bans
            .values()
            .rev()
            .find(|ban| ban.matches(ipid, hdid) && ban.is_active(now_secs))
            .cloned())
    }

    fn get_ban(&self, id: u64) -> Result<Option<BanRecord>, StorageError> {
        Ok(self.lock().bans.get(&id).cloned())
    }

    fn list_bans(&self, ipid: Option<&str>, limit: usize) -> Result<Vec<BanRecord>, StorageError> {
        Ok(self
            .lock()
            .bans
            .values()
            .rev()
            .filter(|ban| ipid.is_none_or(|ipid| ban.ipid == ipid))
            .take(limit)
            .cloned()
            .collect())
    }

    fn nullify_ban(&self, id: u64) -> Result<bool, StorageError> {
        Ok(self.lock().bans.get_mut(&id).map(|ban| ban.nullified = true).is_some())
    }

    fn add_warning(&self, warning: Warning) -> Result<usize, StorageError> {
        let mut inner = self.lock();
        let list = inner.warnings.entry(warning.ipid.clone()).or_default();
        list.push(warning);
        Ok(list.len())
    }

    fn warnings(&self, ipid: &str) -> Result<Vec<Warning>, StorageError> {
        Ok(self.lock().warnings.get(ipid).cloned().unwrap_or_default())
    }

    fn create_user(&self, user: UserRecord) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.users.contains_key(&user.username) {
            return Err(StorageError::AlreadyExists(user.username));
        }
        inner.users.insert(user.username.clone(), user);
        Ok(())
    }

    fn user(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.lock().users.get(username).cloned())
    }

    fn remove_user(&self, username: &str) -> Result<bool, StorageError> {
        Ok(self.lock().users.remove(username).is_some())
    }

    fn set_role(&self, username: &str, role: &str) -> Result<bool, StorageError> {
        Ok(self.lock().users.get_mut(username).map(|user| user.role = role.to_string()).is_some())
    }
}
