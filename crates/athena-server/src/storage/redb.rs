//! Redb-backed durable storage.
//!
//! Every record is CBOR-encoded. Each write is its own transaction, so a
//! crash loses at most the call in flight.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition};
use serde::{Serialize, de::DeserializeOwned};

use super::{BanRecord, NewBan, Storage, StorageError, UserRecord, Warning};

type Table = TableDefinition<'static, &'static [u8], &'static [u8]>;

/// Table: bans
/// Key: ban id as big-endian bytes [8 bytes]
/// Value: CBOR-encoded `BanRecord`
const BANS: Table = TableDefinition::new("bans");

/// Table: warnings
/// Key: IPID bytes
/// Value: CBOR-encoded `Vec<Warning>`
const WARNINGS: Table = TableDefinition::new("warnings");

/// Table: users
/// Key: username bytes
/// Value: CBOR-encoded `UserRecord`
const USERS: Table = TableDefinition::new("users");

/// Durable storage backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open or create a database at `path`, creating missing tables.
    ///
    /// # Errors
    ///
    /// `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        let txn = db.begin_write().map_err(io)?;
        {
            let _ = txn.open_table(BANS).map_err(io)?;
            let _ = txn.open_table(WARNINGS).map_err(io)?;
            let _ = txn.open_table(USERS).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn scan_bans(
        &self,
        mut keep: impl FnMut(&BanRecord) -> bool,
        limit: usize,
    ) -> Result<Vec<BanRecord>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(BANS).map_err(io)?;

        let mut found = Vec::new();
        for entry in table.iter().map_err(io)?.rev() {
            if found.len() >= limit {
                break;
            }
            let (_, value) = entry.map_err(io)?;
            let ban: BanRecord = decode(value.value())?;
            if keep(&ban) {
                found.push(ban);
            }
        }
        Ok(found)
    }

    fn load<T: DeserializeOwned>(
        &self,
        table: Table,
        key: &[u8],
    ) -> Result<Option<T>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(table).map_err(io)?;
        match table.get(key).map_err(io)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Read-modify-write a single record inside one transaction.
    ///
    /// `update` returns the new value to store, or `None` to leave the key
    /// untouched. The second tuple element is passed back to the caller.
    fn modify<T, R>(
        &self,
        table: Table,
        key: &[u8],
        update: impl FnOnce(Option<T>) -> (Option<T>, R),
    ) -> Result<R, StorageError>
    where
        T: Serialize + DeserializeOwned,
    {
        let txn = self.db.begin_write().map_err(io)?;
        let result = {
            let mut table = txn.open_table(table).map_err(io)?;
            let current = match table.get(key).map_err(io)? {
                Some(value) => Some(decode::<T>(value.value())?),
                None => None,
            };
            let (next, result) = update(current);
            if let Some(next) = next {
                let bytes = encode(&next)?;
                table.insert(key, bytes.as_slice()).map_err(io)?;
            }
            result
        };
        txn.commit().map_err(io)?;
        Ok(result)
    }
}

impl Storage for RedbStorage {
    fn add_ban(&self, ban: NewBan) -> Result<BanRecord, StorageError> {
        let txn = self.db.begin_write().map_err(io)?;
        let record = {
            let mut table = txn.open_table(BANS).map_err(io)?;
            let id = match table.last().map_err(io)? {
                Some((key, _)) => decode_id(key.value())? + 1,
                None => 1,
            };
            let record = ban.into_record(id);
            let bytes = encode(&record)?;
            table.insert(id.to_be_bytes().as_slice(), bytes.as_slice()).map_err(io)?;
            record
        };
        txn.commit().map_err(io)?;
        Ok(record)
    }

    fn find_active_ban(
        &self,
        ipid: &str,
        hdid: &str,
        now_secs: u64,
    ) -> Result<Option<BanRecord>, StorageError> {
        let mut found = self.scan_bans(|ban| ban.matches(ipid, hdid) && ban.is_active(now_secs), 1)?;
        Ok(found.pop())
    }

    fn get_ban(&self, id: u64) -> Result<Option<BanRecord>, StorageError> {
        self.load(BANS, &id.to_be_bytes())
    }

    fn list_bans(&self, ipid: Option<&str>, limit: usize) -> Result<Vec<BanRecord>, StorageError> {
        self.scan_bans(|ban| ipid.is_none_or(|ipid| ban.ipid == ipid), limit)
    }

    fn nullify_ban(&self, id: u64) -> Result<bool, StorageError> {
        self.modify(BANS, &id.to_be_bytes(), |ban: Option<BanRecord>| match ban {
            Some(mut ban) => {
                ban.nullified = true;
                (Some(ban), true)
            },
            None => (None, false),
        })
    }

    fn add_warning(&self, warning: Warning) -> Result<usize, StorageError> {
        let key = warning.ipid.clone();
        self.modify(WARNINGS, key.as_bytes(), |list: Option<Vec<Warning>>| {
            let mut list = list.unwrap_or_default();
            list.push(warning);
            let count = list.len();
            (Some(list), count)
        })
    }

    fn warnings(&self, ipid: &str) -> Result<Vec<Warning>, StorageError> {
        Ok(self.load(WARNINGS, ipid.as_bytes())?.unwrap_or_default())
    }

    fn create_user(&self, user: UserRecord) -> Result<(), StorageError> {
        let key = user.username.clone();
        let created = self.modify(USERS, key.as_bytes(), |existing: Option<UserRecord>| match existing {
            Some(_) => (None, false),
            None => (Some(user), true),
        })?;
        if created { Ok(()) } else { Err(StorageError::AlreadyExists(key)) }
    }

    fn user(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        self.load(USERS, username.as_bytes())
    }

    fn remove_user(&self, username: &str) -> Result<bool, StorageError> {
        let txn = self.db.begin_write().map_err(io)?;
        let removed = {
            let mut table = txn.open_table(USERS).map_err(io)?;
            table.remove(username.as_bytes()).map_err(io)?.is_some()
        };
        txn.commit().map_err(io)?;
        Ok(removed)
    }

    fn set_role(&self, username: &str, role: &str) -> Result<bool, StorageError> {
        self.modify(USERS, username.as_bytes(), |user: Option<UserRecord>| match user {
            Some(mut user) => {
                user.role = role.to_string();
                (Some(user), true)
            },
            None => (None, false),
        })
    }
}

#[allow(clippy::needless_pass_by_value)]
fn io(e: impl ToString) -> StorageError {
    StorageError::Io(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(bytes)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    ciborium::from_reader(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode_id(key: &[u8]) -> Result<u64, StorageError> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| StorageError::Serialization(format!("ban key has {} bytes", key.len())))?;
    Ok(u64::from_be_bytes(bytes))
}
