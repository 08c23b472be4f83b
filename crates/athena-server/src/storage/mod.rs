//! Persistence for bans, warnings and moderator accounts.
//!
//! The trait is synchronous: every call is a short transaction and handlers
//! never hold a lock across it. Backends are shared as `Arc<dyn Storage>`.

mod error;
mod memory;
mod redb;

pub use error::StorageError;
pub use memory::MemoryStorage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use self::redb::RedbStorage;

/// A ban as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRecord {
    /// Monotonic ban id, starting at 1
    pub id: u64,
    /// Hashed IP of the banned client
    pub ipid: String,
    /// Hardware id reported by the client, possibly empty
    pub hdid: String,
    /// Unix seconds when the ban was issued
    pub banned_at_secs: u64,
    /// Unix seconds when the ban lapses; `None` is permanent
    pub until_secs: Option<u64>,
    /// Reason shown to the client
    pub reason: String,
    /// Moderator who issued it
    pub moderator: String,
    /// Set by `/unban`
    pub nullified: bool,
}

impl BanRecord {
    /// True if the ban still applies at `now_secs`.
    pub fn is_active(&self, now_secs: u64) -> bool {
        !self.nullified && self.until_secs.is_none_or(|until| now_secs < until)
    }

    /// Whether this ban covers a client with the given identifiers.
    pub fn matches(&self, ipid: &str, hdid: &str) -> bool {
        self.ipid == ipid || (!hdid.is_empty() && self.hdid == hdid)
    }
}

/// Fields of a ban before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBan {
    /// Hashed IP
    pub ipid: String,
    /// Hardware id
    pub hdid: String,
    /// Unix seconds at issue time
    pub banned_at_secs: u64,
    /// Length of the ban; `None` is permanent
    pub duration_secs: Option<u64>,
    /// Reason shown to the client
    pub reason: String,
    /// Issuing moderator
    pub moderator: String,
}

impl NewBan {
    fn into_record(self, id: u64) -> BanRecord {
        BanRecord {
            id,
            until_secs: self.duration_secs.map(|d| self.banned_at_secs.saturating_add(d)),
            ipid: self.ipid,
            hdid: self.hdid,
            banned_at_secs: self.banned_at_secs,
            reason: self.reason,
            moderator: self.moderator,
            nullified: false,
        }
    }
}

/// A moderator warning attached to an IPID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Hashed IP of the warned client
    pub ipid: String,
    /// Warning text
    pub reason: String,
    /// Issuing moderator
    pub moderator: String,
    /// Unix seconds at issue time
    pub issued_at_secs: u64,
}

/// A moderator account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Login name
    pub username: String,
    /// Hex-encoded random salt
    pub salt: String,
    /// Hex-encoded SHA-256 of salt followed by password
    pub digest: String,
    /// Role name resolved against the configured roles at login
    pub role: String,
}

impl UserRecord {
    /// Build a record for `password` salted with `salt`.
    pub fn new(username: &str, password: &str, role: &str, salt: [u8; 16]) -> Self {
        Self {
            username: username.to_string(),
            salt: hex::encode(salt),
            digest: digest_password(&salt, password),
            role: role.to_string(),
        }
    }

    /// Check `password` against the stored digest.
    pub fn verify(&self, password: &str) -> bool {
        hex::decode(&self.salt).is_ok_and(|salt| digest_password(&salt, password) == self.digest)
    }
}

fn digest_password(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Durable moderation state.
///
/// Implementations must be safe to call from any task. Timestamps are Unix
/// seconds supplied by the caller so backends never read the clock.
pub trait Storage: Send + Sync + 'static {
    /// Record a ban and return it with its assigned id.
    fn add_ban(&self, ban: NewBan) -> Result<BanRecord, StorageError>;

    /// Newest ban still in force for either identifier.
    fn find_active_ban(
        &self,
        ipid: &str,
        hdid: &str,
        now_secs: u64,
    ) -> Result<Option<BanRecord>, StorageError>;

    /// Look a ban up by id.
    fn get_ban(&self, id: u64) -> Result<Option<BanRecord>, StorageError>;

    /// Bans newest first, optionally filtered by IPID.
    fn list_bans(&self, ipid: Option<&str>, limit: usize) -> Result<Vec<BanRecord>, StorageError>;

    /// Mark a ban as lifted. Returns `false` if the id is unknown.
    fn nullify_ban(&self, id: u64) -> Result<bool, StorageError>;

    /// Attach a warning and return how many the IPID now has.
    fn add_warning(&self, warning: Warning) -> Result<usize, StorageError>;

    /// Warnings for an IPID, oldest first.
    fn warnings(&self, ipid: &str) -> Result<Vec<Warning>, StorageError>;

    /// Register an account.
    ///
    /// # Errors
    ///
    /// `StorageError::AlreadyExists` if the name is taken.
    fn create_user(&self, user: UserRecord) -> Result<(), StorageError>;

    /// Fetch an account.
    fn user(&self, username: &str) -> Result<Option<UserRecord>, StorageError>;

    /// Delete an account. Returns `false` if it did not exist.
    fn remove_user(&self, username: &str) -> Result<bool, StorageError>;

    /// Change an account's role. Returns `false` if it did not exist.
    fn set_role(&self, username: &str, role: &str) -> Result<bool, StorageError>;

    /// Fetch an account and check its password.
    fn authenticate(&self, username: &str, password: &str) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.user(username)?.filter(|user| user.verify(password)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_digest_is_salted() {
        let a = UserRecord::new("kristoph", "hunter2", "admin", [1; 16]);
        let b = UserRecord::new("kristoph", "hunter2", "admin", [2; 16]);
        assert_ne!(a.digest, b.digest);
        assert!(a.verify("hunter2"));
        assert!(!a.verify("hunter3"));
    }

    #[test]
    fn ban_activity() {
        let ban = NewBan {
            ipid: "ip".into(),
            hdid: String::new(),
            banned_at_secs: 100,
            duration_secs: Some(50),
            reason: "spam".into(),
            moderator: "mod".into(),
        }
        .into_record(1);
        assert!(ban.is_active(149));
        assert!(!ban.is_active(150));
        assert!(ban.matches("ip", ""));
        assert!(!ban.matches("other", ""));
    }

    #[test]
    fn empty_hdid_never_matches() {
        let mut ban = NewBan {
            ipid: "ip".into(),
            hdid: String::new(),
            banned_at_secs: 0,
            duration_secs: None,
            reason: String::new(),
            moderator: String::new(),
        }
        .into_record(1);
        assert!(!ban.matches("other", ""));
        ban.hdid = "hw".into();
        assert!(ban.matches("other", "hw"));
    }
}
