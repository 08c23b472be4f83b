//! Moderator permission bitset.

use std::{fmt, str::FromStr};

use crate::error::UnknownPermission;

/// Set of server-wide privileges granted by a role.
///
/// Distinct from area-scoped CM status: a player can be CM of an area
/// without holding [`Permissions::CM`], which instead lets moderators take
/// CM anywhere and act as one without the area roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Permissions(u64);

impl Permissions {
    /// No privileges.
    pub const NONE: Self = Self(0);
    /// Case-maker powers in any area.
    pub const CM: Self = Self(1);
    /// Kick players from the server.
    pub const KICK: Self = Self(1 << 1);
    /// Ban and unban players.
    pub const BAN: Self = Self(1 << 2);
    /// Enter locked areas.
    pub const BYPASS_LOCK: Self = Self(1 << 3);
    /// Use mod-only evidence mode.
    pub const MOD_EVI: Self = Self(1 << 4);
    /// Change area settings (background lock and friends).
    pub const MODIFY_AREA: Self = Self(1 << 5);
    /// Move other players between areas.
    pub const MOVE_USERS: Self = Self(1 << 6);
    /// Speak while the area is in mod-speak mode.
    pub const MOD_SPEAK: Self = Self(1 << 7);
    /// See ban details.
    pub const BAN_INFO: Self = Self(1 << 8);
    /// Use moderator chat.
    pub const MOD_CHAT: Self = Self(1 << 9);
    /// Mute, punish and jail players.
    pub const MUTE: Self = Self(1 << 10);
    /// Read area logs.
    pub const LOG: Self = Self(1 << 11);
    /// Every privilege, including those added later.
    pub const ADMIN: Self = Self(u64::MAX);

    const NAMED: [(&'static str, Self); 13] = [
        ("CM", Self::CM),
        ("KICK", Self::KICK),
        ("BAN", Self::BAN),
        ("BYPASS_LOCK", Self::BYPASS_LOCK),
        ("MOD_EVI", Self::MOD_EVI),
        ("MODIFY_AREA", Self::MODIFY_AREA),
        ("MOVE_USERS", Self::MOVE_USERS),
        ("MOD_SPEAK", Self::MOD_SPEAK),
        ("BAN_INFO", Self::BAN_INFO),
        ("MOD_CHAT", Self::MOD_CHAT),
        ("MUTE", Self::MUTE),
        ("LOG", Self::LOG),
        ("ADMIN", Self::ADMIN),
    ];

    /// Rebuild from a stored bit pattern.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw bit pattern, for persistence.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// True if every bit of `required` is present.
    ///
    /// `NONE` is contained in every set, so unrestricted commands need no
    /// special case.
    pub const fn contains(self, required: Self) -> bool {
        self.0 & required.0 == required.0
    }

    /// True if no privilege is granted.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Union of two sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Build a set from permission names such as `"KICK"` or `"ban"`.
    ///
    /// # Errors
    ///
    /// `UnknownPermission` naming the first unrecognized entry.
    pub fn from_names<I, S>(names: I) -> Result<Self, UnknownPermission>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().try_fold(Self::NONE, |acc, name| Ok(acc.union(name.as_ref().parse()?)))
    }
}

impl FromStr for Permissions {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::NAMED
            .iter()
            .find(|(name, _)| *name == upper)
            .map(|(_, perm)| *perm)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ADMIN {
            return f.write_str("ADMIN");
        }
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let names: Vec<&str> = Self::NAMED
            .iter()
            .filter(|(_, perm)| *perm != Self::ADMIN && self.contains(*perm))
            .map(|(name, _)| *name)
            .collect();
        f.write_str(&names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_contains_everything() {
        for (_, perm) in Permissions::NAMED {
            assert!(Permissions::ADMIN.contains(perm));
        }
    }

    #[test]
    fn none_is_always_satisfied() {
        assert!(Permissions::NONE.contains(Permissions::NONE));
        assert!(!Permissions::NONE.contains(Permissions::KICK));
    }

    #[test]
    fn names_parse_case_insensitively() {
        let perms = Permissions::from_names(["kick", "BAN", " Mute "]).unwrap();
        assert!(perms.contains(Permissions::KICK.union(Permissions::BAN)));
        assert!(perms.contains(Permissions::MUTE));
        assert!(!perms.contains(Permissions::CM));
        assert_eq!(perms.to_string(), "KICK, BAN, MUTE");
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert_eq!(
            Permissions::from_names(["KICK", "FLY"]),
            Err(UnknownPermission("FLY".to_string()))
        );
    }
}
