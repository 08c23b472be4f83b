//! Moderation bridge for external tooling.
//!
//! A chat-platform bot or admin panel drives the server through
//! [`ModerationBridge`]. It calls into the same registry, area and storage
//! accessors the in-game commands use, so a bridged action has exactly the
//! effect of its command counterpart.

use std::{sync::Arc, time::Duration};

use athena_core::{Environment, LockKind, MuteState, PunishmentKind, Uid};

use crate::{
    broadcast::ArupKind,
    client::Client,
    error::BridgeError,
    server::Server,
    storage::{BanRecord, Warning},
};

/// Reason recorded for bridged punishments.
const BRIDGE_REASON: &str = "Applied by moderator.";

/// One connected player as seen from outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    /// Session UID
    pub uid: Uid,
    /// Character name or `Spectator`
    pub character: String,
    /// OOC name
    pub ooc_name: String,
    /// Area name
    pub area: String,
    /// Hashed IP
    pub ipid: String,
}

/// One area as seen from outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaInfo {
    /// Area index
    pub index: usize,
    /// Display name
    pub name: String,
    /// Players present
    pub players: usize,
    /// Status text
    pub status: String,
    /// Lock state text
    pub lock: String,
}

/// Moderation entry point over a running server.
pub struct ModerationBridge<E: Environment> {
    server: Arc<Server<E>>,
}

impl<E: Environment> ModerationBridge<E> {
    /// Bridge onto `server`.
    pub fn new(server: Arc<Server<E>>) -> Self {
        Self { server }
    }

    fn info(&self, client: &Client) -> Option<PlayerInfo> {
        Some(PlayerInfo {
            uid: client.uid()?,
            character: self.server.display_name(client),
            ooc_name: client.ooc_name(),
            area: self.server.area(client.area()).map(|a| a.name().to_string()).unwrap_or_default(),
            ipid: client.ipid().to_string(),
        })
    }

    fn client(&self, uid: Uid) -> Result<Arc<Client>, BridgeError> {
        self.server.client_by_uid(uid).ok_or_else(|| BridgeError::PlayerNotFound(format!("UID {uid}")))
    }

    fn area_id(&self, name: &str) -> Result<usize, BridgeError> {
        self.server.area_by_name(name).map(|a| a.id()).ok_or_else(|| BridgeError::AreaNotFound(name.to_string()))
    }

    // Lookups

    /// Every joined player.
    pub fn players(&self) -> Vec<PlayerInfo> {
        self.server.clients().joined().iter().filter_map(|c| self.info(c)).collect()
    }

    /// Player by UID, falling back to an OOC or character name match.
    pub fn find_player(&self, query: &str) -> Result<PlayerInfo, BridgeError> {
        let query = query.trim();
        let by_uid = query.parse::<Uid>().ok().and_then(|uid| self.server.client_by_uid(uid));
        let client = by_uid.or_else(|| {
            self.server.clients().joined().into_iter().find(|c| {
                c.ooc_name().eq_ignore_ascii_case(query) || self.server.display_name(c).eq_ignore_ascii_case(query)
            })
        });
        client.and_then(|c| self.info(&c)).ok_or_else(|| BridgeError::PlayerNotFound(query.to_string()))
    }

    /// Player by UID.
    pub fn player(&self, uid: Uid) -> Result<PlayerInfo, BridgeError> {
        let client = self.client(uid)?;
        self.info(&client).ok_or_else(|| BridgeError::PlayerNotFound(format!("UID {uid}")))
    }

    /// Every area.
    pub fn areas(&self) -> Vec<AreaInfo> {
        self.server
            .areas()
            .iter()
            .map(|a| AreaInfo {
                index: a.id(),
                name: a.name().to_string(),
                players: a.players(),
                status: a.status().to_string(),
                lock: a.lock_state().to_string(),
            })
            .collect()
    }

    /// Area by case-insensitive name.
    pub fn find_area(&self, name: &str) -> Result<AreaInfo, BridgeError> {
        let id = self.area_id(name)?;
        self.areas().into_iter().nth(id).ok_or_else(|| BridgeError::AreaNotFound(name.to_string()))
    }

    /// Server name.
    pub fn server_name(&self) -> &str {
        self.server.name()
    }

    /// Joined player count.
    pub fn player_count(&self) -> usize {
        self.server.player_count()
    }

    /// Configured player capacity.
    pub fn max_players(&self) -> u32 {
        self.server.config().server.max_players
    }

    /// Area log lines mentioning `ipid`, across all areas.
    pub fn player_logs(&self, ipid: &str) -> Vec<String> {
        self.server.areas().iter().flat_map(|a| a.log_lines()).filter(|line| line.contains(ipid)).collect()
    }

    // Sanctions

    /// Mute IC and OOC. `None` lasts until unmuted.
    pub fn mute(&self, uid: Uid, duration: Option<Duration>, reason: &str) -> Result<(), BridgeError> {
        let client = self.client(uid)?;
        client.set_mute(MuteState::IcOoc, duration.map(|d| self.server.now() + d));
        client.server_message(&format!("You have been muted. Reason: {reason}"));
        tracing::info!(target: "audit", "Bridge muted UID {uid}: {reason}");
        Ok(())
    }

    /// Lift any mute.
    pub fn unmute(&self, uid: Uid) -> Result<(), BridgeError> {
        let client = self.client(uid)?;
        client.unmute();
        client.server_message("You have been unmuted.");
        Ok(())
    }

    /// Mute IC only, indefinitely.
    pub fn gag(&self, uid: Uid) -> Result<(), BridgeError> {
        let client = self.client(uid)?;
        client.set_mute(MuteState::Ic, None);
        client.server_message("You have been gagged from IC chat.");
        Ok(())
    }

    /// Lift an IC-only mute; other mutes stay.
    pub fn ungag(&self, uid: Uid) -> Result<(), BridgeError> {
        let client = self.client(uid)?;
        if client.mute(self.server.now()) == MuteState::Ic {
            client.unmute();
        }
        client.server_message("Your gag has been removed.");
        Ok(())
    }

    /// Disconnect a player.
    pub fn kick(&self, uid: Uid, reason: &str) -> Result<(), BridgeError> {
        let client = self.client(uid)?;
        tracing::info!(target: "audit", "Bridge kicked UID {uid} ({}): {reason}", client.ipid());
        self.server.kick(&client, reason);
        Ok(())
    }

    /// Ban an IPID and disconnect everyone using it. `None` is permanent.
    pub fn ban(
        &self,
        ipid: &str,
        duration: Option<Duration>,
        reason: &str,
        moderator: &str,
    ) -> Result<BanRecord, BridgeError> {
        let record = self.server.ban(ipid, "", duration, reason, moderator)?;
        tracing::info!(target: "audit", "Bridge ban {} on {ipid} by {moderator}: {reason}", record.id);
        Ok(record)
    }

    /// Lift a ban. Returns `false` for an unknown id.
    pub fn unban(&self, id: u64) -> Result<bool, BridgeError> {
        Ok(self.server.storage().nullify_ban(id)?)
    }

    /// Newest bans first.
    pub fn bans(&self, limit: usize) -> Result<Vec<BanRecord>, BridgeError> {
        Ok(self.server.storage().list_bans(None, limit)?)
    }

    /// Record a warning and notify the player. Returns the IPID's warning
    /// count.
    pub fn warn(&self, uid: Uid, reason: &str, moderator: &str) -> Result<usize, BridgeError> {
        let client = self.client(uid)?;
        let count = self.server.storage().add_warning(Warning {
            ipid: client.ipid().to_string(),
            reason: reason.to_string(),
            moderator: moderator.to_string(),
            issued_at_secs: self.server.env().wall_clock_secs(),
        })?;
        client.server_message(&format!("⚠️ Warning from moderator: {reason}"));
        tracing::info!(target: "audit", "Bridge warned {} by {moderator}: {reason}", client.ipid());
        Ok(count)
    }

    /// Warnings on an IPID, oldest first.
    pub fn warnings(&self, ipid: &str) -> Result<Vec<Warning>, BridgeError> {
        Ok(self.server.storage().warnings(ipid)?)
    }

    /// Apply a punishment by catalog name.
    pub fn apply_punishment(&self, uid: Uid, name: &str, duration: Duration) -> Result<(), BridgeError> {
        let kind: PunishmentKind = name.parse()?;
        let client = self.client(uid)?;
        client.add_punishment(kind, duration, BRIDGE_REASON, self.server.now());
        client.server_message(&format!("You have received the '{kind}' punishment."));
        Ok(())
    }

    /// Remove a punishment by catalog name.
    pub fn remove_punishment(&self, uid: Uid, name: &str) -> Result<(), BridgeError> {
        let kind: PunishmentKind = name.parse()?;
        self.client(uid)?.remove_punishment(kind);
        Ok(())
    }

    // Messaging

    /// Server message to one player.
    pub fn private_message(&self, uid: Uid, message: &str) -> Result<(), BridgeError> {
        self.client(uid)?.server_message(&format!("[Discord Mod] {message}"));
        Ok(())
    }

    /// Server message to every joined player.
    pub fn announce(&self, message: &str) {
        self.server.global_message(&format!("[Announcement] {message}"));
    }

    /// Announcement to one player.
    pub fn announce_to(&self, uid: Uid, message: &str) -> Result<(), BridgeError> {
        self.client(uid)?.server_message(&format!("[Announcement] {message}"));
        Ok(())
    }

    // Areas

    /// Move a player, ignoring locks and jail.
    pub fn force_move(&self, uid: Uid, area: &str) -> Result<(), BridgeError> {
        let client = self.client(uid)?;
        let target = self.area_id(area)?;
        self.server.move_client(&client, target, true)?;
        client.server_message(&format!("You were moved to {} by a moderator.", self.server.areas()[target].name()));
        Ok(())
    }

    /// Send everyone in an area to the lobby. Returns how many moved.
    pub fn clear_area(&self, area: &str) -> Result<usize, BridgeError> {
        let target = self.area_id(area)?;
        if target == 0 {
            return Err(BridgeError::Lobby("cleared"));
        }
        let name = self.server.areas()[target].name().to_string();
        let mut moved = 0;
        for client in self.server.clients().in_area(target) {
            if self.server.move_client(&client, 0, true).is_ok() {
                client.server_message(&format!("You were moved out of {name} by a moderator."));
                moved += 1;
            }
        }
        Ok(moved)
    }

    /// Lock an area, inviting everyone in it.
    pub fn lock_area(&self, area: &str) -> Result<(), BridgeError> {
        let target = self.area_id(area)?;
        let area = &self.server.areas()[target];
        self.server.lock_area(area, LockKind::Locked)?;
        self.server.area_message(target, &format!("{} was locked by a moderator.", area.name()));
        self.server.send_arup(ArupKind::Lock);
        Ok(())
    }

    /// Unlock an area and clear its invites.
    pub fn unlock_area(&self, area: &str) -> Result<(), BridgeError> {
        let target = self.area_id(area)?;
        let area = &self.server.areas()[target];
        area.unlock()?;
        self.server.area_message(target, &format!("{} was unlocked by a moderator.", area.name()));
        self.server.send_arup(ArupKind::Lock);
        Ok(())
    }
}
