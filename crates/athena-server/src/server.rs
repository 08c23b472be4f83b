//! Process-wide server context.
//!
//! One `Server` is built at startup and shared as `Arc<Server<E>>` by every
//! session, timed event and the moderation bridge. Tests construct isolated
//! instances with their own environment and storage.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use athena_core::{Area, AreaError, Bar, Environment, EvidenceMode, LockKind, Permissions, Uid, UidPool};
use athena_proto::Packet;
use tokio::sync::mpsc;

use crate::{
    broadcast::{ArupKind, PlayerField},
    client::{Appearance, Client, Limits},
    commands::CommandTable,
    config::Config,
    error::{MoveError, ServerError},
    events::Events,
    ipid::AllowedOrigins,
    registry::ClientRegistry,
    storage::{BanRecord, NewBan, Storage, StorageError},
    system_env::{EnvRng, SystemEnv},
};

/// Server version reported in `ID` and `/about`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared state for one running server.
pub struct Server<E: Environment = SystemEnv> {
    config: Config,
    env: E,
    name: Arc<str>,
    areas: Vec<Area>,
    clients: ClientRegistry,
    uids: UidPool,
    storage: Arc<dyn Storage>,
    roles: HashMap<String, Permissions>,
    origins: AllowedOrigins,
    commands: CommandTable<E>,
    events: Events,
    fatal: mpsc::UnboundedSender<ServerError>,
}

impl<E: Environment> Server<E> {
    /// Build the context from a validated configuration.
    ///
    /// Returns the server and the receiving end of the fatal-error channel;
    /// the process should shut down when anything arrives on it.
    pub fn new(
        config: Config,
        env: E,
        storage: Arc<dyn Storage>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ServerError>) {
        let (fatal, fatal_rx) = mpsc::unbounded_channel();
        let areas =
            config.area_settings().into_iter().enumerate().map(|(id, s)| Area::new(id, s)).collect();
        let server = Self {
            name: Arc::from(config.server.name.as_str()),
            uids: UidPool::new(config.server.max_players),
            roles: config.role_permissions(),
            origins: AllowedOrigins::from_config(&config.server),
            commands: CommandTable::new(),
            events: Events::default(),
            clients: ClientRegistry::new(),
            areas,
            config,
            env,
            storage,
            fatal,
        };
        (Arc::new(server), fatal_rx)
    }

    // Accessors

    /// Loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runtime environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Current monotonic time.
    pub fn now(&self) -> Instant {
        self.env.now()
    }

    /// `rand` generator backed by the environment.
    pub fn rng(&self) -> EnvRng<'_, E> {
        EnvRng(&self.env)
    }

    /// Server name used for server messages.
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// All areas; index 0 is the lobby.
    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    /// Area by index.
    pub fn area(&self, id: usize) -> Option<&Area> {
        self.areas.get(id)
    }

    /// Area by case-insensitive name.
    pub fn area_by_name(&self, name: &str) -> Option<&Area> {
        self.areas.iter().find(|a| a.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Connected clients.
    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// UID pool.
    pub fn uids(&self) -> &UidPool {
        &self.uids
    }

    /// Persistence backend.
    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Permissions of a configured role.
    pub fn role(&self, name: &str) -> Option<Permissions> {
        self.roles.get(name).copied()
    }

    /// WebSocket origin policy.
    pub fn origins(&self) -> &AllowedOrigins {
        &self.origins
    }

    /// Command dispatch table.
    pub fn commands(&self) -> &CommandTable<E> {
        &self.commands
    }

    /// Timed event state.
    pub fn events(&self) -> &Events {
        &self.events
    }

    /// Report an unrecoverable failure to the process supervisor.
    pub fn fatal(&self, err: ServerError) {
        tracing::error!("Fatal: {err}");
        let _ = self.fatal.send(err);
    }

    /// Joined player count.
    pub fn player_count(&self) -> usize {
        self.uids.in_use()
    }

    /// Rate limit and cooldown settings for new sessions.
    pub fn limits(&self) -> Limits {
        let s = &self.config.server;
        Limits {
            rate_limit: s.rate_limit,
            rate_window: Duration::from_secs(s.rate_limit_window_secs),
            modcall_cooldown: Duration::from_secs(s.modcall_cooldown_secs),
        }
    }

    // Characters

    /// Character folder name, or `Spectator`.
    pub fn character_name(&self, char_id: Option<usize>) -> String {
        char_id
            .and_then(|id| self.config.characters.get(id))
            .cloned()
            .unwrap_or_else(|| "Spectator".to_string())
    }

    /// Character id by case-insensitive folder name.
    pub fn character_id(&self, name: &str) -> Option<usize> {
        self.config.characters.iter().position(|c| c.eq_ignore_ascii_case(name.trim()))
    }

    /// Name a client is shown under in lists and ARUPs.
    pub fn display_name(&self, client: &Client) -> String {
        self.character_name(client.char_id())
    }

    /// Current IC look of `client`, or `None` for spectators.
    ///
    /// An iniswapped name from the last pose is kept when it names a known
    /// character; otherwise the selected character is used.
    pub fn appearance(&self, client: &Client) -> Option<Appearance> {
        let selected = client.char_id().filter(|&id| id < self.config.characters.len())?;
        let pose = client.pair_info();
        let (name, char_id) = match self.character_id(&pose.name) {
            Some(id) if !pose.name.is_empty() => (pose.name, id),
            _ => (self.character_name(Some(selected)), selected),
        };
        let showname = match client.showname() {
            s if s.trim().is_empty() => name.clone(),
            s => s,
        };
        Some(Appearance {
            char_id,
            emote: if pose.emote.is_empty() { "normal".to_string() } else { pose.emote },
            showname,
            pos: client.pos(),
            flip: if pose.flip.is_empty() { "0".to_string() } else { pose.flip },
            offset: pose.offset,
            name,
        })
    }

    /// Find a joined client by UID.
    pub fn client_by_uid(&self, uid: Uid) -> Option<Arc<Client>> {
        self.clients.find_by_uid(uid)
    }

    /// True if `client` holds the CM permission or is CM of its area.
    pub fn is_cm(&self, client: &Client) -> bool {
        if client.has_perm(Permissions::CM) {
            return true;
        }
        client.uid().is_some_and(|uid| self.area(client.area()).is_some_and(|a| a.is_cm(uid)))
    }

    /// True if `client` may change evidence in its area.
    pub fn can_alter_evidence(&self, client: &Client) -> bool {
        let Some(area) = self.area(client.area()) else { return false };
        match area.evidence_mode() {
            EvidenceMode::Any => true,
            EvidenceMode::Cms => self.is_cm(client) || client.has_perm(Permissions::MOD_EVI),
            EvidenceMode::Mods => client.has_perm(Permissions::MOD_EVI),
        }
    }

    /// Random line from the parrot list.
    pub fn parrot_line(&self) -> String {
        let parrot = &self.config.parrot;
        if parrot.is_empty() {
            return "Squawk!".to_string();
        }
        parrot[self.env.random_index(parrot.len())].clone()
    }

    // Logging

    /// Append to the client's area log.
    ///
    /// Lines read `HH:MM:SS | ACTION | character | ipid | ooc name | message`.
    pub fn area_log(&self, client: &Client, action: &str, message: &str) {
        let line = self.log_line(client, action, message);
        if let Some(area) = self.area(client.area()) {
            area.log(line);
        }
    }

    /// Area log entry that is also emitted on the `audit` tracing target.
    pub fn audit(&self, client: &Client, action: &str, message: &str) {
        let line = self.log_line(client, action, message);
        tracing::info!(target: "audit", "{line}");
        if let Some(area) = self.area(client.area()) {
            area.log(line);
        }
    }

    fn log_line(&self, client: &Client, action: &str, message: &str) -> String {
        let clock = i64::try_from(self.env.wall_clock_secs())
            .ok()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_default();
        format!(
            "{clock} | {action} | {} | {} | {} | {message}",
            self.display_name(client),
            client.ipid(),
            client.ooc_name()
        )
    }

    // Area membership

    /// Move a joined client to area `target`.
    ///
    /// Without `force` the jail and lock rules apply. The client keeps its
    /// character unless it is taken in the new area, in which case it
    /// becomes a spectator.
    ///
    /// # Errors
    ///
    /// `MoveError` describing why the move was refused.
    pub fn move_client(&self, client: &Client, target: usize, force: bool) -> Result<(), MoveError> {
        let Some(uid) = client.uid() else {
            return Err(MoveError::NoSuchArea);
        };
        let Some(to) = self.area(target) else {
            return Err(MoveError::NoSuchArea);
        };
        let from_id = client.area();
        if from_id == target {
            return Err(MoveError::SameArea);
        }
        if !force {
            if client.is_jailed(self.now()) {
                return Err(MoveError::Jailed);
            }
            if !to.can_enter(uid, client.has_perm(Permissions::BYPASS_LOCK)) {
                return Err(MoveError::Locked);
            }
        }

        let mut was_cm = false;
        if let Some(from) = self.area(from_id) {
            was_cm = from.is_cm(uid);
            from.remove_player(uid);
            self.send_to_area(from_id, &self.chars_check(from));
        }

        client.set_area(target);
        to.add_player();
        if let Some(char_id) = client.char_id() {
            if to.take_character(char_id, uid).is_err() {
                client.set_char_id(None);
                client.server_message("Your character is taken in this area, you are now spectating.");
            }
        }

        self.send_area_state(client, to);
        self.send_to_area(target, &self.chars_check(to));
        client.server_message(&format!("Moved to {}.", to.name()));

        self.send_arup(ArupKind::Players);
        if was_cm {
            self.send_arup(ArupKind::Cm);
        }
        self.player_list_update(client, PlayerField::Area);
        Ok(())
    }

    /// Lock `area` and invite everyone inside it.
    ///
    /// Occupants are read once the lock is in place, so anyone who entered
    /// before it took effect is on the invite list.
    ///
    /// # Errors
    ///
    /// As [`Area::lock`], or `AreaError::Unlocked` if the area was unlocked
    /// again before the invites landed.
    pub fn lock_area(&self, area: &Area, kind: LockKind) -> Result<(), AreaError> {
        area.lock(kind, &[])?;
        for occupant in self.clients.in_area(area.id()) {
            if let Some(uid) = occupant.uid() {
                area.invite(uid)?;
            }
        }
        Ok(())
    }

    /// Background, health, evidence and character availability for the
    /// area a client just entered.
    pub fn send_area_state(&self, client: &Client, area: &Area) {
        client.send(&Packet::new("BN").push_text(&area.background()).push_text(&client.pos()));
        for (bar, wire) in [(Bar::Defense, "1"), (Bar::Prosecution, "2")] {
            client.send(&Packet::new("HP").field(wire).field(area.health(bar).to_string()));
        }
        client.send(&self.evidence_list(area));
        client.send(&self.chars_check(area));
    }

    /// `CharsCheck` for an area.
    pub fn chars_check(&self, area: &Area) -> Packet {
        Packet::with_fields("CharsCheck", area.chars_check(self.config.characters.len()))
    }

    /// `LE` evidence list for an area.
    pub fn evidence_list(&self, area: &Area) -> Packet {
        let items = area.evidence().into_iter().map(|e| {
            format!(
                "{}&{}&{}",
                athena_proto::escape(&e.name),
                athena_proto::escape(&e.description),
                athena_proto::escape(&e.image)
            )
        });
        Packet::with_fields("LE", items)
    }

    // Disconnects and bans

    /// Tear down everything a departing client owned.
    ///
    /// Idempotent: the UID is taken from the client, so a second call finds
    /// nothing to release.
    pub fn disconnect(&self, client: &Client) {
        self.clients.remove(client.id());
        let Some(uid) = client.take_uid() else {
            return;
        };
        self.uids.release(uid);

        let area_id = client.area();
        let mut was_cm = false;
        for area in &self.areas {
            if area.id() == area_id {
                was_cm |= area.is_cm(uid);
                area.remove_player(uid);
            } else {
                was_cm |= area.forget(uid);
            }
        }

        for other in self.clients.joined() {
            other.unpair_from(uid);
            if other.release_possession_of(uid) {
                other.server_message("The player you were possessing has left.");
            }
        }

        if let Some(area) = self.area(area_id) {
            self.send_to_area(area_id, &self.chars_check(area));
        }
        self.player_list_remove(uid);
        self.send_arup(ArupKind::Players);
        if was_cm {
            self.send_arup(ArupKind::Cm);
        }
        tracing::debug!("Client {} (uid {uid}) disconnected", client.ipid());
    }

    /// Disconnect with a `KK` reason.
    pub fn kick(&self, target: &Client, reason: &str) {
        target.close_with(&Packet::new("KK").push_text(reason));
    }

    /// Persist a ban and disconnect every client sharing the IPID.
    ///
    /// A `None` duration is permanent.
    ///
    /// # Errors
    ///
    /// `StorageError` if the ban could not be recorded; nobody is kicked.
    pub fn ban(
        &self,
        ipid: &str,
        hdid: &str,
        duration: Option<Duration>,
        reason: &str,
        moderator: &str,
    ) -> Result<BanRecord, StorageError> {
        let record = self.storage.add_ban(NewBan {
            ipid: ipid.to_string(),
            hdid: hdid.to_string(),
            banned_at_secs: self.env.wall_clock_secs(),
            duration_secs: duration.map(|d| d.as_secs()),
            reason: reason.to_string(),
            moderator: moderator.to_string(),
        })?;
        let notice = Packet::new("KB").push_text(&ban_notice(&record));
        for target in self.clients.find_by_ipid(ipid) {
            target.close_with(&notice);
        }
        Ok(record)
    }
}

/// Text shown to a banned client.
pub fn ban_notice(ban: &BanRecord) -> String {
    let until = match ban.until_secs {
        None => "∞".to_string(),
        Some(secs) => i64::try_from(secs)
            .ok()
            .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
            .map_or_else(|| secs.to_string(), |t| t.format("%d %b %Y %H:%M UTC").to_string()),
    };
    format!("{}\nUntil: {until}\nID: {}", ban.reason, ban.id)
}
