//! Per-connection client state.
//!
//! A `Client` is shared between its own session task, broadcast code running
//! on other clients' tasks, and command handlers invoked by other clients.
//! Every mutable field sits behind one internal mutex reached only through
//! accessor methods, and no accessor calls out while holding it. Callers
//! that need fields of two clients read one, release it, then read the
//! other.
//!
//! Outbound traffic goes through a bounded channel drained by the session's
//! writer task. Sending never blocks or awaits: a client whose queue is full
//! has stopped reading and is closed.

use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use athena_core::{
    CooldownError, ModcallCooldown, Mute, MuteState, Permissions, PunishmentKind, Punishments,
    RateLimitError, RateLimiter, Uid,
};
use athena_proto::Packet;
use rand::Rng;
use tokio::sync::{Notify, mpsc};

/// Registry key, assigned at accept time before any UID exists.
pub type ClientId = u64;

/// Packets queued for one client before it is considered stalled.
pub const OUTBOUND_CAPACITY: usize = 1024;

/// Instruction for the session writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Encoded packet text.
    Packet(String),
    /// Flush and close the transport.
    Close,
}

/// Last pose a client sent, mirrored into a pair partner's messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairInfo {
    /// Character folder name (may be an iniswap)
    pub name: String,
    /// Emote
    pub emote: String,
    /// Horizontal flip flag
    pub flip: String,
    /// `x&y` offset
    pub offset: String,
}

/// Possession link: messages from the possessor appear as the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Possession {
    /// Possessed player
    pub target: Uid,
    /// Target's position when possession began
    pub pos: String,
}

/// How a client is currently drawn in IC, resolved against the character
/// list. Text fields are unescaped; flip and offset stay in wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appearance {
    /// Character id sent in field 8
    pub char_id: usize,
    /// Character folder name
    pub name: String,
    /// Emote, `normal` if none was seen yet
    pub emote: String,
    /// Showname, falling back to the character name
    pub showname: String,
    /// Position
    pub pos: String,
    /// Horizontal flip flag
    pub flip: String,
    /// `x&y` offset
    pub offset: String,
}

/// Per-session abuse control settings.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Packets allowed per window
    pub rate_limit: usize,
    /// Rate limit window
    pub rate_window: Duration,
    /// Minimum gap between modcalls
    pub modcall_cooldown: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Jail {
    Free,
    Until(Instant),
    Indefinite,
}

#[derive(Debug)]
struct ClientState {
    uid: Option<Uid>,
    hdid: String,
    char_id: Option<usize>,
    area: usize,
    pos: String,
    showname: String,
    ooc_name: String,
    authenticated: bool,
    mod_name: String,
    perms: Permissions,
    mute: Mute,
    punishments: Punishments,
    possessing: Option<Possession>,
    pair_wanted: Option<usize>,
    paired_with: Option<Uid>,
    pair_info: PairInfo,
    jail: Jail,
    rate: RateLimiter,
    modcall: ModcallCooldown,
}

/// One connected client.
pub struct Client {
    id: ClientId,
    ipid: String,
    tx: mpsc::Sender<Outbound>,
    server_name: Arc<str>,
    closing: AtomicBool,
    shutdown: Notify,
    state: Mutex<ClientState>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("id", &self.id).field("ipid", &self.ipid).finish_non_exhaustive()
    }
}

impl Client {
    /// New unjoined client writing to `tx`.
    pub fn new(
        id: ClientId,
        ipid: String,
        server_name: Arc<str>,
        limits: Limits,
        tx: mpsc::Sender<Outbound>,
    ) -> Self {
        let state = ClientState {
            uid: None,
            hdid: String::new(),
            char_id: None,
            area: 0,
            pos: String::new(),
            showname: String::new(),
            ooc_name: String::new(),
            authenticated: false,
            mod_name: String::new(),
            perms: Permissions::NONE,
            mute: Mute::default(),
            punishments: Punishments::default(),
            possessing: None,
            pair_wanted: None,
            paired_with: None,
            pair_info: PairInfo::default(),
            jail: Jail::Free,
            rate: RateLimiter::new(limits.rate_limit, limits.rate_window),
            modcall: ModcallCooldown::new(limits.modcall_cooldown),
        };
        Self {
            id,
            ipid,
            tx,
            server_name,
            closing: AtomicBool::new(false),
            shutdown: Notify::new(),
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registry key.
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Hashed IP.
    pub fn ipid(&self) -> &str {
        &self.ipid
    }

    // Output

    /// Queue a packet. Dropped silently once the client is closing.
    pub fn send(&self, packet: &Packet) {
        self.send_raw(packet.encode());
    }

    /// Queue pre-encoded packet text. A full queue closes the client.
    pub fn send_raw(&self, text: String) {
        if self.is_closing() {
            return;
        }
        if let Err(mpsc::error::TrySendError::Full(_)) = self.tx.try_send(Outbound::Packet(text)) {
            tracing::info!("Outbound queue full for {}, closing", self.ipid);
            self.close();
        }
    }

    /// OOC message from the server.
    pub fn server_message(&self, message: &str) {
        self.send(&Packet::new("CT").push_text(&self.server_name).push_text(message).field("1"));
    }

    /// Flush queued packets, then close the connection.
    ///
    /// Idempotent. If the queue is full the flush is skipped and the session
    /// drops the transport after its write timeout. The session read loop notices through
    /// [`Client::closed`] and runs disconnect cleanup.
    pub fn close(&self) {
        if !self.closing.swap(true, Ordering::AcqRel) {
            let _ = self.tx.try_send(Outbound::Close);
            self.shutdown.notify_one();
        }
    }

    /// Send a final packet, then close.
    pub fn close_with(&self, packet: &Packet) {
        self.send(packet);
        self.close();
    }

    /// True once [`Client::close`] has been called.
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Resolves when the client is closed.
    pub async fn closed(&self) {
        if self.is_closing() {
            return;
        }
        self.shutdown.notified().await;
    }

    // Identity

    /// Session UID, `None` until joined.
    pub fn uid(&self) -> Option<Uid> {
        self.state().uid
    }

    /// Mark joined with `uid`.
    pub fn set_uid(&self, uid: Uid) {
        self.state().uid = Some(uid);
    }

    /// Clear the UID, returning it for release.
    pub fn take_uid(&self) -> Option<Uid> {
        self.state().uid.take()
    }

    /// True once a UID is assigned.
    pub fn is_joined(&self) -> bool {
        self.state().uid.is_some()
    }

    /// Hardware id from the handshake.
    pub fn hdid(&self) -> String {
        self.state().hdid.clone()
    }

    /// Record the hardware id.
    pub fn set_hdid(&self, hdid: &str) {
        self.state().hdid = hdid.to_string();
    }

    // Character and location

    /// Selected character, `None` for spectators.
    pub fn char_id(&self) -> Option<usize> {
        self.state().char_id
    }

    /// Select a character or become a spectator.
    pub fn set_char_id(&self, char_id: Option<usize>) {
        self.state().char_id = char_id;
    }

    /// Current area index.
    pub fn area(&self) -> usize {
        self.state().area
    }

    /// Move to area `area`. Bookkeeping on the areas is the caller's job.
    pub fn set_area(&self, area: usize) {
        self.state().area = area;
    }

    /// Courtroom position.
    pub fn pos(&self) -> String {
        self.state().pos.clone()
    }

    /// Change position.
    pub fn set_pos(&self, pos: &str) {
        self.state().pos = pos.to_string();
    }

    /// Display name sent with IC messages.
    pub fn showname(&self) -> String {
        self.state().showname.clone()
    }

    /// Change the showname.
    pub fn set_showname(&self, showname: &str) {
        self.state().showname = showname.to_string();
    }

    /// OOC chat name, empty until first OOC message.
    pub fn ooc_name(&self) -> String {
        self.state().ooc_name.clone()
    }

    /// Change the OOC name.
    pub fn set_ooc_name(&self, name: &str) {
        self.state().ooc_name = name.to_string();
    }

    // Authentication

    /// Logged in as a moderator.
    pub fn is_authenticated(&self) -> bool {
        self.state().authenticated
    }

    /// Moderator account name.
    pub fn mod_name(&self) -> String {
        self.state().mod_name.clone()
    }

    /// Granted permissions.
    pub fn perms(&self) -> Permissions {
        self.state().perms
    }

    /// True if every bit of `required` is granted.
    pub fn has_perm(&self, required: Permissions) -> bool {
        self.state().perms.contains(required)
    }

    /// Log in as `name` with `perms`.
    pub fn login(&self, name: &str, perms: Permissions) {
        let mut state = self.state();
        state.authenticated = true;
        state.mod_name = name.to_string();
        state.perms = perms;
    }

    /// Log out, dropping all permissions.
    pub fn logout(&self) {
        let mut state = self.state();
        state.authenticated = false;
        state.mod_name.clear();
        state.perms = Permissions::NONE;
    }

    // Mutes and jail

    /// Effective mute at `now`.
    pub fn mute(&self, now: Instant) -> MuteState {
        self.state().mute.current(now)
    }

    /// Apply a mute.
    pub fn set_mute(&self, state: MuteState, until: Option<Instant>) {
        self.state().mute.set(state, until);
    }

    /// Lift any mute.
    pub fn unmute(&self) {
        self.state().mute.clear();
    }

    /// True if jailed at `now`. Expired jails are cleared lazily.
    pub fn is_jailed(&self, now: Instant) -> bool {
        let mut state = self.state();
        match state.jail {
            Jail::Until(until) if now >= until => {
                state.jail = Jail::Free;
                false
            },
            Jail::Until(_) | Jail::Indefinite => true,
            Jail::Free => false,
        }
    }

    /// Jail until `until`, or indefinitely with `None`.
    pub fn jail(&self, until: Option<Instant>) {
        self.state().jail = until.map_or(Jail::Indefinite, Jail::Until);
    }

    /// Release from jail. Returns `false` if not jailed.
    pub fn unjail(&self) -> bool {
        std::mem::replace(&mut self.state().jail, Jail::Free) != Jail::Free
    }

    // Punishments

    /// Add or replace a punishment. A zero duration is permanent.
    pub fn add_punishment(&self, kind: PunishmentKind, duration: Duration, reason: &str, now: Instant) {
        self.state().punishments.add(kind, duration, reason, now);
    }

    /// Remove one punishment.
    pub fn remove_punishment(&self, kind: PunishmentKind) -> bool {
        self.state().punishments.remove(kind)
    }

    /// Remove every punishment, returning how many were active.
    pub fn clear_punishments(&self) -> usize {
        self.state().punishments.clear()
    }

    /// True if `kind` is active at `now`.
    pub fn has_punishment(&self, kind: PunishmentKind, now: Instant) -> bool {
        self.state().punishments.contains(kind, now)
    }

    /// Active punishments with time left, in application order.
    pub fn punishments(&self, now: Instant) -> Vec<(PunishmentKind, Option<Duration>)> {
        self.state().punishments.active(now).into_iter().map(|p| (p.kind, p.remaining(now))).collect()
    }

    /// Run `text` through the punishment pipeline.
    pub fn apply_punishments<R: Rng + ?Sized>(&self, text: &str, now: Instant, rng: &mut R) -> String {
        let mut state = self.state();
        let uid = state.uid.unwrap_or_default();
        state.punishments.apply(text, uid, now, rng)
    }

    // Possession and pairing

    /// Current possession link.
    pub fn possessing(&self) -> Option<Possession> {
        self.state().possessing.clone()
    }

    /// Start or stop possessing.
    pub fn set_possessing(&self, link: Option<Possession>) {
        self.state().possessing = link;
    }

    /// Drop the possession link if it points at `target`.
    pub fn release_possession_of(&self, target: Uid) -> bool {
        let mut state = self.state();
        if state.possessing.as_ref().is_some_and(|p| p.target == target) {
            state.possessing = None;
            true
        } else {
            false
        }
    }

    /// Character id this client asked to pair with.
    pub fn pair_wanted(&self) -> Option<usize> {
        self.state().pair_wanted
    }

    /// Set the pairing request.
    pub fn set_pair_wanted(&self, char_id: Option<usize>) {
        self.state().pair_wanted = char_id;
    }

    /// UID of the persistent pair partner.
    pub fn paired_with(&self) -> Option<Uid> {
        self.state().paired_with
    }

    /// Set or clear the persistent pair partner.
    pub fn set_paired_with(&self, uid: Option<Uid>) {
        self.state().paired_with = uid;
    }

    /// Clear the pair partner if it is `uid`.
    pub fn unpair_from(&self, uid: Uid) -> bool {
        let mut state = self.state();
        if state.paired_with == Some(uid) {
            state.paired_with = None;
            true
        } else {
            false
        }
    }

    /// Last pose, for a partner's messages.
    pub fn pair_info(&self) -> PairInfo {
        self.state().pair_info.clone()
    }

    /// Store the pose of the latest IC message.
    pub fn set_pair_info(&self, info: PairInfo) {
        self.state().pair_info = info;
    }

    // Abuse controls

    /// Count one inbound packet against the rate limit.
    ///
    /// # Errors
    ///
    /// `RateLimitError` when the window is full; the caller disconnects.
    pub fn check_rate(&self, now: Instant) -> Result<(), RateLimitError> {
        self.state().rate.check(now)
    }

    /// Consume the modcall cooldown.
    ///
    /// # Errors
    ///
    /// `CooldownError` with the seconds left while cooling down.
    pub fn check_modcall(&self, now: Instant) -> Result<(), CooldownError> {
        self.state().modcall.check(now)
    }
}
