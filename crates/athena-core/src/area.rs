//! Area (room) state.
//!
//! One [`Area`] per configured room, created at startup and alive for the
//! whole process. Every mutable field sits behind the area's own lock, and
//! each accessor holds that lock only for the duration of the call, so no
//! caller ever holds an area lock while doing I/O or touching a client.

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    fmt,
    str::FromStr,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::{error::AreaError, testimony::Testimony, uid::Uid};

/// Lock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockState {
    /// Anyone may enter.
    #[default]
    Free,
    /// Anyone may enter, but only invited players may pick a character.
    Spectatable,
    /// Only invited players, CMs and lock bypassers may enter.
    Locked,
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Free => "FREE",
            Self::Spectatable => "SPECTATABLE",
            Self::Locked => "LOCKED",
        })
    }
}

/// Area status shown in the area list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// Nothing happening.
    #[default]
    Idle,
    /// Waiting for participants.
    LookingForPlayers,
    /// A case is in session.
    Casing,
    /// Case paused.
    Recess,
    /// Free roleplay.
    Rp,
    /// Games.
    Gaming,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "IDLE",
            Self::LookingForPlayers => "LOOKING-FOR-PLAYERS",
            Self::Casing => "CASING",
            Self::Recess => "RECESS",
            Self::Rp => "RP",
            Self::Gaming => "GAMING",
        })
    }
}

impl FromStr for Status {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "idle" => Ok(Self::Idle),
            "looking-for-players" => Ok(Self::LookingForPlayers),
            "casing" => Ok(Self::Casing),
            "recess" => Ok(Self::Recess),
            "rp" => Ok(Self::Rp),
            "gaming" => Ok(Self::Gaming),
            _ => Err(()),
        }
    }
}

/// Who may alter the evidence list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvidenceMode {
    /// Everyone in the area.
    Any,
    /// Area CMs and moderators.
    #[default]
    Cms,
    /// Moderators only.
    Mods,
}

impl fmt::Display for EvidenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Any => "any",
            Self::Cms => "cms",
            Self::Mods => "mods",
        })
    }
}

impl FromStr for EvidenceMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "cms" => Ok(Self::Cms),
            "mods" => Ok(Self::Mods),
            _ => Err(()),
        }
    }
}

/// Which lock a lock request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    /// Full lock.
    Locked,
    /// Spectatable.
    Spectatable,
}

/// One evidence entry, fields held unescaped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Evidence {
    /// Display name
    pub name: String,
    /// Description text
    pub description: String,
    /// Image file name
    pub image: String,
}

/// Health bar selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bar {
    /// Defense (bar 1).
    Defense,
    /// Prosecution (bar 2).
    Prosecution,
}

impl Bar {
    /// Bar from its wire number.
    pub fn from_wire(n: i64) -> Option<Self> {
        match n {
            1 => Some(Self::Defense),
            2 => Some(Self::Prosecution),
            _ => None,
        }
    }
}

/// Maximum health bar value.
pub const MAX_HEALTH: u8 = 10;

/// Startup settings for one area.
#[derive(Debug, Clone)]
pub struct AreaSettings {
    /// Display name
    pub name: String,
    /// Initial background
    pub background: String,
    /// Initial evidence mode
    pub evidence_mode: EvidenceMode,
    /// Only moderators may change the background
    pub lock_background: bool,
    /// Only CMs may change the music
    pub lock_music: bool,
    /// Players may become CM
    pub allow_cms: bool,
    /// Backgrounds restricted to the configured list
    pub force_background_list: bool,
    /// Lines kept in the rolling log
    pub buffer_size: usize,
}

impl Default for AreaSettings {
    fn default() -> Self {
        Self {
            name: "Basement".to_string(),
            background: "default".to_string(),
            evidence_mode: EvidenceMode::Cms,
            lock_background: false,
            lock_music: false,
            allow_cms: true,
            force_background_list: false,
            buffer_size: 150,
        }
    }
}

#[derive(Debug)]
struct AreaState {
    background: String,
    lock: LockState,
    status: Status,
    evidence_mode: EvidenceMode,
    cms: BTreeSet<Uid>,
    invited: BTreeSet<Uid>,
    evidence: Vec<Evidence>,
    taken: BTreeMap<usize, Uid>,
    players: usize,
    health: [u8; 2],
    doc: String,
    lock_background: bool,
    lock_music: bool,
    allow_cms: bool,
    force_background_list: bool,
    buffer: VecDeque<String>,
    buffer_size: usize,
    testimony: Testimony,
}

/// A room.
#[derive(Debug)]
pub struct Area {
    id: usize,
    name: String,
    inner: Mutex<AreaState>,
}

impl Area {
    /// Area number `id` built from `settings`.
    pub fn new(id: usize, settings: AreaSettings) -> Self {
        let state = AreaState {
            background: settings.background,
            lock: LockState::Free,
            status: Status::Idle,
            evidence_mode: settings.evidence_mode,
            cms: BTreeSet::new(),
            invited: BTreeSet::new(),
            evidence: Vec::new(),
            taken: BTreeMap::new(),
            players: 0,
            health: [MAX_HEALTH; 2],
            doc: String::new(),
            lock_background: settings.lock_background,
            lock_music: settings.lock_music,
            allow_cms: settings.allow_cms,
            force_background_list: settings.force_background_list,
            buffer: VecDeque::with_capacity(settings.buffer_size),
            buffer_size: settings.buffer_size,
            testimony: Testimony::default(),
        };
        Self { id, name: settings.name, inner: Mutex::new(state) }
    }

    fn state(&self) -> MutexGuard<'_, AreaState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Position in the area list. Area 0 is the lobby.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True for the lobby.
    pub fn is_lobby(&self) -> bool {
        self.id == 0
    }

    // Lock and invitations

    /// Current lock state.
    pub fn lock_state(&self) -> LockState {
        self.state().lock
    }

    /// Lock the area and invite every current occupant.
    ///
    /// Spectatable mode may be set on any area, including the lobby, and
    /// from any state. A full lock is refused for the lobby and for an
    /// already locked area.
    ///
    /// # Errors
    ///
    /// - `AreaError::AlreadyLocked` for a full lock on a locked area
    /// - `AreaError::LobbyLocked` for a full lock on area 0
    pub fn lock(&self, kind: LockKind, occupants: &[Uid]) -> Result<(), AreaError> {
        let mut state = self.state();
        match kind {
            LockKind::Spectatable => state.lock = LockState::Spectatable,
            LockKind::Locked => {
                if state.lock == LockState::Locked {
                    return Err(AreaError::AlreadyLocked);
                }
                if self.is_lobby() {
                    return Err(AreaError::LobbyLocked);
                }
                state.lock = LockState::Locked;
            },
        }
        state.invited.extend(occupants.iter().copied());
        Ok(())
    }

    /// Free the area and clear the invite list.
    ///
    /// # Errors
    ///
    /// `AreaError::NotLocked` if the area is already free.
    pub fn unlock(&self) -> Result<(), AreaError> {
        let mut state = self.state();
        if state.lock == LockState::Free {
            return Err(AreaError::NotLocked);
        }
        state.lock = LockState::Free;
        state.invited.clear();
        Ok(())
    }

    /// Add `uid` to the invite list. Returns `false` if already invited.
    ///
    /// # Errors
    ///
    /// `AreaError::Unlocked` while the area is free.
    pub fn invite(&self, uid: Uid) -> Result<bool, AreaError> {
        let mut state = self.state();
        if state.lock == LockState::Free {
            return Err(AreaError::Unlocked);
        }
        Ok(state.invited.insert(uid))
    }

    /// Remove `uid` from the invite list. Returns `false` if not invited.
    ///
    /// # Errors
    ///
    /// `AreaError::Unlocked` while the area is free.
    pub fn uninvite(&self, uid: Uid) -> Result<bool, AreaError> {
        let mut state = self.state();
        if state.lock == LockState::Free {
            return Err(AreaError::Unlocked);
        }
        Ok(state.invited.remove(&uid))
    }

    /// True if `uid` is on the invite list.
    pub fn is_invited(&self, uid: Uid) -> bool {
        self.state().invited.contains(&uid)
    }

    /// Invited players.
    pub fn invited(&self) -> Vec<Uid> {
        self.state().invited.iter().copied().collect()
    }

    /// True if `uid` may enter. `bypass` is the lock-bypass permission.
    pub fn can_enter(&self, uid: Uid, bypass: bool) -> bool {
        let state = self.state();
        match state.lock {
            LockState::Free | LockState::Spectatable => true,
            LockState::Locked => {
                bypass || state.invited.contains(&uid) || state.cms.contains(&uid)
            },
        }
    }

    /// True if `uid` may pick a character here.
    pub fn can_play(&self, uid: Uid, bypass: bool) -> bool {
        let state = self.state();
        match state.lock {
            LockState::Free => true,
            LockState::Spectatable | LockState::Locked => {
                bypass || state.invited.contains(&uid) || state.cms.contains(&uid)
            },
        }
    }

    // CMs

    /// Make `uid` a CM.
    ///
    /// Idempotent: returns `Ok(false)` if `uid` already is one. `force`
    /// (moderator CM permission) overrides both the single-CM rule and the
    /// area's CM ban.
    ///
    /// # Errors
    ///
    /// - `AreaError::CmsDisallowed` if the area forbids CMs
    /// - `AreaError::CmTaken` if someone else is CM
    pub fn add_cm(&self, uid: Uid, force: bool) -> Result<bool, AreaError> {
        let mut state = self.state();
        if state.cms.contains(&uid) {
            return Ok(false);
        }
        if !force {
            if !state.allow_cms {
                return Err(AreaError::CmsDisallowed);
            }
            if !state.cms.is_empty() {
                return Err(AreaError::CmTaken);
            }
        }
        Ok(state.cms.insert(uid))
    }

    /// Drop CM status. Returns `false` if `uid` was not a CM.
    pub fn remove_cm(&self, uid: Uid) -> bool {
        self.state().cms.remove(&uid)
    }

    /// True if `uid` is a CM here.
    pub fn is_cm(&self, uid: Uid) -> bool {
        self.state().cms.contains(&uid)
    }

    /// Current CMs in ascending UID order.
    pub fn cms(&self) -> Vec<Uid> {
        self.state().cms.iter().copied().collect()
    }

    // Characters and occupancy

    /// Claim character `char_id` for `uid`.
    ///
    /// # Errors
    ///
    /// `AreaError::CharacterTaken` if another player holds it.
    pub fn take_character(&self, char_id: usize, uid: Uid) -> Result<(), AreaError> {
        let mut state = self.state();
        match state.taken.get(&char_id) {
            Some(&holder) if holder != uid => Err(AreaError::CharacterTaken),
            _ => {
                state.taken.insert(char_id, uid);
                Ok(())
            },
        }
    }

    /// Release `char_id` if `uid` holds it.
    pub fn release_character(&self, char_id: usize, uid: Uid) {
        let mut state = self.state();
        if state.taken.get(&char_id) == Some(&uid) {
            state.taken.remove(&char_id);
        }
    }

    /// Holder of `char_id`, if any.
    pub fn character_holder(&self, char_id: usize) -> Option<Uid> {
        self.state().taken.get(&char_id).copied()
    }

    /// `CharsCheck` fields for `count` characters: `-1` taken, `0` free.
    pub fn chars_check(&self, count: usize) -> Vec<String> {
        let state = self.state();
        (0..count)
            .map(|i| if state.taken.contains_key(&i) { "-1" } else { "0" }.to_string())
            .collect()
    }

    /// Count a player entering.
    pub fn add_player(&self) {
        self.state().players += 1;
    }

    /// Count a player leaving and drop their area roles.
    pub fn remove_player(&self, uid: Uid) {
        let mut state = self.state();
        state.players = state.players.saturating_sub(1);
        state.cms.remove(&uid);
        state.taken.retain(|_, holder| *holder != uid);
    }

    /// Players in the area.
    pub fn players(&self) -> usize {
        self.state().players
    }

    // Presentation

    /// Current background.
    pub fn background(&self) -> String {
        self.state().background.clone()
    }

    /// Replace the background.
    pub fn set_background(&self, background: impl Into<String>) {
        self.state().background = background.into();
    }

    /// Current status.
    pub fn status(&self) -> Status {
        self.state().status
    }

    /// Replace the status.
    pub fn set_status(&self, status: Status) {
        self.state().status = status;
    }

    /// Area document link or text.
    pub fn doc(&self) -> String {
        self.state().doc.clone()
    }

    /// Replace the document; empty clears it.
    pub fn set_doc(&self, doc: impl Into<String>) {
        self.state().doc = doc.into();
    }

    /// Health of `bar`.
    pub fn health(&self, bar: Bar) -> u8 {
        self.state().health[bar as usize]
    }

    /// Set `bar` to `value` (0 to [`MAX_HEALTH`]).
    ///
    /// # Errors
    ///
    /// `AreaError::InvalidHealth` for out-of-range values.
    pub fn set_health(&self, bar: Bar, value: i64) -> Result<(), AreaError> {
        let value = u8::try_from(value).ok().filter(|v| *v <= MAX_HEALTH).ok_or(AreaError::InvalidHealth)?;
        self.state().health[bar as usize] = value;
        Ok(())
    }

    // Settings

    /// Only moderators may change the background.
    pub fn lock_background(&self) -> bool {
        self.state().lock_background
    }

    /// Toggle the background lock.
    pub fn set_lock_background(&self, on: bool) {
        self.state().lock_background = on;
    }

    /// Only CMs may change the music.
    pub fn lock_music(&self) -> bool {
        self.state().lock_music
    }

    /// Toggle the music lock.
    pub fn set_lock_music(&self, on: bool) {
        self.state().lock_music = on;
    }

    /// Players may become CM.
    pub fn allow_cms(&self) -> bool {
        self.state().allow_cms
    }

    /// Toggle CM availability.
    pub fn set_allow_cms(&self, on: bool) {
        self.state().allow_cms = on;
    }

    /// Backgrounds must come from the configured list.
    pub fn force_background_list(&self) -> bool {
        self.state().force_background_list
    }

    /// Toggle background list enforcement.
    pub fn set_force_background_list(&self, on: bool) {
        self.state().force_background_list = on;
    }

    // Evidence

    /// Current evidence mode.
    pub fn evidence_mode(&self) -> EvidenceMode {
        self.state().evidence_mode
    }

    /// Replace the evidence mode.
    pub fn set_evidence_mode(&self, mode: EvidenceMode) {
        self.state().evidence_mode = mode;
    }

    /// Copy of the evidence list.
    pub fn evidence(&self) -> Vec<Evidence> {
        self.state().evidence.clone()
    }

    /// Append an entry.
    pub fn add_evidence(&self, evidence: Evidence) {
        self.state().evidence.push(evidence);
    }

    /// Remove the entry at `index`.
    ///
    /// # Errors
    ///
    /// `AreaError::NoSuchEvidence` if `index` is out of range.
    pub fn remove_evidence(&self, index: usize) -> Result<Evidence, AreaError> {
        let mut state = self.state();
        if index >= state.evidence.len() {
            return Err(AreaError::NoSuchEvidence { index });
        }
        Ok(state.evidence.remove(index))
    }

    /// Replace the entry at `index`.
    ///
    /// # Errors
    ///
    /// `AreaError::NoSuchEvidence` if `index` is out of range.
    pub fn edit_evidence(&self, index: usize, evidence: Evidence) -> Result<(), AreaError> {
        let mut state = self.state();
        let slot = state.evidence.get_mut(index).ok_or(AreaError::NoSuchEvidence { index })?;
        *slot = evidence;
        Ok(())
    }

    /// Swap the entries at `a` and `b`.
    ///
    /// # Errors
    ///
    /// `AreaError::NoSuchEvidence` naming the first out-of-range index.
    pub fn swap_evidence(&self, a: usize, b: usize) -> Result<(), AreaError> {
        let mut state = self.state();
        let len = state.evidence.len();
        if let Some(index) = [a, b].into_iter().find(|i| *i >= len) {
            return Err(AreaError::NoSuchEvidence { index });
        }
        state.evidence.swap(a, b);
        Ok(())
    }

    // Log buffer

    /// Append a log line, evicting the oldest beyond the buffer size.
    pub fn log(&self, line: impl Into<String>) {
        let mut state = self.state();
        if state.buffer_size == 0 {
            return;
        }
        if state.buffer.len() >= state.buffer_size {
            state.buffer.pop_front();
        }
        state.buffer.push_back(line.into());
    }

    /// Copy of the log, oldest first.
    pub fn log_lines(&self) -> Vec<String> {
        self.state().buffer.iter().cloned().collect()
    }

    // Testimony

    /// Run `f` against the testimony recorder under the area lock.
    ///
    /// `f` must not block or call back into the area.
    pub fn with_testimony<R>(&self, f: impl FnOnce(&mut Testimony) -> R) -> R {
        f(&mut self.state().testimony)
    }

    /// Clear session state for a departing player.
    ///
    /// Removes `uid` from the CM roster and releases its characters. Returns
    /// `true` if it was a CM, so the caller knows to refresh the roster
    /// broadcast.
    pub fn forget(&self, uid: Uid) -> bool {
        let mut state = self.state();
        state.taken.retain(|_, holder| *holder != uid);
        state.cms.remove(&uid)
    }
}
