//! Server configuration loaded from TOML.
//!
//! ```toml
//! characters = ["Phoenix", "Edgeworth"]
//! backgrounds = ["default", "gs4"]
//! music = ["Trial.opus"]
//!
//! [server]
//! name = "My Courtroom"
//! port = 27016
//! ws_port = 27017
//!
//! [[areas]]
//! name = "Lobby"
//! background = "gs4"
//!
//! [[roles]]
//! name = "moderator"
//! permissions = ["kick", "ban", "mute"]
//! ```
//!
//! Every field has a default except the character and background lists.

use std::{collections::HashMap, path::Path};

use athena_core::{AreaSettings, EvidenceMode, Permissions};
use serde::Deserialize;

use crate::error::ConfigError;

/// The whole configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `[server]` table
    pub server: ServerConfig,
    /// Character folder names, indexed by character id
    pub characters: Vec<String>,
    /// Music list; entries without a file extension are category headers
    pub music: Vec<String>,
    /// Backgrounds players may select
    pub backgrounds: Vec<String>,
    /// Phrases substituted for parrot-muted players
    pub parrot: Vec<String>,
    /// `[[areas]]` tables; area 0 is the lobby
    pub areas: Vec<AreaConfig>,
    /// `[[roles]]` tables for moderator accounts
    pub roles: Vec<RoleConfig>,
}

/// `[server]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Name shown in the server list and used for server messages
    pub name: String,
    /// Description sent in the `PN` packet
    pub description: String,
    /// Message of the day, sent on join
    pub motd: String,
    /// Listener address
    pub bind_address: String,
    /// Raw TCP port
    pub port: u16,
    /// WebSocket port; `None` disables the WebSocket listener
    pub ws_port: Option<u16>,
    /// Size of the UID pool
    pub max_players: u32,
    /// Longest accepted IC or OOC message, in characters
    pub max_message_size: usize,
    /// Largest frame the streaming decoder buffers, in bytes
    pub max_packet_size: usize,
    /// Size budget for chunked list packets, in bytes
    pub max_chunk_size: usize,
    /// Lines kept in each area's log
    pub buffer_size: usize,
    /// Packets allowed per window; 0 disables rate limiting
    pub rate_limit: usize,
    /// Rate limit window
    pub rate_limit_window_secs: u64,
    /// Minimum gap between modcalls; 0 disables the cooldown
    pub modcall_cooldown_secs: u64,
    /// Ban length when `/ban` is given no `-d`; 0 is permanent
    pub default_ban_duration_secs: u64,
    /// Disconnect clients silent for this long; 0 disables
    pub idle_timeout_secs: u64,
    /// Trust `X-Forwarded-For` and `X-Real-IP` on WebSocket handshakes
    pub reverse_proxy_mode: bool,
    /// Asset server advertised to clients; its host is an allowed origin
    pub asset_url: String,
    /// Extra allowed WebSocket origins
    pub websocket_origins: Vec<String>,
    /// Redb database file; the in-memory store is used when absent
    pub database_path: Option<std::path::PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "Unnamed Server".to_string(),
            description: String::new(),
            motd: String::new(),
            bind_address: "0.0.0.0".to_string(),
            port: 27016,
            ws_port: None,
            max_players: 100,
            max_message_size: 256,
            max_packet_size: 16 * 1024,
            max_chunk_size: 16 * 1024,
            buffer_size: 150,
            rate_limit: 20,
            rate_limit_window_secs: 1,
            modcall_cooldown_secs: 60,
            default_ban_duration_secs: 3 * 24 * 60 * 60,
            idle_timeout_secs: 180,
            reverse_proxy_mode: false,
            asset_url: String::new(),
            websocket_origins: Vec::new(),
            database_path: None,
        }
    }
}

/// One `[[areas]]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AreaConfig {
    /// Display name
    pub name: String,
    /// Initial background
    pub background: String,
    /// `any`, `cms` or `mods`
    pub evidence_mode: String,
    /// Only moderators may change the background
    pub lock_background: bool,
    /// Only CMs may change the music
    pub lock_music: bool,
    /// Players may become CM
    pub allow_cms: bool,
    /// Backgrounds restricted to the configured list
    pub force_background_list: bool,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            name: "Basement".to_string(),
            background: "default".to_string(),
            evidence_mode: "cms".to_string(),
            lock_background: false,
            lock_music: false,
            allow_cms: true,
            force_background_list: false,
        }
    }
}

/// One `[[roles]]` table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleConfig {
    /// Role name stored on accounts
    pub name: String,
    /// Permission names, e.g. `kick` or `admin`
    pub permissions: Vec<String>,
}

impl Config {
    /// Read and validate the file at `path`.
    ///
    /// # Errors
    ///
    /// `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`Config::from_toml`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml(&text)
    }

    /// Parse and validate TOML text.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Parse` for malformed TOML
    /// - `ConfigError::Invalid` for empty character or background lists, or
    ///   a zero player cap
    /// - `ConfigError::UnknownPermission` for a bad role permission name
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()
    }

    /// Check required lists and normalize recoverable mistakes.
    ///
    /// # Errors
    ///
    /// As [`Config::from_toml`], minus parse errors.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.characters.is_empty() {
            return Err(ConfigError::Invalid("character list is empty".to_string()));
        }
        if self.backgrounds.is_empty() {
            return Err(ConfigError::Invalid("background list is empty".to_string()));
        }
        if self.server.max_players == 0 {
            return Err(ConfigError::Invalid("max_players must be at least 1".to_string()));
        }
        if self.areas.is_empty() {
            tracing::warn!("No areas configured, creating a default one");
            self.areas.push(AreaConfig::default());
        }

        for area in &mut self.areas {
            if !self.backgrounds.contains(&area.background) {
                tracing::warn!(
                    "Area {} uses unknown background {}, falling back to default",
                    area.name,
                    area.background
                );
                area.background = "default".to_string();
            }
            if area.evidence_mode.parse::<EvidenceMode>().is_err() {
                tracing::warn!(
                    "Area {} has invalid evidence mode {}, using cms",
                    area.name,
                    area.evidence_mode
                );
                area.evidence_mode = "cms".to_string();
            }
        }

        for role in &self.roles {
            Permissions::from_names(&role.permissions)?;
        }

        Ok(self)
    }

    /// Startup settings for each area in order.
    pub fn area_settings(&self) -> Vec<AreaSettings> {
        self.areas
            .iter()
            .map(|area| AreaSettings {
                name: area.name.clone(),
                background: area.background.clone(),
                evidence_mode: area.evidence_mode.parse().unwrap_or_default(),
                lock_background: area.lock_background,
                lock_music: area.lock_music,
                allow_cms: area.allow_cms,
                force_background_list: area.force_background_list,
                buffer_size: self.server.buffer_size,
            })
            .collect()
    }

    /// Role name to permission set.
    pub fn role_permissions(&self) -> HashMap<String, Permissions> {
        self.roles
            .iter()
            .filter_map(|role| {
                Permissions::from_names(&role.permissions).ok().map(|perms| (role.name.clone(), perms))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        characters = ["Phoenix", "Edgeworth"]
        backgrounds = ["default", "gs4"]
    "#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(config.server.port, 27016);
        assert_eq!(config.server.max_chunk_size, 16384);
        assert_eq!(config.areas.len(), 1);
        assert_eq!(config.areas[0].name, "Basement");
    }

    #[test]
    fn shipped_config_parses() {
        let config = Config::from_toml(include_str!("../../../config/config.toml")).unwrap();
        assert_eq!(config.areas[0].name, "Lobby");
        assert_eq!(config.server.ws_port, Some(27017));
        assert!(config.roles.iter().any(|r| r.name == "moderator"));
    }

    #[test]
    fn empty_characters_rejected() {
        let err = Config::from_toml("backgrounds = [\"default\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn empty_backgrounds_rejected() {
        let err = Config::from_toml("characters = [\"Phoenix\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn bad_area_fields_fall_back() {
        let text = format!(
            "{MINIMAL}\n[[areas]]\nname = \"Court\"\nbackground = \"missing\"\nevidence_mode = \"nobody\"\n"
        );
        let config = Config::from_toml(&text).unwrap();
        let settings = config.area_settings();
        assert_eq!(settings[0].background, "default");
        assert_eq!(settings[0].evidence_mode, EvidenceMode::Cms);
    }

    #[test]
    fn roles_resolve_permissions() {
        let text = format!("{MINIMAL}\n[[roles]]\nname = \"mod\"\npermissions = [\"kick\", \"ban\"]\n");
        let config = Config::from_toml(&text).unwrap();
        let perms = config.role_permissions()["mod"];
        assert!(perms.contains(Permissions::KICK));
        assert!(perms.contains(Permissions::BAN));
        assert!(!perms.contains(Permissions::MUTE));
    }

    #[test]
    fn unknown_permission_rejected() {
        let text = format!("{MINIMAL}\n[[roles]]\nname = \"mod\"\npermissions = [\"fly\"]\n");
        assert!(matches!(Config::from_toml(&text), Err(ConfigError::UnknownPermission(_))));
    }
}
